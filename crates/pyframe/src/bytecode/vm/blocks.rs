//! Block stack and structured unwinding.
//!
//! Every `SETUP_*` instruction pushes a [`Block`] onto the current frame's block stack.
//! When an instruction produces a non-`None` [`Why`] signal, [`Frame::unwind`] offers it to
//! the blocks from the top down until one consumes it or the stack is exhausted.
//!
//! # Unwind policy
//!
//! - `Loop` + `Continue(t)`: jump to `t`; the loop block stays.
//! - Otherwise the block is popped and the operand stack truncated to the block's level, then:
//!   - `Loop` + `Break`: jump to the loop exit.
//!   - `Except`/`Finally` + `Exception`: push `Cleanup(Exception)`; `Except` also pushes the
//!     exception instance. Jump to the handler.
//!   - `Finally` + `Return`/`Break`/`Continue`: push `Cleanup` carrying the signal and jump to
//!     the finally body, which ends with `END_FINALLY` re-issuing it.
//!   - Anything else is not consumed and the next block is tried.

use log::debug;

use super::{Frame, VM};
use crate::{
    exception::{ExcType, RaisedException, RunResult},
    io::PrintWriter,
    value::Value,
};

/// A control-flow outcome of one instruction, other than falling through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Why {
    /// The frame returns. The value is in the VM's return slot.
    Return,
    /// An exception is propagating. The triple is in the VM's last-exception slot.
    Exception,
    Break,
    /// Continue the loop at the given offset.
    Continue(usize),
}

/// A signal parked while a finally body or except handler runs.
#[derive(Debug)]
pub(crate) enum Pending {
    /// Normal fall-through into a finally body.
    None,
    Return(Value),
    Exception(RaisedException),
    Break,
    Continue(usize),
}

#[derive(Debug)]
pub(crate) enum BlockKind {
    /// Opened by `SETUP_LOOP`; `handler` is the loop exit.
    Loop,
    /// Opened by `SETUP_EXCEPT`; `handler` is the first handler instruction.
    Except,
    /// Opened by `SETUP_FINALLY`; `handler` is the finally body.
    Finally,
    /// A handler or finally body is running with a signal to resume or discard.
    Cleanup(Pending),
}

#[derive(Debug)]
pub(crate) struct Block {
    pub kind: BlockKind,
    pub handler: usize,
    /// Operand-stack depth when the block was opened.
    pub level: usize,
}

impl Block {
    pub fn new(kind: BlockKind, handler: usize, level: usize) -> Self {
        Self { kind, handler, level }
    }

    /// Short name for logs.
    fn label(&self) -> &'static str {
        match self.kind {
            BlockKind::Loop => "loop",
            BlockKind::Except => "except",
            BlockKind::Finally => "finally",
            BlockKind::Cleanup(_) => "cleanup",
        }
    }
}

/// VM-level state a block may take ownership of while consuming a signal.
pub(crate) struct SignalSlots<'s> {
    pub last_exception: &'s mut Option<RaisedException>,
    pub return_value: &'s mut Option<Value>,
}

impl Frame {
    /// Offers `why` to the block stack.
    ///
    /// Returns `None` if a block consumed the signal (the instruction pointer has been
    /// redirected), or the signal itself once the block stack is exhausted.
    pub(crate) fn unwind(&mut self, why: Why, slots: SignalSlots<'_>) -> Option<Why> {
        while let Some(top) = self.blocks.last() {
            if let (BlockKind::Loop, Why::Continue(target)) = (&top.kind, why) {
                self.ip = target;
                return None;
            }
            let Some(block) = self.blocks.pop() else { break };
            self.stack.truncate(block.level);

            let handled = match (&block.kind, why) {
                (BlockKind::Loop, Why::Break) => true,
                (BlockKind::Except | BlockKind::Finally, Why::Exception) => match slots.last_exception.take() {
                    Some(exc) => {
                        let instance = exc.instance();
                        let level = self.stack.len();
                        self.blocks.push(Block::new(
                            BlockKind::Cleanup(Pending::Exception(exc)),
                            block.handler,
                            level,
                        ));
                        if matches!(block.kind, BlockKind::Except) {
                            self.stack.push(Value::Exception(instance));
                        }
                        true
                    }
                    None => false,
                },
                (BlockKind::Finally, Why::Return | Why::Break | Why::Continue(_)) => {
                    let pending = match why {
                        Why::Return => Pending::Return(slots.return_value.take().unwrap_or(Value::None)),
                        Why::Continue(target) => Pending::Continue(target),
                        _ => Pending::Break,
                    };
                    let level = self.stack.len();
                    self.blocks.push(Block::new(BlockKind::Cleanup(pending), block.handler, level));
                    true
                }
                _ => false,
            };
            if handled {
                debug!(
                    "{} block in {} consumed {why:?}, jumping to {}",
                    block.label(),
                    self.code.name,
                    block.handler
                );
                self.ip = block.handler;
                return None;
            }
        }
        Some(why)
    }
}

impl<P: PrintWriter> VM<'_, P> {
    /// `SETUP_LOOP`, `SETUP_EXCEPT` and `SETUP_FINALLY`.
    pub(super) fn setup_block(&mut self, kind: BlockKind, handler: usize) -> RunResult<()> {
        let frame = self.frame_mut()?;
        let level = frame.stack.len();
        frame.blocks.push(Block::new(kind, handler, level));
        Ok(())
    }

    /// `POP_BLOCK`. Closing a finally block on the normal path enters its body with nothing
    /// pending.
    pub(super) fn pop_block(&mut self) -> RunResult<()> {
        let frame = self.frame_mut()?;
        let block = frame
            .blocks
            .pop()
            .ok_or_else(|| ExcType::system_error_no_block("POP_BLOCK"))?;
        if let BlockKind::Finally = block.kind {
            let level = frame.stack.len();
            frame
                .blocks
                .push(Block::new(BlockKind::Cleanup(Pending::None), block.handler, level));
        }
        Ok(())
    }

    /// `END_FINALLY`: resumes whatever the cleanup block parked.
    pub(super) fn end_finally(&mut self) -> RunResult<Option<Why>> {
        Ok(match self.pop_cleanup("END_FINALLY")? {
            Pending::None => None,
            Pending::Return(value) => {
                self.return_value = Some(value);
                Some(Why::Return)
            }
            Pending::Exception(exc) => {
                self.last_exception = Some(exc);
                Some(Why::Exception)
            }
            Pending::Break => Some(Why::Break),
            Pending::Continue(target) => Some(Why::Continue(target)),
        })
    }

    /// `POP_EXCEPT`: the handled exception is discarded.
    pub(super) fn pop_except(&mut self) -> RunResult<()> {
        self.pop_cleanup("POP_EXCEPT").map(drop)
    }

    fn pop_cleanup(&mut self, opname: &str) -> RunResult<Pending> {
        let frame = self.frame_mut()?;
        match frame.blocks.pop() {
            Some(Block {
                kind: BlockKind::Cleanup(pending),
                level,
                ..
            }) => {
                frame.stack.truncate(level);
                Ok(pending)
            }
            Some(other) => {
                frame.blocks.push(other);
                Err(ExcType::system_error_no_block(opname))
            }
            None => Err(ExcType::system_error_no_block(opname)),
        }
    }

    /// The exception whose handler is running, innermost first across the call stack.
    pub(super) fn handled_exception(&self) -> Option<RaisedException> {
        self.frames.iter().rev().find_map(|frame| {
            frame.blocks.iter().rev().find_map(|block| match &block.kind {
                BlockKind::Cleanup(Pending::Exception(exc)) => Some(exc.clone()),
                _ => None,
            })
        })
    }
}
