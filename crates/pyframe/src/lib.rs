#![doc = include_str!("../../../README.md")]
mod args;
mod builtins;
mod bytecode;
mod exception;
mod for_iterator;
mod function;
mod io;
mod namespace;
mod resource;
mod signature;
mod types;
mod value;

pub use crate::{
    args::ArgValues,
    builtins::Builtins,
    bytecode::{
        BinaryOp, BuildError, Code, CodeBuilder, CodeFlags, CompareOp, Const, DecodeError, DecodeErrorKind,
        HAVE_ARGUMENT, Instruction, Instructions, InvalidOpcodeError, Label, Opcode, Operand, OperandKind, Operator,
        UnaryOp, VM, decode,
    },
    exception::{ExcType, RaisedException, SimpleException, TraceFrame},
    for_iterator::ForIterator,
    function::{Cell, Function},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    namespace::{Namespace, NamespaceRef},
    resource::{DEFAULT_MAX_RECURSION_DEPTH, MAX_SEQUENCE_BYTES, ResourceError, ResourceLimits},
    types::{Dict, Range, Type},
    value::Value,
};
