#![allow(dead_code)]

use pyframe::{Code, CodeBuilder, Const, NamespaceRef, NoPrint, Opcode, RaisedException, Value, VM};

pub fn build(builder: CodeBuilder) -> Code {
    builder.build().expect("code should assemble")
}

/// Runs top-level code with fresh globals and no output.
pub fn run(builder: CodeBuilder) -> Result<Value, RaisedException> {
    let mut writer = NoPrint;
    VM::new(&mut writer).run_code(build(builder), None, None)
}

/// Runs top-level code against `globals`, which doubles as its locals.
pub fn run_in(builder: CodeBuilder, globals: &NamespaceRef) -> Result<Value, RaisedException> {
    let mut writer = NoPrint;
    VM::new(&mut writer).run_code(build(builder), Some(globals.clone()), None)
}

/// Emits `name = <function from code>` with no defaults.
pub fn define(builder: &mut CodeBuilder, name: &str, code: Code) {
    builder.emit_load_const(code);
    builder.emit_make_function(0, 0, false);
    builder.emit_name(Opcode::StoreName, name);
}

/// ```python
/// def fib(n):
///     if n < 2:
///         return n
///     return fib(n - 1) + fib(n - 2)
/// ```
pub fn fib_code() -> Code {
    let mut b = CodeBuilder::new("fib").with_args(&["n"]);
    let recurse = b.new_label();
    b.emit_local(Opcode::LoadFast, "n");
    b.emit_load_const(Const::Int(2));
    b.emit_compare(pyframe::CompareOp::Lt);
    b.emit_jump(Opcode::PopJumpIfFalse, recurse);
    b.emit_local(Opcode::LoadFast, "n");
    b.emit(Opcode::ReturnValue);
    b.bind(recurse);
    for step in [1, 2] {
        b.emit_name(Opcode::LoadGlobal, "fib");
        b.emit_local(Opcode::LoadFast, "n");
        b.emit_load_const(Const::Int(step));
        b.emit(Opcode::BinarySubtract);
        b.emit_call(1, 0);
    }
    b.emit(Opcode::BinaryAdd);
    b.emit(Opcode::ReturnValue);
    build(b)
}

/// Top-level code that defines `fib` and returns `fib(n)`.
pub fn fib_module(n: i64) -> CodeBuilder {
    let mut b = CodeBuilder::new("<module>");
    define(&mut b, "fib", fib_code());
    b.emit_name(Opcode::LoadName, "fib");
    b.emit_load_const(Const::Int(n));
    b.emit_call(1, 0);
    b.emit(Opcode::ReturnValue);
    b
}
