mod common;

use common::{build, define, run, run_in};
use pyframe::{CodeBuilder, CompareOp, Const, ExcType, Label, Namespace, Opcode, Value};

/// Emits the head of an `except <exc_name>:` clause. Leaves the instance on the stack and
/// jumps to `no_match` when the exception is not an `exc_name`.
fn except_clause(b: &mut CodeBuilder, exc_name: &str, no_match: Label) {
    b.emit(Opcode::DupTop);
    b.emit_name(Opcode::LoadName, exc_name);
    b.emit_compare(CompareOp::ExceptionMatch);
    b.emit_jump(Opcode::PopJumpIfFalse, no_match);
}

/// ```python
/// try:
///     r = 1 / 0
/// except <handled> as e:
///     r = str(e)
/// return r
/// ```
fn divide_by_zero_guarded(handled: &str) -> CodeBuilder {
    let mut b = CodeBuilder::new("<module>");
    let handler = b.new_label();
    let reraise = b.new_label();
    let end = b.new_label();
    b.emit_jump(Opcode::SetupExcept, handler);
    b.emit_load_const(Const::Int(1));
    b.emit_load_const(Const::Int(0));
    b.emit(Opcode::BinaryTrueDivide);
    b.emit_name(Opcode::StoreName, "r");
    b.emit(Opcode::PopBlock);
    b.emit_jump(Opcode::JumpForward, end);
    b.bind(handler);
    except_clause(&mut b, handled, reraise);
    b.emit_name(Opcode::StoreName, "e");
    b.emit_name(Opcode::LoadName, "str");
    b.emit_name(Opcode::LoadName, "e");
    b.emit_call(1, 0);
    b.emit_name(Opcode::StoreName, "r");
    b.emit(Opcode::PopExcept);
    b.emit_jump(Opcode::JumpForward, end);
    b.bind(reraise);
    b.emit(Opcode::EndFinally);
    b.bind(end);
    b.emit_name(Opcode::LoadName, "r");
    b.emit(Opcode::ReturnValue);
    b
}

#[test]
fn matching_handler_catches() {
    let result = run(divide_by_zero_guarded("ArithmeticError")).unwrap();
    assert_eq!(result, Value::from("division by zero"));
}

#[test]
fn unmatched_handler_reraises_with_the_original_origin() {
    let err = run(divide_by_zero_guarded("KeyError")).unwrap_err();
    assert_eq!(err.kind(), ExcType::ZeroDivisionError);
    // SETUP_EXCEPT, LOAD_CONST, LOAD_CONST, then the division
    assert_eq!(err.origin().offset, 9);
    assert_eq!(&*err.origin().code_name, "<module>");
    assert_eq!(err.traceback().len(), 1);
}

#[test]
fn bare_raise_rethrows_the_handled_exception() {
    // try:
    //     raise ValueError("x")
    // except ValueError:
    //     raise
    let mut b = CodeBuilder::new("<module>");
    let handler = b.new_label();
    let reraise = b.new_label();
    let end = b.new_label();
    b.emit_jump(Opcode::SetupExcept, handler);
    b.emit_name(Opcode::LoadName, "ValueError");
    b.emit_load_const("x");
    b.emit_arg(Opcode::RaiseVarargs, 2);
    b.emit(Opcode::PopBlock);
    b.emit_jump(Opcode::JumpForward, end);
    b.bind(handler);
    except_clause(&mut b, "ValueError", reraise);
    b.emit(Opcode::PopTop);
    b.emit_arg(Opcode::RaiseVarargs, 0);
    b.bind(reraise);
    b.emit(Opcode::EndFinally);
    b.bind(end);
    b.emit_load_const(Const::None);
    b.emit(Opcode::ReturnValue);

    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::ValueError);
    assert_eq!(err.value().py_str(), "x");
    assert_eq!(err.origin().offset, 9);
}

#[test]
fn bare_raise_without_an_active_exception() {
    let mut b = CodeBuilder::new("<module>");
    b.emit_arg(Opcode::RaiseVarargs, 0);
    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::RuntimeError);
}

#[test]
fn raising_an_instance_and_a_non_exception() {
    let mut b = CodeBuilder::new("<module>");
    b.emit_name(Opcode::LoadName, "KeyError");
    b.emit_load_const("k");
    b.emit_call(1, 0);
    b.emit_arg(Opcode::RaiseVarargs, 1);
    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::KeyError);
    assert_eq!(err.value().arg(), Some("k"));

    let mut b = CodeBuilder::new("<module>");
    b.emit_load_const(Const::Int(3));
    b.emit_arg(Opcode::RaiseVarargs, 1);
    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::TypeError);
}

/// ```python
/// def f():
///     try:
///         <body>
///     finally:
///         global flag
///         flag = "ran"
///         <finally_tail>
/// f()
/// ```
fn try_finally(body: impl FnOnce(&mut CodeBuilder), finally_tail: impl FnOnce(&mut CodeBuilder)) -> CodeBuilder {
    let mut f = CodeBuilder::new("f");
    let fin = f.new_label();
    f.emit_jump(Opcode::SetupFinally, fin);
    body(&mut f);
    f.emit(Opcode::PopBlock);
    f.emit_load_const(Const::None);
    f.bind(fin);
    f.emit_load_const("ran");
    f.emit_name(Opcode::StoreGlobal, "flag");
    finally_tail(&mut f);
    f.emit(Opcode::EndFinally);
    f.emit_load_const(Const::None);
    f.emit(Opcode::ReturnValue);

    let mut b = CodeBuilder::new("<module>");
    define(&mut b, "f", build(f));
    b.emit_name(Opcode::LoadName, "f");
    b.emit_call(0, 0);
    b.emit(Opcode::ReturnValue);
    b
}

#[test]
fn finally_runs_before_a_return() {
    let b = try_finally(
        |f| {
            f.emit_load_const(Const::Int(1));
            f.emit(Opcode::ReturnValue);
        },
        |_| {},
    );
    let globals = Namespace::new_main().into_ref();
    assert_eq!(run_in(b, &globals).unwrap(), Value::Int(1));
    assert_eq!(globals.borrow().get("flag"), Some(&Value::from("ran")));
}

#[test]
fn return_in_finally_overrides_the_pending_return() {
    let b = try_finally(
        |f| {
            f.emit_load_const(Const::Int(1));
            f.emit(Opcode::ReturnValue);
        },
        |f| {
            f.emit_load_const(Const::Int(2));
            f.emit(Opcode::ReturnValue);
        },
    );
    assert_eq!(run(b).unwrap(), Value::Int(2));
}

#[test]
fn finally_runs_while_an_exception_escapes() {
    let b = try_finally(
        |f| {
            f.emit_name(Opcode::LoadGlobal, "IndexError");
            f.emit_arg(Opcode::RaiseVarargs, 1);
        },
        |_| {},
    );
    let globals = Namespace::new_main().into_ref();
    let err = run_in(b, &globals).unwrap_err();
    assert_eq!(err.kind(), ExcType::IndexError);
    assert_eq!(globals.borrow().get("flag"), Some(&Value::from("ran")));
}

#[test]
fn finally_after_normal_completion() {
    let b = try_finally(|f| f.emit(Opcode::Nop), |_| {});
    let globals = Namespace::new_main().into_ref();
    assert_eq!(run_in(b, &globals).unwrap(), Value::None);
    assert_eq!(globals.borrow().get("flag"), Some(&Value::from("ran")));
}

/// `def g(): return 1 // 0`
fn failing_callee() -> CodeBuilder {
    let mut g = CodeBuilder::new("g");
    g.emit_load_const(Const::Int(1));
    g.emit_load_const(Const::Int(0));
    g.emit(Opcode::BinaryFloorDivide);
    g.emit(Opcode::ReturnValue);

    let mut b = CodeBuilder::new("<module>");
    define(&mut b, "g", build(g));
    b
}

#[test]
fn callee_exception_carries_both_frames() {
    let mut b = failing_callee();
    let call_offset = b.offset() + 3;
    b.emit_name(Opcode::LoadName, "g");
    b.emit_call(0, 0);
    b.emit(Opcode::ReturnValue);

    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::ZeroDivisionError);
    assert_eq!(err.value().py_str(), "integer division or modulo by zero");
    let frames: Vec<_> = err.traceback().iter().map(|f| (&*f.code_name, f.offset)).collect();
    assert_eq!(frames, [("g", 6), ("<module>", call_offset)]);
}

#[test]
fn caller_catches_callee_exception() {
    // try:
    //     return g()
    // except:
    //     return "handled"
    let mut b = failing_callee();
    let handler = b.new_label();
    b.emit_jump(Opcode::SetupExcept, handler);
    b.emit_name(Opcode::LoadName, "g");
    b.emit_call(0, 0);
    b.emit(Opcode::ReturnValue);
    b.bind(handler);
    b.emit(Opcode::PopTop);
    b.emit(Opcode::PopExcept);
    b.emit_load_const("handled");
    b.emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap(), Value::from("handled"));
}

#[test]
fn undefined_names() {
    let mut b = CodeBuilder::new("<module>");
    b.emit_name(Opcode::LoadName, "nope");
    b.emit(Opcode::ReturnValue);
    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::NameError);
    assert_eq!(err.value().py_str(), "name 'nope' is not defined");

    // def f(): return x  (x is a local that was never assigned)
    let mut f = CodeBuilder::new("f");
    f.emit_local(Opcode::LoadFast, "x");
    f.emit(Opcode::ReturnValue);
    let mut b = CodeBuilder::new("<module>");
    define(&mut b, "f", build(f));
    b.emit_name(Opcode::LoadName, "f");
    b.emit_call(0, 0);
    b.emit(Opcode::ReturnValue);
    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::UnboundLocalError);
    assert!(ExcType::UnboundLocalError.is_subclass_of(ExcType::NameError));
}

#[test]
fn unsupported_operands() {
    let mut b = CodeBuilder::new("<module>");
    b.emit_load_const(Const::Int(1));
    b.emit_load_const("a");
    b.emit(Opcode::BinaryAdd);
    b.emit(Opcode::ReturnValue);
    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::TypeError);
    assert_eq!(
        err.value().py_str(),
        "unsupported operand type(s) for +: 'int' and 'str'"
    );
}
