mod common;

use common::{build, fib_module, run};
use pyframe::{
    Code, CodeBuilder, CodeFlags, Const, DecodeErrorKind, ExcType, NoPrint, Opcode, Operand, VM, Value, decode,
};

fn raw_code(bytecode: Vec<u8>, consts: Vec<Const>) -> Code {
    Code {
        name: "<raw>".into(),
        bytecode,
        consts,
        names: Vec::new(),
        varnames: Vec::new(),
        cellvars: Vec::new(),
        freevars: Vec::new(),
        arg_count: 0,
        kwonly_arg_count: 0,
        flags: CodeFlags::empty(),
        stack_size: 4,
    }
}

fn run_raw(code: Code) -> Result<Value, pyframe::RaisedException> {
    let mut writer = NoPrint;
    VM::new(&mut writer).run_code(code, None, None)
}

#[test]
fn serialized_code_runs_the_same() {
    let code = build(fib_module(10));
    let bytes = code.dump().unwrap();
    let loaded = Code::load(&bytes).unwrap();
    assert_eq!(loaded, code);
    assert_eq!(run_raw(loaded).unwrap(), Value::Int(55));
}

#[test]
fn disassembly_lists_nested_code() {
    let listing = build(fib_module(3)).to_string();
    assert!(listing.starts_with("   0 LOAD_CONST"), "{listing}");
    assert!(listing.contains("CALL_FUNCTION"));
    assert!(listing.contains("\nDisassembly of fib:\n"));
    assert!(listing.contains("LOAD_FAST                  0 (n)"));
}

#[test]
fn truncated_instruction_is_not_catchable() {
    // SETUP_EXCEPT to offset 4, then a LOAD_CONST missing its second argument byte.
    // Were the handler to run it would hit opcode 0, a SystemError.
    let code = raw_code(vec![121, 1, 0, 100, 0], vec![Const::None]);
    let err = decode(&code, 3).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::UnexpectedEnd);

    let err = run_raw(code).unwrap_err();
    assert_eq!(err.kind(), ExcType::DecodeError);
    assert_eq!(err.origin().offset, 3);
}

#[test]
fn operand_index_out_of_range() {
    let code = raw_code(vec![100, 5, 0, 83], vec![Const::None]);
    let err = run_raw(code).unwrap_err();
    assert_eq!(err.kind(), ExcType::DecodeError);
    assert!(ExcType::DecodeError.is_subclass_of(ExcType::SystemError));
}

#[test]
fn extended_arg_widens_the_operand() {
    let consts = (0..300).map(Const::Int).collect();
    // EXTENDED_ARG 0 contributes nothing to the operand
    let mut code = raw_code(vec![145, 0, 0, 100, 0x2b, 0x01, 83], consts);
    let instr = decode(&code, 0).unwrap();
    assert_eq!(instr.offset, 0);
    assert_eq!(instr.next, 6);
    assert!(matches!(instr.operand, Operand::Const(Const::Int(299))));
    assert_eq!(run_raw(code.clone()).unwrap(), Value::Int(299));

    code.bytecode = vec![145, 1, 0, 100, 0, 0, 83];
    code.consts.truncate(1);
    assert_eq!(run_raw(code).unwrap_err().kind(), ExcType::DecodeError);
}

#[test]
fn unknown_opcodes_raise_system_error() {
    let err = run_raw(raw_code(vec![0], Vec::new())).unwrap_err();
    assert_eq!(err.kind(), ExcType::SystemError);
    assert_eq!(err.value().py_str(), "unknown opcode 0");

    let mut b = CodeBuilder::new("<module>");
    b.emit_load_const(Const::Int(1));
    b.emit_load_const(Const::Int(2));
    b.emit(Opcode::BinaryMatrixMultiply);
    b.emit(Opcode::ReturnValue);
    let err = run(b).unwrap_err();
    assert_eq!(err.kind(), ExcType::SystemError);
    assert_eq!(err.value().py_str(), "unknown opcode BINARY_MATRIX_MULTIPLY (16)");
    assert_eq!(err.origin().offset, 6);
}

#[test]
fn unknown_opcode_is_catchable() {
    // try: <opcode 0>
    // except: return "caught"
    let mut b = CodeBuilder::new("<module>");
    let handler = b.new_label();
    b.emit_jump(Opcode::SetupExcept, handler);
    b.emit(Opcode::Nop);
    b.emit(Opcode::ReturnValue);
    b.bind(handler);
    b.emit(Opcode::PopTop);
    b.emit(Opcode::PopExcept);
    b.emit_load_const("caught");
    b.emit(Opcode::ReturnValue);
    let mut code = build(b);
    code.bytecode[3] = 0;
    assert_eq!(run_raw(code).unwrap(), Value::from("caught"));
}
