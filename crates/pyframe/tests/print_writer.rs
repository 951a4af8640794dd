mod common;

use common::{build, define};
use pyframe::{CodeBuilder, CollectStringPrint, Const, Opcode, VM};

/// Emits `print(<args>)` as a statement. `keywords` are `(name, value)` string pairs.
fn emit_print(b: &mut CodeBuilder, args: &[Const], keywords: &[(&str, &str)]) {
    b.emit_name(Opcode::LoadName, "print");
    for arg in args {
        b.emit_load_const(arg.clone());
    }
    for (name, value) in keywords {
        b.emit_load_const(*name);
        b.emit_load_const(*value);
    }
    let positional = u8::try_from(args.len()).unwrap();
    let keyword = u8::try_from(keywords.len()).unwrap();
    b.emit_call(positional, keyword);
    b.emit(Opcode::PopTop);
}

fn output_of(mut b: CodeBuilder) -> String {
    b.emit_load_const(Const::None);
    b.emit(Opcode::ReturnValue);
    let mut writer = CollectStringPrint::new();
    VM::new(&mut writer).run_code(build(b), None, None).unwrap();
    writer.into_output()
}

#[test]
fn print_single_string() {
    let mut b = CodeBuilder::new("<module>");
    emit_print(&mut b, &[Const::from("hello")], &[]);
    assert_eq!(output_of(b), "hello\n");
}

#[test]
fn print_multiple_statements() {
    let mut b = CodeBuilder::new("<module>");
    for word in ["one", "two", "three"] {
        emit_print(&mut b, &[Const::from(word)], &[]);
    }
    assert_eq!(output_of(b), "one\ntwo\nthree\n");
}

#[test]
fn print_empty() {
    let mut b = CodeBuilder::new("<module>");
    emit_print(&mut b, &[], &[]);
    assert_eq!(output_of(b), "\n");
}

#[test]
fn print_mixed_values() {
    let mut b = CodeBuilder::new("<module>");
    emit_print(
        &mut b,
        &[Const::Int(1), Const::Float(2.5), Const::None, Const::Bool(true), Const::from("s")],
        &[],
    );
    assert_eq!(output_of(b), "1 2.5 None True s\n");
}

#[test]
fn print_sep_and_end() {
    let mut b = CodeBuilder::new("<module>");
    emit_print(&mut b, &[Const::from("a"), Const::Int(1)], &[("sep", "-"), ("end", "!")]);
    emit_print(&mut b, &[Const::from("b")], &[("end", "")]);
    assert_eq!(output_of(b), "a-1!b");
}

#[test]
fn print_from_a_nested_frame() {
    // def shout(): print("inner")
    let mut shout = CodeBuilder::new("shout");
    emit_print(&mut shout, &[Const::from("inner")], &[]);
    shout.emit_load_const(Const::None);
    shout.emit(Opcode::ReturnValue);
    // print() inside a function looks `print` up by name, which falls through to builtins
    let mut b = CodeBuilder::new("<module>");
    define(&mut b, "shout", build(shout));
    emit_print(&mut b, &[Const::from("outer")], &[]);
    b.emit_name(Opcode::LoadName, "shout");
    b.emit_call(0, 0);
    b.emit(Opcode::PopTop);
    assert_eq!(output_of(b), "outer\ninner\n");
}
