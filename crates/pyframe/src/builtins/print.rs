//! Implementation of the print() builtin function.

use crate::{
    args::ArgValues,
    exception::{ExcType, RunResult},
    io::PrintWriter,
    value::Value,
};

/// Implementation of the print() builtin function.
///
/// Supports the following keyword arguments:
/// - `sep`: separator between values (default: " ")
/// - `end`: string appended after the last value (default: "\n")
/// - `flush`: when true, flushes the writer after the output
pub fn builtin_print(args: ArgValues, print: &mut impl PrintWriter) -> RunResult<Value> {
    let ArgValues { positional, keywords } = args;

    let mut sep: Option<String> = None;
    let mut end: Option<String> = None;
    let mut flush = false;
    for (key, value) in keywords {
        match &*key {
            "sep" => sep = extract_string_kwarg(&value, "sep")?,
            "end" => end = extract_string_kwarg(&value, "end")?,
            "flush" => flush = value.py_bool(),
            other => {
                return Err(ExcType::type_error(format!(
                    "'{other}' is an invalid keyword argument for print()"
                )));
            }
        }
    }

    for (i, value) in positional.iter().enumerate() {
        if i > 0 {
            match &sep {
                Some(sep) => print.write_str(sep),
                None => print.write_char(' '),
            }
        }
        print.write_str(&value.py_str());
    }
    match &end {
        Some(end) => print.write_str(end),
        None => print.write_char('\n'),
    }
    if flush {
        print.flush();
    }
    Ok(Value::None)
}

/// The kwarg can be None (meaning the default) or a string.
fn extract_string_kwarg(value: &Value, name: &str) -> RunResult<Option<String>> {
    match value {
        Value::None => Ok(None),
        Value::Str(s) => Ok(Some(s.to_string())),
        other => Err(ExcType::type_error(format!(
            "{name} must be None or a string, not {}",
            other.py_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectStringPrint;

    #[test]
    fn separators() {
        let mut out = CollectStringPrint::new();
        let args = ArgValues::new(
            vec![Value::Int(1), Value::from("a"), Value::None],
            vec![("sep".into(), Value::from("-")), ("end".into(), Value::from("!"))],
        );
        builtin_print(args, &mut out).unwrap();
        builtin_print(ArgValues::positional(vec![Value::Float(0.5)]), &mut out).unwrap();
        assert_eq!(out.output(), "1-a-None!0.5\n");

        let bad = ArgValues::new(vec![], vec![("sep".into(), Value::Int(1))]);
        assert!(builtin_print(bad, &mut out).is_err());
    }

    #[derive(Default)]
    struct Flushes {
        text: String,
        flushed_at: Vec<usize>,
    }

    impl PrintWriter for Flushes {
        fn write_str(&mut self, text: &str) {
            self.text.push_str(text);
        }

        fn flush(&mut self) {
            self.flushed_at.push(self.text.len());
        }
    }

    #[test]
    fn flush_after_the_terminator() {
        let mut out = Flushes::default();
        let args = ArgValues::new(vec![Value::from("ab")], vec![("flush".into(), Value::Bool(true))]);
        builtin_print(args, &mut out).unwrap();
        builtin_print(ArgValues::positional(vec![Value::Int(1), Value::Int(2)]), &mut out).unwrap();
        assert_eq!(out.text, "ab\n1 2\n");
        assert_eq!(out.flushed_at, vec![3]);
    }
}
