//! Unary and binary operator tables.
//!
//! Opcodes without a dedicated handler are routed here by [`Opcode::operator`]. Each
//! table entry returns `Ok(None)` when it does not support the operand types, and the
//! caller turns that into CPython's "unsupported operand type(s)" `TypeError`.
//!
//! [`Opcode::operator`]: crate::bytecode::Opcode::operator

use num_integer::Integer;

use super::VM;
use crate::{
    bytecode::{BinaryOp, UnaryOp},
    exception::{ExcType, RunResult},
    for_iterator::collect_iterable,
    io::PrintWriter,
    resource::check_sequence_size,
    value::Value,
};

type UnaryFn = fn(&Value) -> RunResult<Option<Value>>;
type BinaryFn = fn(&Value, &Value) -> RunResult<Option<Value>>;

fn unary_fn(op: UnaryOp) -> UnaryFn {
    match op {
        UnaryOp::Positive => positive,
        UnaryOp::Negative => negative,
        UnaryOp::Not => not,
        UnaryOp::Invert => invert,
    }
}

/// The binary operator table. `@` decodes but has no entry.
fn binary_fn(op: BinaryOp) -> Option<BinaryFn> {
    let f: BinaryFn = match op {
        BinaryOp::Power => power,
        BinaryOp::Multiply => multiply,
        BinaryOp::MatrixMultiply => return None,
        BinaryOp::Modulo => modulo,
        BinaryOp::Add => add,
        BinaryOp::Subtract => subtract,
        BinaryOp::Subscr => subscr,
        BinaryOp::FloorDivide => floor_divide,
        BinaryOp::TrueDivide => true_divide,
        BinaryOp::Lshift => lshift,
        BinaryOp::Rshift => rshift,
        BinaryOp::And => bit_and,
        BinaryOp::Xor => bit_xor,
        BinaryOp::Or => bit_or,
    };
    Some(f)
}

/// Whether an operator has a table entry at all.
pub(super) fn has_binary_entry(op: BinaryOp) -> bool {
    binary_fn(op).is_some()
}

/// Applies a binary operator to two values.
///
/// Also used by builtins such as `sum()`.
pub(crate) fn binary_op(op: BinaryOp, lhs: &Value, rhs: &Value) -> RunResult<Value> {
    match binary_fn(op) {
        Some(f) => f(lhs, rhs)?,
        None => None,
    }
    .ok_or_else(|| ExcType::binary_type_error(op.symbol(), lhs.py_type(), rhs.py_type()))
}

/// In-place form of `op`. Lists extend in place under `+=`; everything else computes a new
/// value exactly like the binary operator.
fn inplace_op(op: BinaryOp, lhs: &Value, rhs: &Value) -> RunResult<Value> {
    if let (BinaryOp::Add, Value::List(list)) = (op, lhs) {
        // collect first: `l += l` must not borrow the list twice
        let items = collect_iterable(rhs)?;
        let mut list = list.borrow_mut();
        check_sequence_size(list.len().saturating_add(items.len()), size_of::<Value>())?;
        list.extend(items);
        return Ok(lhs.clone());
    }
    match binary_fn(op) {
        Some(f) => f(lhs, rhs)?,
        None => None,
    }
    .ok_or_else(|| {
        let symbol = match op {
            BinaryOp::Power => "**=".to_owned(),
            other => format!("{}=", other.symbol()),
        };
        ExcType::binary_type_error(&symbol, lhs.py_type(), rhs.py_type())
    })
}

impl<P: PrintWriter> VM<'_, P> {
    pub(super) fn unary(&mut self, op: UnaryOp) -> RunResult<()> {
        let value = self.pop()?;
        let result = unary_fn(op)(&value)?.ok_or_else(|| ExcType::unary_type_error(op.symbol(), value.py_type()))?;
        self.push(result)
    }

    pub(super) fn binary(&mut self, op: BinaryOp) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = binary_op(op, &lhs, &rhs)?;
        self.push(result)
    }

    pub(super) fn inplace(&mut self, op: BinaryOp) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = inplace_op(op, &lhs, &rhs)?;
        self.push(result)
    }
}

/// Operands of an arithmetic operator after numeric promotion.
enum Numbers {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numbers(lhs: &Value, rhs: &Value) -> Option<Numbers> {
    if let (Some(a), Some(b)) = (lhs.as_int_like(), rhs.as_int_like()) {
        return Some(Numbers::Ints(a, b));
    }
    match (lhs, rhs) {
        (Value::Float(_), _) | (_, Value::Float(_)) => Some(Numbers::Floats(lhs.as_f64()?, rhs.as_f64()?)),
        _ => None,
    }
}

fn checked(result: Option<i64>) -> RunResult<Option<Value>> {
    result.map(|i| Some(Value::Int(i))).ok_or_else(ExcType::overflow_int)
}

fn positive(value: &Value) -> RunResult<Option<Value>> {
    Ok(match value {
        Value::Float(f) => Some(Value::Float(*f)),
        other => other.as_int_like().map(Value::Int),
    })
}

fn negative(value: &Value) -> RunResult<Option<Value>> {
    match value {
        Value::Float(f) => Ok(Some(Value::Float(-f))),
        other => match other.as_int_like() {
            Some(i) => checked(i.checked_neg()),
            None => Ok(None),
        },
    }
}

fn not(value: &Value) -> RunResult<Option<Value>> {
    Ok(Some(Value::Bool(!value.py_bool())))
}

fn invert(value: &Value) -> RunResult<Option<Value>> {
    Ok(value.as_int_like().map(|i| Value::Int(!i)))
}

fn add(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    match numbers(lhs, rhs) {
        Some(Numbers::Ints(a, b)) => return checked(a.checked_add(b)),
        Some(Numbers::Floats(a, b)) => return Ok(Some(Value::Float(a + b))),
        None => {}
    }
    Ok(match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(Value::new_str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Some(Value::new_list(items))
        }
        (Value::Tuple(a), Value::Tuple(b)) => Some(Value::new_tuple(a.iter().chain(b.iter()).cloned().collect())),
        _ => None,
    })
}

fn subtract(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    match numbers(lhs, rhs) {
        Some(Numbers::Ints(a, b)) => checked(a.checked_sub(b)),
        Some(Numbers::Floats(a, b)) => Ok(Some(Value::Float(a - b))),
        None => Ok(None),
    }
}

fn multiply(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    match numbers(lhs, rhs) {
        Some(Numbers::Ints(a, b)) => return checked(a.checked_mul(b)),
        Some(Numbers::Floats(a, b)) => return Ok(Some(Value::Float(a * b))),
        None => {}
    }
    let (seq, count) = match (lhs, rhs) {
        (seq, count) if count.as_int_like().is_some() => (seq, count),
        (count, seq) if count.as_int_like().is_some() => (seq, count),
        _ => return Ok(None),
    };
    let count = usize::try_from(count.as_int_like().unwrap_or(0)).unwrap_or(0);
    Ok(match seq {
        Value::Str(s) => {
            let total = s.len().checked_mul(count).ok_or_else(|| ExcType::memory_error(usize::MAX))?;
            check_sequence_size(total, 1)?;
            Some(Value::new_str(s.repeat(count)))
        }
        Value::List(items) => Some(Value::new_list(repeat(&items.borrow(), count)?)),
        Value::Tuple(items) => Some(Value::new_tuple(repeat(items, count)?)),
        _ => None,
    })
}

fn repeat(items: &[Value], count: usize) -> RunResult<Vec<Value>> {
    let total = items.len().checked_mul(count).ok_or_else(|| ExcType::memory_error(usize::MAX))?;
    check_sequence_size(total, size_of::<Value>())?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    Ok(out)
}

fn true_divide(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    if numbers(lhs, rhs).is_none() {
        return Ok(None);
    }
    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Ok(None);
    };
    if b == 0.0 {
        return Err(ExcType::zero_division("division by zero"));
    }
    Ok(Some(Value::Float(a / b)))
}

/// Python's float `divmod`: the remainder takes the sign of the divisor.
fn float_divmod(a: f64, b: f64) -> (f64, f64) {
    let mut rem = a % b;
    let mut div = (a - rem) / b;
    if rem == 0.0 {
        rem = 0.0_f64.copysign(b);
    } else if (b < 0.0) != (rem < 0.0) {
        rem += b;
        div -= 1.0;
    }
    let floor = if div == 0.0 {
        0.0_f64.copysign(a / b)
    } else {
        let floor = div.floor();
        if div - floor > 0.5 { floor + 1.0 } else { floor }
    };
    (floor, rem)
}

fn floor_divide(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    match numbers(lhs, rhs) {
        Some(Numbers::Ints(_, 0)) => Err(ExcType::zero_division("integer division or modulo by zero")),
        Some(Numbers::Ints(a, b)) => {
            if a == i64::MIN && b == -1 {
                return Err(ExcType::overflow_int());
            }
            Ok(Some(Value::Int(Integer::div_floor(&a, &b))))
        }
        Some(Numbers::Floats(_, b)) if b == 0.0 => Err(ExcType::zero_division("float floor division by zero")),
        Some(Numbers::Floats(a, b)) => Ok(Some(Value::Float(float_divmod(a, b).0))),
        None => Ok(None),
    }
}

fn modulo(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    match numbers(lhs, rhs) {
        Some(Numbers::Ints(_, 0)) => Err(ExcType::zero_division("integer modulo by zero")),
        Some(Numbers::Ints(_, -1)) => Ok(Some(Value::Int(0))),
        Some(Numbers::Ints(a, b)) => Ok(Some(Value::Int(Integer::mod_floor(&a, &b)))),
        Some(Numbers::Floats(_, b)) if b == 0.0 => Err(ExcType::zero_division("float modulo")),
        Some(Numbers::Floats(a, b)) => Ok(Some(Value::Float(float_divmod(a, b).1))),
        None => Ok(None),
    }
}

fn power(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    match numbers(lhs, rhs) {
        Some(Numbers::Ints(0, b)) if b < 0 => Err(ExcType::zero_negative_power()),
        Some(Numbers::Ints(_, b)) if b < 0 => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Ok(None);
            };
            Ok(Some(Value::Float(a.powf(b))))
        }
        Some(Numbers::Ints(a, b)) => match u32::try_from(b) {
            Ok(exp) => checked(a.checked_pow(exp)),
            Err(_) => match a {
                0 | 1 => Ok(Some(Value::Int(a))),
                -1 => Ok(Some(Value::Int(if b.is_even() { 1 } else { -1 }))),
                _ => Err(ExcType::overflow_int()),
            },
        },
        Some(Numbers::Floats(a, b)) if a == 0.0 && b < 0.0 => Err(ExcType::zero_negative_power()),
        Some(Numbers::Floats(a, b)) => Ok(Some(Value::Float(a.powf(b)))),
        None => Ok(None),
    }
}

fn subscr(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    lhs.get_item(rhs).map(Some)
}

fn shift_operands(lhs: &Value, rhs: &Value) -> RunResult<Option<(i64, u32)>> {
    let (Some(a), Some(b)) = (lhs.as_int_like(), rhs.as_int_like()) else {
        return Ok(None);
    };
    if b < 0 {
        return Err(ExcType::value_error_negative_shift_count());
    }
    Ok(Some((a, u32::try_from(b).unwrap_or(u32::MAX))))
}

fn lshift(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    let Some((a, b)) = shift_operands(lhs, rhs)? else {
        return Ok(None);
    };
    if a == 0 {
        return Ok(Some(Value::Int(0)));
    }
    if b >= 64 {
        return Err(ExcType::overflow_int());
    }
    let wide = i128::from(a) << b;
    checked(i64::try_from(wide).ok())
}

fn rshift(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    let Some((a, b)) = shift_operands(lhs, rhs)? else {
        return Ok(None);
    };
    Ok(Some(Value::Int(if b >= 64 { if a < 0 { -1 } else { 0 } } else { a >> b })))
}

fn bitwise(lhs: &Value, rhs: &Value, bools: fn(bool, bool) -> bool, ints: fn(i64, i64) -> i64) -> Option<Value> {
    if let (Value::Bool(a), Value::Bool(b)) = (lhs, rhs) {
        return Some(Value::Bool(bools(*a, *b)));
    }
    Some(Value::Int(ints(lhs.as_int_like()?, rhs.as_int_like()?)))
}

fn bit_and(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    Ok(bitwise(lhs, rhs, |a, b| a & b, |a, b| a & b))
}

fn bit_or(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    Ok(bitwise(lhs, rhs, |a, b| a | b, |a, b| a | b))
}

fn bit_xor(lhs: &Value, rhs: &Value) -> RunResult<Option<Value>> {
    Ok(bitwise(lhs, rhs, |a, b| a ^ b, |a, b| a ^ b))
}
