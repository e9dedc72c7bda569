//! Runtime values and their operator algebra.
//!
//! Every value answers three questions: what operators it supports, what
//! fields it exposes, and what subscripts it accepts. Operator results are
//! three-valued ([`OpResult`]): a concrete value, a runtime error (division
//! by zero, missing array key), or *unsupported* — which becomes a semantic
//! diagnostic when the analyzer knows the types, or a runtime throw when it
//! does not.
//!
//! Indices are 1-based throughout: the first character of a string and the
//! first slot of a tuple are both index 1.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::ast::FuncBody;
use crate::builtins::Builtin;
use crate::types::{DType, FuncType};

/// A runtime value. Cloning is cheap: compound values share their payload
/// through `Rc`, which is also what gives arrays and tuples their aliasing
/// assignment semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(BigInt),
    Real(f64),
    Str(Rc<str>),
    Bool(bool),
    None,
    Array(Rc<RefCell<DArray>>),
    Tuple(Rc<RefCell<DTuple>>),
    Closure(Rc<Closure>),
    Builtin(Builtin),
}

/// A sparse ordered mapping from integer index to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DArray {
    pub entries: BTreeMap<BigInt, Value>,
}

impl DArray {
    /// Builds an array literal: elements get keys `1..=n`.
    #[must_use]
    pub fn from_values(values: Vec<Value>) -> Self {
        let entries = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (BigInt::from(i + 1), v))
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn max_key(&self) -> Option<&BigInt> {
        self.entries.keys().next_back()
    }

    /// Concatenation: the right side is re-keyed to follow the left's
    /// maximum key.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut entries = self.entries.clone();
        let base = self.max_key().cloned().unwrap_or_else(BigInt::zero);
        for (i, value) in other.entries.values().enumerate() {
            entries.insert(&base + BigInt::from(i + 1), value.clone());
        }
        Self { entries }
    }
}

/// An ordered sequence of values plus an injective name→slot map (0-based
/// slots internally; the language surface is 1-based).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DTuple {
    pub values: Vec<Value>,
    pub names: IndexMap<String, usize>,
}

impl DTuple {
    #[must_use]
    pub fn from_elements(elements: Vec<(Option<String>, Value)>) -> Self {
        let mut values = Vec::with_capacity(elements.len());
        let mut names = IndexMap::new();
        for (i, (name, value)) in elements.into_iter().enumerate() {
            if let Some(name) = name {
                names.insert(name, i);
            }
            values.push(value);
        }
        Self { values, names }
    }

    /// Concatenation; on a name collision the left side keeps the name.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut values = self.values.clone();
        let mut names = self.names.clone();
        let shift = self.values.len();
        for (name, &slot) in &other.names {
            if !names.contains_key(name) {
                names.insert(name.clone(), slot + shift);
            }
        }
        values.extend(other.values.iter().cloned());
        Self { values, names }
    }

    /// 0-based slot of a registered field name.
    #[must_use]
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// 0-based slot of a 1-based index, when in range.
    #[must_use]
    pub fn slot_of_index(&self, index: &BigInt) -> Option<usize> {
        if index < &BigInt::from(1) {
            return None;
        }
        let slot = index.to_usize()? - 1;
        (slot < self.values.len()).then_some(slot)
    }
}

/// A user function value: parameter names, a snapshot of the captured
/// externals taken at creation time, the body, and the static signature.
///
/// The captured snapshot sits behind a `RefCell` for one reason: when a
/// closure is bound to the very name it captures (`var f := func(n) => … f …`),
/// the binding statement patches the captured slot so the closure can reach
/// itself.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub params: Vec<String>,
    pub captured: RefCell<Vec<(String, Value)>>,
    pub body: Rc<FuncBody>,
    pub func_type: Rc<FuncType>,
}

/// The kind of a runtime error, for hosts that match on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ZeroDivision,
    TypeMismatch,
    NoSuchField,
    MissingKey,
    IndexOutOfRange,
    NotCallable,
    WrongArguments,
    StackOverflow,
    Redeclaration,
    UndefinedVariable,
}

/// A runtime error: a kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RuntimeError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    #[must_use]
    pub fn zero_division() -> Self {
        Self::new(ErrorKind::ZeroDivision, "Division by zero")
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// The three-valued result of an operator application.
#[derive(Debug)]
pub enum OpResult {
    Ok(Value),
    Err(RuntimeError),
    /// The operation does not exist for these operand kinds.
    Unsupported,
}

/// The result of a comparison between two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOutcome {
    Ordered(Ordering),
    /// Comparable kinds, but no order between these values (NaN, unequal
    /// arrays).
    Unordered,
    Unsupported,
}

/// Widens a big integer to a float, saturating to infinity.
#[must_use]
pub fn big_to_f64(value: &BigInt) -> f64 {
    value.to_f64().unwrap_or(if value.is_negative() {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    })
}

fn real_field(value: f64, name: &str) -> OpResult {
    let int_of = |v: f64| match BigInt::from_f64(v) {
        Some(i) => OpResult::Ok(Value::Int(i)),
        None => OpResult::Err(RuntimeError::new(
            ErrorKind::TypeMismatch,
            format!("Cannot take the {name} of {v}"),
        )),
    };
    match name {
        "Round" => int_of(value.round()),
        "Floor" => int_of(value.floor()),
        "Ceil" => int_of(value.ceil()),
        "Frac" => OpResult::Ok(Value::Real(value.fract())),
        _ => OpResult::Unsupported,
    }
}

/// Whether one comparison step of a relation chain holds.
///
/// Unordered operands (NaN against a number, unequal arrays) satisfy only
/// `/=`.
pub(crate) fn rel_holds(op: crate::ast::RelOp, cmp: CmpOutcome) -> bool {
    use crate::ast::RelOp;
    match cmp {
        CmpOutcome::Ordered(o) => match op {
            RelOp::Less => o == Ordering::Less,
            RelOp::LessEq => o != Ordering::Greater,
            RelOp::Greater => o == Ordering::Greater,
            RelOp::GreaterEq => o != Ordering::Less,
            RelOp::Equal => o == Ordering::Equal,
            RelOp::NotEqual => o != Ordering::Equal,
        },
        CmpOutcome::Unordered => op == RelOp::NotEqual,
        CmpOutcome::Unsupported => false,
    }
}

/// Structural equality for array comparison: scalars by value, compound
/// values by contents, functions by identity.
pub(crate) fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Real(x), Value::Real(y)) => x == y,
        (Value::Int(x), Value::Real(y)) | (Value::Real(y), Value::Int(x)) => big_to_f64(x) == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::None, Value::None) => true,
        (Value::Array(x), Value::Array(y)) => {
            Rc::ptr_eq(x, y) || {
                let (x, y) = (x.borrow(), y.borrow());
                x.entries.len() == y.entries.len()
                    && x.entries
                        .iter()
                        .zip(y.entries.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && values_eq(va, vb))
            }
        }
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y),
        (Value::Closure(x), Value::Closure(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        _ => false,
    }
}

impl Value {
    #[must_use]
    pub fn str(text: impl AsRef<str>) -> Self {
        Self::Str(Rc::from(text.as_ref()))
    }

    #[must_use]
    pub fn array(values: Vec<Self>) -> Self {
        Self::Array(Rc::new(RefCell::new(DArray::from_values(values))))
    }

    #[must_use]
    pub fn tuple(elements: Vec<(Option<String>, Self)>) -> Self {
        Self::Tuple(Rc::new(RefCell::new(DTuple::from_elements(elements))))
    }

    /// The static type of this value.
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Int,
            Self::Real(_) => DType::Real,
            Self::Str(_) => DType::Str,
            Self::Bool(_) => DType::Bool,
            Self::None => DType::None,
            Self::Array(_) => DType::Array,
            Self::Tuple(_) => DType::Tuple,
            Self::Closure(c) => DType::Func(Rc::clone(&c.func_type)),
            Self::Builtin(b) => DType::Func(Rc::new(b.signature())),
        }
    }

    pub fn binary_plus(&self, other: &Self) -> OpResult {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => OpResult::Ok(Self::Int(a + b)),
            (Self::Int(a), Self::Real(b)) => OpResult::Ok(Self::Real(big_to_f64(a) + b)),
            (Self::Real(a), Self::Int(b)) => OpResult::Ok(Self::Real(a + big_to_f64(b))),
            (Self::Real(a), Self::Real(b)) => OpResult::Ok(Self::Real(a + b)),
            (Self::Str(a), Self::Str(b)) => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                OpResult::Ok(Self::str(s))
            }
            (Self::Array(a), Self::Array(b)) => {
                let joined = a.borrow().concat(&b.borrow());
                OpResult::Ok(Self::Array(Rc::new(RefCell::new(joined))))
            }
            (Self::Tuple(a), Self::Tuple(b)) => {
                let joined = a.borrow().concat(&b.borrow());
                OpResult::Ok(Self::Tuple(Rc::new(RefCell::new(joined))))
            }
            _ => OpResult::Unsupported,
        }
    }

    pub fn binary_minus(&self, other: &Self) -> OpResult {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => OpResult::Ok(Self::Int(a - b)),
            (Self::Int(a), Self::Real(b)) => OpResult::Ok(Self::Real(big_to_f64(a) - b)),
            (Self::Real(a), Self::Int(b)) => OpResult::Ok(Self::Real(a - big_to_f64(b))),
            (Self::Real(a), Self::Real(b)) => OpResult::Ok(Self::Real(a - b)),
            _ => OpResult::Unsupported,
        }
    }

    pub fn binary_mul(&self, other: &Self) -> OpResult {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => OpResult::Ok(Self::Int(a * b)),
            (Self::Int(a), Self::Real(b)) => OpResult::Ok(Self::Real(big_to_f64(a) * b)),
            (Self::Real(a), Self::Int(b)) => OpResult::Ok(Self::Real(a * big_to_f64(b))),
            (Self::Real(a), Self::Real(b)) => OpResult::Ok(Self::Real(a * b)),
            _ => OpResult::Unsupported,
        }
    }

    /// Integer division by zero is a runtime error; real division follows
    /// IEEE semantics (±∞, NaN).
    pub fn binary_div(&self, other: &Self) -> OpResult {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => {
                if b.is_zero() {
                    OpResult::Err(RuntimeError::zero_division())
                } else {
                    OpResult::Ok(Self::Int(a / b))
                }
            }
            (Self::Int(a), Self::Real(b)) => OpResult::Ok(Self::Real(big_to_f64(a) / b)),
            (Self::Real(a), Self::Int(b)) => OpResult::Ok(Self::Real(a / big_to_f64(b))),
            (Self::Real(a), Self::Real(b)) => OpResult::Ok(Self::Real(a / b)),
            _ => OpResult::Unsupported,
        }
    }

    pub fn binary_and(&self, other: &Self) -> OpResult {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => OpResult::Ok(Self::Bool(*a && *b)),
            _ => OpResult::Unsupported,
        }
    }

    pub fn binary_or(&self, other: &Self) -> OpResult {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => OpResult::Ok(Self::Bool(*a || *b)),
            _ => OpResult::Unsupported,
        }
    }

    pub fn binary_xor(&self, other: &Self) -> OpResult {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => OpResult::Ok(Self::Bool(a != b)),
            _ => OpResult::Unsupported,
        }
    }

    /// Total or partial comparison; see [`CmpOutcome`].
    #[must_use]
    pub fn compare(&self, other: &Self) -> CmpOutcome {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => CmpOutcome::Ordered(a.cmp(b)),
            (Self::Int(a), Self::Real(b)) => match big_to_f64(a).partial_cmp(b) {
                Some(o) => CmpOutcome::Ordered(o),
                None => CmpOutcome::Unordered,
            },
            (Self::Real(a), Self::Int(b)) => match a.partial_cmp(&big_to_f64(b)) {
                Some(o) => CmpOutcome::Ordered(o),
                None => CmpOutcome::Unordered,
            },
            (Self::Real(a), Self::Real(b)) => match a.partial_cmp(b) {
                Some(o) => CmpOutcome::Ordered(o),
                None => CmpOutcome::Unordered,
            },
            (Self::Str(a), Self::Str(b)) => CmpOutcome::Ordered(a.cmp(b)),
            (Self::Array(_), Self::Array(_)) => {
                if values_eq(self, other) {
                    CmpOutcome::Ordered(Ordering::Equal)
                } else {
                    CmpOutcome::Unordered
                }
            }
            _ => CmpOutcome::Unsupported,
        }
    }

    pub fn unary_plus(&self) -> OpResult {
        match self {
            Self::Int(_) | Self::Real(_) => OpResult::Ok(self.clone()),
            _ => OpResult::Unsupported,
        }
    }

    pub fn unary_minus(&self) -> OpResult {
        match self {
            Self::Int(a) => OpResult::Ok(Self::Int(-a)),
            Self::Real(a) => OpResult::Ok(Self::Real(-a)),
            _ => OpResult::Unsupported,
        }
    }

    pub fn unary_not(&self) -> OpResult {
        match self {
            Self::Bool(a) => OpResult::Ok(Self::Bool(!a)),
            _ => OpResult::Unsupported,
        }
    }

    /// Named-field lookup: `value.name`.
    pub fn field(&self, name: &str) -> OpResult {
        match self {
            Self::Int(a) => match name {
                "Round" | "Floor" | "Ceil" => OpResult::Ok(Self::Int(a.clone())),
                "Frac" => OpResult::Ok(Self::Real(0.0)),
                _ => OpResult::Unsupported,
            },
            Self::Real(a) => real_field(*a, name),
            Self::Str(s) => match name {
                "Length" => OpResult::Ok(Self::Int(BigInt::from(s.chars().count()))),
                "Lower" => OpResult::Ok(Self::str(s.to_lowercase())),
                "Upper" => OpResult::Ok(Self::str(s.to_uppercase())),
                "Split" => OpResult::Ok(Self::Builtin(Builtin::StrSplit(Rc::clone(s)))),
                "SplitWS" => OpResult::Ok(Self::Builtin(Builtin::StrSplitWs(Rc::clone(s)))),
                "Join" => OpResult::Ok(Self::Builtin(Builtin::StrJoin(Rc::clone(s)))),
                "Slice" => OpResult::Ok(Self::Builtin(Builtin::StrSlice(Rc::clone(s)))),
                _ => OpResult::Unsupported,
            },
            Self::Tuple(t) => match t.borrow().slot_of(name) {
                Some(slot) => OpResult::Ok(t.borrow().values[slot].clone()),
                None => OpResult::Unsupported,
            },
            _ => OpResult::Unsupported,
        }
    }

    /// Indexed-field lookup: `value.(index)` or `value.2` (1-based).
    pub fn field_by_index(&self, index: &Self) -> OpResult {
        match (self, index) {
            (Self::Tuple(t), Self::Int(i)) => {
                let t = t.borrow();
                match t.slot_of_index(i) {
                    Some(slot) => OpResult::Ok(t.values[slot].clone()),
                    None => OpResult::Unsupported,
                }
            }
            _ => OpResult::Unsupported,
        }
    }

    /// Subscript lookup: `value[key]`.
    pub fn subscript(&self, key: &Self) -> OpResult {
        match (self, key) {
            (Self::Array(a), Self::Int(k)) => match a.borrow().entries.get(k) {
                Some(v) => OpResult::Ok(v.clone()),
                None => OpResult::Err(RuntimeError::new(
                    ErrorKind::MissingKey,
                    format!("The array has no element with key {k}"),
                )),
            },
            (Self::Str(s), Self::Int(k)) => {
                let ch = k
                    .to_usize()
                    .filter(|&i| i >= 1)
                    .and_then(|i| s.chars().nth(i - 1));
                match ch {
                    Some(c) => OpResult::Ok(Self::str(c.to_string())),
                    None => OpResult::Err(RuntimeError::new(
                        ErrorKind::IndexOutOfRange,
                        format!("String index {k} is out of range (1..{})", s.chars().count()),
                    )),
                }
            }
            _ => OpResult::Unsupported,
        }
    }

    /// Renders the value the way `print` writes it.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut guard = Vec::new();
        self.render_into(&mut out, &mut guard);
        out
    }

    fn render_into(&self, out: &mut String, guard: &mut Vec<*const ()>) {
        use std::fmt::Write as _;
        match self {
            Self::Int(a) => {
                let _ = write!(out, "{a}");
            }
            Self::Real(a) => {
                let mut buffer = ryu::Buffer::new();
                out.push_str(buffer.format(*a));
            }
            Self::Str(s) => out.push_str(s),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::None => out.push_str("none"),
            Self::Array(a) => {
                let ptr = Rc::as_ptr(a).cast::<()>();
                if guard.contains(&ptr) {
                    out.push_str("[ ... ]");
                    return;
                }
                guard.push(ptr);
                out.push_str("[ ");
                for (i, (key, value)) in a.borrow().entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "[{key}] ");
                    value.render_into(out, guard);
                }
                out.push_str(" ]");
                guard.pop();
            }
            Self::Tuple(t) => {
                let ptr = Rc::as_ptr(t).cast::<()>();
                if guard.contains(&ptr) {
                    out.push_str("{ ... }");
                    return;
                }
                guard.push(ptr);
                out.push_str("{\n");
                let t = t.borrow();
                for (slot, value) in t.values.iter().enumerate() {
                    let name = t.names.iter().find(|&(_, &s)| s == slot).map(|(n, _)| n.as_str());
                    match name {
                        Some(n) => {
                            let _ = write!(out, "    {n} := ");
                        }
                        None => {
                            let _ = write!(out, "    {} := ", slot + 1);
                        }
                    }
                    value.render_into(out, guard);
                    out.push('\n');
                }
                out.push('}');
                guard.pop();
            }
            Self::Closure(c) => {
                let _ = write!(out, "<closure: {}>", c.func_type);
            }
            Self::Builtin(b) => out.push_str(&b.render()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(BigInt::from(v))
    }

    #[test]
    fn numeric_mixing_promotes_to_real() {
        let OpResult::Ok(Value::Real(v)) = int(3).binary_plus(&Value::Real(0.5)) else {
            panic!("int + real is a real");
        };
        assert_eq!(v, 3.5);
        let OpResult::Ok(Value::Int(v)) = int(3).binary_mul(&int(4)) else {
            panic!("int * int is an int");
        };
        assert_eq!(v, BigInt::from(12));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        let OpResult::Err(e) = int(10).binary_div(&int(0)) else {
            panic!("int / 0 raises");
        };
        assert_eq!(e.kind, ErrorKind::ZeroDivision);
    }

    #[test]
    fn real_division_by_zero_is_infinite() {
        let OpResult::Ok(Value::Real(v)) = Value::Real(1.0).binary_div(&int(0)) else {
            panic!("real / 0 is supported");
        };
        assert!(v.is_infinite());
    }

    #[test]
    fn string_concat_and_ordering() {
        let OpResult::Ok(v) = Value::str("ab").binary_plus(&Value::str("cd")) else {
            panic!("string + string");
        };
        assert_eq!(v.render(), "abcd");
        assert_eq!(
            Value::str("abc").compare(&Value::str("abd")),
            CmpOutcome::Ordered(Ordering::Less)
        );
    }

    #[test]
    fn plus_on_mismatched_kinds_is_unsupported() {
        assert!(matches!(Value::str("a").binary_plus(&int(1)), OpResult::Unsupported));
        assert!(matches!(Value::Bool(true).binary_plus(&Value::Bool(false)), OpResult::Unsupported));
    }

    #[test]
    fn array_concat_rekeys_the_right_side() {
        let mut left = DArray::from_values(vec![int(10)]);
        left.entries.insert(BigInt::from(5), int(50));
        let right = DArray::from_values(vec![int(1), int(2)]);
        let joined = left.concat(&right);
        let keys: Vec<BigInt> = joined.entries.keys().cloned().collect();
        assert_eq!(keys, vec![BigInt::from(1), BigInt::from(5), BigInt::from(6), BigInt::from(7)]);
    }

    #[test]
    fn array_missing_key_is_a_runtime_error() {
        let arr = Value::array(vec![int(1)]);
        let OpResult::Err(e) = arr.subscript(&int(2)) else {
            panic!("missing key raises");
        };
        assert_eq!(e.kind, ErrorKind::MissingKey);
    }

    #[test]
    fn string_subscript_is_one_based() {
        let s = Value::str("abc");
        let OpResult::Ok(v) = s.subscript(&int(1)) else {
            panic!("in range");
        };
        assert_eq!(v.render(), "a");
        assert!(matches!(s.subscript(&int(0)), OpResult::Err(_)));
        assert!(matches!(s.subscript(&int(4)), OpResult::Err(_)));
    }

    #[test]
    fn tuple_fields_by_name_and_index() {
        let t = Value::tuple(vec![
            (Some("a".to_owned()), int(1)),
            (None, int(2)),
        ]);
        let OpResult::Ok(v) = t.field("a") else { panic!("named field") };
        assert_eq!(v.render(), "1");
        let OpResult::Ok(v) = t.field_by_index(&int(2)) else {
            panic!("1-based slot")
        };
        assert_eq!(v.render(), "2");
        assert!(matches!(t.field("b"), OpResult::Unsupported));
        assert!(matches!(t.field_by_index(&int(3)), OpResult::Unsupported));
    }

    #[test]
    fn tuple_concat_keeps_left_names_on_collision() {
        let a = DTuple::from_elements(vec![(Some("x".to_owned()), int(1))]);
        let b = DTuple::from_elements(vec![(Some("x".to_owned()), int(2)), (None, int(3))]);
        let joined = a.concat(&b);
        assert_eq!(joined.values.len(), 3);
        assert_eq!(joined.slot_of("x"), Some(0));
    }

    #[test]
    fn render_formats() {
        assert_eq!(int(42).render(), "42");
        assert_eq!(Value::Bool(true).render(), "true");
        assert_eq!(Value::None.render(), "none");
        assert_eq!(Value::Real(0.5).render(), "0.5");
        let arr = Value::array(vec![Value::str("a"), Value::str("b")]);
        assert_eq!(arr.render(), "[ [1] a, [2] b ]");
        let t = Value::tuple(vec![(Some("e".to_owned()), int(80)), (None, int(98))]);
        assert_eq!(t.render(), "{\n    e := 80\n    2 := 98\n}");
    }

    #[test]
    fn render_guards_against_cycles() {
        let arr = Value::array(vec![int(1)]);
        if let Value::Array(rc) = &arr {
            rc.borrow_mut().entries.insert(BigInt::from(2), arr.clone());
        }
        assert_eq!(arr.render(), "[ [1] 1, [2] [ ... ] ]");
    }

    #[test]
    fn int_and_real_fields() {
        let OpResult::Ok(v) = int(7).field("Floor") else { panic!() };
        assert_eq!(v.render(), "7");
        let OpResult::Ok(v) = Value::Real(1.75).field("Frac") else { panic!() };
        assert_eq!(v.render(), "0.75");
        let OpResult::Ok(v) = Value::Real(1.75).field("Ceil") else { panic!() };
        assert_eq!(v.render(), "2");
    }
}
