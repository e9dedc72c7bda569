//! Built-in functions.
//!
//! A closed enum: the `input` reader plus the four string methods, each bound
//! to its receiver string. All of them carry a static signature; the pure
//! ones can be invoked by the analyzer during constant folding.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::types::{DType, FuncType};
use crate::value::{ErrorKind, OpResult, RuntimeError, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Builtin {
    /// `input()` — reads one line from the program's input stream.
    Input,
    /// `s.Split(sep)` — pieces of the receiver around the separator.
    StrSplit(Rc<str>),
    /// `s.SplitWS()` — pieces of the receiver around whitespace runs.
    StrSplitWs(Rc<str>),
    /// `sep.Join(array)` — array of strings joined with the receiver.
    StrJoin(Rc<str>),
    /// `s.Slice(start, stop, step)` — see [`slice`] for the index rules.
    StrSlice(Rc<str>),
}

impl Builtin {
    /// The static signature of this built-in.
    #[must_use]
    pub fn signature(&self) -> FuncType {
        match self {
            Self::Input => FuncType::new(false, vec![], DType::Str),
            Self::StrSplit(_) => FuncType::new(true, vec![DType::Str], DType::Array),
            Self::StrSplitWs(_) => FuncType::new(true, vec![], DType::Array),
            Self::StrJoin(_) => FuncType::new(true, vec![DType::Array], DType::Str),
            // Slice stays impure: a zero step raises, so a call is never
            // folded even when every argument is known.
            Self::StrSlice(_) => FuncType::new(false, vec![DType::Int, DType::Int, DType::Int], DType::Str),
        }
    }

    /// How `print` renders this value.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Input => "<built-in function input() -> string>".to_owned(),
            Self::StrSplit(_) => "<built-in function string.Split(sep: string) -> []>".to_owned(),
            Self::StrSplitWs(_) => "<built-in function string.SplitWS() -> []>".to_owned(),
            Self::StrJoin(_) => "<built-in function string.Join(strings: []) -> string>".to_owned(),
            Self::StrSlice(_) => {
                "<built-in function string.Slice(start: int, stop: int, step: int) -> string>".to_owned()
            }
        }
    }

    /// Invokes a context-free built-in.
    ///
    /// # Panics
    /// `input` needs the runtime context and is dispatched by the executor;
    /// routing it here is a host-side bug.
    pub fn call(&self, args: &[Value]) -> OpResult {
        match self {
            Self::Input => panic!("the input built-in is dispatched by the executor"),
            Self::StrSplit(recv) => {
                let [Value::Str(sep)] = args else {
                    return OpResult::Err(RuntimeError::new(
                        ErrorKind::WrongArguments,
                        "The string.Split function accepts exactly 1 string argument",
                    ));
                };
                if sep.is_empty() {
                    return OpResult::Err(RuntimeError::new(
                        ErrorKind::WrongArguments,
                        "The string.Split separator cannot be empty",
                    ));
                }
                let pieces = recv.split(sep.as_ref()).map(Value::str).collect();
                OpResult::Ok(Value::array(pieces))
            }
            Self::StrSplitWs(recv) => {
                if !args.is_empty() {
                    return OpResult::Err(RuntimeError::new(
                        ErrorKind::WrongArguments,
                        "The string.SplitWS function accepts no arguments",
                    ));
                }
                let pieces = recv.split_whitespace().map(Value::str).collect();
                OpResult::Ok(Value::array(pieces))
            }
            Self::StrJoin(recv) => {
                let [Value::Array(arr)] = args else {
                    return OpResult::Err(RuntimeError::new(
                        ErrorKind::WrongArguments,
                        "The string.Join function accepts exactly 1 array argument",
                    ));
                };
                let arr = arr.borrow();
                let mut pieces = Vec::with_capacity(arr.entries.len());
                for value in arr.entries.values() {
                    let Value::Str(s) = value else {
                        return OpResult::Err(RuntimeError::new(
                            ErrorKind::WrongArguments,
                            "The string.Join function received an array with non-string values",
                        ));
                    };
                    pieces.push(s.clone());
                }
                let mut joined = String::new();
                for (i, piece) in pieces.iter().enumerate() {
                    if i > 0 {
                        joined.push_str(recv);
                    }
                    joined.push_str(piece);
                }
                OpResult::Ok(Value::str(joined))
            }
            Self::StrSlice(recv) => {
                let [Value::Int(start), Value::Int(stop), Value::Int(step)] = args else {
                    return OpResult::Err(RuntimeError::new(
                        ErrorKind::WrongArguments,
                        "The string.Slice function requires 3 arguments that are integers",
                    ));
                };
                if step.is_zero() {
                    return OpResult::Err(RuntimeError::new(
                        ErrorKind::WrongArguments,
                        "The string.Slice function's third argument (step) cannot be 0",
                    ));
                }
                OpResult::Ok(Value::str(slice(recv, start, stop, step)))
            }
        }
    }
}

/// Slicing rules: indices are 1-based and negative indices do NOT count from
/// the end; `stop` is exclusive; `step` is non-zero. Iteration runs
/// `i = start, start+step, …` while `(step>0 ∧ i<stop) ∨ (step<0 ∧ i>stop)`,
/// emitting the character when `1 ≤ i ≤ len` and breaking early once `i`
/// leaves `[1, len]` on the side it cannot come back from.
///
/// `"123456789".Slice(-7, 9, 4)` is `"15"`.
fn slice(s: &str, start: &BigInt, stop: &BigInt, step: &BigInt) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = BigInt::from(chars.len());
    let one = BigInt::from(1);
    let ascending = step.is_positive();
    let mut out = String::new();
    let mut i = start.clone();
    loop {
        let in_window = if ascending { &i < stop } else { &i > stop };
        if !in_window {
            break;
        }
        if i >= one && i <= len {
            out.push(chars[i.to_usize().expect("index within string length") - 1]);
        } else if (ascending && i > len) || (!ascending && i < one) {
            break;
        }
        i += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(BigInt::from(v))
    }

    fn expect_str(r: OpResult) -> String {
        match r {
            OpResult::Ok(v) => v.render(),
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn slice_skips_out_of_range_prefix() {
        assert_eq!(slice("123456789", &BigInt::from(-7), &BigInt::from(9), &BigInt::from(4)), "15");
    }

    #[test]
    fn slice_descending() {
        assert_eq!(slice("abcdef", &BigInt::from(5), &BigInt::from(1), &BigInt::from(-2)), "ec");
    }

    #[test]
    fn slice_stops_past_the_end() {
        assert_eq!(slice("abc", &BigInt::from(1), &BigInt::from(100), &BigInt::from(1)), "abc");
    }

    #[test]
    fn slice_zero_step_is_an_error() {
        let b = Builtin::StrSlice(Rc::from("abc"));
        assert!(matches!(b.call(&[int(1), int(2), int(0)]), OpResult::Err(_)));
    }

    #[test]
    fn split_and_join_round() {
        let split = Builtin::StrSplit(Rc::from("a,b,,c"));
        assert_eq!(
            expect_str(split.call(&[Value::str(",")])),
            "[ [1] a, [2] b, [3] , [4] c ]"
        );
        let join = Builtin::StrJoin(Rc::from("-"));
        let arr = Value::array(vec![Value::str("x"), Value::str("y")]);
        assert_eq!(expect_str(join.call(&[arr])), "x-y");
    }

    #[test]
    fn split_ws_collapses_runs() {
        let b = Builtin::StrSplitWs(Rc::from("  one\ttwo \n three "));
        assert_eq!(expect_str(b.call(&[])), "[ [1] one, [2] two, [3] three ]");
    }

    #[test]
    fn join_rejects_non_string_elements() {
        let join = Builtin::StrJoin(Rc::from(","));
        let arr = Value::array(vec![int(1)]);
        assert!(matches!(join.call(&[arr]), OpResult::Err(_)));
    }

    #[test]
    fn signatures_mark_purity() {
        assert!(Builtin::StrSplit(Rc::from("")).signature().pure);
        assert!(!Builtin::StrSlice(Rc::from("")).signature().pure);
        assert!(!Builtin::Input.signature().pure);
    }
}
