//! The static type lattice used by the semantic analyzer.
//!
//! Types mirror the runtime value kinds plus the lattice top [`DType::Unknown`].
//! They support the same operator algebra as values, but results are types
//! (`Option<DType>`, where `None` means the operation is not supported —
//! types never raise). `Unknown` is absorbing: it accepts every operation and
//! yields `Unknown`, at the price of making the surrounding computation
//! non-foldable.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A static type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DType {
    Int,
    Real,
    Str,
    Bool,
    None,
    Array,
    Tuple,
    Func(Rc<FuncType>),
    /// The lattice top: no finer static information is available.
    Unknown,
}

/// The static signature of a function value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncType {
    /// Pure functions can be invoked at analysis time.
    pub pure: bool,
    /// Parameter types, when the arity is statically known.
    pub params: Option<Vec<DType>>,
    pub ret: DType,
}

impl FuncType {
    #[must_use]
    pub fn new(pure: bool, params: Vec<DType>, ret: DType) -> Self {
        Self { pure, params: Some(params), ret }
    }

    /// A signature with a known arity whose parameter types are all unknown.
    #[must_use]
    pub fn with_arity(pure: bool, arity: usize, ret: DType) -> Self {
        Self {
            pure,
            params: Some(vec![DType::Unknown; arity]),
            ret,
        }
    }

    /// The completely opaque signature: impure, unknown arity, unknown result.
    #[must_use]
    pub fn opaque() -> Self {
        Self { pure: false, params: None, ret: DType::Unknown }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pure {
            write!(f, "(pure)function (")?;
        } else {
            write!(f, "function (")?;
        }
        match &self.params {
            Some(params) => {
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
            }
            None => write!(f, "...")?,
        }
        write!(f, ") -> {}", self.ret)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Real => write!(f, "real"),
            Self::Str => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::None => write!(f, "none"),
            Self::Array => write!(f, "array"),
            Self::Tuple => write!(f, "tuple"),
            Self::Func(t) => write!(f, "{t}"),
            Self::Unknown => write!(f, "object?"),
        }
    }
}

fn numeric_arith(a: &DType, b: &DType) -> Option<DType> {
    let a_int = match a {
        DType::Int => true,
        DType::Real => false,
        _ => return None,
    };
    let b_int = match b {
        DType::Int => true,
        DType::Real => false,
        _ => return None,
    };
    Some(if a_int && b_int { DType::Int } else { DType::Real })
}

fn is_numeric(t: &DType) -> bool {
    matches!(t, DType::Int | DType::Real)
}

impl DType {
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Arrays and tuples are mutable; their values are never collapsed into
    /// shared literal nodes.
    #[must_use]
    pub fn mutable(&self) -> bool {
        matches!(self, Self::Array | Self::Tuple)
    }

    /// Kind equality: function types match regardless of signature.
    #[must_use]
    pub fn type_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Func(_), Self::Func(_)) => true,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    /// Like [`DType::type_eq`], but function signatures must match too.
    #[must_use]
    pub fn strict_type_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Func(a), Self::Func(b)) => a == b,
            _ => self.type_eq(other),
        }
    }

    /// The lattice meet: the smallest common supertype of two types.
    ///
    /// Identical types collapse to themselves, a numeric mix collapses to
    /// `Real`, function types merge pointwise, and any other disagreement
    /// collapses to `Unknown`.
    #[must_use]
    pub fn generalize(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Func(a), Self::Func(b)) => {
                let params = match (&a.params, &b.params) {
                    (Some(pa), Some(pb)) if pa.len() == pb.len() => {
                        Some(pa.iter().zip(pb).map(|(x, y)| x.generalize(y)).collect())
                    }
                    _ => None,
                };
                Self::Func(Rc::new(FuncType {
                    pure: a.pure && b.pure,
                    params,
                    ret: a.ret.generalize(&b.ret),
                }))
            }
            _ if self.strict_type_eq(other) => self.clone(),
            _ if is_numeric(self) && is_numeric(other) => Self::Real,
            _ => Self::Unknown,
        }
    }

    pub fn binary_plus(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Some(Self::Unknown),
            (Self::Str, Self::Str) => Some(Self::Str),
            (Self::Array, Self::Array) => Some(Self::Array),
            (Self::Tuple, Self::Tuple) => Some(Self::Tuple),
            _ => numeric_arith(self, other),
        }
    }

    pub fn binary_minus(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Some(Self::Unknown),
            _ => numeric_arith(self, other),
        }
    }

    pub fn binary_mul(&self, other: &Self) -> Option<Self> {
        self.binary_minus(other)
    }

    pub fn binary_div(&self, other: &Self) -> Option<Self> {
        self.binary_minus(other)
    }

    /// `and`, `or` and `xor` are defined on booleans only.
    pub fn binary_logical(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Some(Self::Unknown),
            (Self::Bool, Self::Bool) => Some(Self::Bool),
            _ => None,
        }
    }

    /// Whether `=` / `/=` are supported between the two types.
    #[must_use]
    pub fn binary_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => true,
            (Self::Str, Self::Str) | (Self::Array, Self::Array) => true,
            _ => is_numeric(self) && is_numeric(other),
        }
    }

    /// Whether `< <= > >=` are supported between the two types.
    #[must_use]
    pub fn binary_ordering(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => true,
            (Self::Str, Self::Str) => true,
            _ => is_numeric(self) && is_numeric(other),
        }
    }

    pub fn unary_plus(&self) -> Option<Self> {
        match self {
            Self::Unknown => Some(Self::Unknown),
            Self::Int => Some(Self::Int),
            Self::Real => Some(Self::Real),
            _ => None,
        }
    }

    pub fn unary_minus(&self) -> Option<Self> {
        self.unary_plus()
    }

    pub fn unary_not(&self) -> Option<Self> {
        match self {
            Self::Unknown => Some(Self::Unknown),
            Self::Bool => Some(Self::Bool),
            _ => None,
        }
    }

    /// The type of `.name` on a value of this type.
    pub fn field(&self, name: &str) -> Option<Self> {
        match self {
            Self::Unknown => Some(Self::Unknown),
            Self::Int | Self::Real => match name {
                "Round" | "Floor" | "Ceil" => Some(Self::Int),
                "Frac" => Some(Self::Real),
                _ => None,
            },
            Self::Str => match name {
                "Length" => Some(Self::Int),
                "Lower" | "Upper" => Some(Self::Str),
                "Split" => Some(Self::Func(Rc::new(FuncType::new(true, vec![Self::Str], Self::Array)))),
                "SplitWS" => Some(Self::Func(Rc::new(FuncType::new(true, vec![], Self::Array)))),
                "Join" => Some(Self::Func(Rc::new(FuncType::new(true, vec![Self::Array], Self::Str)))),
                "Slice" => Some(Self::Func(Rc::new(FuncType::new(
                    false,
                    vec![Self::Int, Self::Int, Self::Int],
                    Self::Str,
                )))),
                _ => None,
            },
            // Tuple fields cannot be typed without the value.
            Self::Tuple => Some(Self::Unknown),
            _ => None,
        }
    }

    /// The type of `.(index)` on a value of this type.
    pub fn field_by_index(&self, index: &Self) -> Option<Self> {
        match self {
            Self::Unknown => Some(Self::Unknown),
            Self::Tuple if matches!(index, Self::Int | Self::Unknown) => Some(Self::Unknown),
            _ => None,
        }
    }

    /// The type of `[index]` on a value of this type.
    pub fn subscript(&self, index: &Self) -> Option<Self> {
        match self {
            Self::Unknown => Some(Self::Unknown),
            Self::Array if matches!(index, Self::Int | Self::Unknown) => Some(Self::Unknown),
            Self::Str if matches!(index, Self::Int | Self::Unknown) => Some(Self::Str),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_types() -> Vec<DType> {
        vec![
            DType::Int,
            DType::Real,
            DType::Str,
            DType::Bool,
            DType::None,
            DType::Array,
            DType::Tuple,
            DType::Func(Rc::new(FuncType::with_arity(true, 2, DType::Int))),
            DType::Unknown,
        ]
    }

    #[test]
    fn generalize_is_commutative_and_idempotent() {
        for a in all_types() {
            assert_eq!(a.generalize(&a), a, "idempotence of {a}");
            for b in all_types() {
                assert_eq!(a.generalize(&b), b.generalize(&a), "commutativity of {a} / {b}");
            }
        }
    }

    #[test]
    fn generalize_numeric_mix_is_real() {
        assert_eq!(DType::Int.generalize(&DType::Real), DType::Real);
    }

    #[test]
    fn generalize_disagreement_is_unknown() {
        assert_eq!(DType::Str.generalize(&DType::Int), DType::Unknown);
        assert_eq!(DType::Bool.generalize(&DType::None), DType::Unknown);
    }

    #[test]
    fn generalize_merges_function_signatures() {
        let pure_int = DType::Func(Rc::new(FuncType::new(true, vec![DType::Int], DType::Int)));
        let impure_real = DType::Func(Rc::new(FuncType::new(false, vec![DType::Real], DType::Real)));
        let merged = pure_int.generalize(&impure_real);
        let DType::Func(t) = merged else {
            panic!("functions generalize to a function");
        };
        assert!(!t.pure);
        assert_eq!(t.params, Some(vec![DType::Real]));
        assert_eq!(t.ret, DType::Real);
    }

    #[test]
    fn unknown_is_absorbing() {
        for t in all_types() {
            assert_eq!(DType::Unknown.binary_plus(&t), Some(DType::Unknown));
            assert_eq!(t.binary_plus(&DType::Unknown), Some(DType::Unknown));
            assert!(t.binary_eq(&DType::Unknown));
            assert!(DType::Unknown.binary_ordering(&t));
        }
        assert_eq!(DType::Unknown.field("anything"), Some(DType::Unknown));
        assert_eq!(DType::Unknown.subscript(&DType::Str), Some(DType::Unknown));
    }

    #[test]
    fn numeric_promotion() {
        assert_eq!(DType::Int.binary_plus(&DType::Int), Some(DType::Int));
        assert_eq!(DType::Int.binary_div(&DType::Real), Some(DType::Real));
        assert_eq!(DType::Str.binary_minus(&DType::Str), None);
    }

    #[test]
    fn bool_supports_logic_only() {
        assert_eq!(DType::Bool.binary_logical(&DType::Bool), Some(DType::Bool));
        assert_eq!(DType::Bool.binary_plus(&DType::Bool), None);
        assert!(!DType::Bool.binary_eq(&DType::Bool));
    }

    #[test]
    fn display_names() {
        assert_eq!(DType::Unknown.to_string(), "object?");
        let f = DType::Func(Rc::new(FuncType::with_arity(false, 1, DType::Unknown)));
        assert_eq!(f.to_string(), "function (object?) -> object?");
        let p = DType::Func(Rc::new(FuncType::new(true, vec![], DType::None)));
        assert_eq!(p.to_string(), "(pure)function () -> none");
    }
}
