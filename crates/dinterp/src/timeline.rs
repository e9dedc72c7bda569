//! The value timeline: what the analyzer knows about every visible name.
//!
//! A stack of scopes, where each binding holds either a *known value* (a
//! folded constant) or merely a *static type*. Blind scopes model loop and
//! function bodies: a body may not run, may run many times, or may run later,
//! so from inside one, every enclosing binding reports as `Unknown`.
//!
//! Invariants kept here:
//! - a binding's pending-unused-assignment spans are cleared the moment the
//!   binding is read;
//! - blind-scope indices are monotonically non-decreasing and always within
//!   `[0, depth]` — they are popped when their scope ends;
//! - after an impure call is folded into the timeline, every binding's
//!   content degrades to its type (its value is lost).

use ahash::AHashMap;
use indexmap::IndexMap;
use smallvec::{SmallVec, smallvec};

use crate::source::Span;
use crate::types::DType;
use crate::value::{Value, values_eq};

/// What the analyzer knows about one expression or binding: a concrete
/// folded value, or only a static type.
#[derive(Debug, Clone)]
pub enum TypeOrValue {
    Type(DType),
    Value(Value),
}

impl TypeOrValue {
    #[must_use]
    pub fn unknown() -> Self {
        Self::Type(DType::Unknown)
    }

    /// The static type, whichever variant this is.
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Type(t) => t.clone(),
            Self::Value(v) => v.dtype(),
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Type(DType::Unknown))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Type(_) => None,
        }
    }

    /// The boolean payload, when this is a known `Bool`.
    #[must_use]
    pub fn known_bool(&self) -> Option<bool> {
        match self {
            Self::Value(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

/// One declared name in a scope.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub content: TypeOrValue,
    pub declaration: Span,
    pub used: bool,
    /// Spans of assignments not yet observed by a read. Reported as useless
    /// when the scope ends with them still pending.
    pub pending_unused: SmallVec<[Span; 2]>,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    bindings: IndexMap<String, Binding>,
    /// Enclosing names touched from this scope or its children; the flag is
    /// true when the name was written.
    externals: AHashMap<String, bool>,
}

/// What [`Timeline::end_scope`] reports about the scope that just ended.
#[derive(Debug, Default)]
pub(crate) struct ScopeReport {
    /// Declared names that were never read.
    pub never_used: Vec<(String, Span)>,
    /// Assignment spans whose value was never read.
    pub unused_assignments: Vec<(String, Span)>,
    /// Enclosing names read (false) or written (true) from within.
    pub externals: AHashMap<String, bool>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Timeline {
    stack: Vec<Scope>,
    /// Indices into `stack`: a lookup that lands below the topmost index is
    /// behind the blind and reports `Unknown`.
    blind: Vec<usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn top(&mut self) -> &mut Scope {
        self.stack.last_mut().expect("lookup on an empty timeline")
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.stack.iter().rposition(|s| s.bindings.contains_key(name))
    }

    /// Reads a name: marks it used and clears its pending-unused set. Behind
    /// the blind the content reports as `Unknown` and the read is recorded in
    /// the topmost scope's externals.
    pub fn lookup(&mut self, name: &str) -> Option<TypeOrValue> {
        let index = self.position_of(name)?;
        let binding = self.stack[index].bindings.get_mut(name).expect("just located");
        binding.used = true;
        binding.pending_unused.clear();
        let behind_blind = self.blind.last().is_some_and(|&b| index < b);
        if behind_blind {
            self.top().externals.entry(name.to_owned()).or_insert(false);
            return Some(TypeOrValue::unknown());
        }
        Some(self.stack[index].bindings[name].content.clone())
    }

    /// Declares a name in the topmost scope; false when it already exists
    /// there.
    pub fn declare(&mut self, name: &str, declaration: Span) -> bool {
        let scope = self.top();
        if scope.bindings.contains_key(name) {
            return false;
        }
        scope.bindings.insert(
            name.to_owned(),
            Binding {
                content: TypeOrValue::Value(Value::None),
                declaration,
                used: false,
                pending_unused: SmallVec::new(),
            },
        );
        true
    }

    /// Assigns new content to a name; false when undeclared. Writes to
    /// bindings below the topmost scope are recorded as external writes.
    pub fn assign(&mut self, name: &str, content: TypeOrValue, span: Span) -> bool {
        let Some(index) = self.position_of(name) else {
            return false;
        };
        if index != self.stack.len() - 1 {
            self.top().externals.insert(name.to_owned(), true);
        }
        let binding = self.stack[index].bindings.get_mut(name).expect("just located");
        binding.content = content;
        binding.used = true;
        binding.pending_unused = smallvec![span];
        true
    }

    /// Degrades a name to `Unknown` while marking it used, as after a loop
    /// body that writes it an unknown number of times.
    pub fn assign_unknown_used(&mut self, name: &str) -> bool {
        let Some(index) = self.position_of(name) else {
            return false;
        };
        if index != self.stack.len() - 1 {
            self.top().externals.insert(name.to_owned(), true);
        }
        let binding = self.stack[index].bindings.get_mut(name).expect("just located");
        binding.content = TypeOrValue::unknown();
        binding.used = true;
        binding.pending_unused.clear();
        true
    }

    /// Called after folding an impure call into the timeline: the call may
    /// have mutated arbitrary observable state, so every binding's content
    /// degrades to its type.
    pub fn make_all_unknown(&mut self) {
        for scope in &mut self.stack {
            for binding in scope.bindings.values_mut() {
                binding.content = TypeOrValue::Type(binding.content.dtype());
                binding.used = true;
                binding.pending_unused.clear();
            }
        }
    }

    pub fn start_scope(&mut self) {
        self.stack.push(Scope::default());
    }

    pub fn start_blind_scope(&mut self) {
        self.blind.push(self.stack.len());
        self.start_scope();
    }

    /// Ends the topmost scope, reporting unused names and touched externals.
    /// Externals propagate into the parent scope unless it declares the name
    /// itself. Blind indices whose scope died are popped.
    pub fn end_scope(&mut self) -> ScopeReport {
        let top = self.stack.pop().expect("end_scope on an empty timeline");
        while self.blind.last().is_some_and(|&b| b >= self.stack.len()) {
            self.blind.pop();
        }
        let mut report = ScopeReport {
            externals: top.externals,
            ..ScopeReport::default()
        };
        for (name, binding) in top.bindings {
            if binding.used {
                for &span in &binding.pending_unused {
                    report.unused_assignments.push((name.clone(), span));
                }
            } else {
                report.never_used.push((name, binding.declaration));
            }
        }
        if let Some(parent) = self.stack.last_mut() {
            for (name, &written) in &report.externals {
                if !parent.bindings.contains_key(name) {
                    let flag = parent.externals.entry(name.clone()).or_insert(false);
                    *flag = *flag || written;
                }
            }
        }
        report
    }

    /// Reconciles this timeline with the other branch of a conditional:
    /// `used` flags are OR-ed, pending-unused sets are unioned, contents are
    /// generalized pairwise and externals are OR-ed.
    ///
    /// The two timelines must share shape; a mismatch is an analyzer bug.
    pub fn merge(&mut self, other: &Self) {
        debug_assert_eq!(self.stack.len(), other.stack.len(), "timeline depths diverged");
        debug_assert_eq!(self.blind, other.blind, "blind scopes diverged");
        for (scope, other_scope) in self.stack.iter_mut().zip(&other.stack) {
            for (name, &written) in &other_scope.externals {
                let flag = scope.externals.entry(name.clone()).or_insert(false);
                *flag = *flag || written;
            }
            debug_assert_eq!(
                scope.bindings.len(),
                other_scope.bindings.len(),
                "binding counts diverged"
            );
            for ((name, binding), (other_name, other_binding)) in
                scope.bindings.iter_mut().zip(&other_scope.bindings)
            {
                debug_assert_eq!(name, other_name, "binding names diverged");
                binding.used = binding.used || other_binding.used;
                for &span in &other_binding.pending_unused {
                    if !binding.pending_unused.contains(&span) {
                        binding.pending_unused.push(span);
                    }
                }
                binding.content = merge_content(&binding.content, &other_binding.content);
            }
        }
    }
}

fn merge_content(a: &TypeOrValue, b: &TypeOrValue) -> TypeOrValue {
    if let (TypeOrValue::Value(va), TypeOrValue::Value(vb)) = (a, b)
        && values_eq(va, vb)
    {
        return a.clone();
    }
    TypeOrValue::Type(a.dtype().generalize(&b.dtype()))
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;

    fn int(v: i64) -> TypeOrValue {
        TypeOrValue::Value(Value::Int(BigInt::from(v)))
    }

    fn span(n: u32) -> Span {
        Span::new(n, n + 1)
    }

    #[test]
    fn lookup_finds_the_nearest_binding() {
        let mut tl = Timeline::new();
        tl.start_scope();
        assert!(tl.declare("x", span(0)));
        assert!(tl.assign("x", int(1), span(0)));
        tl.start_scope();
        assert!(tl.declare("x", span(5)));
        assert!(tl.assign("x", int(2), span(5)));
        let content = tl.lookup("x").expect("declared");
        assert!(matches!(content.as_value(), Some(Value::Int(v)) if *v == BigInt::from(2)));
    }

    #[test]
    fn redeclaration_in_the_same_scope_fails() {
        let mut tl = Timeline::new();
        tl.start_scope();
        assert!(tl.declare("x", span(0)));
        assert!(!tl.declare("x", span(3)));
        tl.start_scope();
        assert!(tl.declare("x", span(7)), "shadowing in a nested scope is fine");
    }

    #[test]
    fn blind_scope_hides_enclosing_values() {
        let mut tl = Timeline::new();
        tl.start_scope();
        tl.declare("x", span(0));
        tl.assign("x", int(1), span(0));
        tl.start_blind_scope();
        let content = tl.lookup("x").expect("visible");
        assert!(content.is_unknown());
        // The read was recorded as an external touch.
        let report = tl.end_scope();
        assert_eq!(report.externals.get("x"), Some(&false));
    }

    #[test]
    fn blind_index_dies_with_its_scope() {
        let mut tl = Timeline::new();
        tl.start_scope();
        tl.declare("x", span(0));
        tl.assign("x", int(1), span(0));
        tl.start_blind_scope();
        tl.end_scope();
        let content = tl.lookup("x").expect("visible");
        assert!(content.as_value().is_some(), "no longer behind a blind");
    }

    #[test]
    fn reads_clear_pending_assignments() {
        let mut tl = Timeline::new();
        tl.start_scope();
        tl.declare("x", span(0));
        tl.assign("x", int(1), span(2));
        tl.lookup("x");
        tl.assign("x", int(2), span(8));
        let report = tl.end_scope();
        assert_eq!(report.unused_assignments, vec![("x".to_owned(), span(8))]);
        assert!(report.never_used.is_empty());
    }

    #[test]
    fn never_read_names_are_reported() {
        let mut tl = Timeline::new();
        tl.start_scope();
        tl.declare("x", span(4));
        let report = tl.end_scope();
        assert_eq!(report.never_used, vec![("x".to_owned(), span(4))]);
    }

    #[test]
    fn make_all_unknown_keeps_types() {
        let mut tl = Timeline::new();
        tl.start_scope();
        tl.declare("x", span(0));
        tl.assign("x", int(1), span(0));
        tl.make_all_unknown();
        let content = tl.lookup("x").expect("declared");
        assert!(matches!(content, TypeOrValue::Type(DType::Int)));
    }

    #[test]
    fn external_writes_propagate_until_declared() {
        let mut tl = Timeline::new();
        tl.start_scope();
        tl.declare("x", span(0));
        tl.start_scope();
        tl.declare("y", span(1));
        tl.start_scope();
        tl.assign("x", int(1), span(2));
        tl.assign("y", int(2), span(3));
        let inner = tl.end_scope();
        assert_eq!(inner.externals.get("x"), Some(&true));
        assert_eq!(inner.externals.get("y"), Some(&true));
        let middle = tl.end_scope();
        assert_eq!(middle.externals.get("x"), Some(&true));
        assert_eq!(middle.externals.get("y"), None, "stops where the name is declared");
    }

    #[test]
    fn merge_generalizes_divergent_contents() {
        let mut tl = Timeline::new();
        tl.start_scope();
        tl.declare("x", span(0));
        tl.declare("y", span(1));
        tl.assign("x", int(1), span(0));
        tl.assign("y", int(2), span(1));
        let mut other = tl.clone();
        tl.assign("x", int(9), span(4));
        other.assign("x", TypeOrValue::Value(Value::Real(0.5)), span(6));
        tl.merge(&other);
        let x = tl.lookup("x").expect("declared");
        assert!(matches!(x, TypeOrValue::Type(DType::Real)));
        let y = tl.lookup("y").expect("declared");
        assert!(matches!(y.as_value(), Some(Value::Int(v)) if *v == BigInt::from(2)));
    }
}
