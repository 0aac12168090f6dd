//! The type lattice used by the dispatch engine (`avail-dispatch`) and by
//! L2 type propagation (`avail-l2`).
//!
//! `spec.md` describes types only operationally ("argument types", "most
//! specific", "subtype order"); this module gives that a concrete shape
//! scaled to what a core re-implementation needs: integer ranges, tuple
//! shapes, and simple covariant containers, plus an `Enumeration` case that
//! lets a type pin down an exact, finite set of instances (used for
//! constant-folding refinements in `lookup_by_values`, and for nominal
//! "kind of this atom" types like Avail's boolean type).
//!
//! This is a deliberate simplification of Avail's much richer type system
//! (which supports arbitrary-precision integer ranges, per-position tuple
//! element types, and a full type lattice with type-of-a-type). It is
//! sufficient for the scenarios in spec.md §8 and for a faithful multimethod
//! dispatch engine.

use crate::value::Value;
use std::fmt;

/// An inclusive integer range, `i64::MIN`/`i64::MAX` standing in for
/// Avail's unbounded integers (spec.md's Non-goals exclude bignum
/// arithmetic from this core re-implementation; see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerRange {
    pub min: i64,
    pub max: i64,
}

impl IntegerRange {
    pub const ALL: IntegerRange = IntegerRange {
        min: i64::MIN,
        max: i64::MAX,
    };

    pub fn exactly(n: i64) -> Self {
        IntegerRange { min: n, max: n }
    }

    pub fn contains(&self, n: i64) -> bool {
        self.min <= n && n <= self.max
    }

    pub fn is_subset(&self, other: &IntegerRange) -> bool {
        other.min <= self.min && self.max <= other.max
    }

    /// The intersection of two ranges, or `None` if disjoint.
    pub fn intersect(&self, other: &IntegerRange) -> Option<IntegerRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min <= max {
            Some(IntegerRange { min, max })
        } else {
            None
        }
    }

    pub fn union(&self, other: &IntegerRange) -> IntegerRange {
        IntegerRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// A tuple's shape: the type shared by every element, and the range of
/// permitted sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleType {
    pub element_type: Box<AvailType>,
    pub size_range: IntegerRange,
}

impl TupleType {
    pub fn exactly(element_type: AvailType, size: i64) -> Self {
        TupleType {
            element_type: Box::new(element_type),
            size_range: IntegerRange::exactly(size),
        }
    }
}

/// A function's type: fixed-arity argument types plus a result type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub arguments: Vec<AvailType>,
    pub result: Box<AvailType>,
}

/// The type lattice. `Top` is the most general type (every value is a
/// `Top`); `Bottom` is uninstantiable and is a subtype of everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AvailType {
    Top,
    Bottom,
    Integer(IntegerRange),
    Float,
    Atom,
    Tuple(TupleType),
    Set(Box<AvailType>),
    Map {
        key: Box<AvailType>,
        value: Box<AvailType>,
    },
    Variable(Box<AvailType>),
    Function(FunctionType),
    CompiledCode,
    Continuation,
    /// An exact, finite set of instances — used to refine a type during
    /// `lookup_by_values` (a literal integer refines to `Integer(n..=n)`
    /// automatically via `Integer`, but atoms and other non-range values
    /// refine via this case).
    Enumeration(Vec<Value>),
}

impl fmt::Display for AvailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailType::Top => write!(f, "any"),
            AvailType::Bottom => write!(f, "bottom"),
            AvailType::Integer(r) if r.min == r.max => write!(f, "integer({})", r.min),
            AvailType::Integer(r) => write!(f, "integer[{}..{}]", r.min, r.max),
            AvailType::Float => write!(f, "float"),
            AvailType::Atom => write!(f, "atom"),
            AvailType::Tuple(t) => write!(
                f,
                "tuple[{}..{}] of {}",
                t.size_range.min, t.size_range.max, t.element_type
            ),
            AvailType::Set(e) => write!(f, "set of {e}"),
            AvailType::Map { key, value } => write!(f, "map {key} -> {value}"),
            AvailType::Variable(t) => write!(f, "variable of {t}"),
            AvailType::Function(ft) => write!(f, "function({:?}) -> {}", ft.arguments, ft.result),
            AvailType::CompiledCode => write!(f, "compiled-code"),
            AvailType::Continuation => write!(f, "continuation"),
            AvailType::Enumeration(vs) => write!(f, "enumeration of {} value(s)", vs.len()),
        }
    }
}

impl AvailType {
    /// `self <: other` in the subtype order the dispatch engine uses to
    /// decide which definitions are "most specific" (spec.md §4.3).
    pub fn is_subtype_of(&self, other: &AvailType) -> bool {
        use AvailType::*;
        if self == other {
            return true;
        }
        match (self, other) {
            (Bottom, _) => true,
            (_, Top) => true,
            (Enumeration(values), other) => values.iter().all(|v| v.kind().is_subtype_of(other)),
            (Integer(a), Integer(b)) => a.is_subset(b),
            (Float, Float) => true,
            (Atom, Atom) => true,
            (Tuple(a), Tuple(b)) => {
                a.size_range.is_subset(&b.size_range) && a.element_type.is_subtype_of(&b.element_type)
            }
            (Set(a), Set(b)) => a.is_subtype_of(b),
            (Map { key: ka, value: va }, Map { key: kb, value: vb }) => {
                ka.is_subtype_of(kb) && va.is_subtype_of(vb)
            }
            (Variable(a), Variable(b)) => a == b,
            (Function(a), Function(b)) => {
                a.arguments.len() == b.arguments.len()
                    && a.result.is_subtype_of(&b.result)
                    // Argument types are contravariant: a function accepting
                    // a wider type is a subtype when used where a narrower
                    // one is expected.
                    && b.arguments.iter().zip(&a.arguments).all(|(bi, ai)| bi.is_subtype_of(ai))
            }
            (CompiledCode, CompiledCode) => true,
            (Continuation, Continuation) => true,
            _ => false,
        }
    }

    pub fn is_supertype_of(&self, other: &AvailType) -> bool {
        other.is_subtype_of(self)
    }

    /// Whether `self` and `other` are unrelated by subtyping in either
    /// direction (used to detect dispatch ambiguity, spec.md scenario 5).
    pub fn is_incomparable_with(&self, other: &AvailType) -> bool {
        !self.is_subtype_of(other) && !other.is_subtype_of(self)
    }

    pub fn accepts(&self, value: &Value) -> bool {
        value.kind().is_subtype_of(self)
    }

    /// The least upper bound of two types: the narrowest type that is a
    /// supertype of both. Used to summarize the element type of a tuple or
    /// set built up one value at a time, where each insertion may widen the
    /// running type rather than narrow it (the mirror image of `is_subtype_of`).
    pub fn join(&self, other: &AvailType) -> AvailType {
        use AvailType::*;
        if self == other {
            return self.clone();
        }
        match (self, other) {
            (Bottom, t) | (t, Bottom) => t.clone(),
            (Integer(a), Integer(b)) => Integer(a.union(b)),
            (Float, Float) => Float,
            (Atom, Atom) => Atom,
            (Tuple(a), Tuple(b)) => Tuple(TupleType {
                element_type: Box::new(a.element_type.join(&b.element_type)),
                size_range: a.size_range.union(&b.size_range),
            }),
            (Set(a), Set(b)) => Set(Box::new(a.join(b))),
            (Map { key: ka, value: va }, Map { key: kb, value: vb }) => Map {
                key: Box::new(ka.join(kb)),
                value: Box::new(va.join(vb)),
            },
            (Enumeration(a), Enumeration(b)) => {
                let mut values = a.clone();
                for v in b {
                    if !values.contains(v) {
                        values.push(v.clone());
                    }
                }
                Enumeration(values)
            }
            (CompiledCode, CompiledCode) => CompiledCode,
            (Continuation, Continuation) => Continuation,
            _ if self.is_subtype_of(other) => other.clone(),
            _ if other.is_subtype_of(self) => self.clone(),
            _ => Top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_range_subtype() {
        let narrow = AvailType::Integer(IntegerRange { min: 0, max: 10 });
        let wide = AvailType::Integer(IntegerRange::ALL);
        assert!(narrow.is_subtype_of(&wide));
        assert!(!wide.is_subtype_of(&narrow));
    }

    #[test]
    fn top_and_bottom() {
        let t = AvailType::Integer(IntegerRange::exactly(3));
        assert!(t.is_subtype_of(&AvailType::Top));
        assert!(AvailType::Bottom.is_subtype_of(&t));
    }

    #[test]
    fn incomparable_tuples() {
        let a = AvailType::Tuple(TupleType::exactly(AvailType::Integer(IntegerRange::ALL), 2));
        let b = AvailType::Tuple(TupleType::exactly(AvailType::Float, 2));
        assert!(a.is_incomparable_with(&b));
    }
}
