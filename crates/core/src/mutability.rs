//! The mutable -> immutable -> shared lattice (spec.md §3).
//!
//! Every composite value (tuple, set, map, variable, function, continuation)
//! carries one of these three mutability states. Promotion is monotone: a
//! value that has been observed immutable or shared never becomes mutable
//! again, and the interpreter must never observe a value mid-transition.
//!
//! We use the same lock-free compare-and-swap idiom the scheduler uses for
//! strand lifecycle counters: a single `AtomicU8` tag, promoted with a CAS
//! loop so that promotion is idempotent and safe to retry from any number of
//! threads racing to promote the same value.

use std::sync::atomic::{AtomicU8, Ordering};

/// A value's position in the mutable -> immutable -> shared lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Mutability {
    /// Exclusively owned; may be mutated in place.
    Mutable = 0,
    /// Observed by at least one holder; further mutation is forbidden.
    Immutable = 1,
    /// Visible across fibers; all mutation is mediated.
    Shared = 2,
}

impl Mutability {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Mutability::Mutable,
            1 => Mutability::Immutable,
            _ => Mutability::Shared,
        }
    }
}

/// An atomic, monotone mutability tag.
///
/// New values start `Mutable`. `promote_to` moves the tag forward in the
/// lattice and never backward; calling it with a state the tag has already
/// passed is a no-op, which is what makes promotion safe to retry after a
/// racing thread wins the CAS.
#[derive(Debug)]
pub struct MutabilityCell(AtomicU8);

impl Default for MutabilityCell {
    fn default() -> Self {
        Self::new()
    }
}

impl MutabilityCell {
    pub fn new() -> Self {
        MutabilityCell(AtomicU8::new(Mutability::Mutable as u8))
    }

    pub fn get(&self) -> Mutability {
        Mutability::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_mutable(&self) -> bool {
        self.get() == Mutability::Mutable
    }

    pub fn is_shared(&self) -> bool {
        self.get() == Mutability::Shared
    }

    /// Advance the tag to at least `target`, never retreating.
    ///
    /// Returns the state actually observed after the call, which may be
    /// more advanced than `target` if another thread promoted further
    /// in the meantime.
    pub fn promote_to(&self, target: Mutability) -> Mutability {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if Mutability::from_u8(current) >= target {
                return Mutability::from_u8(current);
            }
            match self.0.compare_exchange_weak(
                current,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return target,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn make_immutable(&self) -> Mutability {
        self.promote_to(Mutability::Immutable)
    }

    pub fn make_shared(&self) -> Mutability {
        self.promote_to(Mutability::Shared)
    }
}

impl Clone for MutabilityCell {
    /// A clone starts at the same point in the lattice as the original.
    /// This is used when a structurally-shared value is duplicated before
    /// a destructive primitive decides whether it may reuse the backing
    /// storage.
    fn clone(&self) -> Self {
        MutabilityCell(AtomicU8::new(self.0.load(Ordering::Acquire)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_mutable() {
        let cell = MutabilityCell::new();
        assert_eq!(cell.get(), Mutability::Mutable);
    }

    #[test]
    fn promotion_is_monotone() {
        let cell = MutabilityCell::new();
        assert_eq!(cell.make_immutable(), Mutability::Immutable);
        // Re-promoting to Immutable after Shared must not retreat.
        assert_eq!(cell.make_shared(), Mutability::Shared);
        assert_eq!(cell.promote_to(Mutability::Immutable), Mutability::Shared);
        assert!(cell.is_shared());
    }

    #[test]
    fn promotion_is_idempotent() {
        let cell = MutabilityCell::new();
        cell.make_shared();
        cell.make_shared();
        assert!(cell.is_shared());
    }
}
