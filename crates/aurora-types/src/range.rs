use std::fmt;

use serde::{Deserialize, Serialize};

/// A window of ledger sequences an operator asks a backend to prepare.
///
/// A bounded range covers `[from, to]` inclusive and terminates the session
/// once the last ledger has been delivered. An unbounded range covers
/// `[from, ∞)`: the backend catches up and then follows the live network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRange {
    pub from: u32,
    pub to: u32,
    pub bounded: bool,
}

impl LedgerRange {
    /// A closed range `[from, to]`.
    pub fn bounded(from: u32, to: u32) -> Self {
        Self {
            from,
            to,
            bounded: true,
        }
    }

    /// An open range `[from, ∞)`.
    pub fn unbounded(from: u32) -> Self {
        Self {
            from,
            to: 0,
            bounded: false,
        }
    }

    /// Returns `true` if `sequence` falls inside this range.
    pub fn contains(&self, sequence: u32) -> bool {
        if sequence < self.from {
            return false;
        }
        !self.bounded || sequence <= self.to
    }
}

impl fmt::Display for LedgerRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bounded {
            write!(f, "[{}, {}]", self.from, self.to)
        } else {
            write!(f, "[{}, latest)", self.from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_contains() {
        let r = LedgerRange::bounded(100, 200);
        assert!(r.contains(100));
        assert!(r.contains(200));
        assert!(!r.contains(99));
        assert!(!r.contains(201));
    }

    #[test]
    fn unbounded_contains() {
        let r = LedgerRange::unbounded(64);
        assert!(r.contains(64));
        assert!(r.contains(u32::MAX));
        assert!(!r.contains(63));
    }

    #[test]
    fn display() {
        assert_eq!(LedgerRange::bounded(1, 2).to_string(), "[1, 2]");
        assert_eq!(LedgerRange::unbounded(64).to_string(), "[64, latest)");
    }

    #[test]
    fn serde_roundtrip() {
        let r = LedgerRange::bounded(100, 200);
        let json = serde_json::to_string(&r).unwrap();
        let back: LedgerRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
