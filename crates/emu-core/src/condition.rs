//! Declarative rules describing when a component wants to hear from the bus.

use crate::lines::CLOCK;

/// When a component must be invoked.
///
/// A condition watches two kinds of line. `mask`/`values` form a level test
/// that is true when `(state & mask) == values`. `changed` lists extra lines
/// whose toggling is interesting while the level test holds. `edge_only`
/// is a hint that the component never needs to hear about the test becoming
/// false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
    changed: u64,
    mask: u64,
    values: u64,
    edge_only: bool,
}

impl Condition {
    #[must_use]
    pub const fn new(changed: u64, mask: u64, values: u64, edge_only: bool) -> Self {
        Self {
            changed,
            mask,
            values,
            edge_only,
        }
    }

    /// True iff `(state & relevant) == values`.
    #[must_use]
    pub const fn test(relevant: u64, values: u64, edge_only: bool) -> Self {
        Self::new(0, relevant, values, edge_only)
    }

    /// True iff every line in `relevant` is high (inactive).
    #[must_use]
    pub const fn set(relevant: u64, edge_only: bool) -> Self {
        Self::test(relevant, relevant, edge_only)
    }

    /// True iff every line in `relevant` is low (asserted).
    #[must_use]
    pub const fn reset(relevant: u64, edge_only: bool) -> Self {
        Self::test(relevant, 0, edge_only)
    }

    /// Fires whenever any line in `relevant` toggles.
    #[must_use]
    pub const fn change(relevant: u64) -> Self {
        Self::new(relevant, 0, 0, true)
    }

    /// A level test that asks for a line outside its own mask.
    #[must_use]
    pub const fn impossible() -> Self {
        Self::new(0, 0, 1, false)
    }

    #[must_use]
    pub const fn changed_lines(&self) -> u64 {
        self.changed
    }

    #[must_use]
    pub const fn mask(&self) -> u64 {
        self.mask
    }

    #[must_use]
    pub const fn values(&self) -> u64 {
        self.values
    }

    #[must_use]
    pub const fn edge_only(&self) -> bool {
        self.edge_only
    }

    /// Every line this condition looks at.
    #[must_use]
    pub const fn observed_lines(&self) -> u64 {
        self.changed | self.mask
    }

    /// Nothing is watched for change and the level test wants a line it
    /// never looks at, so no bus state can satisfy it.
    #[must_use]
    pub const fn is_impossible(&self) -> bool {
        self.changed == 0 && self.values & !self.mask != 0
    }

    /// True when the condition observes the clock line and nothing else.
    #[must_use]
    pub const fn is_clocked(&self) -> bool {
        self.observed_lines() == CLOCK
    }

    #[must_use]
    pub const fn evaluate(&self, state: u64) -> bool {
        state & self.mask == self.values
    }
}
