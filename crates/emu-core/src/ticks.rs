//! The fundamental unit of time on the signal bus.

/// A count of half clock cycles.
///
/// One clock period is two half-cycles: the clock line falls and then
/// rises again. Every component handler is told how many half-cycles have
/// elapsed since the machine started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HalfCycles(pub u64);

impl HalfCycles {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whole clock cycles, rounding down.
    #[must_use]
    pub const fn cycles(self) -> u64 {
        self.0 >> 1
    }
}

impl core::ops::Add for HalfCycles {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for HalfCycles {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl core::ops::Sub for HalfCycles {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}
