//! The signal vector: every line of the bus packed into one word.
//!
//! Lines are active-low. A zero bit means the line is asserted; a one bit
//! means nobody is pulling it down. The idle bus is therefore all ones, and
//! several drivers combine by AND (wired-AND), so any driver asserting a
//! line wins.

use std::fmt;

/// The eight data lines.
pub const DATA_MASK: u64 = 0x0000_0000_0000_00ff;
/// Bit position of data line 0.
pub const DATA_SHIFT: u32 = 0;
/// The sixteen address lines.
pub const ADDRESS_MASK: u64 = 0x0000_0000_00ff_ff00;
/// Bit position of address line 0.
pub const ADDRESS_SHIFT: u32 = 8;
/// The master clock line.
pub const CLOCK: u64 = 0x8000_0000_0000_0000;

/// State of all 64 bus lines.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusState(pub u64);

impl BusState {
    /// Nothing driven: every line floats high.
    pub const IDLE: Self = Self(!0);

    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// True if every line in `mask` is asserted (low).
    #[must_use]
    pub const fn is_active(self, mask: u64) -> bool {
        self.0 & mask == 0
    }

    /// True if at least one line in `mask` is asserted.
    #[must_use]
    pub const fn any_active(self, mask: u64) -> bool {
        self.0 & mask != mask
    }

    /// Pull every line in `mask` low.
    pub fn set_active(&mut self, mask: u64) {
        self.0 &= !mask;
    }

    /// Stop driving every line in `mask`.
    pub fn set_inactive(&mut self, mask: u64) {
        self.0 |= mask;
    }

    pub fn set_lines(&mut self, mask: u64, active: bool) {
        if active {
            self.set_active(mask);
        } else {
            self.set_inactive(mask);
        }
    }

    #[must_use]
    pub const fn data(self) -> u8 {
        ((self.0 & DATA_MASK) >> DATA_SHIFT) as u8
    }

    pub fn set_data(&mut self, value: u8) {
        self.0 = (self.0 & !DATA_MASK) | (u64::from(value) << DATA_SHIFT);
    }

    /// Float the data lines so another driver can pull them down.
    pub fn release_data(&mut self) {
        self.0 |= DATA_MASK;
    }

    #[must_use]
    pub const fn address(self) -> u16 {
        ((self.0 & ADDRESS_MASK) >> ADDRESS_SHIFT) as u16
    }

    pub fn set_address(&mut self, value: u16) {
        self.0 = (self.0 & !ADDRESS_MASK) | (u64::from(value) << ADDRESS_SHIFT);
    }
}

impl Default for BusState {
    fn default() -> Self {
        Self::IDLE
    }
}

impl core::ops::BitAnd for BusState {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl core::ops::BitAndAssign for BusState {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl fmt::Debug for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BusState({:#018x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_bus_has_nothing_asserted() {
        let state = BusState::IDLE;
        assert!(!state.any_active(!0));
        assert_eq!(state.data(), 0xff);
        assert_eq!(state.address(), 0xffff);
    }

    #[test]
    fn address_and_data_occupy_their_own_lines() {
        let mut state = BusState::IDLE;
        state.set_address(0x1234);
        state.set_data(0x5a);
        assert_eq!(state.address(), 0x1234);
        assert_eq!(state.data(), 0x5a);
        assert_eq!(state.raw() & !(ADDRESS_MASK | DATA_MASK), !(ADDRESS_MASK | DATA_MASK));
    }

    #[test]
    fn active_low_helpers() {
        let mut state = BusState::IDLE;
        state.set_active(CLOCK | 0x100);
        assert!(state.is_active(CLOCK));
        assert!(state.is_active(CLOCK | 0x100));
        state.set_inactive(0x100);
        assert!(!state.is_active(CLOCK | 0x100));
        assert!(state.any_active(CLOCK | 0x100));
    }

    #[test]
    fn wired_and_lets_any_driver_win() {
        let mut a = BusState::IDLE;
        let mut b = BusState::IDLE;
        a.set_data(0xf0);
        b.set_data(0x3f);
        assert_eq!((a & b).data(), 0x30);
    }
}
