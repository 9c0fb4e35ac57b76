//! Motor phase identifiers

use core::fmt;

/// One of the three motor phases
///
/// Each phase owns one PWM-capable high-side output and one digital low-side output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phase {
    A = 0,
    B = 1,
    C = 2,
}

impl Phase {
    /// All phases in pin order
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// Index into per-phase arrays (0-2)
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Phase::A => "A",
            Phase::B => "B",
            Phase::C => "C",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
