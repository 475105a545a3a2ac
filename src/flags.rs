use bitflags::bitflags;

bitflags! {
    /// Physically possible I/O modes for one pin, fixed when the backend is
    /// constructed. The low bits line up with [`PinAttributes`] so a requested
    /// attribute can be checked against its capability directly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PinCapabilities: u16 {
        const INPUT      = 0x0001;
        const OUTPUT     = 0x0002;
        const PWM        = 0x0004;
        const INTERRUPT  = 0x0008;
        const PULL_UP    = 0x0010;
        const PULL_DOWN  = 0x0020;
        const ANALOG_IN  = 0x0040;
        const ANALOG_OUT = 0x0080;
    }
}

bitflags! {
    /// Requested/active configuration of a pin. Must stay a subset of the
    /// backend's capabilities; ACTIVE_LOW and INITIAL_ON carry no capability
    /// requirement of their own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PinAttributes: u16 {
        const INPUT      = 0x0001;
        const OUTPUT     = 0x0002;
        const PWM        = 0x0004;
        const INTERRUPT  = 0x0008;
        const PULL_UP    = 0x0010;
        const PULL_DOWN  = 0x0020;
        const ACTIVE_LOW = 0x0100;
        const INITIAL_ON = 0x0200;
    }
}

impl PinAttributes {
    pub const UNDEFINED: Self = Self::empty();

    /// Attribute bits that map one-to-one onto a capability bit.
    const CAP_MAPPED: Self = Self::from_bits_truncate(
        Self::INPUT.bits()
            | Self::OUTPUT.bits()
            | Self::PWM.bits()
            | Self::INTERRUPT.bits()
            | Self::PULL_UP.bits()
            | Self::PULL_DOWN.bits(),
    );

    const DIRECTION: Self = Self::from_bits_truncate(Self::INPUT.bits() | Self::OUTPUT.bits());

    /// True when every capability-mapped attribute is backed by the given
    /// capability set.
    pub fn validate_with(self, caps: PinCapabilities) -> bool {
        let required = (self & Self::CAP_MAPPED).bits();
        caps.bits() & required == required
    }

    /// True when these (already committed) attributes and the newly requested
    /// ones disagree on direction, or agree on direction but not on interrupt
    /// use. An unconfigured pin never conflicts, and re-applying the same
    /// configuration is allowed.
    pub fn conflicts_with(self, requested: Self) -> bool {
        let old_dir = self & Self::DIRECTION;
        let new_dir = requested & Self::DIRECTION;
        if old_dir.is_empty() || new_dir.is_empty() {
            return false;
        }
        if old_dir != new_dir {
            return true;
        }
        (self & Self::INTERRUPT) != (requested & Self::INTERRUPT)
    }
}

impl Default for PinAttributes {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_validate_against_capabilities() {
        let caps = PinCapabilities::INPUT | PinCapabilities::OUTPUT | PinCapabilities::INTERRUPT;
        assert!(PinAttributes::INPUT.validate_with(caps));
        assert!((PinAttributes::INPUT | PinAttributes::OUTPUT).validate_with(caps));
        assert!(!(PinAttributes::PWM).validate_with(caps));
        assert!(!(PinAttributes::OUTPUT | PinAttributes::PULL_UP).validate_with(caps));
    }

    #[test]
    fn active_low_needs_no_capability() {
        assert!(PinAttributes::ACTIVE_LOW.validate_with(PinCapabilities::empty()));
        assert!(
            (PinAttributes::ACTIVE_LOW | PinAttributes::INITIAL_ON)
                .validate_with(PinCapabilities::empty())
        );
    }

    #[test]
    fn direction_change_conflicts() {
        let input = PinAttributes::INPUT;
        let output = PinAttributes::OUTPUT;
        assert!(input.conflicts_with(output));
        assert!(output.conflicts_with(input));
        assert!(!input.conflicts_with(input));
        assert!(!PinAttributes::UNDEFINED.conflicts_with(output));
    }

    #[test]
    fn interrupt_membership_conflicts() {
        let plain = PinAttributes::INPUT;
        let isr = PinAttributes::INPUT | PinAttributes::INTERRUPT;
        assert!(plain.conflicts_with(isr));
        assert!(isr.conflicts_with(plain));
        assert!(!isr.conflicts_with(isr));
    }

    #[test]
    fn active_low_never_conflicts_alone() {
        let low = PinAttributes::ACTIVE_LOW;
        assert!(!low.conflicts_with(PinAttributes::OUTPUT));
        assert!(!(low | PinAttributes::OUTPUT).conflicts_with(PinAttributes::OUTPUT));
    }
}
