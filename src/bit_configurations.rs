use bitfield::bitfield;

/// Largest parameter count a single command header can declare.
pub const MAX_PARAMETER_COUNT: usize = 0x7F;

// Second byte of every command: bit 7 flags a trailing delay byte, bits 6..0 count the parameters.
bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CountAndFlag(u8);
    impl Debug;
    pub has_delay, set_has_delay: 7;
    pub param_count, set_param_count: 6, 0;
}

impl CountAndFlag {
    /// Builds the header byte for a command. `param_count` must already be checked
    /// against `MAX_PARAMETER_COUNT`; extra bits are masked off.
    pub fn new(param_count: u8, has_delay: bool) -> Self {
        let mut bits = CountAndFlag(0);
        bits.set_param_count(param_count);
        bits.set_has_delay(has_delay);
        bits
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}
