//! Target machine layout constants consulted during resolution.

/// Word and byte geometry of the compilation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLayout {
    pointer_bits: u32,
    bits_per_byte: u32,
}

impl TargetLayout {
    pub fn new(pointer_bits: u32, bits_per_byte: u32) -> Self {
        Self {
            pointer_bits,
            bits_per_byte,
        }
    }

    /// Width of an address in bits.
    pub fn pointer_bits(&self) -> u32 {
        self.pointer_bits
    }

    /// `address_depth`: width of an address in bits, as a foldable count.
    pub fn address_depth(&self) -> u64 {
        self.pointer_bits as u64
    }

    /// `address_size`: width of an address in bytes.
    pub fn address_size(&self) -> u64 {
        (self.pointer_bits / self.bits_per_byte) as u64
    }

    /// `bits_per_byte`: width of the addressable unit.
    pub fn bits_per_byte(&self) -> u64 {
        self.bits_per_byte as u64
    }
}

impl Default for TargetLayout {
    fn default() -> Self {
        Self::new(64, 8)
    }
}
