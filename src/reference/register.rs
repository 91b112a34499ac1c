//! The two `float` registers a lane owns, as seen through the `bfloat4`
//! reinterpretation used by the `*_bfloat` accessors.
//!
//! On a little-endian GPU, `bfloat4` lane `2i` is the low half-word of
//! float `i` and lane `2i + 1` its high half-word. A bfloat is the high
//! half of a float, so decoding only has to place each 16-bit value in an
//! odd lane.

use half::bf16;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ThreadElements {
    words: [u32; 2],
}

impl ThreadElements {
    pub fn from_bits(words: [u32; 2]) -> Self {
        Self { words }
    }

    pub fn from_f32(values: [f32; 2]) -> Self {
        Self::from_bits(values.map(f32::to_bits))
    }

    pub fn to_bits(self) -> [u32; 2] {
        self.words
    }

    pub fn to_f32(self) -> [f32; 2] {
        self.words.map(f32::from_bits)
    }

    /// Reads lane `lane` (0..4) of the `bfloat4` view.
    pub fn bf16_lane(&self, lane: usize) -> bf16 {
        let word = self.words[lane / 2];
        let shift = 16 * (lane % 2);
        bf16::from_bits((word >> shift) as u16)
    }

    /// Overwrites lane `lane` (0..4) of the `bfloat4` view, leaving the
    /// other half of the word intact.
    pub fn set_bf16_lane(&mut self, lane: usize, value: bf16) {
        let word = &mut self.words[lane / 2];
        let shift = 16 * (lane % 2);
        *word = (*word & !(0xFFFF << shift)) | (u32::from(value.to_bits()) << shift);
    }

    /// Two scalar bfloat loads: lanes 1 and 3 receive the values, lanes 0
    /// and 2 keep their previous contents.
    pub fn decode_bf16_pair(&mut self, memory: [bf16; 2]) {
        self.set_bf16_lane(1, memory[0]);
        self.set_bf16_lane(3, memory[1]);
    }

    /// One packed bfloat load: the 32-bit memory word replaces the second
    /// float, then element 0 is spliced into lane 1.
    pub fn decode_packed_bf16(&mut self, memory: [bf16; 2]) {
        let packed = u32::from(memory[0].to_bits()) | (u32::from(memory[1].to_bits()) << 16);
        self.words[1] = packed;
        self.set_bf16_lane(1, memory[0]);
    }

    /// Two scalar bfloat stores. Works on a copy of the registers: lane 1
    /// moves to lane 2, then lanes 2 and 3 are written out.
    pub fn encode_bf16_pair(&self) -> [bf16; 2] {
        let mut register_form = *self;
        register_form.set_bf16_lane(2, register_form.bf16_lane(1));
        [register_form.bf16_lane(2), register_form.bf16_lane(3)]
    }
}
