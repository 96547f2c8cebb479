//! IR LED blink pattern decoding.
//!
//! The headset reports each LED's blink pattern as ten 2-bit symbols, symbol `i`
//! at bits `2i..2i+2`. A symbol is either `01` (dark) or `11` (bright); the
//! decoded pattern has bit `i` set iff symbol `i` is bright.

use crate::error::DecodeError;

/// Symbols per blink pattern.
pub const PATTERN_LENGTH: u8 = 10;

const LOW_BITS: u32 = 0x55555;
const HIGH_BITS: u32 = 0xaaaaa;

/// Decodes a packed blink pattern into a 10-bit sequence.
pub fn decode_pattern(length: u8, packed: u32) -> Result<u16, DecodeError> {
    if length != PATTERN_LENGTH || packed & !HIGH_BITS != LOW_BITS {
        return Err(DecodeError::InvalidPattern {
            length,
            pattern: packed,
        });
    }

    // Gather the high bit of every symbol, halving the stride each pass.
    let mut x = (packed >> 1) & 0x5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333;
    x = (x | (x >> 2)) & 0x0f0f_0f0f;
    x = (x | (x >> 4)) & 0x00ff_00ff;
    x = (x | (x >> 8)) & 0x0000_ffff;
    Ok((x & 0x3ff) as u16)
}

/// Packs a 10-bit sequence into the bright/dark symbol format.
pub fn encode_pattern(bits: u16) -> u32 {
    (0..PATTERN_LENGTH as u32).fold(0, |packed, i| {
        let symbol = if bits & (1 << i) != 0 { 0b11 } else { 0b01 };
        packed | symbol << (2 * i)
    })
}
