//! Baseline Huffman entropy encoding.
//!
//! DC coefficients are coded as category + magnitude bits against a
//! per-component differential predictor; AC coefficients as (run, size)
//! pairs in zig-zag order with EOB and ZRL escapes. The same walk is used
//! twice: [`SymbolCounter`] gathers statistics in pass one of a two-pass
//! encode, [`EntropyEncoder`] emits bits.
//!
//! Reference: ITU-T T.81 Section F.1.2

use std::io::Write;

use crate::bitstream::BitWriter;
use crate::consts::{DCTSIZE2, JPEG_NATURAL_ORDER, MARKER_RST0};
use crate::huffman::{DerivedTable, FrequencyCounter};

/// EOB (End of Block): run 0, size 0.
const EOB: u8 = 0x00;

/// ZRL (Zero Run Length): sixteen zero coefficients.
const ZRL: u8 = 0xF0;

/// Bit category of a coefficient value (0 for 0, else position of the
/// highest set bit of |value|).
#[inline]
pub fn bit_category(value: i16) -> u8 {
    if value == 0 {
        0
    } else {
        (16 - value.unsigned_abs().leading_zeros()) as u8
    }
}

/// Magnitude bits for a value of category `nbits`: the value itself when
/// positive, value + 2^nbits - 1 when negative (T.81 F.1.2.1).
#[inline]
fn magnitude_bits(value: i16, nbits: u8) -> u16 {
    if value < 0 {
        (value as u16).wrapping_sub(1) & ((1u16 << nbits) - 1)
    } else {
        value as u16
    }
}

/// Entropy encoder for one interleaved baseline scan.
///
/// Owns the bit writer for the duration of the scan; callers take it back
/// with [`EntropyEncoder::into_writer`] to emit trailing markers.
pub struct EntropyEncoder<W: Write> {
    writer: BitWriter<W>,
    /// DC predictor per component.
    last_dc_val: [i16; 4],
    /// Next restart marker index (0-7, cycling).
    next_restart_num: u8,
}

impl<W: Write> EntropyEncoder<W> {
    /// Create an encoder writing through `writer`.
    pub fn new(writer: BitWriter<W>) -> Self {
        Self {
            writer,
            last_dc_val: [0; 4],
            next_restart_num: 0,
        }
    }

    /// Flush trailing bits and hand the writer back.
    pub fn into_writer(mut self) -> std::io::Result<BitWriter<W>> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Reset DC predictors (start of scan or after a restart).
    pub fn reset_dc(&mut self) {
        self.last_dc_val = [0; 4];
    }

    /// Flush to a byte boundary, emit the next RSTn, and reset predictors.
    pub fn emit_restart(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        self.writer
            .write_bytes(&[0xFF, MARKER_RST0 + self.next_restart_num])?;
        self.next_restart_num = (self.next_restart_num + 1) & 7;
        self.reset_dc();
        Ok(())
    }

    /// Encode one quantized block (natural order) for `component`.
    pub fn encode_block(
        &mut self,
        block: &[i16; DCTSIZE2],
        component: usize,
        dc_table: &DerivedTable,
        ac_table: &DerivedTable,
    ) -> std::io::Result<()> {
        // DC: differential category + magnitude bits.
        let dc = block[0];
        let diff = dc.wrapping_sub(self.last_dc_val[component]);
        self.last_dc_val[component] = dc;

        let nbits = bit_category(diff);
        let (code, size) = dc_table.get_code(nbits);
        self.writer.put_bits(code, size)?;
        if nbits > 0 {
            self.writer.put_bits(magnitude_bits(diff, nbits) as u32, nbits)?;
        }

        // AC: (run, size) pairs over zig-zag positions 1..63.
        let mut run = 0u8;
        for &natural_idx in JPEG_NATURAL_ORDER[1..].iter() {
            let coef = block[natural_idx];
            if coef == 0 {
                run += 1;
                continue;
            }
            while run >= 16 {
                let (code, size) = ac_table.get_code(ZRL);
                self.writer.put_bits(code, size)?;
                run -= 16;
            }
            let nbits = bit_category(coef);
            let (code, size) = ac_table.get_code((run << 4) | nbits);
            self.writer.put_bits(code, size)?;
            self.writer.put_bits(magnitude_bits(coef, nbits) as u32, nbits)?;
            run = 0;
        }
        if run > 0 {
            let (code, size) = ac_table.get_code(EOB);
            self.writer.put_bits(code, size)?;
        }
        Ok(())
    }

    /// Flush trailing bits with 1-padding.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// =============================================================================
// Pass-one statistics
// =============================================================================

/// Walks blocks exactly like [`EntropyEncoder`] but only counts symbols.
pub struct SymbolCounter {
    last_dc_val: [i16; 4],
}

impl Default for SymbolCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolCounter {
    /// Create a counter with cleared predictors.
    pub fn new() -> Self {
        Self { last_dc_val: [0; 4] }
    }

    /// Reset DC predictors (start of pass or restart boundary).
    pub fn reset_dc(&mut self) {
        self.last_dc_val = [0; 4];
    }

    /// Accumulate the symbols one block would emit.
    pub fn count_block(
        &mut self,
        block: &[i16; DCTSIZE2],
        component: usize,
        dc_counter: &mut FrequencyCounter,
        ac_counter: &mut FrequencyCounter,
    ) {
        let dc = block[0];
        let diff = dc.wrapping_sub(self.last_dc_val[component]);
        self.last_dc_val[component] = dc;
        dc_counter.count(bit_category(diff));

        let mut run = 0u8;
        for &natural_idx in JPEG_NATURAL_ORDER[1..].iter() {
            let coef = block[natural_idx];
            if coef == 0 {
                run += 1;
                continue;
            }
            while run >= 16 {
                ac_counter.count(ZRL);
                run -= 16;
            }
            ac_counter.count((run << 4) | bit_category(coef));
            run = 0;
        }
        if run > 0 {
            ac_counter.count(EOB);
        }
    }
}
