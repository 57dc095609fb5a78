//! Entropy decoding of scan data: the baseline block walk and the four
//! progressive passes (DC first/refine, AC first/refine with EOB runs).
//!
//! The geometry loops live in the decoder proper; this module owns the
//! per-scan coding state and the per-block bit work.
//!
//! Reference: ITU-T T.81 Sections F.2.2 and G.2.

use std::io::Read;

use crate::consts::{is_rst_marker, DCTSIZE2, JPEG_NATURAL_ORDER, MARKER_RST0};
use crate::error::{DecodeError, DecodeResult};
use crate::huffman::HuffDecodeTable;

use super::input::{EntropyBits, InputBuffer};

/// Sign-extend `bits` of category `size` (T.81 F.2.2.1 EXTEND).
#[inline]
fn extend(bits: u32, size: u8) -> i32 {
    if size > 0 && (bits as i32) < (1 << (size - 1)) {
        bits as i32 - (1 << size) + 1
    } else {
        bits as i32
    }
}

/// Per-scan entropy state: DC predictors, the EOB run, and restart
/// bookkeeping.
#[derive(Debug)]
pub struct ScanState {
    /// DC predictor per frame component.
    pub last_dc: [i16; 4],
    /// Remaining blocks covered by the current EOB run.
    pub eob_run: u32,
    /// Expected index of the next restart marker (0-7).
    pub next_restart_num: u8,
    /// MCUs left before the next expected restart; 0 when disabled.
    pub restarts_left: u32,
    /// Configured interval.
    pub restart_interval: u32,
}

impl ScanState {
    /// State for the start of a scan.
    pub fn new(restart_interval: u16) -> Self {
        Self {
            last_dc: [0; 4],
            eob_run: 0,
            next_restart_num: 0,
            restarts_left: restart_interval as u32,
            restart_interval: restart_interval as u32,
        }
    }
}

/// Borrowed context for decoding the blocks of one scan.
pub struct ScanContext<'a, R: Read> {
    pub input: &'a mut InputBuffer<R>,
    pub bits: &'a mut EntropyBits,
    pub state: &'a mut ScanState,
}

impl<'a, R: Read> ScanContext<'a, R> {
    /// Decode one Huffman symbol.
    #[inline]
    fn huff_decode(&mut self, table: &HuffDecodeTable) -> DecodeResult<u8> {
        let window = self.bits.peek16(self.input)?;
        match table.lookup(window) {
            Some((symbol, len)) => {
                self.bits.consume(len);
                Ok(symbol)
            }
            None => Err(DecodeError::Decode),
        }
    }

    #[inline]
    fn get_bits(&mut self, n: u8) -> DecodeResult<u32> {
        self.bits.get_bits(self.input, n)
    }

    /// Restart bookkeeping, called before each MCU: consumes the expected
    /// RSTn first when the interval has elapsed.
    pub fn restart_if_due(&mut self) -> DecodeResult<()> {
        if self.state.restart_interval > 0 {
            if self.state.restarts_left == 0 {
                self.process_restart()?;
            }
            self.state.restarts_left -= 1;
        }
        Ok(())
    }

    /// Consume the expected RSTn and reset coding state (T.81 F.2.1.3.1).
    pub fn process_restart(&mut self) -> DecodeResult<()> {
        // The marker usually got swept into the bit source during refill.
        let marker = match self.bits.take_pending_marker() {
            Some(m) => m,
            None => {
                // Otherwise it sits in the stream right after the pad
                // bits; tolerate stray fill bytes while hunting for it.
                let mut guard = 512;
                let mut b = self.input.read_u8()?;
                loop {
                    while b != 0xFF {
                        guard -= 1;
                        if guard == 0 {
                            return Err(DecodeError::BadRestartMarker);
                        }
                        b = self.input.read_u8()?;
                    }
                    let code = self.input.read_u8()?;
                    if code == 0x00 {
                        b = self.input.read_u8()?;
                        continue;
                    }
                    if code == 0xFF {
                        b = code;
                        continue;
                    }
                    break code;
                }
            }
        };

        if !is_rst_marker(marker) || marker - MARKER_RST0 != self.state.next_restart_num {
            return Err(DecodeError::BadRestartMarker);
        }

        self.state.next_restart_num = (self.state.next_restart_num + 1) & 7;
        self.state.last_dc = [0; 4];
        self.state.eob_run = 0;
        self.state.restarts_left = self.state.restart_interval;
        self.bits.reset();
        Ok(())
    }

    // =========================================================================
    // Baseline
    // =========================================================================

    /// Decode one complete baseline block into natural order.
    pub fn decode_block_baseline(
        &mut self,
        block: &mut [i16; DCTSIZE2],
        component: usize,
        dc_table: &HuffDecodeTable,
        ac_table: &HuffDecodeTable,
    ) -> DecodeResult<()> {
        block.fill(0);

        // DC difference.
        let s = self.huff_decode(dc_table)?;
        if s > 11 {
            return Err(DecodeError::Decode);
        }
        let diff = if s > 0 {
            let raw = self.get_bits(s)?;
            extend(raw, s) as i16
        } else {
            0
        };
        let dc = self.state.last_dc[component].wrapping_add(diff);
        self.state.last_dc[component] = dc;
        block[0] = dc;

        // AC run-length pairs.
        let mut k = 1usize;
        while k < DCTSIZE2 {
            let rs = self.huff_decode(ac_table)?;
            let r = (rs >> 4) as usize;
            let s = rs & 0x0F;
            if s == 0 {
                if r == 15 {
                    k += 16; // ZRL
                    continue;
                }
                break; // EOB
            }
            k += r;
            if k >= DCTSIZE2 || s > 10 {
                return Err(DecodeError::Decode);
            }
            let raw = self.get_bits(s)?;
            block[JPEG_NATURAL_ORDER[k]] = extend(raw, s) as i16;
            k += 1;
        }
        Ok(())
    }

    // =========================================================================
    // Progressive passes
    // =========================================================================

    /// DC first pass (Ah = 0): baseline DC shifted up by Al.
    pub fn decode_block_dc_first(
        &mut self,
        block: &mut [i16; DCTSIZE2],
        component: usize,
        dc_table: &HuffDecodeTable,
        al: u8,
    ) -> DecodeResult<()> {
        let s = self.huff_decode(dc_table)?;
        if s > 11 {
            return Err(DecodeError::Decode);
        }
        let diff = if s > 0 {
            let raw = self.get_bits(s)?;
            extend(raw, s) as i16
        } else {
            0
        };
        let dc = self.state.last_dc[component].wrapping_add(diff);
        self.state.last_dc[component] = dc;
        block[0] = dc.wrapping_shl(al as u32);
        Ok(())
    }

    /// DC refinement pass (Ah > 0): one correction bit per block.
    pub fn decode_block_dc_refine(
        &mut self,
        block: &mut [i16; DCTSIZE2],
        al: u8,
    ) -> DecodeResult<()> {
        if self.get_bits(1)? != 0 {
            block[0] |= 1i16.wrapping_shl(al as u32);
        }
        Ok(())
    }

    /// AC first pass over the band Ss..=Se.
    pub fn decode_block_ac_first(
        &mut self,
        block: &mut [i16; DCTSIZE2],
        ac_table: &HuffDecodeTable,
        ss: u8,
        se: u8,
        al: u8,
    ) -> DecodeResult<()> {
        if self.state.eob_run > 0 {
            self.state.eob_run -= 1;
            return Ok(());
        }
        let mut k = ss as usize;
        while k <= se as usize {
            let rs = self.huff_decode(ac_table)?;
            let r = (rs >> 4) as usize;
            let s = rs & 0x0F;
            if s == 0 {
                if r != 15 {
                    // EOBn: run of 2^r + extra blocks, this one included.
                    self.state.eob_run = (1 << r) - 1;
                    if r > 0 {
                        self.state.eob_run += self.get_bits(r as u8)?;
                    }
                    break;
                }
                k += 16; // ZRL
                continue;
            }
            k += r;
            if k > se as usize || s > 10 {
                return Err(DecodeError::Decode);
            }
            let raw = self.get_bits(s)?;
            block[JPEG_NATURAL_ORDER[k]] = (extend(raw, s) as i16).wrapping_shl(al as u32);
            k += 1;
        }
        Ok(())
    }

    /// AC refinement pass: corrections for known coefficients interleaved
    /// with newly significant ones.
    pub fn decode_block_ac_refine(
        &mut self,
        block: &mut [i16; DCTSIZE2],
        ac_table: &HuffDecodeTable,
        ss: u8,
        se: u8,
        al: u8,
    ) -> DecodeResult<()> {
        let p1 = 1i16.wrapping_shl(al as u32);
        let m1 = (-1i16).wrapping_shl(al as u32);
        let se = se as usize;
        let mut k = ss as usize;

        if self.state.eob_run == 0 {
            while k <= se {
                let rs = self.huff_decode(ac_table)?;
                let mut r = (rs >> 4) as usize;
                let s = rs & 0x0F;
                let mut new_value = 0i16;
                if s == 0 {
                    if r != 15 {
                        self.state.eob_run = 1 << r;
                        if r > 0 {
                            self.state.eob_run += self.get_bits(r as u8)?;
                        }
                        break;
                    }
                    // ZRL: advance over 16 zero-history coefficients.
                } else {
                    if s != 1 {
                        return Err(DecodeError::Decode);
                    }
                    new_value = if self.get_bits(1)? != 0 { p1 } else { m1 };
                }

                // Skip r zero-history coefficients, refining the nonzero
                // ones passed over.
                while k <= se {
                    let idx = JPEG_NATURAL_ORDER[k];
                    if block[idx] != 0 {
                        if self.get_bits(1)? != 0 && (block[idx] & p1) == 0 {
                            if block[idx] >= 0 {
                                block[idx] = block[idx].wrapping_add(p1);
                            } else {
                                block[idx] = block[idx].wrapping_add(m1);
                            }
                        }
                    } else {
                        if r == 0 {
                            break;
                        }
                        r -= 1;
                    }
                    k += 1;
                }

                if new_value != 0 && k <= se {
                    block[JPEG_NATURAL_ORDER[k]] = new_value;
                }
                k += 1;
            }
        }

        if self.state.eob_run > 0 {
            // Within an EOB run only correction bits appear.
            while k <= se {
                let idx = JPEG_NATURAL_ORDER[k];
                if block[idx] != 0 && self.get_bits(1)? != 0 && (block[idx] & p1) == 0 {
                    if block[idx] >= 0 {
                        block[idx] = block[idx].wrapping_add(p1);
                    } else {
                        block[idx] = block[idx].wrapping_add(m1);
                    }
                }
                k += 1;
            }
            self.state.eob_run -= 1;
        }
        Ok(())
    }
}
