//! Scanline-at-a-time encoding session.
//!
//! [`EncodingStream`] accepts exactly `height` scanlines per pass. In
//! single-pass mode the headers go out immediately and every MCU row is
//! entropy coded as soon as it is complete. In two-pass mode the first
//! pass only accumulates symbol frequencies; headers (carrying the fitted
//! tables) and coded data are produced during the second pass.

use std::io::Write;
use std::mem;

use crate::bitstream::BitWriter;
use crate::consts::{DCTSIZE2, MARKER_EOI};
use crate::dct::forward_dct_8x8;
use crate::entropy::{EntropyEncoder, SymbolCounter};
use crate::error::{Error, Result};
use crate::huffman::{build_optimal_table, DerivedTable, FrequencyCounter, HuffTable};
use crate::marker::MarkerWriter;
use crate::quant::quantize_block;
use crate::sample::{Plane, RowBuffer};
use crate::types::Subsampling;

use super::{Encoder, FramePlan};

/// Where output currently goes.
enum Sink<W: Write> {
    /// Counting pass: the sink is parked until headers are written.
    Counting(W),
    /// Emitting pass: entropy coder over the sink.
    Coding(EntropyEncoder<W>),
    /// Transient state during transitions.
    Taken,
}

/// An active scanline-at-a-time encoding session.
///
/// Created by [`Encoder::streaming`]. Feed `height` scanlines per pass for
/// [`total_passes`](Self::total_passes) passes, then call
/// [`finish`](Self::finish).
pub struct EncodingStream<W: Write> {
    plan: FramePlan,
    config: Encoder,
    sink: Sink<W>,
    row_buffer: RowBuffer,
    /// Current pass, 1-based.
    pass: u8,
    total_passes: u8,
    /// Scanlines received in the current pass.
    rows_received: u32,
    /// MCUs processed in the current pass.
    mcus_done: usize,
    /// True once the last pass has consumed its final scanline.
    complete: bool,
    /// Set by the first failure; every later call fails fast. Output
    /// already emitted before the error must not be trusted.
    failed: bool,
    counter: SymbolCounter,
    /// DC luma, AC luma, DC chroma, AC chroma.
    freqs: [FrequencyCounter; 4],
    /// Table specifications currently in effect, same order.
    specs: [HuffTable; 4],
    /// Derived code tables, same order.
    derived: [DerivedTable; 4],
}

impl<W: Write> EncodingStream<W> {
    pub(super) fn start(plan: FramePlan, config: Encoder, writer: W) -> Result<Self> {
        let specs = [
            HuffTable::std_dc_luma(),
            HuffTable::std_ac_luma(),
            HuffTable::std_dc_chroma(),
            HuffTable::std_ac_chroma(),
        ];
        let derived = [
            DerivedTable::derive(&specs[0])?,
            DerivedTable::derive(&specs[1])?,
            DerivedTable::derive(&specs[2])?,
            DerivedTable::derive(&specs[3])?,
        ];
        let row_buffer = RowBuffer::new(
            plan.width as usize,
            plan.mcu_width,
            plan.rows_per_mcu,
            plan.is_gray(),
        );
        let total_passes = if config.optimize_huffman { 2 } else { 1 };

        let sink = if total_passes == 1 {
            // Fixed tables: the headers can go out right away.
            let w = write_headers(writer, &plan, &config, &specs)?;
            Sink::Coding(EntropyEncoder::new(BitWriter::new(w)))
        } else {
            Sink::Counting(writer)
        };

        Ok(Self {
            plan,
            config,
            sink,
            row_buffer,
            pass: 1,
            total_passes,
            rows_received: 0,
            mcus_done: 0,
            complete: false,
            failed: false,
            counter: SymbolCounter::new(),
            freqs: [
                FrequencyCounter::new(),
                FrequencyCounter::new(),
                FrequencyCounter::new(),
                FrequencyCounter::new(),
            ],
            specs,
            derived,
        })
    }

    /// Number of passes the caller must feed (1, or 2 with Huffman
    /// optimization).
    pub fn total_passes(&self) -> u8 {
        self.total_passes
    }

    /// The pass currently being fed, 1-based.
    pub fn current_pass(&self) -> u8 {
        self.pass
    }

    /// Feed the next scanline of the current pass.
    ///
    /// After any failure the stream is poisoned: every further call
    /// fails, and bytes already written to the sink must be discarded.
    pub fn process_scanline(&mut self, scanline: &[u8]) -> Result<()> {
        if self.failed {
            return Err(Error::InternalError("encoding stream already failed"));
        }
        match self.process_scanline_inner(scanline) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn process_scanline_inner(&mut self, scanline: &[u8]) -> Result<()> {
        if self.complete {
            return Err(Error::ScanlineCountMismatch {
                expected: self.plan.height,
                received: self.rows_received + 1,
            });
        }
        let expected = self.plan.width as usize * self.plan.channels as usize;
        if scanline.len() < expected {
            return Err(Error::BufferSizeMismatch { expected, actual: scanline.len() });
        }

        self.row_buffer.push_scanline(scanline, self.plan.channels as usize);
        self.rows_received += 1;

        let last_row = self.rows_received == self.plan.height;
        if self.row_buffer.is_full() {
            self.flush_mcu_row()?;
        } else if last_row {
            self.row_buffer.pad_to_full();
            self.flush_mcu_row()?;
        }
        if last_row {
            self.end_pass()?;
        }
        Ok(())
    }

    /// Complete the stream and return the sink.
    ///
    /// Fails unless every pass has received all of its scanlines.
    pub fn finish(self) -> Result<W> {
        if self.failed {
            return Err(Error::InternalError("encoding stream already failed"));
        }
        if !self.complete {
            return Err(Error::ScanlineCountMismatch {
                expected: self.plan.height,
                received: self.rows_received,
            });
        }
        match self.sink {
            Sink::Coding(coder) => {
                let mut writer = coder.into_writer()?;
                writer.write_bytes(&[0xFF, MARKER_EOI])?;
                Ok(writer.into_inner())
            }
            _ => Err(Error::InternalError("finish called in counting state")),
        }
    }

    /// Code or count one buffered MCU row.
    fn flush_mcu_row(&mut self) -> Result<()> {
        let interval = self.config.restart_interval as usize;
        for mcu in 0..self.plan.mcus_per_row {
            if interval > 0 && self.mcus_done > 0 && self.mcus_done % interval == 0 {
                match &mut self.sink {
                    Sink::Counting(_) => self.counter.reset_dc(),
                    Sink::Coding(coder) => coder.emit_restart()?,
                    Sink::Taken => return Err(Error::InternalError("sink taken")),
                }
            }
            self.process_mcu(mcu)?;
            self.mcus_done += 1;
        }
        self.row_buffer.reset();
        Ok(())
    }

    /// Transform and code the blocks of one MCU in interleaved order.
    fn process_mcu(&mut self, mcu: usize) -> Result<()> {
        let mut samples = [0i16; DCTSIZE2];
        match self.plan.subsampling {
            Subsampling::Gray => {
                self.row_buffer.load_block_8x8(Plane::Y, mcu, 0, &mut samples);
                self.code_block(&samples, 0)?;
            }
            Subsampling::S444 => {
                for (plane, comp) in [(Plane::Y, 0), (Plane::Cb, 1), (Plane::Cr, 2)] {
                    self.row_buffer.load_block_8x8(plane, mcu, 0, &mut samples);
                    self.code_block(&samples, comp)?;
                }
            }
            Subsampling::S422 => {
                for dx in 0..2 {
                    self.row_buffer.load_block_8x8(Plane::Y, mcu * 2 + dx, 0, &mut samples);
                    self.code_block(&samples, 0)?;
                }
                for (plane, comp) in [(Plane::Cb, 1), (Plane::Cr, 2)] {
                    self.row_buffer.load_block_16x8(plane, mcu, &mut samples);
                    self.code_block(&samples, comp)?;
                }
            }
            Subsampling::S420 => {
                for dy in 0..2 {
                    for dx in 0..2 {
                        self.row_buffer
                            .load_block_8x8(Plane::Y, mcu * 2 + dx, dy, &mut samples);
                        self.code_block(&samples, 0)?;
                    }
                }
                for (plane, comp) in [(Plane::Cb, 1), (Plane::Cr, 2)] {
                    self.row_buffer.load_block_16x16(plane, mcu, &mut samples);
                    self.code_block(&samples, comp)?;
                }
            }
        }
        Ok(())
    }

    /// DCT + quantize one block, then count or emit its symbols.
    fn code_block(&mut self, samples: &[i16; DCTSIZE2], component: usize) -> Result<()> {
        let mut coeffs = [0i32; DCTSIZE2];
        forward_dct_8x8(samples, &mut coeffs);

        let quant = &self.plan.quant[if component == 0 { 0 } else { 1 }];
        let mut quantized = [0i16; DCTSIZE2];
        quantize_block(&coeffs, quant, &mut quantized);

        match &mut self.sink {
            Sink::Counting(_) => {
                let (luma, chroma) = self.freqs.split_at_mut(2);
                let (dc_freq, ac_freq) = if component == 0 {
                    let (a, b) = luma.split_at_mut(1);
                    (&mut a[0], &mut b[0])
                } else {
                    let (a, b) = chroma.split_at_mut(1);
                    (&mut a[0], &mut b[0])
                };
                self.counter.count_block(&quantized, component, dc_freq, ac_freq);
                Ok(())
            }
            Sink::Coding(coder) => {
                let (dc, ac) = if component == 0 {
                    (&self.derived[0], &self.derived[1])
                } else {
                    (&self.derived[2], &self.derived[3])
                };
                coder.encode_block(&quantized, component, dc, ac)?;
                Ok(())
            }
            Sink::Taken => Err(Error::InternalError("sink taken")),
        }
    }

    /// Wrap up a pass: switch from counting to coding, or mark complete.
    fn end_pass(&mut self) -> Result<()> {
        if self.pass < self.total_passes {
            // Fit tables to the gathered statistics and emit the headers.
            // Grayscale frames never touch the chroma slots.
            self.specs[0] = build_optimal_table(&self.freqs[0])?;
            self.specs[1] = build_optimal_table(&self.freqs[1])?;
            if !self.plan.is_gray() {
                self.specs[2] = build_optimal_table(&self.freqs[2])?;
                self.specs[3] = build_optimal_table(&self.freqs[3])?;
            }
            self.derived = [
                DerivedTable::derive(&self.specs[0])?,
                DerivedTable::derive(&self.specs[1])?,
                DerivedTable::derive(&self.specs[2])?,
                DerivedTable::derive(&self.specs[3])?,
            ];
            let writer = match mem::replace(&mut self.sink, Sink::Taken) {
                Sink::Counting(w) => w,
                _ => return Err(Error::InternalError("bad sink state at pass end")),
            };
            let writer = write_headers(writer, &self.plan, &self.config, &self.specs)?;
            self.sink = Sink::Coding(EntropyEncoder::new(BitWriter::new(writer)));

            self.pass += 1;
            self.rows_received = 0;
            self.mcus_done = 0;
            self.counter = SymbolCounter::new();
            self.row_buffer.reset();
        } else {
            self.complete = true;
        }
        Ok(())
    }
}

/// Emit everything up to and including SOS.
fn write_headers<W: Write>(
    writer: W,
    plan: &FramePlan,
    config: &Encoder,
    specs: &[HuffTable; 4],
) -> Result<W> {
    let mut markers = MarkerWriter::new(writer);
    markers.write_soi()?;
    markers.write_jfif_app0(config.pixel_density)?;
    markers.write_dqt(0, &plan.quant[0])?;
    if !plan.is_gray() {
        markers.write_dqt(1, &plan.quant[1])?;
    }
    markers.write_sof0(plan.width as u16, plan.height as u16, &plan.components)?;
    markers.write_dht(0, false, &specs[0])?;
    markers.write_dht(0, true, &specs[1])?;
    if !plan.is_gray() {
        markers.write_dht(1, false, &specs[2])?;
        markers.write_dht(1, true, &specs[3])?;
    }
    markers.write_dri(config.restart_interval)?;
    markers.write_sos(&plan.components)?;
    Ok(markers.into_inner())
}
