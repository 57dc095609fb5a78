//! The JPEG encoder: configuration builder, frame planning, and batch
//! entry points.
//!
//! The encoder always emits a single interleaved baseline (SOF0) scan.
//! With `optimize_huffman` enabled it runs two passes over the image: the
//! first gathers symbol statistics, the second emits the stream with
//! tables built from them.

mod streaming;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::consts::{MAX_DIMENSION, OUT_BUF_SIZE};
use crate::error::{Error, Result};
use crate::quant::{chroma_quant_table, luma_quant_table};
use crate::types::{ComponentInfo, PixelDensity, QuantTable, Subsampling};

pub use streaming::EncodingStream;

/// JPEG encoder configuration.
///
/// ```no_run
/// use jpeg_oxide::{Encoder, Subsampling};
///
/// # fn main() -> Result<(), jpeg_oxide::Error> {
/// let rgb: Vec<u8> = vec![0; 640 * 480 * 3];
/// let jpeg = Encoder::new()
///     .quality(85)
///     .subsampling(Subsampling::S420)
///     .optimize_huffman(true)
///     .encode_rgb(&rgb, 640, 480)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
    quality: u8,
    subsampling: Subsampling,
    optimize_huffman: bool,
    no_chroma_discrim: bool,
    restart_interval: u16,
    pixel_density: PixelDensity,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Default configuration: quality 75, 4:2:0, fixed Annex K Huffman
    /// tables.
    pub fn new() -> Self {
        Self {
            quality: 75,
            subsampling: Subsampling::S420,
            optimize_huffman: false,
            no_chroma_discrim: false,
            restart_interval: 0,
            pixel_density: PixelDensity::default(),
        }
    }

    /// Set quality (1-100, clamped).
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Set the chroma subsampling mode.
    pub fn subsampling(mut self, mode: Subsampling) -> Self {
        self.subsampling = mode;
        self
    }

    /// Enable two-pass encoding with Huffman tables fitted to the image.
    pub fn optimize_huffman(mut self, enable: bool) -> Self {
        self.optimize_huffman = enable;
        self
    }

    /// Reuse the luminance quantization table for chroma.
    pub fn no_chroma_discrim(mut self, enable: bool) -> Self {
        self.no_chroma_discrim = enable;
        self
    }

    /// Emit RSTn markers every `interval` MCUs (0 disables).
    pub fn restart_interval(mut self, interval: u16) -> Self {
        self.restart_interval = interval;
        self
    }

    /// Set the pixel density recorded in the JFIF header.
    pub fn pixel_density(mut self, density: PixelDensity) -> Self {
        self.pixel_density = density;
        self
    }

    /// Encode interleaved RGB (3 bytes per pixel) to an in-memory JPEG.
    pub fn encode_rgb(&self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        self.encode_to_memory(rgb, width, height, 3)
    }

    /// Encode a grayscale image (1 byte per pixel) to an in-memory JPEG.
    ///
    /// The output is single-component regardless of the configured
    /// subsampling mode.
    pub fn encode_gray(&self, gray: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        self.encode_to_memory(gray, width, height, 1)
    }

    /// Encode `channels`-interleaved pixels (1, 3, or 4; alpha discarded)
    /// to an in-memory JPEG.
    pub fn encode_to_memory(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_to_writer(pixels, width, height, channels, &mut out)?;
        Ok(out)
    }

    /// Encode to an arbitrary sink, driving the streaming encoder over the
    /// whole image once per pass.
    pub fn encode_to_writer<W: Write>(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u8,
        writer: W,
    ) -> Result<()> {
        let bytes_per_pixel = channels as usize;
        let expected = width as usize * height as usize * bytes_per_pixel;
        if pixels.len() != expected {
            return Err(Error::BufferSizeMismatch { expected, actual: pixels.len() });
        }

        let mut stream = self.streaming(writer, width, height, channels)?;
        let stride = width as usize * bytes_per_pixel;
        for _ in 0..stream.total_passes() {
            for row in pixels.chunks_exact(stride) {
                stream.process_scanline(row)?;
            }
        }
        stream.finish()?;
        Ok(())
    }

    /// Start a scanline-at-a-time encoding session.
    ///
    /// Feed exactly `height` scanlines per pass, for
    /// [`EncodingStream::total_passes`] passes, then call
    /// [`EncodingStream::finish`].
    pub fn streaming<W: Write>(
        &self,
        writer: W,
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<EncodingStream<W>> {
        let plan = FramePlan::new(self, width, height, channels)?;
        EncodingStream::start(plan, self.clone(), writer)
    }
}

// =============================================================================
// Frame planner
// =============================================================================

/// Geometry and tables derived from the encoder configuration and the
/// image dimensions.
#[derive(Debug, Clone)]
pub(crate) struct FramePlan {
    pub width: u32,
    pub height: u32,
    /// Source bytes per pixel (1, 3, or 4).
    pub channels: u8,
    /// Effective mode; grayscale sources always collapse to `Gray`.
    pub subsampling: Subsampling,
    /// Padded width in pixels (multiple of the MCU width).
    pub mcu_width: usize,
    /// MCUs per row.
    pub mcus_per_row: usize,
    /// MCU rows in the image.
    pub mcu_rows: usize,
    /// Pixel rows per MCU row (8 or 16).
    pub rows_per_mcu: usize,
    /// Frame components in SOF order.
    pub components: Vec<ComponentInfo>,
    /// Luma and chroma quantization tables (chroma unused for grayscale).
    pub quant: [QuantTable; 2],
}

impl FramePlan {
    pub fn new(encoder: &Encoder, width: u32, height: u32, channels: u8) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(Error::InvalidDimensions { width, height });
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(Error::InvalidChannelCount(channels));
        }

        // A single-channel source has no chroma to subsample.
        let subsampling = if channels == 1 { Subsampling::Gray } else { encoder.subsampling };
        let (h_max, v_max) = subsampling.luma_factors();

        let mcu_px_w = 8 * h_max as usize;
        let mcu_px_h = 8 * v_max as usize;
        let mcus_per_row = (width as usize).div_ceil(mcu_px_w);
        let mcu_rows = (height as usize).div_ceil(mcu_px_h);

        let components = if subsampling == Subsampling::Gray {
            vec![ComponentInfo { component_id: 1, ..Default::default() }]
        } else {
            vec![
                ComponentInfo {
                    component_id: 1,
                    h_samp_factor: h_max,
                    v_samp_factor: v_max,
                    quant_tbl_no: 0,
                    dc_tbl_no: 0,
                    ac_tbl_no: 0,
                },
                ComponentInfo {
                    component_id: 2,
                    h_samp_factor: 1,
                    v_samp_factor: 1,
                    quant_tbl_no: 1,
                    dc_tbl_no: 1,
                    ac_tbl_no: 1,
                },
                ComponentInfo {
                    component_id: 3,
                    h_samp_factor: 1,
                    v_samp_factor: 1,
                    quant_tbl_no: 1,
                    dc_tbl_no: 1,
                    ac_tbl_no: 1,
                },
            ]
        };

        let luma = luma_quant_table(encoder.quality);
        let chroma = if encoder.no_chroma_discrim {
            luma
        } else {
            chroma_quant_table(encoder.quality)
        };

        Ok(Self {
            width,
            height,
            channels,
            subsampling,
            mcu_width: mcus_per_row * mcu_px_w,
            mcus_per_row,
            mcu_rows,
            rows_per_mcu: mcu_px_h,
            components,
            quant: [luma, chroma],
        })
    }

    /// True when the frame is single-component.
    pub fn is_gray(&self) -> bool {
        self.subsampling == Subsampling::Gray
    }
}

// =============================================================================
// Whole-image convenience entry points
// =============================================================================

/// Compress raw pixels to an in-memory JPEG stream.
pub fn compress_to_memory(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u8,
    encoder: &Encoder,
) -> Result<Vec<u8>> {
    encoder.encode_to_memory(pixels, width, height, channels)
}

/// Compress raw pixels straight to a file.
///
/// Produces byte-identical output to [`compress_to_memory`] followed by a
/// plain write of the buffer.
pub fn compress_to_file<P: AsRef<Path>>(
    path: P,
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u8,
    encoder: &Encoder,
) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(OUT_BUF_SIZE, file);
    encoder.encode_to_writer(pixels, width, height, channels, &mut writer)?;
    writer.flush()?;
    Ok(())
}
