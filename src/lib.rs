//! # jpeg-oxide
//!
//! A self-contained baseline/progressive JPEG codec in pure Rust: a JFIF
//! encoder and decoder with no unsafe code and no C dependencies.
//!
//! - **Encoder** - grayscale or RGB input, quality 1-100, 4:4:4 / 4:2:2 /
//!   4:2:0 chroma subsampling, optional two-pass Huffman optimization,
//!   optional restart intervals. Always emits a single interleaved
//!   baseline (SOF0) scan.
//! - **Decoder** - baseline (SOF0) and progressive (SOF2) streams, 8-bit
//!   precision, grayscale and YCbCr, sampling factors up to 2x2, restart
//!   markers, scanline-at-a-time output.
//!
//! ## Encoding
//!
//! ```no_run
//! use jpeg_oxide::{Encoder, Subsampling};
//!
//! # fn main() -> Result<(), jpeg_oxide::Error> {
//! let rgb: Vec<u8> = vec![0; 640 * 480 * 3];
//! let jpeg = Encoder::new()
//!     .quality(85)
//!     .subsampling(Subsampling::S420)
//!     .optimize_huffman(true)
//!     .encode_rgb(&rgb, 640, 480)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Decoding
//!
//! ```no_run
//! use jpeg_oxide::Decoder;
//!
//! # fn main() -> Result<(), jpeg_oxide::DecodeError> {
//! # let jpeg_bytes: Vec<u8> = vec![];
//! let mut decoder = Decoder::new(std::io::Cursor::new(jpeg_bytes))?;
//! println!("{}x{}", decoder.width(), decoder.height());
//! while let Some(scanline) = decoder.decode_scanline()? {
//!     // 1 byte/px for grayscale, 4 bytes/px RGBA for color
//!     let _ = scanline;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Whole-image helpers ([`compress_to_memory`], [`compress_to_file`],
//! [`decompress_from_memory`], [`decompress_from_file`]) wrap the two
//! streaming pipelines for the common cases.

#![deny(unsafe_code)]

// Core public modules - stable API
pub mod consts;
pub mod decode;
pub mod encode;
pub mod error;
pub mod quant;
pub mod types;

// Implementation modules - accessible for tests and advanced use, but not
// part of the stable API.
#[doc(hidden)]
pub mod bitstream;
#[doc(hidden)]
pub mod color;
#[doc(hidden)]
pub mod dct;
#[doc(hidden)]
pub mod entropy;
#[doc(hidden)]
pub mod huffman;
#[doc(hidden)]
pub mod idct;
#[doc(hidden)]
pub mod marker;
#[doc(hidden)]
pub mod sample;

// =============================================================================
// Primary API
// =============================================================================

/// The configurable JPEG encoder.
pub use encode::Encoder;

/// Active scanline-at-a-time encoding session.
pub use encode::EncodingStream;

/// Whole-image compression helpers.
pub use encode::{compress_to_file, compress_to_memory};

/// The streaming JPEG decoder.
pub use decode::Decoder;

/// Decoder tuning options.
pub use decode::DecoderOptions;

/// Whole-image decompression helpers.
pub use decode::{decompress_from_file, decompress_from_memory, DecodedInfo};

/// Error types.
pub use error::{DecodeError, DecodeResult, Error, Result};

/// Image configuration types.
pub use types::{PixelDensity, Subsampling};

// =============================================================================
// Secondary API
// =============================================================================

/// Block-level type aliases.
pub use types::{DctBlock, QuantTable, SampleBlock};

/// Core block geometry constants.
pub use consts::{DCTSIZE, DCTSIZE2};

/// Quantization table scaling.
pub use quant::{create_quant_table, quality_to_scale_factor};

/// Forward and inverse transforms for custom pipelines.
pub use dct::{forward_dct_8x8, level_shift};
pub use idct::inverse_dct_8x8;

/// Single-pixel color conversions.
pub use color::{rgb_to_gray, rgb_to_ycbcr};
