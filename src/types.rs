//! Core type definitions shared by the encoder and decoder.

use crate::consts::DCTSIZE2;

// =============================================================================
// Subsampling
// =============================================================================

/// Chroma subsampling mode for encoding.
///
/// The mode fixes the sampling factors of the luma component; chroma is
/// always sampled 1x1 relative to the MCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsampling {
    /// Grayscale output (single component, chroma discarded)
    Gray,
    /// 4:4:4 - no chroma subsampling
    S444,
    /// 4:2:2 - chroma halved horizontally
    S422,
    /// 4:2:0 - chroma halved in both directions (most common)
    #[default]
    S420,
}

impl Subsampling {
    /// Returns (h, v) sampling factors for the luma component.
    pub const fn luma_factors(self) -> (u8, u8) {
        match self {
            Subsampling::Gray | Subsampling::S444 => (1, 1),
            Subsampling::S422 => (2, 1),
            Subsampling::S420 => (2, 2),
        }
    }

    /// Number of components this mode encodes.
    pub const fn num_components(self) -> usize {
        match self {
            Subsampling::Gray => 1,
            _ => 3,
        }
    }

    /// Data units per MCU across all components.
    pub const fn blocks_per_mcu(self) -> usize {
        match self {
            Subsampling::Gray => 1,
            Subsampling::S444 => 3,
            Subsampling::S422 => 4,
            Subsampling::S420 => 6,
        }
    }
}

// =============================================================================
// JFIF pixel density
// =============================================================================

/// Pixel density written into the JFIF APP0 segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelDensity {
    /// 0 = no units (aspect ratio only), 1 = dots/inch, 2 = dots/cm
    pub unit: u8,
    /// Horizontal density
    pub x: u16,
    /// Vertical density
    pub y: u16,
}

impl Default for PixelDensity {
    /// 1:1 aspect ratio with no physical unit.
    fn default() -> Self {
        Self { unit: 0, x: 1, y: 1 }
    }
}

impl PixelDensity {
    /// Density in dots per inch.
    pub const fn dpi(dpi: u16) -> Self {
        Self { unit: 1, x: dpi, y: dpi }
    }
}

// =============================================================================
// Component info
// =============================================================================

/// Per-component coding parameters, as carried in SOF and SOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Component identifier on the wire (1=Y, 2=Cb, 3=Cr)
    pub component_id: u8,
    /// Horizontal sampling factor (1 or 2)
    pub h_samp_factor: u8,
    /// Vertical sampling factor (1 or 2)
    pub v_samp_factor: u8,
    /// Quantization table slot (0-3)
    pub quant_tbl_no: u8,
    /// DC Huffman table slot (0-3)
    pub dc_tbl_no: u8,
    /// AC Huffman table slot (0-3)
    pub ac_tbl_no: u8,
}

impl Default for ComponentInfo {
    fn default() -> Self {
        Self {
            component_id: 1,
            h_samp_factor: 1,
            v_samp_factor: 1,
            quant_tbl_no: 0,
            dc_tbl_no: 0,
            ac_tbl_no: 0,
        }
    }
}

// =============================================================================
// Quantization table
// =============================================================================

/// A quantization table with 64 coefficients in natural order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantTable {
    /// Quantization values in natural (row-major) order
    pub values: [u16; DCTSIZE2],
}

impl QuantTable {
    /// Create a new quantization table from natural-order values.
    pub const fn new(values: [u16; DCTSIZE2]) -> Self {
        Self { values }
    }
}

impl Default for QuantTable {
    fn default() -> Self {
        Self { values: [16; DCTSIZE2] }
    }
}

// =============================================================================
// Block type aliases
// =============================================================================

/// A single 8x8 block of DCT coefficients.
pub type DctBlock = [i16; DCTSIZE2];

/// A single 8x8 block of pixel samples.
pub type SampleBlock = [u8; DCTSIZE2];
