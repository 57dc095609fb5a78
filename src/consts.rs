//! Shared constants: block geometry, codec limits, marker codes, zig-zag
//! tables, and the ITU-T T.81 Annex K reference tables.

/// Width/height of a DCT block in samples.
pub const DCTSIZE: usize = 8;

/// Number of samples in a DCT block.
pub const DCTSIZE2: usize = 64;

/// Maximum number of components in a frame.
pub const MAX_COMPONENTS: usize = 4;

/// Maximum number of components in a single scan.
pub const MAX_COMPS_IN_SCAN: usize = 4;

/// Maximum number of Huffman table slots (4 DC + 4 AC).
pub const MAX_HUFF_TABLES: usize = 8;

/// Maximum number of quantization table slots.
pub const MAX_QUANT_TABLES: usize = 4;

/// Maximum number of data units in one interleaved MCU (T.81 B.2.3).
pub const MAX_BLOCKS_PER_MCU: usize = 10;

/// Largest supported image dimension, per side.
pub const MAX_DIMENSION: u32 = 16384;

/// Size of the decoder's buffered input window.
pub const IN_BUF_SIZE: usize = 8192;

/// Size of the encoder's buffered output window.
pub const OUT_BUF_SIZE: usize = 2048;

/// Maximum Huffman code length in bits.
pub const MAX_HUFF_CODE_LEN: usize = 16;

/// Largest DC difference category for 8-bit precision.
pub const MAX_DC_CATEGORY: u8 = 11;

/// Largest AC magnitude category for 8-bit precision.
pub const MAX_AC_CATEGORY: u8 = 10;

// =============================================================================
// Marker codes (the byte following 0xFF), T.81 Table B.1
// =============================================================================

pub const MARKER_TEM: u8 = 0x01;
pub const MARKER_SOF0: u8 = 0xC0;
pub const MARKER_SOF1: u8 = 0xC1;
pub const MARKER_SOF2: u8 = 0xC2;
pub const MARKER_SOF3: u8 = 0xC3;
pub const MARKER_DHT: u8 = 0xC4;
pub const MARKER_SOF5: u8 = 0xC5;
pub const MARKER_SOF6: u8 = 0xC6;
pub const MARKER_SOF7: u8 = 0xC7;
pub const MARKER_JPG: u8 = 0xC8;
pub const MARKER_SOF9: u8 = 0xC9;
pub const MARKER_SOF10: u8 = 0xCA;
pub const MARKER_SOF11: u8 = 0xCB;
pub const MARKER_DAC: u8 = 0xCC;
pub const MARKER_SOF13: u8 = 0xCD;
pub const MARKER_SOF14: u8 = 0xCE;
pub const MARKER_SOF15: u8 = 0xCF;
pub const MARKER_RST0: u8 = 0xD0;
pub const MARKER_RST7: u8 = 0xD7;
pub const MARKER_SOI: u8 = 0xD8;
pub const MARKER_EOI: u8 = 0xD9;
pub const MARKER_SOS: u8 = 0xDA;
pub const MARKER_DQT: u8 = 0xDB;
pub const MARKER_DNL: u8 = 0xDC;
pub const MARKER_DRI: u8 = 0xDD;
pub const MARKER_DHP: u8 = 0xDE;
pub const MARKER_EXP: u8 = 0xDF;
pub const MARKER_APP0: u8 = 0xE0;
pub const MARKER_APP15: u8 = 0xEF;
pub const MARKER_JPG0: u8 = 0xF0;
pub const MARKER_JPG13: u8 = 0xFD;
pub const MARKER_COM: u8 = 0xFE;

/// Returns true for RST0..=RST7.
#[inline]
pub const fn is_rst_marker(marker: u8) -> bool {
    marker >= MARKER_RST0 && marker <= MARKER_RST7
}

// =============================================================================
// Zig-zag ordering
// =============================================================================

/// Natural-order (row-major) index of the k-th zig-zag coefficient.
///
/// `block[JPEG_NATURAL_ORDER[k]]` walks a natural-order block in zig-zag
/// sequence. Position 0 is the DC coefficient.
pub const JPEG_NATURAL_ORDER: [usize; DCTSIZE2] = [
    0, 1, 8, 16, 9, 2, 3, 10,
    17, 24, 32, 25, 18, 11, 4, 5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13, 6, 7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Zig-zag position of the k-th natural-order coefficient (the inverse of
/// [`JPEG_NATURAL_ORDER`]).
pub const JPEG_ZIGZAG_ORDER: [usize; DCTSIZE2] = [
    0, 1, 5, 6, 14, 15, 27, 28,
    2, 4, 7, 13, 16, 26, 29, 42,
    3, 8, 12, 17, 25, 30, 41, 43,
    9, 11, 18, 24, 31, 40, 44, 53,
    10, 19, 23, 32, 39, 45, 52, 54,
    20, 22, 33, 38, 46, 51, 55, 60,
    21, 34, 37, 47, 50, 56, 59, 61,
    35, 36, 48, 49, 57, 58, 62, 63,
];

// =============================================================================
// Annex K quantization tables (natural order)
// =============================================================================

/// K.1 luminance reference table.
pub const STD_LUMA_QUANT: [u16; DCTSIZE2] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// K.2 chrominance reference table.
pub const STD_CHROMA_QUANT: [u16; DCTSIZE2] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

// =============================================================================
// Annex K Huffman tables
// =============================================================================

/// K.3 DC luminance code counts.
pub const STD_DC_LUMA_BITS: [u8; 17] = [0, 0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
/// K.3 DC luminance symbols.
pub const STD_DC_LUMA_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// K.4 DC chrominance code counts.
pub const STD_DC_CHROMA_BITS: [u8; 17] = [0, 0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
/// K.4 DC chrominance symbols.
pub const STD_DC_CHROMA_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// K.5 AC luminance code counts.
pub const STD_AC_LUMA_BITS: [u8; 17] = [0, 0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 125];
/// K.5 AC luminance symbols.
pub const STD_AC_LUMA_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
    0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, 0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52,
    0xD1, 0xF0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x25,
    0x26, 0x27, 0x28, 0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44, 0x45,
    0x46, 0x47, 0x48, 0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64,
    0x65, 0x66, 0x67, 0x68, 0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x83,
    0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
    0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6,
    0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3,
    0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8,
    0xE9, 0xEA, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA,
];

/// K.6 AC chrominance code counts.
pub const STD_AC_CHROMA_BITS: [u8; 17] = [0, 0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 119];
/// K.6 AC chrominance symbols.
pub const STD_AC_CHROMA_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61,
    0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xA1, 0xB1, 0xC1, 0x09, 0x23, 0x33,
    0x52, 0xF0, 0x15, 0x62, 0x72, 0xD1, 0x0A, 0x16, 0x24, 0x34, 0xE1, 0x25, 0xF1, 0x17, 0x18,
    0x19, 0x1A, 0x26, 0x27, 0x28, 0x29, 0x2A, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x43, 0x44,
    0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63,
    0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A,
    0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97,
    0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4,
    0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA,
    0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7,
    0xE8, 0xE9, 0xEA, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA,
];
