//! Inverse DCT for the decoder.
//!
//! The 8x8 path mirrors the forward transform in `dct.rs`: the
//! Loeffler-Ligtenberg-Moschytz network with 13-bit fixed-point rotation
//! constants, columns then rows. Input is dequantized coefficients
//! (quantized value times table entry); output is clamped 8-bit samples
//! with the 128 level shift restored.
//!
//! The 16x16 path implements frequency-domain chroma upsampling: the 64
//! coefficients are treated as the low band of a double-size transform
//! and evaluated at the 16 half-sample phases directly, which upsamples
//! 2:1 in both directions without a separate filter.

use crate::consts::{DCTSIZE, DCTSIZE2};

const CONST_BITS: i32 = 13;
const PASS1_BITS: i32 = 2;

const FIX_0_298631336: i32 = 2446;
const FIX_0_390180644: i32 = 3196;
const FIX_0_541196100: i32 = 4433;
const FIX_0_765366865: i32 = 6270;
const FIX_0_899976223: i32 = 7373;
const FIX_1_175875602: i32 = 9633;
const FIX_1_501321110: i32 = 12299;
const FIX_1_847759065: i32 = 15137;
const FIX_1_961570560: i32 = 16069;
const FIX_2_053119869: i32 = 16819;
const FIX_2_562915447: i32 = 20995;
const FIX_3_072711026: i32 = 25172;

/// Width of the upsampled output block.
pub const UPSAMPLE_SIZE: usize = 16;

/// Samples in the upsampled output block.
pub const UPSAMPLE_SIZE2: usize = 256;

/// Right-shift with rounding.
///
/// Widened arithmetic throughout: dequantized coefficients from a hostile
/// stream can reach i16::MAX * 255, and the rotation products must not
/// wrap.
#[inline]
fn descale(x: i64, n: i32) -> i32 {
    ((x + (1i64 << (n - 1))) >> n).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Saturate a reconstructed sample to the 8-bit range.
#[inline]
pub fn clamp_sample(x: i32) -> u8 {
    x.clamp(0, 255) as u8
}

/// One 1-D LLM inverse pass over eight values.
///
/// `shift` removes the fixed-point scale appropriate to the pass.
#[inline]
fn idct_1d(inp: [i32; 8], shift: i32) -> [i32; 8] {
    // Even part
    let z2 = inp[2] as i64;
    let z3 = inp[6] as i64;
    let z1 = (z2 + z3) * FIX_0_541196100 as i64;
    let tmp2 = z1 + z3 * -(FIX_1_847759065 as i64);
    let tmp3 = z1 + z2 * FIX_0_765366865 as i64;

    let z2 = inp[0] as i64;
    let z3 = inp[4] as i64;
    let tmp0 = (z2 + z3) << CONST_BITS;
    let tmp1 = (z2 - z3) << CONST_BITS;

    let tmp10 = tmp0 + tmp3;
    let tmp13 = tmp0 - tmp3;
    let tmp11 = tmp1 + tmp2;
    let tmp12 = tmp1 - tmp2;

    // Odd part
    let tmp0 = inp[7] as i64;
    let tmp1 = inp[5] as i64;
    let tmp2 = inp[3] as i64;
    let tmp3 = inp[1] as i64;

    let z1 = tmp0 + tmp3;
    let z2 = tmp1 + tmp2;
    let z3 = tmp0 + tmp2;
    let z4 = tmp1 + tmp3;
    let z5 = (z3 + z4) * FIX_1_175875602 as i64;

    let tmp0 = tmp0 * FIX_0_298631336 as i64;
    let tmp1 = tmp1 * FIX_2_053119869 as i64;
    let tmp2 = tmp2 * FIX_3_072711026 as i64;
    let tmp3 = tmp3 * FIX_1_501321110 as i64;
    let z1 = z1 * -(FIX_0_899976223 as i64);
    let z2 = z2 * -(FIX_2_562915447 as i64);
    let z3 = z3 * -(FIX_1_961570560 as i64) + z5;
    let z4 = z4 * -(FIX_0_390180644 as i64) + z5;

    let tmp0 = tmp0 + z1 + z3;
    let tmp1 = tmp1 + z2 + z4;
    let tmp2 = tmp2 + z2 + z3;
    let tmp3 = tmp3 + z1 + z4;

    [
        descale(tmp10 + tmp3, shift),
        descale(tmp11 + tmp2, shift),
        descale(tmp12 + tmp1, shift),
        descale(tmp13 + tmp0, shift),
        descale(tmp13 - tmp0, shift),
        descale(tmp12 - tmp1, shift),
        descale(tmp11 - tmp2, shift),
        descale(tmp10 - tmp3, shift),
    ]
}

/// Inverse DCT of one dequantized 8x8 block into clamped samples.
///
/// Input is row-major at the encoder's divided-by-8 scale; output restores
/// the 128 level shift.
pub fn inverse_dct_8x8(coeffs: &[i32; DCTSIZE2], out: &mut [u8; DCTSIZE2]) {
    let mut work = [0i32; DCTSIZE2];

    // Pass 1: columns, keeping PASS1_BITS of extra precision.
    for col in 0..DCTSIZE {
        let mut v = [0i32; 8];
        for row in 0..DCTSIZE {
            v[row] = coeffs[row * DCTSIZE + col];
        }
        let r = idct_1d(v, CONST_BITS - PASS1_BITS);
        for row in 0..DCTSIZE {
            work[row * DCTSIZE + col] = r[row];
        }
    }

    // Pass 2: rows, removing the remaining scale plus the transform's
    // factor of 8, then restoring the level shift.
    for row in 0..DCTSIZE {
        let mut v = [0i32; 8];
        v.copy_from_slice(&work[row * DCTSIZE..row * DCTSIZE + 8]);
        let r = idct_1d(v, CONST_BITS + PASS1_BITS + 3);
        for col in 0..DCTSIZE {
            out[row * DCTSIZE + col] = clamp_sample(r[col].saturating_add(128));
        }
    }
}

// =============================================================================
// Frequency-domain 2x upsampling IDCT
// =============================================================================

/// Half-sample-phase inverse basis: `UPSAMPLE_BASIS[x][u]` =
/// round(C(u)/2 * cos((2x+1) * u * PI / 32) * 2^13), the 8-point inverse
/// basis evaluated on the 16-sample grid.
const UPSAMPLE_BASIS: [[i32; 8]; UPSAMPLE_SIZE] = [
    [2896, 4076, 4017, 3920, 3784, 3612, 3406, 3166],
    [2896, 3920, 3406, 2598, 1567, 401, -799, -1931],
    [2896, 3612, 2276, 401, -1567, -3166, -4017, -3920],
    [2896, 3166, 799, -1931, -3784, -3920, -2276, 401],
    [2896, 2598, -799, -3612, -3784, -1189, 2276, 4076],
    [2896, 1931, -2276, -4076, -1567, 2598, 4017, 1189],
    [2896, 1189, -3406, -3166, 1567, 4076, 799, -3612],
    [2896, 401, -4017, -1189, 3784, 1931, -3406, -2598],
    [2896, -401, -4017, 1189, 3784, -1931, -3406, 2598],
    [2896, -1189, -3406, 3166, 1567, -4076, 799, 3612],
    [2896, -1931, -2276, 4076, -1567, -2598, 4017, -1189],
    [2896, -2598, -799, 3612, -3784, 1189, 2276, -4076],
    [2896, -3166, 799, 1931, -3784, 3920, -2276, -401],
    [2896, -3612, 2276, -401, -1567, 3166, -4017, 3920],
    [2896, -3920, 3406, -2598, 1567, -401, -799, 1931],
    [2896, -4076, 4017, -3920, 3784, -3612, 3406, -3166],
];

/// Inverse transform of one dequantized 8x8 block straight to 16x16
/// samples at half-sample phase (2:1 upsampling in both directions).
pub fn inverse_dct_8x8_to_16x16(coeffs: &[i32; DCTSIZE2], out: &mut [u8; UPSAMPLE_SIZE2]) {
    // Pass 1: expand columns; work[x][v] for x in 0..16, v in 0..8.
    let mut work = [[0i32; DCTSIZE]; UPSAMPLE_SIZE];
    for v in 0..DCTSIZE {
        for (x, basis_row) in UPSAMPLE_BASIS.iter().enumerate() {
            let mut acc = 0i64;
            for u in 0..DCTSIZE {
                acc += basis_row[u] as i64 * coeffs[u * DCTSIZE + v] as i64;
            }
            work[x][v] = descale(acc, CONST_BITS - PASS1_BITS);
        }
    }

    // Pass 2: expand rows. The basis carries its own normalization, so
    // only the fixed-point scale comes off here.
    for x in 0..UPSAMPLE_SIZE {
        for (y, basis_row) in UPSAMPLE_BASIS.iter().enumerate() {
            let mut acc = 0i64;
            for v in 0..DCTSIZE {
                acc += basis_row[v] as i64 * work[x][v] as i64;
            }
            let sample = descale(acc, CONST_BITS + PASS1_BITS).saturating_add(128);
            out[x * UPSAMPLE_SIZE + y] = clamp_sample(sample);
        }
    }
}
