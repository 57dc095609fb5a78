//! Forward DCT (Discrete Cosine Transform).
//!
//! Implements the Loeffler-Ligtenberg-Moschytz 8x8 integer DCT: 12
//! multiplies and 32 adds per 1-D pass, rows then columns. Output is
//! scaled up by a factor of 8; the scaling is removed during quantization.
//!
//! Reference: C. Loeffler, A. Ligtenberg and G. Moschytz,
//! "Practical Fast 1-D DCT Algorithms with 11 Multiplications",
//! Proc. ICASSP 1989, pp. 988-991.

use crate::consts::{DCTSIZE, DCTSIZE2};
use multiversion::multiversion;

// Fixed-point precision for the rotation constants.
const CONST_BITS: i32 = 13;
const PASS1_BITS: i32 = 2;

// FIX(x) = round(x * (1 << CONST_BITS))
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

/// Right-shift with rounding.
#[inline]
fn descale(x: i32, n: i32) -> i32 {
    (x + (1 << (n - 1))) >> n
}

/// Subtract the 128 level shift from one row of samples.
#[inline]
pub fn level_shift(samples: &[u8], out: &mut [i16]) {
    for (dst, &src) in out.iter_mut().zip(samples.iter()) {
        *dst = src as i16 - 128;
    }
}

/// Forward DCT on one 8x8 block of level-shifted samples.
///
/// Input is row-major, centered around zero. Output coefficients are
/// row-major and scaled up by 8.
// The multiversion expansion contains the target-feature plumbing; the
// transform body itself is safe code.
#[allow(unsafe_code)]
#[multiversion(targets(
    "x86_64+avx2",
    "x86_64+sse4.1",
    "aarch64+neon",
))]
pub fn forward_dct_8x8(samples: &[i16; DCTSIZE2], coeffs: &mut [i32; DCTSIZE2]) {
    let mut data = [0i32; DCTSIZE2];
    for i in 0..DCTSIZE2 {
        data[i] = samples[i] as i32;
    }

    // Pass 1: rows. Results scaled up by sqrt(8) * 2^PASS1_BITS.
    for row in 0..DCTSIZE {
        let base = row * DCTSIZE;

        let tmp0 = data[base] + data[base + 7];
        let tmp7 = data[base] - data[base + 7];
        let tmp1 = data[base + 1] + data[base + 6];
        let tmp6 = data[base + 1] - data[base + 6];
        let tmp2 = data[base + 2] + data[base + 5];
        let tmp5 = data[base + 2] - data[base + 5];
        let tmp3 = data[base + 3] + data[base + 4];
        let tmp4 = data[base + 3] - data[base + 4];

        // Even part
        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        data[base] = (tmp10 + tmp11) << PASS1_BITS;
        data[base + 4] = (tmp10 - tmp11) << PASS1_BITS;

        let z1 = (tmp12 + tmp13) * FIX_0_541196100;
        data[base + 2] = descale(z1 + tmp13 * FIX_0_765366865, CONST_BITS - PASS1_BITS);
        data[base + 6] = descale(z1 + tmp12 * (-FIX_1_847759065), CONST_BITS - PASS1_BITS);

        // Odd part
        let z1 = tmp4 + tmp7;
        let z2 = tmp5 + tmp6;
        let z3 = tmp4 + tmp6;
        let z4 = tmp5 + tmp7;
        let z5 = (z3 + z4) * FIX_1_175875602;

        let tmp4 = tmp4 * FIX_0_298631336;
        let tmp5 = tmp5 * FIX_2_053119869;
        let tmp6 = tmp6 * FIX_3_072711026;
        let tmp7 = tmp7 * FIX_1_501321110;
        let z1 = z1 * (-FIX_0_899976223);
        let z2 = z2 * (-FIX_2_562915447);
        let z3 = z3 * (-FIX_1_961570560) + z5;
        let z4 = z4 * (-FIX_0_390180644) + z5;

        data[base + 7] = descale(tmp4 + z1 + z3, CONST_BITS - PASS1_BITS);
        data[base + 5] = descale(tmp5 + z2 + z4, CONST_BITS - PASS1_BITS);
        data[base + 3] = descale(tmp6 + z2 + z3, CONST_BITS - PASS1_BITS);
        data[base + 1] = descale(tmp7 + z1 + z4, CONST_BITS - PASS1_BITS);
    }

    // Pass 2: columns. Removes PASS1_BITS, leaves the x8 scale.
    for col in 0..DCTSIZE {
        let tmp0 = data[col] + data[DCTSIZE * 7 + col];
        let tmp7 = data[col] - data[DCTSIZE * 7 + col];
        let tmp1 = data[DCTSIZE + col] + data[DCTSIZE * 6 + col];
        let tmp6 = data[DCTSIZE + col] - data[DCTSIZE * 6 + col];
        let tmp2 = data[DCTSIZE * 2 + col] + data[DCTSIZE * 5 + col];
        let tmp5 = data[DCTSIZE * 2 + col] - data[DCTSIZE * 5 + col];
        let tmp3 = data[DCTSIZE * 3 + col] + data[DCTSIZE * 4 + col];
        let tmp4 = data[DCTSIZE * 3 + col] - data[DCTSIZE * 4 + col];

        // Even part
        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        data[col] = descale(tmp10 + tmp11, PASS1_BITS);
        data[DCTSIZE * 4 + col] = descale(tmp10 - tmp11, PASS1_BITS);

        let z1 = (tmp12 + tmp13) * FIX_0_541196100;
        data[DCTSIZE * 2 + col] = descale(z1 + tmp13 * FIX_0_765366865, CONST_BITS + PASS1_BITS);
        data[DCTSIZE * 6 + col] = descale(z1 + tmp12 * (-FIX_1_847759065), CONST_BITS + PASS1_BITS);

        // Odd part
        let z1 = tmp4 + tmp7;
        let z2 = tmp5 + tmp6;
        let z3 = tmp4 + tmp6;
        let z4 = tmp5 + tmp7;
        let z5 = (z3 + z4) * FIX_1_175875602;

        let tmp4 = tmp4 * FIX_0_298631336;
        let tmp5 = tmp5 * FIX_2_053119869;
        let tmp6 = tmp6 * FIX_3_072711026;
        let tmp7 = tmp7 * FIX_1_501321110;
        let z1 = z1 * (-FIX_0_899976223);
        let z2 = z2 * (-FIX_2_562915447);
        let z3 = z3 * (-FIX_1_961570560) + z5;
        let z4 = z4 * (-FIX_0_390180644) + z5;

        data[DCTSIZE * 7 + col] = descale(tmp4 + z1 + z3, CONST_BITS + PASS1_BITS);
        data[DCTSIZE * 5 + col] = descale(tmp5 + z2 + z4, CONST_BITS + PASS1_BITS);
        data[DCTSIZE * 3 + col] = descale(tmp6 + z2 + z3, CONST_BITS + PASS1_BITS);
        data[DCTSIZE + col] = descale(tmp7 + z1 + z4, CONST_BITS + PASS1_BITS);
    }

    coeffs.copy_from_slice(&data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_block_is_dc_only() {
        let samples = [-28i16; DCTSIZE2]; // all 100 after level shift
        let mut coeffs = [0i32; DCTSIZE2];
        forward_dct_8x8(&samples, &mut coeffs);
        // DC = sum * 8 / 8 = 64 * -28 / 8 = -224 at x8 scale
        assert_eq!(coeffs[0], -28 * 64);
        for &c in &coeffs[1..] {
            assert_eq!(c, 0);
        }
    }

    #[test]
    fn test_zero_block() {
        let samples = [0i16; DCTSIZE2];
        let mut coeffs = [0i32; DCTSIZE2];
        forward_dct_8x8(&samples, &mut coeffs);
        assert_eq!(coeffs, [0i32; DCTSIZE2]);
    }

    #[test]
    fn test_horizontal_cosine_concentrates_energy() {
        // A horizontal half-cosine puts almost all energy in coefficient 1.
        let mut samples = [0i16; DCTSIZE2];
        for row in 0..DCTSIZE {
            for col in 0..DCTSIZE {
                let v = (100.0 * (std::f64::consts::PI * (2.0 * col as f64 + 1.0) / 16.0).cos())
                    .round() as i16;
                samples[row * DCTSIZE + col] = v;
            }
        }
        let mut coeffs = [0i32; DCTSIZE2];
        forward_dct_8x8(&samples, &mut coeffs);
        let total: i64 = coeffs.iter().map(|&c| (c as i64) * (c as i64)).sum();
        let target = (coeffs[1] as i64) * (coeffs[1] as i64);
        assert!(target * 10 > total * 9, "energy not concentrated: {:?}", &coeffs[..8]);
    }

    #[test]
    fn test_level_shift() {
        let samples = [0u8, 128, 255];
        let mut out = [0i16; 3];
        level_shift(&samples, &mut out);
        assert_eq!(out, [-128, 0, 127]);
    }
}
