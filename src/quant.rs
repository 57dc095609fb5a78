//! Quantization: quality scaling of the Annex K reference tables, and the
//! forward/inverse coefficient quantization used around the transforms.

use crate::consts::{DCTSIZE2, STD_CHROMA_QUANT, STD_LUMA_QUANT};
use crate::types::QuantTable;

/// Map a quality setting (1-100) to a table scale factor in percent.
///
/// Quality 50 leaves the reference tables untouched; lower qualities grow
/// the divisors hyperbolically, higher qualities shrink them linearly down
/// to zero at quality 100.
#[inline]
pub fn quality_to_scale_factor(quality: u8) -> u32 {
    let q = quality.clamp(1, 100) as u32;
    if q < 50 {
        5000 / q
    } else {
        200 - 2 * q
    }
}

/// Scale a reference table by a quality setting, clamped to the baseline
/// range 1..=255.
pub fn create_quant_table(reference: &[u16; DCTSIZE2], quality: u8) -> QuantTable {
    let scale = quality_to_scale_factor(quality);
    let mut values = [0u16; DCTSIZE2];
    for (dst, &src) in values.iter_mut().zip(reference.iter()) {
        *dst = ((src as u32 * scale + 50) / 100).clamp(1, 255) as u16;
    }
    QuantTable::new(values)
}

/// Quality-scaled K.1 luminance table.
pub fn luma_quant_table(quality: u8) -> QuantTable {
    create_quant_table(&STD_LUMA_QUANT, quality)
}

/// Quality-scaled K.2 chrominance table.
pub fn chroma_quant_table(quality: u8) -> QuantTable {
    create_quant_table(&STD_CHROMA_QUANT, quality)
}

/// Quantize one block of forward-DCT output.
///
/// The forward DCT leaves coefficients scaled up by 8, so the divisor for
/// each position is `8 * q`. Division rounds to nearest, away from zero on
/// ties, symmetrically for negative coefficients.
pub fn quantize_block(coeffs: &[i32; DCTSIZE2], table: &QuantTable, out: &mut [i16; DCTSIZE2]) {
    for i in 0..DCTSIZE2 {
        let divisor = (table.values[i] as i32) << 3;
        let c = coeffs[i];
        let q = if c >= 0 {
            (c + divisor / 2) / divisor
        } else {
            (c - divisor / 2) / divisor
        };
        out[i] = q as i16;
    }
}

/// Multiply quantized coefficients back up for the inverse transform.
#[inline]
pub fn dequantize(coef: i16, q: u16) -> i32 {
    coef as i32 * q as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_factor_endpoints() {
        assert_eq!(quality_to_scale_factor(1), 5000);
        assert_eq!(quality_to_scale_factor(25), 200);
        assert_eq!(quality_to_scale_factor(50), 100);
        assert_eq!(quality_to_scale_factor(75), 50);
        assert_eq!(quality_to_scale_factor(100), 0);
    }

    #[test]
    fn test_quality_50_is_identity() {
        let t = luma_quant_table(50);
        assert_eq!(t.values, STD_LUMA_QUANT);
    }

    #[test]
    fn test_quality_100_is_all_ones() {
        let t = luma_quant_table(100);
        assert!(t.values.iter().all(|&v| v == 1));
        let t = chroma_quant_table(100);
        assert!(t.values.iter().all(|&v| v == 1));
    }

    #[test]
    fn test_baseline_clamp_at_low_quality() {
        let t = luma_quant_table(1);
        assert!(t.values.iter().all(|&v| (1..=255).contains(&v)));
        // The largest reference entries must have hit the 255 ceiling.
        assert_eq!(t.values[63], 255);
    }

    #[test]
    fn test_quality_ordering() {
        // Higher quality never increases any divisor.
        let lo = luma_quant_table(30);
        let hi = luma_quant_table(80);
        for i in 0..DCTSIZE2 {
            assert!(hi.values[i] <= lo.values[i]);
        }
    }

    #[test]
    fn test_quantize_rounds_to_nearest() {
        let table = QuantTable::new([2; DCTSIZE2]); // divisor 16
        let mut coeffs = [0i32; DCTSIZE2];
        coeffs[0] = 24; // 24/16 = 1.5, rounds to 2
        coeffs[1] = 23; // 1.44, rounds to 1
        coeffs[2] = -24; // rounds to -2
        coeffs[3] = -7; // rounds to 0
        let mut out = [0i16; DCTSIZE2];
        quantize_block(&coeffs, &table, &mut out);
        assert_eq!(&out[..4], &[2, 1, -2, 0]);
    }

    #[test]
    fn test_quantize_dequantize_roundtrip_bound() {
        let table = luma_quant_table(90);
        let mut coeffs = [0i32; DCTSIZE2];
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c = (i as i32 - 32) * 50;
        }
        let mut q = [0i16; DCTSIZE2];
        quantize_block(&coeffs, &table, &mut q);
        for i in 0..DCTSIZE2 {
            let back = dequantize(q[i], table.values[i]) << 3;
            let err = (back - coeffs[i]).abs();
            // Reconstruction error is bounded by half the divisor.
            assert!(err <= (table.values[i] as i32) << 2);
        }
    }
}
