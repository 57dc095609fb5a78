//! Reconstruction of sample planes from decoded coefficient blocks:
//! dequantize, inverse transform, and blit into the component plane for
//! the current MCU row.

use crate::consts::DCTSIZE2;
use crate::idct::{inverse_dct_8x8, inverse_dct_8x8_to_16x16, UPSAMPLE_SIZE, UPSAMPLE_SIZE2};

/// Dequantize, inverse transform, and write one 8x8 block into a plane at
/// pixel position (x0, y0).
pub fn transform_block(
    block: &[i16; DCTSIZE2],
    quant: &[u16; DCTSIZE2],
    plane: &mut [u8],
    plane_w: usize,
    x0: usize,
    y0: usize,
) {
    let mut dequant = [0i32; DCTSIZE2];
    for i in 0..DCTSIZE2 {
        dequant[i] = block[i] as i32 * quant[i] as i32;
    }
    let mut samples = [0u8; DCTSIZE2];
    inverse_dct_8x8(&dequant, &mut samples);
    for row in 0..8 {
        let dst = (y0 + row) * plane_w + x0;
        plane[dst..dst + 8].copy_from_slice(&samples[row * 8..row * 8 + 8]);
    }
}

/// Same, but through the frequency-domain 2x upsampling transform: one
/// coefficient block becomes a 16x16 pixel patch.
pub fn transform_block_2x(
    block: &[i16; DCTSIZE2],
    quant: &[u16; DCTSIZE2],
    plane: &mut [u8],
    plane_w: usize,
    x0: usize,
    y0: usize,
) {
    let mut dequant = [0i32; DCTSIZE2];
    for i in 0..DCTSIZE2 {
        dequant[i] = block[i] as i32 * quant[i] as i32;
    }
    let mut samples = [0u8; UPSAMPLE_SIZE2];
    inverse_dct_8x8_to_16x16(&dequant, &mut samples);
    for row in 0..UPSAMPLE_SIZE {
        let dst = (y0 + row) * plane_w + x0;
        plane[dst..dst + UPSAMPLE_SIZE]
            .copy_from_slice(&samples[row * UPSAMPLE_SIZE..(row + 1) * UPSAMPLE_SIZE]);
    }
}
