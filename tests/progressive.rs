//! Progressive (SOF2) decoding against hand-assembled streams.
//!
//! The streams are built marker by marker with an all-ones quantization
//! table, so every expected pixel value can be computed with the crate's
//! own inverse transform.

use std::io::Cursor;

use jpeg_oxide::consts::{
    STD_AC_LUMA_BITS, STD_AC_LUMA_VALUES, STD_DC_LUMA_BITS, STD_DC_LUMA_VALUES,
};
use jpeg_oxide::idct::inverse_dct_8x8;
use jpeg_oxide::{decompress_from_memory, Decoder, Encoder};

/// DHT segment for one table.
fn dht(class: u8, slot: u8, bits: &[u8; 17], values: &[u8]) -> Vec<u8> {
    let len = 2 + 1 + 16 + values.len() as u16;
    let mut seg = vec![0xFF, 0xC4, (len >> 8) as u8, len as u8, (class << 4) | slot];
    seg.extend_from_slice(&bits[1..]);
    seg.extend_from_slice(values);
    seg
}

/// DQT segment: slot 0, all ones.
fn dqt_ones() -> Vec<u8> {
    let mut seg = vec![0xFF, 0xDB, 0x00, 67, 0x00];
    seg.extend(std::iter::repeat(1u8).take(64));
    seg
}

/// SOF2 for an 8x8 single-component frame.
fn sof2_8x8_gray() -> Vec<u8> {
    vec![0xFF, 0xC2, 0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0]
}

/// SOS for one component with the given band and approximation bits.
fn sos(ss: u8, se: u8, ah: u8, al: u8) -> Vec<u8> {
    vec![0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, ss, se, (ah << 4) | al]
}

fn header_8x8_gray() -> Vec<u8> {
    let mut stream = vec![0xFF, 0xD8];
    stream.extend(dqt_ones());
    stream.extend(sof2_8x8_gray());
    stream.extend(dht(0, 0, &STD_DC_LUMA_BITS, &STD_DC_LUMA_VALUES));
    stream.extend(dht(1, 0, &STD_AC_LUMA_BITS, &STD_AC_LUMA_VALUES));
    stream
}

/// Expected samples for a single dequantized 8x8 block.
fn expected_pixels(coeffs: &[i32; 64]) -> [u8; 64] {
    let mut out = [0u8; 64];
    inverse_dct_8x8(coeffs, &mut out);
    out
}

#[test]
fn test_dc_first_refine_and_empty_ac_band() {
    // Final DC coefficient 17, built in two scans:
    //   scan 1 (Ah=0, Al=1): category 4, value 8 -> coefficient 16.
    //     Std DC luma: category 4 codes as 101; data 101 1000 + pad.
    //   scan 2 (Ah=1, Al=0): one set correction bit -> coefficient 17.
    //     Data bit 1 + seven pad bits = 0xFF, which must be stuffed.
    //   scan 3 (AC 1..63 first): EOB (code 1010) + pad.
    let mut stream = header_8x8_gray();
    stream.extend(sos(0, 0, 0, 1));
    stream.push(0b1011_0001);
    stream.extend(sos(0, 0, 1, 0));
    stream.extend_from_slice(&[0xFF, 0x00]);
    stream.extend(sos(1, 63, 0, 0));
    stream.push(0b1010_1111);
    stream.extend_from_slice(&[0xFF, 0xD9]);

    let mut decoder = Decoder::new(Cursor::new(stream.clone())).unwrap();
    assert!(decoder.is_progressive());
    assert_eq!((decoder.width(), decoder.height()), (8, 8));
    let pixels = decoder.decode_to_vec().unwrap();

    let mut coeffs = [0i32; 64];
    coeffs[0] = 17;
    let expected = expected_pixels(&coeffs);
    assert_eq!(&pixels[..], &expected[..]);
    // DC 17 at the divided-by-8 scale is a flat 130 image.
    assert!(pixels.iter().all(|&p| p == 130));
}

#[test]
fn test_ac_first_and_ac_refinement() {
    // DC in one full-precision scan, then the first AC coefficient at
    // Al=1, then a refinement scan that confirms it.
    //   scan 1 (DC, Al=0): diff 16, category 5 -> 110 10000 + pad.
    //   scan 2 (AC 1..63, Al=1): symbol 0x01 (code 00) + sign bit 1,
    //     then EOB (1010): 00 1 1010 + pad = 0x35. Coefficient = 1 << 1.
    //   scan 3 (AC refine, Ah=1, Al=0): EOB (1010) + one correction bit 0
    //     for the known coefficient = 0xA7.
    let mut stream = header_8x8_gray();
    stream.extend(sos(0, 0, 0, 0));
    stream.push(0b1101_0000);
    stream.extend(sos(1, 63, 0, 1));
    stream.push(0b0011_0101);
    stream.extend(sos(1, 63, 1, 0));
    stream.push(0b1010_0111);
    stream.extend_from_slice(&[0xFF, 0xD9]);

    let (pixels, info) = decompress_from_memory(&stream, 1).unwrap();
    assert_eq!((info.width, info.height, info.components), (8, 8, 1));

    let mut coeffs = [0i32; 64];
    coeffs[0] = 16;
    coeffs[1] = 2; // zig-zag position 1 is natural position 1
    let expected = expected_pixels(&coeffs);
    assert_eq!(&pixels[..], &expected[..]);
}

#[test]
fn test_progressive_matches_baseline_reencode() {
    // The DC-only progressive stream reconstructs a flat 130 image; a
    // baseline encode of that image must match within one level.
    let mut stream = header_8x8_gray();
    stream.extend(sos(0, 0, 0, 1));
    stream.push(0b1011_0001);
    stream.extend(sos(0, 0, 1, 0));
    stream.extend_from_slice(&[0xFF, 0x00]);
    stream.extend(sos(1, 63, 0, 0));
    stream.push(0b1010_1111);
    stream.extend_from_slice(&[0xFF, 0xD9]);
    let (progressive, _) = decompress_from_memory(&stream, 1).unwrap();

    let baseline = Encoder::new()
        .quality(100)
        .encode_gray(&progressive, 8, 8)
        .unwrap();
    let (rebuilt, _) = decompress_from_memory(&baseline, 1).unwrap();
    for (a, b) in progressive.iter().zip(rebuilt.iter()) {
        assert!((*a as i32 - *b as i32).abs() <= 1, "{} vs {}", a, b);
    }
}

#[test]
fn test_progressive_missing_huff_table_is_detected() {
    // Same stream but without the AC table definition: the AC scan must
    // fail with UndefinedHuffTable.
    let mut stream = vec![0xFF, 0xD8];
    stream.extend(dqt_ones());
    stream.extend(sof2_8x8_gray());
    stream.extend(dht(0, 0, &STD_DC_LUMA_BITS, &STD_DC_LUMA_VALUES));
    stream.extend(sos(0, 0, 0, 0));
    stream.push(0b1101_0000);
    stream.extend(sos(1, 63, 0, 0));
    stream.push(0xAF);
    stream.extend_from_slice(&[0xFF, 0xD9]);

    let mut decoder = Decoder::new(Cursor::new(stream)).unwrap();
    assert_eq!(
        decoder.begin_decoding().err(),
        Some(jpeg_oxide::DecodeError::UndefinedHuffTable)
    );
}
