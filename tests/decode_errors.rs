//! Malformed-stream handling and restart marker behavior.

use std::io::Cursor;

use jpeg_oxide::{decompress_from_memory, DecodeError, Decoder, Encoder, Subsampling};

fn gray_image(width: u32, height: u32) -> Vec<u8> {
    (0..width as usize * height as usize)
        .map(|i| (i * 7 % 256) as u8)
        .collect()
}

#[test]
fn test_missing_soi_is_not_jpeg() {
    for bytes in [
        &b"\x89PNG\r\n\x1a\n"[..],
        &b""[..],
        &[0xFF, 0xC0][..],
        &[0xD8, 0xFF][..],
    ] {
        assert_eq!(
            Decoder::new(Cursor::new(bytes.to_vec())).err(),
            Some(DecodeError::NotJpeg),
            "{:?}",
            bytes
        );
    }
}

#[test]
fn test_arithmetic_sof_is_rejected_immediately() {
    // SOI + SOF9 (arithmetic sequential): construction must fail before
    // any scanline work.
    let mut stream = vec![0xFF, 0xD8, 0xFF, 0xC9];
    stream.extend_from_slice(&[0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0]);
    assert_eq!(
        Decoder::new(Cursor::new(stream)).err(),
        Some(DecodeError::NoArithmeticSupport)
    );
}

#[test]
fn test_lossless_sof_is_unsupported() {
    let mut stream = vec![0xFF, 0xD8, 0xFF, 0xC3];
    stream.extend_from_slice(&[0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0]);
    assert_eq!(
        Decoder::new(Cursor::new(stream)).err(),
        Some(DecodeError::UnsupportedMarker(0xC3))
    );
}

#[test]
fn test_twelve_bit_precision_is_rejected() {
    let mut stream = vec![0xFF, 0xD8, 0xFF, 0xC0];
    stream.extend_from_slice(&[0x00, 0x0B, 12, 0, 8, 0, 8, 1, 1, 0x11, 0]);
    assert_eq!(
        Decoder::new(Cursor::new(stream)).err(),
        Some(DecodeError::BadPrecision(12))
    );
}

#[test]
fn test_truncated_header_is_stream_read() {
    let jpeg = Encoder::new().encode_gray(&gray_image(16, 16), 16, 16).unwrap();
    // Cut inside the first DQT segment.
    let cut = jpeg[..24].to_vec();
    assert_eq!(
        Decoder::new(Cursor::new(cut)).err(),
        Some(DecodeError::StreamRead)
    );
}

#[test]
fn test_truncated_entropy_data_stays_bounded() {
    // Remove the EOI and a chunk of entropy data: the decoder must not
    // read past the buffer, and either errors or emits at most `height`
    // rows (tail rows reconstructed from zero padding).
    let jpeg = Encoder::new().quality(90).encode_gray(&gray_image(64, 64), 64, 64).unwrap();
    let cut = jpeg[..jpeg.len() * 2 / 3].to_vec();
    let mut decoder = Decoder::new(Cursor::new(cut)).unwrap();
    let mut rows = 0;
    loop {
        match decoder.decode_scanline() {
            Ok(Some(_)) => rows += 1,
            Ok(None) => break,
            Err(_) => break,
        }
        assert!(rows <= 64);
    }
}

#[test]
fn test_multi_scan_sequential_is_rejected() {
    // A baseline frame whose single scan covers only one of three
    // components.
    let jpeg = Encoder::new()
        .subsampling(Subsampling::S444)
        .encode_rgb(&vec![128u8; 8 * 8 * 3], 8, 8)
        .unwrap();
    // Rewrite the SOS header: Ns 3 -> 1 (drop two component specs and fix
    // the length).
    let sos = jpeg.windows(2).position(|w| w == [0xFF, 0xDA]).unwrap();
    let mut hacked = jpeg[..sos].to_vec();
    hacked.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01]);
    hacked.extend_from_slice(&jpeg[sos + 5..sos + 7]); // first comp spec
    hacked.extend_from_slice(&[0x00, 0x3F, 0x00]);
    hacked.extend_from_slice(&jpeg[sos + 14..]); // entropy data onward

    let mut decoder = Decoder::new(Cursor::new(hacked)).unwrap();
    assert_eq!(decoder.begin_decoding().err(), Some(DecodeError::NotSingleScan));
    // The first error latches: every later call reports Failed.
    assert_eq!(decoder.decode_scanline().err(), Some(DecodeError::Failed));
    assert_eq!(decoder.begin_decoding().err(), Some(DecodeError::Failed));
}

#[test]
fn test_restart_markers_cycle_and_decode() {
    // 64 MCUs with DRI = 1: RST0..RST7 cycle through the stream and the
    // image still reconstructs identically to the restart-free encode.
    let gray = gray_image(512, 8);
    let plain = Encoder::new().quality(80).encode_gray(&gray, 512, 8).unwrap();
    let restarted = Encoder::new()
        .quality(80)
        .restart_interval(1)
        .encode_gray(&gray, 512, 8)
        .unwrap();

    // DRI segment present with interval 1.
    let dri = restarted.windows(2).position(|w| w == [0xFF, 0xDD]).unwrap();
    assert_eq!(&restarted[dri + 2..dri + 6], &[0x00, 0x04, 0x00, 0x01]);

    // Restart markers cycle 0..7 repeatedly: 63 markers for 64 MCUs.
    let rsts: Vec<u8> = restarted
        .windows(2)
        .filter(|w| w[0] == 0xFF && (0xD0..=0xD7).contains(&w[1]))
        .map(|w| w[1] - 0xD0)
        .collect();
    assert_eq!(rsts.len(), 63);
    for (i, &n) in rsts.iter().enumerate() {
        assert_eq!(n as usize, i % 8, "marker {}", i);
    }

    let (a, _) = decompress_from_memory(&plain, 1).unwrap();
    let (b, _) = decompress_from_memory(&restarted, 1).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_decoder_reports_stream_properties() {
    let jpeg = Encoder::new()
        .subsampling(Subsampling::S420)
        .encode_rgb(&vec![10u8; 33 * 17 * 3], 33, 17)
        .unwrap();
    let decoder = Decoder::new(Cursor::new(jpeg)).unwrap();
    assert_eq!((decoder.width(), decoder.height()), (33, 17));
    assert_eq!(decoder.num_components(), 3);
    assert_eq!(decoder.bytes_per_pixel(), 4);
    assert_eq!(decoder.bytes_per_scanline(), 33 * 4);
    assert!(!decoder.is_progressive());
    assert!(decoder.total_bytes_read() > 0);
}

#[test]
fn test_req_channels_variants() {
    let jpeg = Encoder::new().encode_rgb(&vec![200u8; 4 * 4 * 3], 4, 4).unwrap();
    let (one, _) = decompress_from_memory(&jpeg, 1).unwrap();
    assert_eq!(one.len(), 16);
    let (three, _) = decompress_from_memory(&jpeg, 3).unwrap();
    assert_eq!(three.len(), 48);
    let (four, _) = decompress_from_memory(&jpeg, 4).unwrap();
    assert_eq!(four.len(), 64);
    assert!(four.chunks_exact(4).all(|px| px[3] == 255));
    assert_eq!(
        decompress_from_memory(&jpeg, 2).err(),
        Some(DecodeError::UnsupportedColorspace)
    );
}
