//! Minimal TGA reader/writer for the command-line driver.
//!
//! Supports uncompressed and RLE truecolor (24/32-bit) and grayscale
//! images, which covers everything the round-trip tooling produces.

use std::fs;
use std::io;
use std::path::Path;

/// A loaded raster: interleaved `channels` bytes per pixel, top-down.
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

fn bad(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("tga: {}", msg))
}

/// Read a TGA file into RGB or grayscale pixels.
pub fn read<P: AsRef<Path>>(path: P) -> io::Result<Image> {
    let data = fs::read(path)?;
    if data.len() < 18 {
        return Err(bad("truncated header"));
    }
    let id_len = data[0] as usize;
    let color_map_type = data[1];
    let image_type = data[2];
    let width = u16::from_le_bytes([data[12], data[13]]) as u32;
    let height = u16::from_le_bytes([data[14], data[15]]) as u32;
    let bpp = data[16] as usize;
    let descriptor = data[17];
    let top_down = descriptor & 0x20 != 0;

    if color_map_type != 0 {
        return Err(bad("color-mapped images not supported"));
    }
    if width == 0 || height == 0 {
        return Err(bad("zero dimension"));
    }
    let (channels, rle) = match (image_type, bpp) {
        (2, 24) => (3usize, false),
        (2, 32) => (4, false),
        (3, 8) => (1, false),
        (10, 24) => (3, true),
        (10, 32) => (4, true),
        (11, 8) => (1, true),
        _ => return Err(bad("unsupported image type")),
    };

    let mut src = &data[18 + id_len..];
    let num_pixels = width as usize * height as usize;
    let mut raw = vec![0u8; num_pixels * channels];

    if rle {
        let mut written = 0usize;
        while written < num_pixels {
            let header = *src.first().ok_or_else(|| bad("truncated RLE data"))?;
            src = &src[1..];
            let count = (header as usize & 0x7F) + 1;
            if header & 0x80 != 0 {
                // Run packet: one pixel repeated.
                if src.len() < channels {
                    return Err(bad("truncated RLE run"));
                }
                let px = &src[..channels];
                for i in 0..count.min(num_pixels - written) {
                    raw[(written + i) * channels..(written + i + 1) * channels]
                        .copy_from_slice(px);
                }
                src = &src[channels..];
            } else {
                // Literal packet.
                let bytes = count * channels;
                if src.len() < bytes {
                    return Err(bad("truncated RLE literal"));
                }
                let take = count.min(num_pixels - written);
                raw[written * channels..(written + take) * channels]
                    .copy_from_slice(&src[..take * channels]);
                src = &src[bytes..];
            }
            written += count;
        }
    } else {
        let bytes = num_pixels * channels;
        if src.len() < bytes {
            return Err(bad("truncated pixel data"));
        }
        raw.copy_from_slice(&src[..bytes]);
    }

    // BGR(A) to RGB, dropping alpha; flip unless already top-down.
    let out_channels = if channels == 1 { 1usize } else { 3 };
    let mut pixels = vec![0u8; num_pixels * out_channels];
    for y in 0..height as usize {
        let src_y = if top_down { y } else { height as usize - 1 - y };
        for x in 0..width as usize {
            let s = (src_y * width as usize + x) * channels;
            let d = (y * width as usize + x) * out_channels;
            if channels == 1 {
                pixels[d] = raw[s];
            } else {
                pixels[d] = raw[s + 2];
                pixels[d + 1] = raw[s + 1];
                pixels[d + 2] = raw[s];
            }
        }
    }

    Ok(Image {
        width,
        height,
        channels: out_channels as u8,
        pixels,
    })
}

/// Write pixels as an uncompressed top-down TGA (type 2 for color, 3 for
/// grayscale).
pub fn write<P: AsRef<Path>>(
    path: P,
    width: u32,
    height: u32,
    channels: u8,
    pixels: &[u8],
) -> io::Result<()> {
    let channels = channels as usize;
    if !matches!(channels, 1 | 3 | 4) {
        return Err(bad("unsupported channel count"));
    }
    let out_bpp: u8 = if channels == 1 { 8 } else { 24 };
    let image_type: u8 = if channels == 1 { 3 } else { 2 };

    let mut out = Vec::with_capacity(18 + width as usize * height as usize * channels);
    out.extend_from_slice(&[0, 0, image_type, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&(width as u16).to_le_bytes());
    out.extend_from_slice(&(height as u16).to_le_bytes());
    out.push(out_bpp);
    out.push(0x20); // top-down

    for px in pixels.chunks_exact(channels) {
        match channels {
            1 => out.push(px[0]),
            _ => out.extend_from_slice(&[px[2], px[1], px[0]]),
        }
    }
    fs::write(path, out)
}
