//! Command-line driver: encode PNG/TGA sources to JPEG, decode JPEG back
//! to TGA, and run the exhaustive round-trip self-test.

mod tga;

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, ValueEnum};
use log::{info, warn, LevelFilter};

use jpeg_oxide::{
    compress_to_file, decompress_from_memory, Decoder, DecoderOptions, Encoder, Subsampling,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SubsamplingArg {
    /// Grayscale output (luma only)
    Luma,
    /// 4:4:4
    H1v1,
    /// 4:2:2
    H2v1,
    /// 4:2:0
    H2v2,
}

impl From<SubsamplingArg> for Subsampling {
    fn from(arg: SubsamplingArg) -> Self {
        match arg {
            SubsamplingArg::Luma => Subsampling::Gray,
            SubsamplingArg::H1v1 => Subsampling::S444,
            SubsamplingArg::H2v1 => Subsampling::S422,
            SubsamplingArg::H2v2 => Subsampling::S420,
        }
    }
}

/// Baseline/progressive JPEG codec driver.
#[derive(Debug, Parser)]
#[command(name = "jpeg-oxide", version, about)]
struct Args {
    /// Source image (PNG or TGA; JPEG when decoding)
    source: PathBuf,

    /// Destination file (defaults next to the source)
    dest: Option<PathBuf>,

    /// Decode a JPEG to TGA instead of encoding
    #[arg(short = 'd', long)]
    decode: bool,

    /// Exhaustive self-test: every quality x subsampling x optimize combo
    #[arg(short = 'x', long)]
    exhaustive: bool,

    /// Chroma subsampling mode
    #[arg(long, value_enum, default_value_t = SubsamplingArg::H2v2)]
    subsampling: SubsamplingArg,

    /// Quality, 1-100
    #[arg(long, default_value_t = 75)]
    quality: u8,

    /// Two-pass Huffman optimization
    #[arg(short = 'o', long)]
    optimize: bool,

    /// Encode to memory first, then write the buffer out
    #[arg(short = 'm', long)]
    memory: bool,

    /// Decode chroma through the frequency-domain upsampler
    #[arg(long)]
    freq_upsample: bool,

    /// Tee log output to this file
    #[arg(short = 'g', long)]
    log: Option<PathBuf>,

    /// Dump the round-tripped image (TGA) during the self-test
    #[arg(short = 'w', long)]
    dump: Option<PathBuf>,
}

// =============================================================================
// Logging
// =============================================================================

/// Logger that writes to stderr and optionally tees into a file.
struct TeeLogger {
    file: Option<Mutex<fs::File>>,
}

impl log::Log for TeeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}", record.level(), record.args());
        eprintln!("{}", line);
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "{}", line);
            }
        }
    }

    fn flush(&self) {}
}

fn init_logging(log_path: Option<&Path>) {
    let file = log_path.and_then(|p| fs::File::create(p).ok()).map(Mutex::new);
    let logger = Box::new(TeeLogger { file });
    if log::set_boxed_logger(logger).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

// =============================================================================
// Image loading and comparison
// =============================================================================

struct SourceImage {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

fn load_source(path: &Path) -> Result<SourceImage, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => load_png(path),
        "tga" => {
            let img = tga::read(path).map_err(|e| e.to_string())?;
            Ok(SourceImage {
                width: img.width,
                height: img.height,
                channels: img.channels,
                pixels: img.pixels,
            })
        }
        other => Err(format!("unsupported source format: .{}", other)),
    }
}

fn load_png(path: &Path) -> Result<SourceImage, String> {
    let file = fs::File::open(path).map_err(|e| e.to_string())?;
    let decoder = png::Decoder::new(file);
    let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).map_err(|e| e.to_string())?;
    buf.truncate(frame.buffer_size());

    let channels = match frame.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        other => return Err(format!("unsupported PNG color type {:?}", other)),
    };
    if frame.bit_depth != png::BitDepth::Eight {
        return Err("only 8-bit PNGs are supported".into());
    }
    Ok(SourceImage {
        width: frame.width,
        height: frame.height,
        channels,
        pixels: buf,
    })
}

/// Peak signal-to-noise ratio between two same-size buffers, in dB.
fn psnr(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    let mse: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        / a.len() as f64;
    if mse <= f64::EPSILON {
        return 999.0;
    }
    10.0 * (255.0 * 255.0 / mse).log10()
}

/// Reduce a source image to the channel count used for comparison.
fn comparison_pixels(img: &SourceImage, gray: bool) -> Vec<u8> {
    let n = img.width as usize * img.height as usize;
    let mut out = Vec::with_capacity(n * if gray { 1 } else { 3 });
    for i in 0..n {
        match (img.channels, gray) {
            (1, true) => out.push(img.pixels[i]),
            (1, false) => out.extend_from_slice(&[img.pixels[i]; 3]),
            (c, true) => {
                let p = &img.pixels[i * c as usize..];
                out.push(jpeg_oxide::rgb_to_gray(p[0], p[1], p[2]));
            }
            (c, false) => {
                let p = &img.pixels[i * c as usize..];
                out.extend_from_slice(&p[..3]);
            }
        }
    }
    out
}

// =============================================================================
// Commands
// =============================================================================

fn encoder_for(args: &Args) -> Encoder {
    Encoder::new()
        .quality(args.quality)
        .subsampling(args.subsampling.into())
        .optimize_huffman(args.optimize)
}

fn run_encode(args: &Args) -> Result<(), String> {
    let src = load_source(&args.source)?;
    let dest = args
        .dest
        .clone()
        .unwrap_or_else(|| args.source.with_extension("jpg"));
    let encoder = encoder_for(args);

    if args.memory {
        let bytes = encoder
            .encode_to_memory(&src.pixels, src.width, src.height, src.channels)
            .map_err(|e| e.to_string())?;
        fs::write(&dest, &bytes).map_err(|e| e.to_string())?;
        info!("wrote {} ({} bytes, via memory)", dest.display(), bytes.len());
    } else {
        compress_to_file(&dest, &src.pixels, src.width, src.height, src.channels, &encoder)
            .map_err(|e| e.to_string())?;
        let size = fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
        info!("wrote {} ({} bytes)", dest.display(), size);
    }
    Ok(())
}

fn run_decode(args: &Args) -> Result<(), String> {
    let dest = args
        .dest
        .clone()
        .unwrap_or_else(|| args.source.with_extension("tga"));
    let data = fs::read(&args.source).map_err(|e| e.to_string())?;
    let options = DecoderOptions { freq_domain_upsample: args.freq_upsample };

    let mut decoder = Decoder::with_options(std::io::Cursor::new(data), options)
        .map_err(|e| e.to_string())?;
    info!(
        "{} {}x{}, {} component(s)",
        if decoder.is_progressive() { "progressive" } else { "baseline" },
        decoder.width(),
        decoder.height(),
        decoder.num_components()
    );
    let pixels = decoder.decode_to_vec().map_err(|e| e.to_string())?;
    tga::write(
        &dest,
        decoder.width(),
        decoder.height(),
        decoder.bytes_per_pixel() as u8,
        &pixels,
    )
    .map_err(|e| e.to_string())?;
    info!("wrote {}", dest.display());
    Ok(())
}

/// Re-encode the source at every (quality, subsampling, optimize) combo
/// and verify reconstruction quality and byte determinism.
fn run_exhaustive(args: &Args) -> Result<(), String> {
    let src = load_source(&args.source)?;
    let modes = [
        SubsamplingArg::Luma,
        SubsamplingArg::H1v1,
        SubsamplingArg::H2v1,
        SubsamplingArg::H2v2,
    ];

    let mut worst_psnr = f64::INFINITY;
    for optimize in [false, true] {
        for &mode in &modes {
            for quality in 1..=100u8 {
                let encoder = Encoder::new()
                    .quality(quality)
                    .subsampling(mode.into())
                    .optimize_huffman(optimize);
                let bytes = encoder
                    .encode_to_memory(&src.pixels, src.width, src.height, src.channels)
                    .map_err(|e| format!("q{} {:?} o{}: {}", quality, mode, optimize, e))?;

                // Both optimized and non-optimized encodes are expected
                // to be byte-stable.
                let again = encoder
                    .encode_to_memory(&src.pixels, src.width, src.height, src.channels)
                    .map_err(|e| e.to_string())?;
                if bytes != again {
                    return Err(format!(
                        "non-deterministic output at q{} {:?} optimize={}",
                        quality, mode, optimize
                    ));
                }

                let gray = mode == SubsamplingArg::Luma;
                let req = if gray { 1 } else { 3 };
                let (decoded, info) =
                    decompress_from_memory(&bytes, req).map_err(|e| e.to_string())?;
                if (info.width, info.height) != (src.width, src.height) {
                    return Err("dimension mismatch after round trip".into());
                }
                let reference = comparison_pixels(&src, gray);
                let db = psnr(&reference, &decoded);
                if quality >= 25 && db < 6.0 {
                    return Err(format!(
                        "PSNR collapsed to {:.2} dB at q{} {:?} optimize={}",
                        db, quality, mode, optimize
                    ));
                }
                worst_psnr = worst_psnr.min(db);

                if let (Some(dump), 75, SubsamplingArg::H2v2, true) =
                    (&args.dump, quality, mode, optimize)
                {
                    let _ = tga::write(dump, info.width, info.height, req as u8, &decoded);
                }
            }
            info!("pass: {:?} optimize={}", mode, optimize);
        }
    }
    info!("exhaustive self-test passed, worst PSNR {:.2} dB", worst_psnr);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log.as_deref());

    let result = if args.exhaustive {
        run_exhaustive(&args)
    } else if args.decode {
        run_decode(&args)
    } else {
        run_encode(&args)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            warn!("{}", msg);
            ExitCode::FAILURE
        }
    }
}
