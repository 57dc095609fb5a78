//! The JPEG decoder: stream setup, scan orchestration, reconstruction,
//! and the scanline emitter.
//!
//! Construction parses headers through the first SOS, so dimensions are
//! available immediately. [`Decoder::begin_decoding`] then allocates the
//! working buffers - and, for progressive streams, decodes every scan
//! into the coefficient store. [`Decoder::decode_scanline`] reconstructs
//! one MCU row at a time and hands out rows until the image is done.
//!
//! Native output is 1 byte per pixel for grayscale frames and 4 bytes
//! (RGBA, alpha 255) for color frames; the `decompress_*` helpers convert
//! to a requested channel count.

mod header;
mod input;
mod render;
mod scan;

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use crate::color::{rgb_to_gray, YccTables};
use crate::consts::{DCTSIZE2, MARKER_EOI, MARKER_SOS};
use crate::error::{DecodeError, DecodeResult};
use crate::huffman::HuffDecodeTable;

use header::{FrameHeader, MarkerParser, ScanHeader};
use input::{EntropyBits, InputBuffer};
use render::{transform_block, transform_block_2x};
use scan::{ScanContext, ScanState};

/// Decoder tuning options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderOptions {
    /// Upsample 4:2:0 chroma in the frequency domain (16x16 IDCT) instead
    /// of spatial replication. Only takes effect for 2x2-sampled color
    /// frames.
    pub freq_domain_upsample: bool,
}

/// Dimensions and component count of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInfo {
    pub width: u32,
    pub height: u32,
    /// Components in the frame (1 or 3).
    pub components: u8,
}

/// Coefficient storage backing reconstruction.
enum CoeffStorage {
    /// Baseline: blocks of the MCU row currently being decoded.
    McuRow(Vec<[i16; DCTSIZE2]>),
    /// Progressive: the full-image block grid, per component.
    Full(Vec<Vec<[i16; DCTSIZE2]>>),
}

/// Allocate a zeroed block vector, surfacing allocation failure.
fn try_alloc_blocks(n: usize) -> DecodeResult<Vec<[i16; DCTSIZE2]>> {
    let mut v: Vec<[i16; DCTSIZE2]> = Vec::new();
    v.try_reserve_exact(n)?;
    v.resize(n, [0; DCTSIZE2]);
    Ok(v)
}

/// Allocate a zeroed byte vector, surfacing allocation failure.
fn try_alloc_bytes(n: usize) -> DecodeResult<Vec<u8>> {
    let mut v: Vec<u8> = Vec::new();
    v.try_reserve_exact(n)?;
    v.resize(n, 0);
    Ok(v)
}

/// A pull-based JPEG decoder over any [`Read`] source.
pub struct Decoder<R: Read> {
    input: InputBuffer<R>,
    bits: EntropyBits,
    parser: MarkerParser,
    options: DecoderOptions,
    ycc: YccTables,
    frame: FrameHeader,

    /// First SOS header, parked between construction and decode start.
    pending_scan: Option<ScanHeader>,
    /// The single sequential scan (baseline streams).
    baseline_scan: Option<ScanHeader>,
    scan_state: ScanState,

    dc_tables: [Option<HuffDecodeTable>; 4],
    ac_tables: [Option<HuffDecodeTable>; 4],

    /// First block index of each component within an interleaved MCU.
    comp_block_offset: [usize; 4],
    blocks_per_mcu: usize,

    storage: CoeffStorage,
    /// One MCU row of samples per component, at component resolution
    /// (doubled for frequency-domain chroma upsampling).
    planes: Vec<Vec<u8>>,
    plane_w: Vec<usize>,
    /// 2 when the frequency-domain chroma path is active, else 1.
    chroma_scale: usize,

    ready: bool,
    failed: Option<DecodeError>,
    next_mcu_row: usize,
    row_in_mcu: usize,
    rows_emitted: u32,
    scan_line: Vec<u8>,
    bytes_per_pixel: usize,
}

impl<R: Read> Decoder<R> {
    /// Construct a decoder and parse all headers up to the first scan.
    pub fn new(reader: R) -> DecodeResult<Self> {
        Self::with_options(reader, DecoderOptions::default())
    }

    /// Construct with explicit options.
    pub fn with_options(reader: R, options: DecoderOptions) -> DecodeResult<Self> {
        let mut input = InputBuffer::new(reader);
        let mut parser = MarkerParser::new();
        parser.locate_soi(&mut input)?;
        parser.locate_sof(&mut input)?;
        let scan = parser
            .locate_sos(&mut input)?
            .ok_or(DecodeError::UnexpectedMarker(MARKER_EOI))?;
        let frame = parser.frame().expect("frame parsed").clone();

        let bytes_per_pixel = if frame.components.len() == 1 { 1 } else { 4 };
        Ok(Self {
            input,
            bits: EntropyBits::new(),
            parser,
            options,
            ycc: YccTables::new(),
            frame,
            pending_scan: Some(scan),
            baseline_scan: None,
            scan_state: ScanState::new(0),
            dc_tables: Default::default(),
            ac_tables: Default::default(),
            comp_block_offset: [0; 4],
            blocks_per_mcu: 0,
            storage: CoeffStorage::McuRow(Vec::new()),
            planes: Vec::new(),
            plane_w: Vec::new(),
            chroma_scale: 1,
            ready: false,
            failed: None,
            next_mcu_row: 0,
            row_in_mcu: 0,
            rows_emitted: 0,
            scan_line: Vec::new(),
            bytes_per_pixel,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.frame.height
    }

    /// Components in the frame (1 or 3).
    pub fn num_components(&self) -> usize {
        self.frame.components.len()
    }

    /// Bytes per pixel of emitted scanlines (1 or 4).
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// Bytes per emitted scanline.
    pub fn bytes_per_scanline(&self) -> usize {
        self.frame.width as usize * self.bytes_per_pixel
    }

    /// True for SOF2 (progressive) streams.
    pub fn is_progressive(&self) -> bool {
        self.frame.progressive
    }

    /// Total bytes consumed from the source.
    pub fn total_bytes_read(&self) -> usize {
        self.input.total_bytes_read()
    }

    /// Finish initialization: allocate buffers and, for progressive
    /// streams, decode every scan. Idempotent; called implicitly by
    /// [`decode_scanline`](Self::decode_scanline).
    pub fn begin_decoding(&mut self) -> DecodeResult<()> {
        if self.ready {
            return Ok(());
        }
        if self.failed.is_some() {
            return Err(DecodeError::Failed);
        }
        match self.begin_inner() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.failed = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Decode and return the next scanline, or `None` past the last row.
    ///
    /// The returned slice is valid until the next call.
    pub fn decode_scanline(&mut self) -> DecodeResult<Option<&[u8]>> {
        if self.failed.is_some() {
            return Err(DecodeError::Failed);
        }
        self.begin_decoding()?;
        match self.next_scanline_inner() {
            Ok(false) => Ok(None),
            Ok(true) => Ok(Some(&self.scan_line[..self.bytes_per_scanline()])),
            Err(e) => {
                self.failed = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Decode the remaining scanlines into one buffer of native pixels.
    pub fn decode_to_vec(&mut self) -> DecodeResult<Vec<u8>> {
        self.begin_decoding()?;
        let stride = self.bytes_per_scanline();
        let mut out = try_alloc_bytes(stride * self.frame.height as usize)?;
        let mut row = 0usize;
        while let Some(line) = self.decode_scanline()? {
            out[row * stride..(row + 1) * stride].copy_from_slice(line);
            row += 1;
        }
        Ok(out)
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    fn begin_inner(&mut self) -> DecodeResult<()> {
        // Every component must have its quantization table by now.
        for comp in &self.frame.components {
            if self.parser.quant[comp.quant_idx as usize].is_none() {
                return Err(DecodeError::UndefinedQuantTable);
            }
        }

        let color = self.frame.components.len() == 3;
        self.chroma_scale = if self.options.freq_domain_upsample
            && color
            && self.frame.h_max == 2
            && self.frame.v_max == 2
        {
            2
        } else {
            1
        };

        // Sample planes covering one MCU row per component.
        self.planes.clear();
        self.plane_w.clear();
        for (c, comp) in self.frame.components.iter().enumerate() {
            let scale = if c > 0 { self.chroma_scale } else { 1 };
            let w = comp.mcu_blocks_w * 8 * scale;
            let h = comp.v as usize * 8 * scale;
            self.plane_w.push(w);
            self.planes.push(try_alloc_bytes(w * h)?);
        }
        self.scan_line = try_alloc_bytes(self.bytes_per_scanline())?;

        // Interleaved MCU layout in frame order.
        self.blocks_per_mcu = 0;
        for (c, comp) in self.frame.components.iter().enumerate() {
            self.comp_block_offset[c] = self.blocks_per_mcu;
            self.blocks_per_mcu += comp.h as usize * comp.v as usize;
        }

        if self.frame.progressive {
            let mut grids = Vec::with_capacity(self.frame.components.len());
            for comp in &self.frame.components {
                grids.push(try_alloc_blocks(comp.mcu_blocks_w * comp.mcu_blocks_h)?);
            }
            self.storage = CoeffStorage::Full(grids);

            let mut scan = self.pending_scan.take().expect("first scan pending");
            loop {
                self.decode_progressive_scan(&scan)?;
                match self.next_scan_or_eoi()? {
                    Some(next) => scan = next,
                    None => break,
                }
            }
        } else {
            let scan = self.pending_scan.take().expect("first scan pending");
            // A sequential frame gets exactly one scan covering every
            // component.
            if scan.components.len() != self.frame.components.len() {
                return Err(DecodeError::NotSingleScan);
            }
            for c in 0..self.frame.components.len() {
                if scan.components.iter().filter(|s| s.comp_idx == c).count() != 1 {
                    return Err(DecodeError::BadSosCompId);
                }
            }
            for sc in &scan.components {
                self.require_dc_table(sc.dc_tbl)?;
                self.require_ac_table(sc.ac_tbl)?;
            }
            self.storage = CoeffStorage::McuRow(try_alloc_blocks(
                self.frame.mcus_per_row * self.blocks_per_mcu,
            )?);
            self.scan_state = ScanState::new(self.parser.restart_interval);
            self.bits.reset();
            self.baseline_scan = Some(scan);
        }

        self.ready = true;
        self.next_mcu_row = 0;
        self.row_in_mcu = self.rows_per_mcu();
        self.rows_emitted = 0;
        Ok(())
    }

    fn rows_per_mcu(&self) -> usize {
        self.frame.v_max as usize * 8
    }

    fn require_dc_table(&mut self, slot: u8) -> DecodeResult<()> {
        let spec = self.parser.huff[slot as usize]
            .as_ref()
            .ok_or(DecodeError::UndefinedHuffTable)?;
        self.dc_tables[slot as usize] = Some(HuffDecodeTable::build(spec)?);
        Ok(())
    }

    fn require_ac_table(&mut self, slot: u8) -> DecodeResult<()> {
        let spec = self.parser.huff[4 + slot as usize]
            .as_ref()
            .ok_or(DecodeError::UndefinedHuffTable)?;
        self.ac_tables[slot as usize] = Some(HuffDecodeTable::build(spec)?);
        Ok(())
    }

    /// Resume segment parsing after a scan's entropy data.
    fn next_scan_or_eoi(&mut self) -> DecodeResult<Option<ScanHeader>> {
        let mut marker = match self.bits.take_pending_marker() {
            Some(m) => m,
            None => self.parser.next_marker(&mut self.input)?,
        };
        self.bits.reset();
        loop {
            if let Some(m) = self.parser.dispatch_marker(marker, &mut self.input)? {
                return match m {
                    MARKER_SOS => Ok(Some(self.parser.read_sos(&mut self.input)?)),
                    MARKER_EOI => Ok(None),
                    other => Err(DecodeError::UnexpectedMarker(other)),
                };
            }
            marker = self.parser.next_marker(&mut self.input)?;
        }
    }

    // =========================================================================
    // Progressive scan decoding
    // =========================================================================

    fn decode_progressive_scan(&mut self, scan: &ScanHeader) -> DecodeResult<()> {
        // Table requirements depend on the pass kind.
        let needs_dc = scan.is_dc_scan() && !scan.is_refinement();
        let needs_ac = !scan.is_dc_scan();
        for sc in &scan.components {
            if needs_dc {
                self.require_dc_table(sc.dc_tbl)?;
            }
            if needs_ac {
                self.require_ac_table(sc.ac_tbl)?;
            }
        }

        let mut state = ScanState::new(self.parser.restart_interval);
        self.bits.reset();

        let grids = match &mut self.storage {
            CoeffStorage::Full(grids) => grids,
            CoeffStorage::McuRow(_) => {
                return Err(DecodeError::Failed);
            }
        };

        let mut ctx = ScanContext {
            input: &mut self.input,
            bits: &mut self.bits,
            state: &mut state,
        };

        if scan.components.len() > 1 {
            // Interleaved DC scan over whole MCUs.
            for mcu_row in 0..self.frame.mcu_rows {
                for mcu_col in 0..self.frame.mcus_per_row {
                    ctx.restart_if_due()?;
                    for sc in &scan.components {
                        let comp = &self.frame.components[sc.comp_idx];
                        for dy in 0..comp.v as usize {
                            for dx in 0..comp.h as usize {
                                let bx = mcu_col * comp.h as usize + dx;
                                let by = mcu_row * comp.v as usize + dy;
                                let block =
                                    &mut grids[sc.comp_idx][by * comp.mcu_blocks_w + bx];
                                if scan.is_refinement() {
                                    ctx.decode_block_dc_refine(block, scan.al)?;
                                } else {
                                    let dc = self.dc_tables[sc.dc_tbl as usize]
                                        .as_ref()
                                        .expect("checked above");
                                    ctx.decode_block_dc_first(
                                        block,
                                        sc.comp_idx,
                                        dc,
                                        scan.al,
                                    )?;
                                }
                            }
                        }
                    }
                }
            }
        } else {
            // Non-interleaved: one block per MCU over the component's own
            // block grid.
            let sc = scan.components[0];
            let comp = &self.frame.components[sc.comp_idx];
            for by in 0..comp.scan_blocks_h {
                for bx in 0..comp.scan_blocks_w {
                    ctx.restart_if_due()?;
                    let block = &mut grids[sc.comp_idx][by * comp.mcu_blocks_w + bx];
                    match (scan.is_dc_scan(), scan.is_refinement()) {
                        (true, false) => {
                            let dc = self.dc_tables[sc.dc_tbl as usize]
                                .as_ref()
                                .expect("checked above");
                            ctx.decode_block_dc_first(block, sc.comp_idx, dc, scan.al)?;
                        }
                        (true, true) => ctx.decode_block_dc_refine(block, scan.al)?,
                        (false, refine) => {
                            let ac = self.ac_tables[sc.ac_tbl as usize]
                                .as_ref()
                                .expect("checked above");
                            if refine {
                                ctx.decode_block_ac_refine(block, ac, scan.ss, scan.se, scan.al)?;
                            } else {
                                ctx.decode_block_ac_first(block, ac, scan.ss, scan.se, scan.al)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Baseline MCU row decoding
    // =========================================================================

    fn decode_baseline_mcu_row(&mut self) -> DecodeResult<()> {
        let scan = self.baseline_scan.as_ref().expect("baseline scan set");
        let row_blocks = match &mut self.storage {
            CoeffStorage::McuRow(blocks) => blocks,
            CoeffStorage::Full(_) => return Err(DecodeError::Failed),
        };
        let mut ctx = ScanContext {
            input: &mut self.input,
            bits: &mut self.bits,
            state: &mut self.scan_state,
        };

        for mcu_col in 0..self.frame.mcus_per_row {
            ctx.restart_if_due()?;
            // Blocks interleave in scan component order; storage stays in
            // frame order via the per-component offsets.
            for sc in &scan.components {
                let c = sc.comp_idx;
                let comp = &self.frame.components[c];
                let dc = self.dc_tables[sc.dc_tbl as usize].as_ref().expect("checked");
                let ac = self.ac_tables[sc.ac_tbl as usize].as_ref().expect("checked");
                for dy in 0..comp.v as usize {
                    for dx in 0..comp.h as usize {
                        let idx = mcu_col * self.blocks_per_mcu
                            + self.comp_block_offset[c]
                            + dy * comp.h as usize
                            + dx;
                        ctx.decode_block_baseline(&mut row_blocks[idx], c, dc, ac)?;
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Reconstruction and emission
    // =========================================================================

    fn render_mcu_row(&mut self, mcu_row: usize) {
        for (c, comp) in self.frame.components.iter().enumerate() {
            let scale = if c > 0 { self.chroma_scale } else { 1 };
            let quant = self.parser.quant[comp.quant_idx as usize]
                .as_ref()
                .expect("checked at begin");
            let plane_w = self.plane_w[c];
            let plane = &mut self.planes[c];
            for dy in 0..comp.v as usize {
                for bx in 0..comp.mcu_blocks_w {
                    let block = match &self.storage {
                        CoeffStorage::McuRow(blocks) => {
                            let mcu_col = bx / comp.h as usize;
                            let dx = bx % comp.h as usize;
                            let idx = mcu_col * self.blocks_per_mcu
                                + self.comp_block_offset[c]
                                + dy * comp.h as usize
                                + dx;
                            &blocks[idx]
                        }
                        CoeffStorage::Full(grids) => {
                            let by = mcu_row * comp.v as usize + dy;
                            &grids[c][by * comp.mcu_blocks_w + bx]
                        }
                    };
                    if scale == 2 {
                        transform_block_2x(block, quant, plane, plane_w, bx * 16, dy * 16);
                    } else {
                        transform_block(block, quant, plane, plane_w, bx * 8, dy * 8);
                    }
                }
            }
        }
    }

    /// Produce one scanline into `scan_line` from the rendered planes.
    fn emit_row(&mut self, row: usize) {
        let width = self.frame.width as usize;
        if self.frame.components.len() == 1 {
            let src = row * self.plane_w[0];
            self.scan_line[..width].copy_from_slice(&self.planes[0][src..src + width]);
            return;
        }

        let h_max = self.frame.h_max as usize;
        let v_max = self.frame.v_max as usize;
        let cs = self.chroma_scale;
        let y_row = &self.planes[0][row * self.plane_w[0]..];
        let cb_row = &self.planes[1][(row * cs / v_max) * self.plane_w[1]..];
        let cr_row = &self.planes[2][(row * cs / v_max) * self.plane_w[2]..];
        for x in 0..width {
            let cx = x * cs / h_max;
            let (r, g, b) = self.ycc.to_rgb(y_row[x], cb_row[cx], cr_row[cx]);
            self.scan_line[x * 4..x * 4 + 4].copy_from_slice(&[r, g, b, 255]);
        }
    }

    /// Advance to the next scanline; false when the image is complete.
    fn next_scanline_inner(&mut self) -> DecodeResult<bool> {
        if self.rows_emitted >= self.frame.height {
            return Ok(false);
        }
        if self.row_in_mcu >= self.rows_per_mcu() {
            if !self.frame.progressive {
                self.decode_baseline_mcu_row()?;
            }
            self.render_mcu_row(self.next_mcu_row);
            self.next_mcu_row += 1;
            self.row_in_mcu = 0;
        }
        self.emit_row(self.row_in_mcu);
        self.row_in_mcu += 1;
        self.rows_emitted += 1;
        Ok(true)
    }
}

// =============================================================================
// Whole-image convenience entry points
// =============================================================================

/// Convert native decoder output (1 or 4 bytes per pixel) to the caller's
/// requested channel count.
fn convert_channels(
    native: &[u8],
    native_bpp: usize,
    req_channels: usize,
    pixels: usize,
) -> DecodeResult<Vec<u8>> {
    if !matches!(req_channels, 1 | 3 | 4) {
        return Err(DecodeError::UnsupportedColorspace);
    }
    let mut out = try_alloc_bytes(pixels * req_channels)?;
    for i in 0..pixels {
        let dst = &mut out[i * req_channels..(i + 1) * req_channels];
        match (native_bpp, req_channels) {
            (1, 1) => dst[0] = native[i],
            (1, 3) => dst.fill(native[i]),
            (1, 4) => {
                dst[..3].fill(native[i]);
                dst[3] = 255;
            }
            (4, 1) => {
                let px = &native[i * 4..i * 4 + 3];
                dst[0] = rgb_to_gray(px[0], px[1], px[2]);
            }
            (4, 3) => dst.copy_from_slice(&native[i * 4..i * 4 + 3]),
            (4, 4) => dst.copy_from_slice(&native[i * 4..i * 4 + 4]),
            _ => unreachable!("native output is 1 or 4 bytes per pixel"),
        }
    }
    Ok(out)
}

/// Decode a complete in-memory JPEG stream.
///
/// `req_channels` selects the output layout (1 = gray, 3 = RGB,
/// 4 = RGBA with alpha 255); [`DecodedInfo::components`] reports what the
/// stream itself carried.
pub fn decompress_from_memory(
    data: &[u8],
    req_channels: usize,
) -> DecodeResult<(Vec<u8>, DecodedInfo)> {
    let mut decoder = Decoder::new(Cursor::new(data))?;
    let info = DecodedInfo {
        width: decoder.width(),
        height: decoder.height(),
        components: decoder.num_components() as u8,
    };
    let native = decoder.decode_to_vec()?;
    let pixels = info.width as usize * info.height as usize;
    let out = convert_channels(&native, decoder.bytes_per_pixel(), req_channels, pixels)?;
    Ok((out, info))
}

/// Decode a JPEG file.
pub fn decompress_from_file<P: AsRef<Path>>(
    path: P,
    req_channels: usize,
) -> DecodeResult<(Vec<u8>, DecodedInfo)> {
    let file = File::open(path).map_err(|_| DecodeError::StreamRead)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let info = DecodedInfo {
        width: decoder.width(),
        height: decoder.height(),
        components: decoder.num_components() as u8,
    };
    let native = decoder.decode_to_vec()?;
    let pixels = info.width as usize * info.height as usize;
    let out = convert_channels(&native, decoder.bytes_per_pixel(), req_channels, pixels)?;
    Ok((out, info))
}
