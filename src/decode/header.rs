//! Marker segment parsing: SOI/SOF/DQT/DHT/DRI/SOS and the skip rules
//! for everything else.
//!
//! The parser owns the table stores (quantization and Huffman table
//! specifications) because DHT/DQT/DRI segments may update them between
//! scans of a progressive stream.

use std::io::Read;

use crate::consts::{
    is_rst_marker, DCTSIZE2, JPEG_NATURAL_ORDER, MARKER_DAC, MARKER_DHT, MARKER_DQT, MARKER_DRI,
    MARKER_EOI, MARKER_JPG, MARKER_SOF0, MARKER_SOF15, MARKER_SOF2, MARKER_SOF9, MARKER_SOI,
    MARKER_SOS, MARKER_TEM, MAX_COMPS_IN_SCAN, MAX_DIMENSION,
};
use crate::error::{DecodeError, DecodeResult};
use crate::huffman::HuffTable;

use super::input::InputBuffer;

/// One frame component as declared in SOF, plus derived block geometry.
#[derive(Debug, Clone)]
pub struct FrameComponent {
    /// Component identifier on the wire.
    pub id: u8,
    /// Horizontal sampling factor (1 or 2).
    pub h: u8,
    /// Vertical sampling factor (1 or 2).
    pub v: u8,
    /// Quantization table slot.
    pub quant_idx: u8,
    /// Block columns covered by interleaved MCUs (padded).
    pub mcu_blocks_w: usize,
    /// Block rows covered by interleaved MCUs (padded).
    pub mcu_blocks_h: usize,
    /// Block columns of the component itself (non-interleaved scans).
    pub scan_blocks_w: usize,
    /// Block rows of the component itself.
    pub scan_blocks_h: usize,
}

/// Parsed frame header.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    pub progressive: bool,
    pub components: Vec<FrameComponent>,
    pub h_max: u8,
    pub v_max: u8,
    pub mcus_per_row: usize,
    pub mcu_rows: usize,
}

/// One component's entry in a scan header.
#[derive(Debug, Clone, Copy)]
pub struct ScanComponent {
    /// Index into [`FrameHeader::components`].
    pub comp_idx: usize,
    /// DC Huffman table slot.
    pub dc_tbl: u8,
    /// AC Huffman table slot.
    pub ac_tbl: u8,
}

/// Parsed SOS header.
#[derive(Debug, Clone)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    /// Spectral selection start.
    pub ss: u8,
    /// Spectral selection end.
    pub se: u8,
    /// Successive approximation high bit.
    pub ah: u8,
    /// Successive approximation low bit.
    pub al: u8,
}

impl ScanHeader {
    /// True for a scan that codes only DC coefficients.
    pub fn is_dc_scan(&self) -> bool {
        self.ss == 0
    }

    /// True for a successive-approximation refinement scan.
    pub fn is_refinement(&self) -> bool {
        self.ah != 0
    }
}

/// Segment parser and table store.
pub struct MarkerParser {
    /// Quantization tables in natural order, per slot.
    pub quant: [Option<Box<[u16; DCTSIZE2]>>; 4],
    /// Huffman table specifications: slots 0-3 DC, 4-7 AC.
    pub huff: [Option<HuffTable>; 8],
    /// Restart interval in MCUs (0 = none).
    pub restart_interval: u16,
    frame: Option<FrameHeader>,
}

impl Default for MarkerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerParser {
    /// Empty parser: no tables, no frame.
    pub fn new() -> Self {
        Self {
            quant: Default::default(),
            huff: Default::default(),
            restart_interval: 0,
            frame: None,
        }
    }

    /// The frame header, once SOF has been read.
    pub fn frame(&self) -> Option<&FrameHeader> {
        self.frame.as_ref()
    }

    /// Require the stream to open with SOI.
    pub fn locate_soi<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<()> {
        let b0 = input.read_u8_or_eof()?;
        let b1 = input.read_u8_or_eof()?;
        match (b0, b1) {
            (Some(0xFF), Some(MARKER_SOI)) => Ok(()),
            _ => Err(DecodeError::NotJpeg),
        }
    }

    /// Scan forward to the next marker. Fill bytes (0xFF) before the code
    /// are allowed; other garbage is tolerated with a warning, matching
    /// the reference decoders.
    pub fn next_marker<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<u8> {
        let mut skipped = 0usize;
        loop {
            let mut b = input.read_u8()?;
            while b != 0xFF {
                skipped += 1;
                b = input.read_u8()?;
            }
            // Any number of fill bytes may precede the marker code.
            let mut code = input.read_u8()?;
            while code == 0xFF {
                code = input.read_u8()?;
            }
            if code != 0 {
                if skipped > 0 {
                    log::warn!("jpeg: skipped {} extra bytes before marker 0xFF{:02X}", skipped, code);
                }
                return Ok(code);
            }
            // 0xFF00 is stuffed entropy data out of place; keep scanning.
            skipped += 2;
        }
    }

    /// Dispatch one already-read marker code: table and skippable
    /// segments are consumed and yield `None`; frame-level markers (SOFn,
    /// SOS, EOI) come back to the caller.
    pub fn dispatch_marker<R: Read>(
        &mut self,
        marker: u8,
        input: &mut InputBuffer<R>,
    ) -> DecodeResult<Option<u8>> {
        match marker {
            MARKER_DHT => self.read_dht(input)?,
            MARKER_DQT => self.read_dqt(input)?,
            MARKER_DRI => self.read_dri(input)?,
            MARKER_DAC => return Err(DecodeError::NoArithmeticSupport),
            MARKER_SOS | MARKER_EOI => return Ok(Some(marker)),
            MARKER_JPG => return Err(DecodeError::UnexpectedMarker(marker)),
            // SOFn; DHT, DAC and JPG share the 0xC0 block but matched above.
            m if (MARKER_SOF0..=MARKER_SOF15).contains(&m) => return Ok(Some(marker)),
            MARKER_TEM => return Err(DecodeError::UnexpectedMarker(marker)),
            m if is_rst_marker(m) => return Err(DecodeError::UnexpectedMarker(marker)),
            MARKER_SOI => return Err(DecodeError::UnexpectedMarker(marker)),
            // DNL, COM, APPn, and anything else with a length field.
            _ => self.skip_variable(input)?,
        }
        Ok(None)
    }

    /// Process table/misc segments until a frame-level marker (SOFn, SOS,
    /// EOI) turns up, and return it.
    pub fn process_markers<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<u8> {
        loop {
            let marker = self.next_marker(input)?;
            if let Some(m) = self.dispatch_marker(marker, input)? {
                return Ok(m);
            }
        }
    }

    /// After SOI: read segments up to and including SOF.
    pub fn locate_sof<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<()> {
        let marker = self.process_markers(input)?;
        match marker {
            MARKER_SOF0 => self.read_sof(input, false),
            MARKER_SOF2 => self.read_sof(input, true),
            m if (MARKER_SOF9..=MARKER_SOF15).contains(&m) && m != MARKER_DAC => {
                Err(DecodeError::NoArithmeticSupport)
            }
            m if (MARKER_SOF0..=MARKER_SOF15).contains(&m) => {
                Err(DecodeError::UnsupportedMarker(m))
            }
            m => Err(DecodeError::UnexpectedMarker(m)),
        }
    }

    /// Find the next SOS (returning its parsed header) or EOI (returning
    /// `None`).
    pub fn locate_sos<R: Read>(
        &mut self,
        input: &mut InputBuffer<R>,
    ) -> DecodeResult<Option<ScanHeader>> {
        let marker = self.process_markers(input)?;
        match marker {
            MARKER_SOS => Ok(Some(self.read_sos(input)?)),
            MARKER_EOI => Ok(None),
            m => Err(DecodeError::UnexpectedMarker(m)),
        }
    }

    fn read_sof<R: Read>(&mut self, input: &mut InputBuffer<R>, progressive: bool) -> DecodeResult<()> {
        let len = input.read_u16()? as usize;
        let precision = input.read_u8()?;
        if precision != 8 {
            return Err(DecodeError::BadPrecision(precision));
        }
        let height = input.read_u16()? as u32;
        let width = input.read_u16()? as u32;
        if height == 0 || height > MAX_DIMENSION {
            return Err(DecodeError::BadHeight(height));
        }
        if width == 0 || width > MAX_DIMENSION {
            return Err(DecodeError::BadWidth(width));
        }
        let num_comps = input.read_u8()? as usize;
        if num_comps > 4 {
            return Err(DecodeError::TooManyComponents);
        }
        if len != 8 + 3 * num_comps {
            return Err(DecodeError::BadSofLength);
        }
        if !matches!(num_comps, 1 | 3) {
            return Err(DecodeError::UnsupportedColorspace);
        }

        let mut raw = Vec::with_capacity(num_comps);
        for _ in 0..num_comps {
            let id = input.read_u8()?;
            let hv = input.read_u8()?;
            let quant_idx = input.read_u8()?;
            if quant_idx > 3 {
                return Err(DecodeError::BadDqtMarker);
            }
            raw.push((id, hv >> 4, hv & 0x0F, quant_idx));
        }

        // Sampling factor checks: luma in {1, 2} each way, chroma 1x1.
        // Single-component frames always decode as 1x1.
        let (h_max, v_max) = if num_comps == 1 {
            (1u8, 1u8)
        } else {
            let (_, h0, v0, _) = raw[0];
            if !(1..=2).contains(&h0) || !(1..=2).contains(&v0) {
                return Err(DecodeError::UnsupportedSampFactors);
            }
            for &(_, h, v, _) in &raw[1..] {
                if h != 1 || v != 1 {
                    return Err(DecodeError::UnsupportedSampFactors);
                }
            }
            (h0, v0)
        };

        let mcus_per_row = (width as usize).div_ceil(8 * h_max as usize);
        let mcu_rows = (height as usize).div_ceil(8 * v_max as usize);

        let components = raw
            .iter()
            .map(|&(id, h, v, quant_idx)| {
                let (h, v) = if num_comps == 1 { (1, 1) } else { (h, v) };
                let samples_w = (width as usize * h as usize).div_ceil(h_max as usize);
                let samples_h = (height as usize * v as usize).div_ceil(v_max as usize);
                FrameComponent {
                    id,
                    h,
                    v,
                    quant_idx,
                    mcu_blocks_w: mcus_per_row * h as usize,
                    mcu_blocks_h: mcu_rows * v as usize,
                    scan_blocks_w: samples_w.div_ceil(8),
                    scan_blocks_h: samples_h.div_ceil(8),
                }
            })
            .collect();

        log::debug!(
            "jpeg: {} frame {}x{}, {} component(s), {}x{} sampling",
            if progressive { "progressive" } else { "baseline" },
            width,
            height,
            num_comps,
            h_max,
            v_max
        );

        self.frame = Some(FrameHeader {
            width,
            height,
            progressive,
            components,
            h_max,
            v_max,
            mcus_per_row,
            mcu_rows,
        });
        Ok(())
    }

    fn read_dqt<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<()> {
        let len = input.read_u16()?;
        let mut remaining = (len as usize)
            .checked_sub(2)
            .ok_or(DecodeError::BadDqtLength)?;
        while remaining > 0 {
            let pq_tq = input.read_u8()?;
            let precision = pq_tq >> 4;
            let slot = (pq_tq & 0x0F) as usize;
            if precision != 0 {
                // Only 8-bit tables in baseline streams.
                return Err(DecodeError::BadDqtLength);
            }
            if slot > 3 {
                return Err(DecodeError::BadDqtMarker);
            }
            if remaining < 1 + DCTSIZE2 {
                return Err(DecodeError::BadDqtLength);
            }
            let mut table = Box::new([0u16; DCTSIZE2]);
            for k in 0..DCTSIZE2 {
                table[JPEG_NATURAL_ORDER[k]] = input.read_u8()? as u16;
            }
            self.quant[slot] = Some(table);
            remaining -= 1 + DCTSIZE2;
        }
        Ok(())
    }

    fn read_dht<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<()> {
        let len = input.read_u16()?;
        let mut remaining = (len as usize)
            .checked_sub(2)
            .ok_or(DecodeError::BadDhtMarker)?;
        while remaining > 0 {
            if remaining < 17 {
                return Err(DecodeError::BadDhtMarker);
            }
            let tc_th = input.read_u8()?;
            let class = tc_th >> 4;
            let slot = (tc_th & 0x0F) as usize;
            if class > 1 || slot > 3 {
                return Err(DecodeError::BadDhtIndex);
            }

            let mut bits = [0u8; 17];
            let mut count = 0usize;
            for len_bits in bits.iter_mut().skip(1) {
                *len_bits = input.read_u8()?;
                count += *len_bits as usize;
            }
            if count > 256 {
                return Err(DecodeError::BadDhtCounts);
            }
            if remaining < 17 + count {
                return Err(DecodeError::BadDhtMarker);
            }
            let mut values = vec![0u8; count];
            for v in values.iter_mut() {
                *v = input.read_u8()?;
            }
            self.huff[slot + 4 * class as usize] = Some(HuffTable::new(bits, values));
            remaining -= 17 + count;
        }
        Ok(())
    }

    fn read_dri<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<()> {
        if input.read_u16()? != 4 {
            return Err(DecodeError::BadDriLength);
        }
        self.restart_interval = input.read_u16()?;
        Ok(())
    }

    fn skip_variable<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<()> {
        let len = input.read_u16()?;
        if len < 2 {
            return Err(DecodeError::BadVariableMarker);
        }
        input.skip(len as usize - 2)
    }

    /// Parse the SOS header. The SOS marker itself has been consumed.
    pub fn read_sos<R: Read>(&mut self, input: &mut InputBuffer<R>) -> DecodeResult<ScanHeader> {
        let frame = self.frame.as_ref().ok_or(DecodeError::UnexpectedMarker(MARKER_SOS))?;
        let len = input.read_u16()? as usize;
        let ns = input.read_u8()? as usize;
        if ns == 0 || ns > MAX_COMPS_IN_SCAN {
            return Err(DecodeError::TooManyComponents);
        }
        if len != 6 + 2 * ns {
            return Err(DecodeError::BadSosLength);
        }

        let mut components = Vec::with_capacity(ns);
        for _ in 0..ns {
            let id = input.read_u8()?;
            let tables = input.read_u8()?;
            let (dc_tbl, ac_tbl) = (tables >> 4, tables & 0x0F);
            if dc_tbl > 3 || ac_tbl > 3 {
                return Err(DecodeError::BadDhtIndex);
            }
            let comp_idx = frame
                .components
                .iter()
                .position(|c| c.id == id)
                .ok_or(DecodeError::BadSosCompId)?;
            components.push(ScanComponent { comp_idx, dc_tbl, ac_tbl });
        }

        let ss = input.read_u8()?;
        let se = input.read_u8()?;
        let ah_al = input.read_u8()?;
        let (ah, al) = (ah_al >> 4, ah_al & 0x0F);

        if ss > 63 || se > 63 || ss > se {
            return Err(DecodeError::BadSosSpectral);
        }
        if frame.progressive {
            // AC bands cover a single component and never position 0.
            if ss > 0 && (se < ss || ns != 1) {
                return Err(DecodeError::BadSosSpectral);
            }
            if ss == 0 && se != 0 {
                return Err(DecodeError::BadSosSpectral);
            }
            if ah > 13 || al > 13 || (ah != 0 && ah != al + 1) {
                return Err(DecodeError::BadSosSuccessive);
            }
        }

        log::debug!(
            "jpeg: scan with {} component(s), band {}..={}, approx {}/{}",
            ns,
            ss,
            se,
            ah,
            al
        );

        Ok(ScanHeader { components, ss, se, ah, al })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn input(bytes: &[u8]) -> InputBuffer<Cursor<Vec<u8>>> {
        InputBuffer::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn test_locate_soi() {
        let mut parser = MarkerParser::new();
        assert!(parser.locate_soi(&mut input(&[0xFF, 0xD8])).is_ok());
        assert_eq!(
            parser.locate_soi(&mut input(&[0x89, b'P'])).unwrap_err(),
            DecodeError::NotJpeg
        );
        assert_eq!(
            parser.locate_soi(&mut input(&[])).unwrap_err(),
            DecodeError::NotJpeg
        );
    }

    #[test]
    fn test_next_marker_skips_fill_bytes() {
        let mut parser = MarkerParser::new();
        let mut inp = input(&[0xFF, 0xFF, 0xFF, 0xD8]);
        assert_eq!(parser.next_marker(&mut inp).unwrap(), 0xD8);
    }

    #[test]
    fn test_next_marker_tolerates_garbage() {
        let mut parser = MarkerParser::new();
        let mut inp = input(&[0x01, 0x02, 0xFF, 0xC4]);
        assert_eq!(parser.next_marker(&mut inp).unwrap(), 0xC4);
    }

    #[test]
    fn test_read_dqt_roundtrip() {
        // DQT segment: slot 0, identity-ish ramp in zig-zag order.
        let mut seg = vec![0xFF, 0xDB, 0x00, 67, 0x00];
        seg.extend((1..=64).map(|v| v as u8));
        let mut parser = MarkerParser::new();
        let mut inp = input(&seg);
        assert_eq!(parser.next_marker(&mut inp).unwrap(), 0xDB);
        parser.read_dqt(&mut inp).unwrap();
        let table = parser.quant[0].as_ref().unwrap();
        // Zig-zag entry k lands at natural position JPEG_NATURAL_ORDER[k].
        assert_eq!(table[0], 1);
        assert_eq!(table[1], 2);
        assert_eq!(table[8], 3);
    }

    #[test]
    fn test_read_dqt_rejects_16bit() {
        let mut seg = vec![0xFF, 0xDB, 0x00, 67, 0x10];
        seg.extend(std::iter::repeat(0u8).take(64));
        let mut parser = MarkerParser::new();
        let mut inp = input(&seg);
        parser.next_marker(&mut inp).unwrap();
        assert_eq!(parser.read_dqt(&mut inp).unwrap_err(), DecodeError::BadDqtLength);
    }

    #[test]
    fn test_read_dht_installs_table() {
        let mut seg = vec![0x00]; // DC slot 0
        let mut bits = [0u8; 16];
        bits[1] = 2; // two 2-bit codes
        seg.extend_from_slice(&bits);
        seg.extend_from_slice(&[0x05, 0x06]);
        let total = 2 + seg.len();
        let mut full = vec![(total >> 8) as u8, total as u8];
        full.extend(seg);

        let mut parser = MarkerParser::new();
        let mut inp = input(&full);
        parser.read_dht(&mut inp).unwrap();
        let table = parser.huff[0].as_ref().unwrap();
        assert_eq!(table.num_symbols(), 2);
        assert_eq!(table.values, vec![0x05, 0x06]);
    }

    #[test]
    fn test_read_dht_rejects_bad_slot() {
        let mut seg = vec![0x00, 0x17, 0x29]; // length 0x17, tc_th=0x29
        seg.extend(std::iter::repeat(0u8).take(32));
        let mut parser = MarkerParser::new();
        let mut inp = input(&seg);
        assert_eq!(parser.read_dht(&mut inp).unwrap_err(), DecodeError::BadDhtIndex);
    }

    #[test]
    fn test_read_dri() {
        let mut parser = MarkerParser::new();
        parser.read_dri(&mut input(&[0x00, 0x04, 0x00, 0x20])).unwrap();
        assert_eq!(parser.restart_interval, 32);
        assert_eq!(
            parser.read_dri(&mut input(&[0x00, 0x05, 0, 0, 0])).unwrap_err(),
            DecodeError::BadDriLength
        );
    }

    fn sof_segment(precision: u8, width: u16, height: u16, comps: &[(u8, u8, u8)]) -> Vec<u8> {
        let len = 8 + 3 * comps.len() as u16;
        let mut seg = vec![(len >> 8) as u8, len as u8, precision];
        seg.extend_from_slice(&height.to_be_bytes());
        seg.extend_from_slice(&width.to_be_bytes());
        seg.push(comps.len() as u8);
        for &(id, hv, tq) in comps {
            seg.extend_from_slice(&[id, hv, tq]);
        }
        seg
    }

    #[test]
    fn test_read_sof_geometry() {
        let seg = sof_segment(8, 17, 3, &[(1, 0x22, 0), (2, 0x11, 1), (3, 0x11, 1)]);
        let mut parser = MarkerParser::new();
        parser.read_sof(&mut input(&seg), false).unwrap();
        let frame = parser.frame().unwrap();
        assert_eq!((frame.width, frame.height), (17, 3));
        assert_eq!((frame.h_max, frame.v_max), (2, 2));
        assert_eq!(frame.mcus_per_row, 2);
        assert_eq!(frame.mcu_rows, 1);
        let luma = &frame.components[0];
        assert_eq!((luma.mcu_blocks_w, luma.mcu_blocks_h), (4, 2));
        assert_eq!((luma.scan_blocks_w, luma.scan_blocks_h), (3, 1));
        let cb = &frame.components[1];
        assert_eq!((cb.mcu_blocks_w, cb.mcu_blocks_h), (2, 1));
        assert_eq!((cb.scan_blocks_w, cb.scan_blocks_h), (2, 1));
    }

    #[test]
    fn test_read_sof_rejections() {
        let mut parser = MarkerParser::new();
        let seg = sof_segment(12, 8, 8, &[(1, 0x11, 0)]);
        assert_eq!(
            parser.read_sof(&mut input(&seg), false).unwrap_err(),
            DecodeError::BadPrecision(12)
        );
        let seg = sof_segment(8, 0, 8, &[(1, 0x11, 0)]);
        assert_eq!(
            parser.read_sof(&mut input(&seg), false).unwrap_err(),
            DecodeError::BadWidth(0)
        );
        let seg = sof_segment(8, 8, 8, &[(1, 0x31, 0), (2, 0x11, 1), (3, 0x11, 1)]);
        assert_eq!(
            parser.read_sof(&mut input(&seg), false).unwrap_err(),
            DecodeError::UnsupportedSampFactors
        );
        let seg = sof_segment(8, 8, 8, &[(1, 0x11, 0), (2, 0x11, 1)]);
        assert_eq!(
            parser.read_sof(&mut input(&seg), false).unwrap_err(),
            DecodeError::UnsupportedColorspace
        );
    }

    #[test]
    fn test_read_sos_resolves_component_ids() {
        let sof = sof_segment(8, 8, 8, &[(1, 0x11, 0), (2, 0x11, 1), (3, 0x11, 1)]);
        let mut parser = MarkerParser::new();
        parser.read_sof(&mut input(&sof), false).unwrap();

        let sos = [
            0x00, 12, 3, // length, Ns
            1, 0x00, 2, 0x11, 3, 0x11, // comp specs
            0, 63, 0, // Ss, Se, AhAl
        ];
        let scan = parser.read_sos(&mut input(&sos)).unwrap();
        assert_eq!(scan.components.len(), 3);
        assert_eq!(scan.components[1].comp_idx, 1);
        assert_eq!(scan.components[1].dc_tbl, 1);
        assert_eq!((scan.ss, scan.se, scan.ah, scan.al), (0, 63, 0, 0));
    }

    #[test]
    fn test_read_sos_rejects_unknown_component() {
        let sof = sof_segment(8, 8, 8, &[(1, 0x11, 0)]);
        let mut parser = MarkerParser::new();
        parser.read_sof(&mut input(&sof), false).unwrap();
        let sos = [0x00, 8, 1, 9, 0x00, 0, 63, 0];
        assert_eq!(
            parser.read_sos(&mut input(&sos)).unwrap_err(),
            DecodeError::BadSosCompId
        );
    }
}
