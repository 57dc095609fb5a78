//! JPEG marker segment emission for the baseline encoder.
//!
//! Segment layout per ITU-T T.81 Annex B. The encoder always produces the
//! fixed sequence SOI, APP0 (JFIF 1.01), DQT(s), SOF0, DHT(s), optional
//! DRI, SOS, entropy data, EOI.

use std::io::Write;

use crate::consts::{
    DCTSIZE2, JPEG_NATURAL_ORDER, MARKER_APP0, MARKER_DHT, MARKER_DQT, MARKER_DRI, MARKER_EOI,
    MARKER_SOF0, MARKER_SOI, MARKER_SOS,
};
use crate::huffman::HuffTable;
use crate::types::{ComponentInfo, PixelDensity, QuantTable};

/// JFIF identifier, NUL terminated.
const JFIF_ID: [u8; 5] = *b"JFIF\0";

/// JFIF version 1.01.
const JFIF_VERSION: [u8; 2] = [1, 1];

/// Marker segment writer.
pub struct MarkerWriter<W: Write> {
    output: W,
    bytes_written: usize,
}

impl<W: Write> MarkerWriter<W> {
    /// Create a marker writer over an output sink.
    pub fn new(output: W) -> Self {
        Self { output, bytes_written: 0 }
    }

    fn emit_byte(&mut self, byte: u8) -> std::io::Result<()> {
        self.output.write_all(&[byte])?;
        self.bytes_written += 1;
        Ok(())
    }

    fn emit_u16(&mut self, value: u16) -> std::io::Result<()> {
        self.emit_byte((value >> 8) as u8)?;
        self.emit_byte(value as u8)
    }

    fn emit_marker(&mut self, marker: u8) -> std::io::Result<()> {
        self.emit_byte(0xFF)?;
        self.emit_byte(marker)
    }

    /// Start of Image.
    pub fn write_soi(&mut self) -> std::io::Result<()> {
        self.emit_marker(MARKER_SOI)
    }

    /// End of Image.
    pub fn write_eoi(&mut self) -> std::io::Result<()> {
        self.emit_marker(MARKER_EOI)
    }

    /// APP0 JFIF segment: version 1.01, no thumbnail.
    pub fn write_jfif_app0(&mut self, density: PixelDensity) -> std::io::Result<()> {
        self.emit_marker(MARKER_APP0)?;
        self.emit_u16(16)?;
        for &b in &JFIF_ID {
            self.emit_byte(b)?;
        }
        self.emit_byte(JFIF_VERSION[0])?;
        self.emit_byte(JFIF_VERSION[1])?;
        self.emit_byte(density.unit)?;
        self.emit_u16(density.x)?;
        self.emit_u16(density.y)?;
        self.emit_byte(0)?; // thumbnail width
        self.emit_byte(0) // thumbnail height
    }

    /// DQT segment for one 8-bit table; values are reordered to zig-zag on
    /// the wire.
    pub fn write_dqt(&mut self, table_index: u8, table: &QuantTable) -> std::io::Result<()> {
        self.emit_marker(MARKER_DQT)?;
        self.emit_u16(2 + 1 + DCTSIZE2 as u16)?;
        self.emit_byte(table_index & 0x0F)?; // Pq=0 (8-bit), Tq
        for k in 0..DCTSIZE2 {
            self.emit_byte(table.values[JPEG_NATURAL_ORDER[k]] as u8)?;
        }
        Ok(())
    }

    /// Baseline SOF0 frame header.
    pub fn write_sof0(
        &mut self,
        width: u16,
        height: u16,
        components: &[ComponentInfo],
    ) -> std::io::Result<()> {
        self.emit_marker(MARKER_SOF0)?;
        self.emit_u16(8 + 3 * components.len() as u16)?;
        self.emit_byte(8)?; // sample precision
        self.emit_u16(height)?;
        self.emit_u16(width)?;
        self.emit_byte(components.len() as u8)?;
        for comp in components {
            self.emit_byte(comp.component_id)?;
            self.emit_byte((comp.h_samp_factor << 4) | comp.v_samp_factor)?;
            self.emit_byte(comp.quant_tbl_no)?;
        }
        Ok(())
    }

    /// DHT segment for one table.
    pub fn write_dht(
        &mut self,
        table_index: u8,
        is_ac: bool,
        table: &HuffTable,
    ) -> std::io::Result<()> {
        self.emit_marker(MARKER_DHT)?;
        let num_symbols = table.num_symbols() as u16;
        self.emit_u16(2 + 1 + 16 + num_symbols)?;
        let tc_th = if is_ac { 0x10 } else { 0x00 } | (table_index & 0x0F);
        self.emit_byte(tc_th)?;
        for len in 1..=16 {
            self.emit_byte(table.bits[len])?;
        }
        for &sym in &table.values {
            self.emit_byte(sym)?;
        }
        Ok(())
    }

    /// DRI segment; skipped entirely when the interval is zero.
    pub fn write_dri(&mut self, interval: u16) -> std::io::Result<()> {
        if interval == 0 {
            return Ok(());
        }
        self.emit_marker(MARKER_DRI)?;
        self.emit_u16(4)?;
        self.emit_u16(interval)
    }

    /// SOS header for the single interleaved baseline scan (Ss=0, Se=63,
    /// Ah=Al=0).
    pub fn write_sos(&mut self, components: &[ComponentInfo]) -> std::io::Result<()> {
        self.emit_marker(MARKER_SOS)?;
        self.emit_u16(6 + 2 * components.len() as u16)?;
        self.emit_byte(components.len() as u8)?;
        for comp in components {
            self.emit_byte(comp.component_id)?;
            self.emit_byte((comp.dc_tbl_no << 4) | comp.ac_tbl_no)?;
        }
        self.emit_byte(0)?; // Ss
        self.emit_byte(63)?; // Se
        self.emit_byte(0) // Ah/Al
    }

    /// Total bytes written.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Consume the writer and return the underlying output.
    pub fn into_inner(self) -> W {
        self.output
    }

    /// Get a mutable reference to the underlying output.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ycbcr_components() -> Vec<ComponentInfo> {
        vec![
            ComponentInfo {
                component_id: 1,
                h_samp_factor: 2,
                v_samp_factor: 2,
                quant_tbl_no: 0,
                dc_tbl_no: 0,
                ac_tbl_no: 0,
            },
            ComponentInfo {
                component_id: 2,
                h_samp_factor: 1,
                v_samp_factor: 1,
                quant_tbl_no: 1,
                dc_tbl_no: 1,
                ac_tbl_no: 1,
            },
            ComponentInfo {
                component_id: 3,
                h_samp_factor: 1,
                v_samp_factor: 1,
                quant_tbl_no: 1,
                dc_tbl_no: 1,
                ac_tbl_no: 1,
            },
        ]
    }

    #[test]
    fn test_soi_eoi() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_soi().unwrap();
        w.write_eoi().unwrap();
        assert_eq!(w.into_inner(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn test_jfif_app0_layout() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_jfif_app0(PixelDensity::default()).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..4], &[0xFF, 0xE0, 0x00, 0x10]);
        assert_eq!(&out[4..9], b"JFIF\0");
        assert_eq!(&out[9..11], &[1, 1]); // version 1.01
        assert_eq!(out[11], 0); // no units
        assert_eq!(&out[12..16], &[0, 1, 0, 1]); // 1:1 aspect
        assert_eq!(&out[16..18], &[0, 0]); // no thumbnail
        assert_eq!(out.len(), 18);
    }

    #[test]
    fn test_dqt_is_zigzag_ordered() {
        let mut values = [0u16; DCTSIZE2];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as u16 + 1;
        }
        let mut w = MarkerWriter::new(Vec::new());
        w.write_dqt(1, &QuantTable::new(values)).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..4], &[0xFF, 0xDB, 0x00, 67]);
        assert_eq!(out[4], 0x01); // 8-bit precision, slot 1
        // Zig-zag positions 0..4 are natural 0, 1, 8, 16.
        assert_eq!(&out[5..9], &[1, 2, 9, 17]);
    }

    #[test]
    fn test_sof0_layout() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_sof0(640, 480, &ycbcr_components()).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xC0]);
        assert_eq!(out[4], 8); // precision
        assert_eq!(u16::from_be_bytes([out[5], out[6]]), 480);
        assert_eq!(u16::from_be_bytes([out[7], out[8]]), 640);
        assert_eq!(out[9], 3);
        // Luma: id 1, 2x2 sampling, quant slot 0.
        assert_eq!(&out[10..13], &[1, 0x22, 0]);
    }

    #[test]
    fn test_dht_layout() {
        let table = HuffTable::std_dc_luma();
        let mut w = MarkerWriter::new(Vec::new());
        w.write_dht(0, false, &table).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xC4]);
        assert_eq!(u16::from_be_bytes([out[2], out[3]]), 2 + 1 + 16 + 12);
        assert_eq!(out[4], 0x00); // DC slot 0
        assert_eq!(&out[5..21], &table.bits[1..]);
    }

    #[test]
    fn test_dht_ac_class_bit() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_dht(1, true, &HuffTable::std_ac_chroma()).unwrap();
        assert_eq!(w.into_inner()[4], 0x11);
    }

    #[test]
    fn test_sos_layout() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_sos(&ycbcr_components()).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xDA]);
        assert_eq!(out[4], 3);
        // Trailing spectral selection: full baseline scan.
        assert_eq!(&out[out.len() - 3..], &[0, 63, 0]);
    }

    #[test]
    fn test_dri() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_dri(0).unwrap();
        assert_eq!(w.bytes_written(), 0);
        w.write_dri(32).unwrap();
        assert_eq!(w.into_inner(), vec![0xFF, 0xDD, 0x00, 0x04, 0x00, 32]);
    }
}
