//! Huffman table machinery shared by the encoder and decoder.
//!
//! A table is specified on the wire as 16 code-length counts plus the
//! symbol list in code order ([`HuffTable`]). From that specification we
//! derive:
//!
//! - [`DerivedTable`] - per-symbol (code, size) pairs for encoding
//! - [`HuffDecodeTable`] - a 256-entry fast lookup for codes of up to
//!   8 bits, with an overflow binary tree for longer codes
//!
//! Optimal tables are built from [`FrequencyCounter`] statistics with the
//! package-merge algorithm, length-limited to 16 bits. A reserved
//! pseudo-symbol keeps the all-ones code unassigned so that 1-padding at
//! the end of an entropy segment can never form a valid code.

use crate::consts::{
    MAX_HUFF_CODE_LEN, STD_AC_CHROMA_BITS, STD_AC_CHROMA_VALUES, STD_AC_LUMA_BITS,
    STD_AC_LUMA_VALUES, STD_DC_CHROMA_BITS, STD_DC_CHROMA_VALUES, STD_DC_LUMA_BITS,
    STD_DC_LUMA_VALUES,
};
use crate::error::{DecodeError, DecodeResult, Error, Result};

/// Symbol alphabet size (DC categories and packed AC run/size bytes).
const NUM_SYMBOLS: usize = 256;

/// Reserved pseudo-symbol that absorbs the all-ones code.
const PSEUDO_SYMBOL: u32 = 256;

/// Huffman table specification: code-length counts plus symbols in code
/// order, exactly as carried in a DHT segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HuffTable {
    /// `bits[k]` = number of codes of length k; `bits[0]` is unused.
    pub bits: [u8; 17],
    /// Symbol values in order of increasing code length.
    pub values: Vec<u8>,
}

impl HuffTable {
    /// Create a table from counts and symbols.
    pub fn new(bits: [u8; 17], values: Vec<u8>) -> Self {
        Self { bits, values }
    }

    /// Total number of symbols in this table.
    pub fn num_symbols(&self) -> usize {
        self.bits[1..].iter().map(|&b| b as usize).sum()
    }

    /// K.3 standard DC luminance table.
    pub fn std_dc_luma() -> Self {
        Self::new(STD_DC_LUMA_BITS, STD_DC_LUMA_VALUES.to_vec())
    }

    /// K.4 standard DC chrominance table.
    pub fn std_dc_chroma() -> Self {
        Self::new(STD_DC_CHROMA_BITS, STD_DC_CHROMA_VALUES.to_vec())
    }

    /// K.5 standard AC luminance table.
    pub fn std_ac_luma() -> Self {
        Self::new(STD_AC_LUMA_BITS, STD_AC_LUMA_VALUES.to_vec())
    }

    /// K.6 standard AC chrominance table.
    pub fn std_ac_chroma() -> Self {
        Self::new(STD_AC_CHROMA_BITS, STD_AC_CHROMA_VALUES.to_vec())
    }
}

// =============================================================================
// Encoder side: derived (code, size) table
// =============================================================================

/// Per-symbol Huffman codes derived from a [`HuffTable`], for encoding.
#[derive(Debug, Clone)]
pub struct DerivedTable {
    /// Code bits, right-aligned, per symbol.
    codes: [u32; NUM_SYMBOLS],
    /// Code length in bits per symbol; 0 = symbol has no code.
    sizes: [u8; NUM_SYMBOLS],
}

impl DerivedTable {
    /// Assign canonical codes: consecutive values within each length,
    /// lengths visited in increasing order.
    pub fn derive(table: &HuffTable) -> Result<Self> {
        let mut codes = [0u32; NUM_SYMBOLS];
        let mut sizes = [0u8; NUM_SYMBOLS];

        let mut code = 0u32;
        let mut k = 0usize;
        for len in 1..=MAX_HUFF_CODE_LEN {
            for _ in 0..table.bits[len] {
                let sym = *table
                    .values
                    .get(k)
                    .ok_or(Error::InternalError("huffman counts exceed symbol list"))?
                    as usize;
                if code >= (1u32 << len) {
                    return Err(Error::HuffmanCodeLengthOverflow);
                }
                codes[sym] = code;
                sizes[sym] = len as u8;
                code += 1;
                k += 1;
            }
            code <<= 1;
        }
        Ok(Self { codes, sizes })
    }

    /// Returns (code, size) for a symbol. Size 0 means the symbol has no
    /// code in this table.
    #[inline]
    pub fn get_code(&self, symbol: u8) -> (u32, u8) {
        (self.codes[symbol as usize], self.sizes[symbol as usize])
    }
}

// =============================================================================
// Symbol frequency statistics
// =============================================================================

/// Symbol frequency counts gathered during the first pass of two-pass
/// encoding.
#[derive(Debug, Clone)]
pub struct FrequencyCounter {
    counts: [u32; NUM_SYMBOLS],
}

impl Default for FrequencyCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyCounter {
    /// Create a counter with all frequencies zero.
    pub fn new() -> Self {
        Self { counts: [0; NUM_SYMBOLS] }
    }

    /// Record one occurrence of a symbol.
    #[inline]
    pub fn count(&mut self, symbol: u8) {
        self.counts[symbol as usize] += 1;
    }

    /// Frequency of a symbol.
    pub fn get(&self, symbol: u8) -> u32 {
        self.counts[symbol as usize]
    }

    /// Reset all counts to zero.
    pub fn clear(&mut self) {
        self.counts = [0; NUM_SYMBOLS];
    }
}

// =============================================================================
// Optimal table construction (package-merge)
// =============================================================================

/// One package in the coin-collector lists: a weight and the multiset of
/// leaf symbols it contains.
#[derive(Debug, Clone)]
struct Package {
    weight: u64,
    symbols: Vec<u32>,
}

/// Build an optimal length-limited Huffman table from gathered frequencies.
///
/// Runs package-merge with a 16-bit length limit over the observed symbols
/// plus the reserved pseudo-symbol (weight below every real symbol, so it
/// sinks to the deepest level and claims the all-ones code, which is then
/// dropped from the emitted table). Codes are assigned canonically in
/// (length, symbol) order, which makes the construction deterministic.
pub fn build_optimal_table(freqs: &FrequencyCounter) -> Result<HuffTable> {
    // Leaves: every observed symbol, plus the pseudo-symbol. The pseudo
    // weight of zero is strictly minimal, which pins it to maximum depth.
    let mut leaves: Vec<Package> = Vec::new();
    leaves.push(Package { weight: 0, symbols: vec![PSEUDO_SYMBOL] });
    for sym in 0..NUM_SYMBOLS as u32 {
        let f = freqs.counts[sym as usize];
        if f > 0 {
            leaves.push(Package { weight: f as u64, symbols: vec![sym] });
        }
    }
    if leaves.len() < 2 {
        return Err(Error::InternalError("no symbols to code"));
    }
    leaves.sort_by_key(|p| (p.weight, p.symbols[0]));

    let n = leaves.len();
    if n > (1 << MAX_HUFF_CODE_LEN) {
        return Err(Error::HuffmanCodeLengthOverflow);
    }

    // Coin collector: L-1 rounds of package-then-merge.
    let mut packages: Vec<Package> = leaves.clone();
    for _ in 1..MAX_HUFF_CODE_LEN {
        let mut paired: Vec<Package> = Vec::with_capacity(packages.len() / 2);
        for pair in packages.chunks_exact(2) {
            let mut symbols = pair[0].symbols.clone();
            symbols.extend_from_slice(&pair[1].symbols);
            paired.push(Package { weight: pair[0].weight + pair[1].weight, symbols });
        }
        // Stable merge of the original leaves with the new packages;
        // leaves win ties so the ordering is reproducible.
        let mut merged: Vec<Package> = Vec::with_capacity(n + paired.len());
        let (mut i, mut j) = (0usize, 0usize);
        while i < n || j < paired.len() {
            let take_leaf = match (leaves.get(i), paired.get(j)) {
                (Some(a), Some(b)) => a.weight <= b.weight,
                (Some(_), None) => true,
                _ => false,
            };
            if take_leaf {
                merged.push(leaves[i].clone());
                i += 1;
            } else {
                merged.push(paired[j].clone());
                j += 1;
            }
        }
        packages = merged;
    }

    // The first 2n-2 packages define the code: each occurrence of a symbol
    // adds one bit to its length.
    let mut lengths = [0u8; NUM_SYMBOLS + 1];
    for package in packages.iter().take(2 * n - 2) {
        for &sym in &package.symbols {
            lengths[sym as usize] += 1;
        }
    }

    // Collect (length, symbol) in canonical order and drop the pseudo.
    let mut coded: Vec<(u8, u32)> = (0..=NUM_SYMBOLS as u32)
        .filter(|&s| lengths[s as usize] > 0)
        .map(|s| (lengths[s as usize], s))
        .collect();
    coded.sort();

    let mut bits = [0u8; 17];
    let mut values = Vec::with_capacity(coded.len() - 1);
    for &(len, sym) in &coded {
        if sym == PSEUDO_SYMBOL {
            continue;
        }
        if len as usize > MAX_HUFF_CODE_LEN {
            return Err(Error::HuffmanCodeLengthOverflow);
        }
        bits[len as usize] += 1;
        values.push(sym as u8);
    }
    Ok(HuffTable::new(bits, values))
}

// =============================================================================
// Decoder side: fast lookup + overflow tree
// =============================================================================

/// Marker for "no child" in the overflow tree.
const TREE_NONE: i32 = 0;

/// Huffman decode table: an 8-bit-indexed fast path covering all codes of
/// up to 8 bits, and a binary tree for the 9..16-bit overflow.
#[derive(Debug, Clone)]
pub struct HuffDecodeTable {
    /// Decoded symbol when `fast_size` is non-zero.
    fast_symbol: [u8; 256],
    /// Code length for the fast path; 0 = consult the tree.
    fast_size: [u8; 256],
    /// Tree root (node index + 1) per 8-bit prefix; 0 = invalid prefix.
    overflow_root: [u16; 256],
    /// Tree nodes: child > 0 is (node index + 1), child < 0 is
    /// -(symbol + 1), 0 is an invalid branch.
    nodes: Vec<[i32; 2]>,
}

impl HuffDecodeTable {
    /// Build decode structures from a table specification.
    ///
    /// Fails with [`DecodeError::BadDhtCounts`] when the counts describe an
    /// overfull code.
    pub fn build(table: &HuffTable) -> DecodeResult<Self> {
        let mut out = Self {
            fast_symbol: [0; 256],
            fast_size: [0; 256],
            overflow_root: [0; 256],
            nodes: Vec::new(),
        };

        let mut code = 0u32;
        let mut k = 0usize;
        for len in 1..=MAX_HUFF_CODE_LEN {
            for _ in 0..table.bits[len] {
                if code >= (1u32 << len) {
                    return Err(DecodeError::BadDhtCounts);
                }
                let sym = *table.values.get(k).ok_or(DecodeError::BadDhtCounts)?;
                if len <= 8 {
                    // Every 8-bit index sharing this prefix resolves directly.
                    let start = (code << (8 - len)) as usize;
                    let span = 1usize << (8 - len);
                    for slot in start..start + span {
                        out.fast_symbol[slot] = sym;
                        out.fast_size[slot] = len as u8;
                    }
                } else {
                    out.insert_overflow(code, len, sym)?;
                }
                code += 1;
                k += 1;
            }
            code <<= 1;
        }
        Ok(out)
    }

    /// Insert a 9..16-bit code into the overflow tree.
    fn insert_overflow(&mut self, code: u32, len: usize, sym: u8) -> DecodeResult<()> {
        let prefix = (code >> (len - 8)) as usize;
        let mut node = match self.overflow_root[prefix] {
            0 => {
                self.nodes.push([TREE_NONE; 2]);
                let idx = self.nodes.len() - 1;
                self.overflow_root[prefix] = (idx + 1) as u16;
                idx
            }
            root => root as usize - 1,
        };

        // Walk the bits below the prefix, most significant first.
        for depth in (0..len - 8).rev() {
            let bit = ((code >> depth) & 1) as usize;
            if depth == 0 {
                if self.nodes[node][bit] != TREE_NONE {
                    return Err(DecodeError::BadDhtCounts);
                }
                self.nodes[node][bit] = -(sym as i32 + 1);
            } else {
                node = match self.nodes[node][bit] {
                    TREE_NONE => {
                        self.nodes.push([TREE_NONE; 2]);
                        let idx = self.nodes.len() - 1;
                        self.nodes[node][bit] = (idx + 1) as i32;
                        idx
                    }
                    child if child > 0 => child as usize - 1,
                    // A shorter code already ends on this path.
                    _ => return Err(DecodeError::BadDhtCounts),
                };
            }
        }
        Ok(())
    }

    /// Decode one symbol from the top of a 16-bit window (MSB-aligned).
    ///
    /// Returns (symbol, code length) or `None` for an invalid code.
    #[inline]
    pub fn lookup(&self, window: u16) -> Option<(u8, u8)> {
        let prefix = (window >> 8) as usize;
        let size = self.fast_size[prefix];
        if size > 0 {
            return Some((self.fast_symbol[prefix], size));
        }
        let mut node = match self.overflow_root[prefix] {
            0 => return None,
            root => root as usize - 1,
        };
        let mut len = 8u8;
        loop {
            if len >= 16 {
                return None;
            }
            let bit = ((window >> (15 - len)) & 1) as usize;
            len += 1;
            match self.nodes[node][bit] {
                TREE_NONE => return None,
                child if child > 0 => node = child as usize - 1,
                leaf => return Some(((-leaf - 1) as u8, len)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_std_ac_luma_known_codes() {
        let derived = DerivedTable::derive(&HuffTable::std_ac_luma()).unwrap();
        // Canonical order: 0x01=00, 0x02=01, 0x03=100, 0x00 (EOB)=1010.
        assert_eq!(derived.get_code(0x01), (0b00, 2));
        assert_eq!(derived.get_code(0x02), (0b01, 2));
        assert_eq!(derived.get_code(0x03), (0b100, 3));
        assert_eq!(derived.get_code(0x00), (0b1010, 4));
        // ZRL is an 11-bit code in the standard table.
        let (_, zrl_size) = derived.get_code(0xF0);
        assert_eq!(zrl_size, 11);
    }

    #[test]
    fn test_derive_rejects_overfull_counts() {
        let mut bits = [0u8; 17];
        bits[1] = 3; // three 1-bit codes cannot exist
        let table = HuffTable::new(bits, vec![0, 1, 2]);
        assert!(DerivedTable::derive(&table).is_err());
    }

    #[test]
    fn test_decode_table_roundtrips_every_symbol() {
        for table in [
            HuffTable::std_dc_luma(),
            HuffTable::std_dc_chroma(),
            HuffTable::std_ac_luma(),
            HuffTable::std_ac_chroma(),
        ] {
            let derived = DerivedTable::derive(&table).unwrap();
            let decode = HuffDecodeTable::build(&table).unwrap();
            for &sym in &table.values {
                let (code, size) = derived.get_code(sym);
                let window = (code << (16 - size)) as u16;
                assert_eq!(decode.lookup(window), Some((sym, size)), "symbol {:#04x}", sym);
            }
        }
    }

    #[test]
    fn test_decode_table_rejects_invalid_code() {
        // DC luma assigns nothing to the all-ones 16-bit window.
        let decode = HuffDecodeTable::build(&HuffTable::std_dc_luma()).unwrap();
        assert_eq!(decode.lookup(0xFFFF), None);
    }

    #[test]
    fn test_optimal_table_is_canonical_and_complete() {
        let mut freqs = FrequencyCounter::new();
        for (sym, count) in [(0u8, 100u32), (1, 50), (2, 20), (3, 5), (0xF0, 1)] {
            for _ in 0..count {
                freqs.count(sym);
            }
        }
        let table = build_optimal_table(&freqs).unwrap();
        assert_eq!(table.num_symbols(), 5);
        assert_eq!(table.num_symbols(), table.values.len());
        // Every counted symbol received a code, and it decodes back.
        let derived = DerivedTable::derive(&table).unwrap();
        let decode = HuffDecodeTable::build(&table).unwrap();
        for sym in [0u8, 1, 2, 3, 0xF0] {
            let (code, size) = derived.get_code(sym);
            assert!(size > 0);
            let window = (code << (16 - size)) as u16;
            assert_eq!(decode.lookup(window), Some((sym, size)));
        }
    }

    #[test]
    fn test_optimal_table_orders_by_frequency() {
        let mut freqs = FrequencyCounter::new();
        for _ in 0..1000 {
            freqs.count(7);
        }
        for _ in 0..10 {
            freqs.count(3);
        }
        freqs.count(9);
        let table = build_optimal_table(&freqs).unwrap();
        let derived = DerivedTable::derive(&table).unwrap();
        let (_, s7) = derived.get_code(7);
        let (_, s3) = derived.get_code(3);
        let (_, s9) = derived.get_code(9);
        assert!(s7 <= s3 && s3 <= s9);
    }

    #[test]
    fn test_optimal_table_never_assigns_all_ones() {
        // Skewed frequencies that would produce an all-ones code without
        // the pseudo-symbol reservation.
        let mut freqs = FrequencyCounter::new();
        for sym in 0..16u8 {
            for _ in 0..(1u32 << sym.min(20)) {
                freqs.count(sym);
            }
        }
        let table = build_optimal_table(&freqs).unwrap();
        let derived = DerivedTable::derive(&table).unwrap();
        for sym in 0..16u8 {
            let (code, size) = derived.get_code(sym);
            assert_ne!(code, (1u32 << size) - 1, "symbol {} got the all-ones code", sym);
        }
    }

    #[test]
    fn test_optimal_table_is_deterministic() {
        let mut freqs = FrequencyCounter::new();
        for sym in 0..100u8 {
            for _ in 0..=(sym as u32 % 7) {
                freqs.count(sym);
            }
        }
        let a = build_optimal_table(&freqs).unwrap();
        let b = build_optimal_table(&freqs).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_optimal_table_single_symbol() {
        let mut freqs = FrequencyCounter::new();
        freqs.count(5);
        let table = build_optimal_table(&freqs).unwrap();
        let derived = DerivedTable::derive(&table).unwrap();
        let (_, size) = derived.get_code(5);
        assert!(size >= 1);
    }
}
