//! LZHUF: LZSS over a 4 KiB window with adaptive Huffman coded symbols
//!
//! Literals and match lengths share one adaptive Huffman alphabet; match
//! positions use a fixed code for their upper six bits followed by six raw
//! bits. The window starts filled with spaces.

use crate::error::{SymbolError, SymbolResult};

use super::{frame_blob, NameCodec};

/// Window size
const N: usize = 4096;
/// Longest match
const F: usize = 60;
/// Matches must be longer than this
const THRESHOLD: usize = 2;
/// Literals plus match lengths
const N_CHAR: usize = 256 - THRESHOLD + F;
/// Tree size
const T: usize = N_CHAR * 2 - 1;
/// Root position
const R: usize = T - 1;
/// Tree is rebuilt when the root frequency reaches this
const MAX_FREQ: u32 = 0x8000;

/// Bit length of the upper six position bits
const P_LEN: [u8; 64] = [
    3, 4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 6, 6, 6, 6, //
    6, 6, 6, 6, 6, 6, 6, 6, 7, 7, 7, 7, 7, 7, 7, 7, //
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, //
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, //
];

/// Code of the upper six position bits, left aligned in a byte
const P_CODE: [u8; 64] = [
    0x00, 0x20, 0x30, 0x40, 0x50, 0x58, 0x60, 0x68, 0x70, 0x78, 0x80, 0x88, 0x90, 0x94, 0x98,
    0x9C, 0xA0, 0xA4, 0xA8, 0xAC, 0xB0, 0xB4, 0xB8, 0xBC, 0xC0, 0xC2, 0xC4, 0xC6, 0xC8, 0xCA,
    0xCC, 0xCE, 0xD0, 0xD2, 0xD4, 0xD6, 0xD8, 0xDA, 0xDC, 0xDE, 0xE0, 0xE2, 0xE4, 0xE6, 0xE8,
    0xEA, 0xEC, 0xEE, 0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFB,
    0xFC, 0xFD, 0xFE, 0xFF,
];

/// Decoding tables indexed by the next eight input bits: (upper bits, code length)
const D_TABLE: [(u8, u8); 256] = build_decode_table();

const fn build_decode_table() -> [(u8, u8); 256] {
    let mut table = [(0u8, 0u8); 256];
    let mut upper = 0;
    while upper < 64 {
        let len = P_LEN[upper];
        let start = P_CODE[upper] as usize;
        let span = 1usize << (8 - len as usize);
        let mut i = 0;
        while i < span {
            table[start + i] = (upper as u8, len);
            i += 1;
        }
        upper += 1;
    }
    table
}

/// Name blob codec used by Trionic 7 firmware
#[derive(Debug, Clone, Copy, Default)]
pub struct LzhufCodec;

impl NameCodec for LzhufCodec {
    fn name(&self) -> &'static str {
        "lzhuf"
    }

    fn decompress(&self, payload: &[u8], declared_size: usize) -> SymbolResult<Vec<u8>> {
        decode(payload, declared_size)
    }
}

/// Decode `size` bytes from an LZHUF stream
pub fn decode(input: &[u8], size: usize) -> SymbolResult<Vec<u8>> {
    let mut out = Vec::with_capacity(size);
    if size == 0 {
        return Ok(out);
    }

    let mut bits = BitReader::new(input);
    let mut tree = AdaptiveHuffman::new();
    let mut window = [b' '; N];
    let mut r = N - F;

    while out.len() < size {
        if bits.exhausted() {
            return Err(SymbolError::Decompress(format!(
                "stream ended after {} of {} bytes",
                out.len(),
                size
            )));
        }

        let c = tree.decode_char(&mut bits);
        if c < 256 {
            out.push(c as u8);
            window[r] = c as u8;
            r = (r + 1) & (N - 1);
        } else {
            let start = (r + N - decode_position(&mut bits) - 1) & (N - 1);
            let len = c - 255 + THRESHOLD;
            for k in 0..len {
                if out.len() == size {
                    break;
                }
                let b = window[(start + k) & (N - 1)];
                out.push(b);
                window[r] = b;
                r = (r + 1) & (N - 1);
            }
        }
    }
    Ok(out)
}

fn decode_position(bits: &mut BitReader<'_>) -> usize {
    let mut i = bits.byte() as usize;
    let (upper, len) = D_TABLE[i];
    for _ in 0..len - 2 {
        i = (i << 1) | bits.bit() as usize;
    }
    (upper as usize) << 6 | (i & 0x3F)
}

/// Compress `data` into a complete name blob, size header included
///
/// Greedy longest-match search over the whole window; small inputs only.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut bits = BitWriter::default();
    let mut tree = AdaptiveHuffman::new();
    let mut window = [b' '; N];
    let mut r = N - F;
    let mut pos = 0;

    while pos < data.len() {
        let max_len = F.min(data.len() - pos);
        let (mut best_len, mut best_dist) = (0, 0);
        if max_len > THRESHOLD {
            for dist in 1..=N - F {
                let start = (r + N - dist) & (N - 1);
                let limit = max_len.min(dist);
                let len = (0..limit)
                    .take_while(|&k| window[(start + k) & (N - 1)] == data[pos + k])
                    .count();
                if len > best_len {
                    best_len = len;
                    best_dist = dist;
                    if len == max_len {
                        break;
                    }
                }
            }
        }

        let taken = if best_len > THRESHOLD {
            tree.encode_char(255 - THRESHOLD + best_len, &mut bits);
            encode_position(best_dist - 1, &mut bits);
            best_len
        } else {
            tree.encode_char(data[pos] as usize, &mut bits);
            1
        };
        for &b in &data[pos..pos + taken] {
            window[r] = b;
            r = (r + 1) & (N - 1);
        }
        pos += taken;
    }

    frame_blob(data.len(), &bits.finish())
}

fn encode_position(position: usize, bits: &mut BitWriter) {
    let upper = position >> 6;
    bits.put(P_LEN[upper] as usize, (P_CODE[upper] as u16) << 8);
    bits.put(6, ((position & 0x3F) as u16) << 10);
}

/// Adaptive Huffman tree over literals and match lengths
///
/// Leaves live at `T..T + N_CHAR` in `prnt`; `son` holds either a child
/// pair index or a leaf index offset by `T`.
struct AdaptiveHuffman {
    freq: [u32; T + 1],
    prnt: [usize; T + N_CHAR],
    son: [usize; T],
}

impl AdaptiveHuffman {
    fn new() -> Self {
        let mut tree = Self {
            freq: [0; T + 1],
            prnt: [0; T + N_CHAR],
            son: [0; T],
        };
        for i in 0..N_CHAR {
            tree.freq[i] = 1;
            tree.son[i] = i + T;
            tree.prnt[i + T] = i;
        }
        let mut i = 0;
        for j in N_CHAR..=R {
            tree.freq[j] = tree.freq[i] + tree.freq[i + 1];
            tree.son[j] = i;
            tree.prnt[i] = j;
            tree.prnt[i + 1] = j;
            i += 2;
        }
        // sentinel
        tree.freq[T] = 0xFFFF;
        tree.prnt[R] = 0;
        tree
    }

    /// Halve all frequencies and rebuild the tree
    fn reconstruct(&mut self) {
        let mut j = 0;
        for i in 0..T {
            if self.son[i] >= T {
                self.freq[j] = (self.freq[i] + 1) / 2;
                self.son[j] = self.son[i];
                j += 1;
            }
        }

        let mut i = 0;
        for j in N_CHAR..T {
            let f = self.freq[i] + self.freq[i + 1];
            self.freq[j] = f;
            let mut k = j - 1;
            while f < self.freq[k] {
                k -= 1;
            }
            k += 1;
            self.freq.copy_within(k..j, k + 1);
            self.freq[k] = f;
            self.son.copy_within(k..j, k + 1);
            self.son[k] = i;
            i += 2;
        }

        for i in 0..T {
            let k = self.son[i];
            self.prnt[k] = i;
            if k < T {
                self.prnt[k + 1] = i;
            }
        }
    }

    fn update(&mut self, c: usize) {
        if self.freq[R] == MAX_FREQ {
            self.reconstruct();
        }

        let mut c = self.prnt[c + T];
        loop {
            self.freq[c] += 1;
            let k = self.freq[c];

            // keep frequencies ordered by swapping with the last smaller node
            let mut l = c + 1;
            if k > self.freq[l] {
                while k > self.freq[l + 1] {
                    l += 1;
                }
                self.freq[c] = self.freq[l];
                self.freq[l] = k;

                let i = self.son[c];
                self.prnt[i] = l;
                if i < T {
                    self.prnt[i + 1] = l;
                }

                let j = self.son[l];
                self.son[l] = i;
                self.prnt[j] = c;
                if j < T {
                    self.prnt[j + 1] = c;
                }
                self.son[c] = j;

                c = l;
            }

            c = self.prnt[c];
            if c == 0 {
                break;
            }
        }
    }

    fn decode_char(&mut self, bits: &mut BitReader<'_>) -> usize {
        let mut c = self.son[R];
        while c < T {
            c = self.son[c + bits.bit() as usize];
        }
        let c = c - T;
        self.update(c);
        c
    }

    fn encode_char(&mut self, c: usize, bits: &mut BitWriter) {
        let mut code: u32 = 0;
        let mut len = 0;
        let mut k = self.prnt[c + T];
        loop {
            code >>= 1;
            if k & 1 != 0 {
                code |= 0x8000_0000;
            }
            len += 1;
            k = self.prnt[k];
            if k == R {
                break;
            }
        }
        bits.put_long(len, code);
        self.update(c);
    }
}

/// MSB-first bit reader; reads past the end yield zero bits
struct BitReader<'a> {
    input: &'a [u8],
    pos: usize,
    buf: u32,
    len: u32,
}

impl<'a> BitReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            buf: 0,
            len: 0,
        }
    }

    /// True once every input bit has been consumed
    fn exhausted(&self) -> bool {
        self.pos >= self.input.len() && self.len == 0
    }

    fn fill(&mut self) {
        while self.len <= 24 {
            let b = self.input.get(self.pos).copied();
            if b.is_none() && self.pos >= self.input.len() + 4 {
                // enough zero padding for any code
                break;
            }
            self.pos += 1;
            self.buf |= (b.unwrap_or(0) as u32) << (24 - self.len);
            self.len += 8;
        }
    }

    fn bit(&mut self) -> u8 {
        self.fill();
        let bit = (self.buf >> 31) as u8;
        self.buf <<= 1;
        self.len = self.len.saturating_sub(1);
        bit
    }

    fn byte(&mut self) -> u8 {
        self.fill();
        let byte = (self.buf >> 24) as u8;
        self.buf <<= 8;
        self.len = self.len.saturating_sub(8);
        byte
    }
}

#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    buf: u32,
    len: u32,
}

impl BitWriter {
    /// Append the top `len` bits of a left-aligned 16-bit code
    fn put(&mut self, len: usize, code: u16) {
        self.put_long(len, (code as u32) << 16);
    }

    /// Append the top `len` bits of a left-aligned 32-bit code
    fn put_long(&mut self, len: usize, code: u32) {
        for i in 0..len {
            let bit = (code >> (31 - i)) & 1;
            self.buf = (self.buf << 1) | bit;
            self.len += 1;
            if self.len == 8 {
                self.out.push(self.buf as u8);
                self.buf = 0;
                self.len = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.len > 0 {
            self.out.push((self.buf << (8 - self.len)) as u8);
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(data: &[u8]) -> Vec<u8> {
        let blob = compress(data);
        let size = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
        assert_eq!(size, data.len());
        decode(&blob[4..], size).unwrap()
    }

    #[test]
    fn decode_tables_cover_every_byte() {
        assert_eq!(D_TABLE[0x00], (0, 3));
        assert_eq!(D_TABLE[0x1F], (0, 3));
        assert_eq!(D_TABLE[0x20], (1, 4));
        assert_eq!(D_TABLE[0x57], (4, 5));
        assert_eq!(D_TABLE[0xC1], (24, 7));
        assert_eq!(D_TABLE[0xFF], (63, 8));
    }

    #[test]
    fn literals_only() {
        let data = b"In.v_Vehicle";
        assert_eq!(round_trip(data), data.to_vec());
    }

    #[test]
    fn repeated_text_uses_matches() {
        let data: Vec<u8> = b"ActualIn.n_Engine\r\n".repeat(40);
        let blob = compress(&data);
        assert!(blob.len() < data.len() / 4);
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn leading_spaces_match_the_initial_window() {
        let data = b"          padded";
        assert_eq!(round_trip(data), data.to_vec());
    }

    #[test]
    fn huffman_survives_reconstruction() {
        // enough symbols to push the root frequency past MAX_FREQ
        let symbols: Vec<usize> = (0..40_000).map(|i| (i * 13 + i / 7) % N_CHAR).collect();

        let mut encoder = AdaptiveHuffman::new();
        let mut writer = BitWriter::default();
        for &c in &symbols {
            encoder.encode_char(c, &mut writer);
        }
        let stream = writer.finish();

        let mut decoder = AdaptiveHuffman::new();
        let mut reader = BitReader::new(&stream);
        let decoded: Vec<usize> = (0..symbols.len())
            .map(|_| decoder.decode_char(&mut reader))
            .collect();
        assert_eq!(decoded, symbols);
    }

    #[test]
    fn truncated_stream_fails() {
        let blob = compress(b"ActualIn.n_Engine\r\nActualIn.T_Engine\r\n");
        // four bytes cannot carry this much output, even as matches
        let err = decode(&blob[4..8], 10_000).unwrap_err();
        assert!(matches!(err, SymbolError::Decompress(_)));
    }

    #[test]
    fn empty() {
        assert!(decode(&[], 0).unwrap().is_empty());
        assert_eq!(compress(&[]), vec![0, 0, 0, 0]);
    }
}
