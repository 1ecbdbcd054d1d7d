//! The bit-packed rank-to-position permutation, with an optional parallel
//! fingerprint lane sharing the same backing buffer.

use dyn_size_of::GetSize;
use lsi_bits::{bits_for_max, BitBufBuilder, BitPackedLane};

/// Two parallel [`BitPackedLane`]s over one shared word buffer: an
/// *offsets* lane mapping rank to original relation position, and an
/// optional *fingerprint* lane mapping rank to fingerprint bits. The
/// fingerprint lane is absent (zero width, zero length) when the index was
/// built with fingerprints disabled.
///
/// Buffer layout: `[offsets lane bits][fingerprint lane bits][slop]`, both
/// lanes little-bit-first. Two `PermVector`s are equal exactly when their
/// length and backing buffers are byte-exact equal — the fingerprint lane
/// and offsets lane positions follow deterministically from that, so no
/// separate comparison of the lane descriptors is needed.
#[derive(Debug, Clone)]
pub struct PermVector {
    n: usize,
    words: Box<[u64]>,
    offsets: BitPackedLane,
    fingerprints: Option<BitPackedLane>,
}

impl PermVector {
    /// Builds a permutation vector from `positions` (rank-ordered original
    /// positions) and, when fingerprints are enabled, `fingerprints`
    /// (rank-ordered fingerprint bits, same length as `positions`).
    ///
    /// `positions` must already be in the final rank order (the caller is
    /// expected to have sorted by key beforehand); this only concerns itself
    /// with packing.
    pub fn build(positions: &[u64], fingerprints: Option<&[u64]>) -> Self {
        let n = positions.len();
        if let Some(fps) = fingerprints {
            assert_eq!(fps.len(), n, "fingerprint lane length must match offsets lane length");
        }

        let offsets_width = bits_for_max(positions.iter().copied().max().unwrap_or(0));
        let mut builder = BitBufBuilder::new();
        let offsets_start = builder.bit_len();
        builder.push_all(positions.iter().copied(), offsets_width);
        let offsets = BitPackedLane::new(offsets_start, offsets_width, n);

        let fingerprints_lane = fingerprints.map(|fps| {
            let fp_width = bits_for_max(fps.iter().copied().max().unwrap_or(0));
            let start = builder.bit_len();
            builder.push_all(fps.iter().copied(), fp_width);
            BitPackedLane::new(start, fp_width, n)
        });

        let words = builder.finish();
        Self { n, words, offsets, fingerprints: fingerprints_lane }
    }

    /// Number of ranks stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns `(position, fingerprint_bits)` at rank `r`. `fingerprint_bits`
    /// is `0` when the fingerprint lane is absent.
    ///
    /// # Panics
    /// Panics (via the underlying slice index) if `r >= self.len()`.
    #[inline]
    pub fn get(&self, r: usize) -> (u64, u64) {
        let position = self.offsets.get(&self.words, r);
        let fingerprint_bits = match &self.fingerprints {
            Some(lane) => lane.get(&self.words, r),
            None => 0,
        };
        (position, fingerprint_bits)
    }

    /// Returns just the position at rank `r`, skipping the fingerprint read.
    #[inline]
    pub fn position(&self, r: usize) -> u64 {
        self.offsets.get(&self.words, r)
    }

    /// Bit width of the offsets lane.
    pub fn offsets_width(&self) -> u8 {
        self.offsets.width()
    }

    /// Bit width of the fingerprint lane, or `0` if absent.
    pub fn fingerprint_width(&self) -> u8 {
        self.fingerprints.map_or(0, |l| l.width())
    }

    /// A random-access, double-ended iterator over `(position,
    /// fingerprint_bits)` pairs for ranks `[0, len())`.
    pub fn iter(&self) -> PermVectorIter<'_> {
        PermVectorIter { perm: self, front: 0, back: self.n }
    }
}

impl PartialEq for PermVector {
    fn eq(&self, other: &Self) -> bool {
        self.n == other.n && self.words == other.words
    }
}
impl Eq for PermVector {}

impl GetSize for PermVector {
    fn size_bytes_dyn(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }
    const USES_DYN_MEM: bool = true;
}

/// Iterator over `(position, fingerprint_bits)` pairs, in rank order.
/// Random-access and double-ended: rank arithmetic drives both ends.
#[derive(Clone)]
pub struct PermVectorIter<'a> {
    perm: &'a PermVector,
    front: usize,
    back: usize,
}

impl<'a> Iterator for PermVectorIter<'a> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.perm.get(self.front);
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<'a> DoubleEndedIterator for PermVectorIter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.perm.get(self.back))
    }
}

impl<'a> ExactSizeIterator for PermVectorIter<'a> {}
