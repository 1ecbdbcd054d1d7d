//! A learned secondary index: a read-only index that accelerates equality
//! and lower-bound lookups over an unsorted base relation without physically
//! reordering it.
//!
//! An [`Lsi`] combines a trained [`Model`] (from the `lsi-model` crate, or
//! any other implementation of that contract) over the sorted key multiset,
//! a compact [`PermVector`] mapping sorted rank to original relation
//! position, and optional per-rank fingerprint bits that let equality
//! lookups short-circuit on mismatches without touching the base relation.
//!
//! The index owns none of the base relation: callers pass the same key
//! range to [`Lsi::fit`] and to every subsequent [`Lsi::lookup`], and must
//! keep it alive, unmodified, and in the same order in between.

mod conf;
mod fingerprint;
mod perm_vector;

pub use conf::LsiConf;
pub use fingerprint::Fingerprinter;
pub use perm_vector::{PermVector, PermVectorIter};

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use dyn_size_of::GetSize;
use lsi_model::Model;

/// A key the index can be built over: copyable, totally ordered, and
/// losslessly representable as a `u64` for fingerprint hashing. Implemented
/// for all unsigned integer types up to 64 bits.
pub trait IndexKey: Copy + Ord + Into<u64> {}
impl<T: Copy + Ord + Into<u64>> IndexKey for T {}

/// The learned secondary index core.
///
/// Lifecycle: construct with [`Lsi::new`] (empty, no allocation), populate
/// with exactly one call to [`Lsi::fit`], then query read-only with
/// [`Lsi::lookup`]. Calling `fit` again discards the previous index and
/// invalidates any iterators derived from it. After `fit`, the only mutable
/// state is the two debug counters ([`Lsi::base_data_accesses`],
/// [`Lsi::false_positive_accesses`]), which are racy by design: the index is
/// logically immutable and safe for many concurrent readers once built, and
/// these counters are debug telemetry only, not part of that contract.
pub struct Lsi<K, M> {
    perm: Option<PermVector>,
    model: Option<M>,
    max_error: u64,
    fingerprinter: Fingerprinter,
    force_linear: bool,
    base_data_accesses: AtomicU64,
    false_positive_accesses: AtomicU64,
    _key: PhantomData<fn(K)>,
}

impl<K, M> Lsi<K, M>
where
    K: IndexKey,
    M: Model<K>,
{
    /// Constructs an empty index. No allocation happens until [`Self::fit`]
    /// is called.
    pub fn new(conf: LsiConf) -> Self {
        Self {
            perm: None,
            model: None,
            max_error: 0,
            fingerprinter: Fingerprinter::new(conf.fingerprint_bits()),
            force_linear: conf.force_linear(),
            base_data_accesses: AtomicU64::new(0),
            false_positive_accesses: AtomicU64::new(0),
            _key: PhantomData,
        }
    }

    /// Builds the index over `keys`, a forward-iterable range of length `N`
    /// matching the base relation in order and content.
    ///
    /// Steps: materialize `(key, original_position)` pairs, stable-sort by
    /// key, build the permutation vector, train the model on the sorted key
    /// sequence, and measure `max_error` against the first rank of each key
    /// (the lower-bound rank) so the lookup interval always contains the
    /// first occurrence of any key.
    ///
    /// Calling `fit` again replaces the index in place (idempotent-replace)
    /// and invalidates any iterators obtained from the previous build.
    pub fn fit<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
    {
        let mut buf: Vec<(K, u64)> =
            keys.into_iter().enumerate().map(|(i, k)| (k, i as u64)).collect();
        // Vec::sort_by is stable, preserving ascending original_position
        // order among equal keys as required for the tie-break invariant.
        buf.sort_by(|a, b| a.0.cmp(&b.0));

        let n = buf.len();
        let sorted_keys: Vec<K> = buf.iter().map(|(k, _)| *k).collect();
        let positions: Vec<u64> = buf.iter().map(|(_, p)| *p).collect();

        let fingerprints: Option<Vec<u64>> = if self.fingerprinter.is_enabled() {
            Some(sorted_keys.iter().map(|&k| self.fingerprinter.fingerprint(k.into())).collect())
        } else {
            None
        };

        let perm = PermVector::build(&positions, fingerprints.as_deref());
        let model = M::train(&sorted_keys);

        let mut max_error: u64 = 0;
        let mut current_lb: usize = 0;
        for (j, key) in sorted_keys.iter().enumerate() {
            if j == 0 || sorted_keys[j] != sorted_keys[j - 1] {
                current_lb = j;
            }
            let pred = model.predict(key);
            let err = pred.abs_diff(current_lb as u64);
            if err > max_error {
                max_error = err;
            }
        }

        let span = tracing::debug_span!(
            "lsi_fit",
            n,
            max_error,
            search_mode = self.search_mode_name(),
        );
        let _enter = span.enter();
        tracing::debug!("fit complete");

        self.perm = Some(perm);
        self.model = Some(model);
        self.max_error = max_error;
        self.base_data_accesses.store(0, Ordering::Relaxed);
        self.false_positive_accesses.store(0, Ordering::Relaxed);
    }

    /// Number of ranks in the built index.
    ///
    /// # Panics
    /// Panics if called before [`Self::fit`] (a contract violation: the
    /// index is used before it exists).
    pub fn len(&self) -> usize {
        self.perm().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The trained max prediction error, measured at build time against the
    /// first (lower-bound) rank of each key. Defines the half-width of the
    /// lookup search interval.
    pub fn max_error(&self) -> u64 {
        self.max_error
    }

    fn perm(&self) -> &PermVector {
        self.perm.as_ref().expect("Lsi used before fit() was called")
    }

    fn model(&self) -> &M {
        self.model.as_ref().expect("Lsi used before fit() was called")
    }

    fn linear_mode(&self) -> bool {
        self.fingerprinter.is_enabled() || self.force_linear
    }

    fn search_mode_name(&self) -> &'static str {
        if self.linear_mode() { "linear" } else { "binary" }
    }

    /// Looks up `key` against `base`, the same key range passed to
    /// [`Self::fit`] (unmodified, same order, same length).
    ///
    /// `LOWER_BOUND` selects the query mode at compile time: `false` for
    /// equality (returns [`Lsi::end`]-equivalent when `key` is absent),
    /// `true` for lower-bound (returns the first rank whose key is `>=
    /// key`, or the end iterator if none exists).
    ///
    /// Dereferencing (via [`Iterator::next`]) the returned iterator yields
    /// original relation positions; incrementing it walks forward through
    /// duplicate occurrences of `key` in original-insertion order, then into
    /// keys greater than `key`.
    pub fn lookup<const LOWER_BOUND: bool>(&self, base: &[K], key: K) -> LsiLookupIter<'_> {
        let perm = self.perm();
        let n = perm.len();
        if n == 0 {
            return LsiLookupIter::end(perm);
        }

        let pred = self.model().predict(&key);
        let lo = pred.saturating_sub(self.max_error);
        let hi = pred.saturating_add(self.max_error).saturating_add(1).min(n as u64);
        let lo = lo.min(hi);

        let key_fp = if self.fingerprinter.is_enabled() { self.fingerprinter.fingerprint(key.into()) } else { 0 };

        let i = if self.linear_mode() {
            self.linear_scan::<LOWER_BOUND>(base, perm, key, key_fp, lo as usize, hi as usize, n)
        } else {
            self.binary_scan(base, perm, key, lo as usize, hi as usize, n)
        };

        if LOWER_BOUND {
            LsiLookupIter::at(perm, i)
        } else if i < n && base[perm.position(i) as usize] == key {
            LsiLookupIter::at(perm, i)
        } else {
            if i >= hi {
                tracing::trace!(i, hi, n, "lookup interval excluded the answer, extended past hi");
            }
            LsiLookupIter::end(perm)
        }
    }

    /// Linear-with-fingerprints scan: within `[lo, hi)`, skip ranks whose
    /// fingerprint doesn't match `key` (equality mode only — the
    /// fingerprint filter never applies to lower-bound mode, since a
    /// differently-keyed rank still matters for ordering). Stops early when
    /// a candidate `>= key` is found; otherwise falls through to a
    /// completion walk extending past `hi` up to `n`, which handles the rare
    /// case where the model-error interval barely misses the true answer.
    #[allow(clippy::too_many_arguments)]
    fn linear_scan<const LOWER_BOUND: bool>(
        &self,
        base: &[K],
        perm: &PermVector,
        key: K,
        key_fp: u64,
        lo: usize,
        hi: usize,
        n: usize,
    ) -> usize {
        let mut i = lo;
        while i < hi {
            let (position, fingerprint_bits) = perm.get(i);
            if !LOWER_BOUND && self.fingerprinter.is_enabled() && fingerprint_bits != key_fp {
                i += 1;
                continue;
            }
            let base_val = base[position as usize];
            self.base_data_accesses.fetch_add(1, Ordering::Relaxed);
            if base_val >= key {
                return i;
            }
            self.false_positive_accesses.fetch_add(1, Ordering::Relaxed);
            i += 1;
        }
        while i < n {
            let position = perm.position(i);
            let base_val = base[position as usize];
            if base_val < key {
                self.base_data_accesses.fetch_add(1, Ordering::Relaxed);
                self.false_positive_accesses.fetch_add(1, Ordering::Relaxed);
                i += 1;
            } else {
                break;
            }
        }
        i
    }

    /// Standard lower-bound binary search on `[lo, hi)` keyed by
    /// `base[pv[mid].position]`, followed by the same completion walk as
    /// the linear path. `false_positive_accesses` is deliberately never
    /// incremented here — the counter's meaning is mode-dependent and the
    /// binary path has no notion of a "false positive candidate".
    fn binary_scan(&self, base: &[K], perm: &PermVector, key: K, lo: usize, hi: usize, n: usize) -> usize {
        let mut i = lo;
        let mut j = hi;
        while i < j {
            let mid = i + (j - i) / 2;
            let position = perm.position(mid);
            self.base_data_accesses.fetch_add(1, Ordering::Relaxed);
            if base[position as usize] < key {
                i = mid + 1;
            } else {
                j = mid;
            }
        }
        while i < n {
            let position = perm.position(i);
            self.base_data_accesses.fetch_add(1, Ordering::Relaxed);
            if base[position as usize] < key {
                i += 1;
            } else {
                break;
            }
        }
        i
    }

    /// An iterator positioned at rank `0`.
    pub fn begin(&self) -> LsiLookupIter<'_> {
        LsiLookupIter::at(self.perm(), 0)
    }

    /// The end iterator (rank `N`), signalling "not found" for equality
    /// lookups and "no key is `>=` the query" for lower-bound lookups.
    pub fn end(&self) -> LsiLookupIter<'_> {
        LsiLookupIter::end(self.perm())
    }

    /// Total self-reported memory footprint: permutation vector plus model,
    /// excluding `self`'s own stack size.
    pub fn byte_size(&self) -> usize {
        self.perm_vector_byte_size() + self.model_byte_size()
    }

    /// Self-reported memory footprint of the trained model.
    pub fn model_byte_size(&self) -> usize {
        self.model().byte_size()
    }

    /// Self-reported memory footprint of the permutation vector (offsets
    /// lane, fingerprint lane, and shared word buffer).
    pub fn perm_vector_byte_size(&self) -> usize {
        self.perm().size_bytes_dyn()
    }

    /// Number of base-relation reads performed by lookups since the last
    /// [`Self::fit`]. Racy: intended as debug-only telemetry, not an exact
    /// count under concurrent lookups.
    pub fn base_data_accesses(&self) -> u64 {
        self.base_data_accesses.load(Ordering::Relaxed)
    }

    /// Number of base-relation reads that turned out to be below the query
    /// key (wasted candidates), since the last [`Self::fit`]. Never
    /// incremented by the binary-search path. Racy, same caveat as
    /// [`Self::base_data_accesses`].
    pub fn false_positive_accesses(&self) -> u64 {
        self.false_positive_accesses.load(Ordering::Relaxed)
    }

    /// A human-readable name encoding the model name, fingerprint width, and
    /// forced-linear flag, e.g. `"lsi[linear](model=linear,f=8)"`.
    pub fn name(&self) -> String {
        format!(
            "lsi[{}](model={},f={}{})",
            self.search_mode_name(),
            self.model().name(),
            self.fingerprinter.width(),
            if self.force_linear { ",forced_linear" } else { "" },
        )
    }
}

/// A random-access iterator over ranks `[0, N]`, where `N` is the end rank.
/// Dereferencing (via [`Iterator::next`]) yields the original relation
/// position at the current rank. Two iterators compare equal when they
/// point at the same rank of the same permutation vector (identity of the
/// underlying vector, not just equal contents).
#[derive(Clone, Copy)]
pub struct LsiLookupIter<'a> {
    perm: &'a PermVector,
    rank: usize,
}

impl<'a> LsiLookupIter<'a> {
    fn at(perm: &'a PermVector, rank: usize) -> Self {
        Self { perm, rank }
    }

    fn end(perm: &'a PermVector) -> Self {
        Self { perm, rank: perm.len() }
    }

    /// The rank this iterator currently points at. Equal to the indexed
    /// length at the end position.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Whether this iterator is the end iterator (rank `== N`).
    pub fn is_end(&self) -> bool {
        self.rank >= self.perm.len()
    }

    /// The original relation position at the current rank, or `None` at the
    /// end iterator. Does not advance the iterator (see [`Iterator::next`]
    /// for the advancing form).
    pub fn position(&self) -> Option<usize> {
        if self.is_end() {
            None
        } else {
            Some(self.perm.position(self.rank) as usize)
        }
    }
}

impl<'a> Iterator for LsiLookupIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.position()?;
        self.rank += 1;
        Some(position)
    }
}

impl<'a> PartialEq for LsiLookupIter<'a> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.perm, other.perm) && self.rank == other.rank
    }
}
impl<'a> Eq for LsiLookupIter<'a> {}
