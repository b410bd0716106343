//! Probabilistic liveness set for the mark phase.
//!
//! A bloom filter over object ids, backed by a temporary file in the
//! store's pack directory. `add` is unconditional; `contains` may report
//! true for an id never added (false positive) but never false for an
//! added id. False positives only *retain* extra objects - they can never
//! cause a live object to be deleted, which is the property sweep relies
//! on.
//!
//! # Probe derivation
//! Ids are already cryptographic hashes, so probe words are sliced
//! directly out of the id bytes: five 64-bit windows spread evenly across
//! the id. Each window is salted with its probe number, finalized with a
//! 64-bit mix, and reduced into the bit array with a multiply-high range
//! reduction (no division). The mix keeps probes independent even for
//! windows that overlap on short ids.
//!
//! # Backing storage
//! The bit array lives in a `tmp-gc-*.bloom` file created in the pack
//! directory and memory-mapped for the run. The file is unlinked when the
//! set drops, on every exit path - success, error return, or panic
//! unwind. Pack discovery never sees it (no `.idx` extension).
//!
//! # Invariants
//! - No false negatives, for any interleaving of `add` and `contains`.
//! - Sizing is fixed at creation; `add` never grows the array.

use std::io;
use std::path::Path;

use memmap2::MmapMut;
use tempfile::NamedTempFile;

use crate::store::ObjectId;

/// Probes per id.
const PROBES: usize = 5;
/// Bits budgeted per expected entry; ~16 gives a sub-percent false
/// positive rate at full expected load with five probes.
const BITS_PER_ENTRY: u64 = 16;

/// File-backed bloom filter of object ids.
#[derive(Debug)]
pub struct LiveSet {
    backing: NamedTempFile,
    mmap: MmapMut,
    bits: u64,
    entries: u64,
}

impl LiveSet {
    /// Creates a set sized for `expected` ids, backed by a fresh
    /// `tmp-gc-*.bloom` file under `dir`.
    ///
    /// Drop removes the file on every exit path short of a hard kill;
    /// an orphan left by one is inert scratch that pack discovery never
    /// sees.
    ///
    /// # Errors
    /// File creation, sizing, or mapping failures.
    pub fn create(dir: &Path, expected: u64) -> io::Result<Self> {
        let bits = expected.max(1).saturating_mul(BITS_PER_ENTRY);
        let bytes = bits.div_ceil(8);

        let backing = tempfile::Builder::new()
            .prefix("tmp-gc-")
            .suffix(".bloom")
            .tempfile_in(dir)?;
        backing.as_file().set_len(bytes)?;
        let mmap = unsafe { MmapMut::map_mut(backing.as_file())? };

        Ok(Self {
            backing,
            mmap,
            bits,
            entries: 0,
        })
    }

    /// Path of the backing file; removed when the set drops.
    #[must_use]
    pub fn backing_path(&self) -> &Path {
        self.backing.path()
    }

    /// Inserts `id`.
    ///
    /// Counts toward the load estimate only when at least one bit flips,
    /// so repeated inserts of the same id do not inflate the estimate.
    pub fn add(&mut self, id: &ObjectId) {
        let mut changed = false;
        for probe in 0..PROBES {
            let bit = self.bit_for(id, probe);
            let byte = (bit / 8) as usize;
            let mask = 1u8 << (bit % 8);
            if self.mmap[byte] & mask == 0 {
                self.mmap[byte] |= mask;
                changed = true;
            }
        }
        if changed {
            self.entries += 1;
        }
    }

    /// Tests membership. True may be a false positive; false is definite.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        (0..PROBES).all(|probe| {
            let bit = self.bit_for(id, probe);
            self.mmap[(bit / 8) as usize] & (1u8 << (bit % 8)) != 0
        })
    }

    /// Estimated false-positive rate at the current load.
    ///
    /// `(1 - e^(-k*n/m))^k` with `k` probes, `n` effective inserts, and
    /// `m` bits. A report figure; never used for correctness decisions.
    #[must_use]
    pub fn false_positive_rate(&self) -> f64 {
        let k = PROBES as f64;
        let n = self.entries as f64;
        let m = self.bits as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    /// Bit index for one probe of `id`.
    ///
    /// Probe words are 64-bit windows at offsets spread evenly over the
    /// id, so the full id participates for both 20- and 32-byte formats.
    #[inline]
    fn bit_for(&self, id: &ObjectId, probe: usize) -> u64 {
        let bytes = id.as_slice();
        debug_assert!(bytes.len() >= 8, "id shorter than a probe window");
        let span = bytes.len() - 8;
        let offset = span * probe / (PROBES - 1);
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[offset..offset + 8]);
        let salted = u64::from_be_bytes(word) ^ (probe as u64).wrapping_mul(PROBE_SALT);
        mul_high_range(mix64(salted), self.bits)
    }
}

/// Golden-ratio increment used to salt probe numbers.
const PROBE_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// SplitMix64 finalizer.
#[inline]
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;
    x
}

/// Maps a uniform 64-bit word into `[0, p)` via the high half of the
/// 128-bit product. Not a modulo, but uniform for mixed input.
#[inline]
fn mul_high_range(word: u64, p: u64) -> u64 {
    debug_assert!(p > 0);
    ((u128::from(word) * u128::from(p)) >> 64) as u64
}
