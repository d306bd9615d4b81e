//! Shared transposition table.
//!
//! Buckets of three packed 10-byte entries plus two bytes of padding, so a
//! bucket is exactly 32 bytes. Every field is its own relaxed atomic: reads
//! torn across fields are possible and accepted. A corrupt hit behaves
//! like a heuristic that may lie, never like corrupted position state; the
//! key16 match is the only integrity check.

use std::sync::atomic::{AtomicI16, AtomicU16, AtomicU8, Ordering};

use crate::board::types::{
    Move, Score, SCORE_NONE, SCORE_TB_LOSS_IN_MAX_PLY, SCORE_TB_WIN_IN_MAX_PLY,
};

pub type Flag = u8;

pub const NO_FLAG: Flag = 0;
pub const FLAG_LOWER: Flag = 1;
pub const FLAG_UPPER: Flag = 2;
pub const FLAG_EXACT: Flag = FLAG_LOWER | FLAG_UPPER;
const FLAG_PV: Flag = 4;

pub const ENTRIES_PER_BUCKET: usize = 3;
const MAX_AGE: u8 = 32;

const MEGA: usize = 1024 * 1024;

/// Can a score with this bound stand in for the real score when compared
/// against `operand`?
#[inline]
#[must_use]
pub fn can_use_score(bound: Flag, score: Score, operand: Score) -> bool {
    bound & if score >= operand { FLAG_LOWER } else { FLAG_UPPER } != 0
}

#[repr(C)]
pub struct Entry {
    key16: AtomicU16,
    static_eval: AtomicI16,
    age_pv_bound: AtomicU8,
    depth: AtomicU8,
    mv: AtomicU16,
    score: AtomicI16,
}

impl Entry {
    fn empty() -> Entry {
        Entry {
            key16: AtomicU16::new(0),
            static_eval: AtomicI16::new(0),
            age_pv_bound: AtomicU8::new(0),
            depth: AtomicU8::new(0),
            mv: AtomicU16::new(0),
            score: AtomicI16::new(0),
        }
    }

    fn zero(&self) {
        self.key16.store(0, Ordering::Relaxed);
        self.static_eval.store(0, Ordering::Relaxed);
        self.age_pv_bound.store(0, Ordering::Relaxed);
        self.depth.store(0, Ordering::Relaxed);
        self.mv.store(0, Ordering::Relaxed);
        self.score.store(0, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn matches(&self, key: u64) -> bool {
        self.key16.load(Ordering::Relaxed) == key as u16
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.score.load(Ordering::Relaxed) == 0 && self.age_pv_bound.load(Ordering::Relaxed) == 0
    }

    #[inline]
    #[must_use]
    pub fn bound(&self) -> Flag {
        self.age_pv_bound.load(Ordering::Relaxed) & FLAG_EXACT
    }

    #[inline]
    #[must_use]
    pub fn was_pv(&self) -> bool {
        self.age_pv_bound.load(Ordering::Relaxed) & FLAG_PV != 0
    }

    #[inline]
    fn age(&self) -> u8 {
        self.age_pv_bound.load(Ordering::Relaxed) >> 3
    }

    #[inline]
    fn age_distance(&self, table_age: u8) -> i32 {
        i32::from((MAX_AGE + table_age - self.age()) % MAX_AGE)
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> i32 {
        i32::from(self.depth.load(Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn mv(&self) -> Move {
        Move::from_raw(self.mv.load(Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn static_eval(&self) -> Score {
        Score::from(self.static_eval.load(Ordering::Relaxed))
    }

    /// Stored score re-adjusted to the probing node's ply. Mate and
    /// tablebase scores live in the table relative to the node that stored
    /// them.
    #[inline]
    #[must_use]
    pub fn score(&self, ply: i32) -> Score {
        let score = Score::from(self.score.load(Ordering::Relaxed));
        if score == SCORE_NONE {
            return SCORE_NONE;
        }
        if score >= SCORE_TB_WIN_IN_MAX_PLY {
            score - ply
        } else if score <= SCORE_TB_LOSS_IN_MAX_PLY {
            score + ply
        } else {
            score
        }
    }

    fn quality(&self, table_age: u8) -> i32 {
        self.depth() - 8 * self.age_distance(table_age)
    }

    /// Replace-policy write. The stored move is always refreshed when a
    /// real move is provided; the rest of the entry is overwritten for
    /// exact bounds, key changes, stale ages, or sufficiently deep data.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        key: u64,
        bound: Flag,
        depth: i32,
        mv: Move,
        score: Score,
        static_eval: Score,
        is_pv: bool,
        ply: i32,
        table_age: u8,
    ) {
        if !self.matches(key) || mv.is_some() {
            self.mv.store(mv.raw(), Ordering::Relaxed);
        }

        let mut score = score;
        if score != SCORE_NONE {
            if score >= SCORE_TB_WIN_IN_MAX_PLY {
                score += ply;
            } else if score <= SCORE_TB_LOSS_IN_MAX_PLY {
                score -= ply;
            }
        }

        if bound == FLAG_EXACT
            || !self.matches(key)
            || self.age_distance(table_age) > 0
            || depth + 4 + 2 * i32::from(is_pv) > self.depth()
        {
            self.key16.store(key as u16, Ordering::Relaxed);
            self.depth.store(depth.clamp(0, 255) as u8, Ordering::Relaxed);
            self.score.store(score as i16, Ordering::Relaxed);
            self.static_eval.store(static_eval as i16, Ordering::Relaxed);
            self.age_pv_bound.store(
                bound | (u8::from(is_pv) << 2) | (table_age << 3),
                Ordering::Relaxed,
            );
        }
    }
}

#[repr(C)]
struct Bucket {
    entries: [Entry; ENTRIES_PER_BUCKET],
    _padding: u16,
}

impl Bucket {
    fn empty() -> Bucket {
        Bucket {
            entries: [Entry::empty(), Entry::empty(), Entry::empty()],
            _padding: 0,
        }
    }
}

pub struct TranspositionTable {
    buckets: Vec<Bucket>,
    age: AtomicU8,
}

impl TranspositionTable {
    /// Allocate a table of roughly `mega_bytes` MB, zeroed.
    #[must_use]
    pub fn new(mega_bytes: usize) -> TranspositionTable {
        let bucket_count = (mega_bytes * MEGA / std::mem::size_of::<Bucket>()).max(1);
        let mut buckets = Vec::with_capacity(bucket_count);
        buckets.resize_with(bucket_count, Bucket::empty);
        TranspositionTable {
            buckets,
            age: AtomicU8::new(0),
        }
    }

    #[inline]
    fn bucket(&self, key: u64) -> &Bucket {
        let index = ((u128::from(key) * self.buckets.len() as u128) >> 64) as usize;
        &self.buckets[index]
    }

    /// Zero every bucket, splitting the work over `thread_count` threads.
    pub fn clear(&self, thread_count: usize) {
        self.age.store(0, Ordering::Relaxed);

        let thread_count = thread_count.max(1);
        let chunk = (self.buckets.len() + thread_count - 1) / thread_count;
        std::thread::scope(|scope| {
            for slice in self.buckets.chunks(chunk) {
                scope.spawn(move || {
                    for bucket in slice {
                        for entry in &bucket.entries {
                            entry.zero();
                        }
                    }
                });
            }
        });
    }

    /// Advance the age counter; called once per `go`.
    pub fn next_search(&self) {
        let age = self.age.load(Ordering::Relaxed);
        self.age.store((age + 1) % MAX_AGE, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn age(&self) -> u8 {
        self.age.load(Ordering::Relaxed)
    }

    /// Find the entry for `key`: the matching entry if present (hit when it
    /// is non-empty), otherwise the lowest-quality entry in the bucket as a
    /// store target.
    #[must_use]
    pub fn probe(&self, key: u64) -> (&Entry, bool) {
        let bucket = self.bucket(key);

        for entry in &bucket.entries {
            if entry.matches(key) {
                return (entry, !entry.is_empty());
            }
        }

        let age = self.age();
        let mut worst = &bucket.entries[0];
        for entry in &bucket.entries[1..] {
            if entry.quality(age) < worst.quality(age) {
                worst = entry;
            }
        }
        (worst, false)
    }

    /// Pull the bucket for `key` towards the cache.
    #[inline]
    pub fn prefetch(&self, key: u64) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            _mm_prefetch(
                (self.bucket(key) as *const Bucket).cast::<i8>(),
                _MM_HINT_T0,
            );
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = key;
        }
    }

    /// Per-mille occupancy of the current age, sampled from the first
    /// thousand buckets.
    #[must_use]
    pub fn hashfull(&self) -> u32 {
        let age = self.age();
        let mut count = 0;
        for bucket in self.buckets.iter().take(1000) {
            for entry in &bucket.entries {
                if entry.age() == age && !entry.is_empty() {
                    count += 1;
                }
            }
        }
        count / ENTRIES_PER_BUCKET as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::{Square, SCORE_MATE};

    #[test]
    fn entry_layout_is_packed() {
        assert_eq!(std::mem::size_of::<Entry>(), 10);
        assert_eq!(std::mem::size_of::<Bucket>(), 32);
    }

    #[test]
    fn store_probe_round_trip() {
        let tt = TranspositionTable::new(1);
        let key = 0xdead_beef_cafe_f00d;
        let mv = Move::new(Square::E1, Square::parse("e4").unwrap());

        let (entry, hit) = tt.probe(key);
        assert!(!hit);
        entry.store(key, FLAG_EXACT, 9, mv, 123, 77, true, 0, tt.age());

        let (entry, hit) = tt.probe(key);
        assert!(hit);
        assert_eq!(entry.bound(), FLAG_EXACT);
        assert_eq!(entry.depth(), 9);
        assert_eq!(entry.mv(), mv);
        assert_eq!(entry.score(0), 123);
        assert_eq!(entry.static_eval(), 77);
        assert!(entry.was_pv());
    }

    #[test]
    fn mate_scores_adjust_by_ply() {
        let tt = TranspositionTable::new(1);
        let key = 42;
        let mate_in_3 = SCORE_MATE - 3;

        let (entry, _) = tt.probe(key);
        entry.store(key, FLAG_LOWER, 5, Move::NONE, mate_in_3, SCORE_NONE, false, 2, tt.age());

        // From a node two plies shallower, the mate is two plies closer
        let (entry, hit) = tt.probe(key);
        assert!(hit);
        assert_eq!(entry.score(0), mate_in_3 + 2);
        assert_eq!(entry.score(2), mate_in_3);
    }

    #[test]
    fn age_counter_wraps() {
        let tt = TranspositionTable::new(1);
        for _ in 0..32 {
            tt.next_search();
        }
        assert_eq!(tt.age(), 0);
        tt.next_search();
        assert_eq!(tt.age(), 1);
    }

    #[test]
    fn deeper_entries_resist_shallow_overwrites() {
        let tt = TranspositionTable::new(1);
        let key = 0x1234_5678_9abc_def0;

        let (entry, _) = tt.probe(key);
        entry.store(key, FLAG_LOWER, 20, Move::NONE, 300, 50, false, 0, tt.age());

        // A much shallower non-exact store of the same key must not clobber
        // the deep data
        let (entry, hit) = tt.probe(key);
        assert!(hit);
        entry.store(key, FLAG_UPPER, 2, Move::NONE, -100, 10, false, 0, tt.age());

        let (entry, hit) = tt.probe(key);
        assert!(hit);
        assert_eq!(entry.depth(), 20);
        assert_eq!(entry.score(0), 300);

        // An exact bound always replaces
        entry.store(key, FLAG_EXACT, 2, Move::NONE, -100, 10, false, 0, tt.age());
        let (entry, _) = tt.probe(key);
        assert_eq!(entry.depth(), 2);
        assert_eq!(entry.score(0), -100);
    }

    #[test]
    fn clear_wipes_entries() {
        let tt = TranspositionTable::new(1);
        let (entry, _) = tt.probe(7);
        entry.store(7, FLAG_UPPER, 3, Move::NONE, 50, 10, false, 0, tt.age());
        tt.clear(4);
        let (_, hit) = tt.probe(7);
        assert!(!hit);
    }
}
