//! The search: iterative deepening over a negamax/quiescence pair, with the
//! per-thread state each Lazy-SMP worker owns.

mod alphabeta;
pub mod history;
mod iterative;
pub mod movepick;
pub mod params;
pub mod timeman;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::board::types::{Move, Score, MAX_MOVES, MAX_PLY, SCORE_NONE};
use crate::board::Position;
use crate::nnue::{Accumulator, FinnyEntry, FinnyTable};
use crate::tb::Tablebases;
use crate::threads::WorkerLink;
use crate::tt::TranspositionTable;

use history::HistoryTables;

/// Everything one `go` needs, assembled by the protocol layer.
#[derive(Clone)]
pub struct Settings {
    pub time: [i64; 2],
    pub inc: [i64; 2],
    pub movetime: i64,
    pub movestogo: i32,
    pub depth: i32,
    pub nodes: u64,
    pub start_time: Instant,

    pub position: Position,
    /// Keys of the positions leading here, newest last, for repetition
    /// detection across the root.
    pub prev_positions: Vec<u64>,

    pub multi_pv: usize,
    pub move_overhead: i64,
    pub minimal: bool,
}

impl Settings {
    #[must_use]
    pub fn new(position: Position) -> Settings {
        Settings {
            time: [0; 2],
            inc: [0; 2],
            movetime: 0,
            movestogo: 0,
            depth: MAX_PLY as i32 - 4,
            nodes: 0,
            start_time: Instant::now(),
            position,
            prev_positions: Vec::new(),
            multi_pv: 1,
            move_overhead: 10,
            minimal: false,
        }
    }

    #[must_use]
    pub fn standard_time_limit(&self) -> bool {
        self.time[0] != 0 || self.time[1] != 0
    }
}

/// Handles shared by every worker during one search.
#[derive(Clone)]
pub struct SharedContext {
    pub tt: Arc<TranspositionTable>,
    pub tb: Arc<Tablebases>,
    pub settings: Arc<Settings>,
    pub workers: Arc<Vec<Arc<WorkerLink>>>,
    pub stop: Arc<std::sync::atomic::AtomicBool>,
}

impl SharedContext {
    #[must_use]
    pub fn total_nodes(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| w.nodes.load(Ordering::Relaxed))
            .sum()
    }

    #[must_use]
    pub fn total_tb_hits(&self) -> u64 {
        self.workers
            .iter()
            .map(|w| w.tb_hits.load(Ordering::Relaxed))
            .sum()
    }
}

/// Header plies in front of the stack so `ss[ply - 6]` is always in bounds.
pub const SS_OFFSET: usize = 6;

/// One ply of search bookkeeping.
#[derive(Clone)]
pub struct SearchInfo {
    pub static_eval: Score,
    pub played_move: Move,
    pub played_cap: bool,
    pub killer: Move,
    pub pv: [Move; MAX_PLY],
    pub pv_length: usize,
    /// Continuation-history row of the move played at this ply;
    /// `(false, 0)` is the zero sentinel.
    pub cont_hist: (bool, usize),
}

impl Default for SearchInfo {
    fn default() -> Self {
        SearchInfo {
            static_eval: SCORE_NONE,
            played_move: Move::NONE,
            played_cap: false,
            killer: Move::NONE,
            pv: [Move::NONE; MAX_PLY],
            pv_length: 0,
            cont_hist: (false, 0),
        }
    }
}

/// A root move with its running score and principal variation.
#[derive(Clone)]
pub struct RootMove {
    pub mv: Move,
    pub score: Score,
    pub average_score: Score,
    pub nodes: u64,
    pub pv: Vec<Move>,
}

impl RootMove {
    #[must_use]
    pub fn new(mv: Move) -> RootMove {
        RootMove {
            mv,
            score: SCORE_NONE,
            average_score: SCORE_NONE,
            nodes: 0,
            pv: vec![mv],
        }
    }
}

pub fn stat_bonus(depth: i32) -> i32 {
    (params::STAT_BONUS_LINEAR * depth + params::STAT_BONUS_BIAS).min(params::STAT_BONUS_MAX)
}

pub fn stat_malus(depth: i32) -> i32 {
    (params::STAT_MALUS_LINEAR * depth + params::STAT_MALUS_BIAS).min(params::STAT_MALUS_MAX)
}

/// `lmr_table[depth][seen moves]`, precomputed from the log-log formula.
static LMR_TABLE: Lazy<Box<[[i32; MAX_MOVES]; MAX_PLY]>> = Lazy::new(|| {
    let mut table = Box::new([[0i32; MAX_MOVES]; MAX_PLY]);
    let base = params::LMR_BASE as f64 / 100.0;
    let div = params::LMR_DIV as f64 / 100.0;
    for depth in 1..MAX_PLY {
        for moves in 1..MAX_MOVES {
            table[depth][moves] =
                (base + (depth as f64).ln() * (moves as f64).ln() / div) as i32;
        }
    }
    table
});

#[inline]
#[must_use]
pub fn lmr_reduction(depth: i32, seen_moves: i32) -> i32 {
    LMR_TABLE[(depth as usize).min(MAX_PLY - 1)][(seen_moves as usize).min(MAX_MOVES - 1)]
}

/// Warm up the LMR table.
pub fn init() {
    Lazy::force(&LMR_TABLE);
}

/// Entry point for a worker: one full search against the thread's current
/// context.
pub fn run(thread: &mut SearchThread) {
    iterative::start_search(thread);
}

/// Per-worker search state. Histories and the Finny cache persist across
/// searches; everything else is reset by `start_search`.
pub struct SearchThread {
    pub index: usize,
    pub link: Arc<WorkerLink>,
    pub ctx: SharedContext,

    pub(crate) ply: i32,
    pub(crate) root_depth: i32,

    pub(crate) key_stack: Vec<u64>,
    pub(crate) key_stack_head: usize,

    pub(crate) accum_stack: Vec<Accumulator>,
    pub(crate) accum_head: usize,

    pub(crate) ss: Vec<SearchInfo>,

    pub root_moves: Vec<RootMove>,
    pub(crate) pv_idx: usize,
    pub(crate) multi_pv: usize,

    pub(crate) hist: HistoryTables,
    pub(crate) finny: Box<FinnyTable>,

    pub(crate) search_prev_score: Score,

    pub(crate) optimum_time: i64,
    pub(crate) max_time: i64,
    pub(crate) max_time_counter: u32,
}

impl SearchThread {
    #[must_use]
    pub fn new(index: usize, link: Arc<WorkerLink>, ctx: SharedContext) -> SearchThread {
        SearchThread {
            index,
            link,
            ctx,
            ply: 0,
            root_depth: 0,
            key_stack: vec![0; 100 + MAX_PLY],
            key_stack_head: 0,
            accum_stack: vec![Accumulator::default(); MAX_PLY],
            accum_head: 0,
            ss: vec![SearchInfo::default(); MAX_PLY + SS_OFFSET],
            root_moves: Vec::new(),
            pv_idx: 0,
            multi_pv: 1,
            hist: HistoryTables::new(),
            finny: Box::new([
                [FinnyEntry::default(), FinnyEntry::default()],
                [FinnyEntry::default(), FinnyEntry::default()],
            ]),
            search_prev_score: SCORE_NONE,
            optimum_time: 0,
            max_time: 0,
            max_time_counter: 0,
        }
    }

    pub fn reset_histories(&mut self) {
        self.hist.clear();
        self.search_prev_score = SCORE_NONE;
    }

    #[inline]
    pub(crate) fn is_main(&self) -> bool {
        self.index == 0
    }

    #[inline]
    pub(crate) fn elapsed_time(&self) -> i64 {
        self.ctx.settings.start_time.elapsed().as_millis() as i64
    }

    #[inline]
    pub(crate) fn is_stopped(&self) -> bool {
        self.ctx.stop.load(Ordering::Relaxed)
    }

    pub(crate) fn stop_search(&self) {
        self.ctx.stop.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn ss_at(&self, ply: i32) -> &SearchInfo {
        &self.ss[(ply + SS_OFFSET as i32) as usize]
    }

    #[inline]
    pub(crate) fn ss_at_mut(&mut self, ply: i32) -> &mut SearchInfo {
        &mut self.ss[(ply + SS_OFFSET as i32) as usize]
    }
}
