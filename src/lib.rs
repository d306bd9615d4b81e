//! Umbra: an alpha-beta chess engine with an incrementally-updated
//! evaluation network, a shared transposition table, and Lazy-SMP search.

pub mod board;
pub mod nnue;
pub mod search;
pub mod tb;
pub mod threads;
pub mod tt;
pub mod uci;

/// One-time table setup. Cheap to call more than once.
pub fn init() {
    board::attack_tables::init();
    board::cuckoo::init();
    search::init();
}
