//! Board representation: bitboards, Zobrist hashing, move generation,
//! legality, and static exchange evaluation.

pub mod attack_tables;
pub mod cuckoo;
pub mod fen;
pub mod movegen;
mod see;
pub mod state;
pub mod types;
pub mod zobrist;

#[cfg(test)]
mod tests;

pub use fen::{FenError, START_FEN};
pub use state::Position;

use crate::nnue::DirtyPieces;
use movegen::GenFlags;
use types::MoveList;

/// Count leaf nodes of the legal move tree to `depth`.
#[must_use]
pub fn perft(pos: &Position, depth: u32) -> u64 {
    let mut list = MoveList::new();
    movegen::generate_moves(pos, GenFlags::ALL, &mut list);

    if depth <= 1 {
        return list.iter().filter(|&mv| pos.is_legal(mv)).count() as u64;
    }

    let mut nodes = 0;
    let mut dp = DirtyPieces::default();
    for mv in list.iter() {
        if !pos.is_legal(mv) {
            continue;
        }
        let mut child = *pos;
        child.do_move(mv, &mut dp);
        nodes += perft(&child, depth - 1);
    }
    nodes
}

/// Perft with a per-root-move breakdown, printed as the UCI `go perft`
/// output.
#[must_use]
pub fn perft_divide(pos: &Position, depth: u32) -> u64 {
    let mut list = MoveList::new();
    movegen::generate_moves(pos, GenFlags::ALL, &mut list);

    let mut nodes = 0;
    let mut dp = DirtyPieces::default();
    for mv in list.iter() {
        if !pos.is_legal(mv) {
            continue;
        }
        let mut child = *pos;
        child.do_move(mv, &mut dp);
        let count = if depth <= 1 { 1 } else { perft(&child, depth - 1) };
        println!("{mv} -> {count}");
        nodes += count;
    }
    nodes
}
