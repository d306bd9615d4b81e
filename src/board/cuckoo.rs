//! Upcoming-repetition tables.
//!
//! For every reversible move of a non-pawn piece, the XOR of the two
//! piece-square keys plus the tempo key identifies the "move key" that would
//! map a position back onto an earlier one. The keys live in an
//! open-addressed table with two cuckoo-hashed slots per entry; the search
//! probes it with `position.key ^ earlier.key` to detect that a single legal
//! move can force a repetition.

use once_cell::sync::Lazy;

use super::attack_tables;
use super::types::{Bitboard, Color, Move, Piece, PieceType, Square};
use super::zobrist;

const TABLE_SIZE: usize = 8192;

/// Number of reversible (piece, square-pair) combinations on a chessboard.
const EXPECTED_ENTRIES: usize = 3668;

pub struct CuckooTables {
    keys: [u64; TABLE_SIZE],
    moves: [Move; TABLE_SIZE],
}

#[inline]
#[must_use]
pub const fn h1(key: u64) -> usize {
    (key & 0x1fff) as usize
}

#[inline]
#[must_use]
pub const fn h2(key: u64) -> usize {
    ((key >> 16) & 0x1fff) as usize
}

static CUCKOO: Lazy<CuckooTables> = Lazy::new(|| {
    let mut keys = [0u64; TABLE_SIZE];
    let mut moves = [Move::NONE; TABLE_SIZE];
    let mut count = 0;

    for pt in [
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ] {
        for color in [Color::White, Color::Black] {
            let pc = Piece::new(color, pt);

            for s1 in 0..64usize {
                for s2 in s1 + 1..64 {
                    let (a, b) = (Square::from_index(s1), Square::from_index(s2));
                    if !attack_tables::piece_attacks(pc, a, Bitboard::EMPTY).contains(b) {
                        continue;
                    }

                    let mut mv = Move::new(a, b);
                    let mut key = zobrist::psq(pc, a) ^ zobrist::psq(pc, b) ^ zobrist::tempo();

                    let mut slot = h1(key);
                    loop {
                        std::mem::swap(&mut keys[slot], &mut key);
                        std::mem::swap(&mut moves[slot], &mut mv);
                        if mv.is_none() {
                            break;
                        }
                        slot = if slot == h1(key) { h2(key) } else { h1(key) };
                    }
                    count += 1;
                }
            }
        }
    }

    assert_eq!(count, EXPECTED_ENTRIES, "cuckoo table is broken");

    CuckooTables { keys, moves }
});

/// Force table construction at startup.
pub fn init() {
    Lazy::force(&CUCKOO);
}

/// Look up a move key; returns the reversible move if either slot matches.
#[inline]
#[must_use]
pub fn probe(move_key: u64) -> Option<Move> {
    let mut slot = h1(move_key);
    if CUCKOO.keys[slot] != move_key {
        slot = h2(move_key);
    }
    if CUCKOO.keys[slot] == move_key {
        Some(CUCKOO.moves[slot])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_builds() {
        init();
    }

    #[test]
    fn knight_move_key_found() {
        let pc = Piece::new(Color::White, PieceType::Knight);
        let g1 = Square::G1;
        let f3 = Square::parse("f3").unwrap();
        let key = zobrist::psq(pc, g1) ^ zobrist::psq(pc, f3) ^ zobrist::tempo();
        let mv = probe(key).expect("reversible knight move present");
        assert!(mv.from() == g1 || mv.from() == f3);
        assert!(mv.to() == g1 || mv.to() == f3);
    }

    #[test]
    fn pawn_move_key_absent() {
        let pc = Piece::W_PAWN;
        let e2 = Square::parse("e2").unwrap();
        let e3 = Square::parse("e3").unwrap();
        let key = zobrist::psq(pc, e2) ^ zobrist::psq(pc, e3) ^ zobrist::tempo();
        assert!(probe(key).is_none());
    }
}
