//! Zobrist hashing keys.
//!
//! Keys are drawn from a fixed-seed RNG so hashes are reproducible across
//! runs and platforms. The castling table stores one key per single right
//! and the XOR-combination for every rights mask, so `castling[old ^ new]`
//! updates the hash in one lookup.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::castling::{BLACK_OO, BLACK_OOO, WHITE_OO, WHITE_OOO};
use super::types::{Piece, Square, PIECE_NB};

pub struct ZobristKeys {
    pub psq: [[u64; 64]; PIECE_NB],
    pub ep_file: [u64; 8],
    pub castling: [u64; 16],
    pub tempo: u64,
    /// Keys blended into the TT lookup key as the halfmove clock closes in
    /// on the 50-move rule, bucketed by eight plies.
    pub fifty: [u64; 120],
}

pub static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(12345);

    let mut keys = ZobristKeys {
        psq: [[0; 64]; PIECE_NB],
        ep_file: [0; 8],
        castling: [0; 16],
        tempo: rng.gen(),
        fifty: [0; 120],
    };

    for pc in 1..PIECE_NB {
        for sq in 0..64 {
            keys.psq[pc][sq] = rng.gen();
        }
    }
    for file in 0..8 {
        keys.ep_file[file] = rng.gen();
    }

    keys.castling[WHITE_OO as usize] = rng.gen();
    keys.castling[WHITE_OOO as usize] = rng.gen();
    keys.castling[BLACK_OO as usize] = rng.gen();
    keys.castling[BLACK_OOO as usize] = rng.gen();
    for mask in 1..16usize {
        if mask.count_ones() < 2 {
            continue;
        }
        let mut delta = 0;
        for bit in [WHITE_OO, WHITE_OOO, BLACK_OO, BLACK_OOO] {
            if mask & bit as usize != 0 {
                delta ^= keys.castling[bit as usize];
            }
        }
        keys.castling[mask] = delta;
    }

    let mut clock = 14;
    while clock <= 100 {
        let key: u64 = rng.gen();
        for j in 0..8 {
            keys.fifty[clock + j] = key;
        }
        clock += 8;
    }

    keys
});

#[inline]
#[must_use]
pub fn psq(pc: Piece, sq: Square) -> u64 {
    ZOBRIST.psq[pc.index()][sq.index()]
}

#[inline]
#[must_use]
pub fn ep_file(file: u8) -> u64 {
    ZOBRIST.ep_file[file as usize]
}

#[inline]
#[must_use]
pub fn castling(rights: u8) -> u64 {
    ZOBRIST.castling[rights as usize]
}

#[inline]
#[must_use]
pub fn tempo() -> u64 {
    ZOBRIST.tempo
}

/// Key component for the halfmove clock; clamped so oversized FEN clocks
/// cannot index out of bounds.
#[inline]
#[must_use]
pub fn fifty(half_move_clock: i32) -> u64 {
    ZOBRIST.fifty[(half_move_clock.max(0) as usize).min(119)]
}
