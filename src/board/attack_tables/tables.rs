//! Slow table builders, run once at startup.
//!
//! Sliding attacks use magic indexing; the magic factors are searched with a
//! seeded RNG so initialization is deterministic across runs.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::board::types::bitboard::{self, Bitboard};
use crate::board::types::Square;

pub const ROOK_DIRS: [i32; 4] = [8, 1, -8, -1];
pub const BISHOP_DIRS: [i32; 4] = [9, 7, -7, -9];

/// One square's worth of magic lookup data. `offset` points into the shared
/// attack table.
#[derive(Clone, Copy, Default)]
pub struct Magic {
    pub mask: Bitboard,
    pub factor: u64,
    pub shift: u32,
    pub offset: usize,
}

impl Magic {
    #[inline]
    #[must_use]
    pub fn index(&self, occupied: Bitboard) -> usize {
        let relevant = occupied.0 & self.mask.0;
        self.offset + (relevant.wrapping_mul(self.factor) >> self.shift) as usize
    }
}

pub fn king_attacks(sq: Square) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    let (f, r) = (sq.file() as i32, sq.rank() as i32);
    for df in -1..=1 {
        for dr in -1..=1 {
            if df == 0 && dr == 0 {
                continue;
            }
            let (nf, nr) = (f + df, r + dr);
            if (0..8).contains(&nf) && (0..8).contains(&nr) {
                attacks.set(Square::make(nf as u8, nr as u8));
            }
        }
    }
    attacks
}

pub fn knight_attacks(sq: Square) -> Bitboard {
    const JUMPS: [(i32, i32); 8] = [
        (2, 1),
        (2, -1),
        (-2, 1),
        (-2, -1),
        (1, 2),
        (1, -2),
        (-1, 2),
        (-1, -2),
    ];
    let mut attacks = Bitboard::EMPTY;
    let (f, r) = (sq.file() as i32, sq.rank() as i32);
    for (df, dr) in JUMPS {
        let (nf, nr) = (f + df, r + dr);
        if (0..8).contains(&nf) && (0..8).contains(&nr) {
            attacks.set(Square::make(nf as u8, nr as u8));
        }
    }
    attacks
}

/// The two capture squares diagonally ahead of a pawn.
pub fn pawn_attacks(color: usize, sq: Square) -> Bitboard {
    let bb = Bitboard::from_square(sq);
    if color == 0 {
        ((bb & !bitboard::FILE_A).shifted(7)) | ((bb & !bitboard::FILE_H).shifted(9))
    } else {
        ((bb & !bitboard::FILE_A).shifted(-9)) | ((bb & !bitboard::FILE_H).shifted(-7))
    }
}

/// Walk the four `dirs` rays from `sq`, stopping at the first occupied
/// square (inclusive).
pub fn sliding_attack(dirs: &[i32; 4], sq: Square, occupied: Bitboard) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for &dir in dirs {
        let (df, dr) = dir_deltas(dir);
        let mut f = sq.file() as i32;
        let mut r = sq.rank() as i32;
        loop {
            f += df;
            r += dr;
            if !(0..8).contains(&f) || !(0..8).contains(&r) {
                break;
            }
            let dest = Square::make(f as u8, r as u8);
            attacks.set(dest);
            if occupied.contains(dest) {
                break;
            }
        }
    }
    attacks
}

fn dir_deltas(dir: i32) -> (i32, i32) {
    match dir {
        8 => (0, 1),
        -8 => (0, -1),
        1 => (1, 0),
        -1 => (-1, 0),
        9 => (1, 1),
        7 => (-1, 1),
        -7 => (1, -1),
        _ => (-1, -1),
    }
}

/// Relevant-occupancy mask: the interior ray squares (board edges excluded,
/// unless the piece sits on the edge in that direction).
pub fn relevant_mask(dirs: &[i32; 4], sq: Square) -> Bitboard {
    let edges = ((bitboard::RANK_1 | bitboard::RANK_8)
        & !rank_bb(sq))
        | ((bitboard::FILE_A | bitboard::FILE_H) & !file_bb(sq));
    sliding_attack(dirs, sq, Bitboard::EMPTY) & !edges
}

fn rank_bb(sq: Square) -> Bitboard {
    Bitboard(0xffu64 << (8 * sq.rank()))
}

fn file_bb(sq: Square) -> Bitboard {
    Bitboard(bitboard::FILE_A.0 << sq.file())
}

/// Enumerate every subset of `mask` with the carry-rippler trick, pairing
/// each occupancy with its attack set.
pub fn enumerate_occupancies(dirs: &[i32; 4], sq: Square, mask: Bitboard) -> Vec<(Bitboard, Bitboard)> {
    let mut pairs = Vec::with_capacity(1 << mask.count());
    let mut occ = 0u64;
    loop {
        pairs.push((Bitboard(occ), sliding_attack(dirs, sq, Bitboard(occ))));
        occ = occ.wrapping_sub(mask.0) & mask.0;
        if occ == 0 {
            break;
        }
    }
    pairs
}

fn sparse_u64(rng: &mut StdRng) -> u64 {
    rng.next_u64() & rng.next_u64() & rng.next_u64()
}

/// Find a collision-free magic factor for one square and fill its slice of
/// the shared attack table.
pub fn find_magic(
    dirs: &[i32; 4],
    sq: Square,
    table: &mut Vec<Bitboard>,
    rng: &mut StdRng,
) -> Magic {
    let mask = relevant_mask(dirs, sq);
    let bits = mask.count();
    let shift = 64 - bits;
    let size = 1usize << bits;
    let pairs = enumerate_occupancies(dirs, sq, mask);

    let offset = table.len();
    let mut slots = vec![Bitboard::EMPTY; size];
    let mut used = vec![false; size];

    loop {
        let factor = sparse_u64(rng);
        // Cheap rejection of factors that cannot spread the high bits
        if (mask.0.wrapping_mul(factor) >> 56).count_ones() < 6 {
            continue;
        }

        slots.iter_mut().for_each(|s| *s = Bitboard::EMPTY);
        used.iter_mut().for_each(|u| *u = false);

        let mut ok = true;
        for &(occ, attack) in &pairs {
            let idx = (occ.0.wrapping_mul(factor) >> shift) as usize;
            if used[idx] && slots[idx] != attack {
                ok = false;
                break;
            }
            used[idx] = true;
            slots[idx] = attack;
        }

        if ok {
            table.extend_from_slice(&slots);
            return Magic {
                mask,
                factor,
                shift,
                offset,
            };
        }
    }
}

/// Deterministic RNG for the magic search.
#[must_use]
pub fn magic_rng() -> StdRng {
    StdRng::seed_from_u64(0x9e37_79b9_7f4a_7c15)
}
