//! Precomputed attack tables.
//!
//! Built once behind a `Lazy`; every lookup after that is a couple of array
//! reads. Sliding pieces go through magic indexing, leapers and pawns are
//! plain per-square masks, and `between`/`line` give the ray geometry the
//! legality and pin logic needs.

mod tables;

use once_cell::sync::Lazy;

use super::types::{Bitboard, Color, Piece, PieceType, Square};
use tables::Magic;

pub struct AttackTables {
    king: [Bitboard; 64],
    knight: [Bitboard; 64],
    pawn: [[Bitboard; 64]; 2],
    rook_magics: [Magic; 64],
    bishop_magics: [Magic; 64],
    sliding: Vec<Bitboard>,
    between: Box<[[Bitboard; 64]; 64]>,
    line: Box<[[Bitboard; 64]; 64]>,
}

static TABLES: Lazy<AttackTables> = Lazy::new(AttackTables::build);

impl AttackTables {
    fn build() -> AttackTables {
        let mut king = [Bitboard::EMPTY; 64];
        let mut knight = [Bitboard::EMPTY; 64];
        let mut pawn = [[Bitboard::EMPTY; 64]; 2];

        for sq in Square::all() {
            king[sq.index()] = tables::king_attacks(sq);
            knight[sq.index()] = tables::knight_attacks(sq);
            pawn[0][sq.index()] = tables::pawn_attacks(0, sq);
            pawn[1][sq.index()] = tables::pawn_attacks(1, sq);
        }

        let mut rng = tables::magic_rng();
        let mut sliding = Vec::with_capacity(107_648);
        let mut rook_magics = [Magic::default(); 64];
        let mut bishop_magics = [Magic::default(); 64];

        for sq in Square::all() {
            rook_magics[sq.index()] =
                tables::find_magic(&tables::ROOK_DIRS, sq, &mut sliding, &mut rng);
        }
        for sq in Square::all() {
            bishop_magics[sq.index()] =
                tables::find_magic(&tables::BISHOP_DIRS, sq, &mut sliding, &mut rng);
        }

        let mut t = AttackTables {
            king,
            knight,
            pawn,
            rook_magics,
            bishop_magics,
            sliding,
            between: Box::new([[Bitboard::EMPTY; 64]; 64]),
            line: Box::new([[Bitboard::EMPTY; 64]; 64]),
        };
        t.build_rays();
        t
    }

    fn build_rays(&mut self) {
        for a in Square::all() {
            for b in Square::all() {
                let (ai, bi) = (a.index(), b.index());
                if self.bishop(a, Bitboard::EMPTY).contains(b) {
                    self.between[ai][bi] = self.bishop(a, Bitboard::from_square(b))
                        & self.bishop(b, Bitboard::from_square(a));
                    self.line[ai][bi] =
                        (self.bishop(a, Bitboard::EMPTY) & self.bishop(b, Bitboard::EMPTY)) | a | b;
                } else if self.rook(a, Bitboard::EMPTY).contains(b) {
                    self.between[ai][bi] = self.rook(a, Bitboard::from_square(b))
                        & self.rook(b, Bitboard::from_square(a));
                    self.line[ai][bi] =
                        (self.rook(a, Bitboard::EMPTY) & self.rook(b, Bitboard::EMPTY)) | a | b;
                }
                // The destination itself rides along, which lets the
                // in-check filter admit capturing the checker.
                self.between[ai][bi] |= Bitboard::from_square(b);
            }
        }
    }

    #[inline]
    fn rook(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.sliding[self.rook_magics[sq.index()].index(occupied)]
    }

    #[inline]
    fn bishop(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.sliding[self.bishop_magics[sq.index()].index(occupied)]
    }
}

/// Force table construction; called once at startup so the first search
/// does not pay for it.
pub fn init() {
    Lazy::force(&TABLES);
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    TABLES.king[sq.index()]
}

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    TABLES.knight[sq.index()]
}

#[inline]
#[must_use]
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    TABLES.pawn[color.index()][sq.index()]
}

#[inline]
#[must_use]
pub fn rook_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    TABLES.rook(sq, occupied)
}

#[inline]
#[must_use]
pub fn bishop_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    TABLES.bishop(sq, occupied)
}

#[inline]
#[must_use]
pub fn queen_attacks(sq: Square, occupied: Bitboard) -> Bitboard {
    rook_attacks(sq, occupied) | bishop_attacks(sq, occupied)
}

/// Attacks of an arbitrary piece from `sq`.
#[must_use]
pub fn piece_attacks(pc: Piece, sq: Square, occupied: Bitboard) -> Bitboard {
    match pc.piece_type() {
        PieceType::Pawn => pawn_attacks(pc.color(), sq),
        PieceType::Knight => knight_attacks(sq),
        PieceType::Bishop => bishop_attacks(sq, occupied),
        PieceType::Rook => rook_attacks(sq, occupied),
        PieceType::Queen => queen_attacks(sq, occupied),
        PieceType::King => king_attacks(sq),
    }
}

/// Squares strictly between `a` and `b` along a shared ray, with `b` itself
/// OR'd in. Just `{b}` when the squares are not collinear.
#[inline]
#[must_use]
pub fn between(a: Square, b: Square) -> Bitboard {
    TABLES.between[a.index()][b.index()]
}

/// The full ray through `a` and `b` (endpoints included), or empty when the
/// squares are not collinear.
#[inline]
#[must_use]
pub fn line(a: Square, b: Square) -> Bitboard {
    TABLES.line[a.index()][b.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn king_attack_counts() {
        assert_eq!(king_attacks(Square::A1).count(), 3);
        assert_eq!(king_attacks(Square::E1).count(), 5);
        assert_eq!(king_attacks(Square::parse("e4").unwrap()).count(), 8);
    }

    #[test]
    fn knight_attack_counts() {
        assert_eq!(knight_attacks(Square::A1).count(), 2);
        assert_eq!(knight_attacks(Square::parse("d4").unwrap()).count(), 8);
    }

    #[test]
    fn rook_attacks_empty_board() {
        let attacks = rook_attacks(Square::parse("d4").unwrap(), Bitboard::EMPTY);
        assert_eq!(attacks.count(), 14);
    }

    #[test]
    fn rook_attacks_blocked() {
        let d4 = Square::parse("d4").unwrap();
        let d6 = Square::parse("d6").unwrap();
        let attacks = rook_attacks(d4, Bitboard::from_square(d6));
        assert!(attacks.contains(d6));
        assert!(!attacks.contains(Square::parse("d7").unwrap()));
    }

    #[test]
    fn bishop_attacks_blocked() {
        let c1 = Square::C1;
        let e3 = Square::parse("e3").unwrap();
        let attacks = bishop_attacks(c1, Bitboard::from_square(e3));
        assert!(attacks.contains(e3));
        assert!(!attacks.contains(Square::parse("f4").unwrap()));
    }

    #[test]
    fn between_includes_destination() {
        let a1 = Square::A1;
        let a4 = Square::parse("a4").unwrap();
        let b = between(a1, a4);
        assert!(b.contains(Square::parse("a2").unwrap()));
        assert!(b.contains(Square::parse("a3").unwrap()));
        assert!(b.contains(a4));
        assert!(!b.contains(a1));

        // Not collinear: just the destination
        let b2 = between(a1, Square::parse("b3").unwrap());
        assert_eq!(b2.count(), 1);
    }

    #[test]
    fn line_is_full_ray() {
        let l = line(Square::A1, Square::parse("c3").unwrap());
        assert!(l.contains(Square::A1));
        assert!(l.contains(Square::parse("h8").unwrap()));
        assert!(line(Square::A1, Square::parse("b3").unwrap()).is_empty());
    }
}
