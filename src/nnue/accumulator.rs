//! Perspective accumulators, incremental updates, and the Finny mirror
//! cache used to accelerate full refreshes.

use crate::board::state::Position;
use crate::board::types::{Bitboard, Color, Piece, PieceType, Square};

use super::network::Network;
use super::simd;
use super::{DirtyKind, DirtyPieces, HIDDEN_WIDTH, KING_BUCKETS, KING_BUCKETS_SCHEME};

/// Index of one (king bucket, perspective, piece, square) feature.
///
/// The board is mirrored horizontally whenever the perspective king sits on
/// the e-h half, so only one half of the board is ever trained.
#[inline]
#[must_use]
fn feature_index(king: Square, side: Color, pc: Piece, sq: Square) -> usize {
    let sq = if king.file() >= 4 {
        Square::from_index(sq.index() ^ 7)
    } else {
        sq
    };
    let bucket = KING_BUCKETS_SCHEME[king.relative(side).index()];
    let them = usize::from(side != pc.color());
    let pt = pc.piece_type().index() - 1;

    ((bucket * 2 + them) * 6 + pt) * 64 + sq.relative(side).index()
}

/// Does a king move from `old_king` to `new_king` force a full refresh for
/// `side`? True when the move crosses the board half or the bucket scheme.
#[inline]
#[must_use]
pub fn need_refresh(side: Color, old_king: Square, new_king: Square) -> bool {
    if (old_king.index() & 4) != (new_king.index() & 4) {
        return true;
    }
    KING_BUCKETS_SCHEME[old_king.relative(side).index()]
        != KING_BUCKETS_SCHEME[new_king.relative(side).index()]
}

/// One node's hidden-layer state: a vector of feature sums per perspective,
/// plus the bookkeeping needed to patch it lazily from its parent.
#[derive(Clone)]
pub struct Accumulator {
    pub colors: [[i16; HIDDEN_WIDTH]; 2],
    pub updated: [bool; 2],
    pub kings: [Square; 2],
    pub dirty: DirtyPieces,
}

impl Default for Accumulator {
    fn default() -> Self {
        Accumulator {
            colors: [[0; HIDDEN_WIDTH]; 2],
            updated: [false; 2],
            kings: [Square::A1; 2],
            dirty: DirtyPieces::default(),
        }
    }
}

impl Accumulator {
    #[inline]
    pub fn add_piece(&mut self, net: &Network, king: Square, side: Color, pc: Piece, sq: Square) {
        let weights = net.feature_weights(feature_index(king, side, pc, sq));
        simd::add_weights(&mut self.colors[side.index()], weights);
    }

    #[inline]
    pub fn remove_piece(
        &mut self,
        net: &Network,
        king: Square,
        side: Color,
        pc: Piece,
        sq: Square,
    ) {
        let weights = net.feature_weights(feature_index(king, side, pc, sq));
        simd::sub_weights(&mut self.colors[side.index()], weights);
    }

    /// Rebuild one perspective from `parent` plus this node's dirty pieces.
    pub fn apply_updates(&mut self, net: &Network, king: Square, side: Color, parent: &Accumulator) {
        let dirty = self.dirty;
        self.colors[side.index()] = parent.colors[side.index()];

        self.remove_piece(net, king, side, dirty.sub0.pc, dirty.sub0.sq);
        self.add_piece(net, king, side, dirty.add0.pc, dirty.add0.sq);
        match dirty.kind {
            DirtyKind::Normal => {}
            DirtyKind::Capture => {
                self.remove_piece(net, king, side, dirty.sub1.pc, dirty.sub1.sq);
            }
            DirtyKind::Castling => {
                self.remove_piece(net, king, side, dirty.sub1.pc, dirty.sub1.sq);
                self.add_piece(net, king, side, dirty.add1.pc, dirty.add1.sq);
            }
        }
        self.updated[side.index()] = true;
    }

    /// Reset one perspective to the feature biases.
    pub fn reset(&mut self, net: &Network, side: Color) {
        self.colors[side.index()].copy_from_slice(net.feature_bias());
    }

    /// Full rebuild of one perspective from the position.
    pub fn refresh(&mut self, net: &Network, pos: &Position, side: Color) {
        self.reset(net, side);
        let king = pos.king_square(side);
        for sq in pos.occupied() {
            self.add_piece(net, king, side, pos.piece_on(sq), sq);
        }
        self.kings[side.index()] = king;
        self.updated[side.index()] = true;
    }
}

/// Cached accumulator per (board half, king bucket), together with the
/// piece bitboards it was built from. A refresh only has to apply the
/// difference between the cached board and the current one.
#[derive(Clone)]
pub struct FinnyEntry {
    pub by_color: [[Bitboard; 2]; 2],
    pub by_type: [[Bitboard; 7]; 2],
    pub acc: Accumulator,
}

impl Default for FinnyEntry {
    fn default() -> Self {
        FinnyEntry {
            by_color: [[Bitboard::EMPTY; 2]; 2],
            by_type: [[Bitboard::EMPTY; 7]; 2],
            acc: Accumulator::default(),
        }
    }
}

impl FinnyEntry {
    pub fn reset(&mut self, net: &Network) {
        self.by_color = [[Bitboard::EMPTY; 2]; 2];
        self.by_type = [[Bitboard::EMPTY; 7]; 2];
        self.acc.reset(net, Color::White);
        self.acc.reset(net, Color::Black);
    }
}

/// `[board half][king bucket]` mirror cache, one per search thread.
pub type FinnyTable = [[FinnyEntry; KING_BUCKETS]; 2];

/// Refresh `acc`'s `side` perspective through the Finny cache, updating the
/// cache in place.
pub fn refresh_from_cache(
    finny: &mut FinnyTable,
    net: &Network,
    pos: &Position,
    acc: &mut Accumulator,
    side: Color,
) {
    let king = pos.king_square(side);
    let mirror = usize::from(king.file() >= 4);
    let bucket = KING_BUCKETS_SCHEME[king.relative(side).index()];
    let entry = &mut finny[mirror][bucket];

    for color in [Color::White, Color::Black] {
        for pt in PieceType::ALL {
            let pc = Piece::new(color, pt);
            let old_bb =
                entry.by_color[side.index()][color.index()] & entry.by_type[side.index()][pt.index()];
            let new_bb = pos.pieces_of(color, pt);

            for sq in old_bb & !new_bb {
                entry.acc.remove_piece(net, king, side, pc, sq);
            }
            for sq in new_bb & !old_bb {
                entry.acc.add_piece(net, king, side, pc, sq);
            }
        }
    }

    acc.colors[side.index()] = entry.acc.colors[side.index()];
    acc.updated[side.index()] = true;

    entry.by_color[side.index()] = [pos.pieces(Color::White), pos.pieces(Color::Black)];
    for pt in PieceType::ALL {
        entry.by_type[side.index()][pt.index()] = pos.pieces_of_type(pt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::movegen::{self, GenFlags};
    use crate::board::types::MoveList;
    use crate::nnue::network::{Network, NETWORK_BYTES};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn test_network() -> Network {
        let mut rng = StdRng::seed_from_u64(7);
        let bytes: Vec<u8> = (0..NETWORK_BYTES).map(|_| rng.gen::<u8>()).collect();
        Network::from_bytes(&bytes).unwrap()
    }

    fn legal_moves(pos: &Position) -> Vec<crate::board::types::Move> {
        let mut list = MoveList::new();
        movegen::generate_moves(pos, GenFlags::ALL, &mut list);
        list.iter().filter(|&mv| pos.is_legal(mv)).collect()
    }

    /// Patching an accumulator move by move must match a from-scratch
    /// refresh at every node, refreshing whenever a king crosses a bucket.
    #[test]
    fn incremental_updates_match_full_refresh() {
        let net = test_network();
        let mut pos = Position::startpos();

        let mut acc = Accumulator::default();
        acc.refresh(&net, &pos, Color::White);
        acc.refresh(&net, &pos, Color::Black);

        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..60 {
            let moves = legal_moves(&pos);
            if moves.is_empty() {
                break;
            }
            let mv = moves[rng.gen_range(0..moves.len())];

            let parent = acc.clone();
            let old_kings = acc.kings;
            pos.do_move(mv, &mut acc.dirty);
            acc.kings = [
                pos.king_square(Color::White),
                pos.king_square(Color::Black),
            ];

            for side in [Color::White, Color::Black] {
                if need_refresh(side, old_kings[side.index()], acc.kings[side.index()]) {
                    acc.refresh(&net, &pos, side);
                } else {
                    let king = acc.kings[side.index()];
                    acc.apply_updates(&net, king, side, &parent);
                }

                let mut fresh = Accumulator::default();
                fresh.refresh(&net, &pos, side);
                assert_eq!(
                    &acc.colors[side.index()][..],
                    &fresh.colors[side.index()][..],
                    "accumulator diverged after {mv} for {side:?}"
                );
            }
        }
    }

    /// The Finny cache rebuild must agree with a plain refresh.
    #[test]
    fn cache_refresh_matches_plain_refresh() {
        let net = test_network();
        let mut finny: FinnyTable = Default::default();
        for half in &mut finny {
            for entry in half {
                entry.reset(&net);
            }
        }

        let fens = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "4k3/8/8/8/8/8/8/6K1 w - - 0 1",
        ];

        for fen in fens {
            let pos = Position::from_fen(fen).unwrap();
            for side in [Color::White, Color::Black] {
                let mut cached = Accumulator::default();
                refresh_from_cache(&mut finny, &net, &pos, &mut cached, side);

                let mut fresh = Accumulator::default();
                fresh.refresh(&net, &pos, side);

                assert_eq!(
                    &cached.colors[side.index()][..],
                    &fresh.colors[side.index()][..],
                    "cache rebuild diverged for {fen} {side:?}"
                );
            }
        }
    }

    #[test]
    fn refresh_boundaries() {
        use crate::board::types::Square;

        // Crossing the e-file half flips the mirror
        assert!(need_refresh(
            Color::White,
            Square::parse("d1").unwrap(),
            Square::parse("e1").unwrap()
        ));
        // Leaving the back two ranks changes the bucket
        assert!(need_refresh(
            Color::White,
            Square::parse("d2").unwrap(),
            Square::parse("d3").unwrap()
        ));
        // A step inside the same bucket and half does not
        assert!(!need_refresh(
            Color::White,
            Square::parse("d1").unwrap(),
            Square::parse("d2").unwrap()
        ));
    }
}
