//! Position state and incremental move making.
//!
//! A `Position` owns its entire state and is copied on descent: the search
//! clones the parent, applies one move, and throws the child away when the
//! branch is abandoned. There is no unmake.

use crate::nnue::{DirtyKind, DirtyPieces, SquarePiece};

use super::attack_tables as at;
use super::types::castling::{
    rook_castling_mask, BLACK_CASTLING, CASTLING_DATA, WHITE_CASTLING,
};
use super::types::{Bitboard, Color, Move, MoveKind, Piece, PieceType, Square};
use super::zobrist;

#[derive(Clone, Copy)]
pub struct Position {
    pub side_to_move: Color,
    pub ep_square: Option<Square>,
    pub castling_rights: u8,

    pub by_color: [Bitboard; 2],
    pub by_type: [Bitboard; 7],
    pub board: [Piece; 64],

    pub half_move_clock: i32,
    pub game_ply: i32,

    pub key: u64,
    pub pawn_key: u64,
    pub non_pawn_key: [u64; 2],

    pub blockers_for_king: [Bitboard; 2],
    pub pinners: [Bitboard; 2],

    /// Opponent pieces currently giving check to the side to move.
    pub checkers: Bitboard,
}

impl Position {
    #[must_use]
    pub fn empty() -> Position {
        Position {
            side_to_move: Color::White,
            ep_square: None,
            castling_rights: 0,
            by_color: [Bitboard::EMPTY; 2],
            by_type: [Bitboard::EMPTY; 7],
            board: [Piece::NONE; 64],
            half_move_clock: 0,
            game_ply: 0,
            key: 0,
            pawn_key: 0,
            non_pawn_key: [0; 2],
            blockers_for_king: [Bitboard::EMPTY; 2],
            pinners: [Bitboard::EMPTY; 2],
            checkers: Bitboard::EMPTY,
        }
    }

    // Piece set accessors

    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color) -> Bitboard {
        self.by_color[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn pieces_of_type(&self, pt: PieceType) -> Bitboard {
        self.by_type[pt.index()]
    }

    #[inline]
    #[must_use]
    pub fn pieces_of(&self, color: Color, pt: PieceType) -> Bitboard {
        self.by_color[color.index()] & self.by_type[pt.index()]
    }

    #[inline]
    #[must_use]
    pub fn pieces_of_types(&self, pt0: PieceType, pt1: PieceType) -> Bitboard {
        self.by_type[pt0.index()] | self.by_type[pt1.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupied(&self) -> Bitboard {
        self.by_color[0] | self.by_color[1]
    }

    #[inline]
    #[must_use]
    pub fn piece_on(&self, sq: Square) -> Piece {
        self.board[sq.index()]
    }

    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Square {
        let kings = self.pieces_of(color, PieceType::King);
        // A side can end up kingless when an illegal FEN lets the king be
        // captured; keep the answer indexable rather than crashing
        if kings.is_empty() {
            Square::A1
        } else {
            kings.lsb()
        }
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        self.checkers.any()
    }

    /// Does `color` still have anything beyond king and pawns?
    #[inline]
    #[must_use]
    pub fn has_non_pawns(&self, color: Color) -> bool {
        (self.pieces(color) & !(self.pieces_of_types(PieceType::Pawn, PieceType::King))).any()
    }

    // Attack queries

    /// All pieces of both colors attacking `sq` under `occupied`.
    #[must_use]
    pub fn attackers_to(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        (at::pawn_attacks(Color::Black, sq) & self.pieces_of(Color::White, PieceType::Pawn))
            | (at::pawn_attacks(Color::White, sq) & self.pieces_of(Color::Black, PieceType::Pawn))
            | (at::knight_attacks(sq) & self.pieces_of_type(PieceType::Knight))
            | (at::rook_attacks(sq, occupied)
                & self.pieces_of_types(PieceType::Rook, PieceType::Queen))
            | (at::bishop_attacks(sq, occupied)
                & self.pieces_of_types(PieceType::Bishop, PieceType::Queen))
            | (at::king_attacks(sq) & self.pieces_of_type(PieceType::King))
    }

    /// Pieces of one side attacking `sq` under `occupied`.
    #[must_use]
    pub fn attackers_to_by(&self, sq: Square, attacker: Color, occupied: Bitboard) -> Bitboard {
        let attackers = (at::knight_attacks(sq) & self.pieces_of_type(PieceType::Knight))
            | (at::king_attacks(sq) & self.pieces_of_type(PieceType::King))
            | (at::bishop_attacks(sq, occupied)
                & self.pieces_of_types(PieceType::Bishop, PieceType::Queen))
            | (at::rook_attacks(sq, occupied)
                & self.pieces_of_types(PieceType::Rook, PieceType::Queen))
            | (at::pawn_attacks(attacker.flip(), sq) & self.pieces_of_type(PieceType::Pawn));
        attackers & self.pieces(attacker)
    }

    /// Sliding pieces of one side attacking `sq` under `occupied`.
    #[must_use]
    pub fn sliding_attackers_to(&self, sq: Square, attacker: Color, occupied: Bitboard) -> Bitboard {
        let attackers = (at::bishop_attacks(sq, occupied)
            & self.pieces_of_types(PieceType::Bishop, PieceType::Queen))
            | (at::rook_attacks(sq, occupied)
                & self.pieces_of_types(PieceType::Rook, PieceType::Queen));
        attackers & self.pieces(attacker)
    }

    fn update_pins(&mut self, us: Color) {
        let them = us.flip();
        self.blockers_for_king[us.index()] = Bitboard::EMPTY;
        self.pinners[them.index()] = Bitboard::EMPTY;

        let ksq = self.king_square(us);
        let snipers = ((at::rook_attacks(ksq, Bitboard::EMPTY)
            & self.pieces_of_types(PieceType::Rook, PieceType::Queen))
            | (at::bishop_attacks(ksq, Bitboard::EMPTY)
                & self.pieces_of_types(PieceType::Bishop, PieceType::Queen)))
            & self.pieces(them);
        let occupancy = self.occupied() ^ snipers;

        for sniper in snipers {
            let blocking = at::between(ksq, sniper) & occupancy & !Bitboard::from_square(sniper);
            if blocking.any() && !blocking.more_than_one() {
                self.blockers_for_king[us.index()] |= blocking;
                if (blocking & self.pieces(us)).any() {
                    self.pinners[them.index()] |= Bitboard::from_square(sniper);
                }
            }
        }
    }

    /// Refresh blockers, pinners, and checkers. Invoke after the side to
    /// move has been updated.
    pub fn update_attacks_to_kings(&mut self) {
        self.update_pins(Color::White);
        self.update_pins(Color::Black);
        self.checkers = self.attackers_to_by(
            self.king_square(self.side_to_move),
            self.side_to_move.flip(),
            self.occupied(),
        );
    }

    /// Rebuild all Zobrist keys from scratch; used after loading a FEN.
    pub fn update_key(&mut self) {
        let mut key = 0;
        let mut pawn_key = 0;
        let mut non_pawn_key = [0u64; 2];

        for sq in self.occupied() {
            let pc = self.piece_on(sq);
            let psq = zobrist::psq(pc, sq);
            key ^= psq;
            if pc.piece_type() == PieceType::Pawn {
                pawn_key ^= psq;
            } else {
                non_pawn_key[pc.color().index()] ^= psq;
            }
        }

        key ^= zobrist::castling(self.castling_rights);
        if let Some(ep) = self.ep_square {
            key ^= zobrist::ep_file(ep.file());
        }
        if self.side_to_move == Color::White {
            key ^= zobrist::tempo();
        }

        self.key = key;
        self.pawn_key = pawn_key;
        self.non_pawn_key = non_pawn_key;
    }

    // Incremental board surgery. These keep the mailbox, the bitboards, and
    // all three Zobrist keys in sync.

    #[inline]
    fn xor_piece_keys(&mut self, pc: Piece, sq: Square) {
        let psq = zobrist::psq(pc, sq);
        self.key ^= psq;
        if pc.piece_type() == PieceType::Pawn {
            self.pawn_key ^= psq;
        } else {
            self.non_pawn_key[pc.color().index()] ^= psq;
        }
    }

    /// Assumes `pc` is on `sq`.
    #[inline]
    pub(crate) fn remove_piece(&mut self, sq: Square, pc: Piece) {
        self.xor_piece_keys(pc, sq);
        self.board[sq.index()] = Piece::NONE;
        self.by_color[pc.color().index()] ^= sq;
        self.by_type[pc.piece_type().index()] ^= sq;
    }

    /// Assumes `sq` is empty.
    #[inline]
    pub(crate) fn put_piece(&mut self, sq: Square, pc: Piece) {
        self.xor_piece_keys(pc, sq);
        self.board[sq.index()] = pc;
        self.by_color[pc.color().index()] ^= sq;
        self.by_type[pc.piece_type().index()] ^= sq;
    }

    /// Assumes the destination is empty.
    #[inline]
    fn move_piece(&mut self, from: Square, to: Square, pc: Piece) {
        self.xor_piece_keys(pc, from);
        self.xor_piece_keys(pc, to);
        self.board[from.index()] = Piece::NONE;
        self.board[to.index()] = pc;
        let from_to = Bitboard::from_square(from) | to;
        self.by_color[pc.color().index()] ^= from_to;
        self.by_type[pc.piece_type().index()] ^= from_to;
    }

    /// True for non-promotion, non-en-passant moves to an empty square.
    /// Castling counts as quiet.
    #[inline]
    #[must_use]
    pub fn is_quiet(&self, mv: Move) -> bool {
        match mv.kind() {
            MoveKind::Promotion | MoveKind::EnPassant => false,
            MoveKind::Castling => true,
            MoveKind::Normal => self.piece_on(mv.to()).is_none(),
        }
    }

    /// Apply `mv`, filling `dp` with the accumulator patch it implies.
    pub fn do_move(&mut self, mv: Move, dp: &mut DirtyPieces) {
        let us = self.side_to_move;
        let them = us.flip();

        if let Some(ep) = self.ep_square.take() {
            self.key ^= zobrist::ep_file(ep.file());
        }

        self.game_ply += 1;
        self.half_move_clock += 1;

        let mut new_rights = self.castling_rights;

        match mv.kind() {
            MoveKind::Normal => {
                let (from, to) = (mv.from(), mv.to());
                let moved = self.piece_on(from);
                let captured = self.piece_on(to);

                dp.kind = if captured.is_some() {
                    DirtyKind::Capture
                } else {
                    DirtyKind::Normal
                };

                if captured.is_some() {
                    self.half_move_clock = 0;
                    self.remove_piece(to, captured);
                    dp.sub1 = SquarePiece { sq: to, pc: captured };
                    if captured.piece_type() == PieceType::Rook {
                        new_rights &= rook_castling_mask(to);
                    }
                }

                self.move_piece(from, to, moved);
                dp.sub0 = SquarePiece { sq: from, pc: moved };
                dp.add0 = SquarePiece { sq: to, pc: moved };

                match moved.piece_type() {
                    PieceType::Pawn => {
                        self.half_move_clock = 0;
                        let delta = to.index() as i32 - from.index() as i32;
                        if delta == 16 || delta == -16 {
                            let ep = Square::from_index((from.index() + to.index()) / 2);
                            self.ep_square = Some(ep);
                            self.key ^= zobrist::ep_file(ep.file());
                        }
                    }
                    PieceType::Rook => {
                        new_rights &= rook_castling_mask(from);
                    }
                    PieceType::King => {
                        new_rights &= match us {
                            Color::White => !WHITE_CASTLING,
                            Color::Black => !BLACK_CASTLING,
                        };
                    }
                    _ => {}
                }
            }
            MoveKind::Castling => {
                let cd = &CASTLING_DATA[mv.castling_index()];
                let king = Piece::new(us, PieceType::King);
                let rook = Piece::new(us, PieceType::Rook);

                self.move_piece(cd.king_src, cd.king_dest, king);
                self.move_piece(cd.rook_src, cd.rook_dest, rook);
                new_rights &= match us {
                    Color::White => BLACK_CASTLING,
                    Color::Black => WHITE_CASTLING,
                };

                dp.kind = DirtyKind::Castling;
                dp.sub0 = SquarePiece { sq: cd.king_src, pc: king };
                dp.add0 = SquarePiece { sq: cd.king_dest, pc: king };
                dp.sub1 = SquarePiece { sq: cd.rook_src, pc: rook };
                dp.add1 = SquarePiece { sq: cd.rook_dest, pc: rook };
            }
            MoveKind::EnPassant => {
                self.half_move_clock = 0;
                let (from, to) = (mv.from(), mv.to());
                let our_pawn = Piece::new(us, PieceType::Pawn);
                let their_pawn = Piece::new(them, PieceType::Pawn);
                let cap_sq = match us {
                    Color::White => to.shifted(-8),
                    Color::Black => to.shifted(8),
                };

                self.remove_piece(cap_sq, their_pawn);
                self.move_piece(from, to, our_pawn);

                dp.kind = DirtyKind::Capture;
                dp.sub1 = SquarePiece { sq: cap_sq, pc: their_pawn };
                dp.sub0 = SquarePiece { sq: from, pc: our_pawn };
                dp.add0 = SquarePiece { sq: to, pc: our_pawn };
            }
            MoveKind::Promotion => {
                self.half_move_clock = 0;
                let (from, to) = (mv.from(), mv.to());
                let moved = self.piece_on(from);
                let captured = self.piece_on(to);
                let promoted = Piece::new(us, mv.promo_type());

                dp.kind = if captured.is_some() {
                    DirtyKind::Capture
                } else {
                    DirtyKind::Normal
                };

                if captured.is_some() {
                    self.remove_piece(to, captured);
                    dp.sub1 = SquarePiece { sq: to, pc: captured };
                    if captured.piece_type() == PieceType::Rook {
                        new_rights &= rook_castling_mask(to);
                    }
                }

                self.remove_piece(from, moved);
                self.put_piece(to, promoted);
                dp.sub0 = SquarePiece { sq: from, pc: moved };
                dp.add0 = SquarePiece { sq: to, pc: promoted };
            }
        }

        self.side_to_move = them;
        self.key ^= zobrist::tempo();

        self.update_attacks_to_kings();

        if new_rights != self.castling_rights {
            self.key ^= zobrist::castling(self.castling_rights ^ new_rights);
            self.castling_rights = new_rights;
        }
    }

    /// Pass the move: clear en passant, flip the side, refresh pins.
    pub fn do_null_move(&mut self) {
        if let Some(ep) = self.ep_square.take() {
            self.key ^= zobrist::ep_file(ep.file());
        }
        self.game_ply += 1;
        self.half_move_clock += 1;
        self.side_to_move = self.side_to_move.flip();
        self.key ^= zobrist::tempo();
        self.update_attacks_to_kings();
    }

    /// The Zobrist key the position would have after `mv`, without mutating.
    /// Exact for normal moves; close enough for the TT prefetch on the rest.
    #[must_use]
    pub fn key_after(&self, mv: Move) -> u64 {
        let us = self.side_to_move;
        let mut key = self.key;

        if let Some(ep) = self.ep_square {
            key ^= zobrist::ep_file(ep.file());
        }

        let (from, to) = (mv.from(), mv.to());
        let moved = self.piece_on(from);
        let captured = self.piece_on(to);
        let mut new_rights = self.castling_rights;

        if captured.is_some() {
            key ^= zobrist::psq(captured, to);
            if captured.piece_type() == PieceType::Rook {
                new_rights &= rook_castling_mask(to);
            }
        }

        key ^= zobrist::psq(moved, from) ^ zobrist::psq(moved, to);

        if moved.is_some() {
            match moved.piece_type() {
                PieceType::Pawn => {
                    let delta = to.index() as i32 - from.index() as i32;
                    if delta == 16 || delta == -16 {
                        key ^= zobrist::ep_file(from.file());
                    }
                }
                PieceType::Rook => {
                    new_rights &= rook_castling_mask(from);
                }
                PieceType::King => {
                    new_rights &= match us {
                        Color::White => !WHITE_CASTLING,
                        Color::Black => !BLACK_CASTLING,
                    };
                }
                _ => {}
            }
        }

        key ^= zobrist::tempo();
        key ^= zobrist::castling(self.castling_rights ^ new_rights);
        key
    }

    /// Cheap test that `mv` could have been generated in this position.
    /// Used to vet TT, killer, and counter moves before they are searched.
    #[must_use]
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if mv.is_none() {
            return false;
        }

        let us = self.side_to_move;
        let them = us.flip();
        let occupied = self.occupied();
        let (from, to) = (mv.from(), mv.to());
        let pc = self.piece_on(from);

        if pc.is_none() || pc.color() != us {
            return false;
        }

        if self.checkers.more_than_one() {
            return pc.piece_type() == PieceType::King
                && (at::king_attacks(from) & !self.pieces(us)).contains(to);
        }

        match mv.kind() {
            MoveKind::Castling => {
                let idx = mv.castling_index();
                let right_side = match us {
                    Color::White => idx < 2,
                    Color::Black => idx >= 2,
                };
                return right_side
                    && !self.in_check()
                    && self.castling_rights & super::types::castling::castling_bit(idx) != 0
                    && (super::types::castling::CASTLING_PATH[idx] & occupied).is_empty();
            }
            MoveKind::EnPassant => {
                return match self.ep_square {
                    Some(ep) => {
                        ep == to
                            && pc.piece_type() == PieceType::Pawn
                            && at::pawn_attacks(them, ep).contains(from)
                    }
                    None => false,
                };
            }
            _ => {}
        }

        let mut targets = !self.pieces(us);
        if pc.piece_type() != PieceType::King {
            if self.in_check() {
                targets &= at::between(self.king_square(us), self.checkers.lsb());
            }
            if self.blockers_for_king[us.index()].contains(from) {
                targets &= at::line(self.king_square(us), from);
            }
        }

        if !targets.contains(to) {
            return false;
        }

        if pc.piece_type() == PieceType::Pawn {
            let sq_bb = Bitboard::from_square(from);
            let empty = !occupied;

            let mut legal_to = match us {
                Color::White => {
                    let mut pushes = sq_bb.shifted(8) & empty;
                    pushes |= (pushes & super::types::bitboard::RANK_3).shifted(8) & empty;
                    pushes
                        | (((sq_bb & !super::types::bitboard::FILE_H).shifted(9)
                            | (sq_bb & !super::types::bitboard::FILE_A).shifted(7))
                            & self.pieces(Color::Black))
                }
                Color::Black => {
                    let mut pushes = sq_bb.shifted(-8) & empty;
                    pushes |= (pushes & super::types::bitboard::RANK_6).shifted(-8) & empty;
                    pushes
                        | (((sq_bb & !super::types::bitboard::FILE_H).shifted(-7)
                            | (sq_bb & !super::types::bitboard::FILE_A).shifted(-9))
                            & self.pieces(Color::White))
                }
            };

            if mv.kind() != MoveKind::Promotion {
                legal_to &= !(super::types::bitboard::RANK_1 | super::types::bitboard::RANK_8);
            } else if !(super::types::bitboard::RANK_1 | super::types::bitboard::RANK_8)
                .contains(to)
            {
                return false;
            }

            return legal_to.contains(to);
        }

        at::piece_attacks(pc, from, occupied).contains(to)
    }

    /// Full legality of a pseudo-legal move: our king may not be left in
    /// check. Castling additionally requires the crossed squares to be safe.
    #[must_use]
    pub fn is_legal(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        let them = us.flip();

        if mv.kind() == MoveKind::Castling {
            let cd = &CASTLING_DATA[mv.castling_index()];
            let mid = Square::from_index((cd.king_src.index() + cd.king_dest.index()) / 2);
            return self
                .attackers_to_by(mid, them, self.occupied())
                .is_empty()
                && self
                    .attackers_to_by(cd.king_dest, them, self.occupied())
                    .is_empty();
        }

        let (from, to) = (mv.from(), mv.to());
        let moved = self.piece_on(from);

        if moved.piece_type() == PieceType::King {
            return self
                .attackers_to_by(to, them, self.occupied() ^ from)
                .is_empty();
        }

        if !self.in_check() && at::line(from, to).contains(self.king_square(us)) {
            return true;
        }

        if mv.kind() == MoveKind::EnPassant {
            let cap_sq = match us {
                Color::White => to.shifted(-8),
                Color::Black => to.shifted(8),
            };
            let occupied = self.occupied() ^ from ^ cap_sq ^ to;
            return self
                .sliding_attackers_to(self.king_square(us), them, occupied)
                .is_empty();
        }

        if moved.piece_type() == PieceType::Pawn {
            return !self.blockers_for_king[us.index()].contains(from);
        }

        true
    }

    /// Is any legal move available at all?
    #[must_use]
    pub fn has_legal_move(&self) -> bool {
        let mut list = super::types::MoveList::new();
        super::movegen::generate_moves(self, super::movegen::GenFlags::ALL, &mut list);
        let has_legal = list.iter().any(|mv| self.is_legal(mv));
        has_legal
    }

    /// Fifty-move-rule draw: clock at 100+, and when in check there must be
    /// a legal reply (otherwise it is mate, not a draw).
    #[must_use]
    pub fn is_50mr_draw(&self) -> bool {
        self.half_move_clock >= 100 && (!self.in_check() || self.has_legal_move())
    }
}
