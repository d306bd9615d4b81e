//! Static exchange evaluation.

use super::attack_tables as at;
use super::state::Position;
use super::types::{piece_value, Move, MoveKind, PieceType, PIECE_VALUE};

impl Position {
    /// Is the material balance of the capture sequence on `mv.to()` at
    /// least `threshold` for the side to move?
    ///
    /// Simulates alternating least-valued attackers, revealing X-ray
    /// sliders as pieces come off the board. Pinned pieces may not join the
    /// exchange while their pinner is still present.
    #[must_use]
    pub fn see_ge(&self, mv: Move, threshold: i32) -> bool {
        if mv.kind() != MoveKind::Normal {
            return 0 >= threshold;
        }

        let (from, to) = (mv.from(), mv.to());

        let mut swap = piece_value(self.piece_on(to)) - threshold;
        if swap < 0 {
            return false;
        }

        swap = piece_value(self.piece_on(from)) - swap;
        if swap <= 0 {
            return true;
        }

        let mut occupied = self.occupied() ^ from ^ to;
        let mut stm = self.side_to_move;
        let mut attackers = self.attackers_to(to, occupied);
        let mut res = 1i32;

        let diag = self.pieces_of_types(PieceType::Bishop, PieceType::Queen);
        let ortho = self.pieces_of_types(PieceType::Rook, PieceType::Queen);

        loop {
            stm = stm.flip();
            attackers &= occupied;

            let mut stm_attackers = attackers & self.pieces(stm);
            if stm_attackers.is_empty() {
                break;
            }

            if (self.pinners[stm.flip().index()] & occupied).any() {
                stm_attackers &= !self.blockers_for_king[stm.index()];
                if stm_attackers.is_empty() {
                    break;
                }
            }

            res ^= 1;

            // Capture with the least valuable attacker; sliders moving off
            // the line can reveal new attackers behind them.
            let next = [
                PieceType::Pawn,
                PieceType::Knight,
                PieceType::Bishop,
                PieceType::Rook,
                PieceType::Queen,
            ]
            .into_iter()
            .find_map(|pt| {
                let bb = stm_attackers & self.pieces_of_type(pt);
                bb.any().then_some((pt, bb))
            });

            match next {
                Some((pt, bb)) => {
                    swap = PIECE_VALUE[pt.index()] - swap;
                    if swap < res {
                        break;
                    }
                    occupied ^= bb.lsb_bb();
                    match pt {
                        PieceType::Pawn | PieceType::Bishop => {
                            attackers |= at::bishop_attacks(to, occupied) & diag;
                        }
                        PieceType::Rook => {
                            attackers |= at::rook_attacks(to, occupied) & ortho;
                        }
                        PieceType::Queen => {
                            attackers |= (at::bishop_attacks(to, occupied) & diag)
                                | (at::rook_attacks(to, occupied) & ortho);
                        }
                        _ => {}
                    }
                }
                None => {
                    // King takes; only stands if nothing recaptures
                    return if (attackers & !self.pieces(stm)).any() {
                        res ^ 1 != 0
                    } else {
                        res != 0
                    };
                }
            }
        }

        res != 0
    }
}
