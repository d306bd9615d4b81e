//! Property tests: random playouts must never break the incremental state.

use proptest::prelude::*;

use crate::board::movegen::{self, GenFlags};
use crate::board::types::MoveList;
use crate::board::Position;
use crate::nnue::DirtyPieces;

fn legal_moves(pos: &Position) -> Vec<crate::board::types::Move> {
    let mut list = MoveList::new();
    movegen::generate_moves(pos, GenFlags::ALL, &mut list);
    list.iter().filter(|&mv| pos.is_legal(mv)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever line gets played, the incremental keys and bitboards agree
    /// with a from-scratch rebuild.
    #[test]
    fn random_playouts_keep_keys_consistent(choices in prop::collection::vec(any::<u8>(), 0..120)) {
        let mut pos = Position::startpos();
        let mut dp = DirtyPieces::default();

        for choice in choices {
            let moves = legal_moves(&pos);
            if moves.is_empty() {
                break;
            }
            let mv = moves[choice as usize % moves.len()];
            prop_assert!(pos.is_pseudo_legal(mv));
            pos.do_move(mv, &mut dp);

            let mut fresh = pos;
            fresh.update_key();
            prop_assert_eq!(pos.key, fresh.key);
            prop_assert_eq!(pos.pawn_key, fresh.pawn_key);
            prop_assert_eq!(pos.non_pawn_key, fresh.non_pawn_key);

            let rebuilt = Position::from_fen(&pos.to_fen()).unwrap();
            prop_assert_eq!(pos.key, rebuilt.key);
        }
    }

    /// Generated moves always pass the pseudo-legality filter they would be
    /// vetted with when coming back out of the transposition table.
    #[test]
    fn generated_moves_are_pseudo_legal(choices in prop::collection::vec(any::<u8>(), 0..60)) {
        let mut pos = Position::startpos();
        let mut dp = DirtyPieces::default();

        for choice in choices {
            let moves = legal_moves(&pos);
            if moves.is_empty() {
                break;
            }
            for mv in &moves {
                prop_assert!(pos.is_pseudo_legal(*mv), "move {} flunks in {}", mv, pos.to_fen());
            }
            pos.do_move(moves[choice as usize % moves.len()], &mut dp);
        }
    }
}
