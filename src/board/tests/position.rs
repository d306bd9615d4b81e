//! Position invariants: hashing, move making, legality, FEN round trips.

use crate::board::movegen::{self, GenFlags};
use crate::board::types::{Color, MoveList, PieceType, Square};
use crate::board::Position;
use crate::nnue::DirtyPieces;

fn legal_moves(pos: &Position) -> Vec<crate::board::types::Move> {
    let mut list = MoveList::new();
    movegen::generate_moves(pos, GenFlags::ALL, &mut list);
    list.iter().filter(|&mv| pos.is_legal(mv)).collect()
}

/// Board/bitboard agreement plus a full key recomputation.
fn check_consistency(pos: &Position) {
    for sq in Square::all() {
        let pc = pos.piece_on(sq);
        if pc.is_some() {
            assert!(pos.pieces(pc.color()).contains(sq));
            assert!(pos.pieces_of_type(pc.piece_type()).contains(sq));
        } else {
            assert!(!pos.occupied().contains(sq));
        }
    }

    for color in [Color::White, Color::Black] {
        assert_eq!(pos.pieces_of(color, PieceType::King).count(), 1);
    }

    let mut fresh = *pos;
    fresh.update_key();
    assert_eq!(pos.key, fresh.key, "incremental key diverged");
    assert_eq!(pos.pawn_key, fresh.pawn_key, "pawn key diverged");
    assert_eq!(pos.non_pawn_key, fresh.non_pawn_key, "non-pawn key diverged");
}

fn walk(fen: &str, depth: u32) {
    let pos = Position::from_fen(fen).unwrap();
    walk_rec(&pos, depth);
}

fn walk_rec(pos: &Position, depth: u32) {
    check_consistency(pos);
    if depth == 0 {
        return;
    }
    let mut dp = DirtyPieces::default();
    for mv in legal_moves(pos) {
        assert!(pos.is_pseudo_legal(mv), "generated move fails pseudo-legality: {mv}");
        let mut child = *pos;
        child.do_move(mv, &mut dp);
        walk_rec(&child, depth - 1);
    }
}

#[test]
fn incremental_keys_stay_consistent() {
    walk("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", 3);
    walk("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1", 2);
    walk("n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1", 2);
    walk("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3", 2);
}

#[test]
fn key_after_matches_do_move_for_normal_moves() {
    let pos = Position::from_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    )
    .unwrap();
    let mut dp = DirtyPieces::default();

    for mv in legal_moves(&pos) {
        if mv.kind() != crate::board::types::MoveKind::Normal {
            continue;
        }
        let predicted = pos.key_after(mv);
        let mut child = pos;
        child.do_move(mv, &mut dp);
        assert_eq!(predicted, child.key, "key_after mismatch for {mv}");
    }
}

#[test]
fn fen_round_trip_preserves_key() {
    let fens = [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
    ];
    for fen in fens {
        let pos = Position::from_fen(fen).unwrap();
        let round = Position::from_fen(&pos.to_fen()).unwrap();
        assert_eq!(pos.key, round.key, "round trip changed {fen}");
        assert_eq!(pos.to_fen(), round.to_fen());
    }
}

#[test]
fn replayed_moves_reach_the_same_key() {
    // Play a line, rebuild from the emitted FEN at every step, and demand
    // identical keys
    let mut pos = Position::startpos();
    let mut dp = DirtyPieces::default();
    let line = ["e2e4", "c7c5", "g1f3", "d7d6", "f1b5", "c8d7", "e1g1"];

    for token in line {
        let mv = crate::uci::string_to_move(&pos, token).unwrap();
        assert!(pos.is_pseudo_legal(mv) && pos.is_legal(mv));
        pos.do_move(mv, &mut dp);

        let rebuilt = Position::from_fen(&pos.to_fen()).unwrap();
        assert_eq!(pos.key, rebuilt.key, "divergence after {token}");
    }
}

#[test]
fn partial_fens_get_default_clocks() {
    let pos = Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -").unwrap();
    assert_eq!(pos.half_move_clock, 0);
    assert_eq!(pos.game_ply, 0);

    let pos = Position::from_fen("8/8/8/8/8/5k2/6q1/7K b - -").unwrap();
    assert_eq!(pos.side_to_move, Color::Black);
}

#[test]
fn bad_fens_are_rejected_not_crashing() {
    assert!(Position::from_fen("").is_err());
    assert!(Position::from_fen("garbage").is_err());
    assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err()); // no kings
    assert!(Position::from_fen("9/8/8/8/8/8/8/4K2k w - - 0 1").is_err());
}

#[test]
fn null_move_flips_side_and_clears_ep() {
    let mut pos =
        Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
            .unwrap();
    let key_before = pos.key;
    pos.do_null_move();
    assert_eq!(pos.side_to_move, Color::Black);
    assert!(pos.ep_square.is_none());
    assert_ne!(pos.key, key_before);

    let mut fresh = pos;
    fresh.update_key();
    assert_eq!(pos.key, fresh.key);
}

#[test]
fn fifty_move_rule_draw_detection() {
    // Clock at 100 with plenty of legal moves
    let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 100 80").unwrap();
    assert!(pos.is_50mr_draw());

    let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 99 80").unwrap();
    assert!(!pos.is_50mr_draw());

    // Checkmate beats the clock: back-rank mate with clock 100 is not a draw
    let pos = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 100 80").unwrap();
    assert!(pos.in_check());
    assert!(!pos.is_50mr_draw());
}

#[test]
fn pseudo_legality_rejects_foreign_moves() {
    use crate::board::types::Move;

    let pos = Position::startpos();
    assert!(!pos.is_pseudo_legal(Move::NONE));

    // No piece on the from square
    let mv = Move::new(Square::parse("e4").unwrap(), Square::parse("e5").unwrap());
    assert!(!pos.is_pseudo_legal(mv));

    // Moving an enemy piece
    let mv = Move::new(Square::parse("e7").unwrap(), Square::parse("e5").unwrap());
    assert!(!pos.is_pseudo_legal(mv));

    // Blocked slider
    let mv = Move::new(Square::A1, Square::parse("a3").unwrap());
    assert!(!pos.is_pseudo_legal(mv));
}

#[test]
fn castling_legality_respects_attacked_squares() {
    // Rook on the f-file forbids white short castling
    let pos = Position::from_fen("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
    let moves = legal_moves(&pos);
    let short = crate::board::types::Move::castling(0);
    let long = crate::board::types::Move::castling(1);
    assert!(!moves.contains(&short), "castling through f1 must be illegal");
    assert!(moves.contains(&long));
}

#[test]
fn checkers_and_pins_update() {
    let pos = Position::from_fen("4k3/4r3/8/8/8/8/4B3/4K3 w - - 0 1").unwrap();
    // The bishop on e2 is pinned against the king on e1
    assert!(pos.blockers_for_king[Color::White.index()]
        .contains(Square::parse("e2").unwrap()));
    assert!(!pos.in_check());

    let pos = Position::from_fen("4k3/4r3/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    assert!(pos.in_check());
    assert_eq!(pos.checkers.count(), 1);
}

#[test]
fn quiet_checks_are_quiet_and_give_check() {
    use crate::board::types::MoveList;

    let pos = Position::from_fen("4k3/8/8/8/8/8/3R4/3K4 w - - 0 1").unwrap();
    let mut checks = MoveList::new();
    movegen::generate_quiet_checks(&pos, &mut checks);

    let d8 = crate::uci::string_to_move(&pos, "d2d8").unwrap();
    let e2 = crate::uci::string_to_move(&pos, "d2e2").unwrap();
    assert!(checks.contains(d8));
    assert!(checks.contains(e2));

    let mut dp = DirtyPieces::default();
    for mv in checks.iter() {
        assert!(pos.is_quiet(mv), "{mv} is not quiet");
        if !pos.is_legal(mv) {
            continue;
        }
        let mut child = pos;
        child.do_move(mv, &mut dp);
        assert!(child.in_check(), "{mv} does not give check");
    }
}

#[test]
fn pinned_knights_generate_no_moves() {
    // Knight on e4 is pinned by the e8 rook
    let pos = Position::from_fen("3kr3/8/8/8/4N3/8/8/4K3 w - - 0 1").unwrap();
    let moves = legal_moves(&pos);
    assert!(
        moves.iter().all(|mv| mv.from() != Square::parse("e4").unwrap()),
        "pinned knight must not move"
    );
}

#[test]
fn en_passant_discovered_check_is_illegal() {
    // Taking en passant removes both pawns from the fifth rank and exposes
    // the white king to the h5 rook
    let pos = Position::from_fen("4k3/8/8/K2pP2r/8/8/8/8 w - d6 0 2").unwrap();
    let mv = crate::uci::string_to_move(&pos, "e5d6").expect("ep capture is generated");
    assert!(pos.is_pseudo_legal(mv));
    assert!(!pos.is_legal(mv), "en passant into discovered check");
}
