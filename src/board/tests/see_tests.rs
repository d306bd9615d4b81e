//! Static exchange evaluation on hand-built exchanges.

use crate::board::Position;
use crate::uci::string_to_move;

fn see(fen: &str, mv: &str, threshold: i32) -> bool {
    let pos = Position::from_fen(fen).unwrap();
    let mv = string_to_move(&pos, mv).expect("move exists");
    pos.see_ge(mv, threshold)
}

#[test]
fn winning_an_undefended_pawn() {
    let fen = "1k6/8/8/4p3/8/8/4R3/1K6 w - - 0 1";
    assert!(see(fen, "e2e5", 0));
    assert!(see(fen, "e2e5", 100));
    assert!(!see(fen, "e2e5", 101));
}

#[test]
fn rook_takes_defended_pawn_loses_material() {
    let fen = "1k6/8/5p2/4p3/8/8/4R3/1K6 w - - 0 1";
    assert!(!see(fen, "e2e5", 0));
    assert!(see(fen, "e2e5", -510));
    assert!(!see(fen, "e2e5", -509));
}

#[test]
fn xray_backup_turns_the_exchange() {
    // The e1 rook recaptures through its sibling on e2
    let fen = "1k2r3/8/8/4p3/8/8/4R3/1K2R3 w - - 0 1";
    assert!(see(fen, "e2e5", 100));
    assert!(!see(fen, "e2e5", 101));
}

#[test]
fn equal_trade_is_zero() {
    // Knight takes knight, defended by a pawn
    let fen = "1k6/8/3p4/4n3/8/3N4/8/1K6 w - - 0 1";
    assert!(see(fen, "d3e5", 0));
    assert!(!see(fen, "d3e5", 1));
}

#[test]
fn quiet_moves_pass_at_zero_threshold() {
    let pos = Position::startpos();
    let mv = string_to_move(&pos, "e2e4").unwrap();
    assert!(pos.see_ge(mv, 0));
    assert!(!pos.see_ge(mv, 1));
}

#[test]
fn monotonic_in_the_threshold() {
    let pos = Position::from_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    )
    .unwrap();

    let mut list = crate::board::types::MoveList::new();
    crate::board::movegen::generate_moves(
        &pos,
        crate::board::movegen::GenFlags::CAPTURES,
        &mut list,
    );

    for mv in list.iter().filter(|&m| pos.is_legal(m)) {
        let mut prev = pos.see_ge(mv, -1500);
        for threshold in (-1500..=1500).step_by(25) {
            let curr = pos.see_ge(mv, threshold);
            assert!(
                prev || !curr,
                "see_ge not monotonic for {mv} at {threshold}"
            );
            prev = curr;
        }
    }
}
