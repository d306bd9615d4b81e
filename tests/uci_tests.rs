//! Protocol-facing formatting and parsing.

use umbra::board::types::{SCORE_MATE, SCORE_TB_WIN};
use umbra::board::Position;
use umbra::uci::{normalize_to_cp, score_to_string, string_to_move};

#[test]
fn scores_format_as_cp_or_mate() {
    umbra::init();

    assert_eq!(score_to_string(0), "cp 0");
    assert_eq!(score_to_string(240), "cp 100");
    assert_eq!(score_to_string(-240), "cp -100");

    assert_eq!(score_to_string(SCORE_MATE - 1), "mate 1");
    assert_eq!(score_to_string(SCORE_MATE - 3), "mate 2");
    assert_eq!(score_to_string(-(SCORE_MATE - 2)), "mate -1");

    // Tablebase scores stay in centipawn form
    assert!(score_to_string(SCORE_TB_WIN - 10).starts_with("cp "));
}

#[test]
fn normalization_is_linear() {
    assert_eq!(normalize_to_cp(480), 200);
    assert_eq!(normalize_to_cp(-480), -200);
}

#[test]
fn move_parsing_round_trips() {
    umbra::init();
    let pos = Position::startpos();

    for token in ["e2e4", "g1f3", "b1c3", "a2a3"] {
        let mv = string_to_move(&pos, token).expect("legal opening move");
        assert_eq!(mv.to_string(), token);
    }

    assert!(string_to_move(&pos, "e2e5").is_none());
    assert!(string_to_move(&pos, "e7e5").is_none());
    assert!(string_to_move(&pos, "nonsense").is_none());
}

#[test]
fn promotion_and_castling_notation() {
    umbra::init();

    let pos = Position::from_fen("n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1").unwrap();
    let mv = string_to_move(&pos, "g2g1q").expect("queen promotion");
    assert_eq!(mv.to_string(), "g2g1q");
    assert!(string_to_move(&pos, "g2g1n").is_some());

    let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let short = string_to_move(&pos, "e1g1").expect("short castle");
    assert_eq!(short.to_string(), "e1g1");
    let long = string_to_move(&pos, "e1c1").expect("long castle");
    assert_eq!(long.to_string(), "e1c1");
}
