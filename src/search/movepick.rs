//! Staged move picker.
//!
//! Emits the TT move first, then winning captures by exchange-and-history
//! score, the killer and counter refutations, history-ordered quiets, and
//! finally the losing captures. Each stage falls through to the next; a
//! move handed out by an early stage is never emitted again.

use crate::board::movegen::{self, GenFlags};
use crate::board::state::Position;
use crate::board::types::{piece_value, Move, MoveKind, MoveList};

use super::history::{captured_type, piece_to, HistoryTables};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Pvs,
    QSearch,
    ProbCut,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    TtMove,
    GenCaptures,
    GoodCaptures,
    Killer,
    Counter,
    GenQuiets,
    Quiets,
    BadCaptures,
    GenQuietChecks,
    QuietChecks,
    Done,
}

/// Promotion ordering: queens first, knights speculative, the rest buried.
const PROMO_SCORES: [i32; 8] = [0, 0, 200_000, -300_000, -200_000, 300_000, 0, 0];

const BAD_CAPTURE_PENALTY: i32 = 500_000;

pub struct MovePicker {
    kind: SearchKind,
    stage: Stage,

    tt_move: Move,
    killer: Move,
    counter: Move,
    see_margin: i32,

    /// In quiescence at depth zero, also emit non-captures that give check.
    pub gen_quiet_checks: bool,

    captures: MoveList,
    quiets: MoveList,
    cap_index: usize,
    quiet_index: usize,
}

impl MovePicker {
    #[must_use]
    pub fn new(
        kind: SearchKind,
        pos: &Position,
        tt_move: Move,
        killer: Move,
        counter: Move,
        see_margin: i32,
    ) -> MovePicker {
        let stage = if pos.is_pseudo_legal(tt_move) {
            Stage::TtMove
        } else {
            Stage::GenCaptures
        };

        // tt, killer, and counter must all be distinct
        let killer = if killer == tt_move { Move::NONE } else { killer };
        let counter = if counter == tt_move || counter == killer {
            Move::NONE
        } else {
            counter
        };

        MovePicker {
            kind,
            stage,
            tt_move,
            killer,
            counter,
            see_margin,
            gen_quiet_checks: false,
            captures: MoveList::new(),
            quiets: MoveList::new(),
            cap_index: 0,
            quiet_index: 0,
        }
    }

    fn score_captures(&mut self, pos: &Position, hist: &HistoryTables) {
        let mut i = 0;
        while i < self.captures.len() {
            let mv = self.captures[i].mv;

            if mv == self.tt_move {
                self.captures.remove(i);
                continue;
            }

            if self.kind == SearchKind::ProbCut && !pos.see_ge(mv, self.see_margin) {
                self.captures.remove(i);
                continue;
            }

            let mut score = 0;
            if mv.kind() == MoveKind::Promotion {
                score += PROMO_SCORES[mv.promo_type().index()];
            } else {
                if self.kind != SearchKind::ProbCut && !pos.see_ge(mv, 0) {
                    score -= BAD_CAPTURE_PENALTY;
                }
                let captured_value = if mv.kind() == MoveKind::EnPassant {
                    piece_value(crate::board::types::Piece::W_PAWN)
                } else {
                    piece_value(pos.piece_on(mv.to()))
                };
                score += captured_value * 64;
                score += hist.capture_history(piece_to(pos, mv), captured_type(pos, mv));
            }

            self.captures[i].score = score;
            i += 1;
        }
    }

    fn score_quiets(
        &mut self,
        pos: &Position,
        hist: &HistoryTables,
        prev_slots: &[(bool, usize); 3],
    ) {
        let stm = pos.side_to_move;
        let mut i = 0;
        while i < self.quiets.len() {
            let mv = self.quiets[i].mv;

            if mv == self.tt_move || mv == self.killer || mv == self.counter {
                self.quiets.remove(i);
                continue;
            }

            let ch_index = piece_to(pos, mv);
            self.quiets[i].score = hist.main_history(stm, mv.from_to())
                + prev_slots
                    .iter()
                    .map(|&slot| hist.cont_history(slot, ch_index))
                    .sum::<i32>();
            i += 1;
        }
    }

    /// Selection sort step: swap the best-scored remaining move to `index`
    /// and return it.
    fn pick(list: &mut MoveList, index: usize) -> Move {
        let mut best = index;
        for i in index + 1..list.len() {
            if list[i].score > list[best].score {
                best = i;
            }
        }
        list.swap(index, best);
        list[index].mv
    }

    /// The next move to try, or `None` when the stages are exhausted.
    /// `skip_quiets`, once passed, should stay sticky at the call site.
    pub fn next(
        &mut self,
        pos: &Position,
        hist: &HistoryTables,
        prev_slots: &[(bool, usize); 3],
        skip_quiets: bool,
    ) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.stage = Stage::GenCaptures;
                    return Some(self.tt_move);
                }

                Stage::GenCaptures => {
                    movegen::generate_moves(pos, GenFlags::CAPTURES, &mut self.captures);
                    self.score_captures(pos, hist);
                    self.stage = Stage::GoodCaptures;
                }

                Stage::GoodCaptures => {
                    if self.cap_index < self.captures.len() {
                        let best = Self::pick(&mut self.captures, self.cap_index);
                        let score = self.captures[self.cap_index].score;
                        if self.kind == SearchKind::ProbCut || score > 0 {
                            self.cap_index += 1;
                            return Some(best);
                        }
                    }

                    match self.kind {
                        SearchKind::ProbCut => {
                            self.stage = Stage::Done;
                        }
                        SearchKind::QSearch if !pos.in_check() => {
                            self.stage = if self.gen_quiet_checks {
                                Stage::GenQuietChecks
                            } else {
                                Stage::Done
                            };
                        }
                        _ => self.stage = Stage::Killer,
                    }
                }

                Stage::Killer => {
                    if skip_quiets {
                        self.stage = Stage::BadCaptures;
                        continue;
                    }
                    self.stage = Stage::Counter;
                    if pos.is_quiet(self.killer) && pos.is_pseudo_legal(self.killer) {
                        return Some(self.killer);
                    }
                }

                Stage::Counter => {
                    if skip_quiets {
                        self.stage = Stage::BadCaptures;
                        continue;
                    }
                    self.stage = Stage::GenQuiets;
                    if pos.is_quiet(self.counter) && pos.is_pseudo_legal(self.counter) {
                        return Some(self.counter);
                    }
                }

                Stage::GenQuiets => {
                    if skip_quiets {
                        self.stage = Stage::BadCaptures;
                        continue;
                    }
                    movegen::generate_moves(pos, GenFlags::QUIETS, &mut self.quiets);
                    self.score_quiets(pos, hist, prev_slots);
                    self.stage = Stage::Quiets;
                }

                Stage::Quiets => {
                    if skip_quiets {
                        self.stage = Stage::BadCaptures;
                        continue;
                    }
                    if self.quiet_index < self.quiets.len() {
                        let mv = Self::pick(&mut self.quiets, self.quiet_index);
                        self.quiet_index += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::BadCaptures;
                }

                Stage::BadCaptures => {
                    // Whatever captures remain lost their exchange
                    if self.cap_index < self.captures.len() {
                        let mv = Self::pick(&mut self.captures, self.cap_index);
                        self.cap_index += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::GenQuietChecks => {
                    movegen::generate_quiet_checks(pos, &mut self.quiets);
                    self.score_quiets(pos, hist, prev_slots);
                    self.stage = Stage::QuietChecks;
                }

                Stage::QuietChecks => {
                    if self.quiet_index < self.quiets.len() {
                        let mv = Self::pick(&mut self.quiets, self.quiet_index);
                        self.quiet_index += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;
    use crate::search::history::HistoryTables;
    use crate::uci::string_to_move;

    fn drain(picker: &mut MovePicker, pos: &Position) -> Vec<Move> {
        let hist = HistoryTables::new();
        let slots = [(false, 0); 3];
        let mut out = Vec::new();
        while let Some(mv) = picker.next(pos, &hist, &slots, false) {
            out.push(mv);
        }
        out
    }

    #[test]
    fn tt_move_comes_first_and_only_once() {
        crate::init();
        let pos = Position::startpos();
        let tt_move = string_to_move(&pos, "e2e4").unwrap();

        let mut picker =
            MovePicker::new(SearchKind::Pvs, &pos, tt_move, Move::NONE, Move::NONE, 0);
        let moves = drain(&mut picker, &pos);

        assert_eq!(moves[0], tt_move);
        assert_eq!(moves.iter().filter(|&&m| m == tt_move).count(), 1);
    }

    #[test]
    fn emits_every_move_exactly_once() {
        crate::init();
        let pos = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();

        let mut picker =
            MovePicker::new(SearchKind::Pvs, &pos, Move::NONE, Move::NONE, Move::NONE, 0);
        let picked = drain(&mut picker, &pos);

        let mut generated = MoveList::new();
        movegen::generate_moves(&pos, GenFlags::ALL, &mut generated);

        assert_eq!(picked.len(), generated.len());
        for mv in generated.iter() {
            assert_eq!(
                picked.iter().filter(|&&m| m == mv).count(),
                1,
                "move {mv} not emitted exactly once"
            );
        }
    }

    #[test]
    fn winning_capture_leads_losing_capture_trails() {
        crate::init();

        // Undefended pawn: the capture is a good one and comes first
        let pos = Position::from_fen("1k6/8/8/4p3/8/8/4R3/1K6 w - - 0 1").unwrap();
        let mut picker =
            MovePicker::new(SearchKind::Pvs, &pos, Move::NONE, Move::NONE, Move::NONE, 0);
        let moves = drain(&mut picker, &pos);
        assert_eq!(moves[0], string_to_move(&pos, "e2e5").unwrap());

        // Defended pawn: same capture now loses the exchange and goes last
        let pos = Position::from_fen("1k6/8/5p2/4p3/8/8/4R3/1K6 w - - 0 1").unwrap();
        let mut picker =
            MovePicker::new(SearchKind::Pvs, &pos, Move::NONE, Move::NONE, Move::NONE, 0);
        let moves = drain(&mut picker, &pos);
        assert_eq!(*moves.last().unwrap(), string_to_move(&pos, "e2e5").unwrap());
    }

    #[test]
    fn skip_quiets_jumps_to_bad_captures() {
        crate::init();
        let pos = Position::from_fen("1k6/8/5p2/4p3/8/8/4R3/1K6 w - - 0 1").unwrap();

        let hist = HistoryTables::new();
        let slots = [(false, 0); 3];
        let mut picker =
            MovePicker::new(SearchKind::Pvs, &pos, Move::NONE, Move::NONE, Move::NONE, 0);

        let mut out = Vec::new();
        while let Some(mv) = picker.next(&pos, &hist, &slots, true) {
            out.push(mv);
        }

        // Only the losing capture survives the skip
        assert_eq!(out.len(), 1);
        assert!(pos.piece_on(out[0].to()).is_some());
    }

    #[test]
    fn quiescence_without_check_stops_after_captures() {
        crate::init();
        let pos = Position::from_fen("1k6/8/5p2/4p3/8/8/4R3/1K6 w - - 0 1").unwrap();

        let mut picker =
            MovePicker::new(SearchKind::QSearch, &pos, Move::NONE, Move::NONE, Move::NONE, 0);
        let moves = drain(&mut picker, &pos);

        // The only capture is a losing one; quiescence sees nothing good
        assert!(moves.is_empty());
    }
}
