//! The recursive search: negamax with all pruning, reduction, and extension
//! heuristics, plus the tactical quiescence search at the horizon.

use std::sync::atomic::Ordering;

use crate::board::types::{
    Color, Move, Score, MAX_PLY, SCORE_DRAW, SCORE_INFINITE, SCORE_MATE, SCORE_NONE,
    SCORE_TB_LOSS_IN_MAX_PLY, SCORE_TB_WIN, SCORE_TB_WIN_IN_MAX_PLY,
};
use crate::board::{attack_tables, cuckoo, zobrist, Position};
use crate::nnue;
use crate::tb::Wdl;
use crate::tt::{can_use_score, FLAG_EXACT, FLAG_LOWER, FLAG_UPPER, NO_FLAG};

use super::history::{captured_type, piece_to};
use super::movepick::{MovePicker, SearchKind};
use super::params::*;
use super::{lmr_reduction, stat_bonus, stat_malus, SearchThread};

impl SearchThread {
    pub(crate) fn play_null_move(&mut self, pos: &mut Position) {
        let ply = self.ply;
        let ss = self.ss_at_mut(ply);
        ss.cont_hist = (false, 0);
        ss.played_move = Move::NONE;
        ss.played_cap = false;

        self.key_stack[self.key_stack_head] = pos.key;
        self.key_stack_head += 1;
        self.ply += 1;
        pos.do_null_move();
    }

    pub(crate) fn cancel_null_move(&mut self) {
        self.ply -= 1;
        self.key_stack_head -= 1;
    }

    pub(crate) fn play_move(&mut self, pos: &mut Position, mv: Move) {
        self.link.nodes.fetch_add(1, Ordering::Relaxed);

        let is_cap = pos.piece_on(mv.to()).is_some();
        let slot = (is_cap, piece_to(pos, mv));
        let played_cap = !pos.is_quiet(mv);

        let ply = self.ply;
        let ss = self.ss_at_mut(ply);
        ss.cont_hist = slot;
        ss.played_move = mv;
        ss.played_cap = played_cap;

        self.key_stack[self.key_stack_head] = pos.key;
        self.key_stack_head += 1;

        self.accum_head += 1;
        self.ply += 1;

        pos.do_move(mv, &mut self.accum_stack[self.accum_head].dirty);

        let acc = &mut self.accum_stack[self.accum_head];
        acc.updated = [false; 2];
        acc.kings = [
            pos.king_square(Color::White),
            pos.king_square(Color::Black),
        ];
    }

    pub(crate) fn cancel_move(&mut self) {
        self.ply -= 1;
        self.key_stack_head -= 1;
        self.accum_head -= 1;
    }

    /// Bring the head accumulator up to date: walk back to the nearest
    /// updated ancestor and replay patches forward, or rebuild through the
    /// Finny cache when a king crossed a refresh boundary on the way.
    pub(crate) fn update_accumulator(&mut self, pos: &Position) {
        let net = nnue::network();
        let head = self.accum_head;

        for side in [Color::White, Color::Black] {
            if self.accum_stack[head].updated[side.index()] {
                continue;
            }
            let king = self.accum_stack[head].kings[side.index()];

            let mut iter = head;
            loop {
                iter -= 1;

                if nnue::need_refresh(side, self.accum_stack[iter].kings[side.index()], king) {
                    nnue::refresh_from_cache(
                        &mut self.finny,
                        net,
                        pos,
                        &mut self.accum_stack[head],
                        side,
                    );
                    break;
                }

                if self.accum_stack[iter].updated[side.index()] {
                    for i in iter..head {
                        let (parents, rest) = self.accum_stack.split_at_mut(i + 1);
                        rest[0].apply_updates(net, king, side, &parents[i]);
                    }
                    break;
                }
            }
        }
    }

    pub(crate) fn do_evaluation(&mut self, pos: &Position) -> Score {
        self.update_accumulator(pos);
        let acc = &self.accum_stack[self.accum_head];
        nnue::network().evaluate(pos.side_to_move, pos.occupied().count(), acc)
    }

    /// Blend the raw network output with the 50-move scaling and the
    /// correction histories, clamped inside the tablebase bands.
    pub(crate) fn adjust_eval(&self, pos: &Position, eval: Score) -> Score {
        let stm = pos.side_to_move;
        let mut eval = eval * (200 - pos.half_move_clock) / 200;

        eval += PAWN_CH_WEIGHT * self.hist.pawn_corr(stm, pos.pawn_key) / 512;
        eval += NON_PAWN_CH_WEIGHT
            * self.hist.non_pawn_corr(Color::White, stm, pos.non_pawn_key[0])
            / 512;
        eval += NON_PAWN_CH_WEIGHT
            * self.hist.non_pawn_corr(Color::Black, stm, pos.non_pawn_key[1])
            / 512;

        eval.clamp(SCORE_TB_LOSS_IN_MAX_PLY + 1, SCORE_TB_WIN_IN_MAX_PLY - 1)
    }

    fn prev_cont_slots(&self) -> [(bool, usize); 3] {
        [
            self.ss_at(self.ply - 1).cont_hist,
            self.ss_at(self.ply - 2).cont_hist,
            self.ss_at(self.ply - 4).cont_hist,
        ]
    }

    fn get_quiet_history(&self, pos: &Position, mv: Move) -> i32 {
        let ch_index = piece_to(pos, mv);
        self.hist.main_history(pos.side_to_move, mv.from_to())
            + self
                .prev_cont_slots()
                .iter()
                .map(|&slot| self.hist.cont_history(slot, ch_index))
                .sum::<i32>()
    }

    fn get_cap_history(&self, pos: &Position, mv: Move) -> i32 {
        self.hist
            .capture_history(piece_to(pos, mv), captured_type(pos, mv))
    }

    /// Credit the continuation histories of the moves leading to `node_ply`.
    fn add_to_cont_history(&mut self, node_ply: i32, ch_index: usize, bonus: i32) {
        for back in [1, 2, 4, 6] {
            let prev = self.ss_at(node_ply - back);
            if prev.played_move.is_some() {
                let slot = prev.cont_hist;
                self.hist.update_cont(slot, ch_index, bonus);
            }
        }
    }

    /// Fail-high bookkeeping for a quiet best move: counter, killer,
    /// butterfly and continuation bonuses, maluses for the tried quiets.
    fn update_histories(
        &mut self,
        pos: &Position,
        bonus: i32,
        malus: i32,
        best_move: Move,
        quiets: &[Move],
        depth: i32,
    ) {
        let ply = self.ply;

        let prev = self.ss_at(ply - 1).played_move;
        if prev.is_some() {
            let prev_to = prev.to();
            let index = pos.piece_on(prev_to).index() * 64 + prev_to.index();
            self.hist.set_counter_move(index, best_move);
        }

        self.ss_at_mut(ply).killer = best_move;

        // Don't prop up the best move on a quick low-depth cutoff
        if depth <= 3 && quiets.is_empty() {
            return;
        }

        self.hist
            .update_main(pos.side_to_move, best_move.from_to(), bonus);
        self.add_to_cont_history(ply, piece_to(pos, best_move), bonus);

        for &other in quiets {
            self.add_to_cont_history(ply, piece_to(pos, other), -malus);
            self.hist
                .update_main(pos.side_to_move, other.from_to(), -malus);
        }
    }

    /// Could a single legal reversible move take us back to a position
    /// already on the key stack?
    pub(crate) fn has_upcoming_repetition(&self, pos: &Position) -> bool {
        let occupied = pos.occupied();
        let max_dist = (pos.half_move_clock as usize).min(self.key_stack_head);

        let mut i = 3;
        while i <= max_dist {
            let move_key = pos.key ^ self.key_stack[self.key_stack_head - i];

            if let Some(mv) = cuckoo::probe(move_key) {
                let (from, to) = (mv.from(), mv.to());

                // The move must not be obstructed
                if ((attack_tables::between(from, to) ^ to) & occupied).is_empty() {
                    if self.ply as usize > i {
                        return true;
                    }

                    let pc = if pos.piece_on(from).is_some() {
                        pos.piece_on(from)
                    } else {
                        pos.piece_on(to)
                    };

                    if pc.is_some() && pc.color() == pos.side_to_move {
                        // Before the root we want one more repetition
                        let mut j = i + 4;
                        while j <= max_dist {
                            if self.key_stack[self.key_stack_head - j]
                                == self.key_stack[self.key_stack_head - i]
                            {
                                return true;
                            }
                            j += 2;
                        }
                    }
                }
            }
            i += 2;
        }
        false
    }

    /// Two-fold repetition after the root, or three-fold across it.
    /// Not meaningful at the root itself.
    pub(crate) fn is_repetition(&self, pos: &Position) -> bool {
        let max_dist = (pos.half_move_clock as usize).min(self.key_stack_head);
        let mut hit_before_root = false;

        let mut i = 4;
        while i <= max_dist {
            if pos.key == self.key_stack[self.key_stack_head - i] {
                if self.ply as usize >= i || hit_before_root {
                    return true;
                }
                hit_before_root = true;
            }
            i += 2;
        }
        false
    }

    fn update_pv(&mut self, ply: i32, mv: Move) {
        let idx = (ply + super::SS_OFFSET as i32) as usize;
        let (head, tail) = self.ss.split_at_mut(idx + 1);
        let ss = &mut head[idx];
        let child = &tail[0];

        ss.pv_length = child.pv_length;
        ss.pv[ply as usize] = mv;
        for i in (ply as usize + 1)..child.pv_length {
            ss.pv[i] = child.pv[i];
        }
    }

    fn tt_key(&self, pos: &Position) -> u64 {
        pos.key ^ zobrist::fifty(pos.half_move_clock)
    }

    pub(crate) fn qsearch<const IS_PV: bool>(
        &mut self,
        pos: &Position,
        mut alpha: Score,
        beta: Score,
        depth: i32,
    ) -> Score {
        if alpha < SCORE_DRAW && self.has_upcoming_repetition(pos) {
            alpha = SCORE_DRAW;
            if alpha >= beta {
                return alpha;
            }
        }

        if self.is_repetition(pos) || pos.is_50mr_draw() {
            return SCORE_DRAW;
        }

        if self.ply >= MAX_PLY as i32 - 4 {
            return if pos.in_check() {
                SCORE_DRAW
            } else {
                let eval = self.do_evaluation(pos);
                self.adjust_eval(pos, eval)
            };
        }

        let tt_key = self.tt_key(pos);
        let tt = self.ctx.tt.clone();
        let (entry, tt_hit) = tt.probe(tt_key);

        let mut tt_bound = NO_FLAG;
        let mut tt_score = SCORE_NONE;
        let mut tt_move = Move::NONE;
        let mut tt_static_eval = SCORE_NONE;
        let mut tt_pv = false;

        if tt_hit {
            tt_bound = entry.bound();
            tt_score = entry.score(self.ply);
            tt_move = entry.mv();
            tt_static_eval = entry.static_eval();
            tt_pv = entry.was_pv();
        }

        if !IS_PV && tt_score != SCORE_NONE && can_use_score(tt_bound, tt_score, beta) {
            return tt_score;
        }

        let mut best_move = Move::NONE;
        let raw_static_eval;
        let mut best_score;
        let mut futility = SCORE_NONE;

        if pos.in_check() {
            best_score = -SCORE_INFINITE;
            raw_static_eval = SCORE_NONE;
            let ply = self.ply;
            self.ss_at_mut(ply).static_eval = SCORE_NONE;
        } else {
            raw_static_eval = if tt_static_eval != SCORE_NONE {
                tt_static_eval
            } else {
                self.do_evaluation(pos)
            };

            best_score = self.adjust_eval(pos, raw_static_eval);
            let ply = self.ply;
            self.ss_at_mut(ply).static_eval = best_score;

            futility = best_score + QS_FP_MARGIN;

            // With a usable bound, the TT score is a better standing pat
            if tt_score != SCORE_NONE && can_use_score(tt_bound, tt_score, best_score) {
                best_score = tt_score;
            }

            if best_score >= beta {
                if !tt_hit {
                    entry.store(
                        tt_key,
                        NO_FLAG,
                        0,
                        Move::NONE,
                        SCORE_NONE,
                        raw_static_eval,
                        false,
                        self.ply,
                        tt.age(),
                    );
                }
                return (best_score + beta) / 2;
            }
            if best_score > alpha {
                alpha = best_score;
            }
        }

        let mut picker = MovePicker::new(
            SearchKind::QSearch,
            pos,
            tt_move,
            Move::NONE,
            Move::NONE,
            0,
        );
        picker.gen_quiet_checks = depth == 0;

        let prev_slots = self.prev_cont_slots();
        let mut found_legal = false;

        while let Some(mv) = picker.next(pos, &self.hist, &prev_slots, false) {
            self.ctx.tt.prefetch(pos.key_after(mv));

            if !pos.is_legal(mv) {
                continue;
            }
            found_legal = true;

            let is_quiet = pos.is_quiet(mv);

            if best_score > SCORE_TB_LOSS_IN_MAX_PLY {
                if !is_quiet && !pos.in_check() && futility <= alpha && !pos.see_ge(mv, 1) {
                    best_score = best_score.max(futility);
                    continue;
                }

                if !pos.see_ge(mv, QS_SEE_MARGIN) {
                    continue;
                }
            }

            let mut new_pos = *pos;
            self.play_move(&mut new_pos, mv);
            let score = -self.qsearch::<IS_PV>(&new_pos, -beta, -alpha, depth - 1);
            self.cancel_move();

            if score > best_score {
                best_score = score;

                if best_score > alpha {
                    best_move = mv;

                    // Always true in non-PV nodes
                    if best_score >= beta {
                        break;
                    }
                    alpha = best_score;
                }
            }

            // One evasion is enough once we are not losing outright
            if best_score > SCORE_TB_LOSS_IN_MAX_PLY && pos.in_check() && is_quiet {
                break;
            }
        }

        if pos.in_check() && !found_legal {
            return self.ply - SCORE_MATE;
        }

        if best_score >= beta && best_score.abs() < SCORE_TB_WIN_IN_MAX_PLY {
            best_score = (best_score + beta) / 2;
        }

        entry.store(
            tt_key,
            if best_score >= beta { FLAG_LOWER } else { FLAG_UPPER },
            0,
            best_move,
            best_score,
            raw_static_eval,
            tt_pv,
            self.ply,
            tt.age(),
        );

        best_score
    }

    #[allow(clippy::too_many_lines)]
    pub(crate) fn negamax<const IS_PV: bool>(
        &mut self,
        pos: &Position,
        mut alpha: Score,
        mut beta: Score,
        mut depth: i32,
        cut_node: bool,
        excluded: Move,
    ) -> Score {
        let is_root = IS_PV && self.ply == 0;

        self.max_time_counter += 1;
        if self.is_main()
            && self.max_time_counter & 4095 == 0
            && self.elapsed_time() >= self.max_time
        {
            self.stop_search();
        }

        if self.is_stopped() {
            return SCORE_DRAW;
        }

        if IS_PV {
            let ply = self.ply;
            self.ss_at_mut(ply).pv_length = ply as usize;
        }

        if depth <= 0 {
            return self.qsearch::<IS_PV>(pos, alpha, beta, 0);
        }

        if !is_root {
            if alpha < SCORE_DRAW && self.has_upcoming_repetition(pos) {
                alpha = SCORE_DRAW;
                if alpha >= beta {
                    return alpha;
                }
            }

            if self.is_repetition(pos) || pos.is_50mr_draw() {
                return SCORE_DRAW;
            }
        }

        if self.ply >= MAX_PLY as i32 - 4 {
            return if pos.in_check() {
                SCORE_DRAW
            } else {
                let eval = self.do_evaluation(pos);
                self.adjust_eval(pos, eval)
            };
        }

        // Mate distance pruning
        alpha = alpha.max(self.ply - SCORE_MATE);
        beta = beta.min(SCORE_MATE - self.ply - 1);
        if alpha >= beta {
            return alpha;
        }

        let tt_key = self.tt_key(pos);
        let tt = self.ctx.tt.clone();
        let (entry, tt_hit) = tt.probe(tt_key);

        let mut tt_bound = NO_FLAG;
        let mut tt_score = SCORE_NONE;
        let mut tt_move = Move::NONE;
        let mut tt_depth = -1;
        let mut tt_static_eval = SCORE_NONE;
        let mut tt_pv = IS_PV;

        if tt_hit {
            tt_bound = entry.bound();
            tt_score = entry.score(self.ply);
            tt_move = entry.mv();
            tt_depth = entry.depth();
            tt_static_eval = entry.static_eval();
            tt_pv |= entry.was_pv();
        }

        if is_root {
            tt_move = self.root_moves[self.pv_idx].mv;
        }

        let tt_move_noisy = tt_move.is_some() && !pos.is_quiet(tt_move);
        let probcut_beta = beta + PROBCUT_BETA_MARGIN;

        let mut best_move = Move::NONE;
        let mut raw_static_eval = SCORE_NONE;
        let mut best_score = -SCORE_INFINITE;
        let mut max_score = SCORE_INFINITE;

        // The entry might trick us into missing an approaching 50-move
        // draw, hence the clock guard
        if !IS_PV
            && excluded.is_none()
            && tt_score != SCORE_NONE
            && tt_depth >= depth
            && can_use_score(tt_bound, tt_score, beta)
            && pos.half_move_clock < 90
        {
            return tt_score;
        }

        // Tablebase probe
        if !is_root
            && excluded.is_none()
            && pos.occupied().count() as usize <= self.ctx.tb.largest()
        {
            if let Some(wdl) = self.ctx.tb.probe_wdl(pos) {
                self.link.tb_hits.fetch_add(1, Ordering::Relaxed);

                let (tb_score, tb_bound) = match wdl {
                    Wdl::Loss => (self.ply - SCORE_TB_WIN, FLAG_UPPER),
                    Wdl::Win => (SCORE_TB_WIN - self.ply, FLAG_LOWER),
                    Wdl::Draw => (SCORE_DRAW, FLAG_EXACT),
                };

                let cuts = match tb_bound {
                    FLAG_EXACT => true,
                    FLAG_LOWER => tb_score >= beta,
                    _ => tb_score <= alpha,
                };
                if cuts {
                    entry.store(
                        tt_key,
                        tb_bound,
                        depth,
                        Move::NONE,
                        tb_score,
                        SCORE_NONE,
                        tt_pv,
                        self.ply,
                        tt.age(),
                    );
                    return tb_score;
                }

                if IS_PV {
                    if tb_bound == FLAG_LOWER {
                        best_score = tb_score;
                        alpha = alpha.max(best_score);
                    } else {
                        max_score = tb_score;
                    }
                }
            }
        }

        {
            let ply = self.ply;
            self.ss_at_mut(ply + 1).killer = Move::NONE;
        }

        let mut improving = false;
        let in_check = pos.in_check();

        if in_check {
            // No evaluation and no pre-move pruning while in check
            let ply = self.ply;
            self.ss_at_mut(ply).static_eval = SCORE_NONE;
        } else {
            let eval;

            if excluded.is_some() {
                // Already evaluated in the node that started this singular
                // search
                self.update_accumulator(pos);
                raw_static_eval = self.ss_at(self.ply).static_eval;
                eval = raw_static_eval;
            } else {
                if tt_static_eval != SCORE_NONE {
                    raw_static_eval = tt_static_eval;
                    if IS_PV {
                        self.update_accumulator(pos);
                    }
                } else {
                    raw_static_eval = self.do_evaluation(pos);
                }

                let adjusted = self.adjust_eval(pos, raw_static_eval);
                let ply = self.ply;
                self.ss_at_mut(ply).static_eval = adjusted;

                if !tt_hit {
                    // A fresh evaluation: save it so sibling threads that
                    // reach this position skip the network pass
                    entry.store(
                        tt_key,
                        NO_FLAG,
                        0,
                        Move::NONE,
                        SCORE_NONE,
                        raw_static_eval,
                        tt_pv,
                        self.ply,
                        tt.age(),
                    );
                }

                eval = if tt_score != SCORE_NONE && can_use_score(tt_bound, tt_score, adjusted) {
                    tt_score
                } else {
                    adjusted
                };
            }

            // Credit the previous mover when the eval swing says their
            // quiet move was an error
            let (prev_move, prev_cap, prev_eval) = {
                let prev = self.ss_at(self.ply - 1);
                (prev.played_move, prev.played_cap, prev.static_eval)
            };
            if prev_move.is_some() && !prev_cap && prev_eval != SCORE_NONE {
                let their_loss = prev_eval + self.ss_at(self.ply).static_eval - EVAL_HIST_A;
                let bonus = (EVAL_HIST_B * their_loss / 64).clamp(-EVAL_HIST_C, EVAL_HIST_C);
                self.hist
                    .update_main(pos.side_to_move.flip(), prev_move.from_to(), bonus);
            }

            let static_eval = self.ss_at(self.ply).static_eval;
            if self.ss_at(self.ply - 2).static_eval != SCORE_NONE {
                improving = static_eval > self.ss_at(self.ply - 2).static_eval;
            } else if self.ss_at(self.ply - 4).static_eval != SCORE_NONE {
                improving = static_eval > self.ss_at(self.ply - 4).static_eval;
            }

            // Razoring: so far below alpha that only a capture could save
            // us; verify with a qsearch
            if !IS_PV && alpha < 2000 && eval < alpha - RAZORING_DEPTH_MUL * depth {
                let score = self.qsearch::<IS_PV>(pos, alpha, beta, 0);
                if score <= alpha {
                    return score;
                }
            }

            // Reverse futility: so far above beta that some move is bound
            // to keep us there
            if !IS_PV
                && depth <= RFP_MAX_DEPTH
                && eval < SCORE_TB_WIN_IN_MAX_PLY
                && eval - (RFP_DEPTH_MUL * (depth - i32::from(improving))).max(20) >= beta
            {
                return (eval + beta) / 2;
            }

            // Null move: hand over the move and cut off if we are still
            // above beta
            if !IS_PV
                && excluded.is_none()
                && self.ss_at(self.ply - 1).played_move.is_some()
                && eval >= beta
                && static_eval + NMP_A * depth - NMP_B >= beta
                && pos.has_non_pawns(pos.side_to_move)
                && beta > SCORE_TB_LOSS_IN_MAX_PLY
            {
                self.ctx.tt.prefetch(pos.key ^ zobrist::tempo());

                let r = ((eval - beta) / NMP_EVAL_DIV).min(NMP_EVAL_DIV_MIN)
                    + depth / NMP_DEPTH_DIV
                    + NMP_BASE
                    + i32::from(tt_move_noisy);

                let mut new_pos = *pos;
                self.play_null_move(&mut new_pos);
                let score =
                    -self.negamax::<false>(&new_pos, -beta, -beta + 1, depth - r, !cut_node, Move::NONE);
                self.cancel_null_move();

                if score >= beta {
                    return if score < SCORE_TB_WIN_IN_MAX_PLY {
                        score
                    } else {
                        beta
                    };
                }
            }

            // Internal iterative reduction on likely badly-ordered nodes
            if (IS_PV || cut_node) && depth >= 2 + 2 * i32::from(cut_node) && tt_move.is_none() {
                depth -= 1;
            }

            // Probcut: a shallow search already beats beta by a margin, so
            // a capture refutation is almost certainly real
            if !IS_PV
                && excluded.is_none()
                && depth >= 5
                && beta.abs() < SCORE_TB_WIN_IN_MAX_PLY
                && !(tt_depth >= depth - 3 && tt_score != SCORE_NONE && tt_score < probcut_beta)
            {
                let pc_see_margin = (probcut_beta - static_eval) * 10 / 16;
                let visit_tt_move = tt_move_noisy && pos.see_ge(tt_move, pc_see_margin);

                let mut pc_picker = MovePicker::new(
                    SearchKind::ProbCut,
                    pos,
                    if visit_tt_move { tt_move } else { Move::NONE },
                    Move::NONE,
                    Move::NONE,
                    pc_see_margin,
                );

                let prev_slots = self.prev_cont_slots();
                while let Some(mv) = pc_picker.next(pos, &self.hist, &prev_slots, false) {
                    self.ctx.tt.prefetch(pos.key_after(mv));

                    if !pos.is_legal(mv) {
                        continue;
                    }

                    let mut new_pos = *pos;
                    self.play_move(&mut new_pos, mv);

                    let mut score = -self.qsearch::<false>(
                        &new_pos,
                        -probcut_beta,
                        -probcut_beta + 1,
                        0,
                    );

                    if score >= probcut_beta {
                        score = -self.negamax::<false>(
                            &new_pos,
                            -probcut_beta,
                            -probcut_beta + 1,
                            depth - 4,
                            !cut_node,
                            Move::NONE,
                        );
                    }

                    self.cancel_move();

                    if self.is_stopped() {
                        return SCORE_DRAW;
                    }

                    if score >= probcut_beta {
                        entry.store(
                            tt_key,
                            FLAG_LOWER,
                            depth - 3,
                            mv,
                            score,
                            raw_static_eval,
                            tt_pv,
                            self.ply,
                            tt.age(),
                        );
                        return score;
                    }
                }
            }
        }

        // Move loop

        let mut skip_quiets = false;
        let mut seen_moves = 0;

        let mut quiets: Vec<Move> = Vec::with_capacity(32);
        let mut captures: Vec<Move> = Vec::with_capacity(16);

        let counter_move = {
            let prev = self.ss_at(self.ply - 1).played_move;
            if prev.is_some() {
                let prev_to = prev.to();
                self.hist
                    .counter_move(pos.piece_on(prev_to).index() * 64 + prev_to.index())
            } else {
                Move::NONE
            }
        };

        if is_root {
            let ply = self.ply;
            self.ss_at_mut(ply).killer = Move::NONE;
        }

        let killer = self.ss_at(self.ply).killer;
        let mut picker = MovePicker::new(SearchKind::Pvs, pos, tt_move, killer, counter_move, 0);
        let prev_slots = self.prev_cont_slots();

        while let Some(mv) = picker.next(pos, &self.hist, &prev_slots, skip_quiets) {
            if mv == excluded {
                continue;
            }

            self.ctx.tt.prefetch(pos.key_after(mv));

            if !pos.is_legal(mv) {
                continue;
            }

            if is_root && !self.visit_root_move(mv) {
                continue;
            }

            seen_moves += 1;

            let is_quiet = pos.is_quiet(mv);
            let history = if is_quiet {
                self.get_quiet_history(pos, mv)
            } else {
                self.get_cap_history(pos, mv)
            };

            let old_nodes = self.link.nodes.load(Ordering::Relaxed);

            // Move-level pruning
            if !is_root
                && best_score > SCORE_TB_LOSS_IN_MAX_PLY
                && pos.has_non_pawns(pos.side_to_move)
            {
                let lmr_red = lmr_reduction(depth, seen_moves) + i32::from(!improving)
                    - history / EARLY_LMR_HISTORY_DIV;
                let lmr_depth = (depth - lmr_red).max(0);

                let see_margin = if is_quiet {
                    PVS_QUIET_SEE_MARGIN * lmr_depth * lmr_depth
                } else {
                    PVS_CAP_SEE_MARGIN * depth
                };
                if !pos.see_ge(mv, see_margin) {
                    continue;
                }

                if is_quiet && history < HIST_PR_DEPTH_MUL * depth {
                    skip_quiets = true;
                }

                // Late move pruning
                if seen_moves >= (depth * depth + LMP_BASE) / (2 - i32::from(improving)) {
                    skip_quiets = true;
                }

                // Futility
                let static_eval = self.ss_at(self.ply).static_eval;
                if is_quiet
                    && lmr_depth <= FP_MAX_DEPTH
                    && !in_check
                    && static_eval + FP_BASE + FP_DEPTH_MUL * lmr_depth <= alpha
                {
                    skip_quiets = true;
                    continue;
                }
            }

            let mut extension = 0;

            // Singular extension: test whether the TT move is uniquely best
            // by searching everything else under a lowered window
            if !is_root
                && self.ply < 2 * self.root_depth
                && depth >= 5
                && excluded.is_none()
                && mv == tt_move
                && tt_score.abs() < SCORE_TB_WIN_IN_MAX_PLY
                && tt_bound & FLAG_LOWER != 0
                && tt_depth >= depth - 3
            {
                let singular_beta = tt_score - (depth * S_BETA_MARGIN) / 64;

                let se_score = self.negamax::<false>(
                    pos,
                    singular_beta - 1,
                    singular_beta,
                    (depth - 1) / 2,
                    cut_node,
                    mv,
                );

                if se_score < singular_beta {
                    if !IS_PV && se_score < singular_beta - DOUBLE_EXT_MARGIN {
                        extension = 2
                            + i32::from(is_quiet && se_score < singular_beta - TRIPLE_EXT_MARGIN);
                    } else {
                        extension = 1;
                    }
                } else if singular_beta >= beta {
                    // Multicut: several moves beat beta
                    return singular_beta;
                } else if tt_score >= beta {
                    extension = -2 + i32::from(IS_PV);
                } else if cut_node {
                    extension = -2;
                }
            }

            let mut new_pos = *pos;
            self.play_move(&mut new_pos, mv);

            let mut new_depth = depth + extension - 1;
            let mut score = -SCORE_INFINITE;
            let mut pending_cont_bonus = None;

            // Late move reductions
            if depth >= 2 && seen_moves > 1 + 2 * i32::from(is_root) {
                let mut r = lmr_reduction(depth, seen_moves);

                r -= history
                    / if is_quiet {
                        LMR_QUIET_HISTORY_DIV
                    } else {
                        LMR_CAP_HISTORY_DIV
                    };

                r -= i32::from(new_pos.in_check());
                r -= i32::from(tt_depth >= depth);
                r -= i32::from(tt_pv) + i32::from(IS_PV);

                r += i32::from(tt_move_noisy);
                r += i32::from(!improving);
                r += 2 * i32::from(cut_node);

                // Clamp to avoid dropping into qsearch or extending
                let reduced_depth = (new_depth - r).clamp(1, new_depth + 1);

                score = -self.negamax::<false>(&new_pos, -alpha - 1, -alpha, reduced_depth, true, Move::NONE);

                if score > alpha && reduced_depth < new_depth {
                    new_depth += i32::from(score > best_score + ZWS_DEEPER_MARGIN);
                    new_depth -= i32::from(score < best_score + new_depth && !is_root);

                    if reduced_depth < new_depth {
                        score = -self.negamax::<false>(
                            &new_pos,
                            -alpha - 1,
                            -alpha,
                            new_depth,
                            !cut_node,
                            Move::NONE,
                        );
                    }

                    let bonus = if score <= alpha {
                        -stat_malus(new_depth)
                    } else if score >= beta {
                        stat_bonus(new_depth)
                    } else {
                        0
                    };
                    pending_cont_bonus = Some(bonus);
                }
            } else if !IS_PV || seen_moves > 1 {
                score = -self.negamax::<false>(&new_pos, -alpha - 1, -alpha, new_depth, !cut_node, Move::NONE);
            }

            if IS_PV && (seen_moves == 1 || score > alpha) {
                score = -self.negamax::<true>(&new_pos, -beta, -alpha, new_depth, false, Move::NONE);
            }

            self.cancel_move();

            if let Some(bonus) = pending_cont_bonus {
                if bonus != 0 {
                    let ply = self.ply;
                    self.add_to_cont_history(ply, piece_to(pos, mv), bonus);
                }
            }

            if self.is_stopped() {
                return SCORE_DRAW;
            }

            if is_root {
                let new_nodes = self.link.nodes.load(Ordering::Relaxed);
                let pv = self.ss_at(self.ply + 1).clone();
                let rm = self
                    .root_moves
                    .iter_mut()
                    .find(|rm| rm.mv == mv)
                    .expect("searched root move is in the list");
                rm.nodes += new_nodes - old_nodes;

                if seen_moves == 1 || score > alpha {
                    rm.score = score;
                    rm.average_score = if rm.average_score == SCORE_NONE {
                        score
                    } else {
                        (rm.average_score + score) / 2
                    };

                    rm.pv.clear();
                    rm.pv.push(mv);
                    for i in 1..pv.pv_length {
                        rm.pv.push(pv.pv[i]);
                    }
                } else {
                    // An upper bound only; sorting cannot use it
                    rm.score = -SCORE_INFINITE;
                }
            }

            if score > best_score {
                best_score = score;

                if best_score > alpha {
                    best_move = mv;

                    if IS_PV && !is_root {
                        let ply = self.ply;
                        self.update_pv(ply, best_move);
                    }

                    // Always true in non-PV nodes
                    if best_score >= beta {
                        break;
                    }
                    alpha = best_score;
                }
            }

            // Remember tried moves to penalize them on a later fail high
            if mv != best_move {
                if is_quiet {
                    if quiets.len() < 64 {
                        quiets.push(mv);
                    }
                } else if captures.len() < 64 {
                    captures.push(mv);
                }
            }
        }

        if seen_moves == 0 {
            if excluded.is_some() {
                // Do not conjure a stalemate under a singular exclusion
                return alpha;
            }
            return if in_check {
                self.ply - SCORE_MATE
            } else {
                SCORE_DRAW
            };
        }

        // Only in PV nodes could a TB probe leave an upper cap behind
        if IS_PV {
            best_score = best_score.min(max_score);
        }

        if best_score >= beta {
            let boost = i32::from(best_score > beta + STAT_BONUS_BOOST_AT);
            let bonus = stat_bonus(depth + boost);
            let malus = stat_malus(depth + boost);

            if pos.is_quiet(best_move) {
                self.update_histories(pos, bonus, malus, best_move, &quiets, depth);
            } else {
                self.hist.update_capture(
                    piece_to(pos, best_move),
                    captured_type(pos, best_move),
                    bonus,
                );
            }

            for &other in &captures {
                self.hist
                    .update_capture(piece_to(pos, other), captured_type(pos, other), -malus);
            }
        }

        let result_bound = if best_score >= beta {
            FLAG_LOWER
        } else if IS_PV && best_move.is_some() {
            FLAG_EXACT
        } else {
            FLAG_UPPER
        };

        // Correction history: drag future static evals toward the search
        // result when a quiet outcome disagrees with the evaluation
        let best_move_cap = best_move.is_some() && pos.piece_on(best_move.to()).is_some();
        let static_eval = self.ss_at(self.ply).static_eval;
        if !in_check
            && !best_move_cap
            && static_eval != SCORE_NONE
            && can_use_score(result_bound, best_score, static_eval)
        {
            let bonus = ((best_score - static_eval) * depth / 8).clamp(
                -super::history::CORRHIST_LIMIT / 4,
                super::history::CORRHIST_LIMIT / 4,
            );
            self.hist.update_corrhist(pos, bonus);
        }

        if excluded.is_none() && !(is_root && self.pv_idx > 0) {
            entry.store(
                tt_key,
                result_bound,
                depth,
                best_move,
                best_score,
                raw_static_eval,
                tt_pv,
                self.ply,
                tt.age(),
            );
        }

        best_score
    }

    fn visit_root_move(&self, mv: Move) -> bool {
        self.root_moves[self.pv_idx..].iter().any(|rm| rm.mv == mv)
    }
}
