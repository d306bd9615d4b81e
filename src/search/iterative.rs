//! Iterative deepening driver: aspiration windows, root move bookkeeping,
//! per-iteration time management, and the final best-thread vote.

use std::sync::atomic::Ordering;

use crate::board::movegen::{self, GenFlags};
use crate::board::types::{
    Move, MoveList, Score, SCORE_DRAW, SCORE_INFINITE, SCORE_MATE, SCORE_MATE_IN_MAX_PLY,
    SCORE_NONE, SCORE_TB_LOSS_IN_MAX_PLY, SCORE_TB_WIN_IN_MAX_PLY,
};
use crate::threads::RootLine;
use crate::uci;

use super::params::*;
use super::{timeman, RootMove, SearchInfo, SearchThread};

/// One worker's full search, from depth 1 until a stop condition. The main
/// worker additionally coordinates the finish and announces the move.
pub(super) fn start_search(t: &mut SearchThread) {
    let settings = t.ctx.settings.clone();
    let root_pos = settings.position;

    // Fresh accumulators and mirror cache for this search
    let net = crate::nnue::network();
    t.accum_head = 0;
    for side in [
        crate::board::types::Color::White,
        crate::board::types::Color::Black,
    ] {
        t.accum_stack[0].refresh(net, &root_pos, side);
    }
    for half in t.finny.iter_mut() {
        for entry in half.iter_mut() {
            entry.reset(net);
        }
    }

    // Only the last hundred keys can ever matter under the 50-move rule
    t.key_stack_head = 0;
    let tail = settings.prev_positions.len().saturating_sub(100);
    for &key in &settings.prev_positions[tail..] {
        t.key_stack[t.key_stack_head] = key;
        t.key_stack_head += 1;
    }

    t.max_time = i64::MAX / 2;
    t.optimum_time = i64::MAX / 2;
    if settings.standard_time_limit() {
        let (optimum, maximum) = timeman::calc_optimum_time(&settings, root_pos.side_to_move);
        t.optimum_time = optimum;
        t.max_time = t.max_time.min(maximum);
    }
    if settings.movetime > 0 {
        t.max_time = t.max_time.min(settings.movetime - settings.move_overhead);
    }

    t.ply = 0;
    t.max_time_counter = 0;
    for ss in &mut t.ss {
        *ss = SearchInfo::default();
    }

    // Root moves
    t.root_moves.clear();
    let mut pseudo = MoveList::new();
    movegen::generate_moves(&root_pos, GenFlags::ALL, &mut pseudo);
    for mv in pseudo.iter() {
        if root_pos.is_legal(mv) {
            t.root_moves.push(RootMove::new(mv));
        }
    }

    if t.root_moves.is_empty() {
        // Mate or stalemate on the board; nothing to search
        if t.is_main() {
            t.stop_search();
            wait_for_helpers(t);
            let score = if root_pos.in_check() {
                -SCORE_MATE
            } else {
                SCORE_DRAW
            };
            println!("info depth 0 score {}", uci::score_to_string(score));
            println!("bestmove {}", Move::NONE);
        }
        return;
    }

    let mut tb_best_move = Move::NONE;
    if t.is_main() && root_pos.occupied().count() as usize <= t.ctx.tb.largest() {
        if let Some(mv) = t.ctx.tb.probe_root(&root_pos) {
            tb_best_move = mv;
        }
    }

    t.multi_pv = settings.multi_pv.clamp(1, t.root_moves.len());

    let mut natural_exit = true;
    let mut id_prev_move = Move::NONE;
    let mut id_prev_score = SCORE_NONE;
    let mut stability = 0i32;

    'deepening: for root_depth in 1..=settings.depth {
        t.root_depth = root_depth;

        // With a forced move, search a little for the analysis output and
        // then bail
        if root_depth > 10 && t.root_moves.len() == 1 {
            break;
        }

        for pv_idx in 0..t.multi_pv {
            t.pv_idx = pv_idx;

            let mut window = ASP_WINDOW_START_DELTA;
            let mut alpha = -SCORE_INFINITE;
            let mut beta = SCORE_INFINITE;
            let mut fail_high_count = 0;

            if root_depth >= ASP_WINDOW_START_DEPTH {
                alpha = (t.root_moves[pv_idx].score - window).max(-SCORE_INFINITE);
                beta = (t.root_moves[pv_idx].score + window).min(SCORE_INFINITE);
            }

            loop {
                let adjusted_depth = (root_depth - fail_high_count).max(1);
                let score =
                    t.negamax::<true>(&root_pos, alpha, beta, adjusted_depth, false, Move::NONE);

                // Root scores are only updated while the search is running,
                // so the sorted list is usable at any time
                sort_root_moves(t, pv_idx);

                if t.is_stopped() {
                    natural_exit = false;
                    break 'deepening;
                }

                if score <= alpha {
                    beta = (alpha + beta) / 2;
                    alpha = (score - window).max(-SCORE_INFINITE);
                    fail_high_count = 0;
                } else if score >= beta {
                    beta = (score + window).min(SCORE_INFINITE);
                    if score < 2000 {
                        fail_high_count += 1;
                    }
                } else {
                    break;
                }

                if settings.nodes > 0 && t.ctx.total_nodes() >= settings.nodes {
                    natural_exit = false;
                    break 'deepening;
                }

                window += window / 3;
            }

            sort_root_moves(t, 0);
        }

        t.link.complete_depth.store(root_depth, Ordering::Relaxed);
        publish_lines(t);

        if settings.nodes > 0 && t.ctx.total_nodes() >= settings.nodes {
            natural_exit = false;
            break;
        }

        if !t.is_main() {
            continue;
        }

        if !settings.minimal {
            for i in 0..t.multi_pv {
                print_info_line(t, root_depth, i, t.root_moves[i].score, &pv_string(&t.root_moves[i]));
            }
        }

        if t.elapsed_time() >= t.max_time {
            break;
        }

        let best_move = t.root_moves[0].mv;
        let score = t.root_moves[0].score;

        stability = if best_move == id_prev_move {
            (stability + 1).min(8)
        } else {
            0
        };

        if settings.standard_time_limit() && root_depth >= 4 {
            let bm_nodes = t
                .root_moves
                .iter()
                .find(|rm| rm.mv == best_move)
                .map_or(0, |rm| rm.nodes);
            let my_nodes = t.link.nodes.load(Ordering::Relaxed).max(1);
            let not_best_nodes = 1.0 - bm_nodes as f64 / my_nodes as f64;

            let nodes_factor =
                TM_NODES_BASE as f64 / 100.0 + not_best_nodes * TM_NODES_MUL as f64 / 100.0;
            let stability_factor =
                TM_STABILITY_BASE as f64 / 100.0 - f64::from(stability) * TM_STABILITY_MUL as f64 / 100.0;

            let score_loss = TM_SCORE_LOSS_BASE as f64 / 100.0
                + TM_SCORE_LOSS_ID_MUL as f64 / 1000.0 * f64::from(id_prev_score - score)
                + TM_SCORE_LOSS_PREV_MUL as f64 / 1000.0
                    * f64::from(t.search_prev_score - score);
            let score_factor = score_loss.clamp(
                TM_SCORE_FACTOR_MIN as f64 / 100.0,
                TM_SCORE_FACTOR_MAX as f64 / 100.0,
            );

            if t.elapsed_time() as f64
                > stability_factor * nodes_factor * score_factor * t.optimum_time as f64
            {
                break;
            }
        }

        id_prev_move = best_move;
        id_prev_score = score;
    }

    publish_lines(t);

    if !t.is_main() {
        return;
    }

    t.stop_search();
    wait_for_helpers(t);

    let (best_index, best_depth, best_lines) = select_best_thread(t);

    if !natural_exit || best_index != t.index || settings.minimal {
        for (i, line) in best_lines.iter().take(t.multi_pv).enumerate() {
            if line.score != SCORE_NONE {
                print_info_line(t, best_depth, i, line.score, &line_pv_string(line));
            }
        }
    }

    t.search_prev_score = best_lines[0].score;

    let announced = if tb_best_move.is_some() && t.search_prev_score.abs() < SCORE_MATE_IN_MAX_PLY
    {
        tb_best_move
    } else {
        best_lines[0].mv
    };
    println!("bestmove {announced}");
}

/// Stable selection sort of the root moves by score, from `offset` down.
fn sort_root_moves(t: &mut SearchThread, offset: usize) {
    for i in offset..t.root_moves.len() {
        let mut best = i;
        for j in i + 1..t.root_moves.len() {
            if t.root_moves[j].score > t.root_moves[best].score {
                best = j;
            }
        }
        if best != i {
            t.root_moves.swap(i, best);
        }
    }
}

fn publish_lines(t: &SearchThread) {
    let lines: Vec<RootLine> = t
        .root_moves
        .iter()
        .take(t.multi_pv)
        .map(|rm| RootLine {
            mv: rm.mv,
            score: rm.score,
            pv: rm.pv.clone(),
        })
        .collect();
    *t.link.lines.lock() = lines;
}

fn wait_for_helpers(t: &SearchThread) {
    for (i, link) in t.ctx.workers.iter().enumerate() {
        if i != t.index {
            link.wait_idle();
        }
    }
}

/// Vote-based best-thread selection: every completed worker's favorite move
/// collects votes weighted by score margin and completed depth. Mate scores
/// win outright; hopeless scores do not get to vote.
fn select_best_thread(t: &SearchThread) -> (usize, i32, Vec<RootLine>) {
    let workers = &t.ctx.workers;

    let snapshots: Vec<(usize, i32, Vec<RootLine>)> = workers
        .iter()
        .enumerate()
        .map(|(i, link)| {
            (
                i,
                link.complete_depth.load(Ordering::Relaxed),
                link.lines.lock().clone(),
            )
        })
        .filter(|(_, depth, lines)| *depth > 0 && !lines.is_empty())
        .collect();

    let own = (
        t.index,
        t.root_depth,
        t.root_moves
            .iter()
            .take(t.multi_pv)
            .map(|rm| RootLine {
                mv: rm.mv,
                score: rm.score,
                pv: rm.pv.clone(),
            })
            .collect::<Vec<_>>(),
    );

    if t.root_moves.len() <= 1 || workers.len() <= 1 || snapshots.len() <= 1 {
        return own;
    }

    let min_score = snapshots
        .iter()
        .map(|(_, _, lines)| lines[0].score)
        .min()
        .unwrap_or(SCORE_NONE);

    let mut votes: std::collections::HashMap<u16, i64> = std::collections::HashMap::new();
    for (_, depth, lines) in &snapshots {
        *votes.entry(lines[0].mv.raw()).or_insert(0) +=
            i64::from(lines[0].score - min_score + 9) * i64::from(*depth);
    }

    let mut best = snapshots
        .iter()
        .find(|(i, _, _)| *i == t.index)
        .cloned()
        .unwrap_or(own);

    for snap in &snapshots {
        if snap.0 == best.0 {
            continue;
        }
        let curr_score = snap.2[0].score;
        let curr_vote = votes.get(&snap.2[0].mv.raw()).copied().unwrap_or(0);
        let best_score = best.2[0].score;
        let best_vote = votes.get(&best.2[0].mv.raw()).copied().unwrap_or(0);

        if best_score.abs() >= SCORE_TB_WIN_IN_MAX_PLY {
            if curr_score > best_score {
                best = snap.clone();
            }
        } else if curr_score >= SCORE_TB_WIN_IN_MAX_PLY {
            best = snap.clone();
        } else if curr_score > SCORE_TB_LOSS_IN_MAX_PLY && curr_vote > best_vote {
            best = snap.clone();
        }
    }

    best
}

fn pv_string(rm: &RootMove) -> String {
    rm.pv
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn line_pv_string(line: &RootLine) -> String {
    line.pv
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_info_line(t: &SearchThread, depth: i32, pv_idx: usize, score: Score, pv: &str) {
    let elapsed = t.elapsed_time().max(1);
    let nodes = t.ctx.total_nodes();
    println!(
        "info depth {} multipv {} score {} nodes {} nps {} hashfull {} tbhits {} time {} pv {}",
        depth,
        pv_idx + 1,
        uci::score_to_string(score),
        nodes,
        nodes * 1000 / elapsed as u64,
        t.ctx.tt.hashfull(),
        t.ctx.total_tb_hits(),
        elapsed,
        pv
    );
}
