//! The engine protocol loop and the glue that turns commands into search
//! settings.

mod bench;
pub mod options;

use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

use crate::board::movegen::{self, GenFlags};
use crate::board::types::{
    Color, Move, MoveList, Score, SCORE_INFINITE, SCORE_MATE, SCORE_MATE_IN_MAX_PLY,
};
use crate::board::{self, Position, START_FEN};
use crate::nnue::{self, DirtyPieces};
use crate::search::Settings;
use crate::tb::Tablebases;
use crate::threads::ThreadPool;
use crate::tt::TranspositionTable;

use options::UciOptions;

pub const ENGINE_NAME: &str = "Umbra";
pub const ENGINE_VERSION: &str = "0.9";
pub const ENGINE_AUTHOR: &str = "the Umbra authors";

/// Internal scores are rescaled so that "cp 100" roughly means one pawn.
#[must_use]
pub fn normalize_to_cp(score: Score) -> i32 {
    100 * score / 240
}

#[must_use]
pub fn score_to_string(score: Score) -> String {
    debug_assert!(-SCORE_INFINITE < score && score < SCORE_INFINITE);

    if score.abs() < SCORE_MATE_IN_MAX_PLY {
        format!("cp {}", normalize_to_cp(score))
    } else if score > 0 {
        format!("mate {}", (SCORE_MATE - score + 1) / 2)
    } else {
        format!("mate {}", (-SCORE_MATE - score) / 2)
    }
}

fn next_number(tokens: &mut std::str::SplitWhitespace) -> i64 {
    tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0)
}

/// Find the generated move matching a coordinate-notation token.
#[must_use]
pub fn string_to_move(pos: &Position, token: &str) -> Option<Move> {
    let token = token.to_ascii_lowercase();
    let mut moves = MoveList::new();
    movegen::generate_moves(pos, GenFlags::ALL, &mut moves);
    let found = moves.iter().find(|mv| mv.to_string() == token);
    found
}

pub struct Engine {
    pool: ThreadPool,
    tt: Arc<TranspositionTable>,
    tb: Arc<Tablebases>,
    options: UciOptions,
    position: Position,
    prev_positions: Vec<u64>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Engine {
        let options = UciOptions::default();
        Engine {
            pool: ThreadPool::new(options.threads),
            tt: Arc::new(TranspositionTable::new(options.hash_mb)),
            tb: Arc::new(Tablebases::new()),
            options,
            position: Position::startpos(),
            prev_positions: Vec::new(),
        }
    }

    /// Read commands until `quit`. When `args` is non-empty it is run as a
    /// single command instead.
    pub fn main_loop(&mut self, args: &[String]) {
        println!("{ENGINE_NAME} {ENGINE_VERSION} by {ENGINE_AUTHOR}");

        if !args.is_empty() {
            let cmd = args.join(" ");
            self.handle(&cmd);
            self.pool.wait_for_search_finished();
            return;
        }

        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if !self.handle(&line) {
                break;
            }
        }
        self.pool.wait_for_search_finished();
    }

    /// Dispatch one command line; false means quit.
    fn handle(&mut self, line: &str) -> bool {
        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else {
            return true;
        };

        match command {
            "quit" | "stop" => {
                self.pool.stop_search();
                self.pool.wait_for_search_finished();
                return command != "quit";
            }
            "uci" => {
                println!("id name {ENGINE_NAME} {ENGINE_VERSION}");
                println!("id author {ENGINE_AUTHOR}");
                self.options.print();
                println!("uciok");
            }
            "isready" => println!("readyok"),
            "ucinewgame" => self.new_game(),
            "setoption" => self.setoption(&mut tokens),
            "position" => self.position_cmd(&mut tokens),
            "go" => self.go(&mut tokens),
            "d" => println!("{}", self.position),
            "eval" => self.eval_cmd(),
            "bench" => self.bench(),
            _ => {
                if !command.starts_with('#') {
                    log::info!("ignoring unknown command {command}");
                    println!("Unknown command: '{line}'.");
                }
            }
        }
        true
    }

    fn new_game(&mut self) {
        self.pool.wait_for_search_finished();
        self.tt.clear(self.options.threads);
        self.pool.reset_histories();
    }

    fn setoption(&mut self, tokens: &mut std::str::SplitWhitespace) {
        let mut name = String::new();
        let mut value = String::new();

        let mut in_value = false;
        let mut first = tokens.next();
        // Skip the leading "name" token
        if first == Some("name") {
            first = tokens.next();
        }
        let mut token = first;
        while let Some(t) = token {
            if t == "value" {
                in_value = true;
            } else if in_value {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(t);
            } else {
                if !name.is_empty() {
                    name.push(' ');
                }
                name.push_str(t);
            }
            token = tokens.next();
        }

        match name.to_ascii_lowercase().as_str() {
            "hash" => {
                if let Ok(mb) = value.parse::<usize>() {
                    let mb = mb.clamp(1, options::MAX_HASH_MB);
                    self.pool.wait_for_search_finished();
                    self.options.hash_mb = mb;
                    self.tt = Arc::new(TranspositionTable::new(mb));
                }
            }
            "threads" => {
                if let Ok(n) = value.parse::<usize>() {
                    let n = n.clamp(1, options::MAX_THREADS);
                    self.options.threads = n;
                    self.pool.set_thread_count(n);
                }
            }
            "move overhead" => {
                if let Ok(ms) = value.parse::<i64>() {
                    self.options.move_overhead = ms.clamp(0, 1000);
                }
            }
            "multipv" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.options.multi_pv = n.max(1);
                }
            }
            "clear hash" => {
                self.pool.wait_for_search_finished();
                self.tt.clear(self.options.threads);
            }
            "minimal" => self.options.minimal = value == "true",
            "syzygypath" => {
                self.options.syzygy_path = value.clone();
                let mut tb = Tablebases::new();
                if tb.set_path(&value) {
                    println!("info string Syzygy tablebases loaded. Pieces: {}", tb.largest());
                } else if !value.is_empty() && value != "<empty>" {
                    println!("info string Syzygy tablebases failed to load");
                }
                self.tb = Arc::new(tb);
            }
            _ => println!("No such option: {name}"),
        }
    }

    fn position_cmd(&mut self, tokens: &mut std::str::SplitWhitespace) {
        let fen = match tokens.next() {
            Some("startpos") => {
                // Consume the "moves" token, if any
                let _ = tokens.next();
                START_FEN.to_string()
            }
            Some("fen") => {
                let mut fen = String::new();
                for t in tokens.by_ref() {
                    if t == "moves" {
                        break;
                    }
                    if !fen.is_empty() {
                        fen.push(' ');
                    }
                    fen.push_str(t);
                }
                fen
            }
            _ => return,
        };

        let pos = match Position::from_fen(&fen) {
            Ok(pos) => pos,
            Err(err) => {
                log::warn!("rejecting FEN {fen:?}: {err}");
                return;
            }
        };
        self.position = pos;

        self.prev_positions.clear();
        self.prev_positions.push(self.position.key);

        let mut dp = DirtyPieces::default();
        for token in tokens {
            let Some(mv) = string_to_move(&self.position, token) else {
                break;
            };
            self.position.do_move(mv, &mut dp);

            // A reset of the clock makes everything before irrelevant for
            // repetition detection
            if self.position.half_move_clock == 0 {
                self.prev_positions.clear();
            }
            self.prev_positions.push(self.position.key);
        }

        // The last entry equals the current position
        self.prev_positions.pop();
    }

    fn go(&mut self, tokens: &mut std::str::SplitWhitespace) {
        let start_time = Instant::now();
        let mut settings = Settings::new(self.position);
        settings.start_time = start_time;
        settings.prev_positions = self.prev_positions.clone();
        settings.multi_pv = self.options.multi_pv;
        settings.move_overhead = self.options.move_overhead;
        settings.minimal = self.options.minimal;

        let mut perft_depth = 0u32;

        while let Some(token) = tokens.next() {
            match token {
                "wtime" => settings.time[Color::White.index()] = next_number(tokens),
                "btime" => settings.time[Color::Black.index()] = next_number(tokens),
                "winc" => settings.inc[Color::White.index()] = next_number(tokens),
                "binc" => settings.inc[Color::Black.index()] = next_number(tokens),
                "movestogo" => settings.movestogo = next_number(tokens) as i32,
                "depth" => settings.depth = (next_number(tokens) as i32).max(1),
                "nodes" => settings.nodes = next_number(tokens).max(0) as u64,
                "movetime" => settings.movetime = next_number(tokens),
                "perft" => perft_depth = next_number(tokens).max(0) as u32,
                other => log::debug!("ignoring go token {other}"),
            }
        }

        self.pool.wait_for_search_finished();

        if perft_depth > 0 {
            let begin = Instant::now();
            let nodes = board::perft_divide(&self.position, perft_depth);
            let took = begin.elapsed().as_millis().max(1);
            println!("nodes: {nodes}");
            println!("time: {took}");
            println!("nps: {}", nodes as u128 * 1000 / took);
            return;
        }

        self.tt.next_search();
        self.pool
            .start_search(settings, Arc::clone(&self.tt), Arc::clone(&self.tb));
    }

    fn eval_cmd(&mut self) {
        let net = nnue::network();
        let mut acc = nnue::Accumulator::default();
        acc.refresh(net, &self.position, Color::White);
        acc.refresh(net, &self.position, Color::Black);

        let mut eval = net.evaluate(
            self.position.side_to_move,
            self.position.occupied().count(),
            &acc,
        );
        if self.position.side_to_move == Color::Black {
            eval = -eval;
        }
        println!(
            "Evaluation: {}  (not normalized: {eval})",
            normalize_to_cp(eval)
        );
    }

    fn bench(&mut self) {
        let old_minimal = self.options.minimal;
        self.options.minimal = true;

        self.new_game();

        let mut total_nodes = 0u64;
        let mut elapsed_ms = 0u128;

        for fen in bench::BENCH_POSITIONS {
            let Ok(pos) = Position::from_fen(fen) else {
                continue;
            };

            let mut settings = Settings::new(pos);
            settings.depth = bench::BENCH_DEPTH;
            settings.minimal = true;
            settings.move_overhead = self.options.move_overhead;

            let begin = Instant::now();
            self.tt.next_search();
            self.pool
                .start_search(settings, Arc::clone(&self.tt), Arc::clone(&self.tb));
            self.pool.wait_for_search_finished();

            elapsed_ms += begin.elapsed().as_millis();
            total_nodes += self.pool.total_nodes();
        }

        println!(
            "{total_nodes} nodes {} nps",
            total_nodes as u128 * 1000 / elapsed_ms.max(1)
        );

        self.options.minimal = old_minimal;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
