//! Thread-local history tables.
//!
//! All of the saturating tables use the same gravity update
//! `h += v - h*|v|/limit`, which keeps values inside ±limit without an
//! explicit clamp.

use crate::board::state::Position;
use crate::board::types::{Color, Move, PIECE_NB};

/// Type index of the piece captured by `mv`: 1..7 for real piece types,
/// 0 when the target square is empty (en passant lands here on purpose).
#[inline]
#[must_use]
pub fn captured_type(pos: &Position, mv: Move) -> usize {
    pos.piece_on(mv.to()).index() & 7
}

pub const CORRHIST_SIZE: usize = 32768;
pub const CORRHIST_LIMIT: i32 = 1024;

const HISTORY_LIMIT: i32 = 16384;

const PIECE_TO: usize = PIECE_NB * 64;

/// `piece * 64 + to` of a move, the shared index of the continuation,
/// counter, and capture tables.
#[inline]
#[must_use]
pub fn piece_to(pos: &Position, mv: Move) -> usize {
    pos.piece_on(mv.from()).index() * 64 + mv.to().index()
}

#[inline]
pub fn add_to_history(entry: &mut i16, value: i32) {
    let h = i32::from(*entry);
    *entry = (h + value - h * value.abs() / HISTORY_LIMIT) as i16;
}

#[inline]
pub fn add_to_corrhist(entry: &mut i16, value: i32) {
    let h = i32::from(*entry);
    *entry = (h + value - h * value.abs() / CORRHIST_LIMIT) as i16;
}

pub struct HistoryTables {
    /// Butterfly history: `[color][from*64+to]`.
    main: Box<[[i16; 4096]; 2]>,
    /// `[piece*64+to][captured type]`.
    capture: Box<[[i16; 8]; PIECE_TO]>,
    /// `[piece*64+to]` of the previous move -> refutation.
    counter: Box<[Move; PIECE_TO]>,
    /// `[is_capture][piece*64+to][piece*64+to]`, flattened.
    cont: Vec<i16>,
    /// `[side to move][pawn key % N]`.
    pawn_corr: Box<[[i16; CORRHIST_SIZE]; 2]>,
    /// `[side to move][non-pawn key % N]`, one table per keyed color.
    non_pawn_corr: [Box<[[i16; CORRHIST_SIZE]; 2]>; 2],
}

impl HistoryTables {
    #[must_use]
    pub fn new() -> HistoryTables {
        HistoryTables {
            main: Box::new([[0; 4096]; 2]),
            capture: vec![[0i16; 8]; PIECE_TO]
                .into_boxed_slice()
                .try_into()
                .unwrap(),
            counter: vec![Move::NONE; PIECE_TO]
                .into_boxed_slice()
                .try_into()
                .unwrap(),
            cont: vec![0; 2 * PIECE_TO * PIECE_TO],
            pawn_corr: Box::new([[0; CORRHIST_SIZE]; 2]),
            non_pawn_corr: [
                Box::new([[0; CORRHIST_SIZE]; 2]),
                Box::new([[0; CORRHIST_SIZE]; 2]),
            ],
        }
    }

    pub fn clear(&mut self) {
        self.main.iter_mut().for_each(|t| t.fill(0));
        self.capture.iter_mut().for_each(|t| t.fill(0));
        self.counter.fill(Move::NONE);
        self.cont.fill(0);
        self.pawn_corr.iter_mut().for_each(|t| t.fill(0));
        for table in &mut self.non_pawn_corr {
            table.iter_mut().for_each(|t| t.fill(0));
        }
    }

    #[inline]
    #[must_use]
    pub fn main_history(&self, color: Color, from_to: usize) -> i32 {
        i32::from(self.main[color.index()][from_to])
    }

    #[inline]
    pub fn update_main(&mut self, color: Color, from_to: usize, bonus: i32) {
        add_to_history(&mut self.main[color.index()][from_to], bonus);
    }

    #[inline]
    #[must_use]
    pub fn capture_history(&self, piece_to: usize, captured: usize) -> i32 {
        i32::from(self.capture[piece_to][captured])
    }

    #[inline]
    pub fn update_capture(&mut self, piece_to: usize, captured: usize, bonus: i32) {
        add_to_history(&mut self.capture[piece_to][captured], bonus);
    }

    #[inline]
    #[must_use]
    pub fn counter_move(&self, piece_to: usize) -> Move {
        self.counter[piece_to]
    }

    #[inline]
    pub fn set_counter_move(&mut self, piece_to: usize, mv: Move) {
        self.counter[piece_to] = mv;
    }

    /// A continuation-history slot: one row of the table, identified by the
    /// (was-capture, piece-to) of an earlier move. Slot `(false, 0)` serves
    /// as the always-zero sentinel for plies with no move.
    #[inline]
    #[must_use]
    fn cont_row(&self, slot: (bool, usize)) -> usize {
        (usize::from(slot.0) * PIECE_TO + slot.1) * PIECE_TO
    }

    #[inline]
    #[must_use]
    pub fn cont_history(&self, slot: (bool, usize), piece_to: usize) -> i32 {
        i32::from(self.cont[self.cont_row(slot) + piece_to])
    }

    #[inline]
    pub fn update_cont(&mut self, slot: (bool, usize), piece_to: usize, bonus: i32) {
        let idx = self.cont_row(slot) + piece_to;
        add_to_history(&mut self.cont[idx], bonus);
    }

    #[inline]
    #[must_use]
    pub fn corrhist_index(key: u64) -> usize {
        (key % CORRHIST_SIZE as u64) as usize
    }

    #[inline]
    #[must_use]
    pub fn pawn_corr(&self, stm: Color, pawn_key: u64) -> i32 {
        i32::from(self.pawn_corr[stm.index()][Self::corrhist_index(pawn_key)])
    }

    #[inline]
    #[must_use]
    pub fn non_pawn_corr(&self, keyed: Color, stm: Color, non_pawn_key: u64) -> i32 {
        i32::from(
            self.non_pawn_corr[keyed.index()][stm.index()][Self::corrhist_index(non_pawn_key)],
        )
    }

    pub fn update_corrhist(&mut self, pos: &Position, bonus: i32) {
        let stm = pos.side_to_move.index();
        add_to_corrhist(
            &mut self.pawn_corr[stm][Self::corrhist_index(pos.pawn_key)],
            bonus,
        );
        for color in [Color::White, Color::Black] {
            add_to_corrhist(
                &mut self.non_pawn_corr[color.index()][stm]
                    [Self::corrhist_index(pos.non_pawn_key[color.index()])],
                bonus,
            );
        }
    }
}

impl Default for HistoryTables {
    fn default() -> Self {
        HistoryTables::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_saturates() {
        let mut entry = 0i16;
        for _ in 0..100 {
            add_to_history(&mut entry, 1277);
        }
        assert!(i32::from(entry) <= HISTORY_LIMIT);
        for _ in 0..200 {
            add_to_history(&mut entry, -1127);
        }
        assert!(i32::from(entry) >= -HISTORY_LIMIT);
    }

    #[test]
    fn corrhist_saturates() {
        let mut entry = 0i16;
        for _ in 0..100 {
            add_to_corrhist(&mut entry, 256);
        }
        assert!(i32::from(entry) <= CORRHIST_LIMIT);
    }
}
