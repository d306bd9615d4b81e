//! Endgame tablebase oracle.
//!
//! The probing format itself is an external concern; this module owns the
//! interface the search drives: the piece-count gate, WDL probes inside the
//! tree, and the root DTZ-style move probe. With no tablebases loaded,
//! `largest()` is zero and every probe misses.

use crate::board::types::Move;
use crate::board::Position;

/// Win/draw/loss from the side to move's perspective.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Wdl {
    Loss,
    Draw,
    Win,
}

#[derive(Default)]
pub struct Tablebases {
    largest: usize,
}

impl Tablebases {
    #[must_use]
    pub fn new() -> Tablebases {
        Tablebases { largest: 0 }
    }

    /// Point the oracle at a tablebase directory. Loading is delegated to
    /// the external probing backend; when none is available this logs and
    /// the engine proceeds without tablebases.
    pub fn set_path(&mut self, path: &str) -> bool {
        if path.is_empty() || path == "<empty>" {
            self.largest = 0;
            return false;
        }
        log::warn!("no tablebase backend available, ignoring SyzygyPath {path}");
        self.largest = 0;
        false
    }

    /// Largest piece count the loaded tables cover; 0 when unloaded.
    #[inline]
    #[must_use]
    pub fn largest(&self) -> usize {
        self.largest
    }

    /// WDL probe for an interior node. `None` outside the tables.
    #[must_use]
    pub fn probe_wdl(&self, pos: &Position) -> Option<Wdl> {
        if self.largest == 0 || pos.occupied().count() as usize > self.largest {
            return None;
        }
        None
    }

    /// Root probe returning the tablebase-best move, used to override the
    /// search's choice in won/lost endings.
    #[must_use]
    pub fn probe_root(&self, pos: &Position) -> Option<Move> {
        if self.largest == 0 || pos.occupied().count() as usize > self.largest {
            return None;
        }
        None
    }
}
