//! Incrementally-updated evaluation network.
//!
//! The hidden layer is a per-side sum of feature weights, patched move by
//! move from a [`DirtyPieces`] record and rebuilt from the Finny mirror
//! cache when a king crosses a bucket or board half. The forward pass
//! squares a clipped hidden layer against per-bucket output weights.

mod accumulator;
mod network;
mod simd;

pub use accumulator::{
    need_refresh, refresh_from_cache, Accumulator, FinnyEntry, FinnyTable,
};
pub use network::{network, set_network, Network, NetworkError};

use crate::board::types::{Piece, Square};

pub const FEATURES_WIDTH: usize = 768;
pub const HIDDEN_WIDTH: usize = 1536;

pub const KING_BUCKETS: usize = 2;
pub const OUTPUT_BUCKETS: usize = 8;

pub const NETWORK_SCALE: i32 = 400;
pub const NETWORK_QA: i32 = 255;
pub const NETWORK_QB: i32 = 64;

/// King bucket per relative king square: the back two ranks share a bucket,
/// everything else the other.
#[rustfmt::skip]
pub const KING_BUCKETS_SCHEME: [usize; 64] = [
    0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
    1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1,
];

/// A piece landing on or leaving a square.
#[derive(Clone, Copy)]
pub struct SquarePiece {
    pub sq: Square,
    pub pc: Piece,
}

impl Default for SquarePiece {
    fn default() -> Self {
        SquarePiece {
            sq: Square::A1,
            pc: Piece::NONE,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyKind {
    #[default]
    Normal,
    Capture,
    Castling,
}

/// What a move changed on the board, in accumulator terms: one sub + one add
/// for a normal move, an extra sub for a capture, two of each for castling.
#[derive(Clone, Copy, Default)]
pub struct DirtyPieces {
    pub kind: DirtyKind,
    pub sub0: SquarePiece,
    pub add0: SquarePiece,
    pub sub1: SquarePiece,
    pub add1: SquarePiece,
}
