//! Colors, piece types, and packed pieces.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Side to move / piece ownership.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Color {
    White = 0,
    Black = 1,
}

impl Color {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub const fn flip(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_index(i: usize) -> Color {
        if i == 0 {
            Color::White
        } else {
            Color::Black
        }
    }
}

/// Piece kind, independent of color. Values start at 1 so that a packed
/// [`Piece`] of 0 means "empty square".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PieceType {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceType {
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub const fn from_index(i: usize) -> PieceType {
        match i {
            1 => PieceType::Pawn,
            2 => PieceType::Knight,
            3 => PieceType::Bishop,
            4 => PieceType::Rook,
            5 => PieceType::Queen,
            _ => PieceType::King,
        }
    }
}

/// A piece packed as `color << 3 | type`, with 0 meaning empty.
///
/// The packed form doubles as the index into the Zobrist piece-square keys
/// and the history tables, so it is kept as a raw byte rather than an
/// `Option<(Color, PieceType)>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Piece(u8);

/// Number of packed piece codes (two color blocks of 8).
pub const PIECE_NB: usize = 16;

impl Piece {
    pub const NONE: Piece = Piece(0);

    pub const W_PAWN: Piece = Piece::new(Color::White, PieceType::Pawn);
    pub const W_KING: Piece = Piece::new(Color::White, PieceType::King);
    pub const B_PAWN: Piece = Piece::new(Color::Black, PieceType::Pawn);
    pub const B_KING: Piece = Piece::new(Color::Black, PieceType::King);

    #[inline]
    #[must_use]
    pub const fn new(color: Color, pt: PieceType) -> Piece {
        Piece(((color as u8) << 3) | pt as u8)
    }

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// Color of a non-empty piece.
    #[inline]
    #[must_use]
    pub const fn color(self) -> Color {
        Color::from_index((self.0 >> 3) as usize)
    }

    /// Type of a non-empty piece.
    #[inline]
    #[must_use]
    pub const fn piece_type(self) -> PieceType {
        PieceType::from_index((self.0 & 7) as usize)
    }

    /// Packed code, usable as a table index in `0..PIECE_NB`.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// FEN character, or `None` for an empty piece.
    #[must_use]
    pub fn to_char(self) -> Option<char> {
        if self.is_none() {
            return None;
        }
        let c = match self.piece_type() {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        };
        Some(match self.color() {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        })
    }

    /// Parse a FEN piece character.
    #[must_use]
    pub fn from_char(c: char) -> Option<Piece> {
        let pt = match c.to_ascii_lowercase() {
            'p' => PieceType::Pawn,
            'n' => PieceType::Knight,
            'b' => PieceType::Bishop,
            'r' => PieceType::Rook,
            'q' => PieceType::Queen,
            'k' => PieceType::King,
            _ => return None,
        };
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Piece::new(color, pt))
    }
}

impl fmt::Debug for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_char() {
            Some(c) => write!(f, "Piece({c})"),
            None => write!(f, "Piece(-)"),
        }
    }
}

/// Piece values used by static exchange evaluation and capture ordering,
/// indexed by packed piece code.
pub const PIECE_VALUE: [i32; PIECE_NB] = [
    0, 100, 370, 390, 610, 1210, 0, 0, //
    0, 100, 370, 390, 610, 1210, 0, 0,
];

#[inline]
#[must_use]
pub const fn piece_value(pc: Piece) -> i32 {
    PIECE_VALUE[pc.index()]
}
