//! FEN parsing and formatting.
//!
//! The parser is tolerant: the two clock fields may be missing and default
//! to 0 and 1, and unknown castling/en-passant tokens degrade to "none"
//! rather than failing the whole string.

use std::fmt;

use super::state::Position;
use super::types::castling::{BLACK_OO, BLACK_OOO, WHITE_OO, WHITE_OOO};
use super::types::{Color, Piece, PieceType, Square};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// The piece-placement field was missing or had an invalid character.
    BadBoard,
    /// A rank described more than eight files.
    RankOverflow,
    /// No king (or more than one) for a side.
    BadKingCount,
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::BadBoard => write!(f, "invalid piece placement field"),
            FenError::RankOverflow => write!(f, "rank describes more than eight files"),
            FenError::BadKingCount => write!(f, "each side needs exactly one king"),
        }
    }
}

impl std::error::Error for FenError {}

impl Position {
    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let mut pos = Position::empty();
        let mut fields = fen.split_whitespace();

        let board_field = fields.next().ok_or(FenError::BadBoard)?;
        let mut rank = 7i32;
        let mut file = 0i32;
        for c in board_field.chars() {
            match c {
                '/' => {
                    rank -= 1;
                    file = 0;
                    if rank < 0 {
                        return Err(FenError::BadBoard);
                    }
                }
                '1'..='8' => {
                    file += c as i32 - '0' as i32;
                    if file > 8 {
                        return Err(FenError::RankOverflow);
                    }
                }
                _ => {
                    let pc = Piece::from_char(c).ok_or(FenError::BadBoard)?;
                    if file >= 8 {
                        return Err(FenError::RankOverflow);
                    }
                    let sq = Square::make(file as u8, rank as u8);
                    pos.board[sq.index()] = pc;
                    pos.by_color[pc.color().index()] |= sq;
                    pos.by_type[pc.piece_type().index()] |= sq;
                    file += 1;
                }
            }
        }

        for color in [Color::White, Color::Black] {
            if pos.pieces_of(color, PieceType::King).count() != 1 {
                return Err(FenError::BadKingCount);
            }
        }

        pos.side_to_move = match fields.next() {
            Some("b") => Color::Black,
            _ => Color::White,
        };

        if let Some(castling) = fields.next() {
            for c in castling.chars() {
                pos.castling_rights |= match c {
                    'K' => WHITE_OO,
                    'Q' => WHITE_OOO,
                    'k' => BLACK_OO,
                    'q' => BLACK_OOO,
                    _ => 0,
                };
            }
        }

        if let Some(ep) = fields.next() {
            pos.ep_square = Square::parse(ep);
        }

        pos.half_move_clock = fields
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let full_move: i32 = fields
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        pos.game_ply =
            (2 * (full_move - 1)).max(0) + i32::from(pos.side_to_move == Color::Black);

        pos.update_attacks_to_kings();
        pos.update_key();
        Ok(pos)
    }

    #[must_use]
    pub fn startpos() -> Position {
        Position::from_fen(START_FEN).expect("start FEN is valid")
    }

    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut out = String::new();

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let pc = self.piece_on(Square::make(file, rank));
                match pc.to_char() {
                    Some(c) => {
                        if empty > 0 {
                            out.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        out.push(c);
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push((b'0' + empty) as char);
            }
            if rank != 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(if self.side_to_move == Color::White { 'w' } else { 'b' });
        out.push(' ');

        if self.castling_rights == 0 {
            out.push('-');
        } else {
            for (bit, c) in [
                (WHITE_OO, 'K'),
                (WHITE_OOO, 'Q'),
                (BLACK_OO, 'k'),
                (BLACK_OOO, 'q'),
            ] {
                if self.castling_rights & bit != 0 {
                    out.push(c);
                }
            }
        }

        match self.ep_square {
            Some(ep) => out.push_str(&format!(" {ep} ")),
            None => out.push_str(" - "),
        }

        let full_move = 1 + (self.game_ply - i32::from(self.side_to_move == Color::Black)) / 2;
        out.push_str(&format!("{} {}", self.half_move_clock, full_move));
        out
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = " +---+---+---+---+---+---+---+---+";
        for rank in (0..8).rev() {
            writeln!(f, "{separator}")?;
            for file in 0..8 {
                let pc = self.piece_on(Square::make(file, rank));
                write!(f, " | {}", pc.to_char().unwrap_or(' '))?;
            }
            writeln!(f, " | {}", rank + 1)?;
        }
        writeln!(f, "{separator}")?;
        writeln!(f, "   a   b   c   d   e   f   g   h")?;
        writeln!(f)?;
        writeln!(f, "Key: {:#018x}", self.key)?;
        write!(f, "FEN: {}", self.to_fen())
    }
}
