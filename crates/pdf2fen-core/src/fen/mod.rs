//! Chess pieces, label grids and FEN piece placement.

mod encoder;

pub use encoder::{decode_rank, encode};

use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{ClassificationError, FenError};

/// Piece letters in classifier index order (black lowercase, white uppercase).
pub const PIECE_SYMBOLS: &str = "prbnkqPRBNKQ";

/// Classifier index of the empty-square class.
pub const EMPTY_CLASS: usize = 12;

/// Number of classes the piece classifier distinguishes.
pub const NUM_CLASSES: usize = 13;

/// Rank separator of standard FEN.
pub const RANK_SEPARATOR: char = '/';

/// A chess piece. Discriminants are the classifier's class indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Piece {
    BlackPawn = 0,
    BlackRook,
    BlackBishop,
    BlackKnight,
    BlackKing,
    BlackQueen,
    WhitePawn,
    WhiteRook,
    WhiteBishop,
    WhiteKnight,
    WhiteKing,
    WhiteQueen,
}

impl Piece {
    const ALL: [Piece; 12] = [
        Piece::BlackPawn,
        Piece::BlackRook,
        Piece::BlackBishop,
        Piece::BlackKnight,
        Piece::BlackKing,
        Piece::BlackQueen,
        Piece::WhitePawn,
        Piece::WhiteRook,
        Piece::WhiteBishop,
        Piece::WhiteKnight,
        Piece::WhiteKing,
        Piece::WhiteQueen,
    ];

    /// FEN letter of the piece.
    pub fn symbol(self) -> char {
        PIECE_SYMBOLS.as_bytes()[self as usize] as char
    }

    /// Piece for a FEN letter.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        PIECE_SYMBOLS
            .chars()
            .position(|c| c == symbol)
            .map(|idx| Self::ALL[idx])
    }

    /// Decode a classifier index: `Ok(None)` is the empty square.
    pub fn from_class_index(index: i64) -> Result<Option<Self>, ClassificationError> {
        match usize::try_from(index) {
            Ok(EMPTY_CLASS) => Ok(None),
            Ok(idx) if idx < Self::ALL.len() => Ok(Some(Self::ALL[idx])),
            _ => Err(ClassificationError::InvalidClass(index)),
        }
    }
}

/// Contents of one square.
pub type Square = Option<Piece>;

/// 8x8 grid of classified squares. Rank 0 is the top row of the diagram,
/// file 0 its left column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelGrid {
    ranks: [[Square; 8]; 8],
}

impl LabelGrid {
    /// Grid from explicit ranks.
    pub fn new(ranks: [[Square; 8]; 8]) -> Self {
        Self { ranks }
    }

    /// Grid from 64 row-major classifier indices.
    pub fn from_class_indices(indices: &[i64]) -> Result<Self, ClassificationError> {
        if indices.len() != 64 {
            return Err(ClassificationError::UnexpectedOutput(format!(
                "expected 64 predictions, got {}",
                indices.len()
            )));
        }

        let mut ranks = [[None; 8]; 8];
        for (idx, &class) in indices.iter().enumerate() {
            ranks[idx / 8][idx % 8] = Piece::from_class_index(class)?;
        }
        Ok(Self { ranks })
    }

    /// Ranks, top to bottom.
    pub fn ranks(&self) -> &[[Square; 8]; 8] {
        &self.ranks
    }

    /// Square at `(rank, file)`.
    pub fn get(&self, rank: usize, file: usize) -> Square {
        self.ranks[rank][file]
    }
}

/// A FEN piece-placement field, ranks separated by `/`.
///
/// Every value of this type has 8 ranks of exactly 8 squares each.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FenString(String);

impl FenString {
    /// Validate and wrap a placement string such as `8/8/8/8/8/8/8/8`.
    pub fn parse(placement: &str) -> Result<Self, FenError> {
        let ranks: Vec<&str> = placement.split(RANK_SEPARATOR).collect();
        if ranks.len() != 8 {
            return Err(FenError::RankCount(ranks.len()));
        }
        for (idx, rank) in ranks.iter().enumerate() {
            let squares = rank_width(rank)?;
            if squares != 8 {
                return Err(FenError::RankLength { rank: idx, squares });
            }
        }
        Ok(Self(placement.to_string()))
    }

    /// The placement string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterator over the rank substrings, top to bottom.
    pub fn ranks(&self) -> impl Iterator<Item = &str> {
        self.0.split(RANK_SEPARATOR)
    }

    /// Board editor link: `base` followed by the placement.
    pub fn editor_link(&self, base: &str) -> String {
        format!("{}{}", base, self.0)
    }
}

impl fmt::Display for FenString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FenString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Number of squares a rank substring covers.
pub(crate) fn rank_width(rank: &str) -> Result<usize, FenError> {
    let mut width = 0usize;
    let mut after_digit = false;
    for c in rank.chars() {
        match c {
            '1'..='8' if after_digit => return Err(FenError::AdjacentDigits(rank.to_string())),
            '1'..='8' => {
                width += c.to_digit(10).unwrap_or(0) as usize;
                after_digit = true;
            }
            _ if Piece::from_symbol(c).is_some() => {
                width += 1;
                after_digit = false;
            }
            _ => return Err(FenError::InvalidSymbol(c)),
        }
    }
    Ok(width)
}
