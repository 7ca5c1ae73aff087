//! Label grid to FEN placement, and back for single ranks.

use super::{FenString, LabelGrid, Piece, RANK_SEPARATOR, Square, rank_width};
use crate::error::FenError;

const EMPTY_PLACEHOLDER: char = ' ';

/// Encode a label grid as a FEN piece placement.
///
/// Empty squares are first written as placeholders, then runs of
/// placeholders are replaced by their length, longest runs first. Shorter
/// runs must never be replaced first or an empty rank would come out as
/// `11111111` instead of `8`.
pub fn encode(grid: &LabelGrid) -> Result<FenString, FenError> {
    let mut raw = String::with_capacity(8 * 8 + 7);
    for (j, rank) in grid.ranks().iter().enumerate() {
        for square in rank {
            raw.push(square.map_or(EMPTY_PLACEHOLDER, Piece::symbol));
        }
        if j != 7 {
            raw.push(RANK_SEPARATOR);
        }
    }

    let mut placement = raw;
    for run in (1..=8).rev() {
        let pattern = EMPTY_PLACEHOLDER.to_string().repeat(run);
        placement = placement.replace(&pattern, &run.to_string());
    }

    let checked = check_placement(&placement);
    debug_assert!(
        checked.is_ok(),
        "encoder produced invalid placement {placement:?}: {checked:?}"
    );
    checked?;

    Ok(FenString(placement))
}

fn check_placement(placement: &str) -> Result<(), FenError> {
    if placement.contains(EMPTY_PLACEHOLDER) {
        return Err(FenError::InvalidSymbol(EMPTY_PLACEHOLDER));
    }
    let mut count = 0;
    for (rank, text) in placement.split(RANK_SEPARATOR).enumerate() {
        let squares = rank_width(text)?;
        if squares != 8 {
            return Err(FenError::RankLength { rank, squares });
        }
        count += 1;
    }
    if count != 8 {
        return Err(FenError::RankCount(count));
    }
    Ok(())
}

/// Expand one rank substring back into its 8 squares.
pub fn decode_rank(rank: &str) -> Result<[Square; 8], FenError> {
    let mut squares = [None; 8];
    let mut file = 0usize;
    let mut after_digit = false;

    for c in rank.chars() {
        let (piece, width) = match c {
            '1'..='8' if after_digit => return Err(FenError::AdjacentDigits(rank.to_string())),
            '1'..='8' => (None, c.to_digit(10).unwrap_or(0) as usize),
            _ => (
                Some(Piece::from_symbol(c).ok_or(FenError::InvalidSymbol(c))?),
                1,
            ),
        };
        if file + width > 8 {
            return Err(FenError::RankLength {
                rank: 0,
                squares: file + width,
            });
        }
        if piece.is_some() {
            squares[file] = piece;
        }
        after_digit = piece.is_none();
        file += width;
    }

    if file != 8 {
        return Err(FenError::RankLength {
            rank: 0,
            squares: file,
        });
    }
    Ok(squares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::{EMPTY_CLASS, LabelGrid};
    use pretty_assertions::assert_eq;

    const P: Square = Some(Piece::WhitePawn);
    const E: Square = None;

    fn grid_with_rank(rank: [Square; 8]) -> LabelGrid {
        let mut ranks = [[None; 8]; 8];
        ranks[0] = rank;
        LabelGrid::new(ranks)
    }

    fn starting_position() -> LabelGrid {
        let back = |s: &str| -> [Square; 8] {
            let mut rank = [None; 8];
            for (i, c) in s.chars().enumerate() {
                rank[i] = Piece::from_symbol(c);
            }
            rank
        };
        LabelGrid::new([
            back("rnbqkbnr"),
            back("pppppppp"),
            [None; 8],
            [None; 8],
            [None; 8],
            [None; 8],
            back("PPPPPPPP"),
            back("RNBQKBNR"),
        ])
    }

    #[test]
    fn test_empty_board() {
        let grid = LabelGrid::from_class_indices(&[EMPTY_CLASS as i64; 64]).unwrap();
        assert_eq!(encode(&grid).unwrap().as_str(), "8/8/8/8/8/8/8/8");
    }

    #[test]
    fn test_alternating_rank() {
        let fen = encode(&grid_with_rank([P, E, P, E, P, E, P, E])).unwrap();
        assert_eq!(fen.ranks().next(), Some("P1P1P1P1"));
    }

    #[test]
    fn test_mixed_runs() {
        let k = Some(Piece::BlackKing);
        let fen = encode(&grid_with_rank([E, E, E, k, E, E, E, E])).unwrap();
        assert_eq!(fen.ranks().next(), Some("3k4"));

        let fen = encode(&grid_with_rank([E, E, E, E, E, E, E, P])).unwrap();
        assert_eq!(fen.ranks().next(), Some("7P"));
    }

    #[test]
    fn test_starting_position() {
        let fen = encode(&starting_position()).unwrap();
        assert_eq!(fen.as_str(), "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR");
        assert_eq!(
            fen.editor_link("https://lichess.org/editor/"),
            "https://lichess.org/editor/rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR"
        );
    }

    #[test]
    fn test_every_rank_covers_eight_squares() {
        // Deterministic pseudo-random boards.
        let mut state = 0x2545_f491_u32;
        for _ in 0..200 {
            let indices: Vec<i64> = (0..64)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    (state % 13) as i64
                })
                .collect();
            let grid = LabelGrid::from_class_indices(&indices).unwrap();
            let fen = encode(&grid).unwrap();

            for (rank_idx, rank) in fen.ranks().enumerate() {
                assert_eq!(rank_width(rank).unwrap(), 8);
                assert_eq!(decode_rank(rank).unwrap(), grid.ranks()[rank_idx]);
            }
        }
    }

    #[test]
    fn test_decode_rank() {
        assert_eq!(decode_rank("P1P1P1P1").unwrap(), [P, E, P, E, P, E, P, E]);
        assert_eq!(decode_rank("8").unwrap(), [E; 8]);
        assert!(decode_rank("9").is_err());
        assert!(decode_rank("7").is_err());
        assert!(decode_rank("PPPPPPPPP").is_err());
        assert!(decode_rank("4z3").is_err());
        assert_eq!(
            decode_rank("44"),
            Err(FenError::AdjacentDigits("44".to_string()))
        );
    }
}
