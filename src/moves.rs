//! Defines the data structure describing chess moves.

use std::fmt;
use crate::board::*;
use crate::files::file;
use crate::ranks::rank;

/// Encodes the minimum needed information that unambiguously
/// describes a move.
///
/// `Move` is a `u16` number. It is laid out the following way:
///
///  ```text
///   15                                                           0
///  +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
///  |   |   |   |   |   |   |   |   |   |   |   |   |   |   |   |   |
///  |  Promoted     |   Destination square  |     Origin square     |
///  |  piece        |        6 bits         |        6 bits         |
///  |  4 bits       |   |   |   |   |   |   |   |   |   |   |   |   |
///  |   |   |   |   |   |   |   |   |   |   |   |   |   |   |   |   |
///  +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
///  ```
///
/// The "promoted piece" field contains `PIECE_NONE` for moves that
/// are not pawn promotions, so the raw value of a real move is never
/// zero. The all-zero value is reserved for `Move::NULL`, which is
/// used in places where a move is required but none is available.
///
/// Castling is encoded as the king's two-file move (`e1g1`, `e1c1`,
/// `e8g8`, `e8c8`), en-passant as the capturing pawn's diagonal move
/// to the passing square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Move(u16);

impl Move {
    /// An invalid move.
    pub const NULL: Move = Move(0);

    /// Creates a new instance.
    #[inline]
    pub fn new(orig_square: Square, dest_square: Square) -> Move {
        Move::with_promotion(orig_square, dest_square, PIECE_NONE)
    }

    /// Creates a new pawn promotion instance.
    ///
    /// `promotion` must be a piece between `KNIGHT` and `QUEEN`, or
    /// `PIECE_NONE` for moves that do not promote.
    #[inline]
    pub fn with_promotion(orig_square: Square, dest_square: Square, promotion: PieceType) -> Move {
        debug_assert!(orig_square <= 63);
        debug_assert!(dest_square <= 63);
        debug_assert!(promotion != PAWN && promotion != KING);
        debug_assert!(promotion <= PIECE_NONE);
        Move((orig_square | dest_square << 6 | promotion << 12) as u16)
    }

    /// Returns the origin square of the played piece.
    #[inline]
    pub fn orig_square(self) -> Square {
        (self.0 & 0b111111) as Square
    }

    /// Returns the destination square for the played piece.
    #[inline]
    pub fn dest_square(self) -> Square {
        (self.0 >> 6 & 0b111111) as Square
    }

    /// Returns the piece the move promotes to, or `PIECE_NONE`.
    #[inline]
    pub fn promotion(self) -> PieceType {
        (self.0 >> 12) as PieceType
    }

    /// Returns whether the move is a pawn promotion.
    #[inline]
    pub fn is_promotion(self) -> bool {
        self.promotion() != PIECE_NONE
    }

    /// Tries to interpret a string as a move.
    ///
    /// The expected format is two algebraic squares, followed by an
    /// optional promotion piece letter (`n`, `b`, `r`, or `q`).
    /// Examples: `e2e4`, `e1g1` (white short castling), `e7e8q` (for
    /// promotion). Returns `Move::NULL` if the string can not be
    /// interpreted.
    pub fn from_str(s: &str) -> Move {
        let b = s.as_bytes();
        if b.len() < 4 || b.len() > 5 {
            return Move::NULL;
        }
        let orig_square = match parse_square_bytes(b[0], b[1]) {
            Some(x) => x,
            None => return Move::NULL,
        };
        let dest_square = match parse_square_bytes(b[2], b[3]) {
            Some(x) => x,
            None => return Move::NULL,
        };
        if b.len() == 4 {
            return Move::new(orig_square, dest_square);
        }
        match piece_from_char(b[4] as char) {
            Some(p) if p >= KNIGHT && p <= QUEEN => {
                Move::with_promotion(orig_square, dest_square, p)
            }
            _ => Move::NULL,
        }
    }

    /// Returns the algebraic notation of the move.
    pub fn notation(self) -> String {
        format!("{}{}{}",
                square_notation(self.orig_square()),
                square_notation(self.dest_square()),
                if self.is_promotion() {
                    piece_to_char(self.promotion()).to_string()
                } else {
                    String::new()
                })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.notation())
    }
}

/// Returns the algebraic notation for a given square.
pub fn square_notation(square: Square) -> &'static str {
    lazy_static! {
        static ref NOTATION: Vec<String> = (0..64)
            .map(|i| format!("{}{}",
                             ["a", "b", "c", "d", "e", "f", "g", "h"][file(i)],
                             ["1", "2", "3", "4", "5", "6", "7", "8"][rank(i)]))
            .collect();
    }
    NOTATION[square].as_str()
}

/// Parses square's algebraic notation (lowercase only).
#[inline]
fn parse_square_bytes(file_byte: u8, rank_byte: u8) -> Option<Square> {
    if (b'a'..=b'h').contains(&file_byte) && (b'1'..=b'8').contains(&rank_byte) {
        Some(((rank_byte - b'1') * 8 + (file_byte - b'a')) as Square)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::*;
    use crate::squares::*;

    #[test]
    fn encoding() {
        let m = Move::new(E2, E4);
        assert_eq!(m.orig_square(), E2);
        assert_eq!(m.dest_square(), E4);
        assert_eq!(m.promotion(), PIECE_NONE);
        assert!(!m.is_promotion());
        assert!(m != Move::NULL);
        let p = Move::with_promotion(F7, F8, QUEEN);
        assert_eq!(p.orig_square(), F7);
        assert_eq!(p.dest_square(), F8);
        assert_eq!(p.promotion(), QUEEN);
        assert!(p.is_promotion());
    }

    #[test]
    fn notation() {
        assert_eq!(Move::new(E2, E4).notation(), "e2e4");
        assert_eq!(Move::new(E1, G1).notation(), "e1g1");
        assert_eq!(Move::with_promotion(A7, A8, KNIGHT).notation(), "a7a8n");
        assert_eq!(Move::from_str("e2e4"), Move::new(E2, E4));
        assert_eq!(Move::from_str("e7e8q"), Move::with_promotion(E7, E8, QUEEN));
        assert_eq!(Move::from_str("e7e8k"), Move::NULL);
        assert_eq!(Move::from_str("e7e9"), Move::NULL);
        assert_eq!(Move::from_str("xyz"), Move::NULL);
        assert_eq!(Move::from_str("e2e4qq"), Move::NULL);
    }

    #[test]
    fn real_moves_are_never_null() {
        assert!(Move::new(A1, A1) != Move::NULL);
        assert!(Move::new(A1, B1) != Move::NULL);
    }
}
