//! Implements `ZobristArrays`.

/// Tables for calculating Zobrist hashes.
///
/// Zobrist hashing is a technique to transform a board position into
/// a number of a fixed length, with an equal distribution over all
/// possible numbers, invented by Albert Zobrist. The key property of
/// this method is that two similar positions generate entirely
/// different hash numbers.
pub struct ZobristArrays {
    /// The constant with which the hash value should be XOR-ed when
    /// the side to move changes.
    pub to_move: u64,

    /// Constants with which the hash value should be XOR-ed when a
    /// piece of given color on a given square appears/disappears.
    pub pieces: [[[u64; 64]; 6]; 2],

    /// Constants with which the hash value should be XOR-ed, for the
    /// old and the new castling rights on each move.
    ///
    /// Indexed by the full 4-bit flag set, not by individual flags.
    pub castling_rights: [u64; 16],

    /// Constants with which the hash value should be XOR-ed, for the
    /// old and the new en-passant file on each move (a value between
    /// 0 and 7). Indexes between 8 and 15 point to zeroes, so hashing
    /// the "no en-passant file" sentinel is a no-op.
    pub enpassant_file: [u64; 16],
}

impl ZobristArrays {
    /// Creates and initializes a new instance.
    fn new() -> ZobristArrays {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng: StdRng = SeedableRng::seed_from_u64(0x9E3779B97F4A7C15);

        let to_move = rng.gen();
        let mut pieces = [[[0; 64]; 6]; 2];
        let mut castling_rights = [0; 16];
        let mut enpassant_file = [0; 16];

        for color in 0..2 {
            for piece in 0..6 {
                for square in 0..64 {
                    pieces[color][piece][square] = rng.gen();
                }
            }
        }

        for value in 0..16 {
            castling_rights[value] = rng.gen();
        }

        for file in 0..8 {
            enpassant_file[file] = rng.gen();
        }

        ZobristArrays {
            to_move,
            pieces,
            castling_rights,
            enpassant_file,
        }
    }

    /// Returns a reference to an initialized `ZobristArrays` object.
    ///
    /// The object is created only during the first call. All next
    /// calls will return a reference to the same object.
    pub fn get() -> &'static ZobristArrays {
        lazy_static! {
            static ref ARRAYS: ZobristArrays = ZobristArrays::new();
        }
        &ARRAYS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_distinct() {
        let z = ZobristArrays::get();
        assert_eq!(z.to_move, ZobristArrays::get().to_move);
        assert!(z.to_move != 0);
        assert!(z.pieces[0][0][0] != z.pieces[1][0][0]);
        assert!(z.pieces[0][3][17] != z.pieces[0][3][18]);
        for file in 8..16 {
            assert_eq!(z.enpassant_file[file], 0);
        }
    }
}
