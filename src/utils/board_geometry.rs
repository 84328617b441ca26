//! Implements `BoardGeometry`.

use crate::bitsets::*;
use crate::board::{Bitboard, PieceType, Square, BISHOP, KING, KNIGHT, PAWN, QUEEN, ROOK, WHITE};

/// Tables and methods useful for move generation and attack
/// calculation.
pub struct BoardGeometry {
    /// Contains bitboards with all squares lying strictly between two
    /// squares.
    ///
    /// The two squares must lie on the same rank, file, diagonal, or
    /// anti-diagonal, otherwise the bitboard is empty. The two
    /// squares themselves are never included.
    ///
    /// # Examples:
    ///
    /// ```text
    /// g.squares_between[B2][F6]
    /// . . . . . . . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// . . . . 1 . . .
    /// . . . 1 . . . .
    /// . . 1 . . . . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// ```
    pub squares_between: [[Bitboard; 64]; 64],

    /// Contains bitboards with all squares lying at the line
    /// determined by two squares.
    ///
    /// # Examples:
    ///
    /// ```text
    /// g.squares_at_line[B2][F6]
    /// . . . . . . . 1
    /// . . . . . . 1 .
    /// . . . . . 1 . .
    /// . . . . 1 . . .
    /// . . . 1 . . . .
    /// . . 1 . . . . .
    /// . 1 . . . . . .
    /// 1 . . . . . . .
    /// ```
    pub squares_at_line: [[Bitboard; 64]; 64],

    /// Contains bitboards with the squares attacked by a pawn from a
    /// given square.
    ///
    /// # Examples:
    ///
    /// ```text
    /// g.pawn_attacks[WHITE][F6]
    /// . . . . . . . .
    /// . . . . 1 . 1 .
    /// . . . . . P . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// ```
    pub pawn_attacks: [[Bitboard; 64]; 2],

    knight_attacks: [Bitboard; 64],
    king_attacks: [Bitboard; 64],
    slider_attacks: Vec<Bitboard>,
    bishop_params: [SliderParams; 64],
    rook_params: [SliderParams; 64],
}

impl BoardGeometry {
    /// Creates and initializes a new instance.
    fn new() -> BoardGeometry {
        let mut bg = BoardGeometry {
            squares_between: [[0; 64]; 64],
            squares_at_line: [[0; 64]; 64],
            pawn_attacks: [[0; 64]; 2],
            knight_attacks: [0; 64],
            king_attacks: [0; 64],
            slider_attacks: vec![0; SLIDER_ATTACKS_SIZE],
            bishop_params: [SliderParams { offset: 0, mask: 0 }; 64],
            rook_params: [SliderParams { offset: 0, mask: 0 }; 64],
        };

        // Fill `bg.squares_at_line`.
        for a in 0..64 {
            let lines = [bb_file(a), bb_rank(a), bb_diag(a), bb_anti_diag(a)];
            for b in a + 1..64 {
                for line in lines.iter() {
                    if *line & (1 << b) != 0 {
                        bg.squares_at_line[a][b] = *line;
                        bg.squares_at_line[b][a] = *line;
                        break;
                    }
                }
            }
        }

        // Fill `bg.squares_between`. For two aligned squares, the
        // squares reachable from both of them (with the other one as
        // the only blocker) are exactly the squares strictly between
        // them.
        for a in 0..64 {
            for b in 0..64 {
                let occupied = 1 << a | 1 << b;
                let from_a = bb_rook_attacks(a, occupied) | bb_bishop_attacks(a, occupied);
                let from_b = bb_rook_attacks(b, occupied) | bb_bishop_attacks(b, occupied);
                bg.squares_between[a][b] = from_a & from_b & bg.squares_at_line[a][b];
            }
        }

        // Fill `bg.pawn_attacks`, `bg.knight_attacks`, and
        // `bg.king_attacks`.
        const PAWN_SHIFTS: [[isize; 2]; 2] = [[7, 9], [-9, -7]];
        for us in 0..2 {
            for a in 0..64 {
                bg.pawn_attacks[us][a] = (gen_shift(1 << a, PAWN_SHIFTS[us][0]) & !BB_FILE_H) |
                                         (gen_shift(1 << a, PAWN_SHIFTS[us][1]) & !BB_FILE_A);
            }
        }
        const KNIGHT_DIRS: [Direction; 8] = [DIR_NNE, DIR_ENE, DIR_ESE, DIR_SSE, DIR_SSW,
                                             DIR_WSW, DIR_WNW, DIR_NNW];
        const KING_DIRS: [Direction; 8] = [DIR_N, DIR_NE, DIR_E, DIR_SE, DIR_S, DIR_SW, DIR_W,
                                           DIR_NW];
        for a in 0..64 {
            for d in KNIGHT_DIRS.iter() {
                bg.knight_attacks[a] |= shift(1 << a, *d, WHITE);
            }
            for d in KING_DIRS.iter() {
                bg.king_attacks[a] |= shift(1 << a, *d, WHITE);
            }
        }

        // Initialize the sliding piece attack tables.
        //
        // For every chess engine it is very important to be able to
        // very quickly find the attacking sets for all pieces, from
        // all possible origin squares, and all possible board
        // occupations. For the sliding pieces (bishop, rook, queen)
        // this is done with a masked-occupancy index into one big
        // packed table:
        //
        // 1. For each square, the "relevant" occupancy bits are the
        //    attack rays with the board edges stripped. For a rook on
        //    A1 those are A2-A7 and B1-G1.
        //
        // 2. At query time the relevant bits of the current occupancy
        //    are extracted and packed together into a dense index (a
        //    bit-parallel extract).
        //
        // 3. The index, added to the square's offset, points into the
        //    packed table of pre-calculated attack sets.
        let offset = bg.init_slider_params(BISHOP, 0);
        let total = bg.init_slider_params(ROOK, offset);
        assert_eq!(total, SLIDER_ATTACKS_SIZE);

        bg
    }

    /// Returns a reference to an initialized `BoardGeometry` object.
    ///
    /// The object is created only during the first call. All next
    /// calls will return a reference to the same object.
    pub fn get() -> &'static BoardGeometry {
        lazy_static! {
            static ref GEOMETRY: BoardGeometry = BoardGeometry::new();
        }
        &GEOMETRY
    }

    /// Returns the set of squares that are attacked by a piece from a
    /// given square.
    ///
    /// This function returns the set of squares that are attacked by
    /// a piece of type `piece` from the square `from_square`, on a
    /// board which is occupied with pieces according to the
    /// `occupied` bitboard. `piece` **must not** be `PAWN`. It does
    /// not matter if `from_square` is occupied or not.
    #[inline]
    pub fn attacks_from(&self, piece: PieceType, from_square: Square, occupied: Bitboard)
                        -> Bitboard {
        debug_assert!(piece != PAWN && piece < 6);
        debug_assert!(from_square <= 63);
        match piece {
            KNIGHT => self.knight_attacks[from_square],
            BISHOP => self.slider_attacks_from(&self.bishop_params, from_square, occupied),
            ROOK => self.slider_attacks_from(&self.rook_params, from_square, occupied),
            QUEEN => {
                self.slider_attacks_from(&self.bishop_params, from_square, occupied) |
                self.slider_attacks_from(&self.rook_params, from_square, occupied)
            }
            _ => {
                debug_assert_eq!(piece, KING);
                self.king_attacks[from_square]
            }
        }
    }

    /// A helper method for `attacks_from`. It looks up the packed
    /// attack table for one slider type.
    #[inline(always)]
    fn slider_attacks_from(&self, params: &[SliderParams; 64], from_square: Square,
                           occupied: Bitboard)
                           -> Bitboard {
        let p = params[from_square];
        let index = p.offset + pext(occupied, p.mask) as usize;
        self.slider_attacks[index]
    }

    /// A helper method for `new`. It fills the packed attack table
    /// and the occupancy masks for one slider type.
    fn init_slider_params(&mut self, piece: PieceType, mut offset: usize) -> usize {
        assert!(piece == BISHOP || piece == ROOK);
        for sq in 0..64 {
            let attacks: fn(Square, Bitboard) -> Bitboard = if piece == BISHOP {
                bb_bishop_attacks
            } else {
                bb_rook_attacks
            };
            let edges = ((BB_RANK_1 | BB_RANK_8) & !bb_rank(sq)) |
                        ((BB_FILE_A | BB_FILE_H) & !bb_file(sq));
            let mask = attacks(sq, 1 << sq) & !edges;
            let params = if piece == BISHOP {
                &mut self.bishop_params[sq]
            } else {
                &mut self.rook_params[sq]
            };
            *params = SliderParams {
                offset,
                mask,
            };

            // Enumerate all subsets of the mask (Carry-Rippler), and
            // store the attack set for each of them at its extracted
            // index.
            let mut occ: Bitboard = 0;
            loop {
                let index = pext(occ, mask) as usize;
                self.slider_attacks[offset + index] = attacks(sq, occ | 1 << sq);
                occ = occ.wrapping_sub(mask) & mask;
                if occ == 0 {
                    break;
                }
            }
            offset += 1 << pop_count(mask);
        }
        offset
    }
}

/// The occupancy mask and table offset for one slider on one square.
#[derive(Clone, Copy)]
struct SliderParams {
    offset: usize,
    mask: Bitboard,
}

/// The total number of entries in the packed slider attack table.
const SLIDER_ATTACKS_SIZE: usize = 107_648;

/// Extracts the bits of `src` selected by `mask` and packs them into
/// the low bits of the result.
#[cfg(all(target_arch = "x86_64", target_feature = "bmi2"))]
#[inline(always)]
fn pext(src: u64, mask: u64) -> u64 {
    unsafe { ::std::arch::x86_64::_pext_u64(src, mask) }
}

/// Extracts the bits of `src` selected by `mask` and packs them into
/// the low bits of the result.
///
/// Portable fallback that iterates the set bits of the mask.
#[cfg(not(all(target_arch = "x86_64", target_feature = "bmi2")))]
#[inline(always)]
fn pext(src: u64, mut mask: u64) -> u64 {
    let mut dst = 0;
    let mut k = 1u64;
    while mask != 0 {
        let bit = lsb(mask);
        if src & bit != 0 {
            dst |= k;
        }
        mask ^= bit;
        k <<= 1;
    }
    dst
}

/// A helper function. It returns the set of squares that are attacked
/// by a rook from a given square.
fn bb_rook_attacks(from_square: Square, occupied: Bitboard) -> Bitboard {
    bb_line_attacks(bb_file(from_square), from_square, occupied) |
    bb_line_attacks(bb_rank(from_square), from_square, occupied)
}

/// A helper function. It returns the set of squares that are attacked
/// by a bishop from a given square.
fn bb_bishop_attacks(from_square: Square, occupied: Bitboard) -> Bitboard {
    bb_line_attacks(bb_diag(from_square), from_square, occupied) |
    bb_line_attacks(bb_anti_diag(from_square), from_square, occupied)
}

/// A helper function for `bb_rook_attacks` and `bb_bishop_attacks`.
///
/// This function calculates the set of squares, lying on a single
/// straight line (a file, rank, diagonal, or anti-diagonal), that a
/// piece can attack from a given square and given board occupancy. To
/// accomplish this it uses some insanely beautiful bit manipulations
/// that are almost indistinguishable from magic.
fn bb_line_attacks(line: Bitboard, from_square: Square, occupied: Bitboard) -> Bitboard {
    let from_square_bb = 1u64 << from_square;
    debug_assert!(from_square_bb & line != 0);
    let potential_blockers = occupied & line;
    let forward = potential_blockers.wrapping_sub(from_square_bb.wrapping_mul(2));
    let rev = reverse(reverse(potential_blockers)
                          .wrapping_sub(reverse(from_square_bb).wrapping_mul(2)));
    (forward ^ rev) & line
}

/// A helper function for `bb_line_attacks`. It reverses the order of
/// the bits in a 64-bit number.
fn reverse(v: u64) -> u64 {
    v.reverse_bits()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::*;
    use crate::squares::*;

    #[test]
    fn between_and_line_sets() {
        let g = BoardGeometry::get();
        assert_eq!(g.squares_at_line[B1][C3], 0);
        assert_eq!(g.squares_at_line[B1][G1], 0b11111111);
        assert_eq!(g.squares_at_line[G8][B8], 0b11111111 << 56);
        assert_eq!(g.squares_between[B1][C3], 0);
        assert_eq!(g.squares_between[B1][G1], 0b00111100);
        assert_eq!(g.squares_between[B2][F6], 1 << C3 | 1 << D4 | 1 << E5);
        assert_eq!(g.squares_between[F6][B2], 1 << C3 | 1 << D4 | 1 << E5);
        assert_eq!(g.squares_between[A1][A2], 0);
        assert_eq!(g.squares_between[A1][A1], 0);
        assert_eq!(g.squares_between[E1][G1], 1 << F1);
        assert_eq!(g.squares_between[E8][C8], 1 << D8);
        assert_eq!(g.squares_between[E1][H1], 1 << F1 | 1 << G1);
    }

    #[test]
    fn pawn_attack_sets() {
        let g = BoardGeometry::get();
        assert_eq!(g.pawn_attacks[WHITE][F6], 1 << E7 | 1 << G7);
        assert_eq!(g.pawn_attacks[BLACK][H8], 1 << G7);
        assert_eq!(g.pawn_attacks[WHITE][A2], 1 << B3);
        assert_eq!(g.pawn_attacks[BLACK][A2], 1 << B1);
    }

    #[test]
    fn attacks_from_consistency() {
        use rand::{thread_rng, Rng};
        let mut rng = thread_rng();
        let g = BoardGeometry::get();
        for piece in [KNIGHT, BISHOP, ROOK, QUEEN, KING].iter() {
            for square in 0..64 {
                let occupied: u64 = rng.gen();
                assert_eq!(g.attacks_from(*piece, square, occupied & !(1 << square)),
                           g.attacks_from(*piece, square, occupied | (1 << square)));
            }
        }
        for square in 0..64 {
            let occupied: u64 = rng.gen();
            let bishop_attacks = g.attacks_from(BISHOP, square, occupied);
            let rook_attacks = g.attacks_from(ROOK, square, occupied);
            let queen_attacks = g.attacks_from(QUEEN, square, occupied);
            let king_attacks = g.attacks_from(KING, square, occupied);
            let knight_attacks = g.attacks_from(KNIGHT, square, occupied);
            assert!(pop_count(king_attacks) >= 3);
            assert!(pop_count(king_attacks) <= 8);
            assert!(pop_count(knight_attacks) >= 2);
            assert!(pop_count(knight_attacks) <= 8);
            assert_eq!(knight_attacks & queen_attacks & king_attacks, 0);
            assert_eq!(king_attacks & queen_attacks, king_attacks);
            assert_eq!(bishop_attacks | rook_attacks, queen_attacks);
            assert_eq!(bishop_attacks & rook_attacks, 0);
            assert_eq!(bishop_attacks, bb_bishop_attacks(square, occupied));
            assert_eq!(rook_attacks, bb_rook_attacks(square, occupied));
        }
    }

    #[test]
    fn slider_blockers() {
        let g = BoardGeometry::get();
        assert_eq!(g.attacks_from(ROOK, A1, 1 << A4 | 1 << C1),
                   1 << A2 | 1 << A3 | 1 << A4 | 1 << B1 | 1 << C1);
        assert_eq!(g.attacks_from(BISHOP, A1, 1 << D4),
                   1 << B2 | 1 << C3 | 1 << D4);
    }
}
