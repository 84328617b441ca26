//! Implements `MoveGenerator`.

use crate::bitsets::*;
use crate::board::*;
use crate::castling_rights::CASTLING_INFO;
use crate::moves::Move;

/// The kind of pseudo-legal moves to generate.
///
/// * `Evasions` -- check evasions: blocks, captures of the checker,
///   and king moves. The only kind that may be generated while in
///   check.
/// * `Captures` -- captures, and queen promotions (quiet ones
///   included, for ordering).
/// * `Quiets` -- non-captures, underpromotions, and castling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenType {
    Evasions,
    Captures,
    Quiets,
}

/// Move lists rarely outgrow this.
pub const MOVE_VEC_RESERVE_CAP: usize = 32;

/// Generates pseudo-legal moves for a position.
///
/// A pseudo-legal move obeys piece geometry and board occupancy, but
/// may still leave the own king in check; it is up to the caller to
/// decide when to call `Board::is_legal`.
pub struct MoveGenerator<'a> {
    board: &'a Board,
    moves: Vec<Move>,
}

impl<'a> MoveGenerator<'a> {
    /// Creates a new instance, bound to a given position.
    pub fn new(board: &'a Board) -> MoveGenerator<'a> {
        MoveGenerator {
            board,
            moves: Vec::with_capacity(MOVE_VEC_RESERVE_CAP),
        }
    }

    /// Returns the generated moves.
    #[inline]
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Consumes the generator, returning the generated moves.
    #[inline]
    pub fn take_moves(self) -> Vec<Move> {
        self.moves
    }

    /// Generates all pseudo-legal moves of a given kind, replacing
    /// the previously generated list.
    ///
    /// `Evasions` must be requested if and only if the side to move
    /// is in check.
    pub fn generate(&mut self, gen_type: GenType) {
        debug_assert_eq!(gen_type == GenType::Evasions, self.board.in_check());
        self.moves.clear();
        let king_bb = self.board.bb(KING, self.board.to_move);
        let mut to_mask = self.to_mask(gen_type);
        if self.board.checkers_count() >= 2 {
            // Double check -- only the king can move.
            self.generate_piece(KING, king_bb, to_mask);
            return;
        }
        self.generate_pawn(gen_type, to_mask);
        for piece in KNIGHT..QUEEN + 1 {
            let piece_bb = self.board.bb(piece, self.board.to_move);
            self.generate_piece(piece, piece_bb, to_mask);
        }
        if gen_type == GenType::Evasions {
            to_mask = !self.board.pieces.color[self.board.to_move];
        }
        self.generate_piece(KING, king_bb, to_mask);
        self.generate_castlings(gen_type);
    }

    /// Generates all pseudo-legal moves: evasions when in check,
    /// captures followed by quiets otherwise.
    pub fn generate_all(&mut self) {
        if self.board.in_check() {
            self.generate(GenType::Evasions);
        } else {
            self.generate(GenType::Quiets);
            let quiets = ::std::mem::replace(&mut self.moves, Vec::new());
            self.generate(GenType::Captures);
            self.moves.extend_from_slice(&quiets);
        }
    }

    /// Removes the moves that leave the own king in check.
    pub fn filter_legal(&mut self) {
        let board = self.board;
        self.moves.retain(|m| board.is_legal(*m));
    }

    /// Returns whether the side to move has at least one legal move.
    pub fn has_legal_move(board: &Board) -> bool {
        let mut gen = MoveGenerator::new(board);
        gen.generate_all();
        gen.filter_legal();
        !gen.moves().is_empty()
    }

    /// Returns whether a move is among the generated pseudo-legal
    /// moves for the position.
    ///
    /// Slower than `Board::is_pseudo_legal`; used for validating the
    /// special-case transposition-table moves (en passant, promotion,
    /// castling).
    pub fn is_legal_move(board: &Board, checked_move: Move) -> bool {
        let mut gen = MoveGenerator::new(board);
        gen.generate_all();
        gen.moves().contains(&checked_move)
    }

    // --- Target masks. --------------------------------------------

    fn to_mask(&self, gen_type: GenType) -> Bitboard {
        match gen_type {
            GenType::Evasions => {
                if self.board.checkers_count() >= 2 {
                    !self.board.pieces.color[self.board.to_move]
                } else {
                    self.board.evasion_mask()
                }
            }
            GenType::Captures => self.board.pieces.color[1 ^ self.board.to_move],
            GenType::Quiets => !self.board.occupied(),
        }
    }

    // --- Pawns. ---------------------------------------------------

    fn add(&mut self, from: Square, to: Square) {
        self.moves.push(Move::new(from, to));
    }

    fn add_promotion(&mut self, from: Square, to: Square, promotion: PieceType) {
        self.moves.push(Move::with_promotion(from, to, promotion));
    }

    /// The origin square of a destination reached by stepping `d`
    /// from the side to move's point of view.
    #[inline]
    fn sub(&self, to: Square, d: Direction) -> Square {
        let d = if self.board.to_move == WHITE { d } else { flip_dir(d) };
        (to as isize - d) as Square
    }

    fn our_pawns(&self) -> Bitboard {
        self.board.bb(PAWN, self.board.to_move)
    }

    fn generate_single_pushes(&mut self, to_mask: Bitboard) {
        let mut tos = self.board.single_pushes(self.our_pawns()) & !self.board.rank_8_bb() &
                      to_mask;
        while tos != 0 {
            let to = bsf_reset(&mut tos);
            let from = self.sub(to, DIR_N);
            self.add(from, to);
        }
    }

    fn generate_double_pushes(&mut self, to_mask: Bitboard) {
        let mut tos = self.board.double_pushes(self.our_pawns()) & to_mask;
        while tos != 0 {
            let to = bsf_reset(&mut tos);
            let from = self.sub(to, DIR_NN);
            self.add(from, to);
        }
    }

    fn quiet_promotion_tos(&self, to_mask: Bitboard) -> Bitboard {
        self.board.single_pushes(self.our_pawns()) & self.board.rank_8_bb() & to_mask
    }

    /// Quiet queen promotions are emitted in the captures phase (with
    /// a quiets target mask), never in the quiets phase, so that they
    /// are ordered with the captures and never duplicated.
    fn generate_quiet_queen_promotion(&mut self, gen_type: GenType, to_mask: Bitboard) {
        if gen_type == GenType::Quiets {
            return;
        }
        let to_mask = if gen_type == GenType::Captures {
            self.to_mask(GenType::Quiets)
        } else {
            to_mask
        };
        let mut tos = self.quiet_promotion_tos(to_mask);
        while tos != 0 {
            let to = bsf_reset(&mut tos);
            let from = self.sub(to, DIR_N);
            self.add_promotion(from, to, QUEEN);
        }
    }

    fn generate_quiet_underpromotions(&mut self, gen_type: GenType, to_mask: Bitboard) {
        if gen_type == GenType::Captures {
            return;
        }
        let mut tos = self.quiet_promotion_tos(to_mask);
        while tos != 0 {
            let to = bsf_reset(&mut tos);
            let from = self.sub(to, DIR_N);
            for promotion in [ROOK, BISHOP, KNIGHT].iter() {
                self.add_promotion(from, to, *promotion);
            }
        }
    }

    fn generate_quiet_promotions(&mut self, gen_type: GenType, to_mask: Bitboard) {
        self.generate_quiet_queen_promotion(gen_type, to_mask);
        self.generate_quiet_underpromotions(gen_type, to_mask);
    }

    /// The en-passant target square is folded into the capture mask;
    /// its full legality is deferred to `Board::is_legal`.
    fn pawn_capture_to_mask(&self, to_mask: Bitboard) -> Bitboard {
        let theirs = self.board.pieces.color[1 ^ self.board.to_move];
        theirs & to_mask ^ self.board.enpassant_bb()
    }

    fn pawn_captures(&self, d: Direction) -> Bitboard {
        // The target mask may contain the en-passant square, so the
        // intersection with enemy pieces happens there, not here.
        shift(self.our_pawns(), d, self.board.to_move)
    }

    fn generate_normal_pawn_captures(&mut self, d: Direction, to_mask: Bitboard) {
        let mut tos = self.pawn_captures(d) & !self.board.rank_8_bb() & to_mask;
        while tos != 0 {
            let to = bsf_reset(&mut tos);
            let from = self.sub(to, d);
            self.add(from, to);
        }
    }

    fn generate_promotion_captures(&mut self, d: Direction, to_mask: Bitboard) {
        let mut tos = self.pawn_captures(d) & self.board.rank_8_bb() & to_mask;
        while tos != 0 {
            let to = bsf_reset(&mut tos);
            let from = self.sub(to, d);
            for promotion in [QUEEN, ROOK, BISHOP, KNIGHT].iter() {
                self.add_promotion(from, to, *promotion);
            }
        }
    }

    fn generate_pawn_captures(&mut self, gen_type: GenType, to_mask: Bitboard) {
        if gen_type == GenType::Quiets {
            return;
        }
        let to_mask = self.pawn_capture_to_mask(to_mask);
        for d in [DIR_NW, DIR_NE].iter() {
            self.generate_normal_pawn_captures(*d, to_mask);
            self.generate_promotion_captures(*d, to_mask);
        }
    }

    fn generate_pawn(&mut self, gen_type: GenType, to_mask: Bitboard) {
        self.generate_single_pushes(to_mask);
        self.generate_double_pushes(to_mask);
        self.generate_quiet_promotions(gen_type, to_mask);
        self.generate_pawn_captures(gen_type, to_mask);
    }

    // --- Pieces. --------------------------------------------------

    fn generate_piece(&mut self, piece: PieceType, mut froms: Bitboard, to_mask: Bitboard) {
        debug_assert!(piece != PAWN);
        while froms != 0 {
            let from = bsf_reset(&mut froms);
            let mut tos = self.board
                .geometry()
                .attacks_from(piece, from, self.board.occupied()) & to_mask;
            while tos != 0 {
                let to = bsf_reset(&mut tos);
                self.add(from, to);
            }
        }
    }

    /// Castling moves are only generated in the quiets phase, and
    /// only their shape is checked here (king on its castling start
    /// square); path emptiness and safety are checked in
    /// `Board::is_legal`.
    fn generate_castlings(&mut self, gen_type: GenType) {
        if gen_type == GenType::Quiets {
            let king_square = self.board.king_square(self.board.to_move);
            for ci in CASTLING_INFO.iter() {
                if king_square == ci.king_from {
                    self.add(ci.king_from, ci.king_to);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::Move;

    fn legal_moves(board: &Board) -> Vec<Move> {
        let mut gen = MoveGenerator::new(board);
        gen.generate_all();
        gen.filter_legal();
        gen.take_moves()
    }

    #[test]
    fn startpos_move_count() {
        let b = Board::new();
        assert_eq!(legal_moves(&b).len(), 20);
    }

    #[test]
    fn kiwipete_move_count() {
        let b = Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -");
        assert_eq!(legal_moves(&b).len(), 48);
    }

    #[test]
    fn evasion_counts() {
        // Single check: block, capture, or move the king.
        let b = Board::from_fen("4k3/8/8/8/8/8/4r3/4K2N w - - 0 1");
        let moves = legal_moves(&b);
        assert!(moves.contains(&Move::from_str("e1d1")));
        assert!(moves.contains(&Move::from_str("e1e2")));
        // Double check: only king moves.
        let b = Board::from_fen("4k3/8/8/8/7b/5n2/8/4K3 w - - 0 1");
        for m in legal_moves(&b) {
            assert_eq!(m.orig_square(), crate::squares::E1);
        }
    }

    #[test]
    fn promotions_by_phase() {
        let b = Board::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        let mut gen = MoveGenerator::new(&b);
        gen.generate(GenType::Captures);
        let captures: Vec<Move> = gen.moves().to_vec();
        assert!(captures.contains(&Move::from_str("a7a8q")));
        assert!(!captures.contains(&Move::from_str("a7a8n")));
        gen.generate(GenType::Quiets);
        let quiets: Vec<Move> = gen.moves().to_vec();
        assert!(!quiets.contains(&Move::from_str("a7a8q")));
        assert!(quiets.contains(&Move::from_str("a7a8n")));
        assert!(quiets.contains(&Move::from_str("a7a8r")));
        assert!(quiets.contains(&Move::from_str("a7a8b")));
    }

    #[test]
    fn capture_promotions_generate_all_pieces() {
        let b = Board::from_fen("1n2k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        let mut gen = MoveGenerator::new(&b);
        gen.generate(GenType::Captures);
        for promotion in ["q", "r", "b", "n"].iter() {
            let notation = format!("a7b8{}", promotion);
            assert!(gen.moves().contains(&Move::from_str(&notation)));
        }
    }

    #[test]
    fn enpassant_is_generated() {
        let mut b = Board::from_fen("4k3/8/8/8/4p3/8/3P4/4K3 w - - 0 1");
        b.do_move(Move::from_str("d2d4"));
        let moves = legal_moves(&b);
        assert!(moves.contains(&Move::from_str("e4d3")));
    }

    #[test]
    fn castlings_in_quiets_only() {
        let b = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let mut gen = MoveGenerator::new(&b);
        gen.generate(GenType::Quiets);
        assert!(gen.moves().contains(&Move::from_str("e1g1")));
        assert!(gen.moves().contains(&Move::from_str("e1c1")));
        gen.generate(GenType::Captures);
        assert!(!gen.moves().contains(&Move::from_str("e1g1")));
    }

    #[test]
    fn stalemate_has_no_legal_moves() {
        let b = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        assert!(!b.in_check());
        assert!(!MoveGenerator::has_legal_move(&b));
    }

    #[test]
    fn checkmate_has_no_legal_moves() {
        let b = Board::from_fen("R3k3/8/4K3/8/8/8/8/8 b - - 0 1");
        assert!(b.in_check());
        assert!(!MoveGenerator::has_legal_move(&b));
    }
}
