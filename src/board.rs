//! Defines how the chess board is represented in memory, and the
//! make/unmake machinery that mutates it.

use std::fmt;
use crate::bitsets::*;
use crate::castling_rights::*;
use crate::evaluator;
use crate::files::{file, FILE_NONE};
use crate::move_generator::MoveGenerator;
use crate::moves::Move;
use crate::ranks::{rank, rel, RANK_6, RANK_8};
use crate::utils::{BoardGeometry, ZobristArrays};
use crate::value::Value;

/// `WHITE` or `BLACK`.
///
/// Numbered so that `1 ^ color` gives the other side.
pub type Color = usize;

pub const WHITE: Color = 0;
pub const BLACK: Color = 1;

/// `PAWN`, `KNIGHT`, `BISHOP`, `ROOK`, `QUEEN`, `KING` or
/// `PIECE_NONE`.
pub type PieceType = usize;

pub const PAWN: PieceType = 0;
pub const KNIGHT: PieceType = 1;
pub const BISHOP: PieceType = 2;
pub const ROOK: PieceType = 3;
pub const QUEEN: PieceType = 4;
pub const KING: PieceType = 5;
pub const PIECE_NONE: PieceType = 6;

/// From 0 to 63 (0 is A1, 1 is B1, .. , 62 is G8, 63 is H8).
pub type Square = usize;

/// A set of squares on the chessboard.
///
/// `u64` bit-sets called *bitboards* can be used to represent a set
/// of squares on the chessboard. For example, the set of squares that
/// are occupied by white rooks in the beginning of the game is: `1 <<
/// A1 | 1 << H1`. `0` represents the empty set, `0xffffffffffffffff`
/// represents the set of all 64 squares on the board.
pub type Bitboard = u64;

/// The FEN string for the standard starting position.
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Returns the square on given file and rank.
#[inline]
pub fn square(file: usize, rank: usize) -> Square {
    debug_assert!(file < 8);
    debug_assert!(rank < 8);
    rank * 8 + file
}

/// Tries to interpret a lowercase character as a piece type.
pub fn piece_from_char(c: char) -> Option<PieceType> {
    match c {
        'p' => Some(PAWN),
        'n' => Some(KNIGHT),
        'b' => Some(BISHOP),
        'r' => Some(ROOK),
        'q' => Some(QUEEN),
        'k' => Some(KING),
        _ => None,
    }
}

/// Returns the lowercase character for a piece type (`.` for
/// `PIECE_NONE`).
pub fn piece_to_char(piece: PieceType) -> char {
    debug_assert!(piece <= PIECE_NONE);
    ['p', 'n', 'b', 'r', 'q', 'k', '.'][piece]
}

/// Describes how pieces are placed on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PiecesPlacement {
    /// An array of occupation bitboards indexed by piece type. For
    /// example, `pieces_placement.piece_type[PAWN]` gives the set of
    /// all pawns on the board (white and black).
    pub piece_type: [Bitboard; 6],

    /// An array of occupation bitboards indexed by color. For
    /// example, `pieces_placement.color[WHITE]` gives the set of all
    /// white pieces and pawns on the board.
    pub color: [Bitboard; 2],
}

impl fmt::Display for PiecesPlacement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = String::new();
        for rank in (0..8).rev() {
            for file in 0..8 {
                let square = square(file, rank);
                let bb = 1 << square;
                let piece = match bb {
                    x if x & self.piece_type[KING] != 0 => 'k',
                    x if x & self.piece_type[QUEEN] != 0 => 'q',
                    x if x & self.piece_type[ROOK] != 0 => 'r',
                    x if x & self.piece_type[BISHOP] != 0 => 'b',
                    x if x & self.piece_type[KNIGHT] != 0 => 'n',
                    x if x & self.piece_type[PAWN] != 0 => 'p',
                    _ => '.',
                };
                if bb & self.color[WHITE] != 0 {
                    s.push(piece.to_ascii_uppercase());
                } else {
                    s.push(piece);
                }
            }
            s.push('\n');
        }
        write!(f, "{}", s)
    }
}

/// Everything needed to restore a board to its previous state when a
/// move is taken back.
#[derive(Clone, Copy, Debug)]
struct UndoInfo {
    played_move: Move,
    /// The captured piece. For an en-passant capture this is
    /// `PIECE_NONE`, because the captured pawn is not on the
    /// destination square.
    captured_piece: PieceType,
    enpassant_file: usize,
    castling_rights: CastlingRights,
    halfmove_clock: u16,
    /// The hash before the move. Needed for repetition detection.
    hash: u64,
    checkers: Bitboard,
    pinned: Bitboard,
}

/// The decoded fields of a move, together with the pieces it touches.
///
/// This is a stack-local scratch value, rebuilt from the move and the
/// current board whenever it is needed.
struct MoveInfo {
    from: Square,
    to: Square,
    promotion: PieceType,
    from_piece: PieceType,
    to_piece: PieceType,
}

/// Holds a chess position and plays moves on it.
///
/// The board consists of the piece placement, the side to move, the
/// castling rights, the en-passant file, and the two move counters,
/// together with a set of incrementally maintained values: the
/// Zobrist hash, the midgame/endgame material and the game phase
/// (always from White's perspective), and two caches -- the enemy
/// pieces giving check (`checkers`) and the friendly pieces pinned to
/// the king (`pinned`).
///
/// Moves are played with `do_move` and must be taken back with
/// `undo_move` in reverse order; the undo stack records everything
/// that can not be rederived.
#[derive(Clone)]
pub struct Board {
    geometry: &'static BoardGeometry,
    zobrist: &'static ZobristArrays,

    /// The placement of the pieces on the board.
    pub pieces: PiecesPlacement,

    /// The piece on each square (`PIECE_NONE` for empty squares).
    pub piece_on: [PieceType; 64],

    /// The side to move.
    pub to_move: Color,

    /// If the previous move was a double pawn push, contains pushed
    /// pawn's file (a value between 0 and 7). Otherwise contains
    /// `FILE_NONE`.
    pub enpassant_file: usize,

    /// The castling rights for both players.
    pub castling_rights: CastlingRights,

    /// The number of half-moves since the last pawn advance or
    /// capture.
    pub halfmove_clock: u16,

    /// The number of the full move. It starts at 1, and is
    /// incremented after Black's move.
    pub fullmove_number: u16,

    /// The Zobrist hash of the position.
    pub hash: u64,

    /// The enemy pieces that give check to the side to move.
    pub checkers: Bitboard,

    /// The friendly pieces that are pinned to the king of the side to
    /// move.
    pub pinned: Bitboard,

    mg_material: Value,
    eg_material: Value,
    game_phase: i32,
    undos: Vec<UndoInfo>,
}

impl Board {
    /// Creates a board with the standard starting position.
    pub fn new() -> Board {
        let mut board = Board::empty();
        board.setup_fen(STARTPOS_FEN);
        board
    }

    /// Creates a board from Forsyth-Edwards Notation (FEN).
    pub fn from_fen(fen: &str) -> Board {
        let mut board = Board::empty();
        board.setup_fen(fen);
        board
    }

    fn empty() -> Board {
        Board {
            geometry: BoardGeometry::get(),
            zobrist: ZobristArrays::get(),
            pieces: PiecesPlacement {
                piece_type: [0; 6],
                color: [0; 2],
            },
            piece_on: [PIECE_NONE; 64],
            to_move: WHITE,
            enpassant_file: FILE_NONE,
            castling_rights: CastlingRights::new(0),
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
            checkers: 0,
            pinned: 0,
            mg_material: 0,
            eg_material: 0,
            game_phase: 0,
            undos: Vec::with_capacity(128),
        }
    }

    /// Re-initializes the board from a position string.
    ///
    /// The six whitespace-separated FEN fields are parsed in order.
    /// Parsing is best effort: an unrecognised character terminates
    /// the piece placement early, and missing fields fall back to
    /// their defaults. Callers should pass well-formed strings.
    pub fn setup_fen(&mut self, fen: &str) {
        self.pieces = PiecesPlacement {
            piece_type: [0; 6],
            color: [0; 2],
        };
        self.piece_on = [PIECE_NONE; 64];
        self.to_move = WHITE;
        self.enpassant_file = FILE_NONE;
        self.castling_rights = CastlingRights::new(0);
        self.hash = 0;
        self.mg_material = 0;
        self.eg_material = 0;
        self.game_phase = 0;
        let mut fields = fen.split_whitespace();
        self.setup_fen_pieces(fields.next().unwrap_or(""));
        self.setup_fen_turn(fields.next().unwrap_or("w"));
        self.setup_fen_castling(fields.next().unwrap_or("-"));
        self.setup_fen_enpassant(fields.next().unwrap_or("-"));
        self.halfmove_clock = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        self.fullmove_number = fields.next().and_then(|s| s.parse().ok()).unwrap_or(1);
        self.undos.clear();
        self.update_infos();
    }

    /// Re-initializes the board from a position string, then applies
    /// a sequence of moves to it.
    pub fn setup(&mut self, fen: &str, moves: &[Move]) {
        self.setup_fen(fen);
        for m in moves {
            self.do_move(*m);
        }
    }

    /// Returns the pieces of a given type and color.
    #[inline]
    pub fn bb(&self, piece: PieceType, us: Color) -> Bitboard {
        self.pieces.piece_type[piece] & self.pieces.color[us]
    }

    /// Returns the set of all occupied squares.
    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.pieces.color[WHITE] | self.pieces.color[BLACK]
    }

    /// Returns the square occupied by a given side's king.
    #[inline]
    pub fn king_square(&self, us: Color) -> Square {
        debug_assert!(self.bb(KING, us) != 0);
        bsf(self.bb(KING, us))
    }

    /// Returns whether the side to move is in check.
    #[inline]
    pub fn in_check(&self) -> bool {
        self.checkers != 0
    }

    /// Returns the number of pieces giving check.
    #[inline]
    pub fn checkers_count(&self) -> usize {
        pop_count(self.checkers)
    }

    /// Returns the midgame material from White's perspective.
    #[inline]
    pub fn mg_material(&self) -> Value {
        self.mg_material
    }

    /// Returns the endgame material from White's perspective.
    #[inline]
    pub fn eg_material(&self) -> Value {
        self.eg_material
    }

    /// Returns the game phase (the sum of the phase weights of all
    /// pieces on the board).
    #[inline]
    pub fn game_phase(&self) -> i32 {
        self.game_phase
    }

    /// Returns the number of moves played since the last `setup`.
    #[inline]
    pub fn undo_count(&self) -> usize {
        self.undos.len()
    }

    /// Returns a bitboard with the en-passant target square, if there
    /// is one.
    #[inline]
    pub fn enpassant_bb(&self) -> Bitboard {
        if self.enpassant_file == FILE_NONE {
            0
        } else {
            1 << square(self.enpassant_file, rel(RANK_6, self.to_move))
        }
    }

    /// Plays a move on the board.
    ///
    /// The move must be a legal move for the current position,
    /// encoded the way the move generator encodes it.
    pub fn do_move(&mut self, played_move: Move) {
        let mi = self.move_info(played_move);
        self.push_undo(played_move);
        self.make_turn();
        self.remove_to_piece(&mi);
        self.move_from_piece(&mi);
        self.handle_eps(&mi);
        self.handle_promotions(&mi);
        self.handle_castles(&mi);
        self.flip_turn();
        self.update_infos();
    }

    /// Takes back the last played move.
    pub fn undo_move(&mut self) {
        let undo = self.undos.pop().unwrap();
        self.flip_turn();
        let mut mi = self.move_info(undo.played_move);
        self.undo_castles(&mi);
        self.undo_promotions(&mut mi);
        self.undo_eps(&mi, undo.captured_piece);
        self.undo_move_from_piece(&mi);
        self.add_to_piece(&mi, undo.captured_piece);
        self.restore_ep(undo.enpassant_file);
        self.restore_castling(undo.castling_rights);
        self.halfmove_clock = undo.halfmove_clock;
        if self.to_move == BLACK {
            self.fullmove_number -= 1;
        }
        debug_assert_eq!(self.hash, undo.hash);
        self.checkers = undo.checkers;
        self.pinned = undo.pinned;
    }

    /// Plays a "pass" move, changing nothing but the side to move.
    ///
    /// Must not be called while in check.
    pub fn do_null_move(&mut self) {
        debug_assert!(!self.in_check());
        self.push_undo(Move::NULL);
        self.make_turn();
        self.flip_turn();
        self.update_infos();
    }

    /// Takes back the last played null move.
    pub fn undo_null_move(&mut self) {
        let undo = self.undos.pop().unwrap();
        debug_assert!(undo.played_move == Move::NULL);
        self.flip_turn();
        self.restore_ep(undo.enpassant_file);
        self.halfmove_clock = undo.halfmove_clock;
        if self.to_move == BLACK {
            self.fullmove_number -= 1;
        }
        debug_assert_eq!(self.hash, undo.hash);
        self.checkers = undo.checkers;
        self.pinned = undo.pinned;
    }

    /// Returns the pseudo-legal destinations of single pawn pushes.
    #[inline]
    pub fn single_pushes(&self, pawns: Bitboard) -> Bitboard {
        shift(pawns, DIR_N, self.to_move) & !self.occupied()
    }

    /// Returns the pseudo-legal destinations of double pawn pushes.
    #[inline]
    pub fn double_pushes(&self, pawns: Bitboard) -> Bitboard {
        let pawns = pawns & self.rank_2_bb();
        let tos = shift(pawns, DIR_N, self.to_move) & !self.occupied();
        shift(tos, DIR_N, self.to_move) & !self.occupied()
    }

    /// Returns the squares attacked by a set of pawns of the side to
    /// move.
    #[inline]
    pub fn pawn_attacks(&self, pawns: Bitboard) -> Bitboard {
        shift(pawns, DIR_NW, self.to_move) | shift(pawns, DIR_NE, self.to_move)
    }

    /// Returns the destination squares that resolve a single check:
    /// the squares strictly between the king and the checker, plus
    /// the checker itself (block or capture).
    pub fn evasion_mask(&self) -> Bitboard {
        debug_assert_eq!(self.checkers_count(), 1);
        let checker = bsf(self.checkers);
        let king_square = self.king_square(self.to_move);
        self.geometry.squares_between[checker][king_square] | self.checkers
    }

    /// Returns the promotion rank of the side to move as a bitboard.
    #[inline]
    pub fn rank_8_bb(&self) -> Bitboard {
        if self.to_move == WHITE {
            BB_RANK_8
        } else {
            BB_RANK_1
        }
    }

    /// Returns the double-push rank of the side to move as a
    /// bitboard.
    #[inline]
    pub fn rank_2_bb(&self) -> Bitboard {
        if self.to_move == WHITE {
            BB_RANK_2
        } else {
            BB_RANK_7
        }
    }

    /// Returns the set of pieces (of both colors) that attack a given
    /// square.
    #[inline]
    pub fn attackers_to(&self, square: Square) -> Bitboard {
        self.attackers_to_occ(square, self.occupied())
    }

    /// A cheap check that a transposition-table move could have been
    /// generated for the current position.
    ///
    /// Verifies piece placement, piece movement rules, and -- when in
    /// check -- the evasion target mask. En-passant captures,
    /// promotions and castling moves are delegated to full move
    /// generation.
    pub fn is_pseudo_legal(&self, checked_move: Move) -> bool {
        let mi = self.move_info(checked_move);
        if self.is_ep(&mi) || mi.promotion != PIECE_NONE || self.is_castle(&mi) {
            return MoveGenerator::is_legal_move(self, checked_move);
        }
        let from_bb = 1u64 << mi.from;
        let to_bb = 1u64 << mi.to;
        if self.pieces.color[self.to_move] & from_bb == 0 ||
           self.pieces.color[self.to_move] & to_bb != 0 {
            return false;
        }
        if !self.is_pseudo_legal_attack(&mi) {
            return false;
        }
        self.checkers == 0 || self.is_pseudo_legal_evasion(&mi)
    }

    /// Returns whether a pseudo-legal move leaves the own king
    /// unchecked.
    ///
    /// King moves probe the destination square with the king lifted
    /// off the board, so x-ray attackers along the vacated line are
    /// seen. Castling additionally requires the king's path to be
    /// safe and the king-rook path empty. A pinned piece may only
    /// move along the king-piece line. En-passant captures are
    /// validated against the occupancy that the capture would
    /// produce.
    pub fn is_legal(&self, checked_move: Move) -> bool {
        let mi = self.move_info(checked_move);
        let king_square = self.king_square(self.to_move);
        if mi.from == king_square {
            if self.king_to_is_attacked(&mi, king_square) {
                return false;
            }
            return self.is_legal_castle(&mi);
        }
        if self.pinned & (1 << mi.from) != 0 &&
           !self.is_on_line(king_square, mi.from, mi.to) {
            return false;
        }
        if self.is_ep(&mi) {
            return self.is_legal_ep(&mi, king_square);
        }
        true
    }

    /// Returns whether a move is a capture.
    ///
    /// Queen promotions count as captures, matching the move
    /// generator's captures phase.
    #[inline]
    pub fn is_capture(&self, checked_move: Move) -> bool {
        let mi = self.move_info(checked_move);
        mi.promotion == QUEEN || self.occupied() & (1 << mi.to) != 0 || self.is_ep(&mi)
    }

    /// Returns whether the position is drawn by the fifty-move rule
    /// or by three-fold repetition.
    pub fn is_draw(&self) -> bool {
        self.is_fifty_move_draw() || self.is_repetition_draw()
    }

    /// Counts how many times the current position has already
    /// occurred.
    ///
    /// Scans the undo stack backwards by two plies, up to the
    /// half-move clock, counting hash matches.
    pub fn repetition_count(&self) -> usize {
        let mut repetitions = 0;
        let n = self.undos.len();
        let max_back = n.min(self.halfmove_clock as usize);
        let mut i = 4;
        while i <= max_back {
            if self.hash == self.undos[n - i].hash {
                repetitions += 1;
            }
            i += 2;
        }
        repetitions
    }

    /// Returns whether the side to move has at least one legal move.
    pub fn has_legal_move(&self) -> bool {
        MoveGenerator::has_legal_move(self)
    }

    /// Calculates the Zobrist hash from scratch.
    ///
    /// The incrementally maintained `hash` field must always be equal
    /// to the value this method returns.
    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0;
        for us in 0..2 {
            for piece in 0..6 {
                let mut bb = self.bb(piece, us);
                while bb != 0 {
                    let square = bsf_reset(&mut bb);
                    hash ^= self.zobrist.pieces[us][piece][square];
                }
            }
        }
        hash ^= self.zobrist.castling_rights[self.castling_rights.value()];
        hash ^= self.zobrist.enpassant_file[self.enpassant_file];
        if self.to_move == BLACK {
            hash ^= self.zobrist.to_move;
        }
        hash
    }

    /// Returns a reference to the shared board geometry tables.
    #[inline]
    pub fn geometry(&self) -> &'static BoardGeometry {
        self.geometry
    }

    // --- Make/unmake steps. ---------------------------------------

    fn move_info(&self, decoded_move: Move) -> MoveInfo {
        let from = decoded_move.orig_square();
        let to = decoded_move.dest_square();
        MoveInfo {
            from,
            to,
            promotion: decoded_move.promotion(),
            from_piece: self.piece_on[from],
            to_piece: self.piece_on[to],
        }
    }

    fn push_undo(&mut self, played_move: Move) {
        self.undos.push(UndoInfo {
            played_move,
            captured_piece: self.piece_on[played_move.dest_square()],
            enpassant_file: self.enpassant_file,
            castling_rights: self.castling_rights,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
            checkers: self.checkers,
            pinned: self.pinned,
        });
    }

    fn clear_ep(&mut self) {
        self.hash ^= self.zobrist.enpassant_file[self.enpassant_file];
        self.enpassant_file = FILE_NONE;
    }

    fn set_ep(&mut self, ep_file: usize) {
        debug_assert_eq!(self.enpassant_file, FILE_NONE);
        debug_assert!(ep_file < 8);
        self.enpassant_file = ep_file;
        self.hash ^= self.zobrist.enpassant_file[ep_file];
    }

    /// The half-move clock is incremented here unconditionally;
    /// `move_from_piece` resets it for pawn moves and captures.
    fn make_turn(&mut self) {
        self.clear_ep();
        self.halfmove_clock += 1;
        if self.to_move == BLACK {
            self.fullmove_number += 1;
        }
    }

    fn flip_piece(&mut self, us: Color, piece: PieceType, square: Square) {
        let bb = 1 << square;
        self.pieces.piece_type[piece] ^= bb;
        self.pieces.color[us] ^= bb;
        self.hash ^= self.zobrist.pieces[us][piece][square];
    }

    fn remove_piece(&mut self, us: Color, piece: PieceType, square: Square) {
        self.flip_piece(us, piece, square);
        self.piece_on[square] = PIECE_NONE;
        self.mg_material -= evaluator::mg_piece_value(us, piece, square);
        self.eg_material -= evaluator::eg_piece_value(us, piece, square);
        self.game_phase -= evaluator::piece_phase(piece);
    }

    fn add_piece(&mut self, us: Color, piece: PieceType, square: Square) {
        self.flip_piece(us, piece, square);
        self.piece_on[square] = piece;
        self.mg_material += evaluator::mg_piece_value(us, piece, square);
        self.eg_material += evaluator::eg_piece_value(us, piece, square);
        self.game_phase += evaluator::piece_phase(piece);
    }

    fn move_piece(&mut self, us: Color, piece: PieceType, from: Square, to: Square) {
        self.remove_piece(us, piece, from);
        self.add_piece(us, piece, to);
    }

    fn remove_to_piece(&mut self, mi: &MoveInfo) {
        if mi.to_piece != PIECE_NONE {
            self.remove_piece(1 ^ self.to_move, mi.to_piece, mi.to);
        }
    }

    fn move_from_piece(&mut self, mi: &MoveInfo) {
        self.move_piece(self.to_move, mi.from_piece, mi.from, mi.to);
        if mi.from_piece == PAWN || mi.to_piece != PIECE_NONE {
            self.halfmove_clock = 0;
        }
    }

    fn is_double_push(&self, mi: &MoveInfo) -> bool {
        mi.from_piece == PAWN && (rank(mi.to) as isize - rank(mi.from) as isize).abs() == 2
    }

    fn is_ep(&self, mi: &MoveInfo) -> bool {
        mi.from_piece == PAWN && file(mi.from) != file(mi.to) && mi.to_piece == PIECE_NONE
    }

    fn is_castle(&self, mi: &MoveInfo) -> bool {
        mi.from_piece == KING && (file(mi.to) as isize - file(mi.from) as isize).abs() == 2
    }

    /// Handles double pushes (setting the en-passant file) and
    /// en-passant captures (removing the captured pawn, which sits
    /// behind the destination square).
    fn handle_eps(&mut self, mi: &MoveInfo) {
        if self.is_double_push(mi) {
            let ep_file = file(mi.from);
            self.set_ep(ep_file);
        } else if self.is_ep(mi) {
            let ep_square = mi.to ^ 8;
            self.remove_piece(1 ^ self.to_move, PAWN, ep_square);
        }
    }

    fn handle_promotions(&mut self, mi: &MoveInfo) {
        if mi.promotion != PIECE_NONE {
            self.remove_piece(self.to_move, PAWN, mi.to);
            self.add_piece(self.to_move, mi.promotion, mi.to);
        }
    }

    fn remove_castle_flags(&mut self, mask: usize) {
        self.hash ^= self.zobrist.castling_rights[self.castling_rights.value()];
        self.castling_rights.remove(mask);
        self.hash ^= self.zobrist.castling_rights[self.castling_rights.value()];
    }

    fn add_castle_flags(&mut self, mask: usize) {
        self.hash ^= self.zobrist.castling_rights[self.castling_rights.value()];
        self.castling_rights.add(mask);
        self.hash ^= self.zobrist.castling_rights[self.castling_rights.value()];
    }

    /// Clears the castle flags whose king or rook squares were
    /// vacated, or whose rook square was captured.
    fn handle_castle_flags(&mut self, mi: &MoveInfo) {
        if mi.from_piece == ROOK {
            for castling in 0..4 {
                if mi.from == CASTLING_INFO[castling].rook_from {
                    self.remove_castle_flags(flag(castling));
                }
            }
        } else if mi.from_piece == KING {
            self.remove_castle_flags(color_flags(self.to_move));
        }
        for castling in 0..4 {
            if mi.to == CASTLING_INFO[castling].rook_from {
                self.remove_castle_flags(flag(castling));
            }
        }
    }

    fn handle_castle_moves(&mut self, mi: &MoveInfo) {
        if self.is_castle(mi) {
            for castling in 0..4 {
                if mi.to == CASTLING_INFO[castling].king_to {
                    let rook_from = CASTLING_INFO[castling].rook_from;
                    let rook_to = CASTLING_INFO[castling].rook_to;
                    self.move_piece(self.to_move, ROOK, rook_from, rook_to);
                }
            }
        }
    }

    fn handle_castles(&mut self, mi: &MoveInfo) {
        self.handle_castle_flags(mi);
        self.handle_castle_moves(mi);
    }

    fn flip_turn(&mut self) {
        self.to_move = 1 ^ self.to_move;
        self.hash ^= self.zobrist.to_move;
    }

    fn undo_castles(&mut self, mi: &MoveInfo) {
        let was_castle = mi.to_piece == KING &&
                         (file(mi.to) as isize - file(mi.from) as isize).abs() == 2;
        if was_castle {
            for castling in 0..4 {
                if mi.to == CASTLING_INFO[castling].king_to {
                    let rook_from = CASTLING_INFO[castling].rook_from;
                    let rook_to = CASTLING_INFO[castling].rook_to;
                    self.move_piece(self.to_move, ROOK, rook_to, rook_from);
                }
            }
        }
    }

    fn undo_promotions(&mut self, mi: &mut MoveInfo) {
        if mi.promotion != PIECE_NONE {
            self.remove_piece(self.to_move, mi.promotion, mi.to);
            self.add_piece(self.to_move, PAWN, mi.to);
            mi.to_piece = PAWN;
        }
    }

    fn undo_eps(&mut self, mi: &MoveInfo, captured_piece: PieceType) {
        let was_ep = mi.to_piece == PAWN && file(mi.from) != file(mi.to) &&
                     captured_piece == PIECE_NONE;
        if was_ep {
            let ep_square = mi.to ^ 8;
            self.add_piece(1 ^ self.to_move, PAWN, ep_square);
        }
    }

    fn undo_move_from_piece(&mut self, mi: &MoveInfo) {
        self.move_piece(self.to_move, mi.to_piece, mi.to, mi.from);
    }

    fn add_to_piece(&mut self, mi: &MoveInfo, captured_piece: PieceType) {
        if captured_piece != PIECE_NONE {
            self.add_piece(1 ^ self.to_move, captured_piece, mi.to);
        }
    }

    fn restore_ep(&mut self, ep_file: usize) {
        self.clear_ep();
        if ep_file != FILE_NONE {
            self.set_ep(ep_file);
        }
    }

    fn restore_castling(&mut self, castling_rights: CastlingRights) {
        self.remove_castle_flags(CASTLE_ALL);
        self.add_castle_flags(castling_rights.value());
    }

    // --- Checkers and pins. ---------------------------------------

    fn attackers_to_occ(&self, square: Square, occupied: Bitboard) -> Bitboard {
        let g = self.geometry;
        let piece_type = &self.pieces.piece_type;
        ((g.attacks_from(ROOK, square, occupied) & (piece_type[ROOK] | piece_type[QUEEN])) |
         (g.attacks_from(BISHOP, square, occupied) & (piece_type[BISHOP] | piece_type[QUEEN])) |
         (g.attacks_from(KNIGHT, square, occupied) & piece_type[KNIGHT]) |
         (g.attacks_from(KING, square, occupied) & piece_type[KING]) |
         ((g.pawn_attacks[WHITE][square] & self.pieces.color[BLACK] |
           g.pawn_attacks[BLACK][square] & self.pieces.color[WHITE]) &
          piece_type[PAWN])) & occupied
    }

    #[inline]
    fn bishop_likes(&self) -> Bitboard {
        self.pieces.piece_type[BISHOP] | self.pieces.piece_type[QUEEN]
    }

    #[inline]
    fn rook_likes(&self) -> Bitboard {
        self.pieces.piece_type[ROOK] | self.pieces.piece_type[QUEEN]
    }

    fn update_checkers(&mut self) {
        let king_square = self.king_square(self.to_move);
        self.checkers = self.attackers_to(king_square) & self.pieces.color[1 ^ self.to_move];
    }

    /// For each enemy slider on a line with the own king: if exactly
    /// one piece stands strictly between them, that piece is pinned.
    fn update_pinned(&mut self) {
        let mut pinned = 0;
        let king_square = self.king_square(self.to_move);
        let g = self.geometry;
        let mut xrays = (g.attacks_from(BISHOP, king_square, 0) & self.bishop_likes() |
                         g.attacks_from(ROOK, king_square, 0) & self.rook_likes()) &
                        self.pieces.color[1 ^ self.to_move];
        let occupied = self.occupied() ^ xrays;
        while xrays != 0 {
            let xray = bsf_reset(&mut xrays);
            let between = g.squares_between[king_square][xray] & occupied;
            if pop_count(between) == 1 {
                pinned |= between;
            }
        }
        self.pinned = pinned;
    }

    fn update_infos(&mut self) {
        if self.bb(KING, self.to_move) == 0 {
            self.checkers = 0;
            self.pinned = 0;
            return;
        }
        self.update_checkers();
        self.update_pinned();
    }

    // --- Legality helpers. ----------------------------------------

    fn is_pseudo_legal_attack(&self, mi: &MoveInfo) -> bool {
        let from_bb = 1u64 << mi.from;
        let to_bb = 1u64 << mi.to;
        if mi.from_piece == PAWN {
            if self.rank_8_bb() & to_bb != 0 {
                return false;
            }
            // There can not be an en-passant move at this point.
            if self.single_pushes(from_bb) & to_bb == 0 &&
               self.double_pushes(from_bb) & to_bb == 0 &&
               self.pawn_attacks(from_bb) & self.pieces.color[1 ^ self.to_move] & to_bb == 0 {
                return false;
            }
        } else {
            let attacks = self.geometry
                .attacks_from(mi.from_piece, mi.from, self.occupied());
            if attacks & to_bb == 0 {
                return false;
            }
        }
        true
    }

    fn is_pseudo_legal_evasion(&self, mi: &MoveInfo) -> bool {
        // King evasions are handled in `is_legal`.
        if mi.from_piece == KING {
            return true;
        }
        if self.checkers_count() >= 2 {
            return false;
        }
        1u64 << mi.to & self.evasion_mask() != 0
    }

    fn is_attacked_by_them(&self, square: Square) -> bool {
        self.attackers_to(square) & self.pieces.color[1 ^ self.to_move] != 0
    }

    /// Probes the king's destination square with the king removed
    /// from the occupancy, so that x-ray attackers along the vacated
    /// line are seen.
    fn king_to_is_attacked(&self, mi: &MoveInfo, king_square: Square) -> bool {
        let occupied = self.occupied() ^ (1 << king_square);
        self.attackers_to_occ(mi.to, occupied) & self.pieces.color[1 ^ self.to_move] != 0
    }

    fn is_legal_castle_at(&self, castling: Castling, ci: &CastlingInfo) -> bool {
        if !self.castling_rights.has(castling) {
            return false;
        }
        let king_rook_path = self.geometry.squares_between[ci.king_from][ci.rook_from];
        if king_rook_path & self.occupied() != 0 {
            return false;
        }
        let passing_square = bsf(self.geometry.squares_between[ci.king_from][ci.king_to]);
        !self.is_attacked_by_them(passing_square)
    }

    fn is_legal_castle(&self, mi: &MoveInfo) -> bool {
        for castling in 0..4 {
            let ci = &CASTLING_INFO[castling];
            if mi.from == ci.king_from && mi.to == ci.king_to {
                return self.is_legal_castle_at(castling, ci);
            }
        }
        true
    }

    fn is_on_line(&self, s0: Square, s1: Square, s2: Square) -> bool {
        self.geometry.squares_at_line[s0][s1] & (1 << s2) != 0
    }

    /// Validates an en-passant capture against the occupancy the
    /// capture would produce (both pawns leave the 4th/5th rank in
    /// one move, which can discover a check).
    fn is_legal_ep(&self, mi: &MoveInfo, king_square: Square) -> bool {
        let ep_square = mi.to ^ 8;
        let occupied = self.occupied() ^ (1 << mi.from) ^ (1 << ep_square) | (1 << mi.to);
        self.attackers_to_occ(king_square, occupied) & self.pieces.color[1 ^ self.to_move] == 0
    }

    // --- Draw detection. ------------------------------------------

    fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100 && (!self.in_check() || self.has_legal_move())
    }

    fn is_repetition_draw(&self) -> bool {
        self.repetition_count() >= 2
    }

    // --- FEN fields. ----------------------------------------------

    fn setup_fen_pieces(&mut self, s: &str) {
        let mut file = 0;
        let mut rank = RANK_8;
        for c in s.chars() {
            match c {
                '/' => {
                    if rank == 0 {
                        return;
                    }
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => {
                    file += c as usize - '0' as usize;
                }
                _ => {
                    let piece = match piece_from_char(c.to_ascii_lowercase()) {
                        Some(piece) => piece,
                        None => return,
                    };
                    if file > 7 {
                        return;
                    }
                    let us = if c.is_ascii_uppercase() { WHITE } else { BLACK };
                    self.add_piece(us, piece, square(file, rank));
                    file += 1;
                }
            }
        }
    }

    fn setup_fen_turn(&mut self, s: &str) {
        if s == "b" {
            self.flip_turn();
        }
    }

    fn setup_fen_castling(&mut self, s: &str) {
        for c in s.chars() {
            for castling in 0..4 {
                if c == CASTLING_FEN[castling] {
                    self.add_castle_flags(flag(castling));
                }
            }
        }
    }

    fn setup_fen_enpassant(&mut self, s: &str) {
        let b = s.as_bytes();
        if b.len() == 2 && (b'a'..=b'h').contains(&b[0]) && (b'1'..=b'8').contains(&b[1]) {
            let ep_file = (b[0] - b'a') as usize;
            self.set_ep(ep_file);
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pieces)?;
        writeln!(f, "turn: {}", if self.to_move == WHITE { "white" } else { "black" })?;
        writeln!(f,
                 "ep: {}",
                 if self.enpassant_file == FILE_NONE {
                     "-".to_string()
                 } else {
                     ["a", "b", "c", "d", "e", "f", "g", "h"][self.enpassant_file].to_string()
                 })?;
        let mut castling = String::new();
        for c in 0..4 {
            if self.castling_rights.has(c) {
                castling.push(CASTLING_FEN[c]);
            }
        }
        if castling.is_empty() {
            castling.push('-');
        }
        writeln!(f, "castling: {}", castling)?;
        writeln!(f, "halfmove clock: {}", self.halfmove_clock)?;
        writeln!(f, "fullmove number: {}", self.fullmove_number)?;
        write!(f, "hash: 0x{:016x}", self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::Move;
    use crate::squares::*;

    type Snapshot = ((PiecesPlacement, [PieceType; 64], Color, usize, usize, u16, u16),
                     (u64, Bitboard, Bitboard, Value, Value, i32));

    fn snapshot(b: &Board) -> Snapshot {
        ((b.pieces,
          b.piece_on,
          b.to_move,
          b.enpassant_file,
          b.castling_rights.value(),
          b.halfmove_clock,
          b.fullmove_number),
         (b.hash, b.checkers, b.pinned, b.mg_material(), b.eg_material(), b.game_phase()))
    }

    #[test]
    fn startpos_setup() {
        let b = Board::new();
        assert_eq!(b.to_move, WHITE);
        assert_eq!(b.enpassant_file, FILE_NONE);
        assert_eq!(b.castling_rights.value(), 0b1111);
        assert_eq!(b.halfmove_clock, 0);
        assert_eq!(b.fullmove_number, 1);
        assert_eq!(pop_count(b.occupied()), 32);
        assert_eq!(b.bb(PAWN, WHITE), BB_RANK_2);
        assert_eq!(b.bb(KING, BLACK), 1 << E8);
        assert_eq!(b.piece_on[D1], QUEEN);
        assert_eq!(b.piece_on[E4], PIECE_NONE);
        assert_eq!(b.hash, b.compute_hash());
        assert!(!b.in_check());
        assert_eq!(b.pinned, 0);
        assert_eq!(b.mg_material(), 0);
        assert_eq!(b.eg_material(), 0);
    }

    #[test]
    fn make_unmake_round_trip() {
        let mut b = Board::new();
        let before = snapshot(&b);
        for notation in ["e2e4", "b1c3", "g1f3", "a2a3"].iter() {
            let m = Move::from_str(notation);
            b.do_move(m);
            assert_eq!(b.hash, b.compute_hash());
            b.undo_move();
            assert_eq!(snapshot(&b), before);
        }
    }

    #[test]
    fn make_unmake_sequence() {
        let mut b = Board::new();
        let moves = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "g8f6", "e1g1", "f6e4"];
        let mut snapshots = vec![snapshot(&b)];
        for notation in moves.iter() {
            b.do_move(Move::from_str(notation));
            assert_eq!(b.hash, b.compute_hash());
            snapshots.push(snapshot(&b));
        }
        assert_eq!(b.undo_count(), moves.len());
        for i in (0..moves.len()).rev() {
            b.undo_move();
            assert_eq!(snapshot(&b), snapshots[i]);
        }
        assert_eq!(b.undo_count(), 0);
    }

    #[test]
    fn enpassant_file_lifecycle() {
        let mut b = Board::new();
        b.do_move(Move::from_str("e2e4"));
        assert_eq!(b.enpassant_file, 4);
        b.do_move(Move::from_str("g8f6"));
        assert_eq!(b.enpassant_file, FILE_NONE);
        b.undo_move();
        assert_eq!(b.enpassant_file, 4);
    }

    #[test]
    fn enpassant_capture() {
        let mut b = Board::from_fen("4k3/8/8/8/4p3/8/3P4/4K3 w - - 0 1");
        b.do_move(Move::from_str("d2d4"));
        assert_eq!(b.enpassant_file, 3);
        let ep_capture = Move::from_str("e4d3");
        assert!(b.is_capture(ep_capture));
        assert!(b.is_legal(ep_capture));
        b.do_move(ep_capture);
        assert_eq!(b.piece_on[D3], PAWN);
        assert_eq!(b.piece_on[D4], PIECE_NONE);
        assert_eq!(b.hash, b.compute_hash());
        b.undo_move();
        assert_eq!(b.piece_on[D4], PAWN);
        assert_eq!(b.piece_on[E4], PAWN);
        assert_eq!(b.hash, b.compute_hash());
    }

    #[test]
    fn castling_make_unmake() {
        let mut b = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        b.do_move(Move::from_str("e1g1"));
        assert_eq!(b.piece_on[G1], KING);
        assert_eq!(b.piece_on[F1], ROOK);
        assert_eq!(b.piece_on[H1], PIECE_NONE);
        assert!(!b.castling_rights.has(WHITE_KINGSIDE));
        assert!(!b.castling_rights.has(WHITE_QUEENSIDE));
        assert!(b.castling_rights.has(BLACK_KINGSIDE));
        assert_eq!(b.hash, b.compute_hash());
        b.do_move(Move::from_str("e8c8"));
        assert_eq!(b.piece_on[C8], KING);
        assert_eq!(b.piece_on[D8], ROOK);
        assert_eq!(b.castling_rights.value(), 0);
        assert_eq!(b.hash, b.compute_hash());
        b.undo_move();
        b.undo_move();
        assert_eq!(b.castling_rights.value(), 0b1111);
        assert_eq!(b.piece_on[E1], KING);
        assert_eq!(b.piece_on[H1], ROOK);
        assert_eq!(b.hash, b.compute_hash());
    }

    #[test]
    fn rook_capture_clears_castle_flag() {
        let mut b = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        b.do_move(Move::from_str("a1a8"));
        assert!(!b.castling_rights.has(BLACK_QUEENSIDE));
        assert!(b.castling_rights.has(BLACK_KINGSIDE));
        assert!(!b.castling_rights.has(WHITE_QUEENSIDE));
        assert_eq!(b.hash, b.compute_hash());
    }

    #[test]
    fn promotion_make_unmake() {
        let mut b = Board::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        b.do_move(Move::from_str("a7a8q"));
        assert_eq!(b.piece_on[A8], QUEEN);
        assert_eq!(b.bb(PAWN, WHITE), 0);
        assert_eq!(b.hash, b.compute_hash());
        b.undo_move();
        assert_eq!(b.piece_on[A7], PAWN);
        assert_eq!(b.bb(QUEEN, WHITE), 0);
        assert_eq!(b.hash, b.compute_hash());
    }

    #[test]
    fn null_move_round_trip() {
        let mut b = Board::from_fen("4k3/8/8/8/4p3/8/3P4/4K3 w - - 3 10");
        b.do_move(Move::from_str("d2d4"));
        let before = snapshot(&b);
        b.do_null_move();
        assert_eq!(b.to_move, WHITE);
        assert_eq!(b.enpassant_file, FILE_NONE);
        assert_eq!(b.hash, b.compute_hash());
        b.undo_null_move();
        assert_eq!(snapshot(&b), before);
    }

    #[test]
    fn checkers_and_pins() {
        let b = Board::from_fen("4k3/4r3/8/8/8/4B3/8/4K3 w - - 0 1");
        assert!(!b.in_check());
        assert_eq!(b.pinned, 1 << E3);
        let b = Board::from_fen("4k3/4r3/8/8/8/4B3/4Q3/4K3 w - - 0 1");
        assert_eq!(b.pinned, 0);
        let b = Board::from_fen("4k3/4r3/8/8/8/8/4Q3/4K3 b - - 0 1");
        assert!(!b.in_check());
        assert_eq!(b.pinned, 1 << E7);
        let b = Board::from_fen("4k3/8/8/8/7b/8/8/4K3 w - - 0 1");
        assert!(b.in_check());
        assert_eq!(b.checkers, 1 << H4);
        let b = Board::from_fen("4k3/8/8/8/8/5n2/8/4K2R w K - 0 1");
        assert!(b.in_check());
        assert_eq!(b.checkers_count(), 1);
    }

    #[test]
    fn pinned_piece_legality() {
        let b = Board::from_fen("4k3/8/8/8/8/4r3/4R3/4K3 w - - 0 1");
        assert_eq!(b.pinned, 1 << E2);
        assert!(b.is_legal(Move::from_str("e2e3")));
        assert!(!b.is_legal(Move::from_str("e2d2")));
        assert!(!b.is_legal(Move::from_str("e2a2")));
    }

    #[test]
    fn king_moves_and_xrays() {
        // The king can not step away from a rook along the checking
        // line, even though the destination looks safe with the king
        // still on the board.
        let b = Board::from_fen("4r2k/8/8/8/4K3/8/8/8 w - - 0 1");
        assert!(b.in_check());
        assert!(!b.is_legal(Move::from_str("e4e3")));
        assert!(!b.is_legal(Move::from_str("e4e5")));
        assert!(b.is_legal(Move::from_str("e4d3")));
        assert!(b.is_legal(Move::from_str("e4f4")));
    }

    #[test]
    fn enpassant_discovered_check() {
        // Capturing en passant would remove both pawns from the rank
        // and expose the king to the rook.
        let b = Board::from_fen("8/8/8/8/k2Pp2R/8/8/4K3 b - d3 0 1");
        let ep_capture = Move::from_str("e4d3");
        assert!(!b.is_legal(ep_capture));
    }

    #[test]
    fn repetition_and_fifty_moves() {
        let mut b = Board::new();
        let shuffle = ["b1c3", "b8c6", "c3b1", "c6b8"];
        assert!(!b.is_draw());
        for notation in shuffle.iter() {
            b.do_move(Move::from_str(notation));
        }
        assert_eq!(b.repetition_count(), 1);
        assert!(!b.is_draw());
        for notation in shuffle.iter() {
            b.do_move(Move::from_str(notation));
        }
        assert_eq!(b.repetition_count(), 2);
        assert!(b.is_draw());

        let b = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 100 80");
        assert!(b.is_draw());
        let b = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 99 80");
        assert!(!b.is_draw());
    }

    #[test]
    fn pseudo_legality_of_tt_moves() {
        let b = Board::new();
        assert!(b.is_pseudo_legal(Move::from_str("e2e4")));
        assert!(b.is_pseudo_legal(Move::from_str("g1f3")));
        assert!(!b.is_pseudo_legal(Move::from_str("e2e5")));
        assert!(!b.is_pseudo_legal(Move::from_str("e7e5")));
        assert!(!b.is_pseudo_legal(Move::from_str("d1d4")));
        assert!(!b.is_pseudo_legal(Move::from_str("b1d2")));
        // Castling digests are pseudo-legal whenever the king sits on
        // its starting square; `is_legal` rejects the blocked path.
        assert!(b.is_pseudo_legal(Move::from_str("e1g1")));
        assert!(!b.is_legal(Move::from_str("e1g1")));
        assert!(!b.is_pseudo_legal(Move::NULL));

        // While in check only evasions are pseudo-legal.
        let b = Board::from_fen("4k3/8/8/8/8/8/4r3/4K2N w - - 0 1");
        assert!(!b.is_pseudo_legal(Move::from_str("h1g3")));
        assert!(b.is_pseudo_legal(Move::from_str("e1d1")));
    }

    #[test]
    fn fen_best_effort() {
        // An unrecognised character stops the piece placement early;
        // the remaining fields still parse.
        let b = Board::from_fen("4k3/8/8/8/8/8/8/4K3 b - - 7 42");
        assert_eq!(b.to_move, BLACK);
        assert_eq!(b.halfmove_clock, 7);
        assert_eq!(b.fullmove_number, 42);
        let b = Board::from_fen("4k3/8/3x4/8/8/8/8/4K3 w - - 0 1");
        assert_eq!(b.piece_on[E8], KING);
    }
}
