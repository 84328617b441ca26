//! Implements `MovePicker`.

use crate::board::{Board, PAWN, PIECE_NONE, QUEEN};
use crate::move_generator::{GenType, MoveGenerator};
use crate::moves::Move;
use crate::value::{HistoryValue, HISTORY_MAX};

/// The number of killer moves kept per ply.
pub const KILLERS_COUNT: usize = 2;

/// The `[color][from][to]` table of quiet-move history scores.
pub type ButterflyHistory = [[[HistoryValue; 64]; 64]; 2];

/// A move-ordering score. Wider than `HistoryValue` so that the
/// evasion scoring can rank captures a full history range above
/// quiets.
pub type MoveScore = i32;

/// `Main` for the full search, `Qsearch` for the quiescence search
/// (which only considers captures and queen promotions).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickerType {
    Main,
    Qsearch,
}

type Stage = u8;

mod stage {
    use super::Stage;

    pub const EVASIONS_TT: Stage = 0;
    pub const EVASIONS_INIT: Stage = 1;
    pub const EVASIONS: Stage = 2;
    pub const EVASIONS_END: Stage = 3;

    pub const MAIN_TT: Stage = 4;
    pub const MAIN_CAPTURES_INIT: Stage = 5;
    pub const MAIN_CAPTURES: Stage = 6;
    pub const MAIN_KILLERS_INIT: Stage = 7;
    pub const MAIN_KILLERS: Stage = 8;
    pub const MAIN_QUIETS_INIT: Stage = 9;
    pub const MAIN_QUIETS: Stage = 10;
    pub const MAIN_END: Stage = 11;

    pub const QSEARCH_TT: Stage = 12;
    pub const QSEARCH_CAPTURES_INIT: Stage = 13;
    pub const QSEARCH_CAPTURES: Stage = 14;
    pub const QSEARCH_END: Stage = 15;
}

struct ScoredMove {
    scored_move: Move,
    score: MoveScore,
}

/// Supplies the moves of a position one by one, in a priority order,
/// without materialising and ordering all of them up front.
///
/// The stages for a position not in check are: the
/// transposition-table move (if fully legal), the captures (ordered
/// by MVV-LVA, queen promotions included), the killer moves, and the
/// quiet moves (ordered by history). In check, the single evasions
/// stage follows the transposition-table move, with captures ranked
/// above quiets by a fixed offset. Every emitted move is legal;
/// `next` returns `Move::NULL` when no moves remain.
///
/// The picker holds no reference to the board; the board and the
/// history table are passed into `next` instead, so the caller can
/// keep mutating the board between calls.
pub struct MovePicker {
    tt_move: Move,
    killers: [Move; KILLERS_COUNT],
    stage: Stage,
    moves: Vec<ScoredMove>,
    cur: usize,
    cur_killer: usize,
    skip_quiets: bool,
}

impl MovePicker {
    /// Creates a new instance for the board's current position.
    ///
    /// `killers` are this ply's killer moves; `tt_move` is the
    /// transposition-table move to try first (`Move::NULL` for none).
    pub fn new(board: &Board, picker_type: PickerType, tt_move: Move,
               killers: [Move; KILLERS_COUNT])
               -> MovePicker {
        let stage = if board.in_check() {
            stage::EVASIONS_TT
        } else if picker_type == PickerType::Main {
            stage::MAIN_TT
        } else {
            stage::QSEARCH_TT
        };
        MovePicker {
            tt_move,
            killers,
            stage,
            moves: Vec::new(),
            cur: 0,
            cur_killer: 0,
            skip_quiets: false,
        }
    }

    /// Returns the next-best legal move, or `Move::NULL` when no
    /// moves remain.
    pub fn next(&mut self, board: &Board, history: &ButterflyHistory) -> Move {
        use self::stage::*;
        match self.stage {
            EVASIONS_TT | MAIN_TT | QSEARCH_TT => {
                self.stage += 1;
                if is_fully_legal(board, self.tt_move) {
                    self.tt_move
                } else {
                    self.next(board, history)
                }
            }
            EVASIONS_INIT => {
                self.generate(board, history, GenType::Evasions);
                self.next(board, history)
            }
            MAIN_CAPTURES_INIT | QSEARCH_CAPTURES_INIT => {
                self.generate(board, history, GenType::Captures);
                self.next(board, history)
            }
            MAIN_KILLERS_INIT => {
                self.cur_killer = 0;
                self.stage += 1;
                self.next(board, history)
            }
            MAIN_QUIETS_INIT => {
                if !self.skip_quiets {
                    self.generate(board, history, GenType::Quiets);
                } else {
                    self.stage += 1;
                }
                self.next(board, history)
            }
            MAIN_KILLERS => {
                let killer = self.next_killer(board);
                if killer != Move::NULL {
                    killer
                } else {
                    self.stage += 1;
                    self.next(board, history)
                }
            }
            EVASIONS | QSEARCH_CAPTURES => {
                if !self.skip_quiets {
                    let next_move = self.retrieve_next(board, false);
                    if next_move != Move::NULL {
                        return next_move;
                    }
                }
                self.stage += 1;
                self.next(board, history)
            }
            MAIN_CAPTURES | MAIN_QUIETS => {
                if !self.skip_quiets {
                    let next_move = self.retrieve_next(board, true);
                    if next_move != Move::NULL {
                        return next_move;
                    }
                }
                self.stage += 1;
                self.next(board, history)
            }
            _ => {
                debug_assert!(self.stage == EVASIONS_END || self.stage == MAIN_END ||
                              self.stage == QSEARCH_END);
                Move::NULL
            }
        }
    }

    /// Makes the picker bypass the quiet stages from now on. Set by
    /// late-move pruning.
    #[inline]
    pub fn skip_quiet_moves(&mut self) {
        self.skip_quiets = true;
    }

    fn generate(&mut self, board: &Board, history: &ButterflyHistory, gen_type: GenType) {
        let mut gen = MoveGenerator::new(board);
        gen.generate(gen_type);
        self.moves.clear();
        for generated in gen.moves() {
            self.moves.push(ScoredMove {
                scored_move: *generated,
                score: score_move(board, history, gen_type, *generated),
            });
        }
        self.moves.sort_by(|a, b| b.score.cmp(&a.score));
        self.cur = 0;
        self.stage += 1;
    }

    fn next_killer(&mut self, board: &Board) -> Move {
        while self.cur_killer < KILLERS_COUNT {
            let killer = self.killers[self.cur_killer];
            self.cur_killer += 1;
            if killer != self.tt_move && is_fully_legal(board, killer) {
                return killer;
            }
        }
        Move::NULL
    }

    /// Emits the next legal move from the sorted list, skipping the
    /// moves already tried in an earlier stage.
    fn retrieve_next(&mut self, board: &Board, skip_killers: bool) -> Move {
        while self.cur < self.moves.len() {
            let candidate = self.moves[self.cur].scored_move;
            self.cur += 1;
            let repeated = candidate == self.tt_move ||
                           (skip_killers && self.killers.contains(&candidate));
            if !repeated && board.is_legal(candidate) {
                return candidate;
            }
        }
        Move::NULL
    }
}

/// Returns whether a move can be played on the board right now.
fn is_fully_legal(board: &Board, checked_move: Move) -> bool {
    checked_move != Move::NULL && board.is_pseudo_legal(checked_move) &&
    board.is_legal(checked_move)
}

/// Most Valuable Victim minus Least Valuable Aggressor.
///
/// The victim of an en-passant capture is a pawn; a quiet queen
/// promotion has no victim and is ranked by the promotion gain
/// instead, so it still sorts above the minor captures.
fn mvv_lva(board: &Board, scored_move: Move) -> MoveScore {
    let lva = board.piece_on[scored_move.orig_square()];
    let mut mvv = board.piece_on[scored_move.dest_square()];
    let promotion = scored_move.promotion();
    if promotion != PIECE_NONE {
        debug_assert!(mvv != PIECE_NONE || promotion == QUEEN);
        if mvv == PIECE_NONE {
            mvv = 0;
        }
        mvv += promotion - PAWN;
    } else if mvv == PIECE_NONE {
        debug_assert_eq!(lva, PAWN);
        mvv = PAWN;
    }
    6 * mvv as MoveScore - lva as MoveScore
}

fn history_score(board: &Board, history: &ButterflyHistory, scored_move: Move) -> MoveScore {
    history[board.to_move][scored_move.orig_square()][scored_move.dest_square()] as MoveScore
}

fn score_move(board: &Board, history: &ButterflyHistory, gen_type: GenType, scored_move: Move)
              -> MoveScore {
    match gen_type {
        GenType::Evasions => {
            if board.is_capture(scored_move) {
                mvv_lva(board, scored_move) + 2 * HISTORY_MAX as MoveScore
            } else {
                history_score(board, history, scored_move)
            }
        }
        GenType::Captures => mvv_lva(board, scored_move),
        GenType::Quiets => history_score(board, history, scored_move),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::*;
    use crate::move_generator::MoveGenerator;
    use crate::moves::Move;

    fn empty_history() -> Box<ButterflyHistory> {
        Box::new([[[0; 64]; 64]; 2])
    }

    fn drain(picker: &mut MovePicker, board: &Board, history: &ButterflyHistory) -> Vec<Move> {
        let mut moves = Vec::new();
        loop {
            let m = picker.next(board, history);
            if m == Move::NULL {
                return moves;
            }
            moves.push(m);
        }
    }

    fn legal_move_count(board: &Board) -> usize {
        let mut gen = MoveGenerator::new(board);
        gen.generate_all();
        gen.filter_legal();
        gen.moves().len()
    }

    #[test]
    fn emits_every_legal_move_exactly_once() {
        let history = empty_history();
        for fen in [STARTPOS_FEN,
                    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -",
                    "4k3/8/8/8/8/8/4r3/4K2N w - - 0 1"]
            .iter() {
            let board = Board::from_fen(fen);
            let mut picker = MovePicker::new(&board,
                                             PickerType::Main,
                                             Move::NULL,
                                             [Move::NULL; KILLERS_COUNT]);
            let emitted = drain(&mut picker, &board, &history);
            assert_eq!(emitted.len(), legal_move_count(&board));
            let mut deduplicated = emitted.clone();
            deduplicated.sort();
            deduplicated.dedup();
            assert_eq!(deduplicated.len(), emitted.len());
        }
    }

    #[test]
    fn tt_move_comes_first() {
        let board = Board::new();
        let history = empty_history();
        let tt_move = Move::from_str("d2d4");
        let mut picker = MovePicker::new(&board,
                                         PickerType::Main,
                                         tt_move,
                                         [Move::NULL; KILLERS_COUNT]);
        let emitted = drain(&mut picker, &board, &history);
        assert_eq!(emitted[0], tt_move);
        assert_eq!(emitted.iter().filter(|m| **m == tt_move).count(), 1);
        assert_eq!(emitted.len(), 20);
    }

    #[test]
    fn illegal_tt_move_is_skipped() {
        let board = Board::new();
        let history = empty_history();
        let mut picker = MovePicker::new(&board,
                                         PickerType::Main,
                                         Move::from_str("d1h5"),
                                         [Move::NULL; KILLERS_COUNT]);
        let emitted = drain(&mut picker, &board, &history);
        assert_eq!(emitted.len(), 20);
        assert!(!emitted.contains(&Move::from_str("d1h5")));
    }

    #[test]
    fn captures_are_ordered_by_mvv_lva() {
        // A pawn can capture a queen or a knight; the queen capture
        // must be tried first. The rook capture by the queen comes
        // after the pawn-takes-queen.
        let board = Board::from_fen("4k3/8/8/3q1n2/4P3/8/8/Q3K3 w - - 0 1");
        let history = empty_history();
        let mut picker = MovePicker::new(&board,
                                         PickerType::Qsearch,
                                         Move::NULL,
                                         [Move::NULL; KILLERS_COUNT]);
        let emitted = drain(&mut picker, &board, &history);
        assert_eq!(emitted[0], Move::from_str("e4d5"));
        assert_eq!(emitted[1], Move::from_str("e4f5"));
    }

    #[test]
    fn killers_come_before_quiets() {
        let board = Board::new();
        let history = empty_history();
        let killer = Move::from_str("b2b3");
        let mut picker = MovePicker::new(&board,
                                         PickerType::Main,
                                         Move::NULL,
                                         [killer, Move::NULL]);
        let emitted = drain(&mut picker, &board, &history);
        // No captures at the start position, so the killer leads.
        assert_eq!(emitted[0], killer);
        assert_eq!(emitted.iter().filter(|m| **m == killer).count(), 1);
        assert_eq!(emitted.len(), 20);
    }

    #[test]
    fn quiets_follow_history_scores() {
        let board = Board::new();
        let mut history = empty_history();
        let preferred = Move::from_str("g2g3");
        history[WHITE][preferred.orig_square()][preferred.dest_square()] = 1000;
        let mut picker = MovePicker::new(&board,
                                         PickerType::Main,
                                         Move::NULL,
                                         [Move::NULL; KILLERS_COUNT]);
        let emitted = drain(&mut picker, &board, &history);
        assert_eq!(emitted[0], preferred);
    }

    #[test]
    fn skip_quiets_stops_the_quiet_stage() {
        let board = Board::new();
        let history = empty_history();
        let mut picker = MovePicker::new(&board,
                                         PickerType::Main,
                                         Move::NULL,
                                         [Move::NULL; KILLERS_COUNT]);
        assert!(picker.next(&board, &history) != Move::NULL);
        picker.skip_quiet_moves();
        assert_eq!(picker.next(&board, &history), Move::NULL);
    }

    #[test]
    fn qsearch_emits_captures_only() {
        let board = Board::from_fen("4k3/8/8/3q1n2/4P3/8/8/Q3K3 w - - 0 1");
        let history = empty_history();
        let mut picker = MovePicker::new(&board,
                                         PickerType::Qsearch,
                                         Move::NULL,
                                         [Move::NULL; KILLERS_COUNT]);
        for m in drain(&mut picker, &board, &history) {
            assert!(board.is_capture(m));
        }
    }

    #[test]
    fn evasions_rank_captures_above_quiets() {
        // The checking rook can be captured by the knight or the
        // king; either beats stepping aside.
        let board = Board::from_fen("4k3/8/8/8/8/2N5/4r3/4K3 w - - 0 1");
        assert!(board.in_check());
        let history = empty_history();
        let mut picker = MovePicker::new(&board,
                                         PickerType::Main,
                                         Move::NULL,
                                         [Move::NULL; KILLERS_COUNT]);
        let emitted = drain(&mut picker, &board, &history);
        assert!(!emitted.is_empty());
        assert!(board.is_capture(emitted[0]));
    }
}
