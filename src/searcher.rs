//! Implements `Searcher`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use crate::bitsets::pop_count;
use crate::board::{Board, PAWN, WHITE};
use crate::depth::{Depth, Ply, PLY_MAX};
use crate::evaluator;
use crate::hash_table::{Bound, HashTable, BOUND_EXACT, BOUND_LOWER, BOUND_UPPER};
use crate::move_generator::{MoveGenerator, MOVE_VEC_RESERVE_CAP};
use crate::move_picker::{ButterflyHistory, MovePicker, PickerType, KILLERS_COUNT};
use crate::moves::Move;
use crate::uci::{GoParams, PositionParams};
use crate::value::*;

/// How often the stop flag and the clock are polled, in visited
/// nodes.
pub const SEARCH_POLL_NODE_FREQ: u64 = 1024;

/// The half-width of the initial aspiration window, in centipawns.
pub const ASP_WINDOW_SIZE: i32 = 10;

/// The assumed latency of the protocol round trip, in milliseconds.
/// Subtracted from the time budget so replies are never late.
pub const UCI_LATENCY_MS: u64 = 5;

type Millis = u64;

/// A sink for the text lines the engine emits.
///
/// The searcher writes `info` and `bestmove` lines through it; the
/// binary wires it to stdout, tests inject collecting sinks.
pub trait OutputSink: Send {
    fn send_line(&mut self, line: String);
}

/// A shareable, lockable output sink.
pub type SharedSink = Arc<Mutex<dyn OutputSink>>;

/// The per-ply search state.
struct SearchInfo {
    killers: [Move; KILLERS_COUNT],
    pv_line: Vec<Move>,
}

impl Default for SearchInfo {
    fn default() -> SearchInfo {
        SearchInfo {
            killers: [Move::NULL; KILLERS_COUNT],
            pv_line: Vec::new(),
        }
    }
}

lazy_static! {
    /// The late-move reduction table, indexed by remaining depth and
    /// by the number of moves already played at the node.
    static ref LMR_REDUCTION: [[Depth; 64]; 64] = {
        let mut table = [[0; 64]; 64];
        for depth in 1..64 {
            for moves_played in 1..64 {
                table[depth][moves_played] =
                    ((depth as f64).log2() * (moves_played as f64).log2() / 4.0) as Depth;
            }
        }
        table
    };
}

/// Selects a move by iteratively deepened principal variation search.
///
/// The searcher owns the board, the transposition table, the killer
/// and history tables, and the per-ply stack. A search is started
/// with `go` and runs until its depth or time limit is reached, or
/// until the stop flag is raised (from another thread, through the
/// handle `stop_flag` returns). Per completed depth an `info` line is
/// emitted; at the end, a `bestmove` line.
pub struct Searcher {
    board: Board,
    tt: HashTable,
    butterfly_hist: Box<ButterflyHistory>,
    stop_flag: Arc<AtomicBool>,
    sink: SharedSink,
    clock_start: Instant,
    max_depth: Ply,
    bestmove: Move,
    node_cnt: u64,
    depth_one_node_cnt: u64,
    root_value: Value,
    iter_depth: Ply,
    cur_ply: Ply,
    max_millis: Millis,
    stack: Vec<SearchInfo>,
}

impl Searcher {
    /// Creates a new instance with the standard starting position and
    /// a 16 MB transposition table.
    pub fn new(sink: SharedSink) -> Searcher {
        Searcher {
            board: Board::new(),
            tt: HashTable::new(),
            butterfly_hist: Box::new([[[0; 64]; 64]; 2]),
            stop_flag: Arc::new(AtomicBool::new(false)),
            sink,
            clock_start: Instant::now(),
            max_depth: PLY_MAX,
            bestmove: Move::NULL,
            node_cnt: 0,
            depth_one_node_cnt: 0,
            root_value: 0,
            iter_depth: 0,
            cur_ply: 0,
            max_millis: Millis::MAX,
            stack: Vec::new(),
        }
    }

    /// Clears the transposition table and the history table.
    pub fn new_game(&mut self) {
        self.tt.clear();
        *self.butterfly_hist = [[[0; 64]; 64]; 2];
    }

    /// Reallocates the transposition table, clearing all entries.
    ///
    /// Must not be called while a search is running.
    pub fn resize_table(&mut self, size_mb: u64) {
        self.tt.resize(size_mb);
    }

    /// Sets up the position a `position` command describes.
    ///
    /// The moves are applied one by one; an unparsable or illegal
    /// move stops the application (the board keeps the moves applied
    /// so far).
    pub fn setup(&mut self, params: &PositionParams) {
        self.board.setup_fen(&params.fen);
        for notation in params.moves.iter() {
            let parsed_move = Move::from_str(notation);
            if parsed_move == Move::NULL ||
               !MoveGenerator::is_legal_move(&self.board, parsed_move) ||
               !self.board.is_legal(parsed_move) {
                break;
            }
            self.board.do_move(parsed_move);
        }
    }

    /// Runs a search under the limits a `go` command describes, then
    /// emits the best move.
    ///
    /// The stop flag is cleared when the search finishes, so a flag
    /// raised by the time manager does not leak into the next search.
    pub fn go(&mut self, params: &GoParams) {
        self.new_search(params);
        self.iterative_deepening();
        self.print_bestmove();
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    /// Requests the running search to stop.
    ///
    /// The search returns promptly with the best move of the last
    /// fully completed depth.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Returns a handle to the stop flag, so another thread can stop
    /// the search.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Returns the current position.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the current position mutably (development commands).
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    // --- Search setup and time management. ------------------------

    /// Budgets the time for this move: a thirtieth of the remaining
    /// time plus the increment, capped at the remaining time. Without
    /// either, the budget is unbounded.
    fn allocate_time(&mut self, params: &GoParams) {
        let (time, inc) = if self.board.to_move == WHITE {
            (params.wtime, params.winc)
        } else {
            (params.btime, params.binc)
        };
        let mut max_millis: Millis = 0;
        if let Some(time) = time {
            max_millis += ::std::cmp::max(time / 30, 1);
        }
        if let Some(inc) = inc {
            max_millis += inc;
        }
        if time.is_none() && inc.is_none() {
            max_millis = Millis::MAX;
        } else if let Some(time) = time {
            max_millis = ::std::cmp::min(max_millis, time);
        }
        self.max_millis = max_millis;
    }

    fn new_search(&mut self, params: &GoParams) {
        self.clock_start = Instant::now();
        self.max_depth = params.depth.map_or(PLY_MAX, |d| (d as Ply).min(PLY_MAX));
        self.bestmove = Move::NULL;
        self.node_cnt = 0;
        self.depth_one_node_cnt = 0;
        self.root_value = 0;
        self.iter_depth = 0;
        self.cur_ply = 0;
        self.allocate_time(params);
        self.stack = Vec::new();
        self.stack.resize_with(self.cur_ply + 1, Default::default);
    }

    fn reset_info(&mut self) {
        self.stack.resize_with(self.cur_ply + 1, Default::default);
    }

    #[inline]
    fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    fn elapsed(&self) -> Millis {
        let millis = self.clock_start.elapsed().as_millis() as Millis;
        if millis != 0 {
            millis
        } else {
            1
        }
    }

    fn within_time_limit(&self, millis: Millis) -> bool {
        millis.saturating_add(UCI_LATENCY_MS) < self.max_millis
    }

    fn check_limits_reached(&self) {
        if self.node_cnt % SEARCH_POLL_NODE_FREQ == 0 && self.iter_depth > 1 {
            if !self.within_time_limit(self.elapsed()) {
                self.stop_flag.store(true, Ordering::Relaxed);
            }
        }
    }

    // --- Playing moves inside the search. -------------------------

    fn make_move_end(&mut self) {
        self.node_cnt += 1;
        self.check_limits_reached();
        self.cur_ply += 1;
        self.stack.resize_with(self.cur_ply + 1, Default::default);
        self.stack[self.cur_ply].pv_line.clear();
    }

    fn make_move(&mut self, played_move: Move) {
        self.board.do_move(played_move);
        self.make_move_end();
    }

    fn unmake_move(&mut self) {
        self.board.undo_move();
        self.cur_ply -= 1;
    }

    fn make_null_move(&mut self) {
        self.board.do_null_move();
        self.make_move_end();
    }

    fn unmake_null_move(&mut self) {
        self.board.undo_null_move();
        self.cur_ply -= 1;
    }

    fn update_pv_line(&mut self, best_move: Move) {
        let (current, children) = self.stack.split_at_mut(self.cur_ply + 1);
        let pv_line = &mut current[self.cur_ply].pv_line;
        pv_line.clear();
        pv_line.push(best_move);
        pv_line.extend_from_slice(&children[0].pv_line);
    }

    // --- Pruning, extensions, reductions. -------------------------

    /// Reverse futility pruning.
    fn can_rfp(&self, is_pv_node: bool, depth: Depth) -> bool {
        !is_pv_node && depth <= 6 && !self.board.in_check()
    }

    fn rfp_margin(depth: Depth) -> i32 {
        75 * depth as i32
    }

    /// Null-move pruning requires at least one own non-king,
    /// non-pawn piece; with bare pawns the chance of zugzwang is too
    /// high.
    fn material_can_nmp(&self) -> bool {
        let mut piece_cnt = pop_count(self.board.pieces.color[self.board.to_move]) as i32;
        piece_cnt -= 1;
        piece_cnt -= pop_count(self.board.bb(PAWN, self.board.to_move)) as i32;
        piece_cnt >= 1
    }

    fn can_nmp(&self, is_pv_node: bool, depth: Depth, eval: Value, beta: Value) -> bool {
        !is_pv_node && depth >= 2 && !self.board.in_check() && eval >= beta &&
        self.material_can_nmp()
    }

    fn nmp_reduction(depth: Depth) -> Depth {
        2 + depth / 5
    }

    /// Late-move pruning.
    fn can_lmp(depth: Depth, moves_played: i32) -> bool {
        depth <= 2 && moves_played >= 4 + 6 * depth as i32
    }

    /// Currently the only extension: one ply for giving check.
    fn extension(gives_check: bool) -> Depth {
        gives_check as Depth
    }

    fn can_lmr(depth: Depth) -> bool {
        depth >= 3
    }

    /// Late-move reductions.
    fn lmr(depth: Depth, moves_played: i32, is_pv_node: bool) -> Depth {
        let depth = ::std::cmp::min(depth, 63) as usize;
        let moves_played = ::std::cmp::min(moves_played, 63) as usize;
        let mut reduction = LMR_REDUCTION[depth][moves_played];
        reduction -= is_pv_node as Depth;
        ::std::cmp::max(reduction, 0)
    }

    // --- Killers and history. -------------------------------------

    /// Only unique killers are stored, with FIFO replacement.
    fn update_killers(&mut self, cutoff_move: Move) {
        let ply = self.cur_ply;
        let killers = &mut self.stack[ply].killers;
        if let Some(position) = killers.iter().position(|k| *k == cutoff_move) {
            killers[..position + 1].rotate_right(1);
        } else {
            killers.rotate_right(1);
            killers[0] = cutoff_move;
        }
    }

    fn butterfly_history_bonus(depth: Depth) -> i32 {
        depth as i32 * depth as i32
    }

    fn clamp_history_value(bonus: i32) -> HistoryValue {
        if bonus < HISTORY_MIN as i32 {
            HISTORY_MIN
        } else if bonus > HISTORY_MAX as i32 {
            HISTORY_MAX
        } else {
            bonus as HistoryValue
        }
    }

    /// The gravity update: the closer a score is to its bound, the
    /// smaller the step towards it.
    fn update_butterfly_history(&mut self, updated_move: Move, clamped_bonus: HistoryValue) {
        let us = self.board.to_move;
        let from = updated_move.orig_square();
        let to = updated_move.dest_square();
        let entry = &mut self.butterfly_hist[us][from][to];
        let updated = *entry as i32 + clamped_bonus as i32 -
                      *entry as i32 * (clamped_bonus as i32).abs() / HISTORY_MAX as i32;
        *entry = updated as HistoryValue;
    }

    /// Rewards the cutoff move and punishes the quiet moves tried
    /// before it.
    fn update_quiet_histories(&mut self, cutoff_move: Move, quiets_played: &[Move],
                              depth: Depth) {
        self.update_killers(cutoff_move);
        let bonus = Searcher::butterfly_history_bonus(depth);
        self.update_butterfly_history(cutoff_move, Searcher::clamp_history_value(bonus));
        let clamped_malus = Searcher::clamp_history_value(-4 * bonus);
        for quiet_move in quiets_played {
            self.update_butterfly_history(*quiet_move, clamped_malus);
        }
    }

    // --- The search proper. ---------------------------------------

    /// Quiescence search: stand pat, then captures (and queen
    /// promotions) only, to settle the tactics at the leaves.
    fn qsearch(&mut self, mut alpha: Value, beta: Value) -> Value {
        if self.stop_requested() {
            return 0;
        }
        if self.cur_ply == PLY_MAX {
            return evaluator::evaluate(&self.board);
        }
        if self.board.is_draw() {
            return VALUE_DRAW;
        }
        // A transposition-table move makes things worse here.
        let mut picker = MovePicker::new(&self.board,
                                         PickerType::Qsearch,
                                         Move::NULL,
                                         self.stack[self.cur_ply].killers);
        let mut best_value = VALUE_MIN;
        if !self.board.in_check() {
            // Can only stand pat when not in check.
            best_value = evaluator::evaluate(&self.board);
        }
        if best_value > alpha {
            alpha = best_value;
            if best_value >= beta {
                return best_value;
            }
        }
        loop {
            let picked_move = picker.next(&self.board, &self.butterfly_hist);
            if picked_move == Move::NULL {
                break;
            }
            self.make_move(picked_move);
            let value = -self.qsearch(-beta, -alpha);
            self.unmake_move();
            if value > best_value {
                best_value = value;
                if value > alpha {
                    alpha = value;
                    if value >= beta {
                        break;
                    }
                    self.update_pv_line(picked_move);
                }
            }
        }
        if best_value == VALUE_MIN {
            // In check with no moves left: checkmate.
            return mated_value(self.cur_ply);
        }
        best_value
    }

    /// Principal variation search.
    fn pvs(&mut self, depth: Depth, mut alpha: Value, beta: Value) -> Value {
        if self.stop_requested() {
            return 0;
        }
        if self.cur_ply == PLY_MAX {
            return evaluator::evaluate(&self.board);
        }
        if depth <= 0 {
            return self.qsearch(alpha, beta);
        }
        if self.board.is_draw() {
            return VALUE_DRAW;
        }
        let is_root_node = self.cur_ply == 0;
        let is_pv_node = beta as i32 - alpha as i32 > 1;

        let hash = self.board.hash;
        let tte = *self.tt.find(hash);
        let mut tt_move = Move::NULL;
        if tte.is_valid() {
            tt_move = tte.best_move();
            let tt_value = tte.search_value(self.cur_ply);
            if tte.depth() as Depth >= depth {
                if tte.bound() & BOUND_LOWER != 0 && tt_value >= beta {
                    return tt_value;
                }
                if tte.bound() & BOUND_UPPER != 0 && tt_value <= alpha {
                    return tt_value;
                }
            }
        }
        let eval = if tte.is_valid() {
            tte.search_value(self.cur_ply)
        } else {
            evaluator::evaluate(&self.board)
        };

        if self.can_rfp(is_pv_node, depth) {
            if eval as i32 - Searcher::rfp_margin(depth) >= beta as i32 {
                return eval;
            }
        }

        if self.can_nmp(is_pv_node, depth, eval, beta) {
            let reduction = Searcher::nmp_reduction(depth);
            self.make_null_move();
            let value = -self.pvs(depth - reduction - 1, -beta, -beta + 1);
            self.unmake_null_move();
            if value >= beta {
                return value;
            }
        }

        let mut picker = MovePicker::new(&self.board,
                                         PickerType::Main,
                                         tt_move,
                                         self.stack[self.cur_ply].killers);
        let mut best_value = VALUE_MIN;
        let mut best_move = Move::NULL;
        let mut tt_bound: Bound = BOUND_UPPER;
        let in_check = self.board.in_check();
        let mut quiets_played: Vec<Move> = Vec::with_capacity(MOVE_VEC_RESERVE_CAP);
        let mut moves_played: i32 = 0;
        loop {
            let picked_move = picker.next(&self.board, &self.butterfly_hist);
            if picked_move == Move::NULL {
                break;
            }
            let is_capture = self.board.is_capture(picked_move);
            if !is_root_node && Searcher::can_lmp(depth, moves_played) {
                picker.skip_quiet_moves();
            }
            self.make_move(picked_move);
            let is_first_move = moves_played == 0;
            let gives_check = self.board.in_check();
            let ext = Searcher::extension(gives_check);
            let new_depth = depth + ext - 1;
            let value = if is_first_move {
                -self.pvs(new_depth, -beta, -alpha)
            } else {
                let mut reduction = 0;
                if Searcher::can_lmr(depth) {
                    reduction = Searcher::lmr(depth, moves_played, is_pv_node);
                }
                let mut value = -self.pvs(new_depth - reduction, -alpha - 1, -alpha);
                if value > alpha && reduction > 0 {
                    value = -self.pvs(new_depth, -alpha - 1, -alpha);
                }
                if value > alpha && is_pv_node {
                    value = -self.pvs(new_depth, -beta, -alpha);
                }
                value
            };
            self.unmake_move();
            if value > best_value {
                best_value = value;
                best_move = picked_move;
                if value > alpha {
                    alpha = value;
                    tt_bound = BOUND_EXACT;
                    if value >= beta {
                        tt_bound = BOUND_LOWER;
                        if !in_check && !is_capture {
                            self.update_quiet_histories(picked_move, &quiets_played, depth);
                        }
                        break;
                    }
                    self.update_pv_line(picked_move);
                }
            }
            if !in_check && !is_capture {
                quiets_played.push(picked_move);
            }
            moves_played += 1;
        }
        if best_value == VALUE_MIN {
            // No move raised the score: checkmate or stalemate.
            return if self.board.in_check() {
                mated_value(self.cur_ply)
            } else {
                VALUE_DRAW
            };
        }
        self.tt
            .find(hash)
            .update(hash, best_move, best_value, depth as u8, tt_bound, self.cur_ply);
        best_value
    }

    /// Searches with a window centred on the previous iteration's
    /// score, widening exponentially on failure.
    fn aspiration_window(&mut self, depth: Ply) {
        if depth == 1 {
            self.root_value = self.pvs(depth as Depth, VALUE_MIN, VALUE_MAX);
            return;
        }
        let mut delta = ASP_WINDOW_SIZE;
        let mut alpha = clamp_value(self.root_value as i32 - delta);
        let mut beta = clamp_value(self.root_value as i32 + delta);
        loop {
            self.root_value = self.pvs(depth as Depth, alpha, beta);
            if self.root_value <= alpha && alpha > VALUE_MIN {
                alpha = clamp_value(self.root_value as i32 - delta);
            } else if self.root_value >= beta && beta < VALUE_MAX {
                beta = clamp_value(self.root_value as i32 + delta);
            } else {
                break;
            }
            delta *= 2;
        }
    }

    /// Estimates from the effective branching factor whether the next
    /// depth would still finish within the budget.
    fn can_search_next_depth(&mut self) -> bool {
        if self.iter_depth == 1 {
            self.depth_one_node_cnt = self.node_cnt;
            return true;
        }
        let base = self.node_cnt as f64 / self.depth_one_node_cnt as f64;
        let exponent = 1.0 / (self.iter_depth - 1) as f64;
        let branching_factor = base.powf(exponent);
        self.within_time_limit((self.elapsed() as f64 * branching_factor) as Millis)
    }

    fn iterative_deepening(&mut self) {
        for depth in 1..self.max_depth + 1 {
            self.iter_depth = depth;
            self.reset_info();
            self.aspiration_window(depth);
            if self.stop_requested() {
                return;
            }
            self.print_info();
            self.update_bestmove();
            if !self.can_search_next_depth() {
                return;
            }
        }
    }

    // --- Reporting. -----------------------------------------------

    fn emit(&self, line: String) {
        self.sink.lock().unwrap().send_line(line);
    }

    fn pv_str(&self) -> String {
        let mut pv_str = String::new();
        for pv_move in self.stack[0].pv_line.iter() {
            if !pv_str.is_empty() {
                pv_str.push(' ');
            }
            pv_str.push_str(&pv_move.notation());
        }
        pv_str
    }

    fn print_info(&self) {
        debug_assert!(!self.stop_requested());
        let millis = self.elapsed();
        let nps = 1000 * self.node_cnt / millis;
        self.emit(format!("info depth {} score {} nodes {} nps {} hashfull {} time {} pv {}",
                          self.iter_depth,
                          value_to_uci_str(self.root_value),
                          self.node_cnt,
                          nps,
                          self.tt.hashfull(),
                          millis,
                          self.pv_str()));
    }

    fn update_bestmove(&mut self) {
        if let Some(first) = self.stack[0].pv_line.first() {
            self.bestmove = *first;
        }
    }

    fn print_bestmove(&self) {
        let notation = if self.bestmove == Move::NULL {
            "0000".to_string()
        } else {
            self.bestmove.notation()
        };
        self.emit(format!("bestmove {}", notation));
    }
}

#[inline]
fn clamp_value(value: i32) -> Value {
    if value < VALUE_MIN as i32 {
        VALUE_MIN
    } else if value > VALUE_MAX as i32 {
        VALUE_MAX
    } else {
        value as Value
    }
}
