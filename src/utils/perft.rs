//! Implements `perft`.

use std::collections::HashSet;
use crate::bitsets::*;
use crate::board::{Board, PieceType, Square, KNIGHT, QUEEN, WHITE};
use crate::files::file;
use crate::move_generator::MoveGenerator;
use crate::moves::Move;
use crate::ranks::{rank, RANK_7, RANK_8};

/// Performs move path enumeration.
///
/// `perft` is a debugging function to walk the move generation tree
/// of strictly legal moves and count all the leaf nodes of a certain
/// depth, which can be compared to predetermined values and used to
/// isolate bugs. In perft, nodes are only counted at the end after
/// the last `do_move`. Thus "higher" terminal nodes (e.g. mate or
/// stalemate) are not counted. Perft ignores draws by repetition, by
/// the fifty-move rule and by insufficient material.
pub fn perft(board: &mut Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = {
        let mut gen = MoveGenerator::new(board);
        gen.generate_all();
        gen.filter_legal();
        gen.take_moves()
    };
    let mut nodes = 0;
    for m in moves {
        board.do_move(m);
        nodes += perft(board, depth - 1);
        board.undo_move();
    }
    nodes
}

/// Like `perft`, but at every node additionally cross-checks
/// `Board::is_pseudo_legal` against the generated move set.
///
/// For every knight-step and every ray-step destination reachable
/// from every square (plus the promotion variants on the 7th-to-8th
/// rank steps), `is_pseudo_legal` must agree with membership in the
/// complete pseudo-legal move list. Panics on the first disagreement.
pub fn perft_pseudo_legal(board: &mut Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = {
        let mut gen = MoveGenerator::new(board);
        gen.generate_all();
        check_pseudo_legal(board, gen.moves());
        gen.filter_legal();
        gen.take_moves()
    };
    let mut nodes = 0;
    for m in moves {
        board.do_move(m);
        nodes += perft_pseudo_legal(board, depth - 1);
        board.undo_move();
    }
    nodes
}

const KNIGHT_DIRS: [Direction; 8] = [DIR_NNE, DIR_ENE, DIR_ESE, DIR_SSE, DIR_SSW, DIR_WSW,
                                     DIR_WNW, DIR_NNW];

const KING_DIRS: [Direction; 8] = [DIR_N, DIR_NE, DIR_E, DIR_SE, DIR_S, DIR_SW, DIR_W, DIR_NW];

/// Returns whether `k` steps in direction `d` stay on the board.
fn on_board(from: Square, d: Direction, k: u32) -> bool {
    if k > 7 {
        return false;
    }
    let mut bb = 1u64 << from;
    for _ in 0..k {
        bb = shift(bb, d, WHITE);
        if bb == 0 {
            return false;
        }
    }
    true
}

fn check_one(moves: &HashSet<Move>, board: &Board, from: Square, to: Square,
             promotion: PieceType) {
    let m = if promotion == crate::board::PIECE_NONE {
        Move::new(from, to)
    } else {
        Move::with_promotion(from, to, promotion)
    };
    let generated = moves.contains(&m);
    let validated = board.is_pseudo_legal(m);
    assert_eq!(generated,
               validated,
               "is_pseudo_legal({}) = {} disagrees with move generation for:\n{}",
               m,
               validated,
               board);
}

fn check_square_pair(moves: &HashSet<Move>, board: &Board, from: Square, to: Square) {
    check_one(moves, board, from, to, crate::board::PIECE_NONE);
    if rank(from) == RANK_7 && rank(to) == RANK_8 &&
       (file(to) as isize - file(from) as isize).abs() <= 1 {
        for promotion in KNIGHT..QUEEN + 1 {
            check_one(moves, board, from, to, promotion);
        }
    }
}

fn check_pseudo_legal(board: &Board, generated: &[Move]) {
    let moves: HashSet<Move> = generated.iter().cloned().collect();
    for from in 0..64 {
        for d in KNIGHT_DIRS.iter() {
            if on_board(from, *d, 1) {
                let to = (from as isize + d) as Square;
                check_square_pair(&moves, board, from, to);
            }
        }
        for d in KING_DIRS.iter() {
            let mut k = 1;
            while on_board(from, *d, k) {
                let to = (from as isize + d * k as isize) as Square;
                check_square_pair(&moves, board, from, to);
                k += 1;
            }
        }
    }
}
