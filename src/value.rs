//! Defines the `Value` type and its related constants.

use crate::depth::{Ply, PLY_MAX};

/// Evaluation value in centipawns.
///
/// Positive values mean that the position is favorable for the side
/// to move. Negative values mean the position is favorable for the
/// other side (not to move). A value of `0` means that the chances
/// are equal. For example: a value of `100` might mean that the side
/// to move is a pawn ahead.
///
/// # Constants:
///
/// * `VALUE_MATE` designates a checkmate.
///
///   * `VALUE_MATE - 1` designates an inevitable checkmate (a win) in
///     1 half-move.
///
///   * `-VALUE_MATE + 2` designates an inevitable checkmate (a loss)
///     in 2 half-moves.
///
///   * and so forth.
///
/// * `VALUE_MIN` and `VALUE_MAX` bound every possible value. They are
///   deliberately not the type's extremes, so that `value >= beta`
///   style comparisons and window negations never overflow.
pub type Value = i16;

pub const VALUE_MATE: Value = 20_000;
pub const VALUE_DRAW: Value = 0;
pub const VALUE_MIN: Value = -VALUE_MATE;
pub const VALUE_MAX: Value = VALUE_MATE;

/// A clamped score used by the history heuristic.
pub type HistoryValue = i16;

pub const HISTORY_MAX: HistoryValue = ::std::i16::MAX;
pub const HISTORY_MIN: HistoryValue = -HISTORY_MAX;

/// Returns the value from White's perspective.
#[inline]
pub fn side_value(value: Value, us: usize) -> Value {
    if us == 0 {
        value
    } else {
        -value
    }
}

/// Returns the number of half-moves to the checkmate a given value
/// designates.
#[inline]
pub fn mate_distance(value: Value) -> i32 {
    VALUE_MATE as i32 - (value as i32).abs()
}

/// Returns whether a value designates an inevitable checkmate (a win
/// or a loss).
#[inline]
pub fn is_mate_value(value: Value) -> bool {
    mate_distance(value) <= PLY_MAX as i32
}

/// Returns the value of being checkmated at a given distance from the
/// root.
#[inline]
pub fn mated_value(ply: Ply) -> Value {
    -VALUE_MATE + ply as Value
}

/// Formats a value the way the "info score" field expects it.
///
/// Mate values are converted to full moves: `VALUE_MATE - 1` becomes
/// `mate 1`, `-(VALUE_MATE - 2)` becomes `mate -1`, `VALUE_MATE - 3`
/// becomes `mate 2`, and so forth. Everything else is printed as
/// `cp <centipawns>`.
pub fn value_to_uci_str(value: Value) -> String {
    if is_mate_value(value) {
        let mate_score = if value >= 0 {
            (mate_distance(value) + 1) / 2
        } else {
            -mate_distance(value) / 2
        };
        format!("mate {}", mate_score)
    } else {
        format!("cp {}", value)
    }
}
