//! Defines the `Depth` and `Ply` types and their related constants.

/// Remaining search depth in half-moves.
///
/// Searches are started with a positive remaining depth, which is
/// decreased by one (possibly more, when reductions apply) every time
/// a move is tried. A leaf is reached when the remaining depth drops
/// to zero or below, at which point a quiescence search is performed
/// to obtain a reliable evaluation. Because of reductions the
/// remaining depth can become negative, so the type is signed.
pub type Depth = i16;

/// The distance in half-moves from the root of the search.
pub type Ply = usize;

/// The maximum allowed distance from the root.
///
/// One less than the byte maximum, so that a stored 8-bit ply can be
/// incremented without wrapping.
pub const PLY_MAX: Ply = 254;
