/// Features for token linking
pub mod item;

/// Batcher for token linking
pub mod batcher;

/// Turning link rows into triples
pub mod decode;

/// Training and evaluation routine
pub mod training;

pub use batcher::Batcher;
pub use item::Feature;

/// Column of tokens outside every mention, and of the `[CLS]`/`[SEP]` edge rows
pub const OUTSIDE: usize = 0;

/// Column of tokens that continue a mention
pub const CONTINUATION: usize = 1;

/// Width of a link row
pub fn n_columns(n_predicates: usize) -> usize {
    n_predicates * 2 + 2
}

/// Column marking the start of a subject for a predicate
pub fn subject_column(predicate: usize) -> usize {
    predicate + 2
}

/// Column marking the start of an object for a predicate
pub fn object_column(predicate: usize, n_predicates: usize) -> usize {
    predicate + 2 + n_predicates
}
