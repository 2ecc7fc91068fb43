//! Result types returned by providers and the dispatch manager

mod types;

pub use types::*;
