//! Custom scalar types.

pub mod scalars;

pub use scalars::{canonicalize, register_scalars};
