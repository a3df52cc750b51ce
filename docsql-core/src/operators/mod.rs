//! Relational operators over in-memory row sets.

mod group;
mod join;
mod union;

pub use group::{group, order, partition};
pub use join::{combine, join};
pub use union::{distinct, union};
