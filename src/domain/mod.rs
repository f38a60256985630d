//! Domain types shared by the filter and defer engines.

pub mod error;
pub mod marker;
