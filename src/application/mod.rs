//! Filter composition, deferred substitution and the request pipeline around them.

pub mod defer;
pub mod error;
pub mod filter;
pub mod page;
pub mod request;
