//! Folio application library
//!
//! Book catalogue, library relationships and the social API, packaged as
//! kernel modules.

// OpenAPI fragments are large `json!` literals
#![recursion_limit = "256"]

pub mod app;
pub mod modules;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use app::App;
