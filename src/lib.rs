//! Library crate root re-exporting the forge modules.

#[path = "lib/mod.rs"]
pub mod lib_mod;
pub use lib_mod as lib;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod codegen;
pub mod config;
pub mod deploy;
pub mod store;
