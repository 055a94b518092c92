//! Shared library modules providing error types, identifier validation,
//! external process execution, and telemetry initialization.

pub mod errors;
pub mod ident;
pub mod paths;
pub mod process;
pub mod telemetry;
