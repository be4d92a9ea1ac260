//! FFI boundary (PyO3)
//!
//! Python bindings for the matrix engine. The boundary is deliberately
//! minimal and safe: configuration and snapshots cross as JSON strings,
//! reports cross as plain dicts, and no Rust references leak to Python.

mod convert;
pub mod engine;

pub use engine::PyMatrixEngine;
