// src/flow/mod.rs

//! The `Flow` type: declaration and structural edits (`definition`), handler
//! registration (`hooks`) and the run loop (`execution`).

pub mod definition;
pub mod execution;
pub mod hooks;

pub use definition::Flow;
