//! Utility modules shared across the engine.

pub mod varint;
