//! Integration tests for VRDF crates.
//!
//! End-to-end checks across file format, texture building and the volume
//! controller: file on disk -> resolve -> decode -> textures -> material.

pub mod fixtures;
