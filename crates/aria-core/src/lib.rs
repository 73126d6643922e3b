//! aria-core: Shared types and utilities for the Aria player DSP engine
//!
//! This crate provides the foundational sample types used across the Aria
//! effect crates.

mod sample;

pub use sample::*;
