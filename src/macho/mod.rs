//! Mach-O kernel image handling.
//!
//! This module provides types and utilities for decoding the 64-bit
//! Mach-O kernel caches shipped inside firmware bundles: the header and
//! load-command structures, the constants they use, and a read-only
//! walker that recovers the segment map and entry point.

mod constants;
mod image;
mod structs;

pub use constants::*;
pub use image::*;
pub use structs::*;
