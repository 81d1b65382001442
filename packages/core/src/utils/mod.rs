//! Utility functions for ObjectSpace Core
//!
//! This module provides pure helpers used across the codebase.

pub mod units;

pub use units::{base_unit, convert, UnitFamily};
