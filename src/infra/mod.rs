//! Infrastructure layer
//!
//! Handles all I/O: filesystem, external build tools and source staging.
//! This module is the only place where side effects occur.

pub mod dirs;
pub mod filesystem;
pub mod process;
pub mod stage;
