//! hpcprereqs - build recipes for the HPCToolkit prerequisite stack
//!
//! Each recipe declares how to fetch, configure, compile and install one
//! third-party library so the set composes into a working HPCToolkit
//! installation. A small local driver resolves a request into a build
//! plan and runs the recipes' lifecycles in dependency order.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Recipe model, resolution and the build driver
//! - [`recipes`] - The built-in recipes
//! - [`infra`] - Infrastructure layer (filesystem, processes, staging)
//! - [`config`] - Settings and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
pub mod recipes;
