//! Core logic
//!
//! Recipe model, concretization and the build driver. Process spawning
//! and filesystem access go through [`crate::infra`].
//!
//! # Submodules
//!
//! - [`version`] - Version tags and range guards
//! - [`variants`] - Variant declarations and resolution
//! - [`flags`] - Flag categories and placement policies
//! - [`recipe`] - Recipe definitions and the [`recipe::Recipe`] trait
//! - [`spec`] - Concrete specs, compilers, platforms and prefixes
//! - [`lifecycle`] - Build phases and callbacks
//! - [`context`] - Per-build context handed to callbacks
//! - [`normalize`] - Guarded post-install file placement
//! - [`manifest`] - Prerequisite manifest
//! - [`resolver`] - Concretization and build order
//! - [`repository`] - Recipe registry
//! - [`driver`] - Local build driver

pub mod context;
pub mod driver;
pub mod flags;
pub mod lifecycle;
pub mod manifest;
pub mod normalize;
pub mod recipe;
pub mod repository;
pub mod resolver;
pub mod spec;
pub mod variants;
pub mod version;
