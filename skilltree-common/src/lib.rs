//! # Skill-tree Common Library
//!
//! Shared code for the skill-tree catalog tools including:
//! - Error type used across store and configuration code
//! - Configuration loading (environment, TOML file, compiled defaults)
//! - SQLite schema initialization
//! - Row models for machines, techniques and certifications

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
