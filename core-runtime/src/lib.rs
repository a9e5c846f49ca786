//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the offline media core:
//! - Logging and tracing infrastructure
//! - Configuration management and bridge injection
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the download engine and the
//! service façade depend on. It establishes the logging conventions and the
//! fail-fast validation of host-provided bridges.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
