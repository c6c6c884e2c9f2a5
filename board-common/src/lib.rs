//! Board Common - Shared configuration, logging and errors for the market board tools.
//!
//! This crate provides:
//! - Configuration types and loading (JSON file + `BOARD_*` environment overrides)
//! - Error types and handling utilities
//! - Logging setup with noise filtering
//! - Small formatting helpers shared by the renderers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{
    AdvisorConfig, Config, EmailConfig, FuturesPairConfig, HotListConfig, HttpConfig,
    IndicatorConfig, InstrumentConfig, ObservabilityConfig, OutputConfig, SnapshotConfig,
};
pub use error::{Error, Result, ResultExt};
