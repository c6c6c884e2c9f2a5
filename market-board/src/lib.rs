//! Market Board Library
//!
//! Scheduled jobs that turn free A-share market data into static pages:
//! a market snapshot dashboard, a dividend-ETF gradient advisor and a
//! hot-concept report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          market-board                               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │  data           │  │  analysis       │  │  render         │     │
//! │  │  source chains  │─▶│  strategy       │─▶│  html / svg     │     │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘     │
//! │                         pipeline (snapshot / advise / hot / demo)   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Source chains
//! - Every vendor endpoint is interchangeable behind a source trait
//! - A chain tries sources in priority order and stops at the first answer
//!
//! ## Gradient strategy
//! - Signal: ETF minus benchmark trailing return over 40 sessions
//! - Underperformance buys extra on a 30-step table
//! - Outperformance sells part of the extra position, never the base

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod data;
pub mod notification;
pub mod pipeline;
pub mod render;
pub mod strategy;

pub use pipeline::MarketSources;
