//! Dividend-ETF gradient strategy.
//!
//! The signal is the differential between the ETF's and the benchmark's
//! trailing returns. A piecewise table turns a negative differential into
//! an extra daily purchase; a threshold map turns a positive one into a
//! partial sale of the extra position.

pub mod gradient;
pub mod signal;
pub mod simulation;

pub use gradient::{BuyTier, GradientRules, SellTier};
pub use signal::{classify, Signal, SignalLevel};
pub use simulation::{
    simulate, DailyInput, GradientPortfolio, SaleOutcome, Simulation, SimulationParams,
    SimulationRow, SimulationSummary, TradeEvent,
};
