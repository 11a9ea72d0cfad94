//! Domain types for StratLab

pub mod bar;
pub mod parameter;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use parameter::{ParameterDef, ParameterError, Parameters};
pub use position::{Position, TimestampedValue, TradeDirection};
pub use trade::{ExitReason, Trade};
