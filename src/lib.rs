//! Moving averages over timestamped samples.
//!
//! [`MovingAverage`] is a plain, single-owner window. To feed one window from
//! several tasks, spawn it behind an [`AverageHandle`].

mod average_actor;
mod avg_range;
mod time_data;

pub use average_actor::{AverageActor, AverageError, AverageHandle, AverageMsg};
pub use avg_range::{
    period_from_env_value, MovingAverage, DEFAULT_PERIOD, MAX_PERIOD, PERIOD_ENV,
};
pub use time_data::TimeData;
