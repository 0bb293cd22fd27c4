use std::{collections::VecDeque, env};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace, warn};

use crate::time_data::TimeData;

/// Upper bound for the window size, 24 days worth of one-second samples.
pub const MAX_PERIOD: usize = 2_073_600;
pub const DEFAULT_PERIOD: usize = 10;
/// Environment variable read by [`MovingAverage::from_env`].
pub const PERIOD_ENV: &str = "MOVING_AVERAGE_PERIOD";

/// A sliding window over the most recent samples.
///
/// The window keeps at most `period` samples, dropping the oldest one when a
/// new sample pushes it over. A running sum is kept so that [`average`] does
/// not need to walk the window.
///
/// [`average`]: MovingAverage::average
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<TimeData>,
    period: usize,
    sum: f64,
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new()
    }
}

impl MovingAverage {
    pub fn new() -> Self {
        Self::with_period(DEFAULT_PERIOD)
    }

    /// Periods above [`MAX_PERIOD`] are clamped down to it.
    pub fn with_period(period: usize) -> Self {
        Self {
            window: VecDeque::new(),
            period: clamp_period(period),
            sum: 0f64,
        }
    }

    /// Uses the period from `MOVING_AVERAGE_PERIOD`, or [`DEFAULT_PERIOD`] if
    /// it is unset or not a number.
    pub fn from_env() -> Self {
        let value = env::var(PERIOD_ENV).ok();
        Self::with_period(period_from_env_value(value.as_deref()))
    }

    pub fn add_data(&mut self, data: TimeData) {
        self.sum += data.value();
        self.window.push_back(data);
        if self.window.len() > self.period {
            if let Some(evicted) = self.window.pop_front() {
                trace!("Evicting sample from {}", evicted.timestamp());
                self.sum -= evicted.value();
            }
        }
    }

    /// Add a value, stamped with the current time.
    pub fn add_value(&mut self, value: f64) {
        self.add_data(TimeData::new(value));
    }

    pub fn add_list_of_data<I>(&mut self, data: I)
    where
        I: IntoIterator<Item = TimeData>,
    {
        for sample in data {
            self.add_data(sample);
        }
    }

    /// A copy of the samples in the window, oldest first.
    pub fn window(&self) -> VecDeque<TimeData> {
        self.window.clone()
    }

    pub fn first_entry(&self) -> Option<TimeData> {
        self.window.front().copied()
    }

    pub fn last_entry(&self) -> Option<TimeData> {
        self.window.back().copied()
    }

    /// Time covered by the window.
    ///
    /// Only the whole seconds of the first entry are subtracted from the last
    /// entry's timestamp, so the sub-second part of the first entry leaks into
    /// the result. Consumers depend on this, keep it.
    pub fn time_span(&self) -> Option<Duration> {
        let first = self.first_entry()?;
        let last = self.last_entry()?;
        let last = last.timestamp();
        Some(
            Duration::seconds(last.timestamp() - first.timestamp().timestamp())
                + Duration::nanoseconds(i64::from(last.timestamp_subsec_nanos())),
        )
    }

    /// Mean of the values in the window, or 0 if the window is empty.
    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            // technically the average is undefined
            return 0f64;
        }
        self.sum / self.window.len() as f64
    }

    /// Mean of the values captured within the last `duration`, or 0 if there
    /// are none.
    ///
    /// # Panics
    ///
    /// If `duration` is negative.
    pub fn time_based_average_of(&self, duration: Duration) -> f64 {
        self.time_based_average_at(duration, Utc::now())
    }

    /// Like [`time_based_average_of`], measured back from `now` instead of the
    /// system clock.
    ///
    /// [`time_based_average_of`]: MovingAverage::time_based_average_of
    pub fn time_based_average_at(&self, duration: Duration, now: DateTime<Utc>) -> f64 {
        assert!(duration >= Duration::zero(), "Time period must be positive");

        let cutoff = now.checked_sub_signed(duration);
        let (total, count) = self
            .window
            .iter()
            .filter(|sample| cutoff.map_or(true, |cutoff| sample.timestamp() > cutoff))
            .fold((0f64, 0usize), |(total, count), sample| {
                (total + sample.value(), count + 1)
            });

        if count == 0 {
            return 0f64;
        }
        total / count as f64
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Changing the period throws away everything in the window.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn set_period(&mut self, period: usize) {
        self.period = clamp_period(period);
        self.reset();
    }

    /// Whether the window has room left before samples start getting evicted.
    pub fn is_filling(&self) -> bool {
        self.window.len() < self.period
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn reset(&mut self) {
        debug!("Dropping {} samples", self.window.len());
        self.window.clear();
        self.sum = 0f64;
    }
}

fn clamp_period(period: usize) -> usize {
    if period > MAX_PERIOD {
        warn!("Period {} is too large, using {}", period, MAX_PERIOD);
        return MAX_PERIOD;
    }
    period
}

/// Parse the value of `MOVING_AVERAGE_PERIOD`.
pub fn period_from_env_value(value: Option<&str>) -> usize {
    match value.map(str::trim) {
        None | Some("") => DEFAULT_PERIOD,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(
                "{} is not a valid period: {:?}, using {}",
                PERIOD_ENV, value, DEFAULT_PERIOD
            );
            DEFAULT_PERIOD
        }),
    }
}
