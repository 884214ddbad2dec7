//! Time-of-use electricity tariff.

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use serde::Deserialize;

/// A daily on-peak interval, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeakWindow {
    /// Start hour of day (0-23).
    pub start_hour: u32,
    /// End hour of day (0-24), inclusive.
    pub end_hour: u32,
}

impl PeakWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    fn contains(&self, instant: NaiveDateTime) -> bool {
        let secs = instant.time().num_seconds_from_midnight();
        secs >= self.start_hour * 3600 && secs <= self.end_hour * 3600
    }
}

/// Weekday peak windows: morning 06:00-09:00 and evening 18:00-22:00.
pub const DEFAULT_PEAK_WINDOWS: [PeakWindow; 2] = [PeakWindow::new(6, 9), PeakWindow::new(18, 22)];

/// Electricity price lookup with a precomputed per-timestep series.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, TimeDelta};
/// use depot_sim::sim::price::{PriceModel, DEFAULT_PEAK_WINDOWS};
///
/// let start = NaiveDate::from_ymd_opt(2024, 12, 6).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let end = start + TimeDelta::hours(24);
/// let prices = PriceModel::new(0.08, 0.20, DEFAULT_PEAK_WINDOWS.to_vec(), TimeDelta::hours(1), start, end);
/// assert_eq!(prices.series().len(), 24);
/// assert_eq!(prices.series()[7], 0.20);
/// assert_eq!(prices.series()[12], 0.08);
/// ```
#[derive(Debug, Clone)]
pub struct PriceModel {
    pub off_peak_rate: f32,
    pub on_peak_rate: f32,
    peak_windows: Vec<PeakWindow>,
    timestep: TimeDelta,
    start: NaiveDateTime,
    price_series: Vec<f32>,
}

impl PriceModel {
    /// Creates the tariff and precomputes prices over `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `timestep` is not positive or `end < start`.
    pub fn new(
        off_peak_rate: f32,
        on_peak_rate: f32,
        peak_windows: Vec<PeakWindow>,
        timestep: TimeDelta,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        assert!(timestep > TimeDelta::zero());
        assert!(end >= start);

        let mut model = Self {
            off_peak_rate,
            on_peak_rate,
            peak_windows,
            timestep,
            start,
            price_series: Vec::new(),
        };
        model.price_series = model.build_series(end);
        model
    }

    /// Price per kWh at `instant`.
    ///
    /// Weekends are always off-peak; on weekdays the on-peak rate applies
    /// inside any peak window.
    pub fn price_at(&self, instant: NaiveDateTime) -> f32 {
        if instant.weekday().num_days_from_monday() > 4 {
            return self.off_peak_rate;
        }
        if self.peak_windows.iter().any(|w| w.contains(instant)) {
            self.on_peak_rate
        } else {
            self.off_peak_rate
        }
    }

    fn build_series(&self, end: NaiveDateTime) -> Vec<f32> {
        let mut series = Vec::new();
        let mut t = self.start;
        while t < end {
            series.push(self.price_at(t));
            t += self.timestep;
        }
        series
    }

    /// Precomputed prices, one per timestep from the start of the schedule.
    pub fn series(&self) -> &[f32] {
        &self.price_series
    }
}
