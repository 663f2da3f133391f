//! Numeric sensor entries with rolling statistics.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Number of samples kept for the rolling average unless overridden.
pub const DEFAULT_SENSOR_WINDOW: usize = 60;

#[derive(Debug, Default)]
struct SensorState {
    value: f64,
    min: Option<f64>,
    max: Option<f64>,
    average: f64,
    samples: VecDeque<f64>,
}

/// A floating-point reading with lifetime min/max and a windowed average.
///
/// Every `set_value` pushes into a bounded FIFO sample window (oldest sample
/// evicted once the window is full), updates the lifetime min/max, and
/// recomputes the mean over the current window. The unit is fixed at
/// construction.
#[derive(Debug)]
pub struct SensorEntry {
    id: String,
    name: String,
    unit: String,
    window: usize,
    state: Mutex<SensorState>,
}

impl SensorEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
            window: DEFAULT_SENSOR_WINDOW,
            state: Mutex::new(SensorState::default()),
        }
    }

    /// Override the rolling-average window size (minimum 1).
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Publish a new reading, updating the derived statistics.
    pub fn set_value(&self, value: f64) {
        let mut state = self.state.lock();

        state.value = value;
        state.samples.push_back(value);
        if state.samples.len() > self.window {
            state.samples.pop_front();
        }

        state.min = Some(state.min.map_or(value, |m| m.min(value)));
        state.max = Some(state.max.map_or(value, |m| m.max(value)));
        state.average = state.samples.iter().sum::<f64>() / state.samples.len() as f64;
    }

    /// Most recently published value (0.0 before the first publish).
    pub fn value(&self) -> f64 {
        self.state.lock().value
    }

    /// Lifetime minimum; `None` before the first publish.
    pub fn min(&self) -> Option<f64> {
        self.state.lock().min
    }

    /// Lifetime maximum; `None` before the first publish.
    pub fn max(&self) -> Option<f64> {
        self.state.lock().max
    }

    /// Mean over the current sample window (0.0 before the first publish).
    pub fn average(&self) -> f64 {
        self.state.lock().average
    }
}
