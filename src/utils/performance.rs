//! Timing records for passes and transforms

use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// One timed operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingRecord {
    pub operation: String,
    pub duration_ms: f32,
}

/// Performance monitor for measuring operation times
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    measurements: HashMap<String, Vec<f32>>,
    records: Vec<TimingRecord>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_measurement(&mut self, operation: &str, duration_ms: f32) {
        self.measurements
            .entry(operation.to_string())
            .or_default()
            .push(duration_ms);
        self.records.push(TimingRecord {
            operation: operation.to_string(),
            duration_ms,
        });
    }

    /// Run `f`, recording its wall-clock time under `operation`
    pub fn time<T>(&mut self, operation: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        self.record_measurement(operation, elapsed_ms(started));
        result
    }

    pub fn get_average_time(&self, operation: &str) -> Option<f32> {
        self.measurements.get(operation).map(|times| {
            if times.is_empty() {
                0.0
            } else {
                times.iter().sum::<f32>() / times.len() as f32
            }
        })
    }

    /// Every measurement in the order it was taken
    pub fn records(&self) -> &[TimingRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TimingRecord> {
        self.records
    }
}

/// Milliseconds since `started`
pub fn elapsed_ms(started: Instant) -> f32 {
    started.elapsed().as_secs_f32() * 1000.0
}
