// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Efficient storage for rolling frame and memory metrics.

use std::collections::HashMap;
use vigil_core::telemetry::MetricId;

/// Number of samples retained per metric series.
pub const HISTORY_LEN: usize = 100;

/// A fixed-size circular buffer.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    data: [T; N],
    index: usize,
    count: usize,
}

impl<T: Default + Copy, const N: usize> RingBuffer<T, N> {
    /// Creates a new, empty ring buffer.
    pub fn new() -> Self {
        Self {
            data: [T::default(); N],
            index: 0,
            count: 0,
        }
    }

    /// Pushes a new value into the buffer, overwriting the oldest if full.
    pub fn push(&mut self, value: T) {
        self.data[self.index] = value;
        self.index = (self.index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Returns the number of elements currently in the buffer.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` if nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the most recently pushed value.
    pub fn latest(&self) -> Option<T> {
        if self.count == 0 {
            None
        } else {
            Some(self.data[(self.index + N - 1) % N])
        }
    }

    /// Returns an iterator over the values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let start = if self.count < N { 0 } else { self.index };
        (0..self.count).map(move |offset| &self.data[(start + offset) % N])
    }
}

impl<T: Default + Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<f32, N> {
    /// Calculates the arithmetic mean of the values in the buffer.
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.count as f32
    }

    /// Difference between the mean of the newest half and the oldest half.
    /// Positive if the series is increasing.
    pub fn trend(&self) -> f32 {
        if self.count < 2 {
            return 0.0;
        }
        let half = self.count / 2;
        let first_half_avg: f32 = self.iter().take(half).sum::<f32>() / half as f32;
        let last_half_avg: f32 = self.iter().skip(self.count - half).sum::<f32>() / half as f32;
        last_half_avg - first_half_avg
    }

    /// Calculates the population variance of the values in the buffer.
    ///
    /// High variance in frame times indicates stutter.
    pub fn variance(&self) -> f32 {
        if self.count < 2 {
            return 0.0;
        }
        let avg = self.average();
        let sum_sq: f32 = self.iter().map(|v| (v - avg) * (v - avg)).sum();
        sum_sq / self.count as f32
    }

    /// Returns the minimum value in the buffer, or `f32::MAX` if empty.
    pub fn min(&self) -> f32 {
        self.iter().copied().fold(f32::MAX, f32::min)
    }

    /// Returns the maximum value in the buffer, or `f32::MIN` if empty.
    pub fn max(&self) -> f32 {
        self.iter().copied().fold(f32::MIN, f32::max)
    }
}

/// Rolling statistics for one metric series.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesStats {
    /// Number of retained samples.
    pub count: usize,
    /// Arithmetic mean.
    pub average: f32,
    /// Population variance.
    pub variance: f32,
    /// Newest-half mean minus oldest-half mean.
    pub trend: f32,
    /// Smallest retained value.
    pub min: f32,
    /// Largest retained value.
    pub max: f32,
}

/// Store for the rolling metric series, organized by ID.
#[derive(Debug, Default)]
pub struct MetricStore {
    buffers: HashMap<MetricId, RingBuffer<f32, HISTORY_LEN>>,
}

impl MetricStore {
    /// Creates a new empty metric store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new sample for the given metric.
    pub fn push(&mut self, id: MetricId, value: f32) {
        self.buffers
            .entry(id)
            .or_insert_with(RingBuffer::new)
            .push(value);
    }

    /// Returns the statistics of a series, or `None` if it has no samples.
    pub fn stats(&self, id: &MetricId) -> Option<SeriesStats> {
        let buffer = self.buffers.get(id).filter(|b| !b.is_empty())?;
        Some(SeriesStats {
            count: buffer.count(),
            average: buffer.average(),
            variance: buffer.variance(),
            trend: buffer.trend(),
            min: buffer.min(),
            max: buffer.max(),
        })
    }

    /// Returns the sample count for a metric, or 0 if not found.
    pub fn get_sample_count(&self, id: &MetricId) -> usize {
        self.buffers.get(id).map(|b| b.count()).unwrap_or(0)
    }

    /// Returns the newest sample of a metric.
    pub fn latest(&self, id: &MetricId) -> Option<f32> {
        self.buffers.get(id).and_then(|b| b.latest())
    }
}
