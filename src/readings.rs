// Copyright 2026 Daniel Pelikan
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

//! Scale readings and an in-memory reading history.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// One decoded value from the scale, 0-255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reading(u8);

impl Reading {
    /// Downstream marker for "no data received yet".
    pub const NO_DATA: Reading = Reading(255);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub fn is_no_data(self) -> bool {
        self == Self::NO_DATA
    }

    /// Gauge zone the value falls in.
    pub fn zone(self) -> Zone {
        match self.0 {
            0..=60 => Zone::Low,
            61..=100 => Zone::Medium,
            _ => Zone::High,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Reading {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u8>().map(Reading)
    }
}

impl From<u8> for Reading {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Gauge zone of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Low,
    Medium,
    High,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Low => "low",
            Zone::Medium => "medium",
            Zone::High => "high",
        }
    }
}

/// A reading with the time it was received.
#[derive(Debug, Clone, Copy)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub reading: Reading,
}

/// Bounded history of received readings, oldest dropped first.
#[derive(Debug, Clone)]
pub struct ReadingHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ReadingHistory {
    /// Create a history holding at most `capacity` readings.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a reading received now.
    pub fn push(&mut self, reading: Reading) {
        self.push_at(reading, Local::now());
    }

    pub fn push_at(&mut self, reading: Reading, timestamp: DateTime<Local>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry { timestamp, reading });
    }

    /// Most recent reading, or `Reading::NO_DATA` when empty.
    pub fn latest(&self) -> Reading {
        self.entries
            .back()
            .map(|e| e.reading)
            .unwrap_or(Reading::NO_DATA)
    }

    pub fn min(&self) -> Option<Reading> {
        self.entries.iter().map(|e| e.reading).min()
    }

    pub fn max(&self) -> Option<Reading> {
        self.entries.iter().map(|e| e.reading).max()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
