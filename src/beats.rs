// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::util;

/// Beat detection results as handed over by the beat detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatInfo {
    /// Median tempo estimate in beats per minute.
    pub bpm: f64,
    /// Beat positions in seconds, strictly increasing.
    pub beat_times: Vec<f64>,
    /// Overall detection confidence, 0.0 to 1.0.
    #[serde(default)]
    pub confidence: f64,
}

impl BeatInfo {
    pub fn new(bpm: f64, beat_times: Vec<f64>, confidence: f64) -> BeatInfo {
        BeatInfo {
            bpm,
            beat_times,
            confidence,
        }
    }

    /// Checks that there are enough beats to infer a bar grid and that they are finite and
    /// ordered.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self.beat_times.len() {
            0 => return Err(SyncError::NoBeats),
            1 => return Err(SyncError::TooFewBeats { found: 1 }),
            _ => {}
        }
        check_finite(&self.beat_times)?;

        match self
            .beat_times
            .windows(2)
            .position(|pair| pair[1] <= pair[0])
        {
            Some(index) => Err(SyncError::UnorderedBeats { index: index + 1 }),
            None => Ok(()),
        }
    }

    /// Returns a copy with every beat moved later by the given number of seconds.
    pub fn shifted(&self, offset_secs: f64) -> BeatInfo {
        BeatInfo {
            bpm: self.bpm,
            beat_times: self.beat_times.iter().map(|t| t + offset_secs).collect(),
            confidence: self.confidence,
        }
    }

    /// Statistics over the beat-to-beat intervals. None with fewer than two beats.
    pub fn interval_stats(&self) -> Option<IntervalStats> {
        IntervalStats::from_beats(&self.beat_times)
    }
}

/// Summary of beat-to-beat intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl IntervalStats {
    pub fn from_beats(beat_times: &[f64]) -> Option<IntervalStats> {
        let intervals = util::intervals(beat_times);
        if intervals.is_empty() {
            return None;
        }

        let count = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / count;
        let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / count;
        let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = intervals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(IntervalStats {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }

    /// Tempo implied by the mean interval.
    pub fn mean_bpm(&self) -> f64 {
        bpm_for_interval(self.mean)
    }
}

/// Rejects NaN and infinite beat times, reporting the first offender.
pub fn check_finite(beat_times: &[f64]) -> Result<(), SyncError> {
    match beat_times.iter().position(|time| !time.is_finite()) {
        Some(index) => Err(SyncError::NonFiniteBeat { index }),
        None => Ok(()),
    }
}

/// Converts a beat interval in seconds to beats per minute. Non-positive intervals yield 0.
pub fn bpm_for_interval(interval: f64) -> f64 {
    if interval > 0.0 {
        60.0 / interval
    } else {
        0.0
    }
}

/// A single sync point, ready to be injected into a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPointData {
    /// Bar index, 0-based.
    pub bar: usize,
    /// Audio sample position. Relative to the first beat or absolute in the file depending
    /// on the addressing mode the result was produced with.
    pub frame_offset: u64,
    /// Detected local tempo at this bar.
    pub modified_tempo: f64,
    /// Tempo declared by the score.
    pub original_tempo: f64,
}

impl SyncPointData {
    pub fn new(
        bar: usize,
        frame_offset: u64,
        modified_tempo: f64,
        original_tempo: f64,
    ) -> SyncPointData {
        SyncPointData {
            bar,
            frame_offset,
            modified_tempo,
            original_tempo,
        }
    }
}

/// The full output of sync point generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Sync points in ascending bar order.
    pub sync_points: Vec<SyncPointData>,
    /// Playback-wide sample shift applied to the backing track.
    pub frame_padding: i64,
    /// Time of the first detected beat in seconds, including any start offset.
    pub first_beat_time: f64,
}

impl SyncResult {
    /// Bars that received a sync point.
    pub fn bars(&self) -> Vec<usize> {
        self.sync_points.iter().map(|sp| sp.bar).collect()
    }

    /// Loads a result previously written by `save`. YAML is used for .yaml/.yml files,
    /// JSON for everything else.
    pub fn load(path: &Path) -> Result<SyncResult, SyncError> {
        let contents = fs::read_to_string(path)?;
        if is_yaml(path) {
            Ok(serde_yml::from_str(&contents)?)
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }

    /// Writes the result, choosing the format from the file extension like `load`.
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let contents = if is_yaml(path) {
            self.to_yaml()?
        } else {
            self.to_json()?
        };
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, SyncError> {
        Ok(serde_yml::to_string(self)?)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}
