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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use crate::beats::BeatInfo;
use crate::drift::{DEFAULT_BEATS_PER_BAR, DEFAULT_SAMPLE_RATE};
use crate::sync::{SyncOptions, DEFAULT_SYNC_INTERVAL};

use super::ConfigError;

/// A single sync job: detected beats plus what is known about the score.
#[derive(Deserialize, Clone, Debug)]
pub struct Job {
    /// Output of the beat detector.
    beats: BeatInfo,

    #[serde(default)]
    score: ScoreInfo,

    #[serde(default)]
    sync: SyncSettings,
}

impl Job {
    /// New will create a job with default score and sync settings.
    pub fn new(beats: BeatInfo) -> Job {
        Job {
            beats,
            score: ScoreInfo::default(),
            sync: SyncSettings::default(),
        }
    }

    pub fn beats(&self) -> &BeatInfo {
        &self.beats
    }

    pub fn score(&self) -> &ScoreInfo {
        &self.score
    }

    pub fn sync(&self) -> &SyncSettings {
        &self.sync
    }

    /// The tempo everything is measured against. Uses the score tempo when present,
    /// otherwise the detected tempo.
    pub fn reference_tempo(&self) -> f64 {
        self.score.tempo().unwrap_or(self.beats.bpm)
    }

    /// Builds the generation options for the given reference tempo.
    pub fn sync_options(&self, original_tempo: f64) -> Result<SyncOptions, ConfigError> {
        Ok(SyncOptions {
            original_tempo,
            beats_per_bar: self.score.beats_per_bar(),
            sync_interval: self.sync.sync_interval(),
            start_offset: self.sync.start_offset()?,
            adaptive: self.sync.adaptive(),
            max_bars: self.score.bar_count(),
            tab_start_bar: self.score.tab_start_bar(),
            sample_rate: self.sync.sample_rate(),
        })
    }
}

/// What the score says about the song.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ScoreInfo {
    /// Notated tempo in BPM.
    tempo: Option<f64>,

    /// Beats per bar (default: 4)
    beats_per_bar: Option<usize>,

    /// Number of bars in the score. Zero or absent estimates it from the beats.
    bar_count: Option<usize>,

    /// First bar that contains notes (default: 0)
    tab_start_bar: Option<usize>,
}

impl ScoreInfo {
    pub fn tempo(&self) -> Option<f64> {
        self.tempo
    }

    /// Returns the beats per bar (default: 4)
    pub fn beats_per_bar(&self) -> usize {
        self.beats_per_bar.unwrap_or(DEFAULT_BEATS_PER_BAR)
    }

    /// Returns the bar count, treating zero as unknown.
    pub fn bar_count(&self) -> Option<usize> {
        self.bar_count.filter(|bar_count| *bar_count > 0)
    }

    /// Returns the first bar with notes (default: 0)
    pub fn tab_start_bar(&self) -> usize {
        self.tab_start_bar.unwrap_or(0)
    }
}

/// How sync points should be generated.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SyncSettings {
    /// Beats between sync points when the tempo holds (default: 16)
    sync_interval: Option<usize>,

    /// Place extra sync points where the recording drifts (default: true)
    adaptive: Option<bool>,

    /// Sample rate of the backing track in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Shift applied to every detected beat, e.g. "250ms" or "-1s".
    start_offset: Option<String>,

    /// Fix double-time and half-time detections (default: true)
    correct_tempo: Option<bool>,
}

impl SyncSettings {
    /// Returns the sync interval in beats (default: 16)
    pub fn sync_interval(&self) -> usize {
        self.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL)
    }

    pub fn adaptive(&self) -> bool {
        self.adaptive.unwrap_or(true)
    }

    /// Returns the sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the start offset in seconds. A leading `-` moves beats earlier.
    pub fn start_offset(&self) -> Result<f64, ConfigError> {
        match &self.start_offset {
            Some(start_offset) => parse_signed_duration(start_offset),
            None => Ok(0.0),
        }
    }

    pub fn correct_tempo(&self) -> bool {
        self.correct_tempo.unwrap_or(true)
    }
}

fn parse_signed_duration(value: &str) -> Result<f64, ConfigError> {
    let trimmed = value.trim();
    let (sign, magnitude) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed),
    };

    let duration: Duration = DurationString::from_string(magnitude.to_string())
        .map_err(|e| ConfigError::InvalidDuration {
            value: value.to_string(),
            reason: e.to_string(),
        })?
        .into();
    Ok(sign * duration.as_secs_f64())
}
