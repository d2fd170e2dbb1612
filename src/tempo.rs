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

//! Tempo octave correction.
//!
//! Beat trackers regularly lock onto twice or half the notated tempo. When the detected
//! tempo sits near 2x or 0.5x of the score tempo the beat list is thinned or densified so
//! that one detected beat corresponds to one notated beat again.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::beats::BeatInfo;

/// Fractional band around the 2.0 and 0.5 ratios that counts as an octave error.
/// Inferred from observed detector behaviour rather than a verified contract.
pub const OCTAVE_TOLERANCE: f64 = 0.10;

/// Relationship between a detected tempo and the reference tempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempoOctave {
    /// Detected tempo is in the same octave as the reference.
    Match,
    /// Detected tempo is roughly twice the reference.
    DoubleTime,
    /// Detected tempo is roughly half the reference.
    HalfTime,
}

impl TempoOctave {
    /// Classifies the detected tempo against the reference.
    pub fn detect(detected_bpm: f64, reference_bpm: f64) -> TempoOctave {
        if detected_bpm <= 0.0 || reference_bpm <= 0.0 {
            return TempoOctave::Match;
        }

        let ratio = detected_bpm / reference_bpm;
        if within_band(ratio, 2.0) {
            TempoOctave::DoubleTime
        } else if within_band(ratio, 0.5) {
            TempoOctave::HalfTime
        } else {
            TempoOctave::Match
        }
    }
}

fn within_band(ratio: f64, target: f64) -> bool {
    ratio >= target * (1.0 - OCTAVE_TOLERANCE) && ratio <= target * (1.0 + OCTAVE_TOLERANCE)
}

/// Record of a correction that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoCorrection {
    pub octave: TempoOctave,
    pub original_bpm: f64,
    pub corrected_bpm: f64,
}

impl TempoCorrection {
    pub fn is_applied(&self) -> bool {
        self.octave != TempoOctave::Match
    }

    /// Short description used in reports.
    pub fn description(&self) -> &'static str {
        match self.octave {
            TempoOctave::Match => "None",
            TempoOctave::DoubleTime => "Double-time (halved)",
            TempoOctave::HalfTime => "Half-time (doubled)",
        }
    }
}

/// Corrects a double-time or half-time detection relative to the reference tempo.
/// Returns a new BeatInfo; the input is never modified. Tempos outside the octave bands
/// are returned unchanged.
pub fn correct_tempo_multiple(beat_info: &BeatInfo, reference_tempo: f64) -> BeatInfo {
    correct_tempo(beat_info, reference_tempo).0
}

/// Same as `correct_tempo_multiple`, also returning what was done.
pub fn correct_tempo(beat_info: &BeatInfo, reference_tempo: f64) -> (BeatInfo, TempoCorrection) {
    let octave = TempoOctave::detect(beat_info.bpm, reference_tempo);

    let corrected = match octave {
        TempoOctave::Match => beat_info.clone(),
        TempoOctave::DoubleTime => BeatInfo {
            bpm: beat_info.bpm / 2.0,
            beat_times: beat_info.beat_times.iter().copied().step_by(2).collect(),
            confidence: beat_info.confidence,
        },
        TempoOctave::HalfTime => BeatInfo {
            bpm: beat_info.bpm * 2.0,
            beat_times: interpolate_midpoints(&beat_info.beat_times),
            confidence: beat_info.confidence,
        },
    };

    if octave != TempoOctave::Match {
        info!(
            detected = beat_info.bpm,
            reference = reference_tempo,
            corrected = corrected.bpm,
            beats_before = beat_info.beat_times.len(),
            beats_after = corrected.beat_times.len(),
            "Corrected tempo octave ({:?})",
            octave
        );
    }

    let correction = TempoCorrection {
        octave,
        original_bpm: beat_info.bpm,
        corrected_bpm: corrected.bpm,
    };
    (corrected, correction)
}

/// Inserts the midpoint between every consecutive pair of beats.
fn interpolate_midpoints(beat_times: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(beat_times.len() * 2);
    for (i, &time) in beat_times.iter().enumerate() {
        result.push(time);
        if let Some(&next) = beat_times.get(i + 1) {
            result.push((time + next) / 2.0);
        }
    }
    result
}
