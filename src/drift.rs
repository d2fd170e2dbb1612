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

//! Tempo drift between a recording and the score's bar grid.
//!
//! The first detected beat anchors the score's first bar with notes. Every later bar is
//! located independently by looking for the detected beat closest to where the score's
//! tempo says the bar should start, so a single missed or spurious beat does not shift
//! everything after it.

mod analyzer;
mod matcher;
mod report;

pub use analyzer::{
    DriftAnalyzer, DEFAULT_BEATS_PER_BAR, DEFAULT_SAMPLE_RATE, DEFAULT_TEMPO_WINDOW,
    MIN_ANALYSIS_BEATS,
};
pub use matcher::{BeatMatch, NearestBeatMatcher};
pub use report::{recommended_interval, BarDriftInfo, DriftReport, DriftSeverity};
