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

/// Errors raised while turning detected beats into sync points.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("No beats detected, cannot generate sync points")]
    NoBeats,

    #[error("Need at least 2 beats to generate sync points, got {found}")]
    TooFewBeats { found: usize },

    /// Raised by the drift analyzer. Callers are expected to fall back to static
    /// placement rather than surface this.
    #[error("Need at least {required} beats for drift analysis, got {found}")]
    InsufficientBeats { required: usize, found: usize },

    #[error("Tempo must be positive, got {0}")]
    InvalidTempo(f64),

    #[error("Beats per bar must be at least 1")]
    InvalidBeatsPerBar,

    #[error("Sample rate must be positive")]
    InvalidSampleRate,

    #[error("Beat {index} is not a finite time")]
    NonFiniteBeat { index: usize },

    #[error("Beat times must be strictly increasing (violated at beat {index})")]
    UnorderedBeats { index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialize(e.to_string())
    }
}

impl From<serde_yml::Error> for SyncError {
    fn from(e: serde_yml::Error) -> Self {
        SyncError::Serialize(e.to_string())
    }
}
