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
use tracing::info;

use crate::beats::{BeatInfo, SyncResult};
use crate::drift::{DEFAULT_BEATS_PER_BAR, DEFAULT_SAMPLE_RATE};
use crate::error::SyncError;

mod addressing;
mod planner;

pub use addressing::{Addressing, FrameOffsetCalculator};
pub use planner::{
    AdaptiveSyncPlanner, StaticPlanner, SyncPlan, DRIFT_THRESHOLD_PERCENT, MAX_SYNC_INTERVAL,
    MIN_SYNC_INTERVAL,
};

/// Default number of beats between static sync points.
pub const DEFAULT_SYNC_INTERVAL: usize = 16;

/// Knobs for sync point generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Tempo declared by the score.
    pub original_tempo: f64,
    pub beats_per_bar: usize,
    /// Beats between sync points when drift does not call for more.
    pub sync_interval: usize,
    /// Seconds added to every detected beat before planning.
    pub start_offset: f64,
    pub adaptive: bool,
    /// Bar count of the score. None estimates it from the detected beats.
    pub max_bars: Option<usize>,
    /// First bar containing notes.
    pub tab_start_bar: usize,
    pub sample_rate: u32,
}

impl SyncOptions {
    pub fn new(original_tempo: f64) -> SyncOptions {
        SyncOptions {
            original_tempo,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            start_offset: 0.0,
            adaptive: true,
            max_bars: None,
            tab_start_bar: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// The sync interval in whole bars, at least one.
    pub fn bar_interval(&self) -> usize {
        (self.sync_interval / self.beats_per_bar.max(1)).max(1)
    }
}

/// Turns detected beats into sync points plus the playback-wide padding.
///
/// Errors only when there are fewer than two beats, the beats are out of order, or the
/// tempo, meter or sample rate is unusable. Too few beats for drift analysis falls back to
/// evenly spaced sync points at the score tempo.
pub fn generate_sync_points(
    beat_info: &BeatInfo,
    options: &SyncOptions,
) -> Result<SyncResult, SyncError> {
    beat_info.validate()?;

    let beats = if options.start_offset != 0.0 {
        beat_info.shifted(options.start_offset)
    } else {
        beat_info.clone()
    };
    let first_beat_time = beats.beat_times[0];
    let bar_interval = options.bar_interval();

    info!(
        interval = options.sync_interval,
        beats_per_bar = options.beats_per_bar,
        adaptive = options.adaptive,
        "Generating sync points"
    );

    let plan = SyncPlan::select(
        beats.beat_times,
        options.original_tempo,
        options.beats_per_bar,
        bar_interval,
        options.sample_rate,
        options.tab_start_bar,
        options.adaptive,
    )?;

    let max_bars = options
        .max_bars
        .filter(|max_bars| *max_bars > 0)
        .unwrap_or_else(|| plan.default_horizon());
    let sync_points = plan.generate(max_bars, bar_interval);

    let addressing = Addressing::for_tab_start(options.tab_start_bar);
    let frame_padding = addressing.frame_padding(first_beat_time, options.sample_rate);

    info!(
        sync_points = sync_points.len(),
        frame_padding,
        first_beat_time,
        "Sync points generated"
    );

    Ok(SyncResult {
        sync_points,
        frame_padding,
        first_beat_time,
    })
}
