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
use tracing::{debug, info, warn};

use crate::beats::SyncPointData;
use crate::drift::{DriftAnalyzer, NearestBeatMatcher, MIN_ANALYSIS_BEATS};
use crate::error::SyncError;

use super::addressing::{Addressing, FrameOffsetCalculator};

/// Drift, in percent, at which a bar gets its own sync point.
pub const DRIFT_THRESHOLD_PERCENT: f64 = 0.5;

/// Fewest bars between two sync points.
pub const MIN_SYNC_INTERVAL: usize = 1;

/// Most bars allowed to pass without a sync point.
pub const MAX_SYNC_INTERVAL: usize = 8;

/// Places sync points where the recording drifts away from the score tempo.
pub struct AdaptiveSyncPlanner<'a> {
    analyzer: &'a DriftAnalyzer,
}

impl<'a> AdaptiveSyncPlanner<'a> {
    pub fn new(analyzer: &'a DriftAnalyzer) -> AdaptiveSyncPlanner<'a> {
        AdaptiveSyncPlanner { analyzer }
    }

    fn calculator(&self) -> FrameOffsetCalculator<'a> {
        FrameOffsetCalculator::new(
            self.analyzer.beat_times(),
            self.analyzer.beats_per_bar(),
            self.analyzer.expected_bar_duration(),
            self.analyzer.sample_rate(),
            Addressing::for_tab_start(self.analyzer.tab_start_bar()),
        )
    }

    /// Greedy left-to-right scan from the first bar with notes. A bar gets a sync point when
    /// the maximum interval is reached, when its drift crosses the threshold, or when the
    /// base interval is reached, checked in that order.
    pub fn find_sync_point_positions(&self, max_bars: usize, base_interval: usize) -> Vec<usize> {
        let start_bar = self.analyzer.tab_start_bar();
        let mut positions = vec![start_bar];
        let mut last_sync_bar = start_bar;

        for bar in (start_bar + 1)..max_bars {
            let bars_since_last = bar - last_sync_bar;

            let place = bars_since_last >= MAX_SYNC_INTERVAL
                || (bars_since_last >= MIN_SYNC_INTERVAL && self.drifts_at(bar))
                || bars_since_last >= base_interval;

            if place {
                positions.push(bar);
                last_sync_bar = bar;
            }
        }

        positions
    }

    fn drifts_at(&self, bar: usize) -> bool {
        self.analyzer
            .get_drift_at_bar(bar)
            .is_some_and(|drift| drift.drift_percent().abs() >= DRIFT_THRESHOLD_PERCENT)
    }

    /// Tempo that makes the intro bars span exactly the silence before the first beat.
    pub fn intro_tempo(&self) -> f64 {
        let original_tempo = self.analyzer.original_tempo();
        let first_beat_time = self.analyzer.first_beat_time();
        if first_beat_time <= 0.0 {
            warn!(
                first_beat_time,
                "Intro bars precede a beat at the start of the audio, keeping the score tempo"
            );
            return original_tempo;
        }

        let expected_intro_duration =
            self.analyzer.tab_start_bar() as f64 * self.analyzer.expected_bar_duration();
        original_tempo * (expected_intro_duration / first_beat_time)
    }

    /// Sync points for every planned bar, each carrying the local tempo at that bar. With
    /// intro bars, an extra point at bar 0 stretches the intro over the audio lead-in.
    pub fn generate_adaptive_sync_points(
        &self,
        max_bars: usize,
        base_interval: usize,
    ) -> Vec<SyncPointData> {
        let original_tempo = self.analyzer.original_tempo();
        let tab_start_bar = self.analyzer.tab_start_bar();
        let calculator = self.calculator();
        let mut sync_points = Vec::new();

        if tab_start_bar > 0 {
            let intro_tempo = self.intro_tempo();
            debug!(
                tempo = intro_tempo,
                intro_bars = tab_start_bar,
                lead_in = self.analyzer.first_beat_time(),
                "Intro sync point"
            );
            sync_points.push(SyncPointData::new(0, 0, intro_tempo, original_tempo));
        }

        for bar in self.find_sync_point_positions(max_bars, base_interval) {
            let local_tempo = self.analyzer.calculate_local_tempo_at_bar(bar);
            let frame_offset = calculator.frame_offset(bar);
            debug!(bar, frame = frame_offset, tempo = local_tempo, "Adaptive sync point");
            sync_points.push(SyncPointData::new(
                bar,
                frame_offset,
                local_tempo,
                original_tempo,
            ));
        }

        info!(count = sync_points.len(), "Generated adaptive sync points");
        sync_points
    }
}

/// Places sync points every `bar_interval` bars at the score tempo. Used when there are
/// too few beats to measure drift, or when adaptive placement is turned off.
#[derive(Debug, Clone)]
pub struct StaticPlanner {
    beat_times: Vec<f64>,
    original_tempo: f64,
    beats_per_bar: usize,
    bar_interval: usize,
    sample_rate: u32,
    tab_start_bar: usize,
}

impl StaticPlanner {
    pub fn new(
        beat_times: Vec<f64>,
        original_tempo: f64,
        beats_per_bar: usize,
        bar_interval: usize,
        sample_rate: u32,
        tab_start_bar: usize,
    ) -> StaticPlanner {
        StaticPlanner {
            beat_times,
            original_tempo,
            beats_per_bar,
            bar_interval: bar_interval.max(1),
            sample_rate,
            tab_start_bar,
        }
    }

    fn bar_duration(&self) -> f64 {
        60.0 / self.original_tempo * self.beats_per_bar as f64
    }

    /// Bars up to the end of the detected beats, counting intro bars.
    pub fn default_horizon(&self) -> usize {
        let matcher = NearestBeatMatcher::new(
            &self.beat_times,
            self.beats_per_bar,
            self.bar_duration(),
        );
        self.tab_start_bar + matcher.last_anchored_bar().unwrap_or(0)
    }

    /// The first bar with notes always gets a point, even when it lies past `max_bars`.
    pub fn generate(&self, max_bars: usize) -> Vec<SyncPointData> {
        let calculator = FrameOffsetCalculator::new(
            &self.beat_times,
            self.beats_per_bar,
            self.bar_duration(),
            self.sample_rate,
            Addressing::for_tab_start(self.tab_start_bar),
        );

        let end = max_bars.max(self.tab_start_bar + 1);
        let sync_points: Vec<SyncPointData> = (self.tab_start_bar..end)
            .step_by(self.bar_interval)
            .map(|bar| {
                let frame_offset = calculator.frame_offset(bar);
                debug!(bar, frame = frame_offset, "Static sync point");
                SyncPointData::new(bar, frame_offset, self.original_tempo, self.original_tempo)
            })
            .collect();

        info!(
            count = sync_points.len(),
            interval = self.bar_interval,
            "Generated static sync points"
        );
        sync_points
    }
}

/// The placement strategy, chosen before any sync point is generated.
#[derive(Debug, Clone)]
pub enum SyncPlan {
    Adaptive(DriftAnalyzer),
    Static(StaticPlanner),
}

impl SyncPlan {
    /// Picks adaptive placement when requested and there are enough beats to measure drift,
    /// static placement otherwise. Errors only on invalid tempo, meter or sample rate.
    pub fn select(
        beat_times: Vec<f64>,
        original_tempo: f64,
        beats_per_bar: usize,
        bar_interval: usize,
        sample_rate: u32,
        tab_start_bar: usize,
        adaptive: bool,
    ) -> Result<SyncPlan, SyncError> {
        if !(original_tempo > 0.0 && original_tempo.is_finite()) {
            return Err(SyncError::InvalidTempo(original_tempo));
        }
        if beats_per_bar == 0 {
            return Err(SyncError::InvalidBeatsPerBar);
        }
        if sample_rate == 0 {
            return Err(SyncError::InvalidSampleRate);
        }

        if adaptive && beat_times.len() >= MIN_ANALYSIS_BEATS {
            return Ok(SyncPlan::Adaptive(DriftAnalyzer::new(
                beat_times,
                original_tempo,
                beats_per_bar,
                sample_rate,
                tab_start_bar,
            )?));
        }

        if adaptive {
            info!(
                beats = beat_times.len(),
                required = MIN_ANALYSIS_BEATS,
                "Too few beats for drift analysis, using static sync points"
            );
        }
        Ok(SyncPlan::Static(StaticPlanner::new(
            beat_times,
            original_tempo,
            beats_per_bar,
            bar_interval,
            sample_rate,
            tab_start_bar,
        )))
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self, SyncPlan::Adaptive(_))
    }

    /// The number of bars covered by the detected beats.
    pub fn default_horizon(&self) -> usize {
        match self {
            SyncPlan::Adaptive(analyzer) => analyzer.default_horizon(),
            SyncPlan::Static(planner) => planner.default_horizon(),
        }
    }

    /// Generates sync points for bars below `max_bars`.
    pub fn generate(&self, max_bars: usize, bar_interval: usize) -> Vec<SyncPointData> {
        match self {
            SyncPlan::Adaptive(analyzer) => AdaptiveSyncPlanner::new(analyzer)
                .generate_adaptive_sync_points(max_bars, bar_interval),
            SyncPlan::Static(planner) => planner.generate(max_bars),
        }
    }
}
