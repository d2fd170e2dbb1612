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
use rayon::prelude::*;
use tracing::debug;

use crate::beats::{bpm_for_interval, check_finite};
use crate::error::SyncError;
use crate::util;

use super::matcher::NearestBeatMatcher;
use super::report::{BarDriftInfo, DriftReport};

/// The fewest beats a drift analysis can work with.
pub const MIN_ANALYSIS_BEATS: usize = 4;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

pub const DEFAULT_BEATS_PER_BAR: usize = 4;

/// Number of beats considered when measuring the local tempo around a bar.
pub const DEFAULT_TEMPO_WINDOW: usize = 8;

/// Compares detected beats against the bar grid implied by the score tempo.
///
/// The first detected beat is taken to be the start of `tab_start_bar`. Bars before that
/// are intro bars with no detected audio and are never analyzed. The analyzer holds no
/// state beyond its inputs, so a shared reference can be used from several threads.
#[derive(Debug, Clone)]
pub struct DriftAnalyzer {
    beat_times: Vec<f64>,
    original_tempo: f64,
    beats_per_bar: usize,
    sample_rate: u32,
    tab_start_bar: usize,
    expected_beat_interval: f64,
    expected_bar_duration: f64,
    first_beat_time: f64,
}

impl DriftAnalyzer {
    /// Creates an analyzer with the default meter and sample rate and no intro bars.
    pub fn for_tempo(beat_times: Vec<f64>, original_tempo: f64) -> Result<DriftAnalyzer, SyncError> {
        DriftAnalyzer::new(
            beat_times,
            original_tempo,
            DEFAULT_BEATS_PER_BAR,
            DEFAULT_SAMPLE_RATE,
            0,
        )
    }

    pub fn new(
        beat_times: Vec<f64>,
        original_tempo: f64,
        beats_per_bar: usize,
        sample_rate: u32,
        tab_start_bar: usize,
    ) -> Result<DriftAnalyzer, SyncError> {
        if beat_times.len() < MIN_ANALYSIS_BEATS {
            return Err(SyncError::InsufficientBeats {
                required: MIN_ANALYSIS_BEATS,
                found: beat_times.len(),
            });
        }
        check_finite(&beat_times)?;
        if !(original_tempo > 0.0 && original_tempo.is_finite()) {
            return Err(SyncError::InvalidTempo(original_tempo));
        }
        if beats_per_bar == 0 {
            return Err(SyncError::InvalidBeatsPerBar);
        }
        if sample_rate == 0 {
            return Err(SyncError::InvalidSampleRate);
        }

        let expected_beat_interval = 60.0 / original_tempo;
        let expected_bar_duration = expected_beat_interval * beats_per_bar as f64;
        let first_beat_time = beat_times[0];

        debug!(
            tempo = original_tempo,
            beats = beat_times.len(),
            first_beat = first_beat_time,
            tab_start_bar,
            "Drift analyzer initialized"
        );

        Ok(DriftAnalyzer {
            beat_times,
            original_tempo,
            beats_per_bar,
            sample_rate,
            tab_start_bar,
            expected_beat_interval,
            expected_bar_duration,
            first_beat_time,
        })
    }

    pub fn beat_times(&self) -> &[f64] {
        &self.beat_times
    }

    pub fn original_tempo(&self) -> f64 {
        self.original_tempo
    }

    pub fn beats_per_bar(&self) -> usize {
        self.beats_per_bar
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tab_start_bar(&self) -> usize {
        self.tab_start_bar
    }

    pub fn expected_beat_interval(&self) -> f64 {
        self.expected_beat_interval
    }

    pub fn expected_bar_duration(&self) -> f64 {
        self.expected_bar_duration
    }

    pub fn first_beat_time(&self) -> f64 {
        self.first_beat_time
    }

    /// A matcher over this analyzer's beats.
    pub fn matcher(&self) -> NearestBeatMatcher<'_> {
        NearestBeatMatcher::new(
            &self.beat_times,
            self.beats_per_bar,
            self.expected_bar_duration,
        )
    }

    /// The number of bars covered by the detected beats, counting intro bars.
    pub fn default_horizon(&self) -> usize {
        self.tab_start_bar + self.matcher().last_anchored_bar().unwrap_or(0)
    }

    /// Drift at a single bar. None for intro bars and for bars past the detected audio.
    pub fn get_drift_at_bar(&self, bar: usize) -> Option<BarDriftInfo> {
        let bars_from_start = bar.checked_sub(self.tab_start_bar)?;
        let expected_time = bars_from_start as f64 * self.expected_bar_duration;

        let matched = self.matcher().match_bar(bars_from_start)?;
        let actual_time = matched.time - self.first_beat_time;

        Some(BarDriftInfo {
            bar,
            expected_time,
            actual_time,
            local_tempo: self.calculate_local_tempo_at_bar(bar),
            original_tempo: self.original_tempo,
        })
    }

    /// Median tempo of the default window of beats around the bar.
    pub fn calculate_local_tempo_at_bar(&self, bar: usize) -> f64 {
        self.local_tempo_with_window(bar, DEFAULT_TEMPO_WINDOW)
    }

    /// Median tempo over `window` beats centred on the beat the bar would start on if the
    /// recording kept perfect time. Falls back to the score tempo for intro bars, bars past
    /// the detected beats, and windows too small to measure.
    pub fn local_tempo_with_window(&self, bar: usize, window: usize) -> f64 {
        let Some(bars_from_start) = bar.checked_sub(self.tab_start_bar) else {
            return self.original_tempo;
        };

        let beat_index = bars_from_start * self.beats_per_bar;
        if beat_index >= self.beat_times.len() {
            return self.original_tempo;
        }

        let half = window / 2;
        let start = beat_index.saturating_sub(half);
        let end = (beat_index + half + 1).min(self.beat_times.len());
        let intervals = util::intervals(&self.beat_times[start..end]);

        match util::median(&intervals) {
            Some(median) if median > 0.0 => bpm_for_interval(median),
            _ => self.original_tempo,
        }
    }

    /// Analyzes every bar up to `max_bars`, or up to the end of the detected beats.
    pub fn analyze(&self, max_bars: Option<usize>) -> DriftReport {
        let horizon = max_bars.unwrap_or_else(|| self.default_horizon());
        let bar_drifts = (0..horizon)
            .filter_map(|bar| self.get_drift_at_bar(bar))
            .collect();
        DriftReport::from_bar_drifts(bar_drifts)
    }

    /// Same as `analyze`, measuring bars on the rayon pool.
    pub fn analyze_parallel(&self, max_bars: Option<usize>) -> DriftReport {
        let horizon = max_bars.unwrap_or_else(|| self.default_horizon());
        let bar_drifts = (0..horizon)
            .into_par_iter()
            .filter_map(|bar| self.get_drift_at_bar(bar))
            .collect();
        DriftReport::from_bar_drifts(bar_drifts)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::drift::DriftSeverity;
    use crate::testutil::{accelerating_beats, assert_close, regular_beats, with_false_beat};

    use super::*;

    #[test]
    fn requires_minimum_beats() {
        let result = DriftAnalyzer::for_tempo(vec![0.0, 0.5, 1.0], 120.0);
        assert!(matches!(
            result,
            Err(SyncError::InsufficientBeats {
                required: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let beats = regular_beats(10, 0.5, 0.0);
        assert!(matches!(
            DriftAnalyzer::for_tempo(beats.clone(), 0.0),
            Err(SyncError::InvalidTempo(_))
        ));
        assert!(matches!(
            DriftAnalyzer::new(beats.clone(), 120.0, 0, 44100, 0),
            Err(SyncError::InvalidBeatsPerBar)
        ));
        assert!(matches!(
            DriftAnalyzer::new(beats, 120.0, 4, 0, 0),
            Err(SyncError::InvalidSampleRate)
        ));
    }

    #[test]
    fn rejects_non_finite_beats() {
        let mut beats = regular_beats(10, 0.5, 0.0);
        beats.push(f64::INFINITY);
        assert!(matches!(
            DriftAnalyzer::for_tempo(beats, 120.0),
            Err(SyncError::NonFiniteBeat { index: 10 })
        ));

        let mut beats = regular_beats(10, 0.5, 0.0);
        beats[3] = f64::NAN;
        assert!(matches!(
            DriftAnalyzer::for_tempo(beats, 120.0),
            Err(SyncError::NonFiniteBeat { index: 3 })
        ));
    }

    #[test]
    fn derived_values() -> Result<(), Box<dyn Error>> {
        let analyzer = DriftAnalyzer::for_tempo(regular_beats(10, 0.5, 1.25), 120.0)?;

        assert_eq!(120.0, analyzer.original_tempo());
        assert_eq!(4, analyzer.beats_per_bar());
        assert_eq!(10, analyzer.beat_times().len());
        assert_eq!(0.5, analyzer.expected_beat_interval());
        assert_eq!(2.0, analyzer.expected_bar_duration());
        assert_eq!(1.25, analyzer.first_beat_time());
        Ok(())
    }

    #[test]
    fn stable_tempo() -> Result<(), Box<dyn Error>> {
        let analyzer = DriftAnalyzer::for_tempo(regular_beats(100, 0.5, 0.0), 120.0)?;
        let report = analyzer.analyze(None);

        assert_eq!(25, report.total_bars_analyzed);
        assert!(report.tempo_stability_score > 0.9);
        assert!(report.avg_drift_percent < 1.0);
        assert!(report.bars_with_significant_drift.is_empty());
        assert_eq!(8, report.recommended_sync_interval);
        Ok(())
    }

    #[test]
    fn drifting_tempo() -> Result<(), Box<dyn Error>> {
        let analyzer = DriftAnalyzer::for_tempo(accelerating_beats(100, 120.0, 130.0), 120.0)?;
        let report = analyzer.analyze(None);

        assert!(report.tempo_stability_score < 0.9);
        assert!(!report.bars_with_significant_drift.is_empty());
        assert!(report.max_drift_percent > 0.0);
        Ok(())
    }

    #[test]
    fn parallel_matches_sequential() -> Result<(), Box<dyn Error>> {
        let analyzer = DriftAnalyzer::for_tempo(accelerating_beats(200, 110.0, 135.0), 120.0)?;

        assert_eq!(analyzer.analyze(None), analyzer.analyze_parallel(None));
        assert_eq!(
            analyzer.analyze(Some(30)),
            analyzer.analyze_parallel(Some(30))
        );
        Ok(())
    }

    #[test]
    fn local_tempo() -> Result<(), Box<dyn Error>> {
        let analyzer = DriftAnalyzer::for_tempo(regular_beats(20, 0.5, 0.0), 120.0)?;
        assert_close(120.0, analyzer.calculate_local_tempo_at_bar(0), 1e-9);

        // Only two bars of beats; bar 10 falls back to the score tempo.
        let analyzer = DriftAnalyzer::for_tempo(regular_beats(8, 0.5, 0.0), 120.0)?;
        assert_eq!(120.0, analyzer.calculate_local_tempo_at_bar(10));
        Ok(())
    }

    #[test]
    fn local_tempo_ignores_single_outlier() -> Result<(), Box<dyn Error>> {
        let mut beats = regular_beats(40, 0.5, 0.0);
        beats[17] = 8.7;
        let analyzer = DriftAnalyzer::for_tempo(beats, 120.0)?;

        assert_close(120.0, analyzer.calculate_local_tempo_at_bar(4), 1e-9);
        Ok(())
    }

    #[test]
    fn intro_bars_have_no_drift() -> Result<(), Box<dyn Error>> {
        let analyzer = DriftAnalyzer::new(regular_beats(40, 0.5, 4.0), 120.0, 4, 44100, 2)?;

        assert!(analyzer.get_drift_at_bar(0).is_none());
        assert!(analyzer.get_drift_at_bar(1).is_none());
        assert_eq!(120.0, analyzer.calculate_local_tempo_at_bar(1));

        let drift = analyzer.get_drift_at_bar(2).expect("expected drift at bar 2");
        assert_eq!(0.0, drift.expected_time);
        assert_eq!(0.0, drift.actual_time);

        let drift = analyzer.get_drift_at_bar(5).expect("expected drift at bar 5");
        assert_eq!(6.0, drift.expected_time);
        assert_eq!(6.0, drift.actual_time);

        // 40 beats cover bars 2 through 11.
        assert_eq!(12, analyzer.default_horizon());
        let report = analyzer.analyze(None);
        assert_eq!(10, report.total_bars_analyzed);
        assert_eq!(Some(2), report.bar_drifts.first().map(|d| d.bar));
        Ok(())
    }

    #[test]
    fn false_beat_does_not_shift_later_bars() -> Result<(), Box<dyn Error>> {
        let beats = with_false_beat(&regular_beats(40, 0.5, 0.0), 5);
        let analyzer = DriftAnalyzer::for_tempo(beats, 120.0)?;

        for bar in 2..9 {
            let drift = analyzer
                .get_drift_at_bar(bar)
                .expect("expected drift for bar");
            assert_eq!(drift.expected_time, drift.actual_time);
        }
        Ok(())
    }

    #[test]
    fn constant_fast_tempo_is_severe() -> Result<(), Box<dyn Error>> {
        let analyzer = DriftAnalyzer::for_tempo(regular_beats(60, 60.0 / 135.0, 0.0), 120.0)?;
        let report = analyzer.analyze(Some(10));

        assert!(report
            .bar_drifts
            .iter()
            .all(|drift| drift.severity() == DriftSeverity::Severe));
        assert_eq!(0.0, report.tempo_stability_score);
        assert_eq!(1, report.recommended_sync_interval);
        Ok(())
    }
}
