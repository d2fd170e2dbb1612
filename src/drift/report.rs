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
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SyncError;
use crate::tempo::TempoCorrection;

/// The widest recommended sync interval in bars.
const WIDEST_INTERVAL: usize = 8;

const HEAVY_RULE_WIDTH: usize = 70;
const LIGHT_RULE_WIDTH: usize = 40;
const TABLE_RULE_WIDTH: usize = 80;

/// How far the local tempo has wandered from the score tempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    /// Under 1%.
    Stable,
    /// 1% to 3%.
    Minor,
    /// 3% to 5%.
    Moderate,
    /// 5% to 10%.
    Significant,
    /// 10% and above.
    Severe,
}

impl DriftSeverity {
    /// Classifies a drift percentage. The sign is ignored.
    pub fn from_percent(drift_percent: f64) -> DriftSeverity {
        let abs_drift = drift_percent.abs();
        if abs_drift < 1.0 {
            DriftSeverity::Stable
        } else if abs_drift < 3.0 {
            DriftSeverity::Minor
        } else if abs_drift < 5.0 {
            DriftSeverity::Moderate
        } else if abs_drift < 10.0 {
            DriftSeverity::Significant
        } else {
            DriftSeverity::Severe
        }
    }

    /// Moderate or worse.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            DriftSeverity::Moderate | DriftSeverity::Significant | DriftSeverity::Severe
        )
    }
}

impl fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftSeverity::Stable => "stable",
            DriftSeverity::Minor => "minor",
            DriftSeverity::Moderate => "moderate",
            DriftSeverity::Significant => "significant",
            DriftSeverity::Severe => "severe",
        };
        // Pad so the drift table can right-align the value.
        f.pad(s)
    }
}

/// Drift measured at a single bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarDriftInfo {
    pub bar: usize,
    /// Where the bar should start at the score tempo, relative to the first beat.
    pub expected_time: f64,
    /// Where the bar actually starts, relative to the first beat.
    pub actual_time: f64,
    pub local_tempo: f64,
    pub original_tempo: f64,
}

impl BarDriftInfo {
    pub fn drift_seconds(&self) -> f64 {
        self.actual_time - self.expected_time
    }

    /// Deviation of the local tempo from the score tempo in percent.
    pub fn drift_percent(&self) -> f64 {
        if self.original_tempo <= 0.0 {
            return 0.0;
        }
        (self.local_tempo - self.original_tempo) / self.original_tempo * 100.0
    }

    pub fn severity(&self) -> DriftSeverity {
        DriftSeverity::from_percent(self.drift_percent())
    }
}

/// Maps a stability score to the number of bars that can safely pass between sync points.
pub fn recommended_interval(stability_score: f64) -> usize {
    if stability_score >= 0.9 {
        WIDEST_INTERVAL
    } else if stability_score >= 0.7 {
        4
    } else if stability_score >= 0.5 {
        2
    } else {
        1
    }
}

/// Summary of a drift analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub bar_drifts: Vec<BarDriftInfo>,
    /// Mean of the absolute drift percentages.
    pub avg_drift_percent: f64,
    /// Largest absolute drift percentage.
    pub max_drift_percent: f64,
    pub max_drift_bar: usize,
    pub total_bars_analyzed: usize,
    /// Bars rated moderate or worse.
    pub bars_with_significant_drift: Vec<usize>,
    /// Fraction of bars rated stable or minor.
    pub tempo_stability_score: f64,
    pub recommended_sync_interval: usize,
    /// Set when the detected tempo was folded back into the score's octave.
    #[serde(default)]
    pub tempo_correction: Option<TempoCorrection>,
    /// Bars that received a sync point.
    #[serde(default)]
    pub sync_bars: Vec<usize>,
}

impl DriftReport {
    /// A report for a run where no bar could be analyzed.
    pub fn empty() -> DriftReport {
        DriftReport {
            bar_drifts: Vec::new(),
            avg_drift_percent: 0.0,
            max_drift_percent: 0.0,
            max_drift_bar: 0,
            total_bars_analyzed: 0,
            bars_with_significant_drift: Vec::new(),
            tempo_stability_score: 1.0,
            recommended_sync_interval: WIDEST_INTERVAL,
            tempo_correction: None,
            sync_bars: Vec::new(),
        }
    }

    /// Aggregates per-bar drift into a report. Bars are kept in the order given.
    pub fn from_bar_drifts(bar_drifts: Vec<BarDriftInfo>) -> DriftReport {
        if bar_drifts.is_empty() {
            return DriftReport::empty();
        }

        let count = bar_drifts.len();
        let mut total = 0.0;
        let mut max_drift = f64::NEG_INFINITY;
        let mut max_drift_bar = 0;
        let mut stable_count = 0;
        let mut significant = Vec::new();

        for drift in &bar_drifts {
            let abs_drift = drift.drift_percent().abs();
            total += abs_drift;
            if abs_drift > max_drift {
                max_drift = abs_drift;
                max_drift_bar = drift.bar;
            }

            let severity = drift.severity();
            if severity.needs_attention() {
                significant.push(drift.bar);
            } else {
                stable_count += 1;
            }
        }

        let stability_score = stable_count as f64 / count as f64;
        let avg_drift = total / count as f64;

        info!(
            bars = count,
            avg_drift = format!("{:.2}%", avg_drift),
            max_drift = format!("{:.2}%", max_drift),
            stability = format!("{:.0}%", stability_score * 100.0),
            "Drift analysis complete"
        );

        DriftReport {
            bar_drifts,
            avg_drift_percent: avg_drift,
            max_drift_percent: max_drift,
            max_drift_bar,
            total_bars_analyzed: count,
            bars_with_significant_drift: significant,
            tempo_stability_score: stability_score,
            recommended_sync_interval: recommended_interval(stability_score),
            tempo_correction: None,
            sync_bars: Vec::new(),
        }
    }

    /// Attaches the tempo correction that preceded this analysis.
    pub fn with_tempo_correction(mut self, correction: TempoCorrection) -> DriftReport {
        self.tempo_correction = Some(correction);
        self
    }

    /// Records which bars received sync points so the drift table can mark them.
    pub fn with_sync_bars(mut self, sync_bars: Vec<usize>) -> DriftReport {
        self.sync_bars = sync_bars;
        self
    }

    fn applied_correction(&self) -> Option<&TempoCorrection> {
        self.tempo_correction
            .as_ref()
            .filter(|correction| correction.is_applied())
    }

    /// Short summary for the command line.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Bars analyzed: {}", self.total_bars_analyzed),
            format!("Average drift: {:+.2}%", self.avg_drift_percent),
            format!(
                "Maximum drift: {:+.2}% at bar {}",
                self.max_drift_percent, self.max_drift_bar
            ),
            format!(
                "Stability score: {:.0}%",
                self.tempo_stability_score * 100.0
            ),
            format!(
                "Recommended sync interval: every {} bar(s)",
                self.recommended_sync_interval
            ),
        ];

        if let Some(correction) = self.applied_correction() {
            lines.push(format!(
                "Tempo correction: {:.1} -> {:.1} BPM",
                correction.original_bpm, correction.corrected_bpm
            ));
        }
        if !self.bars_with_significant_drift.is_empty() {
            lines.push(format!(
                "Bars needing attention: {}",
                self.bars_with_significant_drift.len()
            ));
        }
        lines
    }

    /// The full bar-by-bar report.
    pub fn render(&self) -> String {
        let heavy = "=".repeat(HEAVY_RULE_WIDTH);
        let light = "-".repeat(LIGHT_RULE_WIDTH);

        let mut lines = vec![
            heavy.clone(),
            "TEMPO DRIFT ANALYSIS REPORT".to_string(),
            heavy.clone(),
            String::new(),
        ];

        match self.applied_correction() {
            Some(correction) => {
                lines.push("TEMPO CORRECTION APPLIED".to_string());
                lines.push(light.clone());
                lines.push(format!(
                    "Original detected BPM: {:.1}",
                    correction.original_bpm
                ));
                lines.push(format!(
                    "Corrected BPM:         {:.1}",
                    correction.corrected_bpm
                ));
                lines.push(format!(
                    "Correction type:       {}",
                    correction.description()
                ));
            }
            None => {
                lines.push("TEMPO CORRECTION: None applied".to_string());
                lines.push(light.clone());
                lines.push("Detected BPM matches expected tempo range".to_string());
            }
        }
        lines.push(String::new());

        lines.push("SUMMARY".to_string());
        lines.push(light.clone());
        lines.extend(self.summary_lines());
        if !self.sync_bars.is_empty() {
            lines.push(format!("Sync points placed: {} bars", self.sync_bars.len()));
        }

        lines.extend([
            String::new(),
            heavy.clone(),
            "BAR-BY-BAR DRIFT ANALYSIS".to_string(),
            heavy.clone(),
            String::new(),
            format!(
                "{:>6} | {:>10} | {:>10} | {:>10} | {:>10} | {:>12} | {:>6}",
                "Bar", "Expected", "Actual", "Local BPM", "Drift %", "Severity", "Sync"
            ),
            "-".repeat(TABLE_RULE_WIDTH),
        ]);

        let sync_bars: HashSet<usize> = self.sync_bars.iter().copied().collect();
        for drift in &self.bar_drifts {
            let marker = if sync_bars.contains(&drift.bar) {
                "<<SYNC"
            } else {
                ""
            };
            lines.push(format!(
                "{:>6} | {:>10.3} | {:>10.3} | {:>10.2} | {:>+10.2} | {:>12} | {}",
                drift.bar,
                drift.expected_time,
                drift.actual_time,
                drift.local_tempo,
                drift.drift_percent(),
                drift.severity(),
                marker
            ));
        }

        let tab_bpm = self
            .bar_drifts
            .first()
            .map(|drift| format!("{:.1}", drift.original_tempo))
            .unwrap_or_else(|| "N/A".to_string());

        lines.extend([
            String::new(),
            heavy.clone(),
            "LEGEND".to_string(),
            light,
            "Expected: Time in seconds based on tab tempo".to_string(),
            "Actual: Time in seconds from detected beats".to_string(),
            "Local BPM: Detected tempo at this bar position".to_string(),
            format!("Tab BPM: {}", tab_bpm),
            "Sync: <<SYNC indicates a sync point was placed at this bar".to_string(),
            String::new(),
            "Severity Levels:".to_string(),
            "  STABLE:      < 1% drift".to_string(),
            "  MINOR:       1-3% drift".to_string(),
            "  MODERATE:    3-5% drift".to_string(),
            "  SIGNIFICANT: 5-10% drift".to_string(),
            "  SEVERE:      > 10% drift".to_string(),
            String::new(),
            heavy,
        ]);

        lines.join("\n")
    }

    /// Writes the rendered report to a file.
    pub fn write_to_file(&self, path: &Path) -> Result<(), SyncError> {
        fs::write(path, self.render())?;
        info!(path = %path.display(), "Drift report written");
        Ok(())
    }
}
