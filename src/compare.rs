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

//! Compares generated sync points against a hand-synced reference.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::beats::{SyncPointData, SyncResult};
use crate::error::SyncError;

/// Roughly 100ms at 44.1kHz.
pub const DEFAULT_FRAME_TOLERANCE: u64 = 4410;

pub const DEFAULT_TEMPO_TOLERANCE: f64 = 1.5;

/// Samples per millisecond used when reporting frame differences.
const SAMPLES_PER_MS: f64 = 44.1;

const RULE_WIDTH: usize = 60;

/// Difference between two sync points on the same bar, generated minus reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPointDiff {
    pub bar: usize,
    pub generated: SyncPointData,
    pub reference: SyncPointData,
    pub frame_offset_diff: i64,
    pub tempo_diff: f64,
}

impl SyncPointDiff {
    fn new(generated: &SyncPointData, reference: &SyncPointData) -> SyncPointDiff {
        SyncPointDiff {
            bar: generated.bar,
            generated: generated.clone(),
            reference: reference.clone(),
            frame_offset_diff: generated.frame_offset as i64 - reference.frame_offset as i64,
            tempo_diff: generated.modified_tempo - reference.modified_tempo,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    /// Bars with a sync point in both results.
    pub matched_bars: Vec<usize>,
    pub diffs: Vec<SyncPointDiff>,
    /// Sync points only in the generated result.
    pub extra: Vec<SyncPointData>,
    /// Sync points only in the reference.
    pub missing: Vec<SyncPointData>,
    /// Generated frame padding minus the reference's.
    pub frame_padding_diff: i64,
    pub frame_tolerance: u64,
    pub tempo_tolerance: f64,
    pub generated_label: String,
    pub reference_label: String,
}

impl ComparisonResult {
    fn exceeds_tolerance(&self, diff: &SyncPointDiff) -> bool {
        diff.frame_offset_diff.unsigned_abs() > self.frame_tolerance
            || diff.tempo_diff.abs() > self.tempo_tolerance
    }

    pub fn avg_frame_diff(&self) -> f64 {
        if self.diffs.is_empty() {
            return 0.0;
        }
        let total: u64 = self
            .diffs
            .iter()
            .map(|d| d.frame_offset_diff.unsigned_abs())
            .sum();
        total as f64 / self.diffs.len() as f64
    }

    pub fn max_frame_diff(&self) -> u64 {
        self.diffs
            .iter()
            .map(|d| d.frame_offset_diff.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    pub fn avg_tempo_diff(&self) -> f64 {
        if self.diffs.is_empty() {
            return 0.0;
        }
        self.diffs.iter().map(|d| d.tempo_diff.abs()).sum::<f64>() / self.diffs.len() as f64
    }

    pub fn max_tempo_diff(&self) -> f64 {
        self.diffs
            .iter()
            .map(|d| d.tempo_diff.abs())
            .fold(0.0, f64::max)
    }

    /// True when every matched bar is within both tolerances.
    pub fn is_within_tolerance(&self) -> bool {
        !self.diffs.iter().any(|diff| self.exceeds_tolerance(diff))
    }

    pub fn bars_outside_tolerance(&self) -> Vec<&SyncPointDiff> {
        self.diffs
            .iter()
            .filter(|diff| self.exceeds_tolerance(diff))
            .collect()
    }

    /// Human readable comparison report.
    pub fn render(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut lines = vec![
            rule.clone(),
            "SYNC POINT COMPARISON REPORT".to_string(),
            rule,
            String::new(),
            format!("Generated: {}", self.generated_label),
            format!("Reference: {}", self.reference_label),
            String::new(),
            "SUMMARY:".to_string(),
            format!("  Matched bars:                  {}", self.matched_bars.len()),
            format!("  Extra bars (generated only):   {}", self.extra.len()),
            format!("  Missing bars (reference only): {}", self.missing.len()),
            format!(
                "  Within tolerance:              {}",
                if self.is_within_tolerance() {
                    "YES"
                } else {
                    "NO"
                }
            ),
            format!("  Frame padding diff:            {:+}", self.frame_padding_diff),
            String::new(),
        ];

        if !self.diffs.is_empty() {
            lines.extend([
                "STATISTICS:".to_string(),
                format!(
                    "  Avg frame diff: {:.1} samples ({:.1} ms)",
                    self.avg_frame_diff(),
                    self.avg_frame_diff() / SAMPLES_PER_MS
                ),
                format!(
                    "  Max frame diff: {} samples ({:.1} ms)",
                    self.max_frame_diff(),
                    self.max_frame_diff() as f64 / SAMPLES_PER_MS
                ),
                format!("  Avg tempo diff: {:.3} BPM", self.avg_tempo_diff()),
                format!("  Max tempo diff: {:.3} BPM", self.max_tempo_diff()),
                String::new(),
                "MATCHED BARS:".to_string(),
                format!(
                    "  {:>4}  {:>12}  {:>10}  {:>8}",
                    "Bar", "FrameDiff", "TempoDiff", "Status"
                ),
                format!(
                    "  {}  {}  {}  {}",
                    "-".repeat(4),
                    "-".repeat(12),
                    "-".repeat(10),
                    "-".repeat(8)
                ),
            ]);
            for diff in &self.diffs {
                let status = if self.exceeds_tolerance(diff) {
                    "FAIL"
                } else {
                    "OK"
                };
                lines.push(format!(
                    "  {:>4}  {:>+12}  {:>+10.3}  {:>8}",
                    diff.bar, diff.frame_offset_diff, diff.tempo_diff, status
                ));
            }
            lines.push(String::new());
        }

        for (title, points) in [
            ("EXTRA BARS (in generated, not in reference):", &self.extra),
            ("MISSING BARS (in reference, not in generated):", &self.missing),
        ] {
            if points.is_empty() {
                continue;
            }
            lines.push(title.to_string());
            lines.push(format!(
                "  {:>4}  {:>12}  {:>10}",
                "Bar", "FrameOffset", "Tempo"
            ));
            lines.push(format!(
                "  {}  {}  {}",
                "-".repeat(4),
                "-".repeat(12),
                "-".repeat(10)
            ));
            for sync_point in points {
                lines.push(format!(
                    "  {:>4}  {:>12}  {:>10.3}",
                    sync_point.bar, sync_point.frame_offset, sync_point.modified_tempo
                ));
            }
            lines.push(String::new());
        }

        lines.push("-".repeat(RULE_WIDTH));
        lines.push(format!(
            "Tolerances: FrameOffset={} samples ({:.1}ms), Tempo={} BPM",
            self.frame_tolerance,
            self.frame_tolerance as f64 / SAMPLES_PER_MS,
            self.tempo_tolerance
        ));

        lines.join("\n")
    }
}

/// Matches sync points by bar and measures how far apart they are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncComparator {
    pub frame_tolerance: u64,
    pub tempo_tolerance: f64,
}

impl Default for SyncComparator {
    fn default() -> Self {
        SyncComparator {
            frame_tolerance: DEFAULT_FRAME_TOLERANCE,
            tempo_tolerance: DEFAULT_TEMPO_TOLERANCE,
        }
    }
}

impl SyncComparator {
    pub fn new(frame_tolerance: u64, tempo_tolerance: f64) -> SyncComparator {
        SyncComparator {
            frame_tolerance,
            tempo_tolerance,
        }
    }

    /// Compares two results. When a result has several points on the same bar, the last
    /// one wins.
    pub fn compare(&self, generated: &SyncResult, reference: &SyncResult) -> ComparisonResult {
        self.compare_labeled(generated, "generated", reference, "reference")
    }

    /// Loads and compares two saved results.
    pub fn compare_files(
        &self,
        generated: &Path,
        reference: &Path,
    ) -> Result<ComparisonResult, SyncError> {
        info!(
            generated = %generated.display(),
            reference = %reference.display(),
            "Comparing sync points"
        );
        Ok(self.compare_labeled(
            &SyncResult::load(generated)?,
            &generated.display().to_string(),
            &SyncResult::load(reference)?,
            &reference.display().to_string(),
        ))
    }

    fn compare_labeled(
        &self,
        generated: &SyncResult,
        generated_label: &str,
        reference: &SyncResult,
        reference_label: &str,
    ) -> ComparisonResult {
        let by_bar = |result: &SyncResult| -> BTreeMap<usize, SyncPointData> {
            result
                .sync_points
                .iter()
                .map(|sp| (sp.bar, sp.clone()))
                .collect()
        };
        let generated_points = by_bar(generated);
        let mut reference_points = by_bar(reference);

        let mut result = ComparisonResult {
            matched_bars: Vec::new(),
            diffs: Vec::new(),
            extra: Vec::new(),
            missing: Vec::new(),
            frame_padding_diff: generated.frame_padding - reference.frame_padding,
            frame_tolerance: self.frame_tolerance,
            tempo_tolerance: self.tempo_tolerance,
            generated_label: generated_label.to_string(),
            reference_label: reference_label.to_string(),
        };

        for (bar, generated_point) in generated_points {
            match reference_points.remove(&bar) {
                Some(reference_point) => {
                    result.matched_bars.push(bar);
                    result
                        .diffs
                        .push(SyncPointDiff::new(&generated_point, &reference_point));
                }
                None => result.extra.push(generated_point),
            }
        }
        result.missing = reference_points.into_values().collect();

        info!(
            matched = result.matched_bars.len(),
            extra = result.extra.len(),
            missing = result.missing.len(),
            "Comparison complete"
        );
        result
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;

    fn result(points: &[(usize, u64, f64)], frame_padding: i64) -> SyncResult {
        SyncResult {
            sync_points: points
                .iter()
                .map(|&(bar, frame, tempo)| SyncPointData::new(bar, frame, tempo, 120.0))
                .collect(),
            frame_padding,
            first_beat_time: 0.0,
        }
    }

    #[test]
    fn identical_results() {
        let points = result(&[(0, 0, 120.0), (4, 352800, 120.5), (8, 705600, 121.0)], 0);

        let comparison = SyncComparator::default().compare(&points, &points);

        assert_eq!(vec![0, 4, 8], comparison.matched_bars);
        assert!(comparison.extra.is_empty());
        assert!(comparison.missing.is_empty());
        assert!(comparison.is_within_tolerance());
        assert_eq!(0, comparison.max_frame_diff());
        assert_eq!(0.0, comparison.max_tempo_diff());
    }

    #[test]
    fn extra_and_missing_bars() {
        let generated = result(&[(0, 0, 120.0), (2, 176400, 120.0), (4, 352800, 120.0)], 0);
        let reference = result(&[(0, 0, 120.0), (4, 352000, 119.0), (6, 529200, 120.0)], 0);

        let comparison = SyncComparator::default().compare(&generated, &reference);

        assert_eq!(vec![0, 4], comparison.matched_bars);
        assert_eq!(
            vec![2],
            comparison.extra.iter().map(|sp| sp.bar).collect::<Vec<_>>()
        );
        assert_eq!(
            vec![6],
            comparison.missing.iter().map(|sp| sp.bar).collect::<Vec<_>>()
        );
        assert_eq!(800, comparison.diffs[1].frame_offset_diff);
        assert_eq!(1.0, comparison.diffs[1].tempo_diff);
    }

    #[test]
    fn tolerance() {
        let reference = result(&[(0, 0, 120.0), (4, 352800, 120.0)], 0);

        let close = result(&[(0, 100, 120.5), (4, 354000, 121.0)], 0);
        let comparison = SyncComparator::default().compare(&close, &reference);
        assert!(comparison.is_within_tolerance());
        assert!(comparison.bars_outside_tolerance().is_empty());

        let far = result(&[(0, 0, 120.0), (4, 362800, 120.0)], 0);
        let comparison = SyncComparator::default().compare(&far, &reference);
        assert!(!comparison.is_within_tolerance());
        assert_eq!(
            vec![4],
            comparison
                .bars_outside_tolerance()
                .iter()
                .map(|d| d.bar)
                .collect::<Vec<_>>()
        );

        let off_tempo = result(&[(0, 0, 122.0)], 0);
        let comparison = SyncComparator::new(4410, 1.5).compare(&off_tempo, &reference);
        assert!(!comparison.is_within_tolerance());
    }

    #[test]
    fn empty_results() {
        let empty = result(&[], 0);
        let comparison = SyncComparator::default().compare(&empty, &empty);

        assert!(comparison.matched_bars.is_empty());
        assert!(comparison.is_within_tolerance());
        assert_eq!(0.0, comparison.avg_frame_diff());
        assert_eq!(0.0, comparison.avg_tempo_diff());
    }

    #[test]
    fn statistics() {
        let generated = result(&[(0, 100, 121.0), (4, 352500, 119.0)], -1000);
        let reference = result(&[(0, 0, 120.0), (4, 352800, 120.0)], -900);

        let comparison = SyncComparator::default().compare(&generated, &reference);

        assert_eq!(200.0, comparison.avg_frame_diff());
        assert_eq!(300, comparison.max_frame_diff());
        assert_eq!(1.0, comparison.avg_tempo_diff());
        assert_eq!(1.0, comparison.max_tempo_diff());
        assert_eq!(-100, comparison.frame_padding_diff);
    }

    #[test]
    fn report() {
        let generated = result(&[(0, 0, 120.0), (2, 176400, 120.0), (4, 362800, 120.0)], 0);
        let reference = result(&[(0, 0, 120.0), (4, 352800, 120.0), (6, 529200, 120.0)], 0);

        let report = SyncComparator::default()
            .compare(&generated, &reference)
            .render();

        assert!(report.contains("SYNC POINT COMPARISON REPORT"));
        assert!(report.contains("Within tolerance:              NO"));
        assert!(report.contains("EXTRA BARS"));
        assert!(report.contains("MISSING BARS"));
        assert!(report.contains("+10000"));
        assert!(report.contains("FAIL"));
        assert!(report.contains("Tolerances: FrameOffset=4410 samples (100.0ms), Tempo=1.5 BPM"));
    }

    #[test]
    fn compares_files() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let generated_path = tempdir.path().join("generated.json");
        let reference_path = tempdir.path().join("reference.yaml");

        result(&[(0, 0, 120.0), (4, 352900, 120.2)], -22050).save(&generated_path)?;
        result(&[(0, 0, 120.0), (4, 352800, 120.0)], -22050).save(&reference_path)?;

        let comparison = SyncComparator::default().compare_files(&generated_path, &reference_path)?;
        assert!(comparison.is_within_tolerance());
        assert_eq!(100, comparison.diffs[1].frame_offset_diff);
        assert!(comparison.render().contains("generated.json"));

        assert!(SyncComparator::default()
            .compare_files(&tempdir.path().join("missing.json"), &reference_path)
            .is_err());
        Ok(())
    }
}
