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
//! End-to-end processing of a job: tempo correction, drift analysis and sync point
//! generation.

use tracing::{info, warn};

use crate::beats::{BeatInfo, SyncResult};
use crate::config::{ConfigError, Job};
use crate::drift::{DriftAnalyzer, DriftReport};
use crate::error::SyncError;
use crate::sync::generate_sync_points;
use crate::tempo::{correct_tempo, TempoCorrection};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Everything produced for a job.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The beats sync points were generated from, after any tempo correction.
    pub beats: BeatInfo,
    /// Present when tempo correction was enabled, whether or not it changed anything.
    pub correction: Option<TempoCorrection>,
    /// Absent when there were too few beats to analyze drift.
    pub report: Option<DriftReport>,
    pub result: SyncResult,
}

/// Runs a job with single-threaded drift analysis.
pub fn run(job: &Job) -> Result<PipelineOutcome, PipelineError> {
    execute(job, false)
}

/// Runs a job, analyzing drift on the rayon pool.
pub fn run_parallel(job: &Job) -> Result<PipelineOutcome, PipelineError> {
    execute(job, true)
}

fn execute(job: &Job, parallel: bool) -> Result<PipelineOutcome, PipelineError> {
    let reference_tempo = job.reference_tempo();
    let options = job.sync_options(reference_tempo)?;

    let (beats, correction) = if job.sync().correct_tempo() {
        let (beats, correction) = correct_tempo(job.beats(), reference_tempo);
        (beats, Some(correction))
    } else {
        (job.beats().clone(), None)
    };

    let result = generate_sync_points(&beats, &options)?;

    let report = match DriftAnalyzer::new(
        beats.beat_times.clone(),
        reference_tempo,
        options.beats_per_bar,
        options.sample_rate,
        options.tab_start_bar,
    ) {
        Ok(analyzer) => {
            let report = if parallel {
                analyzer.analyze_parallel(options.max_bars)
            } else {
                analyzer.analyze(options.max_bars)
            };
            let report = report.with_sync_bars(result.bars());
            Some(match correction {
                Some(correction) => report.with_tempo_correction(correction),
                None => report,
            })
        }
        Err(SyncError::InsufficientBeats { required, found }) => {
            warn!(required, found, "Skipping drift analysis");
            None
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        reference_tempo,
        beats = beats.beat_times.len(),
        sync_points = result.sync_points.len(),
        "Job complete"
    );

    Ok(PipelineOutcome {
        beats,
        correction,
        report,
        result,
    })
}
