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
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use barsync::compare::{SyncComparator, DEFAULT_FRAME_TOLERANCE, DEFAULT_TEMPO_TOLERANCE};
use barsync::config::load_job;
use barsync::debug::write_beat_dump;
use barsync::pipeline;
use barsync::util::{filename_display, format_seconds};
use clap::{crate_version, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Aligns detected audio beats with the bar grid of a score."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyzes tempo drift between the recording and the score.
    Analyze {
        /// The path to the job file.
        job_path: PathBuf,
        /// Writes the full bar-by-bar drift report to this file.
        #[arg(short, long)]
        report: Option<PathBuf>,
        /// Writes a beat-by-beat dump to this file.
        #[arg(short, long)]
        debug_beats: Option<PathBuf>,
        /// Analyzes bars on all available cores.
        #[arg(short, long)]
        parallel: bool,
    },
    /// Generates sync points for a job.
    Sync {
        /// The path to the job file.
        job_path: PathBuf,
        /// Writes the sync points to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// The output format.
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
    },
    /// Compares two saved sync results. Exits with status 1 when they disagree.
    Compare {
        /// The generated sync result.
        generated: PathBuf,
        /// The sync result to compare against.
        reference: PathBuf,
        /// Maximum frame offset difference.
        #[arg(long, default_value_t = DEFAULT_FRAME_TOLERANCE)]
        frame_tolerance: u64,
        /// Maximum tempo difference in BPM.
        #[arg(long, default_value_t = DEFAULT_TEMPO_TOLERANCE)]
        tempo_tolerance: f64,
    },
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            job_path,
            report,
            debug_beats,
            parallel,
        } => {
            let job = load_job(&job_path)?;
            let outcome = if parallel {
                pipeline::run_parallel(&job)?
            } else {
                pipeline::run(&job)?
            };

            println!("Job: {}", filename_display(&job_path));
            println!(
                "Detected tempo: {:.1} BPM, reference tempo: {:.1} BPM",
                job.beats().bpm,
                job.reference_tempo()
            );
            println!(
                "First beat: {}",
                format_seconds(outcome.result.first_beat_time)
            );

            if let Some(path) = debug_beats {
                write_beat_dump(
                    &path,
                    &outcome.beats.beat_times,
                    job.reference_tempo(),
                    job.score().beats_per_bar(),
                )?;
            }

            let Some(drift) = outcome.report else {
                println!("Not enough beats for drift analysis.");
                return Ok(ExitCode::SUCCESS);
            };

            for line in drift.summary_lines() {
                println!("{}", line);
            }
            println!("Sync points: {}", outcome.result.sync_points.len());

            if let Some(path) = report {
                drift.write_to_file(&path)?;
                println!("Report written to {}", path.display());
            }
        }
        Commands::Sync {
            job_path,
            output,
            format,
        } => {
            let job = load_job(&job_path)?;
            let outcome = pipeline::run(&job)?;

            let contents = match format {
                Format::Json => outcome.result.to_json()?,
                Format::Yaml => outcome.result.to_yaml()?,
            };
            match output {
                Some(path) => fs::write(path, contents)?,
                None => println!("{}", contents),
            }
        }
        Commands::Compare {
            generated,
            reference,
            frame_tolerance,
            tempo_tolerance,
        } => {
            let comparison = SyncComparator::new(frame_tolerance, tempo_tolerance)
                .compare_files(&generated, &reference)?;

            println!("{}", comparison.render());
            if !comparison.is_within_tolerance() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
