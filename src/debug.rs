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

//! Beat-by-beat dump for diagnosing beat detection problems.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::beats::{bpm_for_interval, IntervalStats};
use crate::error::SyncError;

const RULE_WIDTH: usize = 80;
const TABLE_RULE_WIDTH: usize = 90;

/// Renders every beat with its interval to the previous beat, the tempo that interval
/// implies, and the bar it would fall in if the recording kept perfect time.
pub fn render_beat_dump(beat_times: &[f64], original_tempo: f64, beats_per_bar: usize) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let expected_interval = if original_tempo > 0.0 {
        60.0 / original_tempo
    } else {
        0.0
    };
    let first_beat_time = beat_times.first().copied().unwrap_or(0.0);
    let beats_per_bar = beats_per_bar.max(1);

    let mut lines = vec![
        rule.clone(),
        "BEAT DETECTION DEBUG DATA".to_string(),
        rule.clone(),
        String::new(),
        format!("Original tempo (from tab): {:.2} BPM", original_tempo),
        format!("Expected beat interval: {:.4}s", expected_interval),
        format!("First beat time: {:.4}s", first_beat_time),
        format!("Total beats detected: {}", beat_times.len()),
        String::new(),
        rule.clone(),
        "BEAT-BY-BEAT DATA".to_string(),
        rule.clone(),
        String::new(),
        format!(
            "{:>6} | {:>12} | {:>12} | {:>10} | {:>10} | {:>6} | {:>12}",
            "Beat", "Time (s)", "Rel Time", "Interval", "Inst BPM", "Bar", "Beat in Bar"
        ),
        "-".repeat(TABLE_RULE_WIDTH),
    ];

    let mut previous: Option<f64> = None;
    for (i, &time) in beat_times.iter().enumerate() {
        let (interval, bpm) = match previous {
            Some(prev) => {
                let interval = time - prev;
                (
                    format!("{:.4}", interval),
                    format!("{:.2}", bpm_for_interval(interval)),
                )
            }
            None => ("-".to_string(), "-".to_string()),
        };

        lines.push(format!(
            "{:>6} | {:>12.4} | {:>12.4} | {:>10} | {:>10} | {:>6} | {:>12}",
            i,
            time,
            time - first_beat_time,
            interval,
            bpm,
            i / beats_per_bar,
            i % beats_per_bar
        ));
        previous = Some(time);
    }

    if let Some(stats) = IntervalStats::from_beats(beat_times) {
        let deviation = stats.mean - expected_interval;
        let deviation_percent = if expected_interval > 0.0 {
            deviation / expected_interval * 100.0
        } else {
            0.0
        };

        lines.extend([
            String::new(),
            rule.clone(),
            "INTERVAL STATISTICS".to_string(),
            rule,
            String::new(),
            format!(
                "Average interval: {:.4}s (= {:.2} BPM)",
                stats.mean,
                stats.mean_bpm()
            ),
            format!("Std deviation: {:.4}s", stats.std_dev),
            format!(
                "Min interval: {:.4}s (= {:.2} BPM)",
                stats.min,
                bpm_for_interval(stats.min)
            ),
            format!(
                "Max interval: {:.4}s (= {:.2} BPM)",
                stats.max,
                bpm_for_interval(stats.max)
            ),
            format!("Interval variance: {:.4}s", stats.max - stats.min),
            String::new(),
            format!(
                "Expected interval: {:.4}s (from tab tempo)",
                expected_interval
            ),
            format!(
                "Deviation from expected: {:.4}s ({:.2}%)",
                deviation, deviation_percent
            ),
            String::new(),
        ]);
    }

    lines.join("\n")
}

/// Writes `render_beat_dump` output to a file.
pub fn write_beat_dump(
    path: &Path,
    beat_times: &[f64],
    original_tempo: f64,
    beats_per_bar: usize,
) -> Result<(), SyncError> {
    fs::write(
        path,
        render_beat_dump(beat_times, original_tempo, beats_per_bar),
    )?;
    info!(path = %path.display(), "Debug beat data written");
    Ok(())
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::testutil::regular_beats;

    use super::*;

    #[test]
    fn dump_lists_every_beat() {
        let beats = regular_beats(6, 0.5, 1.0);
        let dump = render_beat_dump(&beats, 120.0, 4);

        assert!(dump.contains("Original tempo (from tab): 120.00 BPM"));
        assert!(dump.contains("Expected beat interval: 0.5000s"));
        assert!(dump.contains("First beat time: 1.0000s"));
        assert!(dump.contains("Total beats detected: 6"));

        let rows: Vec<&str> = dump
            .lines()
            .filter(|line| line.trim_start().starts_with(char::is_numeric))
            .collect();
        assert_eq!(6, rows.len());

        let first: Vec<&str> = rows[0].split('|').map(str::trim).collect();
        assert_eq!(vec!["0", "1.0000", "0.0000", "-", "-", "0", "0"], first);

        let fifth: Vec<&str> = rows[5].split('|').map(str::trim).collect();
        assert_eq!(
            vec!["5", "3.5000", "2.5000", "0.5000", "120.00", "1", "1"],
            fifth
        );
    }

    #[test]
    fn dump_includes_statistics() {
        let beats = vec![0.0, 0.5, 1.0, 1.6];
        let dump = render_beat_dump(&beats, 120.0, 4);

        assert!(dump.contains("INTERVAL STATISTICS"));
        assert!(dump.contains("Min interval: 0.5000s (= 120.00 BPM)"));
        assert!(dump.contains("Max interval: 0.6000s (= 100.00 BPM)"));
        assert!(dump.contains("Interval variance: 0.1000s"));
    }

    #[test]
    fn dump_without_intervals_has_no_statistics() {
        let dump = render_beat_dump(&[2.0], 120.0, 4);
        assert!(!dump.contains("INTERVAL STATISTICS"));
    }

    #[test]
    fn writes_file() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("beats.txt");
        write_beat_dump(&path, &regular_beats(8, 0.5, 0.0), 120.0, 4)?;

        let contents = fs::read_to_string(&path)?;
        assert!(contents.starts_with(&"=".repeat(80)));
        assert!(contents.contains("BEAT-BY-BEAT DATA"));
        Ok(())
    }
}
