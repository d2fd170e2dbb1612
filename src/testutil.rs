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

//! Beat sequence generators shared by the unit tests.

/// Evenly spaced beats starting at `start`.
pub fn regular_beats(count: usize, interval: f64, start: f64) -> Vec<f64> {
    (0..count).map(|i| start + i as f64 * interval).collect()
}

/// Beats at a constant tempo in BPM.
pub fn beats_at_tempo(count: usize, bpm: f64, start: f64) -> Vec<f64> {
    regular_beats(count, 60.0 / bpm, start)
}

/// Beats whose tempo ramps linearly from `start_bpm` towards `end_bpm` over `count` beats.
pub fn accelerating_beats(count: usize, start_bpm: f64, end_bpm: f64) -> Vec<f64> {
    let mut beats = Vec::with_capacity(count);
    let mut current_time = 0.0;
    for i in 0..count {
        let tempo = start_bpm + (i as f64 / count as f64) * (end_bpm - start_bpm);
        beats.push(current_time);
        current_time += 60.0 / tempo;
    }
    beats
}

/// Inserts a spurious beat halfway between beats `index` and `index + 1`.
pub fn with_false_beat(beats: &[f64], index: usize) -> Vec<f64> {
    let mut result = beats.to_vec();
    let midpoint = (beats[index] + beats[index + 1]) / 2.0;
    result.insert(index + 1, midpoint);
    result
}

/// Asserts two floats are within `tolerance` of each other.
#[track_caller]
pub fn assert_close(expected: f64, actual: f64, tolerance: f64) {
    assert!(
        (expected - actual).abs() <= tolerance,
        "expected {} but got {} (tolerance {})",
        expected,
        actual,
        tolerance
    );
}
