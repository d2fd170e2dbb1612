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
use serde::{Deserialize, Serialize};

use crate::drift::NearestBeatMatcher;
use crate::util::seconds_to_frames;

/// How frame offsets are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Addressing {
    /// Offsets count from the first detected beat. The whole backing track is shifted once
    /// by the frame padding so bar 0 lands on that beat.
    Relative,
    /// Offsets are positions in the audio file. Bars before `tab_start_bar` are a silent
    /// intro occupying real audio time, so no padding is applied.
    Absolute { tab_start_bar: usize },
}

impl Addressing {
    pub fn for_tab_start(tab_start_bar: usize) -> Addressing {
        if tab_start_bar > 0 {
            Addressing::Absolute { tab_start_bar }
        } else {
            Addressing::Relative
        }
    }

    /// The bar the first detected beat belongs to.
    pub fn tab_start_bar(&self) -> usize {
        match self {
            Addressing::Relative => 0,
            Addressing::Absolute { tab_start_bar } => *tab_start_bar,
        }
    }

    /// The playback-wide sample shift for this mode.
    pub fn frame_padding(&self, first_beat_time: f64, sample_rate: u32) -> i64 {
        match self {
            Addressing::Relative => -seconds_to_frames(first_beat_time, sample_rate),
            Addressing::Absolute { .. } => 0,
        }
    }
}

/// Turns bar numbers into audio sample positions.
#[derive(Debug, Clone, Copy)]
pub struct FrameOffsetCalculator<'a> {
    matcher: NearestBeatMatcher<'a>,
    addressing: Addressing,
    first_beat_time: f64,
    bar_duration: f64,
    sample_rate: u32,
}

impl<'a> FrameOffsetCalculator<'a> {
    /// `beat_times` must not be empty.
    pub fn new(
        beat_times: &'a [f64],
        beats_per_bar: usize,
        bar_duration: f64,
        sample_rate: u32,
        addressing: Addressing,
    ) -> FrameOffsetCalculator<'a> {
        FrameOffsetCalculator {
            matcher: NearestBeatMatcher::new(beat_times, beats_per_bar, bar_duration),
            addressing,
            first_beat_time: beat_times.first().copied().unwrap_or(0.0),
            bar_duration,
            sample_rate,
        }
    }

    /// Absolute time in seconds where the bar starts in the audio file.
    ///
    /// Intro bars are placed backwards from the first beat at the score tempo. Bars past the
    /// detected beats continue forward from the last bar that still matched a beat.
    pub fn bar_time(&self, bar: usize) -> f64 {
        let tab_start_bar = self.addressing.tab_start_bar();
        let Some(bars_from_start) = bar.checked_sub(tab_start_bar) else {
            let bars_before_music = (tab_start_bar - bar) as f64;
            return self.first_beat_time - bars_before_music * self.bar_duration;
        };

        if let Some(matched) = self.matcher.match_bar(bars_from_start) {
            return matched.time;
        }

        let anchor = self.matcher.last_anchored_bar().and_then(|anchor_bar| {
            self.matcher
                .match_bar(anchor_bar)
                .map(|matched| (anchor_bar, matched.time))
        });
        match anchor {
            Some((anchor_bar, anchor_time)) if anchor_bar < bars_from_start => {
                anchor_time + (bars_from_start - anchor_bar) as f64 * self.bar_duration
            }
            _ => self.first_beat_time + bars_from_start as f64 * self.bar_duration,
        }
    }

    /// Sample position of the bar under this calculator's addressing mode. Never negative.
    pub fn frame_offset(&self, bar: usize) -> u64 {
        let time = match self.addressing {
            Addressing::Relative => self.bar_time(bar) - self.first_beat_time,
            Addressing::Absolute { .. } => self.bar_time(bar),
        };
        seconds_to_frames(time.max(0.0), self.sample_rate).max(0) as u64
    }
}

#[cfg(test)]
mod test {
    use crate::testutil::{assert_close, regular_beats, with_false_beat};

    use super::*;

    #[test]
    fn addressing_mode_follows_tab_start() {
        assert_eq!(Addressing::Relative, Addressing::for_tab_start(0));
        assert_eq!(
            Addressing::Absolute { tab_start_bar: 3 },
            Addressing::for_tab_start(3)
        );
        assert_eq!(3, Addressing::for_tab_start(3).tab_start_bar());
    }

    #[test]
    fn frame_padding() {
        assert_eq!(-88200, Addressing::Relative.frame_padding(2.0, 44100));
        assert_eq!(0, Addressing::Relative.frame_padding(0.0, 44100));
        assert_eq!(
            0,
            Addressing::Absolute { tab_start_bar: 2 }.frame_padding(2.0, 44100)
        );
    }

    #[test]
    fn relative_offsets_start_at_zero() {
        let beats = regular_beats(20, 0.5, 2.0);
        let calculator = FrameOffsetCalculator::new(&beats, 4, 2.0, 44100, Addressing::Relative);

        assert_eq!(0, calculator.frame_offset(0));
        assert_eq!(88200, calculator.frame_offset(1));
        assert_eq!(176400, calculator.frame_offset(2));
    }

    #[test]
    fn absolute_offsets() {
        let beats = regular_beats(20, 0.5, 4.0);
        let calculator = FrameOffsetCalculator::new(
            &beats,
            4,
            2.0,
            44100,
            Addressing::Absolute { tab_start_bar: 2 },
        );

        // Intro bars extrapolate backwards from the first beat.
        assert_eq!(0, calculator.frame_offset(0));
        assert_eq!(88200, calculator.frame_offset(1));
        assert_eq!(176400, calculator.frame_offset(2));
        assert_eq!(264600, calculator.frame_offset(3));
    }

    #[test]
    fn intro_extrapolation_clamps_at_zero() {
        let beats = regular_beats(20, 0.5, 1.0);
        let calculator = FrameOffsetCalculator::new(
            &beats,
            4,
            2.0,
            44100,
            Addressing::Absolute { tab_start_bar: 3 },
        );

        assert_close(-5.0, calculator.bar_time(0), 1e-9);
        assert_eq!(0, calculator.frame_offset(0));
        assert_eq!(0, calculator.frame_offset(1));
        assert_eq!(44100, calculator.frame_offset(3));
    }

    #[test]
    fn extrapolates_past_detected_beats() {
        // Beats slightly slower than the score, so the last anchor is late.
        let beats = regular_beats(16, 0.52, 0.0);
        let calculator = FrameOffsetCalculator::new(&beats, 4, 2.0, 44100, Addressing::Relative);

        // Last beat is at 7.8s, so bar 4 (8.0s) is the last matched bar, on 7.8s.
        assert_close(7.8, calculator.bar_time(4), 1e-9);
        // Bar 6 continues two bars from there rather than from the first beat.
        assert_close(11.8, calculator.bar_time(6), 1e-9);
        assert_eq!(
            seconds_to_frames(calculator.bar_time(6), 44100) as u64,
            calculator.frame_offset(6)
        );
    }

    #[test]
    fn survives_false_beat() {
        let beats = with_false_beat(&regular_beats(40, 0.5, 0.0), 5);
        let calculator = FrameOffsetCalculator::new(&beats, 4, 2.0, 44100, Addressing::Relative);

        assert_eq!(352800, calculator.frame_offset(4));
    }
}
