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
use tracing::warn;

/// Number of bars of beats searched on either side of the estimated beat index.
const SEARCH_SPAN_BARS: usize = 2;

/// The detected beat chosen for a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatMatch {
    /// Index into the beat list.
    pub index: usize,
    /// Absolute time of the matched beat in seconds.
    pub time: f64,
    /// Distance between the matched beat and the expected bar start in seconds.
    pub distance: f64,
    /// True when the match is more than half a bar away from where it was expected.
    pub low_confidence: bool,
}

/// Resolves bar positions to the nearest detected beat.
///
/// Indexing beats directly by `bar * beats_per_bar` breaks as soon as one beat is missed
/// or a false positive sneaks in, because every later bar inherits the shift. Matching
/// against the expected absolute time re-anchors each bar on its own.
#[derive(Debug, Clone, Copy)]
pub struct NearestBeatMatcher<'a> {
    beat_times: &'a [f64],
    beats_per_bar: usize,
    bar_duration: f64,
}

impl<'a> NearestBeatMatcher<'a> {
    pub fn new(beat_times: &'a [f64], beats_per_bar: usize, bar_duration: f64) -> Self {
        NearestBeatMatcher {
            beat_times,
            beats_per_bar,
            bar_duration,
        }
    }

    /// Absolute time where the given bar (counted from the first bar with notes) should
    /// start at the score tempo.
    pub fn expected_time(&self, bars_from_start: usize) -> Option<f64> {
        self.beat_times
            .first()
            .map(|first| first + bars_from_start as f64 * self.bar_duration)
    }

    /// Finds the detected beat closest to the expected start of the bar. Returns None once
    /// the expected time is more than a bar past the last detected beat; extrapolating
    /// beyond that is up to the caller.
    pub fn match_bar(&self, bars_from_start: usize) -> Option<BeatMatch> {
        let expected = self.expected_time(bars_from_start)?;
        let last = *self.beat_times.last()?;
        if expected > last + self.bar_duration {
            return None;
        }

        let len = self.beat_times.len();
        let span = self.beats_per_bar * SEARCH_SPAN_BARS;
        let estimated = bars_from_start * self.beats_per_bar;
        // When the estimate runs far past the end, still search the tail.
        let search_start = estimated.saturating_sub(span).min(len - 1);
        let search_end = (estimated + span).min(len);

        let mut nearest: Option<(usize, f64)> = None;
        for index in search_start..search_end {
            let distance = (self.beat_times[index] - expected).abs();
            match nearest {
                Some((_, best)) if best <= distance => {}
                _ => nearest = Some((index, distance)),
            }
        }
        let (index, distance) = nearest?;

        let tolerance = self.bar_duration / 2.0;
        let low_confidence = distance > tolerance;
        if low_confidence {
            warn!(
                bar = bars_from_start,
                distance, tolerance, "Nearest beat is further away than half a bar"
            );
        }

        Some(BeatMatch {
            index,
            time: self.beat_times[index],
            distance,
            low_confidence,
        })
    }

    /// The number of bars, counted from the first bar with notes, that the detected beats
    /// cover. Usable as an exclusive upper bound on matched bars.
    pub fn last_anchored_bar(&self) -> Option<usize> {
        let first = *self.beat_times.first()?;
        let last = *self.beat_times.last()?;
        Some(((last - first) / self.bar_duration + 1.0).floor() as usize)
    }
}

#[cfg(test)]
mod test {
    use crate::testutil::{beats_at_tempo, regular_beats, with_false_beat};

    use super::*;

    #[test]
    fn matches_regular_beats_exactly() {
        let beats = regular_beats(40, 0.5, 1.0);
        let matcher = NearestBeatMatcher::new(&beats, 4, 2.0);

        for bar in 0..10 {
            let matched = matcher.match_bar(bar).expect("expected a match");
            assert_eq!(bar * 4, matched.index);
            assert_eq!(0.0, matched.distance);
            assert!(!matched.low_confidence);
        }
    }

    #[test]
    fn survives_false_beat() {
        let beats = with_false_beat(&regular_beats(40, 0.5, 0.0), 5);
        let matcher = NearestBeatMatcher::new(&beats, 4, 2.0);

        // Direct indexing would land on beat 16 (7.5s). Nearest matching finds 8.0s.
        let matched = matcher.match_bar(4).expect("expected a match");
        assert_eq!(17, matched.index);
        assert_eq!(8.0, matched.time);
    }

    #[test]
    fn prefers_first_on_ties() {
        let beats = vec![0.0, 1.5, 2.5, 3.0, 4.0];
        let matcher = NearestBeatMatcher::new(&beats, 4, 2.0);

        let matched = matcher.match_bar(1).expect("expected a match");
        assert_eq!(1, matched.index);
        assert_eq!(0.5, matched.distance);
    }

    #[test]
    fn returns_none_past_detected_audio() {
        let beats = regular_beats(8, 0.5, 0.0);
        let matcher = NearestBeatMatcher::new(&beats, 4, 2.0);

        // Last beat is at 3.5s, so bar 2 (4.0s) is within a bar of it but bar 3 (6.0s) is not.
        assert!(matcher.match_bar(2).is_some());
        assert!(matcher.match_bar(3).is_none());
        assert_eq!(Some(2), matcher.last_anchored_bar());
    }

    #[test]
    fn searches_tail_when_estimate_overshoots() {
        // Slow recording: only 6 beats but spread over 7 seconds.
        let beats = beats_at_tempo(6, 42.0, 0.0);
        let matcher = NearestBeatMatcher::new(&beats, 4, 2.0);

        let matched = matcher.match_bar(4).expect("expected a match");
        assert_eq!(5, matched.index);
    }

    #[test]
    fn flags_low_confidence() {
        let beats = vec![0.0, 0.5, 1.0, 1.5, 3.5, 6.0];
        let matcher = NearestBeatMatcher::new(&beats, 4, 2.0);

        // Expected at 4.0s; nearest is 3.5s which is fine.
        let matched = matcher.match_bar(2).expect("expected a match");
        assert!(!matched.low_confidence);

        let beats = vec![0.0, 0.5, 1.0, 1.5, 5.3];
        let matcher = NearestBeatMatcher::new(&beats, 4, 2.0);
        // Expected at 4.0s; estimate of index 8 searches indices 0..5 and finds 5.3s.
        let matched = matcher.match_bar(2).expect("expected a match");
        assert_eq!(4, matched.index);
        assert!(matched.low_confidence);
    }

    #[test]
    fn empty_beats_never_match() {
        let beats: Vec<f64> = vec![];
        let matcher = NearestBeatMatcher::new(&beats, 4, 2.0);
        assert!(matcher.match_bar(0).is_none());
        assert!(matcher.last_anchored_bar().is_none());
    }
}
