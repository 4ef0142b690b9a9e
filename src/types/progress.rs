// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::Deserialize;
use serde::Serialize;

use crate::types::factor::Factor;
use crate::types::grade::Quality;
use crate::types::phase::Phase;
use crate::types::timestamp::Timestamp;

/// A learner's progress on a single card.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Progress {
    /// The card has never been attempted.
    New,
    /// The card has been attempted at least once.
    Started(CardState),
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardState {
    pub card_phase: Phase,
    /// Index into the learning steps. Zero outside the stepped phases.
    pub step_index: usize,
    pub interval_days: u32,
    pub ease_factor: Factor,
    /// Successful review-phase repetitions.
    pub repetitions: u32,
    /// Failures while in the review phase.
    pub lapses: u32,
    /// Attempts across all phases.
    pub attempts: u32,
    pub next_review_at: Timestamp,
    /// When the card first entered the review phase.
    pub graduated_at: Option<Timestamp>,
    pub last_attempt_at: Timestamp,
    /// The most recently submitted rating.
    pub quality: Quality,
}

/// Progress as it may come from a store, with any field missing.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProgressRecord {
    New,
    Started(CardRecord),
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardRecord {
    pub card_phase: Option<Phase>,
    pub step_index: usize,
    pub interval_days: Option<u32>,
    pub ease_factor: Option<Factor>,
    pub repetitions: u32,
    pub lapses: u32,
    pub attempts: u32,
    pub next_review_at: Option<Timestamp>,
    pub graduated_at: Option<Timestamp>,
    pub last_attempt_at: Option<Timestamp>,
    pub quality: Option<Quality>,
}

impl ProgressRecord {
    /// Fill in missing fields: the phase defaults to learning, the ease to
    /// `starting_ease`, the interval to one day and timestamps to `now`.
    pub fn resolve(self, starting_ease: Factor, now: Timestamp) -> Progress {
        match self {
            ProgressRecord::New => Progress::New,
            ProgressRecord::Started(record) => Progress::Started(CardState {
                card_phase: record.card_phase.unwrap_or(Phase::Learning),
                step_index: record.step_index,
                interval_days: record.interval_days.unwrap_or(1),
                ease_factor: record.ease_factor.unwrap_or(starting_ease),
                repetitions: record.repetitions,
                lapses: record.lapses,
                attempts: record.attempts,
                next_review_at: record.next_review_at.unwrap_or(now),
                graduated_at: record.graduated_at,
                last_attempt_at: record.last_attempt_at.unwrap_or(now),
                quality: record.quality.unwrap_or(Quality::new(0)),
            }),
        }
    }
}

impl Progress {
    pub fn state(&self) -> Option<&CardState> {
        match self {
            Progress::New => None,
            Progress::Started(state) => Some(state),
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.state().map(|state| state.card_phase)
    }

    pub fn lapses(&self) -> u32 {
        self.state().map_or(0, |state| state.lapses)
    }

    pub fn attempts(&self) -> u32 {
        self.state().map_or(0, |state| state.attempts)
    }

    /// Whether the card should be shown at `now`. New cards are always due.
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self {
            Progress::New => true,
            Progress::Started(state) => state.next_review_at <= now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::error::Fallible;

    fn sample() -> CardState {
        let ts = Timestamp::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        CardState {
            card_phase: Phase::Review,
            step_index: 0,
            interval_days: 10,
            ease_factor: Factor::from_milli(2500),
            repetitions: 3,
            lapses: 1,
            attempts: 7,
            next_review_at: ts.plus_days(10),
            graduated_at: Some(ts),
            last_attempt_at: ts,
            quality: Quality::new(2),
        }
    }

    #[test]
    fn test_new_defaults() {
        let progress = Progress::New;
        assert_eq!(progress.phase(), None);
        assert_eq!(progress.lapses(), 0);
        assert_eq!(progress.attempts(), 0);
        assert!(progress.is_due(Timestamp::now()));
    }

    #[test]
    fn test_is_due() {
        let state = sample();
        let due = state.next_review_at;
        let last = state.last_attempt_at;
        let progress = Progress::Started(state);
        assert!(!progress.is_due(last));
        assert!(progress.is_due(due));
        assert!(progress.is_due(due.plus_minutes(1)));
    }

    #[test]
    fn test_partial_record_defaults() -> Fallible<()> {
        let now = Timestamp::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
        let record: ProgressRecord =
            serde_json::from_str(r#"{"status":"started","cardPhase":"review","lapses":2}"#)?;
        let progress = record.resolve(Factor::from_milli(2300), now);
        let state = progress.state().unwrap();
        assert_eq!(state.card_phase, Phase::Review);
        assert_eq!(state.step_index, 0);
        assert_eq!(state.interval_days, 1);
        assert_eq!(state.ease_factor, Factor::from_milli(2300));
        assert_eq!(state.repetitions, 0);
        assert_eq!(state.lapses, 2);
        assert_eq!(state.next_review_at, now);
        assert_eq!(state.graduated_at, None);

        let record: ProgressRecord = serde_json::from_str(r#"{"status":"started"}"#)?;
        let progress = record.resolve(Factor::from_milli(2500), now);
        assert_eq!(progress.phase(), Some(Phase::Learning));

        let record: ProgressRecord = serde_json::from_str(r#"{"status":"new"}"#)?;
        assert_eq!(record.resolve(Factor::from_milli(2500), now), Progress::New);
        Ok(())
    }

    #[test]
    fn test_complete_record_matches_progress() -> Fallible<()> {
        let json = serde_json::to_string(&Progress::Started(sample()))?;
        let record: ProgressRecord = serde_json::from_str(&json)?;
        let progress = record.resolve(Factor::from_milli(1300), Timestamp::now());
        assert_eq!(progress, Progress::Started(sample()));
        Ok(())
    }

    #[test]
    fn test_json_shape() -> Fallible<()> {
        let json = serde_json::to_value(Progress::New)?;
        assert_eq!(json, serde_json::json!({ "status": "new" }));

        let json = serde_json::to_value(Progress::Started(sample()))?;
        assert_eq!(json["status"], "started");
        assert_eq!(json["cardPhase"], "review");
        assert_eq!(json["easeFactor"], 2.5);
        assert_eq!(json["intervalDays"], 10);
        assert_eq!(json["nextReviewAt"], "2025-03-11T09:00:00Z");

        let back: Progress = serde_json::from_value(json)?;
        assert_eq!(back, Progress::Started(sample()));
        Ok(())
    }
}
