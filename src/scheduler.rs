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

use crate::settings::Settings;
use crate::types::factor::Factor;
use crate::types::factor::scale_days;
use crate::types::grade::Grade;
use crate::types::grade::Quality;
use crate::types::phase::Phase;
use crate::types::progress::CardState;
use crate::types::progress::Progress;
use crate::types::progress::ProgressRecord;
use crate::types::timestamp::Timestamp;

/// How much a hard or easy review moves the ease factor.
const EASE_STEP: Factor = Factor::from_milli(150);

/// Delay used if the step list is empty.
const FALLBACK_STEP_MINUTES: u32 = 1;

/// Computes a card's next state from its current state and a rating.
///
/// The scheduler holds no mutable state: it can be shared freely across
/// threads, and every call returns a fresh `Progress`.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    defaults: Settings,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler that falls back to the given settings instead of the
    /// built-in ones.
    pub fn with_defaults(defaults: Settings) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    /// Schedule the card as of the current time.
    pub fn schedule_next(
        &self,
        progress: &Progress,
        quality: Quality,
        settings: Option<&Settings>,
    ) -> Progress {
        self.schedule_at(progress, quality, settings, Timestamp::now())
    }

    /// Schedule a card whose stored progress may be missing fields. The ease
    /// defaults to the settings' starting ease.
    pub fn schedule_record_at(
        &self,
        record: ProgressRecord,
        quality: Quality,
        settings: Option<&Settings>,
        now: Timestamp,
    ) -> Progress {
        let starting_ease = settings.unwrap_or(&self.defaults).starting_ease;
        let progress = record.resolve(starting_ease, now);
        self.schedule_at(&progress, quality, settings, now)
    }

    pub fn schedule_at(
        &self,
        progress: &Progress,
        quality: Quality,
        settings: Option<&Settings>,
        now: Timestamp,
    ) -> Progress {
        let settings = settings.unwrap_or(&self.defaults);
        let mut state = match progress {
            Progress::New => initial_state(settings, now, quality),
            Progress::Started(state) => state.clone(),
        };

        // The step list may have shrunk since this state was written.
        state.step_index = if state.card_phase.is_stepped() {
            state.step_index.min(last_step(settings))
        } else {
            0
        };
        state.ease_factor = clamp_ease(state.ease_factor, settings);
        state.interval_days = clamp_interval(state.interval_days, settings);

        let before = state.card_phase;
        let grade = quality.grade();
        match before {
            Phase::Learning => learning(&mut state, grade, settings, now),
            Phase::Review => review(&mut state, grade, settings, now),
            Phase::Relearning => relearning(&mut state, grade, settings, now),
        }

        state.ease_factor = clamp_ease(state.ease_factor, settings);
        state.interval_days = clamp_interval(state.interval_days, settings);
        state.attempts = state.attempts.saturating_add(1);
        state.last_attempt_at = now;
        state.quality = quality;

        log::debug!(
            "{:?} in {before}: now {} (step {}, interval {}d, ease {}).",
            grade,
            state.card_phase,
            state.step_index,
            state.interval_days,
            state.ease_factor
        );
        Progress::Started(state)
    }
}

fn initial_state(settings: &Settings, now: Timestamp, quality: Quality) -> CardState {
    CardState {
        card_phase: Phase::Learning,
        step_index: 0,
        interval_days: 1,
        ease_factor: settings.starting_ease,
        repetitions: 0,
        lapses: 0,
        attempts: 0,
        next_review_at: now,
        graduated_at: None,
        last_attempt_at: now,
        quality,
    }
}

fn learning(state: &mut CardState, grade: Grade, settings: &Settings, now: Timestamp) {
    match grade {
        Grade::Again => restart_steps(state, settings, now),
        Grade::Hard | Grade::Good => {
            if !advance_step(state, settings, now) {
                graduate(state, settings.graduating_interval, settings, now);
            }
        }
        Grade::Easy => graduate(state, settings.easy_interval, settings, now),
    }
}

fn relearning(state: &mut CardState, grade: Grade, settings: &Settings, now: Timestamp) {
    match grade {
        Grade::Again => restart_steps(state, settings, now),
        Grade::Hard | Grade::Good => {
            if !advance_step(state, settings, now) {
                rejoin_review(state, settings, now);
            }
        }
        Grade::Easy => rejoin_review(state, settings, now),
    }
}

fn review(state: &mut CardState, grade: Grade, settings: &Settings, now: Timestamp) {
    let interval = state.interval_days;
    match grade {
        Grade::Again => {
            state.lapses = state.lapses.saturating_add(1);
            state.card_phase = Phase::Relearning;
            state.step_index = 0;
            state.interval_days = clamp_interval(
                scale_days(interval, &[settings.new_interval_percentage]),
                settings,
            );
            state.next_review_at = now.plus_minutes(step_minutes(settings, 0));
            return;
        }
        Grade::Hard => {
            state.ease_factor = clamp_ease(state.ease_factor.saturating_sub(EASE_STEP), settings);
            state.interval_days = scale_days(interval, &[settings.hard_interval_multiplier]);
        }
        Grade::Good => {
            state.interval_days =
                scale_days(interval, &[state.ease_factor, settings.interval_modifier]);
        }
        Grade::Easy => {
            state.ease_factor = clamp_ease(state.ease_factor.saturating_add(EASE_STEP), settings);
            state.interval_days = scale_days(
                interval,
                &[
                    state.ease_factor,
                    settings.interval_modifier,
                    settings.easy_bonus,
                ],
            );
        }
    }
    state.interval_days = clamp_interval(state.interval_days, settings);
    state.repetitions = state.repetitions.saturating_add(1);
    state.next_review_at = now.plus_days(state.interval_days);
}

fn restart_steps(state: &mut CardState, settings: &Settings, now: Timestamp) {
    state.step_index = 0;
    state.next_review_at = now.plus_minutes(step_minutes(settings, 0));
}

/// Move to the next learning step. Returns false if already on the last one.
fn advance_step(state: &mut CardState, settings: &Settings, now: Timestamp) -> bool {
    if state.step_index >= last_step(settings) {
        return false;
    }
    state.step_index += 1;
    state.next_review_at = now.plus_minutes(step_minutes(settings, state.step_index));
    true
}

fn graduate(state: &mut CardState, days: u32, settings: &Settings, now: Timestamp) {
    state.card_phase = Phase::Review;
    state.step_index = 0;
    state.interval_days = clamp_interval(days, settings);
    state.repetitions = 1;
    state.ease_factor = clamp_ease(settings.starting_ease, settings);
    state.graduated_at = Some(now);
    state.next_review_at = now.plus_days(state.interval_days);
}

/// Return to review keeping the interval discounted at the lapse.
fn rejoin_review(state: &mut CardState, settings: &Settings, now: Timestamp) {
    state.card_phase = Phase::Review;
    state.step_index = 0;
    state.interval_days = clamp_interval(state.interval_days.max(1), settings);
    state.next_review_at = now.plus_days(state.interval_days);
}

fn last_step(settings: &Settings) -> usize {
    settings.learning_steps.len().saturating_sub(1)
}

fn step_minutes(settings: &Settings, index: usize) -> u32 {
    settings
        .learning_steps
        .get(index)
        .copied()
        .unwrap_or(FALLBACK_STEP_MINUTES)
}

fn clamp_ease(ease: Factor, settings: &Settings) -> Factor {
    ease.clamp(settings.minimum_ease, settings.maximum_ease.max(settings.minimum_ease))
}

fn clamp_interval(days: u32, settings: &Settings) -> u32 {
    days.clamp(
        settings.minimum_interval,
        settings.maximum_interval.max(settings.minimum_interval),
    )
}
