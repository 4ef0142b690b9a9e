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

use crate::error::Fallible;
use crate::leech::is_leech;
use crate::scheduler::Scheduler;
use crate::settings::resolve_settings;
use crate::store::ProgressStore;
use crate::store::SettingsStore;
use crate::types::grade::Quality;
use crate::types::progress::Progress;
use crate::types::timestamp::Timestamp;

/// The result of submitting a review.
#[derive(Debug, PartialEq)]
pub struct ReviewOutcome {
    /// The card's new progress, already persisted.
    pub progress: Progress,
    /// Whether the card is a leech after this review.
    pub leech: bool,
}

/// Record a learner's rating for a card: load the card's progress and the
/// learner's settings, schedule the card, and save the result.
///
/// Failing to load settings is not an error; the defaults are used instead.
pub fn submit_review(
    progress_store: &impl ProgressStore,
    settings_store: &impl SettingsStore,
    scheduler: &Scheduler,
    card_id: &str,
    user_id: &str,
    quality: Quality,
    now: Timestamp,
) -> Fallible<ReviewOutcome> {
    let current = progress_store.get_progress(card_id, user_id)?;
    let record = match settings_store.get_settings(user_id) {
        Ok(record) => record,
        Err(e) => {
            log::warn!("Failed to load settings for {user_id}, using defaults: {e}");
            None
        }
    };
    let settings = match record {
        Some(record) => resolve_settings(Some(record)),
        None => scheduler.defaults().clone(),
    };
    let progress = scheduler.schedule_at(&current, quality, Some(&settings), now);
    progress_store.set_progress(card_id, user_id, &progress)?;

    let leech = is_leech(&progress, &settings);
    if leech && progress.lapses() > current.lapses() {
        log::info!(
            "Card {card_id} is a leech for {user_id} ({} lapses).",
            progress.lapses()
        );
    }
    Ok(ReviewOutcome { progress, leech })
}
