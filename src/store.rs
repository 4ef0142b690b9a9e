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

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::settings::SettingsRecord;
use crate::types::progress::Progress;

/// Where a learner's progress on each card is kept.
pub trait ProgressStore {
    /// Returns `Progress::New` for a card the learner has never attempted.
    fn get_progress(&self, card_id: &str, user_id: &str) -> Fallible<Progress>;

    fn set_progress(&self, card_id: &str, user_id: &str, progress: &Progress) -> Fallible<()>;
}

/// Where per-user settings are kept.
pub trait SettingsStore {
    /// Returns `None` if the user has no settings of their own.
    fn get_settings(&self, user_id: &str) -> Fallible<Option<SettingsRecord>>;

    fn set_settings(&self, user_id: &str, record: &SettingsRecord) -> Fallible<()>;
}

type ProgressKey = (String, String);

/// An in-memory store, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    progress: Mutex<HashMap<ProgressKey, Progress>>,
    settings: Mutex<HashMap<String, SettingsRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Fallible<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ErrorReport::new("memory store lock poisoned"))
}

impl ProgressStore for MemoryStore {
    fn get_progress(&self, card_id: &str, user_id: &str) -> Fallible<Progress> {
        let map = lock(&self.progress)?;
        let key = (card_id.to_string(), user_id.to_string());
        Ok(map.get(&key).cloned().unwrap_or(Progress::New))
    }

    fn set_progress(&self, card_id: &str, user_id: &str, progress: &Progress) -> Fallible<()> {
        let mut map = lock(&self.progress)?;
        let key = (card_id.to_string(), user_id.to_string());
        match progress {
            Progress::New => {
                map.remove(&key);
            }
            Progress::Started(_) => {
                map.insert(key, progress.clone());
            }
        }
        Ok(())
    }
}

impl SettingsStore for MemoryStore {
    fn get_settings(&self, user_id: &str) -> Fallible<Option<SettingsRecord>> {
        let map = lock(&self.settings)?;
        Ok(map.get(user_id).cloned())
    }

    fn set_settings(&self, user_id: &str, record: &SettingsRecord) -> Fallible<()> {
        let mut map = lock(&self.settings)?;
        map.insert(user_id.to_string(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::types::grade::Quality;

    #[test]
    fn test_unknown_card_is_new() -> Fallible<()> {
        let store = MemoryStore::new();
        assert_eq!(store.get_progress("c1", "u1")?, Progress::New);
        assert_eq!(store.get_settings("u1")?, None);
        Ok(())
    }

    #[test]
    fn test_progress_is_per_user() -> Fallible<()> {
        let store = MemoryStore::new();
        let progress = Scheduler::new().schedule_next(&Progress::New, Quality::new(2), None);
        store.set_progress("c1", "u1", &progress)?;
        assert_eq!(store.get_progress("c1", "u1")?, progress);
        assert_eq!(store.get_progress("c1", "u2")?, Progress::New);
        assert_eq!(store.get_progress("c2", "u1")?, Progress::New);

        store.set_progress("c1", "u1", &Progress::New)?;
        assert_eq!(store.get_progress("c1", "u1")?, Progress::New);
        Ok(())
    }

    #[test]
    fn test_settings() -> Fallible<()> {
        let store = MemoryStore::new();
        let record = SettingsRecord {
            leech_threshold: Some(3),
            ..SettingsRecord::default()
        };
        store.set_settings("u1", &record)?;
        assert_eq!(store.get_settings("u1")?, Some(record));
        Ok(())
    }
}
