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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::Row;
use rusqlite::Transaction;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::settings::SettingsRecord;
use crate::store::ProgressStore;
use crate::store::SettingsStore;
use crate::types::progress::CardState;
use crate::types::progress::Progress;

/// A SQLite-backed store for progress and settings.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(database_path: &str) -> Fallible<Self> {
        let conn = Connection::open(database_path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Fallible<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Fallible<Self> {
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                log::debug!("Creating database schema.");
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn })
    }

    /// The number of progress records stored.
    pub fn progress_count(&self) -> Fallible<usize> {
        let conn = self.acquire()?;
        let count: i64 = conn.query_row("select count(*) from progress;", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| ErrorReport::new("invalid progress count"))
    }

    fn acquire(&self) -> Fallible<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ErrorReport::new("database lock poisoned"))
    }
}

impl ProgressStore for Database {
    fn get_progress(&self, card_id: &str, user_id: &str) -> Fallible<Progress> {
        let conn = self.acquire()?;
        let sql = "select card_phase, step_index, interval_days, ease_factor, repetitions, lapses, attempts, next_review_at, graduated_at, last_attempt_at, quality from progress where card_id = ? and user_id = ?;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query((card_id, user_id))?;
        if let Some(row) = rows.next()? {
            Ok(Progress::Started(read_state(row)?))
        } else {
            Ok(Progress::New)
        }
    }

    fn set_progress(&self, card_id: &str, user_id: &str, progress: &Progress) -> Fallible<()> {
        let mut conn = self.acquire()?;
        let tx = conn.transaction()?;
        match progress {
            Progress::New => {
                tx.execute(
                    "delete from progress where card_id = ? and user_id = ?;",
                    (card_id, user_id),
                )?;
            }
            Progress::Started(state) => upsert_progress(&tx, card_id, user_id, state)?,
        }
        tx.commit()?;
        Ok(())
    }
}

impl SettingsStore for Database {
    fn get_settings(&self, user_id: &str) -> Fallible<Option<SettingsRecord>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare("select settings from settings where user_id = ?;")?;
        let mut rows = stmt.query([user_id])?;
        if let Some(row) = rows.next()? {
            let json: String = row.get(0)?;
            let record: SettingsRecord = serde_json::from_str(&json)?;
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    fn set_settings(&self, user_id: &str, record: &SettingsRecord) -> Fallible<()> {
        let json = serde_json::to_string(record)?;
        let conn = self.acquire()?;
        conn.execute(
            "insert into settings (user_id, settings) values (?, ?) on conflict (user_id) do update set settings = excluded.settings;",
            (user_id, json),
        )?;
        Ok(())
    }
}

fn read_state(row: &Row) -> Fallible<CardState> {
    let step_index: i64 = row.get(1)?;
    let step_index = usize::try_from(step_index)
        .map_err(|_| ErrorReport::new(format!("invalid step index: {step_index}")))?;
    Ok(CardState {
        card_phase: row.get(0)?,
        step_index,
        interval_days: row.get(2)?,
        ease_factor: row.get(3)?,
        repetitions: row.get(4)?,
        lapses: row.get(5)?,
        attempts: row.get(6)?,
        next_review_at: row.get(7)?,
        graduated_at: row.get(8)?,
        last_attempt_at: row.get(9)?,
        quality: row.get(10)?,
    })
}

fn upsert_progress(
    tx: &Transaction,
    card_id: &str,
    user_id: &str,
    state: &CardState,
) -> Fallible<()> {
    let step_index = i64::try_from(state.step_index)
        .map_err(|_| ErrorReport::new(format!("invalid step index: {}", state.step_index)))?;
    let sql = "insert into progress (card_id, user_id, card_phase, step_index, interval_days, ease_factor, repetitions, lapses, attempts, next_review_at, graduated_at, last_attempt_at, quality) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) on conflict (card_id, user_id) do update set card_phase = excluded.card_phase, step_index = excluded.step_index, interval_days = excluded.interval_days, ease_factor = excluded.ease_factor, repetitions = excluded.repetitions, lapses = excluded.lapses, attempts = excluded.attempts, next_review_at = excluded.next_review_at, graduated_at = excluded.graduated_at, last_attempt_at = excluded.last_attempt_at, quality = excluded.quality;";
    tx.execute(
        sql,
        (
            card_id,
            user_id,
            state.card_phase,
            step_index,
            state.interval_days,
            state.ease_factor,
            state.repetitions,
            state.lapses,
            state.attempts,
            state.next_review_at,
            state.graduated_at,
            state.last_attempt_at,
            state.quality,
        ),
    )?;
    Ok(())
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["progress"], |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::scheduler::Scheduler;
    use crate::types::grade::Quality;
    use crate::types::phase::Phase;

    fn reviewed_twice() -> Progress {
        let scheduler = Scheduler::new();
        let progress = scheduler.schedule_next(&Progress::New, Quality::new(2), None);
        scheduler.schedule_next(&progress, Quality::new(2), None)
    }

    #[test]
    fn test_missing_progress_is_new() -> Fallible<()> {
        let db = Database::in_memory()?;
        assert_eq!(db.get_progress("c1", "u1")?, Progress::New);
        Ok(())
    }

    #[test]
    fn test_progress_roundtrip() -> Fallible<()> {
        let db = Database::in_memory()?;
        let progress = reviewed_twice();
        db.set_progress("c1", "u1", &progress)?;
        assert_eq!(db.get_progress("c1", "u1")?, progress);
        assert_eq!(db.get_progress("c1", "u2")?, Progress::New);
        Ok(())
    }

    #[test]
    fn test_progress_upsert() -> Fallible<()> {
        let db = Database::in_memory()?;
        let first = Scheduler::new().schedule_next(&Progress::New, Quality::new(2), None);
        db.set_progress("c1", "u1", &first)?;
        let second = reviewed_twice();
        db.set_progress("c1", "u1", &second)?;
        assert_eq!(db.progress_count()?, 1);
        let stored = db.get_progress("c1", "u1")?;
        assert_eq!(stored.phase(), Some(Phase::Review));
        assert_eq!(stored, second);
        Ok(())
    }

    #[test]
    fn test_saving_new_deletes() -> Fallible<()> {
        let db = Database::in_memory()?;
        db.set_progress("c1", "u1", &reviewed_twice())?;
        db.set_progress("c1", "u1", &Progress::New)?;
        assert_eq!(db.progress_count()?, 0);
        Ok(())
    }

    #[test]
    fn test_step_index_roundtrip() -> Fallible<()> {
        let db = Database::in_memory()?;
        let progress = Scheduler::new().schedule_next(&Progress::New, Quality::new(2), None);
        assert_eq!(progress.state().map(|s| s.step_index), Some(1));
        db.set_progress("c1", "u1", &progress)?;
        assert_eq!(db.get_progress("c1", "u1")?, progress);
        assert_eq!(db.progress_count()?, 1);
        Ok(())
    }

    #[test]
    fn test_negative_step_index_is_an_error() -> Fallible<()> {
        let db = Database::in_memory()?;
        db.set_progress("c1", "u1", &reviewed_twice())?;
        {
            let conn = db.acquire()?;
            conn.execute("update progress set step_index = -1;", [])?;
        }
        let err = db.get_progress("c1", "u1").err().unwrap();
        assert_eq!(err.to_string(), "error: invalid step index: -1");
        Ok(())
    }

    #[test]
    fn test_unknown_phase_reads_as_learning() -> Fallible<()> {
        let db = Database::in_memory()?;
        db.set_progress("c1", "u1", &reviewed_twice())?;
        {
            let conn = db.acquire()?;
            conn.execute("update progress set card_phase = 'mastered';", [])?;
        }
        let progress = db.get_progress("c1", "u1")?;
        assert_eq!(progress.phase(), Some(Phase::Learning));
        Ok(())
    }

    #[test]
    fn test_settings() -> Fallible<()> {
        let db = Database::in_memory()?;
        assert_eq!(db.get_settings("u1")?, None);
        let record = SettingsRecord {
            learning_steps: Some(vec![2, 4]),
            ..SettingsRecord::default()
        };
        db.set_settings("u1", &record)?;
        db.set_settings("u1", &record)?;
        assert_eq!(db.get_settings("u1")?, Some(record));
        assert_eq!(db.get_settings("u2")?, None);
        Ok(())
    }

    #[test]
    fn test_reopen_file() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("progress.db");
        let path = path.to_str().ok_or_else(|| ErrorReport::new("invalid path"))?;
        let progress = reviewed_twice();
        {
            let db = Database::new(path)?;
            db.set_progress("c1", "u1", &progress)?;
        }
        let db = Database::new(path)?;
        assert_eq!(db.get_progress("c1", "u1")?, progress);
        Ok(())
    }
}
