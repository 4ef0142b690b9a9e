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

use std::fs::read_to_string;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;

use crate::db::Database;
use crate::error::Fallible;
use crate::error::fail;
use crate::review::submit_review;
use crate::scheduler::Scheduler;
use crate::settings::Settings;
use crate::store::ProgressStore;
use crate::store::SettingsStore;
use crate::types::grade::Quality;
use crate::types::progress::Progress;
use crate::types::progress::ProgressRecord;
use crate::types::timestamp::Timestamp;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Record a rating for a card and print its new progress.
    Review {
        /// Path to the progress database.
        db: String,
        card: String,
        user: String,
        /// Rating: 0 = again, 1 = hard, 2 = good, 3 or more = easy.
        quality: u8,
    },
    /// Print a card's stored progress.
    Show {
        /// Path to the progress database.
        db: String,
        card: String,
        user: String,
    },
    /// Store a user's settings from a TOML file.
    Configure {
        /// Path to the progress database.
        db: String,
        user: String,
        /// Path to the settings file.
        file: PathBuf,
    },
    /// Print the resolved settings.
    Settings {
        /// Optional path to a settings file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Schedule a new card through a sequence of ratings.
    Simulate {
        /// Optional path to a settings file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Optional path to a JSON progress record to start from.
        #[arg(long)]
        progress: Option<PathBuf>,
        /// Ratings to apply, in order.
        #[arg(required = true)]
        qualities: Vec<u8>,
    },
}

pub fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Review {
            db,
            card,
            user,
            quality,
        } => {
            let db = Database::new(&db)?;
            let outcome = submit_review(
                &db,
                &db,
                &Scheduler::new(),
                &card,
                &user,
                Quality::new(quality),
                Timestamp::now(),
            )?;
            println!("{}", serde_json::to_string_pretty(&outcome.progress)?);
            if outcome.leech {
                println!("leech");
            }
            Ok(())
        }
        Command::Show { db, card, user } => {
            let db = Database::new(&db)?;
            let progress = db.get_progress(&card, &user)?;
            println!("{}", serde_json::to_string_pretty(&progress)?);
            Ok(())
        }
        Command::Configure { db, user, file } => {
            let settings = load_settings(Some(file))?;
            let db = Database::new(&db)?;
            db.set_settings(&user, &settings.to_record())?;
            println!("ok");
            Ok(())
        }
        Command::Settings { config } => {
            let settings = load_settings(config)?;
            print!("{}", settings.to_toml()?);
            Ok(())
        }
        Command::Simulate {
            config,
            progress,
            qualities,
        } => {
            let settings = load_settings(config)?;
            let scheduler = Scheduler::with_defaults(settings);
            let mut now = Timestamp::now();
            let mut progress = match progress {
                None => Progress::New,
                Some(path) => {
                    let record = load_progress(&path)?;
                    record.resolve(scheduler.defaults().starting_ease, now)
                }
            };
            for quality in qualities {
                progress = scheduler.schedule_at(&progress, Quality::new(quality), None, now);
                println!("{}", serde_json::to_string(&progress)?);
                if let Some(state) = progress.state() {
                    now = state.next_review_at;
                }
            }
            Ok(())
        }
    }
}

fn load_settings(path: Option<PathBuf>) -> Fallible<Settings> {
    match path {
        None => Ok(Settings::default()),
        Some(path) => {
            if !path.exists() {
                return fail("settings file does not exist.");
            }
            let source = read_to_string(&path)?;
            log::debug!("Loaded settings from {}.", path.display());
            Settings::from_toml(&source)
        }
    }
}

fn load_progress(path: &Path) -> Fallible<ProgressRecord> {
    if !path.exists() {
        return fail("progress file does not exist.");
    }
    let source = read_to_string(path)?;
    Ok(serde_json::from_str(&source)?)
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use tempfile::tempdir;

    use super::*;
    use crate::types::factor::Factor;

    #[test]
    fn test_load_default_settings() -> Fallible<()> {
        assert_eq!(load_settings(None)?, Settings::default());
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_settings(Some(PathBuf::from("./derpherp.toml")));
        let err = result.err().unwrap();
        assert_eq!(err.to_string(), "error: settings file does not exist.");
    }

    #[test]
    fn test_load_file() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("settings.toml");
        write(&path, "easy_bonus = 1.5\nleech_threshold = 4\n")?;
        let settings = load_settings(Some(path))?;
        assert_eq!(settings.easy_bonus, Factor::from_milli(1500));
        assert_eq!(settings.leech_threshold, 4);
        Ok(())
    }

    #[test]
    fn test_load_partial_progress() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("progress.json");
        write(&path, r#"{"status":"started","cardPhase":"review","intervalDays":5}"#)?;
        let record = load_progress(&path)?;
        let progress = record.resolve(Factor::from_milli(2500), Timestamp::now());
        let state = progress.state().unwrap();
        assert_eq!(state.interval_days, 5);
        assert_eq!(state.ease_factor, Factor::from_milli(2500));
        assert!(load_progress(Path::new("./derpherp.json")).is_err());
        Ok(())
    }

    #[test]
    fn test_command_parses() {
        let command = Command::try_parse_from(["srs-scheduler", "simulate", "2", "2", "3"]);
        match command {
            Ok(Command::Simulate {
                config,
                progress,
                qualities,
            }) => {
                assert_eq!(config, None);
                assert_eq!(progress, None);
                assert_eq!(qualities, vec![2, 2, 3]);
            }
            _ => panic!("expected simulate"),
        }
        assert!(Command::try_parse_from(["srs-scheduler", "simulate"]).is_err());
    }
}
