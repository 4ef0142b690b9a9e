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

use crate::error::Fallible;
use crate::types::factor::Factor;

/// The longest interval any setting may ask for, in days.
pub const INTERVAL_CEILING_DAYS: u32 = 36500;

/// The longest learning step, in minutes.
pub const STEP_CEILING_MINUTES: u32 = 525_600;

/// A complete set of scheduling parameters.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Settings {
    /// Learning steps, in minutes.
    pub learning_steps: Vec<u32>,
    /// Interval in days given on graduating from the last learning step.
    pub graduating_interval: u32,
    /// Interval in days given on graduating early with an easy rating.
    pub easy_interval: u32,
    pub starting_ease: Factor,
    pub easy_bonus: Factor,
    pub interval_modifier: Factor,
    pub hard_interval_multiplier: Factor,
    /// Fraction of the review interval kept after a lapse.
    pub new_interval_percentage: Factor,
    pub minimum_interval: u32,
    pub maximum_interval: u32,
    pub minimum_ease: Factor,
    pub maximum_ease: Factor,
    /// Lapses at which a card is considered a leech.
    pub leech_threshold: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            learning_steps: vec![1, 10],
            graduating_interval: 1,
            easy_interval: 4,
            starting_ease: Factor::from_milli(2500),
            easy_bonus: Factor::from_milli(1300),
            interval_modifier: Factor::ONE,
            hard_interval_multiplier: Factor::from_milli(1200),
            new_interval_percentage: Factor::from_milli(0),
            minimum_interval: 1,
            maximum_interval: INTERVAL_CEILING_DAYS,
            minimum_ease: Factor::from_milli(1300),
            maximum_ease: Factor::from_milli(5000),
            leech_threshold: 8,
        }
    }
}

/// Settings as they come from a settings source. Any field may be missing.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct SettingsRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_steps: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduating_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easy_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_ease: Option<Factor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easy_bonus: Option<Factor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_modifier: Option<Factor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_interval_multiplier: Option<Factor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_interval_percentage: Option<Factor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_ease: Option<Factor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_ease: Option<Factor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leech_threshold: Option<u32>,
}

impl Settings {
    /// Load settings from a TOML document. Missing keys take their defaults.
    pub fn from_toml(source: &str) -> Fallible<Self> {
        let record: SettingsRecord = toml::from_str(source)?;
        Ok(resolve_settings(Some(record)))
    }

    pub fn to_toml(&self) -> Fallible<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_record(&self) -> SettingsRecord {
        SettingsRecord {
            learning_steps: Some(self.learning_steps.clone()),
            graduating_interval: Some(self.graduating_interval),
            easy_interval: Some(self.easy_interval),
            starting_ease: Some(self.starting_ease),
            easy_bonus: Some(self.easy_bonus),
            interval_modifier: Some(self.interval_modifier),
            hard_interval_multiplier: Some(self.hard_interval_multiplier),
            new_interval_percentage: Some(self.new_interval_percentage),
            minimum_interval: Some(self.minimum_interval),
            maximum_interval: Some(self.maximum_interval),
            minimum_ease: Some(self.minimum_ease),
            maximum_ease: Some(self.maximum_ease),
            leech_threshold: Some(self.leech_threshold),
        }
    }
}

/// Turn a possibly absent, possibly partial record into complete settings.
///
/// Missing fields take their defaults. Fields that violate their constraints
/// are replaced by their defaults with a warning. This never fails.
pub fn resolve_settings(record: Option<SettingsRecord>) -> Settings {
    let defaults = Settings::default();
    let Some(record) = record else {
        return defaults;
    };

    let learning_steps = checked(
        "learning_steps",
        record.learning_steps,
        &defaults.learning_steps,
        |steps| {
            !steps.is_empty()
                && steps
                    .iter()
                    .all(|&m| m > 0 && m <= STEP_CEILING_MINUTES)
        },
    );
    let graduating_interval = checked(
        "graduating_interval",
        record.graduating_interval,
        &defaults.graduating_interval,
        |&days| in_day_range(days),
    );
    let easy_interval = checked(
        "easy_interval",
        record.easy_interval,
        &defaults.easy_interval,
        |&days| in_day_range(days),
    );
    if easy_interval < graduating_interval {
        log::warn!(
            "easy_interval ({easy_interval}) is shorter than graduating_interval ({graduating_interval})."
        );
    }
    let easy_bonus = checked(
        "easy_bonus",
        record.easy_bonus,
        &defaults.easy_bonus,
        |&f| f >= Factor::ONE,
    );
    let interval_modifier = checked(
        "interval_modifier",
        record.interval_modifier,
        &defaults.interval_modifier,
        |&f| f > Factor::from_milli(0),
    );
    let hard_interval_multiplier = checked(
        "hard_interval_multiplier",
        record.hard_interval_multiplier,
        &defaults.hard_interval_multiplier,
        |&f| f > Factor::from_milli(0),
    );
    let new_interval_percentage = checked(
        "new_interval_percentage",
        record.new_interval_percentage,
        &defaults.new_interval_percentage,
        |&f| f <= Factor::ONE,
    );
    let leech_threshold = checked(
        "leech_threshold",
        record.leech_threshold,
        &defaults.leech_threshold,
        |&n| n > 0,
    );

    let minimum_interval = checked(
        "minimum_interval",
        record.minimum_interval,
        &defaults.minimum_interval,
        |&days| in_day_range(days),
    );
    let maximum_interval = checked(
        "maximum_interval",
        record.maximum_interval,
        &defaults.maximum_interval.max(minimum_interval),
        |&days| days >= minimum_interval && in_day_range(days),
    );

    let (minimum_ease, maximum_ease) = {
        let min = record.minimum_ease.unwrap_or(defaults.minimum_ease);
        let max = record.maximum_ease.unwrap_or(defaults.maximum_ease);
        if min > Factor::from_milli(0) && min <= max {
            (min, max)
        } else {
            log::warn!("Invalid ease bounds [{min}, {max}], using defaults.");
            (defaults.minimum_ease, defaults.maximum_ease)
        }
    };
    let starting_ease = {
        let ease = record.starting_ease.unwrap_or(defaults.starting_ease);
        let clamped = ease.clamp(minimum_ease, maximum_ease);
        if clamped != ease {
            log::warn!("starting_ease {ease} is out of bounds, clamped to {clamped}.");
        }
        clamped
    };

    Settings {
        learning_steps,
        graduating_interval,
        easy_interval,
        starting_ease,
        easy_bonus,
        interval_modifier,
        hard_interval_multiplier,
        new_interval_percentage,
        minimum_interval,
        maximum_interval,
        minimum_ease,
        maximum_ease,
        leech_threshold,
    }
}

fn in_day_range(days: u32) -> bool {
    days > 0 && days <= INTERVAL_CEILING_DAYS
}

fn checked<T: Clone + std::fmt::Debug>(
    name: &str,
    value: Option<T>,
    default: &T,
    valid: impl Fn(&T) -> bool,
) -> T {
    match value {
        None => default.clone(),
        Some(value) if valid(&value) => value,
        Some(value) => {
            log::warn!("Invalid {name} {value:?}, using default {default:?}.");
            default.clone()
        }
    }
}
