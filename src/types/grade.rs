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

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

/// The rating a learner submits for an attempt. Higher is better.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(u8);

impl Quality {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// The band of this rating. The stepped phases advance on `Hard` exactly
    /// as on `Good`.
    pub fn grade(self) -> Grade {
        match self.0 {
            0 => Grade::Again,
            1 => Grade::Hard,
            2 => Grade::Good,
            _ => Grade::Easy,
        }
    }
}

impl ToSql for Quality {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Quality {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let int: i64 = FromSql::column_result(value)?;
        u8::try_from(int)
            .map(Quality)
            .map_err(|_| FromSqlError::OutOfRange(int))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        let grades: Vec<Grade> = (0..=5).map(|q| Quality::new(q).grade()).collect();
        assert_eq!(
            grades,
            vec![
                Grade::Again,
                Grade::Hard,
                Grade::Good,
                Grade::Easy,
                Grade::Easy,
                Grade::Easy
            ]
        );
    }

    #[test]
    fn test_large_ratings_are_easy() {
        assert_eq!(Quality::new(u8::MAX).grade(), Grade::Easy);
    }
}
