// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Half-open time intervals.

use crate::SchoolError;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)` with `start < end`.
///
/// The only way to build one is [`TimeInterval::new`], so a zero-length or
/// inverted interval never reaches the conflict detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

/// Unchecked wire form; deserialization goes through [`TimeInterval::new`].
#[derive(Deserialize)]
struct RawInterval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TryFrom<RawInterval> for TimeInterval {
    type Error = SchoolError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeInterval {
    /// # Errors
    ///
    /// [`SchoolError::InvalidInterval`] when `end <= start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, SchoolError> {
        if end <= start {
            return Err(SchoolError::InvalidInterval);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Strict overlap: touching intervals (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn span(a: (u32, u32), b: (u32, u32)) -> TimeInterval {
        TimeInterval::new(at(a.0, a.1), at(b.0, b.1)).unwrap()
    }

    #[test]
    fn rejects_inverted_and_empty() {
        assert_eq!(
            TimeInterval::new(at(10, 0), at(9, 0)),
            Err(SchoolError::InvalidInterval)
        );
        assert_eq!(
            TimeInterval::new(at(10, 0), at(10, 0)),
            Err(SchoolError::InvalidInterval)
        );
    }

    #[test]
    fn partial_overlap() {
        assert!(span((9, 0), (10, 0)).overlaps(&span((9, 30), (10, 30))));
    }

    #[test]
    fn containment_overlaps() {
        assert!(span((9, 0), (12, 0)).overlaps(&span((10, 0), (11, 0))));
        assert!(span((10, 0), (11, 0)).overlaps(&span((9, 0), (12, 0))));
    }

    #[test]
    fn adjacent_does_not_overlap() {
        let first = span((9, 0), (10, 0));
        let second = span((10, 0), (11, 0));
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn deserialization_checks_bounds() {
        let valid: TimeInterval = serde_json::from_str(
            r#"{"start":"2025-03-10T09:00:00","end":"2025-03-10T10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(valid, span((9, 0), (10, 0)));

        let inverted = serde_json::from_str::<TimeInterval>(
            r#"{"start":"2025-03-10T10:00:00","end":"2025-03-10T09:00:00"}"#,
        );
        let err = inverted.unwrap_err().to_string();
        assert!(err.contains("session must end after it starts"), "{err}");
    }

    #[test]
    fn duration_is_end_minus_start() {
        assert_eq!(span((9, 0), (10, 30)).duration(), Duration::minutes(90));
    }
}
