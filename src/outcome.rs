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

//! Result envelope handed to the presentation layer.

use crate::SchoolError;

/// `(success, message, entity)` for a mutating operation.
///
/// `message` is always fit for direct display. `error` keeps the typed
/// failure for callers that branch on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub success: bool,
    pub message: String,
    pub entity: Option<T>,
    pub error: Option<SchoolError>,
}

impl<T> Outcome<T> {
    pub fn ok(message: impl Into<String>, entity: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            entity: Some(entity),
            error: None,
        }
    }

    pub fn failed(error: SchoolError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            entity: None,
            error: Some(error),
        }
    }

    /// Not an error, but not applied either; `entity` explains why.
    pub fn held(message: impl Into<String>, entity: T) -> Self {
        Self {
            success: false,
            message: message.into(),
            entity: Some(entity),
            error: None,
        }
    }

    /// The entity, or the typed error.
    ///
    /// An outcome built by hand with neither yields
    /// [`SchoolError::EmptyOutcome`] carrying its message.
    pub fn into_result(self) -> Result<T, SchoolError> {
        match (self.error, self.entity) {
            (Some(error), _) => Err(error),
            (None, Some(entity)) => Ok(entity),
            (None, None) => Err(SchoolError::EmptyOutcome(self.message)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            success: self.success,
            message: self.message,
            entity: self.entity.map(f),
            error: self.error,
        }
    }
}
