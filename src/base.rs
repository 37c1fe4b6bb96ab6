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

//! Core identifier types for students, staff, vehicles, payments and sessions.
//!
//! Identifiers are allocated by the [`Store`](crate::Store) and are never
//! reused, even after the row they named has been deleted.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Unique identifier for an enrolled student.
    StudentId
);

row_id!(
    /// Unique identifier for an instructor (moniteur).
    InstructorId
);

row_id!(
    /// Unique identifier for a training vehicle.
    VehicleId
);

row_id!(
    /// Unique identifier for a payment.
    ///
    /// Distinct from the human-facing receipt number printed for the student.
    PaymentId
);

row_id!(
    /// Unique identifier for a training session.
    SessionId
);
