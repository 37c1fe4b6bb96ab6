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

//! Schedulable resources.
//!
//! Instructors, vehicles and students are the three dimensions a session can
//! be double-booked on. [`ResourceRef`] pairs the kind with a typed id so an
//! unknown kind cannot be expressed.

use crate::base::{InstructorId, StudentId, VehicleId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Instructor,
    Vehicle,
    Student,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Instructor => "instructor",
            Self::Vehicle => "vehicle",
            Self::Student => "student",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceRef {
    Instructor(InstructorId),
    Vehicle(VehicleId),
    Student(StudentId),
}

impl ResourceRef {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Instructor(_) => ResourceKind::Instructor,
            Self::Vehicle(_) => ResourceKind::Vehicle,
            Self::Student(_) => ResourceKind::Student,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instructor(id) => write!(f, "instructor {id}"),
            Self::Vehicle(id) => write!(f, "vehicle {id}"),
            Self::Student(id) => write!(f, "student {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    /// Registration plate, unique across vehicles.
    pub plate_number: String,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_reports_its_kind() {
        assert_eq!(
            ResourceRef::Instructor(InstructorId(1)).kind(),
            ResourceKind::Instructor
        );
        assert_eq!(ResourceRef::Vehicle(VehicleId(1)).kind(), ResourceKind::Vehicle);
        assert_eq!(ResourceRef::Student(StudentId(1)).kind(), ResourceKind::Student);
    }

    #[test]
    fn reference_display() {
        assert_eq!(ResourceRef::Vehicle(VehicleId(3)).to_string(), "vehicle 3");
    }
}
