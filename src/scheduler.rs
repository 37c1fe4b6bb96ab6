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

//! Session create, update and delete.
//!
//! Conflicts are advisory. The scheduler checks every resource a session
//! occupies (instructor and vehicle when set, the student always) and hands
//! the findings back. With [`OnConflict::Abort`] nothing is written when
//! conflicts exist; with [`OnConflict::Proceed`] the session is saved anyway
//! and carries a [`ConflictOverride`] naming who acknowledged it.
//!
//! | Operation | Interval check | Conflict check |
//! |-----------|----------------|----------------|
//! | create | always | unless created cancelled |
//! | update | always | unless the result is cancelled; only blocks when times, resources or cancellation change |
//! | delete | - | - |

use crate::base::SessionId;
use crate::conflict::{Conflict, ConflictDetector, conflicting_ids};
use crate::interval::TimeInterval;
use crate::session::{ConflictOverride, Session, SessionDraft, SessionPatch, SessionStatus};
use crate::store::{Tables, Transaction};
use crate::SchoolError;
use serde::{Deserialize, Serialize};

/// What to do when a schedule change collides with existing sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnConflict {
    /// Write nothing and report the conflicts.
    Abort,
    /// Save despite conflicts; the acknowledgement is recorded on the session.
    Proceed { acknowledged_by: String },
}

impl OnConflict {
    pub fn proceed(acknowledged_by: impl Into<String>) -> Self {
        Self::Proceed {
            acknowledged_by: acknowledged_by.into(),
        }
    }

    /// Trimmed operator name for `Proceed`, `None` for `Abort`.
    fn acknowledger(&self) -> Result<Option<String>, SchoolError> {
        match self {
            Self::Abort => Ok(None),
            Self::Proceed { acknowledged_by } => {
                let name = acknowledged_by.trim();
                if name.is_empty() {
                    return Err(SchoolError::AcknowledgementRequired);
                }
                Ok(Some(name.to_string()))
            }
        }
    }
}

/// Result of a create or update.
///
/// `session` is `None` when the change was held back because of conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheduled {
    pub session: Option<Session>,
    pub conflicts: Vec<Conflict>,
}

impl Scheduled {
    pub fn is_saved(&self) -> bool {
        self.session.is_some()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

pub struct SessionScheduler;

impl SessionScheduler {
    /// Conflicts `draft` would have, without writing anything.
    ///
    /// # Errors
    ///
    /// [`SchoolError::InvalidInterval`] when the draft ends before it starts.
    pub fn preview(
        tables: &Tables,
        draft: &SessionDraft,
        exclude: Option<SessionId>,
    ) -> Result<Vec<Conflict>, SchoolError> {
        let interval = TimeInterval::new(draft.start_datetime, draft.end_datetime)?;
        Ok(ConflictDetector::find_all(
            tables,
            &draft.resources(),
            &interval,
            exclude,
        ))
    }

    /// # Errors
    ///
    /// - [`SchoolError::InvalidInterval`] - checked before any query runs.
    /// - [`SchoolError::AcknowledgementRequired`] - `Proceed` with a blank name.
    /// - [`SchoolError::Store`] - a referenced student, instructor or vehicle
    ///   does not exist.
    pub fn create(
        tx: &mut Transaction<'_>,
        draft: SessionDraft,
        on_conflict: &OnConflict,
    ) -> Result<Scheduled, SchoolError> {
        let interval = TimeInterval::new(draft.start_datetime, draft.end_datetime)?;
        let acknowledged_by = on_conflict.acknowledger()?;

        let conflicts = if draft.status == SessionStatus::Cancelled {
            Vec::new()
        } else {
            ConflictDetector::find_all(tx, &draft.resources(), &interval, None)
        };

        let conflict_override = match (conflicts.is_empty(), acknowledged_by) {
            (true, _) => None,
            (false, None) => {
                return Ok(Scheduled {
                    session: None,
                    conflicts,
                });
            }
            (false, Some(name)) => Some(acknowledge(&conflicts, name)),
        };

        let session = tx.insert_session(|id| Session {
            id,
            student_id: draft.student_id,
            instructor_id: draft.instructor_id,
            vehicle_id: draft.vehicle_id,
            interval,
            status: draft.status,
            session_type: draft.session_type,
            conflict_override,
        })?;

        if let Some(ack) = &session.conflict_override {
            tracing::warn!(
                session_id = %session.id,
                acknowledged_by = %ack.acknowledged_by,
                conflicting = ?ack.conflicting,
                "session double-booked by operator override"
            );
        }
        tracing::debug!(session_id = %session.id, student_id = %session.student_id, "session created");

        Ok(Scheduled {
            session: Some(session),
            conflicts,
        })
    }

    /// Applies `patch` to session `id`.
    ///
    /// The edited session is excluded from its own conflict check, so
    /// re-saving unchanged times reports nothing against itself.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::UnknownSession`] - no session with that id.
    /// - [`SchoolError::InvalidInterval`] - the patched bounds are inverted.
    /// - [`SchoolError::AcknowledgementRequired`] - `Proceed` with a blank name.
    /// - [`SchoolError::Store`] - a newly referenced resource does not exist.
    pub fn update(
        tx: &mut Transaction<'_>,
        id: SessionId,
        patch: SessionPatch,
        on_conflict: &OnConflict,
    ) -> Result<Scheduled, SchoolError> {
        let acknowledged_by = on_conflict.acknowledger()?;
        let current = tx
            .session(id)
            .cloned()
            .ok_or(SchoolError::UnknownSession(id))?;
        let reschedules = patch.changes_schedule_of(&current);

        let interval = TimeInterval::new(
            patch.start_datetime.unwrap_or(current.start_datetime()),
            patch.end_datetime.unwrap_or(current.end_datetime()),
        )?;

        let mut updated = Session {
            id,
            student_id: patch.student_id.unwrap_or(current.student_id),
            instructor_id: patch.instructor_id.unwrap_or(current.instructor_id),
            vehicle_id: patch.vehicle_id.unwrap_or(current.vehicle_id),
            interval,
            status: patch.status.unwrap_or(current.status),
            session_type: patch.session_type.unwrap_or(current.session_type),
            conflict_override: current.conflict_override.clone(),
        };

        let conflicts = if updated.is_cancelled() {
            Vec::new()
        } else {
            ConflictDetector::find_all(tx, &updated.resources(), &interval, Some(id))
        };

        if reschedules {
            updated.conflict_override = match (conflicts.is_empty(), acknowledged_by) {
                (true, _) => None,
                (false, None) => {
                    return Ok(Scheduled {
                        session: None,
                        conflicts,
                    });
                }
                (false, Some(name)) => {
                    let ack = acknowledge(&conflicts, name);
                    tracing::warn!(
                        session_id = %id,
                        acknowledged_by = %ack.acknowledged_by,
                        conflicting = ?ack.conflicting,
                        "session double-booked by operator override"
                    );
                    Some(ack)
                }
            };
        }

        tx.update_session(updated.clone())?;
        tracing::debug!(session_id = %id, status = ?updated.status, "session updated");

        Ok(Scheduled {
            session: Some(updated),
            conflicts,
        })
    }

    /// # Errors
    ///
    /// [`SchoolError::UnknownSession`] when no session has that id.
    pub fn delete(tx: &mut Transaction<'_>, id: SessionId) -> Result<Session, SchoolError> {
        if tx.session(id).is_none() {
            return Err(SchoolError::UnknownSession(id));
        }
        let session = tx.delete_session(id)?;
        tracing::debug!(session_id = %id, "session deleted");
        Ok(session)
    }
}

fn acknowledge(conflicts: &[Conflict], acknowledged_by: String) -> ConflictOverride {
    ConflictOverride {
        acknowledged_by,
        conflicting: conflicting_ids(conflicts),
    }
}
