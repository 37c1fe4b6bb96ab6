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

//! # Driving School Core
//!
//! Scheduling and ledger core for a driving school: books lessons against
//! instructors, vehicles and students without double-booking them, and keeps
//! every student's `total_paid`, `total_due` and `balance` consistent with
//! the payments recorded against them.
//!
//! ## Core Components
//!
//! - [`Engine`]: One transaction per operation, events after commit
//! - [`ConflictDetector`]: Overlap queries per resource
//! - [`SessionScheduler`]: Session create/update/delete with advisory conflicts
//! - [`LedgerEngine`]: The only writer of student totals
//! - [`PaymentLifecycle`]: Pending, validated and cancelled payment states
//! - [`Store`]: In-process transactional tables
//!
//! ## Example
//!
//! ```
//! use driving_school_core::{Engine, NewPayment, NewStudent, PaymentMethod};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let student = engine
//!     .enroll_student(NewStudent::new("AB123456", "Amina Berrada", dec!(5000)))
//!     .into_result()
//!     .unwrap();
//!
//! let payment = engine
//!     .create_payment(NewPayment::new(student.id(), dec!(2000), PaymentMethod::Cash))
//!     .into_result()
//!     .unwrap();
//! assert_eq!(engine.student(student.id()).unwrap().balance(), dec!(-3000));
//!
//! engine.cancel_payment(payment.id, "duplicate").into_result().unwrap();
//! assert_eq!(engine.student(student.id()).unwrap().balance(), dec!(-5000));
//! ```
//!
//! ## Thread Safety
//!
//! The store admits one transaction at a time. Event subscribers receive on
//! crossbeam channels and may live on any thread.

mod base;
pub mod config;
mod conflict;
mod engine;
pub mod error;
pub mod events;
mod interval;
mod ledger;
mod lifecycle;
pub mod money;
mod outcome;
mod payment;
mod resource;
mod scheduler;
mod session;
pub mod stats;
mod store;
mod student;

pub use base::{InstructorId, PaymentId, SessionId, StudentId, VehicleId};
pub use config::SchoolConfig;
pub use conflict::{Conflict, ConflictDetector};
pub use engine::Engine;
pub use error::{ErrorCategory, SchoolError, StoreError};
pub use events::{SchoolEvent, Topic};
pub use interval::TimeInterval;
pub use ledger::{LedgerEngine, Reconciliation};
pub use lifecycle::{PaymentLifecycle, receipt_number};
pub use outcome::Outcome;
pub use payment::{
    NewPayment, Payment, PaymentAmendment, PaymentMethod, PaymentStatus, UnknownPaymentMethod,
};
pub use resource::{Instructor, ResourceKind, ResourceRef, Vehicle};
pub use scheduler::{OnConflict, Scheduled, SessionScheduler};
pub use session::{
    ConflictOverride, Session, SessionDraft, SessionPatch, SessionStatus, SessionType,
};
pub use store::{Store, Tables, Transaction};
pub use student::{NewStudent, Student};
