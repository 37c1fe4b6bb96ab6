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

use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use driving_school_core::{
    Engine, NewPayment, NewStudent, PaymentAmendment, PaymentId, PaymentMethod, SchoolConfig,
    SchoolError, Student, StudentId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Driving school journal replay
///
/// Applies a CSV journal of enrollments, charges and payments and writes
/// each student's totals to stdout. Diagnostics go to stderr (`RUST_LOG`).
#[derive(Parser, Debug)]
#[command(name = "driving-school-core")]
#[command(about = "Replays a ledger journal and prints student balances", long_about = None)]
struct Args {
    /// Path to the journal CSV
    ///
    /// Expected format: op,cin,ref,amount,method,date,detail
    /// Example: cargo run -- journal.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Largest accepted payment or charge
    #[arg(long, env = "SCHOOL_MAX_AMOUNT", default_value = "1000000.00")]
    max_amount: Decimal,

    /// Leading segment of generated receipt numbers
    #[arg(long, env = "SCHOOL_RECEIPT_PREFIX", default_value = "RCP")]
    receipt_prefix: String,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let config = SchoolConfig::new(args.max_amount, args.receipt_prefix);
    let engine = match replay(BufReader::new(file), config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error replaying journal: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_students(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw journal row.
///
/// Fields: `op, cin, ref, amount, method, date, detail`. `ref` is a label
/// local to the journal that later rows use to point at a payment.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    cin: Option<String>,
    #[serde(rename = "ref")]
    reference: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    method: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    date: Option<NaiveDate>,
    detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum JournalOp {
    Enroll {
        cin: String,
        full_name: String,
        total_due: Decimal,
    },
    Charge {
        cin: String,
        amount: Decimal,
    },
    Pay {
        cin: String,
        reference: String,
        amount: Decimal,
        method: PaymentMethod,
        date: Option<NaiveDate>,
        description: String,
    },
    Amend {
        reference: String,
        amount: Decimal,
    },
    Validate {
        reference: String,
        validated_by: String,
    },
    Cancel {
        reference: String,
        reason: String,
    },
}

impl CsvRecord {
    /// Returns `None` for unknown ops or missing required fields.
    fn into_op(self) -> Option<JournalOp> {
        let detail = self.detail.unwrap_or_default();
        match self.op.to_lowercase().as_str() {
            "enroll" => Some(JournalOp::Enroll {
                cin: self.cin?,
                full_name: detail,
                total_due: self.amount.unwrap_or(Decimal::ZERO),
            }),
            "charge" => Some(JournalOp::Charge {
                cin: self.cin?,
                amount: self.amount?,
            }),
            "pay" => Some(JournalOp::Pay {
                cin: self.cin?,
                reference: self.reference?,
                amount: self.amount?,
                method: match self.method {
                    Some(method) => method.parse().ok()?,
                    None => PaymentMethod::Cash,
                },
                date: self.date,
                description: detail,
            }),
            "amend" => Some(JournalOp::Amend {
                reference: self.reference?,
                amount: self.amount?,
            }),
            "validate" => Some(JournalOp::Validate {
                reference: self.reference?,
                validated_by: detail,
            }),
            "cancel" => Some(JournalOp::Cancel {
                reference: self.reference?,
                reason: detail,
            }),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
enum ReplayError {
    #[error("no student with CIN '{0}'")]
    UnknownCin(String),
    #[error("no payment labelled '{0}'")]
    UnknownRef(String),
    #[error("payment label '{0}' is already used")]
    DuplicateRef(String),
    #[error(transparent)]
    School(#[from] SchoolError),
}

struct Journal {
    engine: Engine,
    payments: HashMap<String, PaymentId>,
}

impl Journal {
    fn new(config: SchoolConfig) -> Self {
        Self {
            engine: Engine::with_config(config),
            payments: HashMap::new(),
        }
    }

    fn student_id(&self, cin: &str) -> Result<StudentId, ReplayError> {
        self.engine
            .student_by_cin(cin)
            .map(|s| s.id())
            .ok_or_else(|| ReplayError::UnknownCin(cin.to_string()))
    }

    fn payment_id(&self, reference: &str) -> Result<PaymentId, ReplayError> {
        self.payments
            .get(reference)
            .copied()
            .ok_or_else(|| ReplayError::UnknownRef(reference.to_string()))
    }

    fn apply(&mut self, op: JournalOp) -> Result<(), ReplayError> {
        match op {
            JournalOp::Enroll {
                cin,
                full_name,
                total_due,
            } => {
                self.engine
                    .enroll_student(NewStudent::new(cin, full_name, total_due))
                    .into_result()?;
            }
            JournalOp::Charge { cin, amount } => {
                let id = self.student_id(&cin)?;
                self.engine.add_charge(id, amount).into_result()?;
            }
            JournalOp::Pay {
                cin,
                reference,
                amount,
                method,
                date,
                description,
            } => {
                if self.payments.contains_key(&reference) {
                    return Err(ReplayError::DuplicateRef(reference));
                }
                let student_id = self.student_id(&cin)?;
                let new = NewPayment {
                    payment_date: date,
                    description,
                    ..NewPayment::new(student_id, amount, method)
                };
                let payment = self.engine.create_payment(new).into_result()?;
                self.payments.insert(reference, payment.id);
            }
            JournalOp::Amend { reference, amount } => {
                let id = self.payment_id(&reference)?;
                self.engine
                    .amend_payment(id, PaymentAmendment::amount(amount))
                    .into_result()?;
            }
            JournalOp::Validate {
                reference,
                validated_by,
            } => {
                let id = self.payment_id(&reference)?;
                self.engine
                    .validate_payment(id, &validated_by)
                    .into_result()?;
            }
            JournalOp::Cancel { reference, reason } => {
                let id = self.payment_id(&reference)?;
                self.engine.cancel_payment(id, &reason).into_result()?;
            }
        }
        Ok(())
    }
}

/// Replays a journal from a CSV reader.
///
/// Rows are streamed. Malformed rows and rows the engine rejects are logged
/// and skipped; every accepted row is committed on its own.
///
/// # CSV Format
///
/// Expected columns: `op, cin, ref, amount, method, date, detail`
/// - `enroll`: `cin`, `amount` (initial due), `detail` (full name)
/// - `charge`: `cin`, `amount`
/// - `pay`: `cin`, `ref`, `amount`, optional `method` (default cash), `date`, `detail`
/// - `amend`: `ref`, `amount`
/// - `validate`: `ref`, `detail` (operator)
/// - `cancel`: `ref`, `detail` (reason)
///
/// # Example
///
/// ```csv
/// op,cin,ref,amount,method,date,detail
/// enroll,AB1,,5000,,,Amina Berrada
/// pay,AB1,p1,2000,cash,2025-03-10,first instalment
/// cancel,,p1,,,,duplicate
/// ```
///
/// # Errors
///
/// Returns a CSV error only if the reader itself fails.
pub fn replay<R: Read>(reader: R, config: SchoolConfig) -> Result<Engine, csv::Error> {
    let mut journal = Journal::new(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let row = line + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                tracing::warn!(row, error = %e, "skipping malformed row");
                continue;
            }
        };
        let Some(op) = record.into_op() else {
            tracing::warn!(row, "skipping incomplete or unknown operation");
            continue;
        };
        if let Err(e) = journal.apply(op) {
            tracing::warn!(row, error = %e, "skipping rejected row");
        }
    }

    Ok(journal.engine)
}

/// Output row: one per student.
#[derive(Debug, Serialize)]
struct StudentRow<'a> {
    cin: &'a str,
    full_name: &'a str,
    total_due: Decimal,
    total_paid: Decimal,
    balance: Decimal,
}

impl<'a> From<&'a Student> for StudentRow<'a> {
    fn from(student: &'a Student) -> Self {
        Self {
            cin: student.cin(),
            full_name: student.full_name(),
            total_due: cents(student.total_due()),
            total_paid: cents(student.total_paid()),
            balance: cents(student.balance()),
        }
    }
}

fn cents(mut amount: Decimal) -> Decimal {
    amount.rescale(2);
    amount
}

/// Writes student totals with two decimals, in enrollment order.
///
/// # CSV Format
///
/// Columns: `cin, full_name, total_due, total_paid, balance`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_students<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for student in engine.students() {
        wtr.serialize(StudentRow::from(&student))?;
    }
    wtr.flush()?;
    Ok(())
}
