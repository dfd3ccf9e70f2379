//! Server error codes the driver does not name.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

/// A write violated a unique index.
const DUPLICATE_KEY: i32 = 11000;

/// Did this write fail because it violated a unique index?
///
/// Inside a transaction the violation surfaces as a command error rather than
/// a write error, so both shapes are checked.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}
