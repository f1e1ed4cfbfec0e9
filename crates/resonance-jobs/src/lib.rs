//! Background jobs for the Resonance studio service.
//!
//! Jobs consume the trait seams only — any store, any blob backend, any
//! provider client — and are dispatched out-of-band (work queue, timer,
//! admin trigger) so a slow archive build never blocks booking traffic.

pub mod archive;
pub mod audit;
pub mod error;
pub mod reconcile;

pub use archive::{ARCHIVE_JOB, ArchiveOutcome, ArchiveParams, create_archive};
pub use audit::audit_archives;
pub use error::{Error, Result};
pub use reconcile::{MissingBooking, check_missing_bookings};

#[cfg(test)]
mod testutil;
