//! Consistency checking, integrity verification and garbage collection for the docroots of a
//! cluster.
//!
//! For every docroot, each replica is checked on its own (dangling references, the stored
//! aggregate index, optionally content hashes, unreferenced files) and then compared with the
//! last healthy replica before it (or the first replica, while none was healthy). [`Fsck::run`] returns an [`FsckReport`]; the run failed when
//! [`FsckReport::is_ok`] is false.

pub mod aggregate;
mod error;
mod fsck;
pub mod gc;
mod problem;
pub mod reconcile;
mod report;
pub mod validate;
pub mod verify;

pub use error::{FsckError, Result};
pub use fsck::Fsck;
pub use gc::GcReport;
pub use problem::Problem;
pub use report::{DocrootReport, FsckReport, ReplicaReport};
pub use validate::AllIndexCheck;
pub use verify::HashMismatch;
