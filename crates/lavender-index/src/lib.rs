//! Content-addressed index metadata for published resources.
//!
//! A [`Label`] records one published resource: its original path, the lavendelized path it is
//! served under, and the MD5 of its bytes. An [`Index`] is the ordered set of labels stored in one
//! index file (one per module), or the in-memory aggregate of all module indexes of a docroot.

mod error;
mod format;
mod hash;
mod index;
mod label;

pub use error::{IndexError, Result};
pub use hash::{ContentHash, CONTENT_HASH_LEN};
pub use index::{Index, ALL_IDX, IDX_EXTENSION};
pub use label::Label;
