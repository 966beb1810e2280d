//! Structural diff and patch engine for ledger payloads.
//!
//! - [`diff`] walks two states and returns a forward patch together with an
//!   inverse patch that carries every removed or replaced value, so rollback
//!   never needs outside context.
//! - [`apply`] executes an ordered list of `add`/`remove`/`replace`/`move`/
//!   `copy`/`test` operations addressed by JSON Pointer. Application works on
//!   a private copy and only returns it when every operation succeeded.

#![deny(unsafe_code)]

pub mod apply;
pub mod diff;
pub mod error;
pub mod op;
pub mod pointer;

pub use apply::apply;
pub use diff::{diff, DiffPair};
pub use error::{PatchApplicationError, PatchErrorKind};
pub use op::{Patch, PatchOp};
pub use pointer::{Pointer, PointerError};
