//! Object identity for the grit object store.
//!
//! Provides [`ObjectId`], the content hash naming every stored object, the
//! [`HashKind`] algorithm selector, streaming hashing, a hex codec, and the
//! fan-out table shared by pack indexes.

mod error;
pub mod fanout;
pub mod hasher;
pub mod hex;
mod kind;
mod oid;

pub use error::HashError;
pub use fanout::{Fanout, FANOUT_BYTES};
pub use hasher::Hasher;
pub use kind::HashKind;
pub use oid::ObjectId;
