//! # earmark review runtime
//!
//! Everything around the table engine that touches the outside world:
//! background imports, the tag side-store, audio decoding and spectrograms,
//! all reporting back to a single [`Session`] that owns the table.

pub mod decode;
pub mod error;
pub mod import;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod spectrogram;
pub mod tag_store;
pub mod tag_writer;

pub use error::{Error, Result};
pub use import::{ImportContext, ImportOutcome, ImportPayload, ImportSource};
pub use resolver::{Mount, MountTable};
pub use session::{Session, SessionMessage};
pub use tag_writer::{TagOutcome, TagWriter};
