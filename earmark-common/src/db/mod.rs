//! Tag side-store database access

pub mod init;

pub use init::{create_tag_table, open_tag_store, StoreMode, TAG_TABLE};
