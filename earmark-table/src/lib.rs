//! # earmark table engine
//!
//! In-memory tabular model for reviewing large collections of audio
//! recordings and their per-file metadata.
//!
//! - [`parsers`]: legacy flat-file database and phraselist readers
//! - [`normalizer`]: heterogeneous raw records to the canonical [`Row`] schema
//! - [`model`]: backing table, filter matrix ownership, incremental materialization
//! - [`query`]: sort/filter/regex layer over the backing table
//! - [`line_query`]: compact `key:value` query grammar
//! - [`tags`]: skip/flag annotations joined onto rows by `original` path
//!
//! Nothing in this crate spawns threads or touches a database; the review
//! runtime owns scheduling and persistence.

pub mod alignment;
pub mod column;
pub mod error;
pub mod filter;
pub mod line_query;
pub mod model;
pub mod normalizer;
pub mod parsers;
pub mod paths;
pub mod query;
pub mod row;
pub mod tags;

pub use column::{Column, ColumnKind};
pub use error::{Result, TableError};
pub use filter::{CompareOp, Criterion, FilterMatrix};
pub use line_query::LineQuery;
pub use model::{PhraselistMerge, RowRef, TableId, TableModel, DEFAULT_PAGE_SIZE};
pub use normalizer::Normalizer;
pub use parsers::{Phraselist, RawRecord, RecordSet};
pub use paths::{IdentityResolver, PathNormalizer, PathResolver};
pub use query::{QueryEngine, SortKey};
pub use row::{CellValue, Row};
pub use tags::{TagEntry, TagFields, TagStore, TagType};
