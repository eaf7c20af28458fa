//! # doclens - query filters and document metadata for Hangul/Latin search
//!
//! doclens is the query-understanding and metadata-indexing layer of a
//! document retrieval tool. It reads a free-text query and pulls out the
//! structured filters a search backend needs, then answers those filters
//! (and any other field predicates) from an indexed metadata store.
//!
//! ## Core Concepts
//!
//! - **QueryParser**: extracts a year or year range and a drafter identity
//!   from a query, via explicit directives (`year:24 drafter:최새름`), year
//!   notation parsing, and closed-world name resolution
//! - **FilterResult**: the extracted `{year, identity, provenance}`
//! - **MetadataStore**: per-document typed fields with inverted indexes, a
//!   TTL result cache and crash-safe snapshot files
//!
//! ## Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use doclens::{MatchMode, MetadataStore, ParserConfig, QueryParser, StoreConfig};
//!
//! let parser = QueryParser::new(["최새름", "김민수"], ParserConfig::default())?
//!     .with_reference_date(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
//! let store = MetadataStore::new(StoreConfig::in_memory())?;
//!
//! store.add_document("2024_예산안.hwp", [("drafter", "최새름"), ("date", "2024-03-05")])?;
//! store.add_document("2023_회의록.hwp", [("drafter", "최새름"), ("date", "2023-09-12")])?;
//!
//! let filter = parser.parse_filters("작년 최새름 기안 문서");
//! let none: [(&str, &str); 0] = [];
//! let hits = store.search_filtered(&filter, none, MatchMode::All)?;
//! assert_eq!(hits, vec!["2024_예산안.hwp"]);
//! # Ok::<(), doclens::LensError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod directive;
pub mod error;
pub mod filter;
pub mod identity;
pub mod normalize;
pub mod phonetic;
pub mod similarity;
pub mod store;
pub mod year;

pub use config::{ParserConfig, Settings, StoreConfig, TokenPatterns};
pub use directive::{DirectiveMatch, DirectiveScanner};
pub use error::{LensError, LensResult, StorageError, ValidationError};
pub use filter::{FilterResult, Provenance, QueryParser};
pub use identity::{IdentityMatch, IdentityResolver};
pub use store::{
    AutoSaver, BulkReport, Field, FieldValue, LoadSource, MatchMode, MetadataRecord,
    MetadataStore, StoreStats, WriteReport,
};
pub use year::{YearResolver, YearSpec, MAX_YEAR, MIN_YEAR};
