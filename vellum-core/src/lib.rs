//! Vellum Core Library
//!
//! Persistence engine for versioned, culture-variant content including:
//! - Node tree with path/level integrity checks and repair
//! - Dual-version documents (draft + published) and single-version media
//!   and members
//! - Culture variation migration with edited-flag recomputation
//! - Batched property assembly across draft and published versions
//! - Deterministic paged queries with custom property ordering
//! - Automatic relations derived from property values
//! - Version history pruning and login sessions
//! - SQLite storage (rusqlite, WAL mode)

pub mod assembler;
pub mod chunk;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod naming;
pub mod notifications;
pub mod property_data;
pub mod query;
pub mod relations;
pub mod repositories;
pub mod tree;
pub mod variation;
pub mod versions;

pub use config::EngineConfig;
pub use database::{Database, Scope};
pub use error::{Result, StoreError};
pub use models::{
    ContentBase, ContentType, ContentVariation, Document, Media, Member, ObjectType, PropertyType, PublishedState,
    Value, ValueStorageType,
};
pub use notifications::{CacheInvalidator, CacheScope, EntityNotification, NotificationKind, NotificationPublisher};
pub use query::{ContentFilter, Ordering, Page};
pub use relations::{ReferenceExtractor, ReferenceExtractors, RelationSynchronizer};
pub use repositories::{
    ContentTypeRepository, DocumentRepository, Languages, MediaRepository, MemberRepository, RepositoryContext,
};
pub use tree::{check_integrity, IntegrityReport, IssueType};
pub use variation::{renormalize_edited, EditedScope, EditedSummary, MigrationReport};
