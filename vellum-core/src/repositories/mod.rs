//! Repositories
//!
//! Every operation takes the caller's `&Connection` (usually a
//! [`Scope`](crate::database::Scope)); repositories hold configuration,
//! caches and collaborators but never a connection.
//!
//! - [`content_type`]: content types with the schema cache
//! - [`document`], [`media`], [`member`]: content entities
//! - [`language`], [`relation`], [`tag`]: directories consumed by the above
//! - [`session`]: login sessions

pub(crate) mod content_base;
pub mod content_type;
pub mod document;
pub mod language;
pub mod media;
pub mod member;
pub mod relation;
pub mod session;
pub mod tag;

pub use content_type::ContentTypeRepository;
pub use document::DocumentRepository;
pub use language::Languages;
pub use media::MediaRepository;
pub use member::MemberRepository;

use crate::config::EngineConfig;
use crate::models::content::{ContentBase, PublishedState};
use crate::models::object_type::ObjectType;
use crate::notifications::{
    CacheInvalidator, EntityNotification, NotificationKind, NotificationPublisher, NullNotifications,
};
use crate::relations::{ReferenceExtractors, RelationSynchronizer};
use std::sync::Arc;

/// Configuration and collaborators shared by the content repositories.
pub struct RepositoryContext {
    pub config: EngineConfig,
    pub content_types: ContentTypeRepository,
    pub relations: RelationSynchronizer,
    notifications: Arc<dyn NotificationPublisher>,
}

impl RepositoryContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            content_types: ContentTypeRepository::new(config.clone()),
            relations: RelationSynchronizer::default(),
            notifications: Arc::new(NullNotifications),
            config,
        }
    }

    pub fn with_notifications(mut self, publisher: Arc<dyn NotificationPublisher>) -> Self {
        self.notifications = publisher;
        self
    }

    pub fn with_cache_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.content_types = ContentTypeRepository::new(self.config.clone()).with_invalidator(invalidator);
        self
    }

    pub fn with_reference_extractors(mut self, extractors: ReferenceExtractors) -> Self {
        self.relations = RelationSynchronizer::new(extractors);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn notify(
        &self,
        kind: NotificationKind,
        object_type: ObjectType,
        base: &ContentBase,
        published_state: Option<PublishedState>,
    ) {
        self.notifications.publish(&EntityNotification {
            kind,
            object_type,
            id: base.id,
            key: base.key,
            published_state,
        });
    }

    pub(crate) fn notify_deleted(&self, object_type: ObjectType, nodes: &[crate::models::NodeRecord]) {
        for node in nodes {
            self.notifications.publish(&EntityNotification {
                kind: NotificationKind::Deleted,
                object_type,
                id: node.id,
                key: node.key,
                published_state: None,
            });
        }
    }
}

/// Page size to use when a caller passes zero.
pub(crate) fn effective_page_size(config: &EngineConfig, page_size: u64) -> u64 {
    if page_size == 0 {
        config.default_page_size
    } else {
        page_size
    }
}
