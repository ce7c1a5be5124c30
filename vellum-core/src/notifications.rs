//! Notification and cache-invalidation sinks
//!
//! Repositories publish one notification per persisted entity, after the
//! database writes and before the entity's in-memory publish state is
//! resolved, so subscribers observe `Publishing`/`Unpublishing`.
//! Structural changes (content type saves and deletes) additionally invoke
//! the cache invalidator.

use crate::models::content::PublishedState;
use crate::models::object_type::ObjectType;
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    Saved,
    Published,
    Unpublished,
    Moved,
    Deleted,
}

/// One persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityNotification {
    pub kind: NotificationKind,
    pub object_type: ObjectType,
    pub id: i32,
    pub key: Uuid,
    /// Documents only: publish state at the time of the notification.
    pub published_state: Option<PublishedState>,
}

/// Receives entity notifications. Called inside the write scope.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: &EntityNotification);
}

/// Cache region a structural change invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheScope {
    ContentTypes,
    Content,
}

/// Downstream caches to clear after structural changes.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, scope: CacheScope, ids: &[i32]);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifications;

impl NotificationPublisher for NullNotifications {
    fn publish(&self, notification: &EntityNotification) {
        tracing::trace!("Notification {:?} for {}", notification.kind, notification.id);
    }
}

impl CacheInvalidator for NullNotifications {
    fn invalidate(&self, scope: CacheScope, ids: &[i32]) {
        tracing::trace!("Cache invalidation {:?} for {} id(s)", scope, ids.len());
    }
}

/// Keeps what it receives, for inspection.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    notifications: Mutex<Vec<EntityNotification>>,
    invalidations: Mutex<Vec<(CacheScope, Vec<i32>)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<EntityNotification> {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn invalidations(&self) -> Vec<(CacheScope, Vec<i32>)> {
        self.invalidations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.notifications.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.invalidations.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl NotificationPublisher for RecordingPublisher {
    fn publish(&self, notification: &EntityNotification) {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
    }
}

impl CacheInvalidator for RecordingPublisher {
    fn invalidate(&self, scope: CacheScope, ids: &[i32]) {
        self.invalidations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((scope, ids.to_vec()));
    }
}
