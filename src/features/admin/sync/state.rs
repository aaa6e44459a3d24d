use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::features::admin::dtos::{AdminStats, ReportFilters, SystemHealth};
use crate::features::reports::models::Report;
use crate::features::users::dtos::UserFilters;
use crate::features::users::models::UserProfile;

/// A row kept in a synchronized collection.
pub trait Entity: Clone {
    fn id(&self) -> Uuid;
    fn updated_at(&self) -> DateTime<Utc>;
}

impl Entity for Report {
    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for UserProfile {
    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Filters that can tell whether a pushed row belongs in the loaded list.
pub trait CollectionFilter<T> {
    fn admits(&self, item: &T) -> bool;
}

impl CollectionFilter<Report> for ReportFilters {
    fn admits(&self, item: &Report) -> bool {
        self.matches(item)
    }
}

impl CollectionFilter<UserProfile> for UserFilters {
    fn admits(&self, item: &UserProfile) -> bool {
        self.matches(item)
    }
}

/// One paginated, filtered list mirrored from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection<T, F> {
    pub items: Vec<T>,
    /// Matching rows in the store, not just on this page
    pub total: i64,
    pub loading: bool,
    pub error: Option<String>,
    pub filters: F,
    /// 1-based
    pub page: i64,
    pub limit: i64,
}

impl<T, F: Default> Collection<T, F> {
    pub fn new(limit: i64) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            loading: false,
            error: None,
            filters: F::default(),
            page: 1,
            limit,
        }
    }
}

impl<T: Entity, F: CollectionFilter<T>> Collection<T, F> {
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Replace the local copy unless it is newer. Rows not on the page are
    /// ignored. Returns whether anything changed.
    pub fn apply_update(&mut self, incoming: T) -> bool {
        let Some(index) = self.position(incoming.id()) else {
            tracing::trace!("Dropping update for {}: not in the loaded page", incoming.id());
            return false;
        };
        if incoming.updated_at() < self.items[index].updated_at() {
            tracing::trace!("Dropping stale update for {}", incoming.id());
            return false;
        }
        self.items[index] = incoming;
        true
    }

    /// Prepend a new row that matches the active filters and count it.
    pub fn apply_create(&mut self, incoming: T) -> bool {
        if !self.filters.admits(&incoming) {
            return false;
        }
        self.items.insert(0, incoming);
        self.total += 1;
        true
    }
}

/// A single fetched value with its own loading state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// Everything the admin console shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminState {
    pub reports: Collection<Report, ReportFilters>,
    pub users: Collection<UserProfile, UserFilters>,
    pub stats: Slot<AdminStats>,
    pub system_health: Slot<SystemHealth>,
    pub realtime_connected: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl AdminState {
    pub fn new(page_size: i64) -> Self {
        Self {
            reports: Collection::new(page_size),
            users: Collection::new(page_size),
            stats: Slot::default(),
            system_health: Slot::default(),
            realtime_connected: false,
            last_updated: None,
        }
    }
}
