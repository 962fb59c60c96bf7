use tracing::{debug, warn};

use crate::db::{Database, SnapshotFeed, StoreResult};
use crate::error::{AuthError, TrackerError};
use crate::filter::{filter_applications, ApplicationFilters};
use crate::models::{
    ApplicationDraft, ApplicationPatch, ApplicationRecord, NoteDraft, NotePatch, UserIdentity,
};
use crate::sort::{sort_applications, SortDirection, SortField};
use crate::stats::{compute_stats, Stats};
use crate::validation::{validate_application, validate_interview_note};

/// View model over one user's applications.
///
/// Holds the latest snapshot plus the current filter and sort, and keeps
/// `filtered` in step by calling [`ApplicationCollection::recompute`] after
/// every input change. Writes go straight to the store; local state only
/// changes once the store confirms, by re-reading the snapshot.
pub struct ApplicationCollection {
    user_id: Option<String>,
    applications: Vec<ApplicationRecord>,
    filtered: Vec<ApplicationRecord>,
    filters: ApplicationFilters,
    sort_field: SortField,
    sort_direction: SortDirection,
    loading: bool,
    error: Option<String>,
}

impl ApplicationCollection {
    pub fn new(user: Option<&UserIdentity>) -> Self {
        let mut collection = Self {
            user_id: None,
            applications: Vec::new(),
            filtered: Vec::new(),
            filters: ApplicationFilters::default(),
            sort_field: SortField::CreatedAt,
            sort_direction: SortDirection::Desc,
            loading: true,
            error: None,
        };
        collection.set_user(user);
        collection
    }

    /// Switches owner. Without a user the collection is empty and idle.
    pub fn set_user(&mut self, user: Option<&UserIdentity>) {
        match user {
            Some(user) => {
                if self.user_id.as_deref() != Some(user.id.as_str()) {
                    self.user_id = Some(user.id.clone());
                    self.applications.clear();
                    self.filtered.clear();
                    self.loading = true;
                    self.error = None;
                }
            }
            None => self.clear_user(),
        }
    }

    pub fn clear_user(&mut self) {
        self.user_id = None;
        self.applications.clear();
        self.filtered.clear();
        self.loading = false;
        self.error = None;
    }

    pub fn applications(&self) -> &[ApplicationRecord] {
        &self.applications
    }

    pub fn filtered(&self) -> &[ApplicationRecord] {
        &self.filtered
    }

    pub fn filters(&self) -> &ApplicationFilters {
        &self.filters
    }

    pub fn sort(&self) -> (SortField, SortDirection) {
        (self.sort_field, self.sort_direction)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn stats(&self) -> Stats {
        compute_stats(&self.applications)
    }

    pub fn set_filters(&mut self, filters: ApplicationFilters) {
        self.filters = filters;
        self.recompute();
    }

    pub fn set_sort(&mut self, field: SortField, direction: SortDirection) {
        self.sort_field = field;
        self.sort_direction = direction;
        self.recompute();
    }

    /// Re-derives `filtered` from the snapshot, filter and sort.
    pub fn recompute(&mut self) {
        let matched = filter_applications(&self.applications, &self.filters);
        self.filtered = sort_applications(&matched, self.sort_field, self.sort_direction);
    }

    pub fn apply_snapshot(&mut self, records: Vec<ApplicationRecord>) {
        self.applications = records;
        self.loading = false;
        self.recompute();
    }

    /// Keeps whatever was loaded before; only the error and loading flag change.
    pub fn apply_subscription_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "subscription failed");
        self.error = Some(message);
        self.loading = false;
    }

    /// Pulls the next snapshot from `feed`, if any. Returns true when state changed.
    pub fn sync(&mut self, feed: &mut SnapshotFeed, db: &Database) -> bool {
        if self.user_id.as_deref() != Some(feed.user_id()) {
            return false;
        }
        match feed.poll(db) {
            Ok(Some(snapshot)) => {
                self.apply_snapshot(snapshot);
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.apply_subscription_error(e.to_string());
                true
            }
        }
    }

    // --- Mutations ---

    pub fn create(&mut self, db: &Database, draft: &ApplicationDraft) -> Result<String, TrackerError> {
        validate_application(draft)?;
        self.mutate(db, "create application", |db, user| db.create_application(user, draft))
    }

    pub fn update(&mut self, db: &Database, id: &str, patch: &ApplicationPatch) -> Result<(), TrackerError> {
        self.check_patch(db, id, patch)?;
        self.mutate(db, "update application", |db, user| db.update_application(user, id, patch))
    }

    pub fn remove(&mut self, db: &Database, id: &str) -> Result<(), TrackerError> {
        self.mutate(db, "delete application", |db, user| db.delete_application(user, id))
    }

    pub fn batch_update(
        &mut self,
        db: &Database,
        updates: &[(String, ApplicationPatch)],
    ) -> Result<(), TrackerError> {
        for (id, patch) in updates {
            self.check_patch(db, id, patch)?;
        }
        self.mutate(db, "update applications", |db, user| db.batch_update(user, updates))
    }

    pub fn batch_delete(&mut self, db: &Database, ids: &[String]) -> Result<(), TrackerError> {
        self.mutate(db, "delete applications", |db, user| db.batch_delete(user, ids))
    }

    pub fn add_note(&mut self, db: &Database, app_id: &str, note: &NoteDraft) -> Result<String, TrackerError> {
        validate_interview_note(note)?;
        self.mutate(db, "add interview note", |db, user| {
            db.add_interview_note(user, app_id, note)
        })
    }

    pub fn update_note(
        &mut self,
        db: &Database,
        app_id: &str,
        note_id: &str,
        patch: &NotePatch,
    ) -> Result<(), TrackerError> {
        self.check_note_patch(db, app_id, note_id, patch)?;
        self.mutate(db, "update interview note", |db, user| {
            db.update_interview_note(user, app_id, note_id, patch)
        })
    }

    pub fn delete_note(&mut self, db: &Database, app_id: &str, note_id: &str) -> Result<(), TrackerError> {
        self.mutate(db, "delete interview note", |db, user| {
            db.delete_interview_note(user, app_id, note_id)
        })
    }

    /// Manual reload of the whole snapshot.
    pub fn refresh(&mut self, db: &Database) -> Result<(), TrackerError> {
        let Some(user) = self.user_id.clone() else { return Ok(()) };
        self.loading = true;
        self.error = None;
        let result = db.list_applications(&user);
        self.loading = false;
        match result {
            Ok(snapshot) => {
                self.apply_snapshot(snapshot);
                Ok(())
            }
            Err(e) => {
                self.error = Some(format!("Failed to refresh applications: {}", e));
                Err(e.into())
            }
        }
    }

    /// Validates the record as it would look after `patch`. Missing records are
    /// left for the store to report.
    fn check_patch(&self, db: &Database, id: &str, patch: &ApplicationPatch) -> Result<(), TrackerError> {
        let Some(user) = self.user_id.as_deref() else { return Ok(()) };
        if let Some(mut record) = db.get_application(user, id)? {
            patch.apply_to(&mut record);
            validate_application(&ApplicationDraft::from(&record))?;
        }
        Ok(())
    }

    fn check_note_patch(
        &self,
        db: &Database,
        app_id: &str,
        note_id: &str,
        patch: &NotePatch,
    ) -> Result<(), TrackerError> {
        let Some(user) = self.user_id.as_deref() else { return Ok(()) };
        let Some(record) = db.get_application(user, app_id)? else { return Ok(()) };
        if let Some(note) = record.interview_notes.iter().find(|n| n.id == note_id) {
            let mut edited = note.clone();
            patch.apply_to(&mut edited);
            validate_interview_note(&NoteDraft::from(&edited))?;
        }
        Ok(())
    }

    fn mutate<T>(
        &mut self,
        db: &Database,
        action: &str,
        op: impl FnOnce(&Database, &str) -> StoreResult<T>,
    ) -> Result<T, TrackerError> {
        let user = self.user_id.clone().ok_or(AuthError::NotSignedIn)?;
        self.error = None;
        match op(db, &user) {
            Ok(value) => {
                debug!(action, "store confirmed write");
                match db.list_applications(&user) {
                    Ok(snapshot) => self.apply_snapshot(snapshot),
                    Err(e) => self.apply_subscription_error(e.to_string()),
                }
                Ok(value)
            }
            Err(e) => {
                self.error = Some(format!("Failed to {}: {}", action, e));
                Err(e.into())
            }
        }
    }
}
