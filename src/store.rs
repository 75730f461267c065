use crate::error::TrackerError;
use crate::models::{Application, ApplicationDraft};
use crate::query::{Direction, SortKey};

/// Durable home of application records. The store assigns `id`,
/// `created_at` and `updated_at`; callers always send every other field.
pub trait ApplicationStore {
    fn list(&self, order_by: SortKey, direction: Direction) -> Result<Vec<Application>, TrackerError>;
    fn get(&self, id: i64) -> Result<Application, TrackerError>;
    fn create(&self, draft: &ApplicationDraft) -> Result<Application, TrackerError>;
    /// Replaces the user-editable fields and returns the stored record.
    fn update(&self, id: i64, draft: &ApplicationDraft) -> Result<Application, TrackerError>;
    fn delete(&self, id: i64) -> Result<(), TrackerError>;
}
