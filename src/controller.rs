//! Lifecycle controller: owns one snapshot of the record collection and runs
//! every create/read/update/delete against the store.
//!
//! Each request takes a [`Ticket`]. Starting a new request supersedes every
//! older ticket, so a response that settles late is dropped instead of being
//! written over newer state.

use chrono::Local;
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::models::{Application, ApplicationDraft};
use crate::query::{Direction, SortKey};
use crate::store::ApplicationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
}

/// Where the user should land after an operation settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Detail(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Saved {
    pub id: i64,
    pub next: View,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(View),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

pub struct Controller<S> {
    store: S,
    phase: Phase,
    loaded: bool,
    snapshot: Vec<Application>,
    generation: u64,
    last_error: Option<String>,
}

impl<S: ApplicationStore> Controller<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            phase: Phase::Uninitialized,
            loaded: false,
            snapshot: Vec::new(),
            generation: 0,
            last_error: None,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn snapshot(&self) -> &[Application] {
        &self.snapshot
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Starts a request and supersedes any request still in flight.
    pub fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.phase = Phase::Loading;
        Ticket(self.generation)
    }

    /// Fetches the whole collection in the store's `order_by` order.
    pub fn refresh(&mut self, order_by: SortKey, direction: Direction) -> Result<&[Application], TrackerError> {
        let ticket = self.begin();
        let result = self.store.list(order_by, direction);
        self.settle_list(ticket, result)?;
        Ok(&self.snapshot)
    }

    /// Applies a list response. Returns `Ok(false)` when the ticket was
    /// superseded and the response was dropped.
    pub fn settle_list(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<Application>, TrackerError>,
    ) -> Result<bool, TrackerError> {
        match self.settle(ticket, "list applications", result)? {
            Some(records) => {
                debug!(count = records.len(), "snapshot refreshed");
                self.snapshot = records;
                self.loaded = true;
                self.phase = Phase::Ready;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Loads one record. A missing id is `Ok(None)`, not an error.
    pub fn open(&mut self, id: i64) -> Result<Option<Application>, TrackerError> {
        let ticket = self.begin();
        match self.store.get(id) {
            Err(TrackerError::NotFound(_)) => {
                info!(id, "application not found");
                self.settle(ticket, "open application", Ok(()))?;
                Ok(None)
            }
            result => self.settle(ticket, "open application", result),
        }
    }

    /// Loads an existing record into an editable draft.
    pub fn edit(&mut self, id: i64) -> Result<Option<ApplicationDraft>, TrackerError> {
        Ok(self.open(id)?.as_ref().map(ApplicationDraft::from))
    }

    /// Validates and inserts. The snapshot is not touched: the list picks the
    /// new record up on its next refresh. `Ok(None)` means the response was
    /// superseded and nothing is reported as saved.
    pub fn create(&mut self, draft: ApplicationDraft) -> Result<Option<Saved>, TrackerError> {
        let draft = draft.normalized(Local::now().date_naive());
        if let Err(e) = draft.validate() {
            return Err(self.fail("create application", e));
        }

        let ticket = self.begin();
        let result = self.store.create(&draft);
        let Some(created) = self.settle(ticket, "create application", result)? else {
            return Ok(None);
        };
        info!(id = created.id, company = %created.company, position = %created.position, "application created");
        Ok(Some(Saved { id: created.id, next: View::List }))
    }

    /// Replaces every user-editable field of record `id` and swaps the stored
    /// record into the snapshot.
    pub fn update(&mut self, id: i64, draft: ApplicationDraft) -> Result<Option<Saved>, TrackerError> {
        let draft = draft.normalized(Local::now().date_naive());
        if let Err(e) = draft.validate() {
            return Err(self.fail("update application", e));
        }

        let ticket = self.begin();
        let result = self.store.update(id, &draft);
        let Some(stored) = self.settle(ticket, "update application", result)? else {
            return Ok(None);
        };
        if let Some(app) = self.snapshot.iter_mut().find(|app| app.id == id) {
            *app = stored;
        }
        info!(id, "application updated");
        Ok(Some(Saved { id, next: View::Detail(id) }))
    }

    /// Deletes record `id` once `confirm` agrees. A declined confirmation
    /// never reaches the store; a failed delete leaves the record in place.
    pub fn delete<F>(&mut self, id: i64, confirm: F) -> Result<DeleteOutcome, TrackerError>
    where
        F: FnOnce(&Application) -> bool,
    {
        let cached = self.snapshot.iter().find(|app| app.id == id).cloned();
        let record = match cached {
            Some(app) => app,
            None => match self.open(id)? {
                Some(app) => app,
                None => return Err(self.fail("delete application", TrackerError::NotFound(id))),
            },
        };

        if !confirm(&record) {
            info!(id, "delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        let ticket = self.begin();
        let result = self.store.delete(id);
        self.settle(ticket, "delete application", result)?;
        self.snapshot.retain(|app| app.id != id);
        info!(id, company = %record.company, "application deleted");
        Ok(DeleteOutcome::Deleted(View::List))
    }

    fn settle<T>(
        &mut self,
        ticket: Ticket,
        action: &'static str,
        result: Result<T, TrackerError>,
    ) -> Result<Option<T>, TrackerError> {
        if ticket != Ticket(self.generation) {
            debug!(action, "dropping stale response");
            return Ok(None);
        }
        self.phase = self.idle_phase();
        match result {
            Ok(value) => {
                self.last_error = None;
                Ok(Some(value))
            }
            Err(e) => Err(self.fail(action, e)),
        }
    }

    fn fail(&mut self, action: &'static str, err: TrackerError) -> TrackerError {
        warn!(action, error = %err, "operation failed");
        self.last_error = Some(err.user_message());
        self.phase = self.idle_phase();
        err
    }

    fn idle_phase(&self) -> Phase {
        if self.loaded {
            Phase::Ready
        } else {
            Phase::Uninitialized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDate;

    fn app(id: i64, company: &str, status: &str, date_applied: &str) -> Application {
        Application {
            id,
            company: company.to_string(),
            position: "Engineer".to_string(),
            status: status.to_string(),
            date_applied: date_applied.to_string(),
            follow_up_date: None,
            url: None,
            cv_url: None,
            cover_letter_url: None,
            notes: None,
            created_at: format!("{} 09:00:00", date_applied),
            updated_at: format!("{} 09:00:00", date_applied),
        }
    }

    fn loaded_controller() -> Controller<MemoryStore> {
        let store = MemoryStore::with_records(vec![
            app(1, "Acme", "applied", "2024-01-10"),
            app(2, "Globex", "interview", "2024-02-01"),
            app(3, "Initech", "rejected", "2024-01-15"),
        ]);
        let mut controller = Controller::new(store);
        controller.refresh(SortKey::DateApplied, Direction::Desc).unwrap();
        controller
    }

    fn draft(company: &str, position: &str) -> ApplicationDraft {
        let mut draft = ApplicationDraft::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        draft.company = company.to_string();
        draft.position = position.to_string();
        draft
    }

    fn ids(records: &[Application]) -> Vec<i64> {
        records.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_phases() {
        let mut controller = Controller::new(MemoryStore::default());
        assert_eq!(controller.phase(), Phase::Uninitialized);
        controller.refresh(SortKey::CreatedAt, Direction::Desc).unwrap();
        assert_eq!(controller.phase(), Phase::Ready);
        let _ticket = controller.begin();
        assert_eq!(controller.phase(), Phase::Loading);
    }

    #[test]
    fn test_refresh_uses_store_order() {
        let controller = loaded_controller();
        assert_eq!(ids(controller.snapshot()), vec![2, 3, 1]);
    }

    #[test]
    fn test_create_with_empty_company_never_reaches_store() {
        let mut controller = Controller::new(MemoryStore::default());
        let err = controller.create(draft("", "Engineer")).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { field: "company" }));
        assert_eq!(controller.store().calls.get(), 0);
        assert!(controller.last_error().unwrap().contains("company"));
    }

    #[test]
    fn test_create_goes_to_list_without_optimistic_insert() {
        let mut controller = loaded_controller();
        let saved = controller.create(draft("Hooli", "SRE")).unwrap().unwrap();
        assert_eq!(saved.id, 4);
        assert_eq!(saved.next, View::List);
        assert_eq!(controller.snapshot().len(), 3);

        controller.refresh(SortKey::CreatedAt, Direction::Desc).unwrap();
        assert_eq!(controller.snapshot().len(), 4);
        assert_eq!(controller.snapshot()[0].company, "Hooli");
    }

    #[test]
    fn test_refresh_failure_keeps_snapshot() {
        let mut controller = loaded_controller();
        controller.store().fail.set(true);
        let err = controller.refresh(SortKey::DateApplied, Direction::Desc).unwrap_err();
        assert!(matches!(err, TrackerError::Transport(_)));
        assert_eq!(controller.phase(), Phase::Ready);
        assert_eq!(ids(controller.snapshot()), vec![2, 3, 1]);
        assert!(controller.last_error().is_some());
    }

    #[test]
    fn test_stale_list_response_is_dropped() {
        let mut controller = loaded_controller();
        let old = controller.begin();
        let new = controller.begin();

        let applied = controller.settle_list(old, Ok(vec![app(9, "Late", "applied", "2024-05-01")])).unwrap();
        assert!(!applied);
        assert_eq!(controller.snapshot().len(), 3);

        let applied = controller.settle_list(new, Ok(vec![])).unwrap();
        assert!(applied);
        assert!(controller.snapshot().is_empty());
    }

    #[test]
    fn test_superseded_create_response_is_not_reported() {
        let mut controller = loaded_controller();
        let old = controller.begin();
        let _new = controller.begin();
        let created = app(9, "Late", "applied", "2024-05-01");
        assert_eq!(controller.settle(old, "create application", Ok(created)).unwrap(), None);
        assert_eq!(controller.phase(), Phase::Loading);
    }

    #[test]
    fn test_open_missing_is_none() {
        let mut controller = loaded_controller();
        assert_eq!(controller.open(99).unwrap(), None);
        assert!(controller.last_error().is_none());
        assert_eq!(controller.open(2).unwrap().map(|a| a.company), Some("Globex".to_string()));
    }

    #[test]
    fn test_update_patches_snapshot_and_goes_to_detail() {
        let mut controller = loaded_controller();
        let mut edited = controller.edit(1).unwrap().unwrap();
        edited.status = "offer".to_string();
        edited.notes = Some("  verbal offer  ".to_string());

        let saved = controller.update(1, edited).unwrap().unwrap();
        assert_eq!(saved.next, View::Detail(1));

        let local = controller.snapshot().iter().find(|a| a.id == 1).unwrap().clone();
        assert_eq!(local.status, "offer");
        assert_eq!(local.notes.as_deref(), Some("verbal offer"));
        let stored = controller.store().get(1).unwrap();
        assert_eq!(stored.status, "offer");
        assert_eq!(local.updated_at, stored.updated_at);
        assert_ne!(local.updated_at, "2024-01-10 09:00:00");
    }

    #[test]
    fn test_update_with_empty_position_is_rejected() {
        let mut controller = loaded_controller();
        let calls = controller.store().calls.get();
        let err = controller.update(1, draft("Acme", " ")).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { field: "position" }));
        assert_eq!(controller.store().calls.get(), calls);
    }

    #[test]
    fn test_create_rejects_malformed_follow_up_before_store() {
        let mut controller = Controller::new(MemoryStore::default());
        let mut bad = draft("Acme", "Engineer");
        bad.follow_up_date = Some("next tuesday".to_string());
        let err = controller.create(bad).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { field: "follow_up_date" }));

        let mut bad = draft("Acme", "Engineer");
        bad.date_applied = "March 1st".to_string();
        let err = controller.create(bad).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { field: "date_applied" }));
        assert_eq!(controller.store().calls.get(), 0);
    }

    #[test]
    fn test_create_with_blank_date_uses_today() {
        let mut controller = Controller::new(MemoryStore::default());
        let mut blank = draft("Acme", "Engineer");
        blank.date_applied = String::new();
        let saved = controller.create(blank).unwrap().unwrap();

        let stored = controller.store().get(saved.id).unwrap();
        assert_eq!(stored.date_applied, Local::now().date_naive().format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_update_rejects_malformed_date() {
        let mut controller = loaded_controller();
        let calls = controller.store().calls.get();
        let mut edited = controller.edit(1).unwrap().unwrap();
        edited.follow_up_date = Some("2024-13-01".to_string());
        let err = controller.update(1, edited).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { field: "follow_up_date" }));
        assert_eq!(controller.store().calls.get(), calls + 1);
        assert_eq!(controller.snapshot().iter().find(|a| a.id == 1).unwrap().follow_up_date, None);
    }

    #[test]
    fn test_delete_without_confirmation_keeps_record() {
        let mut controller = loaded_controller();
        let outcome = controller.delete(2, |_| false).unwrap();
        assert_eq!(outcome, DeleteOutcome::Cancelled);

        let records = controller.refresh(SortKey::DateApplied, Direction::Desc).unwrap();
        assert!(records.iter().any(|a| a.id == 2));
    }

    #[test]
    fn test_delete_confirmed_removes_record() {
        let mut controller = loaded_controller();
        let mut seen = None;
        let outcome = controller
            .delete(2, |app| {
                seen = Some(app.company.clone());
                true
            })
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted(View::List));
        assert_eq!(seen.as_deref(), Some("Globex"));
        assert_eq!(ids(controller.snapshot()), vec![3, 1]);
        assert!(matches!(controller.store().get(2), Err(TrackerError::NotFound(2))));
    }

    #[test]
    fn test_delete_failure_keeps_record_and_reports() {
        let mut controller = loaded_controller();
        controller.store().fail.set(true);
        let err = controller.delete(2, |_| true).unwrap_err();
        assert!(matches!(err, TrackerError::Transport(_)));
        assert!(controller.snapshot().iter().any(|a| a.id == 2));
        assert!(controller.last_error().is_some());

        controller.store().fail.set(false);
        assert!(controller.store().get(2).is_ok());
    }

    #[test]
    fn test_delete_missing_record_is_not_found() {
        let mut controller = loaded_controller();
        let err = controller.delete(42, |_| true).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(42)));
    }
}
