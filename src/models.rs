use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TrackerError;

/// Calendar dates are stored and entered as `YYYY-MM-DD`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub company: String,
    pub position: String,
    pub status: String, // "applied", "interview", "offer", "rejected"
    pub date_applied: String,
    pub follow_up_date: Option<String>,
    pub url: Option<String>,
    pub cv_url: Option<String>,
    pub cover_letter_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Application {
    pub fn status_kind(&self) -> Option<Status> {
        Status::parse(&self.status)
    }

    pub fn has_follow_up(&self) -> bool {
        self.follow_up_date.as_deref().is_some_and(|d| !d.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Applied, Status::Interview, Status::Offer, Status::Rejected];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "applied" => Some(Status::Applied),
            "interview" => Some(Status::Interview),
            "offer" => Some(Status::Offer),
            "rejected" => Some(Status::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Applied => "applied",
            Status::Interview => "interview",
            Status::Offer => "offer",
            Status::Rejected => "rejected",
        }
    }

    /// Applied, interview and offer are still in the pipeline; rejection ends it.
    pub fn is_active(&self) -> bool {
        !matches!(self, Status::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display label for a stored status value. Values outside the four known
/// statuses resolve to "Unknown".
pub fn status_label(raw: &str) -> &'static str {
    match Status::parse(raw) {
        Some(Status::Applied) => "Applied",
        Some(Status::Interview) => "Interview",
        Some(Status::Offer) => "Offer",
        Some(Status::Rejected) => "Rejected",
        None => "Unknown",
    }
}

/// Every field of an application that the user supplies. `id` and
/// `created_at` belong to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub company: String,
    pub position: String,
    pub status: String,
    pub date_applied: String,
    pub follow_up_date: Option<String>,
    pub url: Option<String>,
    pub cv_url: Option<String>,
    pub cover_letter_url: Option<String>,
    pub notes: Option<String>,
}

impl ApplicationDraft {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            company: String::new(),
            position: String::new(),
            status: Status::Applied.as_str().to_string(),
            date_applied: today.format(DATE_FORMAT).to_string(),
            follow_up_date: None,
            url: None,
            cv_url: None,
            cover_letter_url: None,
            notes: None,
        }
    }

    /// Returns the first missing or malformed field: company, position, then
    /// the two dates.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.company.trim().is_empty() {
            return Err(TrackerError::Validation { field: "company" });
        }
        if self.position.trim().is_empty() {
            return Err(TrackerError::Validation { field: "position" });
        }
        if parse_date(&self.date_applied).is_none() {
            return Err(TrackerError::Validation { field: "date_applied" });
        }
        if self.follow_up_date.as_deref().is_some_and(|d| parse_date(d).is_none()) {
            return Err(TrackerError::Validation { field: "follow_up_date" });
        }
        Ok(())
    }

    /// Trims text fields, drops blank optional ones and falls back to `today`
    /// for a blank application date.
    pub fn normalized(mut self, today: NaiveDate) -> Self {
        self.company = self.company.trim().to_string();
        self.position = self.position.trim().to_string();
        self.date_applied = self.date_applied.trim().to_string();
        if self.date_applied.is_empty() {
            self.date_applied = today.format(DATE_FORMAT).to_string();
        }
        if self.status.trim().is_empty() {
            self.status = Status::Applied.as_str().to_string();
        }
        self.follow_up_date = blank_to_none(self.follow_up_date);
        self.url = blank_to_none(self.url);
        self.cv_url = blank_to_none(self.cv_url);
        self.cover_letter_url = blank_to_none(self.cover_letter_url);
        self.notes = blank_to_none(self.notes);
        self
    }
}

impl From<&Application> for ApplicationDraft {
    fn from(app: &Application) -> Self {
        Self {
            company: app.company.clone(),
            position: app.position.clone(),
            status: app.status.clone(),
            date_applied: app.date_applied.clone(),
            follow_up_date: app.follow_up_date.clone(),
            url: app.url.clone(),
            cv_url: app.cv_url.clone(),
            cover_letter_url: app.cover_letter_url.clone(),
            notes: app.notes.clone(),
        }
    }
}

/// Field edits to lay over a draft. `None` leaves a field alone; an empty
/// string clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct DraftEdits {
    pub company: Option<String>,
    pub position: Option<String>,
    pub status: Option<Status>,
    pub date_applied: Option<String>,
    pub follow_up_date: Option<String>,
    pub url: Option<String>,
    pub cv_url: Option<String>,
    pub cover_letter_url: Option<String>,
    pub notes: Option<String>,
}

impl DraftEdits {
    pub fn is_empty(&self) -> bool {
        self.company.is_none()
            && self.position.is_none()
            && self.status.is_none()
            && self.date_applied.is_none()
            && self.follow_up_date.is_none()
            && self.url.is_none()
            && self.cv_url.is_none()
            && self.cover_letter_url.is_none()
            && self.notes.is_none()
    }

    pub fn apply(self, draft: &mut ApplicationDraft) {
        if let Some(company) = self.company {
            draft.company = company;
        }
        if let Some(position) = self.position {
            draft.position = position;
        }
        if let Some(status) = self.status {
            draft.status = status.as_str().to_string();
        }
        if let Some(date) = self.date_applied {
            draft.date_applied = date;
        }
        if let Some(date) = self.follow_up_date {
            draft.follow_up_date = Some(date);
        }
        if let Some(url) = self.url {
            draft.url = Some(url);
        }
        if let Some(cv) = self.cv_url {
            draft.cv_url = Some(cv);
        }
        if let Some(letter) = self.cover_letter_url {
            draft.cover_letter_url = Some(letter);
        }
        if let Some(notes) = self.notes {
            draft.notes = Some(notes);
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
