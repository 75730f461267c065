//! Filtering, searching, sorting and counting over an in-memory snapshot.
//!
//! Nothing here touches the store or mutates its input: every function takes
//! borrowed records and hands back a new view of references into them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::models::{Application, Status};

/// Number of records on the dashboard's recent updates panel.
pub const RECENT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    /// All, then each status in order, then back to All.
    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Only(Status::Applied),
            StatusFilter::Only(Status::Applied) => StatusFilter::Only(Status::Interview),
            StatusFilter::Only(Status::Interview) => StatusFilter::Only(Status::Offer),
            StatusFilter::Only(Status::Offer) => StatusFilter::Only(Status::Rejected),
            StatusFilter::Only(Status::Rejected) => StatusFilter::All,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        Status::parse(&s.trim().to_lowercase())
            .map(StatusFilter::Only)
            .ok_or_else(|| format!("unknown status '{}' (all, {})", s, Status::ALL.map(|st| st.as_str()).join(", ")))
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => write!(f, "{}", status),
        }
    }
}

/// The date-bearing fields a list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortKey {
    #[default]
    #[value(name = "date_applied")]
    DateApplied,
    #[value(name = "follow_up_date")]
    FollowUpDate,
    #[value(name = "created_at")]
    CreatedAt,
}

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::DateApplied => "date_applied",
            SortKey::FollowUpDate => "follow_up_date",
            SortKey::CreatedAt => "created_at",
        }
    }

    fn value<'a>(&self, app: &'a Application) -> Option<&'a str> {
        match self {
            SortKey::DateApplied => Some(app.date_applied.as_str()),
            SortKey::FollowUpDate => app.follow_up_date.as_deref(),
            SortKey::CreatedAt => Some(app.created_at.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub key: SortKey,
    pub direction: Direction,
}

impl SortState {
    pub fn new(key: SortKey, direction: Direction) -> Self {
        Self { key, direction }
    }

    /// Picking the active key again flips direction; a new key starts descending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key;
            self.direction = Direction::Desc;
        }
    }
}

/// Parses a stored date or timestamp. Absent or malformed values are the
/// epoch so they sink to the bottom of a descending sort.
pub fn parse_timestamp(raw: Option<&str>) -> NaiveDateTime {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NaiveDateTime::default();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.naive_utc();
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt;
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_time(NaiveTime::default());
    }

    NaiveDateTime::default()
}

pub fn matches_search(app: &Application, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    app.company.to_lowercase().contains(&query) || app.position.to_lowercase().contains(&query)
}

pub fn matches_status(app: &Application, filter: StatusFilter) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Only(status) => app.status_kind() == Some(status),
    }
}

pub fn filter_records<'a>(
    records: impl IntoIterator<Item = &'a Application>,
    status: StatusFilter,
    query: &str,
) -> Vec<&'a Application> {
    records
        .into_iter()
        .filter(|app| matches_search(app, query) && matches_status(app, status))
        .collect()
}

pub fn compare_by(a: &Application, b: &Application, key: SortKey) -> Ordering {
    parse_timestamp(key.value(a)).cmp(&parse_timestamp(key.value(b)))
}

/// Stable sort: records with equal keys keep their relative input order in
/// both directions.
pub fn sort_records<'a>(mut view: Vec<&'a Application>, sort: SortState) -> Vec<&'a Application> {
    match sort.direction {
        Direction::Asc => view.sort_by(|a, b| compare_by(a, b, sort.key)),
        Direction::Desc => view.sort_by(|a, b| compare_by(b, a, sort.key)),
    }
    view
}

/// Everything a list view lets the user pick.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: String,
    pub status: StatusFilter,
    pub sort: SortState,
}

impl ListQuery {
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a Application>) -> Vec<&'a Application> {
        sort_records(filter_records(records, self.status, &self.search), self.sort)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub interview: usize,
    pub offer: usize,
    pub rejected: usize,
}

impl Stats {
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a Application>) -> Self {
        records.into_iter().fold(Stats::default(), |mut stats, app| {
            stats.total += 1;
            match app.status_kind() {
                Some(Status::Applied) => stats.active += 1,
                Some(Status::Interview) => {
                    stats.active += 1;
                    stats.interview += 1;
                }
                Some(Status::Offer) => {
                    stats.active += 1;
                    stats.offer += 1;
                }
                Some(Status::Rejected) => stats.rejected += 1,
                None => {}
            }
            stats
        })
    }
}

/// The `n` most recently created records, newest first.
pub fn recent(records: &[Application], n: usize) -> Vec<&Application> {
    let mut view = sort_records(
        records.iter().collect(),
        SortState::new(SortKey::CreatedAt, Direction::Desc),
    );
    view.truncate(n);
    view
}

/// Records whose follow-up date has arrived, oldest reminder first.
/// Rejected applications need no follow-up.
pub fn follow_ups_due(records: &[Application], today: NaiveDate) -> Vec<&Application> {
    let due: Vec<&Application> = records
        .iter()
        .filter(|app| app.has_follow_up())
        .filter(|app| app.status_kind().is_none_or(|s| s.is_active()))
        .filter(|app| {
            let when = parse_timestamp(app.follow_up_date.as_deref());
            when != NaiveDateTime::default() && when.date() <= today
        })
        .collect();
    sort_records(due, SortState::new(SortKey::FollowUpDate, Direction::Asc))
}
