mod config;
mod controller;
mod db;
mod error;
mod models;
mod query;
mod store;
mod tui;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use config::{Preferences, Theme};
use controller::{Controller, DeleteOutcome, View};
use db::Database;
use error::TrackerError;
use models::{parse_date, status_label, Application, ApplicationDraft, DraftEdits, Status};
use query::{Direction, ListQuery, SortKey, SortState, StatusFilter, Stats};
use std::io::{self, Write};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "suivi")]
#[command(about = "Job application tracker - record, filter and follow up on applications")]
struct Cli {
    /// Log filter (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Record a new application
    Add {
        /// Company name
        #[arg(short, long)]
        company: String,

        /// Position applied for
        #[arg(short, long)]
        position: String,

        /// Current status
        #[arg(short, long, value_enum, default_value = "applied")]
        status: Status,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// List applications
    List {
        /// Filter by status (all, applied, interview, offer, rejected)
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,

        /// Only show applications whose company or position contains this text
        #[arg(short = 'q', long)]
        search: Option<String>,

        /// Date field to sort by
        #[arg(long, value_enum, default_value = "date_applied")]
        sort: SortKey,

        /// Oldest first instead of newest first
        #[arg(long)]
        asc: bool,
    },

    /// Show application details
    Show {
        /// Application ID
        id: i64,
    },

    /// Change an application (every field is rewritten)
    Edit {
        /// Application ID
        id: i64,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        position: Option<String>,

        #[arg(short, long, value_enum)]
        status: Option<Status>,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Delete an application
    Delete {
        /// Application ID
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show counts, recent additions and follow-ups due
    Dashboard,

    /// Show or change the color theme
    Theme {
        /// New theme
        #[arg(value_enum)]
        name: Option<Theme>,
    },

    /// Browse applications interactively
    Browse,
}

#[derive(clap::Args)]
struct FieldArgs {
    /// Date applied (YYYY-MM-DD), empty for today
    #[arg(long, value_parser = date_arg)]
    date: Option<String>,

    /// Follow-up reminder date (YYYY-MM-DD), empty to clear
    #[arg(long, value_parser = date_arg)]
    follow_up: Option<String>,

    /// Link to the job posting
    #[arg(long)]
    url: Option<String>,

    /// Link to the CV sent
    #[arg(long)]
    cv: Option<String>,

    /// Link to the cover letter sent
    #[arg(long)]
    cover_letter: Option<String>,

    #[arg(short, long)]
    notes: Option<String>,
}

/// Accepts a `YYYY-MM-DD` date or an empty string.
fn date_arg(raw: &str) -> Result<String, String> {
    if raw.trim().is_empty() || parse_date(raw).is_some() {
        Ok(raw.trim().to_string())
    } else {
        Err(format!("'{}' is not a YYYY-MM-DD date", raw))
    }
}

impl FieldArgs {
    fn into_edits(self) -> DraftEdits {
        DraftEdits {
            date_applied: self.date,
            follow_up_date: self.follow_up,
            url: self.url,
            cv_url: self.cv,
            cover_letter_url: self.cover_letter,
            notes: self.notes,
            ..Default::default()
        }
    }
}

fn open_controller() -> Result<Controller<Database>> {
    let db = Database::open()?;
    db.ensure_initialized()?;
    Ok(Controller::new(db))
}

/// Turns a failed record operation into the message the user sees.
fn surface(err: TrackerError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    let mut prefs = Preferences::load(&Preferences::default_path());

    match cli.command {
        Commands::Init => {
            let db = Database::open()?;
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Add {
            company,
            position,
            status,
            fields,
        } => {
            let mut controller = open_controller()?;
            let mut draft = ApplicationDraft::new(today());
            DraftEdits {
                company: Some(company),
                position: Some(position),
                status: Some(status),
                ..fields.into_edits()
            }
            .apply(&mut draft);

            let Some(saved) = controller.create(draft).map_err(surface)? else {
                anyhow::bail!("Create was superseded; nothing was saved");
            };
            println!("Added application #{}", saved.id);
            if saved.next == View::List {
                print_list(controller.refresh(SortKey::DateApplied, Direction::Desc).map_err(surface)?.iter().collect());
            }
        }

        Commands::List {
            status,
            search,
            sort,
            asc,
        } => {
            let mut controller = open_controller()?;
            let records = controller.refresh(SortKey::DateApplied, Direction::Desc).map_err(surface)?;
            let query = ListQuery {
                search: search.unwrap_or_default(),
                status,
                sort: SortState::new(sort, if asc { Direction::Asc } else { Direction::Desc }),
            };
            print_list(query.apply(records));
        }

        Commands::Show { id } => {
            let mut controller = open_controller()?;
            match controller.open(id).map_err(surface)? {
                Some(app) => print_detail(&app),
                None => println!("Application #{} not found.", id),
            }
        }

        Commands::Edit {
            id,
            company,
            position,
            status,
            fields,
        } => {
            let mut controller = open_controller()?;
            let Some(mut draft) = controller.edit(id).map_err(surface)? else {
                println!("Application #{} not found.", id);
                return Ok(());
            };

            let edits = DraftEdits {
                company,
                position,
                status,
                ..fields.into_edits()
            };
            if edits.is_empty() {
                println!("Nothing to change.");
                return Ok(());
            }
            edits.apply(&mut draft);

            let Some(saved) = controller.update(id, draft).map_err(surface)? else {
                anyhow::bail!("Update was superseded; nothing was saved");
            };
            println!("Updated application #{}", saved.id);
            if let View::Detail(id) = saved.next {
                if let Some(app) = controller.open(id).map_err(surface)? {
                    println!();
                    print_detail(&app);
                }
            }
        }

        Commands::Delete { id, yes } => {
            let mut controller = open_controller()?;
            let outcome = controller
                .delete(id, |app| {
                    yes || confirm(&format!(
                        "Delete application #{} ({} at {})? This cannot be undone.",
                        app.id, app.position, app.company
                    ))
                })
                .map_err(surface)?;
            match outcome {
                DeleteOutcome::Deleted(_) => println!("Deleted application #{}.", id),
                DeleteOutcome::Cancelled => println!("Kept application #{}.", id),
            }
        }

        Commands::Dashboard => {
            let mut controller = open_controller()?;
            let records = controller.refresh(SortKey::CreatedAt, Direction::Desc).map_err(surface)?;
            print_dashboard(records);
        }

        Commands::Theme { name } => match name {
            Some(theme) => {
                prefs.set_theme(theme)?;
                println!("Theme set to {}.", theme);
            }
            None => {
                println!("Current theme: {}", prefs.theme);
                let names: Vec<&str> = Theme::ALL.iter().map(|t| t.as_str()).collect();
                println!("Available: {}", names.join(", "));
            }
        },

        Commands::Browse => {
            let controller = open_controller()?;
            tui::run_browse(controller, &mut prefs)?;
        }
    }

    Ok(())
}

fn print_list(apps: Vec<&Application>) {
    if apps.is_empty() {
        println!("No applications found.");
        return;
    }
    println!(
        "{:<6} {:<10} {:<28} {:<20} {:<11} {:<11}",
        "ID", "STATUS", "POSITION", "COMPANY", "APPLIED", "FOLLOW UP"
    );
    println!("{}", "-".repeat(91));
    for app in apps {
        println!(
            "{:<6} {:<10} {:<28} {:<20} {:<11} {:<11}",
            app.id,
            status_label(&app.status),
            truncate(&app.position, 26),
            truncate(&app.company, 18),
            truncate(&app.date_applied, 10),
            app.follow_up_date.as_deref().map(|d| truncate(d, 10)).unwrap_or_default()
        );
    }
}

fn print_detail(app: &Application) {
    println!("Application #{}", app.id);
    println!("Position: {}", app.position);
    println!("Company: {}", app.company);
    println!("Status: {}", status_label(&app.status));
    println!("Applied: {}", app.date_applied);
    println!("Added: {}", app.created_at);
    if app.has_follow_up() {
        if let Some(follow_up) = &app.follow_up_date {
            println!("Follow up on: {}", follow_up);
        }
    }
    println!("Posting: {}", app.url.as_deref().unwrap_or("not specified"));
    println!("CV: {}", app.cv_url.as_deref().unwrap_or("none"));
    println!("Cover letter: {}", app.cover_letter_url.as_deref().unwrap_or("none"));
    match &app.notes {
        Some(notes) => println!("\n--- Notes ---\n{}", textwrap::fill(notes, 80)),
        None => println!("\nNo notes for this application."),
    }
}

fn print_dashboard(records: &[Application]) {
    let stats = Stats::compute(records);
    println!("Applications: {}", stats.total);
    println!("Active:       {}", stats.active);
    println!("Interviews:   {}", stats.interview);
    println!("Offers:       {}", stats.offer);
    println!("Rejected:     {}", stats.rejected);

    let recent = query::recent(records, query::RECENT_LIMIT);
    if !recent.is_empty() {
        println!("\nRecently added:");
        for app in recent {
            println!(
                "  #{} - {} at {} ({})",
                app.id,
                app.position,
                app.company,
                status_label(&app.status)
            );
        }
    }

    let due = query::follow_ups_due(records, today());
    if !due.is_empty() {
        println!("\nFollow-ups due:");
        for app in due {
            println!(
                "  #{} - {} at {} (follow up on {})",
                app.id,
                app.position,
                app.company,
                app.follow_up_date.as_deref().unwrap_or_default()
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max.saturating_sub(3)).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Acme", 10), "Acme");
        assert_eq!(truncate("Senior Platform Engineer", 10), "Senior ...");
        assert_eq!(truncate("Société Générale", 8), "Socié...");
    }

    #[test]
    fn test_cli_parses_list_filters() {
        let cli = Cli::try_parse_from(["suivi", "list", "--status", "interview", "-q", "acme", "--sort", "created_at", "--asc"])
            .unwrap();
        match cli.command {
            Commands::List { status, search, sort, asc } => {
                assert_eq!(status, StatusFilter::Only(Status::Interview));
                assert_eq!(search.as_deref(), Some("acme"));
                assert_eq!(sort, SortKey::CreatedAt);
                assert!(asc);
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_status_filter() {
        assert!(Cli::try_parse_from(["suivi", "list", "--status", "pending"]).is_err());
    }

    #[test]
    fn test_cli_rejects_malformed_dates() {
        assert!(Cli::try_parse_from(["suivi", "add", "-c", "Acme", "-p", "SRE", "--follow-up", "next tuesday"]).is_err());
        assert!(Cli::try_parse_from(["suivi", "edit", "3", "--date", "2024-02-30"]).is_err());
        assert!(Cli::try_parse_from(["suivi", "add", "-c", "Acme", "-p", "SRE", "--date", ""]).is_ok());
    }

    #[test]
    fn test_add_args_build_draft() {
        let cli = Cli::try_parse_from([
            "suivi", "add", "-c", "Acme", "-p", "Backend Engineer", "--follow-up", "2024-04-01", "--url", "https://acme.example/jobs/1",
        ])
        .unwrap();
        let Commands::Add { company, position, status, fields } = cli.command else {
            panic!("expected add command");
        };
        let mut draft = ApplicationDraft::new(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        DraftEdits {
            company: Some(company),
            position: Some(position),
            status: Some(status),
            ..fields.into_edits()
        }
        .apply(&mut draft);

        assert_eq!(draft.company, "Acme");
        assert_eq!(draft.status, "applied");
        assert_eq!(draft.date_applied, "2024-03-01");
        assert_eq!(draft.follow_up_date.as_deref(), Some("2024-04-01"));
        assert!(draft.validate().is_ok());
    }
}
