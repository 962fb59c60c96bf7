mod auth;
mod collection;
mod config;
mod db;
mod error;
mod filter;
mod format;
mod models;
mod prefs;
mod sort;
mod stats;
mod telemetry;
mod tui;
mod validation;

#[cfg(test)]
mod testutil;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::debug;

use auth::{AuthService, Session};
use collection::ApplicationCollection;
use config::Config;
use db::Database;
use error::{AuthError, TrackerError};
use filter::{distinct_companies, ApplicationFilters, DateRange};
use format::{
    capitalize_first, date_range_label, default_date_range, format_currency, format_date,
    format_date_time, format_rate, format_relative_time, interview_rate, recent_activity,
    status_share, truncate, RangePreset,
};
use models::{
    ApplicationDraft, ApplicationPatch, ApplicationRecord, ApplicationStatus, InterviewType,
    NoteDraft, NotePatch, SalaryType,
};
use prefs::PrefsStore;
use sort::{SortDirection, SortField};

const DRAFT_KEY: &str = "application";

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Track job applications through the interview pipeline")]
struct Cli {
    /// Database file
    #[arg(long, global = true, env = "TRACKER_DB")]
    db: Option<PathBuf>,

    /// Preferences file
    #[arg(long, global = true, env = "TRACKER_PREFS")]
    prefs: Option<PathBuf>,

    /// Log filter, e.g. "info" or "tracker=debug"
    #[arg(long, global = true, env = "TRACKER_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Create an account and sign in
    Signup {
        email: String,
        #[arg(short, long, env = "TRACKER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in with email and password
    Login {
        email: String,
        #[arg(short, long, env = "TRACKER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in as a guest
    Guest,

    /// Turn the current guest account into a permanent one
    Link {
        email: String,
        #[arg(short, long, env = "TRACKER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Request a password reset token
    ResetPassword { email: String },

    /// Set a new password with a reset token
    ResetConfirm {
        token: String,
        #[arg(short, long, env = "TRACKER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Update display name or avatar URL
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        photo: Option<String>,
    },

    /// Record a new application
    Add {
        #[command(flatten)]
        fields: ApplicationArgs,

        /// Start from the saved draft
        #[arg(long)]
        resume_draft: bool,
    },

    /// Change fields of an application (empty string clears optional fields)
    Edit {
        /// Application ID or unique prefix
        id: String,
        #[command(flatten)]
        fields: ApplicationArgs,
    },

    /// Delete one or more applications
    Rm {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Set the status of one or more applications
    SetStatus {
        status: ApplicationStatus,
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show application details
    Show { id: String },

    /// List applications
    List {
        /// Only these statuses (repeatable)
        #[arg(short, long)]
        status: Vec<ApplicationStatus>,

        /// Only these companies, exact match (repeatable)
        #[arg(short, long)]
        company: Vec<String>,

        /// Applied on or after (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Applied on or before (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,

        /// Preset window ending today: week, month, quarter, year
        #[arg(long, conflicts_with_all = ["from", "to"])]
        range: Option<RangePreset>,

        /// Text to find in title, company or notes
        #[arg(short = 'q', long)]
        search: Option<String>,

        /// dateApplied, createdAt, updatedAt, company, title, status
        #[arg(long)]
        sort: Option<SortField>,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
    },

    /// List the companies applied to
    Companies,

    /// Manage interview notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },

    /// Show summary statistics
    Stats,

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },

    /// Discard the saved application draft
    ClearDraft,

    /// Browse applications interactively
    Browse,
}

#[derive(clap::Args, Default)]
struct ApplicationArgs {
    /// Job title
    #[arg(short, long)]
    title: Option<String>,

    /// Company name
    #[arg(short, long)]
    company: Option<String>,

    /// Date applied (YYYY-MM-DD or "today")
    #[arg(short, long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    #[arg(short, long)]
    status: Option<ApplicationStatus>,

    /// Job posting URL
    #[arg(long)]
    link: Option<String>,

    #[arg(long)]
    salary: Option<String>,

    /// Seek Estimate, Picked, Actual
    #[arg(long)]
    salary_type: Option<SalaryType>,

    #[arg(long)]
    benefits: Option<String>,

    #[arg(long)]
    notes: Option<String>,

    /// Selection criteria
    #[arg(long)]
    criteria: Option<String>,
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Add an interview note
    Add {
        /// Application ID or unique prefix
        app: String,
        #[arg(short, long, default_value = "other")]
        r#type: InterviewType,
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Note text
        notes: String,
        #[arg(long)]
        interviewers: Option<String>,
        #[arg(long)]
        next_steps: Option<String>,
    },

    /// Edit an interview note
    Edit {
        app: String,
        note: String,
        #[arg(short, long)]
        r#type: Option<InterviewType>,
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        interviewers: Option<String>,
        #[arg(long)]
        next_steps: Option<String>,
    },

    /// Remove an interview note
    Rm { app: String, note: String },
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Print current preferences
    Show,
    /// Set one preference: theme, defaultView, autoSave, emailNotifications
    Set { key: String, value: String },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    if s.eq_ignore_ascii_case("today") {
        return Ok(Local::now().date_naive());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

/// Empty string means "clear this field".
fn optional_text(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| if v.trim().is_empty() { None } else { Some(v) })
}

impl ApplicationArgs {
    fn apply_to_draft(self, draft: &mut ApplicationDraft) {
        let patch = self.into_patch();
        if let Some(title) = patch.title {
            draft.title = title;
        }
        if let Some(company) = patch.company {
            draft.company = company;
        }
        if let Some(date) = patch.date_applied {
            draft.date_applied = date;
        }
        if let Some(status) = patch.status {
            draft.status = status;
        }
        if let Some(salary_type) = patch.salary_type {
            draft.salary_type = salary_type;
        }
        if let Some(link) = patch.job_link {
            draft.job_link = link;
        }
        if let Some(salary) = patch.salary {
            draft.salary = salary;
        }
        if let Some(benefits) = patch.benefits {
            draft.benefits = benefits;
        }
        if let Some(notes) = patch.notes {
            draft.notes = notes;
        }
        if let Some(criteria) = patch.selection_criteria {
            draft.selection_criteria = criteria;
        }
    }

    fn into_patch(self) -> ApplicationPatch {
        ApplicationPatch {
            title: self.title,
            company: self.company,
            job_link: optional_text(self.link),
            date_applied: self.date,
            status: self.status,
            salary: optional_text(self.salary),
            salary_type: self.salary_type,
            benefits: optional_text(self.benefits),
            notes: optional_text(self.notes),
            selection_criteria: optional_text(self.criteria),
        }
    }
}

fn read_password(given: Option<String>, prompt: &str) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    print!("{}: ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Resolves a full ID or a unique prefix against the loaded applications.
fn resolve_id(collection: &ApplicationCollection, wanted: &str) -> Result<String> {
    let matches: Vec<&ApplicationRecord> = collection
        .applications()
        .iter()
        .filter(|a| a.id.starts_with(wanted))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => Err(anyhow!("Application '{}' not found", wanted)),
        _ => Err(anyhow!("'{}' matches {} applications, use more characters", wanted, matches.len())),
    }
}

fn resolve_note_id(record: &ApplicationRecord, wanted: &str) -> Result<String> {
    let matches: Vec<&str> = record
        .interview_notes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| id.starts_with(wanted))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.to_string()),
        [] => Err(anyhow!("Interview note '{}' not found", wanted)),
        _ => Err(anyhow!("'{}' matches {} notes, use more characters", wanted, matches.len())),
    }
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

/// Turns library errors into the one line the user sees.
fn user_facing(err: TrackerError) -> anyhow::Error {
    match err {
        TrackerError::Validation(errors) => {
            let mut msg = String::from("Please fix the following:");
            for e in &errors.errors {
                msg.push_str(&format!("\n  {}: {}", e.field, e.message));
            }
            anyhow!(msg)
        }
        TrackerError::Auth(e) => anyhow!(e.user_message()),
        TrackerError::Store(e) => anyhow!(e),
    }
}

fn loaded_collection(db: &Database, session: &Session) -> Result<ApplicationCollection> {
    let user = session.require().map_err(|e| anyhow!(e.user_message()))?;
    let mut collection = ApplicationCollection::new(Some(user));
    collection.refresh(db).map_err(user_facing)?;
    Ok(collection)
}

fn print_table(apps: &[ApplicationRecord]) {
    if apps.is_empty() {
        println!("No applications found.");
        return;
    }
    println!(
        "{:<9} {:<26} {:<20} {:<12} {:<22} {:>10}",
        "ID", "TITLE", "COMPANY", "APPLIED", "STATUS", "SALARY"
    );
    println!("{}", "-".repeat(104));
    for app in apps {
        let salary = app
            .salary
            .as_deref()
            .map(|s| format_currency(s).unwrap_or_else(|| s.to_string()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<9} {:<26} {:<20} {:<12} {:<22} {:>10}",
            short_id(&app.id),
            truncate(&app.title, 24),
            truncate(&app.company, 18),
            app.date_applied,
            app.status,
            salary
        );
    }
}

fn print_application(app: &ApplicationRecord) {
    println!("Application {}", app.id);
    println!("Title: {}", app.title);
    println!("Company: {}", app.company);
    println!("Status: {}", app.status);
    println!("Applied: {}", format_date(app.date_applied));
    if let Some(link) = &app.job_link {
        println!("Link: {}", link);
    }
    if let Some(salary) = &app.salary {
        let shown = format_currency(salary).unwrap_or_else(|| salary.clone());
        println!("Salary: {} ({})", shown, app.salary_type);
    }
    if let Some(benefits) = &app.benefits {
        println!("Benefits: {}", benefits);
    }
    if let Some(criteria) = &app.selection_criteria {
        println!("\n--- Selection Criteria ---\n{}", criteria);
    }
    if let Some(notes) = &app.notes {
        println!("\n--- Notes ---\n{}", notes);
    }
    if !app.interview_notes.is_empty() {
        println!("\n--- Interviews ({}) ---", app.interview_notes.len());
        let mut notes: Vec<_> = app.interview_notes.iter().collect();
        notes.sort_by_key(|n| n.date);
        for note in notes {
            println!("[{}] {} ({})", short_id(&note.id), format_date(note.date), note.note_type);
            if let Some(who) = &note.interviewers {
                println!("  Interviewers: {}", who);
            }
            for line in textwrap::fill(&note.notes, 76).lines() {
                println!("  {}", line);
            }
            if let Some(next) = &note.next_steps {
                println!("  Next steps: {}", next);
            }
        }
    }
    println!("\nCreated: {}", format_date_time(app.created_at));
    println!("Updated: {}", format_date_time(app.updated_at));
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.db, cli.prefs, cli.log_level);
    telemetry::init(&config)?;

    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    let mut prefs = PrefsStore::load(&config.prefs_path);

    if let Commands::Init = cli.command {
        db.init()?;
        println!("Database initialized at {}", config.db_path.display());
        return Ok(());
    }

    db.ensure_initialized()?;
    let auth = AuthService::new(&db);
    let mut session = Session::restore(&mut prefs, &auth).map_err(|e| anyhow!(e.user_message()))?;

    let listener = session.subscribe(|user| {
        debug!(user_id = user.map(|u| u.id.as_str()).unwrap_or("-"), "identity changed");
    });

    let result = run(cli.command, &db, &auth, &mut session, &mut prefs);
    session.touch(&mut prefs)?;
    session.unsubscribe(listener);
    result
}

fn run(
    command: Commands,
    db: &Database,
    auth: &AuthService,
    session: &mut Session,
    prefs: &mut PrefsStore,
) -> Result<()> {
    let auth_err = |e: AuthError| anyhow!(e.user_message());

    match command {
        Commands::Init => unreachable!("handled before the session is restored"),

        Commands::Signup { email, password } => {
            let interactive = password.is_none();
            let password = read_password(password, "Password")?;
            let confirm = if interactive {
                read_password(None, "Confirm password")?
            } else {
                password.clone()
            };
            validation::validate_signup(&email, &password, &confirm)
                .map_err(|e| user_facing(e.into()))?;
            let user = auth.sign_up(&email, &password).map_err(auth_err)?;
            session.sign_in(prefs, user)?;
            println!("Account created. Signed in as {}.", email);
        }

        Commands::Login { email, password } => {
            let password = read_password(password, "Password")?;
            validation::validate_login(&email, &password).map_err(|e| user_facing(e.into()))?;
            let user = auth.sign_in(&email, &password).map_err(auth_err)?;
            let label = user.label();
            session.sign_in(prefs, user)?;
            println!("Signed in as {}.", label);
        }

        Commands::Guest => {
            let user = auth.sign_in_guest().map_err(auth_err)?;
            session.sign_in(prefs, user)?;
            println!("Signed in as guest. Run 'tracker link <email>' to keep your data.");
        }

        Commands::Link { email, password } => {
            let user_id = session.require().map_err(auth_err)?.id.clone();
            let password = read_password(password, "Password")?;
            validation::validate_signup(&email, &password, &password)
                .map_err(|e| user_facing(e.into()))?;
            let user = auth.link_account(&user_id, &email, &password).map_err(auth_err)?;
            session.sign_in(prefs, user)?;
            println!("Guest account linked to {}.", email);
        }

        Commands::Logout => {
            session.sign_out(prefs)?;
            println!("Signed out.");
        }

        Commands::Whoami => match session.current() {
            Some(user) => {
                println!("User: {}", user.label());
                println!("ID: {}", user.id);
                if let Some(email) = &user.email {
                    println!("Email: {}", email);
                }
                if let Some(photo) = &user.photo_url {
                    println!("Avatar: {}", photo);
                }
                println!("Member since: {}", format_date(user.created_at.date_naive()));
                if let Some(active) = session.last_activity() {
                    println!("Last active: {}", format_relative_time(active, chrono::Utc::now()));
                }
            }
            None => println!("Not signed in."),
        },

        Commands::ResetPassword { email } => {
            validation::validate_reset(&email).map_err(|e| user_facing(e.into()))?;
            let token = auth.request_password_reset(&email).map_err(auth_err)?;
            println!("Reset token (valid for one hour): {}", token);
            println!("Run 'tracker reset-confirm {}' to choose a new password.", token);
        }

        Commands::ResetConfirm { token, password } => {
            let password = read_password(password, "New password")?;
            validation::validate_new_password(&password).map_err(|e| user_facing(e.into()))?;
            auth.complete_password_reset(&token, &password).map_err(auth_err)?;
            println!("Password updated. You can sign in now.");
        }

        Commands::Profile { name, photo } => {
            let user_id = session.require().map_err(auth_err)?.id.clone();
            let user = auth
                .update_profile(&user_id, name.as_deref(), photo.as_deref())
                .map_err(auth_err)?;
            println!("Profile updated for {}.", user.label());
            session.refresh_identity(user);
        }

        Commands::Add { fields, resume_draft } => {
            let mut collection = loaded_collection(db, session)?;
            let today = Local::now().date_naive();
            let mut draft = if resume_draft {
                prefs
                    .load_draft::<ApplicationDraft>(DRAFT_KEY)
                    .ok_or_else(|| anyhow!("No saved draft."))?
            } else {
                ApplicationDraft::new("", "", today)
            };
            fields.apply_to_draft(&mut draft);

            match collection.create(db, &draft) {
                Ok(id) => {
                    prefs.clear_draft(DRAFT_KEY)?;
                    println!("Added application {} ({} at {})", short_id(&id), draft.title, draft.company);
                }
                Err(TrackerError::Validation(errors)) => {
                    if prefs.preferences().auto_save {
                        prefs.save_draft(DRAFT_KEY, &draft)?;
                        eprintln!("Draft saved. Fix the fields and rerun with --resume-draft.");
                    }
                    return Err(user_facing(TrackerError::Validation(errors)));
                }
                Err(e) => return Err(user_facing(e)),
            }
        }

        Commands::ClearDraft => {
            if prefs.has_draft(DRAFT_KEY) {
                prefs.clear_draft(DRAFT_KEY)?;
                println!("Draft discarded.");
            } else {
                println!("No saved draft.");
            }
        }

        Commands::Edit { id, fields } => {
            let mut collection = loaded_collection(db, session)?;
            let id = resolve_id(&collection, &id)?;
            let patch = fields.into_patch();
            if patch.is_empty() {
                bail!("Nothing to change. Pass at least one field.");
            }
            collection.update(db, &id, &patch).map_err(user_facing)?;
            println!("Updated application {}.", short_id(&id));
        }

        Commands::Rm { ids } => {
            let mut collection = loaded_collection(db, session)?;
            let ids = ids
                .iter()
                .map(|id| resolve_id(&collection, id))
                .collect::<Result<Vec<_>>>()?;
            if let [one] = ids.as_slice() {
                collection.remove(db, one).map_err(user_facing)?;
            } else {
                collection.batch_delete(db, &ids).map_err(user_facing)?;
            }
            println!("Deleted {} application(s).", ids.len());
        }

        Commands::SetStatus { status, ids } => {
            let mut collection = loaded_collection(db, session)?;
            let updates = ids
                .iter()
                .map(|id| Ok((resolve_id(&collection, id)?, ApplicationPatch::status(status))))
                .collect::<Result<Vec<_>>>()?;
            collection.batch_update(db, &updates).map_err(user_facing)?;
            println!("Marked {} application(s) as {}.", updates.len(), status);
        }

        Commands::Show { id } => {
            let collection = loaded_collection(db, session)?;
            let id = resolve_id(&collection, &id)?;
            let user = session.require().map_err(auth_err)?;
            let app = db
                .get_application(&user.id, &id)?
                .ok_or_else(|| anyhow!("Application '{}' not found", id))?;
            print_application(&app);
        }

        Commands::List {
            status,
            company,
            from,
            to,
            range,
            search,
            sort,
            asc,
        } => {
            let mut collection = loaded_collection(db, session)?;
            let today = Local::now().date_naive();
            let date_range = match (range, from, to) {
                (Some(preset), _, _) => Some(default_date_range(preset, today)),
                (None, None, None) => None,
                (None, from, to) => Some(DateRange {
                    start: from.unwrap_or(NaiveDate::MIN),
                    end: to.unwrap_or(NaiveDate::MAX),
                }),
            };
            collection.set_filters(ApplicationFilters {
                status: (!status.is_empty()).then_some(status),
                companies: (!company.is_empty()).then_some(company),
                date_range,
                search_term: search,
            });
            let direction = if asc { SortDirection::Asc } else { SortDirection::Desc };
            collection.set_sort(sort.unwrap_or_default(), direction);

            if let Some(range) = &collection.filters().date_range {
                println!("Applied: {}\n", date_range_label(range, today));
            }
            print_table(collection.filtered());
            if !collection.filters().is_empty() {
                println!(
                    "\n{} of {} applications match {} filter(s).",
                    collection.filtered().len(),
                    collection.applications().len(),
                    collection.filters().active_clause_count()
                );
            }
        }

        Commands::Companies => {
            let collection = loaded_collection(db, session)?;
            for company in distinct_companies(collection.applications()) {
                println!("{}", company);
            }
        }

        Commands::Note { command } => {
            let mut collection = loaded_collection(db, session)?;
            match command {
                NoteCommands::Add {
                    app,
                    r#type,
                    date,
                    notes,
                    interviewers,
                    next_steps,
                } => {
                    let app_id = resolve_id(&collection, &app)?;
                    let draft = NoteDraft {
                        date: date.unwrap_or_else(|| Local::now().date_naive()),
                        note_type: r#type,
                        notes,
                        interviewers,
                        next_steps,
                    };
                    let note_id = collection.add_note(db, &app_id, &draft).map_err(user_facing)?;
                    println!("Added interview note {} to {}.", short_id(&note_id), short_id(&app_id));
                }

                NoteCommands::Edit {
                    app,
                    note,
                    r#type,
                    date,
                    notes,
                    interviewers,
                    next_steps,
                } => {
                    let app_id = resolve_id(&collection, &app)?;
                    let record = collection
                        .applications()
                        .iter()
                        .find(|a| a.id == app_id)
                        .ok_or_else(|| anyhow!("Application '{}' not found", app))?;
                    let note_id = resolve_note_id(record, &note)?;
                    let patch = NotePatch {
                        date,
                        note_type: r#type,
                        notes,
                        interviewers: optional_text(interviewers),
                        next_steps: optional_text(next_steps),
                    };
                    collection
                        .update_note(db, &app_id, &note_id, &patch)
                        .map_err(user_facing)?;
                    println!("Updated interview note {}.", short_id(&note_id));
                }

                NoteCommands::Rm { app, note } => {
                    let app_id = resolve_id(&collection, &app)?;
                    let record = collection
                        .applications()
                        .iter()
                        .find(|a| a.id == app_id)
                        .ok_or_else(|| anyhow!("Application '{}' not found", app))?;
                    let note_id = resolve_note_id(record, &note)?;
                    collection.delete_note(db, &app_id, &note_id).map_err(user_facing)?;
                    println!("Removed interview note {}.", short_id(&note_id));
                }
            }
        }

        Commands::Stats => {
            let collection = loaded_collection(db, session)?;
            let stats = collection.stats();
            println!("Total applications: {}", stats.total);
            println!("Response rate:      {}", format_rate(stats.response_rate));
            println!("Interview rate:     {}", format_rate(interview_rate(&stats)));
            println!("Offer rate:         {}", format_rate(stats.offer_rate));
            if !stats.by_status.is_empty() {
                println!("\n{:<30} {:>6} {:>8}", "STATUS", "COUNT", "SHARE");
                println!("{}", "-".repeat(46));
                for (status, count) in &stats.by_status {
                    println!(
                        "{:<30} {:>6} {:>8}",
                        status.label(),
                        count,
                        format_rate(status_share(*count, stats.total))
                    );
                }
            }
            let recent = recent_activity(collection.applications(), 5);
            if !recent.is_empty() {
                println!("\nRecent activity:");
                let now = chrono::Utc::now();
                for app in recent {
                    println!(
                        "  {} at {} - {} ({})",
                        truncate(&app.title, 30),
                        truncate(&app.company, 20),
                        app.status,
                        format_relative_time(app.updated_at, now)
                    );
                }
            }
        }

        Commands::Prefs { command } => match command {
            PrefsCommands::Show => {
                let values = serde_json::to_value(prefs.preferences())?;
                if let Some(map) = values.as_object() {
                    for (key, value) in map {
                        let shown = match value {
                            serde_json::Value::String(s) => capitalize_first(s),
                            other => other.to_string(),
                        };
                        println!("{:<20} {}", key, shown);
                    }
                }
            }
            PrefsCommands::Set { key, value } => {
                let mut current = prefs.preferences();
                current.set_field(&key, &value).map_err(|e| anyhow!(e))?;
                prefs.set_preferences(&current)?;
                println!("Set {} = {}.", key, value);
            }
        },

        Commands::Browse => {
            let user = session.require().map_err(auth_err)?;
            let collection = ApplicationCollection::new(Some(user));
            let feed = db.watch(&user.id);
            tui::run_browse(db, collection, feed)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn list_args_parse() {
        let cli = Cli::try_parse_from([
            "tracker", "list", "-s", "Offer", "-s", "phone call", "-q", "corp", "--sort", "company", "--asc",
        ])
        .unwrap();
        match cli.command {
            Commands::List { status, search, sort, asc, .. } => {
                assert_eq!(status, vec![ApplicationStatus::Offer, ApplicationStatus::PhoneCall]);
                assert_eq!(search.as_deref(), Some("corp"));
                assert_eq!(sort, Some(SortField::Company));
                assert!(asc);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn empty_edit_values_clear_fields() {
        let args = ApplicationArgs {
            link: Some(String::new()),
            notes: Some("keep".to_string()),
            ..ApplicationArgs::default()
        };
        let patch = args.into_patch();
        assert_eq!(patch.job_link, Some(None));
        assert_eq!(patch.notes, Some(Some("keep".to_string())));
        assert_eq!(patch.title, None);
    }

    #[test]
    fn dates_parse_at_the_boundary() {
        assert_eq!(
            parse_date("2024-01-31").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
        assert!(parse_date("31/01/2024").is_err());
    }
}
