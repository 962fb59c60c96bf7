use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{
    ApplicationDraft, ApplicationPatch, ApplicationRecord, ApplicationStatus, InterviewNote,
    NoteDraft, NotePatch, SalaryType, UserIdentity,
};

pub type StoreResult<T> = Result<T, StoreError>;

const APPLICATION_COLUMNS: &str = "id, user_id, title, company, job_link, date_applied, status,
     salary, salary_type, benefits, notes, selection_criteria, interview_notes,
     created_at, updated_at";

const USER_COLUMNS: &str =
    "id, email, display_name, photo_url, is_anonymous, created_at, last_login";

/// Random 128-bit identifier rendered as 32 hex chars.
pub fn new_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Update stamp that never goes backwards relative to `previous`.
fn stamp_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}

impl ToSql for ApplicationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for ApplicationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for SalaryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for SalaryType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Stored user row, including the credential hash the identity never exposes.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub identity: UserIdentity,
    pub password_hash: Option<String>,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened database");
        Self::configure(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    /// Owner references are enforced whatever the SQLite build defaults to.
    fn configure(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE,
                display_name TEXT,
                photo_url TEXT,
                password_hash TEXT,
                is_anonymous INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_login TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                job_link TEXT,
                date_applied TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Applied' CHECK (status IN (
                    'Applied', 'Phone Call', '1st Interview', '2nd Interview', 'Offer',
                    'Rejected after Applying', 'Rejected after Phone Call',
                    'Rejected after 1st Interview', 'Rejected after 2nd Interview', 'Ghosted'
                )),
                salary TEXT,
                salary_type TEXT NOT NULL DEFAULT 'Seek Estimate'
                    CHECK (salary_type IN ('Seek Estimate', 'Picked', 'Actual')),
                benefits TEXT,
                notes TEXT,
                selection_criteria TEXT,
                interview_notes TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS password_resets (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                used INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_applications_user ON applications(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
            "#,
        )?;
        info!("database schema ready");
        Ok(())
    }

    pub fn ensure_initialized(&self) -> StoreResult<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StoreError::Uninitialized);
        }
        Ok(())
    }

    // --- Application operations ---

    pub fn create_application(&self, user_id: &str, draft: &ApplicationDraft) -> StoreResult<String> {
        let id = new_id();
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO applications (id, user_id, title, company, job_link, date_applied, status,
                 salary, salary_type, benefits, notes, selection_criteria, interview_notes,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, '[]', ?13, ?13)",
            params![
                id,
                user_id,
                draft.title,
                draft.company,
                draft.job_link,
                draft.date_applied,
                draft.status,
                draft.salary,
                draft.salary_type,
                draft.benefits,
                draft.notes,
                draft.selection_criteria,
                now,
            ],
        )?;
        debug!(%id, user_id, "created application");
        Ok(id)
    }

    pub fn get_application(&self, user_id: &str, id: &str) -> StoreResult<Option<ApplicationRecord>> {
        fetch_application(&self.conn, user_id, id)
    }

    /// All of one user's applications, newest first.
    pub fn list_applications(&self, user_id: &str) -> StoreResult<Vec<ApplicationRecord>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], row_to_application)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_application(&self, user_id: &str, id: &str, patch: &ApplicationPatch) -> StoreResult<()> {
        let mut record = require_application(&self.conn, user_id, id)?;
        patch.apply_to(&mut record);
        write_application(&self.conn, &mut record)?;
        debug!(%id, "updated application");
        Ok(())
    }

    pub fn delete_application(&self, user_id: &str, id: &str) -> StoreResult<()> {
        let deleted = self.conn.execute(
            "DELETE FROM applications WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("application {}", id)));
        }
        debug!(%id, "deleted application");
        Ok(())
    }

    /// Applies every patch or none of them.
    pub fn batch_update(&self, user_id: &str, updates: &[(String, ApplicationPatch)]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (id, patch) in updates {
            let mut record = require_application(&tx, user_id, id)?;
            patch.apply_to(&mut record);
            write_application(&tx, &mut record)?;
        }
        tx.commit()?;
        info!(count = updates.len(), "batch updated applications");
        Ok(())
    }

    /// Deletes every listed application or none of them.
    pub fn batch_delete(&self, user_id: &str, ids: &[String]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for id in ids {
            let deleted = tx.execute(
                "DELETE FROM applications WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound(format!("application {}", id)));
            }
        }
        tx.commit()?;
        info!(count = ids.len(), "batch deleted applications");
        Ok(())
    }

    // --- Interview note operations ---

    pub fn add_interview_note(&self, user_id: &str, app_id: &str, draft: &NoteDraft) -> StoreResult<String> {
        let tx = self.conn.unchecked_transaction()?;
        let mut record = require_application(&tx, user_id, app_id)?;

        let mut note_id = new_id();
        while record.interview_notes.iter().any(|n| n.id == note_id) {
            note_id = new_id();
        }
        record.interview_notes.push(InterviewNote {
            id: note_id.clone(),
            date: draft.date,
            note_type: draft.note_type,
            notes: draft.notes.clone(),
            interviewers: draft.interviewers.clone(),
            next_steps: draft.next_steps.clone(),
        });

        write_application(&tx, &mut record)?;
        tx.commit()?;
        debug!(app_id, %note_id, "added interview note");
        Ok(note_id)
    }

    pub fn update_interview_note(
        &self,
        user_id: &str,
        app_id: &str,
        note_id: &str,
        patch: &NotePatch,
    ) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let mut record = require_application(&tx, user_id, app_id)?;
        let note = record
            .interview_notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| StoreError::NotFound(format!("interview note {}", note_id)))?;
        patch.apply_to(note);
        write_application(&tx, &mut record)?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_interview_note(&self, user_id: &str, app_id: &str, note_id: &str) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let mut record = require_application(&tx, user_id, app_id)?;
        let before = record.interview_notes.len();
        record.interview_notes.retain(|n| n.id != note_id);
        if record.interview_notes.len() == before {
            return Err(StoreError::NotFound(format!("interview note {}", note_id)));
        }
        write_application(&tx, &mut record)?;
        tx.commit()?;
        Ok(())
    }

    // --- Live subscription ---

    pub fn watch(&self, user_id: &str) -> SnapshotFeed {
        SnapshotFeed {
            user_id: user_id.to_string(),
            seen_version: None,
        }
    }

    fn data_version(&self) -> StoreResult<i64> {
        Ok(self.conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
    }

    // --- User operations ---

    pub fn insert_user(&self, row: &UserRow) -> StoreResult<()> {
        let user = &row.identity;
        self.conn.execute(
            "INSERT INTO users (id, email, display_name, photo_url, password_hash, is_anonymous,
                 created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.email,
                user.display_name,
                user.photo_url,
                row.password_hash,
                user.is_anonymous,
                user.created_at,
                user.last_login,
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> StoreResult<Option<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE id = ?1");
        Ok(self.conn.query_row(&sql, [id], row_to_user).optional()?)
    }

    pub fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE LOWER(email) = LOWER(?1)"
        );
        Ok(self.conn.query_row(&sql, [email], row_to_user).optional()?)
    }

    /// Writes every mutable user column back.
    pub fn save_user(&self, row: &UserRow) -> StoreResult<()> {
        let user = &row.identity;
        let updated = self.conn.execute(
            "UPDATE users SET email = ?1, display_name = ?2, photo_url = ?3, password_hash = ?4,
                 is_anonymous = ?5, last_login = ?6
             WHERE id = ?7",
            params![
                user.email,
                user.display_name,
                user.photo_url,
                row.password_hash,
                user.is_anonymous,
                user.last_login,
                user.id,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    pub fn insert_reset_token(&self, token: &str, user_id: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO password_resets (token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, Utc::now()],
        )?;
        Ok(())
    }

    /// Marks an unused token as used and returns its user and issue time.
    pub fn consume_reset_token(&self, token: &str) -> StoreResult<Option<(String, DateTime<Utc>)>> {
        let found: Option<(String, DateTime<Utc>)> = self
            .conn
            .query_row(
                "SELECT user_id, created_at FROM password_resets WHERE token = ?1 AND used = 0",
                [token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if found.is_some() {
            self.conn
                .execute("UPDATE password_resets SET used = 1 WHERE token = ?1", [token])?;
        }
        Ok(found)
    }
}

/// Polling view of one user's applications. Dropping it unsubscribes.
///
/// SQLite bumps `PRAGMA data_version` on a connection whenever another
/// connection commits, so a change made by a second process shows up on the
/// next poll. Writes through the same connection are not reported; callers
/// re-read after their own mutations or call [`SnapshotFeed::invalidate`].
pub struct SnapshotFeed {
    user_id: String,
    seen_version: Option<i64>,
}

impl SnapshotFeed {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Full snapshot on the first poll and after any external commit.
    pub fn poll(&mut self, db: &Database) -> StoreResult<Option<Vec<ApplicationRecord>>> {
        let version = db.data_version()?;
        if self.seen_version == Some(version) {
            return Ok(None);
        }
        let snapshot = db.list_applications(&self.user_id)?;
        self.seen_version = Some(version);
        debug!(user_id = %self.user_id, count = snapshot.len(), "snapshot delivered");
        Ok(Some(snapshot))
    }

    pub fn invalidate(&mut self) {
        self.seen_version = None;
    }
}

fn fetch_application(conn: &Connection, user_id: &str, id: &str) -> StoreResult<Option<ApplicationRecord>> {
    let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1 AND user_id = ?2");
    Ok(conn
        .query_row(&sql, params![id, user_id], row_to_application)
        .optional()?)
}

fn require_application(conn: &Connection, user_id: &str, id: &str) -> StoreResult<ApplicationRecord> {
    fetch_application(conn, user_id, id)?
        .ok_or_else(|| StoreError::NotFound(format!("application {}", id)))
}

/// Persists every mutable column and bumps the update stamp.
fn write_application(conn: &Connection, record: &mut ApplicationRecord) -> StoreResult<()> {
    record.updated_at = stamp_after(record.updated_at.max(record.created_at));
    let notes = serde_json::to_string(&record.interview_notes)?;
    conn.execute(
        "UPDATE applications SET title = ?1, company = ?2, job_link = ?3, date_applied = ?4,
             status = ?5, salary = ?6, salary_type = ?7, benefits = ?8, notes = ?9,
             selection_criteria = ?10, interview_notes = ?11, updated_at = ?12
         WHERE id = ?13",
        params![
            record.title,
            record.company,
            record.job_link,
            record.date_applied,
            record.status,
            record.salary,
            record.salary_type,
            record.benefits,
            record.notes,
            record.selection_criteria,
            notes,
            record.updated_at,
            record.id,
        ],
    )?;
    Ok(())
}

fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<ApplicationRecord> {
    let notes_json: String = row.get(12)?;
    let interview_notes: Vec<InterviewNote> = serde_json::from_str(&notes_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?;
    Ok(ApplicationRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        company: row.get(3)?,
        job_link: row.get(4)?,
        date_applied: row.get(5)?,
        status: row.get(6)?,
        salary: row.get(7)?,
        salary_type: row.get(8)?,
        benefits: row.get(9)?,
        notes: row.get(10)?,
        selection_criteria: row.get(11)?,
        interview_notes,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        identity: UserIdentity {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            photo_url: row.get(3)?,
            is_anonymous: row.get(4)?,
            created_at: row.get(5)?,
            last_login: row.get(6)?,
        },
        password_hash: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InterviewType;
    use crate::testutil::{date, owner, seeded_db as db};

    fn draft(title: &str, company: &str) -> ApplicationDraft {
        ApplicationDraft::new(title, company, date("2024-01-10"))
    }

    fn note(text: &str) -> NoteDraft {
        NoteDraft {
            date: date("2024-01-20"),
            note_type: InterviewType::Video,
            notes: text.to_string(),
            interviewers: Some("Sam".to_string()),
            next_steps: None,
        }
    }

    #[test]
    fn uninitialized_database_is_reported() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.ensure_initialized(), Err(StoreError::Uninitialized)));
        db.init().unwrap();
        assert!(db.ensure_initialized().is_ok());
    }

    #[test]
    fn applications_need_an_existing_owner() {
        let db = db();
        assert!(matches!(
            db.create_application("ghost", &draft("Engineer", "Acme")),
            Err(StoreError::Sqlite(_))
        ));
        assert!(matches!(
            db.insert_reset_token("tok", "ghost"),
            Err(StoreError::Sqlite(_))
        ));
        let enforced: bool = db
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(enforced);
    }

    #[test]
    fn create_then_get_round_trips_fields() {
        let db = db();
        let mut d = draft("Engineer", "Acme");
        d.status = ApplicationStatus::PhoneCall;
        d.salary_type = SalaryType::Actual;
        d.salary = Some("150000".to_string());
        let id = db.create_application("u1", &d).unwrap();

        let record = db.get_application("u1", &id).unwrap().unwrap();
        assert_eq!(record.title, "Engineer");
        assert_eq!(record.status, ApplicationStatus::PhoneCall);
        assert_eq!(record.salary_type, SalaryType::Actual);
        assert_eq!(record.date_applied, date("2024-01-10"));
        assert!(record.interview_notes.is_empty());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn records_are_scoped_to_their_owner() {
        let db = db();
        let id = db.create_application("u1", &draft("Engineer", "Acme")).unwrap();
        db.create_application("u2", &draft("Analyst", "Beta")).unwrap();

        assert!(db.get_application("u2", &id).unwrap().is_none());
        assert_eq!(db.list_applications("u1").unwrap().len(), 1);
        assert!(matches!(
            db.delete_application("u2", &id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn update_bumps_updated_at() {
        let db = db();
        let id = db.create_application("u1", &draft("Engineer", "Acme")).unwrap();
        db.update_application("u1", &id, &ApplicationPatch::status(ApplicationStatus::Offer))
            .unwrap();
        let record = db.get_application("u1", &id).unwrap().unwrap();
        assert_eq!(record.status, ApplicationStatus::Offer);
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn batch_delete_is_all_or_nothing() {
        let db = db();
        let a = db.create_application("u1", &draft("A", "Acme")).unwrap();
        let b = db.create_application("u1", &draft("B", "Acme")).unwrap();

        let err = db.batch_delete("u1", &[a.clone(), "missing".to_string()]);
        assert!(matches!(err, Err(StoreError::NotFound(_))));
        assert_eq!(db.list_applications("u1").unwrap().len(), 2);

        db.batch_delete("u1", &[a, b]).unwrap();
        assert!(db.list_applications("u1").unwrap().is_empty());
    }

    #[test]
    fn batch_update_applies_each_patch() {
        let db = db();
        let a = db.create_application("u1", &draft("A", "Acme")).unwrap();
        let b = db.create_application("u1", &draft("B", "Acme")).unwrap();
        let updates = vec![
            (a.clone(), ApplicationPatch::status(ApplicationStatus::Ghosted)),
            (b.clone(), ApplicationPatch::status(ApplicationStatus::Offer)),
        ];
        db.batch_update("u1", &updates).unwrap();
        assert_eq!(
            db.get_application("u1", &a).unwrap().unwrap().status,
            ApplicationStatus::Ghosted
        );
        assert_eq!(
            db.get_application("u1", &b).unwrap().unwrap().status,
            ApplicationStatus::Offer
        );
    }

    #[test]
    fn interview_notes_add_edit_delete() {
        let db = db();
        let app = db.create_application("u1", &draft("Engineer", "Acme")).unwrap();
        let first = db.add_interview_note("u1", &app, &note("Intro call")).unwrap();
        let second = db.add_interview_note("u1", &app, &note("Tech screen")).unwrap();
        assert_ne!(first, second);
        assert_eq!(first.len(), 32);

        let patch = NotePatch {
            next_steps: Some(Some("Onsite next week".to_string())),
            ..NotePatch::default()
        };
        db.update_interview_note("u1", &app, &second, &patch).unwrap();
        db.delete_interview_note("u1", &app, &first).unwrap();

        let record = db.get_application("u1", &app).unwrap().unwrap();
        assert_eq!(record.interview_notes.len(), 1);
        assert_eq!(record.interview_notes[0].notes, "Tech screen");
        assert_eq!(
            record.interview_notes[0].next_steps.as_deref(),
            Some("Onsite next week")
        );
        assert!(matches!(
            db.delete_interview_note("u1", &app, &first),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            db.add_interview_note("u1", "nope", &note("x")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn feed_reports_commits_from_other_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.db");
        let viewer = Database::open(&path).unwrap();
        viewer.init().unwrap();
        owner(&viewer, "u1");
        let writer = Database::open(&path).unwrap();

        let mut feed = viewer.watch("u1");
        assert_eq!(feed.poll(&viewer).unwrap().map(|s| s.len()), Some(0));
        assert!(feed.poll(&viewer).unwrap().is_none());

        writer.create_application("u1", &draft("Engineer", "Acme")).unwrap();
        let snapshot = feed.poll(&viewer).unwrap().expect("snapshot after external write");
        assert_eq!(snapshot.len(), 1);
        assert!(feed.poll(&viewer).unwrap().is_none());

        feed.invalidate();
        assert!(feed.poll(&viewer).unwrap().is_some());
    }

    #[test]
    fn reset_tokens_are_single_use() {
        let db = db();
        db.insert_reset_token("tok", "u1").unwrap();
        assert_eq!(db.consume_reset_token("tok").unwrap().map(|(u, _)| u).as_deref(), Some("u1"));
        assert!(db.consume_reset_token("tok").unwrap().is_none());
    }
}
