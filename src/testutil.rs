use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::db::{Database, UserRow};
use crate::models::{ApplicationRecord, ApplicationStatus, SalaryType, UserIdentity};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
}

pub fn instant(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn record(id: &str, title: &str, company: &str, status: ApplicationStatus) -> ApplicationRecord {
    ApplicationRecord {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        title: title.to_string(),
        company: company.to_string(),
        job_link: None,
        date_applied: date("2024-01-15"),
        status,
        salary: None,
        salary_type: SalaryType::SeekEstimate,
        benefits: None,
        notes: None,
        selection_criteria: None,
        interview_notes: Vec::new(),
        created_at: instant(0),
        updated_at: instant(0),
    }
}

pub fn with_status(statuses: &[ApplicationStatus]) -> Vec<ApplicationRecord> {
    statuses
        .iter()
        .enumerate()
        .map(|(i, status)| record(&format!("r{}", i), "Engineer", "Acme", *status))
        .collect()
}

pub fn ids(records: &[ApplicationRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

pub fn identity(id: &str) -> UserIdentity {
    UserIdentity {
        id: id.to_string(),
        email: None,
        display_name: None,
        photo_url: None,
        is_anonymous: true,
        created_at: instant(0),
        last_login: instant(0),
    }
}

/// Stores a guest account with a fixed id so application rows have an owner.
pub fn owner(db: &Database, id: &str) -> UserIdentity {
    let user = identity(id);
    db.insert_user(&UserRow {
        identity: user.clone(),
        password_hash: None,
    })
    .expect("insert owner");
    user
}

/// Fresh schema with owners `u1` and `u2`.
pub fn seeded_db() -> Database {
    let db = Database::open_in_memory().expect("in-memory database");
    db.init().expect("schema");
    owner(&db, "u1");
    owner(&db, "u2");
    db
}
