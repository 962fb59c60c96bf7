use regex::Regex;
use std::sync::LazyLock;

use crate::error::ValidationErrors;
use crate::models::{ApplicationDraft, NoteDraft};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9.-]+(:\d+)?(/\S*)?$").expect("valid url regex")
});

fn too_long(value: Option<&str>, max: usize) -> bool {
    value.is_some_and(|v| v.chars().count() > max)
}

/// Required text with an upper bound; `messages` is (missing, too long).
fn check_required(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    max: usize,
    messages: (&'static str, &'static str),
) {
    if value.trim().is_empty() {
        errors.push(field, messages.0);
    } else if value.chars().count() > max {
        errors.push(field, messages.1);
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

pub fn validate_application(draft: &ApplicationDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_required(
        &mut errors,
        "title",
        &draft.title,
        100,
        ("Job title is required", "Job title is too long"),
    );
    check_required(
        &mut errors,
        "company",
        &draft.company,
        100,
        ("Company name is required", "Company name is too long"),
    );

    if let Some(link) = draft.job_link.as_deref().filter(|l| !l.is_empty()) {
        if !URL_RE.is_match(link) {
            errors.push("jobLink", "Invalid URL");
        }
    }
    if let Some(salary) = draft.salary.as_deref().filter(|s| !s.trim().is_empty()) {
        let digits: String = salary.chars().filter(|c| !matches!(c, ',' | '$' | ' ')).collect();
        if !digits.parse::<f64>().is_ok_and(f64::is_finite) {
            errors.push("salary", "Salary must be a number");
        }
    }
    if too_long(draft.benefits.as_deref(), 500) {
        errors.push("benefits", "Benefits description is too long");
    }
    if too_long(draft.notes.as_deref(), 1000) {
        errors.push("notes", "Notes are too long");
    }
    if too_long(draft.selection_criteria.as_deref(), 2000) {
        errors.push("selectionCriteria", "Selection criteria is too long");
    }

    errors.into_result()
}

pub fn validate_interview_note(note: &NoteDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_required(
        &mut errors,
        "notes",
        &note.notes,
        2000,
        ("Interview notes are required", "Notes are too long"),
    );
    if too_long(note.interviewers.as_deref(), 200) {
        errors.push("interviewers", "Interviewers field is too long");
    }
    if too_long(note.next_steps.as_deref(), 500) {
        errors.push("nextSteps", "Next steps field is too long");
    }
    errors.into_result()
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if !is_valid_email(email) {
        errors.push("email", "Invalid email address");
    }
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_email(&mut errors, email);
    if password.chars().count() < 6 {
        errors.push("password", "Password must be at least 6 characters");
    }
    errors.into_result()
}

pub fn validate_signup(email: &str, password: &str, confirm: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_email(&mut errors, email);
    check_password_strength(&mut errors, password);
    if password != confirm {
        errors.push("confirmPassword", "Passwords don't match");
    }
    errors.into_result()
}

pub fn validate_new_password(password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_password_strength(&mut errors, password);
    errors.into_result()
}

fn check_password_strength(errors: &mut ValidationErrors, password: &str) {
    if password.chars().count() < 6 {
        errors.push("password", "Password must be at least 6 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("password", "Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("password", "Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("password", "Password must contain at least one number");
    }
}

pub fn validate_reset(email: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_email(&mut errors, email);
    errors.into_result()
}
