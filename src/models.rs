use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline position of an application. Declaration order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "Applied")]
    Applied,
    #[serde(rename = "Phone Call")]
    PhoneCall,
    #[serde(rename = "1st Interview")]
    FirstInterview,
    #[serde(rename = "2nd Interview")]
    SecondInterview,
    #[serde(rename = "Offer")]
    Offer,
    #[serde(rename = "Rejected after Applying")]
    RejectedAfterApplying,
    #[serde(rename = "Rejected after Phone Call")]
    RejectedAfterPhoneCall,
    #[serde(rename = "Rejected after 1st Interview")]
    RejectedAfterFirstInterview,
    #[serde(rename = "Rejected after 2nd Interview")]
    RejectedAfterSecondInterview,
    #[serde(rename = "Ghosted")]
    Ghosted,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 10] = [
        ApplicationStatus::Applied,
        ApplicationStatus::PhoneCall,
        ApplicationStatus::FirstInterview,
        ApplicationStatus::SecondInterview,
        ApplicationStatus::Offer,
        ApplicationStatus::RejectedAfterApplying,
        ApplicationStatus::RejectedAfterPhoneCall,
        ApplicationStatus::RejectedAfterFirstInterview,
        ApplicationStatus::RejectedAfterSecondInterview,
        ApplicationStatus::Ghosted,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::PhoneCall => "Phone Call",
            ApplicationStatus::FirstInterview => "1st Interview",
            ApplicationStatus::SecondInterview => "2nd Interview",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::RejectedAfterApplying => "Rejected after Applying",
            ApplicationStatus::RejectedAfterPhoneCall => "Rejected after Phone Call",
            ApplicationStatus::RejectedAfterFirstInterview => "Rejected after 1st Interview",
            ApplicationStatus::RejectedAfterSecondInterview => "Rejected after 2nd Interview",
            ApplicationStatus::Ghosted => "Ghosted",
        }
    }

    /// True when the company took some visible action on the application.
    pub fn is_response(self) -> bool {
        !matches!(self, ApplicationStatus::Applied | ApplicationStatus::Ghosted)
    }

    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            ApplicationStatus::RejectedAfterApplying
                | ApplicationStatus::RejectedAfterPhoneCall
                | ApplicationStatus::RejectedAfterFirstInterview
                | ApplicationStatus::RejectedAfterSecondInterview
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let labels: Vec<&str> = ApplicationStatus::ALL.iter().map(|s| s.label()).collect();
                format!("Unknown status '{}'. Expected one of: {}", s, labels.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SalaryType {
    #[default]
    #[serde(rename = "Seek Estimate")]
    SeekEstimate,
    #[serde(rename = "Picked")]
    Picked,
    #[serde(rename = "Actual")]
    Actual,
}

impl SalaryType {
    pub fn label(self) -> &'static str {
        match self {
            SalaryType::SeekEstimate => "Seek Estimate",
            SalaryType::Picked => "Picked",
            SalaryType::Actual => "Actual",
        }
    }
}

impl fmt::Display for SalaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SalaryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "seek estimate" | "estimate" | "seek" => Ok(SalaryType::SeekEstimate),
            "picked" => Ok(SalaryType::Picked),
            "actual" => Ok(SalaryType::Actual),
            _ => Err(format!(
                "Unknown salary type '{}'. Expected one of: Seek Estimate, Picked, Actual",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    Phone,
    Video,
    Onsite,
    Technical,
    Behavioral,
    #[default]
    Other,
}

impl InterviewType {
    pub fn label(self) -> &'static str {
        match self {
            InterviewType::Phone => "phone",
            InterviewType::Video => "video",
            InterviewType::Onsite => "onsite",
            InterviewType::Technical => "technical",
            InterviewType::Behavioral => "behavioral",
            InterviewType::Other => "other",
        }
    }
}

impl fmt::Display for InterviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for InterviewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phone" => Ok(InterviewType::Phone),
            "video" => Ok(InterviewType::Video),
            "onsite" => Ok(InterviewType::Onsite),
            "technical" => Ok(InterviewType::Technical),
            "behavioral" => Ok(InterviewType::Behavioral),
            "other" => Ok(InterviewType::Other),
            _ => Err(format!(
                "Unknown interview type '{}'. Expected phone, video, onsite, technical, behavioral or other",
                s
            )),
        }
    }
}

/// One stage of the interview process, embedded in its application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewNote {
    pub id: String, // unique within the parent application
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub note_type: InterviewType,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interviewers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub company: String,
    pub job_link: Option<String>,
    pub date_applied: NaiveDate,
    pub status: ApplicationStatus,
    pub salary: Option<String>, // free text, e.g. "120000"
    pub salary_type: SalaryType,
    pub benefits: Option<String>,
    pub notes: Option<String>,
    pub selection_criteria: Option<String>,
    pub interview_notes: Vec<InterviewNote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Form payload for creating an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDraft {
    pub title: String,
    pub company: String,
    pub job_link: Option<String>,
    pub date_applied: NaiveDate,
    pub status: ApplicationStatus,
    pub salary: Option<String>,
    pub salary_type: SalaryType,
    pub benefits: Option<String>,
    pub notes: Option<String>,
    pub selection_criteria: Option<String>,
}

impl ApplicationDraft {
    pub fn new(title: &str, company: &str, date_applied: NaiveDate) -> Self {
        Self {
            title: title.to_string(),
            company: company.to_string(),
            job_link: None,
            date_applied,
            status: ApplicationStatus::Applied,
            salary: None,
            salary_type: SalaryType::default(),
            benefits: None,
            notes: None,
            selection_criteria: None,
        }
    }
}

/// The form as it would look for an existing record, so edits can be checked.
impl From<&ApplicationRecord> for ApplicationDraft {
    fn from(record: &ApplicationRecord) -> Self {
        Self {
            title: record.title.clone(),
            company: record.company.clone(),
            job_link: record.job_link.clone(),
            date_applied: record.date_applied,
            status: record.status,
            salary: record.salary.clone(),
            salary_type: record.salary_type,
            benefits: record.benefits.clone(),
            notes: record.notes.clone(),
            selection_criteria: record.selection_criteria.clone(),
        }
    }
}

/// Partial update of an application. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationPatch {
    pub title: Option<String>,
    pub company: Option<String>,
    pub job_link: Option<Option<String>>,
    pub date_applied: Option<NaiveDate>,
    pub status: Option<ApplicationStatus>,
    pub salary: Option<Option<String>>,
    pub salary_type: Option<SalaryType>,
    pub benefits: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub selection_criteria: Option<Option<String>>,
}

impl ApplicationPatch {
    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, record: &mut ApplicationRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(company) = &self.company {
            record.company = company.clone();
        }
        if let Some(link) = &self.job_link {
            record.job_link = link.clone();
        }
        if let Some(date) = self.date_applied {
            record.date_applied = date;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(salary) = &self.salary {
            record.salary = salary.clone();
        }
        if let Some(salary_type) = self.salary_type {
            record.salary_type = salary_type;
        }
        if let Some(benefits) = &self.benefits {
            record.benefits = benefits.clone();
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
        if let Some(criteria) = &self.selection_criteria {
            record.selection_criteria = criteria.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub note_type: InterviewType,
    pub notes: String,
    pub interviewers: Option<String>,
    pub next_steps: Option<String>,
}

impl From<&InterviewNote> for NoteDraft {
    fn from(note: &InterviewNote) -> Self {
        Self {
            date: note.date,
            note_type: note.note_type,
            notes: note.notes.clone(),
            interviewers: note.interviewers.clone(),
            next_steps: note.next_steps.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub date: Option<NaiveDate>,
    pub note_type: Option<InterviewType>,
    pub notes: Option<String>,
    pub interviewers: Option<Option<String>>,
    pub next_steps: Option<Option<String>>,
}

impl NotePatch {
    pub fn apply_to(&self, note: &mut InterviewNote) {
        if let Some(date) = self.date {
            note.date = date;
        }
        if let Some(note_type) = self.note_type {
            note.note_type = note_type;
        }
        if let Some(notes) = &self.notes {
            note.notes = notes.clone();
        }
        if let Some(interviewers) = &self.interviewers {
            note.interviewers = interviewers.clone();
        }
        if let Some(next_steps) = &self.next_steps {
            note.next_steps = next_steps.clone();
        }
    }
}

/// Authenticated identity as handed to views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl UserIdentity {
    pub fn label(&self) -> String {
        if self.is_anonymous {
            return "guest".to_string();
        }
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_labels_case_insensitively() {
        assert_eq!(
            "rejected after 1st interview".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::RejectedAfterFirstInterview
        );
        assert_eq!("Offer".parse::<ApplicationStatus>().unwrap(), ApplicationStatus::Offer);
        assert!("Hired".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_label() {
        let json = serde_json::to_string(&ApplicationStatus::PhoneCall).unwrap();
        assert_eq!(json, "\"Phone Call\"");
        let back: ApplicationStatus = serde_json::from_str("\"2nd Interview\"").unwrap();
        assert_eq!(back, ApplicationStatus::SecondInterview);
    }

    #[test]
    fn responses_exclude_applied_and_ghosted() {
        let responses: Vec<_> = ApplicationStatus::ALL
            .into_iter()
            .filter(|s| s.is_response())
            .collect();
        assert_eq!(responses.len(), 8);
        assert!(!responses.contains(&ApplicationStatus::Applied));
        assert!(!responses.contains(&ApplicationStatus::Ghosted));
    }

    #[test]
    fn interview_note_uses_type_key() {
        let note = InterviewNote {
            id: "abc".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            note_type: InterviewType::Technical,
            notes: "Whiteboard".to_string(),
            interviewers: None,
            next_steps: Some("Wait".to_string()),
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "technical");
        assert_eq!(value["nextSteps"], "Wait");
        assert!(value.get("interviewers").is_none());
    }

    #[test]
    fn patch_clears_optional_fields() {
        let now = Utc::now();
        let mut record = ApplicationRecord {
            id: "1".to_string(),
            user_id: "u".to_string(),
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            job_link: Some("https://acme.test/job".to_string()),
            date_applied: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            status: ApplicationStatus::Applied,
            salary: None,
            salary_type: SalaryType::Picked,
            benefits: None,
            notes: None,
            selection_criteria: None,
            interview_notes: vec![],
            created_at: now,
            updated_at: now,
        };
        let patch = ApplicationPatch {
            job_link: Some(None),
            status: Some(ApplicationStatus::Offer),
            ..ApplicationPatch::default()
        };
        patch.apply_to(&mut record);
        assert_eq!(record.job_link, None);
        assert_eq!(record.status, ApplicationStatus::Offer);
        assert_eq!(record.title, "Engineer");
        assert!(ApplicationPatch::default().is_empty());
    }
}
