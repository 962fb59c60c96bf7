use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{ApplicationRecord, ApplicationStatus};

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Query over one user's applications. Every present clause must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFilters {
    pub status: Option<Vec<ApplicationStatus>>,
    pub companies: Option<Vec<String>>,
    pub date_range: Option<DateRange>,
    pub search_term: Option<String>,
}

impl ApplicationFilters {
    pub fn is_empty(&self) -> bool {
        self.active_clause_count() == 0
    }

    pub fn active_clause_count(&self) -> usize {
        let mut count = 0;
        if self.status.as_ref().is_some_and(|s| !s.is_empty()) {
            count += 1;
        }
        if self.companies.as_ref().is_some_and(|c| !c.is_empty()) {
            count += 1;
        }
        if self.date_range.is_some() {
            count += 1;
        }
        if self.search_term.as_ref().is_some_and(|t| !t.is_empty()) {
            count += 1;
        }
        count
    }

    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        // An empty list behaves like an absent clause.
        if let Some(statuses) = self.status.as_ref().filter(|s| !s.is_empty()) {
            if !statuses.contains(&record.status) {
                return false;
            }
        }

        if let Some(companies) = self.companies.as_ref().filter(|c| !c.is_empty()) {
            if !companies.iter().any(|c| *c == record.company) {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            if !range.contains(record.date_applied) {
                return false;
            }
        }

        if let Some(term) = self.search_term.as_deref().filter(|t| !t.is_empty()) {
            let haystack = format!(
                "{} {} {}",
                record.title,
                record.company,
                record.notes.as_deref().unwrap_or("")
            )
            .to_lowercase();
            if !haystack.contains(&term.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

/// Returns the matching records in their original relative order.
pub fn filter_applications(
    records: &[ApplicationRecord],
    filters: &ApplicationFilters,
) -> Vec<ApplicationRecord> {
    records
        .iter()
        .filter(|record| filters.matches(record))
        .cloned()
        .collect()
}

/// Sorted, de-duplicated company names for the company picker.
pub fn distinct_companies(records: &[ApplicationRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.company.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{date, ids, record, with_status};
    use ApplicationStatus::*;

    fn sample() -> Vec<ApplicationRecord> {
        let mut a = record("a", "Engineer at TechCorp", "TechCorp", Offer);
        a.date_applied = date("2024-01-31");
        let mut b = record("b", "Analyst at TechCorp", "TechCorp", Applied);
        b.date_applied = date("2024-02-01");
        let mut c = record("c", "Designer", "acme", Ghosted);
        c.notes = Some("Met the CORP recruiter".to_string());
        c.date_applied = date("2024-01-01");
        vec![a, b, c]
    }

    #[test]
    fn empty_filters_match_everything() {
        let records = sample();
        let out = filter_applications(&records, &ApplicationFilters::default());
        assert_eq!(ids(&out), vec!["a", "b", "c"]);
        assert!(ApplicationFilters::default().is_empty());
    }

    #[test]
    fn status_and_search_are_conjunctive() {
        let records = vec![
            record("1", "Engineer at TechCorp", "TechCorp", Offer),
            record("2", "Analyst at TechCorp", "TechCorp", Applied),
        ];
        let filters = ApplicationFilters {
            status: Some(vec![Offer]),
            search_term: Some("corp".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_applications(&records, &filters)), vec!["1"]);
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let records = sample();
        let filters = ApplicationFilters {
            date_range: Some(DateRange {
                start: date("2024-01-01"),
                end: date("2024-01-31"),
            }),
            ..Default::default()
        };
        assert_eq!(ids(&filter_applications(&records, &filters)), vec!["a", "c"]);
    }

    #[test]
    fn company_match_is_case_sensitive() {
        let records = sample();
        let filters = ApplicationFilters {
            companies: Some(vec!["Acme".to_string()]),
            ..Default::default()
        };
        assert!(filter_applications(&records, &filters).is_empty());

        let filters = ApplicationFilters {
            companies: Some(vec!["acme".to_string()]),
            ..Default::default()
        };
        assert_eq!(ids(&filter_applications(&records, &filters)), vec!["c"]);
    }

    #[test]
    fn search_covers_notes_and_ignores_case() {
        let records = sample();
        let filters = ApplicationFilters {
            search_term: Some("recruiter".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_applications(&records, &filters)), vec!["c"]);

        let empty = ApplicationFilters {
            search_term: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(filter_applications(&records, &empty).len(), 3);
    }

    #[test]
    fn empty_lists_impose_no_constraint() {
        let records = sample();
        let filters = ApplicationFilters {
            status: Some(vec![]),
            companies: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(filter_applications(&records, &filters).len(), 3);
        assert_eq!(filters.active_clause_count(), 0);
    }

    #[test]
    fn filtering_is_idempotent() {
        let records = sample();
        let filters = ApplicationFilters {
            search_term: Some("techcorp".to_string()),
            ..Default::default()
        };
        let once = filter_applications(&records, &filters);
        let twice = filter_applications(&once, &filters);
        assert_eq!(once, twice);
    }

    #[test]
    fn adding_a_clause_never_grows_the_result() {
        let records = with_status(&[Applied, Offer, Ghosted, Offer, PhoneCall]);
        let base = ApplicationFilters {
            status: Some(vec![Offer, Applied]),
            ..Default::default()
        };
        let narrowed = ApplicationFilters {
            search_term: Some("zzz".to_string()),
            ..base.clone()
        };
        let wide = filter_applications(&records, &base).len();
        assert_eq!(wide, 3);
        assert!(filter_applications(&records, &narrowed).len() <= wide);
    }

    #[test]
    fn distinct_companies_are_sorted() {
        let records = sample();
        assert_eq!(distinct_companies(&records), vec!["TechCorp", "acme"]);
    }
}
