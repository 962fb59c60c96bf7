use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::models::ApplicationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    DateApplied,
    #[default]
    CreatedAt,
    UpdatedAt,
    Company,
    Title,
    Status,
}

impl SortField {
    pub const ALL: [SortField; 6] = [
        SortField::DateApplied,
        SortField::CreatedAt,
        SortField::UpdatedAt,
        SortField::Company,
        SortField::Title,
        SortField::Status,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortField::DateApplied => "dateApplied",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::Company => "company",
            SortField::Title => "title",
            SortField::Status => "status",
        }
    }

    /// Next field in display order, wrapping around. Used by the browse view.
    pub fn cycle(self) -> SortField {
        let idx = SortField::ALL.iter().position(|f| *f == self).unwrap_or(0);
        SortField::ALL[(idx + 1) % SortField::ALL.len()]
    }

    fn compare(self, a: &ApplicationRecord, b: &ApplicationRecord) -> Ordering {
        match self {
            SortField::DateApplied => a.date_applied.cmp(&b.date_applied),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Company => a.company.to_lowercase().cmp(&b.company.to_lowercase()),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Status => a
                .status
                .label()
                .to_lowercase()
                .cmp(&b.status.label().to_lowercase()),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SortField::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "Unknown sort field '{}'. Expected dateApplied, createdAt, updatedAt, company, title or status",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggle(self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

/// Returns a sorted copy. Ties keep their input order in both directions.
pub fn sort_applications(
    records: &[ApplicationRecord],
    field: SortField,
    direction: SortDirection,
) -> Vec<ApplicationRecord> {
    let mut sorted = records.to_vec();
    // slice::sort_by is stable; reversing only non-equal results keeps ties in place
    sorted.sort_by(|a, b| {
        let ord = field.compare(a, b);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    sorted
}
