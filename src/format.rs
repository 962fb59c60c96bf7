//! Display helpers shared by the CLI tables and the browse view.

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use std::str::FromStr;

use crate::filter::DateRange;
use crate::models::{ApplicationRecord, ApplicationStatus};
use crate::stats::Stats;

/// Share of applications at `1st Interview`, as shown on the stats page.
///
/// Only that one status is counted; later stages are not folded in.
pub fn interview_rate(stats: &Stats) -> f64 {
    stats.count(ApplicationStatus::FirstInterview) as f64 / stats.total.max(1) as f64 * 100.0
}

/// Share of all applications held by one status, in percent.
pub fn status_share(count: usize, total: usize) -> f64 {
    count as f64 / total.max(1) as f64 * 100.0
}

pub fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate)
}

/// The `limit` most recently updated applications.
pub fn recent_activity(records: &[ApplicationRecord], limit: usize) -> Vec<&ApplicationRecord> {
    let mut recent: Vec<&ApplicationRecord> = records.iter().collect();
    recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    recent.truncate(limit);
    recent
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

pub fn format_date_time(instant: DateTime<Utc>) -> String {
    instant.format("%b %-d, %Y, %I:%M %p").to_string()
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n > 1 { "s" } else { "" })
}

pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    let weeks = days / 7;
    let months = days / 30;

    if seconds < 60 {
        "just now".to_string()
    } else if minutes < 60 {
        plural(minutes, "minute")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days < 7 {
        plural(days, "day")
    } else if weeks < 4 {
        plural(weeks, "week")
    } else if months < 12 {
        plural(months, "month")
    } else {
        format_date(then.date_naive())
    }
}

pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

/// Preset windows offered by the date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    Week,
    Month,
    Quarter,
    Year,
}

impl FromStr for RangePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" => Ok(RangePreset::Week),
            "month" => Ok(RangePreset::Month),
            "quarter" => Ok(RangePreset::Quarter),
            "year" => Ok(RangePreset::Year),
            _ => Err(format!(
                "Unknown range '{}'. Expected week, month, quarter or year",
                s
            )),
        }
    }
}

/// Range ending today and reaching back one preset period.
pub fn default_date_range(preset: RangePreset, today: NaiveDate) -> DateRange {
    let start = match preset {
        RangePreset::Week => today.checked_sub_days(Days::new(7)),
        RangePreset::Month => today.checked_sub_months(Months::new(1)),
        RangePreset::Quarter => today.checked_sub_months(Months::new(3)),
        RangePreset::Year => today.checked_sub_months(Months::new(12)),
    }
    .unwrap_or(NaiveDate::MIN);
    DateRange { start, end: today }
}

pub fn date_range_label(range: &DateRange, today: NaiveDate) -> String {
    if range.start == today && range.end == today {
        return "Today".to_string();
    }
    if let Some(yesterday) = today.pred_opt() {
        if range.start == yesterday && range.end == yesterday {
            return "Yesterday".to_string();
        }
    }
    match days_between(range.start, range.end) {
        6 => "Last 7 days".to_string(),
        29 => "Last 30 days".to_string(),
        89 => "Last 90 days".to_string(),
        _ => format!("{} - {}", format_date(range.start), format_date(range.end)),
    }
}

/// Renders a free-text salary as whole dollars, e.g. "$120,000".
pub fn format_currency(amount: &str) -> Option<String> {
    let cleaned: String = amount.chars().filter(|c| !matches!(c, ',' | '$' | ' ')).collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if rounded < 0 { "-" } else { "" };
    Some(format!("{}${}", sign, grouped))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationStatus::*;
    use crate::stats::compute_stats;
    use crate::testutil::{date, ids, instant, with_status};

    #[test]
    fn interview_rate_counts_first_interview_only() {
        let stats = compute_stats(&with_status(&[FirstInterview, SecondInterview, Offer, Applied]));
        assert_eq!(interview_rate(&stats), 25.0);
        assert_eq!(interview_rate(&compute_stats(&[])), 0.0);
        assert_eq!(format_rate(interview_rate(&stats)), "25.0%");
    }

    #[test]
    fn status_share_of_total() {
        let stats = compute_stats(&with_status(&[Applied, Applied, Offer, Ghosted]));
        assert_eq!(status_share(stats.count(Applied), stats.total), 50.0);
        assert_eq!(format_rate(status_share(stats.count(Offer), stats.total)), "25.0%");
        assert_eq!(status_share(0, 0), 0.0);
    }

    #[test]
    fn recent_activity_orders_by_update() {
        let mut records = with_status(&[Applied, Offer, Ghosted]);
        records[0].updated_at = instant(5);
        records[1].updated_at = instant(50);
        records[2].updated_at = instant(20);
        let recent = recent_activity(&records, 2);
        let recent_ids: Vec<&str> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(recent_ids, vec!["r1", "r2"]);
        assert_eq!(ids(&records), vec!["r0", "r1", "r2"]);
    }

    #[test]
    fn relative_time_buckets() {
        let now = instant(10_000_000);
        assert_eq!(format_relative_time(instant(10_000_000 - 30), now), "just now");
        assert_eq!(format_relative_time(instant(10_000_000 - 60), now), "1 minute ago");
        assert_eq!(format_relative_time(instant(10_000_000 - 7200), now), "2 hours ago");
        assert_eq!(format_relative_time(instant(10_000_000 - 3 * 86_400), now), "3 days ago");
        assert_eq!(format_relative_time(instant(10_000_000 - 14 * 86_400), now), "2 weeks ago");
        assert_eq!(format_relative_time(instant(10_000_000 - 60 * 86_400), now), "2 months ago");
    }

    #[test]
    fn range_labels_and_presets() {
        let today = date("2024-03-31");
        let week = default_date_range(RangePreset::Week, today);
        assert_eq!(week.start, date("2024-03-24"));
        let month = default_date_range(RangePreset::Month, today);
        assert_eq!(month.start, date("2024-02-29"));

        let last7 = DateRange { start: date("2024-03-25"), end: today };
        assert_eq!(date_range_label(&last7, today), "Last 7 days");
        let only_today = DateRange { start: today, end: today };
        assert_eq!(date_range_label(&only_today, today), "Today");
        let odd = DateRange { start: date("2024-01-01"), end: date("2024-01-03") };
        assert_eq!(date_range_label(&odd, today), "Jan 1, 2024 - Jan 3, 2024");
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency("120000").as_deref(), Some("$120,000"));
        assert_eq!(format_currency("$95,500.40").as_deref(), Some("$95,500"));
        assert_eq!(format_currency("999").as_deref(), Some("$999"));
        assert_eq!(format_currency("lots"), None);
    }

    #[test]
    fn text_helpers() {
        assert_eq!(truncate("Senior Engineer", 10), "Senior ...");
        assert_eq!(truncate("Short", 10), "Short");
        assert_eq!(capitalize_first("oNSITE"), "Onsite");
        assert_eq!(days_between(date("2024-01-10"), date("2024-01-01")), 9);
    }
}
