use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{ApplicationRecord, ApplicationStatus};

/// Summary counts and rates over a set of applications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    /// Only statuses present in the input appear here.
    pub by_status: BTreeMap<ApplicationStatus, usize>,
    /// Percentage (0-100) of applications that got any response.
    pub response_rate: f64,
    /// Percentage (0-100) of applications that reached an offer.
    pub offer_rate: f64,
}

impl Stats {
    pub fn count(&self, status: ApplicationStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

pub fn compute_stats(records: &[ApplicationRecord]) -> Stats {
    let total = records.len();

    let mut by_status: BTreeMap<ApplicationStatus, usize> = BTreeMap::new();
    for record in records {
        *by_status.entry(record.status).or_insert(0) += 1;
    }

    let responses = records.iter().filter(|r| r.status.is_response()).count();
    let offers = by_status.get(&ApplicationStatus::Offer).copied().unwrap_or(0);

    let (response_rate, offer_rate) = if total > 0 {
        (
            responses as f64 / total as f64 * 100.0,
            offers as f64 / total as f64 * 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    Stats {
        total,
        by_status,
        response_rate,
        offer_rate,
    }
}
