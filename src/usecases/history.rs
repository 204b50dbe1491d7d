//! Historical context for the newsletter prompt.
//!
//! Aggregates the persistence backend's recent spending and dissent rows into
//! a markdown block: repeat vendors, project totals, and per-official dissent
//! patterns. Everything degrades gracefully: a disabled store or empty
//! history yields no block at all, and query failures are logged and treated
//! as empty.

use crate::domain::{DissentFact, DomainError, SpendingFact};
use crate::ports::PersistencePort;
use crate::usecases::consolidation_service::format_usd;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_LOOKBACK_DAYS: i64 = 365;

pub struct HistoryBuilder {
    store: Arc<dyn PersistencePort>,
    lookback_days: i64,
}

struct VendorTotal {
    vendor: String,
    total: f64,
    count: usize,
}

struct ProjectTotal {
    project: String,
    total: f64,
}

struct DissentTotal {
    name: String,
    no_count: usize,
    abstain_count: usize,
    topics: Vec<String>,
}

impl HistoryBuilder {
    pub fn new(store: Arc<dyn PersistencePort>) -> Self {
        Self {
            store,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    /// Build the historical-context markdown block, or `None` when there is
    /// nothing worth saying.
    pub async fn build(&self) -> Result<Option<String>, DomainError> {
        if !self.store.is_enabled() {
            return Ok(None);
        }

        let spending = match self.store.recent_spending(self.lookback_days).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(%err, "spending history query failed, continuing without");
                Vec::new()
            }
        };
        let dissent = match self.store.recent_dissent(self.lookback_days).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(%err, "dissent history query failed, continuing without");
                Vec::new()
            }
        };

        let vendors = vendor_totals(&spending);
        let projects = project_totals(&spending);
        let dissenters = dissent_totals(&dissent);
        if vendors.is_empty() && projects.is_empty() && dissenters.is_empty() {
            return Ok(None);
        }

        let mut out = String::from("## Historical Context (from database)\n");
        if !vendors.is_empty() {
            out.push_str("\n### Repeat Vendors (2+ payments this year)\n");
            for v in &vendors {
                out.push_str(&format!(
                    "- {}: {} across {} payments\n",
                    v.vendor,
                    format_usd(v.total),
                    v.count
                ));
            }
        }
        if !projects.is_empty() {
            out.push_str("\n### Project Spending Totals\n");
            for p in &projects {
                out.push_str(&format!("- {}: {}\n", p.project, format_usd(p.total)));
            }
        }
        if !dissenters.is_empty() {
            out.push_str("\n### Dissent Patterns (non-unanimous votes)\n");
            for d in &dissenters {
                out.push_str(&format!(
                    "- {}: {} no votes, {} abstentions (e.g. {})\n",
                    d.name,
                    d.no_count,
                    d.abstain_count,
                    d.topics.join("; ")
                ));
            }
        }
        Ok(Some(out))
    }
}

/// Vendors with two or more payments in the window, largest total first.
/// Placeholder vendor names carry no signal and are excluded.
fn vendor_totals(spending: &[SpendingFact]) -> Vec<VendorTotal> {
    let mut by_vendor: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for fact in spending {
        let vendor = fact.vendor.trim();
        if vendor.is_empty() || vendor == "N/A" || vendor == "Unknown" {
            continue;
        }
        let entry = by_vendor.entry(vendor).or_insert((0.0, 0));
        entry.0 += fact.amount;
        entry.1 += 1;
    }

    let mut totals: Vec<VendorTotal> = by_vendor
        .into_iter()
        .filter(|(_, (_, count))| *count >= 2)
        .map(|(vendor, (total, count))| VendorTotal {
            vendor: vendor.to_string(),
            total,
            count,
        })
        .collect();
    totals.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
    totals
}

fn project_totals(spending: &[SpendingFact]) -> Vec<ProjectTotal> {
    let mut by_project: BTreeMap<&str, f64> = BTreeMap::new();
    for fact in spending {
        if let Some(project) = fact.project.as_deref() {
            let project = project.trim();
            if !project.is_empty() {
                *by_project.entry(project).or_insert(0.0) += fact.amount;
            }
        }
    }

    let mut totals: Vec<ProjectTotal> = by_project
        .into_iter()
        .map(|(project, total)| ProjectTotal {
            project: project.to_string(),
            total,
        })
        .collect();
    totals.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
    totals
}

/// Per-official dissent counts with up to three example motions.
fn dissent_totals(dissent: &[DissentFact]) -> Vec<DissentTotal> {
    let mut by_name: BTreeMap<&str, DissentTotal> = BTreeMap::new();
    for fact in dissent {
        for name in &fact.no_names {
            let entry = by_name.entry(name.as_str()).or_insert_with(|| DissentTotal {
                name: name.clone(),
                no_count: 0,
                abstain_count: 0,
                topics: Vec::new(),
            });
            entry.no_count += 1;
            if entry.topics.len() < 3 && !fact.motion.is_empty() {
                entry.topics.push(fact.motion.clone());
            }
        }
        for name in &fact.abstain_names {
            let entry = by_name.entry(name.as_str()).or_insert_with(|| DissentTotal {
                name: name.clone(),
                no_count: 0,
                abstain_count: 0,
                topics: Vec::new(),
            });
            entry.abstain_count += 1;
            if entry.topics.len() < 3 && !fact.motion.is_empty() {
                entry.topics.push(fact.motion.clone());
            }
        }
    }

    let mut totals: Vec<DissentTotal> = by_name.into_values().collect();
    totals.sort_by(|a, b| {
        (b.no_count + b.abstain_count).cmp(&(a.no_count + a.abstain_count))
    });
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::DisabledStore;

    fn fact(vendor: &str, amount: f64, project: Option<&str>) -> SpendingFact {
        SpendingFact {
            vendor: vendor.to_string(),
            amount,
            project: project.map(|s| s.to_string()),
        }
    }

    #[test]
    fn singleton_vendors_are_excluded() {
        let spending = vec![
            fact("Acme", 100.0, None),
            fact("Acme", 200.0, None),
            fact("Acme", 300.0, None),
            fact("One Shot LLC", 5000.0, None),
            fact("N/A", 10.0, None),
            fact("N/A", 20.0, None),
        ];
        let totals = vendor_totals(&spending);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].vendor, "Acme");
        assert_eq!(totals[0].total, 600.0);
        assert_eq!(totals[0].count, 3);
    }

    #[test]
    fn project_totals_sorted_descending() {
        let spending = vec![
            fact("A", 100.0, Some("Sewer Lining")),
            fact("B", 900.0, Some("Roof Replacement")),
            fact("C", 50.0, Some("Sewer Lining")),
            fact("D", 10.0, None),
        ];
        let totals = project_totals(&spending);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].project, "Roof Replacement");
        assert_eq!(totals[1].total, 150.0);
    }

    #[test]
    fn dissent_counts_no_and_abstain_separately() {
        let dissent = vec![
            DissentFact {
                motion: "Ordinance 715".to_string(),
                no_names: vec!["Smith".to_string()],
                abstain_names: vec![],
            },
            DissentFact {
                motion: "Budget amendment".to_string(),
                no_names: vec!["Smith".to_string()],
                abstain_names: vec!["Jones".to_string()],
            },
        ];
        let totals = dissent_totals(&dissent);
        assert_eq!(totals[0].name, "Smith");
        assert_eq!(totals[0].no_count, 2);
        assert_eq!(totals[0].abstain_count, 0);
        assert_eq!(totals[0].topics.len(), 2);
        let jones = totals.iter().find(|d| d.name == "Jones").unwrap();
        assert_eq!(jones.abstain_count, 1);
    }

    #[tokio::test]
    async fn disabled_store_yields_no_block() {
        let builder = HistoryBuilder::new(Arc::new(DisabledStore));
        assert!(builder.build().await.unwrap().is_none());
    }
}
