// ✅ Filter Engine - one pass over every card, one boolean per card
//
// visible = AND of every active predicate. A defect in one card's data is
// reported and excludes that card only; the pass always covers all cards.

use crate::card::Card;
use crate::criteria::{ControlValue, FilterCriteria};
use crate::error::FilterError;
use crate::predicate::{FieldPredicate, PredicateTable, Verdict};
use serde::{Deserialize, Serialize};

// ============================================================================
// ISSUES & REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Page and data disagree (missing field, missing control)
    Warning,  // Value could not be parsed, card or predicate excluded
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterIssue {
    pub severity: Severity,
    /// Title of the affected card; `None` for predicate-level issues
    pub card: Option<String>,
    pub predicate: String,
    pub message: String,
}

impl std::fmt::Display for FilterIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.card {
            Some(card) => write!(f, "[{:?}] {} ({}): {}", self.severity, card, self.predicate, self.message),
            None => write!(f, "[{:?}] {}: {}", self.severity, self.predicate, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterReport {
    pub total: usize,
    pub visible: usize,
    pub hidden: usize,
    pub issues: Vec<FilterIssue>,
}

impl FilterReport {
    pub fn summary(&self) -> String {
        format!(
            "{} of {} visible, {} hidden, {} issue(s) ({} critical)",
            self.visible,
            self.total,
            self.hidden,
            self.issues.len(),
            self.critical_count()
        )
    }

    pub fn critical_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .count()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.critical_count() > 0
    }
}

/// What to do with integration defects (data/page mismatches).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMode {
    /// Finish the pass, then return `FilterError::Integration`
    Development,
    /// Exclude the affected cards, log, and carry on
    #[default]
    Production,
}

// ============================================================================
// FILTER ENGINE
// ============================================================================

#[derive(Clone)]
pub struct FilterEngine {
    table: PredicateTable,
    mode: IntegrationMode,
}

/// Predicates that survived the per-pass control check
struct ResolvedPass<'a> {
    active: Vec<(&'a FieldPredicate, &'a ControlValue)>,
    issues: Vec<FilterIssue>,
}

impl FilterEngine {
    pub fn new(table: PredicateTable, mode: IntegrationMode) -> Self {
        FilterEngine { table, mode }
    }

    pub fn table(&self) -> &PredicateTable {
        &self.table
    }

    pub fn mode(&self) -> IntegrationMode {
        self.mode
    }

    /// Visibility of one card; a pure function of (card, criteria).
    pub fn is_visible(&self, card: &Card, criteria: &FilterCriteria) -> bool {
        let pass = self.resolve(criteria);
        let mut issues = Vec::new();
        Self::evaluate_card(&pass.active, card, &mut issues)
    }

    /// Run one filter pass and set every card's visibility.
    pub fn apply(&self, cards: &mut [Card], criteria: &FilterCriteria) -> Result<FilterReport, FilterError> {
        let pass = self.resolve(criteria);
        let mut report = FilterReport {
            total: cards.len(),
            issues: pass.issues,
            ..FilterReport::default()
        };

        for card in cards.iter_mut() {
            let visible = Self::evaluate_card(&pass.active, card, &mut report.issues);
            card.set_visible(visible);
            if visible {
                report.visible += 1;
            } else {
                report.hidden += 1;
            }
        }

        for issue in report.issues.iter().filter(|i| i.severity == Severity::Critical) {
            log::warn!("filter integration issue: {}", issue);
        }
        log::debug!("filter pass: {}", report.summary());

        if self.mode == IntegrationMode::Development {
            if let Some(first) = report.issues.iter().find(|i| i.severity == Severity::Critical) {
                return Err(FilterError::Integration {
                    count: report.critical_count(),
                    first: first.to_string(),
                });
            }
        }

        Ok(report)
    }

    /// Match each predicate with its control value and validate the value once.
    fn resolve<'a>(&'a self, criteria: &'a FilterCriteria) -> ResolvedPass<'a> {
        let mut pass = ResolvedPass {
            active: Vec::with_capacity(self.table.len()),
            issues: Vec::new(),
        };

        for predicate in self.table.iter() {
            let Some(value) = criteria.get(&predicate.control) else {
                let err = FilterError::MissingControl {
                    control: predicate.control.clone(),
                    predicate: predicate.id.clone(),
                };
                pass.issues.push(FilterIssue {
                    severity: Severity::Critical,
                    card: None,
                    predicate: predicate.id.clone(),
                    message: err.to_string(),
                });
                continue;
            };

            match predicate.check_control(value) {
                Ok(None) => pass.active.push((predicate, value)),
                Ok(Some(problem)) => {
                    // Kept active: every card will fail it
                    pass.issues.push(FilterIssue {
                        severity: Severity::Warning,
                        card: None,
                        predicate: predicate.id.clone(),
                        message: problem,
                    });
                    pass.active.push((predicate, value));
                }
                Err(err) => pass.issues.push(FilterIssue {
                    severity: Severity::Critical,
                    card: None,
                    predicate: predicate.id.clone(),
                    message: err.to_string(),
                }),
            }
        }

        pass
    }

    fn evaluate_card(
        active: &[(&FieldPredicate, &ControlValue)],
        card: &Card,
        issues: &mut Vec<FilterIssue>,
    ) -> bool {
        let mut visible = true;

        for (predicate, value) in active {
            match predicate.evaluate(card, value) {
                Ok(Verdict::Pass) => {}
                Ok(Verdict::Fail) | Ok(Verdict::BadControl(_)) => visible = false,
                Ok(Verdict::BadField(detail)) => {
                    visible = false;
                    issues.push(FilterIssue {
                        severity: Severity::Warning,
                        card: Some(card.title()),
                        predicate: predicate.id.clone(),
                        message: format!("{} is not a number", detail),
                    });
                }
                Err(err) => {
                    visible = false;
                    issues.push(FilterIssue {
                        severity: Severity::Critical,
                        card: Some(card.title()),
                        predicate: predicate.id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        visible
    }
}

// ============================================================================
// TESTS
// ============================================================================
