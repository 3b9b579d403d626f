// 🏷️ Field Predicates - filtering rules as data
// Each page is a table of {id, control, match kind}; the engine never changes per page.

use crate::card::Card;
use crate::criteria::ControlValue;
use crate::error::FilterError;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// NUMERIC PARSING
// ============================================================================

/// How a numeric field or control value is parsed. Chosen per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    /// Integer literal, or a finite decimal truncated toward zero
    Integer,
    /// Any finite decimal
    Float,
}

impl NumericKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericKind::Integer => "integer",
            NumericKind::Float => "float",
        }
    }

    /// Parse a raw value. `None` means "not a number" and never matches.
    pub fn parse(&self, raw: &str) -> Option<f64> {
        let raw = raw.trim();
        match self {
            NumericKind::Integer => match raw.parse::<i64>() {
                Ok(v) => Some(v as f64),
                Err(_) => raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(f64::trunc),
            },
            NumericKind::Float => raw.parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// Keep cards whose value is >= the threshold
    AtLeast,
    /// Keep cards whose value is <= the threshold
    AtMost,
}

// ============================================================================
// MATCH KINDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum MatchKind {
    /// Case-insensitive substring over any of several fields; empty search matches all
    TextSearch { fields: Vec<String> },

    /// Field equals the selected option
    Exact {
        field: String,
        #[serde(default)]
        case_insensitive: bool,
    },

    /// Field contains the selected option (make/year dropdowns)
    Contains { field: String },

    /// Single-bound numeric filter
    Threshold {
        field: String,
        numeric: NumericKind,
        bound: Bound,
    },

    /// Inclusive min/max, bounds come from a range control pair
    Range { field: String, numeric: NumericKind },

    /// Parsed field equals parsed selection (model picker)
    NumericEquals { field: String, numeric: NumericKind },
}

impl MatchKind {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            MatchKind::TextSearch { fields } => fields.iter().map(String::as_str).collect(),
            MatchKind::Exact { field, .. }
            | MatchKind::Contains { field }
            | MatchKind::Threshold { field, .. }
            | MatchKind::Range { field, .. }
            | MatchKind::NumericEquals { field, .. } => vec![field.as_str()],
        }
    }

    fn expects(&self) -> &'static str {
        match self {
            MatchKind::Range { .. } => "range",
            _ => "text or select",
        }
    }
}

// ============================================================================
// PREDICATE
// ============================================================================

/// Outcome of one predicate against one card
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Fail,
    /// The card's field is not a number; treated as a failure
    BadField(String),
    /// The control value is not a number; no card can match
    BadControl(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    fn from_bool(ok: bool) -> Self {
        if ok {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    /// Predicate ID for issue reports
    pub id: String,

    /// Control whose value drives this predicate
    pub control: String,

    #[serde(flatten)]
    pub kind: MatchKind,

    /// Selection meaning "no constraint" (compared case-insensitively)
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_sentinel() -> String {
    "All".to_string()
}

impl FieldPredicate {
    pub fn new(id: impl Into<String>, control: impl Into<String>, kind: MatchKind) -> Self {
        FieldPredicate {
            id: id.into(),
            control: control.into(),
            kind,
            sentinel: default_sentinel(),
            description: None,
        }
    }

    pub fn text_search(id: &str, control: &str, fields: &[&str]) -> Self {
        Self::new(
            id,
            control,
            MatchKind::TextSearch {
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
        )
    }

    pub fn exact(id: &str, control: &str, field: &str, case_insensitive: bool) -> Self {
        Self::new(
            id,
            control,
            MatchKind::Exact {
                field: field.to_string(),
                case_insensitive,
            },
        )
    }

    pub fn contains(id: &str, control: &str, field: &str) -> Self {
        Self::new(id, control, MatchKind::Contains { field: field.to_string() })
    }

    pub fn threshold(id: &str, control: &str, field: &str, numeric: NumericKind, bound: Bound) -> Self {
        Self::new(
            id,
            control,
            MatchKind::Threshold {
                field: field.to_string(),
                numeric,
                bound,
            },
        )
    }

    pub fn range(id: &str, control: &str, field: &str, numeric: NumericKind) -> Self {
        Self::new(
            id,
            control,
            MatchKind::Range {
                field: field.to_string(),
                numeric,
            },
        )
    }

    pub fn numeric_equals(id: &str, control: &str, field: &str, numeric: NumericKind) -> Self {
        Self::new(
            id,
            control,
            MatchKind::NumericEquals {
                field: field.to_string(),
                numeric,
            },
        )
    }

    /// Builder: add description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// True when the control value imposes no constraint
    pub fn is_inactive(&self, value: &ControlValue) -> bool {
        match (&self.kind, value) {
            (_, ControlValue::Range { .. }) => false,
            (MatchKind::TextSearch { .. }, v) => v.as_scalar().map_or(false, str::is_empty),
            (MatchKind::NumericEquals { .. }, v) => v
                .as_scalar()
                .map_or(false, |s| s.trim().is_empty() || s.eq_ignore_ascii_case(&self.sentinel)),
            (_, v) => v
                .as_scalar()
                .map_or(false, |s| s.eq_ignore_ascii_case(&self.sentinel)),
        }
    }

    /// Check the control value once per pass, before any card is read.
    /// `Err` is a configuration defect, `Ok(Some(_))` an unparsable bound.
    pub fn check_control(&self, value: &ControlValue) -> Result<Option<String>, FilterError> {
        if self.is_inactive(value) {
            return Ok(None);
        }
        match (&self.kind, value) {
            (MatchKind::Range { numeric, .. }, ControlValue::Range { min, max }) => {
                if numeric.parse(min).is_some() && numeric.parse(max).is_some() {
                    Ok(None)
                } else {
                    Ok(Some(format!(
                        "control '{}' bounds '{}'..'{}' are not {} values",
                        self.control,
                        min,
                        max,
                        numeric.as_str()
                    )))
                }
            }
            (MatchKind::Range { .. }, _) | (_, ControlValue::Range { .. }) => {
                Err(FilterError::ControlKind {
                    control: self.control.clone(),
                    predicate: self.id.clone(),
                    expected: self.kind.expects(),
                    found: value.kind_name(),
                })
            }
            (MatchKind::Threshold { numeric, .. }, v) | (MatchKind::NumericEquals { numeric, .. }, v) => {
                let selected = v.as_scalar().unwrap_or_default();
                if numeric.parse(selected).is_some() {
                    Ok(None)
                } else {
                    Ok(Some(format!(
                        "control '{}' = '{}' is not a {} value",
                        self.control,
                        selected,
                        numeric.as_str()
                    )))
                }
            }
            _ => Ok(None),
        }
    }

    /// Evaluate against one card. Errors are integration defects (missing
    /// field, wrong control kind); parse failures come back as verdicts.
    pub fn evaluate(&self, card: &Card, value: &ControlValue) -> Result<Verdict, FilterError> {
        if self.is_inactive(value) {
            return Ok(Verdict::Pass);
        }

        match (&self.kind, value) {
            (MatchKind::Range { field, numeric }, ControlValue::Range { min, max }) => {
                let raw = card.require(field)?;
                let (lo, hi) = match (numeric.parse(min), numeric.parse(max)) {
                    (Some(lo), Some(hi)) => (lo, hi),
                    _ => {
                        return Ok(Verdict::BadControl(format!(
                            "control '{}' bounds '{}'..'{}'",
                            self.control, min, max
                        )))
                    }
                };
                match numeric.parse(raw) {
                    Some(v) => Ok(Verdict::from_bool(lo <= v && v <= hi)),
                    None => Ok(Verdict::BadField(format!("field '{}' = '{}'", field, raw))),
                }
            }
            (MatchKind::Range { .. }, _) | (_, ControlValue::Range { .. }) => {
                Err(FilterError::ControlKind {
                    control: self.control.clone(),
                    predicate: self.id.clone(),
                    expected: self.kind.expects(),
                    found: value.kind_name(),
                })
            }
            (kind, value) => {
                // Range values were handled above, so this is a scalar
                let selected = value.as_scalar().unwrap_or_default();
                self.evaluate_scalar(kind, card, selected)
            }
        }
    }

    fn evaluate_scalar(&self, kind: &MatchKind, card: &Card, selected: &str) -> Result<Verdict, FilterError> {
        match kind {
            MatchKind::TextSearch { fields } => {
                let needle = selected.to_lowercase();
                let mut found = false;
                for field in fields {
                    // Every field is read so a missing one is always reported
                    let raw = card.require(field)?;
                    if raw.to_lowercase().contains(&needle) {
                        found = true;
                    }
                }
                Ok(Verdict::from_bool(found))
            }
            MatchKind::Exact { field, case_insensitive } => {
                let raw = card.require(field)?;
                let equal = if *case_insensitive {
                    raw.to_lowercase() == selected.to_lowercase()
                } else {
                    raw == selected
                };
                Ok(Verdict::from_bool(equal))
            }
            MatchKind::Contains { field } => {
                let raw = card.require(field)?;
                Ok(Verdict::from_bool(raw.contains(selected)))
            }
            MatchKind::Threshold { field, numeric, bound } => {
                let raw = card.require(field)?;
                let Some(limit) = numeric.parse(selected) else {
                    return Ok(Verdict::BadControl(format!(
                        "control '{}' = '{}'",
                        self.control, selected
                    )));
                };
                let Some(v) = numeric.parse(raw) else {
                    return Ok(Verdict::BadField(format!("field '{}' = '{}'", field, raw)));
                };
                Ok(Verdict::from_bool(match bound {
                    Bound::AtLeast => v >= limit,
                    Bound::AtMost => v <= limit,
                }))
            }
            MatchKind::NumericEquals { field, numeric } => {
                let raw = card.require(field)?;
                let Some(wanted) = numeric.parse(selected) else {
                    return Ok(Verdict::BadControl(format!(
                        "control '{}' = '{}'",
                        self.control, selected
                    )));
                };
                match numeric.parse(raw) {
                    Some(v) => Ok(Verdict::from_bool(v == wanted)),
                    None => Ok(Verdict::BadField(format!("field '{}' = '{}'", field, raw))),
                }
            }
            MatchKind::Range { .. } => unreachable!("range predicates are evaluated before scalars"),
        }
    }
}

// ============================================================================
// PREDICATE TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateTable {
    predicates: Vec<FieldPredicate>,
}

impl PredicateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a predicate table from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read predicate file: {:?}", path.as_ref()))?;

        let predicates: Vec<FieldPredicate> =
            serde_json::from_str(&content).context("Failed to parse predicate JSON")?;

        Ok(PredicateTable::from_predicates(predicates))
    }

    pub fn from_predicates(predicates: Vec<FieldPredicate>) -> Self {
        PredicateTable { predicates }
    }

    pub fn add(&mut self, predicate: FieldPredicate) {
        self.predicates.push(predicate);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPredicate> {
        self.predicates.iter()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Every control id the table reads
    pub fn controls(&self) -> Vec<&str> {
        let mut controls: Vec<&str> = self.predicates.iter().map(|p| p.control.as_str()).collect();
        controls.sort_unstable();
        controls.dedup();
        controls
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardKind;

    fn toyota() -> Card {
        Card::new(CardKind::Car)
            .with_field("rego", "ABC123")
            .with_field("make", "Toyota Corolla")
            .with_field("colour", "Red")
            .with_field("status", "Completed")
            .with_field("capacity", "5")
            .with_field("cost", "25000")
            .with_field("length", "4.63")
    }

    fn text(s: &str) -> ControlValue {
        ControlValue::Text(s.to_string())
    }

    fn select(s: &str) -> ControlValue {
        ControlValue::Select(s.to_string())
    }

    fn range(min: &str, max: &str) -> ControlValue {
        ControlValue::Range {
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    #[test]
    fn test_integer_parsing() {
        assert_eq!(NumericKind::Integer.parse("5"), Some(5.0));
        assert_eq!(NumericKind::Integer.parse(" 42 "), Some(42.0));
        assert_eq!(NumericKind::Integer.parse("25000.75"), Some(25000.0));
        assert_eq!(NumericKind::Integer.parse("-3.9"), Some(-3.0));
        assert_eq!(NumericKind::Integer.parse("abc"), None);
        assert_eq!(NumericKind::Integer.parse(""), None);
        assert_eq!(NumericKind::Integer.parse("NaN"), None);
    }

    #[test]
    fn test_float_parsing() {
        assert_eq!(NumericKind::Float.parse("4.63"), Some(4.63));
        assert_eq!(NumericKind::Float.parse("inf"), None);
        assert_eq!(NumericKind::Float.parse("4.6m"), None);
    }

    #[test]
    fn test_text_search_any_field_case_insensitive() {
        let p = FieldPredicate::text_search("search", "search-box", &["make", "rego"]);
        let card = toyota();

        assert_eq!(p.evaluate(&card, &text("toy")).unwrap(), Verdict::Pass);
        assert_eq!(p.evaluate(&card, &text("abc1")).unwrap(), Verdict::Pass);
        assert_eq!(p.evaluate(&card, &text("honda")).unwrap(), Verdict::Fail);
        assert_eq!(p.evaluate(&card, &text("")).unwrap(), Verdict::Pass);
    }

    #[test]
    fn test_text_search_all_is_not_a_sentinel() {
        let p = FieldPredicate::text_search("search", "search-box", &["make"]);
        assert_eq!(p.evaluate(&toyota(), &text("all")).unwrap(), Verdict::Fail);
    }

    #[test]
    fn test_exact_respects_case_setting() {
        let colour = FieldPredicate::exact("colour", "colour-filter", "colour", false);
        let status = FieldPredicate::exact("status", "status-filter", "status", true);
        let card = toyota();

        assert!(colour.evaluate(&card, &select("Red")).unwrap().passed());
        assert!(!colour.evaluate(&card, &select("red")).unwrap().passed());
        assert!(status.evaluate(&card, &select("COMPLETED")).unwrap().passed());
        assert!(status.evaluate(&card, &select("all")).unwrap().passed());
    }

    #[test]
    fn test_contains_is_substring() {
        let make = FieldPredicate::contains("make", "make-filter", "make");
        let card = toyota();

        assert!(make.evaluate(&card, &select("Toyota")).unwrap().passed());
        assert!(!make.evaluate(&card, &select("Honda")).unwrap().passed());
        assert!(make.evaluate(&card, &select("All")).unwrap().passed());
    }

    #[test]
    fn test_threshold_bounds() {
        let at_least = FieldPredicate::threshold("cap", "capacity-filter", "capacity", NumericKind::Integer, Bound::AtLeast);
        let at_most = FieldPredicate::threshold("cost", "cost-filter", "cost", NumericKind::Integer, Bound::AtMost);
        let card = toyota();

        assert!(at_least.evaluate(&card, &select("5")).unwrap().passed());
        assert!(!at_least.evaluate(&card, &select("7")).unwrap().passed());
        assert!(at_most.evaluate(&card, &select("30000")).unwrap().passed());
        assert!(!at_most.evaluate(&card, &select("20000")).unwrap().passed());
    }

    #[test]
    fn test_range_inclusive_and_float() {
        let cost = FieldPredicate::range("cost", "cost", "cost", NumericKind::Integer);
        let length = FieldPredicate::range("length", "length", "length", NumericKind::Float);
        let card = toyota();

        assert!(cost.evaluate(&card, &range("25000", "25000")).unwrap().passed());
        assert!(!cost.evaluate(&card, &range("25001", "30000")).unwrap().passed());
        assert!(length.evaluate(&card, &range("4.5", "4.63")).unwrap().passed());
        // Integer parsing would truncate 4.7 to 4 and exclude the card
        assert!(!FieldPredicate::range("length", "length", "length", NumericKind::Integer)
            .evaluate(&card, &range("4.7", "5"))
            .unwrap()
            .passed());
        assert!(length.evaluate(&card, &range("4.0", "4.7")).unwrap().passed());
    }

    #[test]
    fn test_unparsable_values_fail() {
        let cost = FieldPredicate::range("cost", "cost", "cost", NumericKind::Integer);
        let card = toyota().with_field("cost", "call us");

        match cost.evaluate(&card, &range("0", "30000")).unwrap() {
            Verdict::BadField(msg) => assert!(msg.contains("call us")),
            other => panic!("expected BadField, got {:?}", other),
        }
        assert!(matches!(
            cost.evaluate(&toyota(), &range("x", "30000")).unwrap(),
            Verdict::BadControl(_)
        ));
    }

    #[test]
    fn test_numeric_equals_model_picker() {
        let p = FieldPredicate::numeric_equals("model", "model_id", "model_id", NumericKind::Integer);
        let card = Card::new(CardKind::Model).with_field("model_id", "12");

        assert!(p.evaluate(&card, &select("12")).unwrap().passed());
        assert!(!p.evaluate(&card, &select("13")).unwrap().passed());
        assert!(p.evaluate(&card, &select("")).unwrap().passed());
    }

    #[test]
    fn test_missing_field_is_error() {
        let p = FieldPredicate::exact("transmission", "transmission-filter", "transmission", false);
        assert!(matches!(
            p.evaluate(&toyota(), &select("Auto")),
            Err(FilterError::MissingField { .. })
        ));
        // Inactive predicates never read the card
        assert!(p.evaluate(&toyota(), &select("All")).unwrap().passed());
    }

    #[test]
    fn test_control_kind_mismatch() {
        let cost = FieldPredicate::range("cost", "cost", "cost", NumericKind::Integer);
        assert!(matches!(
            cost.evaluate(&toyota(), &select("5")),
            Err(FilterError::ControlKind { found: "select", .. })
        ));
    }

    #[test]
    fn test_table_from_json() {
        let json = r#"[
            {"id": "search", "control": "search-box", "match": "text_search", "fields": ["make"]},
            {"id": "colour", "control": "colour-filter", "match": "exact", "field": "colour"},
            {"id": "cost", "control": "cost", "match": "range", "field": "cost", "numeric": "integer"}
        ]"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predicates.json");
        fs::write(&path, json).unwrap();

        let table = PredicateTable::from_file(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.controls(), vec!["colour-filter", "cost", "search-box"]);

        let colour = table.iter().nth(1).unwrap();
        assert_eq!(colour.sentinel, "All");
        assert_eq!(
            colour.kind,
            MatchKind::Exact {
                field: "colour".to_string(),
                case_insensitive: false
            }
        );
    }
}
