// 🎛️ Control Panel - live state of one page's controls
//
// The panel owns text values, select positions, range pairs and dropdowns.
// `PageSession` pairs it with the card list and re-runs the filter after
// every control event.

use crate::card::Card;
use crate::criteria::{ControlValue, FilterCriteria};
use crate::dropdown::DropdownSet;
use crate::engine::{FilterEngine, FilterReport, IntegrationMode};
use crate::error::FilterError;
use crate::page::{PageConfig, SelectControl, TextControl};
use crate::range::RangeControlPair;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// SAVED SETTINGS
// ============================================================================

/// Control value in a settings file: a string, or `{min, max}` for a range pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Scalar(String),
    Range {
        #[serde(default)]
        min: Option<String>,
        #[serde(default)]
        max: Option<String>,
    },
}

/// Control id → value, as read by `check --settings`
pub type ControlSettings = BTreeMap<String, SettingValue>;

pub fn load_settings<P: AsRef<Path>>(path: P) -> anyhow::Result<ControlSettings> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;

    serde_json::from_str(&content).context("Failed to parse settings JSON")
}

// ============================================================================
// CONTROL PANEL
// ============================================================================

/// One focusable control, in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSlot {
    Text(String),
    Select(String),
    Range(String),
}

impl ControlSlot {
    pub fn id(&self) -> &str {
        match self {
            ControlSlot::Text(id) | ControlSlot::Select(id) | ControlSlot::Range(id) => id,
        }
    }
}

#[derive(Clone)]
pub struct ControlPanel {
    page: String,
    text: Vec<(TextControl, String)>,
    selects: Vec<(SelectControl, usize)>,
    ranges: Vec<RangeControlPair>,
    dropdowns: DropdownSet,
    engine: FilterEngine,
}

impl ControlPanel {
    pub fn new(page: &PageConfig, mode: IntegrationMode) -> Result<Self, FilterError> {
        let mut selects = Vec::with_capacity(page.selects.len());
        for select in &page.selects {
            let index = match &select.initial {
                None => 0,
                Some(initial) => select
                    .options
                    .iter()
                    .position(|o| o == initial)
                    .ok_or_else(|| FilterError::UnknownOption {
                        control: select.id.clone(),
                        value: initial.clone(),
                    })?,
            };
            if select.options.is_empty() {
                return Err(FilterError::UnknownOption {
                    control: select.id.clone(),
                    value: String::new(),
                });
            }
            selects.push((select.clone(), index));
        }

        let ranges = page
            .ranges
            .iter()
            .map(RangeControlPair::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ControlPanel {
            page: page.name.clone(),
            text: page.text.iter().map(|t| (t.clone(), String::new())).collect(),
            selects,
            ranges,
            dropdowns: DropdownSet::new(&page.dropdowns),
            engine: FilterEngine::new(page.predicates.clone(), mode),
        })
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    pub fn dropdowns(&self) -> &DropdownSet {
        &self.dropdowns
    }

    pub fn slots(&self) -> Vec<ControlSlot> {
        self.text
            .iter()
            .map(|(t, _)| ControlSlot::Text(t.id.clone()))
            .chain(self.selects.iter().map(|(s, _)| ControlSlot::Select(s.id.clone())))
            .chain(self.ranges.iter().map(|r| ControlSlot::Range(r.id().to_string())))
            .collect()
    }

    /// Display label of a control
    pub fn label(&self, slot: &ControlSlot) -> Option<&str> {
        match slot {
            ControlSlot::Text(id) => self.text.iter().find(|(t, _)| &t.id == id).map(|(t, _)| t.label.as_str()),
            ControlSlot::Select(id) => self
                .selects
                .iter()
                .find(|(s, _)| &s.id == id)
                .map(|(s, _)| s.label.as_str()),
            ControlSlot::Range(id) => self.range(id).map(RangeControlPair::label),
        }
    }

    /// Snapshot of every control value; built fresh for each pass
    pub fn criteria(&self) -> FilterCriteria {
        let mut criteria = FilterCriteria::new();
        for (control, value) in &self.text {
            criteria.insert(control.id.clone(), ControlValue::Text(value.clone()));
        }
        for (control, index) in &self.selects {
            criteria.insert(control.id.clone(), ControlValue::Select(control.options[*index].clone()));
        }
        for pair in &self.ranges {
            criteria.insert(pair.id(), pair.control_value());
        }
        criteria
    }

    pub fn apply(&self, cards: &mut [Card]) -> Result<FilterReport, FilterError> {
        self.engine.apply(cards, &self.criteria())
    }

    // ---- text ----

    pub fn text_value(&self, id: &str) -> Option<&str> {
        self.text.iter().find(|(t, _)| t.id == id).map(|(_, v)| v.as_str())
    }

    pub fn set_text(&mut self, id: &str, value: impl Into<String>) -> Result<(), FilterError> {
        let page = self.page.clone();
        let (_, current) = self
            .text
            .iter_mut()
            .find(|(t, _)| t.id == id)
            .ok_or_else(|| unknown(&page, id))?;
        *current = value.into();
        Ok(())
    }

    // ---- selects ----

    pub fn select_value(&self, id: &str) -> Option<&str> {
        self.selects
            .iter()
            .find(|(s, _)| s.id == id)
            .map(|(s, i)| s.options[*i].as_str())
    }

    pub fn set_select(&mut self, id: &str, value: &str) -> Result<(), FilterError> {
        let (control, index) = self.select_mut(id)?;
        *index = control
            .options
            .iter()
            .position(|o| o == value)
            .ok_or_else(|| FilterError::UnknownOption {
                control: id.to_string(),
                value: value.to_string(),
            })?;
        Ok(())
    }

    /// Move to the next/previous option, wrapping around
    pub fn cycle_select(&mut self, id: &str, direction: isize) -> Result<(), FilterError> {
        let (control, index) = self.select_mut(id)?;
        let len = control.options.len() as isize;
        *index = (*index as isize + direction).rem_euclid(len) as usize;
        Ok(())
    }

    fn select_mut(&mut self, id: &str) -> Result<(&SelectControl, &mut usize), FilterError> {
        let page = self.page.clone();
        self.selects
            .iter_mut()
            .find(|(s, _)| s.id == id)
            .map(|(s, i)| (&*s, i))
            .ok_or_else(|| unknown(&page, id))
    }

    // ---- ranges ----

    pub fn range(&self, id: &str) -> Option<&RangeControlPair> {
        self.ranges.iter().find(|r| r.id() == id)
    }

    fn range_mut(&mut self, id: &str) -> Result<&mut RangeControlPair, FilterError> {
        let page = self.page.clone();
        self.ranges
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| unknown(&page, id))
    }

    pub fn select_range_min(&mut self, id: &str, value: &str) -> Result<(), FilterError> {
        Ok(self.range_mut(id)?.select_min(value)?)
    }

    pub fn select_range_max(&mut self, id: &str, value: &str) -> Result<(), FilterError> {
        Ok(self.range_mut(id)?.select_max(value)?)
    }

    pub fn step_range_min(&mut self, id: &str, direction: isize) -> Result<bool, FilterError> {
        Ok(self.range_mut(id)?.step_min(direction))
    }

    pub fn step_range_max(&mut self, id: &str, direction: isize) -> Result<bool, FilterError> {
        Ok(self.range_mut(id)?.step_max(direction))
    }

    /// Set both bounds at once. The pair is widened first so the new bounds
    /// are never blocked by the old ones; on error nothing changes.
    pub fn set_range(&mut self, id: &str, min: Option<&str>, max: Option<&str>) -> Result<(), FilterError> {
        let pair = self.range_mut(id)?;
        let mut next = pair.clone();
        if min.is_some() && max.is_some() {
            next.reset();
        }
        if let Some(min) = min {
            next.select_min(min)?;
        }
        if let Some(max) = max {
            next.select_max(max)?;
        }
        *pair = next;
        Ok(())
    }

    // ---- page events ----

    /// Page click; only dropdown state reacts
    pub fn click(&mut self, target: &str) {
        self.dropdowns.click(target);
    }

    /// Back to initial values: empty text, first/initial options, full ranges
    pub fn reset(&mut self) {
        for (_, value) in &mut self.text {
            value.clear();
        }
        for (control, index) in &mut self.selects {
            *index = control
                .initial
                .as_ref()
                .and_then(|initial| control.options.iter().position(|o| o == initial))
                .unwrap_or(0);
        }
        for pair in &mut self.ranges {
            pair.reset();
        }
        self.dropdowns.close_all();
    }

    /// Apply a whole settings map. All or nothing: one bad entry leaves
    /// every control as it was.
    pub fn apply_settings(&mut self, settings: &ControlSettings) -> Result<(), FilterError> {
        let mut next = self.clone();
        next.write_settings(settings)?;
        *self = next;
        Ok(())
    }

    fn write_settings(&mut self, settings: &ControlSettings) -> Result<(), FilterError> {
        for (id, value) in settings {
            let slot = self
                .slots()
                .into_iter()
                .find(|s| s.id() == id)
                .ok_or_else(|| unknown(&self.page, id))?;

            match (slot, value) {
                (ControlSlot::Text(_), SettingValue::Scalar(v)) => self.set_text(id, v.clone())?,
                (ControlSlot::Select(_), SettingValue::Scalar(v)) => self.set_select(id, v)?,
                (ControlSlot::Range(_), SettingValue::Range { min, max }) => {
                    self.set_range(id, min.as_deref(), max.as_deref())?
                }
                (ControlSlot::Range(_), SettingValue::Scalar(_)) => {
                    return Err(FilterError::SettingKind {
                        control: id.clone(),
                        expected: "{min, max}",
                    })
                }
                (_, SettingValue::Range { .. }) => {
                    return Err(FilterError::SettingKind {
                        control: id.clone(),
                        expected: "string",
                    })
                }
            }
        }
        Ok(())
    }
}

fn unknown(page: &str, control: &str) -> FilterError {
    FilterError::UnknownControl {
        page: page.to_string(),
        control: control.to_string(),
    }
}

// ============================================================================
// PAGE SESSION
// ============================================================================

/// A loaded page: controls + cards + the last pass result
pub struct PageSession {
    panel: ControlPanel,
    cards: Vec<Card>,
    report: Option<FilterReport>,
}

impl PageSession {
    pub fn new(panel: ControlPanel, cards: Vec<Card>) -> Self {
        PageSession {
            panel,
            cards,
            report: None,
        }
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn visible_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|c| c.is_visible())
    }

    /// Report of the last successful pass
    pub fn report(&self) -> Option<&FilterReport> {
        self.report.as_ref()
    }

    /// Full pass with a fresh criteria snapshot
    pub fn refilter(&mut self) -> Result<&FilterReport, FilterError> {
        match self.panel.apply(&mut self.cards) {
            Ok(report) => {
                let report: &FilterReport = self.report.insert(report);
                Ok(report)
            }
            Err(e) => {
                self.report = None;
                Err(e)
            }
        }
    }

    pub fn input_text(&mut self, id: &str, value: impl Into<String>) -> Result<&FilterReport, FilterError> {
        self.panel.set_text(id, value)?;
        self.refilter()
    }

    pub fn choose(&mut self, id: &str, value: &str) -> Result<&FilterReport, FilterError> {
        self.panel.set_select(id, value)?;
        self.refilter()
    }

    pub fn cycle_select(&mut self, id: &str, direction: isize) -> Result<&FilterReport, FilterError> {
        self.panel.cycle_select(id, direction)?;
        self.refilter()
    }

    /// Range min change: sync the pair, then filter
    pub fn choose_range_min(&mut self, id: &str, value: &str) -> Result<&FilterReport, FilterError> {
        self.panel.select_range_min(id, value)?;
        self.refilter()
    }

    pub fn choose_range_max(&mut self, id: &str, value: &str) -> Result<&FilterReport, FilterError> {
        self.panel.select_range_max(id, value)?;
        self.refilter()
    }

    pub fn step_range_min(&mut self, id: &str, direction: isize) -> Result<&FilterReport, FilterError> {
        self.panel.step_range_min(id, direction)?;
        self.refilter()
    }

    pub fn step_range_max(&mut self, id: &str, direction: isize) -> Result<&FilterReport, FilterError> {
        self.panel.step_range_max(id, direction)?;
        self.refilter()
    }

    pub fn click(&mut self, target: &str) {
        self.panel.click(target);
    }

    pub fn apply_settings(&mut self, settings: &ControlSettings) -> Result<&FilterReport, FilterError> {
        self.panel.apply_settings(settings)?;
        self.refilter()
    }

    pub fn reset(&mut self) -> Result<&FilterReport, FilterError> {
        self.panel.reset();
        self.refilter()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardKind;
    use crate::dropdown::DropdownState;
    use crate::error::RangeError;
    use crate::page::{builtin_pages, find_page, CompatOptions};

    fn car(rego: &str, make: &str, year: &str, capacity: &str, cost: &str, length: &str) -> Card {
        Card::new(CardKind::Car)
            .with_field("rego", rego)
            .with_field("make", make)
            .with_field("year", year)
            .with_field("colour", "White")
            .with_field("transmission", "Auto")
            .with_field("capacity", capacity)
            .with_field("cost", cost)
            .with_field("load_index", "90")
            .with_field("clearance", "150")
            .with_field("weight", "1500")
            .with_field("length", length)
            .with_field("engine_capacity", "2000")
    }

    fn fleet() -> Vec<Card> {
        vec![
            car("AAA111", "Toyota Corolla", "2019", "5", "20", "4.63"),
            car("BBB222", "Honda Jazz", "2017", "5", "10", "4.0"),
            car("CCC333", "Toyota HiAce", "2020", "12", "50", "5.38"),
        ]
    }

    fn session() -> PageSession {
        let pages = builtin_pages(&CompatOptions::default());
        let page = find_page(&pages, "cars").unwrap();
        let panel = ControlPanel::new(page, IntegrationMode::Development).unwrap();
        PageSession::new(panel, fleet())
    }

    fn visible(session: &PageSession) -> Vec<&str> {
        session
            .visible_cards()
            .map(|c| c.field("rego").unwrap())
            .collect()
    }

    #[test]
    fn test_initial_pass_shows_everything() {
        let mut session = session();
        let report = session.refilter().unwrap();

        assert_eq!(report.visible, 3);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_text_and_select_events_refilter() {
        let mut session = session();

        session.input_text("search-box", "toyota").unwrap();
        assert_eq!(visible(&session), vec!["AAA111", "CCC333"]);

        session.choose("year-filter", "2020").unwrap();
        assert_eq!(visible(&session), vec!["CCC333"]);

        session.choose("year-filter", "All").unwrap();
        session.input_text("search-box", "").unwrap();
        assert_eq!(visible(&session).len(), 3);
    }

    #[test]
    fn test_range_event_syncs_then_filters() {
        let mut session = session();

        let report = session.choose_range_max("capacity", "8").unwrap();
        assert_eq!(report.visible, 2);

        let pair = session.panel().range("capacity").unwrap();
        assert!(!pair.min().is_enabled("12"));
        assert_eq!(pair.max().label(), "8");
    }

    #[test]
    fn test_float_range_on_length() {
        let mut session = session();

        session.choose_range_max("length", "4.75").unwrap();
        session.choose_range_min("length", "4.5").unwrap();

        assert_eq!(visible(&session), vec!["AAA111"]);
    }

    #[test]
    fn test_disabled_option_rejected_without_refilter() {
        let mut session = session();
        session.choose_range_max("cost", "30").unwrap();

        let err = session.choose_range_min("cost", "50").unwrap_err();
        assert!(matches!(err, FilterError::Range(RangeError::OptionDisabled { .. })));
        assert_eq!(session.panel().range("cost").unwrap().min().selected_value(), "0");
    }

    #[test]
    fn test_unknown_control_and_option() {
        let mut session = session();

        assert!(matches!(
            session.input_text("nope", "x"),
            Err(FilterError::UnknownControl { .. })
        ));
        assert!(matches!(
            session.choose("colour-filter", "Purple"),
            Err(FilterError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_cycle_select_wraps() {
        let mut session = session();

        session.cycle_select("transmission-filter", -1).unwrap();
        assert_eq!(session.panel().select_value("transmission-filter"), Some("Manual"));
        assert!(visible(&session).is_empty());

        session.cycle_select("transmission-filter", 1).unwrap();
        assert_eq!(session.panel().select_value("transmission-filter"), Some("All"));
    }

    #[test]
    fn test_dropdown_clicks() {
        let mut session = session();

        session.click("capacity-dropbtn");
        assert_eq!(
            session.panel().dropdowns().state("select-capacity-container"),
            Some(DropdownState::Open)
        );

        session.click("search-box");
        assert_eq!(session.panel().dropdowns().open().count(), 0);
    }

    #[test]
    fn test_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"search-box": "toy", "cost": {"min": "20", "max": "50"}, "colour-filter": "White"}"#,
        )
        .unwrap();

        let mut session = session();
        let settings = load_settings(&path).unwrap();
        session.apply_settings(&settings).unwrap();

        assert_eq!(visible(&session), vec!["AAA111", "CCC333"]);
        let cost = session.panel().range("cost").unwrap();
        assert_eq!(cost.min().selected_value(), "20");
        assert_eq!(cost.max().selected_value(), "50");
    }

    #[test]
    fn test_settings_kind_mismatch() {
        let mut session = session();
        let mut settings = ControlSettings::new();
        settings.insert("cost".to_string(), SettingValue::Scalar("20".to_string()));

        assert!(matches!(
            session.apply_settings(&settings),
            Err(FilterError::SettingKind { .. })
        ));
    }

    #[test]
    fn test_failed_settings_leave_controls_unchanged() {
        let mut session = session();
        let mut settings = ControlSettings::new();
        settings.insert("search-box".to_string(), SettingValue::Scalar("toyota".to_string()));
        settings.insert(
            "cost".to_string(),
            SettingValue::Range {
                min: Some("20".to_string()),
                max: Some("50".to_string()),
            },
        );
        settings.insert("colour-filter".to_string(), SettingValue::Scalar("White".to_string()));
        // Applied last in key order, after the valid entries
        settings.insert("transmission-filter".to_string(), SettingValue::Scalar("Hover".to_string()));

        assert!(matches!(
            session.apply_settings(&settings),
            Err(FilterError::UnknownOption { .. })
        ));

        let panel = session.panel();
        assert_eq!(panel.text_value("search-box"), Some(""));
        assert_eq!(panel.select_value("colour-filter"), Some("All"));
        let cost = panel.range("cost").unwrap();
        assert_eq!(cost.min().selected_value(), "0");
        assert!(session.report().is_none());
        assert_eq!(visible(&session), vec!["AAA111", "BBB222", "CCC333"]);
    }

    #[test]
    fn test_set_range_moves_past_old_bounds() {
        let mut session = session();
        session.choose_range_max("weight", "1250").unwrap();

        let mut settings = ControlSettings::new();
        settings.insert(
            "weight".to_string(),
            SettingValue::Range {
                min: Some("2000".to_string()),
                max: Some("3000".to_string()),
            },
        );
        session.apply_settings(&settings).unwrap();

        let weight = session.panel().range("weight").unwrap();
        assert_eq!(weight.min().selected_value(), "2000");
        assert_eq!(weight.max().selected_value(), "3000");
    }

    #[test]
    fn test_missing_field_fails_in_development() {
        let pages = builtin_pages(&CompatOptions::default());
        let page = find_page(&pages, "cars").unwrap();
        let cards = vec![Card::new(CardKind::Car).with_field("rego", "ZZZ999").with_field("make", "Kia")];

        let mut dev = PageSession::new(ControlPanel::new(page, IntegrationMode::Development).unwrap(), cards.clone());
        assert!(matches!(dev.choose("colour-filter", "Red"), Err(FilterError::Integration { .. })));
        assert!(dev.report().is_none());

        let mut prod = PageSession::new(ControlPanel::new(page, IntegrationMode::Production).unwrap(), cards);
        let report = prod.choose("colour-filter", "Red").unwrap();
        assert_eq!(report.hidden, 1);
        assert!(report.has_critical_issues());
    }

    #[test]
    fn test_reset_restores_everything() {
        let mut session = session();
        session.input_text("search-box", "honda").unwrap();
        session.choose_range_min("capacity", "7").unwrap();
        session.click("cost-dropbtn");

        session.reset().unwrap();

        assert_eq!(visible(&session).len(), 3);
        assert_eq!(session.panel().text_value("search-box"), Some(""));
        assert_eq!(session.panel().dropdowns().open().count(), 0);
    }
}
