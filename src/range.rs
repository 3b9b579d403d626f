// Range Sync - paired min/max selectors that can never invert
//
// After every sync: min options above the current max are disabled, max
// options below the current min are disabled.

use crate::criteria::ControlValue;
use crate::error::RangeError;
use crate::predicate::NumericKind;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Declarative description of one range pair on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    /// Pair id; also the criteria key the range predicate reads
    pub id: String,

    /// Display name (e.g. "Capacity")
    pub label: String,

    pub numeric: NumericKind,

    pub min_control: String,
    pub max_control: String,
    pub min_label: String,
    pub max_label: String,

    /// Ordered option values shared by both selectors
    pub options: Vec<String>,

    /// Defaults to the first option
    #[serde(default)]
    pub initial_min: Option<String>,

    /// Defaults to the last option
    #[serde(default)]
    pub initial_max: Option<String>,
}

// ============================================================================
// SELECTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeOption {
    pub value: String,
    pub disabled: bool,
}

#[derive(Debug, Clone)]
pub struct RangeSelector {
    pub control: String,
    pub label_id: String,
    options: Vec<RangeOption>,
    parsed: Vec<f64>,
    selected: usize,
    label: String,
}

impl RangeSelector {
    fn new(control: &str, label_id: &str, options: &[String], parsed: &[f64], selected: usize) -> Self {
        RangeSelector {
            control: control.to_string(),
            label_id: label_id.to_string(),
            options: options
                .iter()
                .map(|value| RangeOption {
                    value: value.clone(),
                    disabled: false,
                })
                .collect(),
            parsed: parsed.to_vec(),
            selected,
            label: options[selected].clone(),
        }
    }

    pub fn options(&self) -> &[RangeOption] {
        &self.options
    }

    pub fn selected_value(&self) -> &str {
        &self.options[self.selected].value
    }

    fn selected_number(&self) -> f64 {
        self.parsed[self.selected]
    }

    /// Text of the display label next to the selector
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_enabled(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value && !o.disabled)
    }

    fn index_of(&self, value: &str) -> Option<usize> {
        self.options.iter().position(|o| o.value == value)
    }

    fn disable_where(&mut self, predicate: impl Fn(f64) -> bool) {
        for (option, number) in self.options.iter_mut().zip(&self.parsed) {
            option.disabled = predicate(*number);
        }
    }
}

// ============================================================================
// RANGE CONTROL PAIR
// ============================================================================

#[derive(Debug, Clone)]
pub struct RangeControlPair {
    id: String,
    label: String,
    numeric: NumericKind,
    min: RangeSelector,
    max: RangeSelector,
}

impl RangeControlPair {
    /// Build and sync a pair. Every option must parse under the pair's
    /// numeric kind and the initial selection must not be inverted.
    pub fn new(config: &RangeConfig) -> Result<Self, RangeError> {
        if config.options.is_empty() {
            return Err(RangeError::Empty {
                pair: config.id.clone(),
            });
        }

        let mut parsed = Vec::with_capacity(config.options.len());
        for value in &config.options {
            let number = config.numeric.parse(value).ok_or_else(|| RangeError::InvalidOption {
                pair: config.id.clone(),
                value: value.clone(),
                kind: config.numeric.as_str(),
            })?;
            parsed.push(number);
        }

        let find = |wanted: &Option<String>, default: usize| -> Result<usize, RangeError> {
            match wanted {
                None => Ok(default),
                Some(value) => config
                    .options
                    .iter()
                    .position(|o| o == value)
                    .ok_or_else(|| RangeError::UnknownOption {
                        pair: config.id.clone(),
                        value: value.clone(),
                    }),
            }
        };
        let min_index = find(&config.initial_min, 0)?;
        let max_index = find(&config.initial_max, config.options.len() - 1)?;

        if parsed[min_index] > parsed[max_index] {
            return Err(RangeError::Inverted {
                pair: config.id.clone(),
                min: config.options[min_index].clone(),
                max: config.options[max_index].clone(),
            });
        }

        let mut pair = RangeControlPair {
            id: config.id.clone(),
            label: config.label.clone(),
            numeric: config.numeric,
            min: RangeSelector::new(&config.min_control, &config.min_label, &config.options, &parsed, min_index),
            max: RangeSelector::new(&config.max_control, &config.max_label, &config.options, &parsed, max_index),
        };
        pair.sync();
        Ok(pair)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn numeric(&self) -> NumericKind {
        self.numeric
    }

    pub fn min(&self) -> &RangeSelector {
        &self.min
    }

    pub fn max(&self) -> &RangeSelector {
        &self.max
    }

    /// Re-derive disabled flags and labels from the current selections.
    pub fn sync(&mut self) {
        let max_value = self.max.selected_number();
        let min_value = self.min.selected_number();

        self.min.disable_where(|v| v > max_value);
        self.max.disable_where(|v| v < min_value);

        self.min.label = self.min.selected_value().to_string();
        self.max.label = self.max.selected_value().to_string();
    }

    pub fn select_min(&mut self, value: &str) -> Result<(), RangeError> {
        let index = self.checked_index(&self.min, value)?;
        self.min.selected = index;
        self.sync();
        Ok(())
    }

    pub fn select_max(&mut self, value: &str) -> Result<(), RangeError> {
        let index = self.checked_index(&self.max, value)?;
        self.max.selected = index;
        self.sync();
        Ok(())
    }

    /// Move the min selection to the nearest enabled option in `direction`
    /// (negative = lower). Returns false when already at the edge.
    pub fn step_min(&mut self, direction: isize) -> bool {
        match Self::next_enabled(&self.min, direction) {
            Some(index) => {
                self.min.selected = index;
                self.sync();
                true
            }
            None => false,
        }
    }

    pub fn step_max(&mut self, direction: isize) -> bool {
        match Self::next_enabled(&self.max, direction) {
            Some(index) => {
                self.max.selected = index;
                self.sync();
                true
            }
            None => false,
        }
    }

    /// Widen back to the full option span
    pub fn reset(&mut self) {
        self.min.selected = 0;
        self.max.selected = self.max.options.len() - 1;
        self.sync();
    }

    pub fn control_value(&self) -> ControlValue {
        ControlValue::Range {
            min: self.min.selected_value().to_string(),
            max: self.max.selected_value().to_string(),
        }
    }

    fn checked_index(&self, selector: &RangeSelector, value: &str) -> Result<usize, RangeError> {
        let index = selector.index_of(value).ok_or_else(|| RangeError::UnknownOption {
            pair: self.id.clone(),
            value: value.to_string(),
        })?;
        if selector.options[index].disabled {
            return Err(RangeError::OptionDisabled {
                pair: self.id.clone(),
                value: value.to_string(),
            });
        }
        Ok(index)
    }

    fn next_enabled(selector: &RangeSelector, direction: isize) -> Option<usize> {
        let len = selector.options.len() as isize;
        let step = direction.signum();
        if step == 0 {
            return None;
        }
        let mut i = selector.selected as isize + step;
        while (0..len).contains(&i) {
            if !selector.options[i as usize].disabled {
                return Some(i as usize);
            }
            i += step;
        }
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, numeric: NumericKind, options: &[&str]) -> RangeConfig {
        RangeConfig {
            id: id.to_string(),
            label: id.to_string(),
            numeric,
            min_control: format!("{}-filter-min", id),
            max_control: format!("{}-filter-max", id),
            min_label: format!("min-{}", id),
            max_label: format!("max-{}", id),
            options: options.iter().map(|o| o.to_string()).collect(),
            initial_min: None,
            initial_max: None,
        }
    }

    fn assert_invariant(pair: &RangeControlPair) {
        let numeric = pair.numeric();
        let max = numeric.parse(pair.max().selected_value()).unwrap();
        let min = numeric.parse(pair.min().selected_value()).unwrap();
        for o in pair.min().options().iter().filter(|o| !o.disabled) {
            assert!(numeric.parse(&o.value).unwrap() <= max, "min option {} enabled above max {}", o.value, max);
        }
        for o in pair.max().options().iter().filter(|o| !o.disabled) {
            assert!(numeric.parse(&o.value).unwrap() >= min, "max option {} enabled below min {}", o.value, min);
        }
    }

    #[test]
    fn test_new_selects_full_span() {
        let pair = RangeControlPair::new(&config("capacity", NumericKind::Integer, &["2", "4", "5", "7"])).unwrap();

        assert_eq!(pair.min().selected_value(), "2");
        assert_eq!(pair.max().selected_value(), "7");
        assert!(pair.min().options().iter().all(|o| !o.disabled));
        assert_eq!(pair.min().label(), "2");
        assert_eq!(pair.max().label(), "7");
    }

    #[test]
    fn test_scenario_c_inversion_is_blocked() {
        let mut pair =
            RangeControlPair::new(&config("weight", NumericKind::Integer, &["10", "20", "30", "40", "50", "60"]))
                .unwrap();

        pair.select_max("40").unwrap();

        assert!(!pair.min().is_enabled("50"));
        assert!(!pair.min().is_enabled("60"));
        assert!(pair.min().is_enabled("40"));
        assert_eq!(
            pair.select_min("50"),
            Err(RangeError::OptionDisabled {
                pair: "weight".to_string(),
                value: "50".to_string()
            })
        );
        assert_eq!(pair.min().selected_value(), "10");
        assert_invariant(&pair);
    }

    #[test]
    fn test_labels_echo_selection() {
        let mut pair = RangeControlPair::new(&config("cost", NumericKind::Integer, &["0", "50", "100"])).unwrap();

        pair.select_min("50").unwrap();
        pair.select_max("50").unwrap();

        assert_eq!(pair.min().label(), "50");
        assert_eq!(pair.max().label(), "50");
        assert!(!pair.max().is_enabled("0"));
        assert!(!pair.min().is_enabled("100"));
        assert_eq!(
            pair.control_value(),
            ControlValue::Range {
                min: "50".to_string(),
                max: "50".to_string()
            }
        );
    }

    #[test]
    fn test_float_pair_compares_fractions() {
        let mut pair =
            RangeControlPair::new(&config("length", NumericKind::Float, &["3.5", "4.0", "4.5", "4.55", "5.0"])).unwrap();

        pair.select_max("4.5").unwrap();

        assert!(!pair.min().is_enabled("4.55"));
        assert!(pair.min().is_enabled("4.5"));
        assert_invariant(&pair);
    }

    #[test]
    fn test_integer_pair_truncates_options() {
        // 4.5 and 4.9 both parse as 4 under integer rules
        let mut pair = RangeControlPair::new(&config("clearance", NumericKind::Integer, &["4.5", "4.9", "6"])).unwrap();

        pair.select_max("4.5").unwrap();

        assert!(pair.min().is_enabled("4.9"));
        assert!(!pair.min().is_enabled("6"));
    }

    #[test]
    fn test_invariant_holds_over_event_sequences() {
        let mut pair = RangeControlPair::new(&config(
            "engine",
            NumericKind::Integer,
            &["1000", "1500", "2000", "2500", "3000", "4000"],
        ))
        .unwrap();

        let steps: [(bool, isize); 10] = [
            (true, 1),
            (true, 1),
            (false, -1),
            (false, -1),
            (false, -1),
            (true, 1),
            (true, -1),
            (false, 1),
            (false, -1),
            (true, 1),
        ];
        for (is_min, direction) in steps {
            if is_min {
                pair.step_min(direction);
            } else {
                pair.step_max(direction);
            }
            assert_invariant(&pair);
            assert!(
                pair.numeric().parse(pair.min().selected_value()).unwrap()
                    <= pair.numeric().parse(pair.max().selected_value()).unwrap()
            );
        }
    }

    #[test]
    fn test_step_stops_at_disabled_options() {
        let mut pair = RangeControlPair::new(&config("load", NumericKind::Integer, &["80", "90", "100"])).unwrap();
        pair.select_max("90").unwrap();
        pair.select_min("90").unwrap();

        assert!(!pair.step_min(1));
        assert!(!pair.step_max(-1));
        assert!(pair.step_max(1));
        assert_eq!(pair.max().selected_value(), "100");
    }

    #[test]
    fn test_reset_restores_span() {
        let mut pair = RangeControlPair::new(&config("cost", NumericKind::Integer, &["0", "50", "100"])).unwrap();
        pair.select_min("50").unwrap();
        pair.select_max("50").unwrap();

        pair.reset();

        assert_eq!(pair.min().selected_value(), "0");
        assert_eq!(pair.max().selected_value(), "100");
        assert!(pair.max().options().iter().all(|o| !o.disabled));
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            RangeControlPair::new(&config("cost", NumericKind::Integer, &[])),
            Err(RangeError::Empty { .. })
        ));
        assert!(matches!(
            RangeControlPair::new(&config("cost", NumericKind::Integer, &["0", "lots"])),
            Err(RangeError::InvalidOption { .. })
        ));

        let mut inverted = config("cost", NumericKind::Integer, &["0", "50", "100"]);
        inverted.initial_min = Some("100".to_string());
        inverted.initial_max = Some("50".to_string());
        assert!(matches!(RangeControlPair::new(&inverted), Err(RangeError::Inverted { .. })));

        let mut unknown = config("cost", NumericKind::Integer, &["0", "50"]);
        unknown.initial_max = Some("75".to_string());
        assert!(matches!(RangeControlPair::new(&unknown), Err(RangeError::UnknownOption { .. })));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let mut pair = RangeControlPair::new(&config("cost", NumericKind::Integer, &["0", "50"])).unwrap();
        assert!(matches!(pair.select_min("25"), Err(RangeError::UnknownOption { .. })));
    }
}
