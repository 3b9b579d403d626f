// Filter criteria - a snapshot of every control value for one filter pass

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current value of one filter control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlValue {
    /// Free-text input (search boxes)
    Text(String),
    /// Selected option of a dropdown (sentinel "All" means no constraint)
    Select(String),
    /// Selected option strings of a min/max range pair
    Range { min: String, max: String },
}

impl ControlValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ControlValue::Text(_) => "text",
            ControlValue::Select(_) => "select",
            ControlValue::Range { .. } => "range",
        }
    }

    /// Single string value of a text or select control
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ControlValue::Text(s) | ControlValue::Select(s) => Some(s),
            ControlValue::Range { .. } => None,
        }
    }
}

/// Built fresh for every pass and passed explicitly to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    values: BTreeMap<String, ControlValue>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, control: impl Into<String>, value: ControlValue) {
        self.values.insert(control.into(), value);
    }

    /// Builder: free-text control
    pub fn text(mut self, control: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(control, ControlValue::Text(value.into()));
        self
    }

    /// Builder: dropdown control
    pub fn select(mut self, control: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(control, ControlValue::Select(value.into()));
        self
    }

    /// Builder: range pair
    pub fn range(
        mut self,
        control: impl Into<String>,
        min: impl Into<String>,
        max: impl Into<String>,
    ) -> Self {
        self.insert(
            control,
            ControlValue::Range {
                min: min.into(),
                max: max.into(),
            },
        );
        self
    }

    pub fn get(&self, control: &str) -> Option<&ControlValue> {
        self.values.get(control)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
