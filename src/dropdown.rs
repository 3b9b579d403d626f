// Dropdown containers - explicit open/closed state instead of class toggling

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropdownState {
    Open,
    #[default]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownConfig {
    /// Element that toggles the container when clicked
    pub trigger: String,
    pub container: String,
    /// Range pair shown inside the container, if any
    #[serde(default)]
    pub range: Option<String>,
}

#[derive(Debug, Clone)]
struct Dropdown {
    config: DropdownConfig,
    state: DropdownState,
}

/// Every dropdown on a page. All start closed.
#[derive(Debug, Clone, Default)]
pub struct DropdownSet {
    dropdowns: Vec<Dropdown>,
}

impl DropdownSet {
    pub fn new(configs: &[DropdownConfig]) -> Self {
        DropdownSet {
            dropdowns: configs
                .iter()
                .map(|config| Dropdown {
                    config: config.clone(),
                    state: DropdownState::Closed,
                })
                .collect(),
        }
    }

    /// A click anywhere on the page. A trigger toggles its own container;
    /// every other open container closes.
    pub fn click(&mut self, target: &str) {
        for dropdown in &mut self.dropdowns {
            if dropdown.config.trigger == target {
                dropdown.state = match dropdown.state {
                    DropdownState::Open => DropdownState::Closed,
                    DropdownState::Closed => DropdownState::Open,
                };
            } else {
                dropdown.state = DropdownState::Closed;
            }
        }
    }

    pub fn close_all(&mut self) {
        for dropdown in &mut self.dropdowns {
            dropdown.state = DropdownState::Closed;
        }
    }

    pub fn state(&self, container: &str) -> Option<DropdownState> {
        self.dropdowns
            .iter()
            .find(|d| d.config.container == container)
            .map(|d| d.state)
    }

    pub fn is_trigger(&self, id: &str) -> bool {
        self.dropdowns.iter().any(|d| d.config.trigger == id)
    }

    /// Trigger that opens the container holding range pair `range`
    pub fn trigger_for_range(&self, range: &str) -> Option<&str> {
        self.dropdowns
            .iter()
            .find(|d| d.config.range.as_deref() == Some(range))
            .map(|d| d.config.trigger.as_str())
    }

    /// Configs of the containers currently open
    pub fn open(&self) -> impl Iterator<Item = &DropdownConfig> {
        self.dropdowns
            .iter()
            .filter(|d| d.state == DropdownState::Open)
            .map(|d| &d.config)
    }
}
