// Rental Filter - Core Library
// Card filtering, range sync, dropdown state and dashboard charts for the
// rental management pages. Used by the CLI, the terminal UI, and tests.

pub mod error;
pub mod card;      // Cards + CSV/JSON loading
pub mod criteria;  // Control values for one pass
pub mod predicate; // Declarative predicate tables
pub mod engine;    // Filter Engine + reports
pub mod range;     // Range Sync
pub mod dropdown;  // Dropdown open/closed state
pub mod page;      // Built-in page definitions
pub mod panel;     // Live control state + page session
pub mod chart;     // Dashboard datasets + fleet refresh
pub mod config;

// Re-export commonly used types
pub use error::{ChartError, FilterError, RangeError};
pub use card::{load_cards, load_cards_csv, load_cards_json, Card, CardKind};
pub use criteria::{ControlValue, FilterCriteria};
pub use predicate::{Bound, FieldPredicate, MatchKind, NumericKind, PredicateTable, Verdict};
pub use engine::{FilterEngine, FilterIssue, FilterReport, IntegrationMode, Severity};
pub use range::{RangeConfig, RangeControlPair, RangeOption, RangeSelector};
pub use dropdown::{DropdownConfig, DropdownSet, DropdownState};
pub use page::{
    builtin_pages, find_page, load_pages,
    CompatOptions, PageConfig, SelectControl, TextControl,
};
pub use panel::{
    load_settings, ControlPanel, ControlSettings, ControlSlot, PageSession, SettingValue,
};
pub use chart::{
    spawn_fleet_refresh, Chart, ChartKind, CountSource, Dashboard, DashboardSeed, Dataset,
    FleetRequest, FleetUpdate, HttpCountSource,
};
pub use config::AppConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
