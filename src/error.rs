// Error types shared by the filter engine, range controls and dashboard

use thiserror::Error;

/// Errors raised while evaluating or configuring a filter pass.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A card does not carry a field that a predicate reads.
    #[error("card {card} has no field '{field}'")]
    MissingField { card: String, field: String },

    /// The criteria hold no value for a control the predicate table names.
    #[error("no value for control '{control}' (predicate '{predicate}')")]
    MissingControl { control: String, predicate: String },

    /// A control exists but carries the wrong kind of value (e.g. text for a range).
    #[error("control '{control}' holds a {found} value, predicate '{predicate}' expects {expected}")]
    ControlKind {
        control: String,
        predicate: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Development mode: the pass completed but found integration defects.
    #[error("filter pass found {count} integration issue(s), first: {first}")]
    Integration { count: usize, first: String },

    /// Unknown control id passed to the control panel.
    #[error("page '{page}' has no control '{control}'")]
    UnknownControl { page: String, control: String },

    /// A select control was given a value outside its option list.
    #[error("control '{control}' has no option '{value}'")]
    UnknownOption { control: String, value: String },

    /// A saved setting does not fit the control it names.
    #[error("setting for '{control}' must be a {expected} value")]
    SettingKind { control: String, expected: &'static str },

    #[error(transparent)]
    Range(#[from] RangeError),
}

/// Errors raised by a min/max range control pair.
#[derive(Debug, Error, PartialEq)]
pub enum RangeError {
    #[error("range '{pair}' has no options")]
    Empty { pair: String },

    #[error("range '{pair}' option '{value}' is not a valid {kind} value")]
    InvalidOption {
        pair: String,
        value: String,
        kind: &'static str,
    },

    #[error("range '{pair}' has no option '{value}'")]
    UnknownOption { pair: String, value: String },

    #[error("range '{pair}' option '{value}' is disabled")]
    OptionDisabled { pair: String, value: String },

    #[error("range '{pair}' starts inverted: min {min} > max {max}")]
    Inverted {
        pair: String,
        min: String,
        max: String,
    },
}

/// Errors raised while refreshing dashboard data.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} answered HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("{path} did not return a JSON array: {reason}")]
    Payload { path: String, reason: String },
}
