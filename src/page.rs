// 📄 Pages - declarative control + predicate tables, one per filtered page
//
// A page supplies configuration only. The built-in pages cover every page
// of the rental site that filters cards; a JSON file can replace them.

use crate::card::CardKind;
use crate::dropdown::DropdownConfig;
use crate::predicate::{Bound, FieldPredicate, NumericKind, PredicateTable};
use crate::range::RangeConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// CONTROL DEFINITIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextControl {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectControl {
    pub id: String,
    pub label: String,
    pub options: Vec<String>,
    /// Defaults to the first option
    #[serde(default)]
    pub initial: Option<String>,
}

/// Switches that restore legacy page quirks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatOptions {
    /// Match the year dropdown against the make field instead of the year field
    #[serde(default)]
    pub year_matches_make: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub name: String,
    pub title: String,
    pub kind: CardKind,

    /// Card fields shown as table columns
    pub columns: Vec<String>,

    #[serde(default)]
    pub text: Vec<TextControl>,

    #[serde(default)]
    pub selects: Vec<SelectControl>,

    #[serde(default)]
    pub ranges: Vec<RangeConfig>,

    #[serde(default)]
    pub dropdowns: Vec<DropdownConfig>,

    pub predicates: PredicateTable,
}

impl PageConfig {
    /// Every control id on the page, in display order
    pub fn control_ids(&self) -> Vec<&str> {
        self.text
            .iter()
            .map(|t| t.id.as_str())
            .chain(self.selects.iter().map(|s| s.id.as_str()))
            .chain(self.ranges.iter().map(|r| r.id.as_str()))
            .collect()
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load page definitions from a JSON array of `PageConfig`
pub fn load_pages<P: AsRef<Path>>(path: P) -> Result<Vec<PageConfig>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read pages file: {:?}", path.as_ref()))?;

    serde_json::from_str(&content).context("Failed to parse pages JSON")
}

pub fn find_page<'a>(pages: &'a [PageConfig], name: &str) -> Result<&'a PageConfig> {
    pages.iter().find(|p| p.name == name).ok_or_else(|| {
        let known: Vec<&str> = pages.iter().map(|p| p.name.as_str()).collect();
        anyhow!("Unknown page '{}' (known: {})", name, known.join(", "))
    })
}

// ============================================================================
// BUILT-IN PAGES
// ============================================================================

pub fn builtin_pages(compat: &CompatOptions) -> Vec<PageConfig> {
    vec![
        car_list(compat),
        car_search(compat),
        car_booking(compat),
        booking_history(),
        users(),
        employees(),
        car_models(),
        reports(),
    ]
}

const YEARS: &[&str] = &["All", "2015", "2016", "2017", "2018", "2019", "2020", "2021"];
const MAKES: &[&str] = &["All", "Toyota", "Honda", "Mazda", "Ford", "Holden", "Hyundai", "Kia", "Nissan"];
const COLOURS: &[&str] = &["All", "Black", "Blue", "Grey", "Red", "Silver", "White"];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn text(id: &str, label: &str) -> TextControl {
    TextControl {
        id: id.to_string(),
        label: label.to_string(),
    }
}

fn select(id: &str, label: &str, options: &[&str]) -> SelectControl {
    SelectControl {
        id: id.to_string(),
        label: label.to_string(),
        options: strings(options),
        initial: None,
    }
}

/// Range pair using the page's id conventions
fn range(id: &str, label: &str, numeric: NumericKind, options: &[&str]) -> RangeConfig {
    RangeConfig {
        id: id.to_string(),
        label: label.to_string(),
        numeric,
        min_control: format!("{}-filter-min", id),
        max_control: format!("{}-filter-max", id),
        min_label: format!("min-{}", id),
        max_label: format!("max-{}", id),
        options: strings(options),
        initial_min: None,
        initial_max: None,
    }
}

fn dropdown_for(range: &RangeConfig) -> DropdownConfig {
    DropdownConfig {
        trigger: format!("{}-dropbtn", range.id),
        container: format!("select-{}-container", range.id),
        range: Some(range.id.clone()),
    }
}

fn year_predicate(compat: &CompatOptions) -> FieldPredicate {
    if compat.year_matches_make {
        FieldPredicate::contains("year", "year-filter", "make")
            .with_description("Year dropdown compared against the make field (legacy)")
    } else {
        FieldPredicate::contains("year", "year-filter", "year")
    }
}

/// Shared year/make/colour dropdowns of the customer car pages
fn car_dropdown_predicates(compat: &CompatOptions) -> Vec<FieldPredicate> {
    vec![
        FieldPredicate::contains("make", "make-filter", "make"),
        year_predicate(compat),
        FieldPredicate::exact("colour", "colour-filter", "colour", false),
    ]
}

fn car_list(compat: &CompatOptions) -> PageConfig {
    let ranges = vec![
        range("capacity", "Capacity", NumericKind::Integer, &["2", "4", "5", "7", "8", "12"]),
        range("cost", "Cost / hour", NumericKind::Integer, &["0", "10", "20", "30", "40", "50", "75", "100"]),
        range("load-index", "Load index", NumericKind::Integer, &["70", "80", "90", "100", "110", "120"]),
        range("clearance", "Clearance (mm)", NumericKind::Integer, &["100", "125", "150", "175", "200", "250"]),
        range("weight", "Weight (kg)", NumericKind::Integer, &["1000", "1250", "1500", "1750", "2000", "2500", "3000"]),
        range("length", "Length (m)", NumericKind::Float, &["3.5", "3.75", "4.0", "4.25", "4.5", "4.75", "5.0", "5.5"]),
        range("engine-capacity", "Engine (cc)", NumericKind::Integer, &["1000", "1500", "2000", "2500", "3000", "4000"]),
    ];
    let dropdowns = ranges.iter().map(dropdown_for).collect();

    let mut predicates = vec![
        FieldPredicate::exact("transmission", "transmission-filter", "transmission", false),
        FieldPredicate::text_search("search", "search-box", &["make"])
            .with_description("Case-insensitive substring of the make"),
    ];
    predicates.extend(car_dropdown_predicates(compat));
    predicates.extend([
        FieldPredicate::range("capacity", "capacity", "capacity", NumericKind::Integer),
        FieldPredicate::range("cost", "cost", "cost", NumericKind::Integer),
        FieldPredicate::range("load-index", "load-index", "load_index", NumericKind::Integer),
        FieldPredicate::range("clearance", "clearance", "clearance", NumericKind::Integer),
        FieldPredicate::range("weight", "weight", "weight", NumericKind::Integer),
        FieldPredicate::range("length", "length", "length", NumericKind::Float)
            .with_description("Decimal metres, the only fractional range"),
        FieldPredicate::range("engine-capacity", "engine-capacity", "engine_capacity", NumericKind::Integer),
    ]);

    PageConfig {
        name: "cars".to_string(),
        title: "Available cars".to_string(),
        kind: CardKind::Car,
        columns: strings(&["rego", "make", "year", "colour", "transmission", "capacity", "cost", "length"]),
        text: vec![text("search-box", "Search")],
        selects: vec![
            select("year-filter", "Year", YEARS),
            select("make-filter", "Make", MAKES),
            select("colour-filter", "Colour", COLOURS),
            select("transmission-filter", "Transmission", &["All", "Auto", "Manual"]),
        ],
        ranges,
        dropdowns,
        predicates: PredicateTable::from_predicates(predicates),
    }
}

fn car_search(compat: &CompatOptions) -> PageConfig {
    let mut predicates = vec![FieldPredicate::text_search("search", "search-box", &["make"])];
    predicates.extend(car_dropdown_predicates(compat));
    predicates.push(
        FieldPredicate::threshold("capacity", "capacity-filter", "capacity", NumericKind::Integer, Bound::AtLeast)
            .with_description("Seats at least the selected count"),
    );

    PageConfig {
        name: "search".to_string(),
        title: "Search cars".to_string(),
        kind: CardKind::Car,
        columns: strings(&["rego", "make", "year", "colour", "capacity"]),
        text: vec![text("search-box", "Search")],
        selects: vec![
            select("year-filter", "Year", YEARS),
            select("make-filter", "Make", MAKES),
            select("colour-filter", "Colour", COLOURS),
            select("capacity-filter", "Seats at least", &["All", "2", "4", "5", "7", "8"]),
        ],
        ranges: Vec::new(),
        dropdowns: Vec::new(),
        predicates: PredicateTable::from_predicates(predicates),
    }
}

fn car_booking(compat: &CompatOptions) -> PageConfig {
    let mut predicates = vec![FieldPredicate::text_search("search", "search-box", &["make", "rego"])];
    predicates.extend(car_dropdown_predicates(compat));
    predicates.extend([
        FieldPredicate::threshold("capacity", "capacity-filter", "capacity", NumericKind::Integer, Bound::AtLeast),
        FieldPredicate::threshold("cost", "cost-filter", "cost", NumericKind::Integer, Bound::AtLeast),
    ]);

    PageConfig {
        name: "booking".to_string(),
        title: "Book a car".to_string(),
        kind: CardKind::Car,
        columns: strings(&["rego", "make", "year", "colour", "capacity", "cost"]),
        text: vec![text("search-box", "Make or rego")],
        selects: vec![
            select("year-filter", "Year", YEARS),
            select("make-filter", "Make", MAKES),
            select("colour-filter", "Colour", COLOURS),
            select("capacity-filter", "Seats at least", &["All", "2", "4", "5", "7", "8"]),
            select("cost-filter", "Cost at least", &["All", "0", "10", "20", "30", "50"]),
        ],
        ranges: Vec::new(),
        dropdowns: Vec::new(),
        predicates: PredicateTable::from_predicates(predicates),
    }
}

fn booking_history() -> PageConfig {
    PageConfig {
        name: "history".to_string(),
        title: "Booking history".to_string(),
        kind: CardKind::Booking,
        columns: strings(&["booking_id", "rego", "start", "end", "cost", "status"]),
        text: vec![text("car-search", "Rego")],
        selects: vec![select("status-filter", "Status", &["All", "Booked", "Completed", "Cancelled"])],
        ranges: Vec::new(),
        dropdowns: Vec::new(),
        predicates: PredicateTable::from_predicates(vec![
            FieldPredicate::text_search("rego", "car-search", &["rego"]),
            FieldPredicate::exact("status", "status-filter", "status", true),
        ]),
    }
}

const PERSON_FIELDS: &[&str] = &["username", "email", "first_name", "last_name"];

fn users() -> PageConfig {
    PageConfig {
        name: "users".to_string(),
        title: "Customers".to_string(),
        kind: CardKind::User,
        columns: strings(PERSON_FIELDS),
        text: vec![text("user-filter", "Search")],
        selects: Vec::new(),
        ranges: Vec::new(),
        dropdowns: Vec::new(),
        predicates: PredicateTable::from_predicates(vec![FieldPredicate::text_search(
            "search",
            "user-filter",
            PERSON_FIELDS,
        )]),
    }
}

fn employees() -> PageConfig {
    let mut columns = strings(PERSON_FIELDS);
    columns.push("type".to_string());

    PageConfig {
        name: "employees".to_string(),
        title: "Employees".to_string(),
        kind: CardKind::Employee,
        columns,
        text: vec![text("employee-filter", "Search")],
        selects: vec![select("type-filter", "Type", &["All", "ADMIN", "MANAGER", "ENGINEER"])],
        ranges: Vec::new(),
        dropdowns: Vec::new(),
        predicates: PredicateTable::from_predicates(vec![
            FieldPredicate::text_search("search", "employee-filter", PERSON_FIELDS),
            FieldPredicate::exact("type", "type-filter", "type", true),
        ]),
    }
}

fn car_models() -> PageConfig {
    PageConfig {
        name: "models".to_string(),
        title: "Car models".to_string(),
        kind: CardKind::Model,
        columns: strings(&["model_id", "make", "model", "year", "capacity"]),
        text: vec![text("model_id", "Model id")],
        selects: Vec::new(),
        ranges: Vec::new(),
        dropdowns: Vec::new(),
        predicates: PredicateTable::from_predicates(vec![
            FieldPredicate::numeric_equals("model", "model_id", "model_id", NumericKind::Integer)
                .with_description("Exact model id; empty shows every model"),
        ]),
    }
}

fn reports() -> PageConfig {
    PageConfig {
        name: "reports".to_string(),
        title: "Repair reports".to_string(),
        kind: CardKind::Report,
        columns: strings(&["report_id", "car_id", "priority", "status", "engineer_id", "details"]),
        text: vec![text("report-filter", "Search")],
        selects: vec![
            select("priority-filter", "Priority", &["All", "LOW", "MEDIUM", "HIGH"]),
            select("report-status-filter", "Status", &["All", "Open", "Resolved"]),
        ],
        ranges: Vec::new(),
        dropdowns: Vec::new(),
        predicates: PredicateTable::from_predicates(vec![
            FieldPredicate::text_search("search", "report-filter", &["car_id", "details"]),
            FieldPredicate::exact("priority", "priority-filter", "priority", true),
            FieldPredicate::exact("status", "report-status-filter", "status", true),
        ]),
    }
}

// ============================================================================
// TESTS
// ============================================================================
