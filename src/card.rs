// 🚗 Cards - the rendered entities a page filters
// Fields are loaded once per session and never change; only visibility does.

use crate::error::FilterError;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// ============================================================================
// CARD KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Car,
    Model,
    User,
    Employee,
    Booking,
    Report,
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Car => "car",
            CardKind::Model => "model",
            CardKind::User => "user",
            CardKind::Employee => "employee",
            CardKind::Booking => "booking",
            CardKind::Report => "report",
        }
    }

    /// Field used to name a card in tables and issue reports
    pub fn title_field(&self) -> &'static str {
        match self {
            CardKind::Car => "rego",
            CardKind::Model => "model_id",
            CardKind::User | CardKind::Employee => "username",
            CardKind::Booking => "rego",
            CardKind::Report => "report_id",
        }
    }
}

// ============================================================================
// CARD
// ============================================================================

/// One displayable entity. The filter engine reads `fields` and writes
/// `visible`, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub kind: CardKind,

    fields: BTreeMap<String, String>,

    #[serde(default = "default_visible")]
    visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Card {
    pub fn new(kind: CardKind) -> Self {
        Card {
            kind,
            fields: BTreeMap::new(),
            visible: true,
        }
    }

    /// Builder: add a field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field lookup for predicates: a missing field is an integration error.
    pub fn require(&self, name: &str) -> Result<&str, FilterError> {
        self.field(name).ok_or_else(|| FilterError::MissingField {
            card: self.title(),
            field: name.to_string(),
        })
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn title(&self) -> String {
        match self.field(self.kind.title_field()) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("<{} without {}>", self.kind.as_str(), self.kind.title_field()),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load cards from a CSV or JSON export, chosen by file extension.
pub fn load_cards(path: &Path, kind: CardKind) -> Result<Vec<Card>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open card file: {:?}", path))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let cards = match extension.as_deref() {
        Some("csv") => load_cards_csv(file, kind),
        Some("json") => load_cards_json(file, kind),
        other => Err(anyhow!(
            "Unsupported card file extension {:?} (expected csv or json)",
            other.unwrap_or("")
        )),
    }
    .with_context(|| format!("Failed to load {} cards from {:?}", kind.as_str(), path))?;

    log::info!("loaded {} {} cards from {:?}", cards.len(), kind.as_str(), path);
    Ok(cards)
}

/// Header row gives field names, every following row is one card.
pub fn load_cards_csv<R: Read>(reader: R, kind: CardKind) -> Result<Vec<Card>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();

    let mut cards = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV row {}", line + 2))?;

        let mut card = Card::new(kind);
        for (name, value) in headers.iter().zip(record.iter()) {
            card.fields.insert(name.trim().to_string(), value.trim().to_string());
        }
        cards.push(card);
    }

    Ok(cards)
}

pub fn load_cards_json<R: Read>(reader: R, kind: CardKind) -> Result<Vec<Card>> {
    let value: Value = serde_json::from_reader(reader).context("Failed to parse cards JSON")?;
    cards_from_json(&value, kind)
}

/// Build cards from a JSON array of objects. Nested objects are flattened
/// with dotted keys and `null` values are left out.
pub fn cards_from_json(value: &Value, kind: CardKind) -> Result<Vec<Card>> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("Cards JSON must be an array of objects"))?;

    let mut cards = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            return Err(anyhow!("Card #{} is not a JSON object", index));
        }
        let mut card = Card::new(kind);
        flatten_into("", item, &mut card.fields);
        cards.push(card);
    }

    Ok(cards)
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, inner) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(&name, inner, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
