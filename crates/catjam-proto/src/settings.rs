//! Add-on settings: the snapshot served by the settings handle and its
//! normalization into the typed [`Settings`] the engine consumes.
//!
//! The snapshot is a list of sections holding heterogeneous items.  It is
//! first flattened into a [`SettingsMap`] keyed by item id, then
//! [`normalize`]d against the previous [`Settings`] so missing values keep
//! their last-known-good state.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MIN_FALLBACK_RATE: f64 = 25.0;
pub const MAX_FALLBACK_RATE: f64 = 300.0;
const DEFAULT_FALLBACK_RATE: f64 = 100.0;

/// Typed add-on configuration.  Replaced wholesale on each successful
/// refresh; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub enabled: bool,
    pub follow_pulse: bool,
    /// Playback speed in percent, within `[25, 300]`.
    pub fallback_rate: f64,
    pub custom_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            follow_pulse: true,
            fallback_rate: DEFAULT_FALLBACK_RATE,
            custom_url: String::new(),
        }
    }
}

// ── Wire snapshot ─────────────────────────────────────────────────────────────
//
// The handle is loose about nulls and shapes.  A `null` where a string or list
// is expected reads as empty, and an entry that still does not fit is dropped
// on its own instead of failing the whole snapshot.

#[derive(Debug, Clone, Deserialize)]
pub struct HandleData {
    #[serde(deserialize_with = "lenient_list")]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    #[serde(default, deserialize_with = "lenient_list")]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default)]
    pub bool: Option<Value>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub selected: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(rename = "filePath", default)]
    pub file_path: Option<Value>,
    #[serde(default, deserialize_with = "lenient_optional_list")]
    pub buttons: Option<Vec<TextButton>>,
    #[serde(rename = "defaultParameter", default)]
    pub default_parameter: Option<Value>,
}

/// Sub-button of a `text` item.
#[derive(Debug, Clone, Deserialize)]
pub struct TextButton {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(rename = "defaultParameter", default)]
    pub default_parameter: Option<Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_each<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(parse_each(
        Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default(),
    ))
}

fn lenient_optional_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.map(parse_each))
}

// ── Flattened map ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingValue {
    pub value: Option<Value>,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingEntry {
    Single(SettingValue),
    /// A `text` item: one value per sub-button id.
    Buttons(BTreeMap<String, SettingValue>),
}

pub type SettingsMap = BTreeMap<String, SettingEntry>;

impl Item {
    /// The item's current value, picked by kind.  Unknown kinds take the
    /// first field that is present.
    fn pick_value(&self) -> Option<Value> {
        match self.kind.as_str() {
            "button" => self.bool.clone(),
            "color" => self.input.clone(),
            "selector" => self.selected.clone(),
            "slider" => self.value.clone(),
            "file" => self.file_path.clone(),
            "text" => Some(Value::Array(Vec::new())),
            _ => self
                .bool
                .clone()
                .or_else(|| self.input.clone())
                .or_else(|| self.selected.clone())
                .or_else(|| self.value.clone())
                .or_else(|| self.file_path.clone()),
        }
    }
}

/// Extract the flattened map from a raw handle response
/// (`{"data": {"sections": [...]}}`).
pub fn parse_handle_payload(payload: &Value) -> anyhow::Result<SettingsMap> {
    let data = payload
        .get("data")
        .filter(|d| !d.is_null())
        .ok_or_else(|| anyhow::anyhow!("settings payload has no data"))?;
    if !data.get("sections").map(Value::is_array).unwrap_or(false) {
        anyhow::bail!("settings payload has no sections array");
    }
    let data: HandleData = serde_json::from_value(data.clone())?;
    Ok(transform_handle_data(&data))
}

pub fn transform_handle_data(data: &HandleData) -> SettingsMap {
    let mut result = SettingsMap::new();
    for item in data.sections.iter().flat_map(|s| s.items.iter()) {
        let entry = match (&item.buttons, item.kind.as_str()) {
            (Some(buttons), "text") => SettingEntry::Buttons(
                buttons
                    .iter()
                    .map(|b| {
                        (
                            b.id.clone(),
                            SettingValue {
                                value: b.text.clone(),
                                default: b.default_parameter.clone(),
                            },
                        )
                    })
                    .collect(),
            ),
            _ => SettingEntry::Single(SettingValue {
                value: item.pick_value(),
                default: item.default_parameter.clone(),
            }),
        };
        result.insert(item.id.clone(), entry);
    }
    result
}

// ── Normalization ─────────────────────────────────────────────────────────────

fn value_of<'a>(map: &'a SettingsMap, id: &str) -> Option<&'a Value> {
    match map.get(id)? {
        SettingEntry::Single(v) => v.value.as_ref().filter(|v| !v.is_null()),
        SettingEntry::Buttons(_) => None,
    }
}

fn button_value_of<'a>(map: &'a SettingsMap, id: &str, button: &str) -> Option<&'a Value> {
    match map.get(id)? {
        SettingEntry::Buttons(buttons) => buttons
            .get(button)?
            .value
            .as_ref()
            .filter(|v| !v.is_null()),
        SettingEntry::Single(_) => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Text form of a value the way the settings UI shows it: strings as-is,
/// whole floats without a trailing `.0`.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other if !truthy(other) => String::new(),
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Map a flattened snapshot onto typed settings.  Absent values keep the
/// `previous` value; an unusable rate resets to 100 before clamping.
pub fn normalize(map: &SettingsMap, previous: &Settings) -> Settings {
    let enabled = value_of(map, "enabled")
        .map(truthy)
        .unwrap_or(previous.enabled);
    let follow_pulse = value_of(map, "followPulse")
        .map(truthy)
        .unwrap_or(previous.follow_pulse);
    let fallback_rate = match value_of(map, "fallbackRate") {
        Some(v) => numeric(v).filter(|n| *n != 0.0).unwrap_or(DEFAULT_FALLBACK_RATE),
        None => previous.fallback_rate,
    }
    .clamp(MIN_FALLBACK_RATE, MAX_FALLBACK_RATE);
    let custom_url = button_value_of(map, "customUrl", "url")
        .map(stringify)
        .unwrap_or_default();

    Settings {
        enabled,
        follow_pulse,
        fallback_rate,
        custom_url,
    }
}
