//! Print metadata extraction from the artifact's `metadata.xml` entry.
//!
//! Slicers disagree on the exact `name` attributes they emit, so fields are
//! matched by fuzzy keyword search over a normalized name (lowercased,
//! spaces/underscores/hyphens stripped). The first non-empty match wins per
//! field.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::ImportError;

/// Fields surfaced to the job list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintMetadata {
    pub estimated_time: String,
    pub estimated_length: String,
    pub material_usage: String,
}

impl PrintMetadata {
    /// Serializes the non-empty fields to a JSON object, or the empty string
    /// when nothing was extracted.
    pub fn to_json(&self) -> String {
        let mut fields = Map::new();
        for (key, value) in [
            ("estimated_time", &self.estimated_time),
            ("estimated_length", &self.estimated_length),
            ("material_usage", &self.material_usage),
        ] {
            if !value.is_empty() {
                fields.insert(key.to_string(), Value::String(value.clone()));
            }
        }

        if fields.is_empty() {
            String::new()
        } else {
            Value::Object(fields).to_string()
        }
    }
}

/// Parses `<metadata name="...">value</metadata>` children and picks out the
/// estimated time, filament length, and material usage fields.
pub fn parse_metadata_xml(xml: &str) -> Result<PrintMetadata, ImportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut metadata = PrintMetadata::default();
    let mut current_name: Option<String> = None;
    let mut current_value = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"metadata" => {
                current_name = attribute_value(e, "name")?;
                current_value.clear();
            }
            Ok(Event::Text(e)) => {
                if current_name.is_some() {
                    current_value.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"metadata" => {
                if let Some(name) = current_name.take() {
                    assign_field(&mut metadata, &name, current_value.trim());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ImportError::MetadataXml(e.to_string())),
            _ => {}
        }
    }

    Ok(metadata)
}

fn attribute_value(
    e: &quick_xml::events::BytesStart<'_>,
    name: &str,
) -> Result<Option<String>, ImportError> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|e| ImportError::MetadataXml(e.to_string()))?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|e| ImportError::MetadataXml(e.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn assign_field(metadata: &mut PrintMetadata, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }

    let normalized = normalize_name(name);
    if metadata.estimated_time.is_empty()
        && normalized.contains("time")
        && normalized.contains("estimate")
    {
        metadata.estimated_time = value.to_string();
    } else if metadata.estimated_length.is_empty()
        && (normalized.contains("length") || normalized.contains("filament"))
    {
        metadata.estimated_length = value.to_string();
    } else if metadata.material_usage.is_empty()
        && (normalized.contains("material")
            || normalized.contains("usage")
            || normalized.contains("weight"))
    {
        metadata.material_usage = value.to_string();
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect()
}
