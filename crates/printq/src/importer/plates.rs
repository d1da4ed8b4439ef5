//! Plate derivation from the artifact's per-plate gcode entries.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

use crate::db::PlateDefinition;

/// Derives plates from gcode entry names. An entry carrying `plate_<n>` (or
/// `plate <n>` / `plate-<n>` / `plate<n>`) in its basename contributes plate
/// `n`; anything else falls back to its 1-based position. Duplicate indices
/// collapse to one plate; the result is sorted ascending.
pub fn plates_from_entries(entries: &[String]) -> Vec<PlateDefinition> {
    let pattern = Regex::new(r"(?i)plate[_ -]?([0-9]+)").expect("static plate pattern");

    let mut by_index: BTreeMap<i64, String> = BTreeMap::new();
    for (position, entry) in entries.iter().enumerate() {
        let stem = Path::new(entry)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let parsed = pattern
            .captures(&stem)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .filter(|n| *n > 0);

        let plate_index = parsed.unwrap_or(position as i64 + 1);
        by_index.insert(plate_index, format!("Plate {}", plate_index));
    }

    by_index
        .into_iter()
        .map(|(plate_index, name)| PlateDefinition { plate_index, name })
        .collect()
}
