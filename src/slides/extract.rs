//! Row lookup in a CSV export.

use serde_json::{Map, Value};

/// Find the first row whose first cell equals `name` (trimmed,
/// case-insensitive) and return it keyed by header.
///
/// Cells missing from a short row come back as empty strings. Cells past the
/// last header are dropped. Quoted fields are not interpreted.
pub fn find_row(csv: &str, name: &str) -> Option<Map<String, Value>> {
    let mut lines = csv.lines().filter(|line| !line.trim().is_empty());
    let headers: Vec<&str> = lines.next()?.split(',').map(str::trim).collect();
    let wanted = name.trim().to_lowercase();

    lines
        .map(|line| line.split(',').map(str::trim).collect::<Vec<_>>())
        .find(|cells| cells.first().is_some_and(|first| first.to_lowercase() == wanted))
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let cell = cells.get(i).copied().unwrap_or_default();
                    (header.to_string(), Value::String(cell.to_string()))
                })
                .collect()
        })
}
