//! Printer registry: `{name, host}` rows allocated once and reused across
//! restarts.

use std::collections::HashMap;

use log::warn;
use rusqlite::{params, OptionalExtension};

use crate::config::PrinterDefinition;

use super::{Database, DatabaseError};

/// Looks up (and inserts when missing) a row per configured printer.
/// Returns a map from the printer's session key to its row id. Definitions
/// without a host cannot be addressed and are skipped with a warning.
pub fn ensure_printers(
    db: &Database,
    printers: &[PrinterDefinition],
) -> Result<HashMap<String, i64>, DatabaseError> {
    db.with_conn(|conn| {
        let mut ids = HashMap::new();

        for printer in printers {
            if printer.host.is_empty() {
                warn!("Skipping printer '{}' without host", printer.name);
                continue;
            }

            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM printers WHERE name = ?1 AND host = ?2 LIMIT 1",
                    params![printer.name, printer.host],
                    |r| r.get(0),
                )
                .optional()?;

            let id = match existing {
                Some(id) => id,
                None => {
                    conn.execute(
                        "INSERT INTO printers (name, host, created_at)
                         VALUES (?1, ?2, datetime('now'))",
                        params![printer.name, printer.host],
                    )?;
                    conn.last_insert_rowid()
                }
            };

            ids.insert(printer.key().to_string(), id);
        }

        Ok(ids)
    })
}
