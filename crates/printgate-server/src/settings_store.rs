// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The singleton settings record, stored in SQLite.
//
// There is exactly one row (id = 1). The schema is only created when
// automatic migrations are enabled; without it, reads fall back to the
// defaults and writes fail with a database error.

use std::path::Path;
use std::sync::Mutex;

use printgate_core::error::{PrintgateError, Result};
use printgate_core::settings::{PrinterSettings, SettingsSource};
use printgate_core::types::{ColorMode, Orientation};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, instrument, warn};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        app_title TEXT NOT NULL,
        default_color TEXT NOT NULL,
        default_orientation TEXT NOT NULL,
        printer_profile TEXT
    )
"#;

/// Databases created before printers became selectable lack this column.
const MIGRATE_PRINTER_PROFILE_SQL: &str = "ALTER TABLE settings ADD COLUMN printer_profile TEXT";

/// SQLite-backed [`SettingsSource`].
///
/// `rusqlite` is synchronous; every call is a single-row query, so the
/// connection sits behind a plain mutex.
pub struct SqliteSettingsStore {
    conn: Mutex<Connection>,
}

impl SqliteSettingsStore {
    /// Open (or create) the settings database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), migrate))]
    pub fn open(path: impl AsRef<Path>, migrate: bool) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| PrintgateError::Database(format!("open: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| PrintgateError::Database(format!("WAL pragma: {e}")))?;
        if migrate {
            apply_migrations(&conn)?;
        }
        info!("settings database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    fn open_in_memory(migrate: bool) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PrintgateError::Database(format!("open in-memory: {e}")))?;
        if migrate {
            apply_migrations(&conn)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// The stored settings, or the defaults when nothing has been saved (or
    /// the schema has not been created).
    pub fn load(&self) -> Result<PrinterSettings> {
        let conn = self.conn.lock().expect("settings db lock poisoned");
        if !table_exists(&conn)? {
            return Ok(PrinterSettings::default());
        }

        let row = conn
            .query_row(
                "SELECT app_title, default_color, default_orientation, printer_profile
                 FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| PrintgateError::Database(format!("read settings: {e}")))?;

        let Some((app_title, color, orientation, printer_profile)) = row else {
            return Ok(PrinterSettings::default());
        };
        Ok(PrinterSettings {
            app_title,
            default_color: color.parse::<ColorMode>()?,
            default_orientation: orientation.parse::<Orientation>()?,
            printer_profile: printer_profile.filter(|name| !name.trim().is_empty()),
        })
    }

    /// Replace the stored settings.
    #[instrument(skip_all)]
    pub fn save(&self, settings: &PrinterSettings) -> Result<()> {
        let conn = self.conn.lock().expect("settings db lock poisoned");
        conn.execute(
            "INSERT INTO settings (id, app_title, default_color, default_orientation, printer_profile)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 app_title = excluded.app_title,
                 default_color = excluded.default_color,
                 default_orientation = excluded.default_orientation,
                 printer_profile = excluded.printer_profile",
            params![
                settings.app_title,
                settings.default_color.cups_keyword(),
                settings.default_orientation.ipp_enum_value().to_string(),
                settings.printer_profile,
            ],
        )
        .map_err(|e| PrintgateError::Database(format!("save settings: {e}")))?;
        info!(printer = ?settings.printer_profile, "settings saved");
        Ok(())
    }
}

impl SettingsSource for SqliteSettingsStore {
    fn current(&self) -> PrinterSettings {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, "could not read settings, using defaults");
            PrinterSettings::default()
        })
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)
        .map_err(|e| PrintgateError::Database(format!("create table: {e}")))?;
    // Fails harmlessly when the column already exists.
    if conn.execute_batch(MIGRATE_PRINTER_PROFILE_SQL).is_ok() {
        info!("added printer_profile column to settings");
    }
    Ok(())
}

fn table_exists(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'settings'",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
    .map_err(|e| PrintgateError::Database(format!("inspect schema: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_yields_defaults() {
        let store = SqliteSettingsStore::open_in_memory(true).expect("open");
        assert_eq!(store.load().unwrap(), PrinterSettings::default());
    }

    #[test]
    fn saved_settings_are_read_back() {
        let store = SqliteSettingsStore::open_in_memory(true).expect("open");
        let settings = PrinterSettings {
            app_title: "Library Printing".into(),
            default_color: ColorMode::Gray,
            default_orientation: Orientation::Landscape,
            printer_profile: Some("Office_Printer".into()),
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);

        let cleared = PrinterSettings {
            printer_profile: None,
            ..settings
        };
        store.save(&cleared).unwrap();
        assert_eq!(store.current(), cleared);
    }

    #[test]
    fn without_migrations_reads_default_and_writes_fail() {
        let store = SqliteSettingsStore::open_in_memory(false).expect("open");
        assert_eq!(store.current(), PrinterSettings::default());
        let err = store.save(&PrinterSettings::default()).unwrap_err();
        assert!(matches!(err, PrintgateError::Database(_)));
    }

    #[test]
    fn settings_survive_reopening() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("settings.db");
        let settings = PrinterSettings {
            printer_profile: Some("Front_Desk".into()),
            ..PrinterSettings::default()
        };
        SqliteSettingsStore::open(&path, true)
            .unwrap()
            .save(&settings)
            .unwrap();

        let reopened = SqliteSettingsStore::open(&path, false).unwrap();
        assert_eq!(reopened.load().unwrap(), settings);
    }

    #[test]
    fn old_schema_gains_printer_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE settings (
                 id INTEGER PRIMARY KEY CHECK (id = 1),
                 app_title TEXT NOT NULL,
                 default_color TEXT NOT NULL,
                 default_orientation TEXT NOT NULL
             );
             INSERT INTO settings VALUES (1, 'Old', 'Gray', '4');",
        )
        .unwrap();
        apply_migrations(&conn).unwrap();

        let store = SqliteSettingsStore {
            conn: Mutex::new(conn),
        };
        let settings = store.load().unwrap();
        assert_eq!(settings.app_title, "Old");
        assert_eq!(settings.default_color, ColorMode::Gray);
        assert_eq!(settings.default_orientation, Orientation::Landscape);
        assert_eq!(settings.printer_profile, None);
    }
}
