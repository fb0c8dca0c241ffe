// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::OwnerId;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Ledgerbook", "ledgerbook"));

pub const DB_ENV: &str = "LEDGERBOOK_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(DB_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p.trim()));
        }
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("ledgerbook.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        description TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('income','expense')),
        parent_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(parent_id) REFERENCES accounts(id)
    );
    CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts(owner_id);
    CREATE INDEX IF NOT EXISTS idx_accounts_parent ON accounts(parent_id);

    CREATE TABLE IF NOT EXISTS counterparties(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        UNIQUE(owner_id, name)
    );

    CREATE TABLE IF NOT EXISTS bank_accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        description TEXT NOT NULL,
        balance TEXT NOT NULL DEFAULT '0', -- projection of movements
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS installment_groups(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        description TEXT NOT NULL,
        installments INTEGER NOT NULL CHECK(installments > 0)
    );

    CREATE TABLE IF NOT EXISTS entries(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('income','expense')),
        amount TEXT NOT NULL,
        description TEXT NOT NULL,
        counterparty_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        competence_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open','paid')),
        payment_date TEXT,
        bank_account_id INTEGER,
        external_id TEXT,
        installment_group_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        CHECK((status = 'paid') = (bank_account_id IS NOT NULL AND payment_date IS NOT NULL)),
        FOREIGN KEY(counterparty_id) REFERENCES counterparties(id),
        FOREIGN KEY(account_id) REFERENCES accounts(id),
        FOREIGN KEY(bank_account_id) REFERENCES bank_accounts(id),
        FOREIGN KEY(installment_group_id) REFERENCES installment_groups(id)
    );
    CREATE INDEX IF NOT EXISTS idx_entries_owner ON entries(owner_id);
    CREATE INDEX IF NOT EXISTS idx_entries_account ON entries(account_id);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_external
        ON entries(owner_id, external_id) WHERE external_id IS NOT NULL;

    -- append-only: rows are never updated or deleted. entry_id is kept as a
    -- plain reference so a reversed entry can later be deleted.
    CREATE TABLE IF NOT EXISTS movements(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bank_account_id INTEGER NOT NULL,
        entry_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        amount TEXT NOT NULL,
        direction TEXT NOT NULL CHECK(direction IN ('credit','debit')),
        memo TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(bank_account_id) REFERENCES bank_accounts(id)
    );
    CREATE INDEX IF NOT EXISTS idx_movements_bank ON movements(bank_account_id, date);
    "#,
    )?;
    Ok(())
}

// Settings

pub fn get_default_owner(conn: &Connection) -> Result<Option<OwnerId>> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key='default_owner'",
            [],
            |r| r.get(0),
        )
        .optional()?;
    match v {
        Some(s) => {
            let id = s
                .parse::<OwnerId>()
                .with_context(|| format!("Invalid default_owner setting '{}'", s))?;
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

pub fn set_default_owner(conn: &Connection, owner: OwnerId) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES('default_owner', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![owner.to_string()],
    )?;
    Ok(())
}

// Column decoding for values stored as TEXT.

fn conversion_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn decimal_at(r: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = r.get(idx)?;
    s.parse::<Decimal>().map_err(|e| conversion_err(idx, e))
}

pub(crate) fn parsed_at<T>(r: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = r.get(idx)?;
    s.parse::<T>().map_err(|e| conversion_err(idx, e))
}
