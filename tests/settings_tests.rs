// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use ledgerbook::db;
use rusqlite::Connection;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn
}

#[test]
fn default_owner_round_trip() {
    let conn = setup();
    assert_eq!(db::get_default_owner(&conn).unwrap(), None);

    db::set_default_owner(&conn, 42).unwrap();
    assert_eq!(db::get_default_owner(&conn).unwrap(), Some(42));

    // Upsert, not a second row.
    db::set_default_owner(&conn, 7).unwrap();
    assert_eq!(db::get_default_owner(&conn).unwrap(), Some(7));
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM settings WHERE key='default_owner'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn corrupt_default_owner_is_reported() {
    let conn = setup();
    conn.execute(
        "INSERT INTO settings(key, value) VALUES('default_owner', 'abc')",
        [],
    )
    .unwrap();
    let err = db::get_default_owner(&conn).unwrap_err();
    assert!(err.to_string().contains("abc"), "{err}");
}

#[test]
fn schema_init_is_idempotent() {
    let mut conn = setup();
    db::set_default_owner(&conn, 5).unwrap();
    db::init_schema(&mut conn).unwrap();
    assert_eq!(db::get_default_owner(&conn).unwrap(), Some(5));
}
