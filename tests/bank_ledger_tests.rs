// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use ledgerbook::ledger::{accounts, bank, counterparties, entries};
use ledgerbook::models::{AccountKind, Direction, EntryDraft, LedgerEntry};
use ledgerbook::{LedgerError, db};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::str::FromStr;

const OWNER: i64 = 7;

fn setup() -> (Connection, i64, i64, i64, i64) {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    let income = accounts::create_account(&mut conn, OWNER, "Consulting", AccountKind::Income, None)
        .unwrap()
        .id;
    let expense = accounts::create_account(&mut conn, OWNER, "Software", AccountKind::Expense, None)
        .unwrap()
        .id;
    let party = counterparties::create_counterparty(&conn, OWNER, "Client").unwrap().id;
    let bank = bank::create_bank_account(&conn, OWNER, "Business").unwrap().id;
    (conn, income, expense, party, bank)
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 4, d).unwrap()
}

fn paid(conn: &mut Connection, account: i64, party: i64, bank_id: i64, amount: &str, on: u32) -> LedgerEntry {
    let e = entries::create_entry(
        conn,
        OWNER,
        &EntryDraft {
            amount: dec(amount),
            description: format!("item {}", amount),
            counterparty_id: party,
            account_id: account,
            competence_date: day(on),
            due_date: day(on),
        },
    )
    .unwrap();
    entries::mark_paid(conn, OWNER, e.id, bank_id, day(on)).unwrap()
}

#[test]
fn statement_is_newest_first_with_signed_amounts() {
    let (mut conn, income, expense, party, bank_id) = setup();
    paid(&mut conn, income, party, bank_id, "300.00", 1);
    paid(&mut conn, expense, party, bank_id, "45.99", 3);
    paid(&mut conn, expense, party, bank_id, "10.01", 3);

    let lines = bank::get_statement(&conn, OWNER, bank_id).unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].amount, dec("-10.01"));
    assert_eq!(lines[1].amount, dec("-45.99"));
    assert_eq!(lines[2].amount, dec("300.00"));
    assert_eq!(lines[2].direction, Direction::Credit);
    assert!(lines[0].movement_id > lines[1].movement_id);
}

#[test]
fn cached_balance_matches_replay() {
    let (mut conn, income, expense, party, bank_id) = setup();
    let a = paid(&mut conn, income, party, bank_id, "1200.00", 1);
    paid(&mut conn, expense, party, bank_id, "99.90", 2);
    entries::reverse(&mut conn, OWNER, a.id).unwrap();
    paid(&mut conn, income, party, bank_id, "0.10", 5);

    let cached = bank::get_bank_account(&conn, OWNER, bank_id).unwrap().balance;
    assert_eq!(cached, dec("-99.80"));
    assert_eq!(bank::replay_balance(&conn, OWNER, bank_id).unwrap(), cached);
    assert!(bank::verify_balances(&conn, OWNER).unwrap().is_empty());
}

#[test]
fn drift_is_detected_and_rebuilt_from_movements() {
    let (mut conn, income, _, party, bank_id) = setup();
    paid(&mut conn, income, party, bank_id, "50.00", 1);
    conn.execute(
        "UPDATE bank_accounts SET balance='999' WHERE id=?1",
        params![bank_id],
    )
    .unwrap();

    let drift = bank::verify_balances(&conn, OWNER).unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].cached, dec("999"));
    assert_eq!(drift[0].replayed, dec("50.00"));

    assert_eq!(bank::rebuild_balance(&mut conn, OWNER, bank_id).unwrap(), dec("50.00"));
    assert!(bank::verify_balances(&conn, OWNER).unwrap().is_empty());
}

#[test]
fn balance_writes_bump_the_version() {
    let (mut conn, income, _, party, bank_id) = setup();
    let v0 = bank::get_bank_account(&conn, OWNER, bank_id).unwrap().version;
    paid(&mut conn, income, party, bank_id, "5", 1);
    let v1 = bank::get_bank_account(&conn, OWNER, bank_id).unwrap().version;
    assert_eq!(v1, v0 + 1);
}

#[test]
fn record_payment_requires_a_paid_entry() {
    let (mut conn, _, expense, party, _) = setup();
    let open = entries::create_entry(
        &mut conn,
        OWNER,
        &EntryDraft {
            amount: dec("1"),
            description: "open".into(),
            counterparty_id: party,
            account_id: expense,
            competence_date: day(1),
            due_date: day(1),
        },
    )
    .unwrap();
    let err = bank::record_payment(&conn, &open).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    let err = bank::record_reversal(&conn, &open).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[test]
fn bank_account_with_history_cannot_be_deleted() {
    let (mut conn, income, _, party, bank_id) = setup();
    let spare = bank::create_bank_account(&conn, OWNER, "Spare").unwrap();
    paid(&mut conn, income, party, bank_id, "5", 1);

    let err = bank::delete_bank_account(&mut conn, OWNER, bank_id).unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)), "{err}");
    bank::delete_bank_account(&mut conn, OWNER, spare.id).unwrap();
    assert_eq!(bank::list_bank_accounts(&conn, OWNER).unwrap().len(), 1);
}

#[test]
fn statements_are_owner_scoped() {
    let (conn, _, _, _, bank_id) = setup();
    let err = bank::get_statement(&conn, OWNER + 1, bank_id).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[test]
fn rename_through_cli_keeps_balance() {
    let (mut conn, income, _, party, bank_id) = setup();
    paid(&mut conn, income, party, bank_id, "12.50", 2);
    let id = bank_id.to_string();
    let matches = ledgerbook::cli::build_cli().get_matches_from([
        "ledgerbook", "bank", "rename", "--id", id.as_str(), "--name", " Operating ",
    ]);
    if let Some(("bank", bank_m)) = matches.subcommand() {
        ledgerbook::commands::bank::handle(&mut conn, OWNER, bank_m).unwrap();
    } else {
        panic!("no bank subcommand");
    }
    let renamed = bank::get_bank_account(&conn, OWNER, bank_id).unwrap();
    assert_eq!(renamed.description, "Operating");
    assert_eq!(renamed.balance, dec("12.50"));

    let err = bank::rename_bank_account(&conn, OWNER + 1, bank_id, "Stolen").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
    let err = bank::rename_bank_account(&conn, OWNER, bank_id, "  ").unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}
