// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use ledgerbook::ledger::{accounts, counterparties, entries};
use ledgerbook::models::{
    AccountKind, AccountNode, DateRange, EntryDraft, EntryStatus, PostingFilter,
};
use ledgerbook::{LedgerError, db};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

const OWNER: i64 = 1;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn post(conn: &mut Connection, account_id: i64, amount: &str, on: NaiveDate) -> i64 {
    let party = match counterparties::list_counterparties(conn, OWNER).unwrap().first() {
        Some(p) => p.id,
        None => counterparties::create_counterparty(conn, OWNER, "ACME").unwrap().id,
    };
    entries::create_entry(
        conn,
        OWNER,
        &EntryDraft {
            amount: dec(amount),
            description: "posting".into(),
            counterparty_id: party,
            account_id,
            competence_date: on,
            due_date: on,
        },
    )
    .unwrap()
    .id
}

fn node<'a>(forest: &'a [AccountNode], id: i64) -> &'a AccountNode {
    forest.iter().find_map(|n| n.find(id)).unwrap()
}

#[test]
fn hierarchy_rolls_child_totals_into_parent() {
    let mut conn = setup();
    let revenue = accounts::create_account(&mut conn, OWNER, "Revenue", AccountKind::Income, None).unwrap();
    let salary =
        accounts::create_account(&mut conn, OWNER, "Salary", AccountKind::Income, Some(revenue.id)).unwrap();
    post(&mut conn, salary.id, "1000.00", day(2025, 1, 10));

    let forest = accounts::get_hierarchy(&mut conn, OWNER, &PostingFilter::default()).unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(node(&forest, revenue.id).total, dec("1000.00"));
    assert_eq!(node(&forest, revenue.id).own_total, Decimal::ZERO);
    assert_eq!(node(&forest, salary.id).total, dec("1000.00"));
}

#[test]
fn hierarchy_total_equals_own_plus_children_under_filters() {
    let mut conn = setup();
    let housing = accounts::create_account(&mut conn, OWNER, "Housing", AccountKind::Expense, None).unwrap();
    let rent = accounts::create_account(&mut conn, OWNER, "Rent", AccountKind::Expense, Some(housing.id)).unwrap();
    let utilities =
        accounts::create_account(&mut conn, OWNER, "Utilities", AccountKind::Expense, Some(housing.id)).unwrap();
    let power =
        accounts::create_account(&mut conn, OWNER, "Power", AccountKind::Expense, Some(utilities.id)).unwrap();
    let water =
        accounts::create_account(&mut conn, OWNER, "Water", AccountKind::Expense, Some(utilities.id)).unwrap();

    post(&mut conn, rent.id, "500.00", day(2025, 1, 5));
    post(&mut conn, rent.id, "500.00", day(2025, 2, 5));
    post(&mut conn, power.id, "80.10", day(2025, 1, 20));
    post(&mut conn, water.id, "30.05", day(2025, 2, 20));

    let filters = [
        PostingFilter::default(),
        PostingFilter {
            range: DateRange::new(Some(day(2025, 1, 1)), Some(day(2025, 1, 31))),
            status: None,
        },
        PostingFilter {
            range: DateRange::default(),
            status: Some(EntryStatus::Paid),
        },
    ];
    fn check(n: &AccountNode) {
        let kids: Decimal = n.children.iter().map(|c| c.total).sum();
        assert_eq!(n.total, n.own_total + kids, "account {}", n.account.description);
        n.children.iter().for_each(check);
    }
    for f in &filters {
        let forest = accounts::get_hierarchy(&mut conn, OWNER, f).unwrap();
        forest.iter().for_each(check);
    }

    let all = accounts::get_hierarchy(&mut conn, OWNER, &filters[0]).unwrap();
    assert_eq!(node(&all, housing.id).total, dec("1110.15"));
    assert_eq!(node(&all, utilities.id).total, dec("110.15"));

    let january = accounts::get_hierarchy(&mut conn, OWNER, &filters[1]).unwrap();
    assert_eq!(node(&january, housing.id).total, dec("580.10"));

    let paid = accounts::get_hierarchy(&mut conn, OWNER, &filters[2]).unwrap();
    assert_eq!(node(&paid, housing.id).total, Decimal::ZERO);
}

#[test]
fn delete_blocked_by_children_then_postings() {
    let mut conn = setup();
    let housing = accounts::create_account(&mut conn, OWNER, "Housing", AccountKind::Expense, None).unwrap();
    let rent = accounts::create_account(&mut conn, OWNER, "Rent", AccountKind::Expense, Some(housing.id)).unwrap();
    post(&mut conn, rent.id, "500.00", day(2025, 3, 1));

    let err = accounts::delete_account(&mut conn, OWNER, housing.id).unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(ref m) if m.contains("sub-accounts")), "{err}");
    let err = accounts::delete_account(&mut conn, OWNER, rent.id).unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(ref m) if m.contains("posting")), "{err}");

    // Clear the leaf, then the tree can be removed bottom-up.
    let other = accounts::create_account(&mut conn, OWNER, "Misc", AccountKind::Expense, None).unwrap();
    assert_eq!(accounts::migrate_postings(&mut conn, OWNER, rent.id, other.id).unwrap(), 1);
    accounts::delete_account(&mut conn, OWNER, rent.id).unwrap();
    accounts::delete_account(&mut conn, OWNER, housing.id).unwrap();
    assert_eq!(accounts::list_accounts(&conn, OWNER).unwrap().len(), 1);
}

#[test]
fn postings_rejected_on_non_leaf() {
    let mut conn = setup();
    let party = counterparties::create_counterparty(&conn, OWNER, "ACME").unwrap();
    let parent = accounts::create_account(&mut conn, OWNER, "Food", AccountKind::Expense, None).unwrap();
    accounts::create_account(&mut conn, OWNER, "Groceries", AccountKind::Expense, Some(parent.id)).unwrap();

    let err = entries::create_entry(
        &mut conn,
        OWNER,
        &EntryDraft {
            amount: dec("10"),
            description: "bread".into(),
            counterparty_id: party.id,
            account_id: parent.id,
            competence_date: day(2025, 1, 1),
            due_date: day(2025, 1, 1),
        },
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)), "{err}");
}

#[test]
fn child_must_share_parent_kind() {
    let mut conn = setup();
    let income = accounts::create_account(&mut conn, OWNER, "Revenue", AccountKind::Income, None).unwrap();
    let err =
        accounts::create_account(&mut conn, OWNER, "Rent", AccountKind::Expense, Some(income.id)).unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)), "{err}");

    let err = accounts::create_account(&mut conn, OWNER, "Ghost", AccountKind::Income, Some(999)).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "Account", id: 999 }));
}

#[test]
fn parent_with_postings_cannot_gain_children() {
    let mut conn = setup();
    let leaf = accounts::create_account(&mut conn, OWNER, "Fuel", AccountKind::Expense, None).unwrap();
    post(&mut conn, leaf.id, "50", day(2025, 1, 1));
    let err = accounts::create_account(&mut conn, OWNER, "Diesel", AccountKind::Expense, Some(leaf.id))
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)), "{err}");
}

#[test]
fn reparent_rejects_self_and_descendants() {
    let mut conn = setup();
    let a = accounts::create_account(&mut conn, OWNER, "A", AccountKind::Expense, None).unwrap();
    let b = accounts::create_account(&mut conn, OWNER, "B", AccountKind::Expense, Some(a.id)).unwrap();
    let c = accounts::create_account(&mut conn, OWNER, "C", AccountKind::Expense, Some(b.id)).unwrap();

    let err = accounts::update_account(&mut conn, OWNER, a.id, "A", Some(a.id)).unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));
    let err = accounts::update_account(&mut conn, OWNER, a.id, "A", Some(c.id)).unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(ref m) if m.contains("cycle")), "{err}");

    // Moving a leaf up the tree and renaming in place both work.
    let moved = accounts::update_account(&mut conn, OWNER, c.id, "C2", Some(a.id)).unwrap();
    assert_eq!(moved.parent_id, Some(a.id));
    assert_eq!(moved.description, "C2");
    let root = accounts::update_account(&mut conn, OWNER, b.id, "B", None).unwrap();
    assert_eq!(root.parent_id, None);

    let forest = accounts::get_hierarchy(&mut conn, OWNER, &PostingFilter::default()).unwrap();
    assert_eq!(forest.len(), 2);
}

#[test]
fn migrate_requires_matching_leaf_kinds() {
    let mut conn = setup();
    let inc = accounts::create_account(&mut conn, OWNER, "Sales", AccountKind::Income, None).unwrap();
    let exp = accounts::create_account(&mut conn, OWNER, "Costs", AccountKind::Expense, None).unwrap();
    post(&mut conn, inc.id, "10", day(2025, 1, 1));

    let err = accounts::migrate_postings(&mut conn, OWNER, inc.id, exp.id).unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)), "{err}");
    let err = accounts::migrate_postings(&mut conn, OWNER, inc.id, inc.id).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(
        entries::list_entries(&conn, OWNER, &Default::default()).unwrap()[0].account_id,
        inc.id
    );
}

#[test]
fn accounts_are_scoped_by_owner() {
    let mut conn = setup();
    let mine = accounts::create_account(&mut conn, OWNER, "Mine", AccountKind::Income, None).unwrap();
    accounts::create_account(&mut conn, 2, "Theirs", AccountKind::Income, None).unwrap();

    assert_eq!(accounts::list_accounts(&conn, OWNER).unwrap().len(), 1);
    let err = accounts::get_account(&conn, 2, mine.id).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
    let err = accounts::create_account(&mut conn, 2, "Child", AccountKind::Income, Some(mine.id)).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
    let err = accounts::delete_account(&mut conn, 2, mine.id).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[test]
fn hierarchy_total_overflow_is_an_error() {
    let mut conn = setup();
    let parent = accounts::create_account(&mut conn, OWNER, "Big", AccountKind::Income, None).unwrap();
    let a = accounts::create_account(&mut conn, OWNER, "A", AccountKind::Income, Some(parent.id)).unwrap();
    let b = accounts::create_account(&mut conn, OWNER, "B", AccountKind::Income, Some(parent.id)).unwrap();
    post(&mut conn, a.id, "50000000000000000000000000000", day(2025, 1, 1));
    post(&mut conn, b.id, "50000000000000000000000000000", day(2025, 1, 1));

    let err = accounts::get_hierarchy(&mut conn, OWNER, &PostingFilter::default()).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(ref m) if m.contains("overflow")), "{err}");
}
