// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{db_path, get_default_owner, set_default_owner};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set-owner", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            set_default_owner(conn, id)?;
            println!("Default owner set to {}", id);
        }
        Some(("show", _)) => {
            println!("database: {}", db_path()?.display());
            match get_default_owner(conn)? {
                Some(o) => println!("default owner: {}", o),
                None => println!("default owner: (unset)"),
            }
        }
        _ => {}
    }
    Ok(())
}
