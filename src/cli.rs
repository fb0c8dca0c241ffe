// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, value_parser};

fn id_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .required(true)
        .value_parser(value_parser!(i64))
        .help(help)
}

fn opt_id_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_parser(value_parser!(i64))
        .help(help)
}

fn json_flags(cmd: Command) -> Command {
    cmd.arg(Arg::new("json").long("json").action(ArgAction::SetTrue))
        .arg(Arg::new("jsonl").long("jsonl").action(ArgAction::SetTrue))
}

fn range_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("from").long("from").help("Start date YYYY-MM-DD (inclusive)"))
        .arg(Arg::new("to").long("to").help("End date YYYY-MM-DD (inclusive)"))
}

fn entry_fields(cmd: Command, required: bool) -> Command {
    cmd.arg(
        Arg::new("account")
            .long("account")
            .required(required)
            .value_parser(value_parser!(i64))
            .help("Leaf account id"),
    )
    .arg(
        Arg::new("party")
            .long("party")
            .required(required)
            .value_parser(value_parser!(i64))
            .help("Counterparty id"),
    )
    .arg(Arg::new("amount").long("amount").required(required))
    .arg(Arg::new("description").long("description").required(required))
    .arg(
        Arg::new("competence")
            .long("competence")
            .required(required)
            .help("Competence date YYYY-MM-DD"),
    )
    .arg(
        Arg::new("due")
            .long("due")
            .required(required)
            .help("Due date YYYY-MM-DD"),
    )
}

pub fn build_cli() -> Command {
    Command::new("ledgerbook")
        .about("Bookkeeping ledger with bank reconciliation")
        .version(clap::crate_version!())
        .arg(
            Arg::new("owner")
                .long("owner")
                .global(true)
                .env("LEDGERBOOK_OWNER")
                .value_parser(value_parser!(i64))
                .help("Owner id; defaults to the configured default owner"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("config")
                .about("Settings")
                .subcommand(
                    Command::new("set-owner").arg(id_arg("id", "Owner id used when --owner is absent")),
                )
                .subcommand(Command::new("show")),
        )
        .subcommand(
            Command::new("account")
                .about("Chart of accounts")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(
                            Arg::new("kind")
                                .long("kind")
                                .required(true)
                                .value_parser(["income", "expense"]),
                        )
                        .arg(opt_id_arg("parent", "Parent account id")),
                )
                .subcommand(json_flags(Command::new("list")))
                .subcommand(json_flags(range_args(
                    Command::new("tree").arg(
                        Arg::new("status")
                            .long("status")
                            .value_parser(["open", "paid"]),
                    ),
                )))
                .subcommand(
                    Command::new("rename")
                        .arg(id_arg("id", "Account id"))
                        .arg(Arg::new("name").long("name"))
                        .arg(opt_id_arg("parent", "New parent account id"))
                        .arg(
                            Arg::new("root")
                                .long("root")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("parent")
                                .help("Detach from its parent"),
                        ),
                )
                .subcommand(Command::new("rm").arg(id_arg("id", "Account id")))
                .subcommand(
                    Command::new("migrate")
                        .arg(id_arg("from", "Source leaf account"))
                        .arg(id_arg("to", "Target leaf account")),
                ),
        )
        .subcommand(
            Command::new("party")
                .about("Counterparties")
                .subcommand(Command::new("add").arg(Arg::new("name").long("name").required(true)))
                .subcommand(json_flags(Command::new("list")))
                .subcommand(Command::new("rm").arg(id_arg("id", "Counterparty id"))),
        )
        .subcommand(
            Command::new("bank")
                .about("Bank accounts and statements")
                .subcommand(Command::new("add").arg(Arg::new("name").long("name").required(true)))
                .subcommand(json_flags(Command::new("list")))
                .subcommand(
                    Command::new("rename")
                        .arg(id_arg("id", "Bank account id"))
                        .arg(Arg::new("name").long("name").required(true)),
                )
                .subcommand(json_flags(
                    Command::new("statement").arg(id_arg("id", "Bank account id")),
                ))
                .subcommand(Command::new("rebuild").arg(id_arg("id", "Bank account id")))
                .subcommand(Command::new("rm").arg(id_arg("id", "Bank account id"))),
        )
        .subcommand(
            Command::new("entry")
                .about("Income and expense postings")
                .subcommand(entry_fields(Command::new("add"), true).arg(
                    Arg::new("installments")
                        .long("installments")
                        .value_parser(value_parser!(u32))
                        .help("Split into monthly installments"),
                ))
                .subcommand(json_flags(range_args(
                    Command::new("list")
                        .arg(
                            Arg::new("status")
                                .long("status")
                                .value_parser(["open", "paid"]),
                        )
                        .arg(opt_id_arg("account", "Only entries on this account")),
                )))
                .subcommand(entry_fields(
                    Command::new("edit").arg(id_arg("id", "Entry id")),
                    false,
                ))
                .subcommand(
                    Command::new("pay")
                        .arg(id_arg("id", "Entry id"))
                        .arg(id_arg("bank", "Bank account id"))
                        .arg(Arg::new("date").long("date").help("Payment date, default today")),
                )
                .subcommand(Command::new("reverse").arg(id_arg("id", "Entry id")))
                .subcommand(Command::new("rm").arg(id_arg("id", "Entry id")))
                .subcommand(Command::new("rm-plan").arg(id_arg("id", "Installment plan id"))),
        )
        .subcommand(
            Command::new("import")
                .about("Reconcile bank statements")
                .subcommand(json_flags(range_args(
                    Command::new("preview")
                        .arg(Arg::new("path").long("path").required(true))
                        .arg(Arg::new("format").long("format").default_value("ofx")),
                )))
                .subcommand(range_args(
                    Command::new("run")
                        .arg(Arg::new("path").long("path").required(true))
                        .arg(Arg::new("format").long("format").default_value("ofx"))
                        .arg(id_arg("bank", "Bank account id"))
                        .arg(id_arg("party", "Counterparty id"))
                        .arg(opt_id_arg("income", "Leaf account for money in"))
                        .arg(opt_id_arg("expense", "Leaf account for money out"))
                        .arg(Arg::new("due").long("due").help("Due date for all entries"))
                        .arg(
                            Arg::new("competence")
                                .long("competence")
                                .help("Competence date for all entries"),
                        )
                        .arg(
                            Arg::new("only")
                                .long("only")
                                .num_args(1..)
                                .help("Import only these external ids"),
                        ),
                )),
        )
        .subcommand(Command::new("doctor").about("Verify balances against the movement log"))
}
