// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Bank statement decoders.
//!
//! Each decoder turns raw file bytes into an ordered list of candidate
//! transactions. Amounts keep the bank's sign: positive is money in.

use crate::error::{LedgerError, Result};
use crate::models::CandidateTransaction;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementFormat {
    Ofx,
    Csv,
}

impl FromStr for StatementFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ofx" | "qfx" => Ok(StatementFormat::Ofx),
            "csv" => Ok(StatementFormat::Csv),
            other => Err(LedgerError::UnsupportedFormat(other.to_string())),
        }
    }
}

pub trait StatementReader {
    fn read(bytes: &[u8]) -> Result<Vec<CandidateTransaction>>;
}

/// Decode `bytes` according to the type tag (`ofx`, `qfx` or `csv`).
pub fn parse_statement(bytes: &[u8], format_tag: &str) -> Result<Vec<CandidateTransaction>> {
    match format_tag.parse::<StatementFormat>()? {
        StatementFormat::Ofx => Ofx::read(bytes),
        StatementFormat::Csv => CsvStatement::read(bytes),
    }
}

/// Banks still ship OFX in Windows-1252; fall back to a byte-wise decode.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.trim().trim_start_matches('+').replace(',', ".");
    s.parse::<Decimal>().ok()
}

// OFX

/// OFX 1.x (SGML, unclosed leaf tags) and 2.x (XML). Reads the
/// `BANKTRANLIST` section and its `STMTTRN` records.
pub struct Ofx;

static OFX_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z0-9.]+)>([^<\r\n]*)").expect("static regex"));

fn ofx_fields(chunk: &str) -> HashMap<String, String> {
    OFX_FIELD
        .captures_iter(chunk)
        .filter_map(|c| {
            let v = c[2].trim();
            (!v.is_empty()).then(|| (c[1].to_ascii_uppercase(), unescape_xml(v)))
        })
        .collect()
}

/// Decode the predefined XML entities. `&amp;` goes last so `&amp;lt;` stays `&lt;`.
fn unescape_xml(v: &str) -> String {
    if !v.contains('&') {
        return v.to_string();
    }
    v.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn ofx_date(raw: &str) -> Option<NaiveDate> {
    let digits = raw.get(..8)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

impl StatementReader for Ofx {
    fn read(bytes: &[u8]) -> Result<Vec<CandidateTransaction>> {
        let text = decode_text(bytes);
        // ASCII upper-casing keeps byte offsets aligned with `text`.
        let upper = text.to_ascii_uppercase();

        if !upper.contains("<OFX>") {
            return Err(LedgerError::Parse("OFX: missing <OFX> root element".into()));
        }
        let list_start = upper
            .find("<BANKTRANLIST>")
            .ok_or_else(|| LedgerError::Parse("OFX: BANKTRANLIST section not found".into()))?
            + "<BANKTRANLIST>".len();
        let list_end = upper[list_start..]
            .find("</BANKTRANLIST>")
            .map(|i| list_start + i)
            .unwrap_or(upper.len());
        let section = &upper[list_start..list_end];

        let starts: Vec<usize> = section
            .match_indices("<STMTTRN>")
            .map(|(i, m)| list_start + i + m.len())
            .collect();

        let mut out = Vec::with_capacity(starts.len());
        for (n, &start) in starts.iter().enumerate() {
            let next = starts
                .get(n + 1)
                .map(|s| s - "<STMTTRN>".len())
                .unwrap_or(list_end);
            let end = upper[start..next]
                .find("</STMTTRN>")
                .map(|i| start + i)
                .unwrap_or(next);
            let fields = ofx_fields(&text[start..end]);
            let fail = |msg: String| LedgerError::Parse(format!("OFX STMTTRN #{}: {}", n + 1, msg));

            let date_raw = fields
                .get("DTPOSTED")
                .ok_or_else(|| fail("missing DTPOSTED".into()))?;
            let date = ofx_date(date_raw)
                .ok_or_else(|| fail(format!("invalid DTPOSTED '{}'", date_raw)))?;
            let amount_raw = fields
                .get("TRNAMT")
                .ok_or_else(|| fail("missing TRNAMT".into()))?;
            let amount = parse_amount(amount_raw)
                .ok_or_else(|| fail(format!("invalid TRNAMT '{}'", amount_raw)))?;
            let external_id = fields
                .get("FITID")
                .ok_or_else(|| fail("missing FITID".into()))?
                .clone();
            let description = fields
                .get("MEMO")
                .or_else(|| fields.get("NAME"))
                .cloned()
                .unwrap_or_default();

            out.push(CandidateTransaction {
                date,
                amount,
                description,
                external_id,
            });
        }
        Ok(out)
    }
}

// CSV

/// Comma separated export with a `date,description,amount,id` header.
pub struct CsvStatement;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    #[serde(default)]
    description: String,
    amount: String,
    id: String,
}

impl StatementReader for CsvStatement {
    fn read(bytes: &[u8]) -> Result<Vec<CandidateTransaction>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let mut out = Vec::new();
        for (i, rec) in rdr.deserialize::<CsvRow>().enumerate() {
            let line = i + 2;
            let row = rec.map_err(|e| LedgerError::Parse(format!("CSV line {}: {}", line, e)))?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|_| {
                LedgerError::Parse(format!(
                    "CSV line {}: invalid date '{}', expected YYYY-MM-DD",
                    line, row.date
                ))
            })?;
            let amount = row.amount.parse::<Decimal>().map_err(|_| {
                LedgerError::Parse(format!("CSV line {}: invalid amount '{}'", line, row.amount))
            })?;
            if row.id.is_empty() {
                return Err(LedgerError::Parse(format!("CSV line {}: missing id", line)));
            }
            out.push(CandidateTransaction {
                date,
                amount,
                description: row.description,
                external_id: row.id,
            });
        }
        Ok(out)
    }
}
