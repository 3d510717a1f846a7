// MIT License
//
// Copyright (c) 2024 Songlin Yang
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! SOQL composition: projections, WHERE clauses, chunked IN-clauses, and
//! pagination. Chunk size and bulk batch size are both 200 (spec.md §4.2) —
//! this bounds `IN`-clause length under the platform's SOQL size limit and
//! matches the platform's bulk-write batch size limit.

use crate::connection::Connection;
use crate::value::Record;

pub const CHUNK_SIZE: usize = 200;
pub const BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLimit {
    Count(u32),
    AllRecords,
}

/// Backslash-escapes single quotes so a value can be embedded in a SOQL
/// string literal.
pub fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Deduplicating union of `fields` and `extras`, always including `Id`,
/// joined comma-space.
pub fn build_projection<'a>(fields: impl IntoIterator<Item = &'a str>, extras: &[&str]) -> String {
    let mut seen = Vec::new();
    let mut push = |f: &str| {
        if !seen.iter().any(|s: &String| s == f) {
            seen.push(f.to_string());
        }
    };
    push("Id");
    for f in fields {
        push(f);
    }
    for f in extras {
        push(f);
    }
    seen.join(", ")
}

/// Composes `SELECT … FROM object [WHERE …] [LIMIT N]`.
pub fn build_query(projection: &str, object: &str, where_clause: Option<&str>, limit: QueryLimit) -> String {
    let mut soql = format!("SELECT {projection} FROM {object}");
    if let Some(w) = where_clause {
        if !w.trim().is_empty() {
            soql.push_str(" WHERE ");
            soql.push_str(w);
        }
    }
    if let QueryLimit::Count(n) = limit {
        soql.push_str(&format!(" LIMIT {n}"));
    }
    soql
}

/// Joins a list of raw (already-escaped, already-quoted) literals into a
/// SOQL `IN (...)` operand list.
pub fn in_clause(values: impl IntoIterator<Item = String>) -> String {
    let joined = values
        .into_iter()
        .map(|v| format!("'{}'", escape_literal(&v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({joined})")
}

/// Executes `soql` and follows pagination cursors until exhausted.
pub async fn query_all<C: Connection>(conn: &C, soql: &str) -> anyhow::Result<Vec<Record>> {
    let mut out = Vec::new();
    let mut resp = conn.query(soql).await?;
    out.extend(resp.records.drain(..));
    while !resp.done {
        let Some(next) = resp.next_records_url.clone() else {
            break;
        };
        resp = conn.query_more(&next).await?;
        out.extend(resp.records.drain(..));
    }
    Ok(out)
}

/// Splits `values` into fixed-size chunks, invokes `build_soql_for_chunk`
/// per chunk, and concatenates results.
pub async fn query_all_chunked<C, F>(
    conn: &C,
    values: &[String],
    chunk_size: usize,
    mut build_soql_for_chunk: F,
) -> anyhow::Result<Vec<Record>>
where
    C: Connection,
    F: FnMut(&[String]) -> String,
{
    let mut out = Vec::new();
    for chunk in values.chunks(chunk_size.max(1)) {
        let soql = build_soql_for_chunk(chunk);
        out.extend(query_all(conn, &soql).await?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_single_quotes() {
        assert_eq!(escape_literal(r"O'Brien"), r"O\'Brien");
    }

    #[test]
    fn projection_dedupes_and_always_includes_id() {
        let p = build_projection(["Name", "Id", "Name"], &["AccountId"]);
        assert_eq!(p, "Id, Name, AccountId");
    }

    #[test]
    fn limit_all_records_omits_clause() {
        let q = build_query("Id, Name", "Account", None, QueryLimit::AllRecords);
        assert_eq!(q, "SELECT Id, Name FROM Account");
    }

    #[test]
    fn limit_count_appends_clause() {
        let q = build_query("Id", "Account", Some("IsDeleted = false"), QueryLimit::Count(10));
        assert_eq!(q, "SELECT Id FROM Account WHERE IsDeleted = false LIMIT 10");
    }

    #[test]
    fn in_clause_quotes_each_value() {
        assert_eq!(in_clause(["001A".to_string(), "001B".to_string()]), "('001A', '001B')");
    }
}
