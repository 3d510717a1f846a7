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

//! The writer (spec.md §4.5): batches prepared records into fixed-size bulk
//! writes, records new identity mappings, and reports per-record
//! success/failure.

use tracing::{info, warn};

use crate::connection::{Connection, RecordError};
use crate::errors::SeedError;
use crate::registry::IdentityRegistry;
use crate::result::SeedResults;
use crate::soql::{self, BATCH_SIZE};
use crate::value::Record;

#[derive(Debug, Clone, Default)]
pub struct InsertStats {
    pub inserted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

pub fn format_record_errors(errors: &[RecordError]) -> String {
    if errors.is_empty() {
        return "Unknown error".to_string();
    }
    errors
        .iter()
        .map(|e| {
            if e.fields.is_empty() {
                format!("{}: {}", e.status_code, e.message)
            } else {
                format!("{}: {} [{}]", e.status_code, e.message, e.fields.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn batch_insert<C: Connection>(
    conn: &C,
    object: &str,
    records: &[Record],
    source_ids: &[String],
    registry: &mut IdentityRegistry,
    results: &mut SeedResults,
    dry_run: bool,
) -> anyhow::Result<InsertStats> {
    debug_assert_eq!(records.len(), source_ids.len());

    if dry_run {
        info!(object, count = records.len(), "dry run: would insert");
        return Ok(InsertStats {
            inserted: records.len(),
            failed: 0,
        });
    }

    let mut stats = InsertStats::default();
    for (chunk_records, chunk_ids) in records.chunks(BATCH_SIZE).zip(source_ids.chunks(BATCH_SIZE)) {
        let outcomes = conn.create(object, chunk_records).await?;
        for (j, outcome) in outcomes.into_iter().enumerate() {
            let source_id = &chunk_ids[j];
            if outcome.success {
                if let Some(target_id) = outcome.id {
                    registry.insert(object, source_id.clone(), target_id)?;
                    stats.inserted += 1;
                    continue;
                }
            }
            stats.failed += 1;
            let message = format_record_errors(&outcome.errors);
            warn!(object, source_id, message, "insert failed");
            results.record_error(object, Some(source_id.clone()), "insert", message);
        }
    }
    Ok(stats)
}

pub async fn batch_upsert<C: Connection>(
    conn: &C,
    object: &str,
    records: &[Record],
    source_ids: &[String],
    external_id_field: &str,
    registry: &mut IdentityRegistry,
    results: &mut SeedResults,
    dry_run: bool,
) -> anyhow::Result<UpsertStats> {
    debug_assert_eq!(records.len(), source_ids.len());

    if dry_run {
        info!(object, count = records.len(), "dry run: would upsert");
        return Ok(UpsertStats {
            inserted: records.len(),
            updated: 0,
            failed: 0,
        });
    }

    let mut stats = UpsertStats::default();
    for (chunk_records, chunk_ids) in records.chunks(BATCH_SIZE).zip(source_ids.chunks(BATCH_SIZE)) {
        let outcomes = conn.upsert(object, chunk_records, external_id_field).await?;

        let mut unregistered: Vec<(usize, String)> = Vec::new();
        for (j, outcome) in outcomes.iter().enumerate() {
            let source_id = &chunk_ids[j];
            if outcome.success {
                if outcome.created {
                    stats.inserted += 1;
                } else {
                    stats.updated += 1;
                }
                if let Some(target_id) = &outcome.id {
                    registry.insert(object, source_id.clone(), target_id.clone())?;
                } else {
                    unregistered.push((j, source_id.clone()));
                }
            } else {
                stats.failed += 1;
                let message = format_record_errors(&outcome.errors);
                warn!(object, source_id, message, "upsert failed");
                results.record_error(object, Some(source_id.clone()), "upsert", message);
            }
        }

        if !unregistered.is_empty() {
            register_by_external_id(
                conn,
                object,
                external_id_field,
                chunk_records,
                &unregistered,
                registry,
                results,
            )
            .await?;
        }
    }
    Ok(stats)
}

/// For upserted records whose outcome carried no target id (commonly an
/// update), query the target for `Id, externalIdField` restricted to the
/// batch's distinct external-id values and register mappings by matching
/// value back to source id.
async fn register_by_external_id<C: Connection>(
    conn: &C,
    object: &str,
    external_id_field: &str,
    chunk_records: &[Record],
    unregistered: &[(usize, String)],
    registry: &mut IdentityRegistry,
    results: &mut SeedResults,
) -> anyhow::Result<()> {
    let mut values = Vec::new();
    let mut value_to_source_id = std::collections::HashMap::new();
    for (index, source_id) in unregistered {
        let Some(value) = chunk_records[*index].get(external_id_field).and_then(|v| v.as_str()) else {
            let err = SeedError::UpsertBackQueryInvariant {
                object: object.to_string(),
                reason: format!("{external_id_field} not populated on source record {source_id}"),
            };
            results.record_error(object, Some(source_id.clone()), "upsert", err.to_string());
            continue;
        };
        values.push(value.to_string());
        value_to_source_id.insert(value.to_string(), source_id.clone());
    }

    if values.is_empty() {
        return Ok(());
    }

    let projection = soql::build_projection(["Id", external_id_field], &[]);
    let rows = soql::query_all_chunked(conn, &values, soql::CHUNK_SIZE, |chunk| {
        let in_clause = soql::in_clause(chunk.iter().cloned());
        soql::build_query(&projection, object, Some(&format!("{external_id_field} IN {in_clause}")), soql::QueryLimit::AllRecords)
    })
    .await?;

    let mut seen_values = std::collections::HashSet::new();
    for row in &rows {
        let Some(ext_value) = row.get(external_id_field).and_then(|v| v.as_str()) else {
            continue;
        };
        if !seen_values.insert(ext_value.to_string()) {
            let err = SeedError::UpsertBackQueryInvariant {
                object: object.to_string(),
                reason: format!("{external_id_field}={ext_value} is not unique in target"),
            };
            results.record_error(object, None, "upsert", err.to_string());
            continue;
        }
        if let (Some(target_id), Some(source_id)) = (row.get("Id").and_then(|v| v.as_str()), value_to_source_id.get(ext_value)) {
            registry.insert(object, source_id.clone(), target_id.to_string())?;
        }
    }

    Ok(())
}
