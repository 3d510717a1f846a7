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

//! The pipeline driver (spec.md §4.6, §5): runs the six stages in order over
//! a shared `IdentityRegistry`, honoring cooperative cancellation at stage
//! boundaries.

use std::collections::HashMap;

use base64::Engine;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::classifier::{classify_root_field, classify_tier_field, ReferenceBucket};
use crate::connection::Connection;
use crate::prepare::{insertable_fields, prepare_record, PrepareOutcome, ACTIVITY_EXCLUDED_FIELDS};
use crate::registry::IdentityRegistry;
use crate::result::{FileTransferSummary, SeedResults};
use crate::schema::{FieldDescriptor, SchemaInspector};
use crate::soql::{self, QueryLimit};
use crate::value::{id_of, Record};
use crate::writer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCount {
    Count(u32),
    AllRecords,
}

#[derive(Debug, Clone)]
pub struct GrandchildPlan {
    pub object_name: String,
    pub parent_lookup_field: String,
    pub external_id_field: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChildPlan {
    pub object_name: String,
    pub parent_lookup_field: String,
    pub external_id_field: Option<String>,
    pub grandchildren: Vec<GrandchildPlan>,
}

/// The core's only configuration input (spec.md §3). Built with a
/// `typed_builder`, the way the teacher composes `AnclaOptions`.
#[derive(TypedBuilder)]
pub struct SeedPlan {
    pub root_object: String,
    #[builder(default)]
    pub root_external_id_field: Option<String>,
    #[builder(default)]
    pub children: Vec<ChildPlan>,
    #[builder(default)]
    pub include_tasks: bool,
    #[builder(default)]
    pub include_events: bool,
    #[builder(default)]
    pub include_files: bool,
    #[builder(default)]
    pub dry_run: bool,
    #[builder(default = RecordCount::Count(10))]
    pub record_count: RecordCount,
    #[builder(default)]
    pub where_clause: Option<String>,
    #[builder(default = Box::new(|| false))]
    pub should_abort: Box<dyn Fn() -> bool + Send + Sync>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    Idle,
    Stage1,
    Stage2,
    Stage3,
    Stage4,
    Stage5,
    Stage6,
    Done,
    PartialDone,
    EarlyDone,
}

enum StageOutcome {
    Continue,
    Early,
}

pub struct PipelineDriver<'c, C: Connection> {
    source: &'c C,
    target: &'c C,
}

impl<'c, C: Connection> PipelineDriver<'c, C> {
    pub fn new(source: &'c C, target: &'c C) -> Self {
        Self { source, target }
    }

    pub async fn run(&self, plan: &SeedPlan) -> anyhow::Result<SeedResults> {
        let mut registry = IdentityRegistry::new();
        let mut results = SeedResults::new();

        results.final_state = DriverState::Stage1;
        info!(object = %plan.root_object, "stage 1: core object");
        if let StageOutcome::Early = self.run_stage1(plan, &mut registry, &mut results).await? {
            results.final_state = DriverState::EarlyDone;
            return Ok(results);
        }
        if (plan.should_abort)() {
            results.final_state = DriverState::PartialDone;
            return Ok(results);
        }

        results.final_state = DriverState::Stage2;
        info!("stage 2: children");
        self.run_stage2(plan, &mut registry, &mut results).await?;
        if (plan.should_abort)() {
            results.final_state = DriverState::PartialDone;
            return Ok(results);
        }

        results.final_state = DriverState::Stage3;
        info!("stage 3: grandchildren");
        self.run_stage3(plan, &mut registry, &mut results).await?;
        if (plan.should_abort)() {
            results.final_state = DriverState::PartialDone;
            return Ok(results);
        }

        if plan.include_tasks {
            results.final_state = DriverState::Stage4;
            info!("stage 4: tasks");
            self.run_activity_stage(plan, "Task", &mut registry, &mut results).await?;
            if (plan.should_abort)() {
                results.final_state = DriverState::PartialDone;
                return Ok(results);
            }
        }

        if plan.include_events {
            results.final_state = DriverState::Stage5;
            info!("stage 5: events");
            self.run_activity_stage(plan, "Event", &mut registry, &mut results).await?;
            if (plan.should_abort)() {
                results.final_state = DriverState::PartialDone;
                return Ok(results);
            }
        }

        if plan.include_files {
            results.final_state = DriverState::Stage6;
            info!("stage 6: files");
            self.run_file_stage(&mut registry, &mut results, plan.dry_run).await?;
        }

        results.final_state = DriverState::Done;
        Ok(results)
    }

    async fn run_stage1(
        &self,
        plan: &SeedPlan,
        registry: &mut IdentityRegistry,
        results: &mut SeedResults,
    ) -> anyhow::Result<StageOutcome> {
        let source_schema = SchemaInspector::new(self.source);
        let target_schema = SchemaInspector::new(self.target);

        let source_desc = source_schema.describe_object(&plan.root_object).await?;
        let target_desc = target_schema.describe_object(&plan.root_object).await?;
        let fields = insertable_fields(&source_desc, &target_desc, &[]);
        let field_descs: Vec<&FieldDescriptor> = fields.iter().filter_map(|n| source_desc.field(n)).collect();

        let mut classification: HashMap<String, ReferenceBucket> = HashMap::new();
        for field in field_descs.iter().filter(|f| f.is_reference()) {
            classification.insert(field.name.clone(), classify_root_field(field, &plan.root_object));
        }

        let projection = soql::build_projection(fields.iter().map(String::as_str), &[]);
        let limit = match plan.record_count {
            RecordCount::Count(n) => QueryLimit::Count(n),
            RecordCount::AllRecords => QueryLimit::AllRecords,
        };
        let soql_text = soql::build_query(&projection, &plan.root_object, plan.where_clause.as_deref(), limit);
        let mut records = soql::query_all(self.source, &soql_text).await?;
        results.counters_for(&plan.root_object).queried = records.len();

        self.pull_in_data_dependencies(&mut classification, &records, registry, results, plan.dry_run).await;

        self.prepend_out_of_batch_self_ref_parents(&plan.root_object, &projection, &classification, &mut records)
            .await?;

        let self_ref_fields: Vec<String> = classification
            .iter()
            .filter_map(|(name, bucket)| matches!(bucket, ReferenceBucket::SelfReference).then(|| name.clone()))
            .collect();

        let mut prepared = Vec::new();
        let mut prepared_ids = Vec::new();
        for record in &records {
            match prepare_record(record, &field_descs, &classification, registry) {
                PrepareOutcome::Prepared(r) => {
                    if let Some(id) = id_of(record) {
                        prepared.push(r);
                        prepared_ids.push(id);
                    }
                }
                PrepareOutcome::Skipped { reason } => {
                    results.record_error(&plan.root_object, id_of(record), "remap", reason);
                    results.counters_for(&plan.root_object).skipped += 1;
                }
            }
        }

        let (inserted, updated) = if let Some(ext_field) = &plan.root_external_id_field {
            let stats = writer::batch_upsert(
                self.target,
                &plan.root_object,
                &prepared,
                &prepared_ids,
                ext_field,
                registry,
                results,
                plan.dry_run,
            )
            .await?;
            let counters = results.counters_for(&plan.root_object);
            counters.inserted += stats.inserted;
            counters.updated += stats.updated;
            counters.failed += stats.failed;
            (stats.inserted, stats.updated)
        } else {
            let stats =
                writer::batch_insert(self.target, &plan.root_object, &prepared, &prepared_ids, registry, results, plan.dry_run).await?;
            let counters = results.counters_for(&plan.root_object);
            counters.inserted += stats.inserted;
            counters.failed += stats.failed;
            (stats.inserted, 0)
        };

        if !self_ref_fields.is_empty() && !plan.dry_run {
            self.apply_self_reference_updates(&plan.root_object, &records, &self_ref_fields, registry, results)
                .await?;
        }

        if !plan.dry_run && inserted == 0 && updated == 0 {
            return Ok(StageOutcome::Early);
        }
        Ok(StageOutcome::Continue)
    }

    /// Shallow-seeds each DataDependency target: queries the exact
    /// referenced source ids, strips every reference field (no recursion),
    /// and inserts. A failed pull degrades that field to `SystemReference`
    /// so the core's own records strip rather than remap it (spec.md §7).
    async fn pull_in_data_dependencies(
        &self,
        classification: &mut HashMap<String, ReferenceBucket>,
        records: &[Record],
        registry: &mut IdentityRegistry,
        results: &mut SeedResults,
        dry_run: bool,
    ) {
        let data_deps: Vec<(String, String)> = classification
            .iter()
            .filter_map(|(name, bucket)| match bucket {
                ReferenceBucket::DataDependency(target) => Some((name.clone(), target.clone())),
                _ => None,
            })
            .collect();

        for (field_name, target_object) in data_deps {
            let ids: Vec<String> = records
                .iter()
                .filter_map(|r| r.get(&field_name).and_then(|v| v.as_str()).map(str::to_owned))
                .collect();
            if ids.is_empty() {
                continue;
            }
            if let Err(e) = self.shallow_seed(&target_object, &ids, registry, results, dry_run).await {
                warn!(object = %target_object, error = %e, "data dependency pull failed, stripping field");
                classification.insert(field_name, ReferenceBucket::SystemReference);
            }
        }
    }

    async fn shallow_seed(
        &self,
        object: &str,
        source_ids: &[String],
        registry: &mut IdentityRegistry,
        results: &mut SeedResults,
        dry_run: bool,
    ) -> anyhow::Result<()> {
        let source_schema = SchemaInspector::new(self.source);
        let descriptor = source_schema.describe_object(object).await?;
        let field_names = descriptor.writable_field_names();
        let projection = soql::build_projection(field_names.iter().map(String::as_str), &[]);

        let records = soql::query_all_chunked(self.source, source_ids, soql::CHUNK_SIZE, |chunk| {
            soql::build_query(
                &projection,
                object,
                Some(&format!("Id IN {}", soql::in_clause(chunk.iter().cloned()))),
                QueryLimit::AllRecords,
            )
        })
        .await?;

        let mut prepared = Vec::new();
        let mut ids = Vec::new();
        for record in &records {
            let Some(id) = id_of(record) else { continue };
            let mut stripped = record.clone();
            for field in &descriptor.fields {
                if field.is_reference() {
                    stripped.remove(&field.name);
                }
            }
            stripped.remove("Id");
            ids.push(id);
            prepared.push(stripped);
        }

        results.counters_for(object).queried += prepared.len();
        let stats = writer::batch_insert(self.target, object, &prepared, &ids, registry, results, dry_run).await?;
        let counters = results.counters_for(object);
        counters.inserted += stats.inserted;
        counters.failed += stats.failed;
        Ok(())
    }

    /// Pre-pends parent records referenced by a self-reference field that
    /// fall outside the already-fetched batch, so the bulk insert writes
    /// parents before children (spec.md §4.6, §9).
    async fn prepend_out_of_batch_self_ref_parents(
        &self,
        object: &str,
        projection: &str,
        classification: &HashMap<String, ReferenceBucket>,
        records: &mut Vec<Record>,
    ) -> anyhow::Result<()> {
        let self_ref_fields: Vec<&str> = classification
            .iter()
            .filter_map(|(name, bucket)| matches!(bucket, ReferenceBucket::SelfReference).then(|| name.as_str()))
            .collect();
        if self_ref_fields.is_empty() {
            return Ok(());
        }

        let batch_ids: std::collections::HashSet<String> = records.iter().filter_map(id_of).collect();
        let mut outside_ids = Vec::new();
        for field_name in &self_ref_fields {
            for record in records.iter() {
                if let Some(v) = record.get(*field_name).and_then(|v| v.as_str()) {
                    if !batch_ids.contains(v) && !outside_ids.iter().any(|o: &String| o == v) {
                        outside_ids.push(v.to_string());
                    }
                }
            }
        }
        if outside_ids.is_empty() {
            return Ok(());
        }

        let soql_text = soql::build_query(
            projection,
            object,
            Some(&format!("Id IN {}", soql::in_clause(outside_ids))),
            QueryLimit::AllRecords,
        );
        let parents = soql::query_all(self.source, &soql_text).await?;
        let mut combined = parents;
        combined.append(records);
        *records = combined;
        Ok(())
    }

    async fn apply_self_reference_updates(
        &self,
        object: &str,
        source_records: &[Record],
        self_ref_fields: &[String],
        registry: &mut IdentityRegistry,
        results: &mut SeedResults,
    ) -> anyhow::Result<()> {
        let mut updates = Vec::new();
        for record in source_records {
            let Some(source_id) = id_of(record) else { continue };
            let Some(target_id) = registry.lookup_in(object, &source_id).map(str::to_owned) else {
                continue;
            };

            let mut update = Record::new();
            let mut has_resolved_ref = false;
            for field_name in self_ref_fields {
                let Some(ref_source_id) = record.get(field_name).and_then(|v| v.as_str()) else {
                    continue;
                };
                if let Some(ref_target_id) = registry.lookup_in(object, ref_source_id) {
                    update.insert(field_name.clone(), serde_json::Value::String(ref_target_id.to_string()));
                    has_resolved_ref = true;
                }
            }
            if has_resolved_ref {
                update.insert("Id".to_string(), serde_json::Value::String(target_id));
                updates.push(update);
            }
        }

        for chunk in updates.chunks(soql::BATCH_SIZE) {
            let outcomes = self.target.update(object, chunk).await?;
            for outcome in outcomes {
                if !outcome.success {
                    let message = writer::format_record_errors(&outcome.errors);
                    results.record_error(object, outcome.id, "self-ref update", message);
                }
            }
        }
        Ok(())
    }

    async fn run_stage2(&self, plan: &SeedPlan, registry: &mut IdentityRegistry, results: &mut SeedResults) -> anyhow::Result<()> {
        let root_source_ids: Vec<String> = registry
            .object_map(&plan.root_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        if root_source_ids.is_empty() {
            return Ok(());
        }

        for child in &plan.children {
            if (plan.should_abort)() {
                return Ok(());
            }
            self.run_child_tier(
                &child.object_name,
                &child.parent_lookup_field,
                child.external_id_field.as_deref(),
                &root_source_ids,
                registry,
                results,
                plan.dry_run,
            )
            .await?;
        }
        Ok(())
    }

    async fn run_stage3(&self, plan: &SeedPlan, registry: &mut IdentityRegistry, results: &mut SeedResults) -> anyhow::Result<()> {
        for child in &plan.children {
            if (plan.should_abort)() {
                return Ok(());
            }
            let parent_source_ids: Vec<String> = registry
                .object_map(&child.object_name)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default();
            if parent_source_ids.is_empty() {
                info!(object = %child.object_name, "no registry entries for parent; skipping grandchildren");
                continue;
            }
            for grandchild in &child.grandchildren {
                self.run_child_tier(
                    &grandchild.object_name,
                    &grandchild.parent_lookup_field,
                    grandchild.external_id_field.as_deref(),
                    &parent_source_ids,
                    registry,
                    results,
                    plan.dry_run,
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Shared mechanics for Stage 2 (children) and Stage 3 (grandchildren):
    /// describe, classify, chunked-query by parent ids, prepare, insert or
    /// upsert (spec.md §4.6 Stage 2/3).
    async fn run_child_tier(
        &self,
        object: &str,
        parent_lookup_field: &str,
        external_id_field: Option<&str>,
        parent_source_ids: &[String],
        registry: &mut IdentityRegistry,
        results: &mut SeedResults,
        dry_run: bool,
    ) -> anyhow::Result<()> {
        let source_schema = SchemaInspector::new(self.source);
        let target_schema = SchemaInspector::new(self.target);
        let source_desc = source_schema.describe_object(object).await?;
        let target_desc = target_schema.describe_object(object).await?;
        let fields = insertable_fields(&source_desc, &target_desc, &[]);
        let field_descs: Vec<&FieldDescriptor> = fields.iter().filter_map(|n| source_desc.field(n)).collect();

        let mut classification: HashMap<String, ReferenceBucket> = HashMap::new();
        for field in field_descs.iter().filter(|f| f.is_reference()) {
            classification.insert(field.name.clone(), classify_tier_field(field, registry));
        }

        let projection = soql::build_projection(fields.iter().map(String::as_str), &[]);
        let records = soql::query_all_chunked(self.source, parent_source_ids, soql::CHUNK_SIZE, |chunk| {
            soql::build_query(
                &projection,
                object,
                Some(&format!("{parent_lookup_field} IN {}", soql::in_clause(chunk.iter().cloned()))),
                QueryLimit::AllRecords,
            )
        })
        .await?;
        results.counters_for(object).queried += records.len();

        let mut prepared = Vec::new();
        let mut prepared_ids = Vec::new();
        for record in &records {
            match prepare_record(record, &field_descs, &classification, registry) {
                PrepareOutcome::Prepared(r) => {
                    if let Some(id) = id_of(record) {
                        prepared.push(r);
                        prepared_ids.push(id);
                    }
                }
                PrepareOutcome::Skipped { reason } => {
                    results.record_error(object, id_of(record), "remap", reason);
                    results.counters_for(object).skipped += 1;
                }
            }
        }

        if let Some(ext_field) = external_id_field {
            let stats = writer::batch_upsert(self.target, object, &prepared, &prepared_ids, ext_field, registry, results, dry_run).await?;
            let counters = results.counters_for(object);
            counters.inserted += stats.inserted;
            counters.updated += stats.updated;
            counters.failed += stats.failed;
        } else {
            let stats = writer::batch_insert(self.target, object, &prepared, &prepared_ids, registry, results, dry_run).await?;
            let counters = results.counters_for(object);
            counters.inserted += stats.inserted;
            counters.failed += stats.failed;
        }
        Ok(())
    }

    /// Stage 4/5: Tasks and Events carry polymorphic `WhatId`/`WhoId`
    /// fields that may reference any tier already in the registry
    /// (spec.md §4.6).
    async fn run_activity_stage(
        &self,
        plan: &SeedPlan,
        activity_object: &str,
        registry: &mut IdentityRegistry,
        results: &mut SeedResults,
    ) -> anyhow::Result<()> {
        let source_schema = SchemaInspector::new(self.source);
        let target_schema = SchemaInspector::new(self.target);
        let source_desc = source_schema.describe_object(activity_object).await?;
        let target_desc = target_schema.describe_object(activity_object).await?;
        let fields = insertable_fields(&source_desc, &target_desc, ACTIVITY_EXCLUDED_FIELDS);
        let field_descs: Vec<&FieldDescriptor> = fields
            .iter()
            .filter_map(|n| source_desc.field(n))
            .filter(|f| f.name != "WhatId" && f.name != "WhoId")
            .collect();
        let projection = soql::build_projection(fields.iter().map(String::as_str), &["WhatId", "WhoId"]);

        let all_source_ids: Vec<String> = registry.all_source_ids().map(str::to_owned).collect();
        if all_source_ids.is_empty() {
            return Ok(());
        }

        let what_records = soql::query_all_chunked(self.source, &all_source_ids, soql::CHUNK_SIZE, |chunk| {
            soql::build_query(
                &projection,
                activity_object,
                Some(&format!("WhatId IN {}", soql::in_clause(chunk.iter().cloned()))),
                QueryLimit::AllRecords,
            )
        })
        .await?;
        let who_records = soql::query_all_chunked(self.source, &all_source_ids, soql::CHUNK_SIZE, |chunk| {
            soql::build_query(
                &projection,
                activity_object,
                Some(&format!("WhoId IN {}", soql::in_clause(chunk.iter().cloned()))),
                QueryLimit::AllRecords,
            )
        })
        .await?;

        let mut seen = std::collections::HashSet::new();
        let mut records: Vec<Record> = Vec::new();
        for record in what_records.into_iter().chain(who_records) {
            if let Some(id) = id_of(&record) {
                if seen.insert(id) {
                    records.push(record);
                }
            }
        }
        results.counters_for(activity_object).queried = records.len();

        let mut prepared = Vec::new();
        let mut ids = Vec::new();
        for record in &records {
            let Some(id) = id_of(record) else { continue };
            let mut out = Record::new();
            for field in &field_descs {
                if let Some(value) = record.get(field.name.as_str()) {
                    out.insert(field.name.clone(), value.clone());
                }
            }
            for poly_field in ["WhatId", "WhoId"] {
                let Some(value) = record.get(poly_field) else { continue };
                let remapped = match value.as_str() {
                    Some(source_id) => registry
                        .lookup_any(source_id)
                        .map(|t| serde_json::Value::String(t.to_string()))
                        .unwrap_or(serde_json::Value::Null),
                    None => serde_json::Value::Null,
                };
                out.insert(poly_field.to_string(), remapped);
            }
            ids.push(id);
            prepared.push(out);
        }

        let stats = writer::batch_insert(self.target, activity_object, &prepared, &ids, registry, results, plan.dry_run).await?;
        let counters = results.counters_for(activity_object);
        counters.inserted += stats.inserted;
        counters.failed += stats.failed;
        Ok(())
    }

    /// Stage 6: discover links, fetch latest versions, download, re-upload,
    /// and re-link (spec.md §4.6).
    async fn run_file_stage(&self, registry: &mut IdentityRegistry, results: &mut SeedResults, dry_run: bool) -> anyhow::Result<()> {
        let all_source_ids: Vec<String> = registry.all_source_ids().map(str::to_owned).collect();
        if all_source_ids.is_empty() {
            return Ok(());
        }

        let link_projection = soql::build_projection(["ContentDocumentId", "LinkedEntityId"], &[]);
        let links = soql::query_all_chunked(self.source, &all_source_ids, soql::CHUNK_SIZE, |chunk| {
            soql::build_query(
                &link_projection,
                "ContentDocumentLink",
                Some(&format!("LinkedEntityId IN {}", soql::in_clause(chunk.iter().cloned()))),
                QueryLimit::AllRecords,
            )
        })
        .await?;

        let mut doc_ids: Vec<String> = Vec::new();
        for link in &links {
            if let Some(id) = link.get("ContentDocumentId").and_then(|v| v.as_str()) {
                if !doc_ids.iter().any(|d| d == id) {
                    doc_ids.push(id.to_string());
                }
            }
        }
        if doc_ids.is_empty() {
            return Ok(());
        }

        let version_projection = soql::build_projection(
            ["ContentDocumentId", "Title", "PathOnClient", "FileExtension", "ContentSize", "Description"],
            &[],
        );
        let versions = soql::query_all_chunked(self.source, &doc_ids, soql::CHUNK_SIZE, |chunk| {
            soql::build_query(
                &version_projection,
                "ContentVersion",
                Some(&format!(
                    "ContentDocumentId IN {} AND IsLatestVersion = true",
                    soql::in_clause(chunk.iter().cloned())
                )),
                QueryLimit::AllRecords,
            )
        })
        .await?;

        let mut summary = FileTransferSummary {
            documents_found: doc_ids.len(),
            ..Default::default()
        };

        if dry_run {
            summary.bytes_transferred = versions.iter().filter_map(|v| v.get("ContentSize").and_then(|s| s.as_u64())).sum();
            results.files = Some(summary);
            return Ok(());
        }

        let mut doc_registry: HashMap<String, String> = HashMap::new();
        for version in &versions {
            let Some(version_id) = id_of(version) else { continue };
            let Some(source_doc_id) = version.get("ContentDocumentId").and_then(|v| v.as_str()) else {
                continue;
            };

            let path = format!(
                "/services/data/v{}/sobjects/ContentVersion/{version_id}/VersionData",
                self.source.api_version()
            );
            let bytes = match self.source.download(&path).await {
                Ok(b) => b,
                Err(e) => {
                    results.record_error("ContentVersion", Some(version_id), "upload", e.to_string());
                    continue;
                }
            };
            summary.bytes_transferred += bytes.len() as u64;
            summary.versions_downloaded += 1;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

            let mut new_version = Record::new();
            for field in ["Title", "PathOnClient", "Description"] {
                if let Some(value) = version.get(field) {
                    new_version.insert(field.to_string(), value.clone());
                }
            }
            new_version.insert("VersionData".to_string(), serde_json::Value::String(encoded));

            let outcomes = self.target.create("ContentVersion", std::slice::from_ref(&new_version)).await?;
            let Some(outcome) = outcomes.into_iter().next() else { continue };
            if !outcome.success {
                let message = writer::format_record_errors(&outcome.errors);
                results.record_error("ContentVersion", Some(version_id), "upload", message);
                continue;
            }
            let Some(new_version_id) = outcome.id else { continue };
            summary.versions_created += 1;

            let doc_query = soql::build_query(
                "ContentDocumentId",
                "ContentVersion",
                Some(&format!("Id = '{}'", soql::escape_literal(&new_version_id))),
                QueryLimit::Count(1),
            );
            let rows = soql::query_all(self.target, &doc_query).await?;
            let Some(target_doc_id) = rows.first().and_then(|r| r.get("ContentDocumentId")).and_then(|v| v.as_str()) else {
                continue;
            };
            doc_registry.insert(source_doc_id.to_string(), target_doc_id.to_string());
        }

        let mut link_records = Vec::new();
        for link in &links {
            let Some(source_doc_id) = link.get("ContentDocumentId").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(source_entity_id) = link.get("LinkedEntityId").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(target_doc_id) = doc_registry.get(source_doc_id) else { continue };
            let Some(target_entity_id) = registry.lookup_any(source_entity_id) else { continue };

            let mut rec = Record::new();
            rec.insert("ContentDocumentId".to_string(), serde_json::Value::String(target_doc_id.clone()));
            rec.insert("LinkedEntityId".to_string(), serde_json::Value::String(target_entity_id.to_string()));
            rec.insert("ShareType".to_string(), serde_json::Value::String("V".to_string()));
            rec.insert("Visibility".to_string(), serde_json::Value::String("AllUsers".to_string()));
            link_records.push(rec);
        }

        for chunk in link_records.chunks(soql::BATCH_SIZE) {
            let outcomes = self.target.create("ContentDocumentLink", chunk).await?;
            for outcome in outcomes {
                if outcome.success {
                    summary.links_created += 1;
                } else {
                    let message = writer::format_record_errors(&outcome.errors);
                    results.record_error("ContentDocumentLink", None, "link", message);
                }
            }
        }

        results.files = Some(summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_plan_builder_defaults_count_to_ten() {
        let plan = SeedPlan::builder().root_object("Account".to_string()).build();
        assert_eq!(plan.record_count, RecordCount::Count(10));
        assert!(!plan.dry_run);
        assert!(plan.children.is_empty());
    }
}
