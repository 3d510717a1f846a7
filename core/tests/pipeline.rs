//! End-to-end pipeline tests against a hand-rolled, in-memory `Connection`.
//!
//! The fake understands just enough SOQL (an object name, `IN (...)` /
//! `=` conditions joined by `AND`) to answer the shapes of query the driver
//! actually builds, so these exercise real classification, preparation, and
//! writer logic rather than a mocked-out driver.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use seedbuddy_core::connection::{
    ChildRelationshipDescribe, Connection, DescribeGlobalEntry, DescribeResult, FieldDescribe, QueryResponse, RecordError,
    UpsertOutcome, WriteOutcome,
};
use seedbuddy_core::schema::FieldType;
use seedbuddy_core::value::Record;
use seedbuddy_core::{ChildPlan, DriverState, PipelineDriver, SeedPlan};
use serde_json::json;

fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
    let mut r = Record::new();
    for (k, v) in pairs {
        r.insert((*k).to_string(), v.clone());
    }
    r
}

fn field(name: &str, field_type: FieldType, writable: bool, nillable: bool, reference_to: &[&str]) -> FieldDescribe {
    FieldDescribe {
        name: name.to_string(),
        field_type,
        createable: writable,
        nillable,
        is_external_id: false,
        reference_to: reference_to.iter().map(|s| s.to_string()).collect(),
    }
}

fn describe(label: &str, fields: Vec<FieldDescribe>) -> DescribeResult {
    DescribeResult {
        label: label.to_string(),
        fields,
        child_relationships: Vec::<ChildRelationshipDescribe>::new(),
    }
}

fn account_describe() -> DescribeResult {
    describe(
        "Account",
        vec![
            field("Id", FieldType::String, false, false, &[]),
            field("Name", FieldType::String, true, true, &[]),
            field("OwnerId", FieldType::Reference, true, true, &["User"]),
            field("ParentId", FieldType::Reference, true, true, &["Account"]),
        ],
    )
}

fn contact_describe() -> DescribeResult {
    describe(
        "Contact",
        vec![
            field("Id", FieldType::String, false, false, &[]),
            field("FirstName", FieldType::String, true, true, &[]),
            field("AccountId", FieldType::Reference, true, false, &["Account"]),
            field("OriginalOwnerAccountId", FieldType::Reference, true, false, &["Account"]),
        ],
    )
}

fn task_describe() -> DescribeResult {
    describe(
        "Task",
        vec![
            field("Id", FieldType::String, false, false, &[]),
            field("Subject", FieldType::String, true, true, &[]),
            field("WhatId", FieldType::Reference, true, true, &["Account", "Contact", "Opportunity"]),
            field("WhoId", FieldType::Reference, true, true, &["Contact", "Lead"]),
        ],
    )
}

fn account_with_campaign_describe() -> DescribeResult {
    let mut d = account_describe();
    d.fields.push(field("CampaignId", FieldType::Reference, true, true, &["Campaign"]));
    d
}

fn campaign_describe() -> DescribeResult {
    describe(
        "Campaign",
        vec![
            field("Id", FieldType::String, false, false, &[]),
            field("Name", FieldType::String, true, true, &[]),
        ],
    )
}

/// An in-memory stand-in for a CRM org. One instance plays the source, a
/// second plays the target; `query` answers against whatever was loaded via
/// `with_records`, `create`/`update` mint ids and record what was written.
struct FakeConnection {
    describes: HashMap<String, DescribeResult>,
    records: Mutex<HashMap<String, Vec<Record>>>,
    created: Mutex<HashMap<String, Vec<Record>>>,
    updated: Mutex<HashMap<String, Vec<Record>>>,
    next_id: Mutex<HashMap<String, u32>>,
    key_prefixes: HashMap<String, &'static str>,
}

impl FakeConnection {
    fn new() -> Self {
        Self {
            describes: HashMap::new(),
            records: Mutex::new(HashMap::new()),
            created: Mutex::new(HashMap::new()),
            updated: Mutex::new(HashMap::new()),
            next_id: Mutex::new(HashMap::new()),
            key_prefixes: HashMap::new(),
        }
    }

    fn with_describe(mut self, object: &str, descriptor: DescribeResult) -> Self {
        self.describes.insert(object.to_string(), descriptor);
        self
    }

    fn with_records(self, object: &str, rows: Vec<Record>) -> Self {
        self.records.lock().unwrap().insert(object.to_string(), rows);
        self
    }

    fn with_key_prefix(mut self, object: &str, prefix: &'static str) -> Self {
        self.key_prefixes.insert(object.to_string(), prefix);
        self
    }

    fn created_records(&self, object: &str) -> Vec<Record> {
        self.created.lock().unwrap().get(object).cloned().unwrap_or_default()
    }

    fn updated_records(&self, object: &str) -> Vec<Record> {
        self.updated.lock().unwrap().get(object).cloned().unwrap_or_default()
    }

    fn mint_id(&self, object: &str) -> String {
        let mut counters = self.next_id.lock().unwrap();
        let counter = counters.entry(object.to_string()).or_insert(0);
        *counter += 1;
        let prefix = self.key_prefixes.get(object).copied().unwrap_or("xxx-");
        format!("{prefix}{:03}", counter)
    }

    fn run_query(&self, soql: &str) -> Vec<Record> {
        let object = parse_from(soql);
        let store = self.records.lock().unwrap();
        let Some(rows) = store.get(&object) else { return Vec::new() };
        match parse_where(soql) {
            None => rows.clone(),
            Some(w) => rows.iter().filter(|r| matches_where(r, &w)).cloned().collect(),
        }
    }
}

fn parse_from(soql: &str) -> String {
    let after_from = soql.split(" FROM ").nth(1).unwrap_or("");
    let end = after_from.find(" WHERE ").or_else(|| after_from.find(" LIMIT ")).unwrap_or(after_from.len());
    after_from[..end].trim().to_string()
}

fn parse_where(soql: &str) -> Option<String> {
    let start = soql.find(" WHERE ")? + " WHERE ".len();
    let rest = &soql[start..];
    let end = rest.find(" LIMIT ").unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

fn strip_quotes(s: &str) -> String {
    s.trim().trim_matches('\'').replace("\\'", "'").replace("\\\\", "\\")
}

fn matches_condition(record: &Record, condition: &str) -> bool {
    if let Some(idx) = condition.find(" IN (") {
        let field_name = condition[..idx].trim();
        let list_start = idx + " IN (".len();
        let list_end = condition.rfind(')').unwrap_or(condition.len());
        let values: Vec<String> = condition[list_start..list_end].split(',').map(strip_quotes).collect();
        let actual = record.get(field_name).and_then(|v| v.as_str()).unwrap_or("");
        return values.iter().any(|v| v == actual);
    }
    if let Some(idx) = condition.find(" = true") {
        let field_name = condition[..idx].trim();
        return record.get(field_name).and_then(|v| v.as_bool()).unwrap_or(false);
    }
    if let Some(idx) = condition.find(" = '") {
        let field_name = condition[..idx].trim();
        let value = strip_quotes(&condition[idx + 3..]);
        let actual = record.get(field_name).and_then(|v| v.as_str()).unwrap_or("");
        return actual == value;
    }
    false
}

fn matches_where(record: &Record, where_clause: &str) -> bool {
    where_clause.split(" AND ").all(|cond| matches_condition(record, cond.trim()))
}

#[async_trait]
impl Connection for FakeConnection {
    async fn describe_global(&self) -> anyhow::Result<Vec<DescribeGlobalEntry>> {
        Ok(self
            .describes
            .keys()
            .map(|name| DescribeGlobalEntry {
                name: name.clone(),
                label: name.clone(),
                queryable: true,
                createable: true,
                key_prefix: None,
            })
            .collect())
    }

    async fn describe(&self, object_name: &str) -> anyhow::Result<DescribeResult> {
        self.describes
            .get(object_name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no describe fixture for {object_name}"))
    }

    async fn query(&self, soql: &str) -> anyhow::Result<QueryResponse> {
        Ok(QueryResponse {
            records: self.run_query(soql),
            done: true,
            next_records_url: None,
            total_size: 0,
        })
    }

    async fn query_more(&self, _next_records_url: &str) -> anyhow::Result<QueryResponse> {
        Ok(QueryResponse::default())
    }

    async fn create(&self, object_name: &str, records: &[Record]) -> anyhow::Result<Vec<WriteOutcome>> {
        let mut created = self.created.lock().unwrap();
        let bucket = created.entry(object_name.to_string()).or_default();
        let mut out = Vec::new();
        for r in records {
            let id = self.mint_id(object_name);
            let mut stored = r.clone();
            stored.insert("Id".to_string(), json!(id.clone()));
            bucket.push(stored);
            out.push(WriteOutcome {
                id: Some(id),
                success: true,
                errors: Vec::<RecordError>::new(),
            });
        }
        Ok(out)
    }

    async fn update(&self, object_name: &str, records: &[Record]) -> anyhow::Result<Vec<WriteOutcome>> {
        let mut updated = self.updated.lock().unwrap();
        let bucket = updated.entry(object_name.to_string()).or_default();
        let mut out = Vec::new();
        for r in records {
            bucket.push(r.clone());
            out.push(WriteOutcome {
                id: r.get("Id").and_then(|v| v.as_str()).map(str::to_owned),
                success: true,
                errors: Vec::<RecordError>::new(),
            });
        }
        Ok(out)
    }

    async fn upsert(&self, object_name: &str, records: &[Record], _external_id_field: &str) -> anyhow::Result<Vec<UpsertOutcome>> {
        let mut created = self.created.lock().unwrap();
        let bucket = created.entry(object_name.to_string()).or_default();
        let mut out = Vec::new();
        for r in records {
            let id = self.mint_id(object_name);
            let mut stored = r.clone();
            stored.insert("Id".to_string(), json!(id.clone()));
            bucket.push(stored);
            out.push(UpsertOutcome {
                id: Some(id),
                success: true,
                created: true,
                errors: Vec::<RecordError>::new(),
            });
        }
        Ok(out)
    }

    fn instance_url(&self) -> &str {
        "https://fake.test"
    }

    fn access_token(&self) -> &str {
        "fake-token"
    }

    fn api_version(&self) -> &str {
        "61.0"
    }

    async fn download(&self, _path: &str) -> anyhow::Result<Vec<u8>> {
        Ok(b"fake bytes".to_vec())
    }
}

#[tokio::test]
async fn seeds_root_only_and_resolves_self_reference_after_insert() {
    let source = FakeConnection::new().with_describe("Account", account_describe()).with_records(
        "Account",
        vec![
            record(&[("Id", json!("001A")), ("Name", json!("Acme")), ("OwnerId", json!("005U1"))]),
            record(&[("Id", json!("001B")), ("Name", json!("Acme EMEA")), ("ParentId", json!("001A"))]),
        ],
    );
    let target = FakeConnection::new().with_describe("Account", account_describe()).with_key_prefix("Account", "acc-");

    let plan = SeedPlan::builder().root_object("Account".to_string()).build();
    let driver = PipelineDriver::new(&source, &target);
    let results = driver.run(&plan).await.unwrap();

    assert_eq!(results.final_state, DriverState::Done);
    let account_counters = &results.counters["Account"];
    assert_eq!(account_counters.queried, 2);
    assert_eq!(account_counters.inserted, 2);
    assert_eq!(account_counters.failed, 0);

    let created = target.created_records("Account");
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|r| r.get("ParentId").is_none()));

    let updated = target.updated_records("Account");
    assert_eq!(updated.len(), 1);
    let update = &updated[0];
    assert_eq!(update.get("Id").and_then(|v| v.as_str()), Some("acc-002"));
    assert_eq!(update.get("ParentId").and_then(|v| v.as_str()), Some("acc-001"));
}

#[tokio::test]
async fn seeds_children_with_in_scope_remap_and_skips_unresolvable_required_reference() {
    let source = FakeConnection::new()
        .with_describe("Account", account_describe())
        .with_describe("Contact", contact_describe())
        .with_records("Account", vec![record(&[("Id", json!("001A")), ("Name", json!("Acme"))])])
        .with_records(
            "Contact",
            vec![
                record(&[
                    ("Id", json!("003A")),
                    ("FirstName", json!("Alice")),
                    ("AccountId", json!("001A")),
                    ("OriginalOwnerAccountId", json!("001A")),
                ]),
                record(&[
                    ("Id", json!("003B")),
                    ("FirstName", json!("Bob")),
                    ("AccountId", json!("001A")),
                    ("OriginalOwnerAccountId", json!("001Q")),
                ]),
            ],
        );
    let target = FakeConnection::new()
        .with_describe("Account", account_describe())
        .with_describe("Contact", contact_describe())
        .with_key_prefix("Account", "acc-")
        .with_key_prefix("Contact", "con-");

    let plan = SeedPlan::builder()
        .root_object("Account".to_string())
        .children(vec![ChildPlan {
            object_name: "Contact".to_string(),
            parent_lookup_field: "AccountId".to_string(),
            external_id_field: None,
            grandchildren: Vec::new(),
        }])
        .build();
    let driver = PipelineDriver::new(&source, &target);
    let results = driver.run(&plan).await.unwrap();

    assert_eq!(results.final_state, DriverState::Done);
    let contact_counters = &results.counters["Contact"];
    assert_eq!(contact_counters.queried, 2);
    assert_eq!(contact_counters.inserted, 1);
    assert_eq!(contact_counters.skipped, 1);

    let created = target.created_records("Contact");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].get("FirstName").and_then(|v| v.as_str()), Some("Alice"));
    assert_eq!(created[0].get("AccountId").and_then(|v| v.as_str()), Some("acc-001"));

    assert_eq!(results.errors.len(), 1);
    assert_eq!(results.errors[0].object, "Contact");
    assert_eq!(results.errors[0].stage, "remap");
}

#[tokio::test]
async fn remaps_polymorphic_activity_reference_through_registry() {
    let source = FakeConnection::new()
        .with_describe("Account", account_describe())
        .with_describe("Task", task_describe())
        .with_records("Account", vec![record(&[("Id", json!("001A")), ("Name", json!("Acme"))])])
        .with_records(
            "Task",
            vec![record(&[("Id", json!("00T1")), ("Subject", json!("Call")), ("WhatId", json!("001A"))])],
        );
    let target = FakeConnection::new()
        .with_describe("Account", account_describe())
        .with_describe("Task", task_describe())
        .with_key_prefix("Account", "acc-")
        .with_key_prefix("Task", "tsk-");

    let plan = SeedPlan::builder().root_object("Account".to_string()).include_tasks(true).build();
    let driver = PipelineDriver::new(&source, &target);
    let results = driver.run(&plan).await.unwrap();

    assert_eq!(results.final_state, DriverState::Done);
    let created = target.created_records("Task");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].get("Subject").and_then(|v| v.as_str()), Some("Call"));
    assert_eq!(created[0].get("WhatId").and_then(|v| v.as_str()), Some("acc-001"));
}

#[tokio::test]
async fn cancellation_after_stage1_stops_before_children_run() {
    let source = FakeConnection::new()
        .with_describe("Account", account_describe())
        .with_describe("Contact", contact_describe())
        .with_records("Account", vec![record(&[("Id", json!("001A")), ("Name", json!("Acme"))])])
        .with_records(
            "Contact",
            vec![record(&[("Id", json!("003A")), ("FirstName", json!("Alice")), ("AccountId", json!("001A"))])],
        );
    let target = FakeConnection::new()
        .with_describe("Account", account_describe())
        .with_describe("Contact", contact_describe())
        .with_key_prefix("Account", "acc-")
        .with_key_prefix("Contact", "con-");

    let plan = SeedPlan::builder()
        .root_object("Account".to_string())
        .children(vec![ChildPlan {
            object_name: "Contact".to_string(),
            parent_lookup_field: "AccountId".to_string(),
            external_id_field: None,
            grandchildren: Vec::new(),
        }])
        .should_abort(Box::new(|| true))
        .build();
    let driver = PipelineDriver::new(&source, &target);
    let results = driver.run(&plan).await.unwrap();

    assert_eq!(results.final_state, DriverState::PartialDone);
    assert_eq!(results.counters["Account"].inserted, 1);
    assert!(!results.counters.contains_key("Contact"));
    assert!(target.created_records("Contact").is_empty());
}

#[tokio::test]
async fn dry_run_makes_zero_writes_even_with_a_data_dependency() {
    let source = FakeConnection::new()
        .with_describe("Account", account_with_campaign_describe())
        .with_describe("Campaign", campaign_describe())
        .with_records(
            "Account",
            vec![record(&[("Id", json!("001A")), ("Name", json!("Acme")), ("CampaignId", json!("701C"))])],
        )
        .with_records("Campaign", vec![record(&[("Id", json!("701C")), ("Name", json!("Expo"))])]);
    let target = FakeConnection::new()
        .with_describe("Account", account_with_campaign_describe())
        .with_describe("Campaign", campaign_describe())
        .with_key_prefix("Account", "acc-")
        .with_key_prefix("Campaign", "cmp-");

    let plan = SeedPlan::builder().root_object("Account".to_string()).dry_run(true).build();
    let driver = PipelineDriver::new(&source, &target);
    let results = driver.run(&plan).await.unwrap();

    assert_eq!(results.final_state, DriverState::Done);
    assert!(target.created_records("Account").is_empty());
    assert!(target.created_records("Campaign").is_empty());
    assert!(target.updated_records("Account").is_empty());
}
