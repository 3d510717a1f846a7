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

//! The record preparer (spec.md §4.4): turns a source record into a
//! target-shaped record by projecting writable fields and rewriting
//! references per the classifier's buckets and the registry.

use std::collections::HashMap;

use crate::classifier::ReferenceBucket;
use crate::registry::IdentityRegistry;
use crate::schema::{FieldDescriptor, ObjectDescriptor};
use crate::value::Record;

pub const SYSTEM_READONLY_FIELDS: &[&str] = &[
    "Id",
    "IsDeleted",
    "CreatedDate",
    "CreatedById",
    "LastModifiedDate",
    "LastModifiedById",
    "SystemModstamp",
    "LastActivityDate",
    "LastViewedDate",
    "LastReferencedDate",
];

pub const ACTIVITY_EXCLUDED_FIELDS: &[&str] = &[
    "IsClosed",
    "IsArchived",
    "IsRecurrence",
    "IsHighPriority",
    "TaskSubtype",
    "EventSubtype",
    "IsGroupEvent",
    "GroupEventType",
    "IsChild",
    "IsAllDayEvent",
    "IsReminderSet",
    "RecurrenceActivityId",
];

/// Computes the insertable field set for a tier (spec.md §4.4):
/// writable-on-source, minus system-readonly, minus the caller's exclusion
/// set, minus compound (`address`/`location`) fields, intersected with the
/// target's writable fields.
pub fn insertable_fields(
    source_descriptor: &ObjectDescriptor,
    target_descriptor: &ObjectDescriptor,
    extra_exclusions: &[&str],
) -> Vec<String> {
    let target_writable: std::collections::HashSet<&str> =
        target_descriptor.fields.iter().filter(|f| f.writable).map(|f| f.name.as_str()).collect();

    source_descriptor
        .fields
        .iter()
        .filter(|f| f.writable)
        .filter(|f| !SYSTEM_READONLY_FIELDS.contains(&f.name.as_str()))
        .filter(|f| !extra_exclusions.contains(&f.name.as_str()))
        .filter(|f| !f.is_compound())
        .filter(|f| target_writable.contains(f.name.as_str()))
        .map(|f| f.name.clone())
        .collect()
}

pub enum PrepareOutcome {
    Prepared(Record),
    Skipped { reason: String },
}

/// Prepares one source record, applying the classifier's buckets for each
/// field descriptor in `fields`. `fields` carries nullability, since an
/// unresolvable required reference skips the record while an unresolvable
/// nullable one just writes null (spec.md §4.4).
pub fn prepare_record(
    source_record: &Record,
    fields: &[&FieldDescriptor],
    classification: &HashMap<String, ReferenceBucket>,
    registry: &IdentityRegistry,
) -> PrepareOutcome {
    let mut out = Record::new();

    for field in fields {
        let name = field.name.as_str();
        let Some(value) = source_record.get(name) else {
            continue;
        };

        match classification.get(name) {
            Some(ReferenceBucket::SelfReference) => continue,
            Some(ReferenceBucket::SystemReference) if !value.is_null() => continue,
            Some(ReferenceBucket::SystemReference) => {
                out.insert(name.to_string(), serde_json::Value::Null);
            }
            Some(ReferenceBucket::InScopeReference) | Some(ReferenceBucket::DataDependency(_)) => {
                if value.is_null() {
                    out.insert(name.to_string(), serde_json::Value::Null);
                    continue;
                }
                let source_id = value.as_str().unwrap_or_default();
                match registry.lookup_any(source_id) {
                    Some(target_id) => {
                        out.insert(name.to_string(), serde_json::Value::String(target_id.to_string()));
                    }
                    None if field.nullable => {
                        out.insert(name.to_string(), serde_json::Value::Null);
                    }
                    None => {
                        return PrepareOutcome::Skipped {
                            reason: format!("required reference {name}={source_id} has no registry entry"),
                        };
                    }
                }
            }
            None => {
                out.insert(name.to_string(), value.clone());
            }
        }
    }

    PrepareOutcome::Prepared(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType};
    use serde_json::json;

    fn descriptor(fields: Vec<(&str, bool, FieldType)>) -> ObjectDescriptor {
        ObjectDescriptor {
            name: "Test".to_string(),
            label: "Test".to_string(),
            fields: fields
                .into_iter()
                .map(|(name, writable, field_type)| FieldDescriptor {
                    name: name.to_string(),
                    field_type,
                    writable,
                    nullable: true,
                    is_external_id: false,
                    reference_targets: Vec::new(),
                })
                .collect(),
            child_relationships: Vec::new(),
        }
    }

    #[test]
    fn intersects_with_target_writable_and_drops_compound() {
        let source = descriptor(vec![
            ("Name", true, FieldType::String),
            ("BillingAddress", true, FieldType::Address),
            ("Id", true, FieldType::String),
            ("CustomField__c", true, FieldType::String),
        ]);
        let target = descriptor(vec![("Name", true, FieldType::String)]);

        let fields = insertable_fields(&source, &target, &[]);
        assert_eq!(fields, vec!["Name".to_string()]);
    }

    fn account_id_field(nullable: bool) -> FieldDescriptor {
        FieldDescriptor {
            name: "AccountId".to_string(),
            field_type: FieldType::Reference,
            writable: true,
            nullable,
            is_external_id: false,
            reference_targets: vec!["Account".to_string()],
        }
    }

    #[test]
    fn required_in_scope_reference_without_registry_entry_is_skipped() {
        let record = {
            let mut r = Record::new();
            r.insert("AccountId".to_string(), json!("001Z"));
            r
        };
        let field = account_id_field(false);
        let fields = vec![&field];
        let mut classification = HashMap::new();
        classification.insert("AccountId".to_string(), ReferenceBucket::InScopeReference);
        let registry = IdentityRegistry::new();

        match prepare_record(&record, &fields, &classification, &registry) {
            PrepareOutcome::Skipped { .. } => {}
            PrepareOutcome::Prepared(_) => panic!("expected skip"),
        }
    }

    #[test]
    fn nullable_unresolvable_reference_writes_null_instead_of_skipping() {
        let record = {
            let mut r = Record::new();
            r.insert("AccountId".to_string(), json!("001Z"));
            r
        };
        let field = account_id_field(true);
        let fields = vec![&field];
        let mut classification = HashMap::new();
        classification.insert("AccountId".to_string(), ReferenceBucket::InScopeReference);
        let registry = IdentityRegistry::new();

        match prepare_record(&record, &fields, &classification, &registry) {
            PrepareOutcome::Prepared(r) => assert!(r.get("AccountId").unwrap().is_null()),
            PrepareOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn in_scope_reference_is_remapped() {
        let record = {
            let mut r = Record::new();
            r.insert("AccountId".to_string(), json!("001A"));
            r
        };
        let field = account_id_field(false);
        let fields = vec![&field];
        let mut classification = HashMap::new();
        classification.insert("AccountId".to_string(), ReferenceBucket::InScopeReference);
        let mut registry = IdentityRegistry::new();
        registry.insert("Account", "001A", "001X").unwrap();

        match prepare_record(&record, &fields, &classification, &registry) {
            PrepareOutcome::Prepared(r) => assert_eq!(r.get("AccountId").unwrap(), "001X"),
            PrepareOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        }
    }
}
