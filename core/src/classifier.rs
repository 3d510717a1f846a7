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

//! Reference classification (spec.md §4.3): decides, per writable reference
//! field, whether it should be stripped, deferred for post-insert
//! resolution, remapped through the registry, or pulled in as a shallow
//! dependency.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::registry::IdentityRegistry;
use crate::schema::FieldDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceBucket {
    SystemReference,
    SelfReference,
    InScopeReference,
    DataDependency(String),
}

fn system_lookup_objects() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            // platform identity
            "User", "Group", "Profile", "Role", "PermissionSet", "PermissionSetGroup",
            "ConnectedApplication", "Organization",
            // metadata / config
            "RecordType", "BusinessProcess", "ApexClass", "ApexTrigger", "CustomPermission",
            "EmailTemplate", "Folder", "ListView", "Layout",
            // entitlements
            "BusinessHours", "Entitlement", "EntitlementTemplate", "Milestone", "MilestoneType",
            "SlaProcess",
            // territory / currency / misc platform
            "Division", "QueueSobject", "Calendar", "CollaborationGroup", "Network", "Site",
            "Community", "BrandTemplate", "DandBCompany", "PartnerRole", "DuplicateRecordSet",
            "DuplicateRecordItem", "DuplicateRule", "MatchingRule", "Period", "FiscalYearSettings",
        ]
        .into_iter()
        .collect()
    })
}

pub fn is_system_lookup_object(object: &str) -> bool {
    system_lookup_objects().contains(object)
}

/// Classifies a reference field when preparing the root (core) object.
pub fn classify_root_field(field: &FieldDescriptor, root_object: &str) -> ReferenceBucket {
    let targets = &field.reference_targets;

    if targets.len() == 1 && targets[0] == root_object {
        return ReferenceBucket::SelfReference;
    }

    if targets.iter().all(|t| is_system_lookup_object(t)) {
        return ReferenceBucket::SystemReference;
    }

    if targets.iter().any(|t| t == root_object) {
        return ReferenceBucket::SelfReference;
    }

    let non_system: Vec<&String> = targets.iter().filter(|t| !is_system_lookup_object(t)).collect();
    if non_system.len() == 1 {
        return ReferenceBucket::DataDependency(non_system[0].clone());
    }

    ReferenceBucket::SystemReference
}

/// Classifies a reference field for a non-root tier (child/grandchild): a
/// field is in-scope if any of its possible targets already has registry
/// entries; otherwise it is stripped.
pub fn classify_tier_field(field: &FieldDescriptor, registry: &IdentityRegistry) -> ReferenceBucket {
    if field
        .reference_targets
        .iter()
        .any(|t| registry.has_entries_for(t))
    {
        return ReferenceBucket::InScopeReference;
    }
    ReferenceBucket::SystemReference
}
