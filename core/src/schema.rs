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

//! Schema discovery.
//!
//! Mirrors the shape of the teacher's page cache (`crates/ancla/src/db.rs`'s
//! `page_datas: BTreeMap<Pgid, Arc<Page>>`, a single cache of expensive
//! reads keyed by id) generalized to two sides (source/target) and to
//! describe-by-name instead of read-by-page-id.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::connection::Connection;
use crate::errors::SeedResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrgSide {
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    Int,
    Double,
    Date,
    DateTime,
    Reference,
    Address,
    Location,
    Picklist,
    TextArea,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub writable: bool,
    pub nullable: bool,
    pub is_external_id: bool,
    /// Possible target object types for a reference field. Polymorphic if
    /// `len() > 1`. Empty for non-reference fields.
    pub reference_targets: Vec<String>,
}

impl FieldDescriptor {
    pub fn is_reference(&self) -> bool {
        self.field_type == FieldType::Reference
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.field_type, FieldType::Address | FieldType::Location)
    }
}

#[derive(Debug, Clone)]
pub struct ChildRelationshipDescriptor {
    pub child_object: String,
    pub field_name: String,
    pub cascade_delete: bool,
}

#[derive(Debug, Clone)]
pub struct ObjectDescriptor {
    pub name: String,
    pub label: String,
    pub fields: Vec<FieldDescriptor>,
    pub child_relationships: Vec<ChildRelationshipDescriptor>,
}

impl ObjectDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn writable_field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.writable)
            .map(|f| f.name.clone())
            .collect()
    }
}

/// Child objects the spec's §4.1(a)/(b) deny the seeding pipeline from ever
/// treating as declarable children, regardless of what the operator asks for.
const DENIED_CHILD_OBJECTS: &[&str] = &[
    "ActivityHistory",
    "OpenActivity",
    "Feed",
    "CombinedAttachment",
    "ContentDocumentLink",
    "TopicAssignment",
    "ProcessInstanceHistory",
];

const DENIED_CHILD_SUFFIXES: &[&str] = &[
    "__Feed", "__History", "__Share", "__ChangeEvent", "History", "Feed", "Share", "ChangeEvent",
];

fn is_denied_child(object_name: &str) -> bool {
    DENIED_CHILD_OBJECTS.contains(&object_name)
        || DENIED_CHILD_SUFFIXES
            .iter()
            .any(|suffix| object_name.ends_with(suffix))
}

pub struct SchemaInspector<'c, C: Connection> {
    conn: &'c C,
    cache: Mutex<HashMap<String, ObjectDescriptor>>,
}

impl<'c, C: Connection> SchemaInspector<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self {
            conn,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Objects that are both queryable and createable, sorted by label.
    pub async fn list_insertable_objects(&self) -> SeedResult<Vec<ObjectDescriptor>> {
        let global = self.conn.describe_global().await?;
        let mut out = Vec::new();
        for entry in global.into_iter().filter(|e| e.queryable && e.createable) {
            out.push(self.describe_object(&entry.name).await?);
        }
        out.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(out)
    }

    pub async fn describe_object(&self, object_name: &str) -> SeedResult<ObjectDescriptor> {
        if let Some(cached) = self.cache.lock().unwrap().get(object_name) {
            return Ok(cached.clone());
        }

        let raw = self.conn.describe(object_name).await?;
        let descriptor = ObjectDescriptor {
            name: object_name.to_string(),
            label: raw.label,
            fields: raw
                .fields
                .into_iter()
                .map(|f| FieldDescriptor {
                    name: f.name,
                    field_type: f.field_type,
                    writable: f.createable,
                    nullable: f.nillable,
                    is_external_id: f.is_external_id,
                    reference_targets: f.reference_to,
                })
                .collect(),
            child_relationships: raw
                .child_relationships
                .into_iter()
                .filter_map(|c| {
                    let field_name = c.field_name?;
                    Some(ChildRelationshipDescriptor {
                        child_object: c.child_sobject,
                        field_name,
                        cascade_delete: c.cascade_delete,
                    })
                })
                .collect(),
        };

        self.cache
            .lock()
            .unwrap()
            .insert(object_name.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    /// Discovers children of `object_name`, applying the deny-list and the
    /// "insertable" filter from spec.md §4.1.
    pub async fn discover_children(
        &self,
        object_name: &str,
    ) -> SeedResult<Vec<ChildRelationshipDescriptor>> {
        let insertable = self.insertable_object_names().await?;
        let descriptor = self.describe_object(object_name).await?;

        let mut children: Vec<ChildRelationshipDescriptor> = descriptor
            .child_relationships
            .into_iter()
            .filter(|c| !is_denied_child(&c.child_object))
            .filter(|c| insertable.contains(&c.child_object))
            .collect();
        children.sort_by(|a, b| a.child_object.cmp(&b.child_object));
        Ok(children)
    }

    /// Discovers grandchildren of each declared child, skipping any
    /// grandchild whose object is already in scope (the root itself or a
    /// declared child) to break cycles.
    pub async fn discover_grandchildren(
        &self,
        child_names: &[String],
        root_name: &str,
    ) -> SeedResult<Vec<(String, ChildRelationshipDescriptor)>> {
        let mut in_scope: Vec<&str> = child_names.iter().map(String::as_str).collect();
        in_scope.push(root_name);

        let mut out = Vec::new();
        for child_name in child_names {
            let grandchildren = self.discover_children(child_name).await?;
            for gc in grandchildren {
                if in_scope.contains(&gc.child_object.as_str()) {
                    continue;
                }
                out.push((child_name.clone(), gc));
            }
        }
        Ok(out)
    }

    async fn insertable_object_names(&self) -> SeedResult<std::collections::HashSet<String>> {
        let global = self.conn.describe_global().await?;
        Ok(global
            .into_iter()
            .filter(|e| e.queryable && e.createable)
            .map(|e| e.name)
            .collect())
    }
}
