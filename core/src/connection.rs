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

//! The `Connection` trait: the seam spec.md §6 calls an external
//! collaborator ("the connection library itself"). The core depends only on
//! this trait; `rest` below ships one concrete, HTTP-based implementation so
//! the crate is runnable end to end, the way the teacher ships a concrete
//! `DB` behind the abstractions it defines rather than leaving them
//! unimplemented.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::schema::FieldType;
use crate::value::Record;

#[derive(Debug, Clone)]
pub struct DescribeGlobalEntry {
    pub name: String,
    pub label: String,
    pub queryable: bool,
    pub createable: bool,
    pub key_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FieldDescribe {
    pub name: String,
    pub field_type: FieldType,
    pub createable: bool,
    pub nillable: bool,
    pub is_external_id: bool,
    pub reference_to: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChildRelationshipDescribe {
    pub child_sobject: String,
    pub field_name: Option<String>,
    pub cascade_delete: bool,
}

#[derive(Debug, Clone)]
pub struct DescribeResult {
    pub label: String,
    pub fields: Vec<FieldDescribe>,
    pub child_relationships: Vec<ChildRelationshipDescribe>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub records: Vec<Record>,
    pub done: bool,
    pub next_records_url: Option<String>,
    pub total_size: usize,
}

#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub id: Option<String>,
    pub success: bool,
    pub errors: Vec<RecordError>,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub id: Option<String>,
    pub success: bool,
    pub created: bool,
    pub errors: Vec<RecordError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordError {
    pub status_code: String,
    pub message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// The connection interface consumed by the core (spec.md §6).
#[async_trait]
pub trait Connection: Send + Sync {
    async fn describe_global(&self) -> anyhow::Result<Vec<DescribeGlobalEntry>>;
    async fn describe(&self, object_name: &str) -> anyhow::Result<DescribeResult>;
    async fn query(&self, soql: &str) -> anyhow::Result<QueryResponse>;
    async fn query_more(&self, next_records_url: &str) -> anyhow::Result<QueryResponse>;
    async fn create(&self, object_name: &str, records: &[Record]) -> anyhow::Result<Vec<WriteOutcome>>;
    async fn update(&self, object_name: &str, records: &[Record]) -> anyhow::Result<Vec<WriteOutcome>>;
    async fn upsert(
        &self,
        object_name: &str,
        records: &[Record],
        external_id_field: &str,
    ) -> anyhow::Result<Vec<UpsertOutcome>>;

    fn instance_url(&self) -> &str;
    fn access_token(&self) -> &str;
    fn api_version(&self) -> &str;

    /// Downloads the binary body at `path` (relative to `instance_url`),
    /// following redirects, with the bearer token attached.
    async fn download(&self, path: &str) -> anyhow::Result<Vec<u8>>;
}

pub mod rest {
    //! A `reqwest`-based `Connection`. Queries, pagination, and bulk
    //! create/update/upsert are modeled as one HTTP call per batch/page —
    //! the spec describes no Bulk API job/poll protocol, only the bulk
    //! *limits* (200 records per write, 200 values per `IN` clause), so a
    //! synchronous-per-batch REST call is the simplest faithful model.

    use async_trait::async_trait;
    use reqwest::Client;
    use serde_json::json;

    use super::*;

    pub struct RestConnection {
        client: Client,
        instance_url: String,
        access_token: String,
        api_version: String,
    }

    impl RestConnection {
        pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>, api_version: impl Into<String>) -> Self {
            Self {
                client: Client::new(),
                instance_url: instance_url.into(),
                access_token: access_token.into(),
                api_version: api_version.into(),
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}/services/data/v{}{}", self.instance_url, self.api_version, path)
        }
    }

    #[async_trait]
    impl Connection for RestConnection {
        async fn describe_global(&self) -> anyhow::Result<Vec<DescribeGlobalEntry>> {
            #[derive(Deserialize)]
            struct Raw {
                sobjects: Vec<RawEntry>,
            }
            #[derive(Deserialize)]
            struct RawEntry {
                name: String,
                label: String,
                queryable: bool,
                createable: bool,
                #[serde(rename = "keyPrefix")]
                key_prefix: Option<String>,
            }

            let resp: Raw = self
                .client
                .get(self.url("/sobjects"))
                .bearer_auth(&self.access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            Ok(resp
                .sobjects
                .into_iter()
                .map(|e| DescribeGlobalEntry {
                    name: e.name,
                    label: e.label,
                    queryable: e.queryable,
                    createable: e.createable,
                    key_prefix: e.key_prefix,
                })
                .collect())
        }

        async fn describe(&self, object_name: &str) -> anyhow::Result<DescribeResult> {
            #[derive(Deserialize)]
            struct Raw {
                label: String,
                fields: Vec<RawField>,
                #[serde(rename = "childRelationships")]
                child_relationships: Vec<RawChild>,
            }
            #[derive(Deserialize)]
            struct RawField {
                name: String,
                #[serde(rename = "type")]
                field_type: String,
                createable: bool,
                nillable: bool,
                #[serde(rename = "idLookup", default)]
                is_external_id: bool,
                #[serde(rename = "referenceTo", default)]
                reference_to: Vec<String>,
            }
            #[derive(Deserialize)]
            struct RawChild {
                #[serde(rename = "childSObject")]
                child_sobject: String,
                field: Option<String>,
                #[serde(rename = "cascadeDelete", default)]
                cascade_delete: bool,
            }

            let raw: Raw = self
                .client
                .get(self.url(&format!("/sobjects/{object_name}/describe")))
                .bearer_auth(&self.access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            Ok(DescribeResult {
                label: raw.label,
                fields: raw
                    .fields
                    .into_iter()
                    .map(|f| FieldDescribe {
                        name: f.name,
                        field_type: field_type_from_str(&f.field_type),
                        createable: f.createable,
                        nillable: f.nillable,
                        is_external_id: f.is_external_id,
                        reference_to: f.reference_to,
                    })
                    .collect(),
                child_relationships: raw
                    .child_relationships
                    .into_iter()
                    .map(|c| ChildRelationshipDescribe {
                        child_sobject: c.child_sobject,
                        field_name: c.field,
                        cascade_delete: c.cascade_delete,
                    })
                    .collect(),
            })
        }

        async fn query(&self, soql: &str) -> anyhow::Result<QueryResponse> {
            let resp: RawQueryResponse = self
                .client
                .get(self.url("/query"))
                .bearer_auth(&self.access_token)
                .query(&[("q", soql)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(resp.into())
        }

        async fn query_more(&self, next_records_url: &str) -> anyhow::Result<QueryResponse> {
            let resp: RawQueryResponse = self
                .client
                .get(format!("{}{}", self.instance_url, next_records_url))
                .bearer_auth(&self.access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(resp.into())
        }

        async fn create(&self, object_name: &str, records: &[Record]) -> anyhow::Result<Vec<WriteOutcome>> {
            let body = json!({
                "allOrNone": false,
                "records": records.iter().map(|r| with_attributes(object_name, r)).collect::<Vec<_>>(),
            });
            let raw: Vec<RawWriteOutcome> = self
                .client
                .post(self.url("/composite/sobjects"))
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(raw.into_iter().map(Into::into).collect())
        }

        async fn update(&self, object_name: &str, records: &[Record]) -> anyhow::Result<Vec<WriteOutcome>> {
            let body = json!({
                "allOrNone": false,
                "records": records.iter().map(|r| with_attributes(object_name, r)).collect::<Vec<_>>(),
            });
            let raw: Vec<RawWriteOutcome> = self
                .client
                .patch(self.url("/composite/sobjects"))
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(raw.into_iter().map(Into::into).collect())
        }

        async fn upsert(
            &self,
            object_name: &str,
            records: &[Record],
            external_id_field: &str,
        ) -> anyhow::Result<Vec<UpsertOutcome>> {
            let body = json!({
                "allOrNone": false,
                "records": records.iter().map(|r| with_attributes(object_name, r)).collect::<Vec<_>>(),
            });
            let raw: Vec<RawUpsertOutcome> = self
                .client
                .patch(self.url(&format!("/composite/sobjects/{object_name}/{external_id_field}")))
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(raw.into_iter().map(Into::into).collect())
        }

        fn instance_url(&self) -> &str {
            &self.instance_url
        }

        fn access_token(&self) -> &str {
            &self.access_token
        }

        fn api_version(&self) -> &str {
            &self.api_version
        }

        async fn download(&self, path: &str) -> anyhow::Result<Vec<u8>> {
            let bytes = self
                .client
                .get(format!("{}{}", self.instance_url, path))
                .bearer_auth(&self.access_token)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            Ok(bytes.to_vec())
        }
    }

    fn with_attributes(object_name: &str, record: &Record) -> serde_json::Value {
        let mut out = record.clone();
        out.insert(
            "attributes".to_string(),
            json!({ "type": object_name }),
        );
        serde_json::Value::Object(out)
    }

    fn field_type_from_str(s: &str) -> FieldType {
        match s {
            "string" | "id" | "phone" | "url" | "email" | "encryptedstring" => FieldType::String,
            "boolean" => FieldType::Boolean,
            "int" => FieldType::Int,
            "double" | "currency" | "percent" => FieldType::Double,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            "reference" => FieldType::Reference,
            "address" => FieldType::Address,
            "location" => FieldType::Location,
            "picklist" | "multipicklist" => FieldType::Picklist,
            "textarea" => FieldType::TextArea,
            other => FieldType::Other(other.to_string()),
        }
    }

    #[derive(Deserialize)]
    struct RawQueryResponse {
        records: Vec<Record>,
        done: bool,
        #[serde(rename = "nextRecordsUrl")]
        next_records_url: Option<String>,
        #[serde(rename = "totalSize")]
        total_size: usize,
    }

    impl From<RawQueryResponse> for QueryResponse {
        fn from(r: RawQueryResponse) -> Self {
            QueryResponse {
                records: r.records,
                done: r.done,
                next_records_url: r.next_records_url,
                total_size: r.total_size,
            }
        }
    }

    #[derive(Deserialize)]
    struct RawWriteOutcome {
        id: Option<String>,
        success: bool,
        #[serde(default)]
        errors: Vec<RecordError>,
    }

    impl From<RawWriteOutcome> for WriteOutcome {
        fn from(r: RawWriteOutcome) -> Self {
            WriteOutcome {
                id: r.id,
                success: r.success,
                errors: r.errors,
            }
        }
    }

    #[derive(Deserialize)]
    struct RawUpsertOutcome {
        id: Option<String>,
        success: bool,
        #[serde(default)]
        created: bool,
        #[serde(default)]
        errors: Vec<RecordError>,
    }

    impl From<RawUpsertOutcome> for UpsertOutcome {
        fn from(r: RawUpsertOutcome) -> Self {
            UpsertOutcome {
                id: r.id,
                success: r.success,
                created: r.created,
                errors: r.errors,
            }
        }
    }
}
