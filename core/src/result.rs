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

//! `SeedResults`: the per-run counters, file-transfer summary, and error log
//! (spec.md §3, §7).

use std::collections::HashMap;

use crate::pipeline::DriverState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectCounters {
    pub queried: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub object: String,
    pub source_id: Option<String>,
    pub stage: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct FileTransferSummary {
    pub documents_found: usize,
    pub versions_downloaded: usize,
    pub versions_created: usize,
    pub links_created: usize,
    pub bytes_transferred: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SeedResults {
    pub counters: HashMap<String, ObjectCounters>,
    pub files: Option<FileTransferSummary>,
    pub errors: Vec<ErrorEntry>,
    pub final_state: DriverState,
}

impl SeedResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters_for(&mut self, object: &str) -> &mut ObjectCounters {
        self.counters.entry(object.to_string()).or_default()
    }

    pub fn record_error(&mut self, object: &str, source_id: Option<String>, stage: &'static str, message: impl Into<String>) {
        self.errors.push(ErrorEntry {
            object: object.to_string(),
            source_id,
            stage,
            message: message.into(),
        });
    }

    /// The first `limit` errors, for the truncated user-visible error list
    /// (spec.md §7).
    pub fn truncated_errors(&self, limit: usize) -> &[ErrorEntry] {
        let n = self.errors.len().min(limit);
        &self.errors[..n]
    }
}
