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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use seedbuddy_core::connection::rest::RestConnection;
use seedbuddy_core::schema::SchemaInspector;
use seedbuddy_core::{ChildPlan, GrandchildPlan, PipelineDriver, RecordCount, SeedPlan};

use crate::config;
use crate::interactive::{self, ResolvedInputs};
use crate::opts::Opts;
use crate::report;

pub async fn run(opts: Opts) -> Result<()> {
    let inputs = if opts.is_non_interactive() {
        ResolvedInputs {
            source_org: opts.source_org.clone().expect("checked by is_non_interactive"),
            target_org: opts.target_org.clone().expect("checked by is_non_interactive"),
            object: opts.object.clone().expect("checked by is_non_interactive"),
            children: opts.children.clone(),
            grandchildren: opts.grandchildren.clone(),
            include_tasks: opts.include_tasks,
            include_events: opts.include_events,
            include_files: opts.include_files,
            count: opts.count.clone(),
            where_clause: opts.where_clause.clone(),
            upsert_field: opts.upsert_field.clone(),
            dry_run: opts.dry_run,
        }
    } else {
        interactive::resolve(&opts)?
    };

    let source_creds = config::load_org(&inputs.source_org)?;
    let target_creds = config::load_org(&inputs.target_org)?;
    let source = RestConnection::new(source_creds.instance_url, source_creds.access_token, source_creds.api_version);
    let target = RestConnection::new(target_creds.instance_url, target_creds.access_token, target_creds.api_version);

    let abort_flag = Arc::new(AtomicBool::new(false));
    install_signal_handler(abort_flag.clone());

    let plan = build_plan(&source, &inputs, abort_flag).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}").unwrap());
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner.set_message(format!("seeding {}", plan.root_object));

    let driver = PipelineDriver::new(&source, &target);
    let outcome = driver.run(&plan).await;

    match outcome {
        Ok(results) => {
            spinner.finish_with_message("done");
            report::print_summary(&results);
            Ok(())
        }
        Err(e) => {
            spinner.finish_with_message("failed");
            Err(e)
        }
    }
}

async fn build_plan(source: &RestConnection, inputs: &ResolvedInputs, abort_flag: Arc<AtomicBool>) -> Result<SeedPlan> {
    let schema = SchemaInspector::new(source);

    let mut children = Vec::new();
    if !inputs.children.is_empty() {
        let discovered = schema.discover_children(&inputs.object).await?;
        let mut grandchild_descriptors = Vec::new();
        if !inputs.grandchildren.is_empty() {
            let child_names: Vec<String> = discovered.iter().map(|c| c.child_object.clone()).collect();
            grandchild_descriptors = schema.discover_grandchildren(&child_names, &inputs.object).await?;
        }

        for child_name in &inputs.children {
            let Some(descriptor) = discovered.iter().find(|c| &c.child_object == child_name) else {
                tracing::warn!(child_name, "declared child has no discoverable relationship to root; skipping");
                continue;
            };

            let grandchildren = grandchild_descriptors
                .iter()
                .filter(|(parent, gc)| parent == child_name && inputs.grandchildren.contains(&gc.child_object))
                .map(|(_, gc)| GrandchildPlan {
                    object_name: gc.child_object.clone(),
                    parent_lookup_field: gc.field_name.clone(),
                    external_id_field: None,
                })
                .collect();

            children.push(ChildPlan {
                object_name: descriptor.child_object.clone(),
                parent_lookup_field: descriptor.field_name.clone(),
                external_id_field: None,
                grandchildren,
            });
        }
    }

    let record_count = if inputs.count.eq_ignore_ascii_case("all") {
        RecordCount::AllRecords
    } else {
        RecordCount::Count(inputs.count.parse().unwrap_or(10))
    };

    let plan = SeedPlan::builder()
        .root_object(inputs.object.clone())
        .children(children)
        .include_tasks(inputs.include_tasks)
        .include_events(inputs.include_events)
        .include_files(inputs.include_files)
        .dry_run(inputs.dry_run)
        .record_count(record_count)
        .where_clause(inputs.where_clause.clone())
        .root_external_id_field(inputs.upsert_field.clone())
        .should_abort(Box::new(move || abort_flag.load(Ordering::Relaxed)))
        .build();

    Ok(plan)
}

fn install_signal_handler(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::Relaxed);
        }
    });
}
