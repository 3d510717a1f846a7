//! Renders a `SeedResults` as a summary table and a truncated error list
//! (spec.md §7), in the teacher's `comfy_table` idiom (`commands/buckets.rs`,
//! `commands/info.rs`).

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, ContentArrangement, Table};
use seedbuddy_core::SeedResults;

const MAX_ERRORS_SHOWN: usize = 20;

pub fn print_summary(results: &SeedResults) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(NOTHING);
    table.enforce_styling();
    table.set_header(vec!["OBJECT", "QUERIED", "INSERTED", "UPDATED", "FAILED", "SKIPPED"]);

    let mut objects: Vec<&String> = results.counters.keys().collect();
    objects.sort();
    for object in objects {
        let counters = &results.counters[object];
        table.add_row(vec![
            Cell::new(object),
            Cell::new(counters.queried),
            Cell::new(counters.inserted),
            Cell::new(counters.updated),
            Cell::new(counters.failed),
            Cell::new(counters.skipped),
        ]);
    }
    println!("{table}");

    if let Some(files) = &results.files {
        println!(
            "files: {} documents found, {} versions downloaded, {} versions created, {} links created, {} bytes transferred",
            files.documents_found, files.versions_downloaded, files.versions_created, files.links_created, files.bytes_transferred
        );
    }

    if !results.errors.is_empty() {
        println!("\n{} error(s), showing up to {MAX_ERRORS_SHOWN}:", results.errors.len());
        let mut error_table = Table::new();
        error_table.set_content_arrangement(ContentArrangement::Dynamic);
        error_table.load_preset(NOTHING);
        error_table.set_header(vec!["OBJECT", "STAGE", "SOURCE ID", "MESSAGE"]);
        for entry in results.truncated_errors(MAX_ERRORS_SHOWN) {
            error_table.add_row(vec![
                Cell::new(&entry.object),
                Cell::new(entry.stage),
                Cell::new(entry.source_id.as_deref().unwrap_or("-")),
                Cell::new(&entry.message),
            ]);
        }
        println!("{error_table}");
    }
}
