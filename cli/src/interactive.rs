//! The interactive prompt loop (spec.md §6): fills in whatever the
//! non-interactive flags left unset.

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};

use crate::opts::Opts;

pub struct ResolvedInputs {
    pub source_org: String,
    pub target_org: String,
    pub object: String,
    pub children: Vec<String>,
    pub grandchildren: Vec<String>,
    pub include_tasks: bool,
    pub include_events: bool,
    pub include_files: bool,
    pub count: String,
    pub where_clause: Option<String>,
    pub upsert_field: Option<String>,
    pub dry_run: bool,
}

pub fn resolve(opts: &Opts) -> Result<ResolvedInputs> {
    let theme = ColorfulTheme::default();

    let source_org = match &opts.source_org {
        Some(v) => v.clone(),
        None => Input::with_theme(&theme).with_prompt("Source org").interact_text()?,
    };
    let target_org = match &opts.target_org {
        Some(v) => v.clone(),
        None => Input::with_theme(&theme).with_prompt("Target org").interact_text()?,
    };
    let object = match &opts.object {
        Some(v) => v.clone(),
        None => Input::with_theme(&theme).with_prompt("Root object").interact_text()?,
    };

    let children = if opts.children.is_empty() {
        prompt_csv(&theme, "Child objects (comma-separated, blank for none)")?
    } else {
        opts.children.clone()
    };
    let grandchildren = if opts.grandchildren.is_empty() {
        prompt_csv(&theme, "Grandchild objects (comma-separated, blank for none)")?
    } else {
        opts.grandchildren.clone()
    };

    let include_tasks = opts.include_tasks || confirm(&theme, "Include tasks?")?;
    let include_events = opts.include_events || confirm(&theme, "Include events?")?;
    let include_files = opts.include_files || confirm(&theme, "Include files?")?;
    let dry_run = opts.dry_run || confirm(&theme, "Dry run?")?;

    Ok(ResolvedInputs {
        source_org,
        target_org,
        object,
        children,
        grandchildren,
        include_tasks,
        include_events,
        include_files,
        count: opts.count.clone(),
        where_clause: opts.where_clause.clone(),
        upsert_field: opts.upsert_field.clone(),
        dry_run,
    })
}

fn prompt_csv(theme: &ColorfulTheme, prompt: &str) -> Result<Vec<String>> {
    let raw: String = Input::with_theme(theme).with_prompt(prompt).allow_empty(true).interact_text()?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

fn confirm(theme: &ColorfulTheme, prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(theme).with_prompt(prompt).default(false).interact()?)
}
