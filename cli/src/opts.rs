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

use clap::Parser;
use clap_verbosity_flag::Verbosity;

/// Seeds a hierarchy of records from one CRM org into another (spec.md §6).
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Opts {
    #[clap(flatten)]
    pub verbose: Verbosity,

    /// Named source org from the credentials file
    #[arg(short = 's', long)]
    pub source_org: Option<String>,

    /// Named target org from the credentials file
    #[arg(short = 't', long)]
    pub target_org: Option<String>,

    /// Root object type to seed
    #[arg(short = 'o', long)]
    pub object: Option<String>,

    /// Comma-separated child object names
    #[arg(short = 'c', long, value_delimiter = ',')]
    pub children: Vec<String>,

    /// Comma-separated grandchild object names
    #[arg(short = 'g', long, value_delimiter = ',')]
    pub grandchildren: Vec<String>,

    #[arg(long)]
    pub include_tasks: bool,

    #[arg(long)]
    pub include_events: bool,

    #[arg(long)]
    pub include_files: bool,

    /// Number of root records to seed, or "All"
    #[arg(short = 'n', long, default_value = "10")]
    pub count: String,

    /// Additional SOQL WHERE clause on the root object
    #[arg(short = 'w', long)]
    pub where_clause: Option<String>,

    /// External ID field to upsert the root object on
    #[arg(short = 'u', long)]
    pub upsert_field: Option<String>,

    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

impl Opts {
    /// True when enough flags were supplied to skip the interactive prompt
    /// loop (spec.md §6: dual routing).
    pub fn is_non_interactive(&self) -> bool {
        self.source_org.is_some() && self.target_org.is_some() && self.object.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_and_repeated_flags() {
        let opts = Opts::try_parse_from([
            "seedbuddy",
            "-s",
            "dev",
            "-t",
            "uat",
            "-o",
            "Account",
            "-c",
            "Contact,Opportunity",
            "-n",
            "All",
        ])
        .unwrap();

        assert_eq!(opts.source_org.as_deref(), Some("dev"));
        assert_eq!(opts.target_org.as_deref(), Some("uat"));
        assert_eq!(opts.object.as_deref(), Some("Account"));
        assert_eq!(opts.children, vec!["Contact".to_string(), "Opportunity".to_string()]);
        assert!(opts.grandchildren.is_empty());
        assert_eq!(opts.count, "All");
        assert!(!opts.dry_run);
    }

    #[test]
    fn defaults_count_and_boolean_flags_when_omitted() {
        let opts = Opts::try_parse_from(["seedbuddy"]).unwrap();

        assert_eq!(opts.source_org, None);
        assert_eq!(opts.count, "10");
        assert!(!opts.include_tasks);
        assert!(!opts.include_events);
        assert!(!opts.include_files);
        assert!(!opts.dry_run);
    }

    #[test]
    fn is_non_interactive_requires_source_target_and_object() {
        let missing_object = Opts::try_parse_from(["seedbuddy", "-s", "dev", "-t", "uat"]).unwrap();
        assert!(!missing_object.is_non_interactive());

        let complete = Opts::try_parse_from(["seedbuddy", "-s", "dev", "-t", "uat", "-o", "Account"]).unwrap();
        assert!(complete.is_non_interactive());
    }
}
