use crate::sources::SourceSpec;
use anyhow::bail;
use docfix_types::issue::Issue;
use std::collections::BTreeSet;

/// Concatenate per-source issue lists in configured source order.
///
/// Each list is stably sorted by anchor line, so issues on the same line keep
/// the order their source emitted them in.
pub fn merge_issues(per_source: Vec<Vec<Issue>>) -> Vec<Issue> {
    per_source
        .into_iter()
        .flat_map(|mut issues| {
            issues.sort_by_key(|i| i.anchor_line);
            issues
        })
        .collect()
}

/// Source names identify issues in the decision log and must be unique.
pub fn validate_source_names(specs: &[SourceSpec]) -> anyhow::Result<()> {
    let mut seen = BTreeSet::new();
    for spec in specs {
        if spec.name.trim().is_empty() {
            bail!("source of kind `{}` has an empty name", spec.source.kind());
        }
        if !seen.insert(spec.name.as_str()) {
            bail!("duplicate source name `{}`", spec.name);
        }
    }
    Ok(())
}
