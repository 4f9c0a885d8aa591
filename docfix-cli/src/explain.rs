//! Text for the `docfix list-sources` and `docfix explain` commands.

use docfix_domain::{SOURCE_REGISTRY, SourceInfo};
use docfix_types::issue::IssueType;

const RULE: &str =
    "================================================================================";
const THIN_RULE: &str =
    "--------------------------------------------------------------------------------";

pub fn format_produces(produces: &[IssueType]) -> String {
    produces
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_source_list() -> String {
    let mut out = String::from("Available sources:\n\n");
    out.push_str(&format!("  {:<22} {:<24} TITLE\n", "KIND", "PRODUCES"));
    out.push_str(&format!("  {:<22} {:<24} -----\n", "----", "--------"));
    for info in SOURCE_REGISTRY {
        out.push_str(&format!(
            "  {:<22} {:<24} {}\n",
            info.kind,
            format_produces(info.produces),
            info.title
        ));
    }
    out.push_str("\nUse 'docfix explain <kind>' for details.\n");
    out
}

pub fn source_list_json() -> serde_json::Value {
    SOURCE_REGISTRY
        .iter()
        .map(|info| {
            serde_json::json!({
                "kind": info.kind,
                "title": info.title,
                "produces": info.produces,
            })
        })
        .collect()
}

pub fn render_explanation(info: &SourceInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!("{RULE}\nSOURCE: {}\n{RULE}\n\n", info.title));
    out.push_str(&format!("Kind:      {}\n", info.kind));
    out.push_str(&format!("Produces:  {}\n\n", format_produces(info.produces)));

    out.push_str(&format!("DESCRIPTION\n{THIN_RULE}\n{}\n\n", info.description));
    out.push_str(&format!("EXAMPLE (docfix.toml)\n{THIN_RULE}\n{}\n", info.example));
    out
}
