use diffy::PatchFormatter;

/// Unified diff between two renderings of the document at `path`.
///
/// Empty when nothing changed.
pub fn render_patch(path: &str, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }

    let mut out = String::new();
    out.push_str(&format!("diff --git a/{0} b/{0}\n", path));
    out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", path));

    let patch = diffy::create_patch(before, after);
    let formatted = PatchFormatter::new().fmt_patch(&patch).to_string();
    // diffy emits its own ---/+++ header; keep only the hunks.
    for line in formatted.lines().skip_while(|l| !l.starts_with("@@")) {
        out.push_str(line);
        out.push('\n');
    }
    out
}
