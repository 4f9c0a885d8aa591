//! Turn a rewritten document into line issues against the original.

use docfix_types::issue::IssueDraft;

const REWRITE_MESSAGE: &str = "rewritten by source";

/// Line issues that transform `before` into `after`.
///
/// All anchors are in `before` coordinates and come out in ascending order,
/// so applying them in emission order reproduces `after`.
pub fn diff_to_drafts(before: &[String], after: &[String]) -> Vec<IssueDraft> {
    if before.len() == after.len() {
        return before
            .iter()
            .zip(after)
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(idx, (_, new))| IssueDraft::replace(idx + 1, new.clone()).with_message(REWRITE_MESSAGE))
            .collect();
    }

    let mut drafts = Vec::new();
    let mut deleted: Vec<usize> = Vec::new();
    let mut inserted: Vec<String> = Vec::new();

    for step in align(before, after) {
        match step {
            Step::Keep(old_idx) => {
                flush(&mut drafts, &mut deleted, &mut inserted, old_idx + 1);
            }
            Step::Remove(old_idx) => deleted.push(old_idx + 1),
            Step::Add(new_idx) => inserted.push(after[new_idx].clone()),
        }
    }
    flush(&mut drafts, &mut deleted, &mut inserted, before.len() + 1);
    drafts
}

/// Emit one hunk: paired lines become replacements, leftover removals become
/// deletions, leftover additions become one insertion before `next_line`.
fn flush(
    drafts: &mut Vec<IssueDraft>,
    deleted: &mut Vec<usize>,
    inserted: &mut Vec<String>,
    next_line: usize,
) {
    let paired = deleted.len().min(inserted.len());
    for (line, text) in deleted.iter().zip(inserted.iter()).take(paired) {
        drafts.push(IssueDraft::replace(*line, text.clone()).with_message(REWRITE_MESSAGE));
    }
    for line in deleted.iter().skip(paired) {
        drafts.push(IssueDraft::delete(*line).with_message(REWRITE_MESSAGE));
    }
    if inserted.len() > paired {
        let extra = inserted.split_off(paired);
        drafts.push(IssueDraft::insert(next_line, extra).with_message(REWRITE_MESSAGE));
    }
    deleted.clear();
    inserted.clear();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Keep(usize),
    Remove(usize),
    Add(usize),
}

/// Longest-common-subsequence alignment of two line lists.
fn align(before: &[String], after: &[String]) -> Vec<Step> {
    let (n, m) = (before.len(), after.len());
    // lcs[i][j] = LCS length of before[i..] and after[j..]
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if before[i] == after[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut steps = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if before[i] == after[j] {
            steps.push(Step::Keep(i));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            steps.push(Step::Remove(i));
            i += 1;
        } else {
            steps.push(Step::Add(j));
            j += 1;
        }
    }
    steps.extend((i..n).map(Step::Remove));
    steps.extend((j..m).map(Step::Add));
    steps
}
