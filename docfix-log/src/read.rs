use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use docfix_types::record::DecisionRecord;
use fs_err as fs;
use glob::glob;
use tracing::{debug, warn};

/// A log line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub path: Utf8PathBuf,
    /// 1-indexed line within the log file.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct LogRead {
    pub records: Vec<DecisionRecord>,
    pub skipped: Vec<SkippedLine>,
    /// Files whose last line was cut off mid-write.
    pub torn_tails: Vec<Utf8PathBuf>,
}

impl LogRead {
    fn extend(&mut self, other: LogRead) {
        self.records.extend(other.records);
        self.skipped.extend(other.skipped);
        self.torn_tails.extend(other.torn_tails);
    }
}

/// Read every record in a log file.
///
/// A missing file is an empty log. Unparsable lines are collected in
/// `skipped`; an unterminated, unparsable final line is treated as a torn
/// write and reported in `torn_tails` instead.
pub fn read_records(path: &Utf8Path) -> anyhow::Result<LogRead> {
    let mut out = LogRead::default();
    if !path.exists() {
        debug!(path = %path, "decision log does not exist yet");
        return Ok(out);
    }

    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    let terminated = raw.ends_with('\n');
    let lines: Vec<&str> = raw.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DecisionRecord>(line) {
            Ok(record) => out.records.push(record),
            Err(_) if idx + 1 == lines.len() && !terminated => {
                warn!(path = %path, "ignoring torn final record");
                out.torn_tails.push(path.to_path_buf());
            }
            Err(e) => out.skipped.push(SkippedLine {
                path: path.to_path_buf(),
                line: idx + 1,
                message: e.to_string(),
            }),
        }
    }
    Ok(out)
}

/// Read every log matching `pattern`, in path order.
pub fn read_glob(pattern: &str) -> anyhow::Result<LogRead> {
    let mut paths = Vec::new();
    for entry in glob(pattern).with_context(|| format!("glob {pattern}"))? {
        let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
        let path = Utf8PathBuf::from_path_buf(path)
            .map_err(|p| anyhow::anyhow!("non UTF-8 path: {}", p.display()))?;
        paths.push(path);
    }
    paths.sort();

    let mut out = LogRead::default();
    for path in paths {
        out.extend(read_records(&path)?);
    }
    Ok(out)
}
