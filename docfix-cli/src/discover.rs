//! Expand `docfix run` path arguments into the documents to process.

use crate::config::DiscoveryConfig;
use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use tracing::debug;

struct Filter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    recursive: bool,
}

impl Filter {
    fn new(config: &DiscoveryConfig) -> anyhow::Result<Self> {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| Pattern::new(p).with_context(|| format!("invalid pattern `{p}`")))
                .collect::<anyhow::Result<Vec<_>>>()
        };
        Ok(Self {
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
            recursive: config.recursive,
        })
    }

    fn excluded(&self, name: &str, relative: &str) -> bool {
        self.exclude
            .iter()
            .any(|p| p.matches(name) || p.matches(relative))
    }

    fn included(&self, name: &str) -> bool {
        self.include.iter().any(|p| p.matches(name))
    }
}

/// Resolve `paths` into a sorted, de-duplicated list of documents.
///
/// Files are taken as given unless excluded. Directories are searched for
/// files whose name matches an include pattern, descending into
/// subdirectories when `recursive` is set. Hidden entries are skipped while
/// walking. A path that does not exist is an error.
pub fn discover_documents(
    paths: &[Utf8PathBuf],
    config: &DiscoveryConfig,
) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let filter = Filter::new(config)?;
    let mut found = Vec::new();

    for path in paths {
        if path.is_file() {
            let name = path.file_name().unwrap_or(path.as_str());
            if !filter.excluded(name, path.as_str()) {
                found.push(path.clone());
            }
        } else if path.is_dir() {
            walk(path, path, &filter, &mut found)?;
        } else {
            bail!("no such file or directory: {}", path);
        }
    }

    found.sort();
    found.dedup();
    debug!(documents = found.len(), "discovered documents");
    Ok(found)
}

fn walk(
    root: &Utf8Path,
    dir: &Utf8Path,
    filter: &Filter,
    found: &mut Vec<Utf8PathBuf>,
) -> anyhow::Result<()> {
    let mut entries = Vec::new();
    for entry in dir
        .read_dir_utf8()
        .with_context(|| format!("read directory {}", dir))?
    {
        entries.push(entry.with_context(|| format!("read directory {}", dir))?);
    }
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    for entry in entries {
        let name = entry.file_name();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .as_str()
            .replace('\\', "/");
        if filter.excluded(name, &relative) {
            continue;
        }

        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path))?;
        if file_type.is_dir() {
            if filter.recursive {
                walk(root, path, filter, found)?;
            }
        } else if filter.included(name) {
            found.push(path.to_path_buf());
        }
    }
    Ok(())
}
