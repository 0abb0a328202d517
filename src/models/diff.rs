use crate::models::resolver::ResolvedModel;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Restricts which resolved models contribute files, by `{id}-{version}` token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeFilter {
    wanted: HashSet<String>,
}

impl IncludeFilter {
    /// Parse a comma separated list such as `prob-4, alq-13`
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        Self {
            wanted: spec
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// An empty filter admits every model
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wanted.is_empty()
    }

    #[must_use]
    pub fn admits(&self, model: &ResolvedModel) -> bool {
        self.wanted.is_empty() || self.wanted.contains(&model.key())
    }
}

/// Flatten the files of the models admitted by `filter`, preserving order
#[must_use]
pub fn backend_files(models: &[ResolvedModel], filter: &IncludeFilter) -> Vec<String> {
    models
        .iter()
        .filter(|model| filter.admits(model))
        .flat_map(|model| model.files.iter().cloned())
        .collect()
}

/// Paths under `root_dir` for the files that do not exist yet
///
/// This is a snapshot: files created concurrently by someone else may or may
/// not be reported.
#[must_use]
pub fn missing<S: AsRef<str>>(resolved_files: &[S], root_dir: &Path) -> Vec<PathBuf> {
    resolved_files
        .iter()
        .map(|file| root_dir.join(file.as_ref()))
        // Any entry counts as present, including a dangling symlink
        .filter(|path| std::fs::symlink_metadata(path).is_err())
        .collect()
}
