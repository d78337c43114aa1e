//! Selection of provider files by name.
use std::{collections::BTreeSet, path::{Path, PathBuf}};

use error_stack::ResultExt;

use crate::error::{ConfigurationError, LoadError};

/// Placeholder replaced by the requested years in file name patterns.
pub const YEARS_PLACEHOLDER: &str = "{years}";

/// A regular expression for provider file names, optionally containing `{years}`.
///
/// The pattern must match the whole file name. `{years}` becomes an alternation of the
/// requested years, e.g. `data_({years}).csv` with years 2007 and 2008 matches
/// `data_2007.csv` and `data_2008.csv` but not `data_2009.csv`. When no years are
/// requested, the placeholder matches any four digit year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNamePattern {
    pattern: String,
}

impl FileNamePattern {
    pub fn new<S: Into<String>>(pattern: S) -> Self {
        Self { pattern: pattern.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Build the regular expression for a set of years; `None` means any year.
    pub fn to_regex(&self, years: Option<&BTreeSet<i32>>) -> Result<regex::Regex, ConfigurationError> {
        let year_re = match years {
            Some(years) if years.is_empty() => r"\b\B".to_string(),
            Some(years) => {
                let alternatives = years.iter().map(|y| format!("{y:04}")).collect::<Vec<_>>().join("|");
                format!("(?:{alternatives})")
            },
            None => r"\d{4}".to_string(),
        };

        let expanded = self.pattern.replace(YEARS_PLACEHOLDER, &year_re);
        regex::Regex::new(&format!("^(?:{expanded})$"))
            .map_err(|e| ConfigurationError::InvalidPattern { pattern: self.pattern.clone(), cause: e.to_string() })
    }

    /// List the files of `directory` matching this pattern, sorted by name.
    ///
    /// Files whose name or full path is in `exclude` are skipped.
    pub fn select_files(&self, directory: &Path, years: Option<&BTreeSet<i32>>, exclude: &[String]) -> error_stack::Result<Vec<PathBuf>, LoadError> {
        // No year requested, no file can match
        if years.is_some_and(|y| y.is_empty()) {
            return Ok(vec![]);
        }

        let re = self.to_regex(years)
            .change_context_lazy(|| LoadError::Configuration(self.pattern.clone()))?;

        let entries = std::fs::read_dir(directory)
            .change_context_lazy(|| LoadError::could_not_read(directory))?;

        let mut files = vec![];
        for entry in entries {
            let entry = entry.change_context_lazy(|| LoadError::could_not_read(directory))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                log::debug!("Skipping {}, its name is not valid UTF-8", path.display());
                continue;
            };
            if !re.is_match(name) {
                continue;
            }
            if is_excluded(&path, name, exclude) {
                log::debug!("Skipping excluded file {}", path.display());
                continue;
            }
            files.push(path);
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

fn is_excluded(path: &Path, name: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|ex| ex == name || Path::new(ex) == path)
}
