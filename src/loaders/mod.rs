//! Loading of provider files into canonical tables.
//!
//! A [`SourceLoader`] turns all of one provider's files into one [`Storer`]. The
//! provider is described by its directory, file name pattern, a [`VariableRegistry`]
//! saying how each canonical variable is found in its files, and a [`RawReader`]
//! that knows how to parse the files (CSV in [`csv`], NetCDF in `netcdf` when the
//! `netcdf` feature is enabled).
//!
//! For each file, the loader:
//!
//! 1. parses the file into raw columns,
//! 2. builds each canonical column in registry order: unbound variables are filled with
//!    their default; bound variables take the first of their aliases present in the file,
//!    with values failing the alias' flag test replaced by missing values, then corrected
//!    and coerced to the variable's type,
//! 3. optionally derives the date or date parts from one another (see [`DateParts`]),
//! 4. fills the provider name variable if configured,
//! 5. drops rows according to the variables' drop rules,
//! 6. replaces remaining missing values with the variables' defaults,
//! 7. applies the constraints.
//!
//! The per-file tables are concatenated in file name order.
//!
//! Problems limited to one file or one value do not stop the load: an unreadable file is
//! skipped, a variable with none of its aliases in a file is filled with its default, and
//! a value that cannot be converted to its variable's type becomes missing. These are
//! logged and counted in the [`LoadReport`]. Configuration problems are found before
//! reading any file and are returned as errors, as are failures of correction functions.
use std::{
    collections::{BTreeSet, HashSet},
    fmt::{Debug, Display},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use error_stack::ResultExt;
use indexmap::IndexMap;

use crate::{
    config::ProviderConfig,
    constraints::Constraints,
    error::{ConfigurationError, LoadError},
    patterns::FileNamePattern,
    storer::Storer,
    table::Table,
    values::{default_time_origin, Value},
    variables::{Alias, SourceBinding, VariableDescriptor, VariableRegistry},
};

pub mod csv;
#[cfg(feature = "netcdf")]
pub mod netcdf;

pub use self::csv::CsvReader;
#[cfg(feature = "netcdf")]
pub use self::netcdf::NetcdfReader;

/// Columns read from one file, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    nrows: usize,
    columns: IndexMap<String, Vec<Value>>,
}

impl RawFrame {
    pub fn new(nrows: usize) -> Self {
        Self { nrows, columns: IndexMap::new() }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Add a column; it must have one value per row.
    pub fn push<S: Into<String>>(&mut self, name: S, values: Vec<Value>) -> Result<(), String> {
        let name = name.into();
        if values.len() != self.nrows {
            return Err(format!("column '{name}' has {} values, expected {}", values.len(), self.nrows));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(|c| c.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }
}

/// A parser for one kind of provider file.
pub trait RawReader: Debug + Send + Sync {
    /// Short name of the file format, used in log messages.
    fn format_name(&self) -> &'static str;

    /// Read the columns named in `wanted` that are present in the file at `path`.
    ///
    /// Columns not in the file are simply absent from the returned frame. Readers may
    /// return more columns than requested. An error means the file as a whole could
    /// not be interpreted and will be skipped.
    fn read(&self, path: &Path, wanted: &BTreeSet<String>) -> error_stack::Result<RawFrame, LoadError>;
}

/// Names of the date variable and the date part variables to keep consistent.
///
/// When a loader is given date parts and a file provides the date, the year, month, day and
/// hour variables that were not themselves read from the file are computed from it. If instead
/// the date was not read but the year, month and day were, the date is built from them (and
/// the hour, if read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParts {
    pub date: String,
    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,
    pub hour: Option<String>,
}

impl Default for DateParts {
    fn default() -> Self {
        Self {
            date: "DATE".to_string(),
            year: Some("YEAR".to_string()),
            month: Some("MONTH".to_string()),
            day: Some("DAY".to_string()),
            hour: Some("HOUR".to_string()),
        }
    }
}

/// What happened while loading one provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub provider: String,
    pub files_loaded: Vec<PathBuf>,
    pub files_skipped: Vec<PathBuf>,
    pub warnings: Vec<String>,
    /// For each variable, the number of files in which none of its aliases were found
    pub absent_variables: IndexMap<String, usize>,
    /// For each variable, the number of values that could not be converted to its type
    pub coercion_failures: IndexMap<String, usize>,
    /// Number of rows in the files read
    pub rows_read: usize,
    /// Number of rows remaining after the drop rules and constraints
    pub rows_kept: usize,
}

impl LoadReport {
    pub fn new<S: Into<String>>(provider: S) -> Self {
        Self { provider: provider.into(), ..Default::default() }
    }

    fn warn(&mut self, msg: String) {
        log::warn!("{}: {msg}", self.provider);
        self.warnings.push(msg);
    }

    fn skip_file(&mut self, path: &Path, cause: String) {
        self.warn(format!("skipped {}: {cause}", path.display()));
        self.files_skipped.push(path.to_path_buf());
    }

    fn count_absent(&mut self, variable: &str) {
        *self.absent_variables.entry(variable.to_string()).or_default() += 1;
    }

    fn count_coercion_failures(&mut self, variable: &str, n: usize) {
        if n > 0 {
            *self.coercion_failures.entry(variable.to_string()).or_default() += n;
        }
    }

    pub fn total_coercion_failures(&self) -> usize {
        self.coercion_failures.values().sum()
    }
}

impl Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f, "{}: {} file(s) loaded, {} skipped, {} of {} rows kept",
            self.provider, self.files_loaded.len(), self.files_skipped.len(), self.rows_kept, self.rows_read
        )?;
        if !self.absent_variables.is_empty() {
            let absent = self.absent_variables.iter()
                .map(|(k, v)| format!("{k} ({v})"))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "; absent: {absent}")?;
        }
        if !self.coercion_failures.is_empty() {
            write!(f, "; {} value(s) could not be converted", self.total_coercion_failures())?;
        }
        Ok(())
    }
}

impl tabled::Tabled for LoadReport {
    const LENGTH: usize = 6;

    fn fields(&self) -> Vec<std::borrow::Cow<'_, str>> {
        vec![
            self.provider.as_str().into(),
            format!("{}", self.files_loaded.len()).into(),
            format!("{}", self.files_skipped.len()).into(),
            format!("{}", self.rows_read).into(),
            format!("{}", self.rows_kept).into(),
            format!("{}", self.total_coercion_failures()).into(),
        ]
    }

    fn headers() -> Vec<std::borrow::Cow<'static, str>> {
        vec![
            "provider".into(),
            "files".into(),
            "skipped".into(),
            "rows read".into(),
            "rows kept".into(),
            "bad values".into(),
        ]
    }
}

/// Loads the files of one provider.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    provider: Arc<str>,
    category: String,
    directory: PathBuf,
    pattern: FileNamePattern,
    exclude: Vec<String>,
    registry: VariableRegistry,
    reader: Arc<dyn RawReader>,
    required: Vec<String>,
    date_label: String,
    date_parts: Option<DateParts>,
    provider_label: Option<String>,
    time_origin: NaiveDateTime,
}

impl SourceLoader {
    pub fn new<P, C>(
        provider: P,
        category: C,
        directory: PathBuf,
        pattern: FileNamePattern,
        registry: VariableRegistry,
        reader: Arc<dyn RawReader>,
    ) -> Self
    where
        P: AsRef<str>,
        C: Into<String>,
    {
        Self {
            provider: Arc::from(provider.as_ref()),
            category: category.into(),
            directory,
            pattern,
            exclude: vec![],
            registry,
            reader,
            required: vec![],
            date_label: "DATE".to_string(),
            date_parts: None,
            provider_label: None,
            time_origin: default_time_origin(),
        }
    }

    /// Create a loader from a provider's configuration entry.
    ///
    /// The configuration's `FILES_PATTERN`, if given, takes precedence over `default_pattern`.
    pub fn from_config<P: AsRef<str>>(
        provider: P,
        config: &ProviderConfig,
        default_pattern: &str,
        registry: VariableRegistry,
        reader: Arc<dyn RawReader>,
    ) -> Self {
        let pattern = config.files_pattern.as_deref().unwrap_or(default_pattern);
        Self::new(provider, config.category.clone(), config.path.clone(), FileNamePattern::new(pattern), registry, reader)
            .with_exclude(config.exclude.clone())
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Variables that must be in the registry for this provider to be loaded.
    pub fn with_required<S: ToString>(mut self, required: &[S]) -> Self {
        self.required = required.iter().map(|s| s.to_string()).collect();
        self
    }

    /// The timestamp variable used to find which years to load from the constraints.
    pub fn with_date_label<S: Into<String>>(mut self, label: S) -> Self {
        self.date_label = label.into();
        self
    }

    pub fn with_date_parts(mut self, parts: DateParts) -> Self {
        self.date_parts = Some(parts);
        self
    }

    /// Fill the variable `label` with the provider name in every row.
    pub fn with_provider_label<S: Into<String>>(mut self, label: S) -> Self {
        self.provider_label = Some(label.into());
        self
    }

    /// Origin of numeric times, which are taken as days since it.
    pub fn with_time_origin(mut self, origin: NaiveDateTime) -> Self {
        self.time_origin = origin;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Check that the registry can be used to load this provider.
    ///
    /// The provider name must be a single non-empty word, so that exported rows keep
    /// their provider. The registry must not be empty and must contain the required
    /// variables, the date variable if date parts are configured, and the provider name
    /// variable if configured.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.provider.is_empty() || self.provider.chars().any(char::is_whitespace) {
            return Err(ConfigurationError::InvalidProviderName(self.provider.to_string()));
        }
        if self.registry.is_empty() {
            return Err(ConfigurationError::EmptyRegistry(self.registry.name().to_string()));
        }

        let extra = self.date_parts.iter().map(|p| p.date.as_str())
            .chain(self.provider_label.iter().map(|s| s.as_str()));
        for name in self.required.iter().map(|s| s.as_str()).chain(extra) {
            if !self.registry.contains(name) {
                return Err(ConfigurationError::missing_variable(
                    self.registry.name(), name, self.provider.as_ref()
                ));
            }
        }
        Ok(())
    }

    /// Load every file of this provider matching its pattern and the years of `constraints`.
    pub fn load(&self, constraints: &Constraints) -> error_stack::Result<(Storer, LoadReport), LoadError> {
        self.validate()
            .change_context_lazy(|| LoadError::Configuration(self.provider.to_string()))?;

        let mut report = LoadReport::new(self.provider.as_ref());
        let years = constraints.years_for(&self.date_label);
        let files = self.pattern.select_files(&self.directory, years.as_ref(), &self.exclude)
            .attach_printable_lazy(|| format!("while listing files for {}", self.provider))?;

        if files.is_empty() {
            report.warn(format!(
                "no files matching '{}' in {}", self.pattern.as_str(), self.directory.display()
            ));
        }

        let mut table = Table::from_columns(
            self.registry.names().map(|n| (n.to_string(), vec![])).collect(),
            vec![]
        ).map_err(LoadError::from)?;

        for file in files.iter() {
            log::debug!("{}: loading {} file {}", self.provider, self.reader.format_name(), file.display());
            if let Some(file_table) = self.load_file(file, constraints, &mut report)? {
                table.append(&file_table).map_err(LoadError::from)?;
                report.files_loaded.push(file.clone());
            }
        }

        log::info!("{report}");
        let storer = Storer::new(table, self.registry.clone(), &self.category)
            .map_err(LoadError::from)?
            .with_provider(self.provider.as_ref());
        Ok((storer, report))
    }

    /// Load a single file. `None` means the file was skipped.
    pub fn load_file(&self, path: &Path, constraints: &Constraints, report: &mut LoadReport) -> error_stack::Result<Option<Table>, LoadError> {
        let raw = match self.reader.read(path, &self.wanted_columns()) {
            Ok(raw) => raw,
            Err(e) => {
                report.skip_file(path, format!("{}", e.current_context()));
                log::debug!("{e:?}");
                return Ok(None);
            }
        };
        let nrows = raw.nrows();
        report.rows_read += nrows;

        let mut table = Table::for_provider(&self.provider, nrows);
        let mut extracted = HashSet::new();
        for descriptor in self.registry.iter() {
            let values = match descriptor.source() {
                SourceBinding::Unbound => vec![descriptor.default_value().clone(); nrows],
                SourceBinding::Bound(aliases) => {
                    match self.extract(descriptor, aliases, &raw, path, report)? {
                        Some(values) => {
                            extracted.insert(descriptor.name().to_string());
                            values
                        },
                        None => {
                            report.count_absent(descriptor.name());
                            log::debug!("{}: none of the aliases of {} are in {}", self.provider, descriptor.name(), path.display());
                            vec![descriptor.default_value().clone(); nrows]
                        }
                    }
                }
            };
            table.push_column(descriptor.name(), values).map_err(LoadError::from)?;
        }

        if let Some(parts) = &self.date_parts {
            self.complete_dates(parts, &mut table, &extracted, report)?;
        }

        if let Some(label) = &self.provider_label {
            let name = Value::Text(self.provider.to_string());
            table.set_column(label.as_str(), vec![name; nrows]).map_err(LoadError::from)?;
        }

        table.retain(&self.rows_to_keep(&table));
        self.fill_defaults(&mut table);
        if !constraints.is_empty() {
            table.retain(&constraints.is_respected(&table));
        }

        report.rows_kept += table.nrows();
        Ok(Some(table))
    }

    fn wanted_columns(&self) -> BTreeSet<String> {
        let mut wanted = BTreeSet::new();
        for alias in self.registry.iter().flat_map(|d| d.aliases()) {
            wanted.insert(alias.column.clone());
            if let Some(fc) = &alias.flag_column {
                wanted.insert(fc.clone());
            }
        }
        wanted
    }

    /// Values of a bound variable, or `None` if none of its aliases are in the file.
    fn extract(&self, descriptor: &VariableDescriptor, aliases: &[Alias], raw: &RawFrame, path: &Path, report: &mut LoadReport)
    -> error_stack::Result<Option<Vec<Value>>, LoadError> {
        let Some((alias, column)) = aliases.iter().find_map(|a| raw.column(&a.column).map(|c| (a, c))) else {
            return Ok(None);
        };
        let mut values = column.to_vec();

        if let Some(flag_column) = &alias.flag_column {
            match raw.column(flag_column) {
                Some(flags) => {
                    for (v, f) in values.iter_mut().zip(flags) {
                        if !alias.accepts_flag(f) {
                            *v = Value::Missing;
                        }
                    }
                },
                None => log::debug!(
                    "{}: flag column {flag_column} for {} not in {}, values not filtered",
                    self.provider, alias.column, path.display()
                ),
            }
        }

        if let Some(correction) = descriptor.correction() {
            for v in values.iter_mut().filter(|v| !v.is_missing()) {
                *v = correction.apply(v).change_context_lazy(|| LoadError::Correction {
                    variable: descriptor.name().to_string(),
                    correction: correction.name().to_string(),
                    file: path.to_path_buf(),
                })?;
            }
        }

        let mut nfailed = 0;
        for v in values.iter_mut() {
            *v = match v.coerce(descriptor.value_type(), self.time_origin) {
                Some(c) => c,
                None => {
                    nfailed += 1;
                    Value::Missing
                }
            };
        }
        if nfailed > 0 {
            log::debug!("{}: {nfailed} value(s) of {} in {} could not be converted to {}",
                self.provider, descriptor.name(), path.display(), descriptor.value_type());
        }
        report.count_coercion_failures(descriptor.name(), nfailed);

        Ok(Some(values))
    }

    fn complete_dates(&self, parts: &DateParts, table: &mut Table, extracted: &HashSet<String>, report: &mut LoadReport)
    -> error_stack::Result<(), LoadError> {
        let part_names = [&parts.year, &parts.month, &parts.day, &parts.hour];

        if extracted.contains(&parts.date) {
            let dates: Vec<Option<NaiveDateTime>> = table.column(&parts.date)
                .map(|c| c.iter().map(|v| v.as_timestamp()).collect())
                .unwrap_or_default();

            for (i, name) in part_names.into_iter().enumerate() {
                let Some(name) = name else { continue };
                if extracted.contains(name) || !self.registry.contains(name) {
                    continue;
                }
                let values = dates.iter().map(|d| match d {
                    Some(d) => Value::Int(date_part(d, i)),
                    None => Value::Missing,
                }).collect();
                table.set_column(name.as_str(), values).map_err(LoadError::from)?;
            }
            return Ok(());
        }

        let have = |n: &Option<String>| n.as_ref().is_some_and(|n| extracted.contains(n));
        if !(have(&parts.year) && have(&parts.month) && have(&parts.day)) {
            return Ok(());
        }

        let get_col = |n: &Option<String>| -> Vec<Value> {
            n.as_ref().and_then(|n| table.column(n)).map(|c| c.to_vec()).unwrap_or_default()
        };
        let years = get_col(&parts.year);
        let months = get_col(&parts.month);
        let days = get_col(&parts.day);
        let hours = if have(&parts.hour) { get_col(&parts.hour) } else { vec![] };

        let mut nfailed = 0;
        let mut dates = Vec::with_capacity(table.nrows());
        for irow in 0..table.nrows() {
            let hour = hours.get(irow).cloned().unwrap_or(Value::Int(0));
            let date = compose_date(&years[irow], &months[irow], &days[irow], &hour);
            if date.is_missing() && !years[irow].is_missing() {
                nfailed += 1;
            }
            dates.push(date);
        }
        report.count_coercion_failures(&parts.date, nfailed);
        table.set_column(parts.date.as_str(), dates).map_err(LoadError::from)?;
        Ok(())
    }

    fn rows_to_keep(&self, table: &Table) -> Vec<bool> {
        let mut keep = vec![true; table.nrows()];
        for descriptor in self.registry.iter().filter(|d| d.drops_rows_if_missing()) {
            if let Some(column) = table.column(descriptor.name()) {
                for (k, v) in keep.iter_mut().zip(column) {
                    *k = *k && !v.is_missing();
                }
            }
        }

        for group in self.registry.drop_groups() {
            let members: Vec<&[Value]> = self.registry.iter()
                .filter(|d| d.drop_group() == Some(group))
                .filter_map(|d| table.column(d.name()))
                .collect();
            for (irow, k) in keep.iter_mut().enumerate() {
                let all_missing = members.iter().all(|c| c[irow].is_missing());
                *k = *k && !all_missing;
            }
        }
        keep
    }

    fn fill_defaults(&self, table: &mut Table) {
        for descriptor in self.registry.iter() {
            let default = descriptor.default_value();
            if default.is_missing() {
                continue;
            }
            if let Some(column) = table.column_mut(descriptor.name()) {
                for v in column.iter_mut().filter(|v| v.is_missing()) {
                    *v = default.clone();
                }
            }
        }
    }
}

fn date_part(d: &NaiveDateTime, i: usize) -> i64 {
    match i {
        0 => d.year() as i64,
        1 => d.month() as i64,
        2 => d.day() as i64,
        _ => d.hour() as i64,
    }
}

fn compose_date(year: &Value, month: &Value, day: &Value, hour: &Value) -> Value {
    let as_int = |v: &Value| v.as_f64().map(|x| x as i64);
    let (Some(y), Some(m), Some(d)) = (as_int(year), as_int(month), as_int(day)) else {
        return Value::Missing;
    };
    let h = as_int(hour).unwrap_or(0);

    let date = i32::try_from(y).ok()
        .zip(u32::try_from(m).ok())
        .zip(u32::try_from(d).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d));
    let datetime = date.zip(u32::try_from(h).ok()).and_then(|(date, h)| date.and_hms_opt(h, 0, 0));
    datetime.map(Value::Timestamp).unwrap_or(Value::Missing)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::storer::TableView;
    use crate::test_utils::{frame_reader, float_template};
    use crate::values::ValueType;
    use crate::variables::{Correction, VariableTemplate};

    use super::*;

    fn loader(registry: VariableRegistry, frame: RawFrame, dir: &Path) -> SourceLoader {
        SourceLoader::new("P", "in_situ", dir.to_path_buf(), FileNamePattern::new("file.csv"), registry, frame_reader(frame))
    }

    fn frame(columns: &[(&str, Vec<Value>)]) -> RawFrame {
        let nrows = columns.first().map(|c| c.1.len()).unwrap_or(0);
        let mut f = RawFrame::new(nrows);
        for (name, values) in columns {
            f.push(*name, values.clone()).unwrap();
        }
        f
    }

    #[rstest]
    #[case("IMR", true)]
    #[case("My Provider", false)]
    #[case("", false)]
    fn test_provider_name(#[case] name: &str, #[case] valid: bool) {
        let registry = VariableRegistry::from_descriptors("r", [float_template("TEMP").unbound()]).unwrap();
        let l = SourceLoader::new(name, "in_situ", PathBuf::from("."), FileNamePattern::new("x"), registry, frame_reader(RawFrame::new(0)));
        match l.validate() {
            Ok(()) => assert!(valid),
            Err(e) => {
                assert!(!valid);
                assert!(matches!(e, ConfigurationError::InvalidProviderName(_)));
            }
        }
    }

    #[test]
    fn test_flag_and_alias_priority() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.csv"), "").unwrap();

        let temp = float_template("TEMP").bind_as(vec![
            Alias::flagged("TEMP_ADJ", "TEMP_ADJ_QC", [1]),
            Alias::column("TEMP"),
        ]).unwrap();
        let registry = VariableRegistry::from_descriptors("r", [temp]).unwrap();
        let raw = frame(&[
            ("TEMP", vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)]),
            ("TEMP_ADJ", vec![Value::Float(1.1), Value::Float(2.1), Value::Float(3.1)]),
            ("TEMP_ADJ_QC", vec![Value::Int(1), Value::Int(4), Value::Text("1".into())]),
        ]);

        let (storer, report) = loader(registry, raw, dir.path()).load(&Constraints::new()).unwrap();
        assert_eq!(storer.table().column("TEMP").unwrap(), &[Value::Float(1.1), Value::Missing, Value::Float(3.1)]);
        assert_eq!(report.files_loaded.len(), 1);
    }

    #[test]
    fn test_absent_flag_column_does_not_filter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.csv"), "").unwrap();

        let temp = float_template("TEMP").bind_as(vec![Alias::flagged("T", "T_QC", [1])]).unwrap();
        let registry = VariableRegistry::from_descriptors("r", [temp]).unwrap();
        let raw = frame(&[("T", vec![Value::Float(1.0), Value::Float(2.0)])]);

        let (storer, _) = loader(registry, raw, dir.path()).load(&Constraints::new()).unwrap();
        assert_eq!(storer.table().column("TEMP").unwrap(), &[Value::Float(1.0), Value::Float(2.0)]);
    }

    #[test]
    fn test_correction_coercion_and_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.csv"), "").unwrap();

        let depth = float_template("DEPH").bind_as(vec![Alias::column("depth")]).unwrap()
            .with_correction(Correction::numeric("negate", |x| -x)).unwrap();
        let phos = float_template("PHOS").bind_as(vec![Alias::column("po4")]).unwrap();
        let cphl = float_template("CPHL").bind_as(vec![Alias::column("chl")]).unwrap()
            .with_default(Value::Float(0.0)).unwrap();
        let registry = VariableRegistry::from_descriptors("r", [depth, phos, cphl]).unwrap();
        let raw = frame(&[
            ("depth", vec![Value::Int(10), Value::Float(20.5)]),
            ("po4", vec![Value::Text("<0.05".into()), Value::Text("n.d.".into())]),
        ]);

        let (storer, report) = loader(registry, raw, dir.path()).load(&Constraints::new()).unwrap();
        let table = storer.table();
        assert_eq!(table.column("DEPH").unwrap(), &[Value::Float(-10.0), Value::Float(-20.5)]);
        assert_eq!(table.column("PHOS").unwrap(), &[Value::Float(0.05), Value::Missing]);
        assert_eq!(table.column("CPHL").unwrap(), &[Value::Float(0.0), Value::Float(0.0)]);
        assert_eq!(report.absent_variables.get("CPHL"), Some(&1));
        assert_eq!(report.coercion_failures.get("PHOS"), Some(&1));
    }

    #[test]
    fn test_failing_correction_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.csv"), "").unwrap();

        let depth = float_template("DEPH").bind_as(vec![Alias::column("depth")]).unwrap()
            .with_correction(Correction::new("strict", |_| Err(crate::error::CorrectionError::new("no")))).unwrap();
        let registry = VariableRegistry::from_descriptors("r", [depth]).unwrap();
        let raw = frame(&[("depth", vec![Value::Int(10)])]);

        let err = loader(registry, raw, dir.path()).load(&Constraints::new()).unwrap_err();
        assert!(matches!(err.current_context(), LoadError::Correction { variable, .. } if variable == "DEPH"));
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_drop_rules(#[case] grouped: bool) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.csv"), "").unwrap();

        let (ntra, phos) = if grouped {
            (
                float_template("NTRA").bind_as(vec![Alias::column("no3")]).unwrap().drop_rows_if_group_missing("nut"),
                float_template("PHOS").bind_as(vec![Alias::column("po4")]).unwrap().drop_rows_if_group_missing("nut"),
            )
        } else {
            (
                float_template("NTRA").bind_as(vec![Alias::column("no3")]).unwrap().drop_rows_if_missing(),
                float_template("PHOS").bind_as(vec![Alias::column("po4")]).unwrap(),
            )
        };
        let registry = VariableRegistry::from_descriptors("r", [ntra, phos]).unwrap();
        let raw = frame(&[
            ("no3", vec![Value::Float(1.0), Value::Missing, Value::Missing, Value::Float(4.0)]),
            ("po4", vec![Value::Missing, Value::Float(2.0), Value::Missing, Value::Float(4.0)]),
        ]);

        let (storer, _) = loader(registry, raw, dir.path()).load(&Constraints::new()).unwrap();
        let expected = if grouped { 3 } else { 2 };
        assert_eq!(storer.len(), expected);
    }

    #[test]
    fn test_date_parts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.csv"), "").unwrap();

        let int = |n: &str| VariableTemplate::new(n, "[]", ValueType::Integer);
        let date = VariableTemplate::new("DATE", "[]", ValueType::Timestamp).unbound();
        let registry = VariableRegistry::from_descriptors("r", [
            date,
            int("YEAR").bind_as(vec![Alias::column("Year")]).unwrap(),
            int("MONTH").bind_as(vec![Alias::column("Month")]).unwrap(),
            int("DAY").bind_as(vec![Alias::column("Day")]).unwrap(),
            int("HOUR").unbound(),
        ]).unwrap();
        let raw = frame(&[
            ("Year", vec![Value::Int(2007), Value::Int(2008)]),
            ("Month", vec![Value::Int(2), Value::Int(2)]),
            ("Day", vec![Value::Int(28), Value::Int(30)]),
        ]);

        let (storer, report) = loader(registry, raw, dir.path())
            .with_date_parts(DateParts::default())
            .load(&Constraints::new()).unwrap();
        let dates = storer.table().column("DATE").unwrap();
        assert_eq!(dates[0], Value::from(NaiveDate::from_ymd_opt(2007, 2, 28).unwrap()));
        assert_eq!(dates[1], Value::Missing);
        assert_eq!(report.coercion_failures.get("DATE"), Some(&1));
    }

    #[test]
    fn test_missing_required_variable() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VariableRegistry::from_descriptors("r", [float_template("TEMP").unbound()]).unwrap();
        let l = loader(registry, RawFrame::new(0), dir.path()).with_required(&["DATE"]);
        assert!(matches!(l.validate(), Err(ConfigurationError::MissingVariable { .. })));
        assert!(l.load(&Constraints::new()).is_err());

        let empty = loader(VariableRegistry::new("empty"), RawFrame::new(0), dir.path());
        assert!(matches!(empty.validate(), Err(ConfigurationError::EmptyRegistry(_))));
    }

    #[test]
    fn test_no_files_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VariableRegistry::from_descriptors("r", [float_template("TEMP").unbound()]).unwrap();
        let (storer, report) = loader(registry, RawFrame::new(0), dir.path()).load(&Constraints::new()).unwrap();
        assert!(storer.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }
}
