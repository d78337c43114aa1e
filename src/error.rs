//! Common errors across the bgc-rs crate
//!
//! Errors fall in two groups. Configuration and schema problems are fatal and
//! propagate to the caller as [`ConfigurationError`] and [`SchemaError`]. Problems
//! with individual files or values (unparseable file, missing alias, value that
//! cannot be converted) are recoverable; they are logged and counted in a
//! [`LoadReport`](crate::loaders::LoadReport) instead of being returned as errors.
use std::path::PathBuf;

/// Errors in the variable or provider configuration.
///
/// These are always raised before any file is read for the affected provider.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A registry with no variables cannot define a canonical schema
    #[error("Registry '{0}' does not contain any variables")]
    EmptyRegistry(String),

    /// A variable the provider needs to load its files is not in its registry
    #[error("Registry '{registry}' is missing the variable '{variable}', which is required to load {provider}")]
    MissingVariable{registry: String, variable: String, provider: String},

    /// Two variables in one registry share a canonical name
    #[error("Variable '{variable}' is defined twice in registry '{registry}'")]
    DuplicateVariable{registry: String, variable: String},

    /// A variable was looked up by a name that is not defined
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    /// Binding a variable to a source requires at least one alias
    #[error("Variable '{0}' cannot be bound to an empty list of aliases")]
    EmptyAliases(String),

    /// An alias gave a flag column without allowed values or vice versa
    #[error("Alias '{alias}' of variable '{variable}' is invalid: {cause}")]
    InvalidAlias{variable: String, alias: String, cause: String},

    /// Source-related configuration was requested on a variable not in the source files
    #[error("Variable '{variable}' is not read from the source files and cannot be given {what}")]
    UnboundConfiguration{variable: String, what: String},

    /// The string describing a value type was not recognized
    #[error("Unknown value type '{0}'")]
    UnknownValueType(String),

    /// A default value does not match the variable's value type
    #[error("Invalid default value for variable '{variable}': {cause}")]
    InvalidDefault{variable: String, cause: String},

    /// A printf-style format string could not be interpreted
    #[error("Invalid format string '{format}': {cause}")]
    InvalidFormat{format: String, cause: String},

    /// A file name pattern did not produce a valid regular expression
    #[error("Invalid file name pattern '{pattern}': {cause}")]
    InvalidPattern{pattern: String, cause: String},

    /// A configuration file could not be opened or read
    #[error("Could not read configuration file {}", .0.display())]
    CouldNotRead(PathBuf),

    /// A configuration file or string had invalid contents
    #[error("Error parsing configuration: {0}")]
    ParsingError(String),

    /// Provider names identify rows in exported files and cannot contain whitespace
    #[error("Invalid provider name '{0}': it must be non-empty and contain no whitespace")]
    InvalidProviderName(String),

    /// A provider name that has no definition
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// No conversion between two units is known
    #[error("No known conversion from '{from}' to '{to}'")]
    UnknownConversion{from: String, to: String},

    /// A template id that is not in the template set
    #[error("No variable template named '{0}'")]
    UnknownTemplate(String),
}

impl ConfigurationError {
    pub fn missing_variable<S: Into<String>>(registry: S, variable: S, provider: S) -> Self {
        Self::MissingVariable { registry: registry.into(), variable: variable.into(), provider: provider.into() }
    }

    pub fn duplicate_variable<S: Into<String>>(registry: S, variable: S) -> Self {
        Self::DuplicateVariable { registry: registry.into(), variable: variable.into() }
    }

    pub fn invalid_alias<S: Into<String>>(variable: S, alias: S, cause: S) -> Self {
        Self::InvalidAlias { variable: variable.into(), alias: alias.into(), cause: cause.into() }
    }

    pub fn unbound_configuration<S: Into<String>>(variable: S, what: S) -> Self {
        Self::UnboundConfiguration { variable: variable.into(), what: what.into() }
    }

    pub fn invalid_default<S: Into<String>>(variable: S, cause: S) -> Self {
        Self::InvalidDefault { variable: variable.into(), cause: cause.into() }
    }

    pub fn invalid_format<S: Into<String>>(format: S, cause: S) -> Self {
        Self::InvalidFormat { format: format.into(), cause: cause.into() }
    }

    pub fn parsing_error<S: Into<String>>(cause: S) -> Self {
        Self::ParsingError(cause.into())
    }

    pub fn unknown_conversion<S: Into<String>>(from: S, to: S) -> Self {
        Self::UnknownConversion { from: from.into(), to: to.into() }
    }
}

/// Errors raised when tables with different schemas are combined.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The variables (names, types or units) of two datasets differ
    #[error("Variables are not compatible: {0}")]
    IncompatibleVariables(String),

    /// Datasets of two different categories cannot be aggregated
    #[error("Cannot aggregate '{first}' data with '{other}' data")]
    IncompatibleCategories{first: String, other: String},

    /// A column expected by the schema is not present
    #[error("Column '{column}' is missing from {location}")]
    MissingColumn{location: String, column: String},

    /// A column was given a number of values different from the table's number of rows
    #[error("Column '{column}' has {got} values, expected {expected}")]
    ColumnLength{column: String, expected: usize, got: usize},

    /// A column name is already used
    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    /// Two slices were combined that do not view the same dataset
    #[error("Slices can only be combined if they come from the same dataset")]
    DifferentOrigins,

    /// Aggregation was requested on an empty list of datasets
    #[error("No datasets to aggregate")]
    NothingToAggregate,
}

impl SchemaError {
    pub fn missing_column<L: ToString, S: Into<String>>(location: L, column: S) -> Self {
        Self::MissingColumn { location: location.to_string(), column: column.into() }
    }

    pub fn column_length<S: Into<String>>(column: S, expected: usize, got: usize) -> Self {
        Self::ColumnLength { column: column.into(), expected, got }
    }
}

/// Errors that abort loading or reading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The provider could not be set up
    #[error("Provider {0} is not configured correctly")]
    Configuration(String),

    /// A correction function failed on a value
    #[error("Correction '{correction}' of variable '{variable}' failed on a value from {}", .file.display())]
    Correction{variable: String, correction: String, file: PathBuf},

    /// A file could not be opened or read
    #[error("Could not read {}", .0.display())]
    CouldNotRead(PathBuf),

    /// A file was read but its contents could not be interpreted
    #[error("Could not parse {}: {cause}", .path.display())]
    ParsingError{path: PathBuf, cause: String},

    /// The data read does not fit the expected schema
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl LoadError {
    pub fn could_not_read<P: Into<PathBuf>>(path: P) -> Self {
        Self::CouldNotRead(path.into())
    }

    pub fn parsing_error<P: Into<PathBuf>, S: Into<String>>(path: P, cause: S) -> Self {
        Self::ParsingError { path: path.into(), cause: cause.into() }
    }
}

/// Errors writing datasets to disk.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Could not create directory {}", .0.display())]
    CouldNotCreateDir(PathBuf),
    #[error("Could not write to {}", .0.display())]
    CouldNotWrite(PathBuf),
    #[error("Cannot write a per-provider file for data from several providers ({0})")]
    MultipleProviders(String),
    #[error("Error writing data")]
    IoError,
}

/// Error returned by a correction function for a value it cannot handle.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CorrectionError(pub String);

impl CorrectionError {
    pub fn new<S: ToString>(msg: S) -> Self {
        Self(msg.to_string())
    }
}

/// Errors related to working with datetimes
#[derive(Debug, thiserror::Error)]
pub enum DateTimeError {
    #[error("Year {0}, month {1}, day {2} is not a valid date")]
    InvalidYearMonthDay(i32, u32, u32),
    #[error("Hour {0} is not a valid hour of the day")]
    InvalidHour(u32),
    #[error("Date range end ({end}) is before its start ({start})")]
    ReversedRange{start: chrono::NaiveDate, end: chrono::NaiveDate},
    #[error("A custom date interval must be at least one day long")]
    ZeroLengthInterval,
    #[error("'{0}' is not a date interval, expected day, week, month, year or a number of days")]
    UnknownInterval(String),
}
