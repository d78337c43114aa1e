//! Variable templates and descriptors.
//!
//! A [`VariableTemplate`] is the provider-independent part of a variable: its
//! canonical name, unit, type, default and export formats. Templates are read once
//! from the configuration (see [`crate::config::TemplateSet`]) and specialized per
//! provider into [`VariableDescriptor`]s, which add how the variable is found in the
//! provider's files: which columns it may appear as, which quality flags are
//! acceptable, and how to correct its values.
//!
//! Every specialization step takes the descriptor by value and returns a new one,
//! so two providers built from the same template never share configuration:
//!
//! ```
//! # use bgc_rs::variables::{Alias, VariableTemplate};
//! # use bgc_rs::values::ValueType;
//! let temperature = VariableTemplate::new("TEMP", "[deg_C]", ValueType::Float);
//! let from_glodap = temperature.bind_as(vec![Alias::column("G2temperature")]).unwrap();
//! let from_argo = temperature.bind_as(vec![
//!     Alias::flagged("TEMP_ADJUSTED", "TEMP_ADJUSTED_QC", [1, 2]),
//!     Alias::flagged("TEMP", "TEMP_QC", [1, 2]),
//! ]).unwrap();
//! assert_eq!(from_glodap.aliases().len(), 1);
//! assert_eq!(from_argo.aliases().len(), 2);
//! ```
use std::{fmt::{Debug, Display}, sync::Arc};

use crate::{
    error::{ConfigurationError, CorrectionError},
    format::ValueFormat,
    values::{Value, ValueType},
};

pub mod registry;
pub use registry::VariableRegistry;

/// One way a variable may appear in a provider's files.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    /// Name of the column (or NetCDF variable) holding the values
    pub column: String,
    /// Name of the column holding quality flags for the values, if any
    pub flag_column: Option<String>,
    /// Flag values marking a value as good; the others are replaced by missing values
    pub flag_values: Option<Vec<Value>>,
}

impl Alias {
    /// An alias without quality flag filtering.
    pub fn column<S: Into<String>>(column: S) -> Self {
        Self { column: column.into(), flag_column: None, flag_values: None }
    }

    /// An alias whose values are only kept where `flag_column` holds one of `good_flags`.
    pub fn flagged<S, F, I, V>(column: S, flag_column: F, good_flags: I) -> Self
    where
        S: Into<String>,
        F: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            column: column.into(),
            flag_column: Some(flag_column.into()),
            flag_values: Some(good_flags.into_iter().map(|v| v.into()).collect()),
        }
    }

    /// `true` if a flag value allows the associated value to be kept.
    ///
    /// Aliases without flag filtering accept every flag.
    pub fn accepts_flag(&self, flag: &Value) -> bool {
        match &self.flag_values {
            Some(good) => good.iter().any(|g| g.loosely_eq(flag)),
            None => true,
        }
    }

    fn validate(&self, variable: &str) -> Result<(), ConfigurationError> {
        if self.column.trim().is_empty() {
            return Err(ConfigurationError::invalid_alias(variable, self.column.as_str(), "the column name is empty"));
        }

        match (&self.flag_column, &self.flag_values) {
            (Some(_), None) => Err(ConfigurationError::invalid_alias(
                variable, self.column.as_str(), "a flag column was given without the flag values to keep"
            )),
            (None, Some(_)) => Err(ConfigurationError::invalid_alias(
                variable, self.column.as_str(), "flag values were given without a flag column"
            )),
            (Some(_), Some(v)) if v.is_empty() => Err(ConfigurationError::invalid_alias(
                variable, self.column.as_str(), "the list of flag values to keep is empty"
            )),
            _ => Ok(())
        }
    }
}

impl Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.flag_column, &self.flag_values) {
            (Some(fc), Some(fv)) => {
                let flags = fv.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                write!(f, "{} (flag {} in [{flags}])", self.column, fc)
            },
            _ => write!(f, "{}", self.column)
        }
    }
}

type CorrectionFn = dyn Fn(&Value) -> Result<Value, CorrectionError> + Send + Sync;

/// A named function applied to every non-missing value of a variable after extraction.
///
/// Corrections run before the value is coerced to the variable's type, so they see
/// the value as it was inferred from the file.
#[derive(Clone)]
pub struct Correction {
    name: String,
    func: Arc<CorrectionFn>,
}

impl Correction {
    pub fn new<S, F>(name: S, func: F) -> Self
    where
        S: Into<String>,
        F: Fn(&Value) -> Result<Value, CorrectionError> + Send + Sync + 'static,
    {
        Self { name: name.into(), func: Arc::new(func) }
    }

    /// A correction operating on numbers.
    ///
    /// Integer, float and numeric text values are passed to `func` as floats. Any
    /// other value is returned unchanged.
    pub fn numeric<S, F>(name: S, func: F) -> Self
    where
        S: Into<String>,
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::new(name, move |v: &Value| {
            Ok(match v.numeric_value() {
                Some(x) => Value::from_f64(func(x)),
                None => v.clone(),
            })
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, value: &Value) -> Result<Value, CorrectionError> {
        (self.func)(value)
    }
}

impl Debug for Correction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correction").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Where the values of a variable come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceBinding {
    /// Not read from the source files; the column is filled with the default value.
    Unbound,
    /// Read from the first alias present in each file.
    Bound(Vec<Alias>),
}

/// The provider-independent definition of a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableTemplate {
    pub name: String,
    pub unit: String,
    pub value_type: ValueType,
    pub default: Value,
    pub name_format: ValueFormat,
    pub value_format: ValueFormat,
}

impl VariableTemplate {
    /// Create a template with a missing default value and the default export formats.
    pub fn new<N: Into<String>, U: Into<String>>(name: N, unit: U, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            value_type,
            default: Value::Missing,
            name_format: ValueFormat::default_name_format(),
            value_format: ValueFormat::default_value_format(),
        }
    }

    /// Change the default value, checking that it can be stored in this variable's column.
    pub fn with_default(mut self, default: Value) -> Result<Self, ConfigurationError> {
        self.default = check_default(&self.name, self.value_type, default)?;
        Ok(self)
    }

    pub fn with_formats(mut self, name_format: ValueFormat, value_format: ValueFormat) -> Self {
        self.name_format = name_format;
        self.value_format = value_format;
        self
    }

    /// A descriptor for this variable, read from the first of `aliases` present in each file.
    pub fn bind_as(&self, aliases: Vec<Alias>) -> Result<VariableDescriptor, ConfigurationError> {
        self.unbound().bind_as(aliases)
    }

    /// A descriptor for this variable that is not read from the files.
    pub fn unbound(&self) -> VariableDescriptor {
        VariableDescriptor {
            template: self.clone(),
            source: SourceBinding::Unbound,
            correction: None,
            drop_if_missing: false,
            drop_group: None,
        }
    }
}

/// A variable specialized for one provider.
#[derive(Debug, Clone)]
pub struct VariableDescriptor {
    template: VariableTemplate,
    source: SourceBinding,
    correction: Option<Correction>,
    drop_if_missing: bool,
    drop_group: Option<String>,
}

impl VariableDescriptor {
    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn unit(&self) -> &str {
        &self.template.unit
    }

    pub fn value_type(&self) -> ValueType {
        self.template.value_type
    }

    pub fn default_value(&self) -> &Value {
        &self.template.default
    }

    pub fn name_format(&self) -> &ValueFormat {
        &self.template.name_format
    }

    pub fn value_format(&self) -> &ValueFormat {
        &self.template.value_format
    }

    pub fn template(&self) -> &VariableTemplate {
        &self.template
    }

    pub fn source(&self) -> &SourceBinding {
        &self.source
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.source, SourceBinding::Bound(_))
    }

    /// The aliases in priority order; empty for an unbound variable.
    pub fn aliases(&self) -> &[Alias] {
        match &self.source {
            SourceBinding::Bound(aliases) => aliases,
            SourceBinding::Unbound => &[],
        }
    }

    pub fn correction(&self) -> Option<&Correction> {
        self.correction.as_ref()
    }

    pub fn drops_rows_if_missing(&self) -> bool {
        self.drop_if_missing
    }

    pub fn drop_group(&self) -> Option<&str> {
        self.drop_group.as_deref()
    }

    /// Bind (or rebind) this variable to a list of aliases, highest priority first.
    ///
    /// Rebinding replaces the previous aliases but keeps the correction and drop rules.
    pub fn bind_as(mut self, aliases: Vec<Alias>) -> Result<Self, ConfigurationError> {
        if aliases.is_empty() {
            return Err(ConfigurationError::EmptyAliases(self.name().to_string()));
        }
        for alias in aliases.iter() {
            alias.validate(self.name())?;
        }
        self.source = SourceBinding::Bound(aliases);
        Ok(self)
    }

    /// Mark this variable as absent from the files, clearing any source-related configuration.
    pub fn unbound(mut self) -> Self {
        self.source = SourceBinding::Unbound;
        self.correction = None;
        self
    }

    /// Apply `correction` to every non-missing value extracted for this variable.
    pub fn with_correction(mut self, correction: Correction) -> Result<Self, ConfigurationError> {
        if !self.is_bound() {
            return Err(ConfigurationError::unbound_configuration(
                self.name().to_string(), format!("the correction '{}'", correction.name())
            ));
        }
        self.correction = Some(correction);
        Ok(self)
    }

    /// Remove every row where this variable is missing once loaded.
    pub fn drop_rows_if_missing(mut self) -> Self {
        self.drop_if_missing = true;
        self
    }

    /// Remove every row where this variable and all others with the same `group_key` are missing.
    pub fn drop_rows_if_group_missing<S: Into<String>>(mut self, group_key: S) -> Self {
        self.drop_group = Some(group_key.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Result<Self, ConfigurationError> {
        self.template = self.template.with_default(default)?;
        Ok(self)
    }

    pub fn with_formats(mut self, name_format: ValueFormat, value_format: ValueFormat) -> Self {
        self.template = self.template.with_formats(name_format, value_format);
        self
    }

    /// `true` if the two variables would produce compatible columns (same name, type and unit).
    pub fn is_compatible(&self, other: &VariableDescriptor) -> bool {
        self.name() == other.name()
            && self.value_type() == other.value_type()
            && self.unit() == other.unit()
    }
}

impl Display for VariableDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.name(), self.unit(), self.value_type())?;
        match &self.source {
            SourceBinding::Unbound => write!(f, " not in file"),
            SourceBinding::Bound(aliases) => {
                let aliases = aliases.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" | ");
                write!(f, " from {aliases}")
            }
        }
    }
}

fn check_default(variable: &str, ty: ValueType, default: Value) -> Result<Value, ConfigurationError> {
    if default.is_missing() {
        return Ok(Value::Missing);
    }

    // Defaults given as integers are fine for float and timestamp columns; they are
    // stored as the column's type so that filled cells are indistinguishable from read ones.
    match default.coerce(ty, crate::values::default_time_origin()) {
        Some(v) if ty != ValueType::Text || matches!(default, Value::Text(_)) => Ok(v),
        _ => Err(ConfigurationError::invalid_default(
            variable.to_string(), format!("{default} cannot be stored as {ty}")
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn temperature() -> VariableTemplate {
        VariableTemplate::new("TEMP", "[deg_C]", ValueType::Float)
    }

    #[rstest]
    fn test_bind_does_not_affect_siblings(temperature: VariableTemplate) {
        let a = temperature.bind_as(vec![Alias::column("temperature")]).unwrap()
            .with_correction(Correction::numeric("plus one", |x| x + 1.0)).unwrap()
            .drop_rows_if_missing();
        let b = temperature.bind_as(vec![Alias::column("TEMP")]).unwrap();

        assert_eq!(a.aliases()[0].column, "temperature");
        assert_eq!(b.aliases()[0].column, "TEMP");
        assert!(a.correction().is_some());
        assert!(b.correction().is_none());
        assert!(!b.drops_rows_if_missing());
        assert!(!temperature.unbound().is_bound());
    }

    #[rstest]
    fn test_empty_aliases_rejected(temperature: VariableTemplate) {
        let err = temperature.bind_as(vec![]).unwrap_err();
        assert!(matches!(err, ConfigurationError::EmptyAliases(_)));
    }

    #[rstest]
    fn test_correction_requires_binding(temperature: VariableTemplate) {
        let err = temperature.unbound()
            .with_correction(Correction::numeric("neg", |x| -x))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnboundConfiguration { .. }));
    }

    #[rstest]
    fn test_rebind_keeps_hooks(temperature: VariableTemplate) {
        let d = temperature.bind_as(vec![Alias::column("t1")]).unwrap()
            .with_correction(Correction::numeric("neg", |x| -x)).unwrap()
            .drop_rows_if_group_missing("nutrients")
            .bind_as(vec![Alias::column("t2")]).unwrap();
        assert_eq!(d.aliases(), &[Alias::column("t2")]);
        assert_eq!(d.correction().map(|c| c.name()), Some("neg"));
        assert_eq!(d.drop_group(), Some("nutrients"));
    }

    #[rstest]
    #[case(Alias { column: "T".into(), flag_column: Some("T_QC".into()), flag_values: None })]
    #[case(Alias { column: "T".into(), flag_column: None, flag_values: Some(vec![Value::Int(1)]) })]
    #[case(Alias { column: "T".into(), flag_column: Some("T_QC".into()), flag_values: Some(vec![]) })]
    #[case(Alias::column(""))]
    fn test_invalid_aliases(temperature: VariableTemplate, #[case] alias: Alias) {
        let err = temperature.bind_as(vec![alias]).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidAlias { .. }));
    }

    #[test]
    fn test_flag_acceptance() {
        let alias = Alias::flagged("TEMP", "TEMP_QC", [1, 2]);
        assert!(alias.accepts_flag(&Value::Int(1)));
        assert!(alias.accepts_flag(&Value::Float(2.0)));
        assert!(alias.accepts_flag(&Value::Text("2".into())));
        assert!(!alias.accepts_flag(&Value::Int(4)));
        assert!(!alias.accepts_flag(&Value::Missing));
        assert!(Alias::column("TEMP").accepts_flag(&Value::Int(9)));
    }

    #[rstest]
    fn test_numeric_correction_passes_text_through() {
        let c = Correction::numeric("depth sign", |x| -x);
        assert_eq!(c.apply(&Value::Float(10.0)).unwrap(), Value::Float(-10.0));
        assert_eq!(c.apply(&Value::Text("<2".into())).unwrap(), Value::Float(-2.0));
        assert_eq!(c.apply(&Value::Text("74AB".into())).unwrap(), Value::Text("74AB".into()));
    }

    #[rstest]
    fn test_defaults(temperature: VariableTemplate) {
        let t = temperature.clone().with_default(Value::Int(-1)).unwrap();
        assert_eq!(t.default, Value::Float(-1.0));
        assert!(temperature.with_default(Value::Text("cold".into())).is_err());

        let expocode = VariableTemplate::new("EXPOCODE", "[]", ValueType::Text);
        assert!(expocode.with_default(Value::Int(3)).is_err());
    }

    #[rstest]
    fn test_formats_are_kept(temperature: VariableTemplate) {
        let fmt = ValueFormat::from_str("%10.3f").unwrap();
        let d = temperature
            .with_formats(ValueFormat::default_name_format(), fmt.clone())
            .bind_as(vec![Alias::column("T")]).unwrap();
        assert_eq!(d.value_format(), &fmt);
    }
}
