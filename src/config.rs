//! Variable template and provider configuration.
//!
//! Both configurations use [TOML](https://toml.io/en/). The variable templates are a
//! table per template id:
//!
//! ```toml
//! [temperature]
//! NAME = "TEMP"
//! UNIT = "[deg_C]"
//! TYPE = "float"
//! DEFAULT = "nan"
//! NAME_FORMAT = "%-10s"
//! VALUE_FORMAT = "%10.3f"
//! ```
//!
//! `TYPE` is one of `int`, `float`, `str` or `datetime`. `DEFAULT` is optional; it may be a
//! number, a string, or `"nan"` for a missing value. The formats are optional and default to
//! `%-15s` and `%15s`. A standard set of templates is built in, see [`TemplateSet::standard`].
//!
//! The provider configuration gives, for each provider, where its files are and which
//! category of data it provides:
//!
//! ```toml
//! [GLODAPv2]
//! PATH = "/data/glodap"
//! CATEGORY = "in_situ"
//! EXCLUDE = ["glodapv2_2005.csv"]
//! ```
//!
//! An optional `FILES_PATTERN` overrides the provider's built-in file name pattern.
//!
//! Templates are loaded once and passed by reference to the provider definitions
//! (see [`crate::providers`]); nothing in this crate holds them in a global.
use std::{io::Read, path::{Path, PathBuf}, str::FromStr};

use error_stack::ResultExt;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    error::ConfigurationError,
    format::ValueFormat,
    values::{Value, ValueType},
    variables::VariableTemplate,
};

pub(crate) static STANDARD_VARIABLES_TOML: &str = include_str!("configs/variables.toml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
struct TemplateEntry {
    name: String,
    unit: String,
    #[serde(rename = "TYPE")]
    value_type: String,
    #[serde(default)]
    default: Option<toml::Value>,
    #[serde(default)]
    name_format: Option<String>,
    #[serde(default)]
    value_format: Option<String>,
}

impl TemplateEntry {
    fn into_template(self, id: &str) -> error_stack::Result<VariableTemplate, ConfigurationError> {
        let value_type = ValueType::from_str(&self.value_type)
            .change_context_lazy(|| ConfigurationError::UnknownValueType(self.value_type.clone()))
            .attach_printable_lazy(|| format!("in template '{id}'"))?;

        let mut template = VariableTemplate::new(self.name, self.unit, value_type);

        if let Some(fmt) = self.name_format {
            template.name_format = ValueFormat::from_str(&fmt)
                .attach_printable_lazy(|| format!("NAME_FORMAT of template '{id}'"))?;
        }
        if let Some(fmt) = self.value_format {
            template.value_format = ValueFormat::from_str(&fmt)
                .attach_printable_lazy(|| format!("VALUE_FORMAT of template '{id}'"))?;
        }
        if let Some(default) = self.default {
            let default = toml_to_value(&default)
                .ok_or_else(|| ConfigurationError::invalid_default(
                    id.to_string(), format!("{default} is not a scalar")
                ))?;
            template = template.with_default(default)?;
        }

        Ok(template)
    }
}

fn toml_to_value(v: &toml::Value) -> Option<Value> {
    match v {
        toml::Value::String(s) => Some(Value::from_raw_str(s)),
        toml::Value::Integer(i) => Some(Value::Int(*i)),
        toml::Value::Float(f) => Some(Value::from_f64(*f)),
        toml::Value::Datetime(dt) => {
            let ts = Value::Text(dt.to_string());
            ts.coerce(ValueType::Timestamp, crate::values::default_time_origin())
        },
        toml::Value::Boolean(_) | toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

/// The variable templates available to build provider registries, keyed by template id.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: IndexMap<String, VariableTemplate>,
}

impl TemplateSet {
    /// The built-in templates: provider, expocode, date, year, month, day, hour,
    /// longitude, latitude, depth, temperature, salinity, oxygen, phosphate, nitrate,
    /// silicate and chlorophyll.
    pub fn standard() -> Self {
        Self::from_toml_str(STANDARD_VARIABLES_TOML)
            .expect("the built-in variable templates should be valid")
    }

    pub fn from_toml_str(s: &str) -> error_stack::Result<Self, ConfigurationError> {
        let entries: IndexMap<String, TemplateEntry> = toml::from_str(s)
            .map_err(|e| ConfigurationError::parsing_error(e.to_string()))?;

        let mut templates = IndexMap::with_capacity(entries.len());
        for (id, entry) in entries {
            let template = entry.into_template(&id)?;
            templates.insert(id, template);
        }
        Ok(Self { templates })
    }

    pub fn from_toml_file(p: &Path) -> error_stack::Result<Self, ConfigurationError> {
        let buf = read_file(p)?;
        Self::from_toml_str(&buf)
            .attach_printable_lazy(|| format!("in file {}", p.display()))
    }

    pub fn get(&self, id: &str) -> Result<&VariableTemplate, ConfigurationError> {
        self.templates.get(id)
            .ok_or_else(|| ConfigurationError::UnknownTemplate(id.to_string()))
    }

    /// Add or replace a template.
    pub fn insert<S: Into<String>>(&mut self, id: S, template: VariableTemplate) {
        self.templates.insert(id.into(), template);
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Where one provider's files are and which category of data they hold.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ProviderConfig {
    pub path: PathBuf,
    pub category: String,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub files_pattern: Option<String>,
}

/// Configuration of all the providers, keyed by provider name.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ProvidersConfig {
    providers: IndexMap<String, ProviderConfig>,
}

impl ProvidersConfig {
    pub fn from_toml_str(s: &str) -> error_stack::Result<Self, ConfigurationError> {
        let me = toml::from_str(s)
            .map_err(|e| ConfigurationError::parsing_error(e.to_string()))?;
        Ok(me)
    }

    pub fn from_toml_file(p: &Path) -> error_stack::Result<Self, ConfigurationError> {
        let buf = read_file(p)?;
        Self::from_toml_str(&buf)
            .attach_printable_lazy(|| format!("in file {}", p.display()))
    }

    pub fn get(&self, provider: &str) -> Result<&ProviderConfig, ConfigurationError> {
        self.providers.get(provider)
            .ok_or_else(|| ConfigurationError::UnknownProvider(provider.to_string()))
    }

    pub fn insert<S: Into<String>>(&mut self, provider: S, config: ProviderConfig) {
        self.providers.insert(provider.into(), config);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(|k| k.as_str())
    }
}

fn read_file(p: &Path) -> error_stack::Result<String, ConfigurationError> {
    let mut f = std::fs::File::open(p)
        .change_context_lazy(|| ConfigurationError::CouldNotRead(p.to_path_buf()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)
        .change_context_lazy(|| ConfigurationError::CouldNotRead(p.to_path_buf()))?;
    Ok(buf)
}
