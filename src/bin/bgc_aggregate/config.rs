//! Configuration of an aggregation run.
//!
//! The run configuration uses [TOML format](https://toml.io/en/), with every setting in
//! a `[run]` table:
//!
//! ```toml
//! [run]
//! providers = ["GLODAPv2", "IMR", "ICES"]
//! priority = ["GLODAPv2", "ICES", "IMR"]
//! providers_config = "providers.toml"
//! start_date = "2007-01-01"
//! end_date = "2008-12-31"
//! latitude = [50.0, 90.0]
//! longitude = [-40.0, 40.0]
//! depth = [-1000.0, 0.0]
//! output = "aggregated"
//! interval = "month"
//! ```
//!
//! `providers` lists the providers to load, which must have entries in the provider
//! configuration file `providers_config` (see [`bgc_rs::config::ProvidersConfig`]). When
//! the same measurement comes from several providers, the one that comes first in
//! `priority` is kept; `priority` defaults to the order of `providers`.
//!
//! The dates, latitude, longitude and depth ranges are all optional and inclusive. With a
//! start and end date, one file per `interval` (`day`, `week`, `month`, `year` or a number of
//! days) is written to `output`, plus one file per provider if `per_provider` is `true`.
//! Without dates, each category is written to a single file.
//!
//! `variables` may point to a variable template file replacing the built-in templates.
//! The tolerances used to find duplicate measurements can be changed in a `[run.duplicates]`
//! table with `location_tolerance` (degrees), `depth_tolerance` (meters) and `time_tolerance_hours`.
//!
//! Any setting can be overridden by an environment variable named `BGC_RUN__` followed by
//! the setting name, e.g. `BGC_RUN__OUTPUT=/tmp/out`.
use std::path::{Path, PathBuf};

use bgc_rs::{
    constraints::Constraints, dateranges::DateInterval, error::DateTimeError, storer::DuplicateKey, values::Value,
};
use chrono::{NaiveDate, TimeDelta};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("Could not load the run configuration: {0}")]
    Extraction(String),
    #[error("Invalid run configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    run: RunConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RunConfig {
    pub(crate) providers: Vec<String>,
    #[serde(default)]
    pub(crate) priority: Vec<String>,
    pub(crate) providers_config: PathBuf,
    #[serde(default)]
    pub(crate) variables: Option<PathBuf>,
    #[serde(default)]
    pub(crate) start_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) end_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) latitude: Option<[f64; 2]>,
    #[serde(default)]
    pub(crate) longitude: Option<[f64; 2]>,
    #[serde(default)]
    pub(crate) depth: Option<[f64; 2]>,
    pub(crate) output: PathBuf,
    #[serde(default = "default_interval")]
    pub(crate) interval: String,
    #[serde(default)]
    pub(crate) per_provider: bool,
    #[serde(default)]
    pub(crate) duplicates: Option<DuplicatesConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DuplicatesConfig {
    location_tolerance: f64,
    depth_tolerance: f64,
    time_tolerance_hours: i64,
}

fn default_interval() -> String {
    "year".to_string()
}

impl RunConfig {
    /// Read `path`, then apply the `BGC_` environment overrides.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BGC_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Extraction(e.to_string()))?;
        file.run.validate()?;
        Ok(file.run)
    }

    #[cfg(test)]
    fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = Figment::new()
            .merge(Toml::string(s))
            .extract()
            .map_err(|e| ConfigError::Extraction(e.to_string()))?;
        file.run.validate()?;
        Ok(file.run)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid("no providers to load".to_string()));
        }
        if self.start_date.is_some() != self.end_date.is_some() {
            return Err(ConfigError::Invalid("start_date and end_date must be given together".to_string()));
        }
        self.date_interval()?;
        Ok(())
    }

    pub(crate) fn date_interval(&self) -> Result<DateInterval, ConfigError> {
        self.interval.parse().map_err(|e: DateTimeError| ConfigError::Invalid(e.to_string()))
    }

    /// Providers in priority order: the `priority` list, then any other loaded provider.
    pub(crate) fn priority(&self) -> Vec<String> {
        let mut priority = self.priority.clone();
        for p in self.providers.iter() {
            if !priority.contains(p) {
                priority.push(p.clone());
            }
        }
        priority
    }

    pub(crate) fn constraints(&self) -> Constraints {
        let mut c = Constraints::new();
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            // the last day is included up to its final second
            let end = end.and_hms_opt(23, 59, 59).map(Value::from).unwrap_or_else(|| Value::from(end));
            c = c.with_boundary("DATE", Some(Value::from(start)), Some(end));
        }
        for (label, bounds) in [("LATITUDE", self.latitude), ("LONGITUDE", self.longitude), ("DEPH", self.depth)] {
            if let Some([min, max]) = bounds {
                c = c.with_boundary(label, Some(min), Some(max));
            }
        }
        c
    }

    pub(crate) fn duplicate_key(&self) -> DuplicateKey {
        match &self.duplicates {
            Some(d) => DuplicateKey::default().with_tolerances(
                d.location_tolerance, d.depth_tolerance, TimeDelta::hours(d.time_tolerance_hours)
            ),
            None => DuplicateKey::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config() {
        let s = r#"
[run]
providers = ["GLODAPv2", "IMR"]
priority = ["IMR"]
providers_config = "providers.toml"
start_date = "2007-01-01"
end_date = "2008-12-31"
latitude = [50.0, 90.0]
output = "out"
interval = "month"
"#;
        let run = RunConfig::from_toml_str(s).unwrap();
        assert_eq!(run.priority(), ["IMR", "GLODAPv2"]);
        assert_eq!(run.date_interval().unwrap(), DateInterval::Month);
        let c = run.constraints();
        assert!(c.is_constrained("DATE"));
        assert!(c.is_constrained("LATITUDE"));
        assert!(!c.is_constrained("DEPH"));
        assert_eq!(c.years_for("DATE").unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_run_config() {
        let missing_end = "[run]\nproviders = [\"IMR\"]\nproviders_config = \"p.toml\"\noutput = \"o\"\nstart_date = \"2007-01-01\"\n";
        assert!(RunConfig::from_toml_str(missing_end).is_err());
        let unknown = "[run]\nproviders = [\"IMR\"]\nproviders_config = \"p.toml\"\noutput = \"o\"\ncolor = \"red\"\n";
        assert!(RunConfig::from_toml_str(unknown).is_err());
    }
}
