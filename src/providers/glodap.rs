//! GLODAPv2 merged master files, one CSV file per year.
use crate::{
    config::{ProviderConfig, TemplateSet},
    error::ConfigurationError,
    loaders::{CsvReader, SourceLoader},
    variables::{Correction, VariableRegistry},
};

use super::{configure, from_unit, in_file, not_in_file, reader, NUTRIENTS_GROUP};

pub const NAME: &str = "GLODAPv2";
pub const FILES_PATTERN: &str = "glodapv2_({years}).csv";

pub fn registry(templates: &TemplateSet) -> Result<VariableRegistry, ConfigurationError> {
    VariableRegistry::from_descriptors(NAME, [
        not_in_file(templates, "provider")?,
        in_file(templates, "expocode", &["cruise"])?,
        not_in_file(templates, "date")?,
        in_file(templates, "year", &["YEAR"])?,
        in_file(templates, "month", &["MONTH"])?,
        in_file(templates, "day", &["DAY"])?,
        in_file(templates, "hour", &["hour"])?,
        in_file(templates, "longitude", &["LONGITUDE"])?,
        in_file(templates, "latitude", &["LATITUDE"])?,
        in_file(templates, "depth", &["DEPTH"])?
            .drop_rows_if_missing()
            .with_correction(Correction::numeric("negate", |x| -x))?,
        in_file(templates, "temperature", &["THETA"])?,
        in_file(templates, "salinity", &["SALNTY"])?,
        from_unit(in_file(templates, "oxygen", &["OXYGEN"])?, "umol/kg")?,
        in_file(templates, "phosphate", &["PHSPHT"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        in_file(templates, "nitrate", &["NITRAT"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        in_file(templates, "silicate", &["SILCAT"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        not_in_file(templates, "chlorophyll")?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
    ])
}

pub fn loader(templates: &TemplateSet, config: &ProviderConfig) -> Result<SourceLoader, ConfigurationError> {
    let reader = reader(CsvReader::delimited(b',').skip_after_header(1));
    Ok(configure(SourceLoader::from_config(NAME, config, FILES_PATTERN, registry(templates)?, reader)))
}

#[cfg(test)]
mod tests {
    use crate::constraints::Constraints;
    use crate::storer::TableView;
    use crate::values::Value;

    use super::*;

    #[test]
    fn test_load_glodap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("glodapv2_2010.csv"), "\
cruise,YEAR,MONTH,DAY,hour,LONGITUDE,LATITUDE,DEPTH,THETA,SALNTY,OXYGEN,PHSPHT,NITRAT,SILCAT
,,,,,degE,degN,m,degC,,umol/kg,umol/kg,umol/kg,umol/kg
06AQ2010,2010,5,1,12,5.0,60.0,10,4.5,35.0,200,0.5,nan,nan
06AQ2010,2010,5,1,12,5.0,60.0,20,4.5,35.0,200,nan,nan,nan
06AQ2010,2010,5,1,12,5.0,60.0,,4.5,35.0,200,0.5,8.0,3.0
").unwrap();
        std::fs::write(dir.path().join("glodapv2_2011.csv"), "cruise\n\n").unwrap();

        let config = ProviderConfig {
            path: dir.path().to_path_buf(),
            category: "in_situ".to_string(),
            exclude: vec![],
            files_pattern: None,
        };
        let loader = loader(&TemplateSet::standard(), &config).unwrap();
        let d = |y| chrono::NaiveDate::from_ymd_opt(y, 1, 1).unwrap();
        let constraints = Constraints::new().with_boundary("DATE", Some(d(2010)), Some(d(2010)));

        let (storer, report) = loader.load(&constraints).unwrap_or_else(|e| panic!("{e:?}"));
        assert_eq!(report.files_loaded.len(), 1);
        assert_eq!(storer.len(), 0, "the boundary excludes everything after 2010-01-01");

        let constraints = Constraints::new().with_boundary("LATITUDE", Some(50.0), Some(70.0));
        let (storer, report) = loader.load(&constraints).unwrap();
        assert_eq!(report.files_loaded.len(), 2);
        assert_eq!(storer.len(), 1);
        assert_eq!(storer.value("DEPH", 0), Some(&Value::Float(-10.0)));
        approx::assert_relative_eq!(storer.value("DOXY", 0).and_then(|v| v.as_f64()).unwrap(), 205.0);
        assert_eq!(storer.value("PROVIDER", 0), Some(&Value::from("GLODAPv2")));
        assert_eq!(storer.value("DATE", 0).and_then(|d| d.as_timestamp()).map(|t| t.to_string()), Some("2010-05-01 12:00:00".to_string()));
    }
}
