//! ICES bottle and CTD data, CSV files with a date column.
use crate::{
    config::{ProviderConfig, TemplateSet},
    error::ConfigurationError,
    loaders::{CsvReader, SourceLoader},
    variables::{Correction, VariableRegistry},
};

use super::{configure, from_unit, in_file, not_in_file, reader, NUTRIENTS_GROUP};

pub const NAME: &str = "ICES";
pub const FILES_PATTERN: &str = "ices_{years}.csv";

pub fn registry(templates: &TemplateSet) -> Result<VariableRegistry, ConfigurationError> {
    VariableRegistry::from_descriptors(NAME, [
        not_in_file(templates, "provider")?,
        in_file(templates, "expocode", &["Cruise"])?,
        in_file(templates, "date", &["DATE"])?,
        not_in_file(templates, "year")?,
        not_in_file(templates, "month")?,
        not_in_file(templates, "day")?,
        not_in_file(templates, "hour")?,
        in_file(templates, "longitude", &["LONGITUDE"])?,
        in_file(templates, "latitude", &["LATITUDE"])?,
        in_file(templates, "depth", &["DEPTH"])?
            .drop_rows_if_missing()
            .with_correction(Correction::numeric("negate", |x| -x))?,
        in_file(templates, "temperature", &["CTDTMP"])?,
        in_file(templates, "salinity", &["CTDSAL"])?,
        from_unit(in_file(templates, "oxygen", &["DOXY"])?, "ml/l")?,
        in_file(templates, "phosphate", &["PHOS"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        in_file(templates, "nitrate", &["NTRA"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        in_file(templates, "silicate", &["SLCA"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
        in_file(templates, "chlorophyll", &["CPHL"])?.drop_rows_if_group_missing(NUTRIENTS_GROUP),
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
    fn test_date_parts_from_date() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ices_2012.csv"), "\
Cruise,DATE,LONGITUDE,LATITUDE,DEPTH,CTDTMP,CTDSAL,NTRA
,,degE,degN,m,degC,psu,umol/l
58GS 2012,2012-08-14 06:30:00,-5.5,62.0,25.0,9.1,35.2,4.0
").unwrap();
        let config = ProviderConfig {
            path: dir.path().to_path_buf(),
            category: "in_situ".to_string(),
            exclude: vec![],
            files_pattern: None,
        };
        let (storer, _) = loader(&TemplateSet::standard(), &config).unwrap()
            .load(&Constraints::new())
            .unwrap();
        assert_eq!(storer.len(), 1);
        assert_eq!(storer.value("YEAR", 0), Some(&Value::Int(2012)));
        assert_eq!(storer.value("MONTH", 0), Some(&Value::Int(8)));
        assert_eq!(storer.value("DAY", 0), Some(&Value::Int(14)));
        assert_eq!(storer.value("HOUR", 0), Some(&Value::Int(6)));
        assert_eq!(storer.value("EXPOCODE", 0), Some(&Value::from("58GS 2012")));
    }
}
