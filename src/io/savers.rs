use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use error_stack::ResultExt;

use crate::{
    dateranges::DateRangeGenerator,
    error::ExportError,
    storer::{Storer, TableView},
    values::Value,
    variables::VariableDescriptor,
};

/// Writes any [`TableView`] in the canonical text format.
pub struct StorerSaver<'a, V: TableView> {
    view: &'a V,
}

impl<'a, V: TableView> StorerSaver<'a, V> {
    pub fn new(view: &'a V) -> Self {
        Self { view }
    }

    /// Write to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> error_stack::Result<(), ExportError> {
        let f = File::create(path)
            .change_context_lazy(|| ExportError::CouldNotWrite(path.to_path_buf()))?;
        let mut f = BufWriter::new(f);
        self.write_to(&mut f)
            .change_context_lazy(|| ExportError::CouldNotWrite(path.to_path_buf()))?;
        f.flush()
            .change_context_lazy(|| ExportError::CouldNotWrite(path.to_path_buf()))?;
        log::debug!("Wrote {} rows to {}", self.view.len(), path.display());
        Ok(())
    }

    pub fn write_to<W: Write>(&self, mut f: W) -> error_stack::Result<(), ExportError> {
        let variables = self.view.registry().saving_order();

        let names = variables.iter()
            .map(|v| v.name_format().format_label(v.name()))
            .collect::<Vec<_>>();
        writeln!(f, "{}", names.join(" ")).change_context(ExportError::IoError)?;

        let units = variables.iter()
            .map(|v| v.name_format().format_label(v.unit()))
            .collect::<Vec<_>>();
        writeln!(f, "{}", units.join(" ")).change_context(ExportError::IoError)?;

        for irow in 0..self.view.len() {
            let line = self.format_row(&variables, irow);
            writeln!(f, "{line}").change_context(ExportError::IoError)?;
        }
        Ok(())
    }

    fn format_row(&self, variables: &[&VariableDescriptor], irow: usize) -> String {
        variables.iter()
            .map(|v| {
                let value = self.view.value(v.name(), irow).cloned().unwrap_or_default();
                v.value_format().format(&no_whitespace(value))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn no_whitespace(value: Value) -> Value {
    match value {
        Value::Text(s) if s.chars().any(char::is_whitespace) => {
            Value::Text(s.split_whitespace().collect::<Vec<_>>().join("_"))
        },
        v => v,
    }
}

/// Write one file per date range to `directory`.
///
/// Each file is named `bgc_{category}_{YYYYMMDD}-{YYYYMMDD}.txt`. With `per_provider`,
/// the rows of each provider present in a range are also written to
/// `{directory}/{provider}/nutrients_{provider}_{YYYYMMDD}-{YYYYMMDD}.csv`. Ranges without
/// any rows produce no file. Returns the paths written.
pub fn save_from_dateranges(storer: &Storer, directory: &Path, ranges: &DateRangeGenerator, per_provider: bool)
-> error_stack::Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(directory)
        .change_context_lazy(|| ExportError::CouldNotCreateDir(directory.to_path_buf()))?;

    let mut written = vec![];
    for range in ranges.ranges() {
        let slice = storer.slice_on_dates(range.start(), range.end());
        if slice.is_empty() {
            log::debug!("No {} data from {range}", storer.category());
            continue;
        }

        let path = directory.join(format!("bgc_{}_{}.txt", storer.category(), range.file_stem()));
        slice.save(&path)?;
        written.push(path);

        if per_provider {
            for provider in slice.providers_present() {
                let provider_dir = directory.join(provider);
                std::fs::create_dir_all(&provider_dir)
                    .change_context_lazy(|| ExportError::CouldNotCreateDir(provider_dir.clone()))?;
                let path = provider_dir.join(format!("nutrients_{provider}_{}.csv", range.file_stem()));
                let provider_slice = slice.for_provider(provider);
                save_single_provider(&provider_slice, &path)?;
                written.push(path);
            }
        }
    }
    log::info!("Wrote {} file(s) to {}", written.len(), directory.display());
    Ok(written)
}

/// Write a view that must contain rows from a single provider.
pub fn save_single_provider<V: TableView>(view: &V, path: &Path) -> error_stack::Result<(), ExportError> {
    let providers = view.providers_present();
    if providers.len() > 1 {
        return Err(ExportError::MultipleProviders(providers.join(", ")).into());
    }
    StorerSaver::new(view).save(path)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::dateranges::DateInterval;
    use crate::test_utils::example_storer;

    use super::*;

    #[test]
    fn test_write_format() {
        let storer = example_storer();
        let mut buf = vec![];
        StorerSaver::new(&storer).write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2 + storer.len());
        let header: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(header, ["PROVIDER", "EXPOCODE", "DATE", "LATITUDE", "TEMP"]);
        let first: Vec<&str> = lines[2].split_whitespace().collect();
        assert_eq!(first, ["P1", "AA_1", "2010-05-01T12:00:00", "60.000000", "4.500"]);
        let missing: Vec<&str> = lines[3].split_whitespace().collect();
        assert_eq!(missing[4], "nan");
    }

    #[test]
    fn test_save_from_dateranges() {
        let storer = example_storer();
        let dir = tempfile::tempdir().unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2010, 5, day).unwrap();
        let ranges = DateRangeGenerator::new(d(1), d(31), DateInterval::Custom(2)).unwrap();

        let written = save_from_dateranges(&storer, dir.path(), &ranges, true).unwrap();
        let names: Vec<_> = written.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect();
        assert_eq!(names, [
            "bgc_in_situ_20100501-20100502.txt",
            "nutrients_P1_20100501-20100502.csv",
            "bgc_in_situ_20100503-20100504.txt",
            "nutrients_P2_20100503-20100504.csv",
        ]);
        assert!(dir.path().join("P2").join("nutrients_P2_20100503-20100504.csv").exists());
    }

    #[test]
    fn test_single_provider_check() {
        let storer = example_storer();
        let dir = tempfile::tempdir().unwrap();
        let err = save_single_provider(&storer, &dir.path().join("x.csv")).unwrap_err();
        assert!(matches!(err.current_context(), ExportError::MultipleProviders(_)));
    }
}
