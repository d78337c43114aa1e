use std::{path::Path, sync::Arc};

use approx::assert_relative_eq;
use bgc_rs::{
    constraints::Constraints,
    error::SchemaError,
    io::{read_files, ReadOptions},
    loaders::{CsvReader, SourceLoader},
    patterns::FileNamePattern,
    storer::{DuplicateKey, Storer, TableView},
    values::{Value, ValueType},
    variables::{Alias, Correction, VariableRegistry, VariableTemplate},
};
use chrono::NaiveDate;

fn template(name: &str, unit: &str, ty: ValueType) -> VariableTemplate {
    VariableTemplate::new(name, unit, ty)
}

fn registry(name: &str, temp_unit: &str) -> VariableRegistry {
    VariableRegistry::from_descriptors(name, [
        template("PROVIDER", "[]", ValueType::Text).unbound(),
        template("DATE", "[]", ValueType::Timestamp).bind_as(vec![Alias::column("date")]).unwrap(),
        template("LATITUDE", "[deg_N]", ValueType::Float).bind_as(vec![Alias::column("lat")]).unwrap(),
        template("LONGITUDE", "[deg_E]", ValueType::Float).bind_as(vec![Alias::column("lon")]).unwrap(),
        template("DEPH", "[meters]", ValueType::Float).bind_as(vec![Alias::column("depth")]).unwrap()
            .drop_rows_if_missing()
            .with_correction(Correction::numeric("negate", |x| -x)).unwrap(),
        template("TEMP", temp_unit, ValueType::Float)
            .bind_as(vec![
                Alias::flagged("temp_adj", "temp_adj_qc", [1]),
                Alias::column("temp"),
            ]).unwrap(),
        template("QUALITY", "[]", ValueType::Float)
            .with_default(Value::Float(-1.0)).unwrap()
            .unbound(),
    ]).unwrap()
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

fn loader(provider: &str, dir: &Path, temp_unit: &str) -> SourceLoader {
    SourceLoader::new(
        provider,
        "in_situ",
        dir.to_path_buf(),
        FileNamePattern::new("obs_({years}).csv"),
        registry(provider, temp_unit),
        Arc::new(CsvReader::default()),
    )
    .with_required(&["DATE", "LATITUDE", "LONGITUDE", "DEPH"])
    .with_provider_label("PROVIDER")
}

fn year_constraints(first: i32, last: i32) -> Constraints {
    let start = NaiveDate::from_ymd_opt(first, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(last, 12, 31).unwrap().and_hms_opt(23, 59, 59).unwrap();
    Constraints::new().with_boundary("DATE", Some(Value::from(start)), Some(Value::from(end)))
}

/// Three yearly files; the 2010 file exercises aliases, flags and the drop rule.
fn provider_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "obs_2009.csv", "date,lat,lon,depth,temp\n2009-06-01T00:00:00,60.0,5.0,10,3.0\n");
    write(dir.path(), "obs_2010.csv", "\
date,lat,lon,depth,temp_adj,temp_adj_qc,temp
2010-06-01T00:00:00,60.0,5.0,10,4.0,1,9.9
2010-06-01T00:00:00,60.0,5.0,20,4.5,4,9.9
2010-06-02T00:00:00,61.0,5.0,,5.0,1,9.9
");
    write(dir.path(), "obs_2011.csv", "date,lat,lon,depth,temp\n2011-06-01T00:00:00,60.0,5.0,10,6.0\n");
    dir
}

#[test]
fn test_load_selects_years_and_cleans_rows() {
    let dir = provider_dir();
    let (storer, report) = loader("P1", dir.path(), "[deg_C]")
        .load(&year_constraints(2010, 2011))
        .unwrap_or_else(|e| panic!("{e:?}"));

    assert_eq!(report.files_loaded.len(), 2, "2009 is outside the constraints");
    assert_eq!(report.rows_read, 4);
    assert_eq!(storer.len(), 3, "the row without depth is dropped");

    // The adjusted alias takes priority, and bad flags blank its values
    assert_eq!(storer.value("TEMP", 0), Some(&Value::Float(4.0)));
    assert_eq!(storer.value("TEMP", 1), Some(&Value::Missing));
    // The 2011 file only has the second alias
    assert_eq!(storer.value("TEMP", 2), Some(&Value::Float(6.0)));

    assert_eq!(storer.value("DEPH", 1), Some(&Value::Float(-20.0)));
    assert_eq!(storer.value("QUALITY", 0), Some(&Value::Float(-1.0)));
    assert_eq!(storer.value("PROVIDER", 2), Some(&Value::from("P1")));
    let names: Vec<&str> = storer.registry().names().collect();
    assert_eq!(names, ["PROVIDER", "DATE", "LATITUDE", "LONGITUDE", "DEPH", "TEMP", "QUALITY"]);
}

#[test]
fn test_unreadable_file_is_skipped() {
    let dir = provider_dir();
    std::fs::write(
        dir.path().join("obs_2010.csv"),
        b"date,lat,lon,depth,temp\n2010-06-01T00:00:00,\xff\xfe,5.0,10,\xfd\n",
    ).unwrap();

    let (storer, report) = loader("P1", dir.path(), "[deg_C]")
        .load(&year_constraints(2009, 2011))
        .unwrap_or_else(|e| panic!("{e:?}"));

    assert_eq!(report.files_skipped.len(), 1);
    assert!(report.files_skipped[0].ends_with("obs_2010.csv"));
    assert_eq!(report.files_loaded.len(), 2);
    assert_eq!(storer.len(), 2);
    let years: Vec<_> = (0..storer.len())
        .filter_map(|i| storer.value("DATE", i).and_then(|v| v.as_timestamp()))
        .map(|t| t.format("%Y").to_string())
        .collect();
    assert_eq!(years, ["2009", "2011"]);
}

#[test]
fn test_reloading_is_idempotent() {
    let dir = provider_dir();
    let l = loader("P1", dir.path(), "[deg_C]");
    let c = year_constraints(2009, 2011);
    let (first, _) = l.load(&c).unwrap();
    let (second, _) = l.load(&c).unwrap();
    assert_eq!(first.table(), second.table());

    let constrained_twice = first.apply_constraints(&c);
    assert_eq!(constrained_twice.table(), first.table());
}

#[test]
fn test_save_and_read_back() {
    let dir = provider_dir();
    let (storer, _) = loader("P1", dir.path(), "[deg_C]").load(&year_constraints(2009, 2011)).unwrap();

    let out = tempfile::tempdir().unwrap();
    let path = out.path().join("bgc_in_situ.txt");
    storer.save(&path).unwrap();

    let back = read_files(&[&path], storer.registry(), &ReadOptions::new("in_situ"))
        .unwrap_or_else(|e| panic!("{e:?}"));
    assert_eq!(back.len(), storer.len());
    assert_eq!(back.providers_present(), ["P1"]);
    for irow in 0..storer.len() {
        assert_eq!(back.value("DATE", irow), storer.value("DATE", irow));
        let (a, b) = (back.value("TEMP", irow).unwrap(), storer.value("TEMP", irow).unwrap());
        match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => assert_relative_eq!(a, b, epsilon = 1e-3),
            _ => assert!(a.is_missing() && b.is_missing()),
        }
    }
}

#[test]
fn test_union_and_priority() {
    let dir1 = provider_dir();
    let dir2 = tempfile::tempdir().unwrap();
    write(dir2.path(), "obs_2010.csv", "\
date,lat,lon,depth,temp
2010-06-01T00:10:00,60.0,5.0,10,4.1
2010-07-01T00:00:00,70.0,5.0,10,1.0
");
    let c = year_constraints(2010, 2010);
    let (s1, _) = loader("P1", dir1.path(), "[deg_C]").load(&c).unwrap();
    let (s2, _) = loader("P2", dir2.path(), "[deg_C]").load(&c).unwrap();

    let merged = Storer::union([&s1, &s2]).unwrap();
    assert_eq!(merged.len(), s1.len() + s2.len());
    assert_eq!(merged.providers(), ["P1", "P2"]);
    assert_eq!(merged.value("PROVIDER", 0), Some(&Value::from("P1")));
    assert_eq!(merged.value("PROVIDER", s1.len()), Some(&Value::from("P2")));

    let left = Storer::union([&Storer::union([&s1, &s2]).unwrap(), &s1]).unwrap();
    let right = Storer::union([&s1, &Storer::union([&s2, &s1]).unwrap()]).unwrap();
    assert_eq!(left.table(), right.table());

    // P2's first row is within the time tolerance of P1's first row
    let keep_p2 = merged.deduplicate(&["P2", "P1"], &DuplicateKey::default());
    assert_eq!(keep_p2.len(), merged.len() - 1);
    assert!(keep_p2.iter_temp().any(|t| t == Some(4.1)));
    assert!(!keep_p2.iter_temp().any(|t| t == Some(4.0)));

    let keep_p1 = merged.deduplicate(&["P1", "P2"], &DuplicateKey::default());
    assert_eq!(keep_p1.len(), merged.len() - 1);
    assert!(keep_p1.iter_temp().any(|t| t == Some(4.0)));
}

#[test]
fn test_unit_mismatch() {
    let dir = provider_dir();
    let c = year_constraints(2010, 2010);
    let (celsius, _) = loader("P1", dir.path(), "[deg_C]").load(&c).unwrap();
    let (kelvin, _) = loader("P2", dir.path(), "[K]").load(&c).unwrap();
    let err = Storer::union([&celsius, &kelvin]).unwrap_err();
    assert!(matches!(err, SchemaError::IncompatibleVariables(_)), "got {err:?}");
}

trait TempValues {
    fn iter_temp(&self) -> Box<dyn Iterator<Item = Option<f64>> + '_>;
}

impl TempValues for Storer {
    fn iter_temp(&self) -> Box<dyn Iterator<Item = Option<f64>> + '_> {
        Box::new((0..self.len()).map(|i| self.value("TEMP", i).and_then(|v| v.as_f64())))
    }
}
