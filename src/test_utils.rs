use std::{collections::BTreeSet, path::Path, sync::Arc};

use crate::{
    config::TemplateSet,
    error::LoadError,
    loaders::{RawFrame, RawReader},
    storer::Storer,
    table::Table,
    values::{default_time_origin, Value, ValueType},
    variables::{VariableRegistry, VariableTemplate},
};

/// A reader returning the same frame for every file, to test loaders without parsing.
#[derive(Debug)]
pub(crate) struct FrameReader(pub RawFrame);

impl RawReader for FrameReader {
    fn format_name(&self) -> &'static str {
        "in-memory"
    }

    fn read(&self, _path: &Path, _wanted: &BTreeSet<String>) -> error_stack::Result<RawFrame, LoadError> {
        Ok(self.0.clone())
    }
}

pub(crate) fn frame_reader(frame: RawFrame) -> Arc<dyn RawReader> {
    Arc::new(FrameReader(frame))
}

pub(crate) fn float_template(name: &str) -> VariableTemplate {
    VariableTemplate::new(name, "[]", ValueType::Float)
}

pub(crate) fn timestamp(s: &str) -> Value {
    Value::from(s).coerce(ValueType::Timestamp, default_time_origin())
        .expect("test timestamps should be valid")
}

/// PROVIDER, EXPOCODE, DATE, LATITUDE and TEMP from the standard templates.
pub(crate) fn example_registry() -> VariableRegistry {
    let templates = TemplateSet::standard();
    let ids = ["provider", "expocode", "date", "latitude", "temperature"];
    VariableRegistry::from_descriptors("example", ids.iter().map(|id| templates.get(id).unwrap().unbound()))
        .unwrap()
}

/// Three rows: two from P1 on May 1st and 2nd 2010, one from P2 on May 3rd.
pub(crate) fn example_storer() -> Storer {
    let p1: Arc<str> = Arc::from("P1");
    let p2: Arc<str> = Arc::from("P2");
    let mut t = Table::with_providers(vec![p1.clone(), p1, p2]);
    t.push_column("PROVIDER", vec![Value::from("P1"), Value::from("P1"), Value::from("P2")]).unwrap();
    t.push_column("EXPOCODE", vec![Value::from("AA 1"), Value::from("AA 1"), Value::from("BB")]).unwrap();
    t.push_column("DATE", vec![
        timestamp("2010-05-01T12:00:00"), timestamp("2010-05-02T00:00:00"), timestamp("2010-05-03T23:00:00"),
    ]).unwrap();
    t.push_column("LATITUDE", vec![Value::Float(60.0), Value::Float(61.5), Value::Float(-45.25)]).unwrap();
    t.push_column("TEMP", vec![Value::Float(4.5), Value::Missing, Value::Float(12.0)]).unwrap();
    Storer::new(t, example_registry(), "in_situ").unwrap()
}
