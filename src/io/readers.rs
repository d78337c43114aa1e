use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};

use chrono::NaiveDateTime;
use error_stack::ResultExt;

use crate::{
    error::{LoadError, SchemaError},
    storer::Storer,
    table::Table,
    values::{default_time_origin, Value},
    variables::VariableRegistry,
};

/// How to interpret files written by [`StorerSaver`](super::StorerSaver).
///
/// Provider names are read back as single whitespace-free words. Exported text values
/// have their whitespace replaced by `_`, which is why loaders reject provider names
/// containing whitespace.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Category of the resulting storer
    pub category: String,
    /// Variable holding each row's provider, if any
    pub provider_label: Option<String>,
    /// Provider assigned to rows without a provider value
    pub default_provider: String,
    /// Whether the line after the names holds the units
    pub unit_row: bool,
    pub time_origin: NaiveDateTime,
}

impl ReadOptions {
    pub fn new<S: Into<String>>(category: S) -> Self {
        Self {
            category: category.into(),
            provider_label: Some("PROVIDER".to_string()),
            default_provider: "unknown".to_string(),
            unit_row: true,
            time_origin: default_time_origin(),
        }
    }
}

/// Read exported files back into one storer, coercing each column to its variable's type.
///
/// Every variable of `registry` must be in each file's header; extra columns are ignored.
pub fn read_files<P: AsRef<Path>>(paths: &[P], registry: &VariableRegistry, options: &ReadOptions) -> error_stack::Result<Storer, LoadError> {
    let mut providers: HashMap<String, Arc<str>> = HashMap::new();
    let mut table = Table::default();
    for path in paths {
        let t = read_one_file(path.as_ref(), registry, options, &mut providers)?;
        table.append(&t).map_err(LoadError::from)?;
    }

    if table.ncols() == 0 {
        let columns = registry.names().map(|n| (n.to_string(), vec![])).collect();
        table = Table::from_columns(columns, vec![]).map_err(LoadError::from)?;
    }

    let storer = Storer::new(table, registry.clone(), options.category.clone())
        .map_err(LoadError::from)?;
    Ok(storer)
}

fn read_one_file(path: &Path, registry: &VariableRegistry, options: &ReadOptions, providers: &mut HashMap<String, Arc<str>>)
-> error_stack::Result<Table, LoadError> {
    let f = File::open(path)
        .change_context_lazy(|| LoadError::could_not_read(path))?;
    let mut lines = BufReader::new(f).lines();

    let header: Vec<String> = match lines.next() {
        Some(line) => line.change_context_lazy(|| LoadError::could_not_read(path))?
            .split_whitespace()
            .map(|s| s.to_string())
            .collect(),
        None => return Err(LoadError::parsing_error(path, "the file is empty").into()),
    };
    if options.unit_row {
        lines.next();
    }

    let mut indices = Vec::with_capacity(registry.len());
    for name in registry.names() {
        let idx = header.iter().position(|h| h == name)
            .ok_or_else(|| SchemaError::missing_column(path.display(), name))
            .map_err(LoadError::from)?;
        indices.push(idx);
    }
    let provider_idx = options.provider_label.as_ref()
        .and_then(|label| header.iter().position(|h| h == label));

    let mut columns: Vec<Vec<Value>> = vec![vec![]; indices.len()];
    let mut row_providers = vec![];
    let mut nfailed = 0;
    for (iline, line) in lines.enumerate() {
        let line = line.change_context_lazy(|| LoadError::could_not_read(path))?;
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split_whitespace().collect();
        if cells.len() != header.len() {
            return Err(LoadError::parsing_error(
                path,
                format!("data line {} has {} values, the header has {}", iline + 1, cells.len(), header.len())
            ).into());
        }

        for ((descriptor, &idx), column) in registry.iter().zip(indices.iter()).zip(columns.iter_mut()) {
            let value = Value::from_raw_str(cells[idx])
                .coerce(descriptor.value_type(), options.time_origin)
                .unwrap_or_else(|| {
                    nfailed += 1;
                    Value::Missing
                });
            column.push(value);
        }

        let provider = provider_idx
            .map(|i| cells[i])
            .filter(|p| !Value::from_raw_str(p).is_missing())
            .unwrap_or(options.default_provider.as_str());
        let provider = providers.entry(provider.to_string())
            .or_insert_with(|| Arc::from(provider))
            .clone();
        row_providers.push(provider);
    }

    if nfailed > 0 {
        log::warn!("{nfailed} value(s) in {} could not be converted to their variable's type", path.display());
    }

    let columns = registry.names().map(|n| n.to_string()).zip(columns).collect();
    let table = Table::from_columns(columns, row_providers).map_err(LoadError::from)?;
    log::debug!("Read {} rows from {}", table.nrows(), path.display());
    Ok(table)
}
