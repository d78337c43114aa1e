//! Aggregated datasets.
//!
//! A [`Storer`] is a canonical [`Table`] together with the registry describing its
//! columns, the category of data it holds and the providers that contributed to it.
//! Storers from several providers of the same category are combined with
//! [`Storer::union`], then cleaned of measurements reported by more than one provider
//! with [`Storer::deduplicate`].
//!
//! Views over part of a storer ([`StorerSlice`]) hold row indices rather than copies,
//! and can be exported like the storer itself through the [`TableView`] trait.
use std::{collections::HashMap, path::Path};

use chrono::{NaiveDate, TimeDelta};
use itertools::Itertools;

use crate::{
    constraints::Constraints,
    error::{ExportError, SchemaError},
    io::savers::StorerSaver,
    table::{mask_to_indices, Table},
    values::Value,
    variables::{VariableDescriptor, VariableRegistry},
};

/// Timestamp variable used by [`Storer::slice_on_dates`].
const DATE_LABEL: &str = "DATE";

/// Read access to rows of canonical data, shared by storers and their slices.
pub trait TableView {
    fn registry(&self) -> &VariableRegistry;
    fn category(&self) -> &str;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The value of `column` in the `irow`-th row of this view.
    fn value(&self, column: &str, irow: usize) -> Option<&Value>;
    /// The provider of the `irow`-th row of this view.
    fn provider(&self, irow: usize) -> &str;
    /// Distinct providers of the rows in this view, in order of first appearance.
    fn providers_present(&self) -> Vec<&str> {
        (0..self.len()).map(|i| self.provider(i)).unique().collect()
    }
}

/// Which fields identify the same measurement, and how close they must be.
///
/// Two rows are duplicates if their latitudes, longitudes, depths and dates each differ
/// by no more than the matching tolerance. Every one of the four columns must be in the
/// table for rows to be compared at all.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateKey {
    pub latitude: String,
    pub longitude: String,
    pub depth: String,
    pub date: String,
    /// Tolerance on latitude and longitude, in degrees
    pub location_tolerance: f64,
    /// Tolerance on depth, in meters
    pub depth_tolerance: f64,
    pub time_tolerance: TimeDelta,
}

impl Default for DuplicateKey {
    fn default() -> Self {
        Self {
            latitude: "LATITUDE".to_string(),
            longitude: "LONGITUDE".to_string(),
            depth: "DEPH".to_string(),
            date: "DATE".to_string(),
            location_tolerance: 1e-4,
            depth_tolerance: 0.01,
            time_tolerance: TimeDelta::hours(1),
        }
    }
}

/// Position of a row along the four key fields; time in seconds.
#[derive(Debug, Clone, Copy)]
struct KeyPoint([f64; 4]);

impl DuplicateKey {
    pub fn with_tolerances(mut self, location: f64, depth: f64, time: TimeDelta) -> Self {
        self.location_tolerance = location;
        self.depth_tolerance = depth;
        self.time_tolerance = time;
        self
    }

    fn tolerances(&self) -> [f64; 4] {
        let time = self.time_tolerance.num_milliseconds().abs() as f64 / 1000.0;
        [self.location_tolerance.abs(), self.location_tolerance.abs(), self.depth_tolerance.abs(), time]
    }

    /// The key of every row, `None` for rows with a missing key field.
    ///
    /// `None` if any key column is absent from the table.
    fn points(&self, table: &Table) -> Option<Vec<Option<KeyPoint>>> {
        let lat = table.column(&self.latitude)?;
        let lon = table.column(&self.longitude)?;
        let depth = table.column(&self.depth)?;
        let date = table.column(&self.date)?;

        let seconds = |v: &Value| v.as_timestamp().map(|t| t.and_utc().timestamp_millis() as f64 / 1000.0);
        let points = (0..table.nrows()).map(|i| {
            Some(KeyPoint([lat[i].as_f64()?, lon[i].as_f64()?, depth[i].as_f64()?, seconds(&date[i])?]))
        }).collect();
        Some(points)
    }

    fn matches(&self, a: &KeyPoint, b: &KeyPoint) -> bool {
        self.tolerances().iter().zip(a.0.iter().zip(b.0.iter()))
            .all(|(tol, (x, y))| (x - y).abs() <= *tol)
    }

    /// Grid cell of a point. Cells are one tolerance wide, so matching points are at most
    /// one cell apart along each field.
    fn cell(&self, p: &KeyPoint) -> [i64; 4] {
        let mut cell = [0; 4];
        for (c, (x, tol)) in cell.iter_mut().zip(p.0.iter().zip(self.tolerances())) {
            // a zero tolerance still needs a finite cell width; matching stays exact
            let width = if tol > 0.0 { tol } else { 1.0 };
            *c = (x / width).floor() as i64;
        }
        cell
    }
}

fn neighbour_cells(cell: [i64; 4]) -> impl Iterator<Item = [i64; 4]> {
    (0..81).map(move |n: i64| {
        let mut c = cell;
        let mut rest = n;
        for v in c.iter_mut() {
            *v += rest % 3 - 1;
            rest /= 3;
        }
        c
    })
}

/// Canonical data of one category, with the registry describing its columns.
#[derive(Debug, Clone)]
pub struct Storer {
    table: Table,
    registry: VariableRegistry,
    category: String,
    providers: Vec<String>,
}

impl Storer {
    /// Wrap a table whose columns are exactly the registry's variables.
    ///
    /// The columns are put in registry order. The providers are those of the rows.
    pub fn new<C: Into<String>>(mut table: Table, registry: VariableRegistry, category: C) -> Result<Self, SchemaError> {
        let names: Vec<&str> = registry.names().collect();
        table.reorder_columns(&names)?;
        let providers = table.providers().iter().map(|p| p.to_string()).unique().collect();
        Ok(Self { table, registry, category: category.into(), providers })
    }

    /// List `provider` as contributing to this storer even if it has no rows.
    pub fn with_provider<S: AsRef<str>>(mut self, provider: S) -> Self {
        if !self.providers.iter().any(|p| p == provider.as_ref()) {
            self.providers.push(provider.as_ref().to_string());
        }
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Two storers can be combined if they have the same category and compatible registries.
    pub fn check_compatible(&self, other: &Storer) -> Result<(), SchemaError> {
        if self.category != other.category {
            return Err(SchemaError::IncompatibleCategories {
                first: self.category.clone(),
                other: other.category.clone(),
            });
        }
        self.registry.check_compatible(&other.registry)
    }

    /// Add the rows of `other` after the rows of this storer.
    pub fn append(&mut self, other: &Storer) -> Result<(), SchemaError> {
        self.check_compatible(other)?;
        self.table.append(&other.table)?;
        for p in other.providers.iter() {
            if !self.providers.contains(p) {
                self.providers.push(p.clone());
            }
        }
        Ok(())
    }

    /// Concatenate storers in order; the result uses the first storer's registry.
    pub fn union<'a, I: IntoIterator<Item = &'a Storer>>(storers: I) -> Result<Storer, SchemaError> {
        let mut it = storers.into_iter();
        let mut out = it.next().ok_or(SchemaError::NothingToAggregate)?.clone();
        for s in it {
            out.append(s)?;
        }
        Ok(out)
    }

    /// A new storer with only the rows respecting `constraints`.
    pub fn apply_constraints(&self, constraints: &Constraints) -> Storer {
        self.with_table(constraints.apply(&self.table))
    }

    /// Remove measurements reported by several providers, keeping the best-ranked provider's.
    ///
    /// Providers are ranked by their position in `priority`; providers not in it rank after
    /// the listed ones, in lexicographic order. A row is removed if a row from a better-ranked
    /// provider matches it within the tolerances of `key`, so duplicates within one provider's
    /// data are untouched. Rows with a missing key field are always kept, and the surviving
    /// rows keep their order. If a key column is not in the table, nothing is removed.
    pub fn deduplicate<S: AsRef<str>>(&self, priority: &[S], key: &DuplicateKey) -> Storer {
        let Some(points) = key.points(&self.table) else {
            log::warn!(
                "{} data lacks one of {}, {}, {} or {}, duplicates were not removed",
                self.category, key.latitude, key.longitude, key.depth, key.date
            );
            return self.clone();
        };

        let ranks = self.provider_ranks(priority);
        let rank_of = |irow: usize| ranks.get(self.table.providers()[irow].as_ref()).copied().unwrap_or(usize::MAX);

        let mut cells: HashMap<[i64; 4], Vec<usize>> = HashMap::new();
        for (irow, p) in points.iter().enumerate() {
            if let Some(p) = p {
                cells.entry(key.cell(p)).or_default().push(irow);
            }
        }

        let keep: Vec<bool> = points.iter().enumerate().map(|(irow, p)| {
            let Some(p) = p else { return true };
            let rank = rank_of(irow);
            !neighbour_cells(key.cell(p))
                .filter_map(|c| cells.get(&c))
                .flatten()
                .any(|&other| rank_of(other) < rank && points[other].is_some_and(|o| key.matches(p, &o)))
        }).collect();

        let ndropped = keep.iter().filter(|k| !**k).count();
        if ndropped > 0 {
            log::info!("Removed {ndropped} duplicate row(s) from {} data", self.category);
        }
        self.with_table(self.table.filter(&keep))
    }

    fn with_table(&self, table: Table) -> Storer {
        Storer {
            table,
            registry: self.registry.clone(),
            category: self.category.clone(),
            providers: self.providers.clone(),
        }
    }

    fn provider_ranks<S: AsRef<str>>(&self, priority: &[S]) -> HashMap<String, usize> {
        let mut ranks: HashMap<String, usize> = HashMap::new();
        for p in priority {
            let n = ranks.len();
            ranks.entry(p.as_ref().to_string()).or_insert(n);
        }
        let unlisted = self.table.providers().iter()
            .map(|p| p.to_string())
            .filter(|p| !ranks.contains_key(p))
            .sorted()
            .dedup()
            .collect_vec();
        for p in unlisted {
            let n = ranks.len();
            ranks.insert(p, n);
        }
        ranks
    }

    /// A view of the rows whose date falls between `start` and `end`, both included.
    ///
    /// Rows with a missing date are not in the view.
    pub fn slice_on_dates(&self, start: NaiveDate, end: NaiveDate) -> StorerSlice<'_> {
        let mask: Vec<bool> = match self.table.column(DATE_LABEL) {
            Some(dates) => dates.iter()
                .map(|d| d.as_timestamp().is_some_and(|t| t.date() >= start && t.date() <= end))
                .collect(),
            None => {
                log::warn!("No {DATE_LABEL} variable in {} data, date slice is empty", self.category);
                vec![false; self.table.nrows()]
            }
        };
        StorerSlice { storer: self, index: mask_to_indices(&mask) }
    }

    /// A view of the rows at `index`, which must be valid row numbers.
    pub fn slice_using_index(&self, index: Vec<usize>) -> StorerSlice<'_> {
        StorerSlice { storer: self, index }
    }

    /// Add a computed column described by `descriptor`.
    pub fn add_feature(&mut self, descriptor: VariableDescriptor, values: Vec<Value>) -> Result<(), SchemaError> {
        self.table.push_column(descriptor.name(), values)?;
        let name = descriptor.name().to_string();
        self.registry.add(descriptor)
            .map_err(|_| SchemaError::DuplicateColumn(name))
    }

    /// Write this storer in the canonical text format.
    pub fn save(&self, path: &Path) -> error_stack::Result<(), ExportError> {
        StorerSaver::new(self).save(path)
    }
}

impl TableView for Storer {
    fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn len(&self) -> usize {
        self.table.nrows()
    }

    fn value(&self, column: &str, irow: usize) -> Option<&Value> {
        self.table.get(column, irow)
    }

    fn provider(&self, irow: usize) -> &str {
        &self.table.providers()[irow]
    }
}

/// Some rows of a storer, by index.
#[derive(Debug, Clone)]
pub struct StorerSlice<'a> {
    storer: &'a Storer,
    index: Vec<usize>,
}

impl<'a> StorerSlice<'a> {
    pub fn storer(&self) -> &'a Storer {
        self.storer
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Row numbers in the underlying storer.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.index.iter().copied()
    }

    /// Narrow this slice to the rows from `provider`.
    pub fn for_provider(&self, provider: &str) -> StorerSlice<'a> {
        let index = self.iter()
            .filter(|&i| self.storer.provider(i) == provider)
            .collect();
        StorerSlice { storer: self.storer, index }
    }

    /// Copy the rows of this slice into a new storer.
    pub fn to_storer(&self) -> Storer {
        self.storer.with_table(self.storer.table.select(&self.index))
    }

    pub fn save(&self, path: &Path) -> error_stack::Result<(), ExportError> {
        StorerSaver::new(self).save(path)
    }
}

impl<'a> TableView for StorerSlice<'a> {
    fn registry(&self) -> &VariableRegistry {
        &self.storer.registry
    }

    fn category(&self) -> &str {
        &self.storer.category
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn value(&self, column: &str, irow: usize) -> Option<&Value> {
        self.storer.table.get(column, *self.index.get(irow)?)
    }

    fn provider(&self, irow: usize) -> &str {
        self.storer.provider(self.index[irow])
    }
}
