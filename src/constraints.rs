//! Row filters on named columns.
//!
//! A [`Constraints`] value holds any number of tests, each on one column:
//!
//! - a boundary, an inclusive range where either side may be open, or
//! - a superset, an explicit list of allowed values.
//!
//! A row respects the constraints if it passes every test whose column is in the
//! table. Tests on columns the table does not have are skipped, so the same
//! constraints can be used for providers with different sets of variables. A missing
//! value never passes a test on its column.
use std::{cmp::Ordering, collections::BTreeSet, fmt::Display};

use chrono::Datelike;

use crate::{table::Table, values::Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Boundary { min: Option<Value>, max: Option<Value> },
    Superset(Vec<Value>),
}

impl Constraint {
    pub fn test(&self, value: &Value) -> bool {
        if value.is_missing() {
            return false;
        }

        match self {
            Constraint::Boundary { min, max } => {
                let above_min = min.as_ref()
                    .map(|m| matches!(value.compare(m), Some(Ordering::Greater | Ordering::Equal)))
                    .unwrap_or(true);
                let below_max = max.as_ref()
                    .map(|m| matches!(value.compare(m), Some(Ordering::Less | Ordering::Equal)))
                    .unwrap_or(true);
                above_min && below_max
            },
            Constraint::Superset(allowed) => allowed.iter().any(|a| a.loosely_eq(value)),
        }
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Boundary { min, max } => {
                let min = min.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-inf".to_string());
                let max = max.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "+inf".to_string());
                write!(f, "in [{min}, {max}]")
            },
            Constraint::Superset(values) => {
                let values = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                write!(f, "one of {{{values}}}")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    tests: Vec<(String, Constraint)>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an inclusive range test on `label`. `None` leaves that side open.
    pub fn with_boundary<S, V>(mut self, label: S, min: Option<V>, max: Option<V>) -> Self
    where
        S: Into<String>,
        V: Into<Value>,
    {
        let c = Constraint::Boundary { min: min.map(|v| v.into()), max: max.map(|v| v.into()) };
        self.tests.push((label.into(), c));
        self
    }

    /// Add an allow-list test on `label`.
    pub fn with_superset<S, I, V>(mut self, label: S, values: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let c = Constraint::Superset(values.into_iter().map(|v| v.into()).collect());
        self.tests.push((label.into(), c));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn is_constrained(&self, label: &str) -> bool {
        self.tests.iter().any(|(l, _)| l == label)
    }

    pub fn tests(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.tests.iter().map(|(l, c)| (l.as_str(), c))
    }

    /// One boolean per row of `table`, `true` where the row passes every applicable test.
    pub fn is_respected(&self, table: &Table) -> Vec<bool> {
        let mut mask = vec![true; table.nrows()];
        for (label, constraint) in self.tests.iter() {
            let Some(column) = table.column(label) else {
                log::debug!("Constraint on {label} not applied, column not in table");
                continue;
            };
            for (keep, value) in mask.iter_mut().zip(column) {
                *keep = *keep && constraint.test(value);
            }
        }
        mask
    }

    /// A copy of `table` with only the rows passing every applicable test.
    pub fn apply(&self, table: &Table) -> Table {
        if self.is_empty() {
            return table.clone();
        }
        table.filter(&self.is_respected(table))
    }

    /// All the tests of both constraint sets.
    pub fn union(&self, other: &Constraints) -> Constraints {
        let mut tests = self.tests.clone();
        for t in other.tests.iter() {
            if !tests.contains(t) {
                tests.push(t.clone());
            }
        }
        Self { tests }
    }

    /// The tightest bounds set on `label` by the boundary tests, `(None, None)` if unbounded.
    pub fn get_extremes(&self, label: &str) -> (Option<Value>, Option<Value>) {
        let mut lower: Option<Value> = None;
        let mut upper: Option<Value> = None;
        for (l, c) in self.tests.iter() {
            if l != label {
                continue;
            }
            if let Constraint::Boundary { min, max } = c {
                if let Some(m) = min {
                    let tighter = lower.as_ref().map(|cur| m.compare(cur) == Some(Ordering::Greater)).unwrap_or(true);
                    if tighter {
                        lower = Some(m.clone());
                    }
                }
                if let Some(m) = max {
                    let tighter = upper.as_ref().map(|cur| m.compare(cur) == Some(Ordering::Less)).unwrap_or(true);
                    if tighter {
                        upper = Some(m.clone());
                    }
                }
            }
        }
        (lower, upper)
    }

    /// The calendar years the tests on the timestamp column `label` allow.
    ///
    /// `None` means any year is allowed: there is no closed boundary and no allow-list
    /// of timestamps on this column. Multiple tests are intersected.
    pub fn years_for(&self, label: &str) -> Option<BTreeSet<i32>> {
        let mut years: Option<BTreeSet<i32>> = None;
        for (l, c) in self.tests.iter() {
            if l != label {
                continue;
            }

            let these_years: BTreeSet<i32> = match c {
                Constraint::Boundary { min: Some(min), max: Some(max) } => {
                    match (min.as_timestamp(), max.as_timestamp()) {
                        (Some(a), Some(b)) => (a.year()..=b.year()).collect(),
                        _ => continue,
                    }
                },
                Constraint::Boundary { .. } => continue,
                Constraint::Superset(values) => {
                    values.iter().filter_map(|v| v.as_timestamp()).map(|t| t.year()).collect()
                },
            };

            years = match years {
                Some(y) => Some(y.intersection(&these_years).copied().collect()),
                None => Some(these_years),
            };
        }
        years
    }
}

impl Display for Constraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.tests.is_empty() {
            return write!(f, "no constraints");
        }
        let s = self.tests.iter()
            .map(|(l, c)| format!("{l} {c}"))
            .collect::<Vec<_>>()
            .join(" and ");
        write!(f, "{s}")
    }
}
