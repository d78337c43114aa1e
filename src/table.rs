//! Columnar storage for canonical tables.
use std::sync::Arc;

use indexmap::IndexMap;

use crate::{error::SchemaError, values::Value};

/// Rows of observations stored as one vector of values per column.
///
/// Every row also records the provider it came from. The number of rows is the
/// length of that provider column, and every value column has the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: IndexMap<String, Vec<Value>>,
    providers: Vec<Arc<str>>,
}

impl Table {
    /// A table with no columns and one row per element of `providers`.
    pub fn with_providers(providers: Vec<Arc<str>>) -> Self {
        Self { columns: IndexMap::new(), providers }
    }

    /// A table with no columns and `nrows` rows all from `provider`.
    pub fn for_provider(provider: &Arc<str>, nrows: usize) -> Self {
        Self::with_providers(vec![Arc::clone(provider); nrows])
    }

    pub fn from_columns(columns: IndexMap<String, Vec<Value>>, providers: Vec<Arc<str>>) -> Result<Self, SchemaError> {
        let mut me = Self::with_providers(providers);
        for (name, values) in columns {
            me.push_column(name, values)?;
        }
        Ok(me)
    }

    pub fn nrows(&self) -> usize {
        self.providers.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn providers(&self) -> &[Arc<str>] {
        &self.providers
    }

    /// The value of `column` in row `irow`, `None` if either does not exist.
    pub fn get(&self, column: &str, irow: usize) -> Option<&Value> {
        self.columns.get(column).and_then(|c| c.get(irow))
    }

    /// Add a column at the end. It must have one value per row.
    pub fn push_column<S: Into<String>>(&mut self, name: S, values: Vec<Value>) -> Result<(), SchemaError> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(SchemaError::DuplicateColumn(name));
        }
        if values.len() != self.nrows() {
            return Err(SchemaError::column_length(name, self.nrows(), values.len()));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Replace the values of an existing column, or add it if not present.
    pub fn set_column<S: Into<String>>(&mut self, name: S, values: Vec<Value>) -> Result<(), SchemaError> {
        let name = name.into();
        if values.len() != self.nrows() {
            return Err(SchemaError::column_length(name, self.nrows(), values.len()));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Mutable access to a column's values. The length cannot change through this.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut [Value]> {
        self.columns.get_mut(name).map(|v| v.as_mut_slice())
    }

    /// Reorder the columns to follow `order`, which must list every column exactly once.
    pub fn reorder_columns<S: AsRef<str>>(&mut self, order: &[S]) -> Result<(), SchemaError> {
        for name in order {
            if !self.columns.contains_key(name.as_ref()) {
                return Err(SchemaError::missing_column("the table", name.as_ref()));
            }
        }
        if let Some(extra) = self.columns.keys().find(|k| !order.iter().any(|n| n.as_ref() == k.as_str())) {
            return Err(SchemaError::IncompatibleVariables(format!("column '{extra}' is not in the new column order")));
        }
        if order.len() != self.columns.len() {
            return Err(SchemaError::IncompatibleVariables("the new column order lists a column twice".to_string()));
        }

        let mut new_columns = IndexMap::with_capacity(self.columns.len());
        for name in order {
            if let Some(values) = self.columns.swap_remove(name.as_ref()) {
                new_columns.insert(name.as_ref().to_string(), values);
            }
        }
        self.columns = new_columns;
        Ok(())
    }

    /// A new table with the rows at `indices`, in that order.
    ///
    /// # Panics
    /// If any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Self {
        let columns = self.columns.iter()
            .map(|(k, v)| (k.clone(), indices.iter().map(|&i| v[i].clone()).collect()))
            .collect();
        let providers = indices.iter().map(|&i| Arc::clone(&self.providers[i])).collect();
        Self { columns, providers }
    }

    /// A new table with the rows where `mask` is `true`.
    pub fn filter(&self, mask: &[bool]) -> Self {
        let indices = mask_to_indices(mask);
        self.select(&indices)
    }

    /// Keep only the rows where `mask` is `true`.
    pub fn retain(&mut self, mask: &[bool]) {
        for values in self.columns.values_mut() {
            let mut it = mask.iter();
            values.retain(|_| it.next().copied().unwrap_or(false));
        }
        let mut it = mask.iter();
        self.providers.retain(|_| it.next().copied().unwrap_or(false));
    }

    /// Add the rows of `other` after the rows of this table.
    ///
    /// Columns are matched by name, so the two tables may store them in a different
    /// order, but both must have exactly the same set of columns.
    pub fn append(&mut self, other: &Table) -> Result<(), SchemaError> {
        if self.ncols() == 0 && self.nrows() == 0 {
            *self = other.clone();
            return Ok(());
        }

        for name in other.columns.keys() {
            if !self.columns.contains_key(name) {
                return Err(SchemaError::missing_column("the table being appended to", name.as_str()));
            }
        }
        for (name, values) in self.columns.iter_mut() {
            let new = other.columns.get(name)
                .ok_or_else(|| SchemaError::missing_column("the table being appended", name.as_str()))?;
            values.extend(new.iter().cloned());
        }
        self.providers.extend(other.providers.iter().cloned());
        Ok(())
    }
}

pub(crate) fn mask_to_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter().enumerate().filter_map(|(i, &keep)| keep.then_some(i)).collect()
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn table() -> Table {
        let p: Arc<str> = Arc::from("P1");
        let mut t = Table::for_provider(&p, 3);
        t.push_column("A", vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap();
        t.push_column("B", vec![Value::Float(0.5), Value::Missing, Value::Float(1.5)]).unwrap();
        t
    }

    #[rstest]
    fn test_column_lengths(mut table: Table) {
        let err = table.push_column("C", vec![Value::Missing]).unwrap_err();
        assert!(matches!(err, SchemaError::ColumnLength { expected: 3, got: 1, .. }));
        let err = table.push_column("A", vec![Value::Missing; 3]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn(_)));
    }

    #[rstest]
    fn test_filter_and_retain(table: Table) {
        let mask = [true, false, true];
        let filtered = table.filter(&mask);
        let mut retained = table.clone();
        retained.retain(&mask);
        assert_eq!(filtered, retained);
        assert_eq!(filtered.column("A").unwrap(), &[Value::Int(1), Value::Int(3)]);
        assert_eq!(filtered.nrows(), 2);
    }

    #[rstest]
    fn test_append_aligns_by_name(mut table: Table) {
        let p: Arc<str> = Arc::from("P2");
        let mut other = Table::for_provider(&p, 1);
        other.push_column("B", vec![Value::Float(9.0)]).unwrap();
        other.push_column("A", vec![Value::Int(9)]).unwrap();

        table.append(&other).unwrap();
        assert_eq!(table.nrows(), 4);
        assert_eq!(table.get("A", 3), Some(&Value::Int(9)));
        assert_eq!(table.get("B", 3), Some(&Value::Float(9.0)));
        assert_eq!(table.providers()[3].as_ref(), "P2");
    }

    #[rstest]
    fn test_append_rejects_different_columns(mut table: Table) {
        let p: Arc<str> = Arc::from("P2");
        let mut other = Table::for_provider(&p, 1);
        other.push_column("A", vec![Value::Int(9)]).unwrap();
        assert!(table.append(&other).is_err());
    }

    #[rstest]
    fn test_reorder(mut table: Table) {
        table.reorder_columns(&["B", "A"]).unwrap();
        let names: Vec<_> = table.column_names().collect();
        assert_eq!(names, ["B", "A"]);
        assert!(table.reorder_columns(&["B"]).is_err());
    }
}
