//! Reader for NetCDF profile files.
//!
//! Variables are flattened into columns. The row dimensions of a file are those of the
//! wanted variable with the most dimensions; variables defined on a leading subset of
//! those dimensions (e.g. a per-profile time in a profile by level file) are repeated
//! along the remaining ones. Variables on other dimensions are left out with a warning.
use std::{collections::BTreeSet, path::Path};

use error_stack::ResultExt;
use ndarray::ArrayD;
use netcdf::{
    types::{FloatType, IntType, NcVariableType},
    Extents, NcTypeDescriptor,
};

use crate::{error::LoadError, values::Value};

use super::{RawFrame, RawReader};

#[derive(Debug, Clone, Default)]
pub struct NetcdfReader;

impl NetcdfReader {
    pub fn new() -> Self {
        Self
    }
}

/// A byte of an NC_CHAR variable; netcdf 0.11 does not read chars as `u8`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
struct NcChar(u8);

unsafe impl NcTypeDescriptor for NcChar {
    fn type_descriptor() -> NcVariableType {
        NcVariableType::Char
    }
}

struct NcColumn {
    name: String,
    dims: Vec<(String, usize)>,
    values: Vec<Value>,
}

impl RawReader for NetcdfReader {
    fn format_name(&self) -> &'static str {
        "NetCDF"
    }

    fn read(&self, path: &Path, wanted: &BTreeSet<String>) -> error_stack::Result<RawFrame, LoadError> {
        let ds = netcdf::open(path)
            .change_context_lazy(|| LoadError::could_not_read(path))?;

        let mut columns = vec![];
        for name in wanted.iter() {
            let Some(var) = ds.variable(name) else { continue };
            match read_column(&var) {
                Ok(Some(c)) => columns.push(c),
                Ok(None) => log::warn!("Variable {name} in {} has an unsupported type, ignoring it", path.display()),
                Err(e) => return Err(e).change_context_lazy(|| LoadError::parsing_error(path, format!("could not read variable {name}"))),
            }
        }

        let Some(row_dims) = columns.iter().max_by_key(|c| c.dims.len()).map(|c| c.dims.clone()) else {
            return Ok(RawFrame::new(0));
        };
        let nrows: usize = row_dims.iter().map(|(_, n)| n).product();

        let mut frame = RawFrame::new(nrows);
        for column in columns {
            let ndims = column.dims.len();
            if column.dims.as_slice() != &row_dims[..ndims] {
                log::warn!(
                    "Variable {} in {} is not on the same dimensions as the other variables, ignoring it",
                    column.name, path.display()
                );
                continue;
            }
            let repeat: usize = row_dims[ndims..].iter().map(|(_, n)| n).product();
            let values = if repeat == 1 {
                column.values
            } else {
                column.values.iter()
                    .flat_map(|v| std::iter::repeat(v.clone()).take(repeat))
                    .collect()
            };
            frame.push(column.name, values)
                .map_err(|e| LoadError::parsing_error(path, e))?;
        }
        Ok(frame)
    }
}

fn read_column(var: &netcdf::Variable) -> netcdf::Result<Option<NcColumn>> {
    let mut dims: Vec<(String, usize)> = var.dimensions().iter()
        .map(|d| (d.name(), d.len()))
        .collect();

    let values = match var.vartype() {
        NcVariableType::Int(IntType::I8) => read_numeric::<i8>(var, |x| Value::Int(x as i64))?,
        NcVariableType::Int(IntType::I16) => read_numeric::<i16>(var, |x| Value::Int(x as i64))?,
        NcVariableType::Int(IntType::I32) => read_numeric::<i32>(var, |x| Value::Int(x as i64))?,
        NcVariableType::Int(IntType::I64) => read_numeric::<i64>(var, Value::Int)?,
        NcVariableType::Int(IntType::U8) => read_numeric::<u8>(var, |x| Value::Int(x as i64))?,
        NcVariableType::Int(IntType::U16) => read_numeric::<u16>(var, |x| Value::Int(x as i64))?,
        NcVariableType::Int(IntType::U32) => read_numeric::<u32>(var, |x| Value::Int(x as i64))?,
        NcVariableType::Int(IntType::U64) => read_numeric::<u64>(var, |x| Value::from_f64(x as f64))?,
        NcVariableType::Float(FloatType::F32) => read_numeric::<f32>(var, |x| Value::from_f64(x as f64))?,
        NcVariableType::Float(FloatType::F64) => read_numeric::<f64>(var, Value::from_f64)?,
        NcVariableType::Char => {
            let chars = var.get::<NcChar, _>(Extents::All)?.mapv(|c| c.0);
            // Fixed length strings are stored with a trailing STRINGn dimension
            let is_string = dims.last().is_some_and(|(name, _)| name.starts_with("STRING"));
            if is_string {
                dims.pop();
                chars_to_strings(&chars)
            } else {
                chars.iter().map(|&c| char_to_value(&[c])).collect()
            }
        },
        _ => return Ok(None),
    };

    Ok(Some(NcColumn { name: var.name(), dims, values }))
}

fn read_numeric<T>(var: &netcdf::Variable, to_value: impl Fn(T) -> Value) -> netcdf::Result<Vec<Value>>
where
    T: NcTypeDescriptor + Copy + PartialEq,
{
    let fill = var.fill_value::<T>()?;
    let arr: ArrayD<T> = var.get::<T, _>(Extents::All)?;
    let values = arr.iter()
        .map(|&x| if Some(x) == fill { Value::Missing } else { to_value(x) })
        .collect();
    Ok(values)
}

fn chars_to_strings(chars: &ArrayD<u8>) -> Vec<Value> {
    let strlen = chars.shape().last().copied().unwrap_or(1).max(1);
    let flat: Vec<u8> = chars.iter().copied().collect();
    flat.chunks(strlen).map(char_to_value).collect()
}

fn char_to_value(bytes: &[u8]) -> Value {
    let s: String = bytes.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    let s = s.trim();
    if s.is_empty() {
        Value::Missing
    } else {
        Value::Text(s.to_string())
    }
}
