//! Export of canonical data to text files and reading it back.
//!
//! The text format has a row of variable names, a row of units, then one row per
//! observation. Cells are formatted with the variables' name and value formats and
//! separated by one space. Missing values are written as `nan` and timestamps as
//! `YYYY-MM-DDTHH:MM:SS`. Whitespace inside text values is replaced by underscores
//! so that files can be split on whitespace when read back.
pub mod readers;
pub mod savers;

pub use readers::{read_files, ReadOptions};
pub use savers::StorerSaver;
