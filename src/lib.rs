pub mod error;
pub mod values;
pub mod format;
pub mod variables;
pub mod config;
pub mod table;
pub mod constraints;
pub mod patterns;
pub mod loaders;
pub mod storer;
pub mod io;
pub mod dateranges;
pub mod units;
pub mod features;
pub mod providers;
pub mod logging;

#[cfg(test)]
pub(crate) mod test_utils;
