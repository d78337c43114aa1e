//! Logger setup for the command line programs.
use std::path::{Path, PathBuf};

use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Could not open log file {}: {cause}", .path.display())]
    LogFile{path: PathBuf, cause: String},
    #[error("Invalid logger configuration: {0}")]
    Config(String),
    #[error("Could not initialize logger: {0}")]
    Init(String),
}

const CONSOLE_PATTERN: &str = "{h({d(%Y-%m-%d %H:%M:%S)} [{l}] {M})} - {m}{n}";
const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] {M}:{L} - {m}{n}";

/// Log to stderr at `level` and, if `log_file` is given, to that file as well.
///
/// The file gets every message at `level` or above, like the console, but without
/// color codes and with line numbers so that a whole aggregation run can be reviewed.
pub fn init_logging(level: log::LevelFilter, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .target(Target::Stderr)
        .build();

    let mut builder = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
            .append(false)
            .build(path)
            .map_err(|e| LoggingError::LogFile { path: path.to_path_buf(), cause: e.to_string() })?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    let config = builder.build(root.build(level))
        .map_err(|e| LoggingError::Config(e.to_string()))?;
    log4rs::init_config(config)
        .map_err(|e| LoggingError::Init(e.to_string()))?;
    Ok(())
}
