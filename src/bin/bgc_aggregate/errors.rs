#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("An error occurred while reading the configuration")]
    ReadingConfig,
    #[error("An error occurred while setting up the provider {0}")]
    Configuration(String),
    #[error("An error occurred while loading data from {0}")]
    Loading(String),
    #[error("An error occurred while merging the {0} data")]
    Aggregating(String),
    #[error("An error occurred while saving the {0} data")]
    Saving(String),
    #[error("{0}")]
    Custom(String),
}
