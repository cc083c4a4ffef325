use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Query(#[from] wave_level_lib::DataError),

    #[error("Output error: {0}")]
    Output(String),
}

pub type CliResult<T> = Result<T, CliError>;
