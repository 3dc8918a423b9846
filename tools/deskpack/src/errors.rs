use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskpackError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("archive error: {0}")]
    Archive(String),
}

impl From<zip::result::ZipError> for DeskpackError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Archive(value.to_string())
    }
}
