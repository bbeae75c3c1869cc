use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrailError {
    #[error("Invalid trail configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),
}

pub type TrailResult<T> = Result<T, TrailError>;
