//! Order lifecycle errors.

use kola_condition::ConditionError;
use kola_dispatch::DispatchError;
use kola_trail::TrailError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrdersError {
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    #[error("Trail error: {0}")]
    Trail(#[from] TrailError),

    #[error("No {0} available")]
    MissingMarketData(String),
}

pub type OrdersResult<T> = Result<T, OrdersError>;
