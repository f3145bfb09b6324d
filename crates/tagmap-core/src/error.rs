use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid batch size: {0} (expected 1..={max})", max = crate::batch::EMAIL_BATCH_LIMIT)]
    InvalidBatchSize(usize),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("batch references unknown row {0}")]
    UnknownRow(usize),
    #[error("resolved row {0} was not part of any dispatched batch")]
    UndispatchedRow(usize),
}
