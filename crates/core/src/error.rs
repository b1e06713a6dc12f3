use thiserror::Error;

use crate::model::{CatalogError, QuestionError, ThresholdsError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Thresholds(#[from] ThresholdsError),
}
