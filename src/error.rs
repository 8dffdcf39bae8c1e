use std::io;

use thiserror::Error;

use crate::core::GenericError;

#[derive(Error, Debug)]
pub enum Error {
    /// AWS configuration or credentials can't be resolved. The session never becomes usable.
    #[error("Unable to access CloudWatch (is an IAM role or are credentials configured?): {0}")]
    Credentials(GenericError),

    #[error("Failed to list CloudWatch metrics: {0}")]
    CatalogUnavailable(GenericError),

    #[error("No metrics match the requested dimensions")]
    NoMatchingMetrics,

    #[error("There are no datapoints to send")]
    EmptyResponse,

    #[error("Pickle data is too large: {0} bytes")]
    TooLarge(usize),

    #[error("Failed to send metrics to Carbon: {0}")]
    Transport(#[from] io::Error),
}
