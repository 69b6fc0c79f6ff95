use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributorError {
    #[error("cannot build a distributor from an empty node vector")]
    EmptyVector,

    #[error("no capacity in the aperture: {0}")]
    NoCapacity(String),

    #[error("process coordinate is already initialized")]
    CoordinateAlreadySet,

    #[error("invalid coordinate {offset}/{total_units}")]
    InvalidCoordinate { offset: u32, total_units: u32 },

    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },
}

pub type Result<T> = std::result::Result<T, DistributorError>;
