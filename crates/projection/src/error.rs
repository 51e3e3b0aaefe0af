use thiserror::Error;

pub type GeolocationResult<T> = Result<T, GeolocationError>;

#[derive(Error, Debug)]
pub enum GeolocationError {
    #[error("Scan axis is empty")]
    EmptyAxis,

    #[error("No scan angle intersects the Earth")]
    NoVisibleCells,
}
