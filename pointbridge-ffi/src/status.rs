use thiserror::Error;

/// The call succeeded and all output parameters were written
pub const STATUS_OK: i32 = 0;
/// The call was rejected or the backend failed. Output parameters are untouched
pub const STATUS_ERROR: i32 = -1;
/// The backend produced a different number of normals than points were passed in
pub const STATUS_SIZE_MISMATCH: i32 = -2;
/// A panic was caught at the boundary
pub const STATUS_INTERNAL_ERROR: i32 = -3;

/// Everything that can go wrong between receiving raw buffers and handing out new ones
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("invalid neighbourhood (k = {k}, radius = {radius}): exactly one of k and radius must be positive")]
    InvalidNeighborhood { k: i32, radius: f32 },
    #[error("backend returned {normals} normals for {points} points")]
    NormalCountMismatch { points: usize, normals: usize },
    #[error("{0:#}")]
    Io(anyhow::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("panic at the boundary: {0}")]
    Panicked(String),
}

impl BoundaryError {
    /// The integer status reported to the foreign caller for this error
    pub fn status_code(&self) -> i32 {
        match self {
            Self::InvalidNeighborhood { .. } => STATUS_ERROR,
            Self::NormalCountMismatch { .. } => STATUS_SIZE_MISMATCH,
            Self::Io(_) => STATUS_ERROR,
            Self::InvalidArgument(_) => STATUS_ERROR,
            Self::Panicked(_) => STATUS_INTERNAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, BoundaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BoundaryError::InvalidNeighborhood { k: 3, radius: 0.5 }.status_code(),
            STATUS_ERROR
        );
        assert_eq!(
            BoundaryError::NormalCountMismatch {
                points: 4,
                normals: 3
            }
            .status_code(),
            STATUS_SIZE_MISMATCH
        );
        assert_eq!(
            BoundaryError::Io(anyhow::anyhow!("missing")).status_code(),
            STATUS_ERROR
        );
        assert_eq!(
            BoundaryError::Panicked("boom".to_owned()).status_code(),
            STATUS_INTERNAL_ERROR
        );
    }

    #[test]
    fn test_io_error_keeps_context_chain() {
        let error = BoundaryError::Io(anyhow::anyhow!("root cause").context("outer"));
        assert_eq!(error.to_string(), "outer: root cause");
    }
}
