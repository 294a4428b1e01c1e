use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StateError {
    /// Only reachable from a state that was never valid for the config.
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("control block size {value} outside [{min}, {max}]")]
    ControlOutOfRange { value: u64, min: u64, max: u64 },

    #[error("elastic buffer size {value} outside [{min}, {max}]")]
    ElasticOutOfRange { value: u64, min: u64, max: u64 },
}
