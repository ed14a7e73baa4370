use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("feedback read failed: {0}")]
    Feedback(String),
    #[error("feedback timeout")]
    Timeout,
    #[error("store offset {offset} out of range (capacity {capacity})")]
    OutOfRange { offset: usize, capacity: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
