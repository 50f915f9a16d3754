use thiserror::Error;

pub type Result<T> = std::result::Result<T, DrillError>;

#[derive(Debug, Error)]
pub enum DrillError {
    #[error("digit count must be between 1 and {max}, got {got}")]
    DigitCount { got: u32, max: u32 },

    #[error("problem budget must be between 1 and {max}, got {got}")]
    Budget { got: u64, max: u64 },

    #[error("topic `{0}` takes two operands but no digit count was given for the second")]
    MissingDigitCount(String),

    #[error("unknown topic `{0}`")]
    UnknownTopic(String),

    /// Range shrinking found no reducible span although the product exceeds
    /// the target. Indicates broken cardinality math, never expected input.
    #[error("range invariant violated: spans {span1} x {span2} exceed target {target} with root {root}")]
    RangeInvariant {
        span1: u64,
        span2: u64,
        target: u64,
        root: u64,
    },

    #[error("topic `{topic}` has no finite answer for ({num1}, {num2})")]
    Unsolvable {
        topic: &'static str,
        num1: f64,
        num2: f64,
    },

    #[error("progress data could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),
}
