//! Arithmetic drill core: problem generation, practice sessions and mastery
//! stages.
//!
//! ```
//! use drill_core::{generate_problems, resolve_complexity, ComplexityRequest, OperationRegistry};
//!
//! let registry = OperationRegistry::builtin();
//! let op = registry.get("addition").unwrap();
//! let settings = resolve_complexity(op, &ComplexityRequest::new(1, Some(1))).unwrap();
//! let problems = generate_problems(op, &settings, &mut rand::thread_rng()).unwrap();
//! assert_eq!(problems.len(), 81);
//! ```

pub mod complexity;
pub mod error;
pub mod operation;
pub mod problem;
pub mod progress;
pub mod session;

pub use complexity::{
    resolve_complexity, ComplexityRequest, ComplexitySettings, GenerationFlags, OperandRanges,
    VariableRange,
};
pub use error::{DrillError, Result};
pub use operation::{Allowance, Arity, Capabilities, FilterOptions, OperationDefinition, OperationRegistry};
pub use problem::{generate_problems, Problem};
pub use progress::{ProgressBook, TopicProgress};
pub use session::{AnswerOutcome, PracticeSession, SessionStats};
