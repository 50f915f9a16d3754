use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::complexity::{ComplexitySettings, VariableRange};
use crate::error::{DrillError, Result};
use crate::operation::{Arity, FilterOptions, OperationDefinition};

/// Enumerated integers stand for tenths when decimal operands are allowed.
pub const DECIMAL_OPERAND_SCALE: f64 = 10.0;

/// Half of the last rounded answer digit.
pub const ANSWER_TOLERANCE: f64 = 0.005;

/// `b` runs over this once for unary topics.
const UNARY_PASS: VariableRange = VariableRange { min: 0, max: 1 };

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub num1: f64,
    pub num2: f64,
    pub display: String,
    pub answer: f64,
}

impl Problem {
    pub fn check_answer(&self, answer: f64) -> bool {
        (answer - self.answer).abs() < ANSWER_TOLERANCE
    }
}

/// Every sign combination of `(a, b)` that doesn't negate a zero operand.
fn sign_variants(a: i64, b: i64, with_negatives: bool) -> Vec<(i64, i64)> {
    let mut pairs = vec![(a, b)];
    if with_negatives {
        if a > 0 {
            pairs.push((-a, b));
        }
        if b > 0 {
            pairs.push((a, -b));
        }
        if a > 0 && b > 0 {
            pairs.push((-a, -b));
        }
    }
    pairs
}

/// Enumerates every operand pair of the resolved ranges, keeps the ones the
/// topic accepts and returns them as problems in uniformly random order.
///
/// The set of problems depends only on `op` and `settings`; `rng` only
/// decides the order.
#[instrument(level = "debug", skip(op, settings, rng), fields(topic = op.id))]
pub fn generate_problems<R: Rng + ?Sized>(
    op: &OperationDefinition,
    settings: &ComplexitySettings,
    rng: &mut R,
) -> Result<Vec<Problem>> {
    let r1 = settings.range.num1;
    let r2 = match op.arity() {
        Arity::Unary => UNARY_PASS,
        Arity::Binary => settings.range.num2,
    };
    let scale = if settings.allow_decimals.in_question {
        DECIMAL_OPERAND_SCALE
    } else {
        1.0
    };
    let options = FilterOptions {
        decimals_in_answer: settings.allow_decimals.in_answer,
        negatives_in_answer: settings.allow_negatives.in_answer,
    };

    let mut problems = Vec::new();
    let mut rejected = 0usize;
    for a in r1.min..r1.max {
        for b in r2.min..r2.max {
            for (x, y) in sign_variants(a, b, settings.allow_negatives.in_question) {
                let (num1, num2) = (x as f64 / scale, y as f64 / scale);
                if !op.is_valid_problem(num1, num2) || !op.passes_filter(num1, num2, options) {
                    rejected += 1;
                    continue;
                }

                let answer = op.solve(num1, num2);
                if !answer.is_finite() {
                    return Err(DrillError::Unsolvable { topic: op.id, num1, num2 });
                }
                problems.push(Problem {
                    num1,
                    num2,
                    display: op.display_equation(num1, num2),
                    answer,
                });
            }
        }
    }

    problems.shuffle(rng);
    debug!(target: "drill_core", generated = problems.len(), rejected, "generated problem set");
    Ok(problems)
}
