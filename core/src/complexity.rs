//! Turning digit counts and a problem budget into operand ranges.
//!
//! Ranges are half-open: a digit count `d > 1` covers `[10^(d-1), 10^d - 1)`,
//! so the largest `d`-digit number is never asked. A single digit covers
//! `[0, 9)`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DrillError, Result};
use crate::operation::{Allowance, Arity, OperationDefinition};

pub const DEFAULT_MAX_PROBLEM_COUNT: u64 = 1000;
pub const MAX_PROBLEM_BUDGET: u64 = 100_000;
pub const MAX_DIGIT_COUNT: u32 = 9;

/// Number of sign combinations a positive pair expands into.
const SIGN_VARIANTS: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableRange {
    pub min: i64,
    pub max: i64,
}

impl VariableRange {
    /// Second operand of a unary topic.
    pub const UNARY: VariableRange = VariableRange { min: 0, max: 0 };

    pub fn from_digit_count(digits: u32) -> Result<Self> {
        if !(1..=MAX_DIGIT_COUNT).contains(&digits) {
            return Err(DrillError::DigitCount { got: digits, max: MAX_DIGIT_COUNT });
        }
        if digits == 1 {
            return Ok(Self { min: 0, max: 9 });
        }
        let min = 10i64.pow(digits - 1);
        Ok(Self { min, max: min * 10 - 1 })
    }

    pub fn span(&self) -> u64 {
        (self.max - self.min).max(0) as u64
    }

    fn shrink_to(&mut self, span: u64) {
        self.max = self.min + span as i64;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandRanges {
    pub num1: VariableRange,
    pub num2: VariableRange,
}

/// Caller overrides, combined with the topic's own capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFlags {
    #[serde(default)]
    pub allow_negatives: bool,
    #[serde(default)]
    pub allow_decimals: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityRequest {
    pub digits1: u32,
    #[serde(default)]
    pub digits2: Option<u32>,
    #[serde(default)]
    pub max_problem_count: Option<u64>,
    #[serde(default)]
    pub flags: GenerationFlags,
}

impl ComplexityRequest {
    pub fn new(digits1: u32, digits2: Option<u32>) -> Self {
        Self {
            digits1,
            digits2,
            max_problem_count: None,
            flags: GenerationFlags::default(),
        }
    }

    pub fn with_max_problem_count(mut self, max: u64) -> Self {
        self.max_problem_count = Some(max);
        self
    }

    pub fn with_flags(mut self, flags: GenerationFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexitySettings {
    pub problem_count: u64,
    pub allow_negatives: Allowance,
    pub allow_decimals: Allowance,
    pub range: OperandRanges,
}

impl ComplexitySettings {
    /// Size of the enumerated grid before sign expansion.
    pub fn cardinality(&self) -> u64 {
        self.range.num1.span().saturating_mul(self.range.num2.span().max(1))
    }
}

/// Resolves the operand ranges for `op` so that the enumerable problem count
/// stays at or below the requested budget.
///
/// With negative operands the budget is quartered first, since every
/// positive pair may later expand into four sign variants.
pub fn resolve_complexity(
    op: &OperationDefinition,
    request: &ComplexityRequest,
) -> Result<ComplexitySettings> {
    let max_problem_count = request.max_problem_count.unwrap_or(DEFAULT_MAX_PROBLEM_COUNT);
    if !(1..=MAX_PROBLEM_BUDGET).contains(&max_problem_count) {
        return Err(DrillError::Budget { got: max_problem_count, max: MAX_PROBLEM_BUDGET });
    }

    let flag_negatives = if request.flags.allow_negatives { Allowance::BOTH } else { Allowance::NONE };
    let flag_decimals = if request.flags.allow_decimals { Allowance::BOTH } else { Allowance::NONE };
    let allow_negatives = op.capabilities.negatives.union(flag_negatives);
    let allow_decimals = op.capabilities.decimals.union(flag_decimals);

    let mut num1 = VariableRange::from_digit_count(request.digits1)?;
    let mut num2 = match op.arity() {
        Arity::Unary => None,
        Arity::Binary => {
            let digits2 = request
                .digits2
                .ok_or_else(|| DrillError::MissingDigitCount(op.id.to_string()))?;
            Some(VariableRange::from_digit_count(digits2)?)
        }
    };

    let theoretical = match &num2 {
        Some(r2) => num1.span().saturating_mul(r2.span()),
        None => num1.span(),
    };
    let problem_count = max_problem_count.min(theoretical);
    let target = if allow_negatives.in_question {
        problem_count / SIGN_VARIANTS
    } else {
        problem_count
    };

    debug!(
        target: "drill_core",
        topic = op.id,
        ?num1,
        ?num2,
        theoretical,
        problem_count,
        budget = target,
        "resolving operand ranges"
    );

    if theoretical > target {
        match num2.as_mut() {
            // a signed budget under 4 quarters to 0; keep a span of 1, not `min + 0`
            None => num1.shrink_to(target.max(1)),
            Some(r2) => shrink_pair(&mut num1, r2, target)?,
        }
    }

    let settings = ComplexitySettings {
        problem_count,
        allow_negatives,
        allow_decimals,
        range: OperandRanges {
            num1,
            num2: num2.unwrap_or(VariableRange::UNARY),
        },
    };
    debug!(target: "drill_core", topic = op.id, range = ?settings.range, "resolved operand ranges");
    Ok(settings)
}

fn shrink_pair(r1: &mut VariableRange, r2: &mut VariableRange, target: u64) -> Result<()> {
    let root = integer_sqrt(target).max(1);
    let (span1, span2) = (r1.span(), r2.span());

    match (span1 > root, span2 > root) {
        (true, true) => {
            r1.shrink_to(root);
            r2.shrink_to(root);
        }
        // one-sided: divide the quartered target, not the raw problem count,
        // and keep at least a span of 1 rather than collapsing to `min`
        (true, false) => r1.shrink_to((target / span2.max(1)).max(1)),
        (false, true) => r2.shrink_to((target / span1.max(1)).max(1)),
        // span1, span2 <= root implies span1 * span2 <= root^2 <= target
        (false, false) => {
            return Err(DrillError::RangeInvariant { span1, span2, target, root });
        }
    }
    Ok(())
}

fn integer_sqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt() as u64;
    while root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).map_or(false, |sq| sq <= n) {
        root += 1;
    }
    root
}
