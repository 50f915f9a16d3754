//! Arithmetic topics: how each operation is displayed, solved and which
//! operand pairs it accepts.
//!
//! Topic capabilities (negative and decimal numbers) are resolved once when
//! the registry is built and travel with the definition afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DrillError, Result};

/// Answers are rounded to this many decimal places.
pub const ANSWER_DECIMALS: i32 = 2;

pub const SUBTRACTION: &str = "subtraction";

/// Whether a kind of number may appear in the question and in the answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allowance {
    pub in_question: bool,
    pub in_answer: bool,
}

impl Allowance {
    pub const NONE: Allowance = Allowance { in_question: false, in_answer: false };
    pub const BOTH: Allowance = Allowance { in_question: true, in_answer: true };

    pub fn union(self, other: Allowance) -> Allowance {
        Allowance {
            in_question: self.in_question || other.in_question,
            in_answer: self.in_answer || other.in_answer,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    pub negatives: Allowance,
    pub decimals: Allowance,
}

impl Capabilities {
    /// Derives capabilities from the naming conventions of topic codes:
    /// `_w_neg` (signed operands), `_w_dec` (decimal operands), and
    /// `root`/`div`/`decimal` (decimal results). Plain subtraction can go
    /// below zero even with positive operands.
    pub fn from_topic_code(code: &str) -> Self {
        let mut caps = Capabilities::default();
        if code.contains("_w_neg") {
            caps.negatives = Allowance::BOTH;
        }
        if code == SUBTRACTION {
            caps.negatives.in_answer = true;
        }
        if code.contains("_w_dec") {
            caps.decimals.in_question = true;
        }
        if ["root", "div", "decimal"].iter().any(|k| code.contains(k)) {
            caps.decimals.in_answer = true;
        }
        caps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    Unary,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    /// `a op b`
    Infix,
    /// `a ^ b`, negative base parenthesised
    Power,
    /// `op a`
    Prefix,
}

/// What the answer of a problem is allowed to look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    pub decimals_in_answer: bool,
    pub negatives_in_answer: bool,
}

pub type SolveFn = fn(f64, f64) -> f64;
pub type ValidFn = fn(f64, f64) -> bool;
pub type FilterFn = fn(f64, f64, FilterOptions) -> bool;

/// One arithmetic topic.
///
/// `is_valid` must guard every singularity of `solve`; `filter` only decides
/// whether a well-defined problem is wanted.
#[derive(Clone, Copy)]
pub struct OperationDefinition {
    pub id: &'static str,
    pub title: &'static str,
    pub operator_symbol: &'static str,
    pub notation: Notation,
    pub capabilities: Capabilities,
    pub solve: SolveFn,
    pub is_valid: Option<ValidFn>,
    pub filter: Option<FilterFn>,
}

impl fmt::Debug for OperationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDefinition")
            .field("id", &self.id)
            .field("operator_symbol", &self.operator_symbol)
            .field("notation", &self.notation)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl OperationDefinition {
    pub fn new(
        id: &'static str,
        title: &'static str,
        operator_symbol: &'static str,
        solve: SolveFn,
    ) -> Self {
        Self {
            id,
            title,
            operator_symbol,
            notation: Notation::Infix,
            capabilities: Capabilities::from_topic_code(id),
            solve,
            is_valid: None,
            filter: None,
        }
    }

    pub fn with_notation(mut self, notation: Notation) -> Self {
        self.notation = notation;
        self
    }

    pub fn with_validity(mut self, is_valid: ValidFn) -> Self {
        self.is_valid = Some(is_valid);
        self
    }

    pub fn with_filter(mut self, filter: FilterFn) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_decimal_answers(mut self, allowed: bool) -> Self {
        self.capabilities.decimals.in_answer = allowed;
        self
    }

    pub fn arity(&self) -> Arity {
        match self.notation {
            Notation::Prefix => Arity::Unary,
            Notation::Infix | Notation::Power => Arity::Binary,
        }
    }

    pub fn display_equation(&self, a: f64, b: f64) -> String {
        let sym = self.operator_symbol;
        match self.notation {
            Notation::Prefix => format!("{}{} = ?", sym, operand(a, true)),
            Notation::Infix => format!("{} {} {} = ?", operand(a, false), sym, operand(b, true)),
            Notation::Power => format!("{} {} {} = ?", operand(a, true), sym, operand(b, true)),
        }
    }

    pub fn solve(&self, a: f64, b: f64) -> f64 {
        (self.solve)(a, b)
    }

    pub fn is_valid_problem(&self, a: f64, b: f64) -> bool {
        self.is_valid.map_or(true, |valid| valid(a, b))
    }

    pub fn passes_filter(&self, a: f64, b: f64, options: FilterOptions) -> bool {
        self.filter.map_or(true, |filter| filter(a, b, options))
    }
}

fn operand(x: f64, wrap_negative: bool) -> String {
    if wrap_negative && x < 0.0 {
        format!("({})", x)
    } else {
        x.to_string()
    }
}

/// Answers this large are left as computed.
const ROUNDING_LIMIT: f64 = 1e15;

pub fn round_answer(x: f64) -> f64 {
    if !x.is_finite() || x.abs() >= ROUNDING_LIMIT {
        return x;
    }
    let scale = 10f64.powi(ANSWER_DECIMALS);
    let rounded = (x * scale).round() / scale;
    // no "-0" answers
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

// ── Solvers ──────────────────────────────────────────────────────────────────

fn add(a: f64, b: f64) -> f64 {
    round_answer(a + b)
}

fn subtract(a: f64, b: f64) -> f64 {
    round_answer(a - b)
}

fn multiply(a: f64, b: f64) -> f64 {
    round_answer(a * b)
}

/// Operands as whole hundredths, so decimal operands divide exactly.
fn hundredths(a: f64, b: f64) -> (f64, f64) {
    let scale = 10f64.powi(ANSWER_DECIMALS);
    ((a * scale).round(), (b * scale).round())
}

/// `a % b` computed on hundredths: `0.3 % 0.1` is 0, not 0.0999...
fn remainder(a: f64, b: f64) -> f64 {
    let (x, y) = hundredths(a, b);
    x % y / 10f64.powi(ANSWER_DECIMALS)
}

fn divide(a: f64, b: f64) -> f64 {
    let (x, y) = hundredths(a, b);
    round_answer(x / y)
}

fn modulo(a: f64, b: f64) -> f64 {
    round_answer(remainder(a, b))
}

fn power(a: f64, b: f64) -> f64 {
    round_answer(a.powf(b))
}

fn square_root(a: f64, _: f64) -> f64 {
    round_answer(a.sqrt())
}

// ── Validity ─────────────────────────────────────────────────────────────────

fn nonzero_divisor(_: f64, b: f64) -> bool {
    b != 0.0
}

fn real_power(a: f64, b: f64) -> bool {
    !(a == 0.0 && b < 0.0) && !(a < 0.0 && b.fract() != 0.0) && a.powf(b).is_finite()
}

fn non_negative_radicand(a: f64, _: f64) -> bool {
    a >= 0.0
}

// ── Filters ──────────────────────────────────────────────────────────────────

fn sign_ok(value: f64, options: FilterOptions) -> bool {
    options.negatives_in_answer || value >= 0.0
}

fn whole_ok(value: f64, options: FilterOptions) -> bool {
    options.decimals_in_answer || value.fract() == 0.0
}

fn filter_sum(a: f64, b: f64, options: FilterOptions) -> bool {
    sign_ok(a + b, options)
}

fn filter_difference(a: f64, b: f64, options: FilterOptions) -> bool {
    sign_ok(a - b, options)
}

fn filter_product(a: f64, b: f64, options: FilterOptions) -> bool {
    sign_ok(a * b, options)
}

fn filter_quotient(a: f64, b: f64, options: FilterOptions) -> bool {
    (options.decimals_in_answer || remainder(a, b) == 0.0) && sign_ok(a / b, options)
}

fn filter_remainder(a: f64, b: f64, options: FilterOptions) -> bool {
    sign_ok(remainder(a, b), options)
}

fn filter_power(a: f64, b: f64, options: FilterOptions) -> bool {
    let value = a.powf(b);
    whole_ok(value, options) && sign_ok(value, options)
}

fn filter_root(a: f64, _: f64, options: FilterOptions) -> bool {
    whole_ok(a.sqrt(), options)
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Immutable lookup of topics by code.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    operations: BTreeMap<&'static str, OperationDefinition>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl OperationRegistry {
    pub fn from_definitions(definitions: impl IntoIterator<Item = OperationDefinition>) -> Self {
        Self {
            operations: definitions.into_iter().map(|op| (op.id, op)).collect(),
        }
    }

    pub fn builtin() -> Self {
        use OperationDefinition as Op;

        Self::from_definitions([
            Op::new("addition", "Addition", "+", add).with_filter(filter_sum),
            Op::new(SUBTRACTION, "Subtraction", "-", subtract).with_filter(filter_difference),
            Op::new("multiplication", "Multiplication", "×", multiply)
                .with_filter(filter_product),
            Op::new("division", "Division", "÷", divide)
                .with_validity(nonzero_divisor)
                .with_filter(filter_quotient)
                .with_decimal_answers(false),
            Op::new("division_decimal", "Division with decimal answers", "÷", divide)
                .with_validity(nonzero_divisor)
                .with_filter(filter_quotient),
            Op::new("modulus", "Remainders", "mod", modulo)
                .with_validity(nonzero_divisor)
                .with_filter(filter_remainder),
            Op::new("exponentiation", "Powers", "^", power)
                .with_notation(Notation::Power)
                .with_validity(real_power)
                .with_filter(filter_power),
            Op::new("square_root", "Square roots", "√", square_root)
                .with_notation(Notation::Prefix)
                .with_validity(non_negative_radicand)
                .with_filter(filter_root),
            Op::new("add_w_neg", "Addition with negatives", "+", add).with_filter(filter_sum),
            Op::new("sub_w_neg", "Subtraction with negatives", "-", subtract)
                .with_filter(filter_difference),
            Op::new("mul_w_neg", "Multiplication with negatives", "×", multiply)
                .with_filter(filter_product),
            Op::new("div_w_neg", "Division with negatives", "÷", divide)
                .with_validity(nonzero_divisor)
                .with_filter(filter_quotient)
                .with_decimal_answers(false),
            Op::new("add_w_dec", "Addition with decimals", "+", add)
                .with_filter(filter_sum)
                .with_decimal_answers(true),
            Op::new("sub_w_dec", "Subtraction with decimals", "-", subtract)
                .with_filter(filter_difference)
                .with_decimal_answers(true),
            Op::new("mul_w_dec", "Multiplication with decimals", "×", multiply)
                .with_filter(filter_product)
                .with_decimal_answers(true),
        ])
    }

    pub fn get(&self, code: &str) -> Result<&OperationDefinition> {
        self.operations
            .get(code)
            .ok_or_else(|| DrillError::UnknownTopic(code.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
