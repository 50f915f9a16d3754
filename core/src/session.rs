use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::complexity::ComplexitySettings;
use crate::error::Result;
use crate::operation::OperationDefinition;
use crate::problem::{generate_problems, Problem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub answered: u32,
    pub correct: u32,
    pub wrong: u32,
    pub streak: u32,
    pub best_streak: u32,
    /// Number of full passes through the problem set, starting at 1.
    pub rounds: u32,
    pub started_at: DateTime<Utc>,
}

impl SessionStats {
    fn new() -> Self {
        Self {
            answered: 0,
            correct: 0,
            wrong: 0,
            streak: 0,
            best_streak: 0,
            rounds: 1,
            started_at: Utc::now(),
        }
    }

    fn record(&mut self, correct: bool) {
        self.answered += 1;
        if correct {
            self.correct += 1;
            self.streak += 1;
            self.best_streak = self.best_streak.max(self.streak);
        } else {
            self.wrong += 1;
            self.streak = 0;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: f64,
    pub problem: Problem,
}

/// Walks a learner through one generated problem set, regenerating it in a
/// fresh order whenever it runs out.
#[derive(Debug, Clone)]
pub struct PracticeSession {
    op: OperationDefinition,
    settings: ComplexitySettings,
    problems: Vec<Problem>,
    cursor: usize,
    stats: SessionStats,
}

impl PracticeSession {
    pub fn start<R: Rng + ?Sized>(
        op: OperationDefinition,
        settings: ComplexitySettings,
        rng: &mut R,
    ) -> Result<Self> {
        let problems = generate_problems(&op, &settings, rng)?;
        debug!(target: "drill_core", topic = op.id, problems = problems.len(), "practice session started");
        Ok(Self {
            op,
            settings,
            problems,
            cursor: 0,
            stats: SessionStats::new(),
        })
    }

    pub fn topic(&self) -> &'static str {
        self.op.id
    }

    pub fn settings(&self) -> &ComplexitySettings {
        &self.settings
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn current(&self) -> Option<&Problem> {
        self.problems.get(self.cursor)
    }

    pub fn remaining(&self) -> usize {
        self.problems.len().saturating_sub(self.cursor)
    }

    /// Checks `answer` against the current problem and moves on.
    /// Returns `None` when the problem set is empty.
    pub fn submit<R: Rng + ?Sized>(&mut self, answer: f64, rng: &mut R) -> Result<Option<AnswerOutcome>> {
        let Some(problem) = self.current().cloned() else {
            return Ok(None);
        };

        let correct = problem.check_answer(answer);
        self.stats.record(correct);
        self.advance(rng)?;

        Ok(Some(AnswerOutcome {
            correct,
            correct_answer: problem.answer,
            problem,
        }))
    }

    /// Moves past the current problem without answering it.
    pub fn skip<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        if self.current().is_some() {
            self.advance(rng)?;
        }
        Ok(())
    }

    /// Switches to new settings (a new stage, say) and starts a fresh
    /// problem set. Stats carry over.
    pub fn reconfigure<R: Rng + ?Sized>(&mut self, settings: ComplexitySettings, rng: &mut R) -> Result<()> {
        let last = self.current().cloned();
        self.settings = settings;
        self.regenerate(last, rng)?;
        debug!(target: "drill_core", topic = self.op.id, problems = self.problems.len(), "practice session reconfigured");
        Ok(())
    }

    fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.cursor += 1;
        if self.cursor < self.problems.len() {
            return Ok(());
        }

        let last = self.problems.last().cloned();
        self.regenerate(last, rng)?;
        self.stats.rounds += 1;
        debug!(target: "drill_core", topic = self.op.id, round = self.stats.rounds, "problem set reshuffled");
        Ok(())
    }

    fn regenerate<R: Rng + ?Sized>(&mut self, last: Option<Problem>, rng: &mut R) -> Result<()> {
        self.problems = generate_problems(&self.op, &self.settings, rng)?;
        self.cursor = 0;

        // don't ask the same problem twice in a row
        if self.problems.len() > 1 && self.problems.first() == last.as_ref() {
            let end = self.problems.len() - 1;
            self.problems.swap(0, end);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::{resolve_complexity, ComplexityRequest};
    use crate::operation::OperationRegistry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn session(topic: &str, request: ComplexityRequest, rng: &mut StdRng) -> PracticeSession {
        let registry = OperationRegistry::builtin();
        let op = *registry.get(topic).unwrap();
        let settings = resolve_complexity(&op, &request).unwrap();
        PracticeSession::start(op, settings, rng).unwrap()
    }

    #[test]
    fn correct_and_wrong_answers_update_stats() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut s = session("addition", ComplexityRequest::new(1, Some(1)), &mut rng);
        assert_eq!(s.remaining(), 81);

        let answer = s.current().unwrap().answer;
        let outcome = s.submit(answer, &mut rng).unwrap().unwrap();
        assert!(outcome.correct);

        let answer = s.current().unwrap().answer;
        let outcome = s.submit(answer + 1.0, &mut rng).unwrap().unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.correct_answer, answer);

        let stats = s.stats();
        assert_eq!((stats.answered, stats.correct, stats.wrong), (2, 1, 1));
        assert_eq!(stats.streak, 0);
        assert_eq!(stats.best_streak, 1);
        assert_eq!(s.remaining(), 79);
    }

    #[test]
    fn exhausted_set_is_regenerated() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut s = session(
            "multiplication",
            ComplexityRequest::new(1, Some(1)).with_max_problem_count(4),
            &mut rng,
        );
        assert_eq!(s.remaining(), 4);

        let mut last = None;
        for _ in 0..12 {
            let problem = s.current().cloned().unwrap();
            assert_ne!(Some(&problem), last.as_ref());
            s.submit(problem.answer, &mut rng).unwrap();
            last = Some(problem);
        }
        assert_eq!(s.stats().rounds, 4);
        assert_eq!(s.stats().best_streak, 12);
        assert_eq!(s.remaining(), 4);
    }

    #[test]
    fn reconfiguring_keeps_stats() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut s = session("addition", ComplexityRequest::new(1, Some(1)), &mut rng);
        for _ in 0..3 {
            let answer = s.current().unwrap().answer;
            s.submit(answer, &mut rng).unwrap();
        }
        let started_at = s.stats().started_at;

        let registry = OperationRegistry::builtin();
        let harder = resolve_complexity(
            registry.get("addition").unwrap(),
            &ComplexityRequest::new(1, Some(2)).with_max_problem_count(50),
        )
        .unwrap();
        s.reconfigure(harder, &mut rng).unwrap();

        assert_eq!(s.settings(), &harder);
        // 7 x 7 after shrinking to the budget
        assert_eq!(s.remaining(), 49);
        assert!(s.current().unwrap().num2 >= 10.0);
        let stats = s.stats();
        assert_eq!((stats.answered, stats.correct, stats.streak), (3, 3, 3));
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.started_at, started_at);
    }

    #[test]
    fn skipping_does_not_count_as_an_answer() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut s = session("square_root", ComplexityRequest::new(1, None), &mut rng);
        s.skip(&mut rng).unwrap();
        assert_eq!(s.stats().answered, 0);
        assert_eq!(s.remaining(), 8);
    }

    #[test]
    fn empty_set_has_nothing_to_answer() {
        let registry = OperationRegistry::builtin();
        let op = *registry.get("square_root").unwrap();
        let mut settings = resolve_complexity(&op, &ComplexityRequest::new(1, None)).unwrap();
        settings.range.num1.max = settings.range.num1.min;

        let mut rng = StdRng::seed_from_u64(0);
        let mut s = PracticeSession::start(op, settings, &mut rng).unwrap();
        assert!(s.current().is_none());
        assert!(s.submit(1.0, &mut rng).unwrap().is_none());
        assert_eq!(s.stats().answered, 0);
    }
}
