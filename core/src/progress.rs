use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::complexity::ComplexityRequest;
use crate::error::Result;
use crate::operation::{Arity, OperationDefinition};

/// Digit counts practised at each stage, easiest first.
pub const STAGE_LADDER: [(u32, u32); 6] = [(1, 1), (1, 2), (2, 1), (2, 2), (3, 2), (3, 3)];

/// Correct answers needed before a stage can be cleared.
pub const REPETITIONS_PER_STAGE: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub stage: usize,
    /// Correct answers at the current stage.
    pub repetitions: u32,
    /// All answers at the current stage.
    pub stage_attempts: u32,
    pub times_correct: u32,
    pub times_wrong: u32,
    pub consecutive_correct: u32,
    /// Set once the last stage is cleared; later misses don't undo it.
    #[serde(default)]
    pub mastered: bool,
    #[serde(default)]
    pub last_practiced: Option<DateTime<Utc>>,
}

impl TopicProgress {
    pub fn digit_counts(&self) -> (u32, u32) {
        STAGE_LADDER[self.stage.min(STAGE_LADDER.len() - 1)]
    }

    /// At least the repetition quota, three quarters of them right.
    pub fn stage_cleared(&self) -> bool {
        self.repetitions >= REPETITIONS_PER_STAGE && self.repetitions * 4 >= self.stage_attempts * 3
    }

    pub fn is_mastered(&self) -> bool {
        self.mastered
    }

    fn record_answer(&mut self, correct: bool) -> bool {
        self.stage_attempts += 1;
        if correct {
            self.times_correct += 1;
            self.consecutive_correct += 1;
            self.repetitions += 1;
        } else {
            self.times_wrong += 1;
            self.consecutive_correct = 0;
        }
        self.last_practiced = Some(Utc::now());

        if !self.stage_cleared() {
            return false;
        }
        if self.stage + 1 < STAGE_LADDER.len() {
            self.stage += 1;
            self.repetitions = 0;
            self.stage_attempts = 0;
            return true;
        }
        self.mastered = true;
        false
    }
}

/// Mastery state of every practised topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBook {
    #[serde(default)]
    topics: HashMap<String, TopicProgress>,
}

impl ProgressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(&self, topic: &str) -> Option<&TopicProgress> {
        self.topics.get(topic)
    }

    pub fn stage_of(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |p| p.stage)
    }

    /// Generation request for the learner's current stage of `op`.
    pub fn request_for(&self, op: &OperationDefinition) -> ComplexityRequest {
        let (digits1, digits2) = self
            .topics
            .get(op.id)
            .map_or(STAGE_LADDER[0], TopicProgress::digit_counts);
        match op.arity() {
            Arity::Unary => ComplexityRequest::new(digits1, None),
            Arity::Binary => ComplexityRequest::new(digits1, Some(digits2)),
        }
    }

    /// Records one answer; returns the new stage if the topic was promoted.
    pub fn record_answer(&mut self, topic: &str, correct: bool) -> Option<usize> {
        let progress = self.topics.entry(topic.to_string()).or_default();
        if progress.record_answer(correct) {
            info!(target: "drill_core", topic, stage = progress.stage, "stage cleared");
            Some(progress.stage)
        } else {
            None
        }
    }

    pub fn reset_topic(&mut self, topic: &str) {
        self.topics.remove(topic);
    }

    pub fn mastered_count(&self) -> usize {
        self.topics.values().filter(|p| p.is_mastered()).count()
    }

    pub fn total_correct(&self) -> u32 {
        self.topics.values().map(|p| p.times_correct).sum()
    }

    pub fn total_wrong(&self) -> u32 {
        self.topics.values().map(|p| p.times_wrong).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicProgress)> {
        self.topics.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationRegistry;

    fn answer_many(book: &mut ProgressBook, topic: &str, correct: bool, n: u32) -> Vec<usize> {
        (0..n).filter_map(|_| book.record_answer(topic, correct)).collect()
    }

    #[test]
    fn new_topics_start_at_the_first_stage() {
        let book = ProgressBook::new();
        let registry = OperationRegistry::builtin();
        assert_eq!(book.stage_of("addition"), 0);
        assert_eq!(book.request_for(registry.get("addition").unwrap()), ComplexityRequest::new(1, Some(1)));
        assert_eq!(book.request_for(registry.get("square_root").unwrap()), ComplexityRequest::new(1, None));
    }

    #[test]
    fn repetitions_promote_to_the_next_stage() {
        let mut book = ProgressBook::new();
        let promotions = answer_many(&mut book, "addition", true, REPETITIONS_PER_STAGE);
        assert_eq!(promotions, vec![1]);

        let progress = book.topic("addition").unwrap();
        assert_eq!(progress.repetitions, 0);
        assert_eq!(progress.times_correct, REPETITIONS_PER_STAGE);
        assert_eq!(progress.digit_counts(), (1, 2));
        assert!(progress.last_practiced.is_some());
    }

    #[test]
    fn poor_accuracy_holds_the_stage() {
        let mut book = ProgressBook::new();
        answer_many(&mut book, "division", false, 10);
        // 20 right out of 30 is below three quarters
        assert!(answer_many(&mut book, "division", true, 20).is_empty());
        assert_eq!(book.stage_of("division"), 0);
        // 30 of 40 reaches it
        assert_eq!(answer_many(&mut book, "division", true, 10), vec![1]);
        assert_eq!(book.topic("division").unwrap().consecutive_correct, 30);
    }

    #[test]
    fn last_stage_is_mastery() {
        let mut book = ProgressBook::new();
        let promotions = answer_many(&mut book, "modulus", true, REPETITIONS_PER_STAGE * STAGE_LADDER.len() as u32);
        assert_eq!(promotions, vec![1, 2, 3, 4, 5]);
        assert_eq!(book.stage_of("modulus"), STAGE_LADDER.len() - 1);
        assert_eq!(book.mastered_count(), 1);

        book.record_answer("addition", false);
        assert_eq!(book.total_correct(), 120);
        assert_eq!(book.total_wrong(), 1);

        book.reset_topic("modulus");
        assert_eq!(book.mastered_count(), 0);
    }

    #[test]
    fn mastery_outlasts_later_misses() {
        let mut book = ProgressBook::new();
        answer_many(&mut book, "addition", true, REPETITIONS_PER_STAGE * STAGE_LADDER.len() as u32);
        assert_eq!(book.mastered_count(), 1);

        // 20 of 27 drops the last stage below three quarters
        answer_many(&mut book, "addition", false, 7);
        let progress = book.topic("addition").unwrap();
        assert!(!progress.stage_cleared());
        assert!(progress.is_mastered());
        assert_eq!(book.mastered_count(), 1);

        let restored = ProgressBook::from_json(&book.to_json().unwrap()).unwrap();
        assert_eq!(restored.mastered_count(), 1);
    }

    #[test]
    fn progress_survives_json() {
        let mut book = ProgressBook::new();
        answer_many(&mut book, "addition", true, 3);
        let restored = ProgressBook::from_json(&book.to_json().unwrap()).unwrap();
        assert_eq!(restored, book);
        assert!(ProgressBook::from_json("not json").is_err());
    }
}
