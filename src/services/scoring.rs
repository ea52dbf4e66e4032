// src/services/scoring.rs
//
// Pure grading of a quiz attempt. No database access happens here; the
// attempt service loads the question bank, calls `grade`, and persists the
// outcome.

use std::collections::HashMap;

use crate::{
    config::MISSING_CORRECT_ANSWER,
    models::{quiz::Answer, result::QuestionFeedback},
};

/// A question with its answer options, as needed for grading.
#[derive(Debug, Clone)]
pub struct GradingQuestion {
    pub id: i64,
    pub question_number: i32,
    pub text: String,
    /// Options in insertion (id) order.
    pub answers: Vec<Answer>,
}

impl GradingQuestion {
    /// First answer flagged correct, if any.
    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|a| a.correct)
    }

    /// First option whose text matches the selection exactly.
    fn find_answer(&self, text: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.answer == text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Wrong,
    Unattempted,
}

/// Outcome for one question, ready to be stored as a result answer.
#[derive(Debug, Clone)]
pub struct GradedQuestion {
    pub question_id: i64,
    pub selected_answer_id: Option<i64>,
    pub outcome: Outcome,
    pub feedback: QuestionFeedback,
}

impl GradedQuestion {
    pub fn is_correct(&self) -> bool {
        self.outcome == Outcome::Correct
    }
}

#[derive(Debug, Clone)]
pub struct Grade {
    pub correct: i32,
    pub wrong: i32,
    /// Configured count minus correct and wrong, so omitted questions count too.
    pub unattempted: i32,
    pub score: f64,
    pub questions: Vec<GradedQuestion>,
}

impl Grade {
    pub fn passed(&self, passing_score_percentage: i32) -> bool {
        is_pass(self.score, passing_score_percentage)
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `correct * (100 / configured)` rounded to two places, kept within [0, 100].
pub fn compute_score(correct: i32, configured: i32) -> f64 {
    if configured <= 0 {
        return 0.0;
    }
    let multiplier = 100.0 / configured as f64;
    round2(correct as f64 * multiplier).clamp(0.0, 100.0)
}

pub fn is_pass(score: f64, passing_score_percentage: i32) -> bool {
    score >= passing_score_percentage as f64
}

pub fn format_score(score: f64) -> String {
    format!("{:.2}", score)
}

/// Grades a submission keyed by question text.
///
/// * Keys that match no question are ignored.
/// * Duplicate question texts resolve to the lowest `question_number`, then lowest id.
/// * An empty or missing selection is unattempted; a selection matching no
///   option is wrong.
/// * Every question of the quiz yields a graded entry, in question order.
pub fn grade(
    questions: &[GradingQuestion],
    submission: &HashMap<String, Option<String>>,
    configured_count: i32,
) -> Grade {
    let mut ordered: Vec<&GradingQuestion> = questions.iter().collect();
    ordered.sort_by_key(|q| (q.question_number, q.id));

    let mut by_text: HashMap<&str, i64> = HashMap::new();
    for q in &ordered {
        by_text.entry(q.text.as_str()).or_insert(q.id);
    }

    let mut selections: HashMap<i64, &str> = HashMap::new();
    for (text, selected) in submission {
        let Some(question_id) = by_text.get(text.as_str()) else {
            continue;
        };
        if let Some(selected) = selected.as_deref().filter(|s| !s.is_empty()) {
            selections.insert(*question_id, selected);
        }
    }

    let mut correct = 0;
    let mut wrong = 0;
    let mut graded = Vec::with_capacity(ordered.len());

    for q in ordered {
        let correct_answer = q
            .correct_answer()
            .map(|a| a.answer.clone())
            .unwrap_or_else(|| MISSING_CORRECT_ANSWER.to_string());

        let (outcome, selected) = match selections.get(&q.id) {
            None => (Outcome::Unattempted, None),
            Some(text) => match q.find_answer(text) {
                Some(answer) if answer.correct => (Outcome::Correct, Some(answer)),
                Some(answer) => (Outcome::Wrong, Some(answer)),
                None => (Outcome::Wrong, None),
            },
        };

        match outcome {
            Outcome::Correct => correct += 1,
            Outcome::Wrong => wrong += 1,
            Outcome::Unattempted => {}
        }

        graded.push(GradedQuestion {
            question_id: q.id,
            selected_answer_id: selected.map(|a| a.id),
            outcome,
            feedback: QuestionFeedback {
                question: q.text.clone(),
                correct_answer,
                student_answer: selected.map(|a| a.answer.clone()),
                is_correct: outcome == Outcome::Correct,
            },
        });
    }

    let unattempted = (configured_count - correct - wrong).max(0);

    Grade {
        correct,
        wrong,
        unattempted,
        score: compute_score(correct, configured_count),
        questions: graded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(id: i64, question_id: i64, text: &str, correct: bool) -> Answer {
        Answer {
            id,
            question_id,
            answer: text.to_string(),
            correct,
        }
    }

    /// Question `n` has options "A" (correct) and "B".
    fn bank(count: i64) -> Vec<GradingQuestion> {
        (1..=count)
            .map(|n| GradingQuestion {
                id: n,
                question_number: n as i32,
                text: format!("Question {}", n),
                answers: vec![answer(n * 10, n, "A", true), answer(n * 10 + 1, n, "B", false)],
            })
            .collect()
    }

    fn submit(pairs: &[(&str, Option<&str>)]) -> HashMap<String, Option<String>> {
        pairs
            .iter()
            .map(|(q, a)| (q.to_string(), a.map(str::to_string)))
            .collect()
    }

    #[test]
    fn partial_submission_is_penalized() {
        let questions = bank(4);
        let submission = submit(&[
            ("Question 1", Some("A")),
            ("Question 2", Some("A")),
            ("Question 3", Some("B")),
        ]);

        let grade = grade(&questions, &submission, 4);

        assert_eq!(grade.correct, 2);
        assert_eq!(grade.wrong, 1);
        assert_eq!(grade.unattempted, 1);
        assert_eq!(grade.score, 50.0);
        assert_eq!(format_score(grade.score), "50.00");
        assert_eq!(grade.questions.len(), 4);
        assert_eq!(grade.questions[3].outcome, Outcome::Unattempted);
        assert_eq!(grade.questions[3].selected_answer_id, None);
    }

    #[test]
    fn unknown_answer_text_is_wrong() {
        let questions = bank(2);
        let submission = submit(&[("Question 1", Some("Z")), ("Question 2", Some("A"))]);

        let grade = grade(&questions, &submission, 2);

        assert_eq!(grade.correct, 1);
        assert_eq!(grade.wrong, 1);
        assert_eq!(grade.unattempted, 0);
        let first = &grade.questions[0];
        assert_eq!(first.outcome, Outcome::Wrong);
        assert_eq!(first.selected_answer_id, None);
        assert_eq!(first.feedback.student_answer, None);
        assert_eq!(first.feedback.correct_answer, "A");
    }

    #[test]
    fn unknown_question_text_is_skipped() {
        let questions = bank(2);
        let submission = submit(&[("Not a question", Some("A")), ("Question 1", Some("A"))]);

        let grade = grade(&questions, &submission, 2);

        assert_eq!(grade.correct, 1);
        assert_eq!(grade.wrong, 0);
        assert_eq!(grade.unattempted, 1);
    }

    #[test]
    fn empty_and_null_selections_are_unattempted() {
        let questions = bank(3);
        let submission = submit(&[("Question 1", Some("")), ("Question 2", None)]);

        let grade = grade(&questions, &submission, 3);

        assert_eq!(grade.correct, 0);
        assert_eq!(grade.wrong, 0);
        assert_eq!(grade.unattempted, 3);
        assert_eq!(grade.score, 0.0);
    }

    #[test]
    fn counts_always_sum_to_configured_count() {
        let questions = bank(5);
        let cases = [
            submit(&[]),
            submit(&[("Question 1", Some("A"))]),
            submit(&[("Question 1", Some("B")), ("Question 2", Some("B"))]),
            submit(&[
                ("Question 1", Some("A")),
                ("Question 2", Some("A")),
                ("Question 3", Some("A")),
                ("Question 4", Some("A")),
                ("Question 5", Some("A")),
            ]),
        ];
        for submission in &cases {
            let g = grade(&questions, submission, 5);
            assert_eq!(g.correct + g.wrong + g.unattempted, 5);
            assert!((0.0..=100.0).contains(&g.score));
        }
    }

    #[test]
    fn question_without_correct_answer_reports_placeholder() {
        let questions = vec![GradingQuestion {
            id: 1,
            question_number: 1,
            text: "Trick question".into(),
            answers: vec![answer(1, 1, "Yes", false), answer(2, 1, "No", false)],
        }];
        let grade = grade(&questions, &submit(&[("Trick question", Some("Yes"))]), 1);

        assert_eq!(grade.wrong, 1);
        assert_eq!(grade.questions[0].feedback.correct_answer, MISSING_CORRECT_ANSWER);
        assert_eq!(grade.questions[0].feedback.student_answer.as_deref(), Some("Yes"));
    }

    #[test]
    fn duplicate_question_text_resolves_to_lowest_number() {
        let questions = vec![
            GradingQuestion {
                id: 9,
                question_number: 2,
                text: "Same".into(),
                answers: vec![answer(90, 9, "A", true)],
            },
            GradingQuestion {
                id: 4,
                question_number: 1,
                text: "Same".into(),
                answers: vec![answer(40, 4, "A", false), answer(41, 4, "B", true)],
            },
        ];
        let grade = grade(&questions, &submit(&[("Same", Some("B"))]), 2);

        assert_eq!(grade.questions[0].question_id, 4);
        assert!(grade.questions[0].is_correct());
        assert_eq!(grade.questions[1].outcome, Outcome::Unattempted);
        assert_eq!(grade.correct, 1);
        assert_eq!(grade.unattempted, 1);
    }

    #[test]
    fn score_rounds_to_two_places() {
        assert_eq!(compute_score(1, 3), 33.33);
        assert_eq!(compute_score(2, 3), 66.67);
        assert_eq!(compute_score(3, 3), 100.0);
        assert_eq!(compute_score(0, 0), 0.0);
    }

    #[test]
    fn score_never_exceeds_hundred() {
        // More real questions than configured: the multiplier still uses the configured count.
        assert_eq!(compute_score(5, 4), 100.0);
    }

    #[test]
    fn pass_is_inclusive() {
        assert!(is_pass(60.0, 60));
        assert!(!is_pass(59.99, 60));
        assert!(is_pass(0.0, 0));
    }
}
