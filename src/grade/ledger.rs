#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Attempt and score bookkeeping across a student's submissions.
//!
//! Gradescope keeps the score of the latest submission, so every grading run
//! has to re-derive the recorded score from history: it never drops below the
//! best earlier attempt, and once attempts run out the student only ever sees
//! that best score.

use serde::{Deserialize, Serialize};

use super::engine::round_score;

/// Outcome of one earlier submission, as recorded by the run that graded it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Score recorded for that submission.
    pub score:      f64,
    /// False when the grader itself failed; such runs never count.
    pub succeeded:  bool,
    /// True for diagnostic runs; these never count either.
    pub is_pretest: bool,
}

impl AttemptRecord {
    /// Returns true if this attempt counts toward the limit and the history.
    pub fn counts(&self) -> bool {
        self.succeeded && !self.is_pretest
    }
}

/// Why per-test detail is withheld from the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// The attempt limit, carried here, is exhausted.
    AttemptsExhausted(u32),
    /// An earlier attempt already earned full marks.
    MaximumAchieved,
}

impl Suppression {
    /// Notice shown instead of the grading output.
    pub fn notice(&self) -> String {
        match self {
            Suppression::AttemptsExhausted(limit) => {
                format!("You've already used all {limit} attempts.\n")
            }
            Suppression::MaximumAchieved => {
                "You already achieved maximum score possible.\n".to_string()
            }
        }
    }
}

/// What the current grading run records.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalScoreDecision {
    /// Score to write to the results record.
    pub score:          f64,
    /// 1-based number of this attempt among counted attempts. A pretest
    /// carries the number the next counted attempt will get.
    pub attempt_number: u32,
    /// Limit shown to the student; `None` reads as unlimited.
    pub shown_limit:    Option<u32>,
    /// Best score among counted earlier attempts, if there are any.
    pub previous_best:  Option<f64>,
    /// Sum of all rubric weights.
    pub max_score:      f64,
    /// Set when per-test detail must be withheld.
    pub suppression:    Option<Suppression>,
    /// True when the submission asked for a diagnostic run.
    pub pretest:        bool,
}

impl FinalScoreDecision {
    /// Returns true if the per-test list must be emptied.
    pub fn suppresses_details(&self) -> bool {
        self.suppression.is_some()
    }

    /// `Attempt N/L`, `Attempt N/Unlimited`, or the pretest banner.
    pub fn header(&self) -> String {
        if self.pretest {
            return "Pretest (does not count as an attempt)\n".to_string();
        }
        match self.shown_limit {
            Some(limit) => format!("Attempt {}/{limit}\n", self.attempt_number),
            None => format!("Attempt {}/Unlimited\n", self.attempt_number),
        }
    }

    /// `/max`, or nothing when the maximum is unknown.
    fn out_of(&self) -> String {
        if self.max_score.is_finite() {
            format!("/{:.2}", self.max_score)
        } else {
            String::new()
        }
    }

    /// Assembles the narrative shown to the student around `body`.
    pub fn narrate(&self, body: &str, new_score: f64) -> String {
        let mut output = match self.suppression {
            Some(suppression) => suppression.notice(),
            None => format!("{}{body}", self.header()),
        };
        if self.pretest {
            output.push_str(&format!(
                "This pretest score was not recorded. Your recorded score remains {:.2}{}\n",
                self.score,
                self.out_of()
            ));
        } else if let Some(best) = self
            .previous_best
            .filter(|_| round_score(new_score).min(self.max_score) < self.score)
        {
            output.push_str(&format!(
                "The score is set to your previous maximal score of {best:.2}{}\n",
                self.out_of()
            ));
        }
        output
    }
}

/// Decides the score this attempt records.
///
/// Only successful, non-pretest attempts in `history` are counted. A pretest
/// records the previous best (or 0), is never suppressed and does not use up
/// an attempt. A test account is never suppressed and always sees an
/// unlimited header. Recorded scores never exceed `max_score`.
pub fn reconcile(
    new_score: f64,
    history: &[AttemptRecord],
    attempt_limit: Option<u32>,
    max_score: f64,
    is_test_account: bool,
    is_pretest: bool,
) -> FinalScoreDecision {
    let counted: Vec<f64> = history
        .iter()
        .filter(|record| record.counts())
        .map(|record| record.score)
        .collect();
    let attempt_number = u32::try_from(counted.len())
        .unwrap_or(u32::MAX)
        .saturating_add(1);
    let previous_best = counted
        .iter()
        .copied()
        .reduce(f64::max)
        .map(|best| round_score(best).min(max_score));

    let suppression = if is_test_account || is_pretest {
        None
    } else {
        match (attempt_limit, previous_best) {
            (Some(limit), _) if attempt_number > limit => Some(Suppression::AttemptsExhausted(limit)),
            (_, Some(best)) if best >= round_score(max_score).min(max_score) => {
                Some(Suppression::MaximumAchieved)
            }
            _ => None,
        }
    };

    let new_score = round_score(new_score).min(max_score);
    let score = match (is_pretest, suppression, previous_best) {
        (true, _, best) | (_, Some(Suppression::AttemptsExhausted(_)), best) => best.unwrap_or(0.0),
        (_, _, Some(best)) => new_score.max(best),
        (_, _, None) => new_score,
    };

    let decision = FinalScoreDecision {
        score,
        attempt_number,
        shown_limit: attempt_limit.filter(|_| !is_test_account),
        previous_best,
        max_score,
        suppression,
        pretest: is_pretest,
    };
    tracing::info!(
        "{} {attempt_number}: recording {:.2} (new {new_score:.2}, best so far {})",
        if is_pretest { "Pretest before attempt" } else { "Attempt" },
        decision.score,
        previous_best.map_or_else(|| "none".to_string(), |b| format!("{b:.2}"))
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(score: f64) -> AttemptRecord {
        AttemptRecord {
            score,
            succeeded: true,
            is_pretest: false,
        }
    }

    #[test]
    fn header_shows_limit() {
        let decision = reconcile(0.5, &[ok(0.2)], Some(3), 1.0, false, false);
        assert_eq!(decision.header(), "Attempt 2/3\n");
        let decision = reconcile(0.5, &[ok(0.2)], Some(3), 1.0, true, false);
        assert_eq!(decision.header(), "Attempt 2/Unlimited\n");
    }

    #[test]
    fn held_score_note_names_previous_best() {
        let decision = reconcile(0.3, &[ok(0.7)], None, 1.0, false, false);
        assert_eq!(decision.score, 0.7);
        let output = decision.narrate("Executed successfully.\n", 0.3);
        assert!(output.starts_with("Attempt 2/Unlimited\nExecuted successfully.\n"));
        assert!(output.ends_with("The score is set to your previous maximal score of 0.70/1.00\n"));
    }

    #[test]
    fn pretest_keeps_the_recorded_score() {
        let decision = reconcile(1.0, &[ok(0.25)], Some(3), 1.0, false, true);
        assert_eq!(decision.score, 0.25);
        assert_eq!(decision.attempt_number, 2);
        assert_eq!(decision.suppression, None);
        let output = decision.narrate("Executed successfully. Current score: 1.00/1.00\n", 1.0);
        assert_eq!(
            output,
            "Pretest (does not count as an attempt)\nExecuted successfully. Current score: \
             1.00/1.00\nThis pretest score was not recorded. Your recorded score remains \
             0.25/1.00\n"
        );
    }
}
