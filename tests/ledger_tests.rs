use gspack::grade::{AttemptRecord, Suppression, reconcile};

fn ok(score: f64) -> AttemptRecord {
    AttemptRecord {
        score,
        succeeded: true,
        is_pretest: false,
    }
}

#[test]
fn limit_exhaustion_holds_the_best_score() {
    let mut history = Vec::new();

    let first = reconcile(0.6, &history, Some(2), 1.0, false, false);
    assert_eq!(first.score, 0.6);
    assert_eq!(first.header(), "Attempt 1/2\n");
    assert_eq!(first.suppression, None);
    history.push(ok(first.score));

    let second = reconcile(0.9, &history, Some(2), 1.0, false, false);
    assert_eq!(second.score, 0.9);
    assert_eq!(second.header(), "Attempt 2/2\n");
    history.push(ok(second.score));

    let third = reconcile(1.0, &history, Some(2), 1.0, false, false);
    assert_eq!(third.score, 0.9);
    assert_eq!(third.suppression, Some(Suppression::AttemptsExhausted(2)));
    assert!(third.suppresses_details());
    let output = third.narrate("Executed successfully. Current score: 1.00/1.00\n", 1.0);
    assert_eq!(output, "You've already used all 2 attempts.\n");
}

#[test]
fn recorded_score_never_drops() {
    let mut history: Vec<AttemptRecord> = Vec::new();
    let mut recorded = Vec::new();
    for new in [0.4, 0.8, 0.2, 0.5, 0.81, 0.0] {
        let decision = reconcile(new, &history, None, 1.0, false, false);
        recorded.push(decision.score);
        history.push(ok(decision.score));
    }
    assert_eq!(recorded, [0.4, 0.8, 0.8, 0.8, 0.81, 0.81]);
}

#[test]
fn pretests_and_failed_runs_do_not_count() {
    let history = [
        ok(0.3),
        AttemptRecord {
            score:      1.0,
            succeeded:  true,
            is_pretest: true,
        },
        AttemptRecord {
            score:      0.9,
            succeeded:  false,
            is_pretest: false,
        },
    ];
    let decision = reconcile(0.5, &history, Some(3), 1.0, false, false);
    assert_eq!(decision.attempt_number, 2);
    assert_eq!(decision.previous_best, Some(0.3));
    assert_eq!(decision.score, 0.5);
    assert_eq!(decision.suppression, None);
}

#[test]
fn full_marks_end_grading() {
    let decision = reconcile(0.2, &[ok(0.5), ok(2.0)], None, 2.0, false, false);
    assert_eq!(decision.suppression, Some(Suppression::MaximumAchieved));
    assert_eq!(decision.score, 2.0);
    let output = decision.narrate("ignored", 0.2);
    assert_eq!(
        output,
        "You already achieved maximum score possible.\nThe score is set to your previous maximal \
         score of 2.00/2.00\n"
    );
}

#[test]
fn test_account_is_never_limited() {
    let history = [ok(1.0), ok(1.0), ok(1.0)];
    let decision = reconcile(0.25, &history, Some(1), 1.0, true, false);
    assert_eq!(decision.suppression, None);
    assert_eq!(decision.header(), "Attempt 4/Unlimited\n");
    assert_eq!(decision.score, 1.0);
}

#[test]
fn suppression_persists_once_reached() {
    let mut history = vec![ok(0.4), ok(0.7)];
    for new in [1.0, 0.0, 0.95] {
        let decision = reconcile(new, &history, Some(2), 1.0, false, false);
        assert_eq!(decision.suppression, Some(Suppression::AttemptsExhausted(2)));
        assert_eq!(decision.score, 0.7);
        history.push(ok(decision.score));
    }
}

#[test]
fn unknown_maximum_omits_the_denominator() {
    let decision = reconcile(0.0, &[ok(3.0)], None, f64::INFINITY, false, false);
    assert_eq!(decision.score, 3.0);
    let output = decision.narrate("ERROR: \nbroken\n", 0.0);
    assert!(output.starts_with("Attempt 2/Unlimited\nERROR: \nbroken\n"));
    assert!(output.ends_with("The score is set to your previous maximal score of 3.00\n"));
}

#[test]
fn pretests_never_move_the_recorded_score() {
    let mut history: Vec<AttemptRecord> = Vec::new();
    let mut recorded = Vec::new();
    for (new, pretest) in [(0.0, false), (1.0, true), (0.0, false), (0.6, false), (0.1, true)] {
        let decision = reconcile(new, &history, None, 1.0, false, pretest);
        recorded.push(decision.score);
        history.push(AttemptRecord {
            score:      decision.score,
            succeeded:  true,
            is_pretest: pretest,
        });
    }
    assert_eq!(recorded, [0.0, 0.0, 0.0, 0.6, 0.6]);
}

#[test]
fn pretests_still_run_after_attempts_are_spent() {
    let history = [ok(0.4), ok(0.7)];
    let decision = reconcile(1.0, &history, Some(2), 1.0, false, true);
    assert_eq!(decision.suppression, None);
    assert_eq!(decision.score, 0.7);
    assert_eq!(decision.header(), "Pretest (does not count as an attempt)\n");
    let output = decision.narrate("Executed successfully. Current score: 1.00/1.00\n", 1.0);
    assert!(output.contains("Current score: 1.00/1.00\n"));
    assert!(output.ends_with("Your recorded score remains 0.70/1.00\n"));
}

#[test]
fn recorded_score_stays_within_an_unrounded_maximum() {
    let first = reconcile(0.125, &[], None, 0.125, false, false);
    assert_eq!(first.score, 0.125);
    assert_eq!(first.suppression, None);

    let second = reconcile(0.0, &[ok(first.score)], None, 0.125, false, false);
    assert_eq!(second.suppression, Some(Suppression::MaximumAchieved));
    assert_eq!(second.score, 0.125);
}
