use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use assess_core::model::{
    CapturedAnswer, CompletionTrigger, IntegritySignal, Score, Stage, Visibility,
};
use assess_core::time::fixed_clock;
use services::evaluator::{
    MALFORMED_RESPONSE_JUSTIFICATION, TRANSPORT_FAILURE_JUSTIFICATION,
};
use services::sessions::channel;
use services::{
    AnswerInput, CellInput, Evaluation, EvaluationRequest, Evaluator, ItemKind, QuestionSession,
    SpreadsheetTaskSession,
};

/// Replays canned evaluations in order and records every request it sees.
#[derive(Default)]
struct ScriptedEvaluator {
    script: Mutex<VecDeque<Evaluation>>,
    seen: Mutex<Vec<EvaluationRequest>>,
}

impl ScriptedEvaluator {
    fn new(script: impl IntoIterator<Item = Evaluation>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<EvaluationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Evaluation {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Evaluation::scored(Score::new(8).unwrap(), "Good answer."))
    }
}

fn started_questions() -> QuestionSession {
    let mut session = QuestionSession::with_default_questions(fixed_clock()).unwrap();
    session.set_credential("test-key");
    session.start().unwrap();
    session
}

#[tokio::test]
async fn five_questions_scored_eight_report_eight() {
    let evaluator = ScriptedEvaluator::default();
    let mut session = started_questions();

    for i in 0..5 {
        session
            .apply_input(AnswerInput::Typed(format!("answer {i}")))
            .unwrap();
        let record = session.submit(&evaluator).await.unwrap();
        assert_eq!(record.item_index, i);
        assert_eq!(session.results().len(), i + 1);
    }

    assert_eq!(session.stage(), Stage::Report);
    let report = session.report().expect("report after last question");
    assert_eq!(report.items.len(), 5);
    assert_eq!(report.overall_score.value(), 8);
    assert_eq!(report.flags.total(), 0);

    let seen = evaluator.seen();
    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|r| r.kind == ItemKind::Question));
    assert!(seen.iter().all(|r| r.credential.is_some()));
    assert_eq!(seen[2].response, "answer 2");
}

#[tokio::test]
async fn degraded_evaluations_still_advance() {
    let evaluator = ScriptedEvaluator::new([
        Evaluation::transport_failed(),
        Evaluation::malformed(),
    ]);
    let mut session = started_questions();

    session
        .apply_input(AnswerInput::Typed("first".into()))
        .unwrap();
    let first = session.submit(&evaluator).await.unwrap();
    assert_eq!(first.score.value(), 0);
    assert_eq!(first.justification, TRANSPORT_FAILURE_JUSTIFICATION);

    session
        .apply_input(AnswerInput::Typed("second".into()))
        .unwrap();
    let second = session.submit(&evaluator).await.unwrap();
    assert_eq!(second.score.value(), 5);
    assert_eq!(second.justification, MALFORMED_RESPONSE_JUSTIFICATION);

    assert_eq!(session.current_index(), 2);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn reset_from_report_starts_over() {
    let evaluator = ScriptedEvaluator::default();
    let mut session = started_questions();
    session.record_integrity(IntegritySignal::VisibilityChanged(Visibility::Hidden));

    for _ in 0..5 {
        session
            .apply_input(AnswerInput::Typed("answer".into()))
            .unwrap();
        session.submit(&evaluator).await.unwrap();
    }
    let finished = session.report().unwrap();
    assert_eq!(finished.flags.tab_switches, 1);

    session.reset();
    assert_eq!(session.stage(), Stage::Welcome);
    assert_ne!(session.id(), finished.session_id);
    assert!(session.results().is_empty());
    assert!(session.flags().is_empty());
    assert!(session.report().is_none());

    session.start().unwrap();
    assert_eq!(session.current_index(), 0);
}

#[tokio::test]
async fn signals_after_report_are_ignored() {
    let evaluator = ScriptedEvaluator::default();
    let mut session = started_questions();
    session
        .apply_input(AnswerInput::Pasted("copied".into()))
        .unwrap();
    for _ in 0..5 {
        session
            .apply_input(AnswerInput::Typed("answer".into()))
            .unwrap();
        session.submit(&evaluator).await.unwrap();
    }
    assert_eq!(session.stage(), Stage::Report);
    let before = session.report().unwrap().flags;
    assert_eq!(before.pastes, 1);

    assert!(!session.record_integrity(IntegritySignal::Paste));
    assert!(!session.record_integrity(IntegritySignal::VisibilityChanged(Visibility::Hidden)));
    assert!(session.apply_input(AnswerInput::Pasted("late".into())).is_err());

    assert_eq!(session.flags().len(), 1);
    assert_eq!(session.report().unwrap().flags, before);
}

#[tokio::test]
async fn task_signals_after_report_are_ignored() {
    let evaluator = ScriptedEvaluator::default();
    let mut session = SpreadsheetTaskSession::with_default_tasks(fixed_clock()).unwrap();
    session.set_credential("test-key");
    session.start().unwrap();
    while session.stage() == Stage::Active {
        session.submit(&evaluator).await.unwrap();
    }
    assert_eq!(session.stage(), Stage::Report);

    assert!(!session.record_integrity(IntegritySignal::VisibilityChanged(Visibility::Hidden)));
    let err = session.apply_input(CellInput::Paste {
        cell: "A1".parse().unwrap(),
        value: "x".into(),
    });
    assert!(err.is_err());
    assert!(session.flags().is_empty());
    assert_eq!(session.report().unwrap().flags.total(), 0);
}

#[tokio::test]
async fn spreadsheet_tasks_capture_actions_and_expiry() {
    let evaluator = ScriptedEvaluator::default();
    let mut session = SpreadsheetTaskSession::with_default_tasks(fixed_clock()).unwrap();
    session.set_credential("test-key");
    session.start().unwrap();

    // Task 1: revenue formula in E2, submitted.
    session
        .apply_input(CellInput::Edit {
            cell: "E2".parse().unwrap(),
            value: "=C2*D2".into(),
        })
        .unwrap();
    session.tick();
    let record = session.submit(&evaluator).await.unwrap();
    assert_eq!(record.trigger, CompletionTrigger::Submitted);
    assert_eq!(record.elapsed_secs, Some(1));
    assert_eq!(record.answer.summary(), "E2: =C2*D2");

    // Task 2: let the 90 second countdown run out with nothing entered.
    session.tick();
    let limit = session.current_task().unwrap().time_limit();
    let mut expired = None;
    for _ in 1..limit {
        expired = expired.or(session.tick());
    }
    let pending = expired.expect("countdown expiry");
    assert_eq!(pending.trigger(), CompletionTrigger::Expired);
    assert_eq!(pending.answer(), &CapturedAnswer::Actions(Vec::new()));
    let evaluation = evaluator.evaluate(pending.request()).await;
    let record = session.finish_completion(pending, evaluation).unwrap();
    assert_eq!(record.elapsed_secs, Some(u64::from(limit)));
    assert_eq!(session.current_index(), 2);

    let seen = evaluator.seen();
    assert_eq!(seen[0].kind, ItemKind::SpreadsheetTask);
    assert_eq!(seen[0].expected, "=C2*D2");
    assert!(seen[0].response.contains("formula-entry"));
    assert_eq!(seen[1].response, "[]");
}

#[tokio::test(start_paused = true)]
async fn driver_runs_question_session_end_to_end() {
    let evaluator = Arc::new(ScriptedEvaluator::default());
    let session = QuestionSession::with_default_questions(fixed_clock()).unwrap();
    let (mut handle, driver) = channel(session, evaluator.clone());
    let runner = tokio::spawn(driver.run());

    handle.set_credential("test-key").await.unwrap();
    handle.start().await.unwrap();
    handle
        .integrity(IntegritySignal::Paste)
        .await
        .unwrap();

    for done in 0..5 {
        handle
            .input(AnswerInput::Typed(format!("answer {done}")))
            .await
            .unwrap();
        handle.submit().await.unwrap();
        handle
            .wait_until(|s| s.results.len() == done + 1)
            .await
            .unwrap();
    }

    let snapshot = handle
        .wait_until(|s| s.stage == Stage::Report)
        .await
        .unwrap();
    let report = snapshot.report.expect("report published");
    assert_eq!(report.overall_score.value(), 8);
    assert_eq!(report.flags.pastes, 1);

    drop(handle);
    let session = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.results().len(), 5);
}
