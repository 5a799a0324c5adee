//! Scripted backends for engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use autoimport_core::{Evaluation, HistoryEntry, Preset, ScoreBreakdown};

use crate::transport::{ExchangeBackend, ExchangeRequest, FailureKind, Reply, TrainingBackend};

/// What the backend does with the next call.
pub(crate) enum Step<T> {
    Respond(Result<T, FailureKind>),
    Delayed(Duration, Result<T, FailureKind>),
    /// Never answers; only the deadline or an abort ends the call.
    Hang,
}

impl Step<Reply> {
    pub(crate) fn reply(text: &str) -> Self {
        Step::Respond(Ok(Reply {
            text: text.to_string(),
            ..Reply::default()
        }))
    }

    pub(crate) fn reply_with_session(text: &str, session_id: &str) -> Self {
        Step::Respond(Ok(Reply {
            text: text.to_string(),
            session_id: Some(session_id.to_string()),
            ..Reply::default()
        }))
    }

    pub(crate) fn delayed_reply(delay: Duration, text: &str) -> Self {
        Step::Delayed(
            delay,
            Ok(Reply {
                text: text.to_string(),
                ..Reply::default()
            }),
        )
    }
}

impl<T> Step<T> {
    pub(crate) fn fail(kind: FailureKind) -> Self {
        Step::Respond(Err(kind))
    }

    async fn run(step: Option<Self>) -> Result<T, FailureKind> {
        match step {
            Some(Step::Respond(result)) => result,
            Some(Step::Delayed(delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            Some(Step::Hang) => std::future::pending().await,
            None => Err(FailureKind::ServiceError("script exhausted".to_string())),
        }
    }
}

/// Backend that plays back pre-recorded steps and records every request.
pub(crate) struct ScriptedBackend {
    steps: Mutex<VecDeque<Step<Reply>>>,
    evaluations: Mutex<VecDeque<Step<Evaluation>>>,
    presets: Option<Vec<Preset>>,
    requests: Mutex<Vec<ExchangeRequest>>,
    evaluation_requests: Mutex<Vec<(String, Vec<HistoryEntry>)>>,
    completed: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new(steps: Vec<Step<Reply>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            evaluations: Mutex::new(VecDeque::new()),
            presets: None,
            requests: Mutex::new(Vec::new()),
            evaluation_requests: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_presets(mut self, presets: Vec<Preset>) -> Self {
        self.presets = Some(presets);
        self
    }

    pub(crate) fn with_evaluations(self, evaluations: Vec<Step<Evaluation>>) -> Self {
        *self.evaluations.lock().unwrap() = evaluations.into();
        self
    }

    pub(crate) fn push(&self, step: Step<Reply>) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub(crate) fn requests(&self) -> Vec<ExchangeRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn evaluation_requests(&self) -> Vec<(String, Vec<HistoryEntry>)> {
        self.evaluation_requests.lock().unwrap().clone()
    }

    /// Exchanges that ran to completion (not dropped mid-flight).
    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_requests(&self, n: usize) {
        while self.requests.lock().unwrap().len() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ExchangeBackend for ScriptedBackend {
    async fn exchange(&self, request: ExchangeRequest) -> Result<Reply, FailureKind> {
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();
        let result = Step::run(step).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl TrainingBackend for ScriptedBackend {
    async fn presets(&self) -> Result<Vec<Preset>, FailureKind> {
        self.presets
            .clone()
            .ok_or_else(|| FailureKind::NetworkUnreachable("connection refused".to_string()))
    }

    async fn evaluate(
        &self,
        preset: &str,
        history: Vec<HistoryEntry>,
    ) -> Result<Evaluation, FailureKind> {
        self.evaluation_requests
            .lock()
            .unwrap()
            .push((preset.to_string(), history));
        let step = self.evaluations.lock().unwrap().pop_front();
        Step::run(step).await
    }
}

pub(crate) fn sample_evaluation(overall_score: f64) -> Evaluation {
    Evaluation {
        scores: ScoreBreakdown {
            contact: 80.0,
            needs_discovery: 60.0,
            objection_handling: 40.0,
            presentation: 70.0,
            closing: 30.0,
        },
        strengths: vec!["Вежливость".to_string()],
        improvements: vec!["Работа с возражениями".to_string()],
        overall_score,
        recommendations: "Задавайте больше открытых вопросов.".to_string(),
    }
}
