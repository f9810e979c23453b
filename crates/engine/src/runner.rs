//! The agent execution loop.
//!
//! A state machine driving assemble → stream → act cycles until the model
//! produces a final answer or the step budget runs out. Events are
//! re-emitted to the caller as they happen; text deltas pass straight
//! through so partial output can be rendered live.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use deskhand_core::backend::{InferenceBackend, InferenceRequest, InferenceUpdate};
use deskhand_core::capability::CapabilityRegistry;
use deskhand_core::context::ExecutionContext;
use deskhand_core::error::EngineError;
use deskhand_core::event::StreamEvent;
use deskhand_core::message::Message;

use crate::assembler::PromptAssembler;
use crate::scratchpad::{AgentStep, Scratchpad};

/// Default maximum reason-act-observe iterations per run.
pub const DEFAULT_STEP_BUDGET: u32 = 6;

/// The final answer text when the budget runs out. Without this ceiling a
/// model that keeps requesting capabilities could loop indefinitely.
pub const BUDGET_EXHAUSTED_MESSAGE: &str = "Stopped: step budget exhausted.";

/// States of the execution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Building messages for the next inference call.
    Assembling,
    /// Streaming a model response.
    Streaming,
    /// Executing requested capabilities.
    Acting,
    /// Terminal: the model produced a final answer.
    Finished,
    /// Terminal: the step budget was exhausted.
    Aborted,
}

/// The result of one completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The final answer text.
    pub final_text: String,

    /// The extended copy of the conversation history.
    pub history: Vec<Message>,

    /// Terminal state: `Finished` or `Aborted`.
    pub state: EngineState,

    /// Number of acting steps used.
    pub steps_used: u32,

    /// The scratchpad at completion.
    pub scratchpad: Scratchpad,
}

/// The execution loop runner.
///
/// Holds only shared, read-only pieces (backend, registry, assembler), so
/// one runner serves any number of concurrent runs; each run owns its own
/// history copy and scratchpad.
#[derive(Clone)]
pub struct AgentRunner {
    backend: Arc<dyn InferenceBackend>,
    registry: Arc<CapabilityRegistry>,
    assembler: PromptAssembler,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    step_budget: u32,
}

impl AgentRunner {
    /// Create a new runner.
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        registry: Arc<CapabilityRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            registry,
            assembler: PromptAssembler::default(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the step budget.
    pub fn with_step_budget(mut self, budget: u32) -> Self {
        self.step_budget = budget;
        self
    }

    /// Use a custom prompt assembler.
    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Execute one run.
    ///
    /// `history` is taken by reference and returned extended in the
    /// outcome; the caller's copy is never mutated. Events are emitted on
    /// `events` as the run progresses. The only errors that escape are
    /// network/protocol faults from the inference stream; those also emit
    /// an `error` event first.
    pub async fn run(
        &self,
        history: &[Message],
        ctx: &ExecutionContext,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<RunOutcome, EngineError> {
        let mut history: Vec<Message> = history.to_vec();
        let mut scratchpad = Scratchpad::new();
        let manifest = self.registry.descriptors();
        let mut steps_used: u32 = 0;

        info!(
            model = %self.model,
            step_budget = self.step_budget,
            capabilities = manifest.len(),
            "Run starting"
        );

        loop {
            // ── Assembling ──
            let messages = self.assembler.assemble(&manifest, &history, &scratchpad);

            // ── Streaming ──
            debug!(step = steps_used, messages = messages.len(), "Requesting inference");
            let request = InferenceRequest {
                model: self.model.clone(),
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: manifest.clone(),
            };

            let mut stream = match self.backend.stream_chat(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.emit(events, StreamEvent::Error { message: e.to_string() })
                        .await;
                    return Err(e.into());
                }
            };

            let mut full_text = String::new();
            let mut calls = Vec::new();

            while let Some(update) = stream.recv().await {
                match update {
                    Ok(InferenceUpdate::TextDelta(delta)) => {
                        full_text.push_str(&delta);
                        self.emit(events, StreamEvent::TextDelta { content: delta })
                            .await;
                    }
                    Ok(InferenceUpdate::CapabilityCalls(requested)) => {
                        calls = requested;
                    }
                    Ok(InferenceUpdate::Final(text)) => {
                        full_text = text;
                    }
                    Err(e) => {
                        self.emit(events, StreamEvent::Error { message: e.to_string() })
                            .await;
                        return Err(e.into());
                    }
                }
            }

            // ── Final answer? ──
            if calls.is_empty() {
                history.push(Message::assistant(&full_text));
                self.emit(events, StreamEvent::FinalAnswer { content: full_text.clone() })
                    .await;
                info!(steps = steps_used, "Run finished");
                return Ok(RunOutcome {
                    final_text: full_text,
                    history,
                    state: EngineState::Finished,
                    steps_used,
                    scratchpad,
                });
            }

            // ── Acting ──
            debug!(count = calls.len(), "Executing capability calls");
            for call in &calls {
                self.emit(
                    events,
                    StreamEvent::CapabilityRequested {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                )
                .await;
            }

            history.push(Message::assistant_with_calls(&full_text, calls.clone()));

            // All invocations run concurrently; the loop waits for every
            // one before proceeding. `invoke` always resolves, so a bad
            // call degrades one step, never the run.
            let invocations = calls.iter().map(|call| {
                let registry = &self.registry;
                async move {
                    let observation = registry.invoke(call, ctx).await;
                    (call.clone(), observation)
                }
            });
            let results = join_all(invocations).await;

            for (call, observation) in results {
                self.emit(
                    events,
                    StreamEvent::CapabilityCompleted {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        output: observation.clone(),
                    },
                )
                .await;
                history.push(Message::tool_result(&call.id, &observation));
                scratchpad.push(AgentStep { call, observation });
            }

            // ── Budget check ──
            steps_used += 1;
            if steps_used >= self.step_budget {
                warn!(steps = steps_used, "Step budget exhausted, aborting run");
                history.push(Message::assistant(BUDGET_EXHAUSTED_MESSAGE));
                self.emit(
                    events,
                    StreamEvent::FinalAnswer {
                        content: BUDGET_EXHAUSTED_MESSAGE.into(),
                    },
                )
                .await;
                return Ok(RunOutcome {
                    final_text: BUDGET_EXHAUSTED_MESSAGE.into(),
                    history,
                    state: EngineState::Aborted,
                    steps_used,
                    scratchpad,
                });
            }
        }
    }

    /// Streaming variant of [`run`].
    ///
    /// Returns an `mpsc::Receiver` populated by a background task — the
    /// caller simply reads events until the channel closes. Errors surface
    /// as an `error` event.
    pub fn run_stream(
        &self,
        history: Vec<Message>,
        ctx: ExecutionContext,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(128);
        let runner = self.clone();

        tokio::spawn(async move {
            if let Err(e) = runner.run(&history, &ctx, &tx).await {
                // The error event was already emitted inside run().
                debug!(error = %e, "Streaming run ended with error");
            }
        });

        rx
    }

    async fn emit(&self, events: &mpsc::Sender<StreamEvent>, event: StreamEvent) {
        // A dropped receiver means the caller stopped listening; the run
        // still completes so history stays consistent.
        let _ = events.send(event).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
