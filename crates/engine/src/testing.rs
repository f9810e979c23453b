//! Shared test helpers for engine tests.

use async_trait::async_trait;
use std::sync::Mutex;

use deskhand_core::backend::{InferenceBackend, InferenceRequest, InferenceUpdate};
use deskhand_core::error::InferenceError;
use deskhand_core::message::CapabilityCall;

/// A mock backend that plays back a scripted sequence of turns.
///
/// Each call to `stream_chat` pops the next turn and streams its updates.
/// Panics if more calls are made than turns provided.
pub struct ScriptedBackend {
    turns: Mutex<Vec<Vec<Result<InferenceUpdate, InferenceError>>>>,
    requests: Mutex<Vec<InferenceRequest>>,
    call_count: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn new(turns: Vec<Vec<Result<InferenceUpdate, InferenceError>>>) -> Self {
        Self {
            turns: Mutex::new(turns),
            requests: Mutex::new(Vec::new()),
            call_count: Mutex::new(0),
        }
    }

    /// A backend that streams one text answer and finishes.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text_turn(text)])
    }

    /// A backend that first requests capabilities, then gives a final answer.
    pub fn calls_then_answer(calls: Vec<CapabilityCall>, answer: &str) -> Self {
        Self::new(vec![calls_turn(calls), text_turn(answer)])
    }

    /// A backend that requests the same capability on every turn, forever
    /// up to `turns` scripted turns.
    pub fn always_calls(call: CapabilityCall, turns: usize) -> Self {
        Self::new((0..turns).map(|_| calls_turn(vec![call.clone()])).collect())
    }

    /// Number of inference calls made so far.
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// The requests received, in order.
    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(
        &self,
        request: InferenceRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<InferenceUpdate, InferenceError>>,
        InferenceError,
    > {
        self.requests.lock().unwrap().push(request);

        let mut count = self.call_count.lock().unwrap();
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            panic!("ScriptedBackend: no more turns (call #{})", *count + 1);
        }
        let turn = turns.remove(0);
        *count += 1;
        drop(turns);
        drop(count);

        let (tx, rx) = tokio::sync::mpsc::channel(32);
        tokio::spawn(async move {
            for update in turn {
                if tx.send(update).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// A turn that streams the text as one delta, then finishes with it.
pub fn text_turn(text: &str) -> Vec<Result<InferenceUpdate, InferenceError>> {
    vec![
        Ok(InferenceUpdate::TextDelta(text.to_string())),
        Ok(InferenceUpdate::Final(text.to_string())),
    ]
}

/// A turn that requests the given capability calls.
pub fn calls_turn(calls: Vec<CapabilityCall>) -> Vec<Result<InferenceUpdate, InferenceError>> {
    vec![Ok(InferenceUpdate::CapabilityCalls(calls))]
}

/// Helper to create a capability call.
pub fn make_call(name: &str, args: serde_json::Value) -> CapabilityCall {
    CapabilityCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
