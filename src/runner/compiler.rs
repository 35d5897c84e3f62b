//! Compiler Runner: a goal-directed agent that plans, pauses for
//! approval, and executes. Supports resume and free-form follow-up
//! messages.
//!
//! Grounded on `original_source/src/core/runners.py`'s
//! `ProjectCompilerRunner` (`run`/`resume`/`send_message`/`_stream_agent`)
//! for the HITL interrupt handling and `Command(resume=...)` semantics.
//!
//! ```text
//! IDLE ──run()──▶ STREAMING ──HumanApprovalRequired──▶ AWAITING_DECISION
//!                      │                                       │
//!                      │                               resume(decision)
//!                      │                                       │
//!                      ▼                                       ▼
//!                  Complete                               STREAMING
//!                   / Error
//! ```

use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use crate::errors::{DocsError, Result};
use crate::events::ProgressEvent;
use crate::runner::bridge::{EventSender, RunnerBridge};
use crate::runner::{Decision, EventStream};

/// What the agent reports after one `advance`/`send_message` call.
/// Token/ToolCall events along the way are emitted directly through the
/// `on_event` callback; this return value only carries the transition
/// the runner must apply afterward.
pub enum AgentStep {
    Paused {
        interrupt_id: String,
        tool_name: String,
        tool_args: Value,
        message: String,
    },
    Done {
        result: serde_json::Map<String, Value>,
        message: String,
    },
}

/// The goal-directed agent/graph itself — explicitly out of scope
/// (spec.md §1: "LLM-driven analysis...treated as opaque staged
/// functions"). The runner only needs this boundary to drive it.
pub trait CompilerAgent: Send {
    /// Start or continue execution. `resume` carries the HITL decision
    /// when continuing from a pause; `None` on the very first call.
    fn advance(&mut self, resume: Option<Decision>, on_event: &mut dyn FnMut(ProgressEvent)) -> Result<AgentStep>;

    /// Inject a free-form follow-up message into the same conversational
    /// state and continue execution.
    fn send_message(&mut self, text: &str, on_event: &mut dyn FnMut(ProgressEvent)) -> Result<AgentStep>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Streaming,
    AwaitingDecision,
    Done,
}

pub struct CompilerRunner {
    user_id: String,
    thread_id: Uuid,
    agent: Arc<Mutex<Box<dyn CompilerAgent>>>,
    state: Arc<Mutex<State>>,
}

impl CompilerRunner {
    pub fn new(user_id: impl Into<String>, agent: Box<dyn CompilerAgent>) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: Uuid::now_v7(),
            agent: Arc::new(Mutex::new(agent)),
            state: Arc::new(Mutex::new(State::Idle)),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The stable identifier tying every resume/follow-up to the same
    /// underlying agent state (spec.md §4.7).
    pub fn thread_id(&self) -> Uuid {
        self.thread_id
    }

    pub fn run(&self) -> Result<EventStream> {
        self.transition_into_streaming(State::Idle, "run() is only valid from IDLE")?;
        Ok(self.spawn(move |agent, emit| agent.advance(None, emit)))
    }

    pub fn resume(&self, decision: Decision) -> Result<EventStream> {
        self.transition_into_streaming(State::AwaitingDecision, "resume() is only valid while AWAITING_DECISION")?;
        Ok(self.spawn(move |agent, emit| agent.advance(Some(decision.clone()), emit)))
    }

    /// Valid in STREAMING between turns. Rejected during
    /// AWAITING_DECISION as a protocol error (Open Question decision,
    /// `SPEC_FULL.md` §9.1): exactly one decision path follows a
    /// `HumanApprovalRequired`, so a free-form message cannot pre-empt it.
    pub fn send_message(&self, text: String) -> Result<EventStream> {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::AwaitingDecision => {
                return Err(DocsError::Protocol(
                    "send_message is rejected while AWAITING_DECISION; resume or reject the pending decision first"
                        .to_string(),
                ));
            }
            State::Done => {
                return Err(DocsError::Protocol("this runner has already reached a terminal state".to_string()));
            }
            State::Idle | State::Streaming => {}
        }
        *state = State::Streaming;
        drop(state);
        Ok(self.spawn(move |agent, emit| agent.send_message(&text, emit)))
    }

    fn transition_into_streaming(&self, expected: State, err_msg: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if *state != expected {
            return Err(DocsError::Protocol(err_msg.to_string()));
        }
        *state = State::Streaming;
        Ok(())
    }

    fn spawn<F>(&self, step: F) -> EventStream
    where
        F: FnOnce(&mut Box<dyn CompilerAgent>, &mut dyn FnMut(ProgressEvent)) -> Result<AgentStep> + Send + 'static,
    {
        let agent = self.agent.clone();
        let state = self.state.clone();
        let (bridge, stream) = RunnerBridge::spawn(256, move |tx: EventSender| {
            let mut agent = agent.lock().unwrap();
            let mut emit = |event: ProgressEvent| {
                tx.send(event);
            };
            match step(&mut agent, &mut emit) {
                Ok(AgentStep::Paused {
                    interrupt_id,
                    tool_name,
                    tool_args,
                    message,
                }) => {
                    tx.send(ProgressEvent::HumanApprovalRequired {
                        interrupt_id,
                        tool_name,
                        tool_args,
                        message,
                    });
                    *state.lock().unwrap() = State::AwaitingDecision;
                }
                Ok(AgentStep::Done { result, message }) => {
                    tx.send(ProgressEvent::Complete { result, message });
                    *state.lock().unwrap() = State::Done;
                }
                Err(err) => {
                    tx.send(ProgressEvent::Error {
                        error_message: err.to_string(),
                        stage_name: None,
                        recoverable: err.is_recoverable(),
                    });
                    *state.lock().unwrap() = State::Done;
                }
            }
        });
        EventStream::new(bridge, stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    /// Pauses once, then completes on resume — enough to exercise S4's
    /// reject-then-approve shape.
    struct ScriptedAgent {
        pause_count: u32,
    }

    impl CompilerAgent for ScriptedAgent {
        fn advance(&mut self, resume: Option<Decision>, on_event: &mut dyn FnMut(ProgressEvent)) -> Result<AgentStep> {
            on_event(ProgressEvent::Token {
                token: "planning".to_string(),
                is_first: true,
                is_last: true,
            });
            match resume {
                None => {
                    self.pause_count += 1;
                    Ok(AgentStep::Paused {
                        interrupt_id: format!("interrupt-{}", self.pause_count),
                        tool_name: "compile".to_string(),
                        tool_args: serde_json::json!({}),
                        message: "approve compile plan?".to_string(),
                    })
                }
                Some(decision) if !decision.approved => {
                    self.pause_count += 1;
                    Ok(AgentStep::Paused {
                        interrupt_id: format!("interrupt-{}", self.pause_count),
                        tool_name: "compile".to_string(),
                        tool_args: serde_json::json!({"revised": true}),
                        message: "revised plan, approve?".to_string(),
                    })
                }
                Some(_) => Ok(AgentStep::Done {
                    result: serde_json::Map::new(),
                    message: "compiled".to_string(),
                }),
            }
        }

        fn send_message(&mut self, _text: &str, _on_event: &mut dyn FnMut(ProgressEvent)) -> Result<AgentStep> {
            unreachable!("not exercised in this test")
        }
    }

    async fn drain(mut stream: EventStream) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn reject_then_approve_matches_scenario_s4() {
        let runner = CompilerRunner::new("alice", Box::new(ScriptedAgent { pause_count: 0 }));

        let first = drain(runner.run().unwrap()).await;
        assert!(matches!(first.last().unwrap(), ProgressEvent::HumanApprovalRequired { .. }));

        let second = drain(
            runner
                .resume(Decision {
                    approved: false,
                    modified_args: None,
                    feedback: Some("combine ch1+ch2".to_string()),
                })
                .unwrap(),
        )
        .await;
        assert!(matches!(second.last().unwrap(), ProgressEvent::HumanApprovalRequired { .. }));

        let third = drain(
            runner
                .resume(Decision {
                    approved: true,
                    modified_args: None,
                    feedback: None,
                })
                .unwrap(),
        )
        .await;
        assert!(matches!(third.last().unwrap(), ProgressEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn send_message_rejected_while_awaiting_decision() {
        let runner = CompilerRunner::new("alice", Box::new(ScriptedAgent { pause_count: 0 }));
        drain(runner.run().unwrap()).await;

        let err = runner.send_message("change course".to_string()).unwrap_err();
        assert!(matches!(err, DocsError::Protocol(_)));
    }

    #[tokio::test]
    async fn resume_rejected_outside_awaiting_decision() {
        let runner = CompilerRunner::new("alice", Box::new(ScriptedAgent { pause_count: 0 }));
        let err = runner
            .resume(Decision {
                approved: true,
                modified_args: None,
                feedback: None,
            })
            .unwrap_err();
        assert!(matches!(err, DocsError::Protocol(_)));
    }
}
