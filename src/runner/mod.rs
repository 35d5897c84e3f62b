//! The Runner subsystem: three streaming executors sharing one bridge
//! (`bridge.rs`) and one event vocabulary (`crate::events::ProgressEvent`).
//!
//! Grounded on `original_source/src/core/runners.py`'s three classes
//! (`VideoManualRunner`, `ProjectCompilerRunner`, `ManualEditorRunner`) for
//! control flow, and on the teacher's preference for a shared trait over
//! per-type method presence checks (`SPEC_FULL.md` §9: "callers check for
//! capability rather than method presence").

pub mod bridge;
pub mod compiler;
pub mod editor;
pub mod pipeline;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio_stream::wrappers::ReceiverStream;

use crate::events::ProgressEvent;
use crate::runner::bridge::RunnerBridge;

/// An event stream paired with the `RunnerBridge` that feeds it.
///
/// The bridge must outlive the stream, not just the method that spawned
/// it: dropping it early would be harmless today (the worker thread runs
/// to completion regardless of whether anything is holding its
/// `JoinHandle`), but binding it here keeps that true by construction
/// rather than by accident, and gives a single place to extend lifecycle
/// handling (cancellation, explicit join) without touching every call
/// site.
pub struct EventStream {
    _bridge: RunnerBridge,
    inner: ReceiverStream<ProgressEvent>,
}

impl EventStream {
    pub(crate) fn new(bridge: RunnerBridge, inner: ReceiverStream<ProgressEvent>) -> Self {
        Self { _bridge: bridge, inner }
    }
}

impl Stream for EventStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// A decision fed back into the Compiler Runner's `resume` after a
/// `HumanApprovalRequired` event (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct Decision {
    pub approved: bool,
    pub modified_args: Option<serde_json::Value>,
    pub feedback: Option<String>,
}

/// A relay trait a TUI (or any other thin adapter) implements to consume
/// a runner's event stream without depending on the runner's internals —
/// the "event-relay trait boundary" `SPEC_FULL.md` §6 calls for in lieu
/// of a rendered UI in this crate.
pub trait ProgressSink: Send {
    fn on_event(&mut self, event: &ProgressEvent);
}
