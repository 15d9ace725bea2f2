// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cancellable background thumbnail renderer.
//
// One pass renders a fixed snapshot of (page sequence, document list) at a
// given scale. Pages complete outward from the start index so the page
// nearest the viewport arrives first. At most one pass runs at a time;
// starting a new pass cancels and joins the previous one, so no two workers
// ever read a sequence the owner thread is mutating.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use quire_core::{Bitmap, Page};
use quire_document::DocumentEngine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Identifies one render pass, so bitmaps from a superseded pass can be
/// recognised and discarded by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderPassId(pub Uuid);

impl RenderPassId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RenderPassId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RenderPassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a pass renders for one sequence position.
#[derive(Debug, Clone)]
pub struct RenderItem {
    /// Position in the output sequence.
    pub page_index: usize,
    /// 1-based index into the engine list.
    pub source_file: usize,
    /// 1-based page number within the source.
    pub source_page: u32,
}

/// An immutable snapshot of everything a pass needs.
///
/// Engines are shared by `Arc`; the worker only reads them.
#[derive(Clone)]
pub struct RenderRequest {
    pub items: Vec<RenderItem>,
    pub engines: Vec<Arc<dyn DocumentEngine>>,
    pub scale: f64,
    /// Sequence index to render first; rendering alternates outward from it.
    pub start: usize,
}

impl RenderRequest {
    pub fn new(
        items: Vec<RenderItem>,
        engines: Vec<Arc<dyn DocumentEngine>>,
        scale: f64,
        start: usize,
    ) -> Self {
        Self {
            items,
            engines,
            scale,
            start,
        }
    }

    /// Snapshot a page sequence into render items.
    pub fn from_pages(
        pages: &[Page],
        engines: Vec<Arc<dyn DocumentEngine>>,
        scale: f64,
        start: usize,
    ) -> Self {
        let items = pages
            .iter()
            .enumerate()
            .map(|(page_index, page)| RenderItem {
                page_index,
                source_file: page.source_file,
                source_page: page.source_page,
            })
            .collect();
        Self::new(items, engines, scale, start)
    }
}

/// Messages posted to the owner thread.
#[derive(Debug)]
pub enum RenderMessage {
    /// One page's bitmap is ready.
    Thumbnail {
        pass: RenderPassId,
        page_index: usize,
        bitmap: Bitmap,
        scale: f64,
    },
    /// The pass is over, by completion or cancellation.
    Finished {
        pass: RenderPassId,
        outcome: RenderOutcome,
    },
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOutcome {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Observable pass state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Running,
    Cancelled,
    Completed,
}

const STATE_RUNNING: u8 = 0;
const STATE_CANCELLED: u8 = 1;
const STATE_COMPLETED: u8 = 2;

struct PassHandle {
    pass: RenderPassId,
    cancel: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    join: Option<JoinHandle<()>>,
}

impl PassHandle {
    fn join(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!(pass = %self.pass, "render worker panicked");
            }
            debug!(pass = %self.pass, "render pass joined");
        }
    }
}

/// Owns the single active render pass and the message channel.
pub struct Renderer {
    sender: Sender<RenderMessage>,
    receiver: Receiver<RenderMessage>,
    active: Option<PassHandle>,
}

impl Renderer {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            active: None,
        }
    }

    /// The channel the owner thread drains between interactive events.
    pub fn messages(&self) -> Receiver<RenderMessage> {
        self.receiver.clone()
    }

    /// Begin a new pass, first cancelling and joining any previous one.
    #[instrument(skip_all, fields(pages = request.items.len(), start = request.start))]
    pub fn start(&mut self, request: RenderRequest) -> RenderPassId {
        self.cancel();

        let pass = RenderPassId::new();
        let cancel = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(STATE_RUNNING));
        let sender = self.sender.clone();

        let worker_cancel = Arc::clone(&cancel);
        let worker_state = Arc::clone(&state);
        let join = std::thread::spawn(move || {
            run_pass(pass, request, sender, worker_cancel, worker_state);
        });

        info!(%pass, "render pass started");
        self.active = Some(PassHandle {
            pass,
            cancel,
            state,
            join: Some(join),
        });
        pass
    }

    /// Cancel the active pass and block until its worker exits; the wait is
    /// bounded by one page's render time. Returns whether a pass was active.
    pub fn cancel(&mut self) -> bool {
        let Some(handle) = self.active.as_mut() else {
            return false;
        };
        handle.cancel.store(true, Ordering::Relaxed);
        handle.join();
        true
    }

    /// Wait for the active pass to run to completion without cancelling it.
    pub fn wait(&mut self) {
        if let Some(handle) = self.active.as_mut() {
            handle.join();
        }
    }

    /// Current pass state; `Idle` when nothing has been started.
    pub fn state(&self) -> RenderState {
        match &self.active {
            None => RenderState::Idle,
            Some(handle) => match handle.state.load(Ordering::Relaxed) {
                STATE_CANCELLED => RenderState::Cancelled,
                STATE_COMPLETED => RenderState::Completed,
                _ => RenderState::Running,
            },
        }
    }

    /// Id of the active (or last joined) pass.
    pub fn active_pass(&self) -> Option<RenderPassId> {
        self.active.as_ref().map(|h| h.pass)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Page order for a pass: strictly sequential from a zero start, otherwise
/// the start page first, then alternating outward below/above it.
fn outward_order(start: usize, len: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    if start == 0 {
        return (0..len).collect();
    }
    let start = start.min(len - 1);
    let mut order = Vec::with_capacity(len);
    order.push(start);
    let mut step = 1;
    loop {
        let below = start.checked_sub(step);
        let above = start + step;
        if below.is_none() && above >= len {
            break;
        }
        if let Some(below) = below {
            order.push(below);
        }
        if above < len {
            order.push(above);
        }
        step += 1;
    }
    order
}

fn run_pass(
    pass: RenderPassId,
    request: RenderRequest,
    sender: Sender<RenderMessage>,
    cancel: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
) {
    let mut completed = 0;
    let mut failed = 0;
    let mut cancelled = false;

    for index in outward_order(request.start, request.items.len()) {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        let item = &request.items[index];

        let engine = item
            .source_file
            .checked_sub(1)
            .and_then(|i| request.engines.get(i));
        let result = match engine {
            Some(engine) => engine.render(item.source_page, request.scale),
            None => {
                failed += 1;
                warn!(%pass, source = item.source_file, "no engine for source document");
                continue;
            }
        };

        // A page that fails to render is logged and skipped; the pass goes on.
        match result {
            Ok(bitmap) => {
                completed += 1;
                let _ = sender.send(RenderMessage::Thumbnail {
                    pass,
                    page_index: item.page_index,
                    bitmap,
                    scale: request.scale,
                });
            }
            Err(err) => {
                failed += 1;
                warn!(%pass, page = item.source_page, %err, "page render failed");
            }
        }
    }

    state.store(
        if cancelled {
            STATE_CANCELLED
        } else {
            STATE_COMPLETED
        },
        Ordering::Relaxed,
    );
    info!(%pass, completed, failed, cancelled, "render pass finished");
    let _ = sender.send(RenderMessage::Finished {
        pass,
        outcome: RenderOutcome {
            completed,
            failed,
            cancelled,
        },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::error::{QuireError, Result as QuireResult};
    use quire_core::Dims;
    use std::time::Duration;

    /// Engine that renders fixed-size bitmaps, optionally failing on chosen
    /// pages or sleeping to simulate slow sources.
    struct StubEngine {
        pages: u32,
        fail_pages: Vec<u32>,
        delay: Duration,
    }

    impl StubEngine {
        fn fast(pages: u32) -> Arc<dyn DocumentEngine> {
            Arc::new(Self {
                pages,
                fail_pages: Vec::new(),
                delay: Duration::ZERO,
            })
        }

        fn failing(pages: u32, fail_pages: Vec<u32>) -> Arc<dyn DocumentEngine> {
            Arc::new(Self {
                pages,
                fail_pages,
                delay: Duration::ZERO,
            })
        }

        fn slow(pages: u32, delay: Duration) -> Arc<dyn DocumentEngine> {
            Arc::new(Self {
                pages,
                fail_pages: Vec::new(),
                delay,
            })
        }
    }

    impl DocumentEngine for StubEngine {
        fn page_count(&self) -> u32 {
            self.pages
        }

        fn page_size(&self, _page: u32) -> QuireResult<Dims> {
            Ok(Dims::new(10.0, 10.0))
        }

        fn render(&self, page: u32, _scale: f64) -> QuireResult<Bitmap> {
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            if self.fail_pages.contains(&page) {
                return Err(QuireError::Render {
                    page,
                    detail: "stub failure".to_string(),
                });
            }
            Ok(Bitmap::new(4, 4))
        }
    }

    fn request(pages: u32, engine: Arc<dyn DocumentEngine>, start: usize) -> RenderRequest {
        let items = (0..pages)
            .map(|n| RenderItem {
                page_index: n as usize,
                source_file: 1,
                source_page: n + 1,
            })
            .collect();
        RenderRequest::new(items, vec![engine], 0.25, start)
    }

    /// Drain messages for one pass until its Finished marker arrives.
    fn drain(
        receiver: &Receiver<RenderMessage>,
        pass: RenderPassId,
    ) -> (Vec<usize>, RenderOutcome) {
        let mut indices = Vec::new();
        loop {
            let message = receiver
                .recv_timeout(Duration::from_secs(10))
                .expect("renderer message");
            match message {
                RenderMessage::Thumbnail {
                    pass: p,
                    page_index,
                    ..
                } if p == pass => indices.push(page_index),
                RenderMessage::Finished { pass: p, outcome } if p == pass => {
                    return (indices, outcome);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn zero_start_renders_in_sequence_order() {
        assert_eq!(outward_order(0, 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn nonzero_start_alternates_outward() {
        assert_eq!(outward_order(2, 5), vec![2, 1, 3, 0, 4]);
        assert_eq!(outward_order(4, 5), vec![4, 3, 2, 1, 0]);
        assert_eq!(outward_order(1, 2), vec![1, 0]);
    }

    #[test]
    fn start_beyond_the_end_clamps() {
        assert_eq!(outward_order(7, 3), vec![2, 1, 0]);
        assert_eq!(outward_order(3, 0), Vec::<usize>::new());
    }

    #[test]
    fn completion_order_prioritises_the_viewport_page() {
        let mut renderer = Renderer::new();
        let receiver = renderer.messages();
        let pass = renderer.start(request(5, StubEngine::fast(5), 2));

        let (indices, outcome) = drain(&receiver, pass);
        assert_eq!(indices, vec![2, 1, 3, 0, 4]);
        assert_eq!(outcome.completed, 5);
        assert_eq!(outcome.failed, 0);
        assert!(!outcome.cancelled);
        assert_eq!(renderer.state(), RenderState::Completed);
    }

    #[test]
    fn a_failing_page_is_skipped_not_fatal() {
        let mut renderer = Renderer::new();
        let receiver = renderer.messages();
        let pass = renderer.start(request(3, StubEngine::failing(3, vec![2]), 0));

        let (indices, outcome) = drain(&receiver, pass);
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(outcome.completed, 2);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn missing_engine_counts_as_failure() {
        let mut renderer = Renderer::new();
        let receiver = renderer.messages();
        let items = vec![RenderItem {
            page_index: 0,
            source_file: 2,
            source_page: 1,
        }];
        let pass = renderer.start(RenderRequest::new(
            items,
            vec![StubEngine::fast(1)],
            0.25,
            0,
        ));

        let (indices, outcome) = drain(&receiver, pass);
        assert!(indices.is_empty());
        assert_eq!(outcome.failed, 1);
    }

    #[test]
    fn cancel_stops_the_pass_within_one_page() {
        let mut renderer = Renderer::new();
        let receiver = renderer.messages();
        let pass = renderer.start(request(
            50,
            StubEngine::slow(50, Duration::from_millis(20)),
            0,
        ));

        // Wait for the first page, then pull the plug.
        let first = receiver
            .recv_timeout(Duration::from_secs(10))
            .expect("first thumbnail");
        assert!(matches!(first, RenderMessage::Thumbnail { .. }));
        assert!(renderer.cancel());

        let (_, outcome) = drain(&receiver, pass);
        assert!(outcome.cancelled);
        assert!(outcome.completed < 50);
    }

    #[test]
    fn starting_a_new_pass_supersedes_the_old_one() {
        let mut renderer = Renderer::new();
        let receiver = renderer.messages();
        let first = renderer.start(request(
            50,
            StubEngine::slow(50, Duration::from_millis(10)),
            0,
        ));
        let second = renderer.start(request(3, StubEngine::fast(3), 0));
        assert_ne!(first, second);

        // The first pass ended before the second began.
        let (_, first_outcome) = drain(&receiver, first);
        assert!(first_outcome.cancelled || first_outcome.completed == 50);

        let (indices, outcome) = drain(&receiver, second);
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(outcome.completed, 3);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn cancel_without_a_pass_is_a_no_op() {
        let mut renderer = Renderer::new();
        assert!(!renderer.cancel());
        assert_eq!(renderer.state(), RenderState::Idle);
    }

    #[test]
    fn request_snapshot_from_pages_carries_indices() {
        let pages = vec![
            Page::new(1, 3, Dims::new(10.0, 10.0)),
            Page::new(2, 1, Dims::new(10.0, 10.0)),
        ];
        let request = RenderRequest::from_pages(pages.as_slice(), vec![], 0.5, 1);
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[0].source_file, 1);
        assert_eq!(request.items[0].source_page, 3);
        assert_eq!(request.items[1].source_file, 2);
        assert_eq!(request.start, 1);
    }
}
