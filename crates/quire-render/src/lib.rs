// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// quire-render — Background thumbnail rendering for Quire.
//
// A worker thread renders an immutable snapshot of the page sequence and
// posts bitmaps back over a channel; the owner thread consumes them between
// interactive events. Cancellation is cooperative: a shared flag plus a join.

pub mod thumbnail;

pub use thumbnail::{
    RenderItem, RenderMessage, RenderOutcome, RenderPassId, RenderRequest, RenderState, Renderer,
};
