//! Flow-local state: the ambient values that follow a logical flow of execution.
//!
//! The log context stack and the facade scope stack both live here. On a plain
//! thread the state is thread-local. Futures carry their own copy through
//! `FlowExt::in_current_flow()`, which installs it around every poll, so the state
//! survives `.await` points even when the task resumes on another worker thread.
//!
//! A `FlowSnapshot` is an immutable capture of the whole state; `replay` installs
//! it for the duration of a closure and always restores the caller's state.

use pin_project_lite::pin_project;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::context::Frame;
use crate::scope::ScopeFrame;

/// Everything that flows with the current logical execution.
///
/// Both stacks are persistent linked lists, so cloning is two `Arc` bumps.
#[derive(Clone, Default)]
pub(crate) struct FlowState {
    pub(crate) context: Option<Arc<Frame>>,
    pub(crate) scopes: Option<Arc<ScopeFrame>>,
}

thread_local! {
    static CURRENT: RefCell<FlowState> = RefCell::new(FlowState::default());
}

/// Clone the current state. Yields an empty state during thread teardown.
pub(crate) fn current() -> FlowState {
    CURRENT
        .try_with(|state| state.borrow().clone())
        .unwrap_or_default()
}

/// Install `state` and return the one it replaced.
pub(crate) fn replace(state: FlowState) -> FlowState {
    CURRENT
        .try_with(|current| std::mem::replace(&mut *current.borrow_mut(), state))
        .unwrap_or_default()
}

/// Mutate the current state in place.
pub(crate) fn update<R>(f: impl FnOnce(&mut FlowState) -> R) -> Option<R> {
    CURRENT.try_with(|state| f(&mut state.borrow_mut())).ok()
}

/// Immutable capture of the flow-local state at one point in time.
#[derive(Clone, Default)]
pub struct FlowSnapshot {
    state: FlowState,
}

impl FlowSnapshot {
    pub fn capture() -> Self {
        Self { state: current() }
    }

    /// A snapshot with no ambient state at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Run `f` with this snapshot installed as the current flow state.
    ///
    /// The caller's own state is restored when `f` returns or unwinds.
    pub fn replay<R>(&self, f: impl FnOnce() -> R) -> R {
        let _restore = RestoreOnDrop {
            previous: Some(replace(self.state.clone())),
        };
        f()
    }

    pub fn is_empty(&self) -> bool {
        self.state.context.is_none() && self.state.scopes.is_none()
    }
}

impl std::fmt::Debug for FlowSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowSnapshot")
            .field("has_context", &self.state.context.is_some())
            .field("has_scopes", &self.state.scopes.is_some())
            .finish()
    }
}

struct RestoreOnDrop {
    previous: Option<FlowState>,
}

impl Drop for RestoreOnDrop {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            replace(previous);
        }
    }
}

pin_project! {
    /// A future that runs every poll inside its own flow state.
    ///
    /// Created by `FlowExt::in_current_flow` or `FlowExt::in_flow`.
    pub struct WithFlow<F> {
        #[pin]
        inner: F,
        state: FlowState,
    }
}

impl<F: Future> Future for WithFlow<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let outer = replace(std::mem::take(this.state));
        // Whatever the task left installed is its state for the next poll
        let _swap_back = SwapBack {
            slot: this.state,
            outer: Some(outer),
        };
        this.inner.poll(cx)
    }
}

struct SwapBack<'a> {
    slot: &'a mut FlowState,
    outer: Option<FlowState>,
}

impl Drop for SwapBack<'_> {
    fn drop(&mut self) {
        if let Some(outer) = self.outer.take() {
            *self.slot = replace(outer);
        }
    }
}

/// Attach flow-local state to a future.
pub trait FlowExt: Future + Sized {
    /// Carry the caller's current flow state into this future.
    fn in_current_flow(self) -> WithFlow<Self> {
        WithFlow {
            inner: self,
            state: current(),
        }
    }

    /// Run this future inside the state captured by `snapshot`.
    fn in_flow(self, snapshot: &FlowSnapshot) -> WithFlow<Self> {
        WithFlow {
            inner: self,
            state: snapshot.state.clone(),
        }
    }
}

impl<F: Future> FlowExt for F {}
