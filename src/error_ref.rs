//! Shared error handles with reference identity.
//!
//! An `ErrorRef` wraps an error in an `Arc`. Its identity is the address of the
//! shared allocation, so two structurally equal errors are still two identities,
//! while every clone of one `ErrorRef` is the same identity.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Weak};

pub type DynError = dyn StdError + Send + Sync + 'static;

/// Reference identity of a shared error allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorIdentity(usize);

impl ErrorIdentity {
    fn of_arc(error: &Arc<DynError>) -> Self {
        Self(Arc::as_ptr(error).cast::<()>() as usize)
    }

    /// Identity of one link of a cause chain.
    ///
    /// Only shared links (`ErrorRef` or `Arc<dyn Error + Send + Sync>`) have an identity.
    /// A cause held by value was never raised on its own and yields `None`.
    pub fn of_link(error: &(dyn StdError + 'static)) -> Option<Self> {
        if let Some(shared) = error.downcast_ref::<ErrorRef>() {
            return Some(shared.identity());
        }
        error.downcast_ref::<Arc<DynError>>().map(Self::of_arc)
    }
}

/// A cheaply clonable, shared error.
///
/// Wrapping errors should hold their cause as an `ErrorRef` (or an
/// `Arc<dyn Error + Send + Sync>`) and return it from `source()`; the cause chain
/// walk then resolves the cause's identity and finds what was recorded for it.
#[derive(Clone)]
pub struct ErrorRef(Arc<DynError>);

impl ErrorRef {
    /// Share `error`.
    ///
    /// An `ErrorRef` or `Arc<dyn Error + Send + Sync>` passed in keeps its identity:
    /// the existing allocation is shared rather than wrapped again.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let any: &dyn Any = &error;
        if let Some(existing) = any.downcast_ref::<ErrorRef>() {
            return existing.clone();
        }
        if let Some(shared) = any.downcast_ref::<Arc<DynError>>() {
            return Self::from_arc(Arc::clone(shared));
        }
        Self(Arc::new(error))
    }

    pub fn from_arc(error: Arc<DynError>) -> Self {
        Self(error)
    }

    pub fn identity(&self) -> ErrorIdentity {
        ErrorIdentity::of_arc(&self.0)
    }

    pub fn ptr_eq(&self, other: &ErrorRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_error(&self) -> &(dyn StdError + 'static) {
        &*self.0
    }

    pub fn as_arc(&self) -> &Arc<DynError> {
        &self.0
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    pub(crate) fn downgrade(&self) -> Weak<DynError> {
        Arc::downgrade(&self.0)
    }

    /// Walk this error and its causes, outermost first.
    pub fn chain(&self) -> CauseChain<'_> {
        CauseChain::new(self)
    }
}

impl fmt::Debug for ErrorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for ErrorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for ErrorRef {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Arc<DynError>> for ErrorRef {
    fn from(error: Arc<DynError>) -> Self {
        Self(error)
    }
}

impl From<Box<DynError>> for ErrorRef {
    fn from(error: Box<DynError>) -> Self {
        Self(Arc::from(error))
    }
}

/// One step of a cause chain.
#[derive(Clone, Copy)]
pub struct ChainLink<'a> {
    pub error: &'a (dyn StdError + 'static),
    pub identity: Option<ErrorIdentity>,
}

/// Iterator over an error and its `source()` chain, outermost first.
///
/// Stops at the root cause, after `max_depth` links, or when an identity repeats.
/// Cyclic chains are a caller error; the walk just refuses to loop on them.
pub struct CauseChain<'a> {
    next: Option<ChainLink<'a>>,
    seen: Vec<ErrorIdentity>,
    remaining: usize,
    truncated: bool,
}

impl<'a> CauseChain<'a> {
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    fn new(root: &'a ErrorRef) -> Self {
        Self {
            next: Some(ChainLink {
                error: root.as_error(),
                identity: Some(root.identity()),
            }),
            seen: Vec::new(),
            remaining: Self::DEFAULT_MAX_DEPTH,
            truncated: false,
        }
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.remaining = depth;
        self
    }

    /// Whether the walk stopped early on the depth bound or a repeated identity.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

impl<'a> Iterator for CauseChain<'a> {
    type Item = ChainLink<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.next.take()?;

        if self.remaining == 0 {
            self.truncated = true;
            return None;
        }
        if let Some(identity) = link.identity {
            if self.seen.contains(&identity) {
                self.truncated = true;
                return None;
            }
            self.seen.push(identity);
        }
        self.remaining -= 1;

        self.next = link.error.source().map(|error| ChainLink {
            error,
            identity: ErrorIdentity::of_link(error),
        });
        Some(link)
    }
}
