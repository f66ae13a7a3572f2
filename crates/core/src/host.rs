//! Host runtime interface
//!
//! The host owns the refresh callback and the event listener registry. A
//! [`Background`](crate::Background) only ever holds the ids it was handed,
//! so any number of instances can share one host without globals.

use rustc_hash::FxHashMap;
use tracing::debug;

/// Handle to a pending frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Handle to a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Events a mounted background listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    PointerMove,
    TouchMove,
    PointerLeave,
    Resize,
}

/// Refresh scheduling and listener registration provided by the embedder.
pub trait Host {
    /// Ask for one tick on the next display refresh.
    fn request_frame(&mut self) -> FrameRequest;

    /// Drop a pending request. Unknown or already-fired requests are ignored.
    fn cancel_frame(&mut self, request: FrameRequest);

    fn subscribe(&mut self, kind: ListenerKind) -> ListenerId;

    /// Remove a listener. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: ListenerId);
}

/// Host driven by explicit calls, used for headless embedding and tests.
///
/// Frame requests stay pending until the embedder takes them with
/// [`ManualHost::take_frame`] and calls `tick`.
#[derive(Debug, Default)]
pub struct ManualHost {
    next_id: u64,
    pending: Option<FrameRequest>,
    listeners: FxHashMap<ListenerId, ListenerKind>,
    requested: u64,
    cancelled: u64,
}

impl ManualHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Consume the pending frame request, if any.
    pub fn take_frame(&mut self) -> Option<FrameRequest> {
        self.pending.take()
    }

    #[must_use]
    pub fn has_pending_frame(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_listening(&self, kind: ListenerKind) -> bool {
        self.listeners.values().any(|&k| k == kind)
    }

    /// Total frame requests made so far.
    #[must_use]
    pub fn requested_frames(&self) -> u64 {
        self.requested
    }

    /// Total pending requests cancelled so far.
    #[must_use]
    pub fn cancelled_frames(&self) -> u64 {
        self.cancelled
    }
}

impl Host for ManualHost {
    fn request_frame(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next());
        // A newer request supersedes an older one
        self.pending = Some(request);
        self.requested += 1;
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
            self.cancelled += 1;
        } else {
            debug!("Ignoring cancel of stale frame request {:?}", request);
        }
    }

    fn subscribe(&mut self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next());
        self.listeners.insert(id, kind);
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        if self.listeners.remove(&id).is_none() {
            debug!("Ignoring unsubscribe of unknown listener {:?}", id);
        }
    }
}

impl<H: Host + ?Sized> Host for &mut H {
    fn request_frame(&mut self) -> FrameRequest {
        (**self).request_frame()
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        (**self).cancel_frame(request);
    }

    fn subscribe(&mut self, kind: ListenerKind) -> ListenerId {
        (**self).subscribe(kind)
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        (**self).unsubscribe(id);
    }
}
