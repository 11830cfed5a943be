use std::collections::VecDeque;
use std::fmt;

use crate::domain::FieldId;

use super::session::PopupConfig;

/// Handle of one mounted popup surface. Each open mounts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupHandle(pub u64);

impl fmt::Display for PopupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "popup#{}", self.0)
    }
}

/// Popup lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupEvent {
    /// Before the popup mounts.
    Open { field: FieldId },
    /// After the popup mounted.
    Opened { field: FieldId, root: PopupHandle },
    /// Before the popup unmounts.
    Close { field: FieldId, root: PopupHandle },
    /// After the popup unmounted.
    Closed { field: FieldId },
}

impl PopupEvent {
    pub fn kind(&self) -> PopupEventKind {
        match self {
            PopupEvent::Open { .. } => PopupEventKind::Open,
            PopupEvent::Opened { .. } => PopupEventKind::Opened,
            PopupEvent::Close { .. } => PopupEventKind::Close,
            PopupEvent::Closed { .. } => PopupEventKind::Closed,
        }
    }

    pub fn field(&self) -> &FieldId {
        match self {
            PopupEvent::Open { field }
            | PopupEvent::Opened { field, .. }
            | PopupEvent::Close { field, .. }
            | PopupEvent::Closed { field } => field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopupEventKind {
    Open,
    Opened,
    Close,
    Closed,
}

impl PopupEventKind {
    pub fn name(self) -> &'static str {
        match self {
            PopupEventKind::Open => "popup.open",
            PopupEventKind::Opened => "popup.opened",
            PopupEventKind::Close => "popup.close",
            PopupEventKind::Closed => "popup.closed",
        }
    }
}

/// Control requests addressed to the popup session, posted on its [`EventBus`].
#[derive(Debug, Clone)]
pub enum PopupRequest {
    Open {
        field: FieldId,
        config: PopupConfig,
        return_focus: FieldId,
    },
    /// Without a field the popup closes unconditionally.
    Close { field: Option<FieldId> },
    IsOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&PopupEvent)>;

/// Notification bus of the popup.
///
/// Lifecycle events go out to listeners synchronously. Control requests are queued and consumed by
/// the owner of the popup session on its next tick.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Option<PopupEventKind>, Listener)>,
    next_id: u64,
    requests: VecDeque<PopupRequest>,
    popup_open: bool,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("requests", &self.requests.len())
            .field("popup_open", &self.popup_open)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to one kind of event.
    pub fn on(
        &mut self,
        kind: PopupEventKind,
        listener: impl FnMut(&PopupEvent) + 'static,
    ) -> ListenerId {
        self.register(Some(kind), Box::new(listener))
    }

    /// Subscribes to every event.
    pub fn on_any(&mut self, listener: impl FnMut(&PopupEvent) + 'static) -> ListenerId {
        self.register(None, Box::new(listener))
    }

    fn register(&mut self, kind: Option<PopupEventKind>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, kind, listener));
        id
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _, _)| *listener != id);
        self.listeners.len() != before
    }

    pub fn post(&mut self, request: PopupRequest) {
        self.requests.push_back(request);
    }

    pub(crate) fn take_requests(&mut self) -> Vec<PopupRequest> {
        self.requests.drain(..).collect()
    }

    /// Whether a popup is mounted, without waiting for a queued [`PopupRequest::IsOpen`].
    pub fn is_popup_open(&self) -> bool {
        self.popup_open
    }

    pub(crate) fn set_popup_open(&mut self, open: bool) {
        self.popup_open = open;
    }

    pub fn fire(&mut self, event: &PopupEvent) {
        let kind = event.kind();
        for (_, filter, listener) in &mut self.listeners {
            if filter.is_none_or(|filter| filter == kind) {
                listener(event);
            }
        }
    }
}
