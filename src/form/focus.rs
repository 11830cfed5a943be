/// Where the caret should land when a surface receives focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Start,
    End,
    Offset(usize),
}

impl FocusTarget {
    /// Caret position inside a document of `len` characters.
    pub fn resolve(self, len: usize) -> usize {
        match self {
            FocusTarget::Start => 0,
            FocusTarget::End => len,
            FocusTarget::Offset(offset) => offset.min(len),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusRequest {
    #[default]
    Idle,
    Pending(FocusTarget),
}

/// Holds at most one focus request until the active surface reports readiness.
#[derive(Debug, Clone, Default)]
pub struct FocusCoordinator {
    request: FocusRequest,
    ready: bool,
}

impl FocusCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target when it can be applied right away; otherwise buffers it, replacing any
    /// earlier pending request.
    pub fn request(&mut self, target: FocusTarget) -> Option<FocusTarget> {
        if self.ready {
            self.request = FocusRequest::Idle;
            Some(target)
        } else {
            self.request = FocusRequest::Pending(target);
            None
        }
    }

    /// The surface finished mounting. Yields the buffered request exactly once.
    pub fn surface_ready(&mut self) -> Option<FocusTarget> {
        self.ready = true;
        match std::mem::take(&mut self.request) {
            FocusRequest::Idle => None,
            FocusRequest::Pending(target) => Some(target),
        }
    }

    /// A new surface is being mounted; requests are buffered until it is ready.
    pub fn surface_unmounted(&mut self) {
        self.ready = false;
    }

    pub fn cancel(&mut self) {
        self.request = FocusRequest::Idle;
        self.ready = false;
    }

    pub fn pending(&self) -> FocusRequest {
        self.request
    }
}
