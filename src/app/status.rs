#[derive(Debug, Clone)]
pub struct StatusLine {
    message: String,
}

pub const READY_STATUS: &str = "Ready. Press Ctrl+S to save, Ctrl+E to toggle expression mode.";

impl Default for StatusLine {
    fn default() -> Self {
        Self {
            message: READY_STATUS.to_string(),
        }
    }
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_raw(&mut self, msg: impl Into<String>) {
        self.message = msg.into();
    }

    pub fn ready(&mut self) {
        self.message = READY_STATUS.to_string();
    }

    pub fn editing(&mut self, label: &str) {
        self.message = format!("Editing {label}");
    }

    pub fn element(&mut self, id: &str, kind: Option<&str>) {
        self.message = match kind {
            Some(kind) => format!("Element {id} ({kind})"),
            None => format!("Element {id}"),
        };
    }

    pub fn mode_switched(&mut self, label: &str, expression: bool) {
        let mode = if expression { "expression" } else { "plain text" };
        self.message = format!("{label} switched to {mode}");
    }

    pub fn popup_opened(&mut self, title: &str) {
        self.message = format!("Editing {title}. Esc closes the editor.");
    }

    pub fn saved(&mut self) {
        self.message = "Properties saved. Press Ctrl+Q to exit.".to_string();
    }

    pub fn issues_remaining(&mut self, count: usize) {
        self.message = format!("{count} field error(s) remaining");
    }

    pub fn pending_exit(&mut self) {
        self.message = "Unsaved changes. Press Ctrl+Q again to quit without saving.".to_string();
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
