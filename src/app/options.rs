use std::{sync::Arc, time::Duration};

use super::keymap::{self, KeymapStore};

#[derive(Debug, Clone)]
pub struct PanelOptions {
    pub tick_rate: Duration,
    /// Quiet period after the last edit before a field commits its value.
    pub debounce: Duration,
    pub confirm_exit: bool,
    pub show_help: bool,
    pub(crate) keymap_store: Arc<KeymapStore>,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            tick_rate: Duration::from_millis(50),
            debounce: Duration::from_millis(300),
            confirm_exit: true,
            show_help: true,
            keymap_store: keymap::default_store(),
        }
    }
}

impl PanelOptions {
    pub fn with_tick_rate(mut self, tick_rate: Duration) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_help(mut self, show: bool) -> Self {
        self.show_help = show;
        self
    }

    pub fn with_confirm_exit(mut self, confirm: bool) -> Self {
        self.confirm_exit = confirm;
        self
    }

    /// Replaces the embedded keymap with a JSON keymap of the same shape.
    pub fn with_keymap_json(mut self, source: &str) -> anyhow::Result<Self> {
        self.keymap_store = Arc::new(KeymapStore::parse(source)?);
        Ok(self)
    }
}
