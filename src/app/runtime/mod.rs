use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use indexmap::IndexMap;
use ratatui::layout::{Position, Rect};
use tracing::debug;

use crate::{
    domain::{FieldDefinition, FieldId, PanelDocument, PopupLink},
    form::{ClipboardData, FocusTarget, Validate},
    lsp::{EditorEvent, LanguageConnector},
    popup::{PopupKeyOutcome, PopupRequest, PopupSession},
    presentation::{self, UiContext},
};

use super::{
    input::{Dispatch, InputRouter, KeyAction},
    keymap::KeymapContext,
    options::PanelOptions,
    status::StatusLine,
    store::{PanelValues, PropertyStore},
    terminal::TerminalGuard,
};

mod fields;

use fields::FieldSet;

pub(crate) const READ_ONLY_MESSAGE: &str = "Field is read-only.";

pub(crate) struct App {
    title: Option<String>,
    definitions: Vec<FieldDefinition>,
    popup_links: IndexMap<String, Vec<PopupLink>>,
    validators: HashMap<FieldId, Rc<dyn Validate>>,
    connector: Rc<dyn LanguageConnector>,
    store: PropertyStore,
    fields: FieldSet,
    popup: PopupSession,
    clipboard: ClipboardData,
    anchors: Vec<Position>,
    options: PanelOptions,
    status: StatusLine,
    input_router: InputRouter,
    exit_armed: bool,
    should_quit: bool,
    result: Option<PanelValues>,
}

impl App {
    pub fn new(
        document: PanelDocument,
        title: Option<String>,
        options: PanelOptions,
        connector: Rc<dyn LanguageConnector>,
        validators: HashMap<FieldId, Rc<dyn Validate>>,
    ) -> Result<Self> {
        document.check()?;
        let definitions = document
            .fields
            .iter()
            .map(|field| {
                let mut field = field.clone();
                field.language = document.language_for(&field);
                field
            })
            .collect::<Vec<_>>();
        let store = PropertyStore::new(document.elements);
        let element = store
            .current()
            .ok_or_else(|| anyhow!("document declares no elements to edit"))?;
        let fields = FieldSet::mount(
            &definitions,
            element,
            &connector,
            &validators,
            options.debounce,
        )?;
        let input_router = InputRouter::new(options.keymap_store.clone());
        Ok(Self {
            title: title.or(document.title),
            definitions,
            popup_links: document.popup_links,
            validators,
            connector,
            store,
            fields,
            popup: PopupSession::new(),
            clipboard: ClipboardData::new(),
            anchors: Vec::new(),
            options,
            status: StatusLine::new(),
            input_router,
            exit_armed: false,
            should_quit: false,
            result: None,
        })
    }

    pub fn run(&mut self) -> Result<PanelValues> {
        let mut terminal = TerminalGuard::new()?;
        while !self.should_quit {
            self.tick(Instant::now());
            terminal.draw(|frame| self.draw(frame))?;
            if !event::poll(self.options.tick_rate)? {
                continue;
            }
            match event::read()? {
                Event::Key(key) => self.handle_key(key, Instant::now()),
                Event::Paste(text) => self.handle_paste(&text, Instant::now()),
                Event::Resize(width, height) => {
                    terminal.resize(Rect::new(0, 0, width, height))?;
                }
                Event::Mouse(_) | Event::FocusGained | Event::FocusLost => {}
            }
        }

        self.fields.unmount();
        self.popup.close(None);
        if let Some(values) = self.result.take() {
            Ok(values)
        } else {
            Err(anyhow!("user exited without saving"))
        }
    }

    pub(crate) fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let help = self.help_text();
        self.anchors = presentation::draw(
            frame,
            UiContext {
                title: self.title.as_deref(),
                element: self.store.current(),
                element_position: (self.store.current_index(), self.store.len()),
                fields: self.fields.controllers(),
                focused: self.fields.focused_index(),
                popup: self.popup.is_open().then_some(&self.popup),
                status_message: self.status.message(),
                dirty: self.store.is_dirty(),
                error_count: self.error_count(),
                help: help.as_deref(),
            },
        );
    }

    fn help_text(&self) -> Option<String> {
        if !self.options.show_help {
            return None;
        }
        let context = if self.popup.is_open() {
            KeymapContext::Popup
        } else {
            KeymapContext::Panel
        };
        self.input_router.help_text(context)
    }

    fn error_count(&self) -> usize {
        self.fields
            .controllers()
            .iter()
            .filter(|controller| controller.displayed_error().is_some())
            .count()
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.popup.is_open() {
            self.handle_popup_key(key, now);
            return;
        }
        // Open suggestion lists own Esc and the arrow keys.
        if self
            .fields
            .focused()
            .is_some_and(|controller| controller.completion_active())
        {
            self.handle_field_input(&key, now);
            return;
        }
        match self.input_router.route(&key, KeymapContext::Panel) {
            Dispatch::Action(action) => self.handle_action(action, now),
            Dispatch::Input(event) => self.handle_field_input(&event, now),
        }
    }

    fn handle_popup_key(&mut self, key: KeyEvent, now: Instant) {
        match self.input_router.route(&key, KeymapContext::Popup) {
            Dispatch::Action(action) => self.handle_action(action, now),
            Dispatch::Input(event) => {
                let outcome = self.popup.handle_key(&event);
                self.route_popup_events(now);
                if outcome == PopupKeyOutcome::Closed {
                    self.status.ready();
                }
            }
        }
    }

    fn handle_field_input(&mut self, key: &KeyEvent, now: Instant) {
        let Some(controller) = self.fields.focused_mut() else {
            return;
        };
        if controller.is_popup_owned() {
            return;
        }
        if controller.field().disabled {
            if matches!(key.code, KeyCode::Char(_) | KeyCode::Backspace | KeyCode::Delete) {
                let id = controller.id().clone();
                controller.set_temporary_error(&id, Some(READ_ONLY_MESSAGE.to_string()));
            }
            return;
        }
        let before = controller.buffer().to_string();
        let consumed = controller.handle_key(key, now);
        if controller.buffer() != before {
            self.exit_armed = false;
            let label = controller.field().label.clone();
            self.status.editing(&label);
        }
        if !consumed {
            match key.code {
                KeyCode::Up => self.fields.step(-1),
                KeyCode::Down => self.fields.step(1),
                _ => {}
            }
        }
    }

    pub(crate) fn handle_action(&mut self, action: KeyAction, now: Instant) {
        if !matches!(action, KeyAction::Quit) {
            self.exit_armed = false;
        }
        match action {
            KeyAction::Save => self.on_save(),
            KeyAction::Quit => self.on_exit(),
            KeyAction::Dismiss => {
                if let Some(controller) = self.fields.focused_mut() {
                    let id = controller.id().clone();
                    controller.set_temporary_error(&id, None);
                }
                self.status.ready();
            }
            KeyAction::FieldStep(delta) => self.fields.step(delta),
            KeyAction::ElementStep(delta) => {
                if let Err(err) = self.switch_element(delta) {
                    self.status.set_raw(err.to_string());
                }
            }
            KeyAction::ToggleExpression => self.toggle_focused(now),
            KeyAction::OpenPopup => self.open_popup(),
            KeyAction::ClosePopup => {
                self.popup.events().post(PopupRequest::Close { field: None });
                if self.consume_popup_requests() {
                    self.status.ready();
                }
            }
            KeyAction::Copy => {
                if let Some(controller) = self.fields.focused() {
                    self.clipboard.clear();
                    controller.on_copy(&mut self.clipboard);
                    self.status.set_raw("Copied.");
                }
            }
            KeyAction::Cut => {
                if let Some(controller) = self.fields.focused_mut() {
                    self.clipboard.clear();
                    controller.on_cut(&mut self.clipboard, now);
                    self.status.set_raw("Cut.");
                }
            }
            KeyAction::Paste => {
                let data = self.clipboard.clone();
                self.paste(&data, now);
            }
            KeyAction::Undo => {
                self.fields.flush(&mut self.store);
                let restored = self.store.undo();
                self.apply_restored(restored, "Nothing to undo.");
            }
            KeyAction::Redo => {
                let restored = self.store.redo();
                self.apply_restored(restored, "Nothing to redo.");
            }
        }
    }

    /// Terminal paste. Text matching the last in-panel copy keeps its expression format.
    pub(crate) fn handle_paste(&mut self, text: &str, now: Instant) {
        if self.popup.is_open() {
            self.popup.insert_text(text);
            self.route_popup_events(now);
            return;
        }
        let data = if self.clipboard.text() == Some(text) {
            self.clipboard.clone()
        } else {
            ClipboardData::with_text(text)
        };
        self.paste(&data, now);
    }

    fn paste(&mut self, data: &ClipboardData, now: Instant) {
        let Some(controller) = self.fields.focused_mut() else {
            return;
        };
        if controller.field().disabled {
            let id = controller.id().clone();
            controller.set_temporary_error(&id, Some(READ_ONLY_MESSAGE.to_string()));
            return;
        }
        if controller.on_paste(data, now) {
            self.exit_armed = false;
        }
    }

    fn apply_restored(&mut self, restored: Option<(FieldId, Option<String>)>, empty: &str) {
        let Some((field, value)) = restored else {
            self.status.set_raw(empty);
            return;
        };
        if let Some(controller) = self.fields.get_mut(&field) {
            controller.sync_external(value.as_deref());
            let display = controller.display().to_string();
            if controller.mode().is_expression() {
                self.popup.sync_value(&field, &display);
            } else {
                self.popup.close(Some(&field));
            }
        }
        self.status.ready();
    }

    fn toggle_focused(&mut self, now: Instant) {
        let Some(controller) = self.fields.focused_mut() else {
            return;
        };
        if !controller.toggle_mode(now) {
            self.status
                .set_raw(format!("{} cannot switch modes", controller.field().label));
            return;
        }
        let expression = controller.mode().is_expression();
        let label = controller.field().label.clone();
        let id = controller.id().clone();
        if !expression {
            self.popup.close(Some(&id));
        }
        self.status.mode_switched(&label, expression);
    }

    fn open_popup(&mut self) {
        let index = self.fields.focused_index();
        let anchor = self.anchors.get(index).copied();
        let kind = self.store.current().and_then(|element| element.kind.clone());
        let Some(controller) = self.fields.focused() else {
            return;
        };
        let config = controller
            .popup_config(kind.as_deref(), anchor)
            .filter(|_| controller.can_open_popup());
        let Some(mut config) = config else {
            self.status.set_raw("Only expressions open in the editor.");
            return;
        };
        config.links = self
            .popup_links
            .get(&config.editor.language_id)
            .cloned()
            .unwrap_or_default();
        let field = controller.id().clone();
        let title = config.title.clone();
        self.popup.events().post(PopupRequest::Open {
            field: field.clone(),
            config,
            return_focus: field,
        });
        if self.consume_popup_requests() {
            self.status.popup_opened(&title);
        }
    }

    /// Applies the control requests posted on the popup bus. True when any of them took effect.
    fn consume_popup_requests(&mut self) -> bool {
        let mut applied = false;
        for request in self.popup.events().take_requests() {
            if let PopupRequest::Open { field, .. } = &request {
                let openable = self
                    .fields
                    .get(field)
                    .is_some_and(|controller| controller.can_open_popup());
                if !openable {
                    debug!(%field, "ignoring popup request for a field that cannot open it");
                    continue;
                }
            }
            applied |= self.popup.handle_request(request, self.connector.as_ref());
        }
        self.sync_popup_ownership();
        applied
    }

    fn switch_element(&mut self, delta: i32) -> Result<()> {
        if self.store.len() < 2 {
            return Ok(());
        }
        let focused = self.fields.focused().map(|controller| controller.id().clone());
        self.popup.element_changed();
        self.fields.unmount();
        self.store.step(delta);
        let element = self
            .store
            .current()
            .ok_or_else(|| anyhow!("element index out of range"))?;
        debug!(element = %element.id, "switching element");
        self.fields = FieldSet::mount(
            &self.definitions,
            element,
            &self.connector,
            &self.validators,
            self.options.debounce,
        )?;
        if let Some(field) = focused {
            self.fields.focus_field(&field, FocusTarget::End);
        }
        self.status.element(element.id.as_str(), element.kind.as_deref());
        Ok(())
    }

    /// Advances popup effects, field effects and debounced commits.
    pub(crate) fn tick(&mut self, now: Instant) {
        let events = self.popup.tick();
        self.route_editor_events(events, now);
        self.consume_popup_requests();
        if let Some(field) = self.popup.take_return_focus() {
            self.fields.focus_field(&field, FocusTarget::End);
        }
        self.fields.tick(now, &mut self.store);
    }

    fn route_popup_events(&mut self, now: Instant) {
        let events = self.popup.take_editor_events();
        self.route_editor_events(events, now);
    }

    fn route_editor_events(&mut self, events: Vec<EditorEvent>, now: Instant) {
        let Some(field) = self.popup.open_field().cloned() else {
            return;
        };
        let Some(controller) = self.fields.get_mut(&field) else {
            return;
        };
        for event in events {
            controller.apply_editor_event(event, now);
            if !controller.mode().is_expression() {
                self.popup.close(Some(&field));
                break;
            }
        }
    }

    fn sync_popup_ownership(&mut self) {
        let open = self.popup.open_field().cloned();
        for controller in self.fields.iter_mut() {
            let owned = open.as_ref() == Some(controller.id());
            if controller.is_popup_owned() != owned {
                controller.set_popup_owned(owned);
            }
        }
    }

    fn on_save(&mut self) {
        self.fields.flush(&mut self.store);
        let issues = self.store.issue_count();
        if issues > 0 {
            self.status.issues_remaining(issues);
            return;
        }
        self.result = Some(self.store.values(&self.definitions));
        self.store.mark_clean();
        self.status.saved();
    }

    fn on_exit(&mut self) {
        self.fields.flush(&mut self.store);
        if self.options.confirm_exit && self.store.is_dirty() && !self.exit_armed {
            self.exit_armed = true;
            self.status.pending_exit();
            return;
        }
        self.should_quit = true;
    }
}

#[cfg(test)]
impl App {
    pub(crate) fn fields(&self) -> &[crate::form::ExpressionFieldController] {
        self.fields.controllers()
    }

    pub(crate) fn focused_field(&self) -> Option<&FieldId> {
        self.fields.focused().map(|controller| controller.id())
    }

    pub(crate) fn popup(&self) -> &PopupSession {
        &self.popup
    }

    pub(crate) fn popup_events(&mut self) -> &mut crate::popup::EventBus {
        self.popup.events()
    }

    pub(crate) fn stored_value(&self, field: &str) -> Option<String> {
        use crate::form::PropertyBinding;
        self.store.get_value(&FieldId::from(field))
    }

    pub(crate) fn current_element(&self) -> Option<&str> {
        self.store.current().map(|element| element.id.as_str())
    }

    pub(crate) fn status_message(&self) -> &str {
        self.status.message()
    }

    pub(crate) fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub(crate) fn take_result(&mut self) -> Option<PanelValues> {
        self.result.take()
    }
}
