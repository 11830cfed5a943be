use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::domain::{ElementRecord, FieldDefinition, FieldId};
use crate::form::{ExpressionFieldController, FocusTarget, PropertyBinding, Validate};
use crate::lsp::LanguageConnector;

/// Controllers mounted for the element currently shown in the panel.
#[derive(Debug, Default)]
pub(crate) struct FieldSet {
    controllers: Vec<ExpressionFieldController>,
    focused: usize,
}

impl FieldSet {
    pub(crate) fn mount(
        definitions: &[FieldDefinition],
        element: &ElementRecord,
        connector: &Rc<dyn LanguageConnector>,
        validators: &HashMap<FieldId, Rc<dyn Validate>>,
        debounce: Duration,
    ) -> Result<Self> {
        let controllers = definitions
            .iter()
            .map(|definition| {
                let controller = ExpressionFieldController::new(
                    definition.clone(),
                    element.value(&definition.id),
                    Rc::clone(connector),
                    debounce,
                )
                .with_context(|| format!("failed to mount field '{}'", definition.id))?;
                Ok(match validators.get(&definition.id) {
                    Some(validator) => controller.with_validator(Rc::clone(validator)),
                    None => controller,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut set = Self {
            controllers,
            focused: 0,
        };
        set.focus_current(FocusTarget::End);
        Ok(set)
    }

    pub(crate) fn controllers(&self) -> &[ExpressionFieldController] {
        &self.controllers
    }

    pub(crate) fn focused_index(&self) -> usize {
        self.focused
    }

    pub(crate) fn focused(&self) -> Option<&ExpressionFieldController> {
        self.controllers.get(self.focused)
    }

    pub(crate) fn focused_mut(&mut self) -> Option<&mut ExpressionFieldController> {
        self.controllers.get_mut(self.focused)
    }

    pub(crate) fn get(&self, field: &FieldId) -> Option<&ExpressionFieldController> {
        self.controllers
            .iter()
            .find(|controller| controller.id() == field)
    }

    pub(crate) fn get_mut(&mut self, field: &FieldId) -> Option<&mut ExpressionFieldController> {
        self.controllers
            .iter_mut()
            .find(|controller| controller.id() == field)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExpressionFieldController> {
        self.controllers.iter_mut()
    }

    /// Moves focus by `delta` fields, wrapping around.
    pub(crate) fn step(&mut self, delta: i32) {
        let len = self.controllers.len();
        if len == 0 {
            return;
        }
        let next = (self.focused as i64 + delta as i64).rem_euclid(len as i64) as usize;
        self.focus_index(next, FocusTarget::End);
    }

    /// Focuses `field`; unknown ids leave focus where it is.
    pub(crate) fn focus_field(&mut self, field: &FieldId, target: FocusTarget) -> bool {
        match self
            .controllers
            .iter()
            .position(|controller| controller.id() == field)
        {
            Some(index) => {
                self.focus_index(index, target);
                true
            }
            None => false,
        }
    }

    fn focus_index(&mut self, index: usize, target: FocusTarget) {
        if let Some(previous) = self.controllers.get_mut(self.focused) {
            previous.blur();
        }
        self.focused = index;
        self.focus_current(target);
    }

    fn focus_current(&mut self, target: FocusTarget) {
        if let Some(controller) = self.controllers.get_mut(self.focused) {
            if !controller.is_popup_owned() {
                controller.focus(target);
            }
        }
    }

    pub(crate) fn tick(&mut self, now: Instant, binding: &mut dyn PropertyBinding) {
        for controller in &mut self.controllers {
            controller.tick(now, binding);
        }
    }

    /// Commits every pending edit. Returns whether anything was written.
    pub(crate) fn flush(&mut self, binding: &mut dyn PropertyBinding) -> bool {
        let mut written = false;
        for controller in &mut self.controllers {
            written |= controller.flush(binding);
        }
        written
    }

    pub(crate) fn unmount(&mut self) {
        for controller in &mut self.controllers {
            controller.unmount();
        }
    }
}
