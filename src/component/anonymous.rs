//! Template-backed components that need no code.

use super::{Component, ComponentData, ComponentState};

/// A component whose rendering is entirely its template.
#[derive(Debug, Clone, PartialEq)]
pub struct AnonymousComponent {
    name: String,
    view: String,
    state: ComponentState,
}

impl AnonymousComponent {
    pub fn new(name: impl Into<String>, view: impl Into<String>, data: ComponentData) -> Self {
        Self {
            name: name.into(),
            view: view.into(),
            state: ComponentState::new(data),
        }
    }
}

impl Component for AnonymousComponent {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &ComponentState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ComponentState {
        &mut self.state
    }

    fn view(&self) -> Option<&str> {
        Some(&self.view)
    }
}
