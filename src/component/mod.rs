//! Reusable view components.
//!
//! A component is opened with `@component('name', data)` and closed with
//! `@endcomponent`. Everything between the two that is not inside a
//! `@slot('name') ... @endslot` pair becomes the `default` slot. Components
//! come from two places:
//!
//! - a factory registered in a [`ComponentRegistry`], which builds the
//!   component from its [`ComponentData`] and may override [`Component::render`]
//! - a template named `components.<name>`, wrapped in an [`AnonymousComponent`]

mod anonymous;
mod data;
mod registry;

pub use anonymous::AnonymousComponent;
pub use data::ComponentData;
pub use registry::{validate_name, ComponentFactory, ComponentRegistry};

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Result, ViewError};

/// Slot name to rendered content.
pub type Slots = BTreeMap<String, String>;

/// Access to the renderer while a component renders.
pub trait RenderContext {
    /// Render the template `name` with `data`. Inside it, `slot()`,
    /// `unescaped_slot()`, `has_slot()`, `@componentSlot` and
    /// `@hasComponentSlot` read `slots`. `slot()` HTML-escapes when
    /// `escape_slots` is set.
    fn render_view(
        &mut self,
        name: &str,
        data: Map<String, Value>,
        slots: &Slots,
        escape_slots: bool,
    ) -> Result<String>;

    fn debug(&self) -> bool;
}

/// Data and slots most components carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentState {
    pub data: ComponentData,
    pub slots: Slots,
    /// Whether `slot()` escapes content in the component's view.
    pub escape_slots: bool,
}

impl ComponentState {
    pub fn new(data: ComponentData) -> Self {
        Self {
            data,
            slots: Slots::new(),
            escape_slots: true,
        }
    }
}

impl Default for ComponentState {
    fn default() -> Self {
        Self::new(ComponentData::default())
    }
}

pub trait Component {
    /// Name used in error messages.
    fn type_name(&self) -> &str;

    fn state(&self) -> &ComponentState;

    fn state_mut(&mut self) -> &mut ComponentState;

    /// Template rendered by the default [`Component::render`].
    fn view(&self) -> Option<&str> {
        None
    }

    fn data(&self) -> &ComponentData {
        &self.state().data
    }

    /// Store slot content, trimmed.
    fn set_slot(&mut self, name: &str, content: &str) {
        self.state_mut()
            .slots
            .insert(name.to_string(), content.trim().to_string());
    }

    fn slot(&self, name: &str) -> Option<&str> {
        self.state().slots.get(name).map(String::as_str)
    }

    /// Whether the slot was filled with non-empty content.
    fn has_slot(&self, name: &str) -> bool {
        self.slot(name).is_some_and(|s| !s.is_empty())
    }

    fn escape_slots_by_default(&self) -> bool {
        self.state().escape_slots
    }

    fn set_escape_slots_by_default(&mut self, escape: bool) {
        self.state_mut().escape_slots = escape;
    }

    /// Data passed to the view: the component data plus a `slots` object.
    fn view_data(&self) -> Map<String, Value> {
        let mut data = self.data().as_map().clone();
        let slots = self
            .state()
            .slots
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        data.insert("slots".to_string(), Value::Object(slots));
        data
    }

    /// Render the component. The default renders [`Component::view`].
    fn render(&self, ctx: &mut dyn RenderContext) -> Result<String> {
        match self.view() {
            Some(view) => ctx.render_view(
                view,
                self.view_data(),
                &self.state().slots,
                self.escape_slots_by_default(),
            ),
            None => Err(ViewError::ComponentResolutionFailure {
                name: self.type_name().to_string(),
                message: "component has no view and does not implement render".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Bare(ComponentState);

    impl Component for Bare {
        fn type_name(&self) -> &str {
            "Bare"
        }

        fn state(&self) -> &ComponentState {
            &self.0
        }

        fn state_mut(&mut self) -> &mut ComponentState {
            &mut self.0
        }
    }

    struct NullContext;

    impl RenderContext for NullContext {
        fn render_view(&mut self, _: &str, _: Map<String, Value>, _: &Slots, _: bool) -> Result<String> {
            Ok(String::new())
        }

        fn debug(&self) -> bool {
            false
        }
    }

    fn bare() -> Bare {
        Bare(ComponentState::new(ComponentData::from_value(
            json!({"title": "Hi"}),
        )))
    }

    #[test]
    fn slots_are_trimmed() {
        let mut component = bare();
        component.set_slot("footer", "\n  <p>bye</p>\n");
        assert_eq!(component.slot("footer"), Some("<p>bye</p>"));
        assert!(component.has_slot("footer"));
    }

    #[test]
    fn blank_slot_does_not_count() {
        let mut component = bare();
        component.set_slot("footer", "   ");
        assert!(!component.has_slot("footer"));
        assert!(!component.has_slot("missing"));
    }

    #[test]
    fn slots_escape_unless_turned_off() {
        let mut component = bare();
        assert!(component.escape_slots_by_default());
        component.set_escape_slots_by_default(false);
        assert!(!component.escape_slots_by_default());
        assert!(ComponentState::default().escape_slots);
    }

    #[test]
    fn view_data_carries_slots() {
        let mut component = bare();
        component.set_slot("default", "body");
        assert_eq!(
            Value::Object(component.view_data()),
            json!({"title": "Hi", "slots": {"default": "body"}})
        );
    }

    #[test]
    fn render_without_view_names_the_type() {
        let err = bare().render(&mut NullContext).unwrap_err();
        match err {
            ViewError::ComponentResolutionFailure { name, .. } => assert_eq!(name, "Bare"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
