//! Named component factories.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use super::{Component, ComponentData};
use crate::error::{Result, ViewError};

static COMPONENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]*$").expect("Invalid regex pattern")
});

/// Builds a component from the data given at `@component`.
pub type ComponentFactory =
    dyn Fn(ComponentData) -> anyhow::Result<Box<dyn Component>> + Send + Sync;

/// Reject names that cannot name a component.
pub fn validate_name(name: &str) -> Result<()> {
    if COMPONENT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ViewError::ComponentResolutionFailure {
            name: name.to_string(),
            message: "invalid component name".to_string(),
        })
    }
}

#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: HashMap<String, Arc<ComponentFactory>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`.
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(ComponentData) -> anyhow::Result<Box<dyn Component>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the registered component `name`, or `None` when nothing is
    /// registered under it. Factory errors become
    /// [`ViewError::ComponentResolutionFailure`].
    pub fn instantiate(&self, name: &str, data: ComponentData) -> Option<Result<Box<dyn Component>>> {
        let factory = self.factories.get(name)?;
        Some(factory(data).map_err(|e| ViewError::ComponentResolutionFailure {
            name: name.to_string(),
            message: e.to_string(),
        }))
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::AnonymousComponent;
    use serde_json::json;

    fn registry() -> ComponentRegistry {
        ComponentRegistry::new().register("badge", |data: ComponentData| {
            data.require("label")?;
            Ok(Box::new(AnonymousComponent::new("badge", "components.badge", data))
                as Box<dyn Component>)
        })
    }

    #[test]
    fn validates_names() {
        assert!(validate_name("alert").is_ok());
        assert!(validate_name("forms.input").is_ok());
        assert!(validate_name("nav-link_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("1alert").is_err());
        assert!(validate_name("../alert").is_err());
        assert!(validate_name("a b").is_err());
    }

    #[test]
    fn instantiates_registered_component() {
        let data = ComponentData::from_value(json!({"label": "new"}));
        let component = registry().instantiate("badge", data).unwrap().unwrap();
        assert_eq!(component.type_name(), "badge");
        assert_eq!(component.data().get_str("label"), Some("new"));
    }

    #[test]
    fn missing_required_data_is_resolution_failure() {
        let err = registry()
            .instantiate("badge", ComponentData::default())
            .unwrap()
            .err()
            .unwrap();
        match err {
            ViewError::ComponentResolutionFailure { name, message } => {
                assert_eq!(name, "badge");
                assert!(message.contains("label"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(registry().instantiate("card", ComponentData::default()).is_none());
        assert_eq!(registry().names(), vec!["badge"]);
        assert!(registry().contains("badge"));
    }
}
