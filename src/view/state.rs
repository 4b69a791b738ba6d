//! Per-render-pass state: sections, push buffers, output frames and loops.

use std::collections::HashMap;
use tracing::warn;

use super::loop_frame::LoopFrame;
use crate::component::Component;

/// Written by `@parent`; replaced by the ancestor's content for the section.
pub(crate) const PARENT_PLACEHOLDER: &str = "\u{E100}parent\u{E101}";

/// What an output frame is capturing.
pub(crate) enum Capture {
    /// A template evaluation or a section body. End instructions never
    /// reach below one of these.
    Boundary,
    Component(Box<dyn Component>),
    Slot(String),
    Push(String),
}

impl Capture {
    fn describe(&self) -> String {
        match self {
            Self::Boundary => "template".to_string(),
            Self::Component(c) => format!("component '{}'", c.type_name()),
            Self::Slot(name) => format!("slot '{}'", name),
            Self::Push(name) => format!("push '{}'", name),
        }
    }
}

pub(crate) struct Frame {
    pub capture: Capture,
    pub buffer: String,
}

/// Everything a render pass accumulates.
#[derive(Default)]
pub(crate) struct RenderState {
    sections: HashMap<String, String>,
    pushes: HashMap<String, Vec<String>>,
    frames: Vec<Frame>,
    pub loops: Vec<LoopFrame>,
    /// Templates currently being evaluated, outermost first.
    pub templates: Vec<String>,
}

impl RenderState {
    /// Append to the innermost frame.
    pub fn write(&mut self, text: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.buffer.push_str(text);
        }
    }

    pub fn open(&mut self, capture: Capture) {
        self.frames.push(Frame {
            capture,
            buffer: String::new(),
        });
    }

    /// Close the innermost frame for which `matches` holds, discarding any
    /// frames opened after it. Returns `None`, and changes nothing, when no
    /// such frame is open above the innermost boundary.
    pub fn close<F>(&mut self, matches: F) -> Option<Frame>
    where
        F: Fn(&Capture) -> bool,
    {
        let position = self
            .frames
            .iter()
            .rposition(|f| matches(&f.capture) || matches!(f.capture, Capture::Boundary))?;
        if matches!(self.frames[position].capture, Capture::Boundary) {
            return None;
        }
        self.discard_above(position);
        self.frames.pop()
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pop the innermost frame if more than `depth` frames are open and it
    /// is not a boundary.
    pub fn pop_above(&mut self, depth: usize) -> Option<Frame> {
        if self.frames.len() <= depth {
            return None;
        }
        match self.frames.last() {
            Some(frame) if !matches!(frame.capture, Capture::Boundary) => self.frames.pop(),
            _ => None,
        }
    }

    /// Close the innermost boundary and return its output.
    pub fn close_boundary(&mut self, template: &str) -> String {
        let Some(position) = self
            .frames
            .iter()
            .rposition(|f| matches!(f.capture, Capture::Boundary))
        else {
            return String::new();
        };
        for frame in &self.frames[position + 1..] {
            warn!(
                template = %template,
                "Discarding unclosed {}",
                frame.capture.describe()
            );
        }
        self.discard_above(position);
        self.frames.pop().map(|f| f.buffer).unwrap_or_default()
    }

    fn discard_above(&mut self, position: usize) {
        self.frames.truncate(position + 1);
    }

    /// Whether a component frame is open above the innermost boundary.
    pub fn in_component(&self) -> bool {
        self.frames
            .iter()
            .rev()
            .take_while(|f| !matches!(f.capture, Capture::Boundary))
            .any(|f| matches!(f.capture, Capture::Component(_)))
    }

    /// The innermost open component, above the innermost boundary.
    pub fn component_mut(&mut self) -> Option<&mut Box<dyn Component>> {
        self.frames
            .iter_mut()
            .rev()
            .take_while(|f| !matches!(f.capture, Capture::Boundary))
            .find_map(|f| match &mut f.capture {
                Capture::Component(c) => Some(c),
                _ => None,
            })
    }

    /// Record a section definition. The first definition wins; a later one
    /// (from an ancestor layout) only fills the `@parent` placeholder.
    pub fn define_section(&mut self, name: &str, content: String) {
        match self.sections.get_mut(name) {
            Some(existing) => {
                if existing.contains(PARENT_PLACEHOLDER) {
                    *existing = existing.replace(PARENT_PLACEHOLDER, &content);
                }
            }
            None => {
                self.sections.insert(name.to_string(), content);
            }
        }
    }

    /// Section content with leftover `@parent` placeholders removed.
    pub fn section(&self, name: &str) -> Option<String> {
        self.sections
            .get(name)
            .map(|content| content.replace(PARENT_PLACEHOLDER, ""))
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn push(&mut self, stack: &str, content: String) {
        self.pushes
            .entry(stack.to_string())
            .or_default()
            .push(content);
    }

    /// Pushed fragments of `stack`, concatenated in push order.
    pub fn stack(&self, name: &str) -> String {
        self.pushes
            .get(name)
            .map(|fragments| fragments.concat())
            .unwrap_or_default()
    }
}
