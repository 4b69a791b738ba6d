//! The `loop` variable exposed inside `@foreach`, `@for` and `@while`.

use serde_json::{json, Map, Value};

/// Progress of one loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopFrame {
    /// 1-based number of the current iteration.
    pub iteration: usize,
    pub index: usize,
    /// Total items, unknown for `@for` and `@while`.
    pub count: Option<usize>,
    pub remaining: Option<usize>,
    pub first: bool,
    pub last: bool,
    /// 1 for the outermost loop.
    pub depth: usize,
}

impl LoopFrame {
    pub fn new(count: Option<usize>, depth: usize) -> Self {
        Self {
            iteration: 0,
            index: 0,
            count,
            remaining: count,
            first: true,
            last: false,
            depth,
        }
    }

    /// Advance to the next iteration.
    pub fn advance(&mut self) {
        self.iteration += 1;
        self.index = self.iteration - 1;
        self.first = self.iteration == 1;
        self.last = self.count == Some(self.iteration);
        self.remaining = self.count.map(|c| c.saturating_sub(self.iteration));
    }

    fn to_map(&self) -> Map<String, Value> {
        let value = json!({
            "iteration": self.iteration,
            "index": self.index,
            "count": self.count,
            "remaining": self.remaining,
            "first": self.first,
            "last": self.last,
            "depth": self.depth,
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// The `loop` value for the innermost frame of `stack`, with `parent`
/// chained through the enclosing frames.
pub fn loop_value(stack: &[LoopFrame]) -> Value {
    let mut value = Value::Null;
    for frame in stack {
        let mut map = frame.to_map();
        map.insert("parent".to_string(), value);
        value = Value::Object(map);
    }
    value
}
