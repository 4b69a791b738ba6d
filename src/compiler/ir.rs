//! The compiled view program.
//!
//! A [`Program`] is what the compiler produces and what the cache persists:
//! a tree of instructions with embedded expression trees. Control
//! constructs are nested; buffer captures for components, slots and pushes
//! stay flat start/end pairs so that the renderer can tolerate imbalance.

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, Stmt};

/// Bumped whenever the serialized shape of [`Node`] changes. Artifacts with
/// another version are treated as stale.
pub const PROGRAM_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub version: u32,
    pub name: String,
    pub nodes: Vec<Node>,
}

impl Program {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            version: PROGRAM_VERSION,
            name: name.into(),
            nodes,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode an artifact. Returns `None` for undecodable artifacts and for
    /// artifacts written by another program version.
    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str::<Program>(json)
            .ok()
            .filter(|p| p.version == PROGRAM_VERSION)
    }
}

/// One conditional arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Text(String),
    Echo {
        expr: Expr,
        escape: bool,
    },
    Json {
        expr: Expr,
        pretty: Option<Expr>,
    },
    Csrf,
    /// Selects the layout once evaluated.
    Extends(String),
    /// A captured section. `show` yields it right after capture.
    Section {
        name: String,
        body: Vec<Node>,
        show: bool,
    },
    /// `@section('title', expr)`: the escaped value becomes the section.
    SectionInline {
        name: String,
        value: Expr,
    },
    Yield {
        name: String,
        default: Option<Expr>,
    },
    Parent,
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    Foreach {
        iterable: Expr,
        key: Option<String>,
        value: String,
        body: Vec<Node>,
    },
    For {
        init: Vec<Stmt>,
        condition: Expr,
        step: Vec<Stmt>,
        body: Vec<Node>,
    },
    While {
        condition: Expr,
        body: Vec<Node>,
    },
    Break(Option<Expr>),
    Continue(Option<Expr>),
    Include {
        name: String,
        data: Option<Expr>,
    },
    ComponentStart {
        name: String,
        data: Option<Expr>,
    },
    ComponentEnd,
    SlotStart(String),
    SlotEnd,
    PushStart(String),
    PushEnd,
    Stack {
        name: String,
        default: Option<Expr>,
    },
    ComponentSlot {
        name: String,
        default: String,
    },
    Code(Vec<Stmt>),
}
