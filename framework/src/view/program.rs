//! Compiled template representation
//!
//! A template compiles to an ordered list of ops, serialized as JSON in the
//! compiled-views directory. Control flow is structured (bodies nest inside
//! their op) except for sections: `StartSection`/`StopSection` stay flat so
//! stack discipline is enforced at render time, where a stray stop is a
//! reportable error.

use serde::{Deserialize, Serialize};

pub const PROGRAM_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub version: u32,
    pub ops: Vec<Op>,
}

impl Program {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            version: PROGRAM_VERSION,
            ops,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Verbatim template text.
    Literal(String),
    /// Evaluate an expression and write it, HTML-escaped unless raw.
    Echo { expr: String, raw: bool },
    /// Defer to a layout once the current template finishes.
    Extends { view: String },
    /// Begin capturing output into a named section.
    StartSection { name: String },
    /// Finish the innermost open section.
    StopSection,
    /// Write a captured section's content (empty if never filled).
    Yield { name: String },
    /// Render another view inline, with optional extra data.
    Include { view: String, data: Option<String> },
    /// Conditional chain: first truthy branch wins, else the fallback.
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Op>>,
    },
    /// Iterate an array or object's values.
    Foreach {
        var: String,
        expr: String,
        body: Vec<Op>,
    },
    /// Integer range loop, end-exclusive.
    For {
        var: String,
        from: String,
        to: String,
        body: Vec<Op>,
    },
    /// Condition-guarded loop with an iteration cap.
    While { cond: String, body: Vec<Op> },
    /// Hidden `_method` input for HTML form verb spoofing.
    MethodField { verb: String },
    /// Hidden CSRF token input.
    CsrfField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub cond: String,
    pub body: Vec<Op>,
}
