//! Runtime variable spaces.
//!
//! A [`VariableSpace`] is a stack of frames.  The bottom frame holds a prog's
//! parameters and its reserved `return` slot; each block execution instance
//! (loop iteration, branch taken, switch case) pushes a frame of its own and
//! pops it when it finishes.  Reads search innermost → outermost; writes land
//! in whichever frame declared the name.

use std::collections::HashMap;

use crate::types::ProgVariableType;
use crate::value::Value;

/// A value tagged with its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub ty: ProgVariableType,
    pub value: Value,
}

impl Variable {
    pub fn new(ty: ProgVariableType, value: Value) -> Self {
        Self { ty, value }
    }
}

#[derive(Debug, Default, Clone)]
struct Frame {
    locals: HashMap<String, Variable>,
}

/// Name → variable mapping active during one prog invocation.
#[derive(Debug, Clone)]
pub struct VariableSpace {
    /// Innermost frame last.  Never empty.
    frames: Vec<Frame>,
}

impl Default for VariableSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableSpace {
    /// A space with a single, empty root frame.
    pub fn new() -> Self {
        Self { frames: vec![Frame::default()] }
    }

    /// Introduce `name` in the innermost frame.
    ///
    /// Returns `false` (and leaves the space untouched) if `name` is already
    /// visible; declaration statements are checked for this at compile time.
    pub fn declare(&mut self, name: &str, ty: ProgVariableType, value: Value) -> bool {
        if self.contains(name) {
            return false;
        }
        match self.frames.last_mut() {
            Some(frame) => {
                frame.locals.insert(name.to_ascii_lowercase(), Variable::new(ty, value));
                true
            }
            None => false,
        }
    }

    /// Look up a variable through the frame chain (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Variable> {
        let key = name.to_ascii_lowercase();
        self.frames.iter().rev().find_map(|f| f.locals.get(&key))
    }

    /// The value of a visible variable.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).map(|v| &v.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Overwrite the value of an already declared variable.
    ///
    /// Returns `Err` with a message if no frame declares `name`.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), String> {
        let key = name.to_ascii_lowercase();
        for frame in self.frames.iter_mut().rev() {
            if let Some(var) = frame.locals.get_mut(&key) {
                var.value = value;
                return Ok(());
            }
        }
        Err(format!("variable {name} is not declared"))
    }

    pub(crate) fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    pub(crate) fn pop_frame(&mut self) {
        // The root frame outlives every block.
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of active frames (1 at top level).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Collapse every visible variable into a new single-frame space.
    ///
    /// Plain values are copied; structural values stay shared with this
    /// space, exactly as an ordinary assignment would share them.
    pub fn snapshot(&self) -> VariableSpace {
        let mut root = Frame::default();
        for frame in &self.frames {
            for (name, var) in &frame.locals {
                root.locals.insert(name.clone(), var.clone());
            }
        }
        VariableSpace { frames: vec![root] }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
