//! Execution state for one top-level invocation.

use std::fmt;
use std::rc::Rc;

use crate::scheduler::Scheduler;
use crate::variables::VariableSpace;

/// Everything a statement needs while it executes: the variable space of
/// the current invocation and the optional "run later" facility.
pub struct Runtime {
    pub variables: VariableSpace,
    prog_name: Rc<str>,
    scheduler: Option<Rc<dyn Scheduler>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("prog", &self.prog_name)
            .field("variables", &self.variables)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

impl Runtime {
    pub fn new(prog_name: impl Into<Rc<str>>, variables: VariableSpace) -> Self {
        Self { variables, prog_name: prog_name.into(), scheduler: None }
    }

    pub fn with_scheduler(mut self, scheduler: Option<Rc<dyn Scheduler>>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn prog_name(&self) -> &Rc<str> {
        &self.prog_name
    }

    pub fn scheduler(&self) -> Option<&Rc<dyn Scheduler>> {
        self.scheduler.as_ref()
    }

    /// Run `f` inside a fresh block frame.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Runtime) -> R) -> R {
        self.variables.push_frame();
        let result = f(self);
        self.variables.pop_frame();
        result
    }
}
