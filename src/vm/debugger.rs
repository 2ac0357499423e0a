//! Breakpoints and single-stepping.
//!
//! The VM consults the debugger on every `AtLine`. When it asks to stop, the
//! context suspends with a debugger signal and `Context::resume` continues at
//! the next instruction.

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Debugger {
    breakpoints: HashSet<usize>,
    single_step: bool,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_breakpoint(&mut self, line: usize) {
        self.breakpoints.insert(line);
    }

    pub fn clear_breakpoint(&mut self, line: usize) -> bool {
        self.breakpoints.remove(&line)
    }

    pub fn breakpoints(&self) -> Vec<usize> {
        let mut lines: Vec<usize> = self.breakpoints.iter().copied().collect();
        lines.sort_unstable();
        lines
    }

    /// Suspend on every source line until turned off.
    pub fn set_single_step(&mut self, on: bool) {
        self.single_step = on;
    }

    pub fn is_active(&self) -> bool {
        self.single_step || !self.breakpoints.is_empty()
    }

    pub(crate) fn should_stop(&self, line: usize) -> bool {
        self.single_step || self.breakpoints.contains(&line)
    }
}
