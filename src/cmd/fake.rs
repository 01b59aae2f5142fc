// ============================================================================
// src/cmd/fake.rs – Recording Runner for unit tests
// ============================================================================

use anyhow::Result;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use super::base::{OutputData, Runner};

/// Programs without a canned answer succeed with empty output.
#[derive(Debug, Default)]
pub struct FakeRunner {
    installed: RefCell<HashSet<String>>,
    answers: HashMap<String, OutputData>,
    calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_installed(self, programs: &[&str]) -> Self {
        self.installed
            .borrow_mut()
            .extend(programs.iter().map(|p| p.to_string()));
        self
    }

    pub fn answer(mut self, program: &str, output: OutputData) -> Self {
        self.answers.insert(program.to_string(), output);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.borrow().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn ran(&self, program: &str) -> bool {
        self.calls.borrow().iter().any(|(p, _)| p == program)
    }

    pub fn args_of(&self, program: &str) -> Option<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .find(|(p, _)| p == program)
            .map(|(_, a)| a.clone())
    }

    /// Mark a program installed after the fact (simulates a package install).
    pub fn install(&self, program: &str) {
        self.installed.borrow_mut().insert(program.to_string());
    }
}

pub fn ok(stdout: &str) -> OutputData {
    OutputData {
        stdout: stdout.to_string(),
        stderr: String::new(),
        status: 0,
    }
}

pub fn fail(status: i32, stderr: &str) -> OutputData {
    OutputData {
        stdout: String::new(),
        stderr: stderr.to_string(),
        status,
    }
}

impl Runner for FakeRunner {
    fn which(&self, program: &str) -> Option<PathBuf> {
        self.installed
            .borrow()
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }

    fn run(&self, program: &str, args: &[String]) -> Result<OutputData> {
        self.calls
            .borrow_mut()
            .push((program.to_string(), args.to_vec()));
        Ok(self.answers.get(program).cloned().unwrap_or_default())
    }
}
