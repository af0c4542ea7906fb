//! Fan-out over the fixed set of supervised Processes.

use anyhow::Result;

use crate::process::Process;

/// Fixed-size ordered collection of Processes. All children are peers;
/// each drive cycle polls them round-robin with no ordering between them.
pub struct Supervisor {
    processes: Vec<Process>,
}

impl Supervisor {
    #[must_use]
    pub fn new(processes: Vec<Process>) -> Self {
        Self { processes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    #[must_use]
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    #[must_use]
    pub fn process_mut(&mut self, index: usize) -> Option<&mut Process> {
        self.processes.get_mut(index)
    }

    pub fn processes_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.processes.iter_mut()
    }

    /// Spawn every Process in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the first spawn failure; earlier Processes stay running
    /// and it is the caller's job to kill them.
    pub fn spawn_all(&mut self) -> Result<()> {
        for process in &mut self.processes {
            process.spawn()?;
        }
        Ok(())
    }

    /// Drain each Process once; true iff any one moved bytes.
    pub fn read_all(&mut self) -> bool {
        let mut drained = false;
        for process in &mut self.processes {
            drained |= process.read_output();
        }
        drained
    }

    /// Kill every Process. Always succeeds.
    pub fn kill_all(&mut self) {
        for process in &mut self.processes {
            process.kill();
        }
    }

    /// True iff at least one Process is still running.
    #[must_use]
    pub fn any_alive(&self) -> bool {
        self.processes.iter().any(Process::is_alive)
    }
}
