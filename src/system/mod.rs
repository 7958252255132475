//! System harness: the core wired to its collaborators.
//!
//! The core itself only speaks signals. [`System`] plays the surrounding
//! fabric: it owns the program and data stores, drives the clock, and stands
//! in for the external byte-stream transceiver with a host-side input buffer
//! and output capture. One [`System::step`] is one clock cycle:
//!
//! 1. fetch the instruction and the read-port byte combinationally from the
//!    core's address registers;
//! 2. tick the core with those plus the transceiver signals;
//! 3. apply the (always-enabled) data-store write and any completed
//!    transmit/receive transfers at the edge.
//!
//! The transmit side's readiness is configurable so the back-pressured path
//! is exercised: ready every cycle, every Nth cycle, or never.

pub mod store;

use std::collections::VecDeque;

use thiserror::Error;

use crate::config::Config;
use crate::core::{Cpu, CpuState, CycleInputs};
use crate::isa::Op;
use store::{DataStore, ProgramStore};

/// Errors surfaced by the harness. The core itself has no error channel;
/// these arise only at the host boundary.
#[derive(Debug, Error)]
pub enum SystemError {
    /// The assembled program contains no instructions.
    #[error("program is empty after assembly")]
    EmptyProgram,

    /// The program does not fit the 16-bit program counter.
    #[error("program too long for the 16-bit program counter: {0} instructions")]
    ProgramTooLong(usize),

    /// The run did not reach quiescence within the cycle budget.
    #[error("cycle budget of {budget} cycles exhausted in state {state:?}")]
    CycleBudgetExhausted { budget: u64, state: CpuState },
}

/// Result of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Clock cycles elapsed, including the power-on reset pulse.
    pub cycles: u64,
    /// Bytes taken from the transmit side.
    pub bytes_out: usize,
    /// Bytes consumed on the receive side.
    pub bytes_in: usize,
}

/// The core plus stores, clock, and host-side stream drivers.
#[derive(Debug, Clone)]
pub struct System {
    cpu: Cpu,
    program: ProgramStore,
    memory: DataStore,
    reset: bool,
    cycles: u64,
    max_cycles: u64,
    /// Transmit side asserts ready once every this many cycles
    /// (1 = always, 0 = never).
    tx_ready_every: u64,
    input: VecDeque<u8>,
    output: Vec<u8>,
    bytes_in: usize,
}

impl System {
    /// Build a system around an assembled program and pulse the power-on
    /// reset, leaving the core in `Executing` at instruction zero.
    pub fn new(program: Vec<Op>, config: &Config) -> Result<Self, SystemError> {
        if program.is_empty() {
            return Err(SystemError::EmptyProgram);
        }
        if program.len() > u16::MAX as usize + 1 {
            return Err(SystemError::ProgramTooLong(program.len()));
        }

        let program = ProgramStore::new(program);
        let tape_len = config.tape_len.max(1);
        let mut system = Self {
            cpu: Cpu::new(program.len(), tape_len),
            program,
            memory: DataStore::new(tape_len),
            reset: false,
            cycles: 0,
            max_cycles: config.max_cycles,
            tx_ready_every: config.tx_ready_every,
            input: VecDeque::new(),
            output: Vec::new(),
            bytes_in: 0,
        };
        system.pulse_reset();
        Ok(system)
    }

    /// Assert the reset level for one cycle, then release it. Registers come
    /// up zeroed; queue contents and tape contents are left alone, since the
    /// queues sit outside the soft-reset path.
    pub fn pulse_reset(&mut self) {
        self.reset = true;
        self.step();
        self.reset = false;
        self.step();
    }

    /// Current processor state.
    pub fn state(&self) -> CpuState {
        self.cpu.state()
    }

    /// Clock cycles elapsed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Bytes captured from the transmit side, in order.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Take the captured output, leaving the capture buffer empty.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Queue bytes for the receive side. Each is offered with `ready`
    /// asserted until the core's queue accepts it.
    pub fn feed_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Override the transmit-ready cadence (1 = every cycle, 0 = never).
    pub fn set_tx_ready_every(&mut self, every: u64) {
        self.tx_ready_every = every;
    }

    /// Override the cycle budget used by [`run_until_quiescent`].
    ///
    /// [`run_until_quiescent`]: System::run_until_quiescent
    pub fn set_max_cycles(&mut self, max_cycles: u64) {
        self.max_cycles = max_cycles;
    }

    /// The tape cell at `addr`.
    pub fn cell(&self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    /// The current data pointer position.
    pub fn pointer(&self) -> u16 {
        self.cpu.read_addr()
    }

    /// The core has halted and the transmit queue has drained.
    pub fn is_quiescent(&self) -> bool {
        self.cpu.state() == CpuState::Halted && self.cpu.tx_pending() == 0
    }

    /// Advance one clock cycle.
    pub fn step(&mut self) {
        let tx_ready = self.tx_ready_every > 0 && self.cycles % self.tx_ready_every == 0;
        let rx_ready = !self.input.is_empty();
        let rx_data = self.input.front().copied().unwrap_or(0);

        let inputs = CycleInputs {
            reset: self.reset,
            instruction: self.program.fetch(self.cpu.program_addr()),
            read_data: self.memory.read(self.cpu.read_addr()),
            tx_ready,
            rx_ready,
            rx_data,
        };
        let outputs = self.cpu.tick(inputs);

        // Clock edge: the always-enabled write port, then the transceiver
        // transfers that completed this cycle.
        if outputs.write_enable {
            self.memory.write(outputs.write_addr, outputs.write_data);
        }
        if outputs.tx_ack && tx_ready {
            self.output.push(outputs.tx_data);
        }
        if outputs.rx_ack && rx_ready {
            self.input.pop_front();
            self.bytes_in += 1;
        }
        self.cycles += 1;
    }

    /// Run for at most `max_cycles` cycles, stopping early at quiescence.
    /// Returns the number of cycles actually run.
    pub fn run(&mut self, max_cycles: u64) -> u64 {
        let start = self.cycles;
        while self.cycles - start < max_cycles && !self.is_quiescent() {
            self.step();
        }
        self.cycles - start
    }

    /// Run until the core halts and the transmit queue drains, within the
    /// configured cycle budget.
    pub fn run_until_quiescent(&mut self) -> Result<RunSummary, SystemError> {
        self.run(self.max_cycles);
        if !self.is_quiescent() {
            return Err(SystemError::CycleBudgetExhausted {
                budget: self.max_cycles,
                state: self.cpu.state(),
            });
        }
        let summary = RunSummary {
            cycles: self.cycles,
            bytes_out: self.output.len(),
            bytes_in: self.bytes_in,
        };
        log::info!(
            "quiescent after {} cycles ({} bytes out, {} bytes in)",
            summary.cycles,
            summary.bytes_out,
            summary.bytes_in
        );
        Ok(summary)
    }
}
