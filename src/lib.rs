//! bfcpu-emu library
//!
//! Cycle-accurate emulation of a single-cycle Brainfuck soft-CPU core: the
//! fetch/decode/execute/loop-resolution state machine, its two depth-4 byte
//! queues, and the store/transceiver collaborators it is wired to.

pub mod config;
pub mod core;
pub mod isa;
pub mod system;

pub use crate::config::Config;
pub use crate::core::{Cpu, CpuRegisters, CpuState, CycleInputs, CycleOutputs, Handshake};
pub use crate::isa::{assemble, Op};
pub use crate::system::{RunSummary, System, SystemError};
