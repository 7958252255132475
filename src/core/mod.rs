//! The processor core: execution state machine and its byte queues.

pub mod cpu;
pub mod queue;

pub use cpu::{Cpu, CpuRegisters, CpuState, CycleInputs, CycleOutputs, Handshake};
pub use queue::{ByteQueue, QUEUE_DEPTH};
