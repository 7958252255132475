//! Program and data store collaborators.
//!
//! Both stores sit outside the core and are owned by the integrator; the
//! core only sees their signal contracts. The program store is read-only and
//! combinational with respect to its address. The data store has one read
//! port and one write port, independently addressed, with the write port
//! always enabled — the core expresses "no change" by writing the read value
//! back.

use crate::isa::Op;

/// Read-only instruction memory.
#[derive(Debug, Clone)]
pub struct ProgramStore {
    ops: Vec<Op>,
}

impl ProgramStore {
    /// Wrap an assembled program. The program must be non-empty; the system
    /// enforces that before construction.
    pub fn new(ops: Vec<Op>) -> Self {
        debug_assert!(!ops.is_empty());
        Self { ops }
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Combinational fetch. Addresses wrap modulo the store depth, as a
    /// hardware memory truncates its address lines; the core halts before
    /// acting on an out-of-range fetch, so the wrapped value is a don't-care.
    pub fn fetch(&self, addr: u16) -> Op {
        self.ops[addr as usize % self.ops.len()]
    }
}

/// Byte-addressable tape memory with independent read and write ports.
#[derive(Debug, Clone)]
pub struct DataStore {
    cells: Vec<u8>,
}

impl DataStore {
    /// A zeroed tape of `len` cells.
    pub fn new(len: usize) -> Self {
        Self {
            cells: vec![0; len.max(1)],
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Combinational read port.
    pub fn read(&self, addr: u16) -> u8 {
        self.cells[addr as usize % self.cells.len()]
    }

    /// Synchronous write port, applied at the clock edge.
    pub fn write(&mut self, addr: u16, data: u8) {
        let len = self.cells.len();
        self.cells[addr as usize % len] = data;
    }
}
