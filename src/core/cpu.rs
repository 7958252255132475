//! Single-cycle execution state machine.
//!
//! The core fetches, decodes, and executes one instruction per clock cycle,
//! with two exceptions: the Output/Input two-cycle handshakes, and the scan
//! states that walk the program counter to resolve a loop bracket without
//! executing. Everything is registered or combinational; there is no call
//! stack and no reusable decoder.
//!
//! # Cycle model
//!
//! [`Cpu::tick`] simulates exactly one clock cycle. The caller plays the
//! role of the surrounding fabric: it reads the address registers
//! ([`Cpu::program_addr`], [`Cpu::read_addr`]), fetches from the program and
//! data stores combinationally, and hands the fetched values in as
//! [`CycleInputs`]. `tick` computes the cycle's combinational outputs from
//! the *current* register snapshot, then commits the next snapshot and any
//! queue transfers atomically, as a single clock edge would. Next-cycle
//! register values are pure functions of current registers and inputs only.
//!
//! # Loop resolution
//!
//! Brackets are matched at run time with a single saturating depth counter
//! instead of a stack: only one scan direction is ever active, and the
//! number of unmatched brackets seen so far in that direction uniquely
//! identifies the match in a well-formed program.
//!
//! # Bounds policy
//!
//! The core is configured with the program length. Any cycle that would
//! fetch an out-of-range program address drives the core to [`Halted`]
//! (`CpuState::Halted`): past the end this is the end-of-program halt, and
//! during a scan it is the defined outcome for unbalanced brackets. The data
//! pointer wraps modulo the configured tape length and never faults.
//!
//! [`Halted`]: CpuState::Halted

use crate::core::queue::ByteQueue;
use crate::isa::Op;

/// Processor state register. Exactly one state is active per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuState {
    /// Power-on default; left only when reset first asserts. Also the
    /// terminal state once the program counter leaves the program.
    #[default]
    Halted,
    /// Reset level is asserted: program counter and both data pointers are
    /// forced to zero every held cycle.
    Resetting,
    /// Normal fetch/decode/execute.
    Executing,
    /// Walking forward to the `]` matching a skipped loop body.
    ScanForward,
    /// Walking backward to the `[` matching the `]` just executed.
    ScanBackward,
}

/// Micro-state of one I/O handshake, held in its own register rather than
/// inferred from the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handshake {
    /// No transfer in flight.
    #[default]
    Idle,
    /// A transfer was committed last edge and completes this cycle.
    Requesting,
}

/// The complete register file, updated once per clock edge.
///
/// This is a plain value type: `tick` copies the current snapshot, derives
/// the next one, and swaps — no in-place mutation interleaved with reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuRegisters {
    /// Processor state.
    pub state: CpuState,
    /// Program counter (program-store fetch address).
    pub pc: u16,
    /// Data-store read address.
    pub read_ptr: u16,
    /// Data-store write address. Moves in lockstep with `read_ptr`; the two
    /// exist separately only because the store has independent ports.
    pub write_ptr: u16,
    /// Unmatched brackets seen so far in the active scan. Saturating;
    /// meaningful only in the scan states.
    pub loop_depth: u16,
    /// Output-instruction handshake micro-state.
    pub tx_req: Handshake,
    /// Input-instruction handshake micro-state.
    pub rx_req: Handshake,
}

/// Signals sampled by the core during one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleInputs {
    /// External reset level. Asserted holds `Resetting`.
    pub reset: bool,
    /// Instruction at [`Cpu::program_addr`], fetched combinationally.
    pub instruction: Op,
    /// Data byte at [`Cpu::read_addr`], fetched combinationally.
    pub read_data: u8,
    /// External transmit side can accept a byte this cycle.
    pub tx_ready: bool,
    /// External receive side offers a byte this cycle.
    pub rx_ready: bool,
    /// The offered receive byte (valid with `rx_ready`).
    pub rx_data: u8,
}

/// Signals the core drives during one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleOutputs {
    /// Data-store write address (the write pointer).
    pub write_addr: u16,
    /// Data-store write data. The store is written every cycle; for every
    /// instruction except Increment, Decrement, and a completing Input this
    /// is the read value unchanged.
    pub write_data: u8,
    /// Write enable. Always asserted; "no change" is expressed as writing
    /// the read value back.
    pub write_enable: bool,
    /// A byte is offered on the transmit side and may be taken this cycle.
    pub tx_ack: bool,
    /// The offered transmit byte (valid with `tx_ack`).
    pub tx_data: u8,
    /// The core accepts the offered receive byte this cycle.
    pub rx_ack: bool,
}

/// The processor core: execution state machine plus its two byte queues.
#[derive(Debug, Clone)]
pub struct Cpu {
    regs: CpuRegisters,
    tx_queue: ByteQueue,
    rx_queue: ByteQueue,
    program_len: usize,
    tape_len: usize,
}

impl Cpu {
    /// Create a core configured for a program of `program_len` instructions
    /// and a data store of `tape_len` cells. Both lengths are fixed at
    /// configuration time, like memory depths in the hardware design.
    pub fn new(program_len: usize, tape_len: usize) -> Self {
        Self {
            regs: CpuRegisters::default(),
            tx_queue: ByteQueue::new(),
            rx_queue: ByteQueue::new(),
            program_len,
            tape_len: tape_len.max(1),
        }
    }

    /// Current processor state.
    pub fn state(&self) -> CpuState {
        self.regs.state
    }

    /// Snapshot of the full register file.
    pub fn registers(&self) -> CpuRegisters {
        self.regs
    }

    /// Program-store fetch address for the current cycle.
    pub fn program_addr(&self) -> u16 {
        self.regs.pc
    }

    /// Data-store read address for the current cycle.
    pub fn read_addr(&self) -> u16 {
        self.regs.read_ptr
    }

    /// Bytes sitting in the transmit queue, accepted but not yet taken.
    pub fn tx_pending(&self) -> usize {
        self.tx_queue.len()
    }

    /// Bytes sitting in the receive queue, accepted but not yet consumed.
    pub fn rx_pending(&self) -> usize {
        self.rx_queue.len()
    }

    fn ptr_inc(&self, ptr: u16) -> u16 {
        ((ptr as usize + 1) % self.tape_len) as u16
    }

    fn ptr_dec(&self, ptr: u16) -> u16 {
        ((ptr as usize + self.tape_len - 1) % self.tape_len) as u16
    }

    fn pc_in_bounds(&self, pc: u16) -> bool {
        (pc as usize) < self.program_len
    }

    /// Simulate one clock cycle.
    ///
    /// Computes the cycle's combinational outputs from the current register
    /// snapshot and `inputs`, then commits the next snapshot and the queue
    /// transfers for this edge. Returns the outputs that were valid during
    /// the cycle, before the edge.
    pub fn tick(&mut self, inputs: CycleInputs) -> CycleOutputs {
        let cur = self.regs;
        let mut next = cur;

        // Transmit consumer handshake: offer the oldest queued byte; the
        // external side takes it by asserting ready in the same cycle.
        let tx_ack = !self.tx_queue.is_empty();
        let tx_data = self.tx_queue.peek().unwrap_or(0);
        let tx_take = tx_ack && inputs.tx_ready;

        // Receive producer handshake: accept an offered byte iff the queue
        // has room this cycle.
        let rx_ack = !self.rx_queue.is_full();
        let rx_accept = inputs.rx_ready && rx_ack;

        // Core-side transfers committed last edge complete on this one.
        let tx_push = cur.tx_req == Handshake::Requesting;
        let rx_pop = cur.rx_req == Handshake::Requesting;

        // Default write-back: the read value, unchanged.
        let mut write_data = inputs.read_data;

        match cur.state {
            CpuState::Halted => {}

            CpuState::Resetting => {
                next.pc = 0;
                next.read_ptr = 0;
                next.write_ptr = 0;
                next.loop_depth = 0;
                next.tx_req = Handshake::Idle;
                next.rx_req = Handshake::Idle;
                if !inputs.reset {
                    log::debug!("reset deasserted, entering Executing");
                    next.state = CpuState::Executing;
                }
            }

            CpuState::Executing => {
                if !self.pc_in_bounds(cur.pc) {
                    log::debug!("pc {} past end of program, halting", cur.pc);
                    next.state = CpuState::Halted;
                } else {
                    match inputs.instruction {
                        Op::Increment => {
                            write_data = inputs.read_data.wrapping_add(1);
                            next.pc = cur.pc.wrapping_add(1);
                        }
                        Op::Decrement => {
                            write_data = inputs.read_data.wrapping_sub(1);
                            next.pc = cur.pc.wrapping_add(1);
                        }
                        Op::PointerLeft => {
                            next.read_ptr = self.ptr_dec(cur.read_ptr);
                            next.write_ptr = self.ptr_dec(cur.write_ptr);
                            next.pc = cur.pc.wrapping_add(1);
                        }
                        Op::PointerRight => {
                            next.read_ptr = self.ptr_inc(cur.read_ptr);
                            next.write_ptr = self.ptr_inc(cur.write_ptr);
                            next.pc = cur.pc.wrapping_add(1);
                        }
                        Op::Output => match cur.tx_req {
                            // Commit a push only once the queue can take it;
                            // the pc holds until the byte is durably accepted.
                            Handshake::Idle => {
                                if !self.tx_queue.is_full() {
                                    next.tx_req = Handshake::Requesting;
                                }
                            }
                            Handshake::Requesting => {
                                next.tx_req = Handshake::Idle;
                                next.pc = cur.pc.wrapping_add(1);
                            }
                        },
                        Op::Input => match cur.rx_req {
                            Handshake::Idle => {
                                if !self.rx_queue.is_empty() {
                                    next.rx_req = Handshake::Requesting;
                                }
                            }
                            Handshake::Requesting => {
                                // The byte committed last edge lands in the
                                // cell this cycle.
                                write_data = self.rx_queue.peek().unwrap_or(0);
                                next.rx_req = Handshake::Idle;
                                next.pc = cur.pc.wrapping_add(1);
                            }
                        },
                        Op::LoopOpen => {
                            next.pc = cur.pc.wrapping_add(1);
                            if inputs.read_data == 0 {
                                log::debug!("loop at pc {} not taken, scanning forward", cur.pc);
                                next.state = CpuState::ScanForward;
                                next.loop_depth = 0;
                            }
                        }
                        Op::LoopClose => {
                            // Step back past the bracket and scan for its open.
                            log::debug!("loop close at pc {}, scanning backward", cur.pc);
                            next.state = CpuState::ScanBackward;
                            next.loop_depth = 0;
                            next.pc = cur.pc.wrapping_sub(1);
                        }
                    }
                }
            }

            CpuState::ScanForward => {
                if !self.pc_in_bounds(cur.pc) {
                    log::warn!("forward scan ran past end of program (unbalanced brackets), halting");
                    next.state = CpuState::Halted;
                } else {
                    next.pc = cur.pc.wrapping_add(1);
                    match inputs.instruction {
                        Op::LoopOpen => next.loop_depth = cur.loop_depth.saturating_add(1),
                        Op::LoopClose => {
                            if cur.loop_depth == 0 {
                                // Match found; pc already steps past it.
                                next.state = CpuState::Executing;
                            } else {
                                next.loop_depth = cur.loop_depth - 1;
                            }
                        }
                        _ => {}
                    }
                }
            }

            CpuState::ScanBackward => {
                if !self.pc_in_bounds(cur.pc) {
                    log::warn!("backward scan ran off the program (unbalanced brackets), halting");
                    next.state = CpuState::Halted;
                } else {
                    match inputs.instruction {
                        Op::LoopOpen => {
                            if cur.loop_depth == 0 {
                                // Match found; hold the pc so Executing
                                // re-fetches this bracket and re-checks the
                                // cell, producing the loop-repeat effect.
                                next.state = CpuState::Executing;
                            } else {
                                next.loop_depth = cur.loop_depth - 1;
                                next.pc = cur.pc.wrapping_sub(1);
                            }
                        }
                        Op::LoopClose => {
                            next.loop_depth = cur.loop_depth.saturating_add(1);
                            next.pc = cur.pc.wrapping_sub(1);
                        }
                        _ => next.pc = cur.pc.wrapping_sub(1),
                    }
                }
            }
        }

        // Reset is a level signal and dominates every transition.
        if inputs.reset {
            next.state = CpuState::Resetting;
        }

        // Clock edge: queue transfers, then the register swap. A pop and a
        // push landing on the same queue apply pop-first, like a synchronous
        // FIFO with simultaneous read and write.
        if tx_take {
            self.tx_queue.pop();
        }
        if tx_push {
            self.tx_queue.push(inputs.read_data);
        }
        if rx_pop {
            self.rx_queue.pop();
        }
        if rx_accept {
            self.rx_queue.push(inputs.rx_data);
        }
        self.regs = next;

        CycleOutputs {
            write_addr: cur.write_ptr,
            write_data,
            write_enable: true,
            tx_ack,
            tx_data,
            rx_ack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(instruction: Op, read_data: u8) -> CycleInputs {
        CycleInputs {
            reset: false,
            instruction,
            read_data,
            tx_ready: false,
            rx_ready: false,
            rx_data: 0,
        }
    }

    /// Pulse reset for one cycle and leave the core in Executing at pc 0.
    fn executing_cpu(program_len: usize) -> Cpu {
        let mut cpu = Cpu::new(program_len, 16);
        let mut i = inputs(Op::Increment, 0);
        i.reset = true;
        cpu.tick(i); // Halted -> Resetting
        cpu.tick(inputs(Op::Increment, 0)); // Resetting -> Executing
        assert_eq!(cpu.state(), CpuState::Executing);
        assert_eq!(cpu.program_addr(), 0);
        cpu
    }

    #[test]
    fn test_powers_on_halted() {
        let cpu = Cpu::new(8, 16);
        assert_eq!(cpu.state(), CpuState::Halted);
    }

    #[test]
    fn test_reset_forces_registers() {
        let mut cpu = executing_cpu(8);
        cpu.tick(inputs(Op::PointerRight, 0));
        assert_eq!(cpu.registers().read_ptr, 1);

        let mut i = inputs(Op::Increment, 0);
        i.reset = true;
        cpu.tick(i);
        assert_eq!(cpu.state(), CpuState::Resetting);
        cpu.tick(i); // held: registers forced to zero
        let regs = cpu.registers();
        assert_eq!((regs.pc, regs.read_ptr, regs.write_ptr), (0, 0, 0));
    }

    #[test]
    fn test_increment_writes_back_and_advances() {
        let mut cpu = executing_cpu(8);
        let out = cpu.tick(inputs(Op::Increment, 41));
        assert_eq!(out.write_data, 42);
        assert_eq!(out.write_addr, 0);
        assert!(out.write_enable);
        assert_eq!(cpu.program_addr(), 1);
    }

    #[test]
    fn test_cell_arithmetic_wraps() {
        let mut cpu = executing_cpu(8);
        let out = cpu.tick(inputs(Op::Increment, 0xFF));
        assert_eq!(out.write_data, 0);
        let out = cpu.tick(inputs(Op::Decrement, 0));
        assert_eq!(out.write_data, 0xFF);
    }

    #[test]
    fn test_pointer_moves_in_lockstep() {
        let mut cpu = executing_cpu(8);
        cpu.tick(inputs(Op::PointerRight, 0));
        let regs = cpu.registers();
        assert_eq!((regs.read_ptr, regs.write_ptr), (1, 1));

        cpu.tick(inputs(Op::PointerLeft, 0));
        let regs = cpu.registers();
        assert_eq!((regs.read_ptr, regs.write_ptr), (0, 0));
    }

    #[test]
    fn test_pointer_wraps_at_tape_edges() {
        let mut cpu = executing_cpu(8); // tape_len = 16
        cpu.tick(inputs(Op::PointerLeft, 0));
        assert_eq!(cpu.registers().read_ptr, 15);
        cpu.tick(inputs(Op::PointerRight, 0));
        assert_eq!(cpu.registers().read_ptr, 0);
    }

    #[test]
    fn test_pointer_move_leaves_cell_unchanged() {
        let mut cpu = executing_cpu(8);
        let out = cpu.tick(inputs(Op::PointerRight, 0x5A));
        assert_eq!(out.write_data, 0x5A);
    }

    #[test]
    fn test_output_handshake_two_cycles() {
        let mut cpu = executing_cpu(8);

        // Cycle 1: queue has room, commit the push; pc holds.
        cpu.tick(inputs(Op::Output, 0x41));
        assert_eq!(cpu.program_addr(), 0);
        assert_eq!(cpu.tx_pending(), 0);

        // Cycle 2: the byte lands in the queue and the pc advances.
        cpu.tick(inputs(Op::Output, 0x41));
        assert_eq!(cpu.program_addr(), 1);
        assert_eq!(cpu.tx_pending(), 1);
    }

    #[test]
    fn test_output_stalls_on_full_queue_without_losing_bytes() {
        let mut cpu = executing_cpu(16);

        // Emit four bytes with the external side never ready: fills the queue.
        for b in 0..4u8 {
            cpu.tick(inputs(Op::Output, b));
            cpu.tick(inputs(Op::Output, b));
        }
        assert_eq!(cpu.tx_pending(), 4);
        let stalled_pc = cpu.program_addr();

        // A fifth Output retries indefinitely while the queue is full.
        for _ in 0..5 {
            cpu.tick(inputs(Op::Output, 4));
        }
        assert_eq!(cpu.program_addr(), stalled_pc);
        assert_eq!(cpu.tx_pending(), 4);

        // External side drains one byte; the retry then goes through.
        let mut i = inputs(Op::Output, 4);
        i.tx_ready = true;
        let out = cpu.tick(i);
        assert!(out.tx_ack);
        assert_eq!(out.tx_data, 0);
        cpu.tick(inputs(Op::Output, 4)); // commit cycle
        cpu.tick(inputs(Op::Output, 4)); // push lands, pc advances
        assert_eq!(cpu.program_addr(), stalled_pc + 1);
        assert_eq!(cpu.tx_pending(), 4);
    }

    #[test]
    fn test_input_handshake_writes_offered_byte() {
        let mut cpu = executing_cpu(8);

        // Offer a byte on the receive side; the queue accepts it this edge.
        let mut i = inputs(Op::Input, 0);
        i.rx_ready = true;
        i.rx_data = 0x41;
        let out = cpu.tick(i);
        assert!(out.rx_ack);
        assert_eq!(cpu.rx_pending(), 1);

        // Commit the pop, then the byte lands in the cell.
        cpu.tick(inputs(Op::Input, 0));
        let out = cpu.tick(inputs(Op::Input, 0));
        assert_eq!(out.write_data, 0x41);
        assert_eq!(cpu.program_addr(), 1);
        assert_eq!(cpu.rx_pending(), 0);
    }

    #[test]
    fn test_input_stalls_on_empty_queue() {
        let mut cpu = executing_cpu(8);
        for _ in 0..5 {
            let out = cpu.tick(inputs(Op::Input, 0));
            assert_eq!(out.write_data, 0); // cell unchanged (reads 0)
        }
        assert_eq!(cpu.program_addr(), 0);
    }

    #[test]
    fn test_loop_open_taken_when_cell_nonzero() {
        let mut cpu = executing_cpu(8);
        cpu.tick(inputs(Op::LoopOpen, 1));
        assert_eq!(cpu.state(), CpuState::Executing);
        assert_eq!(cpu.program_addr(), 1);
    }

    #[test]
    fn test_loop_open_skips_when_cell_zero() {
        // Program: [ + ] +   — cell is zero, so the body must be skipped.
        let program = [
            Op::LoopOpen,
            Op::Increment,
            Op::LoopClose,
            Op::Increment,
        ];
        let mut cpu = executing_cpu(program.len());

        cpu.tick(inputs(program[0], 0));
        assert_eq!(cpu.state(), CpuState::ScanForward);

        // Scan over the body and the close; resume one past the match.
        cpu.tick(inputs(program[1], 0));
        assert_eq!(cpu.state(), CpuState::ScanForward);
        cpu.tick(inputs(program[2], 0));
        assert_eq!(cpu.state(), CpuState::Executing);
        assert_eq!(cpu.program_addr(), 3);
    }

    #[test]
    fn test_forward_scan_tracks_nesting() {
        // Program: [ [ ] [ ] ] +   with cell zero: skip to pc 6.
        let program = [
            Op::LoopOpen,
            Op::LoopOpen,
            Op::LoopClose,
            Op::LoopOpen,
            Op::LoopClose,
            Op::LoopClose,
            Op::Increment,
        ];
        let mut cpu = executing_cpu(program.len());

        cpu.tick(inputs(program[0], 0));
        while cpu.state() == CpuState::ScanForward {
            let pc = cpu.program_addr() as usize;
            cpu.tick(inputs(program[pc], 0));
        }
        assert_eq!(cpu.state(), CpuState::Executing);
        assert_eq!(cpu.program_addr(), 6);
    }

    #[test]
    fn test_backward_scan_holds_pc_at_match() {
        // Program: + [ - ]   with the cell nonzero at the close.
        let program = [Op::Increment, Op::LoopOpen, Op::Decrement, Op::LoopClose];
        let mut cpu = executing_cpu(program.len());

        cpu.tick(inputs(program[0], 0)); // cell becomes 1
        cpu.tick(inputs(program[1], 1)); // loop taken
        cpu.tick(inputs(program[2], 1)); // decrement
        cpu.tick(inputs(program[3], 0)); // close: scan backward from pc 2
        assert_eq!(cpu.state(), CpuState::ScanBackward);
        assert_eq!(cpu.program_addr(), 2);

        cpu.tick(inputs(program[2], 0)); // body instruction, keep walking
        assert_eq!(cpu.program_addr(), 1);
        cpu.tick(inputs(program[1], 0)); // the matching open: pc held
        assert_eq!(cpu.state(), CpuState::Executing);
        assert_eq!(cpu.program_addr(), 1);
    }

    #[test]
    fn test_write_back_idempotent_for_control_ops() {
        // Every instruction except Increment, Decrement, and a completing
        // Input writes the read value back unchanged.
        for op in [Op::PointerLeft, Op::PointerRight, Op::Output, Op::LoopOpen, Op::LoopClose] {
            let mut cpu = executing_cpu(8);
            let out = cpu.tick(inputs(op, 0x7F));
            assert_eq!(out.write_data, 0x7F, "{:?} must not change the cell", op);
        }

        // Scan cycles write the read value back too.
        let mut cpu = executing_cpu(8);
        cpu.tick(inputs(Op::LoopOpen, 0)); // enter ScanForward
        let out = cpu.tick(inputs(Op::Increment, 0x7F));
        assert_eq!(out.write_data, 0x7F);
    }

    #[test]
    fn test_halts_past_end_of_program() {
        let mut cpu = executing_cpu(1);
        cpu.tick(inputs(Op::Increment, 0));
        assert_eq!(cpu.program_addr(), 1);
        cpu.tick(inputs(Op::Increment, 0));
        assert_eq!(cpu.state(), CpuState::Halted);
    }

    #[test]
    fn test_unbalanced_close_halts() {
        // A lone ] scans backward off the front of the program.
        let mut cpu = executing_cpu(1);
        cpu.tick(inputs(Op::LoopClose, 0));
        assert_eq!(cpu.state(), CpuState::ScanBackward);
        cpu.tick(inputs(Op::LoopClose, 0));
        assert_eq!(cpu.state(), CpuState::Halted);
    }
}
