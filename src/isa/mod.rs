//! Brainfuck bytecode instruction set.
//!
//! The core executes a fixed 8-instruction bytecode. Each instruction is a
//! single code with no operands; the program store hands one to the core per
//! fetch, combinationally.
//!
//! # Source format
//!
//! Program source is plain text. The assembler is a stateless one-pass
//! filter-and-map: characters outside `+ - < > [ ] . ,` are discarded
//! (conventionally used as comments), and each retained character maps 1:1
//! to an [`Op`], preserving order. Bracket balance is NOT checked here; the
//! core resolves loops at run time and halts if a scan runs off the program
//! (see the bounds policy in the system module).

use std::fmt;

/// One bytecode instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `+` — increment the current cell (wraps mod 256).
    Increment,
    /// `-` — decrement the current cell (wraps mod 256).
    Decrement,
    /// `<` — move the data pointer one cell left.
    PointerLeft,
    /// `>` — move the data pointer one cell right.
    PointerRight,
    /// `.` — emit the current cell on the transmit stream.
    Output,
    /// `,` — consume a byte from the receive stream into the current cell.
    Input,
    /// `[` — if the current cell is zero, skip past the matching `]`.
    LoopOpen,
    /// `]` — scan back to the matching `[` and re-check its condition.
    LoopClose,
}

impl Op {
    /// Map a source character to its instruction, if it is one of the eight.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Op::Increment),
            '-' => Some(Op::Decrement),
            '<' => Some(Op::PointerLeft),
            '>' => Some(Op::PointerRight),
            '.' => Some(Op::Output),
            ',' => Some(Op::Input),
            '[' => Some(Op::LoopOpen),
            ']' => Some(Op::LoopClose),
            _ => None,
        }
    }

    /// The source character for this instruction.
    pub fn glyph(self) -> char {
        match self {
            Op::Increment => '+',
            Op::Decrement => '-',
            Op::PointerLeft => '<',
            Op::PointerRight => '>',
            Op::Output => '.',
            Op::Input => ',',
            Op::LoopOpen => '[',
            Op::LoopClose => ']',
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

/// Assemble program source into the bytecode array fed to the program store.
///
/// Discards every character that is not one of the eight instruction glyphs
/// and maps the rest in order. Never fails; an all-comment source yields an
/// empty program.
pub fn assemble(source: &str) -> Vec<Op> {
    source.chars().filter_map(Op::from_char).collect()
}
