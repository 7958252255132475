//! bfcpu-emu: run a Brainfuck program on the emulated soft-CPU core.
//!
//! Usage:
//!   bfcpu-emu <program.bf> [--input TEXT] [--max-cycles N] [--dump-tape]

use std::env;
use std::io::Write;

use anyhow::{bail, Context};
use bfcpu_emu::{assemble, Config, System};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut path = None;
    let mut input_text: Option<String> = None;
    let mut max_cycles: Option<u64> = None;
    let mut dump_tape = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_text = Some(
                    args.get(i)
                        .context("--input requires a value")?
                        .clone(),
                );
            }
            "--max-cycles" => {
                i += 1;
                max_cycles = Some(
                    args.get(i)
                        .context("--max-cycles requires a value")?
                        .parse()
                        .context("--max-cycles must be a number")?,
                );
            }
            "--dump-tape" => dump_tape = true,
            arg if !arg.starts_with('-') => path = Some(arg.to_string()),
            arg => bail!("unknown option: {}", arg),
        }
        i += 1;
    }

    let path = match path {
        Some(p) => p,
        None => {
            eprintln!("usage: bfcpu-emu <program.bf> [--input TEXT] [--max-cycles N] [--dump-tape]");
            std::process::exit(2);
        }
    };

    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path))?;
    let program = assemble(&source);
    log::info!("assembled {} instructions from {}", program.len(), path);

    let config = Config::get();
    let mut system = System::new(program, config)?;
    if let Some(max) = max_cycles {
        system.set_max_cycles(max);
    }
    if let Some(text) = &input_text {
        system.feed_input(text.as_bytes());
    }

    let summary = system.run_until_quiescent()?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(system.output())?;
    stdout.flush()?;

    log::info!(
        "halted after {} cycles ({} bytes out, {} bytes in)",
        summary.cycles,
        summary.bytes_out,
        summary.bytes_in
    );

    if dump_tape {
        eprintln!();
        eprintln!("pointer at cell {}", system.pointer());
        for base in (0..32u16).step_by(16) {
            let row: Vec<String> = (base..base + 16)
                .map(|a| format!("{:02X}", system.cell(a)))
                .collect();
            eprintln!("{:04X}: {}", base, row.join(" "));
        }
    }

    Ok(())
}
