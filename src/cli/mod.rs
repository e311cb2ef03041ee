pub mod interactive;

use crate::{
    core::config::generate_completion,
    prelude::{
        annotate, load, AnnotateCommand, Commands, Config, DumpCommand, ResolveCommand, SymResult,
        SymbolIndex,
    },
};
use anyhow::anyhow;
use log::info;
use std::io::{prelude::*, BufReader, IsTerminal};

use self::interactive::{
    command_line, default_interactive_callback, CallbackKind, Flow, Interactive,
    InteractiveCallback,
};

pub fn init_logger(cfg: &Config) -> SymResult<()> {
    simple_logger::SimpleLogger::new()
        .with_level(cfg.log_level())
        .init()
        .map_err(anyhow::Error::from)?;
    Ok(())
}

pub fn init(cfg: &Config) -> SymResult<()> {
    if let Some(shell) = cfg.completions {
        generate_completion(shell);
        std::process::exit(0);
    }

    init_logger(cfg)?;

    let path = cfg
        .map
        .as_ref()
        .ok_or_else(|| anyhow!("no map file given, pass one with --map"))?;
    let index = load(path)?;

    match cfg.command.clone().unwrap_or_default() {
        Commands::Resolve(r) => resolve(cfg, &r, index),
        Commands::Annotate(a) => annotate_trace(cfg, &a, &index),
        Commands::Dump(d) => dump(cfg, &d, &index),
        Commands::Lookup { addresses } => lookup(cfg, &addresses, index),
    }
}

fn resolve(_cfg: &Config, cmd: &ResolveCommand, index: SymbolIndex) -> SymResult<()> {
    let mut interactive = Interactive::new(index);
    if let Some(path) = &cmd.input {
        let input = BufReader::new(std::fs::File::open(path)?);
        interactive.run_lines(default_interactive_callback, input.lines())
    } else if !std::io::stdin().is_terminal() {
        interactive.run_lines(default_interactive_callback, std::io::stdin().lock().lines())
    } else {
        command_line(interactive)
    }
}

fn lookup(_cfg: &Config, addresses: &[String], index: SymbolIndex) -> SymResult<()> {
    lookup_addresses(default_interactive_callback, addresses, index)
}

fn lookup_addresses(
    mut f: impl InteractiveCallback,
    addresses: &[String],
    index: SymbolIndex,
) -> SymResult<()> {
    let mut interactive = Interactive::new(index);
    for address in addresses {
        // a blank argument would end a session, here it is just bad input
        if address.trim().is_empty() {
            report(&mut f, "empty address")?;
            continue;
        }
        if interactive.feed(&mut f, address)? == Flow::Exit {
            break;
        }
    }
    Ok(())
}

fn report(f: &mut impl InteractiveCallback, msg: &str) -> SymResult<()> {
    f(&format!("{}\n", msg), CallbackKind::Error)
}

fn annotate_trace(_cfg: &Config, cmd: &AnnotateCommand, index: &SymbolIndex) -> SymResult<()> {
    // set up io
    let input = cmd.input()?;
    let mut output = cmd.output()?;

    let counts = write_annotated(input, &mut output, index)?;
    info!(
        "annotated {} lines, {} skipped, {} without symbol",
        counts.annotated, counts.skipped, counts.unresolved
    );
    Ok(())
}

/// Line counts of a finished annotation run
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub struct AnnotateCounts {
    pub annotated: usize,
    pub skipped: usize,
    pub unresolved: usize,
}

pub fn write_annotated(
    input: impl BufRead,
    output: &mut impl Write,
    index: &SymbolIndex,
) -> SymResult<AnnotateCounts> {
    let mut annotator = annotate(input.lines(), index);
    for line in annotator.by_ref() {
        writeln!(output, "{}", line?)?;
    }
    output.flush()?;

    Ok(AnnotateCounts {
        annotated: annotator.annotated(),
        skipped: annotator.skipped(),
        unresolved: annotator.unresolved(),
    })
}

fn dump(_cfg: &Config, cmd: &DumpCommand, index: &SymbolIndex) -> SymResult<()> {
    write_dump(&mut std::io::stdout().lock(), index, cmd.ron)
}

/// One symbol per line as `start end name`, `?` for an open end.
/// With `ron` the whole table is written as a RON list instead.
pub fn write_dump(output: &mut impl Write, index: &SymbolIndex, ron: bool) -> SymResult<()> {
    if ron {
        let symbols: Vec<_> = index.iter().collect();
        let data = ron::ser::to_string_pretty(&symbols, ron::ser::PrettyConfig::default())
            .map_err(anyhow::Error::from)?;
        writeln!(output, "{}", data)?;
        return Ok(());
    }

    for sym in index.iter() {
        match sym.end_addr {
            Some(end) => writeln!(output, "{:#018x} {:#018x} {}", sym.start_addr, end, sym.name)?,
            None => writeln!(output, "{:#018x} {:>18} {}", sym.start_addr, "?", sym.name)?,
        }
    }
    Ok(())
}
