use std::{
    io::{BufRead, BufReader, BufWriter, LineWriter, Write},
    path::PathBuf,
};

use crate::prelude::SymResult;
#[cfg(feature = "cli")]
use clap::{Args, CommandFactory, Parser, Subcommand};
#[cfg(feature = "cli")]
use clap_complete::{generate, Generator, Shell};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref CFG: Config = Config::new();
}

#[cfg_attr(feature = "cli", derive(Args))]
#[derive(Clone, Debug, Default)]
pub struct AnnotateCommand {
    /// trace file, stdin if omitted
    input: Option<PathBuf>,
    /// annotated output, stdout if omitted
    output: Option<PathBuf>,
}

impl AnnotateCommand {
    pub fn input(&self) -> SymResult<Box<dyn BufRead>> {
        Ok(if let Some(path) = &self.input {
            Box::new(BufReader::new(std::fs::File::open(path)?))
        } else {
            Box::new(BufReader::new(std::io::stdin()))
        })
    }

    pub fn output(&self) -> SymResult<Box<dyn Write>> {
        Ok(if let Some(path) = &self.output {
            Box::new(BufWriter::new(std::fs::File::create(path)?))
        } else {
            Box::new(LineWriter::new(std::io::stdout().lock()))
        })
    }
}

#[cfg_attr(feature = "cli", derive(Args))]
#[derive(Clone, Debug, Default)]
pub struct ResolveCommand {
    /// read queries from a file instead of the terminal
    pub input: Option<PathBuf>,
}

#[cfg_attr(feature = "cli", derive(Args))]
#[derive(Clone, Debug, Default)]
pub struct DumpCommand {
    #[cfg_attr(feature = "cli", arg(long))]
    pub ron: bool,
}

#[cfg_attr(feature = "cli", derive(Subcommand))]
#[derive(Clone, Debug)]
pub enum Commands {
    /// Look up addresses interactively
    Resolve(ResolveCommand),
    /// Add symbol names to an execution trace
    Annotate(AnnotateCommand),
    /// Print the symbol table
    Dump(DumpCommand),
    /// Look up the given addresses and exit
    Lookup {
        #[cfg_attr(feature = "cli", arg(required = true))]
        addresses: Vec<String>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Resolve(Default::default())
    }
}

#[derive(Debug, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(author, version, about, long_about = None))]
pub struct Config {
    #[cfg_attr(feature = "cli", command(subcommand))]
    pub command: Option<Commands>,

    // ld map file to take the symbols from
    #[cfg_attr(feature = "cli", clap(long, short, global = true))]
    pub map: Option<PathBuf>,

    #[cfg_attr(feature = "cli", arg(short, long, global = true, action = clap::ArgAction::Count))]
    pub verbose: u8,

    #[cfg_attr(feature = "cli", clap(long, value_name = "SHELL"))]
    #[cfg(feature = "cli")]
    pub completions: Option<Shell>,
}

impl Config {
    #[cfg(feature = "cli")]
    pub fn new() -> Self {
        Self::parse()
    }

    #[cfg(not(feature = "cli"))]
    pub fn new() -> Self {
        Default::default()
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(feature = "cli")]
pub fn generate_completion<G: Generator>(gen: G) {
    generate(
        gen,
        &mut Config::command(),
        Config::command().get_name(),
        &mut std::io::stdout(),
    );
}

#[cfg(all(test, feature = "cli"))]
mod test {
    use clap::Parser;

    use super::{Commands, Config};

    #[test]
    fn annotate_args() {
        let cfg =
            Config::try_parse_from(["symtrace", "-m", "kernel.map", "annotate", "qemu.log"]).unwrap();
        assert_eq!(Some("kernel.map".into()), cfg.map);
        assert!(matches!(cfg.command, Some(Commands::Annotate(_))));
    }

    #[test]
    fn verbosity() {
        let cfg = Config::try_parse_from(["symtrace", "dump", "-vv", "--map", "k.map"]).unwrap();
        assert_eq!(log::LevelFilter::Debug, cfg.log_level());
        assert!(matches!(cfg.command, Some(Commands::Dump(ref d)) if !d.ron));
    }

    #[test]
    fn resolve_is_the_default() {
        let cfg = Config::try_parse_from(["symtrace", "-m", "k.map"]).unwrap();
        assert!(matches!(
            cfg.command.unwrap_or_default(),
            Commands::Resolve(ref r) if r.input.is_none()
        ));
    }

    #[test]
    fn lookup_needs_addresses() {
        assert!(Config::try_parse_from(["symtrace", "-m", "k.map", "lookup"]).is_err());
        let cfg = Config::try_parse_from(["symtrace", "-m", "k.map", "lookup", "1000", "0x2000"])
            .unwrap();
        match cfg.command {
            Some(Commands::Lookup { addresses }) => assert_eq!(vec!["1000", "0x2000"], addresses),
            _ => panic!("expected lookup"),
        }
    }
}
