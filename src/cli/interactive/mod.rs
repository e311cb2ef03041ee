pub mod command;

use std::fmt::Display;

use console::style;
use log::debug;
use rustyline::error::ReadlineError;

use crate::prelude::{parse_hex, Address, Error, SymResult, Symbol, SymbolIndex};

use self::command::{default_actions, ActionList};

pub const PROMPT: &str = "Symbol address (hex), blank to exit: ";

pub enum CallbackKind {
    None,
    Symbol,
    Error,
}

pub trait InteractiveCallback: FnMut(&str, CallbackKind) -> SymResult<()> {}

impl<T> InteractiveCallback for T where T: FnMut(&str, CallbackKind) -> SymResult<()> {}

pub fn default_interactive_callback(s: &str, kind: CallbackKind) -> SymResult<()> {
    match kind {
        CallbackKind::None => print!("{}", s),
        CallbackKind::Symbol => print!("{}", style(s).green()),
        CallbackKind::Error => eprint!("{}", style(s).red().for_stderr()),
    }
    Ok(())
}

/// Pulls the address out of a query line.
/// Takes bare hex or debugger register dumps like `RIP: 0xffff8000, RSP: ...`.
/// A blank line yields None.
pub fn parse_query(line: &str) -> SymResult<Option<Address>> {
    let mut text = line.trim();
    if let Some(rest) = text.strip_prefix("RIP:") {
        text = rest
            .split_whitespace()
            .next()
            .map(|t| t.trim_end_matches(','))
            .unwrap_or_default();
        if text.is_empty() {
            return Err(Error::InvalidUserInput(line.trim().to_owned()));
        }
    }
    if text.is_empty() {
        return Ok(None);
    }
    parse_hex(text)
        .map(Some)
        .ok_or_else(|| Error::InvalidUserInput(text.to_owned()))
}

/// An address and the symbol it falls into
pub struct Resolution<'a> {
    pub address: Address,
    pub symbol: &'a Symbol,
}

impl<'a> Resolution<'a> {
    pub fn resolve(index: &'a SymbolIndex, address: Address) -> SymResult<Self> {
        let symbol = index.lookup_containing(address)?;
        Ok(Self { address, symbol })
    }

    pub fn offset(&self) -> u64 {
        self.symbol.offset_of(self.address)
    }
}

impl Display for Resolution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:#x}: {} + {:#x}",
            self.address,
            self.symbol.name,
            self.offset()
        )
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Interactive {
    actions: ActionList,
    index: SymbolIndex,
}

impl Interactive {
    pub fn new(index: SymbolIndex) -> Self {
        Self {
            actions: default_actions(),
            index,
        }
    }

    pub fn index(&self) -> &SymbolIndex {
        &self.index
    }

    pub fn execute(&mut self, mut f: impl InteractiveCallback, line: &str) -> SymResult<Flow> {
        let cmd = self.actions.eval(line)?;
        cmd.execute(&mut f, &mut self.index, &self.actions)
    }

    /// Executes a line and reports a failed query through the callback,
    /// a single bad entry does not end the session
    pub fn feed(&mut self, mut f: impl InteractiveCallback, line: &str) -> SymResult<Flow> {
        match self.execute(&mut f, line) {
            Ok(flow) => Ok(flow),
            Err(err @ Error::Io(_)) | Err(err @ Error::Other(_)) => Err(err),
            Err(err) => {
                debug!("query '{}' failed: {:?}", line.trim(), err);
                f(&format!("{}\n", err), CallbackKind::Error)?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Runs the session over a redirected line source.
    /// Ends on a blank line or at the end of the source.
    pub fn run_lines<I>(&mut self, mut f: impl InteractiveCallback, lines: I) -> SymResult<()>
    where
        I: IntoIterator<Item = std::io::Result<String>>,
    {
        for line in lines {
            if self.feed(&mut f, &line?)? == Flow::Exit {
                break;
            }
        }
        Ok(())
    }
}

pub fn command_line(mut interactive: Interactive) -> SymResult<()> {
    let mut rl = rustyline::DefaultEditor::new().map_err(anyhow::Error::from)?;
    loop {
        let readline = rl.readline(PROMPT);
        match readline {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())
                        .map_err(anyhow::Error::from)?;
                }
                if interactive.feed(default_interactive_callback, &line)? == Flow::Exit {
                    return Ok(());
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(()),
            Err(err) => return Err(anyhow::Error::from(err).into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{parse_query, CallbackKind, Flow, Interactive, Resolution};
    use crate::prelude::{parse, Error, SymResult, SymbolIndex};

    const MAP: &str = "\
Archive member included to satisfy reference by file (symbol)
Allocating common symbols
Discarded input sections
Memory Configuration
Linker script and memory map
                0x0000000000001000                foo
                0x0000000000001010                bar
                0x0000000000001020                baz
";

    fn index() -> SymbolIndex {
        parse(MAP).unwrap().into()
    }

    fn session(lines: &str) -> (String, String) {
        let mut out = String::new();
        let mut err = String::new();
        let mut interactive = Interactive::new(index());
        interactive
            .run_lines(
                |s: &str, kind: CallbackKind| -> SymResult<()> {
                    match kind {
                        CallbackKind::Error => err.push_str(s),
                        _ => out.push_str(s),
                    }
                    Ok(())
                },
                lines.lines().map(|l| Ok::<_, std::io::Error>(l.to_owned())),
            )
            .unwrap();
        (out, err)
    }

    #[test]
    fn queries() {
        assert_eq!(Some(0x1015), parse_query("1015").unwrap());
        assert_eq!(Some(0x1015), parse_query("  0x1015\n").unwrap());
        assert_eq!(
            Some(0xffffffff80001234),
            parse_query("RIP: 0xffffffff80001234, RSP: 0xffffffff80100000").unwrap()
        );
        assert_eq!(None, parse_query("").unwrap());
        assert_eq!(None, parse_query("   ").unwrap());
        assert!(matches!(parse_query("main"), Err(Error::InvalidUserInput(_))));
        assert!(matches!(parse_query("RIP:"), Err(Error::InvalidUserInput(_))));
    }

    #[test]
    fn resolution() {
        let index = index();
        assert_eq!(
            "0x1015: bar + 0x5",
            Resolution::resolve(&index, 0x1015).unwrap().to_string()
        );
        assert_eq!(
            "0x1000: foo + 0x0",
            Resolution::resolve(&index, 0x1000).unwrap().to_string()
        );
        assert!(matches!(
            Resolution::resolve(&index, 0x0ff0),
            Err(Error::UnresolvedAddress(0x0ff0))
        ));
    }

    #[test]
    fn bad_entries_do_not_end_the_session() {
        let (out, err) = session("1015\nhello\n0ff0\nRIP: 0x1021, RSP: 0x0\n\n1000\n");
        assert_eq!("0x1015: bar + 0x5\n0x1021: baz + 0x1\n", out);
        assert_eq!(2, err.lines().count());
        assert!(err.contains("hello"));
    }

    #[test]
    fn failed_reload_keeps_the_session() {
        let (out, err) = session("load /nonexistent/kernel.map\n1004\n");
        assert_eq!("0x1004: foo + 0x4\n", out);
        assert_eq!(1, err.lines().count());
        assert!(err.contains("/nonexistent/kernel.map"));
    }

    #[test]
    fn ends_with_the_source() {
        let (out, err) = session("1010");
        assert_eq!("0x1010: bar + 0x0\n", out);
        assert!(err.is_empty());
    }

    #[test]
    fn feed_flow() {
        let mut interactive = Interactive::new(index());
        let mut sink = |_: &str, _: CallbackKind| -> SymResult<()> { Ok(()) };
        assert_eq!(Flow::Continue, interactive.feed(&mut sink, "1000").unwrap());
        assert_eq!(Flow::Continue, interactive.feed(&mut sink, "xyz").unwrap());
        assert_eq!(Flow::Exit, interactive.feed(&mut sink, "").unwrap());
        assert_eq!(Flow::Exit, interactive.feed(&mut sink, "q").unwrap());
    }
}
