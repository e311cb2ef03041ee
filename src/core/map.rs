//! Reader for GNU ld map files (`-Map=<file>`).
//!
//! A map is a sequence of sections in a fixed order. Only the final
//! "Linker script and memory map" section has symbol addresses, everything
//! before it is skipped, but the headers still have to show up in order.

use std::path::Path;

use log::{debug, info, trace};

use super::{
    error::{Error, MapFault, SymResult},
    parse_hex,
    symbols::{Symbol, SymbolIndex, SymbolTable},
    Address,
};

pub const ARCHIVE_MEMBERS: &str = "Archive member included to satisfy reference by file (symbol)";
pub const COMMON_SYMBOLS: &str = "Allocating common symbols";
pub const DISCARDED_SECTIONS: &str = "Discarded input sections";
pub const MEMORY_CONFIGURATION: &str = "Memory Configuration";
pub const MEMORY_MAP: &str = "Linker script and memory map";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    /// nothing read yet, the first line has to be the archive header
    Start,
    ArchiveMembers,
    CommonSymbols,
    DiscardedSections,
    MemoryConfiguration,
    /// terminal stage that yields symbols
    MemoryMap,
}

struct Transition {
    from: Stage,
    header: &'static str,
    to: Stage,
}

static TRANSITIONS: [Transition; 5] = [
    Transition {
        from: Stage::Start,
        header: ARCHIVE_MEMBERS,
        to: Stage::ArchiveMembers,
    },
    Transition {
        from: Stage::ArchiveMembers,
        header: COMMON_SYMBOLS,
        to: Stage::CommonSymbols,
    },
    Transition {
        from: Stage::CommonSymbols,
        header: DISCARDED_SECTIONS,
        to: Stage::DiscardedSections,
    },
    Transition {
        from: Stage::DiscardedSections,
        header: MEMORY_CONFIGURATION,
        to: Stage::MemoryConfiguration,
    },
    Transition {
        from: Stage::MemoryConfiguration,
        header: MEMORY_MAP,
        to: Stage::MemoryMap,
    },
];

impl Stage {
    fn transition(self) -> Option<&'static Transition> {
        TRANSITIONS.iter().find(|t| t.from == self)
    }

    /// The header line that ends this stage
    pub fn expected_header(self) -> Option<&'static str> {
        self.transition().map(|t| t.header)
    }

    /// Feeds a line to a skipping stage and returns the stage for the next line.
    /// Only Start rejects lines that are not its header.
    pub fn advance(self, line: &str) -> SymResult<Stage> {
        match self.transition() {
            Some(t) if t.header == line => Ok(t.to),
            Some(_) if self == Stage::Start => {
                Err(MapFault::UnexpectedHeader(line.to_owned()).into())
            }
            _ => Ok(self),
        }
    }
}

/// Splits a memory map line into address and symbol name.
///
/// Symbol lines look like
/// `                0x0000000000100000                kernel_start`.
/// Linker script assignments (`foo = 0x2000`), section placements
/// (`0x100000  0x3a  file.o`) and everything else yield None.
pub fn parse_symbol_line(line: &str) -> Option<(Address, &str)> {
    if !line.starts_with("  ") {
        return None;
    }
    let (address, decl) = line.trim_start().split_once(char::is_whitespace)?;
    if !address.starts_with("0x") {
        return None;
    }
    let address = parse_hex(address)?;

    let decl = decl.trim();
    if is_assignment(decl) {
        return None;
    }
    let first = decl.split_whitespace().next()?;
    if first.starts_with("0x") && parse_hex(first).is_some() {
        return None;
    }

    // drop parameter lists of demangled names
    let name = decl[..params_start(decl)].trim();
    if name.is_empty() {
        None
    } else {
        Some((address, name))
    }
}

/// ld prints script assignments as `sym = expr`, `. = ALIGN (..)` or
/// `PROVIDE (sym = expr)`. C++ operators (`operator=`, `operator==`) are symbols.
fn is_assignment(decl: &str) -> bool {
    if decl.contains(" = ") {
        return true;
    }
    let name = &decl[..params_start(decl)];
    !name.contains("operator") && name.contains('=')
}

/// Offset of the parameter list, `operator()` is part of the name
fn params_start(decl: &str) -> usize {
    const CALL_OPERATOR: &str = "operator()";
    let from = decl
        .find(CALL_OPERATOR)
        .map_or(0, |i| i + CALL_OPERATOR.len());
    decl[from..].find('(').map_or(decl.len(), |i| from + i)
}

/// Parses the text of a map file into a symbol table.
/// Symbol ends are back-filled from the next symbol in the file.
pub fn parse(text: &str) -> SymResult<SymbolTable> {
    let mut stage = Stage::Start;
    let mut table = SymbolTable::default();
    let mut last: Option<Address> = None;

    for (i, line) in text.lines().enumerate() {
        if stage != Stage::MemoryMap {
            let next = stage.advance(line)?;
            if next != stage {
                debug!("line {}: {:?} -> {:?}", i + 1, stage, next);
                stage = next;
            }
            continue;
        }

        let Some((address, name)) = parse_symbol_line(line) else {
            continue;
        };

        if let Some(previous) = last {
            if address < previous {
                return Err(Error::MalformedMapFile(MapFault::SymbolOutOfOrder {
                    line: i + 1,
                    previous,
                    address,
                }));
            }
            if address != previous {
                table.set_end(previous, address);
            }
        }

        trace!("{:#x} {}", address, name);
        if let Some(old) = table.def_symbol(Symbol::new(name.to_owned(), address)) {
            debug!("{} replaces {} at {:#x}", name, old.name, address);
        }
        last = Some(address);
    }

    if let Some(header) = stage.expected_header() {
        return Err(MapFault::MissingSection(header).into());
    }

    info!("{} symbols in map", table.len());
    Ok(table)
}

/// Reads and parses a map file into a fresh index
pub fn load(path: impl AsRef<Path>) -> SymResult<SymbolIndex> {
    let path = path.as_ref();
    debug!("loading map {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| Error::MapUnreadable {
        path: path.to_owned(),
        source,
    })?;
    Ok(parse(&text)?.into())
}
