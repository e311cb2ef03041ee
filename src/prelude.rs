pub use crate::core::{
    config::{AnnotateCommand, Commands, Config, DumpCommand, ResolveCommand, CFG},
    error::{Error, MapFault, SymResult},
    map::{load, parse},
    parse_hex,
    symbols::{CachedLookup, Symbol, SymbolIndex, SymbolTable},
    trace::{annotate, AnnotatedLine, Annotator, TraceLine},
    Address,
};
