#[cfg(not(any(feature = "cli")))]
fn main() {}

#[cfg(feature = "cli")]
fn main() -> symtrace::prelude::SymResult<()> {
    symtrace::cli::init(&symtrace::prelude::CFG)
}
