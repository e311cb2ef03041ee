use std::fmt::Display;

use log::debug;

use super::{
    error::{Error, SymResult},
    parse_hex,
    symbols::{CachedLookup, Symbol, SymbolIndex},
    Address,
};

pub const UNKNOWN_SYMBOL: &str = "(unknown)";

/// A single `<hex address>: <instruction>` line of an execution trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub address: Address,
    pub instruction: String,
}

impl TraceLine {
    pub fn parse(line: &str) -> SymResult<Self> {
        let malformed = || Error::MalformedTraceLine(line.to_owned());

        let (head, instruction) = line.split_once(' ').unwrap_or((line, ""));
        let address = head.strip_suffix(':').ok_or_else(malformed)?;
        let address = parse_hex(address).ok_or_else(malformed)?;

        Ok(Self {
            address,
            instruction: instruction.trim().to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLine<'a> {
    pub symbol: Option<&'a Symbol>,
    pub line: TraceLine,
}

impl AnnotatedLine<'_> {
    pub fn symbol_name(&self) -> &str {
        self.symbol.map_or(UNKNOWN_SYMBOL, |sym| sym.name.as_str())
    }
}

impl Display for AnnotatedLine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}  ({:#x})  {}",
            self.symbol_name(),
            self.line.address,
            self.line.instruction
        )
    }
}

/// Lazily annotates trace lines, one input line in flight at a time.
/// Lines that are not trace lines are skipped and counted.
pub struct Annotator<'a, I> {
    lines: I,
    lookup: CachedLookup<'a>,
    skipped: usize,
    unresolved: usize,
    annotated: usize,
}

pub fn annotate<I>(lines: I, index: &SymbolIndex) -> Annotator<'_, I::IntoIter>
where
    I: IntoIterator<Item = std::io::Result<String>>,
{
    Annotator {
        lines: lines.into_iter(),
        lookup: CachedLookup::new(index),
        skipped: 0,
        unresolved: 0,
        annotated: 0,
    }
}

impl<I> Annotator<'_, I> {
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    pub fn annotated(&self) -> usize {
        self.annotated
    }
}

impl<'a, I> Iterator for Annotator<'a, I>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    type Item = SymResult<AnnotatedLine<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.lines.next()? {
                Ok(raw) => raw,
                Err(err) => return Some(Err(err.into())),
            };

            let line = match TraceLine::parse(raw.trim_end_matches('\r')) {
                Ok(line) => line,
                Err(err) => {
                    debug!("{}", err);
                    self.skipped += 1;
                    continue;
                }
            };

            let symbol = match self.lookup.lookup_containing(line.address) {
                Ok(sym) => Some(sym),
                Err(err) => {
                    debug!("{}", err);
                    self.unresolved += 1;
                    None
                }
            };
            self.annotated += 1;
            return Some(Ok(AnnotatedLine { symbol, line }));
        }
    }
}

#[cfg(test)]
mod test {
    use super::{annotate, TraceLine};
    use crate::core::{
        error::Error,
        map::{parse, test::MAP},
        symbols::SymbolIndex,
    };

    fn lines(text: &str) -> Vec<std::io::Result<String>> {
        text.lines().map(|l| Ok(l.to_owned())).collect()
    }

    fn index() -> SymbolIndex {
        parse(MAP).unwrap().into()
    }

    #[test]
    fn parse_line() {
        assert_eq!(
            TraceLine {
                address: 0x1018,
                instruction: "mov eax, ebx".into()
            },
            TraceLine::parse("1018: mov eax, ebx").unwrap()
        );
        assert_eq!(
            0x100000,
            TraceLine::parse("0x00100000:  movl $0x1, %eax")
                .unwrap()
                .address
        );
        assert_eq!("", TraceLine::parse("1018:").unwrap().instruction);
    }

    #[test]
    fn malformed_lines() {
        for line in [
            "",
            " mov eax, ebx",
            "1018 mov eax, ebx",
            "IN: kernel_start",
            "zz18: mov eax, ebx",
            ":",
        ] {
            assert!(
                matches!(TraceLine::parse(line), Err(Error::MalformedTraceLine(_))),
                "{line}"
            );
        }
    }

    #[test]
    fn annotates_with_floor_symbol() {
        let index = index();
        let out: Vec<String> = annotate(lines("1018: mov eax, ebx"), &index)
            .map(|l| l.unwrap().to_string())
            .collect();
        assert_eq!(vec!["bar  (0x1018)  mov eax, ebx"], out);

        let out: Vec<String> = annotate(lines("1008: mov eax, ebx"), &index)
            .map(|l| l.unwrap().to_string())
            .collect();
        assert_eq!(vec!["foo  (0x1008)  mov eax, ebx"], out);
    }

    #[test]
    fn empty_trace() {
        let index = index();
        assert_eq!(0, annotate(lines(""), &index).count());
    }

    #[test]
    fn skips_and_placeholders() {
        let index = index();
        let trace = "\
----------------
IN: foo
1000: push rbp
0x1001: mov rbp, rsp
zzzz: garbage
800: nop
1000: push rbp
";
        let mut annotator = annotate(lines(trace), &index);
        let out: Vec<String> = annotator
            .by_ref()
            .map(|l| l.unwrap().to_string())
            .collect();
        assert_eq!(
            vec![
                "foo  (0x1000)  push rbp",
                "foo  (0x1001)  mov rbp, rsp",
                "(unknown)  (0x800)  nop",
                "foo  (0x1000)  push rbp",
            ],
            out
        );
        assert_eq!(3, annotator.skipped());
        assert_eq!(1, annotator.unresolved());
        assert_eq!(4, annotator.annotated());
    }

    #[test]
    fn io_errors_are_passed_on() {
        let index = index();
        let source = vec![
            Ok("1000: nop".to_owned()),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "gone")),
            Ok("1010: nop".to_owned()),
        ];
        let out: Vec<_> = annotate(source, &index).collect();
        assert_eq!(3, out.len());
        assert!(matches!(out[1], Err(Error::Io(_))));
        assert_eq!("bar", out[2].as_ref().unwrap().symbol_name());
    }
}
