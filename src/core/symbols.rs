use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{
    error::{Error, SymResult},
    Address,
};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub start_addr: Address,
    /// Exclusive end. This is the start of the next symbol in the map,
    /// the last symbol is open ended
    #[cfg_attr(feature = "serde", serde(default))]
    pub end_addr: Option<Address>,
}

impl Symbol {
    pub fn new(name: String, start_addr: Address) -> Self {
        Self {
            name,
            start_addr,
            end_addr: None,
        }
    }

    pub fn size(&self) -> Option<u64> {
        self.end_addr.map(|end| end.saturating_sub(self.start_addr))
    }

    pub fn offset_of(&self, address: Address) -> u64 {
        address.saturating_sub(self.start_addr)
    }
}

/// Symbols of a single map file keyed by their start address
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct SymbolTable {
    map: BTreeMap<Address, Symbol>,
}

impl SymbolTable {
    /// Defines a symbol and returns the one it replaced at the same address.
    /// Maps alias local and global labels at one address, the last one wins.
    pub fn def_symbol(&mut self, sym: Symbol) -> Option<Symbol> {
        self.map.insert(sym.start_addr, sym)
    }

    pub fn set_end(&mut self, start: Address, end: Address) {
        if let Some(sym) = self.map.get_mut(&start) {
            sym.end_addr = Some(end);
        }
    }

    pub fn get_symbol(&self, address: Address) -> Option<&Symbol> {
        self.map.get(&address)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.map.values()
    }
}

/// Read-only lookup structure over one symbol table.
/// A reload builds a new index instead of touching this one.
#[derive(Default, Clone, Debug)]
pub struct SymbolIndex {
    table: SymbolTable,
    names: HashMap<String, Address>,
}

impl From<SymbolTable> for SymbolIndex {
    fn from(table: SymbolTable) -> Self {
        // duplicate names (e.g. file local statics) resolve to the highest address
        let names = table
            .iter()
            .map(|sym| (sym.name.clone(), sym.start_addr))
            .collect();
        Self { table, names }
    }
}

impl SymbolIndex {
    pub fn lookup_exact(&self, address: Address) -> Option<&Symbol> {
        self.table.get_symbol(address)
    }

    /// Finds the symbol with the greatest start address that is <= address.
    /// The end of the symbol is not checked, padding after a symbol
    /// is attributed to it.
    pub fn lookup_containing(&self, address: Address) -> SymResult<&Symbol> {
        self.table
            .map
            .range(..=address)
            .next_back()
            .map(|(_, sym)| sym)
            .ok_or(Error::UnresolvedAddress(address))
    }

    pub fn lookup_name(&self, name: &str) -> Option<&Symbol> {
        self.names
            .get(name)
            .and_then(|address| self.table.get_symbol(*address))
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.table.iter()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Default number of distinct addresses a CachedLookup remembers
pub const CACHE_LIMIT: usize = 1 << 16;

/// Memoizes lookup_containing for streams where the same
/// addresses come up again and again (loops in a trace).
/// The cache holds at most `limit` addresses and is dropped as a whole
/// once it is full, so memory stays bounded on traces of any length.
pub struct CachedLookup<'a> {
    index: &'a SymbolIndex,
    cache: HashMap<Address, Option<&'a Symbol>>,
    limit: usize,
}

impl<'a> CachedLookup<'a> {
    pub fn new(index: &'a SymbolIndex) -> Self {
        Self::with_limit(index, CACHE_LIMIT)
    }

    pub fn with_limit(index: &'a SymbolIndex, limit: usize) -> Self {
        Self {
            index,
            cache: HashMap::new(),
            limit: limit.max(1),
        }
    }

    pub fn lookup_containing(&mut self, address: Address) -> SymResult<&'a Symbol> {
        let index = self.index;
        if self.cache.len() >= self.limit && !self.cache.contains_key(&address) {
            self.cache.clear();
        }
        let found = *self
            .cache
            .entry(address)
            .or_insert_with(|| index.lookup_containing(address).ok());
        found.ok_or(Error::UnresolvedAddress(address))
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
