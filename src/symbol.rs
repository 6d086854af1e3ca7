//! Symbols and lexically scoped symbol tables.

use std::cell::Cell;
use std::rc::Rc;

use crate::ast::{FunctionId, ObjectId};
use crate::cst::CstDecl;
use crate::intern::Symbol as Name;
use crate::token::Loc;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct SymbolData {
    pub loc: Loc,
    pub name: Name,
    /// Number of times this symbol has been found by scope lookups.
    pub uses: Cell<u32>,
    pub kind: SymbolKind,
}

#[derive(Debug)]
pub enum SymbolKind {
    Type(TypeId),
    Variable(ObjectId),
    Constant(ObjectId),
    Function(FunctionId),
    Template(TemplateData),
    Namespace(ScopeId),
}

/// A template retains its un-resolved declaration plus the lexical scope in
/// which it was declared; instantiation re-enters the resolver with the
/// template parameters pre-bound in a child of that scope.
#[derive(Debug)]
pub struct TemplateData {
    pub decl: Rc<CstDecl>,
    /// Prefix for the qualified names of instances.
    pub symbol_name_prefix: Name,
    /// Prefix for the static-address labels of instances.
    pub symbol_addr_prefix: Name,
    /// Parent of each instance's own scope.
    pub parent_scope: ScopeId,
    /// Cache of instantiated symbols keyed by the mangled instance name.
    pub instances: ScopeId,
}

impl SymbolData {
    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            SymbolKind::Type(_) => "type",
            SymbolKind::Variable(_) => "variable",
            SymbolKind::Constant(_) => "constant",
            SymbolKind::Function(_) => "function",
            SymbolKind::Template(_) => "template",
            SymbolKind::Namespace(_) => "namespace",
        }
    }
}

/// Insertion-ordered name-to-symbol table with a parent pointer. The mapped
/// name is not necessarily the symbol's own name: aliases map extra names to
/// an existing symbol.
#[derive(Debug)]
pub struct SymbolTable {
    pub parent: Option<ScopeId>,
    pub elements: Vec<(Name, SymbolId)>,
}

impl SymbolTable {
    pub fn new(parent: Option<ScopeId>) -> Self {
        SymbolTable {
            parent,
            elements: Vec::new(),
        }
    }

    /// Search this table only. Later insertions win, letting template
    /// parameter bindings shadow an outer entry of the same name.
    pub fn lookup_local(&self, name: Name) -> Option<SymbolId> {
        self.elements
            .iter()
            .rev()
            .find(|&&(element_name, _)| element_name == name)
            .map(|&(_, symbol)| symbol)
    }
}
