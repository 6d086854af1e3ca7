//! Process-wide compiler state: interned vocabulary, builtin types, integer
//! limits, the type registry, the global symbol table, and the module
//! registry. A single `Context` is constructed before any module is parsed
//! and threaded mutably through every stage.

use std::path::PathBuf;
use std::rc::Rc;

use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::ast::{Function, FunctionId, Object, ObjectId};
use crate::cst::{CstDecl, CstModule};
use crate::error::{CompileResult, Diagnostic};
use crate::intern::{Interner, Symbol as Name};
use crate::symbol::{ScopeId, SymbolData, SymbolId, SymbolKind, SymbolTable};
use crate::token::Loc;
use crate::types::{Type, TypeId, TypeKind, ALIGNOF_UNSIZED, SIZEOF_MAX, SIZEOF_UNSIZED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    Arm64,
    Wasm32,
}

impl Arch {
    pub fn from_str(s: &str) -> Option<Arch> {
        match s {
            "amd64" => Some(Arch::Amd64),
            "arm64" => Some(Arch::Arm64),
            "wasm32" => Some(Arch::Wasm32),
            _ => None,
        }
    }

    /// Width of `usize`, `ssize`, and pointers in bytes.
    pub fn word_size(self) -> u64 {
        match self {
            Arch::Amd64 | Arch::Arm64 => 8,
            Arch::Wasm32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct Module {
    /// True once the module has been fully resolved.
    pub loaded: bool,
    /// Shorthand path as written in the importing source.
    pub name: Name,
    /// Canonical path uniquely identifying the module.
    pub path: Name,
    pub source: String,
    /// Populated by the parse phase.
    pub cst: Option<Rc<CstModule>>,
    /// Populated by the order phase.
    pub ordered: Vec<Rc<CstDecl>>,
    /// Every symbol visible inside the module.
    pub symbols: ScopeId,
    /// Symbols an `import` of this module brings into the importer.
    pub exports: ScopeId,
}

/// Frequently compared interned names.
pub struct InternedNames {
    pub empty: Name,
    pub builtin: Name,
    pub main: Name,
    pub any: Name,
    pub void_: Name,
    pub bool_: Name,
    pub byte: Name,
    pub u8: Name,
    pub s8: Name,
    pub u16: Name,
    pub s16: Name,
    pub u32: Name,
    pub s32: Name,
    pub u64: Name,
    pub s64: Name,
    pub usize: Name,
    pub ssize: Name,
    pub integer: Name,
    pub f32: Name,
    pub f64: Name,
    pub real: Name,
    /// Literal suffix for `byte`.
    pub y: Name,
    /// Literal suffix for `usize`.
    pub u: Name,
    /// Literal suffix for `ssize`.
    pub s: Name,
}

pub struct Builtins {
    pub loc: Loc,
    pub any: TypeId,
    pub void_: TypeId,
    pub bool_: TypeId,
    pub byte: TypeId,
    pub u8: TypeId,
    pub s8: TypeId,
    pub u16: TypeId,
    pub s16: TypeId,
    pub u32: TypeId,
    pub s32: TypeId,
    pub u64: TypeId,
    pub s64: TypeId,
    pub usize: TypeId,
    pub ssize: TypeId,
    pub integer: TypeId,
    pub f32: TypeId,
    pub f64: TypeId,
    pub real: TypeId,
    pub pointer_to_byte: TypeId,
    pub slice_of_byte: TypeId,
}

/// One link in the chain of active template instantiations, reported above
/// diagnostics raised while the chain is non-empty.
#[derive(Debug, Clone)]
pub struct TemplateLink {
    pub name: Name,
    pub loc: Loc,
}

pub struct Context {
    pub interner: Interner,
    pub arch: Arch,
    /// Directories searched for imported modules after the importing
    /// module's own directory.
    pub search_paths: Vec<PathBuf>,

    pub interned: InternedNames,

    pub u8_min: BigInt,
    pub u8_max: BigInt,
    pub s8_min: BigInt,
    pub s8_max: BigInt,
    pub u16_min: BigInt,
    pub u16_max: BigInt,
    pub s16_min: BigInt,
    pub s16_max: BigInt,
    pub u32_min: BigInt,
    pub u32_max: BigInt,
    pub s32_min: BigInt,
    pub s32_max: BigInt,
    pub u64_min: BigInt,
    pub u64_max: BigInt,
    pub s64_min: BigInt,
    pub s64_max: BigInt,
    pub usize_min: BigInt,
    pub usize_max: BigInt,
    pub ssize_min: BigInt,
    pub ssize_max: BigInt,
    /// Largest integers exactly representable in the IEEE-754 formats.
    pub f32_integer_min: BigInt,
    pub f32_integer_max: BigInt,
    pub f64_integer_min: BigInt,
    pub f64_integer_max: BigInt,

    pub builtin: Builtins,

    /// Every type instantiated by the compiler, in instantiation order.
    /// Creating a slice type instantiates the corresponding pointer type
    /// first, preserving the pointer-before-slice listing order.
    pub types: Vec<Type>,
    types_by_name: FxHashMap<Name, TypeId>,

    pub symbols: Vec<SymbolData>,
    pub scopes: Vec<SymbolTable>,
    pub objects: Vec<Object>,
    pub functions: Vec<Function>,

    pub global_scope: ScopeId,
    /// Symbols with static storage duration, in creation order.
    pub static_symbols: Vec<SymbolId>,

    pub modules: Vec<Module>,
    module_by_path: FxHashMap<Name, ModuleId>,

    /// Stack of active template instantiations, innermost last.
    pub template_chain: Vec<TemplateLink>,

    unique_id: u64,
}

impl Context {
    pub fn new(arch: Arch) -> Self {
        let mut interner = Interner::new();
        let interned = InternedNames {
            empty: interner.intern(""),
            builtin: interner.intern("builtin"),
            main: interner.intern("main"),
            any: interner.intern("any"),
            void_: interner.intern("void"),
            bool_: interner.intern("bool"),
            byte: interner.intern("byte"),
            u8: interner.intern("u8"),
            s8: interner.intern("s8"),
            u16: interner.intern("u16"),
            s16: interner.intern("s16"),
            u32: interner.intern("u32"),
            s32: interner.intern("s32"),
            u64: interner.intern("u64"),
            s64: interner.intern("s64"),
            usize: interner.intern("usize"),
            ssize: interner.intern("ssize"),
            integer: interner.intern("integer"),
            f32: interner.intern("f32"),
            f64: interner.intern("f64"),
            real: interner.intern("real"),
            y: interner.intern("y"),
            u: interner.intern("u"),
            s: interner.intern("s"),
        };

        let word_bits = arch.word_size() * 8;
        let u64_max = (BigInt::from(1u8) << 64u32) - 1;
        let s64_min = -(BigInt::from(1u8) << 63u32);
        let s64_max = (BigInt::from(1u8) << 63u32) - 1;
        let usize_max = (BigInt::from(1u8) << word_bits) - 1;
        let ssize_min = -(BigInt::from(1u8) << (word_bits - 1));
        let ssize_max = (BigInt::from(1u8) << (word_bits - 1)) - 1;

        let builtin_loc = Loc::new(interned.builtin, 0, crate::token::Span::new(0, 0));

        let mut ctx = Context {
            interner,
            arch,
            search_paths: Vec::new(),
            interned,
            u8_min: BigInt::from(u8::MIN),
            u8_max: BigInt::from(u8::MAX),
            s8_min: BigInt::from(i8::MIN),
            s8_max: BigInt::from(i8::MAX),
            u16_min: BigInt::from(u16::MIN),
            u16_max: BigInt::from(u16::MAX),
            s16_min: BigInt::from(i16::MIN),
            s16_max: BigInt::from(i16::MAX),
            u32_min: BigInt::from(u32::MIN),
            u32_max: BigInt::from(u32::MAX),
            s32_min: BigInt::from(i32::MIN),
            s32_max: BigInt::from(i32::MAX),
            u64_min: BigInt::from(u64::MIN),
            u64_max,
            s64_min,
            s64_max,
            usize_min: BigInt::from(0u8),
            usize_max,
            ssize_min,
            ssize_max,
            f32_integer_min: BigInt::from(-(1i64 << 24)),
            f32_integer_max: BigInt::from(1i64 << 24),
            f64_integer_min: BigInt::from(-(1i64 << 53)),
            f64_integer_max: BigInt::from(1i64 << 53),
            builtin: Builtins {
                loc: builtin_loc,
                any: TypeId(0),
                void_: TypeId(0),
                bool_: TypeId(0),
                byte: TypeId(0),
                u8: TypeId(0),
                s8: TypeId(0),
                u16: TypeId(0),
                s16: TypeId(0),
                u32: TypeId(0),
                s32: TypeId(0),
                u64: TypeId(0),
                s64: TypeId(0),
                usize: TypeId(0),
                ssize: TypeId(0),
                integer: TypeId(0),
                f32: TypeId(0),
                f64: TypeId(0),
                real: TypeId(0),
                pointer_to_byte: TypeId(0),
                slice_of_byte: TypeId(0),
            },
            types: Vec::new(),
            types_by_name: FxHashMap::default(),
            symbols: Vec::new(),
            scopes: Vec::new(),
            objects: Vec::new(),
            functions: Vec::new(),
            global_scope: ScopeId(0),
            static_symbols: Vec::new(),
            modules: Vec::new(),
            module_by_path: FxHashMap::default(),
            template_chain: Vec::new(),
            unique_id: 0,
        };

        ctx.global_scope = ctx.new_scope(None);
        ctx.init_builtin_types();
        ctx
    }

    fn init_builtin_types(&mut self) {
        let word = self.arch.word_size();
        let unsized_ = (SIZEOF_UNSIZED, ALIGNOF_UNSIZED);

        let entries = vec![
            (self.interned.any, unsized_, TypeKind::Any),
            (self.interned.void_, (0, 0), TypeKind::Void),
            (self.interned.bool_, (1, 1), TypeKind::Bool),
            (self.interned.byte, (1, 1), TypeKind::Byte),
            (self.interned.u8, (1, 1), TypeKind::U8),
            (self.interned.s8, (1, 1), TypeKind::S8),
            (self.interned.u16, (2, 2), TypeKind::U16),
            (self.interned.s16, (2, 2), TypeKind::S16),
            (self.interned.u32, (4, 4), TypeKind::U32),
            (self.interned.s32, (4, 4), TypeKind::S32),
            (self.interned.u64, (8, 8), TypeKind::U64),
            (self.interned.s64, (8, 8), TypeKind::S64),
            (self.interned.usize, (word, word), TypeKind::Usize),
            (self.interned.ssize, (word, word), TypeKind::Ssize),
            (self.interned.integer, unsized_, TypeKind::Integer),
            (self.interned.f32, (4, 4), TypeKind::F32),
            (self.interned.f64, (8, 8), TypeKind::F64),
            (self.interned.real, unsized_, TypeKind::Real),
        ];

        let mut ids = Vec::new();
        for (name, (size, align), kind) in entries {
            let symbols = self.new_scope(Some(self.global_scope));
            let id = self.alloc_type(Type {
                name,
                size,
                align,
                symbols,
                kind,
            });
            let symbol = self.alloc_symbol(SymbolData {
                loc: self.builtin.loc,
                name,
                uses: Default::default(),
                kind: SymbolKind::Type(id),
            });
            self.scope_insert(self.global_scope, name, symbol, false)
                .expect("builtin names are unique");
            ids.push(id);
        }

        self.builtin.any = ids[0];
        self.builtin.void_ = ids[1];
        self.builtin.bool_ = ids[2];
        self.builtin.byte = ids[3];
        self.builtin.u8 = ids[4];
        self.builtin.s8 = ids[5];
        self.builtin.u16 = ids[6];
        self.builtin.s16 = ids[7];
        self.builtin.u32 = ids[8];
        self.builtin.s32 = ids[9];
        self.builtin.u64 = ids[10];
        self.builtin.s64 = ids[11];
        self.builtin.usize = ids[12];
        self.builtin.ssize = ids[13];
        self.builtin.integer = ids[14];
        self.builtin.f32 = ids[15];
        self.builtin.f64 = ids[16];
        self.builtin.real = ids[17];

        self.builtin.pointer_to_byte = self.unique_pointer(self.builtin.byte);
        self.builtin.slice_of_byte = self.unique_slice(self.builtin.byte);
    }

    // ------------------------------------------------------------------
    // Accessors

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn ty_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.index()]
    }

    pub fn type_name(&self, id: TypeId) -> &str {
        self.interner.resolve(self.ty(id).name)
    }

    pub fn symbol(&self, id: SymbolId) -> &SymbolData {
        &self.symbols[id.index()]
    }

    pub fn symbol_name(&self, id: SymbolId) -> &str {
        self.interner.resolve(self.symbol(id).name)
    }

    pub fn scope(&self, id: ScopeId) -> &SymbolTable {
        &self.scopes[id.index()]
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.index()]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.index()]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    // ------------------------------------------------------------------
    // Allocation

    pub fn alloc_type(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn alloc_symbol(&mut self, symbol: SymbolData) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub fn alloc_object(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    pub fn alloc_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(SymbolTable::new(parent));
        id
    }

    /// Re-hang a scope under a different parent. Used to place a module's
    /// own scope under its namespace chain once the namespace is known.
    pub fn reparent_scope(&mut self, scope: ScopeId, parent: ScopeId) {
        self.scopes[scope.index()].parent = Some(parent);
    }

    /// A fresh interned name for compiler-generated static storage.
    pub fn unique_static_name(&mut self, prefix: &str) -> Name {
        let id = self.unique_id;
        self.unique_id += 1;
        self.interner.intern(&format!("__{}_{}", prefix, id))
    }

    // ------------------------------------------------------------------
    // Scopes

    pub fn scope_insert(
        &mut self,
        scope: ScopeId,
        name: Name,
        symbol: SymbolId,
        allow_redeclaration: bool,
    ) -> CompileResult<()> {
        if !allow_redeclaration {
            if let Some(existing) = self.scope(scope).lookup_local(name) {
                let existing = self.symbol(existing);
                return Err(Diagnostic::error(
                    self.symbol(symbol).loc,
                    format!(
                        "redeclaration of `{}` previously declared at [{}:{}]",
                        self.interner.resolve(name),
                        self.interner.resolve(existing.loc.path),
                        existing.loc.line
                    ),
                ));
            }
        }
        self.scopes[scope.index()].elements.push((name, symbol));
        Ok(())
    }

    /// Lookup in the given scope or any parent scope.
    pub fn scope_lookup(&self, scope: ScopeId, name: Name) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(symbol) = self.scope_lookup_local(id, name) {
                return Some(symbol);
            }
            current = self.scope(id).parent;
        }
        None
    }

    /// Lookup in the given scope only.
    pub fn scope_lookup_local(&self, scope: ScopeId, name: Name) -> Option<SymbolId> {
        let symbol = self.scope(scope).lookup_local(name)?;
        let uses = &self.symbol(symbol).uses;
        uses.set(uses.get() + 1);
        Some(symbol)
    }

    // ------------------------------------------------------------------
    // Type interning

    fn intern_type(&mut self, ty: Type) -> TypeId {
        if let Some(&existing) = self.types_by_name.get(&ty.name) {
            return existing;
        }
        let name = ty.name;
        let id = self.alloc_type(ty);
        self.types_by_name.insert(name, id);
        id
    }

    pub fn unique_pointer(&mut self, base: TypeId) -> TypeId {
        let name = {
            let base_name = self.type_name(base).to_string();
            self.interner.intern(&format!("*{}", base_name))
        };
        if let Some(&existing) = self.types_by_name.get(&name) {
            return existing;
        }
        let word = self.arch.word_size();
        let symbols = self.new_scope(Some(self.global_scope));
        self.intern_type(Type {
            name,
            size: word,
            align: word,
            symbols,
            kind: TypeKind::Pointer { base },
        })
    }

    /// Array types are size-checked on creation: the total size must not
    /// exceed `SIZEOF_MAX`.
    pub fn unique_array(&mut self, loc: Loc, count: u64, base: TypeId) -> CompileResult<TypeId> {
        let base_size = self.ty(base).size;
        let size = count.checked_mul(base_size).filter(|&size| size <= SIZEOF_MAX);
        let size = match size {
            Some(size) => size,
            None => {
                return Err(Diagnostic::error(
                    loc,
                    "array size exceeds the maximum allowable object size",
                ));
            }
        };

        let name = {
            let base_name = self.type_name(base).to_string();
            self.interner.intern(&format!("[{}]{}", count, base_name))
        };
        if let Some(&existing) = self.types_by_name.get(&name) {
            return Ok(existing);
        }
        let align = self.ty(base).align;
        let symbols = self.new_scope(Some(self.global_scope));
        Ok(self.intern_type(Type {
            name,
            size,
            align,
            symbols,
            kind: TypeKind::Array { count, base },
        }))
    }

    pub fn unique_slice(&mut self, base: TypeId) -> TypeId {
        let name = {
            let base_name = self.type_name(base).to_string();
            self.interner.intern(&format!("[]{}", base_name))
        };
        if let Some(&existing) = self.types_by_name.get(&name) {
            return existing;
        }

        // Instantiate the pointer type for the slice's start word first so
        // the pointer type always appears before the slice type in the
        // instantiated-types list.
        self.unique_pointer(base);

        let word = self.arch.word_size();
        let symbols = self.new_scope(Some(self.global_scope));
        self.intern_type(Type {
            name,
            size: 2 * word,
            align: word,
            symbols,
            kind: TypeKind::Slice { base },
        })
    }

    pub fn unique_function(&mut self, parameter_types: Vec<TypeId>, return_type: TypeId) -> TypeId {
        let name = {
            let parameters = parameter_types
                .iter()
                .map(|&ty| self.type_name(ty).to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let return_name = self.type_name(return_type).to_string();
            self.interner
                .intern(&format!("func({}) {}", parameters, return_name))
        };
        if let Some(&existing) = self.types_by_name.get(&name) {
            return existing;
        }
        let word = self.arch.word_size();
        let symbols = self.new_scope(Some(self.global_scope));
        self.intern_type(Type {
            name,
            size: word,
            align: word,
            symbols,
            kind: TypeKind::Function {
                parameter_types,
                return_type,
            },
        })
    }

    /// Min and max representable values of a sized integer type, or of an
    /// enum's underlying type. `None` for the unsized integer type.
    pub fn int_range(&self, id: TypeId) -> Option<(&BigInt, &BigInt)> {
        match self.ty(id).kind {
            TypeKind::U8 => Some((&self.u8_min, &self.u8_max)),
            TypeKind::S8 => Some((&self.s8_min, &self.s8_max)),
            TypeKind::U16 => Some((&self.u16_min, &self.u16_max)),
            TypeKind::S16 => Some((&self.s16_min, &self.s16_max)),
            TypeKind::U32 => Some((&self.u32_min, &self.u32_max)),
            TypeKind::S32 => Some((&self.s32_min, &self.s32_max)),
            TypeKind::U64 => Some((&self.u64_min, &self.u64_max)),
            TypeKind::S64 => Some((&self.s64_min, &self.s64_max)),
            TypeKind::Usize => Some((&self.usize_min, &self.usize_max)),
            TypeKind::Ssize => Some((&self.ssize_min, &self.ssize_max)),
            TypeKind::Enum { underlying, .. } => self.int_range(underlying),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Modules

    pub fn lookup_module(&self, path: Name) -> Option<ModuleId> {
        self.module_by_path.get(&path).copied()
    }

    pub fn add_module(&mut self, name: Name, path: Name, source: String) -> ModuleId {
        let symbols = self.new_scope(Some(self.global_scope));
        let exports = self.new_scope(None);
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module {
            loaded: false,
            name,
            path,
            source,
            cst: None,
            ordered: Vec::new(),
            symbols,
            exports,
        });
        self.module_by_path.insert(path, id);
        id
    }

    /// Source text of the module registered under `path`, also accepting the
    /// shorthand module name used by lexer locations.
    pub fn module_source(&self, path: Name) -> Option<&str> {
        if let Some(id) = self.lookup_module(path) {
            return Some(&self.module(id).source);
        }
        self.modules
            .iter()
            .find(|module| module.name == path)
            .map(|module| module.source.as_str())
    }

    /// Render a diagnostic with the source excerpt of the module it points
    /// into, when that module is loaded.
    pub fn render_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let source = self.module_source(diagnostic.loc.path);
        let mut diagnostic = diagnostic.clone();
        for link in self.template_chain.iter().rev() {
            diagnostic.notes.insert(
                0,
                (
                    link.loc,
                    format!(
                        "in instantiation of template `{}`",
                        self.interner.resolve(link.name)
                    ),
                ),
            );
        }
        diagnostic.display_with_source(&self.interner, source)
    }

    /// Check that `main` is declared in the entry module as a function with
    /// no parameters.
    pub fn validate_main_is_defined_correctly(&self, entry: ModuleId) -> CompileResult<()> {
        let module = self.module(entry);
        let main = self
            .scope_lookup(module.symbols, self.interned.main)
            .ok_or_else(|| Diagnostic::error(Loc::NONE, "missing declaration of `main`"))?;
        let main = self.symbol(main);
        let function = match main.kind {
            SymbolKind::Function(function) => self.function(function),
            _ => {
                return Err(Diagnostic::error(
                    main.loc,
                    "`main` must be declared as a function",
                ));
            }
        };
        match &self.ty(function.ty).kind {
            TypeKind::Function {
                parameter_types, ..
            } if parameter_types.is_empty() => Ok(()),
            _ => Err(Diagnostic::error(
                main.loc,
                "`main` must be declared without parameters",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_have_expected_sizes_on_amd64() {
        let ctx = Context::new(Arch::Amd64);
        assert_eq!(ctx.ty(ctx.builtin.bool_).size, 1);
        assert_eq!(ctx.ty(ctx.builtin.u16).size, 2);
        assert_eq!(ctx.ty(ctx.builtin.usize).size, 8);
        assert_eq!(ctx.ty(ctx.builtin.ssize).size, 8);
        assert_eq!(ctx.ty(ctx.builtin.f64).size, 8);
        assert!(ctx.ty(ctx.builtin.integer).is_unsized());
    }

    #[test]
    fn word_width_follows_architecture() {
        let ctx = Context::new(Arch::Wasm32);
        assert_eq!(ctx.ty(ctx.builtin.usize).size, 4);
        assert_eq!(ctx.ty(ctx.builtin.pointer_to_byte).size, 4);
        assert_eq!(ctx.ty(ctx.builtin.slice_of_byte).size, 8);
    }

    #[test]
    fn slice_size_is_two_words() {
        let ctx = Context::new(Arch::Amd64);
        assert_eq!(ctx.ty(ctx.builtin.slice_of_byte).size, 16);
        assert_eq!(ctx.ty(ctx.builtin.slice_of_byte).align, 8);
    }

    #[test]
    fn structural_types_are_interned() {
        let mut ctx = Context::new(Arch::Amd64);
        let a = ctx.unique_pointer(ctx.builtin.s32);
        let b = ctx.unique_pointer(ctx.builtin.s32);
        assert_eq!(a, b);

        let c = ctx.unique_array(Loc::NONE, 4, ctx.builtin.s32).unwrap();
        let d = ctx.unique_array(Loc::NONE, 4, ctx.builtin.s32).unwrap();
        assert_eq!(c, d);
        let e = ctx.unique_array(Loc::NONE, 5, ctx.builtin.s32).unwrap();
        assert_ne!(c, e);

        let f = ctx.unique_function(vec![ctx.builtin.s32], ctx.builtin.void_);
        let g = ctx.unique_function(vec![ctx.builtin.s32], ctx.builtin.void_);
        assert_eq!(f, g);
    }

    #[test]
    fn type_names_are_canonical() {
        let mut ctx = Context::new(Arch::Amd64);
        let pointer = ctx.unique_pointer(ctx.builtin.u8);
        assert_eq!(ctx.type_name(pointer), "*u8");
        let array = ctx.unique_array(Loc::NONE, 3, ctx.builtin.byte).unwrap();
        assert_eq!(ctx.type_name(array), "[3]byte");
        let slice = ctx.unique_slice(ctx.builtin.s64);
        assert_eq!(ctx.type_name(slice), "[]s64");
        let function = ctx.unique_function(vec![ctx.builtin.bool_, ctx.builtin.u8], ctx.builtin.void_);
        assert_eq!(ctx.type_name(function), "func(bool, u8) void");
    }

    #[test]
    fn pointer_precedes_slice_in_type_list() {
        let mut ctx = Context::new(Arch::Amd64);
        let slice = ctx.unique_slice(ctx.builtin.s16);
        let pointer = ctx.unique_pointer(ctx.builtin.s16);
        assert!(pointer.index() < slice.index());
    }

    #[test]
    fn oversized_array_is_rejected() {
        let mut ctx = Context::new(Arch::Amd64);
        let result = ctx.unique_array(Loc::NONE, u64::MAX / 2, ctx.builtin.u64);
        assert!(result.is_err());
    }

    #[test]
    fn zero_count_array_is_fine() {
        let mut ctx = Context::new(Arch::Amd64);
        let array = ctx.unique_array(Loc::NONE, 0, ctx.builtin.u64).unwrap();
        assert_eq!(ctx.ty(array).size, 0);
    }

    #[test]
    fn int_range_covers_sized_types_only() {
        let ctx = Context::new(Arch::Amd64);
        let (min, max) = ctx.int_range(ctx.builtin.s8).unwrap();
        assert_eq!(min, &BigInt::from(-128));
        assert_eq!(max, &BigInt::from(127));
        assert!(ctx.int_range(ctx.builtin.integer).is_none());
    }

    #[test]
    fn scope_lookup_walks_to_parent() {
        let mut ctx = Context::new(Arch::Amd64);
        let name = ctx.interner.intern("x");
        let child = ctx.new_scope(Some(ctx.global_scope));
        let symbol = ctx.alloc_symbol(SymbolData {
            loc: Loc::NONE,
            name,
            uses: Default::default(),
            kind: SymbolKind::Type(ctx.builtin.s32),
        });
        ctx.scope_insert(ctx.global_scope, name, symbol, false).unwrap();
        assert_eq!(ctx.scope_lookup(child, name), Some(symbol));
        assert_eq!(ctx.scope_lookup_local(child, name), None);
    }

    #[test]
    fn scope_redeclaration_is_fatal() {
        let mut ctx = Context::new(Arch::Amd64);
        let name = ctx.interner.intern("dup");
        let symbol = ctx.alloc_symbol(SymbolData {
            loc: Loc::NONE,
            name,
            uses: Default::default(),
            kind: SymbolKind::Type(ctx.builtin.s32),
        });
        ctx.scope_insert(ctx.global_scope, name, symbol, false).unwrap();
        let result = ctx.scope_insert(ctx.global_scope, name, symbol, false);
        assert!(result.is_err());
    }

    #[test]
    fn lookup_bumps_uses_counter() {
        let mut ctx = Context::new(Arch::Amd64);
        let name = ctx.interned.u8;
        let symbol = ctx.scope_lookup(ctx.global_scope, name).unwrap();
        let before = ctx.symbol(symbol).uses.get();
        ctx.scope_lookup(ctx.global_scope, name);
        assert_eq!(ctx.symbol(symbol).uses.get(), before + 1);
    }
}
