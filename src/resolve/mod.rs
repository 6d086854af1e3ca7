//! Symbol resolution and type checking.
//!
//! Walks a module's ordered declarations, installs symbols, interns types,
//! produces the typed AST for every function body, and coordinates import
//! loading, template instantiation, and compile-time evaluation.

mod expr;
mod stmt;


use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{Address, Defer, DeferId, Function, FunctionId, Object};
use crate::context::{Context, ModuleId, TemplateLink};
use crate::cst::{
    CstDecl, CstDeclKind, CstEnumValue, CstIdentifier, CstImport, CstMember, CstMemberKind,
    CstModule, CstNamespace, CstSymbol, CstSymbolStart, CstType, CstTypeKind,
};
use crate::error::{CompileResult, Diagnostic};
use crate::eval;
use crate::intern::Symbol as Name;
use crate::symbol::{ScopeId, SymbolData, SymbolId, SymbolKind, TemplateData};
use crate::token::Loc;
use crate::types::{MemberVariable, Type, TypeId, TypeKind, ALIGNOF_UNSIZED, SIZEOF_UNSIZED};
use crate::value::{Value, ValueKind};
use crate::{order, parse};

/// Load a module from an in-memory source buffer. The module is registered
/// under `name` both as its shorthand and canonical path.
pub fn load_module_from_source(
    ctx: &mut Context,
    name: &str,
    source: &str,
) -> CompileResult<ModuleId> {
    let name = ctx.interner.intern(name);
    if let Some(existing) = ctx.lookup_module(name) {
        return Ok(existing);
    }
    let id = ctx.add_module(name, name, source.to_string());
    resolve_module(ctx, id)?;
    Ok(id)
}

/// Load a module from the filesystem, memoized on its canonical path.
pub fn load_module_file(ctx: &mut Context, name: &str, path: &Path) -> CompileResult<ModuleId> {
    let canonical = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    let path_name = ctx.interner.intern(&canonical.to_string_lossy());
    if let Some(existing) = ctx.lookup_module(path_name) {
        return Ok(existing);
    }

    let source = std::fs::read_to_string(&canonical).map_err(|err| {
        Diagnostic::error(
            Loc::NONE,
            format!("failed to load module `{}` ({})", path.display(), err),
        )
    })?;
    let name = ctx.interner.intern(name);
    let id = ctx.add_module(name, path_name, source);
    resolve_module(ctx, id)?;
    Ok(id)
}

fn resolve_module(ctx: &mut Context, module: ModuleId) -> CompileResult<()> {
    let name = ctx.module(module).name;
    let source = ctx.module(module).source.clone();

    let cst = Rc::new(parse::parse(name, &source, &mut ctx.interner)?);
    let ordered = order::order(&cst, &ctx.interner)?;
    ctx.module_mut(module).cst = Some(Rc::clone(&cst));
    ctx.module_mut(module).ordered = ordered.clone();

    let mut resolver = Resolver::new(ctx, module);
    resolver.resolve(&cst, &ordered)?;

    ctx.module_mut(module).loaded = true;
    Ok(())
}

/// Names under which a declaration is installed: `key` is the symbol-table
/// key (and plain symbol name), `qualified` the fully qualified name used for
/// type names and static-address labels.
struct DeclNames {
    key: Name,
    qualified: String,
}

#[derive(Clone)]
struct IncompleteFunction {
    function: FunctionId,
    decl: Rc<CstDecl>,
    /// Scope in effect at the declaration site.
    scope: ScopeId,
}

pub(crate) struct Resolver<'ctx> {
    pub ctx: &'ctx mut Context,
    module: ModuleId,
    /// Scope new declarations are installed into at the current level.
    decl_scope: ScopeId,
    /// Scope lookups start from.
    pub(crate) current_scope: ScopeId,
    /// Qualified-name prefix (namespace, extended type, ...) at the current
    /// level.
    name_prefix: Option<String>,
    pub(crate) current_function: Option<FunctionId>,
    pub(crate) return_type: Option<TypeId>,
    /// Innermost defer statement at the current point of resolution.
    pub(crate) current_defer: Option<DeferId>,
    /// Defer chain endpoint captured at entry of the innermost loop.
    pub(crate) loop_defer: Option<DeferId>,
    pub(crate) in_loop: bool,
    /// Defers of the function currently being resolved.
    pub(crate) defers: Vec<Defer>,
    incomplete_functions: Vec<IncompleteFunction>,
}

impl<'ctx> Resolver<'ctx> {
    fn new(ctx: &'ctx mut Context, module: ModuleId) -> Self {
        let module_scope = ctx.module(module).symbols;
        Resolver {
            ctx,
            module,
            decl_scope: module_scope,
            current_scope: module_scope,
            name_prefix: None,
            current_function: None,
            return_type: None,
            current_defer: None,
            loop_defer: None,
            in_loop: false,
            defers: Vec::new(),
            incomplete_functions: Vec::new(),
        }
    }

    fn resolve(&mut self, cst: &CstModule, ordered: &[Rc<CstDecl>]) -> CompileResult<()> {
        self.resolve_namespace(cst.namespace.as_ref())?;

        for import in &cst.imports {
            self.resolve_import(import)?;
        }

        for decl in ordered {
            let symbol = self.resolve_decl(decl)?;
            if cst.namespace.is_none() && !decl.is_extend() {
                let exports = self.ctx.module(self.module).exports;
                self.ctx.scope_insert(exports, decl.name, symbol, true)?;
            }
        }

        // Function bodies resolve after every module-level symbol exists;
        // completing one may instantiate templates that queue more.
        let mut next = 0;
        while next < self.incomplete_functions.len() {
            let incomplete = self.incomplete_functions[next].clone();
            self.complete_function(&incomplete)?;
            next += 1;
        }
        self.incomplete_functions.clear();

        Ok(())
    }

    // ------------------------------------------------------------------
    // Namespaces and imports

    fn resolve_namespace(&mut self, namespace: Option<&CstNamespace>) -> CompileResult<()> {
        let namespace = match namespace {
            Some(namespace) => namespace,
            None => return Ok(()),
        };

        let mut scope = self.ctx.global_scope;
        let mut prefix: Option<String> = None;
        for identifier in &namespace.identifiers {
            let text = self.ctx.interner.resolve(identifier.name).to_string();
            prefix = Some(match prefix {
                Some(prefix) => format!("{}::{}", prefix, text),
                None => text,
            });

            scope = match self.ctx.scope_lookup_local(scope, identifier.name) {
                Some(existing) => match self.ctx.symbol(existing).kind {
                    SymbolKind::Namespace(child) => child,
                    _ => {
                        return Err(Diagnostic::error(
                            identifier.loc,
                            format!(
                                "`{}` is already declared and is not a namespace",
                                self.ctx.interner.resolve(identifier.name)
                            ),
                        ));
                    }
                },
                None => {
                    let child = self.ctx.new_scope(Some(scope));
                    let symbol = self.ctx.alloc_symbol(SymbolData {
                        loc: identifier.loc,
                        name: identifier.name,
                        uses: Default::default(),
                        kind: SymbolKind::Namespace(child),
                    });
                    self.ctx.scope_insert(scope, identifier.name, symbol, false)?;
                    child
                }
            };
        }

        // What an `import` of this module brings in is the root namespace
        // symbol.
        let root = namespace.identifiers[0].name;
        let root_symbol = self
            .ctx
            .scope_lookup_local(self.ctx.global_scope, root)
            .expect("root namespace symbol was just created or found");
        let exports = self.ctx.module(self.module).exports;
        self.ctx.scope_insert(exports, root, root_symbol, true)?;

        // Unqualified lookups inside the module see the namespace chain.
        let module_scope = self.ctx.module(self.module).symbols;
        self.ctx.reparent_scope(module_scope, scope);

        self.decl_scope = scope;
        self.current_scope = module_scope;
        self.name_prefix = prefix;
        Ok(())
    }

    fn resolve_import(&mut self, import: &CstImport) -> CompileResult<()> {
        // In-memory modules are registered under their shorthand name.
        let imported = if let Some(existing) = self.ctx.lookup_module(import.path) {
            existing
        } else {
            let path_text = self.ctx.interner.resolve(import.path).to_string();
            let path = self.find_import_file(&path_text).ok_or_else(|| {
                Diagnostic::error(
                    import.loc,
                    format!("failed to locate module `{}`", path_text),
                )
            })?;
            load_module_file(self.ctx, &path_text, &path)?
        };

        let exports_scope = self.ctx.module(imported).exports;
        let exports: Vec<(Name, SymbolId)> = self.ctx.scope(exports_scope).elements.clone();
        let module_scope = self.ctx.module(self.module).symbols;
        for (name, symbol) in exports {
            // Diamond imports legitimately deliver the same symbol twice.
            if self.ctx.scope_lookup_local(module_scope, name) == Some(symbol) {
                continue;
            }
            self.ctx.scope_insert(module_scope, name, symbol, false)?;
        }
        Ok(())
    }

    fn find_import_file(&self, path: &str) -> Option<PathBuf> {
        let target = Path::new(path);
        if target.is_absolute() {
            return target.exists().then(|| target.to_path_buf());
        }

        let module_path = self.ctx.interner.resolve(self.ctx.module(self.module).path);
        if let Some(dir) = Path::new(module_path).parent() {
            let candidate = dir.join(target);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        for dir in &self.ctx.search_paths {
            let candidate = dir.join(target);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }

    pub(crate) fn find_file(&self, path: &str) -> Option<PathBuf> {
        self.find_import_file(path)
    }

    // ------------------------------------------------------------------
    // Declarations

    fn default_names(&self, name: Name) -> DeclNames {
        DeclNames {
            key: name,
            qualified: self.qualify(name),
        }
    }

    fn qualify(&self, name: Name) -> String {
        let text = self.ctx.interner.resolve(name);
        match &self.name_prefix {
            Some(prefix) => format!("{}::{}", prefix, text),
            None => text.to_string(),
        }
    }

    fn resolve_decl(&mut self, decl: &Rc<CstDecl>) -> CompileResult<SymbolId> {
        let names = self.default_names(decl.name);
        let target = self.decl_scope;
        self.resolve_decl_in(decl, target, names)
    }

    fn resolve_decl_in(
        &mut self,
        decl: &Rc<CstDecl>,
        target: ScopeId,
        names: DeclNames,
    ) -> CompileResult<SymbolId> {
        match &decl.kind {
            CstDeclKind::Variable { .. } => self.resolve_decl_storage(decl, target, names, true),
            CstDeclKind::Constant { .. } => self.resolve_decl_storage(decl, target, names, false),
            CstDeclKind::Function { .. } => self.resolve_decl_function(decl, target, names),
            CstDeclKind::Struct { .. } | CstDeclKind::Union { .. } => {
                self.resolve_decl_composite(decl, target, names)
            }
            CstDeclKind::Enum { .. } => self.resolve_decl_enum(decl, target, names),
            CstDeclKind::Extend { ty, decl: inner } => self.resolve_decl_extend(ty, inner),
            CstDeclKind::Alias { identifier, ty } => {
                let aliased = self.resolve_type(ty)?;
                let symbol = self.ctx.alloc_symbol(SymbolData {
                    loc: decl.loc,
                    name: identifier.name,
                    uses: Default::default(),
                    kind: SymbolKind::Type(aliased),
                });
                self.ctx.scope_insert(target, names.key, symbol, false)?;
                Ok(symbol)
            }
            CstDeclKind::ExternVariable { identifier, ty } => {
                let ty = self.resolve_type(ty)?;
                self.check_sized(decl.loc, ty)?;
                let object = self.ctx.alloc_object(Object {
                    ty,
                    address: Address::Static {
                        name: identifier.name,
                        offset: 0,
                    },
                    value: None,
                    is_extern: true,
                });
                let symbol = self.ctx.alloc_symbol(SymbolData {
                    loc: decl.loc,
                    name: identifier.name,
                    uses: Default::default(),
                    kind: SymbolKind::Variable(object),
                });
                self.ctx.scope_insert(target, names.key, symbol, false)?;
                self.ctx.static_symbols.push(symbol);
                Ok(symbol)
            }
            CstDeclKind::ExternFunction {
                identifier,
                function_parameters,
                return_type,
            } => {
                let mut parameter_types = Vec::with_capacity(function_parameters.len());
                for parameter in function_parameters {
                    parameter_types.push(self.resolve_type(&parameter.ty)?);
                }
                let return_type = self.resolve_type(return_type)?;
                let ty = self.ctx.unique_function(parameter_types, return_type);
                let function = self.ctx.alloc_function(Function {
                    ty,
                    address: Address::Static {
                        name: identifier.name,
                        offset: 0,
                    },
                    is_extern: true,
                    symbol_table: None,
                    symbol_parameters: Vec::new(),
                    symbol_return: None,
                    body: None,
                    defers: Vec::new(),
                    local_stack_offset: 0,
                });
                let symbol = self.ctx.alloc_symbol(SymbolData {
                    loc: decl.loc,
                    name: identifier.name,
                    uses: Default::default(),
                    kind: SymbolKind::Function(function),
                });
                self.ctx.scope_insert(target, names.key, symbol, false)?;
                self.ctx.static_symbols.push(symbol);
                Ok(symbol)
            }
            CstDeclKind::ExternType { identifier } => {
                let name = self.ctx.interner.intern(&names.qualified);
                let symbols = self.ctx.new_scope(Some(self.current_scope));
                let ty = self.ctx.alloc_type(Type {
                    name,
                    size: SIZEOF_UNSIZED,
                    align: ALIGNOF_UNSIZED,
                    symbols,
                    kind: TypeKind::Extern,
                });
                let symbol = self.ctx.alloc_symbol(SymbolData {
                    loc: decl.loc,
                    name: identifier.name,
                    uses: Default::default(),
                    kind: SymbolKind::Type(ty),
                });
                self.ctx.scope_insert(target, names.key, symbol, false)?;
                Ok(symbol)
            }
        }
    }

    /// Top-level `var` and `let`, and the member-constant form.
    fn resolve_decl_storage(
        &mut self,
        decl: &Rc<CstDecl>,
        target: ScopeId,
        names: DeclNames,
        is_variable: bool,
    ) -> CompileResult<SymbolId> {
        let (identifier, ty, expr) = match &decl.kind {
            CstDeclKind::Variable { identifier, ty, expr }
            | CstDeclKind::Constant { identifier, ty, expr } => (identifier, ty, expr),
            _ => unreachable!(),
        };

        let declared = match ty {
            Some(ty) => Some(self.resolve_type(ty)?),
            None => None,
        };

        let (ty, value) = match expr {
            Some(expr) => {
                let mut resolved = self.resolve_expr(expr)?;
                resolved = match declared {
                    Some(declared) => self.implicit_cast(resolved, declared)?,
                    None => resolved,
                };
                if self.ctx.ty(resolved.ty).is_unsized() {
                    return Err(Diagnostic::error(
                        decl.loc,
                        format!(
                            "cannot declare storage of unsized type `{}`",
                            self.ctx.type_name(resolved.ty)
                        ),
                    ));
                }
                let value = eval::eval_rvalue(self.ctx, &resolved)?;
                (resolved.ty, Some(value))
            }
            None => {
                let declared = declared.expect("uninit declarations carry a type");
                self.check_sized(decl.loc, declared)?;
                (declared, None)
            }
        };

        let label = self.ctx.interner.intern(&names.qualified);
        let object = self.ctx.alloc_object(Object {
            ty,
            address: Address::Static {
                name: label,
                offset: 0,
            },
            value,
            is_extern: false,
        });
        let kind = if is_variable {
            SymbolKind::Variable(object)
        } else {
            SymbolKind::Constant(object)
        };
        let symbol = self.ctx.alloc_symbol(SymbolData {
            loc: decl.loc,
            name: identifier.name,
            uses: Default::default(),
            kind,
        });
        self.ctx.scope_insert(target, names.key, symbol, false)?;
        self.ctx.static_symbols.push(symbol);
        Ok(symbol)
    }

    fn resolve_decl_function(
        &mut self,
        decl: &Rc<CstDecl>,
        target: ScopeId,
        names: DeclNames,
    ) -> CompileResult<SymbolId> {
        let (identifier, function_parameters, return_type) = match &decl.kind {
            CstDeclKind::Function {
                identifier,
                function_parameters,
                return_type,
                ..
            } => (identifier, function_parameters, return_type),
            _ => unreachable!(),
        };

        if decl.is_template() {
            return self.resolve_decl_template(decl, target, names);
        }

        let mut parameter_types = Vec::with_capacity(function_parameters.len());
        for parameter in function_parameters {
            let ty = self.resolve_type(&parameter.ty)?;
            self.check_sized(parameter.loc, ty)?;
            parameter_types.push(ty);
        }
        let return_type = self.resolve_type(return_type)?;
        let ty = self.ctx.unique_function(parameter_types, return_type);

        let label = self.ctx.interner.intern(&names.qualified);
        let function = self.ctx.alloc_function(Function {
            ty,
            address: Address::Static {
                name: label,
                offset: 0,
            },
            is_extern: false,
            symbol_table: None,
            symbol_parameters: Vec::new(),
            symbol_return: None,
            body: None,
            defers: Vec::new(),
            local_stack_offset: 0,
        });
        let symbol = self.ctx.alloc_symbol(SymbolData {
            loc: decl.loc,
            name: identifier.name,
            uses: Default::default(),
            kind: SymbolKind::Function(function),
        });
        self.ctx.scope_insert(target, names.key, symbol, false)?;
        self.ctx.static_symbols.push(symbol);

        self.incomplete_functions.push(IncompleteFunction {
            function,
            decl: Rc::clone(decl),
            scope: self.current_scope,
        });
        Ok(symbol)
    }

    /// A function declared inside a block. The symbol is local to the block
    /// scope; the static label is uniqued so nested functions of the same
    /// name in different blocks cannot collide.
    pub(crate) fn resolve_nested_function(&mut self, decl: &Rc<CstDecl>) -> CompileResult<SymbolId> {
        let text = self.ctx.interner.resolve(decl.name).to_string();
        let label = self.ctx.unique_static_name(&text);
        let names = DeclNames {
            key: decl.name,
            qualified: self.ctx.interner.resolve(label).to_string(),
        };
        self.resolve_decl_function(decl, self.current_scope, names)
    }

    fn resolve_decl_template(
        &mut self,
        decl: &Rc<CstDecl>,
        target: ScopeId,
        names: DeclNames,
    ) -> CompileResult<SymbolId> {
        let prefix = self.ctx.interner.intern(&names.qualified);
        let instances = self.ctx.new_scope(None);
        let symbol = self.ctx.alloc_symbol(SymbolData {
            loc: decl.loc,
            name: decl.name,
            uses: Default::default(),
            kind: SymbolKind::Template(TemplateData {
                decl: Rc::clone(decl),
                symbol_name_prefix: prefix,
                symbol_addr_prefix: prefix,
                parent_scope: self.current_scope,
                instances,
            }),
        });
        self.ctx.scope_insert(target, names.key, symbol, false)?;
        Ok(symbol)
    }

    fn resolve_decl_composite(
        &mut self,
        decl: &Rc<CstDecl>,
        target: ScopeId,
        names: DeclNames,
    ) -> CompileResult<SymbolId> {
        let (identifier, members, is_struct) = match &decl.kind {
            CstDeclKind::Struct {
                identifier, members, ..
            } => (identifier, members, true),
            CstDeclKind::Union {
                identifier, members, ..
            } => (identifier, members, false),
            _ => unreachable!(),
        };

        if decl.is_template() {
            return self.resolve_decl_template(decl, target, names);
        }

        let name = self.ctx.interner.intern(&names.qualified);
        let type_scope = self.ctx.new_scope(Some(self.current_scope));
        let kind = if is_struct {
            TypeKind::Struct {
                is_complete: false,
                members: Vec::new(),
            }
        } else {
            TypeKind::Union {
                is_complete: false,
                members: Vec::new(),
            }
        };
        let ty = self.ctx.alloc_type(Type {
            name,
            size: 0,
            align: 0,
            symbols: type_scope,
            kind,
        });

        // Install the symbol before resolving members so self-referential
        // pointer and slice members find the incomplete type.
        let symbol = self.ctx.alloc_symbol(SymbolData {
            loc: decl.loc,
            name: identifier.name,
            uses: Default::default(),
            kind: SymbolKind::Type(ty),
        });
        self.ctx.scope_insert(target, names.key, symbol, false)?;

        self.complete_composite(ty, members, is_struct)?;

        // Member constants, functions, and aliases resolve against the
        // completed type.
        self.resolve_type_members(ty, members)?;

        Ok(symbol)
    }

    /// True when the type is a composite whose members are still resolving,
    /// including arrays over such a composite.
    fn type_is_incomplete(&self, ty: TypeId) -> bool {
        match &self.ctx.ty(ty).kind {
            TypeKind::Struct { is_complete, .. } | TypeKind::Union { is_complete, .. } => {
                !is_complete
            }
            TypeKind::Array { base, .. } => self.type_is_incomplete(*base),
            _ => false,
        }
    }

    fn complete_composite(
        &mut self,
        ty: TypeId,
        members: &[CstMember],
        is_struct: bool,
    ) -> CompileResult<()> {
        let mut resolved: Vec<MemberVariable> = Vec::new();
        let mut offset = 0u64;
        let mut align = 0u64;
        let mut size = 0u64;

        for member in members {
            let (identifier, member_ty) = match &member.kind {
                CstMemberKind::Variable { identifier, ty } => (identifier, ty),
                _ => continue,
            };
            if resolved.iter().any(|existing| existing.name == member.name) {
                return Err(Diagnostic::error(
                    member.loc,
                    format!(
                        "duplicate member variable `{}`",
                        self.ctx.interner.resolve(member.name)
                    ),
                ));
            }

            let member_type = self.resolve_type(member_ty)?;
            let member_type_ref = self.ctx.ty(member_type);
            let incomplete = self.type_is_incomplete(member_type);
            let unsized_ =
                member_type_ref.is_unsized() || matches!(member_type_ref.kind, TypeKind::Void);
            if incomplete || unsized_ {
                return Err(Diagnostic::error(
                    identifier.loc,
                    format!(
                        "member variable `{}` has {} type `{}`",
                        self.ctx.interner.resolve(member.name),
                        if incomplete { "incomplete" } else { "unsized" },
                        self.ctx.type_name(member_type)
                    ),
                ));
            }

            let member_align = self.ctx.ty(member_type).align;
            let member_size = self.ctx.ty(member_type).size;
            align = align.max(member_align);

            let member_offset = if is_struct {
                let start = round_up(offset, member_align);
                offset = start + member_size;
                start
            } else {
                size = size.max(member_size);
                0
            };
            resolved.push(MemberVariable {
                name: member.name,
                ty: member_type,
                offset: member_offset,
            });
        }

        let total = if is_struct {
            round_up(offset, align)
        } else {
            round_up(size, align)
        };

        let ty_mut = self.ctx.ty_mut(ty);
        ty_mut.size = total;
        ty_mut.align = align;
        match &mut ty_mut.kind {
            TypeKind::Struct {
                is_complete,
                members,
            }
            | TypeKind::Union {
                is_complete,
                members,
            } => {
                *members = resolved;
                *is_complete = true;
            }
            _ => unreachable!(),
        }

        Ok(())
    }

    /// Resolve member constants, member functions, and member aliases into a
    /// type's symbol table.
    fn resolve_type_members(&mut self, ty: TypeId, members: &[CstMember]) -> CompileResult<()> {
        let type_scope = self.ctx.ty(ty).symbols;
        let type_name = self.ctx.type_name(ty).to_string();

        let saved_prefix = self.name_prefix.replace(type_name);
        let saved_decl_scope = self.decl_scope;
        let saved_scope = self.current_scope;
        self.decl_scope = type_scope;
        self.current_scope = type_scope;

        let mut result = Ok(());
        for member in members {
            let decl = match &member.kind {
                CstMemberKind::Constant(decl)
                | CstMemberKind::Function(decl)
                | CstMemberKind::Alias(decl) => decl,
                CstMemberKind::Variable { .. } => continue,
            };
            let names = self.default_names(decl.name);
            if let Err(diagnostic) = self.resolve_decl_in(decl, type_scope, names) {
                result = Err(diagnostic);
                break;
            }
        }

        self.name_prefix = saved_prefix;
        self.decl_scope = saved_decl_scope;
        self.current_scope = saved_scope;
        result
    }

    fn resolve_decl_enum(
        &mut self,
        decl: &Rc<CstDecl>,
        target: ScopeId,
        names: DeclNames,
    ) -> CompileResult<SymbolId> {
        let (identifier, underlying_cst, values, member_functions) = match &decl.kind {
            CstDeclKind::Enum {
                identifier,
                ty,
                values,
                member_functions,
            } => (identifier, ty, values, member_functions),
            _ => unreachable!(),
        };

        let name = self.ctx.interner.intern(&names.qualified);
        let type_scope = self.ctx.new_scope(Some(self.current_scope));
        let ty = self.make_enum_type(name, type_scope, underlying_cst.as_ref(), values, &names.qualified)?;

        let symbol = self.ctx.alloc_symbol(SymbolData {
            loc: decl.loc,
            name: identifier.name,
            uses: Default::default(),
            kind: SymbolKind::Type(ty),
        });
        self.ctx.scope_insert(target, names.key, symbol, false)?;

        self.resolve_type_members_from_decls(ty, member_functions)?;

        Ok(symbol)
    }

    /// Shared by named and anonymous enum types: build the type, resolve the
    /// value list, install the value constants in the type's scope.
    pub(crate) fn make_enum_type(
        &mut self,
        name: Name,
        type_scope: ScopeId,
        underlying_cst: Option<&CstType>,
        values: &[CstEnumValue],
        qualified: &str,
    ) -> CompileResult<TypeId> {
        let underlying = match underlying_cst {
            Some(cst) => {
                let underlying = self.resolve_type(cst)?;
                if !self.ctx.ty(underlying).is_sized_integer() {
                    return Err(Diagnostic::error(
                        cst.loc,
                        format!(
                            "enum underlying type must be a sized integer type, found `{}`",
                            self.ctx.type_name(underlying)
                        ),
                    ));
                }
                underlying
            }
            None => self.ctx.builtin.s32,
        };

        let size = self.ctx.ty(underlying).size;
        let align = self.ctx.ty(underlying).align;
        let ty = self.ctx.alloc_type(Type {
            name,
            size,
            align,
            symbols: type_scope,
            kind: TypeKind::Enum {
                underlying,
                value_symbols: Vec::new(),
            },
        });

        let saved_scope = self.current_scope;
        self.current_scope = type_scope;

        let mut next = num_bigint::BigInt::from(0u8);
        let mut value_symbols = Vec::with_capacity(values.len());
        for value in values {
            let discriminant = match &value.expr {
                Some(expr) => {
                    let resolved = self.resolve_expr(expr)?;
                    let resolved = self.implicit_cast(resolved, underlying)?;
                    let evaluated = eval::eval_rvalue(self.ctx, &resolved)?;
                    match evaluated.kind {
                        ValueKind::Integer(integer) => integer,
                        _ => {
                            self.current_scope = saved_scope;
                            return Err(Diagnostic::error(
                                value.loc,
                                "enum value must be an integer constant",
                            ));
                        }
                    }
                }
                None => next.clone(),
            };

            let (min, max) = self
                .ctx
                .int_range(underlying)
                .expect("underlying type is a sized integer");
            if &discriminant < min || &discriminant > max {
                let message = format!(
                    "enum value `{}` is out-of-range for underlying type `{}`",
                    discriminant,
                    self.ctx.type_name(underlying)
                );
                self.current_scope = saved_scope;
                return Err(Diagnostic::error(value.loc, message));
            }

            let value_text = self.ctx.interner.resolve(value.identifier.name).to_string();
            let label = self
                .ctx
                .interner
                .intern(&format!("{}::{}", qualified, value_text));
            let object = self.ctx.alloc_object(Object {
                ty,
                address: Address::Static {
                    name: label,
                    offset: 0,
                },
                value: Some(Value::new(ty, ValueKind::Integer(discriminant.clone()))),
                is_extern: false,
            });
            let value_symbol = self.ctx.alloc_symbol(SymbolData {
                loc: value.loc,
                name: value.identifier.name,
                uses: Default::default(),
                kind: SymbolKind::Constant(object),
            });
            self.ctx
                .scope_insert(type_scope, value.identifier.name, value_symbol, false)?;
            self.ctx.static_symbols.push(value_symbol);
            value_symbols.push(value_symbol);

            next = discriminant + 1;
        }

        self.current_scope = saved_scope;

        match &mut self.ctx.ty_mut(ty).kind {
            TypeKind::Enum {
                value_symbols: slot,
                ..
            } => *slot = value_symbols,
            _ => unreachable!(),
        }

        Ok(ty)
    }

    fn resolve_type_members_from_decls(
        &mut self,
        ty: TypeId,
        members: &[CstMember],
    ) -> CompileResult<()> {
        self.resolve_type_members(ty, members)
    }

    fn resolve_decl_extend(
        &mut self,
        ty: &CstType,
        inner: &Rc<CstDecl>,
    ) -> CompileResult<SymbolId> {
        let extended = self.resolve_type(ty)?;
        match inner.kind {
            CstDeclKind::Constant { .. }
            | CstDeclKind::Function { .. }
            | CstDeclKind::Alias { .. } => {}
            _ => {
                return Err(Diagnostic::error(
                    inner.loc,
                    "type extension must declare a constant, function, or type alias",
                ));
            }
        }

        let type_scope = self.ctx.ty(extended).symbols;
        let type_name = self.ctx.type_name(extended).to_string();

        let saved_prefix = self.name_prefix.replace(type_name);
        let saved_decl_scope = self.decl_scope;
        let saved_scope = self.current_scope;
        self.decl_scope = type_scope;
        // Lookups still start from the module, not the extended type.

        let names = self.default_names(inner.name);
        let result = self.resolve_decl_in(inner, type_scope, names);

        self.name_prefix = saved_prefix;
        self.decl_scope = saved_decl_scope;
        self.current_scope = saved_scope;
        result
    }

    // ------------------------------------------------------------------
    // Function completion

    fn complete_function(&mut self, incomplete: &IncompleteFunction) -> CompileResult<()> {
        let (function_parameters, body) = match &incomplete.decl.kind {
            CstDeclKind::Function {
                function_parameters,
                body,
                ..
            } => (function_parameters, body),
            _ => unreachable!("queued incomplete declaration is a function"),
        };

        let ty = self.ctx.function(incomplete.function).ty;
        let (parameter_types, return_type) = match &self.ctx.ty(ty).kind {
            TypeKind::Function {
                parameter_types,
                return_type,
            } => (parameter_types.clone(), *return_type),
            _ => unreachable!(),
        };

        let function_scope = self.ctx.new_scope(Some(incomplete.scope));
        let mut symbol_parameters = Vec::with_capacity(function_parameters.len());
        for (parameter, &parameter_ty) in function_parameters.iter().zip(&parameter_types) {
            let object = self.ctx.alloc_object(Object {
                ty: parameter_ty,
                address: Address::Local {
                    name: parameter.identifier.name,
                    is_parameter: true,
                },
                value: None,
                is_extern: false,
            });
            let symbol = self.ctx.alloc_symbol(SymbolData {
                loc: parameter.loc,
                name: parameter.identifier.name,
                uses: Default::default(),
                kind: SymbolKind::Variable(object),
            });
            self.ctx
                .scope_insert(function_scope, parameter.identifier.name, symbol, false)?;
            symbol_parameters.push(symbol);
        }

        // The return slot lives beside the parameters; `return` is a keyword
        // so the name can never collide with source identifiers.
        let return_name = self.ctx.interner.intern("return");
        let return_object = self.ctx.alloc_object(Object {
            ty: return_type,
            address: Address::Local {
                name: return_name,
                is_parameter: false,
            },
            value: None,
            is_extern: false,
        });
        let symbol_return = self.ctx.alloc_symbol(SymbolData {
            loc: incomplete.decl.loc,
            name: return_name,
            uses: Default::default(),
            kind: SymbolKind::Variable(return_object),
        });

        let saved_function = self.current_function.replace(incomplete.function);
        let saved_return = self.return_type.replace(return_type);
        let saved_defer = self.current_defer.take();
        let saved_loop_defer = self.loop_defer.take();
        let saved_in_loop = std::mem::replace(&mut self.in_loop, false);
        let saved_defers = std::mem::take(&mut self.defers);
        let saved_scope = self.current_scope;
        self.current_scope = function_scope;

        let body = self.resolve_block(body, function_scope);

        self.current_scope = saved_scope;
        let defers = std::mem::replace(&mut self.defers, saved_defers);
        self.in_loop = saved_in_loop;
        self.loop_defer = saved_loop_defer;
        self.current_defer = saved_defer;
        self.return_type = saved_return;
        self.current_function = saved_function;

        let body = body?;
        let function = self.ctx.function_mut(incomplete.function);
        function.symbol_table = Some(function_scope);
        function.symbol_parameters = symbol_parameters;
        function.symbol_return = Some(symbol_return);
        function.body = Some(body);
        function.defers = defers;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Types

    pub(crate) fn check_sized(&self, loc: Loc, ty: TypeId) -> CompileResult<()> {
        if self.ctx.ty(ty).is_unsized() {
            return Err(Diagnostic::error(
                loc,
                format!(
                    "cannot declare storage of unsized type `{}`",
                    self.ctx.type_name(ty)
                ),
            ));
        }
        Ok(())
    }

    pub(crate) fn resolve_type(&mut self, cst: &CstType) -> CompileResult<TypeId> {
        match &cst.kind {
            CstTypeKind::Symbol(symbol) => {
                let resolved = self.resolve_symbol(symbol)?;
                match self.ctx.symbol(resolved).kind {
                    SymbolKind::Type(ty) => Ok(ty),
                    _ => Err(Diagnostic::error(
                        cst.loc,
                        format!("`{}` is not a type", self.ctx.symbol_name(resolved)),
                    )),
                }
            }
            CstTypeKind::Function {
                parameter_types,
                return_type,
            } => {
                let mut parameters = Vec::with_capacity(parameter_types.len());
                for parameter in parameter_types {
                    parameters.push(self.resolve_type(parameter)?);
                }
                let return_type = self.resolve_type(return_type)?;
                Ok(self.ctx.unique_function(parameters, return_type))
            }
            CstTypeKind::Pointer { base } => {
                let base = self.resolve_type(base)?;
                Ok(self.ctx.unique_pointer(base))
            }
            CstTypeKind::Array { count, base } => {
                let count = self.resolve_array_count(count)?;
                let base = self.resolve_type(base)?;
                self.ctx.unique_array(cst.loc, count, base)
            }
            CstTypeKind::Slice { base } => {
                let base = self.resolve_type(base)?;
                Ok(self.ctx.unique_slice(base))
            }
            CstTypeKind::Struct { members } | CstTypeKind::Union { members } => {
                let is_struct = matches!(cst.kind, CstTypeKind::Struct { .. });
                let name = self
                    .ctx
                    .unique_static_name(if is_struct { "struct" } else { "union" });
                let type_scope = self.ctx.new_scope(Some(self.current_scope));
                let kind = if is_struct {
                    TypeKind::Struct {
                        is_complete: false,
                        members: Vec::new(),
                    }
                } else {
                    TypeKind::Union {
                        is_complete: false,
                        members: Vec::new(),
                    }
                };
                let ty = self.ctx.alloc_type(Type {
                    name,
                    size: 0,
                    align: 0,
                    symbols: type_scope,
                    kind,
                });
                self.complete_composite(ty, members, is_struct)?;
                Ok(ty)
            }
            CstTypeKind::Enum { ty, values } => {
                let name = self.ctx.unique_static_name("enum");
                let type_scope = self.ctx.new_scope(Some(self.current_scope));
                let qualified = self.ctx.interner.resolve(name).to_string();
                self.make_enum_type(name, type_scope, ty.as_deref(), values, &qualified)
            }
            CstTypeKind::Typeof { expr } => {
                let resolved = self.resolve_expr(expr)?;
                Ok(resolved.ty)
            }
        }
    }

    fn resolve_array_count(&mut self, count: &crate::cst::CstExpr) -> CompileResult<u64> {
        use num_traits::ToPrimitive;

        let resolved = self.resolve_expr(count)?;
        let resolved = self.implicit_cast(resolved, self.ctx.builtin.usize)?;
        let value = eval::eval_rvalue(self.ctx, &resolved)?;
        Ok(value
            .as_integer()
            .to_u64()
            .expect("usize value fits in u64"))
    }

    // ------------------------------------------------------------------
    // Symbols

    pub(crate) fn resolve_symbol(&mut self, symbol: &CstSymbol) -> CompileResult<SymbolId> {
        let first = &symbol.elements[0];

        let mut current = match symbol.start {
            CstSymbolStart::None => self
                .ctx
                .scope_lookup(self.current_scope, first.identifier.name),
            CstSymbolStart::Root => {
                let root = self.ctx.module(self.module).symbols;
                self.ctx.scope_lookup(root, first.identifier.name)
            }
            CstSymbolStart::Type => {
                let ty = self.resolve_type(symbol.ty.as_ref().expect("typeof symbol has a type"))?;
                let scope = self.ctx.ty(ty).symbols;
                self.ctx.scope_lookup_local(scope, first.identifier.name)
            }
        }
        .ok_or_else(|| {
            Diagnostic::error(
                first.loc,
                format!(
                    "use of undeclared identifier `{}`",
                    self.ctx.interner.resolve(first.identifier.name)
                ),
            )
        })?;

        if !first.template_arguments.is_empty() {
            current = self.instantiate_template(current, &first.template_arguments, first.loc)?;
        }

        for element in &symbol.elements[1..] {
            let scope = match self.ctx.symbol(current).kind {
                SymbolKind::Namespace(scope) => scope,
                SymbolKind::Type(ty) => self.ctx.ty(ty).symbols,
                _ => {
                    return Err(Diagnostic::error(
                        element.loc,
                        format!(
                            "`{}` is not a namespace or type",
                            self.ctx.symbol_name(current)
                        ),
                    ));
                }
            };
            current = self
                .ctx
                .scope_lookup_local(scope, element.identifier.name)
                .ok_or_else(|| {
                    Diagnostic::error(
                        element.loc,
                        format!(
                            "use of undeclared identifier `{}`",
                            self.ctx.interner.resolve(element.identifier.name)
                        ),
                    )
                })?;
            if !element.template_arguments.is_empty() {
                current =
                    self.instantiate_template(current, &element.template_arguments, element.loc)?;
            }
        }

        Ok(current)
    }

    // ------------------------------------------------------------------
    // Templates

    pub(crate) fn instantiate_template(
        &mut self,
        symbol: SymbolId,
        arguments: &[CstType],
        loc: Loc,
    ) -> CompileResult<SymbolId> {
        let (decl, name_prefix, parent_scope, instances) = match &self.ctx.symbol(symbol).kind {
            SymbolKind::Template(template) => (
                Rc::clone(&template.decl),
                template.symbol_name_prefix,
                template.parent_scope,
                template.instances,
            ),
            _ => {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "`{}` is not a template",
                        self.ctx.symbol_name(symbol)
                    ),
                ));
            }
        };

        let parameters: &[CstIdentifier] = match &decl.kind {
            CstDeclKind::Function {
                template_parameters,
                ..
            }
            | CstDeclKind::Struct {
                template_parameters,
                ..
            }
            | CstDeclKind::Union {
                template_parameters,
                ..
            } => template_parameters,
            _ => unreachable!("templates are functions, structs, or unions"),
        };
        if parameters.len() != arguments.len() {
            return Err(Diagnostic::error(
                loc,
                format!(
                    "template `{}` expects {} template arguments, received {}",
                    self.ctx.interner.resolve(decl.name),
                    parameters.len(),
                    arguments.len()
                ),
            ));
        }

        let mut argument_types = Vec::with_capacity(arguments.len());
        for argument in arguments {
            argument_types.push(self.resolve_type(argument)?);
        }

        let arguments_text = argument_types
            .iter()
            .map(|&ty| self.ctx.type_name(ty).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let cache_key = self.ctx.interner.intern(&format!(
            "{}[[{}]]",
            self.ctx.interner.resolve(decl.name),
            arguments_text
        ));
        if let Some(existing) = self.ctx.scope_lookup_local(instances, cache_key) {
            return Ok(existing);
        }

        let qualified = format!(
            "{}[[{}]]",
            self.ctx.interner.resolve(name_prefix),
            arguments_text
        );

        let instance_scope = self.ctx.new_scope(Some(parent_scope));
        for (parameter, &argument) in parameters.iter().zip(&argument_types) {
            let bound = self.ctx.alloc_symbol(SymbolData {
                loc,
                name: parameter.name,
                uses: Default::default(),
                kind: SymbolKind::Type(argument),
            });
            self.ctx
                .scope_insert(instance_scope, parameter.name, bound, false)?;
        }

        let link_name = self.ctx.interner.intern(&qualified);
        self.ctx.template_chain.push(TemplateLink {
            name: link_name,
            loc,
        });

        let saved_scope = self.current_scope;
        let saved_decl_scope = self.decl_scope;
        let saved_prefix = self.name_prefix.take();
        self.current_scope = instance_scope;
        self.decl_scope = instances;

        let names = DeclNames {
            key: cache_key,
            qualified,
        };
        let instance = self.resolve_decl_in(&decl, instances, names);

        self.current_scope = saved_scope;
        self.decl_scope = saved_decl_scope;
        self.name_prefix = saved_prefix;

        let instance = instance?;
        self.ctx.template_chain.pop();
        Ok(instance)
    }
}

fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    value.div_ceil(align) * align
}
