//! Dependency orderer.
//!
//! Produces a total order over a module's top-level declarations such that a
//! declaration only depends on declarations ordered before it, with two
//! exceptions: struct and union declarations are marked ordered before their
//! members are walked so that self-referential pointer members are legal, and
//! templated declarations are leaves because their bodies are resolved lazily
//! at instantiation time.

use std::rc::Rc;

use crate::cst::{
    CstDecl, CstDeclKind, CstExpr, CstExprKind, CstMember, CstMemberKind, CstModule, CstSymbol,
    CstSymbolStart, CstType, CstTypeKind,
};
use crate::error::{CompileResult, Diagnostic};
use crate::intern::{Interner, Symbol};
use crate::token::Loc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unordered,
    Ordering,
    Ordered,
}

struct Orderer<'a> {
    module: &'a CstModule,
    interner: &'a Interner,
    states: Vec<State>,
    ordered: Vec<Rc<CstDecl>>,
    /// Declaration indices currently on the DFS stack, used to report the
    /// dependency chain when a cycle is found.
    dependencies: Vec<usize>,
}

/// Topologically order the module's top-level declarations.
pub fn order(module: &CstModule, interner: &Interner) -> CompileResult<Vec<Rc<CstDecl>>> {
    let mut orderer = Orderer::new(module, interner)?;

    // Extend declarations must come after all other declarations.
    for i in 1..module.decls.len() {
        let prev = &module.decls[i - 1];
        let decl = &module.decls[i];
        if !decl.is_extend() && prev.is_extend() {
            return Err(Diagnostic::error(
                prev.loc,
                "extend declaration must appear after all module-level declarations",
            ));
        }
    }

    for i in 0..module.decls.len() {
        orderer.order_tldecl(i)?;
    }

    debug_assert_eq!(orderer.ordered.len(), module.decls.len());
    Ok(orderer.ordered)
}

impl<'a> Orderer<'a> {
    fn new(module: &'a CstModule, interner: &'a Interner) -> CompileResult<Self> {
        let orderer = Orderer {
            module,
            interner,
            states: vec![State::Unordered; module.decls.len()],
            ordered: Vec::new(),
            dependencies: Vec::new(),
        };

        for (i, decl) in module.decls.iter().enumerate() {
            let existing = module.decls[..i]
                .iter()
                .find(|prev| prev.name == decl.name && !prev.is_extend());
            if let Some(existing) = existing {
                if !decl.is_extend() {
                    return Err(Diagnostic::error(
                        decl.loc,
                        format!(
                            "redeclaration of `{}` previously declared at [{}:{}]",
                            interner.resolve(existing.name),
                            interner.resolve(existing.loc.path),
                            existing.loc.line
                        ),
                    ));
                }
            }
        }

        Ok(orderer)
    }

    fn tldecl_lookup(&self, name: Symbol) -> Option<usize> {
        self.module
            .decls
            .iter()
            .position(|decl| decl.name == name && !decl.is_extend())
    }

    fn order_tldecl(&mut self, index: usize) -> CompileResult<()> {
        match self.states[index] {
            State::Ordered => return Ok(()),
            State::Ordering => {
                let decl = &self.module.decls[index];
                let mut diagnostic = Diagnostic::error(
                    decl.loc,
                    format!(
                        "circular dependency created by declaration of `{}`",
                        self.interner.resolve(decl.name)
                    ),
                );
                for (i, &dep) in self.dependencies.iter().enumerate() {
                    let next = if i + 1 != self.dependencies.len() {
                        self.dependencies[i + 1]
                    } else {
                        self.dependencies[0]
                    };
                    let dep = &self.module.decls[dep];
                    let next = &self.module.decls[next];
                    diagnostic = diagnostic.note(
                        Loc::NONE,
                        format!(
                            "declaration of `{}` (line {}) depends on `{}` (line {})",
                            self.interner.resolve(dep.name),
                            dep.loc.line,
                            self.interner.resolve(next.name),
                            next.loc.line
                        ),
                    );
                }
                return Err(diagnostic);
            }
            State::Unordered => {}
        }

        self.states[index] = State::Ordering;
        self.dependencies.push(index);
        let decl = Rc::clone(&self.module.decls[index]);
        self.order_decl(&decl)?;
        self.dependencies.pop();
        self.states[index] = State::Ordered;

        self.ordered.push(decl);
        Ok(())
    }

    fn order_decl(&mut self, decl: &CstDecl) -> CompileResult<()> {
        match &decl.kind {
            CstDeclKind::Variable { ty, expr, .. } | CstDeclKind::Constant { ty, expr, .. } => {
                if let Some(ty) = ty {
                    self.order_type(ty)?;
                }
                if let Some(expr) = expr {
                    self.order_expr(expr)?;
                }
                Ok(())
            }
            CstDeclKind::Function {
                template_parameters,
                function_parameters,
                return_type,
                ..
            } => {
                if !template_parameters.is_empty() {
                    return Ok(());
                }
                for parameter in function_parameters {
                    self.order_type(&parameter.ty)?;
                }
                self.order_type(return_type)
            }
            CstDeclKind::Struct {
                template_parameters,
                members,
                ..
            }
            | CstDeclKind::Union {
                template_parameters,
                members,
                ..
            } => {
                if !template_parameters.is_empty() {
                    return Ok(());
                }

                // Mark the declaration ordered up front so self-referential
                // members resolve, mirroring the two-phase completion done by
                // the resolver. The lookup misses when this struct is nested
                // inside an extend declaration; the resolver reports that
                // case, so skip ordering here.
                match self.tldecl_lookup(decl.name) {
                    Some(index) => self.states[index] = State::Ordered,
                    None => return Ok(()),
                }

                self.order_members(members)
            }
            CstDeclKind::Enum { values, .. } => {
                for value in values {
                    if let Some(expr) = &value.expr {
                        self.order_expr(expr)?;
                    }
                }
                Ok(())
            }
            CstDeclKind::Extend { .. } => {
                // Extend declarations are resolved in declaration order after
                // all module-level declarations.
                Ok(())
            }
            CstDeclKind::Alias { ty, .. } | CstDeclKind::ExternVariable { ty, .. } => {
                self.order_type(ty)
            }
            CstDeclKind::ExternFunction {
                function_parameters,
                return_type,
                ..
            } => {
                for parameter in function_parameters {
                    self.order_type(&parameter.ty)?;
                }
                self.order_type(return_type)
            }
            CstDeclKind::ExternType { .. } => Ok(()),
        }
    }

    fn order_members(&mut self, members: &[CstMember]) -> CompileResult<()> {
        for member in members {
            match &member.kind {
                CstMemberKind::Variable { ty, .. } => self.order_type(ty)?,
                CstMemberKind::Constant(decl)
                | CstMemberKind::Function(decl)
                | CstMemberKind::Alias(decl) => self.order_decl(decl)?,
            }
        }
        Ok(())
    }

    fn order_expr(&mut self, expr: &CstExpr) -> CompileResult<()> {
        match &expr.kind {
            CstExprKind::Symbol(symbol) => self.order_symbol(symbol),
            CstExprKind::Boolean(_)
            | CstExprKind::Integer { .. }
            | CstExprKind::Ieee754 { .. }
            | CstExprKind::Character(_)
            | CstExprKind::Bytes(_)
            | CstExprKind::Fileof
            | CstExprKind::Lineof
            | CstExprKind::Embed(_) => Ok(()),
            CstExprKind::List {
                elements, ellipsis, ..
            } => {
                for element in elements {
                    self.order_expr(element)?;
                }
                if let Some(ellipsis) = ellipsis {
                    self.order_expr(ellipsis)?;
                }
                Ok(())
            }
            CstExprKind::Slice { start, count, .. } => {
                self.order_expr(start)?;
                self.order_expr(count)
            }
            CstExprKind::Init {
                ty, initializers, ..
            } => {
                self.order_type(ty)?;
                for initializer in initializers {
                    if let Some(expr) = &initializer.expr {
                        self.order_expr(expr)?;
                    }
                }
                Ok(())
            }
            CstExprKind::Cast { ty, expr } => {
                self.order_type(ty)?;
                self.order_expr(expr)
            }
            CstExprKind::Grouped { expr } => self.order_expr(expr),
            CstExprKind::Call { func, arguments } => {
                self.order_expr(func)?;
                for argument in arguments {
                    self.order_expr(argument)?;
                }
                Ok(())
            }
            CstExprKind::AccessIndex { lhs, idx } => {
                self.order_expr(lhs)?;
                self.order_expr(idx)
            }
            CstExprKind::AccessSlice { lhs, begin, end } => {
                self.order_expr(lhs)?;
                self.order_expr(begin)?;
                self.order_expr(end)
            }
            CstExprKind::AccessMember { lhs, .. } => self.order_expr(lhs),
            CstExprKind::AccessDereference { lhs } => self.order_expr(lhs),
            CstExprKind::Defined(_) => Ok(()),
            CstExprKind::Sizeof(ty) | CstExprKind::Alignof(ty) => self.order_type(ty),
            CstExprKind::Unary { rhs, .. } => self.order_expr(rhs),
            CstExprKind::Binary { lhs, rhs, .. } => {
                self.order_expr(lhs)?;
                self.order_expr(rhs)
            }
        }
    }

    fn order_type(&mut self, ty: &CstType) -> CompileResult<()> {
        match &ty.kind {
            CstTypeKind::Symbol(symbol) => self.order_symbol(symbol),
            CstTypeKind::Function {
                parameter_types,
                return_type,
            } => {
                for parameter_type in parameter_types {
                    self.order_type(parameter_type)?;
                }
                self.order_type(return_type)
            }
            CstTypeKind::Pointer { base } => self.order_type(base),
            CstTypeKind::Array { count, base } => {
                self.order_expr(count)?;
                self.order_type(base)
            }
            CstTypeKind::Slice { base } => self.order_type(base),
            CstTypeKind::Struct { members } | CstTypeKind::Union { members } => {
                for member in members {
                    match &member.kind {
                        CstMemberKind::Variable { ty, .. } => self.order_type(ty)?,
                        _ => unreachable!("anonymous composites hold only member variables"),
                    }
                }
                Ok(())
            }
            CstTypeKind::Enum { values, .. } => {
                for value in values {
                    if let Some(expr) = &value.expr {
                        self.order_expr(expr)?;
                    }
                }
                Ok(())
            }
            CstTypeKind::Typeof { expr } => self.order_expr(expr),
        }
    }

    fn order_symbol(&mut self, symbol: &CstSymbol) -> CompileResult<()> {
        // Template arguments may refer to declarations in this module even
        // when the symbol itself does not, so always order them.
        for element in &symbol.elements {
            for argument in &element.template_arguments {
                self.order_type(argument)?;
            }
        }

        let elem0_name = symbol.elements[0].identifier.name;
        let elem0_defined_here = self.tldecl_lookup(elem0_name).is_some();
        let search_qualified = symbol.start == CstSymbolStart::Root || !elem0_defined_here;
        if search_qualified {
            let namespace_count = self
                .module
                .namespace
                .as_ref()
                .map(|namespace| namespace.identifiers.len())
                .unwrap_or(0);
            for i in 0..namespace_count {
                if i >= symbol.elements.len() {
                    return Ok(());
                }
                let element_name = symbol.elements[i].identifier.name;
                let namespace_name = self.module.namespace.as_ref().unwrap().identifiers[i].name;
                if element_name != namespace_name {
                    // The symbol does not live under this module's namespace;
                    // assume it names a construct from some other module.
                    return Ok(());
                }
            }

            if namespace_count < symbol.elements.len() {
                self.order_name(symbol.elements[namespace_count].identifier.name)?;
            }
            return Ok(());
        }

        if symbol.start == CstSymbolStart::Type {
            return self.order_type(symbol.ty.as_ref().expect("typeof symbol carries a type"));
        }

        self.order_name(symbol.elements[0].identifier.name)
    }

    fn order_name(&mut self, name: Symbol) -> CompileResult<()> {
        match self.tldecl_lookup(name) {
            // Unknown names are assumed to be builtins or symbols from other
            // modules; later stages report unknown identifiers.
            None => Ok(()),
            Some(index) => self.order_tldecl(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn parse_and_order(source: &str) -> (Vec<String>, Interner) {
        let mut interner = Interner::new();
        let path = interner.intern("test.sunder");
        let module = parse::parse(path, source, &mut interner).expect("parsing failed");
        let ordered = order(&module, &interner).expect("ordering failed");
        let names = ordered
            .iter()
            .map(|decl| interner.resolve(decl.name).to_string())
            .collect();
        (names, interner)
    }

    fn order_error(source: &str) -> Diagnostic {
        let mut interner = Interner::new();
        let path = interner.intern("test.sunder");
        let module = parse::parse(path, source, &mut interner).expect("parsing failed");
        order(&module, &interner).expect_err("expected an ordering error")
    }

    #[test]
    fn later_dependency_is_hoisted() {
        let (names, _) = parse_and_order("let A: s32 = B;\nlet B: s32 = 1;\n");
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn independent_declarations_keep_source_order() {
        let (names, _) = parse_and_order("let A: s32 = 1;\nlet B: s32 = 2;\nlet C: s32 = 3;\n");
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn self_referential_struct_orders() {
        let (names, _) =
            parse_and_order("struct Node { var next: *Node; var value: s32; }\n");
        assert_eq!(names, vec!["Node"]);
    }

    #[test]
    fn mutually_referential_structs_order() {
        let (names, _) = parse_and_order(
            "struct A { var other: *B; }\nstruct B { var other: *A; }\n",
        );
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn cycle_reports_chain() {
        let diagnostic = order_error("let A: s32 = B;\nlet B: s32 = A;\n");
        assert!(
            diagnostic
                .message
                .contains("circular dependency created by declaration of `A`"),
            "{}",
            diagnostic.message
        );
        assert_eq!(diagnostic.notes.len(), 2);
        assert!(diagnostic.notes[0].1.contains("`A` (line 1) depends on `B` (line 2)"));
        assert!(diagnostic.notes[1].1.contains("`B` (line 2) depends on `A` (line 1)"));
    }

    #[test]
    fn redeclaration_is_fatal() {
        let diagnostic = order_error("let A: s32 = 1;\nlet A: s32 = 2;\n");
        assert!(
            diagnostic.message.contains("redeclaration of `A`"),
            "{}",
            diagnostic.message
        );
    }

    #[test]
    fn extend_before_other_declarations_is_fatal() {
        let diagnostic = order_error(
            "extend s32 func zero() s32 { return 0; }\nlet A: s32 = 1;\n",
        );
        assert!(
            diagnostic.message.contains("must appear after"),
            "{}",
            diagnostic.message
        );
    }

    #[test]
    fn templated_declarations_are_leaves() {
        // `id` mentions `T` freely and `helper` in its body; neither creates
        // ordering edges because templates resolve at instantiation time.
        let (names, _) = parse_and_order(
            "func id[[T]](x: T) T { return helper(x); }\nfunc helper(x: s32) s32 { return x; }\n",
        );
        assert_eq!(names, vec!["id", "helper"]);
    }

    #[test]
    fn function_signature_creates_edges_but_body_does_not() {
        let (names, _) = parse_and_order(
            "func f(x: Word) Word { return g(x); }\nfunc g(x: Word) Word { return x; }\ntype Word = u64;\n",
        );
        assert_eq!(names, vec!["Word", "f", "g"]);
    }

    #[test]
    fn namespace_qualified_self_reference_orders() {
        let (names, _) = parse_and_order(
            "namespace m;\nlet A: s32 = m::B;\nlet B: s32 = 1;\n",
        );
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn ordering_is_idempotent() {
        let source = "let A: s32 = B;\nlet C: s32 = A;\nlet B: s32 = 1;\n";
        let (names, _) = parse_and_order(source);
        assert_eq!(names, vec!["B", "A", "C"]);

        // Feeding the already-ordered program back through leaves it unchanged.
        let reordered = "let B: s32 = 1;\nlet A: s32 = B;\nlet C: s32 = A;\n";
        let (names, _) = parse_and_order(reordered);
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn enum_values_create_edges() {
        let (names, _) = parse_and_order(
            "enum E { X = BASE; }\nlet BASE: s32 = 7;\n",
        );
        assert_eq!(names, vec!["BASE", "E"]);
    }
}
