//! Statement and block resolution inside function bodies.

use std::rc::Rc;

use num_bigint::BigInt;

use crate::ast::{
    Address, AssignOp, Block, Conditional, Defer, DeferId, Expr, ExprKind, Object, Stmt, StmtKind,
    SwitchCase,
};
use crate::cst::{
    CstBlock, CstConditional, CstDecl, CstDeclKind, CstStmt, CstStmtKind, CstSwitchCase,
};
use crate::error::{CompileResult, Diagnostic};
use crate::eval;
use crate::symbol::{ScopeId, SymbolData, SymbolId, SymbolKind};
use crate::token::{Loc, TokenKind};
use crate::types::TypeKind;
use crate::value::{Value, ValueKind};

use super::expr::expr_is_lvalue;
use super::Resolver;

fn assign_op(kind: TokenKind) -> AssignOp {
    match kind {
        TokenKind::Assign => AssignOp::Assign,
        TokenKind::PlusAssign => AssignOp::Add,
        TokenKind::DashAssign => AssignOp::Sub,
        TokenKind::StarAssign => AssignOp::Mul,
        TokenKind::SlashAssign => AssignOp::Div,
        TokenKind::PercentAssign => AssignOp::Rem,
        TokenKind::PlusPercentAssign => AssignOp::AddWrapping,
        TokenKind::DashPercentAssign => AssignOp::SubWrapping,
        TokenKind::StarPercentAssign => AssignOp::MulWrapping,
        TokenKind::ShlAssign => AssignOp::Shl,
        TokenKind::ShrAssign => AssignOp::Shr,
        TokenKind::PipeAssign => AssignOp::Bitor,
        TokenKind::CaretAssign => AssignOp::Bitxor,
        TokenKind::AmpersandAssign => AssignOp::Bitand,
        _ => unreachable!("parser produced unknown assignment operator"),
    }
}

/// Binary operator a compound assignment desugars to, spelled as the
/// corresponding binary sigil for re-use of the binary checking path.
fn compound_token(op: AssignOp) -> Option<TokenKind> {
    match op {
        AssignOp::Assign => None,
        AssignOp::Add => Some(TokenKind::Plus),
        AssignOp::Sub => Some(TokenKind::Dash),
        AssignOp::Mul => Some(TokenKind::Star),
        AssignOp::Div => Some(TokenKind::Slash),
        AssignOp::Rem => Some(TokenKind::Percent),
        AssignOp::AddWrapping => Some(TokenKind::PlusPercent),
        AssignOp::SubWrapping => Some(TokenKind::DashPercent),
        AssignOp::MulWrapping => Some(TokenKind::StarPercent),
        AssignOp::Shl => Some(TokenKind::Shl),
        AssignOp::Shr => Some(TokenKind::Shr),
        AssignOp::Bitor => Some(TokenKind::Pipe),
        AssignOp::Bitxor => Some(TokenKind::Caret),
        AssignOp::Bitand => Some(TokenKind::Ampersand),
    }
}

impl<'ctx> Resolver<'ctx> {
    pub(crate) fn resolve_block(
        &mut self,
        cst: &CstBlock,
        parent: ScopeId,
    ) -> CompileResult<Block> {
        let scope = self.ctx.new_scope(Some(parent));
        let saved_scope = std::mem::replace(&mut self.current_scope, scope);
        let entry_defer = self.current_defer;

        let mut stmts = Vec::new();
        let mut result = Ok(());
        for stmt in &cst.stmts {
            match self.resolve_stmt(stmt) {
                Ok(Some(stmt)) => stmts.push(stmt),
                Ok(None) => {}
                Err(diagnostic) => {
                    result = Err(diagnostic);
                    break;
                }
            }
        }

        let exit_defer = self.current_defer;
        self.current_defer = entry_defer;
        self.current_scope = saved_scope;
        result?;

        Ok(Block {
            loc: cst.loc,
            symbol_table: scope,
            stmts,
            defer_begin: exit_defer,
            defer_end: entry_defer,
        })
    }

    fn resolve_stmt(&mut self, cst: &CstStmt) -> CompileResult<Option<Stmt>> {
        match &cst.kind {
            CstStmtKind::Decl(decl) => self.resolve_stmt_decl(cst.loc, decl),
            CstStmtKind::DeferBlock(block) => {
                let body = self.resolve_block(block, self.current_scope)?;
                Ok(Some(self.push_defer(cst.loc, body)))
            }
            CstStmtKind::DeferExpr(expr) => {
                let scope = self.ctx.new_scope(Some(self.current_scope));
                let expr = self.resolve_expr(expr)?;
                let body = Block {
                    loc: cst.loc,
                    symbol_table: scope,
                    stmts: vec![Stmt {
                        loc: expr.loc,
                        kind: StmtKind::Expr(expr),
                    }],
                    defer_begin: None,
                    defer_end: None,
                };
                Ok(Some(self.push_defer(cst.loc, body)))
            }
            CstStmtKind::If { conditionals } => {
                let mut resolved = Vec::with_capacity(conditionals.len());
                for conditional in conditionals {
                    resolved.push(self.resolve_conditional(conditional)?);
                }
                Ok(Some(Stmt {
                    loc: cst.loc,
                    kind: StmtKind::If {
                        conditionals: resolved,
                    },
                }))
            }
            CstStmtKind::When { conditionals } => self.resolve_stmt_when(conditionals),
            CstStmtKind::ForRange {
                identifier,
                ty,
                begin,
                end,
                body,
            } => self.resolve_stmt_for_range(cst.loc, identifier, ty.as_ref(), begin.as_ref(), end, body),
            CstStmtKind::ForExpr { expr, body } => {
                let expr = self.resolve_expr(expr)?;
                self.check_bool(&expr)?;
                let body = self.resolve_loop_body(body)?;
                Ok(Some(Stmt {
                    loc: cst.loc,
                    kind: StmtKind::ForExpr { expr, body },
                }))
            }
            CstStmtKind::Break => {
                if !self.in_loop {
                    return Err(Diagnostic::error(cst.loc, "break statement outside of loop"));
                }
                Ok(Some(Stmt {
                    loc: cst.loc,
                    kind: StmtKind::Break {
                        defer_begin: self.current_defer,
                        defer_end: self.loop_defer,
                    },
                }))
            }
            CstStmtKind::Continue => {
                if !self.in_loop {
                    return Err(Diagnostic::error(
                        cst.loc,
                        "continue statement outside of loop",
                    ));
                }
                Ok(Some(Stmt {
                    loc: cst.loc,
                    kind: StmtKind::Continue {
                        defer_begin: self.current_defer,
                        defer_end: self.loop_defer,
                    },
                }))
            }
            CstStmtKind::Switch { expr, cases } => self.resolve_stmt_switch(cst.loc, expr, cases),
            CstStmtKind::Return { expr } => self.resolve_stmt_return(cst.loc, expr.as_ref()),
            CstStmtKind::Assert { expr } => {
                let expr = self.resolve_expr(expr)?;
                self.check_bool(&expr)?;
                Ok(Some(Stmt {
                    loc: cst.loc,
                    kind: StmtKind::Assert { expr },
                }))
            }
            CstStmtKind::Assign { op, lhs, rhs } => self.resolve_stmt_assign(cst.loc, *op, lhs, rhs),
            CstStmtKind::Expr(expr) => {
                let expr = self.resolve_expr(expr)?;
                Ok(Some(Stmt {
                    loc: cst.loc,
                    kind: StmtKind::Expr(expr),
                }))
            }
        }
    }

    fn push_defer(&mut self, loc: Loc, body: Block) -> Stmt {
        let id = DeferId(self.defers.len() as u32);
        self.defers.push(Defer {
            prev: self.current_defer,
            body,
        });
        self.current_defer = Some(id);
        Stmt {
            loc,
            kind: StmtKind::Defer(id),
        }
    }

    fn check_bool(&self, expr: &Expr) -> CompileResult<()> {
        if !matches!(self.ctx.ty(expr.ty).kind, TypeKind::Bool) {
            return Err(Diagnostic::error(
                expr.loc,
                format!(
                    "expected `bool`, found `{}`",
                    self.ctx.type_name(expr.ty)
                ),
            ));
        }
        Ok(())
    }

    fn resolve_conditional(&mut self, cst: &CstConditional) -> CompileResult<Conditional> {
        let condition = match &cst.condition {
            Some(condition) => {
                let condition = self.resolve_expr(condition)?;
                self.check_bool(&condition)?;
                Some(condition)
            }
            None => None,
        };
        let body = self.resolve_block(&cst.body, self.current_scope)?;
        Ok(Conditional {
            loc: cst.loc,
            condition,
            body,
        })
    }

    /// `when` chains are compile-time selection: conditions are evaluated
    /// during resolution and only the chosen branch is resolved at all.
    fn resolve_stmt_when(
        &mut self,
        conditionals: &[CstConditional],
    ) -> CompileResult<Option<Stmt>> {
        for conditional in conditionals {
            let chosen = match &conditional.condition {
                Some(condition) => {
                    let condition = self.resolve_expr(condition)?;
                    self.check_bool(&condition)?;
                    let value = eval::eval_rvalue(self.ctx, &condition)?;
                    value.as_boolean()
                }
                None => true,
            };
            if chosen {
                let body = self.resolve_block(&conditional.body, self.current_scope)?;
                return Ok(Some(Stmt {
                    loc: conditional.loc,
                    kind: StmtKind::If {
                        conditionals: vec![Conditional {
                            loc: conditional.loc,
                            condition: None,
                            body,
                        }],
                    },
                }));
            }
        }
        Ok(None)
    }

    fn resolve_loop_body(&mut self, body: &CstBlock) -> CompileResult<Block> {
        let saved_in_loop = std::mem::replace(&mut self.in_loop, true);
        let saved_loop_defer = std::mem::replace(&mut self.loop_defer, self.current_defer);
        let resolved = self.resolve_block(body, self.current_scope);
        self.loop_defer = saved_loop_defer;
        self.in_loop = saved_in_loop;
        resolved
    }

    fn resolve_stmt_for_range(
        &mut self,
        loc: Loc,
        identifier: &crate::cst::CstIdentifier,
        ty: Option<&crate::cst::CstType>,
        begin: Option<&crate::cst::CstExpr>,
        end: &crate::cst::CstExpr,
        body: &CstBlock,
    ) -> CompileResult<Option<Stmt>> {
        let loop_ty = match ty {
            Some(ty) => self.resolve_type(ty)?,
            None => self.ctx.builtin.usize,
        };
        if !self.ctx.ty(loop_ty).is_sized_integer() {
            return Err(Diagnostic::error(
                loc,
                format!(
                    "loop variable requires a sized integer type, found `{}`",
                    self.ctx.type_name(loop_ty)
                ),
            ));
        }

        let begin = match begin {
            Some(begin) => {
                let begin = self.resolve_expr(begin)?;
                self.implicit_cast(begin, loop_ty)?
            }
            None => Expr::new(
                loc,
                loop_ty,
                ExprKind::Value(Value::new(loop_ty, ValueKind::Integer(BigInt::from(0u8)))),
            ),
        };
        let end = self.resolve_expr(end)?;
        let end = self.implicit_cast(end, loop_ty)?;

        // The loop variable lives in its own scope enclosing the body.
        let loop_scope = self.ctx.new_scope(Some(self.current_scope));
        let object = self.ctx.alloc_object(Object {
            ty: loop_ty,
            address: Address::Local {
                name: identifier.name,
                is_parameter: false,
            },
            value: None,
            is_extern: false,
        });
        let loop_variable = self.ctx.alloc_symbol(SymbolData {
            loc: identifier.loc,
            name: identifier.name,
            uses: Default::default(),
            kind: SymbolKind::Variable(object),
        });
        self.ctx
            .scope_insert(loop_scope, identifier.name, loop_variable, false)?;
        self.bump_local_stack(loop_ty);

        let saved_scope = std::mem::replace(&mut self.current_scope, loop_scope);
        let saved_in_loop = std::mem::replace(&mut self.in_loop, true);
        let saved_loop_defer = std::mem::replace(&mut self.loop_defer, self.current_defer);
        let body = self.resolve_block(body, loop_scope);
        self.loop_defer = saved_loop_defer;
        self.in_loop = saved_in_loop;
        self.current_scope = saved_scope;
        let body = body?;

        Ok(Some(Stmt {
            loc,
            kind: StmtKind::ForRange {
                loop_variable,
                begin,
                end,
                body,
            },
        }))
    }

    fn resolve_stmt_switch(
        &mut self,
        loc: Loc,
        expr: &crate::cst::CstExpr,
        cases: &[CstSwitchCase],
    ) -> CompileResult<Option<Stmt>> {
        let expr = self.resolve_expr(expr)?;
        if !matches!(self.ctx.ty(expr.ty).kind, TypeKind::Enum { .. }) {
            return Err(Diagnostic::error(
                expr.loc,
                format!(
                    "switch requires an expression of enum type, found `{}`",
                    self.ctx.type_name(expr.ty)
                ),
            ));
        }

        let mut resolved: Vec<SwitchCase> = Vec::new();
        for case in cases {
            let mut symbols = Vec::with_capacity(case.symbols.len());
            for symbol in &case.symbols {
                let symbol = self.resolve_symbol(symbol)?;
                let symbol_ty = match self.ctx.symbol(symbol).kind {
                    SymbolKind::Constant(object) => self.ctx.object(object).ty,
                    _ => {
                        return Err(Diagnostic::error(
                            case.loc,
                            format!(
                                "switch case `{}` is not an enum value",
                                self.ctx.symbol_name(symbol)
                            ),
                        ));
                    }
                };
                if symbol_ty != expr.ty {
                    return Err(Diagnostic::error(
                        case.loc,
                        format!(
                            "expected `{}`, found `{}`",
                            self.ctx.type_name(expr.ty),
                            self.ctx.type_name(symbol_ty)
                        ),
                    ));
                }
                symbols.push(symbol);
            }
            let body = self.resolve_block(&case.block, self.current_scope)?;
            resolved.push(SwitchCase { symbols, body });
        }

        Ok(Some(Stmt {
            loc,
            kind: StmtKind::Switch {
                expr,
                cases: resolved,
            },
        }))
    }

    fn resolve_stmt_return(
        &mut self,
        loc: Loc,
        expr: Option<&crate::cst::CstExpr>,
    ) -> CompileResult<Option<Stmt>> {
        let return_type = self
            .return_type
            .expect("return statements only resolve inside functions");

        let expr = match expr {
            Some(expr) => {
                let expr = self.resolve_expr(expr)?;
                Some(self.implicit_cast(expr, return_type)?)
            }
            None => {
                if !matches!(self.ctx.ty(return_type).kind, TypeKind::Void) {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "expected `{}`, found `void`",
                            self.ctx.type_name(return_type)
                        ),
                    ));
                }
                None
            }
        };

        Ok(Some(Stmt {
            loc,
            kind: StmtKind::Return {
                expr,
                defer: self.current_defer,
            },
        }))
    }

    fn resolve_stmt_assign(
        &mut self,
        loc: Loc,
        op: TokenKind,
        lhs: &crate::cst::CstExpr,
        rhs: &crate::cst::CstExpr,
    ) -> CompileResult<Option<Stmt>> {
        let lhs = self.resolve_expr(lhs)?;
        let rhs = self.resolve_expr(rhs)?;

        if !expr_is_lvalue(self.ctx, &lhs) {
            return Err(Diagnostic::error(
                loc,
                "left hand side of assignment is not an lvalue",
            ));
        }
        if let ExprKind::Symbol(symbol) = &lhs.kind {
            if matches!(self.ctx.symbol(*symbol).kind, SymbolKind::Constant(_)) {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "cannot assign to constant `{}`",
                        self.ctx.symbol_name(*symbol)
                    ),
                ));
            }
        }

        let op = assign_op(op);
        let rhs = match compound_token(op) {
            // Plain assignment sizes the right hand side to the left.
            None => self.implicit_cast(rhs, lhs.ty)?,
            Some(token) => {
                // Type-check the desugared binary operation, then keep the
                // checked right hand side.
                let checked = self.check_compound_operand(loc, token, &lhs, rhs)?;
                checked
            }
        };

        Ok(Some(Stmt {
            loc,
            kind: StmtKind::Assign { op, lhs, rhs },
        }))
    }

    /// Validate `lhs op= rhs` as if it were `lhs op rhs`, returning the
    /// right-hand operand with any implicit sizing applied.
    fn check_compound_operand(
        &mut self,
        loc: Loc,
        token: TokenKind,
        lhs: &Expr,
        rhs: Expr,
    ) -> CompileResult<Expr> {
        let lhs_ty = lhs.ty;
        match token {
            TokenKind::Shl | TokenKind::Shr => {
                if !self.ctx.ty(lhs_ty).is_sized_integer() {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "cannot apply `{}` to type `{}`",
                            token.to_str(),
                            self.ctx.type_name(lhs_ty)
                        ),
                    ));
                }
                self.implicit_cast(rhs, self.ctx.builtin.usize)
            }
            TokenKind::Plus | TokenKind::Dash | TokenKind::Star | TokenKind::Slash => {
                let ty = self.ctx.ty(lhs_ty);
                let numeric = ty.is_sized_integer()
                    || ty.is_ieee754()
                    || matches!(ty.kind, TypeKind::Byte);
                if !numeric {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "cannot apply `{}` to type `{}`",
                            token.to_str(),
                            self.ctx.type_name(lhs_ty)
                        ),
                    ));
                }
                self.implicit_cast(rhs, lhs_ty)
            }
            TokenKind::Percent
            | TokenKind::PlusPercent
            | TokenKind::DashPercent
            | TokenKind::StarPercent => {
                if !self.ctx.ty(lhs_ty).is_sized_integer() {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "cannot apply `{}` to type `{}`",
                            token.to_str(),
                            self.ctx.type_name(lhs_ty)
                        ),
                    ));
                }
                self.implicit_cast(rhs, lhs_ty)
            }
            TokenKind::Pipe | TokenKind::Caret | TokenKind::Ampersand => {
                let ty = self.ctx.ty(lhs_ty);
                let ok = matches!(ty.kind, TypeKind::Bool | TypeKind::Byte)
                    || ty.is_sized_integer();
                if !ok {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "cannot apply `{}` to type `{}`",
                            token.to_str(),
                            self.ctx.type_name(lhs_ty)
                        ),
                    ));
                }
                self.implicit_cast(rhs, lhs_ty)
            }
            _ => unreachable!(),
        }
    }

    fn bump_local_stack(&mut self, ty: crate::types::TypeId) {
        if let Some(function) = self.current_function {
            let size = self.ctx.ty(ty).size;
            let rounded = size.div_ceil(8) * 8;
            self.ctx.function_mut(function).local_stack_offset += rounded;
        }
    }

    /// Local declarations: `var` lowers to an assignment statement, `let`,
    /// `func`, and `type` produce no runtime statement.
    fn resolve_stmt_decl(
        &mut self,
        loc: Loc,
        decl: &Rc<CstDecl>,
    ) -> CompileResult<Option<Stmt>> {
        match &decl.kind {
            CstDeclKind::Variable {
                identifier,
                ty,
                expr,
            } => {
                let declared = match ty {
                    Some(ty) => Some(self.resolve_type(ty)?),
                    None => None,
                };
                let (ty, init) = match expr {
                    Some(expr) => {
                        let mut resolved = self.resolve_expr(expr)?;
                        resolved = match declared {
                            Some(declared) => self.implicit_cast(resolved, declared)?,
                            None => resolved,
                        };
                        self.check_sized(decl.loc, resolved.ty)?;
                        let ty = resolved.ty;
                        (ty, Some(resolved))
                    }
                    None => {
                        let declared = declared.expect("uninit declarations carry a type");
                        self.check_sized(decl.loc, declared)?;
                        (declared, None)
                    }
                };

                let object = self.ctx.alloc_object(Object {
                    ty,
                    address: Address::Local {
                        name: identifier.name,
                        is_parameter: false,
                    },
                    value: None,
                    is_extern: false,
                });
                let symbol = self.ctx.alloc_symbol(SymbolData {
                    loc: decl.loc,
                    name: identifier.name,
                    uses: Default::default(),
                    kind: SymbolKind::Variable(object),
                });
                self.ctx
                    .scope_insert(self.current_scope, identifier.name, symbol, false)?;
                self.bump_local_stack(ty);

                match init {
                    Some(init) => Ok(Some(Stmt {
                        loc,
                        kind: StmtKind::Assign {
                            op: AssignOp::Assign,
                            lhs: Expr::new(decl.loc, ty, ExprKind::Symbol(symbol)),
                            rhs: init,
                        },
                    })),
                    None => Ok(None),
                }
            }
            CstDeclKind::Constant {
                identifier,
                ty,
                expr,
            } => {
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
                        self.check_sized(decl.loc, resolved.ty)?;
                        let value = eval::eval_rvalue(self.ctx, &resolved)?;
                        (resolved.ty, Some(value))
                    }
                    None => {
                        let declared = declared.expect("uninit declarations carry a type");
                        self.check_sized(decl.loc, declared)?;
                        (declared, None)
                    }
                };

                let label = self.ctx.unique_static_name("local");
                let object = self.ctx.alloc_object(Object {
                    ty,
                    address: Address::Static {
                        name: label,
                        offset: 0,
                    },
                    value,
                    is_extern: false,
                });
                let symbol = self.ctx.alloc_symbol(SymbolData {
                    loc: decl.loc,
                    name: identifier.name,
                    uses: Default::default(),
                    kind: SymbolKind::Constant(object),
                });
                self.ctx
                    .scope_insert(self.current_scope, identifier.name, symbol, false)?;
                self.ctx.static_symbols.push(symbol);
                Ok(None)
            }
            CstDeclKind::Function { .. } => {
                let _symbol: SymbolId = self.resolve_nested_function(decl)?;
                Ok(None)
            }
            CstDeclKind::Alias { identifier, ty } => {
                let aliased = self.resolve_type(ty)?;
                let symbol = self.ctx.alloc_symbol(SymbolData {
                    loc: decl.loc,
                    name: identifier.name,
                    uses: Default::default(),
                    kind: SymbolKind::Type(aliased),
                });
                self.ctx
                    .scope_insert(self.current_scope, identifier.name, symbol, false)?;
                Ok(None)
            }
            _ => unreachable!("parser only produces var/let/func/type statements"),
        }
    }
}
