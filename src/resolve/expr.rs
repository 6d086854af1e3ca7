//! Expression resolution: CST expressions become typed AST expressions.

use num_bigint::BigInt;

use crate::ast::{Address, BinaryOp, Expr, ExprKind, MemberInitializer, Object, UnaryOp};
use crate::cst::{CstExpr, CstExprKind, CstMemberInitializer, CstType};
use crate::error::{CompileResult, Diagnostic};
use crate::eval;
use crate::intern::Symbol as Name;
use crate::symbol::{SymbolData, SymbolKind};
use crate::token::{Loc, TokenKind};
use crate::types::{TypeId, TypeKind};
use crate::value::{Value, ValueKind};

use super::Resolver;

/// True when the expression denotes a storage location.
pub fn expr_is_lvalue(ctx: &crate::context::Context, expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Symbol(symbol) => matches!(
            ctx.symbol(*symbol).kind,
            SymbolKind::Variable(_) | SymbolKind::Constant(_)
        ),
        ExprKind::Bytes { .. } => true,
        ExprKind::AccessIndex { lhs, .. } => {
            matches!(ctx.ty(lhs.ty).kind, TypeKind::Slice { .. }) || expr_is_lvalue(ctx, lhs)
        }
        ExprKind::AccessMemberVariable { lhs, .. } => expr_is_lvalue(ctx, lhs),
        ExprKind::Unary {
            op: UnaryOp::Dereference,
            ..
        } => true,
        _ => false,
    }
}

impl<'ctx> Resolver<'ctx> {
    pub(crate) fn resolve_expr(&mut self, cst: &CstExpr) -> CompileResult<Expr> {
        match &cst.kind {
            CstExprKind::Symbol(symbol) => {
                let resolved = self.resolve_symbol(symbol)?;
                self.expr_from_symbol(cst.loc, resolved)
            }
            CstExprKind::Boolean(value) => Ok(Expr::new(
                cst.loc,
                self.ctx.builtin.bool_,
                ExprKind::Value(Value::new(
                    self.ctx.builtin.bool_,
                    ValueKind::Boolean(*value),
                )),
            )),
            CstExprKind::Integer { value, suffix } => {
                self.resolve_expr_integer(cst.loc, value, *suffix)
            }
            CstExprKind::Ieee754 { value, suffix } => {
                self.resolve_expr_ieee754(cst.loc, *value, *suffix)
            }
            CstExprKind::Character(byte) => Ok(Expr::new(
                cst.loc,
                self.ctx.builtin.byte,
                ExprKind::Value(Value::new(self.ctx.builtin.byte, ValueKind::Byte(*byte))),
            )),
            CstExprKind::Bytes(bytes) => {
                let bytes = bytes.clone();
                self.resolve_bytes_literal(cst.loc, &bytes)
            }
            CstExprKind::List {
                ty,
                elements,
                ellipsis,
            } => self.resolve_expr_list(cst.loc, ty, elements, ellipsis.as_deref()),
            CstExprKind::Slice { ty, start, count } => {
                self.resolve_expr_slice(cst.loc, ty, start, count)
            }
            CstExprKind::Init { ty, initializers } => {
                self.resolve_expr_init(cst.loc, ty, initializers)
            }
            CstExprKind::Cast { ty, expr } => self.resolve_expr_cast(cst.loc, ty, expr),
            CstExprKind::Grouped { expr } => self.resolve_expr(expr),
            CstExprKind::Call { func, arguments } => {
                self.resolve_expr_call(cst.loc, func, arguments)
            }
            CstExprKind::AccessIndex { lhs, idx } => {
                self.resolve_expr_access_index(cst.loc, lhs, idx)
            }
            CstExprKind::AccessSlice { lhs, begin, end } => {
                self.resolve_expr_access_slice(cst.loc, lhs, begin, end)
            }
            CstExprKind::AccessMember { lhs, member } => {
                self.resolve_expr_access_member(cst.loc, lhs, member)
            }
            CstExprKind::AccessDereference { lhs } => self.resolve_expr_dereference(cst.loc, lhs),
            CstExprKind::Defined(symbol) => {
                // A failed speculative lookup must not leave a stale
                // instantiation chain behind.
                let chain_depth = self.ctx.template_chain.len();
                let defined = self.resolve_symbol(symbol).is_ok();
                self.ctx.template_chain.truncate(chain_depth);
                Ok(Expr::new(
                    cst.loc,
                    self.ctx.builtin.bool_,
                    ExprKind::Value(Value::new(
                        self.ctx.builtin.bool_,
                        ValueKind::Boolean(defined),
                    )),
                ))
            }
            CstExprKind::Sizeof(ty) => {
                let rhs = self.resolve_type(ty)?;
                self.check_has_size(cst.loc, rhs)?;
                Ok(Expr::new(
                    cst.loc,
                    self.ctx.builtin.usize,
                    ExprKind::Sizeof { rhs },
                ))
            }
            CstExprKind::Alignof(ty) => {
                let rhs = self.resolve_type(ty)?;
                self.check_has_size(cst.loc, rhs)?;
                Ok(Expr::new(
                    cst.loc,
                    self.ctx.builtin.usize,
                    ExprKind::Alignof { rhs },
                ))
            }
            CstExprKind::Fileof => {
                let name = self.module_name_bytes();
                self.resolve_bytes_literal(cst.loc, &name)
            }
            CstExprKind::Lineof => Ok(Expr::new(
                cst.loc,
                self.ctx.builtin.usize,
                ExprKind::Value(Value::new(
                    self.ctx.builtin.usize,
                    ValueKind::Integer(BigInt::from(cst.loc.line)),
                )),
            )),
            CstExprKind::Embed(path) => self.resolve_expr_embed(cst.loc, *path),
            CstExprKind::Unary { op, rhs } => self.resolve_expr_unary(cst.loc, *op, rhs),
            CstExprKind::Binary { op, lhs, rhs } => {
                self.resolve_expr_binary(cst.loc, *op, lhs, rhs)
            }
        }
    }

    fn module_name_bytes(&self) -> Vec<u8> {
        let module = self.ctx.module(self.module);
        self.ctx.interner.resolve(module.name).as_bytes().to_vec()
    }

    fn expr_from_symbol(&mut self, loc: Loc, symbol: crate::symbol::SymbolId) -> CompileResult<Expr> {
        let ty = match &self.ctx.symbol(symbol).kind {
            SymbolKind::Variable(object) | SymbolKind::Constant(object) => {
                self.ctx.object(*object).ty
            }
            SymbolKind::Function(function) => self.ctx.function(*function).ty,
            _ => {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "expected expression, found {} `{}`",
                        self.ctx.symbol(symbol).kind_str(),
                        self.ctx.symbol_name(symbol)
                    ),
                ));
            }
        };
        Ok(Expr::new(loc, ty, ExprKind::Symbol(symbol)))
    }

    fn resolve_expr_integer(
        &mut self,
        loc: Loc,
        value: &BigInt,
        suffix: Name,
    ) -> CompileResult<Expr> {
        let unsized_expr = Expr::new(
            loc,
            self.ctx.builtin.integer,
            ExprKind::Value(Value::new(
                self.ctx.builtin.integer,
                ValueKind::Integer(value.clone()),
            )),
        );
        if suffix == self.ctx.interned.empty {
            return Ok(unsized_expr);
        }

        let target = self.integer_suffix_type(suffix).ok_or_else(|| {
            Diagnostic::error(
                loc,
                format!(
                    "unknown integer literal suffix `{}`",
                    self.ctx.interner.resolve(suffix)
                ),
            )
        })?;
        self.fold_cast(loc, unsized_expr, target)
    }

    fn integer_suffix_type(&self, suffix: Name) -> Option<TypeId> {
        let interned = &self.ctx.interned;
        let builtin = &self.ctx.builtin;
        let ty = if suffix == interned.u8 {
            builtin.u8
        } else if suffix == interned.s8 {
            builtin.s8
        } else if suffix == interned.u16 {
            builtin.u16
        } else if suffix == interned.s16 {
            builtin.s16
        } else if suffix == interned.u32 {
            builtin.u32
        } else if suffix == interned.s32 {
            builtin.s32
        } else if suffix == interned.u64 {
            builtin.u64
        } else if suffix == interned.s64 {
            builtin.s64
        } else if suffix == interned.u {
            builtin.usize
        } else if suffix == interned.s {
            builtin.ssize
        } else if suffix == interned.y {
            builtin.byte
        } else {
            return None;
        };
        Some(ty)
    }

    fn resolve_expr_ieee754(&mut self, loc: Loc, value: f64, suffix: Name) -> CompileResult<Expr> {
        let interned = &self.ctx.interned;
        if suffix == interned.empty {
            return Ok(Expr::new(
                loc,
                self.ctx.builtin.real,
                ExprKind::Value(Value::new(self.ctx.builtin.real, ValueKind::Real(value))),
            ));
        }
        if suffix == interned.f32 {
            return Ok(Expr::new(
                loc,
                self.ctx.builtin.f32,
                ExprKind::Value(Value::new(
                    self.ctx.builtin.f32,
                    ValueKind::F32(value as f32),
                )),
            ));
        }
        if suffix == interned.f64 {
            return Ok(Expr::new(
                loc,
                self.ctx.builtin.f64,
                ExprKind::Value(Value::new(self.ctx.builtin.f64, ValueKind::F64(value))),
            ));
        }
        Err(Diagnostic::error(
            loc,
            format!(
                "unknown floating point literal suffix `{}`",
                self.ctx.interner.resolve(suffix)
            ),
        ))
    }

    /// Create the two static symbols backing a byte-string literal: the
    /// NUL-terminated array and the slice over its first `count` bytes.
    pub(crate) fn resolve_bytes_literal(&mut self, loc: Loc, bytes: &[u8]) -> CompileResult<Expr> {
        let count = bytes.len() as u64;
        let array_ty = self
            .ctx
            .unique_array(loc, count + 1, self.ctx.builtin.byte)?;

        let array_label = self.ctx.unique_static_name("bytes");
        let mut elements: Vec<Value> = bytes
            .iter()
            .map(|&byte| Value::new(self.ctx.builtin.byte, ValueKind::Byte(byte)))
            .collect();
        elements.push(Value::new(self.ctx.builtin.byte, ValueKind::Byte(0)));
        let array_value = Value::new(
            array_ty,
            ValueKind::Array {
                elements,
                ellipsis: None,
            },
        );
        let array_object = self.ctx.alloc_object(Object {
            ty: array_ty,
            address: Address::Static {
                name: array_label,
                offset: 0,
            },
            value: Some(array_value),
            is_extern: false,
        });
        let array_symbol = self.ctx.alloc_symbol(SymbolData {
            loc,
            name: array_label,
            uses: Default::default(),
            kind: SymbolKind::Constant(array_object),
        });
        self.ctx.static_symbols.push(array_symbol);

        let slice_ty = self.ctx.builtin.slice_of_byte;
        let slice_label = self.ctx.unique_static_name("bytes_slice");
        let start = Value::new(
            self.ctx.builtin.pointer_to_byte,
            ValueKind::Pointer(Address::Static {
                name: array_label,
                offset: 0,
            }),
        );
        let count_value = Value::new(
            self.ctx.builtin.usize,
            ValueKind::Integer(BigInt::from(count)),
        );
        let slice_value = Value::new(
            slice_ty,
            ValueKind::Slice {
                start: Box::new(start),
                count: Box::new(count_value),
            },
        );
        let slice_object = self.ctx.alloc_object(Object {
            ty: slice_ty,
            address: Address::Static {
                name: slice_label,
                offset: 0,
            },
            value: Some(slice_value),
            is_extern: false,
        });
        let slice_symbol = self.ctx.alloc_symbol(SymbolData {
            loc,
            name: slice_label,
            uses: Default::default(),
            kind: SymbolKind::Constant(slice_object),
        });
        self.ctx.static_symbols.push(slice_symbol);

        Ok(Expr::new(
            loc,
            slice_ty,
            ExprKind::Bytes {
                array_symbol,
                slice_symbol,
                count,
            },
        ))
    }

    fn resolve_expr_embed(&mut self, loc: Loc, path: Name) -> CompileResult<Expr> {
        let path_text = self.ctx.interner.resolve(path).to_string();
        let file = self.find_file(&path_text).ok_or_else(|| {
            Diagnostic::error(loc, format!("failed to locate file `{}`", path_text))
        })?;
        let bytes = std::fs::read(&file).map_err(|err| {
            Diagnostic::error(
                loc,
                format!("failed to load file `{}` ({})", path_text, err),
            )
        })?;
        self.resolve_bytes_literal(loc, &bytes)
    }

    fn resolve_expr_list(
        &mut self,
        loc: Loc,
        ty: &CstType,
        elements: &[CstExpr],
        ellipsis: Option<&CstExpr>,
    ) -> CompileResult<Expr> {
        let list_ty = self.resolve_type(ty)?;
        match self.ctx.ty(list_ty).kind {
            TypeKind::Array { count, base } => {
                let count = count as usize;
                if ellipsis.is_none() && elements.len() != count {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "array literal has {} elements, expected {}",
                            elements.len(),
                            count
                        ),
                    ));
                }
                if elements.len() > count {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "array literal has {} elements, expected {}",
                            elements.len(),
                            count
                        ),
                    ));
                }

                let mut resolved = Vec::with_capacity(elements.len());
                for element in elements {
                    let element = self.resolve_expr(element)?;
                    resolved.push(self.implicit_cast(element, base)?);
                }
                let ellipsis = match ellipsis {
                    Some(ellipsis) => {
                        let ellipsis = self.resolve_expr(ellipsis)?;
                        Some(Box::new(self.implicit_cast(ellipsis, base)?))
                    }
                    None => None,
                };
                Ok(Expr::new(
                    loc,
                    list_ty,
                    ExprKind::ArrayList {
                        elements: resolved,
                        ellipsis,
                    },
                ))
            }
            TypeKind::Slice { base } => {
                if ellipsis.is_some() {
                    return Err(Diagnostic::error(
                        loc,
                        "slice literal may not contain an ellipsis element",
                    ));
                }

                let mut resolved = Vec::with_capacity(elements.len());
                for element in elements {
                    let element = self.resolve_expr(element)?;
                    resolved.push(self.implicit_cast(element, base)?);
                }

                // Backing storage for the slice's elements.
                let array_ty = self.ctx.unique_array(loc, resolved.len() as u64, base)?;
                let label = self.ctx.unique_static_name("slice_elements");
                let value = self.try_eval_elements(array_ty, &resolved);
                let object = self.ctx.alloc_object(Object {
                    ty: array_ty,
                    address: Address::Static {
                        name: label,
                        offset: 0,
                    },
                    value,
                    is_extern: false,
                });
                let array_symbol = self.ctx.alloc_symbol(SymbolData {
                    loc,
                    name: label,
                    uses: Default::default(),
                    kind: SymbolKind::Constant(object),
                });
                self.ctx.static_symbols.push(array_symbol);

                Ok(Expr::new(
                    loc,
                    list_ty,
                    ExprKind::SliceList {
                        array_symbol,
                        elements: resolved,
                    },
                ))
            }
            _ => Err(Diagnostic::error(
                loc,
                format!(
                    "list literal requires an array or slice type, found `{}`",
                    self.ctx.type_name(list_ty)
                ),
            )),
        }
    }

    fn try_eval_elements(&mut self, array_ty: TypeId, elements: &[Expr]) -> Option<Value> {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(eval::eval_rvalue(self.ctx, element).ok()?);
        }
        Some(Value::new(
            array_ty,
            ValueKind::Array {
                elements: values,
                ellipsis: None,
            },
        ))
    }

    fn resolve_expr_slice(
        &mut self,
        loc: Loc,
        ty: &CstType,
        start: &CstExpr,
        count: &CstExpr,
    ) -> CompileResult<Expr> {
        let slice_ty = self.resolve_type(ty)?;
        let base = match self.ctx.ty(slice_ty).kind {
            TypeKind::Slice { base } => base,
            _ => {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "slice literal requires a slice type, found `{}`",
                        self.ctx.type_name(slice_ty)
                    ),
                ));
            }
        };

        let pointer_ty = self.ctx.unique_pointer(base);
        let start = self.resolve_expr(start)?;
        if start.ty != pointer_ty {
            return Err(Diagnostic::error(
                start.loc,
                format!(
                    "expected `{}`, found `{}`",
                    self.ctx.type_name(pointer_ty),
                    self.ctx.type_name(start.ty)
                ),
            ));
        }
        let count = self.resolve_expr(count)?;
        let count = self.implicit_cast(count, self.ctx.builtin.usize)?;

        Ok(Expr::new(
            loc,
            slice_ty,
            ExprKind::Slice {
                start: Box::new(start),
                count: Box::new(count),
            },
        ))
    }

    fn resolve_expr_init(
        &mut self,
        loc: Loc,
        ty: &CstType,
        initializers: &[CstMemberInitializer],
    ) -> CompileResult<Expr> {
        let init_ty = self.resolve_type(ty)?;
        let members = match self.ctx.ty(init_ty).members() {
            Some(members) => members.to_vec(),
            None => {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "initializer list requires a struct or union type, found `{}`",
                        self.ctx.type_name(init_ty)
                    ),
                ));
            }
        };
        let is_union = matches!(self.ctx.ty(init_ty).kind, TypeKind::Union { .. });

        let mut resolved: Vec<MemberInitializer> = Vec::with_capacity(initializers.len());
        for initializer in initializers {
            let member = members
                .iter()
                .find(|member| member.name == initializer.identifier.name)
                .copied()
                .ok_or_else(|| {
                    Diagnostic::error(
                        initializer.loc,
                        format!(
                            "type `{}` has no member `{}`",
                            self.ctx.type_name(init_ty),
                            self.ctx.interner.resolve(initializer.identifier.name)
                        ),
                    )
                })?;
            if resolved
                .iter()
                .any(|existing| existing.member.name == member.name)
            {
                return Err(Diagnostic::error(
                    initializer.loc,
                    format!(
                        "duplicate initializer for member `{}`",
                        self.ctx.interner.resolve(member.name)
                    ),
                ));
            }
            let expr = match &initializer.expr {
                Some(expr) => {
                    let expr = self.resolve_expr(expr)?;
                    Some(self.implicit_cast(expr, member.ty)?)
                }
                None => None,
            };
            resolved.push(MemberInitializer { member, expr });
        }

        if is_union {
            if resolved.len() > 1 {
                return Err(Diagnostic::error(
                    loc,
                    "union initializer list may hold at most one member",
                ));
            }
        } else {
            for member in &members {
                if !resolved
                    .iter()
                    .any(|initializer| initializer.member.name == member.name)
                {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "missing initializer for member `{}`",
                            self.ctx.interner.resolve(member.name)
                        ),
                    ));
                }
            }
        }

        Ok(Expr::new(
            loc,
            init_ty,
            ExprKind::Init {
                initializers: resolved,
            },
        ))
    }

    fn resolve_expr_cast(
        &mut self,
        loc: Loc,
        ty: &CstType,
        expr: &CstExpr,
    ) -> CompileResult<Expr> {
        let target = self.resolve_type(ty)?;
        let expr = self.resolve_expr(expr)?;

        if !self.cast_allowed(expr.ty, target) {
            return Err(Diagnostic::error(
                loc,
                format!(
                    "illegal type conversion from `{}` to `{}`",
                    self.ctx.type_name(expr.ty),
                    self.ctx.type_name(target)
                ),
            ));
        }

        // Casts of unsized numeric operands fold to a checked constant
        // immediately.
        if matches!(
            self.ctx.ty(expr.ty).kind,
            TypeKind::Integer | TypeKind::Real
        ) {
            return self.fold_cast(loc, expr, target);
        }

        Ok(Expr::new(
            loc,
            target,
            ExprKind::Cast {
                expr: Box::new(expr),
            },
        ))
    }

    /// The closed cast compatibility matrix.
    fn cast_allowed(&self, from: TypeId, to: TypeId) -> bool {
        let from_ty = self.ctx.ty(from);
        let to_ty = self.ctx.ty(to);

        if from == to {
            return true;
        }
        let same_kind =
            std::mem::discriminant(&from_ty.kind) == std::mem::discriminant(&to_ty.kind);
        if same_kind {
            // Same-kind casts that change the concrete type are limited to
            // kinds with interchangeable representations.
            return matches!(
                from_ty.kind,
                TypeKind::Function { .. } | TypeKind::Pointer { .. } | TypeKind::Enum { .. }
            );
        }

        let int_class =
            |ty: &crate::types::Type| ty.is_integer() || matches!(ty.kind, TypeKind::Enum { .. });
        let float_class = |ty: &crate::types::Type| {
            ty.is_ieee754() || matches!(ty.kind, TypeKind::Real)
        };

        if int_class(from_ty) && int_class(to_ty) {
            return true;
        }
        if int_class(from_ty)
            && matches!(to_ty.kind, TypeKind::Byte | TypeKind::Bool)
        {
            return true;
        }
        if matches!(from_ty.kind, TypeKind::Byte | TypeKind::Bool) && int_class(to_ty) {
            return true;
        }
        if int_class(from_ty) && to_ty.is_ieee754() {
            return true;
        }
        if float_class(from_ty) && int_class(to_ty) {
            return true;
        }
        if float_class(from_ty) && to_ty.is_ieee754() {
            return true;
        }
        if matches!(from_ty.kind, TypeKind::Pointer { .. })
            && matches!(to_ty.kind, TypeKind::Usize)
        {
            return true;
        }
        if matches!(from_ty.kind, TypeKind::Usize)
            && matches!(to_ty.kind, TypeKind::Pointer { .. })
        {
            return true;
        }
        if matches!(from_ty.kind, TypeKind::Function { .. })
            && matches!(to_ty.kind, TypeKind::Pointer { .. })
        {
            return true;
        }
        false
    }

    /// Evaluate a cast of a compile-time operand, producing a checked value
    /// expression. Unsized integer arithmetic is first re-typed at the target
    /// so range failures report the offending operation, not the conversion.
    fn fold_cast(&mut self, loc: Loc, expr: Expr, target: TypeId) -> CompileResult<Expr> {
        let expr = if matches!(self.ctx.ty(expr.ty).kind, TypeKind::Integer)
            && self.ctx.ty(target).is_sized_integer()
        {
            self.convert_unsized(expr, target)?
        } else {
            expr
        };

        if expr.ty == target {
            if matches!(expr.kind, ExprKind::Value(_)) {
                return Ok(expr);
            }
            let value = eval::eval_rvalue(self.ctx, &expr)?;
            return Ok(Expr::new(loc, target, ExprKind::Value(value)));
        }

        let cast = Expr::new(
            loc,
            target,
            ExprKind::Cast {
                expr: Box::new(expr),
            },
        );
        let value = eval::eval_rvalue(self.ctx, &cast)?;
        Ok(Expr::new(loc, target, ExprKind::Value(value)))
    }

    /// Push a sized integer type down through an unsized arithmetic
    /// expression, sizing each leaf. The operation itself is then evaluated
    /// at the target type.
    fn convert_unsized(&mut self, expr: Expr, target: TypeId) -> CompileResult<Expr> {
        match expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                let loc = expr.loc;
                let (lhs, rhs) = match op {
                    // Shift counts are already usize.
                    BinaryOp::Shl | BinaryOp::Shr => {
                        (self.convert_unsized(*lhs, target)?, *rhs)
                    }
                    _ => (
                        self.convert_unsized(*lhs, target)?,
                        self.convert_unsized(*rhs, target)?,
                    ),
                };
                Ok(Expr::new(
                    loc,
                    target,
                    ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                ))
            }
            ExprKind::Unary {
                op: op @ (UnaryOp::Pos | UnaryOp::Neg),
                rhs,
            } => {
                let loc = expr.loc;
                let rhs = self.convert_unsized(*rhs, target)?;
                Ok(Expr::new(
                    loc,
                    target,
                    ExprKind::Unary {
                        op,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            kind => {
                let loc = expr.loc;
                let cast = Expr::new(
                    loc,
                    target,
                    ExprKind::Cast {
                        expr: Box::new(Expr::new(loc, expr.ty, kind)),
                    },
                );
                let value = eval::eval_rvalue(self.ctx, &cast)?;
                Ok(Expr::new(loc, target, ExprKind::Value(value)))
            }
        }
    }

    /// Implicitly size an unsized operand to the target type, or verify the
    /// types already agree.
    pub(crate) fn implicit_cast(&mut self, expr: Expr, target: TypeId) -> CompileResult<Expr> {
        if expr.ty == target {
            return Ok(expr);
        }

        let from_kind = &self.ctx.ty(expr.ty).kind;
        let to = self.ctx.ty(target);
        let allowed = match from_kind {
            TypeKind::Integer => {
                to.is_sized_integer() || matches!(to.kind, TypeKind::Real)
            }
            TypeKind::Real => to.is_ieee754(),
            _ => false,
        };
        if !allowed {
            return Err(Diagnostic::error(
                expr.loc,
                format!(
                    "expected `{}`, found `{}`",
                    self.ctx.type_name(target),
                    self.ctx.type_name(expr.ty)
                ),
            ));
        }

        // Integer-to-real widening keeps the operand unsized.
        if matches!(self.ctx.ty(target).kind, TypeKind::Real) {
            let value = eval::eval_rvalue(self.ctx, &expr)?;
            let real = match value.kind {
                ValueKind::Integer(integer) => {
                    use num_traits::ToPrimitive;
                    integer.to_f64().expect("integer converts to f64")
                }
                _ => unreachable!("unsized integer value"),
            };
            return Ok(Expr::new(
                expr.loc,
                target,
                ExprKind::Value(Value::new(target, ValueKind::Real(real))),
            ));
        }

        let loc = expr.loc;
        self.fold_cast(loc, expr, target)
    }

    fn check_has_size(&self, loc: Loc, ty: TypeId) -> CompileResult<()> {
        if self.ctx.ty(ty).is_unsized() {
            return Err(Diagnostic::error(
                loc,
                format!("`{}` has no defined size", self.ctx.type_name(ty)),
            ));
        }
        Ok(())
    }

    fn resolve_expr_call(
        &mut self,
        loc: Loc,
        func: &CstExpr,
        arguments: &[CstExpr],
    ) -> CompileResult<Expr> {
        let function = self.resolve_expr(func)?;
        let (parameter_types, return_type) = match &self.ctx.ty(function.ty).kind {
            TypeKind::Function {
                parameter_types,
                return_type,
            } => (parameter_types.clone(), *return_type),
            _ => {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "attempted function call on non-function type `{}`",
                        self.ctx.type_name(function.ty)
                    ),
                ));
            }
        };

        if arguments.len() != parameter_types.len() {
            return Err(Diagnostic::error(
                loc,
                format!(
                    "function expects {} arguments, received {}",
                    parameter_types.len(),
                    arguments.len()
                ),
            ));
        }

        let mut resolved = Vec::with_capacity(arguments.len());
        for (argument, &parameter_ty) in arguments.iter().zip(&parameter_types) {
            let argument = self.resolve_expr(argument)?;
            resolved.push(self.implicit_cast(argument, parameter_ty)?);
        }

        Ok(Expr::new(
            loc,
            return_type,
            ExprKind::Call {
                function: Box::new(function),
                arguments: resolved,
            },
        ))
    }

    fn resolve_expr_access_index(
        &mut self,
        loc: Loc,
        lhs: &CstExpr,
        idx: &CstExpr,
    ) -> CompileResult<Expr> {
        let lhs = self.resolve_expr(lhs)?;
        let idx = self.resolve_expr(idx)?;
        let idx = self.implicit_cast(idx, self.ctx.builtin.usize)?;

        let base = match self.ctx.ty(lhs.ty).kind {
            TypeKind::Array { base, .. } | TypeKind::Slice { base } => base,
            _ => {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "illegal index operation with left-hand-type `{}`",
                        self.ctx.type_name(lhs.ty)
                    ),
                ));
            }
        };

        Ok(Expr::new(
            loc,
            base,
            ExprKind::AccessIndex {
                lhs: Box::new(lhs),
                idx: Box::new(idx),
            },
        ))
    }

    fn resolve_expr_access_slice(
        &mut self,
        loc: Loc,
        lhs: &CstExpr,
        begin: &CstExpr,
        end: &CstExpr,
    ) -> CompileResult<Expr> {
        let lhs = self.resolve_expr(lhs)?;
        let begin = self.resolve_expr(begin)?;
        let begin = self.implicit_cast(begin, self.ctx.builtin.usize)?;
        let end = self.resolve_expr(end)?;
        let end = self.implicit_cast(end, self.ctx.builtin.usize)?;

        let base = match self.ctx.ty(lhs.ty).kind {
            TypeKind::Array { base, .. } => {
                if !expr_is_lvalue(self.ctx, &lhs) {
                    return Err(Diagnostic::error(
                        loc,
                        "cannot take a slice of an array value",
                    ));
                }
                base
            }
            TypeKind::Slice { base } => base,
            _ => {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "illegal slice operation with left-hand-type `{}`",
                        self.ctx.type_name(lhs.ty)
                    ),
                ));
            }
        };

        let slice_ty = self.ctx.unique_slice(base);
        Ok(Expr::new(
            loc,
            slice_ty,
            ExprKind::AccessSlice {
                lhs: Box::new(lhs),
                begin: Box::new(begin),
                end: Box::new(end),
            },
        ))
    }

    fn resolve_expr_access_member(
        &mut self,
        loc: Loc,
        lhs: &CstExpr,
        member: &crate::cst::CstSymbolElement,
    ) -> CompileResult<Expr> {
        if !member.template_arguments.is_empty() {
            return Err(Diagnostic::error(
                member.loc,
                "member access does not accept template arguments",
            ));
        }

        let lhs = self.resolve_expr(lhs)?;
        let member_variable = self
            .ctx
            .ty(lhs.ty)
            .member_variable(member.identifier.name)
            .copied();
        match member_variable {
            Some(member_variable) => Ok(Expr::new(
                loc,
                member_variable.ty,
                ExprKind::AccessMemberVariable {
                    lhs: Box::new(lhs),
                    member: member_variable,
                },
            )),
            None => Err(Diagnostic::error(
                loc,
                format!(
                    "type `{}` has no member `{}`",
                    self.ctx.type_name(lhs.ty),
                    self.ctx.interner.resolve(member.identifier.name)
                ),
            )),
        }
    }

    fn resolve_expr_dereference(&mut self, loc: Loc, lhs: &CstExpr) -> CompileResult<Expr> {
        let lhs = self.resolve_expr(lhs)?;
        let base = match self.ctx.ty(lhs.ty).kind {
            TypeKind::Pointer { base } => base,
            _ => {
                return Err(Diagnostic::error(
                    loc,
                    format!(
                        "cannot dereference expression of non-pointer type `{}`",
                        self.ctx.type_name(lhs.ty)
                    ),
                ));
            }
        };
        Ok(Expr::new(
            loc,
            base,
            ExprKind::Unary {
                op: UnaryOp::Dereference,
                rhs: Box::new(lhs),
            },
        ))
    }

    fn resolve_expr_unary(
        &mut self,
        loc: Loc,
        op: TokenKind,
        rhs: &CstExpr,
    ) -> CompileResult<Expr> {
        let rhs = self.resolve_expr(rhs)?;
        let rhs_ty = rhs.ty;

        let illegal = |this: &Self, op: &str| {
            Diagnostic::error(
                loc,
                format!(
                    "cannot apply unary `{}` to type `{}`",
                    op,
                    this.ctx.type_name(rhs_ty)
                ),
            )
        };

        match op {
            TokenKind::Not => {
                if !matches!(self.ctx.ty(rhs_ty).kind, TypeKind::Bool) {
                    return Err(illegal(self, "not"));
                }
                Ok(Expr::new(
                    loc,
                    self.ctx.builtin.bool_,
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Plus => {
                if !self.ctx.ty(rhs_ty).is_integer() {
                    return Err(illegal(self, "+"));
                }
                Ok(Expr::new(
                    loc,
                    rhs_ty,
                    ExprKind::Unary {
                        op: UnaryOp::Pos,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Dash => {
                let ty = self.ctx.ty(rhs_ty);
                let ok = ty.is_sinteger()
                    || matches!(ty.kind, TypeKind::Integer)
                    || ty.is_ieee754()
                    || matches!(ty.kind, TypeKind::Real);
                if !ok {
                    return Err(illegal(self, "-"));
                }
                Ok(Expr::new(
                    loc,
                    rhs_ty,
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::DashPercent => {
                if !self.ctx.ty(rhs_ty).is_sinteger() {
                    return Err(illegal(self, "-%"));
                }
                Ok(Expr::new(
                    loc,
                    rhs_ty,
                    ExprKind::Unary {
                        op: UnaryOp::NegWrapping,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Tilde => {
                let ty = self.ctx.ty(rhs_ty);
                if !matches!(ty.kind, TypeKind::Byte) && !ty.is_sized_integer() {
                    return Err(illegal(self, "~"));
                }
                Ok(Expr::new(
                    loc,
                    rhs_ty,
                    ExprKind::Unary {
                        op: UnaryOp::Bitnot,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Star => {
                let base = match self.ctx.ty(rhs_ty).kind {
                    TypeKind::Pointer { base } => base,
                    _ => {
                        return Err(Diagnostic::error(
                            loc,
                            format!(
                                "cannot dereference expression of non-pointer type `{}`",
                                self.ctx.type_name(rhs_ty)
                            ),
                        ));
                    }
                };
                Ok(Expr::new(
                    loc,
                    base,
                    ExprKind::Unary {
                        op: UnaryOp::Dereference,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Ampersand => {
                if !expr_is_lvalue(self.ctx, &rhs) {
                    return Err(Diagnostic::error(
                        loc,
                        "cannot take the address of a non-lvalue expression",
                    ));
                }
                let pointer_ty = self.ctx.unique_pointer(rhs_ty);
                Ok(Expr::new(
                    loc,
                    pointer_ty,
                    ExprKind::Unary {
                        op: UnaryOp::AddressofLvalue,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Startof => {
                let base = match self.ctx.ty(rhs_ty).kind {
                    TypeKind::Slice { base } => base,
                    _ => return Err(illegal(self, "startof")),
                };
                let pointer_ty = self.ctx.unique_pointer(base);
                Ok(Expr::new(
                    loc,
                    pointer_ty,
                    ExprKind::Unary {
                        op: UnaryOp::Startof,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Countof => {
                if !matches!(
                    self.ctx.ty(rhs_ty).kind,
                    TypeKind::Array { .. } | TypeKind::Slice { .. }
                ) {
                    return Err(illegal(self, "countof"));
                }
                Ok(Expr::new(
                    loc,
                    self.ctx.builtin.usize,
                    ExprKind::Unary {
                        op: UnaryOp::Countof,
                        rhs: Box::new(rhs),
                    },
                ))
            }
            _ => unreachable!("parser produced unknown unary operator"),
        }
    }

    fn resolve_expr_binary(
        &mut self,
        loc: Loc,
        op: TokenKind,
        lhs: &CstExpr,
        rhs: &CstExpr,
    ) -> CompileResult<Expr> {
        let lhs = self.resolve_expr(lhs)?;
        let rhs = self.resolve_expr(rhs)?;

        match op {
            TokenKind::Or | TokenKind::And => {
                let binary = if op == TokenKind::Or {
                    BinaryOp::Or
                } else {
                    BinaryOp::And
                };
                for operand in [&lhs, &rhs] {
                    if !matches!(self.ctx.ty(operand.ty).kind, TypeKind::Bool) {
                        return Err(Diagnostic::error(
                            operand.loc,
                            format!(
                                "expected `bool`, found `{}`",
                                self.ctx.type_name(operand.ty)
                            ),
                        ));
                    }
                }
                Ok(Expr::new(
                    loc,
                    self.ctx.builtin.bool_,
                    ExprKind::Binary {
                        op: binary,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Shl | TokenKind::Shr => {
                let binary = if op == TokenKind::Shl {
                    BinaryOp::Shl
                } else {
                    BinaryOp::Shr
                };
                if !self.ctx.ty(lhs.ty).is_integer() {
                    return Err(Diagnostic::error(
                        lhs.loc,
                        format!(
                            "cannot apply `{}` to type `{}`",
                            op.to_str(),
                            self.ctx.type_name(lhs.ty)
                        ),
                    ));
                }
                let rhs = self.implicit_cast(rhs, self.ctx.builtin.usize)?;
                let ty = lhs.ty;
                Ok(Expr::new(
                    loc,
                    ty,
                    ExprKind::Binary {
                        op: binary,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Eq
            | TokenKind::Ne
            | TokenKind::Le
            | TokenKind::Lt
            | TokenKind::Ge
            | TokenKind::Gt => {
                let (lhs, rhs) = self.unify_operands(lhs, rhs)?;
                let ordered = !matches!(op, TokenKind::Eq | TokenKind::Ne);
                let comparable = if ordered {
                    self.ctx.ty(lhs.ty).can_compare_order()
                } else {
                    self.ctx.ty(lhs.ty).can_compare_equality()
                };
                if !comparable {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "cannot compare expressions of type `{}`",
                            self.ctx.type_name(lhs.ty)
                        ),
                    ));
                }
                let binary = match op {
                    TokenKind::Eq => BinaryOp::Eq,
                    TokenKind::Ne => BinaryOp::Ne,
                    TokenKind::Le => BinaryOp::Le,
                    TokenKind::Lt => BinaryOp::Lt,
                    TokenKind::Ge => BinaryOp::Ge,
                    _ => BinaryOp::Gt,
                };
                Ok(Expr::new(
                    loc,
                    self.ctx.builtin.bool_,
                    ExprKind::Binary {
                        op: binary,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Plus | TokenKind::Dash | TokenKind::Star | TokenKind::Slash => {
                let (lhs, rhs) = self.unify_operands(lhs, rhs)?;
                let ty = self.ctx.ty(lhs.ty);
                let numeric =
                    ty.is_integer() || ty.is_ieee754() || matches!(ty.kind, TypeKind::Real);
                if !numeric {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "cannot apply `{}` to type `{}`",
                            op.to_str(),
                            self.ctx.type_name(lhs.ty)
                        ),
                    ));
                }
                let binary = match op {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Dash => BinaryOp::Sub,
                    TokenKind::Star => BinaryOp::Mul,
                    _ => BinaryOp::Div,
                };
                let ty = lhs.ty;
                Ok(Expr::new(
                    loc,
                    ty,
                    ExprKind::Binary {
                        op: binary,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Percent => {
                let (lhs, rhs) = self.unify_operands(lhs, rhs)?;
                if !self.ctx.ty(lhs.ty).is_integer() {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "cannot apply `%` to type `{}`",
                            self.ctx.type_name(lhs.ty)
                        ),
                    ));
                }
                let ty = lhs.ty;
                Ok(Expr::new(
                    loc,
                    ty,
                    ExprKind::Binary {
                        op: BinaryOp::Rem,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::PlusPercent | TokenKind::DashPercent | TokenKind::StarPercent => {
                let (lhs, rhs) = self.unify_operands(lhs, rhs)?;
                if !self.ctx.ty(lhs.ty).is_sized_integer() {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "wrapping arithmetic requires a sized integer type, found `{}`",
                            self.ctx.type_name(lhs.ty)
                        ),
                    ));
                }
                let binary = match op {
                    TokenKind::PlusPercent => BinaryOp::AddWrapping,
                    TokenKind::DashPercent => BinaryOp::SubWrapping,
                    _ => BinaryOp::MulWrapping,
                };
                let ty = lhs.ty;
                Ok(Expr::new(
                    loc,
                    ty,
                    ExprKind::Binary {
                        op: binary,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                ))
            }
            TokenKind::Pipe | TokenKind::Caret | TokenKind::Ampersand => {
                let (lhs, rhs) = self.unify_operands(lhs, rhs)?;
                let ty = self.ctx.ty(lhs.ty);
                let ok = matches!(ty.kind, TypeKind::Bool | TypeKind::Byte)
                    || ty.is_sized_integer();
                if !ok {
                    return Err(Diagnostic::error(
                        loc,
                        format!(
                            "cannot apply `{}` to type `{}`",
                            op.to_str(),
                            self.ctx.type_name(lhs.ty)
                        ),
                    ));
                }
                let binary = match op {
                    TokenKind::Pipe => BinaryOp::Bitor,
                    TokenKind::Caret => BinaryOp::Bitxor,
                    _ => BinaryOp::Bitand,
                };
                let ty = lhs.ty;
                Ok(Expr::new(
                    loc,
                    ty,
                    ExprKind::Binary {
                        op: binary,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                ))
            }
            _ => unreachable!("parser produced unknown binary operator"),
        }
    }

    /// Bring the two operands of a binary operation to a common type by
    /// implicitly sizing an unsized side to the sized side's type.
    fn unify_operands(&mut self, lhs: Expr, rhs: Expr) -> CompileResult<(Expr, Expr)> {
        if lhs.ty == rhs.ty {
            return Ok((lhs, rhs));
        }

        let lhs_unsized = matches!(
            self.ctx.ty(lhs.ty).kind,
            TypeKind::Integer | TypeKind::Real
        );
        let rhs_unsized = matches!(
            self.ctx.ty(rhs.ty).kind,
            TypeKind::Integer | TypeKind::Real
        );

        if lhs_unsized && !rhs_unsized {
            let lhs = self.implicit_cast(lhs, rhs.ty)?;
            return Ok((lhs, rhs));
        }
        if rhs_unsized && !lhs_unsized {
            let ty = lhs.ty;
            let rhs = self.implicit_cast(rhs, ty)?;
            return Ok((lhs, rhs));
        }
        if lhs_unsized && rhs_unsized {
            // Mixing the unsized kinds picks `real`.
            let real = self.ctx.builtin.real;
            let lhs = self.implicit_cast(lhs, real)?;
            let rhs = self.implicit_cast(rhs, real)?;
            return Ok((lhs, rhs));
        }

        Err(Diagnostic::error(
            rhs.loc,
            format!(
                "mismatched types `{}` and `{}`",
                self.ctx.type_name(lhs.ty),
                self.ctx.type_name(rhs.ty)
            ),
        ))
    }
}
