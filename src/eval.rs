//! Compile-time evaluator.
//!
//! Reduces a typed expression to a [`Value`]. Forms whose outcome cannot be
//! determined without executing code are rejected: function calls, pointer
//! dereferences, and indexing or slicing of slice values, which are
//! (pointer, count) pairs with no readable backing memory at compile time.

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::ast::{Address, BinaryOp, Expr, ExprKind, UnaryOp};
use crate::context::Context;
use crate::error::{CompileResult, Diagnostic};
use crate::ints;
use crate::symbol::SymbolKind;
use crate::token::Loc;
use crate::types::{TypeId, TypeKind};
use crate::value::{value_eq, value_gt, value_lt, Value, ValueKind};

pub fn eval_rvalue(ctx: &mut Context, expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
        ExprKind::Symbol(symbol) => eval_rvalue_symbol(ctx, expr, *symbol),
        ExprKind::Value(value) => Ok(value.clone()),
        ExprKind::Bytes {
            array_symbol,
            count,
            ..
        } => {
            let array_address = symbol_address(ctx, *array_symbol).clone();
            let start = Value::new(
                ctx.builtin.pointer_to_byte,
                ValueKind::Pointer(array_address),
            );
            let count = Value::new(
                ctx.builtin.usize,
                ValueKind::Integer(BigInt::from(*count)),
            );
            Ok(Value::new(
                expr.ty,
                ValueKind::Slice {
                    start: Box::new(start),
                    count: Box::new(count),
                },
            ))
        }
        ExprKind::ArrayList { elements, ellipsis } => {
            let mut evaled = Vec::with_capacity(elements.len());
            for element in elements {
                evaled.push(eval_rvalue(ctx, element)?);
            }
            let ellipsis = match ellipsis {
                Some(ellipsis) => Some(Box::new(eval_rvalue(ctx, ellipsis)?)),
                None => None,
            };
            Ok(Value::new(
                expr.ty,
                ValueKind::Array {
                    elements: evaled,
                    ellipsis,
                },
            ))
        }
        ExprKind::SliceList {
            array_symbol,
            elements,
        } => {
            let base = match ctx.ty(expr.ty).kind {
                TypeKind::Slice { base } => base,
                _ => unreachable!("slice list with non-slice type"),
            };
            let pointer_ty = ctx.unique_pointer(base);
            let address = symbol_address(ctx, *array_symbol).clone();
            let start = Value::new(pointer_ty, ValueKind::Pointer(address));
            let count = Value::new(
                ctx.builtin.usize,
                ValueKind::Integer(BigInt::from(elements.len())),
            );
            Ok(Value::new(
                expr.ty,
                ValueKind::Slice {
                    start: Box::new(start),
                    count: Box::new(count),
                },
            ))
        }
        ExprKind::Slice { start, count } => {
            let start = eval_rvalue(ctx, start)?;
            let count = eval_rvalue(ctx, count)?;
            Ok(Value::new(
                expr.ty,
                ValueKind::Slice {
                    start: Box::new(start),
                    count: Box::new(count),
                },
            ))
        }
        ExprKind::Init { initializers } => eval_rvalue_init(ctx, expr, initializers),
        ExprKind::Cast { expr: from } => eval_rvalue_cast(ctx, expr, from),
        ExprKind::Call { .. } => Err(Diagnostic::error(
            expr.loc,
            "constant expression contains function call",
        )),
        ExprKind::AccessIndex { lhs, idx } => eval_rvalue_access_index(ctx, expr, lhs, idx),
        ExprKind::AccessSlice { lhs, begin, end } => {
            eval_rvalue_access_slice(ctx, expr, lhs, begin, end)
        }
        ExprKind::AccessMemberVariable { lhs, member } => {
            let lhs_value = eval_rvalue(ctx, lhs)?;
            member_value(ctx, expr.loc, &lhs_value, member.name)
        }
        ExprKind::Sizeof { rhs } => Ok(Value::new(
            ctx.builtin.usize,
            ValueKind::Integer(BigInt::from(ctx.ty(*rhs).size)),
        )),
        ExprKind::Alignof { rhs } => Ok(Value::new(
            ctx.builtin.usize,
            ValueKind::Integer(BigInt::from(ctx.ty(*rhs).align)),
        )),
        ExprKind::Unary { op, rhs } => eval_rvalue_unary(ctx, expr, *op, rhs),
        ExprKind::Binary { op, lhs, rhs } => eval_rvalue_binary(ctx, expr, *op, lhs, rhs),
    }
}

fn symbol_address<'a>(ctx: &'a Context, symbol: crate::symbol::SymbolId) -> &'a Address {
    match &ctx.symbol(symbol).kind {
        SymbolKind::Variable(object) | SymbolKind::Constant(object) => {
            &ctx.object(*object).address
        }
        SymbolKind::Function(function) => &ctx.function(*function).address,
        _ => unreachable!("symbol has no address"),
    }
}

fn eval_rvalue_symbol(
    ctx: &mut Context,
    expr: &Expr,
    symbol: crate::symbol::SymbolId,
) -> CompileResult<Value> {
    match &ctx.symbol(symbol).kind {
        SymbolKind::Constant(object) => {
            let object = *object;
            match &ctx.object(object).value {
                Some(value) => Ok(value.clone()),
                None => Err(Diagnostic::error(
                    expr.loc,
                    format!(
                        "constant `{}` of type `{}` is uninitialized",
                        ctx.symbol_name(symbol),
                        ctx.type_name(ctx.object(object).ty)
                    ),
                )),
            }
        }
        SymbolKind::Function(function) => {
            Ok(Value::new(expr.ty, ValueKind::Function(*function)))
        }
        _ => Err(Diagnostic::error(
            expr.loc,
            format!("identifier `{}` is not a constant", ctx.symbol_name(symbol)),
        )),
    }
}

fn eval_rvalue_init(
    ctx: &mut Context,
    expr: &Expr,
    initializers: &[crate::ast::MemberInitializer],
) -> CompileResult<Value> {
    let is_union = matches!(ctx.ty(expr.ty).kind, TypeKind::Union { .. });
    let member_count = ctx
        .ty(expr.ty)
        .members()
        .expect("initializer list has a composite type")
        .len();

    if is_union {
        let mut member = None;
        for initializer in initializers {
            let index = ctx
                .ty(expr.ty)
                .member_variable_index(initializer.member.name)
                .expect("resolved initializer names a member");
            if let Some(expr) = &initializer.expr {
                member = Some((index, Box::new(eval_rvalue(ctx, expr)?)));
            }
        }
        return Ok(Value::new(expr.ty, ValueKind::Union { member }));
    }

    let mut values: Vec<Option<Value>> = (0..member_count).map(|_| None).collect();
    for initializer in initializers {
        let index = ctx
            .ty(expr.ty)
            .member_variable_index(initializer.member.name)
            .expect("resolved initializer names a member");
        if let Some(expr) = &initializer.expr {
            values[index] = Some(eval_rvalue(ctx, expr)?);
        }
    }
    Ok(Value::new(expr.ty, ValueKind::Struct { members: values }))
}

fn integer_is_out_of_range(ctx: &Context, ty: TypeId, result: &BigInt) -> bool {
    match ctx.int_range(ty) {
        // Unsized integers have no defined min or max.
        None => false,
        Some((min, max)) => result < min || result > max,
    }
}

fn integer_bits(ctx: &Context, ty: TypeId) -> u64 {
    ctx.ty(ty).size * 8
}

fn usize_value_to_u64(loc: Loc, value: &Value) -> CompileResult<u64> {
    match value.as_integer().to_u64() {
        Some(value) => Ok(value),
        None => Err(Diagnostic::error(
            loc,
            format!("index out-of-range (received {})", value.as_integer()),
        )),
    }
}

fn eval_rvalue_cast(ctx: &mut Context, expr: &Expr, from_expr: &Expr) -> CompileResult<Value> {
    let mut from = eval_rvalue(ctx, from_expr)?;
    let to = expr.ty;

    let same_kind = std::mem::discriminant(&ctx.ty(from.ty).kind)
        == std::mem::discriminant(&ctx.ty(to).kind);
    if same_kind {
        // Covers conversions such as function-to-function where the kind
        // matches but the concrete type differs.
        from.ty = to;
        return Ok(from);
    }

    // The representation of a non-absolute address is chosen by the linker
    // and has no compile-time value.
    if matches!(ctx.ty(from.ty).kind, TypeKind::Pointer { .. }) {
        return Err(Diagnostic::error(
            expr.loc,
            format!(
                "constant expression contains cast from pointer type `{}` to non-pointer type `{}`",
                ctx.type_name(from.ty),
                ctx.type_name(to)
            ),
        ));
    }

    if matches!(ctx.ty(to).kind, TypeKind::Pointer { .. }) {
        return match &from.kind {
            ValueKind::Integer(integer) => {
                let absolute = integer.to_u64().expect("usize value fits in u64");
                Ok(Value::new(to, ValueKind::Pointer(Address::Absolute(absolute))))
            }
            ValueKind::Function(function) => {
                let address = ctx.function(*function).address.clone();
                Ok(Value::new(to, ValueKind::Pointer(address)))
            }
            _ => unreachable!("illegal cast to pointer"),
        };
    }

    let from_is_unsized_integer = matches!(ctx.ty(from.ty).kind, TypeKind::Integer);

    // Unsized integers only appear in constant expressions, so the value is
    // always known; check it against the target range.
    if from_is_unsized_integer {
        let integer = from.as_integer().clone();
        match &ctx.ty(to).kind {
            TypeKind::Bool => {
                return Ok(Value::new(to, ValueKind::Boolean(!integer.is_zero())));
            }
            TypeKind::Byte => {
                let (min, max) = (ctx.u8_min.clone(), ctx.u8_max.clone());
                check_conversion_range(ctx, expr.loc, &integer, from.ty, to, &min, &max)?;
                return Ok(Value::new(
                    to,
                    ValueKind::Byte(integer.to_u8().expect("checked range")),
                ));
            }
            _ if ctx.ty(to).is_sized_integer() || matches!(ctx.ty(to).kind, TypeKind::Enum { .. }) => {
                let (min, max) = ctx.int_range(to).expect("sized integer range");
                let (min, max) = (min.clone(), max.clone());
                check_conversion_range(ctx, expr.loc, &integer, from.ty, to, &min, &max)?;
                return Ok(Value::new(to, ValueKind::Integer(integer)));
            }
            _ => {}
        }
    }

    // Integer-to-float: unsized sources must be exactly representable.
    if ctx.ty(to).is_ieee754() && ctx.ty(from.ty).is_integer() {
        let integer = from.as_integer().clone();
        if from_is_unsized_integer {
            let (min, max) = if matches!(ctx.ty(to).kind, TypeKind::F64) {
                (ctx.f64_integer_min.clone(), ctx.f64_integer_max.clone())
            } else {
                (ctx.f32_integer_min.clone(), ctx.f32_integer_max.clone())
            };
            if integer < min || integer > max {
                return Err(Diagnostic::error(
                    expr.loc,
                    format!(
                        "constant expression contains cast from integer type `{}` to floating point type `{}` with unrepresentable value {}",
                        ctx.type_name(from.ty),
                        ctx.type_name(to),
                        integer
                    ),
                ));
            }
        }
        let as_f64 = integer.to_f64().expect("integer converts to f64");
        return Ok(match ctx.ty(to).kind {
            TypeKind::F64 => Value::new(to, ValueKind::F64(as_f64)),
            _ => Value::new(to, ValueKind::F32(as_f64 as f32)),
        });
    }

    // Float-to-integer: finite, truncated, range checked.
    if (ctx.ty(to).is_sized_integer() || matches!(ctx.ty(to).kind, TypeKind::Enum { .. }))
        && ctx.ty(from.ty).is_ieee754()
    {
        let as_f64 = match from.kind {
            ValueKind::F32(value) => value as f64,
            ValueKind::F64(value) => value,
            _ => unreachable!(),
        };
        if !as_f64.is_finite() {
            return Err(Diagnostic::error(
                expr.loc,
                format!(
                    "constant expression contains cast from floating point type `{}` to integer type `{}` with unrepresentable value {}",
                    ctx.type_name(from.ty),
                    ctx.type_name(to),
                    as_f64
                ),
            ));
        }
        let truncated = BigInt::from_f64(as_f64.trunc()).expect("finite float converts");
        if integer_is_out_of_range(ctx, to, &truncated) {
            return Err(Diagnostic::error(
                expr.loc,
                "operation produces out-of-range result",
            ));
        }
        return Ok(Value::new(to, ValueKind::Integer(truncated)));
    }

    // Sized float-to-float and unsized real narrowing.
    match (&from.kind, &ctx.ty(to).kind) {
        (ValueKind::F64(value), TypeKind::F32) => {
            return Ok(Value::new(to, ValueKind::F32(*value as f32)));
        }
        (ValueKind::F32(value), TypeKind::F64) => {
            return Ok(Value::new(to, ValueKind::F64(*value as f64)));
        }
        (ValueKind::Real(value), TypeKind::F32) => {
            return Ok(Value::new(to, ValueKind::F32(*value as f32)));
        }
        (ValueKind::Real(value), TypeKind::F64) => {
            return Ok(Value::new(to, ValueKind::F64(*value)));
        }
        _ => {}
    }

    // Remaining cases: sized types with a defined byte representation cast
    // bit-exactly through the little-endian two's-complement round-trip.
    let numeric = match &from.kind {
        ValueKind::Boolean(value) => BigInt::from(*value as u8),
        ValueKind::Byte(value) => BigInt::from(*value),
        ValueKind::Integer(value) => value.clone(),
        _ => unreachable!("cast source has no byte representation"),
    };

    match &ctx.ty(to).kind {
        TypeKind::Bool => Ok(Value::new(to, ValueKind::Boolean(!numeric.is_zero()))),
        TypeKind::Byte => {
            let wrapped = ints::wrap_to_width(&numeric, 8, false);
            Ok(Value::new(
                to,
                ValueKind::Byte(wrapped.to_u8().expect("wrapped to eight bits")),
            ))
        }
        kind if ctx.ty(to).is_sized_integer() || matches!(kind, TypeKind::Enum { .. }) => {
            let bits = integer_bits(ctx, to);
            let signed = ctx.ty(to).is_sinteger()
                || matches!(ctx.ty(to).kind, TypeKind::Enum { .. });
            Ok(Value::new(
                to,
                ValueKind::Integer(ints::wrap_to_width(&numeric, bits, signed)),
            ))
        }
        _ => unreachable!("illegal cast accepted by the resolver"),
    }
}

fn check_conversion_range(
    ctx: &Context,
    loc: Loc,
    integer: &BigInt,
    from: TypeId,
    to: TypeId,
    min: &BigInt,
    max: &BigInt,
) -> CompileResult<()> {
    if integer < min {
        return Err(Diagnostic::error(
            loc,
            format!(
                "out-of-range conversion from `{}` to `{}` ({} < {})",
                ctx.type_name(from),
                ctx.type_name(to),
                integer,
                min
            ),
        ));
    }
    if integer > max {
        return Err(Diagnostic::error(
            loc,
            format!(
                "out-of-range conversion from `{}` to `{}` ({} > {})",
                ctx.type_name(from),
                ctx.type_name(to),
                integer,
                max
            ),
        ));
    }
    Ok(())
}

fn eval_rvalue_access_index(
    ctx: &mut Context,
    expr: &Expr,
    lhs: &Expr,
    idx: &Expr,
) -> CompileResult<Value> {
    let lhs_value = eval_rvalue(ctx, lhs)?;
    let idx_value = eval_rvalue(ctx, idx)?;
    let idx_u64 = usize_value_to_u64(idx.loc, &idx_value)?;

    match &ctx.ty(lhs_value.ty).kind {
        TypeKind::Array { count, .. } => {
            let count = *count;
            if idx_u64 >= count {
                return Err(Diagnostic::error(
                    idx.loc,
                    format!(
                        "index out-of-bounds (array count is {}, received {})",
                        count, idx_u64
                    ),
                ));
            }
            match &lhs_value.kind {
                ValueKind::Array { elements, ellipsis } => {
                    let value = elements
                        .get(idx_u64 as usize)
                        .cloned()
                        .or_else(|| ellipsis.as_deref().cloned())
                        .expect("in-bounds index has an element or ellipsis");
                    Ok(value)
                }
                _ => unreachable!("array-typed value is not an array"),
            }
        }
        TypeKind::Slice { .. } => Err(Diagnostic::error(
            expr.loc,
            format!(
                "indexing with left-hand-type `{}` not supported in compile-time expressions",
                ctx.type_name(lhs_value.ty)
            ),
        )),
        _ => unreachable!("indexable expression is neither array nor slice"),
    }
}

fn eval_rvalue_access_slice(
    ctx: &mut Context,
    expr: &Expr,
    lhs: &Expr,
    begin: &Expr,
    end: &Expr,
) -> CompileResult<Value> {
    let lhs_value = eval_rvalue(ctx, lhs)?;
    let begin_value = eval_rvalue(ctx, begin)?;
    let end_value = eval_rvalue(ctx, end)?;
    let begin_u64 = usize_value_to_u64(begin.loc, &begin_value)?;
    let end_u64 = usize_value_to_u64(end.loc, &end_value)?;

    match &ctx.ty(lhs_value.ty).kind {
        TypeKind::Array { count, .. } => {
            let count = *count;
            if begin_u64 > count {
                return Err(Diagnostic::error(
                    begin.loc,
                    format!(
                        "index out-of-bounds (array count is {}, received {})",
                        count, begin_u64
                    ),
                ));
            }
            if end_u64 > count || begin_u64 > end_u64 {
                return Err(Diagnostic::error(
                    begin.loc,
                    format!(
                        "index out-of-bounds (array count is {}, received {})",
                        count, end_u64
                    ),
                ));
            }

            let base = match ctx.ty(expr.ty).kind {
                TypeKind::Slice { base } => base,
                _ => unreachable!("slice access with non-slice type"),
            };
            let mut pointer = eval_lvalue(ctx, lhs)?;
            let base_size = ctx.ty(base).size;
            pointer.ty = ctx.unique_pointer(base);
            match &mut pointer.kind {
                ValueKind::Pointer(Address::Static { offset, .. }) => {
                    *offset += begin_u64 * base_size;
                }
                _ => unreachable!("array lvalue has static address"),
            }

            let count_value = Value::new(
                ctx.builtin.usize,
                ValueKind::Integer(BigInt::from(end_u64 - begin_u64)),
            );
            Ok(Value::new(
                expr.ty,
                ValueKind::Slice {
                    start: Box::new(pointer),
                    count: Box::new(count_value),
                },
            ))
        }
        TypeKind::Slice { .. } => Err(Diagnostic::error(
            expr.loc,
            format!(
                "slicing with left-hand-type `{}` not supported in compile-time expressions",
                ctx.type_name(lhs_value.ty)
            ),
        )),
        _ => unreachable!("sliceable expression is neither array nor slice"),
    }
}

fn member_value(
    ctx: &Context,
    loc: Loc,
    value: &Value,
    name: crate::intern::Symbol,
) -> CompileResult<Value> {
    let index = ctx
        .ty(value.ty)
        .member_variable_index(name)
        .expect("resolved member access names a member");
    match &value.kind {
        ValueKind::Struct { members } => members[index].clone().ok_or_else(|| {
            Diagnostic::error(
                loc,
                format!("member `{}` is uninitialized", ctx.interner.resolve(name)),
            )
        }),
        ValueKind::Union { member } => match member {
            Some((held, value)) if *held == index => Ok((**value).clone()),
            _ => Err(Diagnostic::error(
                loc,
                format!("member `{}` is uninitialized", ctx.interner.resolve(name)),
            )),
        },
        _ => unreachable!("member access on non-composite value"),
    }
}

fn eval_rvalue_unary(
    ctx: &mut Context,
    expr: &Expr,
    op: UnaryOp,
    rhs: &Expr,
) -> CompileResult<Value> {
    match op {
        UnaryOp::Not => {
            let rhs = eval_rvalue(ctx, rhs)?;
            Ok(Value::new(expr.ty, ValueKind::Boolean(!rhs.as_boolean())))
        }
        UnaryOp::Pos => eval_rvalue(ctx, rhs),
        UnaryOp::Neg => {
            let rhs_value = eval_rvalue(ctx, rhs)?;
            match rhs_value.kind {
                ValueKind::F32(value) => Ok(Value::new(expr.ty, ValueKind::F32(-value))),
                ValueKind::F64(value) => Ok(Value::new(expr.ty, ValueKind::F64(-value))),
                ValueKind::Real(value) => Ok(Value::new(expr.ty, ValueKind::Real(-value))),
                ValueKind::Integer(value) => {
                    let negated = -&value;
                    if integer_is_out_of_range(ctx, expr.ty, &negated) {
                        return Err(Diagnostic::error(
                            expr.loc,
                            format!(
                                "operation produces out-of-range result (-({}) == {})",
                                value, negated
                            ),
                        ));
                    }
                    Ok(Value::new(expr.ty, ValueKind::Integer(negated)))
                }
                _ => unreachable!("negation of non-numeric value"),
            }
        }
        UnaryOp::NegWrapping => {
            let rhs_value = eval_rvalue(ctx, rhs)?;
            let bits = integer_bits(ctx, expr.ty);
            let signed = ctx.ty(expr.ty).is_sinteger();
            let negated = -rhs_value.as_integer();
            Ok(Value::new(
                expr.ty,
                ValueKind::Integer(ints::wrap_to_width(&negated, bits, signed)),
            ))
        }
        UnaryOp::Bitnot => {
            let rhs_value = eval_rvalue(ctx, rhs)?;
            match rhs_value.kind {
                ValueKind::Byte(value) => Ok(Value::new(expr.ty, ValueKind::Byte(!value))),
                ValueKind::Integer(value) => {
                    let bits = integer_bits(ctx, expr.ty);
                    let signed = ctx.ty(expr.ty).is_sinteger();
                    Ok(Value::new(
                        expr.ty,
                        ValueKind::Integer(ints::bit_not(&value, bits, signed)),
                    ))
                }
                _ => unreachable!("bitwise complement of non-integral value"),
            }
        }
        UnaryOp::Dereference => Err(Diagnostic::error(
            expr.loc,
            "dereference operator not supported in compile-time expressions",
        )),
        UnaryOp::AddressofLvalue => eval_lvalue(ctx, rhs),
        UnaryOp::Startof => {
            let rhs_value = eval_rvalue(ctx, rhs)?;
            match rhs_value.kind {
                ValueKind::Slice { start, .. } => {
                    let mut start = *start;
                    start.ty = expr.ty;
                    Ok(start)
                }
                _ => unreachable!("startof of non-slice value"),
            }
        }
        UnaryOp::Countof => {
            if let TypeKind::Array { count, .. } = ctx.ty(rhs.ty).kind {
                return Ok(Value::new(
                    ctx.builtin.usize,
                    ValueKind::Integer(BigInt::from(count)),
                ));
            }
            let rhs_value = eval_rvalue(ctx, rhs)?;
            match rhs_value.kind {
                ValueKind::Slice { count, .. } => Ok(*count),
                _ => unreachable!("countof of non-slice value"),
            }
        }
    }
}

fn eval_rvalue_binary(
    ctx: &mut Context,
    expr: &Expr,
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
) -> CompileResult<Value> {
    let lhs_value = eval_rvalue(ctx, lhs)?;
    let rhs_value = eval_rvalue(ctx, rhs)?;

    match op {
        BinaryOp::Or => Ok(Value::new(
            expr.ty,
            ValueKind::Boolean(lhs_value.as_boolean() || rhs_value.as_boolean()),
        )),
        BinaryOp::And => Ok(Value::new(
            expr.ty,
            ValueKind::Boolean(lhs_value.as_boolean() && rhs_value.as_boolean()),
        )),
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Le | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Gt => {
            if matches!(ctx.ty(lhs_value.ty).kind, TypeKind::Pointer { .. }) {
                return Err(Diagnostic::error(
                    expr.loc,
                    "pointer comparison not supported in compile-time expressions",
                ));
            }
            let result = match op {
                BinaryOp::Eq => value_eq(&lhs_value, &rhs_value),
                BinaryOp::Ne => !value_eq(&lhs_value, &rhs_value),
                BinaryOp::Le => {
                    value_lt(&lhs_value, &rhs_value) || value_eq(&lhs_value, &rhs_value)
                }
                BinaryOp::Lt => value_lt(&lhs_value, &rhs_value),
                BinaryOp::Ge => {
                    value_gt(&lhs_value, &rhs_value) || value_eq(&lhs_value, &rhs_value)
                }
                BinaryOp::Gt => value_gt(&lhs_value, &rhs_value),
                _ => unreachable!(),
            };
            Ok(Value::new(expr.ty, ValueKind::Boolean(result)))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
            eval_arithmetic(ctx, expr, op, &lhs_value, &rhs_value)
        }
        BinaryOp::AddWrapping | BinaryOp::SubWrapping | BinaryOp::MulWrapping => {
            let lhs_int = lhs_value.as_integer();
            let rhs_int = rhs_value.as_integer();
            let exact = match op {
                BinaryOp::AddWrapping => lhs_int + rhs_int,
                BinaryOp::SubWrapping => lhs_int - rhs_int,
                BinaryOp::MulWrapping => lhs_int * rhs_int,
                _ => unreachable!(),
            };
            let bits = integer_bits(ctx, expr.ty);
            let signed = ctx.ty(expr.ty).is_sinteger();
            Ok(Value::new(
                expr.ty,
                ValueKind::Integer(ints::wrap_to_width(&exact, bits, signed)),
            ))
        }
        BinaryOp::Div => eval_division(ctx, expr, &lhs_value, &rhs_value, false),
        BinaryOp::Rem => eval_division(ctx, expr, &lhs_value, &rhs_value, true),
        BinaryOp::Shl | BinaryOp::Shr => {
            let count = rhs_value
                .as_integer()
                .to_u64()
                .ok_or_else(|| {
                    Diagnostic::error(
                        rhs.loc,
                        format!(
                            "shift count out-of-range (received {})",
                            rhs_value.as_integer()
                        ),
                    )
                })?;
            let lhs_int = lhs_value.as_integer();
            let result = if ctx.ty(expr.ty).is_sized_integer() {
                let bits = integer_bits(ctx, expr.ty);
                let signed = ctx.ty(expr.ty).is_sinteger();
                match op {
                    BinaryOp::Shl => ints::shift_left(lhs_int, count, bits, signed),
                    _ => ints::shift_right(lhs_int, count),
                }
            } else {
                // Unsized shifts are exact arbitrary-precision operations.
                match op {
                    BinaryOp::Shl => {
                        if count > u32::MAX as u64 {
                            return Err(Diagnostic::error(
                                rhs.loc,
                                format!("shift count out-of-range (received {})", count),
                            ));
                        }
                        lhs_int << count
                    }
                    _ => ints::shift_right(lhs_int, count),
                }
            };
            Ok(Value::new(expr.ty, ValueKind::Integer(result)))
        }
        BinaryOp::Bitor | BinaryOp::Bitxor | BinaryOp::Bitand => {
            eval_bitwise(ctx, expr, op, &lhs_value, &rhs_value)
        }
    }
}

fn eval_arithmetic(
    ctx: &Context,
    expr: &Expr,
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
) -> CompileResult<Value> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        _ => unreachable!(),
    };

    match (&lhs.kind, &rhs.kind) {
        (ValueKind::F32(a), ValueKind::F32(b)) => {
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                _ => a * b,
            };
            Ok(Value::new(expr.ty, ValueKind::F32(result)))
        }
        (ValueKind::F64(a), ValueKind::F64(b)) => {
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                _ => a * b,
            };
            Ok(Value::new(expr.ty, ValueKind::F64(result)))
        }
        (ValueKind::Real(a), ValueKind::Real(b)) => {
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                _ => a * b,
            };
            Ok(Value::new(expr.ty, ValueKind::Real(result)))
        }
        (ValueKind::Integer(a), ValueKind::Integer(b)) => {
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                _ => a * b,
            };
            if integer_is_out_of_range(ctx, expr.ty, &result) {
                return Err(Diagnostic::error(
                    expr.loc,
                    format!(
                        "operation produces out-of-range result ({} {} {} == {})",
                        a, symbol, b, result
                    ),
                ));
            }
            Ok(Value::new(expr.ty, ValueKind::Integer(result)))
        }
        _ => unreachable!("arithmetic on mismatched value kinds"),
    }
}

fn eval_division(
    ctx: &Context,
    expr: &Expr,
    lhs: &Value,
    rhs: &Value,
    remainder: bool,
) -> CompileResult<Value> {
    match (&lhs.kind, &rhs.kind) {
        (ValueKind::F32(a), ValueKind::F32(b)) if !remainder => {
            Ok(Value::new(expr.ty, ValueKind::F32(a / b)))
        }
        (ValueKind::F64(a), ValueKind::F64(b)) if !remainder => {
            Ok(Value::new(expr.ty, ValueKind::F64(a / b)))
        }
        (ValueKind::Real(a), ValueKind::Real(b)) if !remainder => {
            Ok(Value::new(expr.ty, ValueKind::Real(a / b)))
        }
        (ValueKind::Integer(a), ValueKind::Integer(b)) => {
            if b.is_zero() {
                return Err(Diagnostic::error(
                    expr.loc,
                    format!(
                        "divide by zero ({} {} {})",
                        a,
                        if remainder { "%" } else { "/" },
                        b
                    ),
                ));
            }
            // Truncating division paired with remainder so that
            // (a/b)*b + a%b == a, matching C99.
            let result = if remainder { a % b } else { a / b };
            if integer_is_out_of_range(ctx, expr.ty, &result) {
                return Err(Diagnostic::error(
                    expr.loc,
                    format!(
                        "operation produces out-of-range result ({} {} {} == {})",
                        a,
                        if remainder { "%" } else { "/" },
                        b,
                        result
                    ),
                ));
            }
            Ok(Value::new(expr.ty, ValueKind::Integer(result)))
        }
        _ => unreachable!("division on mismatched value kinds"),
    }
}

fn eval_bitwise(
    ctx: &Context,
    expr: &Expr,
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
) -> CompileResult<Value> {
    match (&lhs.kind, &rhs.kind) {
        (ValueKind::Boolean(a), ValueKind::Boolean(b)) => {
            let result = match op {
                BinaryOp::Bitor => *a || *b,
                BinaryOp::Bitxor => a != b,
                _ => *a && *b,
            };
            Ok(Value::new(expr.ty, ValueKind::Boolean(result)))
        }
        (ValueKind::Byte(a), ValueKind::Byte(b)) => {
            let result = match op {
                BinaryOp::Bitor => a | b,
                BinaryOp::Bitxor => a ^ b,
                _ => a & b,
            };
            Ok(Value::new(expr.ty, ValueKind::Byte(result)))
        }
        (ValueKind::Integer(a), ValueKind::Integer(b)) => {
            let bits = integer_bits(ctx, expr.ty);
            let signed = ctx.ty(expr.ty).is_sinteger();
            let result = match op {
                BinaryOp::Bitor => ints::bit_or(a, b, bits, signed),
                BinaryOp::Bitxor => ints::bit_xor(a, b, bits, signed),
                _ => ints::bit_and(a, b, bits, signed),
            };
            Ok(Value::new(expr.ty, ValueKind::Integer(result)))
        }
        _ => unreachable!("bitwise operation on mismatched value kinds"),
    }
}

pub fn eval_lvalue(ctx: &mut Context, expr: &Expr) -> CompileResult<Value> {
    match &expr.kind {
        ExprKind::Symbol(symbol) => {
            let address = symbol_address(ctx, *symbol).clone();
            if !matches!(address, Address::Static { .. }) {
                return Err(Diagnostic::error(
                    expr.loc,
                    "addressof operator applied to non-static object in compile-time expression",
                ));
            }
            let pointer_ty = ctx.unique_pointer(expr.ty);
            Ok(Value::new(pointer_ty, ValueKind::Pointer(address)))
        }
        ExprKind::Bytes { slice_symbol, .. } => {
            let address = symbol_address(ctx, *slice_symbol).clone();
            let pointer_ty = ctx.unique_pointer(expr.ty);
            Ok(Value::new(pointer_ty, ValueKind::Pointer(address)))
        }
        ExprKind::AccessIndex { lhs, idx } => {
            if matches!(ctx.ty(lhs.ty).kind, TypeKind::Slice { .. }) {
                // Indexing an lvalue slice is equivalent to dereferencing an
                // arbitrary pointer.
                return Err(Diagnostic::error(
                    expr.loc,
                    "constant expression contains lvalue slice indexing operation",
                ));
            }

            let (count, element_ty) = match ctx.ty(lhs.ty).kind {
                TypeKind::Array { count, base } => (count, base),
                _ => unreachable!("indexable lvalue is an array"),
            };

            let pointer = eval_lvalue(ctx, lhs)?;
            let idx_value = eval_rvalue(ctx, idx)?;
            let idx_u64 = usize_value_to_u64(idx.loc, &idx_value)?;
            if idx_u64 >= count {
                return Err(Diagnostic::error(
                    idx.loc,
                    format!(
                        "index out-of-bounds (array count is {}, received {})",
                        count, idx_u64
                    ),
                ));
            }

            let element_size = ctx.ty(element_ty).size;
            let pointer_ty = ctx.unique_pointer(element_ty);
            match pointer.kind {
                ValueKind::Pointer(Address::Static { name, offset }) => Ok(Value::new(
                    pointer_ty,
                    ValueKind::Pointer(Address::Static {
                        name,
                        offset: offset + element_size * idx_u64,
                    }),
                )),
                _ => unreachable!("array lvalue has static address"),
            }
        }
        ExprKind::AccessMemberVariable { lhs, member } => {
            let pointer = eval_lvalue(ctx, lhs)?;
            let pointer_ty = ctx.unique_pointer(member.ty);
            match pointer.kind {
                ValueKind::Pointer(Address::Static { name, offset }) => Ok(Value::new(
                    pointer_ty,
                    ValueKind::Pointer(Address::Static {
                        name,
                        offset: offset + member.offset,
                    }),
                )),
                _ => unreachable!("aggregate lvalue has static address"),
            }
        }
        ExprKind::Unary {
            op: UnaryOp::Dereference,
            ..
        } => Err(Diagnostic::error(
            expr.loc,
            "dereference operator not supported in compile-time expressions",
        )),
        _ => unreachable!("expression is not an lvalue"),
    }
}
