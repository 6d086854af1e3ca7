use num_traits::ToPrimitive;

use crate::cst::*;
use crate::error::Diagnostic;
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::token::TokenKind;

use super::Parser;

fn parse_module_with(interner: &mut Interner, source: &str) -> CstModule {
    let path = interner.intern("test.sunder");
    let lexer = Lexer::new(path, source, interner);
    let mut parser = Parser::new(lexer).expect("lexing failed");
    parser.parse_module().expect("parsing failed")
}

fn parse_module(source: &str) -> CstModule {
    let mut interner = Interner::new();
    parse_module_with(&mut interner, source)
}

fn parse_error(source: &str) -> Diagnostic {
    let mut interner = Interner::new();
    let path = interner.intern("test.sunder");
    let lexer = Lexer::new(path, source, &mut interner);
    let mut parser = Parser::new(lexer).expect("lexing failed");
    parser.parse_module().expect_err("expected a parse error")
}

fn first_expr(module: &CstModule) -> &CstExpr {
    match &module.decls[0].kind {
        CstDeclKind::Constant { expr, .. } | CstDeclKind::Variable { expr, .. } => {
            expr.as_ref().expect("declaration has no initializer")
        }
        _ => panic!("first declaration is not a variable or constant"),
    }
}

#[test]
fn module_with_namespace_and_imports() {
    let module = parse_module("namespace foo::bar;\nimport \"std.sunder\";\nvar x: s32 = 1;\n");
    let namespace = module.namespace.as_ref().unwrap();
    assert_eq!(namespace.identifiers.len(), 2);
    assert_eq!(module.imports.len(), 1);
    assert_eq!(module.decls.len(), 1);
}

#[test]
fn variable_without_type_specifier() {
    let module = parse_module("var x = 123;");
    match &module.decls[0].kind {
        CstDeclKind::Variable { ty, expr, .. } => {
            assert!(ty.is_none());
            assert!(expr.is_some());
        }
        _ => panic!("expected variable declaration"),
    }
}

#[test]
fn uninit_variable_requires_type() {
    let diagnostic = parse_error("var x = uninit;");
    assert!(
        diagnostic.message.contains("requires a type specifier"),
        "{}",
        diagnostic.message
    );
}

#[test]
fn function_with_parameters_and_return_type() {
    let module = parse_module("func add(a: s32, b: s32) s32 { return a + b; }");
    match &module.decls[0].kind {
        CstDeclKind::Function {
            template_parameters,
            function_parameters,
            body,
            ..
        } => {
            assert!(template_parameters.is_empty());
            assert_eq!(function_parameters.len(), 2);
            assert_eq!(body.stmts.len(), 1);
        }
        _ => panic!("expected function declaration"),
    }
}

#[test]
fn templated_function_parameter_list() {
    let module = parse_module("func id[[T]](x: T) T { return x; }");
    match &module.decls[0].kind {
        CstDeclKind::Function {
            template_parameters,
            ..
        } => assert_eq!(template_parameters.len(), 1),
        _ => panic!("expected function declaration"),
    }
}

#[test]
fn empty_template_parameter_list_is_fatal() {
    let diagnostic = parse_error("func id[[]](x: s32) s32 { return x; }");
    assert!(
        diagnostic.message.contains("zero parameters"),
        "{}",
        diagnostic.message
    );
}

#[test]
fn struct_with_member_variables_constants_and_functions() {
    let module = parse_module(
        "struct Point {\n    var x: s32;\n    var y: s32;\n    let ORIGIN_NAME = \"origin\";\n    func new(x: s32, y: s32) Point { return (:Point){ .x = x, .y = y }; }\n}",
    );
    match &module.decls[0].kind {
        CstDeclKind::Struct { members, .. } => {
            assert_eq!(members.len(), 4);
            assert!(matches!(members[0].kind, CstMemberKind::Variable { .. }));
            assert!(matches!(members[2].kind, CstMemberKind::Constant(_)));
            assert!(matches!(members[3].kind, CstMemberKind::Function(_)));
        }
        _ => panic!("expected struct declaration"),
    }
}

#[test]
fn enum_with_values_and_member_function() {
    let module = parse_module(
        "enum Color : u8 {\n    RED = 0;\n    GREEN;\n    func is_red(self: Color) bool { return self == Color::RED; }\n}",
    );
    match &module.decls[0].kind {
        CstDeclKind::Enum {
            ty,
            values,
            member_functions,
            ..
        } => {
            assert!(ty.is_some());
            assert_eq!(values.len(), 2);
            assert!(values[0].expr.is_some());
            assert!(values[1].expr.is_none());
            assert_eq!(member_functions.len(), 1);
        }
        _ => panic!("expected enum declaration"),
    }
}

#[test]
fn extend_wraps_inner_declaration() {
    let module = parse_module("extend s32 func zero() s32 { return 0; }");
    match &module.decls[0].kind {
        CstDeclKind::Extend { decl, .. } => {
            assert!(matches!(decl.kind, CstDeclKind::Function { .. }))
        }
        _ => panic!("expected extend declaration"),
    }
}

#[test]
fn extern_declarations() {
    let module = parse_module("extern var errno: s32;\nextern func abort() void;\nextern type FILE;");
    assert!(matches!(
        module.decls[0].kind,
        CstDeclKind::ExternVariable { .. }
    ));
    assert!(matches!(
        module.decls[1].kind,
        CstDeclKind::ExternFunction { .. }
    ));
    assert!(matches!(module.decls[2].kind, CstDeclKind::ExternType { .. }));
}

#[test]
fn nested_generic_symbol_elements() {
    let mut interner = Interner::new();
    let module = parse_module_with(&mut interner, "let x: usize = foo::bar[[s32, *u8]]::baz;");
    let expr = first_expr(&module);
    let symbol = match &expr.kind {
        CstExprKind::Symbol(symbol) => symbol,
        _ => panic!("expected symbol expression"),
    };
    assert_eq!(symbol.elements.len(), 3);
    assert_eq!(symbol.elements[1].template_arguments.len(), 2);
    assert!(matches!(
        symbol.elements[1].template_arguments[0].kind,
        CstTypeKind::Symbol(_)
    ));
    assert!(matches!(
        symbol.elements[1].template_arguments[1].kind,
        CstTypeKind::Pointer { .. }
    ));
}

#[test]
fn root_symbols_start_from_module_root() {
    let module = parse_module("let x: s32 = ::foo::bar;");
    let expr = first_expr(&module);
    match &expr.kind {
        CstExprKind::Symbol(symbol) => assert_eq!(symbol.start, CstSymbolStart::Root),
        _ => panic!("expected symbol expression"),
    }
}

#[test]
fn binary_precedence_product_over_sum() {
    let module = parse_module("let x: s32 = 1 + 2 * 3;");
    let expr = first_expr(&module);
    match &expr.kind {
        CstExprKind::Binary { op, rhs, .. } => {
            assert_eq!(*op, TokenKind::Plus);
            assert!(matches!(
                rhs.kind,
                CstExprKind::Binary {
                    op: TokenKind::Star,
                    ..
                }
            ));
        }
        _ => panic!("expected binary expression"),
    }
}

#[test]
fn comparison_binds_looser_than_sum() {
    let module = parse_module("let x: bool = 1 + 2 == 3;");
    let expr = first_expr(&module);
    assert!(matches!(
        expr.kind,
        CstExprKind::Binary {
            op: TokenKind::Eq,
            ..
        }
    ));
}

#[test]
fn grouped_expression_resets_precedence() {
    let module = parse_module("let x: s32 = (1 + 2) * 3;");
    let expr = first_expr(&module);
    match &expr.kind {
        CstExprKind::Binary { op, lhs, .. } => {
            assert_eq!(*op, TokenKind::Star);
            assert!(matches!(lhs.kind, CstExprKind::Grouped { .. }));
        }
        _ => panic!("expected binary expression"),
    }
}

#[test]
fn cast_binds_at_prefix_precedence() {
    // `(:u8)x + y` casts only `x`.
    let module = parse_module("let v: u8 = (:u8)x + y;");
    let expr = first_expr(&module);
    match &expr.kind {
        CstExprKind::Binary { op, lhs, .. } => {
            assert_eq!(*op, TokenKind::Plus);
            assert!(matches!(lhs.kind, CstExprKind::Cast { .. }));
        }
        _ => panic!("expected binary expression"),
    }
}

#[test]
fn list_literal_with_ellipsis_element() {
    let module = parse_module("let x: [8]s32 = (:[8]s32)[1, 2, 0...];");
    let expr = first_expr(&module);
    match &expr.kind {
        CstExprKind::List {
            elements, ellipsis, ..
        } => {
            assert_eq!(elements.len(), 2);
            assert!(ellipsis.is_some());
        }
        _ => panic!("expected list expression"),
    }
}

#[test]
fn empty_init_and_slice_literals_disambiguate() {
    let module = parse_module("let a: Point = (:Point){};\nlet b: []byte = (:[]byte){p, 2};");
    match &first_expr(&module).kind {
        CstExprKind::Init { initializers, .. } => assert!(initializers.is_empty()),
        _ => panic!("expected init expression"),
    }
    match &module.decls[1].kind {
        CstDeclKind::Constant { expr, .. } => {
            assert!(matches!(
                expr.as_ref().unwrap().kind,
                CstExprKind::Slice { .. }
            ));
        }
        _ => panic!(),
    }
}

#[test]
fn init_expression_members() {
    let module = parse_module("let p: Point = (:Point){ .x = 1, .y = uninit };");
    match &first_expr(&module).kind {
        CstExprKind::Init { initializers, .. } => {
            assert_eq!(initializers.len(), 2);
            assert!(initializers[0].expr.is_some());
            assert!(initializers[1].expr.is_none());
        }
        _ => panic!("expected init expression"),
    }
}

#[test]
fn index_slice_member_and_dereference_postfix() {
    let module = parse_module("let x: s32 = a[0];\nlet y: []s32 = a[1:2];\nlet z: s32 = p.x;\nlet w: s32 = q.*;");
    let exprs: Vec<&CstExpr> = module
        .decls
        .iter()
        .map(|decl| match &decl.kind {
            CstDeclKind::Constant { expr, .. } => expr.as_ref().unwrap(),
            _ => panic!(),
        })
        .collect();
    assert!(matches!(exprs[0].kind, CstExprKind::AccessIndex { .. }));
    assert!(matches!(exprs[1].kind, CstExprKind::AccessSlice { .. }));
    assert!(matches!(exprs[2].kind, CstExprKind::AccessMember { .. }));
    assert!(matches!(exprs[3].kind, CstExprKind::AccessDereference { .. }));
}

#[test]
fn startof_and_countof_require_parentheses() {
    let module = parse_module("let x: usize = countof(s);");
    assert!(matches!(
        first_expr(&module).kind,
        CstExprKind::Unary {
            op: TokenKind::Countof,
            ..
        }
    ));

    let diagnostic = parse_error("let x: usize = countof s;");
    assert!(diagnostic.message.contains("expected `(`"), "{}", diagnostic.message);
}

#[test]
fn sizeof_takes_a_type() {
    let module = parse_module("let x: usize = sizeof([4]u16);");
    match &first_expr(&module).kind {
        CstExprKind::Sizeof(ty) => assert!(matches!(ty.kind, CstTypeKind::Array { .. })),
        _ => panic!("expected sizeof expression"),
    }
}

#[test]
fn integer_literal_value_and_suffix_survive() {
    let mut interner = Interner::new();
    let module = parse_module_with(&mut interner, "let x: u16 = 0x2Au16;");
    match &first_expr(&module).kind {
        CstExprKind::Integer { value, suffix } => {
            assert_eq!(value.to_u64(), Some(42));
            assert_eq!(interner.resolve(*suffix), "u16");
        }
        _ => panic!("expected integer expression"),
    }
}

#[test]
fn statement_dispatch() {
    let module = parse_module(
        "func f() void {\n    var x: s32 = 0;\n    defer { x = 1; }\n    defer g();\n    if true { } elif false { } else { }\n    when true { } else { }\n    for i in 0:10 { }\n    for i: u8 in 3 { }\n    for running { break; }\n    switch c { A { } A or B { } else { } }\n    x += 2;\n    g();\n    assert x == 2;\n    return;\n}",
    );
    let body = match &module.decls[0].kind {
        CstDeclKind::Function { body, .. } => body,
        _ => panic!(),
    };
    let kinds: Vec<&CstStmtKind> = body.stmts.iter().map(|stmt| &stmt.kind).collect();
    assert!(matches!(kinds[0], CstStmtKind::Decl(_)));
    assert!(matches!(kinds[1], CstStmtKind::DeferBlock(_)));
    assert!(matches!(kinds[2], CstStmtKind::DeferExpr(_)));
    assert!(matches!(kinds[3], CstStmtKind::If { conditionals } if conditionals.len() == 3));
    assert!(matches!(kinds[4], CstStmtKind::When { conditionals } if conditionals.len() == 2));
    assert!(
        matches!(kinds[5], CstStmtKind::ForRange { begin, .. } if begin.is_some())
    );
    assert!(
        matches!(kinds[6], CstStmtKind::ForRange { begin, ty, .. } if begin.is_none() && ty.is_some())
    );
    assert!(matches!(kinds[7], CstStmtKind::ForExpr { .. }));
    assert!(matches!(kinds[8], CstStmtKind::Switch { cases, .. } if cases.len() == 3));
    assert!(
        matches!(kinds[9], CstStmtKind::Assign { op, .. } if *op == TokenKind::PlusAssign)
    );
    assert!(matches!(kinds[10], CstStmtKind::Expr(_)));
    assert!(matches!(kinds[11], CstStmtKind::Assert { .. }));
    assert!(matches!(kinds[12], CstStmtKind::Return { expr: None }));
}

#[test]
fn type_specifier_forms() {
    let module = parse_module(
        "type A = *s32;\ntype B = [4]u8;\ntype C = []byte;\ntype D = func(s32, bool) void;\ntype E = struct { var x: s32; };\ntype F = union { var x: s32; var y: f64; };\ntype G = enum { X; Y; };\ntype H = typeof(1 + 2);",
    );
    let kinds: Vec<&CstTypeKind> = module
        .decls
        .iter()
        .map(|decl| match &decl.kind {
            CstDeclKind::Alias { ty, .. } => &ty.kind,
            _ => panic!(),
        })
        .collect();
    assert!(matches!(kinds[0], CstTypeKind::Pointer { .. }));
    assert!(matches!(kinds[1], CstTypeKind::Array { .. }));
    assert!(matches!(kinds[2], CstTypeKind::Slice { .. }));
    assert!(
        matches!(kinds[3], CstTypeKind::Function { parameter_types, .. } if parameter_types.len() == 2)
    );
    assert!(matches!(kinds[4], CstTypeKind::Struct { .. }));
    assert!(matches!(kinds[5], CstTypeKind::Union { .. }));
    assert!(matches!(kinds[6], CstTypeKind::Enum { .. }));
    assert!(matches!(kinds[7], CstTypeKind::Typeof { .. }));
}

#[test]
fn expected_token_mismatch_is_fatal() {
    let diagnostic = parse_error("var x s32 = 1;");
    assert!(diagnostic.message.contains("expected `="), "{}", diagnostic.message);
}

#[test]
fn expected_declaration_is_fatal() {
    let diagnostic = parse_error("return 1;");
    assert!(
        diagnostic.message.contains("expected declaration"),
        "{}",
        diagnostic.message
    );
}

#[test]
fn triple_colon_warns() {
    let mut interner = Interner::new();
    let path = interner.intern("test.sunder");
    let source = "let x: s32 = (:::foo::T){};";
    let lexer = Lexer::new(path, source, &mut interner);
    let mut parser = Parser::new(lexer).expect("lexing failed");
    let _ = parser.parse_module();
    assert_eq!(parser.warnings.len(), 1);
    assert!(parser.warnings[0].message.contains("`:::`"));
}

#[test]
fn reparsing_identical_source_yields_identical_structure() {
    let source = "struct Node { var next: *Node; var value: s32; }\nfunc main() void { }\n";
    let a = format!("{:?}", parse_module(source));
    let b = format!("{:?}", parse_module(source));
    assert_eq!(a, b);
}
