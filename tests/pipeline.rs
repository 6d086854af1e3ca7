//! Full-pipeline scenarios: source text through lex, parse, order, resolve,
//! and compile-time evaluation.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use sunder::context::{Arch, Context, ModuleId};
use sunder::error::Diagnostic;
use sunder::resolve::load_module_from_source;
use sunder::symbol::SymbolKind;
use sunder::value::ValueKind;

fn compile(source: &str) -> (Context, ModuleId) {
    let mut ctx = Context::new(Arch::Amd64);
    let module = load_module_from_source(&mut ctx, "main.sunder", source)
        .unwrap_or_else(|diagnostic| panic!("{}", ctx.render_diagnostic(&diagnostic)));
    (ctx, module)
}

fn compile_err(source: &str) -> Diagnostic {
    let mut ctx = Context::new(Arch::Amd64);
    load_module_from_source(&mut ctx, "main.sunder", source)
        .expect_err("expected a compilation error")
}

fn constant(ctx: &Context, module: ModuleId, name: &str) -> sunder::value::Value {
    let name = ctx.interner.lookup(name).expect("name is interned");
    let symbol = ctx
        .scope_lookup(ctx.module(module).symbols, name)
        .expect("symbol exists");
    match &ctx.symbol(symbol).kind {
        SymbolKind::Constant(object) | SymbolKind::Variable(object) => ctx
            .object(*object)
            .value
            .clone()
            .expect("object has a value"),
        _ => panic!("symbol is not an object"),
    }
}

#[test]
fn hello_world_program_compiles() {
    let (ctx, module) = compile(
        "let GREETING: []byte = \"Hello, world!\\n\";\n\
         func main() void {\n\
             var length: usize = countof(GREETING);\n\
             assert length == 14u;\n\
         }\n",
    );
    ctx.validate_main_is_defined_correctly(module).unwrap();
}

#[test]
fn linked_list_module_compiles() {
    let (ctx, module) = compile(
        "struct Node {\n\
             var next: *Node;\n\
             var value: s32;\n\
         }\n\
         \n\
         var head: Node = uninit;\n\
         \n\
         func push(node: *Node, value: s32) void {\n\
             node.*.value = value;\n\
         }\n\
         \n\
         func main() void {\n\
             push(&head, 42);\n\
         }\n",
    );
    ctx.validate_main_is_defined_correctly(module).unwrap();
}

#[test]
fn cyclic_dependency_exits_with_chain() {
    let diagnostic = compile_err("let A: s32 = B;\nlet B: s32 = A;\n");
    assert!(diagnostic
        .message
        .contains("circular dependency created by declaration of `A`"));
    assert_eq!(diagnostic.notes.len(), 2);
}

#[test]
fn generic_container_instantiates_on_demand() {
    let (ctx, module) = compile(
        "struct Box[[T]] {\n\
             var value: T;\n\
             func wrap(value: T) Box[[T]] {\n\
                 return (:Box[[T]]){ .value = value };\n\
             }\n\
         }\n\
         \n\
         func main() void {\n\
             var boxed: Box[[u64]] = Box[[u64]]::wrap(7u64);\n\
             boxed.value = 8u64;\n\
         }\n",
    );
    ctx.validate_main_is_defined_correctly(module).unwrap();

    // The instance type is interned once under its mangled name.
    let mangled = ctx.interner.lookup("Box[[u64]]").expect("instance exists");
    assert!(ctx.types.iter().any(|ty| ty.name == mangled));
}

#[test]
fn compile_time_evaluation_chain() {
    let (ctx, module) = compile(
        "let WORD: usize = sizeof(usize);\n\
         let BITS: usize = WORD * 8u;\n\
         let MASK: u64 = (:u64)((1 << 63u) - 1);\n\
         let NEGATED: s16 = ~0x0F0Fs16;\n",
    );
    assert_eq!(
        constant(&ctx, module, "WORD").kind,
        ValueKind::Integer(BigInt::from(8))
    );
    assert_eq!(
        constant(&ctx, module, "BITS").kind,
        ValueKind::Integer(BigInt::from(64))
    );
    assert_eq!(
        constant(&ctx, module, "MASK").kind,
        ValueKind::Integer(BigInt::from(i64::MAX))
    );
    assert_eq!(
        constant(&ctx, module, "NEGATED").kind,
        ValueKind::Integer(BigInt::from(!0x0f0f_i16))
    );
}

#[test]
fn enum_driven_state_machine_compiles() {
    let (ctx, module) = compile(
        "enum State : u8 {\n\
             IDLE;\n\
             RUNNING;\n\
             DONE = 255;\n\
         }\n\
         \n\
         func step(state: State) State {\n\
             switch state {\n\
                 State::IDLE { return State::RUNNING; }\n\
                 State::RUNNING { return State::DONE; }\n\
                 else { return State::DONE; }\n\
             }\n\
             return State::DONE;\n\
         }\n\
         \n\
         func main() void {\n\
             var state: State = State::IDLE;\n\
             state = step(state);\n\
         }\n",
    );
    ctx.validate_main_is_defined_correctly(module).unwrap();
    assert_eq!(
        constant_enum(&ctx, module, "State", "DONE"),
        BigInt::from(255)
    );
}

fn constant_enum(ctx: &Context, module: ModuleId, enum_name: &str, value: &str) -> BigInt {
    let enum_name = ctx.interner.lookup(enum_name).unwrap();
    let symbol = ctx
        .scope_lookup(ctx.module(module).symbols, enum_name)
        .unwrap();
    let ty = match ctx.symbol(symbol).kind {
        SymbolKind::Type(ty) => ty,
        _ => panic!(),
    };
    let value = ctx.interner.lookup(value).unwrap();
    let value_symbol = ctx
        .scope_lookup_local(ctx.ty(ty).symbols, value)
        .expect("enum value exists");
    match &ctx.symbol(value_symbol).kind {
        SymbolKind::Constant(object) => match &ctx.object(*object).value {
            Some(value) => match &value.kind {
                ValueKind::Integer(integer) => integer.clone(),
                _ => panic!(),
            },
            None => panic!(),
        },
        _ => panic!(),
    }
}

#[test]
fn static_pointer_arithmetic_folds() {
    let (ctx, module) = compile(
        "var TABLE: [8]u16 = (:[8]u16)[0...];\n\
         let THIRD: *u16 = &TABLE[2];\n",
    );
    match &constant(&ctx, module, "THIRD").kind {
        ValueKind::Pointer(sunder::ast::Address::Static { name, offset }) => {
            assert_eq!(ctx.interner.resolve(*name), "TABLE");
            assert_eq!(*offset, 4);
        }
        other => panic!("expected static pointer, found {:?}", other),
    }
}

#[test]
fn slice_literal_and_startof() {
    let (ctx, module) = compile(
        "let DIGITS: []u8 = (:[]u8)[1u8, 2u8, 3u8];\n\
         let COUNT: usize = countof(DIGITS);\n\
         let START: *u8 = startof(DIGITS);\n",
    );
    assert_eq!(
        constant(&ctx, module, "COUNT").kind,
        ValueKind::Integer(BigInt::from(3))
    );
    match constant(&ctx, module, "START").kind {
        ValueKind::Pointer(_) => {}
        other => panic!("expected pointer, found {:?}", other),
    }
}

#[test]
fn float_arithmetic_follows_host_semantics() {
    let (ctx, module) = compile(
        "let A: f64 = 1.5f64 + 2.25f64;\n\
         let B: f32 = (:f32)(1.0 / 0.0);\n",
    );
    assert_eq!(constant(&ctx, module, "A").kind, ValueKind::F64(3.75));
    match constant(&ctx, module, "B").kind {
        ValueKind::F32(value) => assert!(value.is_infinite()),
        other => panic!("expected f32, found {:?}", other),
    }
}

#[test]
fn extend_after_declarations_only() {
    let diagnostic = compile_err(
        "extend s32 func zero() s32 { return 0; }\nlet A: s32 = 1;\n",
    );
    assert!(diagnostic
        .message
        .contains("extend declaration must appear after all module-level declarations"));
}

#[test]
fn slice_indexing_rejected_at_compile_time() {
    let diagnostic = compile_err(
        "let S: []byte = \"abc\";\nlet X: byte = S[0];\n",
    );
    assert!(
        diagnostic
            .message
            .contains("not supported in compile-time expressions"),
        "{}",
        diagnostic.message
    );
}

#[test]
fn when_selects_architecture_specific_code() {
    let (ctx, module) = compile(
        "func main() void {\n\
             when sizeof(usize) == 8u {\n\
                 var wide: u64 = 0u64;\n\
                 wide = 1u64;\n\
             } elwhen sizeof(usize) == 4u {\n\
                 this_branch_is_never_resolved();\n\
             } else {\n\
                 neither_is_this();\n\
             }\n\
         }\n",
    );
    ctx.validate_main_is_defined_correctly(module).unwrap();
}

#[test]
fn wasm32_changes_word_width() {
    let mut ctx = Context::new(Arch::Wasm32);
    let module = load_module_from_source(
        &mut ctx,
        "main.sunder",
        "let WORD: usize = sizeof(usize);\nlet SLICE: usize = sizeof([]byte);\n",
    )
    .unwrap();
    let word = constant(&ctx, module, "WORD");
    let slice = constant(&ctx, module, "SLICE");
    assert_eq!(word.kind, ValueKind::Integer(BigInt::from(4)));
    assert_eq!(slice.kind, ValueKind::Integer(BigInt::from(8)));
    let _ = module;
}

#[test]
fn error_rendering_includes_source_excerpt() {
    let mut ctx = Context::new(Arch::Amd64);
    let source = "let X: u8 = 256;\n";
    let diagnostic = load_module_from_source(&mut ctx, "main.sunder", source)
        .expect_err("expected out-of-range error");
    let rendered = ctx.render_diagnostic(&diagnostic);
    assert!(rendered.contains("[main.sunder:1]"), "{}", rendered);
    assert!(rendered.contains("out-of-range"), "{}", rendered);
}

#[test]
fn lineof_tracks_literal_position() {
    let (ctx, module) = compile("\nlet FIRST: usize = lineof();\n\n\nlet LATER: usize = lineof();\n");
    assert_eq!(
        constant(&ctx, module, "FIRST").kind,
        ValueKind::Integer(BigInt::from(2))
    );
    assert_eq!(
        constant(&ctx, module, "LATER").kind,
        ValueKind::Integer(BigInt::from(5))
    );
}

#[test]
fn round_trip_integer_encoding() {
    // A sized value cast away and back is unchanged.
    let (ctx, module) = compile(
        "let V: s16 = -12345s16;\n\
         let W: s16 = (:s16)(:u16)V;\n",
    );
    assert_eq!(
        constant(&ctx, module, "W").kind,
        ValueKind::Integer(BigInt::from(-12345))
    );
    let _ = module;
    let _ = ctx;
}

#[test]
fn template_chain_reported_for_instantiation_errors() {
    let mut ctx = Context::new(Arch::Amd64);
    let source = "struct Weird[[T]] { var member: T; }\nvar w: Weird[[void]] = uninit;\n";
    let diagnostic = load_module_from_source(&mut ctx, "main.sunder", source)
        .expect_err("instantiating with void must fail");
    let rendered = ctx.render_diagnostic(&diagnostic);
    assert!(
        rendered.contains("in instantiation of template `Weird[[void]]`"),
        "{}",
        rendered
    );
    assert!(rendered.contains("unsized type `void`"), "{}", rendered);
}

#[test]
fn deep_expression_count_to_u64() {
    let (ctx, module) = compile(
        "let N: u64 = (:u64)(((1 + 2) * (3 + 4)) << 2u);\n",
    );
    assert_eq!(
        constant(&ctx, module, "N")
            .kind,
        ValueKind::Integer(BigInt::from(((1 + 2) * (3 + 4)) << 2))
    );
    let _ = constant(&ctx, module, "N").as_integer().to_u64();
}
