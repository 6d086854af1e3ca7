//! Import resolution across real files on disk.

use std::fs;

use num_bigint::BigInt;
use sunder::context::{Arch, Context};
use sunder::resolve::load_module_file;
use sunder::symbol::SymbolKind;
use sunder::value::ValueKind;

#[test]
fn import_resolves_relative_to_importer() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("math.sunder"),
        "namespace math;\nlet ANSWER: s32 = 42;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.sunder"),
        "import \"math.sunder\";\nlet DOUBLED: s32 = (:s32)(math::ANSWER * 2);\nfunc main() void { }\n",
    )
    .unwrap();

    let mut ctx = Context::new(Arch::Amd64);
    let module = load_module_file(&mut ctx, "main.sunder", &dir.path().join("main.sunder"))
        .unwrap_or_else(|diagnostic| panic!("{}", ctx.render_diagnostic(&diagnostic)));
    ctx.validate_main_is_defined_correctly(module).unwrap();

    let name = ctx.interner.lookup("DOUBLED").unwrap();
    let symbol = ctx
        .scope_lookup(ctx.module(module).symbols, name)
        .unwrap();
    match &ctx.symbol(symbol).kind {
        SymbolKind::Constant(object) => {
            let value = ctx.object(*object).value.as_ref().unwrap();
            assert_eq!(value.kind, ValueKind::Integer(BigInt::from(84)));
        }
        _ => panic!(),
    }
}

#[test]
fn imports_are_transitive_and_memoized() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("base.sunder"),
        "namespace base;\nlet ONE: s32 = 1;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("mid.sunder"),
        "namespace mid;\nimport \"base.sunder\";\nlet TWO: s32 = (:s32)(base::ONE + 1);\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.sunder"),
        "import \"mid.sunder\";\nimport \"base.sunder\";\nlet THREE: s32 = (:s32)(mid::TWO + base::ONE);\nfunc main() void { }\n",
    )
    .unwrap();

    let mut ctx = Context::new(Arch::Amd64);
    let module = load_module_file(&mut ctx, "main.sunder", &dir.path().join("main.sunder"))
        .unwrap_or_else(|diagnostic| panic!("{}", ctx.render_diagnostic(&diagnostic)));

    // base.sunder loads once even though it is imported twice.
    assert_eq!(ctx.modules.len(), 3);

    let name = ctx.interner.lookup("THREE").unwrap();
    let symbol = ctx
        .scope_lookup(ctx.module(module).symbols, name)
        .unwrap();
    match &ctx.symbol(symbol).kind {
        SymbolKind::Constant(object) => {
            let value = ctx.object(*object).value.as_ref().unwrap();
            assert_eq!(value.kind, ValueKind::Integer(BigInt::from(3)));
        }
        _ => panic!(),
    }
}

#[test]
fn missing_import_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("main.sunder"),
        "import \"nowhere.sunder\";\nfunc main() void { }\n",
    )
    .unwrap();

    let mut ctx = Context::new(Arch::Amd64);
    let result = load_module_file(&mut ctx, "main.sunder", &dir.path().join("main.sunder"));
    let diagnostic = result.expect_err("missing module must fail");
    assert!(
        diagnostic.message.contains("failed to locate module `nowhere.sunder`"),
        "{}",
        diagnostic.message
    );
}

#[test]
fn search_path_is_consulted_after_importer_directory() {
    let lib = tempfile::tempdir().unwrap();
    let app = tempfile::tempdir().unwrap();
    fs::write(
        lib.path().join("shared.sunder"),
        "namespace shared;\nlet VERSION: s32 = 3;\n",
    )
    .unwrap();
    fs::write(
        app.path().join("main.sunder"),
        "import \"shared.sunder\";\nlet V: s32 = shared::VERSION;\nfunc main() void { }\n",
    )
    .unwrap();

    let mut ctx = Context::new(Arch::Amd64);
    ctx.search_paths = vec![lib.path().to_path_buf()];
    let module = load_module_file(&mut ctx, "main.sunder", &app.path().join("main.sunder"))
        .unwrap_or_else(|diagnostic| panic!("{}", ctx.render_diagnostic(&diagnostic)));
    let _ = module;
}

#[test]
fn namespaces_shared_across_modules_merge() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.sunder"),
        "namespace util;\nlet A: s32 = 1;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("b.sunder"),
        "namespace util;\nimport \"a.sunder\";\nlet B: s32 = util::A;\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.sunder"),
        "import \"b.sunder\";\nlet C: s32 = (:s32)(util::A + util::B);\nfunc main() void { }\n",
    )
    .unwrap();

    let mut ctx = Context::new(Arch::Amd64);
    let module = load_module_file(&mut ctx, "main.sunder", &dir.path().join("main.sunder"))
        .unwrap_or_else(|diagnostic| panic!("{}", ctx.render_diagnostic(&diagnostic)));

    let name = ctx.interner.lookup("C").unwrap();
    let symbol = ctx
        .scope_lookup(ctx.module(module).symbols, name)
        .unwrap();
    match &ctx.symbol(symbol).kind {
        SymbolKind::Constant(object) => {
            let value = ctx.object(*object).value.as_ref().unwrap();
            assert_eq!(value.kind, ValueKind::Integer(BigInt::from(2)));
        }
        _ => panic!(),
    }
}
