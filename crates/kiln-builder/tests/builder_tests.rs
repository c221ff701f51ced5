//! Symbol materialization, name resolution across files, and the type
//! display round trip.

mod util;

use kiln_builder::{Builder, BuilderOptions, SourceManager};
use util::*;

#[test]
fn self_referential_types_terminate() {
    let compiled = compile(
        "type Node { next *Node, value int }\n\
         main() int { return 0 }\n",
    );

    // The struct completed with both fields despite the cycle.
    let module = &compiled.module;
    let func = function(module, "main");
    let _ = func;

    let ir = kiln_ir::display::render_module(module);
    assert!(ir.contains("Node"), "{ir}");
}

#[test]
fn globals_materialize_with_zero_init() {
    let compiled = compile(
        "var counter int\n\
         let limit ulong\n\
         bump() nothing {\n\
             counter += 1\n\
             return\n\
         }\n\
         main() int { return counter }\n",
    );

    assert!(compiled.module.globals.iter().any(|g| g.name == "counter" && !g.constant));
    assert!(compiled.module.globals.iter().any(|g| g.name == "limit" && g.constant));
}

#[test]
fn external_globals_declare_without_storage() {
    // Assembled directly: the parser has no extern-global syntax.
    let mut factory = kiln_ast::AstFactory::new();
    factory.external_global(
        "environ",
        kiln_ast::TypeSpec::reference(kiln_ast::TypeSpec::primitive(
            kiln_ast::Primitive::Any,
        )),
    );

    let root = factory.root();
    let mut sources = SourceManager::new();
    let file = sources.register("env.kiln", "", "", factory.arena, root);

    let mut builder = Builder::new(&sources, file, BuilderOptions::default()).expect("builder");
    builder.build().expect("builds");

    assert!(builder.module.globals.iter().any(|g| g.name == "environ" && g.external));
}

#[test]
fn imported_functions_resolve_and_declare() {
    let lib = "helper(x int) int { return x }\n";
    let app = "import \"lib.kiln\"\n\
               main() int { return helper(7) }\n";

    let lib_parsed = kiln_parser::parse(lib).expect("lib parses");
    let app_parsed = kiln_parser::parse(app).expect("app parses");

    let mut sources = SourceManager::new();
    sources.register("proj/lib.kiln", "", lib, lib_parsed.arena, lib_parsed.root);
    let app_id = sources.register("proj/app.kiln", "", app, app_parsed.arena, app_parsed.root);

    let mut builder =
        Builder::new(&sources, app_id, BuilderOptions::default()).expect("builder");
    builder.build().expect("builds");

    // The import is visible as an external declaration in this unit.
    let helper = builder
        .module
        .find_function("helper")
        .expect("helper declared");
    assert!(builder.module.function(helper).external);

    let main = builder.module.find_function("main").expect("main defined");
    assert_eq!(count_calls_to(&builder.module, main, "helper"), 1);
}

#[test]
fn search_returns_local_candidates_before_imports() {
    let lib = "pick() int { return 1 }\n";
    let app = "import \"lib.kiln\"\n\
               pick() int { return 2 }\n\
               main() int { return 0 }\n";

    let lib_parsed = kiln_parser::parse(lib).expect("lib parses");
    let app_parsed = kiln_parser::parse(app).expect("app parses");

    let mut sources = SourceManager::new();
    sources.register("proj/lib.kiln", "", lib, lib_parsed.arena, lib_parsed.root);
    let app_id = sources.register("proj/app.kiln", "", app, app_parsed.arena, app_parsed.root);

    let builder = Builder::new(&sources, app_id, BuilderOptions::default()).expect("builder");

    // From inside main, both declarations are candidates, local first.
    let root = sources.root(app_id);
    let main_node = match &sources.node(root).data {
        kiln_ast::NodeData::Root(data) => data.children[2],
        _ => unreachable!(),
    };
    let origin = kiln_builder::NodeRef {
        file: app_id,
        node: main_node,
    };

    let found = builder.find_all(origin, "pick");
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].file, app_id, "lexically closer candidate first");
    assert_ne!(found[1].file, app_id);
}

#[test]
fn type_strings_round_trip_through_the_parser() {
    let compiled = compile(
        "type Point { x int, y int }\n\
         f(a &var int, b *Point, c *shared Point, d ?double, e &[byte:], g [int:4], h func ptr(int, bool) nothing) nothing { return }\n\
         main() int { return 0 }\n",
    );
    let _ = compiled;

    // Re-parse each rendered parameter type and render again: fixpoint.
    let expected = [
        "&var int",
        "*Point",
        "*shared Point",
        "?double",
        "&[byte:]",
        "[int:4]",
        "func ptr(int, bool) nothing",
    ];

    let text = "type Point { x int, y int }\n\
                f(a &var int, b *Point, c *shared Point, d ?double, e &[byte:], g [int:4], h func ptr(int, bool) nothing) nothing { return }\n";
    let parsed = kiln_parser::parse(text).expect("parses");
    let mut sources = SourceManager::new();
    let file = sources.register("t.kiln", "", text, parsed.arena, parsed.root);
    let builder = Builder::new(&sources, file, BuilderOptions::default()).expect("builder");

    let root = sources.root(file);
    let function_node = match &sources.node(root).data {
        kiln_ast::NodeData::Root(data) => data.children[1],
        _ => unreachable!(),
    };
    let signature = builder
        .function_signature(kiln_builder::NodeRef {
            file,
            node: function_node,
        })
        .expect("signature resolves");

    let rendered: Vec<String> = signature
        .parameters
        .iter()
        .map(|(_, ty)| ty.to_string())
        .collect();
    assert_eq!(rendered, expected);
}

#[test]
fn optionals_store_presence_and_payload() {
    let compiled = compile(
        "main() int {\n\
             let o ?int = 3\n\
             return o ? 1 : 0\n\
         }\n",
    );

    let main = function(&compiled.module, "main");
    assert!(has_cond_br(&compiled.module, main));
}

#[test]
fn fallback_operator_unwraps_with_a_default() {
    let compiled = compile(
        "maybe() ?int { return null }\n\
         main() int { return maybe() ?? 9 }\n",
    );

    let main = function(&compiled.module, "main");
    assert_eq!(count_calls_to(&compiled.module, main, "maybe"), 1);
    assert!(has_cond_br(&compiled.module, main));
}

#[test]
fn forced_casts_cross_representations() {
    compile(
        "main() int {\n\
             let x = 3.5 as int\n\
             let b = 1 as bool\n\
             let s = \"p\"\n\
             let addr = s as ulong\n\
             return x\n\
         }\n",
    );
}

#[test]
fn null_converts_to_references() {
    compile(
        "main() int {\n\
             let r &int = null\n\
             return r ? 1 : 0\n\
         }\n",
    );
}

#[test]
fn unary_operators_lower() {
    compile(
        "main() int {\n\
             let x = 5\n\
             let n = -x\n\
             let t = !false\n\
             let r = &x\n\
             let y = @r\n\
             return y + n\n\
         }\n",
    );
}
