use super::*;

fn setup() -> (Module, DataLayout) {
    (Module::new("abi"), DataLayout::default())
}

#[test]
fn scalar_passes_straight_through() {
    let (module, layout) = setup();
    let units = sysv_tys(&module, &layout, &Ty::Int(32));
    assert_eq!(units, Some(vec![Ty::Int(32)]));
}

#[test]
fn two_ints_pack_into_one_register() {
    let (mut module, layout) = setup();
    let id = module.add_struct("Pair");
    module.set_struct_body(id, vec![Ty::Int(32), Ty::Int(32)]);

    let units = sysv_tys(&module, &layout, &Ty::Struct(id));
    assert_eq!(units, Some(vec![Ty::Int(64)]));
}

#[test]
fn all_floats_take_the_float_fast_path() {
    let (mut module, layout) = setup();
    let id = module.add_struct("Vec2");
    module.set_struct_body(id, vec![Ty::Float, Ty::Float]);

    let units = sysv_tys(&module, &layout, &Ty::Struct(id));
    assert_eq!(units, Some(vec![Ty::Anon(vec![Ty::Float, Ty::Float])]));
}

#[test]
fn all_doubles_take_the_double_fast_path() {
    let (mut module, layout) = setup();
    let id = module.add_struct("Boxed");
    module.set_struct_body(id, vec![Ty::Double]);

    let units = sysv_tys(&module, &layout, &Ty::Struct(id));
    assert_eq!(units, Some(vec![Ty::Double]));
}

#[test]
fn mixed_sixteen_bytes_split_into_two_units() {
    let (mut module, layout) = setup();
    let id = module.add_struct("Mixed");
    module.set_struct_body(id, vec![Ty::Int(64), Ty::Double]);

    let units = sysv_tys(&module, &layout, &Ty::Struct(id));
    assert_eq!(units, Some(vec![Ty::Int(64), Ty::Double]));
}

#[test]
fn past_sixteen_bytes_spills_to_memory() {
    let (mut module, layout) = setup();
    let id = module.add_struct("Big");
    module.set_struct_body(id, vec![Ty::Int(64), Ty::Int(64), Ty::Int(64)]);

    assert_eq!(sysv_tys(&module, &layout, &Ty::Struct(id)), None);
}

#[test]
fn nested_aggregates_flatten_recursively() {
    let (mut module, layout) = setup();
    let inner = module.add_struct("Inner");
    module.set_struct_body(inner, vec![Ty::Int(16), Ty::Int(16)]);
    let outer = module.add_struct("Outer");
    module.set_struct_body(outer, vec![Ty::Struct(inner), Ty::Int(32)]);

    let leaves = flatten_ty(&module, &Ty::Struct(outer)).expect("flattens");
    assert_eq!(leaves, vec![Ty::Int(16), Ty::Int(16), Ty::Int(32)]);

    let units = sysv_tys(&module, &layout, &Ty::Struct(outer));
    assert_eq!(units, Some(vec![Ty::Int(64)]));
}

#[test]
fn arrays_flatten_elementwise() {
    let (module, _layout) = setup();
    let leaves = flatten_ty(&module, &Ty::array_of(Ty::Float, 3)).expect("flattens");
    assert_eq!(leaves, vec![Ty::Float, Ty::Float, Ty::Float]);
}

#[test]
fn opaque_struct_is_unclassifiable() {
    let (mut module, layout) = setup();
    let id = module.add_struct("Opaque");

    assert_eq!(sysv_tys(&module, &layout, &Ty::Struct(id)), None);
}

#[test]
fn sret_rewrites_large_returns() {
    let (mut module, layout) = setup();
    let id = module.add_struct("Big");
    module.set_struct_body(id, vec![Ty::Int(64), Ty::Int(64), Ty::Int(64)]);

    let package = FormatPackage {
        return_ty: Ty::Struct(id),
        parameters: vec![("x".into(), Ty::Int(32))],
    };
    let formatted = SysVPlatform.format_arguments(&module, &layout, package);

    assert!(formatted.return_ty.is_void());
    assert_eq!(formatted.parameters.len(), 2);
    assert_eq!(formatted.parameters[0].0, "returnVal");
    assert_eq!(formatted.parameters[0].1, Ty::ptr_to(Ty::Struct(id)));
}

#[test]
fn split_parameters_are_numbered() {
    let (mut module, layout) = setup();
    let id = module.add_struct("Mixed");
    module.set_struct_body(id, vec![Ty::Int(64), Ty::Double]);

    let package = FormatPackage {
        return_ty: Ty::Void,
        parameters: vec![("value".into(), Ty::Struct(id))],
    };
    let formatted = SysVPlatform.format_arguments(&module, &layout, package);

    assert_eq!(
        formatted.parameters,
        vec![
            ("value_0".into(), Ty::Int(64)),
            ("value_1".into(), Ty::Double),
        ]
    );
}

#[test]
fn tie_arguments_spills_and_splits() {
    let (mut module, layout) = setup();

    let big = module.add_struct("Big");
    module.set_struct_body(big, vec![Ty::Int(64), Ty::Int(64), Ty::Int(64)]);
    let pair = module.add_struct("Pair");
    module.set_struct_body(pair, vec![Ty::Int(64), Ty::Double]);

    let func = module.add_function(
        "caller",
        kiln_ir::FnTy {
            params: vec![],
            ret: Ty::Void,
        },
        vec![],
    );
    let entry = module.append_block(func, "entry");
    let body = module.append_block(func, "body");

    let mut entry_cursor = Cursor::at_end(func, entry);
    let mut cursor = Cursor::at_end(func, body);

    let scalar = module.const_int(Ty::Int(32), 7);
    let big_value = module.const_zero(Ty::Struct(big));
    let pair_value = module.const_zero(Ty::Struct(pair));

    let logical = vec![Ty::Int(32), Ty::Struct(big), Ty::Struct(pair)];
    let tied = SysVPlatform.tie_arguments(
        &mut module,
        &layout,
        &mut cursor,
        &mut entry_cursor,
        &logical,
        vec![scalar, big_value, pair_value],
    );

    // Scalar passes through, the big aggregate became a pointer, the
    // sixteen-byte pair split into two register units.
    assert_eq!(tied.len(), 4);
    assert_eq!(tied[0], scalar);
    assert_ne!(tied[1], big_value);
    assert_ne!(tied[2], pair_value);
}

#[test]
fn identity_platform_changes_nothing() {
    let (module, layout) = setup();
    let package = FormatPackage {
        return_ty: Ty::Int(32),
        parameters: vec![("a".into(), Ty::Double)],
    };

    let formatted = DefaultPlatform.format_arguments(&module, &layout, package.clone());
    assert_eq!(formatted, package);
}

#[test]
fn triple_selection() {
    // The Unix family classifies; unknown targets pass through.
    let sysv = for_triple("x86_64-unknown-linux-gnu");
    let passthrough = for_triple("x86_64-pc-windows-msvc");

    let (module, layout) = setup();
    let package = FormatPackage {
        return_ty: Ty::Int(32),
        parameters: vec![],
    };

    assert_eq!(
        sysv.format_arguments(&module, &layout, package.clone()),
        package
    );
    assert_eq!(
        passthrough.format_arguments(&module, &layout, package.clone()),
        package
    );
}
