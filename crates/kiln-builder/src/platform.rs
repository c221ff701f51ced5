//! Platform argument/return lowering.
//!
//! The core consults a [`Platform`] at two points only: when a function
//! signature is materialized (`format_arguments`) and when a call or
//! return crosses the ABI boundary (`invoke_function`, `tie_arguments`,
//! `tie_return`). The identity platform passes everything through; the
//! System-V implementation classifies aggregates by recursive flattening
//! into primitive leaves, packs them into at most two 8-byte units with
//! all-float and all-double fast paths, and spills to memory past 16
//! bytes or on unclassifiable leaves.

use kiln_ir::{CastOp, Cursor, DataLayout, Module, Ty, Value};

/// A logical signature on its way through ABI formatting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatPackage {
    pub return_ty: Ty,
    pub parameters: Vec<(String, Ty)>,
}

pub trait Platform {
    /// Rewrite a logical signature into its ABI form.
    fn format_arguments(
        &self,
        module: &Module,
        layout: &DataLayout,
        package: FormatPackage,
    ) -> FormatPackage;

    /// Emit a call with already-tied arguments.
    fn invoke_function(
        &self,
        module: &mut Module,
        cursor: &mut Cursor,
        callee: Value,
        args: Vec<Value>,
    ) -> Value;

    /// Wrap logical argument values into ABI form: coerce large
    /// aggregates to pointers, split small ones into register units.
    fn tie_arguments(
        &self,
        module: &mut Module,
        layout: &DataLayout,
        cursor: &mut Cursor,
        entry: &mut Cursor,
        logical: &[Ty],
        args: Vec<Value>,
    ) -> Vec<Value>;

    /// Emit the function return for a value of the formatted return type.
    fn tie_return(&self, module: &mut Module, cursor: &Cursor, return_ty: &Ty, value: Option<Value>);
}

/// The identity platform used for targets without special lowering.
pub struct DefaultPlatform;

impl Platform for DefaultPlatform {
    fn format_arguments(
        &self,
        _module: &Module,
        _layout: &DataLayout,
        package: FormatPackage,
    ) -> FormatPackage {
        package
    }

    fn invoke_function(
        &self,
        module: &mut Module,
        cursor: &mut Cursor,
        callee: Value,
        args: Vec<Value>,
    ) -> Value {
        module.build_call(cursor, callee, args)
    }

    fn tie_arguments(
        &self,
        _module: &mut Module,
        _layout: &DataLayout,
        _cursor: &mut Cursor,
        _entry: &mut Cursor,
        _logical: &[Ty],
        args: Vec<Value>,
    ) -> Vec<Value> {
        args
    }

    fn tie_return(
        &self,
        module: &mut Module,
        cursor: &Cursor,
        return_ty: &Ty,
        value: Option<Value>,
    ) {
        if return_ty.is_void() {
            debug_assert!(value.is_none());
            module.build_ret(cursor, None);
        } else {
            module.build_ret(cursor, value);
        }
    }
}

pub fn identity() -> Box<dyn Platform> {
    Box::new(DefaultPlatform)
}

/// Pick the platform for a target triple. The Unix family gets System-V;
/// everything else (including the empty host triple) passes through.
pub fn for_triple(triple: &str) -> Box<dyn Platform> {
    let os_is_sysv = [
        "darwin", "freebsd", "ios", "kfreebsd", "linux", "macosx", "netbsd", "openbsd",
        "solaris", "tvos", "watchos",
    ]
    .iter()
    .any(|os| triple.contains(os));

    if os_is_sysv {
        Box::new(SysVPlatform)
    } else {
        Box::new(DefaultPlatform)
    }
}

// ----------------------------------------------------------------------
// System-V
// ----------------------------------------------------------------------

pub struct SysVPlatform;

/// Flatten a type into its primitive leaves; `None` marks an element the
/// classifier cannot place in registers.
pub fn flatten_ty(module: &Module, ty: &Ty) -> Option<Vec<Ty>> {
    let mut result = Vec::new();

    match ty {
        Ty::Int(_) | Ty::Float | Ty::Double | Ty::Ptr(_) => result.push(ty.clone()),
        Ty::Struct(id) => {
            let fields = module.struct_def(*id).fields.clone()?;
            for field in fields {
                result.extend(flatten_ty(module, &field)?);
            }
        }
        Ty::Anon(fields) => {
            for field in fields {
                result.extend(flatten_ty(module, field)?);
            }
        }
        Ty::Array(elem, len) => {
            let base = flatten_ty(module, elem)?;
            for _ in 0..*len {
                result.extend(base.iter().cloned());
            }
        }
        _ => return None,
    }

    debug_assert!(!result.is_empty());
    Some(result)
}

/// Pack flattened leaves into at most two 8-byte units.
pub fn combine_sysv_tys(module: &Module, layout: &DataLayout, leaves: &[Ty]) -> Option<Vec<Ty>> {
    const DWORD: u64 = 8;
    const MAX_UNITS: usize = 2;

    let mut result = Vec::new();
    let mut bytes = 0u64;
    let mut all_floats = true;
    let mut all_doubles = true;

    let push = |result: &mut Vec<Ty>, bytes: &mut u64, all_floats: &mut bool, all_doubles: &mut bool| {
        debug_assert!(*bytes > 0);

        if *all_floats {
            let count = (*bytes / 4).max(1);
            if count > 1 {
                result.push(Ty::Anon(vec![Ty::Float; count as usize]));
            } else {
                result.push(Ty::Float);
            }
        } else if *all_doubles {
            result.push(Ty::Double);
        } else {
            let rounded = [1u64, 2, 3, 4, 8]
                .into_iter()
                .find(|&size| size >= *bytes)
                .unwrap_or(8);
            result.push(Ty::Int((rounded * 8) as u32));
        }

        *bytes = 0;
        *all_floats = true;
        *all_doubles = true;
    };

    for leaf in leaves {
        let size = layout.store_size(module, leaf);

        if size > DWORD {
            return None;
        }

        if bytes + size > DWORD {
            push(&mut result, &mut bytes, &mut all_floats, &mut all_doubles);
        }

        bytes += size;

        if !leaf.is_float() {
            all_floats = false;
        }
        if !leaf.is_double() {
            all_doubles = false;
        }
    }

    if bytes > 0 {
        push(&mut result, &mut bytes, &mut all_floats, &mut all_doubles);
    }

    if result.len() > MAX_UNITS {
        return None;
    }

    Some(result)
}

/// The register units a type classifies into, or `None` for a memory
/// spill.
pub fn sysv_tys(module: &Module, layout: &DataLayout, ty: &Ty) -> Option<Vec<Ty>> {
    const MAX_IN_PLACE: u64 = 16;

    if layout.store_size(module, ty) > MAX_IN_PLACE {
        return None;
    }

    let leaves = flatten_ty(module, ty)?;
    combine_sysv_tys(module, layout, &leaves)
}

impl Platform for SysVPlatform {
    fn format_arguments(
        &self,
        module: &Module,
        layout: &DataLayout,
        package: FormatPackage,
    ) -> FormatPackage {
        let mut result = FormatPackage {
            return_ty: Ty::Void,
            parameters: Vec::new(),
        };

        if package.return_ty.is_void() {
            result.return_ty = Ty::Void;
        } else {
            match sysv_tys(module, layout, &package.return_ty) {
                Some(units) if units.len() == 1 => {
                    result.return_ty = units.into_iter().next().expect("one unit");
                }
                Some(units) => {
                    result.return_ty = Ty::Anon(units);
                }
                None => {
                    // sret: the caller passes the return slot.
                    result.return_ty = Ty::Void;
                    result
                        .parameters
                        .push(("returnVal".into(), Ty::ptr_to(package.return_ty.clone())));
                }
            }
        }

        for (name, ty) in package.parameters {
            match sysv_tys(module, layout, &ty) {
                Some(units) if units.len() == 1 => {
                    result
                        .parameters
                        .push((name, units.into_iter().next().expect("one unit")));
                }
                Some(units) => {
                    for (index, unit) in units.into_iter().enumerate() {
                        result.parameters.push((format!("{name}_{index}"), unit));
                    }
                }
                None => {
                    // byval: spilled to memory, passed by pointer.
                    result.parameters.push((name, Ty::ptr_to(ty)));
                }
            }
        }

        result
    }

    fn invoke_function(
        &self,
        module: &mut Module,
        cursor: &mut Cursor,
        callee: Value,
        args: Vec<Value>,
    ) -> Value {
        module.build_call(cursor, callee, args)
    }

    fn tie_arguments(
        &self,
        module: &mut Module,
        layout: &DataLayout,
        cursor: &mut Cursor,
        entry: &mut Cursor,
        logical: &[Ty],
        args: Vec<Value>,
    ) -> Vec<Value> {
        let mut result = Vec::with_capacity(args.len());

        for (ty, arg) in logical.iter().zip(args) {
            match sysv_tys(module, layout, ty) {
                Some(units) if units.len() == 1 && units[0] == *ty => result.push(arg),
                Some(units) => {
                    // Round-trip through memory, then read back as units.
                    let slot = module.build_alloca(entry, ty.clone(), "tie");
                    module.build_store(cursor, arg, slot);

                    let unit_struct = Ty::Anon(units.clone());
                    let cast = module.build_cast(
                        cursor,
                        CastOp::BitCast,
                        slot,
                        Ty::ptr_to(unit_struct),
                    );

                    if units.len() == 1 {
                        let unit = units.into_iter().next().expect("one unit");
                        let ptr = module.build_struct_gep(cursor, cast, 0, "tie");
                        result.push(module.build_load(cursor, unit, ptr));
                    } else {
                        for (index, unit) in units.into_iter().enumerate() {
                            let ptr =
                                module.build_struct_gep(cursor, cast, index as u32, "tie");
                            result.push(module.build_load(cursor, unit, ptr));
                        }
                    }
                }
                None => {
                    // byval spill.
                    let slot = module.build_alloca(entry, ty.clone(), "byval");
                    module.build_store(cursor, arg, slot);
                    result.push(slot);
                }
            }
        }

        result
    }

    fn tie_return(
        &self,
        module: &mut Module,
        cursor: &Cursor,
        return_ty: &Ty,
        value: Option<Value>,
    ) {
        if return_ty.is_void() {
            module.build_ret(cursor, None);
        } else {
            module.build_ret(cursor, value);
        }
    }
}

#[cfg(test)]
#[path = "tests/platform_tests.rs"]
mod tests;
