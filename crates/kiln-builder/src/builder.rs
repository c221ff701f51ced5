//! The per-translation-unit symbol builder.
//!
//! Owns the output module and the insert-only symbol tables. Types are
//! materialized backend-first (opaque struct, then body) so
//! self-referential aggregates terminate; function signatures are computed
//! eagerly for overload resolution while bodies lower on first use.

use kiln_ast::{NodeData, NodeKind, TypeSpec};
use rustc_hash::FxHashMap;

use crate::error::{BuildError, BuildResult};
use crate::function;
use crate::platform::{self, Platform};
use crate::sources::{FileId, NodeRef, SourceManager};
use crate::typename::{
    ArrayKind, ArrayTypename, FunctionKind, FunctionTypename, NamedTypename, OptionalTypename,
    Primitive, ReferenceKind, ReferenceTypename, SizeKey, Typename,
};

#[derive(Clone, Debug)]
pub struct BuilderOptions {
    pub triple: String,
    pub print_ir: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            triple: String::new(),
            print_ir: false,
        }
    }
}

/// A materialized aggregate type.
#[derive(Clone, Debug)]
pub struct BuilderType {
    pub node: NodeRef,
    pub name: String,
    pub struct_id: kiln_ir::StructId,
    /// `(field node, name, type, mutable)` in declaration order.
    pub fields: Vec<(NodeRef, String, Typename, bool)>,
}

impl BuilderType {
    pub fn field_index(&self, node: NodeRef) -> Option<usize> {
        self.fields.iter().position(|(n, ..)| *n == node)
    }
}

/// A materialized global variable.
#[derive(Clone, Debug)]
pub struct BuilderGlobal {
    pub node: NodeRef,
    pub ty: Typename,
    pub value: kiln_ir::Value,
    pub mutable: bool,
}

/// A materialized function: declared signature, lazily built body.
#[derive(Clone, Debug)]
pub struct BuilderFunction {
    pub node: NodeRef,
    pub func: kiln_ir::FuncId,
    pub signature: FunctionTypename,
    pub external: bool,
}

pub struct Builder<'s> {
    pub sources: &'s SourceManager,
    pub file: FileId,
    pub dependencies: Vec<FileId>,
    pub options: BuilderOptions,
    pub module: kiln_ir::Module,
    pub layout: kiln_ir::DataLayout,
    pub platform: Box<dyn Platform>,
    /// Type reports produced by insight statements, in source order.
    pub insights: Vec<String>,

    types: FxHashMap<NodeRef, BuilderType>,
    globals: FxHashMap<NodeRef, BuilderGlobal>,
    functions: FxHashMap<NodeRef, BuilderFunction>,
    destructors: FxHashMap<NodeRef, kiln_ir::FuncId>,
    string_count: u32,
    malloc: Option<kiln_ir::FuncId>,
    free: Option<kiln_ir::FuncId>,
}

impl<'s> Builder<'s> {
    pub fn new(sources: &'s SourceManager, file: FileId, options: BuilderOptions) -> BuildResult<Self> {
        let dependencies = sources.resolve_registered(file)?;
        let module_name = sources
            .file(file)
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".into());

        Ok(Self {
            sources,
            file,
            dependencies,
            platform: platform::for_triple(&options.triple),
            options,
            module: kiln_ir::Module::new(module_name),
            layout: kiln_ir::DataLayout::default(),
            insights: Vec::new(),
            types: FxHashMap::default(),
            globals: FxHashMap::default(),
            functions: FxHashMap::default(),
            destructors: FxHashMap::default(),
            string_count: 0,
            malloc: None,
            free: None,
        })
    }

    /// Materialize every top-level symbol of the translation unit.
    pub fn build(&mut self) -> BuildResult<()> {
        let root = self.sources.root(self.file);
        let children = match &self.sources.node(root).data {
            NodeData::Root(data) => data.children.clone(),
            _ => return Err(BuildError::new("file root is not a root node")),
        };

        for child in children {
            let nref = NodeRef {
                file: self.file,
                node: child,
            };

            match self.sources.node(nref).kind() {
                NodeKind::Import => {}
                NodeKind::TypeDecl => {
                    self.make_type(nref)?;
                }
                NodeKind::Variable => {
                    self.make_global(nref)?;
                }
                NodeKind::Function => {
                    self.make_function(nref)?;
                }
                kind => {
                    return Err(BuildError::at(
                        self.file,
                        child,
                        format!("Unexpected top level node of kind {kind:?}."),
                    ));
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Node helpers
    // ------------------------------------------------------------------

    pub fn node(&self, nref: NodeRef) -> &kiln_ast::Node {
        self.sources.node(nref)
    }

    /// Blame rendering detail for a node in a candidate listing: the line
    /// number when source text exists, or a generated-AST note.
    pub fn describe_origin(&self, nref: NodeRef) -> String {
        let file = self.sources.file(nref.file);
        let span = self.sources.node(nref).span;

        if file.text.is_empty() || span.is_dummy() {
            "(from generated AST)".into()
        } else {
            let details = kiln_common::LineDetails::from_offset(&file.text, span.start);
            format!("(from line {})", details.line_number)
        }
    }

    // ------------------------------------------------------------------
    // Name search
    // ------------------------------------------------------------------

    fn declared_name<'a>(node: &'a kiln_ast::Node) -> Option<&'a str> {
        match &node.data {
            NodeData::Variable(v) => Some(&v.name),
            NodeData::Function(f) => Some(&f.name),
            NodeData::TypeDecl(t) => Some(&t.name),
            _ => None,
        }
    }

    /// Every declaration `name` can mean from `origin`, closest first:
    /// lexical scopes outward, then transitively imported roots.
    pub fn find_all(&self, origin: NodeRef, name: &str) -> Vec<NodeRef> {
        let arena = self.sources.arena(origin.file);

        let mut result: Vec<NodeRef> = arena
            .search_scope(origin.node, |node| {
                Self::declared_name(node) == Some(name)
            })
            .into_iter()
            .map(|node| NodeRef {
                file: origin.file,
                node,
            })
            .collect();

        for &dep in &self.dependencies {
            let root = self.sources.root(dep);
            for child in self.sources.arena(dep).scope_children(root.node) {
                let node = self.sources.arena(dep).get(child);
                if Self::declared_name(node) == Some(name) {
                    result.push(NodeRef { file: dep, node: child });
                }
            }
        }

        result
    }

    /// The closest declaration of `name`, if any.
    pub fn find(&self, origin: NodeRef, name: &str) -> Option<NodeRef> {
        self.find_all(origin, name).into_iter().next()
    }

    /// Scan the roots of this unit and its dependencies for declarations
    /// accepted by `check`. Used by uniform function call resolution.
    pub fn search_all_dependencies(
        &self,
        check: impl Fn(&kiln_ast::Node) -> bool,
    ) -> Vec<NodeRef> {
        let mut result = Vec::new();

        let mut files = vec![self.file];
        files.extend_from_slice(&self.dependencies);

        for file in files {
            let root = self.sources.root(file);
            for child in self.sources.arena(file).scope_children(root.node) {
                if check(self.sources.arena(file).get(child)) {
                    result.push(NodeRef { file, node: child });
                }
            }
        }

        result
    }

    // ------------------------------------------------------------------
    // Type resolution
    // ------------------------------------------------------------------

    /// Resolve a syntactic type annotation against the scopes visible from
    /// `origin`.
    pub fn resolve_typespec(&self, origin: NodeRef, spec: &TypeSpec) -> BuildResult<Typename> {
        match spec {
            TypeSpec::Primitive(p) => Ok(Typename::Primitive(*p)),
            TypeSpec::Named(name) => {
                let found = self
                    .find_all(origin, name)
                    .into_iter()
                    .find(|nref| self.node(*nref).kind() == NodeKind::TypeDecl);

                match found {
                    Some(node) => Ok(Typename::Named(NamedTypename {
                        name: name.clone(),
                        node,
                    })),
                    None => Err(BuildError::at(
                        origin.file,
                        origin.node,
                        format!("Cannot resolve type name {name}."),
                    )),
                }
            }
            TypeSpec::Reference {
                value,
                mutable,
                kind,
            } => Ok(Typename::Reference(ReferenceTypename {
                value: Box::new(self.resolve_typespec(origin, value)?),
                mutable: *mutable,
                kind: *kind,
            })),
            TypeSpec::Optional { value, bubbles } => Ok(Typename::Optional(OptionalTypename {
                value: Box::new(self.resolve_typespec(origin, value)?),
                bubbles: *bubbles,
            })),
            TypeSpec::Array { kind, value } => {
                let value = Box::new(self.resolve_typespec(origin, value)?);
                let kind = match kind {
                    kiln_ast::ArraySpec::VariableSize => ArrayKind::VariableSize,
                    kiln_ast::ArraySpec::FixedSize(n) => ArrayKind::FixedSize(*n),
                    kiln_ast::ArraySpec::Unbounded => ArrayKind::Unbounded,
                    kiln_ast::ArraySpec::UnboundedSized(expr) => {
                        ArrayKind::UnboundedSized(self.size_key(NodeRef {
                            file: origin.file,
                            node: *expr,
                        }))
                    }
                    kiln_ast::ArraySpec::Iterable => ArrayKind::Iterable,
                };
                Ok(Typename::Array(ArrayTypename { kind, value }))
            }
            TypeSpec::Function {
                kind,
                parameters,
                return_spec,
            } => {
                let parameters = parameters
                    .iter()
                    .map(|(name, spec)| {
                        Ok((name.clone(), self.resolve_typespec(origin, spec)?))
                    })
                    .collect::<BuildResult<Vec<_>>>()?;

                Ok(Typename::Function(FunctionTypename {
                    kind: match kind {
                        kiln_ast::FunctionSpecKind::Pointer => FunctionKind::Pointer,
                        kiln_ast::FunctionSpecKind::Regular => FunctionKind::Regular,
                    },
                    parameters,
                    return_type: Box::new(self.resolve_typespec(origin, return_spec)?),
                    locked: false,
                }))
            }
        }
    }

    /// Canonicalize a size expression to its identity key: a bare variable
    /// reference keys by the variable's declaration, anything else by the
    /// expression node itself.
    pub fn size_key(&self, expr: NodeRef) -> SizeKey {
        if let NodeData::Expression(data) = &self.node(expr).data {
            if let kiln_ast::ExprTree::Noun(content) = &data.tree {
                let content_ref = NodeRef {
                    file: expr.file,
                    node: *content,
                };
                if let NodeData::Reference(reference) = &self.node(content_ref).data {
                    let variable = self
                        .find_all(content_ref, &reference.name)
                        .into_iter()
                        .find(|nref| self.node(*nref).kind() == NodeKind::Variable);

                    if let Some(variable) = variable {
                        return SizeKey::Var(variable);
                    }
                }
            }
        }

        SizeKey::Expr(expr)
    }

    // ------------------------------------------------------------------
    // Backend type mapping
    // ------------------------------------------------------------------

    pub fn make_primitive_ty(&self, p: Primitive) -> kiln_ir::Ty {
        match p {
            Primitive::Nothing => kiln_ir::Ty::Void,
            Primitive::Bool => kiln_ir::Ty::Int(1),
            Primitive::Byte | Primitive::UByte | Primitive::Any => kiln_ir::Ty::Int(8),
            Primitive::Short | Primitive::UShort => kiln_ir::Ty::Int(16),
            Primitive::Int | Primitive::UInt => kiln_ir::Ty::Int(32),
            Primitive::Long | Primitive::ULong => kiln_ir::Ty::Int(64),
            Primitive::Float => kiln_ir::Ty::Float,
            Primitive::Double => kiln_ir::Ty::Double,
            Primitive::Null => kiln_ir::Ty::ptr_to(kiln_ir::Ty::Int(8)),
        }
    }

    /// Map a resolved type to its backend representation.
    pub fn make_ty(&mut self, ty: &Typename) -> BuildResult<kiln_ir::Ty> {
        match ty {
            Typename::Primitive(p) => Ok(self.make_primitive_ty(*p)),
            Typename::Named(named) => {
                let info = self.make_type(named.node)?;
                Ok(kiln_ir::Ty::Struct(info.struct_id))
            }
            Typename::Reference(reference) => {
                let pointee = self.make_ty(&reference.value)?;
                match reference.kind {
                    ReferenceKind::Regular | ReferenceKind::Unique => {
                        Ok(kiln_ir::Ty::ptr_to(pointee))
                    }
                    // A shared cell leads with its refcount word.
                    ReferenceKind::Shared => Ok(kiln_ir::Ty::ptr_to(kiln_ir::Ty::Anon(vec![
                        kiln_ir::Ty::Int(64),
                        pointee,
                    ]))),
                }
            }
            Typename::Optional(optional) => {
                let inner = self.make_ty(&optional.value)?;
                Ok(kiln_ir::Ty::Anon(vec![kiln_ir::Ty::Int(1), inner]))
            }
            Typename::Array(array) => {
                let elem = self.make_ty(&array.value)?;
                match &array.kind {
                    ArrayKind::FixedSize(n) => Ok(kiln_ir::Ty::array_of(elem, *n)),
                    ArrayKind::VariableSize => Ok(kiln_ir::Ty::Anon(vec![
                        kiln_ir::Ty::Int(64),
                        kiln_ir::Ty::Int(64),
                        kiln_ir::Ty::ptr_to(elem),
                    ])),
                    // Views are addressed through their element type.
                    ArrayKind::Unbounded | ArrayKind::UnboundedSized(_) => Ok(elem),
                    ArrayKind::Iterable => Err(BuildError::new(format!(
                        "Iterable array type {ty} has no storage representation."
                    ))),
                }
            }
            Typename::Function(function) => {
                let params = function
                    .parameters
                    .iter()
                    .map(|(_, ty)| self.make_ty(ty))
                    .collect::<BuildResult<Vec<_>>>()?;
                let ret = self.make_ty(&function.return_type)?;

                Ok(kiln_ir::Ty::ptr_to(kiln_ir::Ty::Func(Box::new(
                    kiln_ir::FnTy { params, ret },
                ))))
            }
        }
    }

    // ------------------------------------------------------------------
    // Symbol materialization
    // ------------------------------------------------------------------

    /// Materialize an aggregate: backend struct before fields, so a type
    /// may refer to itself through a reference.
    pub fn make_type(&mut self, node: NodeRef) -> BuildResult<BuilderType> {
        if let Some(info) = self.types.get(&node) {
            return Ok(info.clone());
        }

        let decl = match &self.node(node).data {
            NodeData::TypeDecl(decl) => decl,
            _ => {
                return Err(BuildError::at(
                    node.file,
                    node.node,
                    "Expected a type declaration.",
                ));
            }
        };
        let name = decl.name.clone();
        let field_nodes: Vec<NodeRef> = decl
            .fields
            .iter()
            .map(|&field| NodeRef {
                file: node.file,
                node: field,
            })
            .collect();

        let struct_id = self.module.add_struct(name.clone());

        // Register before resolving fields; recursion through references
        // finds the opaque struct and terminates.
        self.types.insert(
            node,
            BuilderType {
                node,
                name: name.clone(),
                struct_id,
                fields: Vec::new(),
            },
        );

        let mut fields = Vec::with_capacity(field_nodes.len());
        let mut field_tys = Vec::with_capacity(field_nodes.len());

        for field in field_nodes {
            let variable = match &self.node(field).data {
                NodeData::Variable(v) => v,
                _ => unreachable!("type fields are variables"),
            };
            let field_name = variable.name.clone();
            let mutable = variable.mutable;

            let spec = variable.type_spec.clone().ok_or_else(|| {
                BuildError::at(
                    field.file,
                    field.node,
                    "Every variable in type must have fixed type.",
                )
            })?;

            let ty = self.resolve_typespec(field, &spec)?;
            field_tys.push(self.make_ty(&ty)?);
            fields.push((field, field_name, ty, mutable));
        }

        self.module.set_struct_body(struct_id, field_tys);

        let info = BuilderType {
            node,
            name,
            struct_id,
            fields,
        };
        self.types.insert(node, info.clone());

        tracing::debug!(name = %info.name, "materialized type");

        Ok(info)
    }

    /// Materialize a global: zero-initialized storage, or a bare
    /// declaration for externals.
    pub fn make_global(&mut self, node: NodeRef) -> BuildResult<BuilderGlobal> {
        if let Some(info) = self.globals.get(&node) {
            return Ok(info.clone());
        }

        let variable = match &self.node(node).data {
            NodeData::Variable(v) => v,
            _ => {
                return Err(BuildError::at(
                    node.file,
                    node.node,
                    "Expected a variable declaration.",
                ));
            }
        };
        let name = variable.name.clone();
        let mutable = variable.mutable;
        let external = variable.external;
        let has_value = variable.value.is_some();

        let spec = variable.type_spec.clone().ok_or_else(|| {
            BuildError::at(node.file, node.node, "Global variable must have a fixed type.")
        })?;

        if has_value {
            return Err(BuildError::at(
                node.file,
                node.node,
                "Global variable initializers are not supported; assign from a function instead.",
            ));
        }

        let ty = self.resolve_typespec(node, &spec)?;
        let ir_ty = self.make_ty(&ty)?;

        // Globals owned by another unit are declarations here.
        let external = external || node.file != self.file;

        let global = if external {
            self.module.add_external_global(name, ir_ty)
        } else {
            let zero = kiln_ir::ConstData::Zero(ir_ty.clone());
            self.module.add_global(name, ir_ty, Some(zero), !mutable)
        };

        let info = BuilderGlobal {
            node,
            ty,
            value: kiln_ir::Value::Global(global),
            mutable,
        };
        self.globals.insert(node, info.clone());

        Ok(info)
    }

    /// The logical signature of a function declaration.
    pub fn function_signature(&self, node: NodeRef) -> BuildResult<FunctionTypename> {
        let function = match &self.node(node).data {
            NodeData::Function(f) => f,
            _ => {
                return Err(BuildError::at(
                    node.file,
                    node.node,
                    "Expected a function declaration.",
                ));
            }
        };

        let mut parameters = Vec::with_capacity(function.parameters.len());
        for &parameter in &function.parameters {
            let pref = NodeRef {
                file: node.file,
                node: parameter,
            };
            let variable = match &self.node(pref).data {
                NodeData::Variable(v) => v,
                _ => unreachable!("parameters are variables"),
            };

            let spec = variable.type_spec.as_ref().ok_or_else(|| {
                BuildError::at(pref.file, pref.node, "Function parameters must have fixed type.")
            })?;

            parameters.push((variable.name.clone(), self.resolve_typespec(pref, spec)?));
        }

        Ok(FunctionTypename {
            kind: FunctionKind::Pointer,
            parameters,
            return_type: Box::new(self.resolve_typespec(node, &function.return_spec)?),
            locked: false,
        })
    }

    /// Materialize a function: the signature eagerly, the body on the spot
    /// when this unit owns it.
    pub fn make_function(&mut self, node: NodeRef) -> BuildResult<BuilderFunction> {
        if let Some(info) = self.functions.get(&node) {
            return Ok(info.clone());
        }

        let (name, external, has_body) = match &self.node(node).data {
            NodeData::Function(f) => (f.name.clone(), f.external, f.body.is_some()),
            _ => {
                return Err(BuildError::at(
                    node.file,
                    node.node,
                    "Expected a function declaration.",
                ));
            }
        };

        let signature = self.function_signature(node)?;

        let params = signature
            .parameters
            .iter()
            .map(|(_, ty)| self.make_ty(ty))
            .collect::<BuildResult<Vec<_>>>()?;
        let ret = self.make_ty(&signature.return_type)?;

        let package = platform::FormatPackage {
            return_ty: ret,
            parameters: signature
                .parameters
                .iter()
                .zip(&params)
                .map(|((name, _), ty)| (name.clone(), ty.clone()))
                .collect(),
        };
        let formatted = self
            .platform
            .format_arguments(&self.module, &self.layout, package);

        let fn_ty = kiln_ir::FnTy {
            params: formatted.parameters.iter().map(|(_, ty)| ty.clone()).collect(),
            ret: formatted.return_ty,
        };

        let define_here = node.file == self.file && has_body && !external;

        let func = if define_here {
            self.module.add_function(
                name.clone(),
                fn_ty,
                formatted.parameters.iter().map(|(n, _)| n.clone()).collect(),
            )
        } else {
            self.module.declare_function(name.clone(), fn_ty)
        };

        let info = BuilderFunction {
            node,
            func,
            signature,
            external: external || !define_here,
        };

        // Visible before the body lowers, so recursion resolves.
        self.functions.insert(node, info.clone());

        if define_here {
            function::build_body(self, &info)?;
        }

        tracing::debug!(name = %name, external = info.external, "materialized function");

        Ok(info)
    }

    /// The implicit destructor of an aggregate: fields destroyed in
    /// reverse declaration order, after any user `destroy` overload for
    /// the aggregate runs.
    pub fn make_implicit_destructor(&mut self, node: NodeRef) -> BuildResult<kiln_ir::FuncId> {
        if let Some(&func) = self.destructors.get(&node) {
            return Ok(func);
        }

        let info = self.make_type(node)?;
        let func = self.module.add_function(
            format!("{}.destroy", info.name),
            kiln_ir::FnTy {
                params: vec![kiln_ir::Ty::ptr_to(kiln_ir::Ty::Struct(info.struct_id))],
                ret: kiln_ir::Ty::Void,
            },
            vec!["value".into()],
        );

        // Registered before the body builds, so self-referential
        // aggregates terminate.
        self.destructors.insert(node, func);
        function::build_destructor_body(self, node, func)?;

        Ok(func)
    }

    /// The user `destroy` overload accepting `&T`, if one is declared.
    pub fn find_destroy_hook(&mut self, node: NodeRef) -> BuildResult<Option<BuilderFunction>> {
        let candidates = self.search_all_dependencies(|candidate| match &candidate.data {
            NodeData::Function(f) => f.name == "destroy" && f.parameters.len() == 1,
            _ => false,
        });

        for candidate in candidates {
            let signature = self.function_signature(candidate)?;
            let (_, parameter) = &signature.parameters[0];

            let matches = matches!(
                parameter,
                Typename::Reference(reference)
                    if reference.kind == ReferenceKind::Regular
                        && matches!(
                            reference.value.as_ref(),
                            Typename::Named(named) if named.node == node
                        )
            );

            if matches {
                return Ok(Some(self.make_function(candidate)?));
            }
        }

        Ok(None)
    }

    // ------------------------------------------------------------------
    // Allocation externals
    // ------------------------------------------------------------------

    pub fn get_malloc(&mut self) -> kiln_ir::FuncId {
        if let Some(func) = self.malloc {
            return func;
        }

        let func = self.module.declare_function(
            "malloc",
            kiln_ir::FnTy {
                params: vec![kiln_ir::Ty::Int(64)],
                ret: kiln_ir::Ty::ptr_to(kiln_ir::Ty::Int(8)),
            },
        );
        self.malloc = Some(func);
        func
    }

    pub fn get_free(&mut self) -> kiln_ir::FuncId {
        if let Some(func) = self.free {
            return func;
        }

        let func = self.module.declare_function(
            "free",
            kiln_ir::FnTy {
                params: vec![kiln_ir::Ty::ptr_to(kiln_ir::Ty::Int(8))],
                ret: kiln_ir::Ty::Void,
            },
        );
        self.free = Some(func);
        func
    }

    /// A fresh private name for a string literal global.
    pub fn next_string_name(&mut self, text: &str) -> String {
        let slug: String = text
            .chars()
            .take(16)
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        let name = format!("str_{}_{}", self.string_count, slug);
        self.string_count += 1;
        name
    }
}
