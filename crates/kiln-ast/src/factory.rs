//! Synthetic tree construction.
//!
//! Front ends that do not come from text (generated declarations, header
//! translation, tests) build arenas through this factory. Statement
//! constructors append to their code scope; expression constructors only
//! allocate, since expressions also appear in operand positions.

use kiln_common::Span;

use crate::arena::{Arena, NodeId};
use crate::expr::{BinaryOp, ExprTree, NumberValue, SpecialLit, UnaryOp};
use crate::nodes::{
    As, Assign, AssignOp, Block, BlockKind, Call, Code, Dot, Expression, For, Function, If, Import,
    Index, Insight, NodeData, New, Number, Operator, Parentheses, Reference, Root, Statement,
    StatementOp, StringLit, Ternary, TypeDecl, Unary, Variable,
};
use crate::typespec::TypeSpec;

pub struct AstFactory {
    pub arena: Arena,
    root: NodeId,
}

impl AstFactory {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc(None, Span::dummy(), NodeData::Root(Root::default()));
        Self { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        self.arena.alloc(Some(parent), Span::dummy(), data)
    }

    fn attach_to_root(&mut self, id: NodeId) {
        match &mut self.arena.get_mut(self.root).data {
            NodeData::Root(root) => root.children.push(id),
            _ => unreachable!("root node is always Root"),
        }
    }

    fn attach_to_code(&mut self, code: NodeId, id: NodeId) {
        match &mut self.arena.get_mut(code).data {
            NodeData::Code(body) => body.children.push(id),
            _ => panic!("statement parent must be a code scope"),
        }
    }

    // ------------------------------------------------------------------
    // Top-level declarations
    // ------------------------------------------------------------------

    pub fn import(&mut self, path: &str, kind: &str) -> NodeId {
        let id = self.alloc(
            self.root,
            NodeData::Import(Import {
                path: path.into(),
                kind: kind.into(),
            }),
        );
        self.attach_to_root(id);
        id
    }

    /// Declare an aggregate with `(name, type, mutable)` fields.
    pub fn type_decl(&mut self, name: &str, fields: &[(&str, TypeSpec, bool)]) -> NodeId {
        let id = self.alloc(
            self.root,
            NodeData::TypeDecl(TypeDecl {
                name: name.into(),
                fields: Vec::new(),
            }),
        );

        let mut field_ids = Vec::with_capacity(fields.len());
        for (field_name, spec, mutable) in fields {
            field_ids.push(self.alloc(
                id,
                NodeData::Variable(Variable {
                    name: (*field_name).into(),
                    mutable: *mutable,
                    type_spec: Some(spec.clone()),
                    value: None,
                    external: false,
                }),
            ));
        }

        match &mut self.arena.get_mut(id).data {
            NodeData::TypeDecl(decl) => decl.fields = field_ids,
            _ => unreachable!(),
        }

        self.attach_to_root(id);
        id
    }

    pub fn global(
        &mut self,
        name: &str,
        mutable: bool,
        spec: Option<TypeSpec>,
        value: Option<NodeId>,
    ) -> NodeId {
        let id = self.alloc(
            self.root,
            NodeData::Variable(Variable {
                name: name.into(),
                mutable,
                type_spec: spec,
                value,
                external: false,
            }),
        );
        self.attach_to_root(id);
        id
    }

    pub fn external_global(&mut self, name: &str, spec: TypeSpec) -> NodeId {
        let id = self.alloc(
            self.root,
            NodeData::Variable(Variable {
                name: name.into(),
                mutable: true,
                type_spec: Some(spec),
                value: None,
                external: true,
            }),
        );
        self.attach_to_root(id);
        id
    }

    /// Declare a function with a body; returns `(function, body code)`.
    pub fn function(
        &mut self,
        name: &str,
        parameters: &[(&str, TypeSpec)],
        return_spec: TypeSpec,
    ) -> (NodeId, NodeId) {
        let id = self.alloc(
            self.root,
            NodeData::Function(Function {
                name: name.into(),
                parameters: Vec::new(),
                return_spec,
                external: false,
                body: None,
            }),
        );

        let parameter_ids = self.parameters(id, parameters);
        let body = self.alloc(id, NodeData::Code(Code::default()));

        match &mut self.arena.get_mut(id).data {
            NodeData::Function(function) => {
                function.parameters = parameter_ids;
                function.body = Some(body);
            }
            _ => unreachable!(),
        }

        self.attach_to_root(id);
        (id, body)
    }

    pub fn external_function(
        &mut self,
        name: &str,
        parameters: &[(&str, TypeSpec)],
        return_spec: TypeSpec,
    ) -> NodeId {
        let id = self.alloc(
            self.root,
            NodeData::Function(Function {
                name: name.into(),
                parameters: Vec::new(),
                return_spec,
                external: true,
                body: None,
            }),
        );

        let parameter_ids = self.parameters(id, parameters);
        match &mut self.arena.get_mut(id).data {
            NodeData::Function(function) => function.parameters = parameter_ids,
            _ => unreachable!(),
        }

        self.attach_to_root(id);
        id
    }

    /// Declare an empty function shell; parameters, return type, and body
    /// attach afterwards. Parsers need the node to exist before its
    /// parameter-referencing types can.
    pub fn function_shell(&mut self, name: &str) -> NodeId {
        let id = self.alloc(
            self.root,
            NodeData::Function(Function {
                name: name.into(),
                parameters: Vec::new(),
                return_spec: TypeSpec::primitive(crate::typespec::Primitive::Nothing),
                external: false,
                body: None,
            }),
        );
        self.attach_to_root(id);
        id
    }

    pub fn add_parameter(&mut self, function: NodeId, name: &str, spec: TypeSpec) -> NodeId {
        let id = self.alloc(
            function,
            NodeData::Variable(Variable {
                name: name.into(),
                mutable: false,
                type_spec: Some(spec),
                value: None,
                external: false,
            }),
        );

        match &mut self.arena.get_mut(function).data {
            NodeData::Function(f) => f.parameters.push(id),
            _ => panic!("add_parameter target must be a function"),
        }

        id
    }

    pub fn set_return_spec(&mut self, function: NodeId, spec: TypeSpec) {
        match &mut self.arena.get_mut(function).data {
            NodeData::Function(f) => f.return_spec = spec,
            _ => panic!("set_return_spec target must be a function"),
        }
    }

    pub fn set_external(&mut self, function: NodeId) {
        match &mut self.arena.get_mut(function).data {
            NodeData::Function(f) => f.external = true,
            _ => panic!("set_external target must be a function"),
        }
    }

    /// Attach a body code scope to a function shell.
    pub fn add_body(&mut self, function: NodeId) -> NodeId {
        let body = self.alloc(function, NodeData::Code(Code::default()));

        match &mut self.arena.get_mut(function).data {
            NodeData::Function(f) => f.body = Some(body),
            _ => panic!("add_body target must be a function"),
        }

        body
    }

    /// Declare an aggregate shell; fields attach afterwards.
    pub fn type_shell(&mut self, name: &str) -> NodeId {
        let id = self.alloc(
            self.root,
            NodeData::TypeDecl(TypeDecl {
                name: name.into(),
                fields: Vec::new(),
            }),
        );
        self.attach_to_root(id);
        id
    }

    pub fn add_field(&mut self, decl: NodeId, name: &str, spec: TypeSpec, mutable: bool) -> NodeId {
        let id = self.alloc(
            decl,
            NodeData::Variable(Variable {
                name: name.into(),
                mutable,
                type_spec: Some(spec),
                value: None,
                external: false,
            }),
        );

        match &mut self.arena.get_mut(decl).data {
            NodeData::TypeDecl(t) => t.fields.push(id),
            _ => panic!("add_field target must be a type declaration"),
        }

        id
    }

    fn parameters(&mut self, function: NodeId, parameters: &[(&str, TypeSpec)]) -> Vec<NodeId> {
        parameters
            .iter()
            .map(|(name, spec)| {
                self.alloc(
                    function,
                    NodeData::Variable(Variable {
                        name: (*name).into(),
                        mutable: false,
                        type_spec: Some(spec.clone()),
                        value: None,
                        external: false,
                    }),
                )
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Statements (appended to their code scope)
    // ------------------------------------------------------------------

    pub fn local(
        &mut self,
        code: NodeId,
        name: &str,
        mutable: bool,
        spec: Option<TypeSpec>,
        value: Option<NodeId>,
    ) -> NodeId {
        let id = self.alloc(
            code,
            NodeData::Variable(Variable {
                name: name.into(),
                mutable,
                type_spec: spec,
                value,
                external: false,
            }),
        );
        self.attach_to_code(code, id);
        id
    }

    pub fn assign(&mut self, code: NodeId, op: AssignOp, target: NodeId, value: NodeId) -> NodeId {
        let id = self.alloc(code, NodeData::Assign(Assign { op, target, value }));
        self.attach_to_code(code, id);
        id
    }

    pub fn ret(&mut self, code: NodeId, value: Option<NodeId>) -> NodeId {
        let id = self.alloc(
            code,
            NodeData::Statement(Statement {
                op: StatementOp::Return,
                value,
            }),
        );
        self.attach_to_code(code, id);
        id
    }

    pub fn brk(&mut self, code: NodeId) -> NodeId {
        let id = self.alloc(
            code,
            NodeData::Statement(Statement {
                op: StatementOp::Break,
                value: None,
            }),
        );
        self.attach_to_code(code, id);
        id
    }

    pub fn cont(&mut self, code: NodeId) -> NodeId {
        let id = self.alloc(
            code,
            NodeData::Statement(Statement {
                op: StatementOp::Continue,
                value: None,
            }),
        );
        self.attach_to_code(code, id);
        id
    }

    /// Append an already-built expression node as a statement.
    pub fn stmt(&mut self, code: NodeId, expression: NodeId) -> NodeId {
        self.attach_to_code(code, expression);
        expression
    }

    pub fn insight(&mut self, code: NodeId, value: NodeId) -> NodeId {
        let id = self.alloc(code, NodeData::Insight(Insight { value }));
        self.attach_to_code(code, id);
        id
    }

    /// Append an `if`; returns `(if node, then-branch code)`.
    pub fn if_stmt(&mut self, code: NodeId, condition: NodeId) -> (NodeId, NodeId) {
        let id = self.alloc(
            code,
            NodeData::If(If {
                condition,
                on_true: NodeId(u32::MAX),
                on_false: None,
            }),
        );
        let then_code = self.alloc(id, NodeData::Code(Code::default()));

        match &mut self.arena.get_mut(id).data {
            NodeData::If(node) => node.on_true = then_code,
            _ => unreachable!(),
        }

        self.attach_to_code(code, id);
        (id, then_code)
    }

    /// Add an else branch to an `if`; returns its code scope.
    pub fn if_else(&mut self, if_node: NodeId) -> NodeId {
        let else_code = self.alloc(if_node, NodeData::Code(Code::default()));

        match &mut self.arena.get_mut(if_node).data {
            NodeData::If(node) => node.on_false = Some(else_code),
            _ => panic!("if_else target must be an if node"),
        }

        else_code
    }

    /// Append an infinite loop; returns `(for node, body code)`.
    pub fn for_infinite(&mut self, code: NodeId) -> (NodeId, NodeId) {
        self.for_loop(code, None)
    }

    /// Append a conditional loop; returns `(for node, body code)`.
    pub fn for_while(&mut self, code: NodeId, condition: NodeId) -> (NodeId, NodeId) {
        self.for_loop(code, Some(condition))
    }

    fn for_loop(&mut self, code: NodeId, condition: Option<NodeId>) -> (NodeId, NodeId) {
        let id = self.alloc(
            code,
            NodeData::For(For {
                condition,
                body: NodeId(u32::MAX),
            }),
        );
        let body = self.alloc(id, NodeData::Code(Code::default()));

        match &mut self.arena.get_mut(id).data {
            NodeData::For(node) => node.body = body,
            _ => unreachable!(),
        }

        self.attach_to_code(code, id);
        (id, body)
    }

    /// Append a block; returns `(block node, body code)`.
    pub fn block(&mut self, code: NodeId, kind: BlockKind) -> (NodeId, NodeId) {
        let id = self.alloc(
            code,
            NodeData::Block(Block {
                kind,
                body: NodeId(u32::MAX),
            }),
        );
        let body = self.alloc(id, NodeData::Code(Code::default()));

        match &mut self.arena.get_mut(id).data {
            NodeData::Block(node) => node.body = body,
            _ => unreachable!(),
        }

        self.attach_to_code(code, id);
        (id, body)
    }

    // ------------------------------------------------------------------
    // Expressions (allocated, not appended)
    // ------------------------------------------------------------------

    /// Wrap a tree into an `Expression` node under `scope`.
    pub fn expression(&mut self, scope: NodeId, tree: ExprTree) -> NodeId {
        self.alloc(scope, NodeData::Expression(Expression { tree }))
    }

    pub fn reference(&mut self, scope: NodeId, name: &str) -> NodeId {
        self.alloc(scope, NodeData::Reference(Reference { name: name.into() }))
    }

    pub fn number(&mut self, scope: NodeId, value: NumberValue) -> NodeId {
        self.alloc(scope, NodeData::Number(Number { value }))
    }

    pub fn boolean(&mut self, scope: NodeId, value: bool) -> NodeId {
        self.alloc(scope, NodeData::BoolLit(value))
    }

    pub fn special(&mut self, scope: NodeId, value: SpecialLit) -> NodeId {
        self.alloc(scope, NodeData::Special(value))
    }

    pub fn string(&mut self, scope: NodeId, text: &str) -> NodeId {
        self.alloc(
            scope,
            NodeData::StringLit(StringLit {
                text: text.into(),
                inserts: Vec::new(),
            }),
        )
    }

    pub fn array_lit(&mut self, scope: NodeId, elements: Vec<NodeId>) -> NodeId {
        self.alloc(scope, NodeData::ArrayLit(crate::nodes::ArrayLit { elements }))
    }

    pub fn new_value(&mut self, scope: NodeId, type_spec: TypeSpec) -> NodeId {
        self.alloc(scope, NodeData::New(New { type_spec }))
    }

    pub fn parentheses(&mut self, scope: NodeId, body: NodeId) -> NodeId {
        self.alloc(scope, NodeData::Parentheses(Parentheses { body }))
    }

    pub fn call_op(&mut self, scope: NodeId, arguments: Vec<NodeId>) -> NodeId {
        let names = vec![None; arguments.len()];
        self.alloc(scope, NodeData::Call(Call { arguments, names }))
    }

    pub fn call_op_named(
        &mut self,
        scope: NodeId,
        arguments: Vec<NodeId>,
        names: Vec<Option<String>>,
    ) -> NodeId {
        assert_eq!(arguments.len(), names.len());
        self.alloc(scope, NodeData::Call(Call { arguments, names }))
    }

    pub fn dot_op(&mut self, scope: NodeId, name: &str) -> NodeId {
        let member = self.reference(scope, name);
        let id = self.alloc(scope, NodeData::Dot(Dot { member }));
        self.arena.get_mut(member).parent = Some(id);
        id
    }

    pub fn index_op(&mut self, scope: NodeId, index: NodeId) -> NodeId {
        self.alloc(scope, NodeData::Index(Index { index }))
    }

    pub fn ternary_op(&mut self, scope: NodeId, on_true: NodeId, on_false: NodeId) -> NodeId {
        self.alloc(scope, NodeData::Ternary(Ternary { on_true, on_false }))
    }

    pub fn as_op(&mut self, scope: NodeId, type_spec: TypeSpec) -> NodeId {
        self.alloc(scope, NodeData::As(As { type_spec }))
    }

    pub fn unary_op(&mut self, scope: NodeId, op: UnaryOp) -> NodeId {
        self.alloc(scope, NodeData::Unary(Unary { op }))
    }

    pub fn operator(&mut self, scope: NodeId, op: BinaryOp) -> NodeId {
        self.alloc(scope, NodeData::Operator(Operator { op }))
    }

    // ------------------------------------------------------------------
    // Tree shorthands
    // ------------------------------------------------------------------

    /// `name` as a noun tree.
    pub fn tree_ref(&mut self, scope: NodeId, name: &str) -> ExprTree {
        let id = self.reference(scope, name);
        ExprTree::Noun(id)
    }

    pub fn tree_int(&mut self, scope: NodeId, value: i64) -> ExprTree {
        let id = self.number(scope, NumberValue::Signed(value));
        ExprTree::Noun(id)
    }

    pub fn tree_uint(&mut self, scope: NodeId, value: u64) -> ExprTree {
        let id = self.number(scope, NumberValue::Unsigned(value));
        ExprTree::Noun(id)
    }

    pub fn tree_float(&mut self, scope: NodeId, value: f64) -> ExprTree {
        let id = self.number(scope, NumberValue::Float(value));
        ExprTree::Noun(id)
    }

    pub fn tree_call(&mut self, scope: NodeId, target: ExprTree, arguments: Vec<NodeId>) -> ExprTree {
        let op = self.call_op(scope, arguments);
        ExprTree::Operation {
            a: Box::new(target),
            op,
        }
    }

    pub fn tree_dot(&mut self, scope: NodeId, target: ExprTree, name: &str) -> ExprTree {
        let op = self.dot_op(scope, name);
        ExprTree::Operation {
            a: Box::new(target),
            op,
        }
    }

    pub fn tree_index(&mut self, scope: NodeId, target: ExprTree, index: NodeId) -> ExprTree {
        let op = self.index_op(scope, index);
        ExprTree::Operation {
            a: Box::new(target),
            op,
        }
    }

    pub fn tree_unary(&mut self, scope: NodeId, op: UnaryOp, target: ExprTree) -> ExprTree {
        let op = self.unary_op(scope, op);
        ExprTree::Operation {
            a: Box::new(target),
            op,
        }
    }

    pub fn tree_binary(&mut self, scope: NodeId, op: BinaryOp, a: ExprTree, b: ExprTree) -> ExprTree {
        let op = self.operator(scope, op);
        ExprTree::Combinator {
            a: Box::new(a),
            b: Box::new(b),
            op,
        }
    }
}

impl Default for AstFactory {
    fn default() -> Self {
        Self::new()
    }
}
