//! Node payloads: one tagged sum per syntax category, discriminated by
//! [`NodeKind`].

use crate::arena::NodeId;
use crate::expr::{ExprTree, NumberValue, SpecialLit, UnaryOp};
use crate::typespec::TypeSpec;

/// The discriminant of a node payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Import,
    TypeDecl,
    Variable,
    Function,
    Code,
    Block,
    If,
    For,
    Assign,
    Statement,
    Expression,
    Insight,
    Reference,
    Number,
    StringLit,
    BoolLit,
    Special,
    ArrayLit,
    New,
    Parentheses,
    Call,
    Dot,
    Index,
    Ternary,
    As,
    Unary,
    Operator,
}

/// The payload of an AST node.
#[derive(Debug)]
pub enum NodeData {
    // Declarations
    Root(Root),
    Import(Import),
    TypeDecl(TypeDecl),
    Variable(Variable),
    Function(Function),

    // Statements
    Code(Code),
    Block(Block),
    If(If),
    For(For),
    Assign(Assign),
    Statement(Statement),
    Expression(Expression),
    Insight(Insight),

    // Expression nouns
    Reference(Reference),
    Number(Number),
    StringLit(StringLit),
    BoolLit(bool),
    Special(SpecialLit),
    ArrayLit(ArrayLit),
    New(New),
    Parentheses(Parentheses),

    // Expression modifiers / operators
    Call(Call),
    Dot(Dot),
    Index(Index),
    Ternary(Ternary),
    As(As),
    Unary(Unary),
    Operator(Operator),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Root(_) => NodeKind::Root,
            NodeData::Import(_) => NodeKind::Import,
            NodeData::TypeDecl(_) => NodeKind::TypeDecl,
            NodeData::Variable(_) => NodeKind::Variable,
            NodeData::Function(_) => NodeKind::Function,
            NodeData::Code(_) => NodeKind::Code,
            NodeData::Block(_) => NodeKind::Block,
            NodeData::If(_) => NodeKind::If,
            NodeData::For(_) => NodeKind::For,
            NodeData::Assign(_) => NodeKind::Assign,
            NodeData::Statement(_) => NodeKind::Statement,
            NodeData::Expression(_) => NodeKind::Expression,
            NodeData::Insight(_) => NodeKind::Insight,
            NodeData::Reference(_) => NodeKind::Reference,
            NodeData::Number(_) => NodeKind::Number,
            NodeData::StringLit(_) => NodeKind::StringLit,
            NodeData::BoolLit(_) => NodeKind::BoolLit,
            NodeData::Special(_) => NodeKind::Special,
            NodeData::ArrayLit(_) => NodeKind::ArrayLit,
            NodeData::New(_) => NodeKind::New,
            NodeData::Parentheses(_) => NodeKind::Parentheses,
            NodeData::Call(_) => NodeKind::Call,
            NodeData::Dot(_) => NodeKind::Dot,
            NodeData::Index(_) => NodeKind::Index,
            NodeData::Ternary(_) => NodeKind::Ternary,
            NodeData::As(_) => NodeKind::As,
            NodeData::Unary(_) => NodeKind::Unary,
            NodeData::Operator(_) => NodeKind::Operator,
        }
    }
}

/// Top of a file: declarations and imports in source order.
#[derive(Debug, Default)]
pub struct Root {
    pub children: Vec<NodeId>,
}

/// `import "path"` with an optional front-end kind (empty for kiln sources,
/// `"c"` for header imports).
#[derive(Debug)]
pub struct Import {
    pub path: String,
    pub kind: String,
}

/// A user-defined aggregate. Fields are `Variable` nodes with fixed types;
/// layout order equals source order.
#[derive(Debug)]
pub struct TypeDecl {
    pub name: String,
    pub fields: Vec<NodeId>,
}

/// A variable declaration: global, local, parameter, or field depending on
/// the parent node.
#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub mutable: bool,
    pub type_spec: Option<TypeSpec>,
    /// Initializer expression node, if any.
    pub value: Option<NodeId>,
    pub external: bool,
}

/// A function declaration. The signature is always present; the body is
/// absent for external declarations.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    /// `Variable` nodes, one per parameter, in order.
    pub parameters: Vec<NodeId>,
    pub return_spec: TypeSpec,
    pub external: bool,
    /// `Code` node.
    pub body: Option<NodeId>,
}

/// A statement scope: the children run in order.
#[derive(Debug, Default)]
pub struct Code {
    pub children: Vec<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Regular,
    /// An exit block: its body is spliced onto the enclosing scope's
    /// destructor chain instead of running inline.
    Exit,
}

#[derive(Debug)]
pub struct Block {
    pub kind: BlockKind,
    /// `Code` node.
    pub body: NodeId,
}

#[derive(Debug)]
pub struct If {
    /// Expression node.
    pub condition: NodeId,
    /// `Code` node.
    pub on_true: NodeId,
    /// `Code` node or a chained `If`.
    pub on_false: Option<NodeId>,
}

#[derive(Debug)]
pub struct For {
    /// Loop condition expression; `None` for an infinite loop.
    pub condition: Option<NodeId>,
    /// `Code` node.
    pub body: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug)]
pub struct Assign {
    pub op: AssignOp,
    /// Destination expression node.
    pub target: NodeId,
    /// Source expression node.
    pub value: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementOp {
    Return,
    Break,
    Continue,
}

#[derive(Debug)]
pub struct Statement {
    pub op: StatementOp,
    /// Return value expression, if any.
    pub value: Option<NodeId>,
}

/// A full expression in statement or operand position, carrying its
/// precedence-resolved tree.
#[derive(Debug)]
pub struct Expression {
    pub tree: ExprTree,
}

/// Compile-time type report: lowers its expression in analyze-only mode and
/// prints the inferred type.
#[derive(Debug)]
pub struct Insight {
    /// Expression node.
    pub value: NodeId,
}

/// A bare name, resolved lexically by the semantic layer.
#[derive(Debug)]
pub struct Reference {
    pub name: String,
}

#[derive(Debug)]
pub struct Number {
    pub value: NumberValue,
}

#[derive(Debug)]
pub struct StringLit {
    pub text: String,
    /// Interpolation points (byte position in `text` -> expression node).
    pub inserts: Vec<(usize, NodeId)>,
}

#[derive(Debug)]
pub struct ArrayLit {
    /// Expression nodes.
    pub elements: Vec<NodeId>,
}

/// `*T(...)` heap allocation of a type.
#[derive(Debug)]
pub struct New {
    pub type_spec: TypeSpec,
}

#[derive(Debug)]
pub struct Parentheses {
    /// Expression node.
    pub body: NodeId,
}

/// Call suffix: positional arguments plus an optional name per slot.
#[derive(Debug)]
pub struct Call {
    /// Expression nodes, one per argument.
    pub arguments: Vec<NodeId>,
    /// Parallel to `arguments`; `Some` for named arguments.
    pub names: Vec<Option<String>>,
}

impl Call {
    /// The `argument index -> name` map consumed by overload matching.
    pub fn named_indices(&self) -> Vec<(usize, String)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (i, n.clone())))
            .collect()
    }
}

/// Dot suffix: `.name` member access or UFCS call head.
#[derive(Debug)]
pub struct Dot {
    /// `Reference` node carrying the member name.
    pub member: NodeId,
}

/// Index suffix: `[expr]`.
#[derive(Debug)]
pub struct Index {
    /// Expression node.
    pub index: NodeId,
}

/// Ternary suffix: `cond ? a : b` applied to an already-lowered condition.
#[derive(Debug)]
pub struct Ternary {
    /// Expression node.
    pub on_true: NodeId,
    /// Expression node.
    pub on_false: NodeId,
}

/// Cast suffix: `as T`.
#[derive(Debug)]
pub struct As {
    pub type_spec: TypeSpec,
}

/// Unary prefix operator.
#[derive(Debug)]
pub struct Unary {
    pub op: UnaryOp,
}

/// Binary operator token between two combinator operands.
#[derive(Debug)]
pub struct Operator {
    pub op: crate::expr::BinaryOp,
}
