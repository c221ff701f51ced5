//! Recursive-descent parsing into the arena AST.

use kiln_ast::{
    ArraySpec, AssignOp, AstFactory, BinaryOp, BlockKind, ExprTree, FunctionSpecKind, NodeId,
    NumberValue, Primitive, SpecialLit, TypeSpec, UnaryOp,
};
use kiln_common::Span;

use crate::lexer::{Lexer, Token, TokenKind};

#[derive(Debug)]
pub struct ParseError {
    pub offset: u32,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub struct ParseOutput {
    pub arena: kiln_ast::Arena,
    pub root: NodeId,
}

/// Parse one source file.
pub fn parse(text: &str) -> Result<ParseOutput, ParseError> {
    let tokens = Lexer::new(text).tokenize().map_err(|e| ParseError {
        offset: e.offset,
        message: e.message,
    })?;

    let mut parser = Parser {
        tokens,
        pos: 0,
        f: AstFactory::new(),
    };

    parser.parse_root()?;

    let root = parser.f.root();
    Ok(ParseOutput {
        arena: parser.f.arena,
        root,
    })
}

const KEYWORDS: &[&str] = &[
    "import", "type", "extern", "let", "var", "return", "break", "continue", "if", "else", "for",
    "block", "exit", "insight", "as", "func", "shared", "true", "false", "null", "nothing", "any",
];

fn primitive_of(name: &str) -> Option<Primitive> {
    Some(match name {
        "any" => Primitive::Any,
        "null" => Primitive::Null,
        "nothing" => Primitive::Nothing,
        "bool" => Primitive::Bool,
        "byte" => Primitive::Byte,
        "short" => Primitive::Short,
        "int" => Primitive::Int,
        "long" => Primitive::Long,
        "ubyte" => Primitive::UByte,
        "ushort" => Primitive::UShort,
        "uint" => Primitive::UInt,
        "ulong" => Primitive::ULong,
        "float" => Primitive::Float,
        "double" => Primitive::Double,
        _ => return None,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    f: AstFactory,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("Expected {what}.")))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_ident() == Some(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            TokenKind::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.error(format!("Expected {what}."))),
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            offset: self.peek_span().start,
            message,
        }
    }

    fn spanned(&mut self, node: NodeId, start: Span) -> NodeId {
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        self.f.arena.get_mut(node).span = start.merge(end);
        node
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn parse_root(&mut self) -> Result<(), ParseError> {
        while !matches!(self.peek(), TokenKind::Eof) {
            let start = self.peek_span();

            if self.eat_keyword("import") {
                let path = match self.bump() {
                    TokenKind::Str(path) => path,
                    _ => return Err(self.error("Expected import path string.".into())),
                };
                let node = self.f.import(&path, "");
                self.spanned(node, start);
            } else if self.eat_keyword("type") {
                self.parse_type_decl(start)?;
            } else if self.eat_keyword("extern") {
                self.parse_function(start, true)?;
            } else if self.peek_ident() == Some("let") || self.peek_ident() == Some("var") {
                self.parse_global(start)?;
            } else {
                self.parse_function(start, false)?;
            }
        }

        Ok(())
    }

    fn parse_type_decl(&mut self, start: Span) -> Result<(), ParseError> {
        let name = self.expect_name("type name")?;
        let decl = self.f.type_shell(&name);

        self.expect(&TokenKind::LBrace, "{ after type name")?;

        while !self.eat(&TokenKind::RBrace) {
            let field_start = self.peek_span();
            let mutable = self.eat_keyword("var");
            let field_name = self.expect_name("field name")?;
            let spec = self.parse_typespec(decl)?;

            let field = self.f.add_field(decl, &field_name, spec, mutable);
            self.spanned(field, field_start);

            self.eat(&TokenKind::Comma);
        }

        self.spanned(decl, start);
        Ok(())
    }

    fn parse_global(&mut self, start: Span) -> Result<(), ParseError> {
        let mutable = self.eat_keyword("var");
        if !mutable {
            self.expect_keyword("let")?;
        }

        let name = self.expect_name("global name")?;
        let spec = self.parse_typespec(self.f.root())?;

        let node = self.f.global(&name, mutable, Some(spec), None);
        self.spanned(node, start);
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("Expected keyword {keyword}.")))
        }
    }

    fn parse_function(&mut self, start: Span, external: bool) -> Result<(), ParseError> {
        let name = self.expect_name("function name")?;
        let function = self.f.function_shell(&name);

        self.expect(&TokenKind::LParen, "( after function name")?;
        while !self.eat(&TokenKind::RParen) {
            let param_start = self.peek_span();
            let param_name = self.expect_name("parameter name")?;
            let spec = self.parse_typespec(function)?;

            let parameter = self.f.add_parameter(function, &param_name, spec);
            self.spanned(parameter, param_start);

            if !self.eat(&TokenKind::Comma) && self.peek() != &TokenKind::RParen {
                return Err(self.error("Expected , or ) in parameter list.".into()));
            }
        }

        if self.peek() != &TokenKind::LBrace && !matches!(self.peek(), TokenKind::Eof) {
            let spec = self.parse_typespec(function)?;
            self.f.set_return_spec(function, spec);
        }

        if external {
            self.f.set_external(function);
        } else {
            let body = self.f.add_body(function);
            self.expect(&TokenKind::LBrace, "{ to open function body")?;
            self.parse_code(body)?;
        }

        self.spanned(function, start);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn parse_typespec(&mut self, scope: NodeId) -> Result<TypeSpec, ParseError> {
        match self.peek().clone() {
            TokenKind::Amp => {
                self.bump();
                let mutable = self.eat_keyword("var");
                let inner = self.parse_typespec(scope)?;
                Ok(TypeSpec::Reference {
                    value: Box::new(inner),
                    mutable,
                    kind: kiln_ast::ReferenceKind::Regular,
                })
            }
            TokenKind::Star => {
                self.bump();
                let shared = self.eat_keyword("shared");
                let immutable = self.eat_keyword("let");
                let inner = self.parse_typespec(scope)?;
                Ok(TypeSpec::Reference {
                    value: Box::new(inner),
                    mutable: !immutable,
                    kind: if shared {
                        kiln_ast::ReferenceKind::Shared
                    } else {
                        kiln_ast::ReferenceKind::Unique
                    },
                })
            }
            TokenKind::Question => {
                self.bump();
                let inner = self.parse_typespec(scope)?;
                Ok(TypeSpec::Optional {
                    value: Box::new(inner),
                    bubbles: false,
                })
            }
            TokenKind::Bang => {
                self.bump();
                let inner = self.parse_typespec(scope)?;
                Ok(TypeSpec::Optional {
                    value: Box::new(inner),
                    bubbles: true,
                })
            }
            TokenKind::LBracket => {
                self.bump();
                let inner = self.parse_typespec(scope)?;

                let kind = if self.eat(&TokenKind::ColonColon) {
                    ArraySpec::Iterable
                } else if self.eat(&TokenKind::Colon) {
                    if self.peek() == &TokenKind::RBracket {
                        ArraySpec::Unbounded
                    } else if let TokenKind::Int(n) = *self.peek() {
                        // A literal count right before the close is a
                        // fixed size; anything else is a runtime length.
                        if self.tokens[self.pos + 1].kind == TokenKind::RBracket {
                            self.bump();
                            ArraySpec::FixedSize(n)
                        } else {
                            let expr = self.parse_expression(scope)?;
                            ArraySpec::UnboundedSized(expr)
                        }
                    } else {
                        let expr = self.parse_expression(scope)?;
                        ArraySpec::UnboundedSized(expr)
                    }
                } else {
                    ArraySpec::VariableSize
                };

                self.expect(&TokenKind::RBracket, "] to close array type")?;
                Ok(TypeSpec::Array {
                    kind,
                    value: Box::new(inner),
                })
            }
            TokenKind::Ident(name) if name == "func" => {
                self.bump();
                self.eat_keyword("ptr");
                self.expect(&TokenKind::LParen, "( after func")?;

                let mut parameters = Vec::new();
                while !self.eat(&TokenKind::RParen) {
                    let spec = self.parse_typespec(scope)?;
                    parameters.push((String::new(), spec));

                    if !self.eat(&TokenKind::Comma) && self.peek() != &TokenKind::RParen {
                        return Err(self.error("Expected , or ) in function type.".into()));
                    }
                }

                let return_spec = self.parse_typespec(scope)?;
                Ok(TypeSpec::Function {
                    kind: FunctionSpecKind::Pointer,
                    parameters,
                    return_spec: Box::new(return_spec),
                })
            }
            TokenKind::Ident(name) => {
                self.bump();
                match primitive_of(&name) {
                    Some(p) => Ok(TypeSpec::Primitive(p)),
                    None => Ok(TypeSpec::Named(name)),
                }
            }
            _ => Err(self.error("Expected a type.".into())),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_code(&mut self, code: NodeId) -> Result<(), ParseError> {
        while !self.eat(&TokenKind::RBrace) {
            if matches!(self.peek(), TokenKind::Eof) {
                return Err(self.error("Expected } to close scope.".into()));
            }
            self.parse_statement(code)?;
        }
        Ok(())
    }

    fn parse_statement(&mut self, code: NodeId) -> Result<(), ParseError> {
        let start = self.peek_span();

        if self.peek_ident() == Some("let") || self.peek_ident() == Some("var") {
            let mutable = self.eat_keyword("var");
            if !mutable {
                self.expect_keyword("let")?;
            }

            let name = self.expect_name("variable name")?;

            let spec = if self.peek() != &TokenKind::Assign && self.starts_typespec() {
                Some(self.parse_typespec(code)?)
            } else {
                None
            };

            let value = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expression(code)?)
            } else {
                None
            };

            let node = self.f.local(code, &name, mutable, spec, value);
            self.spanned(node, start);
            return Ok(());
        }

        if self.eat_keyword("return") {
            let value = if self.starts_expression() {
                Some(self.parse_expression(code)?)
            } else {
                None
            };
            let node = self.f.ret(code, value);
            self.spanned(node, start);
            return Ok(());
        }

        if self.eat_keyword("break") {
            let node = self.f.brk(code);
            self.spanned(node, start);
            return Ok(());
        }

        if self.eat_keyword("continue") {
            let node = self.f.cont(code);
            self.spanned(node, start);
            return Ok(());
        }

        if self.eat_keyword("if") {
            return self.parse_if(code, start).map(|_| ());
        }

        if self.eat_keyword("for") {
            let condition = if self.peek() == &TokenKind::LBrace {
                None
            } else {
                Some(self.parse_expression(code)?)
            };

            let (node, body) = match condition {
                None => self.f.for_infinite(code),
                Some(condition) => self.f.for_while(code, condition),
            };

            self.expect(&TokenKind::LBrace, "{ to open loop body")?;
            self.parse_code(body)?;
            self.spanned(node, start);
            return Ok(());
        }

        if self.eat_keyword("block") {
            let (node, body) = self.f.block(code, BlockKind::Regular);
            self.expect(&TokenKind::LBrace, "{ to open block")?;
            self.parse_code(body)?;
            self.spanned(node, start);
            return Ok(());
        }

        if self.eat_keyword("exit") {
            let (node, body) = self.f.block(code, BlockKind::Exit);
            self.expect(&TokenKind::LBrace, "{ to open exit block")?;
            self.parse_code(body)?;
            self.spanned(node, start);
            return Ok(());
        }

        if self.eat_keyword("insight") {
            let value = self.parse_expression(code)?;
            let node = self.f.insight(code, value);
            self.spanned(node, start);
            return Ok(());
        }

        // Expression statement, possibly an assignment.
        let target = self.parse_expression(code)?;

        let op = match self.peek() {
            TokenKind::Assign => Some(AssignOp::Assign),
            TokenKind::PlusAssign => Some(AssignOp::Plus),
            TokenKind::MinusAssign => Some(AssignOp::Minus),
            TokenKind::StarAssign => Some(AssignOp::Multiply),
            TokenKind::SlashAssign => Some(AssignOp::Divide),
            TokenKind::PercentAssign => Some(AssignOp::Modulo),
            _ => None,
        };

        match op {
            Some(op) => {
                self.bump();
                let value = self.parse_expression(code)?;
                let node = self.f.assign(code, op, target, value);
                self.spanned(node, start);
            }
            None => {
                self.f.stmt(code, target);
            }
        }

        Ok(())
    }

    fn parse_if(&mut self, code: NodeId, start: Span) -> Result<NodeId, ParseError> {
        let condition = self.parse_expression(code)?;
        let (node, then_code) = self.f.if_stmt(code, condition);

        self.expect(&TokenKind::LBrace, "{ to open if body")?;
        self.parse_code(then_code)?;

        if self.eat_keyword("else") {
            let else_code = self.f.if_else(node);

            if self.eat_keyword("if") {
                // else-if chains nest as a scope holding one if.
                let inner_start = self.peek_span();
                self.parse_if(else_code, inner_start)?;
            } else {
                self.expect(&TokenKind::LBrace, "{ to open else body")?;
                self.parse_code(else_code)?;
            }
        }

        Ok(self.spanned(node, start))
    }

    fn starts_typespec(&self) -> bool {
        match self.peek() {
            TokenKind::Amp
            | TokenKind::Star
            | TokenKind::Question
            | TokenKind::Bang
            | TokenKind::LBracket => true,
            TokenKind::Ident(name) => {
                primitive_of(name).is_some()
                    || name == "func"
                    || !KEYWORDS.contains(&name.as_str())
            }
            _ => false,
        }
    }

    fn starts_expression(&self) -> bool {
        match self.peek() {
            TokenKind::Int(_)
            | TokenKind::UInt(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::Star
            | TokenKind::Amp
            | TokenKind::At
            | TokenKind::Bang
            | TokenKind::Minus => true,
            TokenKind::Ident(name) => match name.as_str() {
                "true" | "false" | "null" | "nothing" | "any" => true,
                other => !KEYWORDS.contains(&other),
            },
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Parse a full expression and wrap it into an `Expression` node.
    fn parse_expression(&mut self, scope: NodeId) -> Result<NodeId, ParseError> {
        let start = self.peek_span();
        let tree = self.parse_ternary(scope)?;
        let node = self.f.expression(scope, tree);
        Ok(self.spanned(node, start))
    }

    fn parse_ternary(&mut self, scope: NodeId) -> Result<ExprTree, ParseError> {
        let tree = self.parse_binary(scope)?;

        if self.eat(&TokenKind::Question) {
            let on_true = self.parse_expression(scope)?;
            self.expect(&TokenKind::Colon, ": in ternary")?;
            let on_false = self.parse_expression(scope)?;

            let op = self.f.ternary_op(scope, on_true, on_false);
            return Ok(ExprTree::Operation {
                a: Box::new(tree),
                op,
            });
        }

        Ok(tree)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        Some(match self.peek() {
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Percent => BinaryOp::Mod,
            TokenKind::Eq => BinaryOp::Equals,
            TokenKind::Ne => BinaryOp::NotEquals,
            TokenKind::Gt => BinaryOp::Greater,
            TokenKind::Ge => BinaryOp::GreaterEqual,
            TokenKind::Lt => BinaryOp::Lesser,
            TokenKind::Le => BinaryOp::LesserEqual,
            TokenKind::AmpAmp => BinaryOp::And,
            TokenKind::PipePipe => BinaryOp::Or,
            TokenKind::QuestionQuestion => BinaryOp::Fallback,
            _ => return None,
        })
    }

    fn parse_binary(&mut self, scope: NodeId) -> Result<ExprTree, ParseError> {
        let mut operands = vec![self.parse_unary(scope)?];
        let mut operators = Vec::new();

        while let Some(op) = self.binary_op() {
            self.bump();
            let node = self.f.operator(scope, op);
            operators.push((node, op));
            operands.push(self.parse_unary(scope)?);
        }

        Ok(kiln_ast::expr::resolve_precedence(operands, operators))
    }

    fn parse_unary(&mut self, scope: NodeId) -> Result<ExprTree, ParseError> {
        let prefix = match self.peek() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Negative),
            TokenKind::Amp => Some(UnaryOp::Reference),
            TokenKind::At => Some(UnaryOp::Fetch),
            _ => None,
        };

        if let Some(op) = prefix {
            self.bump();
            let inner = self.parse_unary(scope)?;
            let node = self.f.unary_op(scope, op);
            return Ok(ExprTree::Operation {
                a: Box::new(inner),
                op: node,
            });
        }

        let mut tree = self.parse_atom(scope)?;

        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.bump();
                    let (arguments, names) = self.parse_arguments(scope)?;
                    let op = self.f.call_op_named(scope, arguments, names);
                    tree = ExprTree::Operation {
                        a: Box::new(tree),
                        op,
                    };
                }
                TokenKind::Dot => {
                    self.bump();
                    let name = self.expect_name("member name")?;
                    let op = self.f.dot_op(scope, &name);
                    tree = ExprTree::Operation {
                        a: Box::new(tree),
                        op,
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.parse_expression(scope)?;
                    self.expect(&TokenKind::RBracket, "] to close index")?;
                    let op = self.f.index_op(scope, index);
                    tree = ExprTree::Operation {
                        a: Box::new(tree),
                        op,
                    };
                }
                TokenKind::Ident(name) if name == "as" => {
                    self.bump();
                    let spec = self.parse_typespec(scope)?;
                    let op = self.f.as_op(scope, spec);
                    tree = ExprTree::Operation {
                        a: Box::new(tree),
                        op,
                    };
                }
                _ => break,
            }
        }

        Ok(tree)
    }

    fn parse_arguments(
        &mut self,
        scope: NodeId,
    ) -> Result<(Vec<NodeId>, Vec<Option<String>>), ParseError> {
        let mut arguments = Vec::new();
        let mut names = Vec::new();

        while !self.eat(&TokenKind::RParen) {
            let name = match self.peek() {
                TokenKind::Ident(name)
                    if !KEYWORDS.contains(&name.as_str())
                        && self.tokens[self.pos + 1].kind == TokenKind::Colon =>
                {
                    let name = name.clone();
                    self.bump();
                    self.bump();
                    Some(name)
                }
                _ => None,
            };

            arguments.push(self.parse_expression(scope)?);
            names.push(name);

            if !self.eat(&TokenKind::Comma) && self.peek() != &TokenKind::RParen {
                return Err(self.error("Expected , or ) in argument list.".into()));
            }
        }

        Ok((arguments, names))
    }

    fn parse_atom(&mut self, scope: NodeId) -> Result<ExprTree, ParseError> {
        let start = self.peek_span();

        match self.peek().clone() {
            TokenKind::Int(v) => {
                self.bump();
                let node = self
                    .f
                    .number(scope, NumberValue::Signed(v as i64));
                Ok(ExprTree::Noun(self.spanned(node, start)))
            }
            TokenKind::UInt(v) => {
                self.bump();
                let node = self.f.number(scope, NumberValue::Unsigned(v));
                Ok(ExprTree::Noun(self.spanned(node, start)))
            }
            TokenKind::Float(v) => {
                self.bump();
                let node = self.f.number(scope, NumberValue::Float(v));
                Ok(ExprTree::Noun(self.spanned(node, start)))
            }
            TokenKind::Str(text) => {
                self.bump();
                let node = self.f.string(scope, &text);
                Ok(ExprTree::Noun(self.spanned(node, start)))
            }
            TokenKind::LParen => {
                self.bump();
                let body = self.parse_expression(scope)?;
                self.expect(&TokenKind::RParen, ") to close parentheses")?;
                let node = self.f.parentheses(scope, body);
                Ok(ExprTree::Noun(self.spanned(node, start)))
            }
            TokenKind::LBracket => {
                self.bump();
                let mut elements = Vec::new();
                while !self.eat(&TokenKind::RBracket) {
                    elements.push(self.parse_expression(scope)?);
                    if !self.eat(&TokenKind::Comma) && self.peek() != &TokenKind::RBracket {
                        return Err(self.error("Expected , or ] in array literal.".into()));
                    }
                }
                let node = self.f.array_lit(scope, elements);
                Ok(ExprTree::Noun(self.spanned(node, start)))
            }
            TokenKind::Star => {
                // `*T` in operand position allocates.
                self.bump();
                let spec = self.parse_typespec(scope)?;
                let node = self.f.new_value(scope, spec);
                Ok(ExprTree::Noun(self.spanned(node, start)))
            }
            TokenKind::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.bump();
                    let node = self.f.boolean(scope, name == "true");
                    Ok(ExprTree::Noun(self.spanned(node, start)))
                }
                "null" => {
                    self.bump();
                    let node = self.f.special(scope, SpecialLit::Null);
                    Ok(ExprTree::Noun(self.spanned(node, start)))
                }
                "nothing" => {
                    self.bump();
                    let node = self.f.special(scope, SpecialLit::Nothing);
                    Ok(ExprTree::Noun(self.spanned(node, start)))
                }
                "any" => {
                    self.bump();
                    let node = self.f.special(scope, SpecialLit::Any);
                    Ok(ExprTree::Noun(self.spanned(node, start)))
                }
                other if !KEYWORDS.contains(&other) => {
                    self.bump();
                    let node = self.f.reference(scope, &name);
                    Ok(ExprTree::Noun(self.spanned(node, start)))
                }
                _ => Err(self.error(format!("Unexpected keyword {name} in expression."))),
            },
            _ => Err(self.error("Expected an expression.".into())),
        }
    }
}

#[cfg(test)]
#[path = "tests/parser_tests.rs"]
mod tests;
