//! Recursive-descent parser for the component language, JSX included.
//!
//! JSX is scanned in raw character mode straight off the lexer and lowered to
//! `React.createElement` calls as each element closes.

use super::ast::*;
use super::error::CompileError;
use super::lexer::{is_ident_start, Lexer, Token, TokenKind};
use super::transform::{jsx_text, lower_element, JsxAttr, JsxChild, JsxElement};
use super::value::number_to_string;
use super::{STACK_RED_ZONE, STACK_SEGMENT};
use std::rc::Rc;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "finally", "for", "function", "if", "import", "in",
    "instanceof", "new", "return", "super", "switch", "this", "throw", "try", "typeof", "var",
    "void", "while", "with", "yield", "true", "false", "null", "let", "await",
];

fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Parse a whole module.
pub fn parse_program(src: &str) -> Result<Program, CompileError> {
    let mut parser = Parser::new(src, 0, src.len())?;
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.parse_statement()?);
    }
    Ok(Program { body })
}

enum BinaryKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Statements, expressions and JSX elements may nest this deep.
pub const MAX_NESTING: usize = 256;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    tok: Token,
    /// `in` is not a binary operator inside a `for (...;` head.
    no_in: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, start: usize, end: usize) -> Result<Self, CompileError> {
        let mut lexer = Lexer::with_range(src, start, end);
        let tok = lexer.next_token()?;
        Ok(Self {
            lexer,
            tok,
            no_in: false,
            depth: 0,
        })
    }

    /// Run one level of recursive descent, refusing to go past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_at(self.tok.start, "Nesting too deep"));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || parse(self));
        self.depth -= 1;
        result
    }

    fn at_eof(&self) -> bool {
        self.tok.kind == TokenKind::Eof
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> CompileError {
        CompileError::syntax(self.lexer.src(), offset, message)
    }

    fn unexpected(&self) -> CompileError {
        let message = match self.tok.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            _ => format!("Unexpected token {}", self.tok.describe()),
        };
        self.error_at(self.tok.start, message)
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.tok, next))
    }

    fn resync(&mut self) -> Result<(), CompileError> {
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn is(&self, p: &str) -> bool {
        self.tok.is_punct(p)
    }

    fn eat(&mut self, p: &str) -> Result<bool, CompileError> {
        if self.is(p) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, p: &str) -> Result<(), CompileError> {
        if self.eat(p)? {
            Ok(())
        } else if self.at_eof() {
            Err(self.error_at(self.tok.start, format!("Unexpected end of input; expected '{}'", p)))
        } else {
            Err(self.error_at(
                self.tok.start,
                format!("Unexpected token {}; expected '{}'", self.tok.describe(), p),
            ))
        }
    }

    fn is_kw(&self, kw: &str) -> bool {
        self.tok.is_ident(kw)
    }

    fn eat_kw(&mut self, kw: &str) -> Result<bool, CompileError> {
        if self.is_kw(kw) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn peek(&self) -> Result<Token, CompileError> {
        self.lexer.clone().next_token()
    }

    fn expect_ident(&mut self) -> Result<Name, CompileError> {
        match &self.tok.kind {
            TokenKind::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.error_at(
                self.tok.start,
                format!("Unexpected token {}; expected identifier", self.tok.describe()),
            )),
        }
    }

    /// Any identifier, reserved words included (`obj.default`, `{ new: 1 }`).
    fn expect_property_name(&mut self) -> Result<Name, CompileError> {
        match &self.tok.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.error_at(
                self.tok.start,
                format!("Unexpected token {}; expected property name", self.tok.describe()),
            )),
        }
    }

    fn consume_semicolon(&mut self) -> Result<(), CompileError> {
        if self.eat(";")? {
            return Ok(());
        }
        if self.is("}") || self.at_eof() || self.tok.newline_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    // Statements

    fn parse_statement(&mut self) -> Result<Stmt, CompileError> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> Result<Stmt, CompileError> {
        if self.is("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.eat(";")? {
            return Ok(Stmt::Empty);
        }
        if let TokenKind::Ident(name) = &self.tok.kind {
            match &**name {
                "const" => return self.parse_declaration(DeclKind::Const),
                "let" => return self.parse_declaration(DeclKind::Let),
                "var" => return self.parse_declaration(DeclKind::Var),
                "function" => {
                    self.advance()?;
                    return Ok(Stmt::Function(self.parse_function_rest(true)?));
                }
                "if" => return self.parse_if(),
                "for" => return self.parse_for(),
                "while" => {
                    self.advance()?;
                    self.expect("(")?;
                    let test = self.parse_expression()?;
                    self.expect(")")?;
                    let body = Box::new(self.parse_statement()?);
                    return Ok(Stmt::While { test, body });
                }
                "do" => {
                    self.advance()?;
                    let body = Box::new(self.parse_statement()?);
                    if !self.eat_kw("while")? {
                        return Err(self.unexpected());
                    }
                    self.expect("(")?;
                    let test = self.parse_expression()?;
                    self.expect(")")?;
                    self.eat(";")?;
                    return Ok(Stmt::DoWhile { body, test });
                }
                "return" => {
                    self.advance()?;
                    let value = if self.is(";")
                        || self.is("}")
                        || self.at_eof()
                        || self.tok.newline_before
                    {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    self.consume_semicolon()?;
                    return Ok(Stmt::Return(value));
                }
                "break" => {
                    self.advance()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Break);
                }
                "continue" => {
                    self.advance()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Continue);
                }
                "throw" => {
                    let at = self.advance()?.start;
                    if self.tok.newline_before {
                        return Err(self.error_at(at, "Illegal newline after throw"));
                    }
                    let value = self.parse_expression()?;
                    self.consume_semicolon()?;
                    return Ok(Stmt::Throw(value));
                }
                "try" => return self.parse_try(),
                "switch" => return self.parse_switch(),
                "import" => {
                    return Err(self.error_at(
                        self.tok.start,
                        "import declarations are not supported; React and the hooks are already in scope",
                    ))
                }
                "export" => {
                    self.advance()?;
                    self.eat_kw("default")?;
                    return self.parse_statement();
                }
                "class" => {
                    return Err(self.error_at(self.tok.start, "class declarations are not supported"))
                }
                "async" => {
                    return Err(self.error_at(self.tok.start, "async functions are not supported"))
                }
                _ => {}
            }
        }
        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect("{")?;
        let mut body = Vec::new();
        while !self.is("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(body)
    }

    fn decl_kind(&self) -> Option<DeclKind> {
        match &self.tok.kind {
            TokenKind::Ident(name) => match &**name {
                "const" => Some(DeclKind::Const),
                "let" => Some(DeclKind::Let),
                "var" => Some(DeclKind::Var),
                _ => None,
            },
            _ => None,
        }
    }

    fn parse_declaration(&mut self, kind: DeclKind) -> Result<Stmt, CompileError> {
        self.advance()?;
        let decls = self.parse_declarators(kind, None)?;
        self.consume_semicolon()?;
        Ok(Stmt::Decl { kind, decls })
    }

    fn parse_declarators(
        &mut self,
        kind: DeclKind,
        first: Option<Pattern>,
    ) -> Result<Vec<(Pattern, Option<Expr>)>, CompileError> {
        let mut decls = Vec::new();
        let mut pending = first;
        loop {
            let at = self.tok.start;
            let pattern = match pending.take() {
                Some(p) => p,
                None => self.parse_binding_pattern()?,
            };
            let init = if self.eat("=")? {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if init.is_none() && (kind == DeclKind::Const || !matches!(pattern, Pattern::Ident(_)))
            {
                return Err(self.error_at(at, "Missing initializer in declaration"));
            }
            decls.push((pattern, init));
            if !self.eat(",")? {
                return Ok(decls);
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        self.advance()?;
        self.expect("(")?;
        let test = self.parse_expression()?;
        self.expect(")")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat_kw("else")? {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, CompileError> {
        self.advance()?;
        self.expect("(")?;

        let init = if self.is(";") {
            None
        } else if let Some(kind) = self.decl_kind() {
            self.advance()?;
            let pattern = self.parse_binding_pattern()?;
            if self.eat_kw("of")? {
                let iterable = self.parse_assignment()?;
                self.expect(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::ForOf {
                    kind,
                    pattern,
                    iterable,
                    body,
                });
            }
            if self.eat_kw("in")? {
                let object = self.parse_expression()?;
                self.expect(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Stmt::ForIn {
                    kind,
                    pattern,
                    object,
                    body,
                });
            }
            self.no_in = true;
            let decls = self.parse_declarators(kind, Some(pattern));
            self.no_in = false;
            Some(Box::new(Stmt::Decl {
                kind,
                decls: decls?,
            }))
        } else {
            self.no_in = true;
            let expr = self.parse_expression();
            self.no_in = false;
            Some(Box::new(Stmt::Expr(expr?)))
        };

        self.expect(";")?;
        let test = if self.is(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(";")?;
        let update = if self.is(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, CompileError> {
        let at = self.advance()?.start;
        let block = self.parse_block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat_kw("catch")? {
            if self.eat("(")? {
                param = Some(self.parse_binding_pattern()?);
                self.expect(")")?;
            }
            handler = Some(self.parse_block()?);
        }
        let finalizer = if self.eat_kw("finally")? {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_at(at, "Missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt, CompileError> {
        self.advance()?;
        self.expect("(")?;
        let discriminant = self.parse_expression()?;
        self.expect(")")?;
        self.expect("{")?;
        let mut cases = Vec::new();
        while !self.eat("}")? {
            let test = if self.eat_kw("case")? {
                Some(self.parse_expression()?)
            } else if self.eat_kw("default")? {
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(":")?;
            let mut body = Vec::new();
            while !(self.is_kw("case") || self.is_kw("default") || self.is("}")) {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    // Functions and patterns

    /// After the `function` keyword.
    fn parse_function_rest(&mut self, require_name: bool) -> Result<Rc<FunctionDef>, CompileError> {
        let name = match &self.tok.kind {
            TokenKind::Ident(n) if !is_reserved(n) => Some(self.expect_ident()?),
            _ if require_name => return Err(self.error_at(self.tok.start, "Function statements require a name")),
            _ => None,
        };
        let (params, rest) = self.parse_params()?;
        let body = FunctionBody::Block(self.parse_block()?);
        Ok(Rc::new(FunctionDef {
            name,
            params,
            rest,
            body,
        }))
    }

    fn parse_params(&mut self) -> Result<(Vec<PatternElem>, Option<Pattern>), CompileError> {
        self.expect("(")?;
        let mut params = Vec::new();
        let mut rest = None;
        while !self.eat(")")? {
            if self.eat("...")? {
                rest = Some(self.parse_binding_pattern()?);
                self.eat(",")?;
                self.expect(")")?;
                break;
            }
            params.push(self.parse_pattern_elem()?);
            if !self.eat(",")? {
                self.expect(")")?;
                break;
            }
        }
        Ok((params, rest))
    }

    fn parse_pattern_elem(&mut self) -> Result<PatternElem, CompileError> {
        let pattern = self.parse_binding_pattern()?;
        let default = if self.eat("=")? {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        Ok(PatternElem { pattern, default })
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern, CompileError> {
        if self.eat("{")? {
            let mut props = Vec::new();
            let mut rest = None;
            while !self.eat("}")? {
                if self.eat("...")? {
                    rest = Some(self.expect_ident()?);
                    self.eat(",")?;
                    self.expect("}")?;
                    break;
                }
                let key_at = self.tok.start;
                let (key, shorthand) = match self.tok.kind.clone() {
                    TokenKind::Ident(name) => {
                        self.advance()?;
                        (PropKey::Named(name.clone()), Some(name))
                    }
                    TokenKind::Str(s) => {
                        self.advance()?;
                        (PropKey::Named(s), None)
                    }
                    TokenKind::Number(n) => {
                        self.advance()?;
                        (PropKey::Named(number_to_string(n).into()), None)
                    }
                    TokenKind::Punct("[") => {
                        self.advance()?;
                        let expr = self.parse_assignment()?;
                        self.expect("]")?;
                        (PropKey::Computed(Box::new(expr)), None)
                    }
                    _ => return Err(self.unexpected()),
                };
                let elem = if self.eat(":")? {
                    self.parse_pattern_elem()?
                } else {
                    let name = match shorthand {
                        Some(name) if !is_reserved(&name) => name,
                        _ => return Err(self.error_at(key_at, "Invalid destructuring target")),
                    };
                    let default = if self.eat("=")? {
                        Some(self.parse_assignment()?)
                    } else {
                        None
                    };
                    PatternElem {
                        pattern: Pattern::Ident(name),
                        default,
                    }
                };
                props.push((key, elem));
                if !self.eat(",")? {
                    self.expect("}")?;
                    break;
                }
            }
            return Ok(Pattern::Object { props, rest });
        }

        if self.eat("[")? {
            let mut elems = Vec::new();
            let mut rest = None;
            while !self.eat("]")? {
                if self.eat(",")? {
                    elems.push(None);
                    continue;
                }
                if self.eat("...")? {
                    rest = Some(Box::new(self.parse_binding_pattern()?));
                    self.eat(",")?;
                    self.expect("]")?;
                    break;
                }
                elems.push(Some(self.parse_pattern_elem()?));
                if !self.eat(",")? {
                    self.expect("]")?;
                    break;
                }
            }
            return Ok(Pattern::Array { elems, rest });
        }

        Ok(Pattern::Ident(self.expect_ident()?))
    }

    // Expressions

    pub fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        let first = self.parse_assignment()?;
        if !self.is(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(",")? {
            exprs.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn parse_assignment(&mut self) -> Result<Expr, CompileError> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expr, CompileError> {
        if self.is_arrow_start()? {
            return self.parse_arrow();
        }
        let start = self.tok.start;
        let left = self.parse_conditional()?;
        let op = match &self.tok.kind {
            TokenKind::Punct(p) => assign_op(p),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        if !left.is_assignable() {
            return Err(self.error_at(start, "Invalid left-hand side in assignment"));
        }
        self.advance()?;
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(left),
            value: Box::new(value),
        })
    }

    fn is_arrow_start(&self) -> Result<bool, CompileError> {
        match &self.tok.kind {
            TokenKind::Ident(name) if !is_reserved(name) && &**name != "async" => {
                Ok(self.peek()?.is_punct("=>"))
            }
            TokenKind::Punct("(") => {
                let mut scan = self.lexer.clone();
                let mut depth = 1usize;
                loop {
                    let Ok(tok) = scan.next_token() else {
                        return Ok(false);
                    };
                    match tok.kind {
                        TokenKind::Eof => return Ok(false),
                        TokenKind::Punct("(" | "[" | "{") => depth += 1,
                        TokenKind::Punct(")" | "]" | "}") => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                Ok(scan.next_token().is_ok_and(|t| t.is_punct("=>")))
            }
            _ => Ok(false),
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr, CompileError> {
        let (params, rest) = if self.is("(") {
            self.parse_params()?
        } else {
            let name = self.expect_ident()?;
            (
                vec![PatternElem {
                    pattern: Pattern::Ident(name),
                    default: None,
                }],
                None,
            )
        };
        self.expect("=>")?;
        let saved = self.no_in;
        self.no_in = false;
        let body = if self.is("{") {
            self.parse_block().map(FunctionBody::Block)
        } else {
            self.parse_assignment()
                .map(|e| FunctionBody::Expr(Box::new(e)))
        };
        self.no_in = saved;
        Ok(Expr::Arrow(Rc::new(FunctionDef {
            name: None,
            params,
            rest,
            body: body?,
        })))
    }

    fn parse_conditional(&mut self) -> Result<Expr, CompileError> {
        let test = self.parse_binary(1)?;
        if !self.eat("?")? {
            return Ok(test);
        }
        let saved = self.no_in;
        self.no_in = false;
        let consequent = self.parse_assignment();
        self.no_in = saved;
        let consequent = consequent?;
        self.expect(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(consequent),
            Box::new(alternate),
        ))
    }

    fn binary_info(&self) -> Option<(u8, BinaryKind)> {
        use BinaryKind::{Binary, Logical};
        let info = match &self.tok.kind {
            TokenKind::Punct(p) => match *p {
                "??" => (1, Logical(LogicalOp::Nullish)),
                "||" => (1, Logical(LogicalOp::Or)),
                "&&" => (2, Logical(LogicalOp::And)),
                "|" => (3, Binary(BinaryOp::BitOr)),
                "^" => (4, Binary(BinaryOp::BitXor)),
                "&" => (5, Binary(BinaryOp::BitAnd)),
                "==" => (6, Binary(BinaryOp::Eq)),
                "!=" => (6, Binary(BinaryOp::NotEq)),
                "===" => (6, Binary(BinaryOp::StrictEq)),
                "!==" => (6, Binary(BinaryOp::StrictNotEq)),
                "<" => (7, Binary(BinaryOp::Lt)),
                ">" => (7, Binary(BinaryOp::Gt)),
                "<=" => (7, Binary(BinaryOp::LtEq)),
                ">=" => (7, Binary(BinaryOp::GtEq)),
                "<<" => (8, Binary(BinaryOp::Shl)),
                ">>" => (8, Binary(BinaryOp::Shr)),
                ">>>" => (8, Binary(BinaryOp::UShr)),
                "+" => (9, Binary(BinaryOp::Add)),
                "-" => (9, Binary(BinaryOp::Sub)),
                "*" => (10, Binary(BinaryOp::Mul)),
                "/" => (10, Binary(BinaryOp::Div)),
                "%" => (10, Binary(BinaryOp::Rem)),
                "**" => (11, Binary(BinaryOp::Exp)),
                _ => return None,
            },
            TokenKind::Ident(name) if &**name == "in" && !self.no_in => (7, Binary(BinaryOp::In)),
            _ => return None,
        };
        Some(info)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let mut left = self.parse_unary()?;
        while let Some((prec, kind)) = self.binary_info() {
            if prec < min_prec {
                break;
            }
            self.advance()?;
            let right_assoc = matches!(kind, BinaryKind::Binary(BinaryOp::Exp));
            let next = if right_assoc { prec } else { prec + 1 };
            let right = self.nested(|parser| parser.parse_binary(next))?;
            left = match kind {
                BinaryKind::Binary(op) => Expr::Binary(op, Box::new(left), Box::new(right)),
                BinaryKind::Logical(op) => Expr::Logical(op, Box::new(left), Box::new(right)),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match &self.tok.kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("~") => Some(UnaryOp::BitNot),
            TokenKind::Ident(n) if &**n == "typeof" => Some(UnaryOp::TypeOf),
            TokenKind::Ident(n) if &**n == "void" => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance()?;
            let arg = self.nested(Self::parse_unary)?;
            return Ok(Expr::Unary(op, Box::new(arg)));
        }
        if self.is_kw("delete") {
            self.advance()?;
            let at = self.tok.start;
            let target = self.nested(Self::parse_unary)?;
            if !matches!(target, Expr::Member { .. }) {
                return Err(self.error_at(at, "delete is only supported on properties"));
            }
            return Ok(Expr::Delete(Box::new(target)));
        }
        if self.is("++") || self.is("--") {
            let increment = self.is("++");
            self.advance()?;
            let at = self.tok.start;
            let target = self.nested(Self::parse_unary)?;
            if !target.is_assignable() {
                return Err(self.error_at(at, "Invalid left-hand side expression in prefix operation"));
            }
            return Ok(Expr::Update {
                increment,
                prefix: true,
                target: Box::new(target),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let at = self.tok.start;
        let expr = self.parse_lhs()?;
        if (self.is("++") || self.is("--")) && !self.tok.newline_before {
            if !expr.is_assignable() {
                return Err(self.error_at(at, "Invalid left-hand side expression in postfix operation"));
            }
            let increment = self.is("++");
            self.advance()?;
            return Ok(Expr::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn parse_lhs(&mut self) -> Result<Expr, CompileError> {
        let mut expr = if self.is_kw("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        let mut in_chain = false;
        loop {
            if self.eat(".")? {
                let name = self.expect_property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Named(name),
                    optional: false,
                };
            } else if self.eat("?.")? {
                in_chain = true;
                expr = if self.is("(") {
                    Expr::Call {
                        callee: Box::new(expr),
                        args: self.parse_arguments()?,
                        optional: true,
                    }
                } else if self.eat("[")? {
                    let property = self.parse_bracketed()?;
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(property)),
                        optional: true,
                    }
                } else {
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Named(self.expect_property_name()?),
                        optional: true,
                    }
                };
            } else if self.eat("[")? {
                let property = self.parse_bracketed()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Computed(Box::new(property)),
                    optional: false,
                };
            } else if self.is("(") {
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args: self.parse_arguments()?,
                    optional: false,
                };
            } else if matches!(self.tok.kind, TokenKind::Template(_)) && !self.tok.newline_before {
                return Err(self.error_at(self.tok.start, "Tagged templates are not supported"));
            } else {
                break;
            }
        }
        Ok(if in_chain {
            Expr::OptionalChain(Box::new(expr))
        } else {
            expr
        })
    }

    /// After `[`: an expression and the closing `]`.
    fn parse_bracketed(&mut self) -> Result<Expr, CompileError> {
        let saved = self.no_in;
        self.no_in = false;
        let expr = self.parse_expression();
        self.no_in = saved;
        let expr = expr?;
        self.expect("]")?;
        Ok(expr)
    }

    fn parse_new(&mut self) -> Result<Expr, CompileError> {
        self.advance()?;
        let mut callee = self.parse_primary()?;
        loop {
            if self.eat(".")? {
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberProp::Named(self.expect_property_name()?),
                    optional: false,
                };
            } else if self.eat("[")? {
                let property = self.parse_bracketed()?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberProp::Computed(Box::new(property)),
                    optional: false,
                };
            } else {
                break;
            }
        }
        let args = if self.is("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Arg>, CompileError> {
        self.expect("(")?;
        let saved = self.no_in;
        self.no_in = false;
        let args = self.parse_argument_list();
        self.no_in = saved;
        args
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Arg>, CompileError> {
        let mut args = Vec::new();
        while !self.eat(")")? {
            if self.eat("...")? {
                args.push(Arg::Spread(self.parse_assignment()?));
            } else {
                args.push(Arg::Item(self.parse_assignment()?));
            }
            if !self.eat(",")? {
                self.expect(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let tok = self.tok.clone();
        match tok.kind {
            TokenKind::Number(n) => {
                self.advance()?;
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance()?;
                Ok(Expr::Str(s))
            }
            TokenKind::Template(parts) => {
                self.advance()?;
                let exprs = parts
                    .exprs
                    .iter()
                    .map(|(start, end)| self.parse_embedded(*start, *end))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::Template {
                    quasis: parts.quasis.into_iter().map(Name::from).collect(),
                    exprs,
                })
            }
            TokenKind::Punct("(") => {
                self.advance()?;
                let saved = self.no_in;
                self.no_in = false;
                let expr = self.parse_expression();
                self.no_in = saved;
                let expr = expr?;
                self.expect(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => self.parse_array_literal(),
            TokenKind::Punct("{") => self.parse_object_literal(),
            TokenKind::Punct("<") | TokenKind::Punct("<<") | TokenKind::Punct("<=") => {
                self.parse_jsx()
            }
            TokenKind::Punct("/") | TokenKind::Punct("/=") => Err(self.error_at(
                tok.start,
                "Regular expression literals are not supported",
            )),
            TokenKind::Ident(name) => match &*name {
                "true" => {
                    self.advance()?;
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance()?;
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.advance()?;
                    Ok(Expr::Null)
                }
                "function" => {
                    self.advance()?;
                    Ok(Expr::Function(self.parse_function_rest(false)?))
                }
                "this" => Err(self.error_at(tok.start, "'this' is not supported in components")),
                "async" | "await" => Err(self.error_at(tok.start, "async functions are not supported")),
                "class" => Err(self.error_at(tok.start, "class expressions are not supported")),
                "import" => Err(self.error_at(tok.start, "dynamic import is not supported")),
                _ if is_reserved(&name) => Err(self.unexpected()),
                _ => {
                    self.advance()?;
                    Ok(Expr::Ident(name))
                }
            },
            _ => Err(self.unexpected()),
        }
    }

    fn parse_embedded(&self, start: usize, end: usize) -> Result<Expr, CompileError> {
        let mut sub = Parser::new(self.lexer.src(), start, end)?;
        sub.depth = self.depth;
        let expr = sub.parse_expression()?;
        if !sub.at_eof() {
            return Err(sub.unexpected());
        }
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> Result<Expr, CompileError> {
        self.advance()?;
        let saved = self.no_in;
        self.no_in = false;
        let elems = self.parse_array_elems();
        self.no_in = saved;
        Ok(Expr::Array(elems?))
    }

    fn parse_array_elems(&mut self) -> Result<Vec<ArrayElem>, CompileError> {
        let mut elems = Vec::new();
        while !self.eat("]")? {
            if self.eat(",")? {
                elems.push(ArrayElem::Hole);
                continue;
            }
            if self.eat("...")? {
                elems.push(ArrayElem::Spread(self.parse_assignment()?));
            } else {
                elems.push(ArrayElem::Item(self.parse_assignment()?));
            }
            if !self.eat(",")? {
                self.expect("]")?;
                break;
            }
        }
        Ok(elems)
    }

    fn parse_object_literal(&mut self) -> Result<Expr, CompileError> {
        self.advance()?;
        let saved = self.no_in;
        self.no_in = false;
        let props = self.parse_object_props();
        self.no_in = saved;
        Ok(Expr::Object(props?))
    }

    fn parse_object_props(&mut self) -> Result<Vec<ObjectProp>, CompileError> {
        let mut props = Vec::new();
        while !self.eat("}")? {
            if self.eat("...")? {
                props.push(ObjectProp::Spread(self.parse_assignment()?));
            } else {
                let key_at = self.tok.start;
                let (key, shorthand) = match self.tok.kind.clone() {
                    TokenKind::Ident(name) => {
                        self.advance()?;
                        (PropKey::Named(name.clone()), Some(name))
                    }
                    TokenKind::Str(s) => {
                        self.advance()?;
                        (PropKey::Named(s), None)
                    }
                    TokenKind::Number(n) => {
                        self.advance()?;
                        (PropKey::Named(number_to_string(n).into()), None)
                    }
                    TokenKind::Punct("[") => {
                        self.advance()?;
                        let expr = self.parse_bracketed()?;
                        (PropKey::Computed(Box::new(expr)), None)
                    }
                    _ => return Err(self.unexpected()),
                };
                if self.eat(":")? {
                    props.push(ObjectProp::KeyValue(key, self.parse_assignment()?));
                } else if self.is("(") {
                    let (params, rest) = self.parse_params()?;
                    let body = FunctionBody::Block(self.parse_block()?);
                    let name = match &key {
                        PropKey::Named(n) => Some(n.clone()),
                        PropKey::Computed(_) => None,
                    };
                    props.push(ObjectProp::KeyValue(
                        key,
                        Expr::Function(Rc::new(FunctionDef {
                            name,
                            params,
                            rest,
                            body,
                        })),
                    ));
                } else {
                    match shorthand {
                        Some(name) if !is_reserved(&name) => {
                            props.push(ObjectProp::KeyValue(key, Expr::Ident(name)))
                        }
                        _ => return Err(self.error_at(key_at, "Invalid shorthand property")),
                    }
                }
            }
            if !self.eat(",")? {
                self.expect("}")?;
                break;
            }
        }
        Ok(props)
    }

    // JSX

    fn parse_jsx(&mut self) -> Result<Expr, CompileError> {
        let start = self.tok.start;
        self.lexer.set_pos(start + 1);
        let element = self.parse_jsx_element(start)?;
        self.resync()?;
        Ok(lower_element(element))
    }

    /// Positioned just after `<`; leaves the lexer just after the final `>`.
    fn parse_jsx_element(&mut self, start: usize) -> Result<JsxElement, CompileError> {
        self.nested(|parser| parser.jsx_element(start))
    }

    fn jsx_element(&mut self, start: usize) -> Result<JsxElement, CompileError> {
        self.lexer.skip_jsx_whitespace();
        if self.lexer.peek_char() == Some('>') {
            self.lexer.bump_char();
            let children = self.parse_jsx_children(None, start)?;
            return Ok(JsxElement {
                name: None,
                attrs: Vec::new(),
                children,
            });
        }

        let name = self.lexer.scan_jsx_name();
        if name.is_empty() {
            return Err(self.error_at(self.lexer.pos(), "Expected JSX tag name"));
        }

        let mut attrs = Vec::new();
        loop {
            self.lexer.skip_jsx_whitespace();
            match self.lexer.peek_char() {
                Some('/') => {
                    self.lexer.bump_char();
                    self.lexer.skip_jsx_whitespace();
                    if self.lexer.bump_char() != Some('>') {
                        return Err(self.error_at(self.lexer.pos(), "Expected '>' after '/' in JSX tag"));
                    }
                    return Ok(JsxElement {
                        name: Some(name),
                        attrs,
                        children: Vec::new(),
                    });
                }
                Some('>') => {
                    self.lexer.bump_char();
                    let children = self.parse_jsx_children(Some(&name), start)?;
                    return Ok(JsxElement {
                        name: Some(name),
                        attrs,
                        children,
                    });
                }
                Some('{') => {
                    self.lexer.bump_char();
                    self.resync()?;
                    self.expect("...")?;
                    let expr = self.parse_assignment()?;
                    self.close_jsx_expression()?;
                    attrs.push(JsxAttr::Spread(expr));
                }
                Some(c) if is_ident_start(c) => {
                    let attr = self.lexer.scan_jsx_name();
                    self.lexer.skip_jsx_whitespace();
                    let value = if self.lexer.peek_char() == Some('=') {
                        self.lexer.bump_char();
                        self.lexer.skip_jsx_whitespace();
                        match self.lexer.peek_char() {
                            Some('"') | Some('\'') => Expr::Str(self.lexer.scan_jsx_attr_string()?.into()),
                            Some('{') => {
                                self.lexer.bump_char();
                                self.resync()?;
                                let expr = self.parse_assignment()?;
                                self.close_jsx_expression()?;
                                expr
                            }
                            Some('<') => {
                                let at = self.lexer.pos();
                                self.lexer.bump_char();
                                lower_element(self.parse_jsx_element(at)?)
                            }
                            _ => {
                                return Err(self.error_at(self.lexer.pos(), "Expected JSX attribute value"))
                            }
                        }
                    } else {
                        Expr::Bool(true)
                    };
                    attrs.push(JsxAttr::Named(attr, value));
                }
                None => {
                    return Err(self.error_at(start, format!("Unterminated JSX element <{}>", name)))
                }
                Some(c) => {
                    return Err(self.error_at(
                        self.lexer.pos(),
                        format!("Unexpected character '{}' in JSX tag <{}>", c, name),
                    ))
                }
            }
        }
    }

    fn close_jsx_expression(&mut self) -> Result<(), CompileError> {
        if !self.is("}") {
            return Err(self.error_at(
                self.tok.start,
                format!("Unexpected token {}; expected '}}' to close JSX expression", self.tok.describe()),
            ));
        }
        self.lexer.set_pos(self.tok.end);
        Ok(())
    }

    fn parse_jsx_children(
        &mut self,
        name: Option<&str>,
        start: usize,
    ) -> Result<Vec<JsxChild>, CompileError> {
        let mut children = Vec::new();
        loop {
            let raw = self.lexer.scan_jsx_text();
            if let Some(text) = jsx_text(&raw) {
                children.push(JsxChild::Text(text));
            }
            match self.lexer.peek_char() {
                None => {
                    return Err(self.error_at(
                        start,
                        format!("Unterminated JSX element <{}>", name.unwrap_or("")),
                    ))
                }
                Some('{') => {
                    self.lexer.bump_char();
                    self.resync()?;
                    if self.is("}") {
                        // empty container or comment
                    } else if self.eat("...")? {
                        children.push(JsxChild::Spread(self.parse_expression()?));
                    } else {
                        children.push(JsxChild::Expr(self.parse_expression()?));
                    }
                    self.close_jsx_expression()?;
                }
                Some(_) => {
                    let at = self.lexer.pos();
                    self.lexer.bump_char();
                    self.lexer.skip_jsx_whitespace();
                    if self.lexer.peek_char() == Some('/') {
                        self.lexer.bump_char();
                        self.lexer.skip_jsx_whitespace();
                        let closing = self.lexer.scan_jsx_name();
                        self.lexer.skip_jsx_whitespace();
                        if self.lexer.bump_char() != Some('>') {
                            return Err(self.error_at(self.lexer.pos(), "Expected '>' in JSX closing tag"));
                        }
                        let expected = name.unwrap_or("");
                        if closing != expected {
                            return Err(self.error_at(
                                at,
                                format!("Expected corresponding JSX closing tag for <{}>", expected),
                            ));
                        }
                        return Ok(children);
                    }
                    children.push(JsxChild::Element(self.parse_jsx_element(at)?));
                }
            }
        }
    }
}

fn assign_op(p: &str) -> Option<AssignOp> {
    let op = match p {
        "=" => AssignOp::Assign,
        "+=" => AssignOp::Arith(BinaryOp::Add),
        "-=" => AssignOp::Arith(BinaryOp::Sub),
        "*=" => AssignOp::Arith(BinaryOp::Mul),
        "/=" => AssignOp::Arith(BinaryOp::Div),
        "%=" => AssignOp::Arith(BinaryOp::Rem),
        "**=" => AssignOp::Arith(BinaryOp::Exp),
        "&=" => AssignOp::Arith(BinaryOp::BitAnd),
        "|=" => AssignOp::Arith(BinaryOp::BitOr),
        "^=" => AssignOp::Arith(BinaryOp::BitXor),
        "<<=" => AssignOp::Arith(BinaryOp::Shl),
        ">>=" => AssignOp::Arith(BinaryOp::Shr),
        ">>>=" => AssignOp::Arith(BinaryOp::UShr),
        "&&=" => AssignOp::Logical(LogicalOp::And),
        "||=" => AssignOp::Logical(LogicalOp::Or),
        "??=" => AssignOp::Logical(LogicalOp::Nullish),
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        parse_program(src).unwrap_or_else(|e| panic!("{}", e))
    }

    fn single_expr(src: &str) -> Expr {
        match parse(src).body.into_iter().next() {
            Some(Stmt::Expr(e)) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn parses_component_shapes() {
        let program = parse(
            r#"
            const LABEL = "Count";
            function Widget({ config, size = { w: 1 } }) {
              const [count, setCount] = useState(0);
              useEffect(() => { document.title = `${count}` }, [count]);
              for (let i = 0; i < 3; i++) { if (i in config) continue }
              for (const [k, v] of Object.entries(config)) {}
              return <div className="w">{LABEL}: {count}</div>
            }
            "#,
        );
        assert_eq!(program.body.len(), 2);
        assert!(matches!(program.body[1], Stmt::Function(_)));
    }

    #[test]
    fn arrow_detection() {
        assert!(matches!(single_expr("(a, b) => a + b"), Expr::Arrow(_)));
        assert!(matches!(single_expr("x => x * 2"), Expr::Arrow(_)));
        assert!(matches!(single_expr("({ a } = {}) => a"), Expr::Arrow(_)));
        assert!(matches!(single_expr("(a + b) * 2"), Expr::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn jsx_lowers_to_create_element() {
        let expr = single_expr(r#"<ul id="x" {...rest}>{items.map(i => <li key={i}>{i}</li>)}<br/></ul>"#);
        let Expr::Call { callee, args, .. } = expr else {
            panic!("expected call");
        };
        assert_eq!(callee.describe(), "React.createElement");
        assert_eq!(args.len(), 4);
        assert!(matches!(&args[0], Arg::Item(Expr::Str(tag)) if &**tag == "ul"));
        assert!(matches!(&args[1], Arg::Item(Expr::Object(props)) if props.len() == 2));
    }

    #[test]
    fn fragments_and_comments_in_jsx() {
        let expr = single_expr("<>\n  {/* note */}\n  <span>a</span>\n</>");
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        assert!(matches!(&args[0], Arg::Item(Expr::Member { .. })));
        assert!(matches!(&args[1], Arg::Item(Expr::Null)));
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn comparison_is_not_jsx() {
        assert!(matches!(single_expr("a < b"), Expr::Binary(BinaryOp::Lt, _, _)));
    }

    #[test]
    fn optional_chain_wraps_whole_chain() {
        let expr = single_expr("data?.items.length");
        assert!(matches!(expr, Expr::OptionalChain(_)));
    }

    #[test]
    fn rejects_imports_and_mismatched_tags() {
        let err = parse_program("import React from 'react';\nfunction Widget() {}").unwrap_err();
        assert!(err.to_string().contains("import declarations are not supported"));
        assert!(err.to_string().contains("line 1, column 1"));

        let err = parse_program("function Widget() { return <div><span></div> }").unwrap_err();
        assert!(err.to_string().contains("closing tag for <span>"));

        let err = parse_program("function Widget() {\n  return <div>\n}").unwrap_err();
        assert!(err.to_string().starts_with("SyntaxError"));
    }

    #[test]
    fn asi_and_return_newline() {
        let program = parse("let a = 1\nlet b = 2\nfunction f() { return\n a }");
        assert_eq!(program.body.len(), 3);
        assert!(parse_program("let a = 1 let b = 2").is_err());
    }
}
