//! The precedence-climbing parser.
//!
//! Eleven-and-a-bit precedence levels, tightest first: member access and
//! bracketed forms at level 11 down to the assignment family at level 0.
//! Every malformed construct produces one diagnostic and a placeholder node,
//! and parsing continues to the end of the token stream so one run surfaces
//! every syntax problem.

use crate::parser::precedence::PrecedenceParser;
use tracing::trace;
use umbra_ast::{ExprArena, ExprId, Opcode};
use umbra_tokens::{Diagnostic, DiagnosticSink, Spacing, Span, Spanned, Token, TokenKind};

pub mod precedence;

/// Parses a token stream into an expression tree rooted at a [Opcode::Scope]
/// node. Returns the root and whether parsing was free of syntax errors.
pub fn parse(
    tokens: &[Token],
    source: &str,
    module: &str,
    arena: &mut ExprArena,
    sink: &dyn DiagnosticSink,
) -> (ExprId, bool) {
    let mut parser = Parser {
        tokens,
        source,
        module,
        pos: 0,
        arena,
        sink,
        ok: true,
    };
    let root = parser.parse_root();
    trace!("parsed {} into {} nodes, ok={}", module, parser.arena.len(), parser.ok);
    (root, parser.ok)
}

struct Parser<'a> {
    tokens: &'a [Token],
    source: &'a str,
    module: &'a str,
    pos: usize,
    arena: &'a mut ExprArena,
    sink: &'a dyn DiagnosticSink,
    ok: bool,
}

impl<'a> Parser<'a> {
    // token plumbing

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.kind() == Some(kind)
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            self.advance()
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.check(kind) {
            self.advance()
        } else {
            self.error(format!("expected {what}"), self.current_span());
            None
        }
    }

    fn current_span(&self) -> Span {
        match self.peek() {
            Some(token) => token.span(),
            None => self
                .tokens
                .last()
                .map(|t| Span::empty(t.span().end()))
                .unwrap_or(Span::empty(0)),
        }
    }

    fn text(&self, token: &Token) -> &'a str {
        token.span().text(self.source)
    }

    fn error(&mut self, message: String, span: Span) {
        self.ok = false;
        self.sink.report(
            Diagnostic::error(message)
                .with_span(span)
                .with_module(self.module),
        );
    }

    fn placeholder(&mut self, span: Span) -> ExprId {
        self.arena.make_operation(Opcode::Placeholder, span)
    }

    // statements

    fn parse_root(&mut self) -> ExprId {
        let root = self.arena.make_operation(Opcode::Scope, Span::empty(0));
        while !self.at_end() {
            let before = self.pos;
            if let Some(statement) = self.parse_statement() {
                let span = self.arena.get(statement).span();
                self.arena.append_branch(root, statement);
                self.arena.extend_span_over(root, span);
            }
            if self.pos == before {
                // always make progress, even over junk
                self.advance();
            }
        }
        root
    }

    fn parse_statement(&mut self) -> Option<ExprId> {
        while self.eat(TokenKind::Semicolon).is_some() {}
        let token = self.peek()?.clone();
        let statement = match token.kind() {
            kind if kind.is_attribute_keyword() => self.parse_ascription(),
            TokenKind::KwVar => self.parse_variable(),
            TokenKind::KwProc => self.parse_procedure(Opcode::Procedure),
            TokenKind::KwEntry => self.parse_procedure(Opcode::EntryPoint),
            TokenKind::KwObject => self.parse_object(),
            TokenKind::KwTable => self.parse_table(),
            TokenKind::KwAlias => self.parse_alias(),
            TokenKind::KwLabel => self.parse_label(),
            TokenKind::KwImport => self.parse_import(Opcode::Import),
            TokenKind::KwUse => self.parse_import(Opcode::Use),
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwSwitch => self.parse_switch(),
            TokenKind::KwReturn => self.parse_return(),
            TokenKind::KwJump => self.parse_jump(),
            TokenKind::LeftScope => self.parse_scope(),
            _ => {
                let expression = self.parse_precedence_0();
                self.eat(TokenKind::Semicolon);
                expression
            }
        };
        Some(statement)
    }

    /// Leading attribute keywords accumulate into an [Opcode::Ascribe] node
    /// whose last branch is the attributed statement.
    fn parse_ascription(&mut self) -> ExprId {
        let span = self.current_span();
        let node = self.arena.make_operation(Opcode::Ascribe, span);
        while let Some(kind) = self.kind() {
            let Some(opcode) = attribute_opcode(kind) else {
                break;
            };
            let token = self.advance().expect("peeked");
            let attr = self.arena.make_operation(opcode, token.span());
            self.arena.append_branch(node, attr);
            self.arena.extend_span_over(node, token.span());
        }
        match self.parse_statement() {
            Some(inner) => {
                let inner_span = self.arena.get(inner).span();
                self.arena.append_branch(node, inner);
                self.arena.extend_span_over(node, inner_span);
            }
            None => {
                self.error(
                    "attributes must ascribe a declaration".to_string(),
                    self.current_span(),
                );
                let placeholder = self.placeholder(self.current_span());
                self.arena.append_branch(node, placeholder);
            }
        }
        node
    }

    fn parse_name(&mut self) -> ExprId {
        match self.expect(TokenKind::Identifier, "an identifier") {
            Some(token) => {
                let text = self.text(&token).to_string();
                self.arena.make_identifier(text, token.span())
            }
            None => self.placeholder(self.current_span()),
        }
    }

    /// An omitted type is an [Opcode::Inference] node for the resolver.
    fn inference(&mut self) -> ExprId {
        self.arena
            .make_operation(Opcode::Inference, Span::empty(self.current_span().offset()))
    }

    fn parse_variable(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let name = self.parse_name();
        let symbol = if self.eat(TokenKind::Colon).is_some() {
            self.parse_type()
        } else {
            self.inference()
        };
        let node = self
            .arena
            .make_operation(Opcode::Variable, kw.span());
        self.arena.append_branch(node, name);
        self.arena.append_branch(node, symbol);
        if self.eat(TokenKind::Assign).is_some() {
            let init = self.parse_precedence_0();
            let init_span = self.arena.get(init).span();
            self.arena.append_branch(node, init);
            self.arena.extend_span_over(node, init_span);
        }
        self.eat(TokenKind::Semicolon);
        node
    }

    fn parse_procedure(&mut self, opcode: Opcode) -> ExprId {
        let kw = self.advance().expect("peeked");
        let name = self.parse_name();
        let params_span = self.current_span();
        self.expect(TokenKind::LeftParenthesis, "a parameter list");
        let params = self.parse_parameters();
        let tuple = PrecedenceParser::cloven(self.arena, Opcode::Tuple, params_span, params);
        let ret = if self.eat(TokenKind::Arrow).is_some() {
            self.parse_type()
        } else {
            self.inference()
        };
        let body = self.parse_scope();
        let body_span = self.arena.get(body).span();
        let node = self.arena.make_operation(opcode, kw.span());
        self.arena.append_branch(node, name);
        self.arena.append_branch(node, tuple);
        self.arena.append_branch(node, ret);
        self.arena.append_branch(node, body);
        self.arena.extend_span_over(node, body_span);
        node
    }

    fn parse_parameters(&mut self) -> Vec<ExprId> {
        let mut params = Vec::new();
        loop {
            if self.eat(TokenKind::RightParenthesis).is_some() {
                return params;
            }
            if self.at_end() {
                self.error("missing closing parenthesis".to_string(), self.current_span());
                return params;
            }
            let before = self.pos;
            let name = self.parse_name();
            let symbol = if self.eat(TokenKind::Colon).is_some() {
                self.parse_type()
            } else {
                self.inference()
            };
            let name_span = self.arena.get(name).span();
            let param = self.arena.make_operation(Opcode::Variable, name_span);
            self.arena.append_branch(param, name);
            self.arena.append_branch(param, symbol);
            params.push(param);
            self.eat(TokenKind::Comma);
            if self.pos == before {
                self.advance();
            }
        }
    }

    fn parse_object(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let name = self.parse_name();
        let body = self.parse_scope();
        let body_span = self.arena.get(body).span();
        let node = self.arena.make_operation(Opcode::Object, kw.span());
        self.arena.append_branch(node, name);
        self.arena.append_branch(node, body);
        self.arena.extend_span_over(node, body_span);
        node
    }

    fn parse_table(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let name = self.parse_name();
        let entries_span = self.current_span();
        self.expect(TokenKind::LeftTable, "a table body");
        let entries = self.parse_group_list(TokenKind::RightTable);
        let tuple = PrecedenceParser::cloven(self.arena, Opcode::Tuple, entries_span, entries);
        let tuple_span = self.arena.get(tuple).span();
        let node = self.arena.make_operation(Opcode::Table, kw.span());
        self.arena.append_branch(node, name);
        self.arena.append_branch(node, tuple);
        self.arena.extend_span_over(node, tuple_span);
        node
    }

    fn parse_alias(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let name = self.parse_name();
        self.expect(TokenKind::Assign, "`=` in alias declaration");
        let symbol = self.parse_type();
        let symbol_span = self.arena.get(symbol).span();
        self.eat(TokenKind::Semicolon);
        let node = self.arena.make_operation(Opcode::Alias, kw.span());
        self.arena.append_branch(node, name);
        self.arena.append_branch(node, symbol);
        self.arena.extend_span_over(node, symbol_span);
        node
    }

    fn parse_label(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let name = self.parse_name();
        self.eat(TokenKind::Colon);
        self.eat(TokenKind::Semicolon);
        let node = self.arena.make_operation(Opcode::Label, kw.span());
        self.arena.append_branch(node, name);
        node
    }

    fn parse_import(&mut self, opcode: Opcode) -> ExprId {
        let kw = self.advance().expect("peeked");
        let name = self.parse_name();
        self.eat(TokenKind::Semicolon);
        let node = self.arena.make_operation(opcode, kw.span());
        self.arena.append_branch(node, name);
        node
    }

    fn parse_if(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let condition = self.parse_precedence_0();
        let then_scope = self.parse_scope();
        let node = self.arena.make_operation(Opcode::If, kw.span());
        let then_span = self.arena.get(then_scope).span();
        self.arena.append_branch(node, condition);
        self.arena.append_branch(node, then_scope);
        self.arena.extend_span_over(node, then_span);
        if self.eat(TokenKind::KwElse).is_some() {
            let alternate = if self.check(TokenKind::KwIf) {
                self.parse_if()
            } else {
                self.parse_scope()
            };
            let alternate_span = self.arena.get(alternate).span();
            self.arena.append_branch(node, alternate);
            self.arena.extend_span_over(node, alternate_span);
        }
        node
    }

    fn parse_while(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let condition = self.parse_precedence_0();
        let body = self.parse_scope();
        let body_span = self.arena.get(body).span();
        let node = self.arena.make_operation(Opcode::While, kw.span());
        self.arena.append_branch(node, condition);
        self.arena.append_branch(node, body);
        self.arena.extend_span_over(node, body_span);
        node
    }

    fn parse_for(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let binding = self.parse_name();
        self.expect(TokenKind::Colon, "`:` in for statement");
        let sequence = self.parse_precedence_0();
        let body = self.parse_scope();
        let body_span = self.arena.get(body).span();
        let node = self.arena.make_operation(Opcode::For, kw.span());
        self.arena.append_branch(node, binding);
        self.arena.append_branch(node, sequence);
        self.arena.append_branch(node, body);
        self.arena.extend_span_over(node, body_span);
        node
    }

    fn parse_switch(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let scrutinee = self.parse_precedence_0();
        let node = self.arena.make_operation(Opcode::Switch, kw.span());
        self.arena.append_branch(node, scrutinee);
        self.expect(TokenKind::LeftScope, "a switch body");
        loop {
            if self.eat(TokenKind::RightScope).is_some() {
                break;
            }
            if self.at_end() {
                self.error("missing `:}` closing switch".to_string(), self.current_span());
                break;
            }
            let before = self.pos;
            if let Some(case_kw) = self.eat(TokenKind::KwCase) {
                let value = self.parse_precedence_0();
                let body = self.parse_scope();
                let body_span = self.arena.get(body).span();
                let case = self.arena.make_operation(Opcode::Case, case_kw.span());
                self.arena.append_branch(case, value);
                self.arena.append_branch(case, body);
                self.arena.extend_span_over(case, body_span);
                self.arena.append_branch(node, case);
                self.arena.extend_span_over(node, body_span);
            } else {
                self.error("expected `case` in switch body".to_string(), self.current_span());
            }
            if self.pos == before {
                self.advance();
            }
        }
        node
    }

    fn parse_return(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let node = self.arena.make_operation(Opcode::Return, kw.span());
        if !matches!(
            self.kind(),
            None | Some(TokenKind::Semicolon) | Some(TokenKind::RightScope)
        ) {
            let value = self.parse_precedence_0();
            let value_span = self.arena.get(value).span();
            self.arena.append_branch(node, value);
            self.arena.extend_span_over(node, value_span);
        }
        self.eat(TokenKind::Semicolon);
        node
    }

    fn parse_jump(&mut self) -> ExprId {
        let kw = self.advance().expect("peeked");
        let target = self.parse_name();
        self.eat(TokenKind::Semicolon);
        let node = self.arena.make_operation(Opcode::Jump, kw.span());
        self.arena.append_branch(node, target);
        node
    }

    fn parse_scope(&mut self) -> ExprId {
        let open_span = self.current_span();
        if self.expect(TokenKind::LeftScope, "`{:` opening a scope").is_none() {
            return self.placeholder(open_span);
        }
        let node = self.arena.make_operation(Opcode::Scope, open_span);
        loop {
            if let Some(close) = self.eat(TokenKind::RightScope) {
                self.arena.extend_span_over(node, close.span());
                break;
            }
            if self.at_end() {
                self.error("missing `:}` closing scope".to_string(), self.current_span());
                break;
            }
            let before = self.pos;
            if let Some(statement) = self.parse_statement() {
                let span = self.arena.get(statement).span();
                self.arena.append_branch(node, statement);
                self.arena.extend_span_over(node, span);
            }
            if self.pos == before {
                self.advance();
            }
        }
        node
    }

    // expressions, loosest to tightest

    /// The assignment family; right associative.
    fn parse_precedence_0(&mut self) -> ExprId {
        let lhs = self.parse_precedence_1();
        let Some(token) = self.peek() else {
            return lhs;
        };
        let opcode = match token.kind() {
            TokenKind::Assign => Opcode::Assign,
            TokenKind::PlusAssign => Opcode::AddAssign,
            TokenKind::DashAssign => Opcode::SubtractAssign,
            TokenKind::StarAssign => Opcode::MultiplyAssign,
            TokenKind::SlashAssign => Opcode::DivideAssign,
            TokenKind::PercentAssign => Opcode::ModuloAssign,
            _ => return lhs,
        };
        let token = token.clone();
        self.check_binary_spacing(&token);
        self.advance();
        let rhs = self.parse_precedence_0();
        let mut helper = PrecedenceParser::new(lhs);
        helper.binary(self.arena, opcode, token.span(), rhs);
        helper.finish()
    }

    fn parse_precedence_1(&mut self) -> ExprId {
        self.level(&[(TokenKind::OrOr, Opcode::Or)], true, Self::parse_precedence_2)
    }

    fn parse_precedence_2(&mut self) -> ExprId {
        self.level(&[(TokenKind::AndAnd, Opcode::And)], true, Self::parse_precedence_3)
    }

    /// Bit-or and bit-xor share a level; mixing them wraps instead of
    /// flattening.
    fn parse_precedence_3(&mut self) -> ExprId {
        self.level(
            &[(TokenKind::Pipe, Opcode::BitOr), (TokenKind::Caret, Opcode::Caret)],
            true,
            Self::parse_precedence_4,
        )
    }

    fn parse_precedence_4(&mut self) -> ExprId {
        self.level(
            &[(TokenKind::Ampersand, Opcode::Amp)],
            true,
            Self::parse_precedence_5,
        )
    }

    fn parse_precedence_5(&mut self) -> ExprId {
        self.level(
            &[
                (TokenKind::Equal, Opcode::Equal),
                (TokenKind::NotEqual, Opcode::NotEqual),
            ],
            false,
            Self::parse_precedence_6,
        )
    }

    fn parse_precedence_6(&mut self) -> ExprId {
        self.level(
            &[
                (TokenKind::Less, Opcode::Less),
                (TokenKind::Greater, Opcode::Greater),
                (TokenKind::LessEqual, Opcode::LessEqual),
                (TokenKind::GreaterEqual, Opcode::GreaterEqual),
            ],
            false,
            Self::parse_precedence_7,
        )
    }

    fn parse_precedence_7(&mut self) -> ExprId {
        self.level(
            &[
                (TokenKind::ShiftLeft, Opcode::ShiftLeft),
                (TokenKind::ShiftRight, Opcode::ShiftRight),
            ],
            false,
            Self::parse_precedence_8,
        )
    }

    /// Addition flattens into one n-ary node; `-` stays ambiguous
    /// ([Opcode::Dash]) until the situator settles it by branch count.
    fn parse_precedence_8(&mut self) -> ExprId {
        self.level(
            &[(TokenKind::Plus, Opcode::Add), (TokenKind::Dash, Opcode::Dash)],
            true,
            Self::parse_precedence_9,
        )
    }

    fn parse_precedence_9(&mut self) -> ExprId {
        self.level(
            &[
                (TokenKind::Star, Opcode::Star),
                (TokenKind::Slash, Opcode::Divide),
                (TokenKind::Percent, Opcode::Modulo),
            ],
            true,
            Self::parse_precedence_10,
        )
    }

    /// Prefix operators; right recursive.
    fn parse_precedence_10(&mut self) -> ExprId {
        let Some(token) = self.peek() else {
            return self.parse_precedence_11();
        };
        let opcode = match token.kind() {
            TokenKind::Dash => Opcode::Dash,
            TokenKind::Bang => Opcode::Not,
            TokenKind::Tilde => Opcode::BitNot,
            TokenKind::Caret => Opcode::Caret,
            TokenKind::Ampersand => Opcode::Amp,
            TokenKind::Star => Opcode::Star,
            _ => return self.parse_precedence_11(),
        };
        let token = token.clone();
        self.check_prefix_spacing(&token);
        self.advance();
        let operand = self.parse_precedence_10();
        PrecedenceParser::unary(self.arena, opcode, token.span(), operand)
    }

    /// Atoms and postfix forms: member access, horned calls, indexing.
    fn parse_precedence_11(&mut self) -> ExprId {
        let mut expr = self.parse_atom();
        loop {
            match self.kind() {
                Some(TokenKind::Dot) => {
                    let dot = self.advance().expect("peeked");
                    let member = self.parse_name();
                    let mut helper = PrecedenceParser::new(expr);
                    helper.binary(self.arena, Opcode::Member, dot.span(), member);
                    expr = helper.finish();
                }
                Some(TokenKind::LeftParenthesis)
                    if matches!(
                        self.peek().expect("peeked").spacing(),
                        Spacing::None | Spacing::After
                    ) =>
                {
                    let open = self.advance().expect("peeked");
                    let args = self.parse_group_list(TokenKind::RightParenthesis);
                    expr =
                        PrecedenceParser::horned(self.arena, Opcode::Call, open.span(), expr, args);
                }
                Some(TokenKind::LeftBracket)
                    if matches!(
                        self.peek().expect("peeked").spacing(),
                        Spacing::None | Spacing::After
                    ) =>
                {
                    let open = self.advance().expect("peeked");
                    let args = self.parse_group_list(TokenKind::RightBracket);
                    expr = PrecedenceParser::horned(
                        self.arena,
                        Opcode::Index,
                        open.span(),
                        expr,
                        args,
                    );
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_atom(&mut self) -> ExprId {
        let Some(token) = self.peek().cloned() else {
            self.error("unexpected end of input".to_string(), self.current_span());
            return self.placeholder(self.current_span());
        };
        match token.kind() {
            TokenKind::Identifier => {
                self.advance();
                let text = self.text(&token);
                match text {
                    // compile-time layout constants
                    "address_size" => self.arena.make_operation(Opcode::AddressSize, token.span()),
                    "address_depth" => {
                        self.arena.make_operation(Opcode::AddressDepth, token.span())
                    }
                    "bits_per_byte" => {
                        self.arena.make_operation(Opcode::BitsPerByte, token.span())
                    }
                    _ => {
                        let text = text.to_string();
                        self.arena.make_identifier(text, token.span())
                    }
                }
            }
            TokenKind::Integer => {
                self.advance();
                let text = self.text(&token);
                match crate::numeric::parse_numeric(text) {
                    crate::numeric::NumericOutcome::Ok(value) => {
                        self.arena.make_integer(value, token.span())
                    }
                    outcome => {
                        self.error(outcome.describe().to_string(), token.span());
                        self.placeholder(token.span())
                    }
                }
            }
            TokenKind::Real => {
                self.advance();
                let value = self
                    .text(&token)
                    .replace('_', "")
                    .parse::<f64>()
                    .unwrap_or(0.0);
                self.arena.make_real(value, token.span())
            }
            TokenKind::String => {
                self.advance();
                let decoded = decode_quoted(self.text(&token));
                self.arena.make_string(decoded, token.span())
            }
            TokenKind::Codeunit => {
                self.advance();
                let decoded = decode_quoted(self.text(&token));
                let mut units = decoded.chars();
                let unit = units.next().map(|c| c as u32).unwrap_or(0);
                if units.next().is_some() {
                    self.error(
                        "codeunit literal must contain exactly one codeunit".to_string(),
                        token.span(),
                    );
                }
                self.arena.make_codeunit(unit, token.span())
            }
            TokenKind::StringLeft => self.parse_interpolation(),
            TokenKind::LeftParenthesis => {
                let open = self.advance().expect("peeked");
                let args = self.parse_group_list(TokenKind::RightParenthesis);
                PrecedenceParser::cloven(self.arena, Opcode::Tuple, open.span(), args)
            }
            TokenKind::LeftFunnel => self.parse_anonymous_function(),
            TokenKind::LeftBracket => self.parse_sequence_type(),
            kind if kind.is_error() => {
                // the tokenizer already reported this token
                self.ok = false;
                self.advance();
                self.placeholder(token.span())
            }
            kind if kind.is_closing() => {
                // leave the closer for the enclosing construct
                self.error(format!("unexpected {kind:?}"), token.span());
                self.placeholder(token.span())
            }
            kind => {
                self.error(format!("unexpected {kind:?}"), token.span());
                self.advance();
                self.placeholder(token.span())
            }
        }
    }

    /// `"left{` expr (`}middle{` expr)* `}right"` becomes an
    /// [Opcode::Interpolate] node alternating string fragments and splices.
    fn parse_interpolation(&mut self) -> ExprId {
        let left = self.advance().expect("peeked");
        let node = self.arena.make_operation(Opcode::Interpolate, left.span());
        let fragment_text = decode_fragment(self.text(&left));
        let fragment = self.arena.make_string(fragment_text, left.span());
        self.arena.append_branch(node, fragment);
        loop {
            let splice_expr = self.parse_precedence_0();
            let splice_span = self.arena.get(splice_expr).span();
            let splice = self
                .arena
                .make_operation(Opcode::Splice, splice_span);
            self.arena.append_branch(splice, splice_expr);
            self.arena.append_branch(node, splice);
            match self.kind() {
                Some(TokenKind::StringMiddle) => {
                    let middle = self.advance().expect("peeked");
                    let text = decode_fragment(self.text(&middle));
                    let fragment = self.arena.make_string(text, middle.span());
                    self.arena.append_branch(node, fragment);
                    self.arena.extend_span_over(node, middle.span());
                }
                Some(TokenKind::StringRight) => {
                    let right = self.advance().expect("peeked");
                    let text = decode_fragment(self.text(&right));
                    let fragment = self.arena.make_string(text, right.span());
                    self.arena.append_branch(node, fragment);
                    self.arena.extend_span_over(node, right.span());
                    break;
                }
                _ => {
                    self.error(
                        "expected interpolated string fragment".to_string(),
                        self.current_span(),
                    );
                    break;
                }
            }
        }
        node
    }

    /// `(> params <) {: body :}` — an anonymous function with a capture-style
    /// parameter funnel.
    fn parse_anonymous_function(&mut self) -> ExprId {
        let open = self.advance().expect("peeked");
        let mut params = Vec::new();
        loop {
            if self.eat(TokenKind::RightFunnel).is_some() {
                break;
            }
            if self.at_end() {
                self.error("missing `<)` closing funnel".to_string(), self.current_span());
                break;
            }
            let before = self.pos;
            let name = self.parse_name();
            let symbol = if self.eat(TokenKind::Colon).is_some() {
                self.parse_type()
            } else {
                self.inference()
            };
            let name_span = self.arena.get(name).span();
            let param = self.arena.make_operation(Opcode::Variable, name_span);
            self.arena.append_branch(param, name);
            self.arena.append_branch(param, symbol);
            params.push(param);
            self.eat(TokenKind::Comma);
            if self.pos == before {
                self.advance();
            }
        }
        let tuple = PrecedenceParser::cloven(self.arena, Opcode::Tuple, open.span(), params);
        let body = self.parse_scope();
        let body_span = self.arena.get(body).span();
        let node = self
            .arena
            .make_operation(Opcode::AnonymousFunction, open.span());
        self.arena.append_branch(node, tuple);
        self.arena.append_branch(node, body);
        self.arena.extend_span_over(node, body_span);
        node
    }

    /// `[count]type` is an array type; `[]type` is a slice type.
    fn parse_sequence_type(&mut self) -> ExprId {
        let open = self.advance().expect("peeked");
        if self.eat(TokenKind::RightBracket).is_some() {
            let element = self.parse_type();
            return PrecedenceParser::unary(self.arena, Opcode::SliceType, open.span(), element);
        }
        let count = self.parse_precedence_0();
        self.expect(TokenKind::RightBracket, "`]` closing array type");
        let element = self.parse_type();
        let node = self.arena.make_operation(Opcode::ArrayType, open.span());
        let element_span = self.arena.get(element).span();
        self.arena.append_branch(node, count);
        self.arena.append_branch(node, element);
        self.arena.extend_span_over(node, element_span);
        node
    }

    /// Type expressions never reach the assignment level, so a declaration's
    /// `= initializer` stays outside the type. Attribute keywords may prefix
    /// any layer of a type, ascribing the layer they precede.
    fn parse_type(&mut self) -> ExprId {
        match self.kind() {
            Some(kind) if kind.is_attribute_keyword() => {
                let span = self.current_span();
                let node = self.arena.make_operation(Opcode::Ascribe, span);
                while let Some(kind) = self.kind() {
                    let Some(opcode) = attribute_opcode(kind) else {
                        break;
                    };
                    let token = self.advance().expect("peeked");
                    let attr = self.arena.make_operation(opcode, token.span());
                    self.arena.append_branch(node, attr);
                    self.arena.extend_span_over(node, token.span());
                }
                let inner = self.parse_type();
                let inner_span = self.arena.get(inner).span();
                self.arena.append_branch(node, inner);
                self.arena.extend_span_over(node, inner_span);
                node
            }
            Some(TokenKind::Star) => {
                let token = self.advance().expect("peeked");
                let inner = self.parse_type();
                PrecedenceParser::unary(self.arena, Opcode::Star, token.span(), inner)
            }
            Some(TokenKind::Ampersand) => {
                let token = self.advance().expect("peeked");
                let inner = self.parse_type();
                PrecedenceParser::unary(self.arena, Opcode::Amp, token.span(), inner)
            }
            _ => self.parse_precedence_10(),
        }
    }

    fn parse_group_list(&mut self, close: TokenKind) -> Vec<ExprId> {
        let mut args = Vec::new();
        loop {
            if self.eat(close).is_some() {
                return args;
            }
            if self.at_end() {
                self.error("missing closing delimiter".to_string(), self.current_span());
                return args;
            }
            let before = self.pos;
            args.push(self.parse_precedence_0());
            self.eat(TokenKind::Comma);
            if self.pos == before {
                self.advance();
            }
        }
    }

    /// One shared binary/n-ary level loop.
    fn level(
        &mut self,
        operators: &[(TokenKind, Opcode)],
        flatten: bool,
        next: fn(&mut Self) -> ExprId,
    ) -> ExprId {
        let first = next(self);
        let mut helper = PrecedenceParser::new(first);
        loop {
            let Some(token) = self.peek() else {
                break;
            };
            let Some(&(_, opcode)) = operators.iter().find(|(kind, _)| *kind == token.kind())
            else {
                break;
            };
            // before-only spacing binds the operator to the next construct
            if token.spacing() == Spacing::Before {
                break;
            }
            let token = token.clone();
            self.check_binary_spacing(&token);
            self.advance();
            let rhs = next(self);
            if flatten {
                helper.nary(self.arena, opcode, token.span(), rhs);
            } else {
                helper.binary(self.arena, opcode, token.span(), rhs);
            }
        }
        helper.finish()
    }

    fn check_binary_spacing(&mut self, token: &Token) {
        if !token.spacing().valid_for_binary() {
            self.error(
                format!(
                    "invalid spacing around binary operator {:?}",
                    token.kind()
                ),
                token.span(),
            );
        }
    }

    fn check_prefix_spacing(&mut self, token: &Token) {
        if !token.spacing().valid_for_prefix() {
            self.error(
                format!(
                    "invalid spacing after prefix operator {:?}",
                    token.kind()
                ),
                token.span(),
            );
        }
    }
}

fn attribute_opcode(kind: TokenKind) -> Option<Opcode> {
    Some(match kind {
        TokenKind::KwMutable => Opcode::Mutable,
        TokenKind::KwVolatile => Opcode::Volatile,
        TokenKind::KwPrivate => Opcode::Private,
        TokenKind::KwExport => Opcode::Export,
        TokenKind::KwInline => Opcode::Inline,
        TokenKind::KwExternal => Opcode::External,
        TokenKind::KwThreadlocal => Opcode::Threadlocal,
        _ => return None,
    })
}

/// Strips the delimiters off a plain quoted literal and decodes its escapes.
fn decode_quoted(text: &str) -> String {
    decode_escapes(strip_ends(text))
}

/// Strips the `"`/`{`/`}` delimiters off an interpolation fragment.
fn decode_fragment(text: &str) -> String {
    decode_escapes(strip_ends(text))
}

fn strip_ends(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\n') => {} // escaped newline joins lines
            Some('x') => {
                let hi = chars.next().and_then(|c| c.to_digit(16));
                let lo = chars.next().and_then(|c| c.to_digit(16));
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8 as char);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use std::sync::Mutex;
    use test_log::test;
    use umbra_tokens::Severity;

    #[derive(Default)]
    struct TestSink(Mutex<Vec<Diagnostic>>);

    impl DiagnosticSink for TestSink {
        fn report(&self, diagnostic: Diagnostic) {
            self.0.lock().unwrap().push(diagnostic);
        }
    }

    impl TestSink {
        fn errors(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .map(|d| d.message.clone())
                .collect()
        }
    }

    fn parse_str(source: &str) -> (ExprArena, ExprId, bool, TestSink) {
        let mut buffer = source.as_bytes().to_vec();
        buffer.push(0);
        let sink = TestSink::default();
        let (tokens, _) = tokenize(&buffer, "test.um", &sink);
        let mut arena = ExprArena::new();
        let (root, ok) = parse(&tokens, source, "test.um", &mut arena, &sink);
        (arena, root, ok, sink)
    }

    fn only_statement(arena: &ExprArena, root: ExprId) -> ExprId {
        assert_eq!(arena.branch_count(root), 1, "expected a single statement");
        arena.branch_at(root, 0).unwrap()
    }

    #[test]
    fn test_nary_addition_flattens() {
        let (arena, root, ok, _) = parse_str("1 + 2 + 3;");
        assert!(ok);
        let add = only_statement(&arena, root);
        assert_eq!(arena.get(add).opcode(), Opcode::Add);
        assert_eq!(arena.branch_count(add), 3);
    }

    #[test]
    fn test_precedence_multiplication_binds_tighter() {
        let (arena, root, ok, _) = parse_str("1 + 2 * 3;");
        assert!(ok);
        let add = only_statement(&arena, root);
        assert_eq!(arena.get(add).opcode(), Opcode::Add);
        let product = arena.branch_at(add, 1).unwrap();
        assert_eq!(arena.get(product).opcode(), Opcode::Star);
    }

    #[test]
    fn test_horned_call() {
        let (arena, root, ok, _) = parse_str("f(1, 2);");
        assert!(ok);
        let call = only_statement(&arena, root);
        assert_eq!(arena.get(call).opcode(), Opcode::Call);
        assert_eq!(arena.branch_count(call), 3);
        let head = arena.branch_at(call, 0).unwrap();
        assert_eq!(arena.get(head).opcode(), Opcode::Identifier);
        assert_eq!(arena.get(head).text(), Some("f"));
    }

    #[test]
    fn test_cloven_tuple() {
        let (arena, root, ok, _) = parse_str("(1, 2, 3);");
        assert!(ok);
        let tuple = only_statement(&arena, root);
        assert_eq!(arena.get(tuple).opcode(), Opcode::Tuple);
        assert_eq!(arena.branch_count(tuple), 3);
    }

    #[test]
    fn test_member_chain_left_associates() {
        let (arena, root, ok, _) = parse_str("a.b.c;");
        assert!(ok);
        let outer = only_statement(&arena, root);
        assert_eq!(arena.get(outer).opcode(), Opcode::Member);
        let inner = arena.branch_at(outer, 0).unwrap();
        assert_eq!(arena.get(inner).opcode(), Opcode::Member);
    }

    #[test]
    fn test_unary_dash_stays_ambiguous() {
        let (arena, root, ok, _) = parse_str("a - b; -c;");
        assert!(ok);
        assert_eq!(arena.branch_count(root), 2);
        let subtract = arena.branch_at(root, 0).unwrap();
        assert_eq!(arena.get(subtract).opcode(), Opcode::Dash);
        assert_eq!(arena.branch_count(subtract), 2);
        let negate = arena.branch_at(root, 1).unwrap();
        assert_eq!(arena.get(negate).opcode(), Opcode::Dash);
        assert_eq!(arena.branch_count(negate), 1);
    }

    #[test]
    fn test_before_only_spacing_splits_statements() {
        // `a -b` is `a` then a prefixed `b`, never subtraction
        let (arena, root, ok, _) = parse_str("a -b");
        assert!(ok);
        assert_eq!(arena.branch_count(root), 2);
    }

    #[test]
    fn test_after_only_spacing_is_rejected() {
        let (_, _, ok, sink) = parse_str("a- b;");
        assert!(!ok);
        assert!(sink.errors().iter().any(|e| e.contains("spacing")));
    }

    #[test]
    fn test_detached_prefix_operator_is_rejected() {
        // `(-b)` is a prefixed operand; `(- b)` detaches the operator
        let (_, _, ok, _) = parse_str("(-b);");
        assert!(ok);
        let (_, _, ok, sink) = parse_str("(- b);");
        assert!(!ok);
        assert!(sink.errors().iter().any(|e| e.contains("prefix")));
    }

    #[test]
    fn test_variable_declaration_shape() {
        let (arena, root, ok, _) = parse_str("var x: s32 = 4;");
        assert!(ok);
        let var = only_statement(&arena, root);
        assert_eq!(arena.get(var).opcode(), Opcode::Variable);
        let branches: Vec<Opcode> = arena
            .branches(var)
            .map(|id| arena.get(id).opcode())
            .collect();
        assert_eq!(
            branches,
            vec![Opcode::Identifier, Opcode::Identifier, Opcode::Integer]
        );
    }

    #[test]
    fn test_variable_without_type_gets_inference() {
        let (arena, root, ok, _) = parse_str("var x = 4;");
        assert!(ok);
        let var = only_statement(&arena, root);
        let symbol = arena.branch_at(var, 1).unwrap();
        assert_eq!(arena.get(symbol).opcode(), Opcode::Inference);
    }

    #[test]
    fn test_procedure_shape() {
        let (arena, root, ok, _) = parse_str("proc add(a: s32, b: s32) -> s32 {: return a + b; :}");
        assert!(ok);
        let procedure = only_statement(&arena, root);
        assert_eq!(arena.get(procedure).opcode(), Opcode::Procedure);
        let branches: Vec<Opcode> = arena
            .branches(procedure)
            .map(|id| arena.get(id).opcode())
            .collect();
        assert_eq!(
            branches,
            vec![
                Opcode::Identifier,
                Opcode::Tuple,
                Opcode::Identifier,
                Opcode::Scope
            ]
        );
        let params = arena.branch_at(procedure, 1).unwrap();
        assert_eq!(arena.branch_count(params), 2);
    }

    #[test]
    fn test_entry_point_shape() {
        let (arena, root, ok, _) = parse_str("entry main() {: return 0; :}");
        assert!(ok);
        let entry = only_statement(&arena, root);
        assert_eq!(arena.get(entry).opcode(), Opcode::EntryPoint);
        let ret = arena.branch_at(entry, 2).unwrap();
        assert_eq!(arena.get(ret).opcode(), Opcode::Inference);
    }

    #[test]
    fn test_if_else_chain() {
        let (arena, root, ok, _) =
            parse_str("if a {: b; :} else if c {: d; :} else {: e; :}");
        assert!(ok);
        let if_node = only_statement(&arena, root);
        assert_eq!(arena.get(if_node).opcode(), Opcode::If);
        assert_eq!(arena.branch_count(if_node), 3);
        let alternate = arena.branch_at(if_node, 2).unwrap();
        assert_eq!(arena.get(alternate).opcode(), Opcode::If);
    }

    #[test]
    fn test_attribute_chain_wraps_declaration() {
        let (arena, root, ok, _) = parse_str("export mutable var x: s32;");
        assert!(ok);
        let ascribe = only_statement(&arena, root);
        assert_eq!(arena.get(ascribe).opcode(), Opcode::Ascribe);
        let branches: Vec<Opcode> = arena
            .branches(ascribe)
            .map(|id| arena.get(id).opcode())
            .collect();
        assert_eq!(
            branches,
            vec![Opcode::Export, Opcode::Mutable, Opcode::Variable]
        );
    }

    #[test]
    fn test_interpolation_alternates_fragments_and_splices() {
        let (arena, root, ok, _) = parse_str(r#""a{x}b{y}c";"#);
        assert!(ok);
        let interpolate = only_statement(&arena, root);
        assert_eq!(arena.get(interpolate).opcode(), Opcode::Interpolate);
        let branches: Vec<Opcode> = arena
            .branches(interpolate)
            .map(|id| arena.get(id).opcode())
            .collect();
        assert_eq!(
            branches,
            vec![
                Opcode::String,
                Opcode::Splice,
                Opcode::String,
                Opcode::Splice,
                Opcode::String
            ]
        );
    }

    #[test]
    fn test_array_and_slice_types() {
        let (arena, root, ok, _) = parse_str("var a: [4]s32; var b: []s32;");
        assert!(ok);
        let first = arena.branch_at(root, 0).unwrap();
        let array = arena.branch_at(first, 1).unwrap();
        assert_eq!(arena.get(array).opcode(), Opcode::ArrayType);
        assert_eq!(arena.branch_count(array), 2);
        let second = arena.branch_at(root, 1).unwrap();
        let slice = arena.branch_at(second, 1).unwrap();
        assert_eq!(arena.get(slice).opcode(), Opcode::SliceType);
    }

    #[test]
    fn test_pointer_type_in_declaration() {
        let (arena, root, ok, _) = parse_str("var p: *s32;");
        assert!(ok);
        let var = only_statement(&arena, root);
        let pointer = arena.branch_at(var, 1).unwrap();
        // the parser leaves `*` ambiguous; the situator settles it
        assert_eq!(arena.get(pointer).opcode(), Opcode::Star);
        assert_eq!(arena.branch_count(pointer), 1);
    }

    #[test]
    fn test_attributes_in_type_position() {
        let (arena, root, ok, _) = parse_str("var p: *mutable s32;");
        assert!(ok);
        let var = only_statement(&arena, root);
        let pointer = arena.branch_at(var, 1).unwrap();
        assert_eq!(arena.get(pointer).opcode(), Opcode::Star);
        let ascribe = arena.branch_at(pointer, 0).unwrap();
        assert_eq!(arena.get(ascribe).opcode(), Opcode::Ascribe);
        let layers: Vec<Opcode> = arena
            .branches(ascribe)
            .map(|id| arena.get(id).opcode())
            .collect();
        assert_eq!(layers, vec![Opcode::Mutable, Opcode::Identifier]);
    }

    #[test]
    fn test_error_recovery_produces_placeholder_and_continues() {
        let (arena, root, ok, _) = parse_str("var x: = ; var y: s32;");
        assert!(!ok);
        // both declarations are present despite the malformed first one
        assert!(arena.branch_count(root) >= 2);
    }

    #[test]
    fn test_unmatched_paren_marks_parse_not_ok() {
        let (_, _, ok, sink) = parse_str("(a b");
        assert!(!ok);
        assert!(!sink.errors().is_empty());
    }

    #[test]
    fn test_literals_never_have_branches() {
        let (arena, root, ok, _) =
            parse_str("proc f(a: s32) -> s32 {: return a * 2 + g(a); :}");
        assert!(ok);
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = arena.get(id);
            if node.opcode().is_literal() {
                assert_eq!(node.branch(), None);
            }
            stack.extend(arena.branches(id));
        }
    }

    #[test]
    fn test_switch_shape() {
        let (arena, root, ok, _) =
            parse_str("switch x {: case 1 {: a; :} case 2 {: b; :} :}");
        assert!(ok);
        let switch = only_statement(&arena, root);
        assert_eq!(arena.get(switch).opcode(), Opcode::Switch);
        assert_eq!(arena.branch_count(switch), 3);
        let case = arena.branch_at(switch, 1).unwrap();
        assert_eq!(arena.get(case).opcode(), Opcode::Case);
    }

    #[test]
    fn test_anonymous_function() {
        let (arena, root, ok, _) = parse_str("(> x: s32 <) {: return x; :};");
        assert!(ok);
        let function = only_statement(&arena, root);
        assert_eq!(arena.get(function).opcode(), Opcode::AnonymousFunction);
        assert_eq!(arena.branch_count(function), 2);
    }
}
