// Recursive-descent parser with precedence climbing for binary expressions.

use super::ast::*;
use super::lexer::{Lexer, Tok, Token};
use super::SyntaxError;
use smol_str::SmolStr;
use std::rc::Rc;

pub fn parse(src: &[u8], chunk_name: &str) -> Result<Chunk, SyntaxError> {
    let tokens = Lexer::new(src).tokenize()?;
    let source: Rc<str> = Rc::from(chunk_name);
    let mut parser = Parser {
        tokens,
        pos: 0,
        source: source.clone(),
        funcs: vec![FuncCtx {
            is_vararg: true,
            loop_depth: 0,
        }],
    };
    let block = parser.block()?;
    parser.expect(Tok::Eof)?;
    validate_gotos(&block, &mut Vec::new())?;
    Ok(Chunk { source, block })
}

struct FuncCtx {
    is_vararg: bool,
    loop_depth: usize,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source: Rc<str>,
    funcs: Vec<FuncCtx>,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&mut self, tok: Tok) -> bool {
        if *self.peek() == tok {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<Token, SyntaxError> {
        if *self.peek() == tok {
            Ok(self.bump())
        } else {
            Err(self.error(format!(
                "{} expected near {}",
                tok.describe(),
                self.peek().describe()
            )))
        }
    }

    fn expect_name(&mut self) -> Result<(SmolStr, Span), SyntaxError> {
        let span = self.peek_span();
        match self.peek().clone() {
            Tok::Name(n) => {
                self.bump();
                Ok((n, span))
            }
            other => Err(self.error(format!("<name> expected near {}", other.describe()))),
        }
    }

    fn error(&self, msg: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: msg.into(),
            span: self.peek_span(),
        }
    }

    fn ctx(&mut self) -> &mut FuncCtx {
        self.funcs.last_mut().expect("function context")
    }

    // ---- statements ----

    fn block_ends(&self) -> bool {
        matches!(
            self.peek(),
            Tok::End | Tok::Eof | Tok::Else | Tok::Elseif | Tok::Until
        )
    }

    fn block(&mut self) -> Result<Block, SyntaxError> {
        let mut stmts = Vec::new();
        loop {
            if self.block_ends() {
                return Ok(Block { stmts });
            }
            if *self.peek() == Tok::Return {
                stmts.push(self.return_stmt()?);
                return Ok(Block { stmts });
            }
            if let Some(stmt) = self.statement()? {
                stmts.push(stmt);
            }
        }
    }

    fn return_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let span = self.peek_span();
        self.expect(Tok::Return)?;
        let mut exprs = Vec::new();
        if !self.block_ends() && *self.peek() != Tok::Semi {
            exprs = self.expr_list()?;
        }
        self.check(Tok::Semi);
        Ok(Stmt::Return { exprs, span })
    }

    fn statement(&mut self) -> Result<Option<Stmt>, SyntaxError> {
        let span = self.peek_span();
        match self.peek() {
            Tok::Semi => {
                self.bump();
                Ok(None)
            }
            Tok::DColon => {
                self.bump();
                let (name, _) = self.expect_name()?;
                self.expect(Tok::DColon)?;
                Ok(Some(Stmt::Label { name }))
            }
            Tok::Break => {
                self.bump();
                if self.ctx().loop_depth == 0 {
                    return Err(SyntaxError {
                        message: "break outside a loop".to_string(),
                        span,
                    });
                }
                Ok(Some(Stmt::Break { span }))
            }
            Tok::Goto => {
                self.bump();
                let (label, _) = self.expect_name()?;
                Ok(Some(Stmt::Goto { label, span }))
            }
            Tok::Do => {
                self.bump();
                let body = self.block()?;
                self.expect(Tok::End)?;
                Ok(Some(Stmt::Do(body)))
            }
            Tok::While => {
                self.bump();
                let cond = self.expr()?;
                self.expect(Tok::Do)?;
                self.ctx().loop_depth += 1;
                let body = self.block()?;
                self.ctx().loop_depth -= 1;
                self.expect(Tok::End)?;
                Ok(Some(Stmt::While { cond, body }))
            }
            Tok::Repeat => {
                self.bump();
                self.ctx().loop_depth += 1;
                let body = self.block()?;
                self.ctx().loop_depth -= 1;
                self.expect(Tok::Until)?;
                let cond = self.expr()?;
                Ok(Some(Stmt::Repeat { body, cond }))
            }
            Tok::If => Ok(Some(self.if_stmt()?)),
            Tok::For => Ok(Some(self.for_stmt(span)?)),
            Tok::Function => Ok(Some(self.function_stmt(span)?)),
            Tok::Local => Ok(Some(self.local_stmt(span)?)),
            _ => Ok(Some(self.expr_stmt(span)?)),
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect(Tok::If)?;
        let mut arms = Vec::new();
        let cond = self.expr()?;
        self.expect(Tok::Then)?;
        arms.push((cond, self.block()?));
        let mut orelse = None;
        loop {
            match self.peek() {
                Tok::Elseif => {
                    self.bump();
                    let cond = self.expr()?;
                    self.expect(Tok::Then)?;
                    arms.push((cond, self.block()?));
                }
                Tok::Else => {
                    self.bump();
                    orelse = Some(self.block()?);
                    self.expect(Tok::End)?;
                    break;
                }
                Tok::End => {
                    self.bump();
                    break;
                }
                other => {
                    return Err(self.error(format!(
                        "'end' expected near {}",
                        other.describe()
                    )));
                }
            }
        }
        Ok(Stmt::If { arms, orelse })
    }

    fn for_stmt(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        self.expect(Tok::For)?;
        let (first, _) = self.expect_name()?;
        if self.check(Tok::Assign) {
            let start = self.expr()?;
            self.expect(Tok::Comma)?;
            let limit = self.expr()?;
            let step = if self.check(Tok::Comma) {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(Tok::Do)?;
            self.ctx().loop_depth += 1;
            let body = self.block()?;
            self.ctx().loop_depth -= 1;
            self.expect(Tok::End)?;
            return Ok(Stmt::NumericFor {
                var: first,
                start,
                limit,
                step,
                body,
                span,
            });
        }
        let mut names = vec![first];
        while self.check(Tok::Comma) {
            names.push(self.expect_name()?.0);
        }
        self.expect(Tok::In)?;
        let exprs = self.expr_list()?;
        self.expect(Tok::Do)?;
        self.ctx().loop_depth += 1;
        let body = self.block()?;
        self.ctx().loop_depth -= 1;
        self.expect(Tok::End)?;
        Ok(Stmt::GenericFor {
            names,
            exprs,
            body,
            span,
        })
    }

    fn function_stmt(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        self.expect(Tok::Function)?;
        let (first, first_span) = self.expect_name()?;
        let mut path = first.to_string();
        let mut target = Expr::Name(first, first_span);
        let mut is_method = false;
        loop {
            if self.check(Tok::Dot) {
                let (field, field_span) = self.expect_name()?;
                path.push('.');
                path.push_str(&field);
                target = Expr::Index {
                    obj: Box::new(target),
                    key: Box::new(Expr::Str(Rc::from(field.as_bytes()), field_span)),
                    span: field_span,
                };
            } else if self.check(Tok::Colon) {
                let (field, field_span) = self.expect_name()?;
                path.push(':');
                path.push_str(&field);
                target = Expr::Index {
                    obj: Box::new(target),
                    key: Box::new(Expr::Str(Rc::from(field.as_bytes()), field_span)),
                    span: field_span,
                };
                is_method = true;
                break;
            } else {
                break;
            }
        }
        let func = self.func_body(SmolStr::new(&path), span, is_method)?;
        Ok(Stmt::FunctionDecl { target, func, span })
    }

    fn local_stmt(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        self.expect(Tok::Local)?;
        if self.check(Tok::Function) {
            let (name, name_span) = self.expect_name()?;
            let func = self.func_body(name.clone(), name_span, false)?;
            return Ok(Stmt::LocalFunction { name, func, span });
        }
        let mut names = Vec::new();
        loop {
            let (name, _) = self.expect_name()?;
            let attr = if self.check(Tok::Less) {
                let (attr_name, attr_span) = self.expect_name()?;
                self.expect(Tok::Greater)?;
                match attr_name.as_str() {
                    "const" => Attrib::Const,
                    "close" => Attrib::Close,
                    other => {
                        return Err(SyntaxError {
                            message: format!("unknown attribute '{}'", other),
                            span: attr_span,
                        });
                    }
                }
            } else {
                Attrib::None
            };
            names.push((name, attr));
            if !self.check(Tok::Comma) {
                break;
            }
        }
        let exprs = if self.check(Tok::Assign) {
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(Stmt::Local { names, exprs, span })
    }

    fn expr_stmt(&mut self, span: Span) -> Result<Stmt, SyntaxError> {
        let first = self.suffixed_expr()?;
        if *self.peek() == Tok::Assign || *self.peek() == Tok::Comma {
            let mut targets = vec![first];
            while self.check(Tok::Comma) {
                targets.push(self.suffixed_expr()?);
            }
            for t in &targets {
                if !matches!(t, Expr::Name(..) | Expr::Index { .. }) {
                    return Err(self.error("syntax error: cannot assign to this expression"));
                }
            }
            self.expect(Tok::Assign)?;
            let exprs = self.expr_list()?;
            return Ok(Stmt::Assign {
                targets,
                exprs,
                span,
            });
        }
        match first {
            call @ (Expr::Call { .. } | Expr::MethodCall { .. }) => Ok(Stmt::Call(call)),
            _ => Err(self.error("syntax error near unexpected expression")),
        }
    }

    // ---- expressions ----

    fn expr_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut exprs = vec![self.expr()?];
        while self.check(Tok::Comma) {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        self.sub_expr(0)
    }

    /// Precedence climbing; `limit` is the binding power of the operator to
    /// the left.
    fn sub_expr(&mut self, limit: u8) -> Result<Expr, SyntaxError> {
        let span = self.peek_span();
        let mut lhs = if let Some(op) = unary_op(self.peek()) {
            self.bump();
            let operand = self.sub_expr(UNARY_PRIORITY)?;
            Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            }
        } else {
            self.simple_expr()?
        };
        while let Some((op, left_prec, right_prec)) = binary_op(self.peek()) {
            if left_prec <= limit {
                break;
            }
            let op_span = self.peek_span();
            self.bump();
            let rhs = self.sub_expr(right_prec)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: op_span,
            };
        }
        Ok(lhs)
    }

    fn simple_expr(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.peek_span();
        let expr = match self.peek().clone() {
            Tok::Nil => {
                self.bump();
                Expr::Nil(span)
            }
            Tok::True => {
                self.bump();
                Expr::True(span)
            }
            Tok::False => {
                self.bump();
                Expr::False(span)
            }
            Tok::Int(i) => {
                self.bump();
                Expr::Int(i, span)
            }
            Tok::Float(f) => {
                self.bump();
                Expr::Float(f, span)
            }
            Tok::Str(s) => {
                self.bump();
                Expr::Str(Rc::from(s.as_slice()), span)
            }
            Tok::Ellipsis => {
                self.bump();
                if !self.funcs.last().map(|f| f.is_vararg).unwrap_or(false) {
                    return Err(SyntaxError {
                        message: "cannot use '...' outside a vararg function".to_string(),
                        span,
                    });
                }
                Expr::VarArg(span)
            }
            Tok::Function => {
                self.bump();
                let func = self.func_body(SmolStr::default(), span, false)?;
                Expr::Function(func)
            }
            Tok::LBrace => self.table_ctor(span)?,
            _ => self.suffixed_expr()?,
        };
        Ok(expr)
    }

    /// Primary expression plus any chain of indexing, calls and method calls.
    fn suffixed_expr(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.peek_span();
        let mut expr = match self.peek().clone() {
            Tok::Name(n) => {
                self.bump();
                Expr::Name(n, span)
            }
            Tok::LParen => {
                self.bump();
                let inner = self.expr()?;
                self.expect(Tok::RParen)?;
                Expr::Paren(Box::new(inner))
            }
            other => {
                return Err(self.error(format!("unexpected symbol near {}", other.describe())));
            }
        };
        loop {
            let span = self.peek_span();
            match self.peek().clone() {
                Tok::Dot => {
                    self.bump();
                    let (field, field_span) = self.expect_name()?;
                    expr = Expr::Index {
                        obj: Box::new(expr),
                        key: Box::new(Expr::Str(Rc::from(field.as_bytes()), field_span)),
                        span,
                    };
                }
                Tok::LBracket => {
                    self.bump();
                    let key = self.expr()?;
                    self.expect(Tok::RBracket)?;
                    expr = Expr::Index {
                        obj: Box::new(expr),
                        key: Box::new(key),
                        span,
                    };
                }
                Tok::Colon => {
                    self.bump();
                    let (method, _) = self.expect_name()?;
                    let args = self.call_args(span)?;
                    expr = Expr::MethodCall {
                        obj: Box::new(expr),
                        method,
                        args,
                        span,
                    };
                }
                Tok::LParen | Tok::Str(_) | Tok::LBrace => {
                    let args = self.call_args(span)?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        span,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self, span: Span) -> Result<Vec<Expr>, SyntaxError> {
        match self.peek().clone() {
            Tok::LParen => {
                self.bump();
                let args = if *self.peek() == Tok::RParen {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                self.expect(Tok::RParen)?;
                Ok(args)
            }
            Tok::Str(s) => {
                self.bump();
                Ok(vec![Expr::Str(Rc::from(s.as_slice()), span)])
            }
            Tok::LBrace => Ok(vec![self.table_ctor(span)?]),
            other => Err(self.error(format!(
                "function arguments expected near {}",
                other.describe()
            ))),
        }
    }

    fn table_ctor(&mut self, span: Span) -> Result<Expr, SyntaxError> {
        self.expect(Tok::LBrace)?;
        let mut items = Vec::new();
        loop {
            if *self.peek() == Tok::RBrace {
                break;
            }
            match self.peek().clone() {
                Tok::LBracket => {
                    self.bump();
                    let key = self.expr()?;
                    self.expect(Tok::RBracket)?;
                    self.expect(Tok::Assign)?;
                    let value = self.expr()?;
                    items.push(TableItem::Keyed(key, value));
                }
                Tok::Name(n) if self.tokens[self.pos + 1].tok == Tok::Assign => {
                    self.bump();
                    self.bump();
                    let value = self.expr()?;
                    items.push(TableItem::Named(n, value));
                }
                _ => {
                    items.push(TableItem::Item(self.expr()?));
                }
            }
            if !self.check(Tok::Comma) && !self.check(Tok::Semi) {
                break;
            }
        }
        self.expect(Tok::RBrace)?;
        Ok(Expr::Table { items, span })
    }

    fn func_body(
        &mut self,
        name: SmolStr,
        span: Span,
        is_method: bool,
    ) -> Result<Rc<FuncDef>, SyntaxError> {
        self.expect(Tok::LParen)?;
        let mut params = Vec::new();
        if is_method {
            params.push(SmolStr::new("self"));
        }
        let mut is_vararg = false;
        if *self.peek() != Tok::RParen {
            loop {
                match self.peek().clone() {
                    Tok::Ellipsis => {
                        self.bump();
                        is_vararg = true;
                        break;
                    }
                    Tok::Name(n) => {
                        self.bump();
                        params.push(n);
                    }
                    other => {
                        return Err(self.error(format!(
                            "<name> expected near {}",
                            other.describe()
                        )));
                    }
                }
                if !self.check(Tok::Comma) {
                    break;
                }
            }
        }
        self.expect(Tok::RParen)?;
        self.funcs.push(FuncCtx {
            is_vararg,
            loop_depth: 0,
        });
        let body = self.block()?;
        self.funcs.pop();
        self.expect(Tok::End)?;
        let def = Rc::new(FuncDef {
            name,
            params,
            is_vararg,
            body,
            span,
            source: self.source.clone(),
        });
        validate_gotos(&def.body, &mut Vec::new())?;
        Ok(def)
    }
}

const UNARY_PRIORITY: u8 = 12;

fn unary_op(tok: &Tok) -> Option<UnOp> {
    match tok {
        Tok::Minus => Some(UnOp::Neg),
        Tok::Not => Some(UnOp::Not),
        Tok::Hash => Some(UnOp::Len),
        Tok::Tilde => Some(UnOp::BNot),
        _ => None,
    }
}

/// (op, left priority, right priority); right < left means right-associative.
fn binary_op(tok: &Tok) -> Option<(BinOp, u8, u8)> {
    let entry = match tok {
        Tok::Or => (BinOp::Or, 1, 1),
        Tok::And => (BinOp::And, 2, 2),
        Tok::Less => (BinOp::Lt, 3, 3),
        Tok::Greater => (BinOp::Gt, 3, 3),
        Tok::LessEq => (BinOp::Le, 3, 3),
        Tok::GreaterEq => (BinOp::Ge, 3, 3),
        Tok::NotEq => (BinOp::Ne, 3, 3),
        Tok::EqEq => (BinOp::Eq, 3, 3),
        Tok::Pipe => (BinOp::BOr, 4, 4),
        Tok::Tilde => (BinOp::BXor, 5, 5),
        Tok::Amp => (BinOp::BAnd, 6, 6),
        Tok::Shl => (BinOp::Shl, 7, 7),
        Tok::Shr => (BinOp::Shr, 7, 7),
        Tok::Concat => (BinOp::Concat, 9, 8),
        Tok::Plus => (BinOp::Add, 10, 10),
        Tok::Minus => (BinOp::Sub, 10, 10),
        Tok::Star => (BinOp::Mul, 11, 11),
        Tok::Slash => (BinOp::Div, 11, 11),
        Tok::DSlash => (BinOp::IDiv, 11, 11),
        Tok::Percent => (BinOp::Mod, 11, 11),
        Tok::Caret => (BinOp::Pow, 14, 13),
        _ => return None,
    };
    Some(entry)
}

// ---- goto validation ----
//
// A goto may target any label visible in its own block or an enclosing block
// of the same function. A forward jump must not cross a local declaration,
// unless the label is only followed by other labels (a "void" block tail).

enum BlockEvent<'a> {
    Local(&'a SmolStr, Span),
    Label(&'a SmolStr),
    Goto(&'a SmolStr, Span),
    Child(&'a Block),
    /// Any other statement; relevant to the void-tail rule only.
    Plain,
}

fn block_events(block: &Block) -> Vec<BlockEvent<'_>> {
    let mut events = Vec::new();
    for stmt in &block.stmts {
        match stmt {
            Stmt::Local { names, span, .. } => {
                for (name, _) in names {
                    events.push(BlockEvent::Local(name, *span));
                }
            }
            Stmt::LocalFunction { name, span, .. } => {
                events.push(BlockEvent::Local(name, *span));
            }
            Stmt::Label { name } => events.push(BlockEvent::Label(name)),
            Stmt::Goto { label, span } => events.push(BlockEvent::Goto(label, *span)),
            Stmt::Do(b) => events.push(BlockEvent::Child(b)),
            Stmt::While { body, .. }
            | Stmt::Repeat { body, .. }
            | Stmt::NumericFor { body, .. }
            | Stmt::GenericFor { body, .. } => events.push(BlockEvent::Child(body)),
            Stmt::If { arms, orelse } => {
                for (_, b) in arms {
                    events.push(BlockEvent::Child(b));
                }
                if let Some(b) = orelse {
                    events.push(BlockEvent::Child(b));
                }
            }
            _ => events.push(BlockEvent::Plain),
        }
    }
    events
}

/// `enclosing` carries the label names of every enclosing block.
fn validate_gotos(block: &Block, enclosing: &mut Vec<Vec<SmolStr>>) -> Result<(), SyntaxError> {
    let events = block_events(block);
    let labels: Vec<SmolStr> = events
        .iter()
        .filter_map(|e| match e {
            BlockEvent::Label(n) => Some((*n).clone()),
            _ => None,
        })
        .collect();

    for (i, event) in events.iter().enumerate() {
        let BlockEvent::Goto(target, span) = event else {
            continue;
        };
        // Same-block label?
        let found = events.iter().enumerate().find_map(|(j, e)| match e {
            BlockEvent::Label(n) if n == target => Some(j),
            _ => None,
        });
        if let Some(j) = found {
            if j > i {
                let tail_is_void = events[j + 1..]
                    .iter()
                    .all(|e| matches!(e, BlockEvent::Label(_)));
                if !tail_is_void {
                    for e in &events[i + 1..j] {
                        if let BlockEvent::Local(name, _) = e {
                            return Err(SyntaxError {
                                message: format!(
                                    "<goto {}> jumps into the scope of local '{}'",
                                    target, name
                                ),
                                span: *span,
                            });
                        }
                    }
                }
            }
            continue;
        }
        // Visible in an enclosing block?
        if !enclosing.iter().any(|ls| ls.iter().any(|l| l == *target)) {
            return Err(SyntaxError {
                message: format!("no visible label '{}' for goto", target),
                span: *span,
            });
        }
    }

    enclosing.push(labels);
    for event in &events {
        if let BlockEvent::Child(child) = event {
            validate_gotos(child, enclosing)?;
        }
    }
    enclosing.pop();
    Ok(())
}
