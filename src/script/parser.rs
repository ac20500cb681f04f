// ── Template parser ───────────────────────────────────────────────────────────
//
// Recursive descent over the token stream.  Binary operators use precedence
// climbing with Lua's table:
//
//   or < and < comparison < .. (right) < + - < * / // % < unary < ^ (right)

use super::lexer::{Spanned, Token};

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnOp {
    Neg,
    Not,
    Len,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Var(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `name(args)`; method calls `recv:name(args)` arrive with the receiver
    /// prepended to `args`.
    Call { name: String, args: Vec<Expr>, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Assign { name: String, value: Expr },
    Call(Expr),
    If { branches: Vec<(Expr, Vec<Stmt>)>, otherwise: Vec<Stmt> },
}

// ── Parser ────────────────────────────────────────────────────────────────────

pub(crate) fn parse(tokens: Vec<Spanned>) -> Result<Vec<Stmt>, String> {
    let mut p = Parser { tokens, pos: 0 };
    let block = p.block()?;
    match p.peek() {
        Token::Eof => Ok(block),
        other => Err(p.error(&format!("'<eof>' expected near '{other}'"))),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map_or(&Token::Eof, |s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, want: &Token) -> bool {
        if self.peek() == want {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: &Token) -> Result<(), String> {
        if self.eat(want) {
            Ok(())
        } else {
            let near = self.peek().clone();
            Err(self.error(&format!("'{want}' expected near '{near}'")))
        }
    }

    fn error(&self, msg: &str) -> String {
        format!("line {}: {msg}", self.line())
    }

    fn name(&mut self) -> Result<String, String> {
        match self.advance() {
            Token::Name(n) => Ok(n),
            other => Err(self.error(&format!("<name> expected near '{other}'"))),
        }
    }

    // ── Statements ───────────────────────────────────────────────────────────

    fn block(&mut self) -> Result<Vec<Stmt>, String> {
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Token::Eof | Token::End | Token::Else | Token::Elseif => return Ok(out),
                Token::Semi => {
                    self.pos += 1;
                }
                _ => out.push(self.statement()?),
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, String> {
        match self.peek() {
            Token::If => self.if_statement(),
            Token::Local => {
                self.pos += 1;
                let name = self.name()?;
                self.expect(&Token::Assign)?;
                Ok(Stmt::Assign { name, value: self.expr()? })
            }
            Token::Name(_) if self.tokens.get(self.pos + 1).map(|s| &s.token) == Some(&Token::Assign) => {
                let name = self.name()?;
                self.pos += 1;
                Ok(Stmt::Assign { name, value: self.expr()? })
            }
            _ => {
                let line = self.line();
                let e = self.expr()?;
                match e {
                    Expr::Call { .. } => Ok(Stmt::Call(e)),
                    _ => Err(format!("line {line}: syntax error, expression is not a statement")),
                }
            }
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, String> {
        self.expect(&Token::If)?;
        let mut branches = Vec::new();
        let cond = self.expr()?;
        self.expect(&Token::Then)?;
        branches.push((cond, self.block()?));
        let mut otherwise = Vec::new();
        loop {
            match self.advance() {
                Token::Elseif => {
                    let cond = self.expr()?;
                    self.expect(&Token::Then)?;
                    branches.push((cond, self.block()?));
                }
                Token::Else => {
                    otherwise = self.block()?;
                    self.expect(&Token::End)?;
                    break;
                }
                Token::End => break,
                other => return Err(self.error(&format!("'end' expected near '{other}'"))),
            }
        }
        Ok(Stmt::If { branches, otherwise })
    }

    // ── Expressions ──────────────────────────────────────────────────────────

    pub(crate) fn expr(&mut self) -> Result<Expr, String> {
        self.binary(0)
    }

    /// `(left binding power, right binding power)`; right-associative
    /// operators bind tighter on the left.
    fn infix(tok: &Token) -> Option<(BinOp, u8, u8)> {
        Some(match tok {
            Token::Or => (BinOp::Or, 1, 2),
            Token::And => (BinOp::And, 3, 4),
            Token::EqEq => (BinOp::Eq, 5, 6),
            Token::NotEq => (BinOp::Ne, 5, 6),
            Token::Lt => (BinOp::Lt, 5, 6),
            Token::Le => (BinOp::Le, 5, 6),
            Token::Gt => (BinOp::Gt, 5, 6),
            Token::Ge => (BinOp::Ge, 5, 6),
            Token::DotDot => (BinOp::Concat, 8, 7),
            Token::Plus => (BinOp::Add, 9, 10),
            Token::Minus => (BinOp::Sub, 9, 10),
            Token::Star => (BinOp::Mul, 11, 12),
            Token::Slash => (BinOp::Div, 11, 12),
            Token::SlashSlash => (BinOp::IDiv, 11, 12),
            Token::Percent => (BinOp::Mod, 11, 12),
            Token::Caret => (BinOp::Pow, 16, 15),
            _ => return None,
        })
    }

    const UNARY_POWER: u8 = 13;

    fn binary(&mut self, min: u8) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some((op, left, right)) = Self::infix(self.peek()) {
            if left < min {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(right)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        let op = match self.peek() {
            Token::Minus => UnOp::Neg,
            Token::Not => UnOp::Not,
            Token::Hash => UnOp::Len,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let operand = self.binary(Self::UNARY_POWER)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut e = self.primary()?;
        while self.peek() == &Token::Colon {
            self.pos += 1;
            let line = self.line();
            let name = self.name()?;
            let mut args = vec![e];
            args.extend(self.call_args()?);
            e = Expr::Call { name, args, line };
        }
        Ok(e)
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, String> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expr()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let line = self.line();
        match self.advance() {
            Token::Nil => Ok(Expr::Nil),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Int(v) => Ok(Expr::Int(v)),
            Token::Float(v) => Ok(Expr::Float(v)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::LParen => {
                let e = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Token::Name(first) => {
                // Library-qualified names such as `string.upper`.
                let mut name = first;
                while self.peek() == &Token::Dot {
                    self.pos += 1;
                    name.push('.');
                    name.push_str(&self.name()?);
                }
                if self.peek() == &Token::LParen {
                    let args = self.call_args()?;
                    Ok(Expr::Call { name, args, line })
                } else if name.contains('.') {
                    Err(format!("line {line}: field access is not supported ('{name}')"))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(format!("line {line}: unexpected symbol near '{other}'")),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::tokenize;

    fn program(src: &str) -> Result<Vec<Stmt>, String> {
        parse(tokenize(src)?)
    }

    fn expr(src: &str) -> Expr {
        let mut p = Parser { tokens: tokenize(src).unwrap(), pos: 0 };
        p.expr().unwrap()
    }

    #[test]
    fn precedence() {
        use Expr::*;
        assert_eq!(
            expr("1 + 2 * 3"),
            Binary(BinOp::Add, Box::new(Int(1)), Box::new(Binary(BinOp::Mul, Box::new(Int(2)), Box::new(Int(3)))))
        );
        // -2^2 is -(2^2)
        assert_eq!(
            expr("-2^2"),
            Unary(UnOp::Neg, Box::new(Binary(BinOp::Pow, Box::new(Int(2)), Box::new(Int(2)))))
        );
        // right-associative concat
        assert_eq!(
            expr("'a'..'b'..'c'"),
            Binary(
                BinOp::Concat,
                Box::new(Str("a".into())),
                Box::new(Binary(BinOp::Concat, Box::new(Str("b".into())), Box::new(Str("c".into()))))
            )
        );
    }

    #[test]
    fn method_call_prepends_receiver() {
        assert_eq!(
            expr("MATCH:upper()"),
            Expr::Call { name: "upper".into(), args: vec![Expr::Var("MATCH".into())], line: 1 }
        );
    }

    #[test]
    fn statements() {
        let prog = program("x = CNT * 2; if x > 4 then set(x) elseif x == 2 then set('two') else cond(false, 1) end").unwrap();
        assert_eq!(prog.len(), 2);
        assert!(matches!(&prog[1], Stmt::If { branches, otherwise } if branches.len() == 2 && otherwise.len() == 1));
    }

    #[test]
    fn syntax_errors() {
        assert!(program("set(").is_err());
        assert!(program("1 + 2").is_err());
        assert!(program("if x then set(1)").is_err());
        assert!(program("set(1) )").is_err());
        assert!(program("a.b").is_err());
    }
}
