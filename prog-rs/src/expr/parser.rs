//! Expression lexer, AST and parser.
//!
//! Operator precedence (lowest → highest):
//!   or  →  and  →  comparison  →  additive  →  multiplicative  →
//!   unary  →  postfix `[index]`  →  primary

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    /// `@name` variable reference.
    Var(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq, // ==
    Ne, // !=
    Lt,
    Le,
    Gt,
    Ge,

    And, // && or `and`
    Or,  // || or `or`

    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    /// Unrecognised input character, reported by the parser.
    Unknown(char),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer {
    src: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer { src: src.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self, first: char) -> Result<Token, String> {
        let mut s = String::from(first);
        while let Some(c @ '0'..='9') = self.peek() {
            s.push(c);
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some('0'..='9')) {
            self.pos += 1;
            s.push('.');
            while let Some(c @ '0'..='9') = self.peek() {
                s.push(c);
                self.pos += 1;
            }
        }
        s.parse()
            .map(Token::Number)
            .map_err(|_| format!("invalid number literal '{s}'"))
    }

    fn read_text(&mut self, quote: char) -> Result<Token, String> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err("unterminated text literal".into()),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c) => s.push(c),
                    None => return Err("unterminated text literal".into()),
                },
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Text(s))
    }

    fn read_word(&mut self, first: Option<char>) -> String {
        let mut s = String::new();
        if let Some(c) = first {
            s.push(c);
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        s
    }

    fn next_token(&mut self) -> Result<Token, String> {
        self.skip_ws();
        let Some(ch) = self.advance() else {
            return Ok(Token::Eof);
        };

        Ok(match ch {
            '0'..='9' => self.read_number(ch)?,
            '"' | '\'' => self.read_text(ch)?,
            '@' => {
                let name = self.read_word(None);
                if name.is_empty() {
                    return Err("expected a variable name after '@'".into());
                }
                Token::Var(name)
            }
            c if c.is_ascii_alphabetic() => {
                let word = self.read_word(Some(c));
                match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Bang,
                    _ => Token::Ident(word),
                }
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => {
                if self.eat('=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else {
                    Token::Unknown('=')
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    Token::And
                } else {
                    Token::Unknown('&')
                }
            }
            '|' => {
                if self.eat('|') {
                    Token::Or
                } else {
                    Token::Unknown('|')
                }
            }
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            c => Token::Unknown(c),
        })
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = matches!(t, Token::Eof);
            tokens.push(t);
            if done {
                break;
            }
        }
        Ok(tokens)
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Deepest expression the parser accepts, counting both tree height and
/// bracket nesting.  Checking and evaluation recurse over the tree, so this
/// also bounds their stack use.
pub const MAX_EXPR_DEPTH: usize = 100;

const TOO_DEEP: &str = "expression nested too deeply";

/// Height of `expr`, counted no further than `cap`.
fn height(expr: &Expr, cap: usize) -> usize {
    if cap == 0 {
        return 0;
    }
    1 + match expr {
        Expr::Unary(_, e) => height(e, cap - 1),
        Expr::Binary(_, l, r) | Expr::Index(l, r) => height(l, cap - 1).max(height(r, cap - 1)),
        Expr::Call(_, args) => args.iter().map(|a| height(a, cap - 1)).max().unwrap_or(0),
        Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) | Expr::Var(_) => 0,
    }
}

/// Reject a freshly built node whose tree is taller than [`MAX_EXPR_DEPTH`].
fn bounded(expr: Expr) -> Result<Expr, String> {
    if height(&expr, MAX_EXPR_DEPTH + 1) > MAX_EXPR_DEPTH {
        Err(TOO_DEEP.into())
    } else {
        Ok(expr)
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0, depth: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = bounded(Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs)))?;
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_comparison()?;
            lhs = bounded(Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs)))?;
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinOp::Eq,
                Token::Ne => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = bounded(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))?;
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = bounded(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))?;
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = bounded(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))?;
        }
        Ok(lhs)
    }

    // Every nested `(`, `[`, call argument and prefix operator passes
    // through here, so the depth counter bounds parser recursion.
    fn parse_unary(&mut self) -> Result<Expr, String> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            return Err(TOO_DEEP.into());
        }
        let expr = match self.peek() {
            Token::Minus => {
                self.pos += 1;
                bounded(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::Bang => {
                self.pos += 1;
                bounded(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        };
        self.depth -= 1;
        expr
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::LBracket) {
            let index = self.parse_or()?;
            if !self.eat(&Token::RBracket) {
                return Err("expected ']'".into());
            }
            expr = bounded(Expr::Index(Box::new(expr), Box::new(index)))?;
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let tok = self.advance();
        match tok {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Text(s) => Ok(Expr::Text(s)),
            Token::Var(name) => Ok(Expr::Var(name)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        args.push(self.parse_or()?);
                        while self.eat(&Token::Comma) {
                            args.push(self.parse_or()?);
                        }
                    }
                    if !self.eat(&Token::RParen) {
                        return Err(format!("expected ')' after arguments to {name}"));
                    }
                    return bounded(Expr::Call(name, args));
                }
                match name.to_ascii_lowercase().as_str() {
                    "true" => Ok(Expr::Boolean(true)),
                    "false" => Ok(Expr::Boolean(false)),
                    // A bare identifier names a variable, like `@name`.
                    _ => Ok(Expr::Var(name)),
                }
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err("expected ')'".into());
                }
                Ok(inner)
            }
            Token::Eof => Err("unexpected end of expression".into()),
            Token::Unknown(c) => Err(format!("unexpected character '{c}'")),
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

/// Parse an expression string into an AST.
///
/// The whole input must be consumed; trailing tokens are an error.
pub fn parse_expr(src: &str) -> Result<Expr, String> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_or()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        Token::Unknown(c) => Err(format!("unexpected character '{c}'")),
        other => Err(format!("unexpected {other:?} after expression")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
