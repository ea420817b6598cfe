//! String expressions over named event columns.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or    := and ( "||" and )*
//! and   := cmp ( "&&" cmp )*
//! cmp   := add ( ("==" | "!=" | "<" | "<=" | ">" | ">=") add )*
//! add   := mul ( ("+" | "-") mul )*
//! mul   := unary ( ("*" | "/") unary )*
//! unary := ("-" | "!") unary | atom
//! atom  := number | column | func "(" or ("," or)* ")" | "(" or ")"
//! ```
//!
//! Comparisons and boolean operators produce `1.0` or `0.0`; any value
//! above zero is true.

use ro_types::EvaluationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Abs,
    Sqrt,
    Log,
    Exp,
    Pow,
    Min,
    Max,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Builtin::Abs,
            "sqrt" => Builtin::Sqrt,
            "log" => Builtin::Log,
            "exp" => Builtin::Exp,
            "pow" => Builtin::Pow,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Builtin::Pow | Builtin::Min | Builtin::Max => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Builtin::Abs => args[0].abs(),
            Builtin::Sqrt => args[0].sqrt(),
            Builtin::Log => args[0].ln(),
            Builtin::Exp => args[0].exp(),
            Builtin::Pow => args[0].powf(args[1]),
            Builtin::Min => args[0].min(args[1]),
            Builtin::Max => args[0].max(args[1]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Op {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        let truth = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            Op::Add => lhs + rhs,
            Op::Sub => lhs - rhs,
            Op::Mul => lhs * rhs,
            Op::Div => lhs / rhs,
            Op::Eq => truth(lhs == rhs),
            Op::Ne => truth(lhs != rhs),
            Op::Lt => truth(lhs < rhs),
            Op::Le => truth(lhs <= rhs),
            Op::Gt => truth(lhs > rhs),
            Op::Ge => truth(lhs >= rhs),
            Op::And => truth(lhs > 0.0 && rhs > 0.0),
            Op::Or => truth(lhs > 0.0 || rhs > 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    /// Index into the expression's column list.
    Column(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Builtin, Vec<Node>),
}

impl Node {
    fn eval(&self, row: &[f64]) -> f64 {
        match self {
            Node::Const(v) => *v,
            Node::Column(i) => row[*i],
            Node::Neg(inner) => -inner.eval(row),
            Node::Not(inner) => {
                if inner.eval(row) > 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
            Node::Binary(op, lhs, rhs) => op.apply(lhs.eval(row), rhs.eval(row)),
            Node::Call(f, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(row)).collect();
                f.apply(&values)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Op(Op),
    Bang,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Op(Op::Add));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Op(Op::Sub));
                i += 1;
            }
            '*' => {
                tokens.push(Token::Op(Op::Mul));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op(Op::Div));
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(Op::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(Op::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Op(Op::Le));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op(Op::Lt));
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Op(Op::Ge));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(Op::Gt));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::Op(Op::And));
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Op(Op::Or));
                i += 2;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number `{text}`"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character `{other}` at offset {i}")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    columns: Vec<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.bump() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(format!("expected {expected:?}, found {t:?}")),
            None => Err(format!("expected {expected:?}, found end of input")),
        }
    }

    fn column(&mut self, name: String) -> usize {
        match self.columns.iter().position(|c| *c == name) {
            Some(i) => i,
            None => {
                self.columns.push(name);
                self.columns.len() - 1
            }
        }
    }

    /// One left-associative precedence level.
    fn binary_level(
        &mut self,
        ops: &[Op],
        next: fn(&mut Self) -> Result<Node, String>,
    ) -> Result<Node, String> {
        let mut lhs = next(self)?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if !ops.contains(&op) {
                break;
            }
            self.pos += 1;
            let rhs = next(self)?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Node, String> {
        self.binary_level(&[Op::Or], Self::and)
    }

    fn and(&mut self) -> Result<Node, String> {
        self.binary_level(&[Op::And], Self::cmp)
    }

    fn cmp(&mut self) -> Result<Node, String> {
        self.binary_level(&[Op::Eq, Op::Ne, Op::Lt, Op::Le, Op::Gt, Op::Ge], Self::add)
    }

    fn add(&mut self) -> Result<Node, String> {
        self.binary_level(&[Op::Add, Op::Sub], Self::mul)
    }

    fn mul(&mut self) -> Result<Node, String> {
        self.binary_level(&[Op::Mul, Op::Div], Self::unary)
    }

    fn unary(&mut self) -> Result<Node, String> {
        match self.peek() {
            Some(Token::Op(Op::Sub)) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op(Op::Add)) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Bang) => {
                self.pos += 1;
                Ok(Node::Not(Box::new(self.unary()?)))
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Node, String> {
        match self.bump() {
            Some(Token::Number(v)) => Ok(Node::Const(v)),
            Some(Token::LParen) => {
                let inner = self.or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Node::Column(self.column(name)));
                }
                let func = Builtin::lookup(&name).ok_or_else(|| format!("unknown function `{name}`"))?;
                self.pos += 1;
                let mut args = vec![self.or()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.or()?);
                }
                self.expect(Token::RParen)?;
                if args.len() != func.arity() {
                    return Err(format!(
                        "`{name}` takes {} argument(s), got {}",
                        func.arity(),
                        args.len()
                    ));
                }
                Ok(Node::Call(func, args))
            }
            Some(t) => Err(format!("unexpected token {t:?}")),
            None => Err("unexpected end of input".to_string()),
        }
    }
}

/// A parsed expression with its column references resolved to slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
    columns: Vec<String>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, EvaluationError> {
        let fail = |message: String| EvaluationError::Expression {
            expression: source.to_string(),
            message,
        };

        let tokens = tokenize(source).map_err(fail)?;
        if tokens.is_empty() {
            return Err(fail("empty expression".to_string()));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            columns: Vec::new(),
        };
        let root = parser.or().map_err(fail)?;
        if let Some(extra) = parser.peek() {
            return Err(fail(format!("unexpected trailing token {extra:?}")));
        }

        Ok(Self {
            source: source.to_string(),
            root,
            columns: parser.columns,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Column names in first-reference order; `evaluate_row` expects values
    /// in this order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn evaluate_row(&self, values: &[f64]) -> f64 {
        self.root.eval(values)
    }

    /// Evaluate over `num_rows` rows. `columns` is parallel to
    /// [`Self::columns`] and every slice holds at least `num_rows` values.
    pub fn evaluate_columns(&self, columns: &[&[f64]], num_rows: usize) -> Vec<f64> {
        let mut row = vec![0.0; columns.len()];
        (0..num_rows)
            .map(|i| {
                for (slot, column) in row.iter_mut().zip(columns) {
                    *slot = column[i];
                }
                self.root.eval(&row)
            })
            .collect()
    }
}
