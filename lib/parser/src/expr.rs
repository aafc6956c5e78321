use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use itertools::Itertools;
use scanner::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Assign { name: Token, value: Box<Expr> },
    Binary { left: Box<Expr>, operator: Token, right: Box<Expr> },
    Call { callee: Box<Expr>, closing_paren: Token, arguments: Vec<Expr> },
    Grouping(Box<Expr>),
    Literal(LiteralValue),
    Logical { left: Box<Expr>, operator: Token, right: Box<Expr> },
    Unary { operator: Token, right: Box<Expr> },
    Variable(Token),
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Assign { name, value } => write!(f, "(= {} {})", name, value),
            Expr::Binary { left, operator, right } | Expr::Logical { left, operator, right } => {
                write!(f, "({} {} {})", operator, left, right)
            }
            Expr::Call { callee, arguments, .. } if arguments.is_empty() => {
                write!(f, "(call {})", callee)
            }
            Expr::Call { callee, arguments, .. } => {
                write!(f, "(call {} {})", callee, arguments.iter().join(" "))
            }
            Expr::Grouping(expression) => write!(f, "(group {})", expression),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Unary { operator, right } => write!(f, "({} {})", operator, right),
            Expr::Variable(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    Str(Rc<str>),
    Boolean(bool),
    Nil,
}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Number(n) => write!(f, "{}", n),
            LiteralValue::Str(s) => write!(f, "\"{}\"", s),
            LiteralValue::Boolean(b) => write!(f, "{}", b),
            LiteralValue::Nil => write!(f, "nil"),
        }
    }
}
