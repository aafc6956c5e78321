use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use itertools::Itertools;
use scanner::Token;

use crate::Expr;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Expression(Expr),
    Function(Rc<FunctionDecl>),
    If { condition: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    Print { keyword: Token, value: Expr },
    Return { keyword: Token, value: Option<Expr> },
    Var { name: Token, initializer: Option<Expr> },
    While { condition: Expr, body: Box<Stmt> },
}

/// A `fun` declaration. Shared between the AST and every closure created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

impl FunctionDecl {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Block(stmts) if stmts.is_empty() => write!(f, "(block)"),
            Stmt::Block(stmts) => write!(f, "(block {})", stmts.iter().join(" ")),
            Stmt::Expression(expr) => write!(f, "(; {})", expr),
            Stmt::Function(decl) => write!(
                f,
                "(fun {} ({}) {})",
                decl.name,
                decl.params.iter().join(" "),
                decl.body.iter().join(" ")
            ),
            Stmt::If { condition, then_branch, else_branch: Some(else_branch) } => {
                write!(f, "(if {} {} {})", condition, then_branch, else_branch)
            }
            Stmt::If { condition, then_branch, else_branch: None } => {
                write!(f, "(if {} {})", condition, then_branch)
            }
            Stmt::Print { value, .. } => write!(f, "(print {})", value),
            Stmt::Return { value: Some(value), .. } => write!(f, "(return {})", value),
            Stmt::Return { value: None, .. } => write!(f, "(return)"),
            Stmt::Var { name, initializer: Some(init) } => write!(f, "(var {} {})", name, init),
            Stmt::Var { name, initializer: None } => write!(f, "(var {})", name),
            Stmt::While { condition, body } => write!(f, "(while {} {})", condition, body),
        }
    }
}
