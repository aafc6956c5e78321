use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    rc::Rc,
};

use parser::FunctionDecl;

use crate::environment::Environment;

/// A user-defined function together with the scope it was declared in.
pub struct Function {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Rc<RefCell<Environment>>) -> Self {
        Self { declaration, closure }
    }

    pub fn arity(&self) -> usize {
        self.declaration.arity()
    }

    pub fn name(&self) -> &str {
        self.declaration.name.lexeme()
    }

    pub fn declaration(&self) -> &FunctionDecl {
        &self.declaration
    }

    pub fn closure(&self) -> Rc<RefCell<Environment>> {
        self.closure.clone()
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The closure usually contains this very function, so printing it would never end
        f.debug_struct("Function").field("name", &self.name()).field("arity", &self.arity()).finish()
    }
}
