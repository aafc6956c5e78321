use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::value::Value;

/// One lexical scope plus the scope it is nested in.
///
/// Scopes are shared: a block in progress, every closure created inside it
/// and any nested scope all hold the same `Rc`, so an assignment through one
/// of them is seen by all the others.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new(enclosing: Rc<RefCell<Environment>>) -> Self {
        Self { values: HashMap::new(), enclosing: Some(enclosing) }
    }

    /// Binds `name` in this scope, replacing any previous binding of the same scope.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        match self.values.get(name) {
            Some(value) => Some(value.clone()),
            None => self.enclosing.as_ref()?.borrow().get(name),
        }
    }

    /// Rebinds `name` in the innermost scope that defines it. Returns false if none does.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            return true;
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn global() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    #[test]
    fn define_and_get() {
        let mut env = Environment::default();
        assert_eq!(env.get("a"), None);

        env.define("a", 1.0.into());
        assert_eq!(env.get("a"), Some(1.0.into()));

        // redefinition in the same scope overwrites
        env.define("a", "x".into());
        assert_eq!(env.get("a"), Some("x".into()));
    }

    #[test]
    fn lookup_walks_outwards() {
        let outer = global();
        outer.borrow_mut().define("a", 1.0.into());
        outer.borrow_mut().define("b", 2.0.into());

        let mut inner = Environment::new(outer.clone());
        inner.define("b", 3.0.into());

        assert_eq!(inner.get("a"), Some(1.0.into()));
        assert_eq!(inner.get("b"), Some(3.0.into()));
        assert_eq!(outer.borrow().get("b"), Some(2.0.into()));
        assert_eq!(inner.get("c"), None);
    }

    #[test]
    fn assign_mutates_defining_scope() {
        let outer = global();
        outer.borrow_mut().define("a", 1.0.into());

        let mut inner = Environment::new(outer.clone());
        assert!(inner.assign("a", 5.0.into()));
        assert_eq!(outer.borrow().get("a"), Some(5.0.into()));

        // the inner scope got no binding of its own
        inner.define("b", Value::Nil);
        assert!(!outer.borrow_mut().assign("b", 1.0.into()));
        assert!(!inner.assign("missing", 1.0.into()));
        assert_eq!(inner.get("missing"), None);
    }

    #[test]
    fn siblings_share_enclosing_scope() {
        let outer = global();
        outer.borrow_mut().define("shared", 0.0.into());

        let mut first = Environment::new(outer.clone());
        let second = Environment::new(outer.clone());

        first.assign("shared", 42.0.into());
        assert_eq!(second.get("shared"), Some(42.0.into()));
    }
}
