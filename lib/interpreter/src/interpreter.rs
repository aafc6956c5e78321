use std::{cell::RefCell, io::Write, rc::Rc};

use cursor::Line;
use log::{debug, trace};
use parser::{Expr, LiteralValue, Parser, Stmt};
use scanner::TokenType;

mod environment;
mod error;
mod function;
mod value;

pub use environment::Environment;
pub use error::{InterpretError, RuntimeError, RuntimeErrorType};
pub use function::Function;
pub use value::Value;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Stack size for the thread that runs an interpreter.
///
/// Every Lox call nests several Rust frames, so deep recursion outgrows the
/// default thread stack long before it outgrows this.
pub const STACK_SIZE: usize = 64 * 1024 * 1024;

/// An interpreter session.
///
/// Owns the global scope, so definitions made by one `run_source` call are
/// visible to the next one (which is what the REPL relies on).
#[derive(Debug, Default)]
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans, parses and executes `source`. `print` statements write to `output`.
    pub fn run_source(
        &mut self,
        source: &str,
        output: &mut impl Write,
    ) -> std::result::Result<(), InterpretError> {
        let tokens = scanner::scan(source)?;
        let stmts = Parser::new(tokens).parse()?;
        self.interpret(&stmts, output)?;
        Ok(())
    }

    pub fn interpret(&mut self, stmts: &[Stmt], output: &mut impl Write) -> Result<()> {
        let mut evaluator = Evaluator { environment: self.globals.clone(), output };
        for stmt in stmts {
            if let Flow::Return(value) = evaluator.execute(stmt)? {
                debug!("Top-level return of {value}, stopping");
                break;
            }
        }
        Ok(())
    }

    /// Looks up a global variable, mostly useful for embedding and tests.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name)
    }
}

/// How a statement finished.
#[derive(Debug)]
enum Flow {
    Normal,
    /// A `return` is unwinding towards the nearest function call.
    Return(Value),
}

struct Evaluator<'o> {
    environment: Rc<RefCell<Environment>>,
    output: &'o mut dyn Write,
}

impl Evaluator<'_> {
    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Print { keyword, value } => {
                let value = self.evaluate(value)?;
                writeln!(self.output, "{}", value).map_err(|e| {
                    RuntimeError::new(RuntimeErrorType::Output(e.to_string()), keyword.line())
                })?;
            }
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(name.lexeme(), value);
            }
            Stmt::Function(declaration) => {
                let function = Function::new(declaration.clone(), self.environment.clone());
                self.environment.borrow_mut().define(declaration.name.lexeme(), function.into());
            }
            Stmt::Block(stmts) => {
                let environment = Environment::new(self.environment.clone());
                return self.execute_block(stmts, environment);
            }
            Stmt::If { condition, then_branch, else_branch } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute(body)? {
                        return Ok(flow);
                    }
                }
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs `stmts` inside `environment`. The previous environment is
    /// restored afterwards, no matter how the statements finished.
    fn execute_block(&mut self, stmts: &[Stmt], environment: Environment) -> Result<Flow> {
        let previous =
            std::mem::replace(&mut self.environment, Rc::new(RefCell::new(environment)));

        let result = self.execute_all(stmts);

        self.environment = previous;
        result
    }

    fn execute_all(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            if let flow @ Flow::Return(_) = self.execute(stmt)? {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(LiteralValue::Number(n)) => Ok((*n).into()),
            Expr::Literal(LiteralValue::Str(s)) => Ok(s.clone().into()),
            Expr::Literal(LiteralValue::Boolean(b)) => Ok((*b).into()),
            Expr::Literal(LiteralValue::Nil) => Ok(Value::Nil),

            Expr::Grouping(expr) => self.evaluate(expr),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match (operator.ty(), right) {
                    (TokenType::Minus, Value::Number(n)) => Ok((-n).into()),
                    (TokenType::Minus, _) => Err(RuntimeError::new(
                        RuntimeErrorType::OperandMustBeNumber,
                        operator.line(),
                    )),
                    (TokenType::Bang, v) => Ok((!v.is_truthy()).into()),
                    (ty, _) => unreachable!("Parser produced unary operator {ty:?}"),
                }
            }

            Expr::Variable(name) => self.environment.borrow().get(name.lexeme()).ok_or_else(|| {
                RuntimeError::new(
                    RuntimeErrorType::UndefinedVariable(name.lexeme().to_string()),
                    name.line(),
                )
            }),

            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                if self.environment.borrow_mut().assign(name.lexeme(), value.clone()) {
                    Ok(value)
                } else {
                    Err(RuntimeError::new(
                        RuntimeErrorType::UndefinedVariable(name.lexeme().to_string()),
                        name.line(),
                    ))
                }
            }

            Expr::Logical { left, operator, right } => {
                let left = self.evaluate(left)?;
                match (operator.ty(), left.is_truthy()) {
                    (TokenType::Or, true) | (TokenType::And, false) => Ok(left),
                    _ => self.evaluate(right),
                }
            }

            Expr::Binary { left, operator, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(operator.ty(), &left, &right).ok_or_else(|| {
                    RuntimeError::new(RuntimeErrorType::OperandsMustBeNumbers, operator.line())
                })
            }

            Expr::Call { callee, closing_paren, arguments } => {
                self.evaluate_call(callee, arguments, closing_paren.line())
            }
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, arguments: &[Expr], line: Line) -> Result<Value> {
        let callee = self.evaluate(callee)?;
        let arguments =
            arguments.iter().map(|arg| self.evaluate(arg)).collect::<Result<Vec<_>>>()?;

        match callee {
            Value::Function(function) => self.call(&function, arguments, line),
            _ => Err(RuntimeError::new(RuntimeErrorType::NotCallable, line)),
        }
    }

    fn call(&mut self, function: &Function, arguments: Vec<Value>, line: Line) -> Result<Value> {
        if arguments.len() != function.arity() {
            return Err(RuntimeError::new(
                RuntimeErrorType::ArityMismatch { expected: function.arity(), got: arguments.len() },
                line,
            ));
        }

        trace!("Calling {function} with {} argument(s)", arguments.len());

        // Chained to the declaring scope, not the caller's
        let mut environment = Environment::new(function.closure());
        for (param, argument) in function.declaration().params.iter().zip(arguments) {
            environment.define(param.lexeme(), argument);
        }

        match self.execute_block(&function.declaration().body, environment)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

/// Binary operators on already evaluated operands. `None` means the operand types don't fit.
fn binary(operator: TokenType, left: &Value, right: &Value) -> Option<Value> {
    use TokenType::*;

    match operator {
        EqualEqual => return Some((left == right).into()),
        BangEqual => return Some((left != right).into()),
        _ => (),
    }

    let (Value::Number(l), Value::Number(r)) = (left, right) else {
        return None;
    };

    Some(match operator {
        Plus => (l + r).into(),
        Minus => (l - r).into(),
        Star => (l * r).into(),
        // Division by zero is not an error, it yields inf or NaN
        Slash => (l / r).into(),
        Greater => (l > r).into(),
        GreaterEqual => (l >= r).into(),
        Less => (l < r).into(),
        LessEqual => (l <= r).into(),
        ty => unreachable!("Parser produced binary operator {ty:?}"),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[ctor::ctor]
    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn run(source: &str) -> String {
        let mut output = Vec::new();
        Interpreter::new().run_source(source, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn runtime_error(source: &str) -> RuntimeError {
        let mut output = Vec::new();
        match Interpreter::new().run_source(source, &mut output) {
            Err(InterpretError::RuntimeError(e)) => e,
            other => panic!("Expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run("print 1 + 2 * 3;"), "7\n");
        assert_eq!(run("print 1 - 2 - 3;"), "-4\n");
        assert_eq!(run("print (1 + 2) * 3;"), "9\n");
        assert_eq!(run("print 7 / 2;"), "3.5\n");
        assert_eq!(run("print -(2 + 3);"), "-5\n");
        assert_eq!(run("print 1 / 0;"), "Infinity\n");
        assert_eq!(run("print -1 / 0;"), "-Infinity\n");
        assert_eq!(run("print 0 / 0;"), "NaN\n");
    }

    #[test]
    fn comparison_and_equality() {
        assert_eq!(
            run("print 1 < 2; print 2 <= 2; print 3 > 4; print 3 >= 4;"),
            "true\ntrue\nfalse\nfalse\n"
        );
        assert_eq!(run("print 1 == 1; print 1 != 1;"), "true\nfalse\n");
        assert_eq!(run("print nil == nil; print nil == false;"), "true\nfalse\n");
        assert_eq!(run("print 1 == \"1\"; print \"a\" == \"a\";"), "false\ntrue\n");
        assert_eq!(run("fun f() {} fun g() {} print f == f; print f == g;"), "true\nfalse\n");
    }

    #[test]
    fn truthiness() {
        assert_eq!(run("if (0) print 1; else print 2;"), "1\n");
        assert_eq!(run("if (\"\") print 1; else print 2;"), "1\n");
        assert_eq!(run("if (nil) print 1; else print 2;"), "2\n");
        assert_eq!(run("print !0; print !nil; print !false;"), "false\ntrue\ntrue\n");
    }

    #[test]
    fn logical_short_circuit() {
        assert_eq!(run("print nil or \"yes\"; print 1 or boom;"), "yes\n1\n");
        assert_eq!(run("print false and boom; print 1 and 2;"), "false\n2\n");
        assert_eq!(run("var a = 0; true or (a = 1); false and (a = 2); print a;"), "0\n");
    }

    #[test]
    fn variables_and_scopes() {
        assert_eq!(run("var a; print a;"), "nil\n");
        assert_eq!(
            run("var a = 1; { var a = 2; print a; a = 3; print a; } print a;"),
            "2\n3\n1\n"
        );
        assert_eq!(run("var a = 1; { a = 2; } print a;"), "2\n");
        assert_eq!(run("var a = 1; var a = 2; print a;"), "2\n");
        assert_eq!(run("var a; print a = 5;"), "5\n");
    }

    #[test]
    fn control_flow() {
        assert_eq!(run("var i = 0; while (i < 3) { print i; i = i + 1; }"), "0\n1\n2\n");
        assert_eq!(run("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
        assert_eq!(run("if (false) print 1;"), "");
        assert_eq!(run("if (true) if (false) print 1; else print 2;"), "2\n");
    }

    #[test]
    fn functions() {
        assert_eq!(run("fun add(a, b) { return a + b; } print add(1, 2);"), "3\n");
        assert_eq!(run("fun f() {} print f();"), "nil\n");
        assert_eq!(run("fun f() { return; } print f();"), "nil\n");
        assert_eq!(run("fun f() {} print f;"), "<fn f>\n");
        let fib = "fun fib(n) { if (n <= 1) return n; return fib(n - 2) + fib(n - 1); }";
        assert_eq!(run(&format!("{fib} print fib(10);")), "55\n");
        assert_eq!(
            run("fun f() { while (true) { { return \"out\"; } } } print f();"),
            "out\n"
        );
    }

    #[test]
    fn closures_capture_by_reference() {
        let source = r#"
            var get;
            {
                var a = "before";
                fun show() { return a; }
                get = show;
                a = "after";
            }
            print get();
        "#;
        assert_eq!(run(source), "after\n");

        let counter = r#"
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var c1 = makeCounter();
            var c2 = makeCounter();
            print c1(); print c1(); print c2();
        "#;
        assert_eq!(run(counter), "1\n2\n1\n");
    }

    #[test]
    fn lexical_not_dynamic_scope() {
        let source = r#"
            var x = "global";
            fun show() { return x; }
            fun caller() { var x = "local"; return show(); }
            print caller();
        "#;
        assert_eq!(run(source), "global\n");
    }

    #[test]
    fn chained_calls() {
        let source = r#"
            fun outer() { fun inner(x) { return x * 2; } return inner; }
            print outer()(21);
        "#;
        assert_eq!(run(source), "42\n");
    }

    #[test]
    fn deep_recursion() {
        let source = "fun f(n) { if (n > 0) return f(n - 1); return n; } print f(1000);";
        let output = std::thread::Builder::new()
            .stack_size(STACK_SIZE)
            .spawn(move || run(source))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(output, "0\n");
    }

    #[test]
    fn runtime_errors() {
        let e = runtime_error("print -\"a\";");
        assert_eq!(e.error, RuntimeErrorType::OperandMustBeNumber);

        let e = runtime_error("print 1 + \"a\";");
        assert_eq!(e.error, RuntimeErrorType::OperandsMustBeNumbers);

        let e = runtime_error("print \"a\" + \"b\";");
        assert_eq!(e.error, RuntimeErrorType::OperandsMustBeNumbers);

        let e = runtime_error("print 1 < nil;");
        assert_eq!(e.error, RuntimeErrorType::OperandsMustBeNumbers);

        let e = runtime_error("\n\nprint missing;");
        assert_eq!(e.error, RuntimeErrorType::UndefinedVariable("missing".into()));
        assert_eq!(e.line, Line(3));
        assert_eq!(e.to_string(), "Undefined variable 'missing'.");

        let e = runtime_error("missing = 1;");
        assert_eq!(e.error, RuntimeErrorType::UndefinedVariable("missing".into()));

        let e = runtime_error("\"not a function\"();");
        assert_eq!(e.error, RuntimeErrorType::NotCallable);

        let e = runtime_error("fun f(a, b) {} f(1);");
        assert_eq!(e.error, RuntimeErrorType::ArityMismatch { expected: 2, got: 1 });
        assert_eq!(e.to_string(), "Expected 2 arguments but got 1.");
    }

    #[test]
    fn output_before_runtime_error_is_kept() {
        let mut output = Vec::new();
        let result = Interpreter::new().run_source("print 1; print nope; print 2;", &mut output);
        assert!(matches!(result, Err(InterpretError::RuntimeError(_))));
        assert_eq!(String::from_utf8(output).unwrap(), "1\n");
    }

    #[test]
    fn environment_restored_after_error() {
        let mut interpreter = Interpreter::new();
        let mut output = Vec::new();
        let source = "var a = \"global\"; fun f() { var a = \"local\"; return -a; }";
        interpreter.run_source(source, &mut output).unwrap();
        assert!(interpreter.run_source("f();", &mut output).is_err());
        assert!(interpreter.run_source("{ var b = 1; print -nil; }", &mut output).is_err());

        // the block's scope is gone, the global one is current again
        assert!(matches!(
            interpreter.run_source("print b;", &mut output),
            Err(InterpretError::RuntimeError(_))
        ));
        interpreter.run_source("print a;", &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "global\n");
    }

    #[test]
    fn session_state_persists() {
        let mut interpreter = Interpreter::new();
        let mut output = Vec::new();
        interpreter.run_source("var a = 1; fun inc() { a = a + 1; }", &mut output).unwrap();
        interpreter.run_source("inc(); inc();", &mut output).unwrap();
        interpreter.run_source("print a;", &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "3\n");
        assert_eq!(interpreter.global("a"), Some(3.0.into()));

        // a fresh session starts from scratch
        assert_eq!(Interpreter::new().global("a"), None);
    }

    #[test]
    fn deterministic_across_fresh_sessions() {
        let source = "var x = 0; for (var i = 0; i < 5; i = i + 1) { x = x + i; print x; }";
        assert_eq!(run(source), run(source));
    }

    #[test]
    fn compile_errors_prevent_execution() {
        let mut output = Vec::new();
        let result = Interpreter::new().run_source("print 1; print ;", &mut output);
        assert!(matches!(result, Err(InterpretError::CompileError(_))));
        assert!(output.is_empty());

        let result = Interpreter::new().run_source("print 1; print \"open;", &mut output);
        assert!(matches!(result, Err(InterpretError::ScanError(_))));
        assert!(output.is_empty());
    }

    #[test]
    fn interpret_pre_parsed_statements() {
        let stmts = Parser::new(scanner::scan("print 40 + 2;").unwrap()).parse().unwrap();
        let mut output = Vec::new();
        Interpreter::new().interpret(&stmts, &mut output).unwrap();
        assert_eq!(output, b"42\n");
    }
}
