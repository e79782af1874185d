//! Tree-walking evaluator.
//!
//! Every statement, loop iteration and call draws from a step budget and calls
//! nest up to a depth limit, so runaway authored code fails with a diagnostic
//! instead of hanging the host.

use super::ast::*;
use super::error::RuntimeError;
use super::hooks::RenderFrame;
use super::methods;
use super::scope::{Scope, ScopeError};
use super::value::{
    check_array_length, check_string_length, error_value, loose_equals, strict_equals, Function,
    FunctionKind, PropertyMap, Value,
};
use super::{CompilerSettings, STACK_RED_ZONE, STACK_SEGMENT};
use std::cell::RefCell;
use std::rc::Rc;

/// Abrupt completion that unwinds through Rust frames.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// A catchable JavaScript exception.
    Throw(Value),
    /// Uncatchable: budget exhaustion, hook misuse.
    Fatal(RuntimeError),
}

impl Interrupt {
    pub fn type_error(message: impl Into<String>) -> Self {
        Interrupt::Throw(error_value("TypeError", message))
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Interrupt::Throw(error_value("ReferenceError", message))
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Interrupt::Throw(error_value("RangeError", message))
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Interrupt::Throw(error_value("SyntaxError", message))
    }

    pub fn into_runtime_error(self) -> RuntimeError {
        match self {
            Interrupt::Throw(value) => RuntimeError::Uncaught(value.to_js_string()),
            Interrupt::Fatal(err) => err,
        }
    }
}

impl From<RuntimeError> for Interrupt {
    fn from(err: RuntimeError) -> Self {
        Interrupt::Fatal(err)
    }
}

pub type Flow<T> = Result<T, Interrupt>;

enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Clone, Copy)]
enum BindMode {
    Let,
    Const,
    Var,
    Param,
}

impl From<DeclKind> for BindMode {
    fn from(kind: DeclKind) -> Self {
        match kind {
            DeclKind::Let => BindMode::Let,
            DeclKind::Const => BindMode::Const,
            DeclKind::Var => BindMode::Var,
        }
    }
}

pub struct Interpreter {
    steps: u64,
    step_budget: u64,
    depth: usize,
    max_depth: usize,
    pub(crate) frame: Option<RenderFrame>,
}

impl Interpreter {
    pub fn new(settings: &CompilerSettings) -> Self {
        Self {
            steps: 0,
            step_budget: settings.step_budget,
            depth: 0,
            max_depth: settings.max_call_depth,
            frame: None,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn tick(&mut self) -> Flow<()> {
        self.steps += 1;
        if self.steps > self.step_budget {
            return Err(Interrupt::Fatal(RuntimeError::StepBudgetExceeded(
                self.step_budget,
            )));
        }
        Ok(())
    }

    /// The active render frame; hooks fail outside of one.
    pub(crate) fn frame_mut(&mut self, hook: &'static str) -> Flow<&mut RenderFrame> {
        self.frame
            .as_mut()
            .ok_or(Interrupt::Fatal(RuntimeError::HookOutsideRender(hook)))
    }

    pub fn run_program(&mut self, program: &Program, scope: &Rc<Scope>) -> Flow<()> {
        self.hoist(&program.body, scope);
        self.exec_stmts(&program.body, scope)?;
        Ok(())
    }

    fn hoist(&mut self, stmts: &[Stmt], scope: &Rc<Scope>) {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    scope.define(name, make_closure(def, scope), true);
                }
            }
        }
    }

    // Statements

    fn exec_stmts(&mut self, stmts: &[Stmt], scope: &Rc<Scope>) -> Flow<Completion> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_block(&mut self, stmts: &[Stmt], parent: &Rc<Scope>) -> Flow<Completion> {
        let scope = Scope::child(parent, false);
        self.hoist(stmts, &scope);
        self.exec_stmts(stmts, &scope)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Flow<Completion> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.run_stmt(stmt, scope))
    }

    fn run_stmt(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Flow<Completion> {
        self.tick()?;
        match stmt {
            Stmt::Decl { kind, decls } => {
                for (pattern, init) in decls {
                    match (init, pattern, kind) {
                        (None, Pattern::Ident(name), DeclKind::Var) => {
                            scope.declare_var(name, None);
                        }
                        _ => {
                            let value = match init {
                                Some(expr) => self.eval(expr, scope)?,
                                None => Value::Undefined,
                            };
                            self.bind_pattern(pattern, value, scope, (*kind).into())?;
                        }
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Completion::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec_stmt(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::Block(stmts) => self.exec_block(stmts, scope),
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, scope),
            Stmt::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, scope)?;
                let items = self.iterate(&iterable)?;
                self.exec_each(items, *kind, pattern, body, scope)
            }
            Stmt::ForIn {
                kind,
                pattern,
                object,
                body,
            } => {
                let object = self.eval(object, scope)?;
                let keys = own_keys(&object).into_iter().map(Value::Str).collect();
                self.exec_each(keys, *kind, pattern, body, scope)
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    self.tick()?;
                }
                Ok(Completion::Normal)
            }
            Stmt::DoWhile { body, test } => {
                loop {
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if !self.eval(test, scope)?.truthy() {
                        break;
                    }
                    self.tick()?;
                }
                Ok(Completion::Normal)
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => self.exec_switch(discriminant, cases, scope),
            Stmt::Break => Ok(Completion::Break),
            Stmt::Continue => Ok(Completion::Continue),
            Stmt::Throw(expr) => Err(Interrupt::Throw(self.eval(expr, scope)?)),
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.exec_try(block, param.as_ref(), handler.as_deref(), finalizer.as_deref(), scope),
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &Rc<Scope>,
    ) -> Flow<Completion> {
        let loop_scope = Scope::child(scope, false);
        let mut per_iteration = Vec::new();
        if let Some(init) = init {
            if let Stmt::Decl {
                kind: DeclKind::Let | DeclKind::Const,
                decls,
            } = init
            {
                for (pattern, _) in decls {
                    pattern_names(pattern, &mut per_iteration);
                }
            }
            self.exec_stmt(init, &loop_scope)?;
        }
        loop {
            if let Some(test) = test {
                if !self.eval(test, &loop_scope)?.truthy() {
                    break;
                }
            }
            let iteration = Scope::child(&loop_scope, false);
            loop_scope.copy_bindings(&iteration, &per_iteration);
            let completion = self.exec_stmt(body, &iteration)?;
            iteration.copy_bindings(&loop_scope, &per_iteration);
            match completion {
                Completion::Break => break,
                Completion::Return(v) => return Ok(Completion::Return(v)),
                Completion::Normal | Completion::Continue => {}
            }
            if let Some(update) = update {
                self.eval(update, &loop_scope)?;
            }
            self.tick()?;
        }
        Ok(Completion::Normal)
    }

    fn exec_each(
        &mut self,
        items: Vec<Value>,
        kind: DeclKind,
        pattern: &Pattern,
        body: &Stmt,
        scope: &Rc<Scope>,
    ) -> Flow<Completion> {
        for item in items {
            let iteration = Scope::child(scope, false);
            self.bind_pattern(pattern, item, &iteration, kind.into())?;
            match self.exec_stmt(body, &iteration)? {
                Completion::Break => break,
                Completion::Return(v) => return Ok(Completion::Return(v)),
                Completion::Normal | Completion::Continue => {}
            }
            self.tick()?;
        }
        Ok(Completion::Normal)
    }

    fn exec_switch(
        &mut self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        scope: &Rc<Scope>,
    ) -> Flow<Completion> {
        let value = self.eval(discriminant, scope)?;
        let block = Scope::child(scope, false);
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if strict_equals(&value, &self.eval(test, &block)?) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };
        for case in &cases[start..] {
            self.hoist(&case.body, &block);
            match self.exec_stmts(&case.body, &block)? {
                Completion::Normal => {}
                Completion::Break => return Ok(Completion::Normal),
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        param: Option<&Pattern>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        scope: &Rc<Scope>,
    ) -> Flow<Completion> {
        let result = match (self.exec_block(block, scope), handler) {
            (Err(Interrupt::Throw(exception)), Some(handler)) => {
                let catch_scope = Scope::child(scope, false);
                match param {
                    Some(param) => self
                        .bind_pattern(param, exception, &catch_scope, BindMode::Let)
                        .and_then(|_| self.exec_block(handler, &catch_scope)),
                    None => self.exec_block(handler, &catch_scope),
                }
            }
            (other, _) => other,
        };
        if matches!(result, Err(Interrupt::Fatal(_))) {
            return result;
        }
        if let Some(finalizer) = finalizer {
            match self.exec_block(finalizer, scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    // Bindings

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        scope: &Rc<Scope>,
        mode: BindMode,
    ) -> Flow<()> {
        match pattern {
            Pattern::Ident(name) => self.bind_name(name, value, scope, mode),
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(Interrupt::type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                let mut used: Vec<Rc<str>> = Vec::new();
                for (key, elem) in props {
                    let key = match key {
                        PropKey::Named(name) => name.clone(),
                        PropKey::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
                    };
                    let item = self.get_property(&value, &key)?;
                    used.push(key);
                    self.bind_elem(elem, item, scope, mode)?;
                }
                if let Some(rest) = rest {
                    let mut remaining = PropertyMap::new();
                    if let Value::Object(map) = &value {
                        for (k, v) in map.borrow().iter() {
                            if !used.contains(k) {
                                remaining.set(k, v.clone());
                            }
                        }
                    }
                    self.bind_name(rest, Value::object(remaining), scope, mode)?;
                }
                Ok(())
            }
            Pattern::Array { elems, rest } => {
                let items = self.iterate(&value)?;
                for (i, elem) in elems.iter().enumerate() {
                    if let Some(elem) = elem {
                        let item = items.get(i).cloned().unwrap_or_default();
                        self.bind_elem(elem, item, scope, mode)?;
                    }
                }
                if let Some(rest) = rest {
                    let tail = items.get(elems.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    self.bind_pattern(rest, Value::array(tail), scope, mode)?;
                }
                Ok(())
            }
        }
    }

    fn bind_elem(
        &mut self,
        elem: &PatternElem,
        value: Value,
        scope: &Rc<Scope>,
        mode: BindMode,
    ) -> Flow<()> {
        let value = match (&value, &elem.default) {
            (Value::Undefined, Some(default)) => self.eval(default, scope)?,
            _ => value,
        };
        self.bind_pattern(&elem.pattern, value, scope, mode)
    }

    fn bind_name(&mut self, name: &Name, value: Value, scope: &Rc<Scope>, mode: BindMode) -> Flow<()> {
        let result = match mode {
            BindMode::Let => scope.declare(name, value, true),
            BindMode::Const => scope.declare(name, value, false),
            BindMode::Var => {
                scope.declare_var(name, Some(value));
                Ok(())
            }
            BindMode::Param => {
                scope.define(name, value, true);
                Ok(())
            }
        };
        result.map_err(|_| {
            Interrupt::syntax_error(format!("Identifier '{}' has already been declared", name))
        })
    }

    pub(crate) fn iterate(&self, value: &Value) -> Flow<Vec<Value>> {
        match value {
            Value::Array(items) => Ok(items.borrow().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
            other => Err(Interrupt::type_error(format!(
                "{} is not iterable",
                describe_value(other)
            ))),
        }
    }

    // Expressions

    pub fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Flow<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.eval_expr(expr, scope))
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Flow<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(i) {
                        out.push_str(&self.eval(expr, scope)?.to_js_string());
                    }
                    check_string_length(out.len())?;
                }
                Ok(Value::string(out))
            }
            Expr::Ident(name) => scope
                .lookup(name)
                .ok_or_else(|| Interrupt::reference_error(format!("{} is not defined", name))),
            Expr::Array(elems) => {
                let mut items = Vec::with_capacity(elems.len());
                for elem in elems {
                    match elem {
                        ArrayElem::Item(expr) => items.push(self.eval(expr, scope)?),
                        ArrayElem::Spread(expr) => {
                            let spread = self.eval(expr, scope)?;
                            items.extend(self.iterate(&spread)?);
                            check_array_length(items.len())?;
                        }
                        ArrayElem::Hole => items.push(Value::Undefined),
                    }
                }
                Ok(Value::array(items))
            }
            Expr::Object(props) => {
                let mut map = PropertyMap::new();
                for prop in props {
                    match prop {
                        ObjectProp::KeyValue(key, expr) => {
                            let key = match key {
                                PropKey::Named(name) => name.clone(),
                                PropKey::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
                            };
                            let value = self.eval(expr, scope)?;
                            map.set(&key, value);
                        }
                        ObjectProp::Spread(expr) => {
                            let spread = self.eval(expr, scope)?;
                            for key in own_keys(&spread) {
                                let value = self.get_property(&spread, &key)?;
                                map.set(&key, value);
                            }
                        }
                    }
                }
                Ok(Value::object(map))
            }
            Expr::Function(def) | Expr::Arrow(def) => Ok(make_closure(def, scope)),
            Expr::Unary(op, arg) => self.eval_unary(*op, arg, scope),
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = self.eval(target, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_to(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary_op(*op, &left, &right)
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left, scope)?;
                if logical_short_circuits(*op, &left) {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional(test, consequent, alternate) => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => match op {
                AssignOp::Assign => {
                    let value = self.eval(value, scope)?;
                    self.assign_to(target, value.clone(), scope)?;
                    Ok(value)
                }
                AssignOp::Arith(bin) => {
                    let current = self.eval(target, scope)?;
                    let rhs = self.eval(value, scope)?;
                    let value = self.binary_op(*bin, &current, &rhs)?;
                    self.assign_to(target, value.clone(), scope)?;
                    Ok(value)
                }
                AssignOp::Logical(logical) => {
                    let current = self.eval(target, scope)?;
                    if logical_short_circuits(*logical, &current) {
                        return Ok(current);
                    }
                    let value = self.eval(value, scope)?;
                    self.assign_to(target, value.clone(), scope)?;
                    Ok(value)
                }
            },
            Expr::Member { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or_default())
            }
            Expr::OptionalChain(inner) => Ok(self.eval_chain(inner, scope)?.unwrap_or_default()),
            Expr::New { callee, args } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                match &constructor {
                    Value::Function(f) if matches!(f.kind, FunctionKind::Native { .. }) => {
                        self.call_value(&constructor, args, &callee.describe())
                    }
                    _ => Err(Interrupt::type_error(format!(
                        "{} is not a constructor",
                        callee.describe()
                    ))),
                }
            }
            Expr::Delete(target) => {
                if let Expr::Member {
                    object, property, ..
                } = &**target
                {
                    let object = self.eval(object, scope)?;
                    let key = self.member_key(property, scope)?;
                    match &object {
                        Value::Object(map) => {
                            map.borrow_mut().remove(&key);
                        }
                        Value::Array(items) => {
                            if let Some(index) = array_index(&key) {
                                if let Some(slot) = items.borrow_mut().get_mut(index) {
                                    *slot = Value::Undefined;
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Value::Bool(true))
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    /// Evaluate a member/call chain; `None` when an optional link short-circuits.
    fn eval_chain(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Flow<Option<Value>> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                self.get_property(&target, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let Some(function) = self.eval_chain(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_args(args, scope)?;
                self.call_value(&function, args, &callee.describe()).map(Some)
            }
            other => self.eval(other, scope).map(Some),
        }
    }

    fn member_key(&mut self, property: &MemberProp, scope: &Rc<Scope>) -> Flow<Rc<str>> {
        Ok(match property {
            MemberProp::Named(name) => name.clone(),
            MemberProp::Computed(expr) => self.eval(expr, scope)?.to_property_key(),
        })
    }

    fn eval_args(&mut self, args: &[Arg], scope: &Rc<Scope>) -> Flow<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Item(expr) => out.push(self.eval(expr, scope)?),
                Arg::Spread(expr) => {
                    let spread = self.eval(expr, scope)?;
                    out.extend(self.iterate(&spread)?);
                    check_array_length(out.len())?;
                }
            }
        }
        Ok(out)
    }

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, scope: &Rc<Scope>) -> Flow<Value> {
        if op == UnaryOp::TypeOf {
            if let Expr::Ident(name) = arg {
                return Ok(Value::string(
                    scope.lookup(name).map(|v| v.type_of()).unwrap_or("undefined"),
                ));
            }
        }
        let value = self.eval(arg, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::BitNot => Value::Number(!to_int32(value.to_number()) as f64),
            UnaryOp::TypeOf => Value::string(value.type_of()),
            UnaryOp::Void => Value::Undefined,
        })
    }

    fn assign_to(&mut self, target: &Expr, value: Value, scope: &Rc<Scope>) -> Flow<()> {
        match target {
            Expr::Ident(name) => scope.assign(name, value).map_err(|err| match err {
                ScopeError::Constant => Interrupt::type_error("Assignment to constant variable."),
                _ => Interrupt::reference_error(format!("{} is not defined", name)),
            }),
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                set_property(&object, &key, value)
            }
            _ => Err(Interrupt::syntax_error("Invalid assignment target")),
        }
    }

    pub(crate) fn binary_op(&mut self, op: BinaryOp, a: &Value, b: &Value) -> Flow<Value> {
        Ok(match op {
            BinaryOp::Add => {
                let (a, b) = (to_primitive(a), to_primitive(b));
                if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
                    let (a, b) = (a.to_js_string(), b.to_js_string());
                    check_string_length(a.len() + b.len())?;
                    Value::string(a + &b)
                } else {
                    Value::Number(a.to_number() + b.to_number())
                }
            }
            BinaryOp::Sub => Value::Number(a.to_number() - b.to_number()),
            BinaryOp::Mul => Value::Number(a.to_number() * b.to_number()),
            BinaryOp::Div => Value::Number(a.to_number() / b.to_number()),
            BinaryOp::Rem => Value::Number(a.to_number() % b.to_number()),
            BinaryOp::Exp => Value::Number(a.to_number().powf(b.to_number())),
            BinaryOp::Eq => Value::Bool(loose_equals(a, b)),
            BinaryOp::NotEq => Value::Bool(!loose_equals(a, b)),
            BinaryOp::StrictEq => Value::Bool(strict_equals(a, b)),
            BinaryOp::StrictNotEq => Value::Bool(!strict_equals(a, b)),
            BinaryOp::Lt => Value::Bool(compare(a, b, |o| o.is_lt())),
            BinaryOp::Gt => Value::Bool(compare(a, b, |o| o.is_gt())),
            BinaryOp::LtEq => Value::Bool(compare(a, b, |o| o.is_le())),
            BinaryOp::GtEq => Value::Bool(compare(a, b, |o| o.is_ge())),
            BinaryOp::BitAnd => {
                Value::Number((to_int32(a.to_number()) & to_int32(b.to_number())) as f64)
            }
            BinaryOp::BitOr => {
                Value::Number((to_int32(a.to_number()) | to_int32(b.to_number())) as f64)
            }
            BinaryOp::BitXor => {
                Value::Number((to_int32(a.to_number()) ^ to_int32(b.to_number())) as f64)
            }
            BinaryOp::Shl => Value::Number(
                to_int32(a.to_number()).wrapping_shl(shift_count(b)) as f64,
            ),
            BinaryOp::Shr => Value::Number(
                to_int32(a.to_number()).wrapping_shr(shift_count(b)) as f64,
            ),
            BinaryOp::UShr => Value::Number(
                (to_int32(a.to_number()) as u32).wrapping_shr(shift_count(b)) as f64,
            ),
            BinaryOp::In => {
                let key = a.to_property_key();
                match b {
                    Value::Object(map) => Value::Bool(map.borrow().contains_key(&key)),
                    Value::Array(items) => Value::Bool(
                        &*key == "length"
                            || array_index(&key).is_some_and(|i| i < items.borrow().len()),
                    ),
                    Value::Function(f) => Value::Bool(f.props.borrow().contains_key(&key)),
                    other => {
                        return Err(Interrupt::type_error(format!(
                            "Cannot use 'in' operator to search for '{}' in {}",
                            key,
                            describe_value(other)
                        )))
                    }
                }
            }
        })
    }

    // Properties

    pub fn get_property(&self, value: &Value, key: &str) -> Flow<Value> {
        Ok(match value {
            Value::Undefined | Value::Null => {
                return Err(Interrupt::type_error(format!(
                    "Cannot read properties of {} (reading '{}')",
                    value.to_js_string(),
                    key
                )))
            }
            Value::Str(s) => {
                if key == "length" {
                    Value::Number(s.chars().count() as f64)
                } else if let Some(index) = array_index(key) {
                    s.chars()
                        .nth(index)
                        .map(|c| Value::string(c.to_string()))
                        .unwrap_or_default()
                } else if methods::is_string_method(key) {
                    Value::method(value.clone(), key)
                } else {
                    Value::Undefined
                }
            }
            Value::Array(items) => {
                if key == "length" {
                    Value::Number(items.borrow().len() as f64)
                } else if let Some(index) = array_index(key) {
                    items.borrow().get(index).cloned().unwrap_or_default()
                } else if methods::is_array_method(key) {
                    Value::method(value.clone(), key)
                } else {
                    Value::Undefined
                }
            }
            Value::Object(map) => match map.borrow().get(key) {
                Some(v) => v.clone(),
                None if methods::is_object_method(key) => Value::method(value.clone(), key),
                None => Value::Undefined,
            },
            Value::Function(f) => match f.props.borrow().get(key) {
                Some(v) => v.clone(),
                None if key == "name" => Value::string(f.name()),
                None => Value::Undefined,
            },
            Value::Number(_) if methods::is_number_method(key) => Value::method(value.clone(), key),
            Value::Bool(_) if key == "toString" => Value::method(value.clone(), key),
            Value::Number(_) | Value::Bool(_) | Value::Element(_) => Value::Undefined,
        })
    }

    // Calls

    /// Call `function` with `args`; `what` names the callee in error messages.
    pub fn call_value(&mut self, function: &Value, args: Vec<Value>, what: &str) -> Flow<Value> {
        match function {
            Value::Function(f) => self.call_rc(f.clone(), args),
            _ => Err(Interrupt::type_error(format!("{} is not a function", what))),
        }
    }

    pub fn call_function(&mut self, function: &Value, args: Vec<Value>) -> Flow<Value> {
        self.call_value(function, args, "value")
    }

    fn call_rc(&mut self, function: Rc<Function>, args: Vec<Value>) -> Flow<Value> {
        self.tick()?;
        if self.depth >= self.max_depth {
            return Err(Interrupt::Fatal(RuntimeError::CallDepthExceeded(
                self.max_depth,
            )));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || match &function.kind {
            FunctionKind::Closure { def, scope } => self.call_closure(def, scope, args),
            FunctionKind::Native { call, .. } => (**call)(self, &args),
            FunctionKind::Method { receiver, name } => {
                methods::call_method(self, receiver, name, &args)
            }
        });
        self.depth -= 1;
        result
    }

    fn call_closure(
        &mut self,
        def: &FunctionDef,
        captured: &Rc<Scope>,
        args: Vec<Value>,
    ) -> Flow<Value> {
        let scope = Scope::child(captured, true);
        for (i, param) in def.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or_default();
            self.bind_elem(param, value, &scope, BindMode::Param)?;
        }
        if let Some(rest) = &def.rest {
            let tail = args
                .get(def.params.len()..)
                .map(<[Value]>::to_vec)
                .unwrap_or_default();
            self.bind_pattern(rest, Value::array(tail), &scope, BindMode::Param)?;
        }
        match &def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(stmts) => {
                self.hoist(stmts, &scope);
                match self.exec_stmts(stmts, &scope)? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }
}

fn make_closure(def: &Rc<FunctionDef>, scope: &Rc<Scope>) -> Value {
    Value::Function(Rc::new(Function {
        kind: FunctionKind::Closure {
            def: def.clone(),
            scope: scope.clone(),
        },
        props: RefCell::new(PropertyMap::new()),
    }))
}

fn logical_short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !left.truthy(),
        LogicalOp::Or => left.truthy(),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Element(_) => {
            Value::string(value.to_js_string())
        }
        other => other.clone(),
    }
}

fn compare(a: &Value, b: &Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    let (a, b) = (to_primitive(a), to_primitive(b));
    if let (Value::Str(x), Value::Str(y)) = (&a, &b) {
        return accept(x.cmp(y));
    }
    a.to_number()
        .partial_cmp(&b.to_number())
        .is_some_and(accept)
}

pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

fn shift_count(b: &Value) -> u32 {
    (to_int32(b.to_number()) as u32) & 31
}

/// Canonical array index (`"0"`, `"12"`; not `"01"` or `"+1"`).
pub(crate) fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Enumerable own keys, in order.
pub(crate) fn own_keys(value: &Value) -> Vec<Rc<str>> {
    match value {
        Value::Object(map) => map.borrow().keys().cloned().collect(),
        Value::Array(items) => (0..items.borrow().len())
            .map(|i| Rc::from(i.to_string()))
            .collect(),
        Value::Str(s) => (0..s.chars().count()).map(|i| Rc::from(i.to_string())).collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn set_property(target: &Value, key: &str, value: Value) -> Flow<()> {
    match target {
        Value::Object(map) => map.borrow_mut().set(key, value),
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let len = value.to_number();
                if !(len >= 0.0 && len.fract() == 0.0) {
                    return Err(Interrupt::range_error("Invalid array length"));
                }
                check_array_length(len as usize)?;
                items.resize(len as usize, Value::Undefined);
            } else if let Some(index) = array_index(key) {
                if index >= items.len() {
                    check_array_length(index.saturating_add(1))?;
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
            }
        }
        Value::Function(f) => f.props.borrow_mut().set(key, value),
        Value::Undefined | Value::Null => {
            return Err(Interrupt::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                target.to_js_string(),
                key
            )))
        }
        _ => {}
    }
    Ok(())
}

pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("\"{}\"", s),
        Value::Function(f) => format!("function {}", f.name()),
        Value::Object(_) | Value::Element(_) => "object".to_string(),
        other => other.to_js_string(),
    }
}

fn pattern_names(pattern: &Pattern, out: &mut Vec<Name>) {
    match pattern {
        Pattern::Ident(name) => out.push(name.clone()),
        Pattern::Object { props, rest } => {
            for (_, elem) in props {
                pattern_names(&elem.pattern, out);
            }
            if let Some(rest) = rest {
                out.push(rest.clone());
            }
        }
        Pattern::Array { elems, rest } => {
            for elem in elems.iter().flatten() {
                pattern_names(&elem.pattern, out);
            }
            if let Some(rest) = rest {
                pattern_names(rest, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse_program;
    use crate::compiler::{intrinsics, CompilerSettings};

    fn run(src: &str) -> Result<Value, RuntimeError> {
        run_with(src, CompilerSettings::default())
    }

    fn run_with(src: &str, settings: CompilerSettings) -> Result<Value, RuntimeError> {
        let program = parse_program(src).unwrap_or_else(|e| panic!("{}", e));
        let globals = Scope::root();
        intrinsics::install(&globals);
        let module = Scope::child(&globals, true);
        let mut interp = Interpreter::new(&settings);
        interp
            .run_program(&program, &module)
            .map_err(Interrupt::into_runtime_error)?;
        Ok(module.lookup("result").unwrap_or_default())
    }

    fn run_str(src: &str) -> String {
        run(src).unwrap().to_js_string()
    }

    #[test]
    fn arithmetic_and_strings() {
        assert_eq!(run_str("const result = 1 + 2 * 3 ** 2"), "19");
        assert_eq!(run_str("const result = '1' + 2 + 3"), "123");
        assert_eq!(run_str("const result = 7 % -3 + (5 >>> 1)"), "3");
        assert_eq!(run_str("const result = `a${1 + 1}b${[1, 2]}`"), "a2b1,2");
        assert_eq!(run_str("const result = null ?? 'd'"), "d");
        assert_eq!(run_str("let x = 0; x ||= 5; x += 1; const result = x++ + ++x"), "14");
    }

    #[test]
    fn closures_capture_per_iteration_bindings() {
        let src = r#"
            const fns = [];
            for (let i = 0; i < 3; i++) { fns.push(() => i) }
            const result = fns.map(f => f()).join(",")
        "#;
        assert_eq!(run_str(src), "0,1,2");
    }

    #[test]
    fn destructuring_defaults_and_rest() {
        let src = r#"
            const { a, b: { c = 3 } = {}, ...others } = { a: 1, x: 9, y: 8 };
            const [first, , third = 'T', ...tail] = [10, 20, undefined, 40, 50];
            function sum(...nums) { return nums.reduce((s, n) => s + n, 0) }
            const result = [a, c, Object.keys(others).join(''), first, third, tail.length, sum(1, 2, 3)].join('|')
        "#;
        assert_eq!(run_str(src), "1|3|xy|10|T|2|6");
    }

    #[test]
    fn control_flow() {
        let src = r#"
            let out = [];
            for (const ch of "abc") { if (ch === 'b') continue; out.push(ch) }
            let n = 0;
            while (true) { n++; if (n > 4) break }
            switch (n) { case 4: out.push('four'); case 5: out.push('five'); case 6: out.push('six'); break; default: out.push('none') }
            for (const k in { p: 1, q: 2 }) out.push(k)
            const result = out.join(',') + ':' + n
        "#;
        assert_eq!(run_str(src), "a,c,five,six,p,q:5");
    }

    #[test]
    fn exceptions_and_finally() {
        let src = r#"
            let log = [];
            function risky() { try { undefinedThing(); } catch (e) { log.push(e.name); return 'caught' } finally { log.push('finally') } }
            const r = risky();
            try { throw { code: 7 } } catch ({ code }) { log.push(code) }
            const result = r + ':' + log.join(',')
        "#;
        assert_eq!(run_str(src), "caught:ReferenceError,finally,7");
    }

    #[test]
    fn optional_chaining_short_circuits() {
        let src = r#"
            const data = null;
            const obj = { inner: { list: [1, 2] } };
            const result = [data?.items.length, obj?.inner?.list[1], obj.missing?.(), typeof window].join('|')
        "#;
        assert_eq!(run_str(src), "|2||undefined");
    }

    #[test]
    fn errors_surface_as_diagnostics() {
        let err = run("const result = window.innerWidth").unwrap_err();
        assert_eq!(err.to_string(), "ReferenceError: window is not defined");
        let err = run("const a = 1; a = 2").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Assignment to constant variable.");
        let err = run("const o = undefined; o.x").unwrap_err();
        assert!(err.to_string().contains("Cannot read properties of undefined (reading 'x')"));
        let err = run("const f = 3; f()").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: f is not a function");
        let err = run("throw 'plain'").unwrap_err();
        assert_eq!(err.to_string(), "plain");
    }

    #[test]
    fn budgets_stop_runaway_code() {
        let settings = CompilerSettings {
            step_budget: 10_000,
            max_call_depth: 64,
        };
        let err = run_with("while (true) {}", settings.clone()).unwrap_err();
        assert_eq!(err, RuntimeError::StepBudgetExceeded(10_000));

        let err = run_with("try { while (true) {} } catch (e) {}", settings.clone()).unwrap_err();
        assert_eq!(err, RuntimeError::StepBudgetExceeded(10_000));

        let err = run_with("function f() { return f() } f()", settings).unwrap_err();
        assert_eq!(err, RuntimeError::CallDepthExceeded(64));
    }
}
