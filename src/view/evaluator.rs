//! Interpreter for compiled view programs.

use serde_json::{Map, Value};
use tracing::{error, warn};

use super::engine::Engine;
use super::loop_frame::{loop_value, LoopFrame};
use super::state::{Capture, Frame, RenderState, PARENT_PLACEHOLDER};
use crate::compiler::{Node, Program};
use crate::component::{
    validate_name, AnonymousComponent, Component, ComponentData, RenderContext, Slots,
};
use crate::error::{Result, ViewError};
use crate::expr::value::{arithmetic, compare, escape_html, loose_eq, to_display, truthy, type_name};
use crate::expr::{BinaryOp, Check, Expr, Stmt, UnaryOp};

/// Written in place of a component that failed outside debug mode.
pub const COMPONENT_FAILURE: &str = r#"<div class="component-error">Component rendering failed</div>"#;

/// How a run of nodes finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Slots of the component whose view is rendering.
#[derive(Debug, Clone)]
pub(crate) struct SlotScope {
    slots: Slots,
    escape: bool,
}

/// Variables and slots visible while one template evaluates.
struct Scope {
    template: String,
    vars: Map<String, Value>,
    slots: Option<SlotScope>,
    /// Set by the first `@extends` evaluated.
    layout: Option<String>,
}

impl Scope {
    fn fail(&self, message: impl Into<String>) -> ViewError {
        ViewError::evaluation(self.template.clone(), message)
    }

    fn slot(&self, name: &str) -> Option<&str> {
        self.slots
            .as_ref()
            .and_then(|scope| scope.slots.get(name))
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    fn escapes_slots(&self) -> bool {
        self.slots.as_ref().is_some_and(|scope| scope.escape)
    }
}

/// One render pass over an engine.
pub(crate) struct Evaluator<'e> {
    engine: &'e mut Engine,
    state: RenderState,
}

impl<'e> Evaluator<'e> {
    pub fn new(engine: &'e mut Engine) -> Self {
        Self {
            engine,
            state: RenderState::default(),
        }
    }

    /// Render `name` and, in turn, the layouts it extends.
    pub fn render_template(
        &mut self,
        name: &str,
        data: Map<String, Value>,
        slots: Option<SlotScope>,
    ) -> Result<String> {
        let limit = self.engine.max_depth();
        if self.state.templates.len() >= limit {
            return Err(ViewError::RecursionLimitExceeded {
                name: name.to_string(),
                limit,
            });
        }

        self.state.templates.push(name.to_string());
        let result = self.render_chain(name, data, slots);
        self.state.templates.pop();
        result
    }

    fn render_chain(
        &mut self,
        name: &str,
        data: Map<String, Value>,
        slots: Option<SlotScope>,
    ) -> Result<String> {
        let program = self.engine.load_program(name)?;
        let (mut output, mut layout) = self.evaluate(&program, data.clone(), slots.clone())?;

        let mut chain = vec![name.to_string()];
        while let Some(next) = layout {
            if chain.contains(&next) {
                chain.push(next);
                return Err(ViewError::CyclicInclude {
                    cycle: chain.join(" -> "),
                });
            }
            chain.push(next.clone());

            // The child's own output is replaced by the layout's.
            let parent = self.engine.load_program(&next)?;
            (output, layout) = self.evaluate(&parent, data.clone(), slots.clone())?;
        }

        Ok(output)
    }

    /// Evaluate one program. Returns its output and the layout it extends.
    fn evaluate(
        &mut self,
        program: &Program,
        vars: Map<String, Value>,
        slots: Option<SlotScope>,
    ) -> Result<(String, Option<String>)> {
        let mut scope = Scope {
            template: program.name.clone(),
            vars,
            slots,
            layout: None,
        };
        self.state.open(Capture::Boundary);
        let result = self.run(&program.nodes, &mut scope);
        let output = self.state.close_boundary(&program.name);
        result.map(|_| (output, scope.layout))
    }

    fn run(&mut self, nodes: &[Node], scope: &mut Scope) -> Result<Flow> {
        for node in nodes {
            let flow = self.step(node, scope)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// Evaluate `nodes` into a fresh buffer and return it.
    fn capture(&mut self, nodes: &[Node], scope: &mut Scope) -> Result<String> {
        self.state.open(Capture::Boundary);
        let result = self.run(nodes, scope);
        let output = self.state.close_boundary(&scope.template);
        result.map(|_| output)
    }

    fn step(&mut self, node: &Node, scope: &mut Scope) -> Result<Flow> {
        match node {
            Node::Text(text) => self.state.write(text),
            Node::Echo { expr, escape } => {
                let text = to_display(&self.eval(expr, scope)?);
                if *escape {
                    self.state.write(&escape_html(&text));
                } else {
                    self.state.write(&text);
                }
            }
            Node::Json { expr, pretty } => {
                let value = self.eval(expr, scope)?;
                let pretty = match pretty {
                    Some(flag) => truthy(&self.eval(flag, scope)?),
                    None => false,
                };
                let json = if pretty {
                    serde_json::to_string_pretty(&value)
                } else {
                    serde_json::to_string(&value)
                }
                .map_err(|e| scope.fail(e.to_string()))?;
                self.state.write(&json);
            }
            Node::Csrf => {
                let field = self.csrf_field();
                self.state.write(&field);
            }
            Node::Extends(layout) => {
                if scope.layout.is_none() {
                    scope.layout = Some(layout.clone());
                }
            }
            Node::Section { name, body, show } => {
                let content = self.capture(body, scope)?;
                self.state.define_section(name, content);
                if *show {
                    let content = self.state.section(name).unwrap_or_default();
                    self.state.write(&content);
                }
            }
            Node::SectionInline { name, value } => {
                let content = escape_html(&to_display(&self.eval(value, scope)?));
                self.state.define_section(name, content);
            }
            Node::Yield { name, default } => {
                let content = match self.state.section(name) {
                    Some(content) => content,
                    None => match default {
                        Some(expr) => to_display(&self.eval(expr, scope)?),
                        None => String::new(),
                    },
                };
                self.state.write(&content);
            }
            Node::Parent => self.state.write(PARENT_PLACEHOLDER),
            Node::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    if truthy(&self.eval(&branch.condition, scope)?) {
                        return self.run(&branch.body, scope);
                    }
                }
                if let Some(body) = otherwise {
                    return self.run(body, scope);
                }
            }
            Node::Foreach {
                iterable,
                key,
                value,
                body,
            } => {
                let items = self.items(self.eval(iterable, scope)?, scope)?;
                let depth = self.state.loops.len() + 1;
                self.state.loops.push(LoopFrame::new(Some(items.len()), depth));
                let result = self.foreach(items, key.as_deref(), value, body, scope);
                self.state.loops.pop();
                result?;
            }
            Node::For {
                init,
                condition,
                step,
                body,
            } => {
                for stmt in init {
                    self.exec(stmt, scope)?;
                }
                let depth = self.state.loops.len() + 1;
                self.state.loops.push(LoopFrame::new(None, depth));
                let result = self.repeat(condition, step, body, scope);
                self.state.loops.pop();
                result?;
            }
            Node::While { condition, body } => {
                let depth = self.state.loops.len() + 1;
                self.state.loops.push(LoopFrame::new(None, depth));
                let result = self.repeat(condition, &[], body, scope);
                self.state.loops.pop();
                result?;
            }
            Node::Break(condition) => {
                if self.holds(condition.as_ref(), scope)? {
                    return Ok(Flow::Break);
                }
            }
            Node::Continue(condition) => {
                if self.holds(condition.as_ref(), scope)? {
                    return Ok(Flow::Continue);
                }
            }
            Node::Include { name, data } => {
                let data = self.data_map(data.as_ref(), scope, "@include")?;
                let output = self.render_template(name, data, None)?;
                self.state.write(&output);
            }
            Node::ComponentStart { name, data } => {
                let data = self.data_map(data.as_ref(), scope, "@component")?;
                let component = self.resolve_component(name, data)?;
                self.state.open(Capture::Component(component));
            }
            Node::ComponentEnd => self.end_component(scope),
            Node::SlotStart(name) => {
                if !self.state.in_component() {
                    warn!(template = %scope.template, slot = %name, "@slot outside of a component");
                }
                self.state.open(Capture::Slot(name.clone()));
            }
            Node::SlotEnd => match self.state.close(|c| matches!(c, Capture::Slot(_))) {
                Some(frame) => self.finish_frame(frame),
                None => warn!(template = %scope.template, "Ignoring @endslot without an open slot"),
            },
            Node::PushStart(name) => self.state.open(Capture::Push(name.clone())),
            Node::PushEnd => match self.state.close(|c| matches!(c, Capture::Push(_))) {
                Some(frame) => self.finish_frame(frame),
                None => warn!(template = %scope.template, "Ignoring @endpush without an open push"),
            },
            Node::Stack { name, default } => {
                let mut content = self.state.stack(name);
                if content.is_empty() {
                    if let Some(expr) = default {
                        content = to_display(&self.eval(expr, scope)?);
                    }
                }
                self.state.write(&content);
            }
            Node::ComponentSlot { name, default } => {
                let content = scope.slot(name).unwrap_or(default.as_str()).to_string();
                self.state.write(&content);
            }
            Node::Code(stmts) => {
                for stmt in stmts {
                    self.exec(stmt, scope)?;
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn foreach(
        &mut self,
        items: Vec<(Value, Value)>,
        key: Option<&str>,
        value: &str,
        body: &[Node],
        scope: &mut Scope,
    ) -> Result<()> {
        let depth = self.state.depth();
        for (k, v) in items {
            if let Some(frame) = self.state.loops.last_mut() {
                frame.advance();
            }
            if let Some(key) = key {
                scope.vars.insert(key.to_string(), k);
            }
            scope.vars.insert(value.to_string(), v);
            if self.iterate(body, depth, scope)? == Flow::Break {
                break;
            }
        }
        Ok(())
    }

    fn repeat(&mut self, condition: &Expr, step: &[Stmt], body: &[Node], scope: &mut Scope) -> Result<()> {
        let depth = self.state.depth();
        while truthy(&self.eval(condition, scope)?) {
            if let Some(frame) = self.state.loops.last_mut() {
                frame.advance();
            }
            if self.iterate(body, depth, scope)? == Flow::Break {
                break;
            }
            for stmt in step {
                self.exec(stmt, scope)?;
            }
        }
        Ok(())
    }

    /// Run one loop body. A `@break` or `@continue` that leaves the body
    /// early finishes the components, slots and pushes it opened.
    fn iterate(&mut self, body: &[Node], depth: usize, scope: &mut Scope) -> Result<Flow> {
        let flow = self.run(body, scope)?;
        if flow != Flow::Normal {
            while let Some(frame) = self.state.pop_above(depth) {
                self.finish_frame(frame);
            }
        }
        Ok(flow)
    }

    /// Key/value pairs of an iterable value.
    fn items(&self, value: Value, scope: &Scope) -> Result<Vec<(Value, Value)>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v))
                .collect()),
            Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (Value::String(k), v)).collect()),
            other => Err(scope.fail(format!("cannot iterate over {}", type_name(&other)))),
        }
    }

    fn holds(&self, condition: Option<&Expr>, scope: &Scope) -> Result<bool> {
        match condition {
            Some(expr) => Ok(truthy(&self.eval(expr, scope)?)),
            None => Ok(true),
        }
    }

    fn data_map(&self, data: Option<&Expr>, scope: &Scope, directive: &str) -> Result<Map<String, Value>> {
        let Some(expr) = data else {
            return Ok(Map::new());
        };
        match self.eval(expr, scope)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(scope.fail(format!(
                "{} data must be an object, got {}",
                directive,
                type_name(&other)
            ))),
        }
    }

    fn resolve_component(&self, name: &str, data: Map<String, Value>) -> Result<Box<dyn Component>> {
        validate_name(name)?;
        let data = ComponentData::new(data);

        let components = self.engine.components();
        if components.contains(name) {
            return components.instantiate(name, data).unwrap_or_else(|| {
                Err(ViewError::ComponentResolutionFailure {
                    name: name.to_string(),
                    message: "component is not registered".to_string(),
                })
            });
        }

        let view = if name.contains('.') {
            name.to_string()
        } else {
            format!("components.{}", name)
        };
        if self.engine.resolver().find(&view).is_some() {
            return Ok(Box::new(AnonymousComponent::new(name, view, data)));
        }

        Err(ViewError::ComponentResolutionFailure {
            name: name.to_string(),
            message: format!("no registered component and no template '{}'", view),
        })
    }

    fn end_component(&mut self, scope: &Scope) {
        match self.state.close(|c| matches!(c, Capture::Component(_))) {
            Some(frame) => self.finish_frame(frame),
            None => warn!(template = %scope.template, "Ignoring @endcomponent without an open component"),
        }
    }

    /// Hand a closed frame's output to whatever it was capturing for.
    fn finish_frame(&mut self, frame: Frame) {
        match frame.capture {
            Capture::Component(mut component) => {
                if !frame.buffer.trim().is_empty() || !component.has_slot("default") {
                    component.set_slot("default", &frame.buffer);
                }
                let html = self.render_component(component.as_ref());
                self.state.write(&html);
            }
            Capture::Slot(name) => {
                if let Some(component) = self.state.component_mut() {
                    component.set_slot(&name, &frame.buffer);
                }
            }
            Capture::Push(name) => self.state.push(&name, frame.buffer),
            Capture::Boundary => self.state.write(&frame.buffer),
        }
    }

    /// Render a component, turning any failure into an inline fragment.
    fn render_component(&mut self, component: &dyn Component) -> String {
        match component.render(self) {
            Ok(html) => html,
            Err(err) => {
                error!(component = %component.type_name(), "Component rendering failed: {}", err);
                if self.engine.debug() {
                    format!(
                        r#"<div class="component-error"><strong>Component error ({}):</strong> {}</div>"#,
                        escape_html(component.type_name()),
                        escape_html(&err.to_string())
                    )
                } else {
                    COMPONENT_FAILURE.to_string()
                }
            }
        }
    }

    fn csrf_token(&self) -> String {
        self.engine.host().csrf_token().unwrap_or_default()
    }

    fn csrf_field(&self) -> String {
        format!(
            r#"<input type="hidden" name="_token" value="{}">"#,
            escape_html(&self.csrf_token())
        )
    }

    fn exec(&self, stmt: &Stmt, scope: &mut Scope) -> Result<()> {
        match stmt {
            Stmt::Assign { target, op, value } => {
                let value = self.eval(value, scope)?;
                let value = match op.binary() {
                    None => value,
                    Some(binary) => {
                        let current = scope.vars.get(target).cloned().unwrap_or(Value::Null);
                        arithmetic(binary, &current, &value).map_err(|m| scope.fail(m))?
                    }
                };
                scope.vars.insert(target.clone(), value);
            }
            Stmt::Eval(expr) => {
                self.eval(expr, scope)?;
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr, scope: &Scope) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => {
                if name == "loop" && !self.state.loops.is_empty() {
                    return Ok(loop_value(&self.state.loops));
                }
                Ok(scope.vars.get(name).cloned().unwrap_or(Value::Null))
            }
            Expr::Member(target, name) => Ok(member(&self.eval(target, scope)?, name)),
            Expr::Index(target, index) => {
                let target = self.eval(target, scope)?;
                let index = self.eval(index, scope)?;
                Ok(index_value(&target, &index))
            }
            Expr::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<Result<Vec<_>>>()?;
                self.call(name, &args, scope)
            }
            Expr::Filter { name, value, args } => {
                let value = self.eval(value, scope)?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<Result<Vec<_>>>()?;
                let filter = self
                    .engine
                    .registry()
                    .filter(name)
                    .ok_or_else(|| ViewError::UnregisteredFilter {
                        template: scope.template.clone(),
                        name: name.clone(),
                        line: 0,
                    })?;
                filter
                    .apply(&value, &args)
                    .map_err(|e| scope.fail(format!("filter '{}' failed: {}", name, e)))
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => arithmetic(BinaryOp::Sub, &Value::from(0), &value)
                        .map_err(|m| scope.fail(m)),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, scope),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&self.eval(cond, scope)?) {
                    self.eval(then, scope)
                } else {
                    self.eval(otherwise, scope)
                }
            }
            Expr::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.eval(item, scope))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value, scope)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Check(check) => self.check(check, scope).map(Value::Bool),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr, scope: &Scope) -> Result<Value> {
        let left = self.eval(lhs, scope)?;
        match op {
            BinaryOp::And => {
                return Ok(Value::Bool(truthy(&left) && truthy(&self.eval(rhs, scope)?)));
            }
            BinaryOp::Or => {
                return Ok(Value::Bool(truthy(&left) || truthy(&self.eval(rhs, scope)?)));
            }
            BinaryOp::Coalesce => {
                return if left.is_null() {
                    self.eval(rhs, scope)
                } else {
                    Ok(left)
                };
            }
            _ => {}
        }

        let right = self.eval(rhs, scope)?;
        let ordering = || compare(&left, &right);
        let result = match op {
            BinaryOp::Eq => Value::Bool(loose_eq(&left, &right)),
            BinaryOp::Ne => Value::Bool(!loose_eq(&left, &right)),
            BinaryOp::Lt => Value::Bool(ordering().is_some_and(|o| o.is_lt())),
            BinaryOp::Le => Value::Bool(ordering().is_some_and(|o| o.is_le())),
            BinaryOp::Gt => Value::Bool(ordering().is_some_and(|o| o.is_gt())),
            BinaryOp::Ge => Value::Bool(ordering().is_some_and(|o| o.is_ge())),
            arith => arithmetic(arith, &left, &right).map_err(|m| scope.fail(m))?,
        };
        Ok(result)
    }

    fn check(&self, check: &Check, scope: &Scope) -> Result<bool> {
        let host = self.engine.host();
        match check {
            Check::Authenticated => Ok(host.is_authenticated()),
            Check::Guest => Ok(!host.is_authenticated()),
            Check::Allows { ability, args } | Check::Denies { ability, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<Result<Vec<_>>>()?;
                let allowed = host.allows(ability, &args);
                Ok(if matches!(check, Check::Allows { .. }) {
                    allowed
                } else {
                    !allowed
                })
            }
            Check::HasSlot(name) => Ok(scope.slot(name).is_some()),
        }
    }

    /// Renderer intrinsics first, then registered functions.
    fn call(&self, name: &str, args: &[Value], scope: &Scope) -> Result<Value> {
        let arg = |i: usize| args.get(i).map(to_display).unwrap_or_default();
        match name {
            "slot" => {
                let content = scope
                    .slot(&arg(0))
                    .map(str::to_string)
                    .unwrap_or_else(|| arg(1));
                if scope.escapes_slots() {
                    return Ok(Value::String(escape_html(&content)));
                }
                return Ok(Value::String(content));
            }
            "unescaped_slot" => {
                let content = match scope.slot(&arg(0)) {
                    Some(content) if self.engine.debug() => {
                        format!("<!-- WARNING: UNSAFE UNESCAPED SLOT CONTENT -->{}", content)
                    }
                    Some(content) => content.to_string(),
                    None => arg(1),
                };
                return Ok(Value::String(content));
            }
            "has_slot" => return Ok(Value::Bool(scope.slot(&arg(0)).is_some())),
            "section_exists" => return Ok(Value::Bool(self.state.has_section(&arg(0)))),
            "csrf_token" => return Ok(Value::String(self.csrf_token())),
            "csrf_field" => return Ok(Value::String(self.csrf_field())),
            _ => {}
        }

        let function = self
            .engine
            .registry()
            .function(name)
            .ok_or_else(|| scope.fail(format!("unknown function '{}'", name)))?;
        function(args).map_err(|e| scope.fail(format!("{}() failed: {}", name, e)))
    }
}

impl RenderContext for Evaluator<'_> {
    fn render_view(
        &mut self,
        name: &str,
        data: Map<String, Value>,
        slots: &Slots,
        escape_slots: bool,
    ) -> Result<String> {
        let slots = SlotScope {
            slots: slots.clone(),
            escape: escape_slots,
        };
        self.render_template(name, data, Some(slots))
    }

    fn debug(&self) -> bool {
        self.engine.debug()
    }
}

fn member(target: &Value, name: &str) -> Value {
    match target {
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
        Value::Array(items) => match name {
            "length" => Value::from(items.len()),
            _ => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
        },
        _ => Value::Null,
    }
}

fn index_value(target: &Value, index: &Value) -> Value {
    match target {
        Value::Object(map) => map.get(&to_display(index)).cloned().unwrap_or(Value::Null),
        Value::Array(items) => index
            .as_u64()
            .or_else(|| index.as_str().and_then(|s| s.parse().ok()))
            .and_then(|i| items.get(i as usize).cloned())
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn member_access() {
        let value = json!({"user": {"name": "Ada"}, "tags": ["a", "b"]});
        assert_eq!(member(&value, "user")["name"], json!("Ada"));
        assert_eq!(member(&value["tags"], "1"), json!("b"));
        assert_eq!(member(&value["tags"], "length"), json!(2));
        assert_eq!(member(&value, "missing"), Value::Null);
        assert_eq!(member(&json!("text"), "len"), Value::Null);
    }

    #[test]
    fn index_access() {
        let value = json!({"tags": ["a", "b"], "by_id": {"7": "seven"}});
        assert_eq!(index_value(&value["tags"], &json!(0)), json!("a"));
        assert_eq!(index_value(&value["tags"], &json!("1")), json!("b"));
        assert_eq!(index_value(&value["by_id"], &json!(7)), json!("seven"));
        assert_eq!(index_value(&value["tags"], &json!(5)), Value::Null);
    }
}
