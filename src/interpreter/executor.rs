//! AST Executor
//!
//! Tree-walking dispatch over the parsed AST. Every node executor returns
//! `Result<i32, ExecError>`; ordinary exit codes flow through `Ok` and the
//! control-flow signals (break/continue/return/exit) travel as `Err`
//! variants until their designated frame unwraps them. Non-zero statuses
//! never abort a script by themselves.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::ast::types::*;
use crate::context::{ExecContext, FunctionDef};
use crate::host::{ExecuteOptions, HostError, ShellHost};

use super::argspec::ArgSpecSet;
use super::arithmetic::{self, AssignTarget};
use super::builtins::BuiltinRegistry;
use super::conditionals;
use super::errors::ExecError;
use super::expansion;
use super::pattern::glob_match;

/// Captured output of `execute_and_capture`.
#[derive(Debug, Clone, Default)]
pub struct CaptureResult {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// The AST executor, bound to a host facade and a builtin registry.
pub struct Executor {
    host: Rc<dyn ShellHost>,
    builtins: BuiltinRegistry,
    /// `arg` declarations, keyed by the owning context frame.
    pub(crate) arg_registries: RefCell<HashMap<u64, ArgSpecSet>>,
    /// Unconsumed pipe input buffered by the `read` builtin.
    pub(crate) stdin_rest: RefCell<HashMap<String, String>>,
}

impl Executor {
    pub fn new(host: Rc<dyn ShellHost>) -> Self {
        Self::with_builtins(host, BuiltinRegistry::standard())
    }

    pub fn with_builtins(host: Rc<dyn ShellHost>, builtins: BuiltinRegistry) -> Self {
        Self {
            host,
            builtins,
            arg_registries: RefCell::new(HashMap::new()),
            stdin_rest: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn host(&self) -> &dyn ShellHost {
        self.host.as_ref()
    }

    pub(crate) fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    // ------------------------------------------------------------------
    // Public API
    // ------------------------------------------------------------------

    /// Parse and execute a script against the given context.
    pub async fn execute(&self, source: &str, ctx: &ExecContext) -> Result<i32, ExecError> {
        let script = crate::parser::parse(source)?;
        match self.run_nodes_script(ctx, &script.commands).await {
            Ok(code) => Ok(code),
            Err(ExecError::Exit(code)) | Err(ExecError::Return(code)) => Ok(code),
            Err(e) => Err(e),
        }
    }

    /// Parse and execute, routing stdout/stderr through temporary pipes and
    /// returning the captured text.
    pub async fn execute_and_capture(
        &self,
        source: &str,
        ctx: &ExecContext,
    ) -> Result<CaptureResult, ExecError> {
        let script = crate::parser::parse(source)?;
        let host = self.host();
        let out_pipe = host.pipe_open().await?;
        let err_pipe = host.pipe_open().await?;
        let child = ctx.spawn_child();
        child.set_stdout(out_pipe.clone(), false);
        child.set_stderr(err_pipe.clone(), false);

        let run_fut = async {
            let result = match self.run_nodes_script(&child, &script.commands).await {
                Ok(code) => Ok(code),
                Err(ExecError::Exit(code)) | Err(ExecError::Return(code)) => Ok(code),
                Err(e) => Err(e),
            };
            let _ = host.pipe_write(&out_pipe, "").await;
            let _ = host.pipe_write(&err_pipe, "").await;
            result
        };
        let (result, stdout, stderr) = futures_util::join!(
            run_fut,
            self.drain_pipe(&out_pipe),
            self.drain_pipe(&err_pipe)
        );
        let _ = host.pipe_remove(&out_pipe).await;
        let _ = host.pipe_remove(&err_pipe).await;

        Ok(CaptureResult {
            code: result?,
            stdout,
            stderr,
        })
    }

    // ------------------------------------------------------------------
    // List runners
    // ------------------------------------------------------------------

    /// Script semantics: run each command in order, never aborting on a
    /// non-zero status. Break/continue outside a loop are swallowed;
    /// exit and return signals propagate. `$?` tracks every command.
    pub(crate) fn run_nodes_script<'a>(
        &'a self,
        ctx: &'a ExecContext,
        nodes: &'a [Node],
    ) -> LocalBoxFuture<'a, Result<i32, ExecError>> {
        async move {
            let mut status = 0;
            for node in nodes {
                match self.exec_node(ctx.clone(), node).await {
                    Ok(code) => status = code,
                    Err(ExecError::Break) | Err(ExecError::Continue) => continue,
                    Err(e) => return Err(e),
                }
                let _ = ctx.set_param("?", Some(status.to_string()));
            }
            Ok(status)
        }
        .boxed_local()
    }

    /// Condition semantics (if/while/until clauses): run every command, the
    /// last status decides. All signals propagate to the caller.
    pub(crate) async fn run_nodes(
        &self,
        ctx: &ExecContext,
        nodes: &[Node],
    ) -> Result<i32, ExecError> {
        let mut status = 0;
        for node in nodes {
            status = self.exec_node(ctx.clone(), node).await?;
            let _ = ctx.set_param("?", Some(status.to_string()));
        }
        Ok(status)
    }

    /// Compound-list semantics: run in order, stop at the first non-zero
    /// status and yield it. Signals propagate immediately.
    pub(crate) async fn run_nodes_stop(
        &self,
        ctx: &ExecContext,
        nodes: &[Node],
    ) -> Result<i32, ExecError> {
        for node in nodes {
            let status = self.exec_node(ctx.clone(), node).await?;
            let _ = ctx.set_param("?", Some(status.to_string()));
            if status != 0 {
                return Ok(status);
            }
        }
        Ok(0)
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    pub(crate) fn exec_node<'a>(
        &'a self,
        ctx: ExecContext,
        node: &'a Node,
    ) -> LocalBoxFuture<'a, Result<i32, ExecError>> {
        async move {
            match node {
                Node::Command(cmd) => self.exec_command(&ctx, cmd).await,
                Node::Function(def) => self.exec_function_def(&ctx, def),
                Node::If(n) => self.exec_if(&ctx, n).await,
                Node::While(n) => self.exec_loop(&ctx, n, true).await,
                Node::Until(n) => self.exec_loop(&ctx, n, false).await,
                Node::For(n) => self.exec_for(&ctx, n).await,
                Node::Case(n) => self.exec_case(&ctx, n).await,
                Node::Subshell(n) => self.exec_subshell(&ctx, n).await,
                Node::Pipeline(n) => self.exec_pipeline(&ctx, n).await,
                Node::Logical(n) => self.exec_logical(&ctx, n).await,
                Node::CompoundList(n) => self.exec_compound_list(&ctx, n).await,
                Node::ArithmeticCommand(n) => self.exec_arithmetic_command(&ctx, n).await,
                Node::ConditionalCommand(n) => {
                    let truth = conditionals::evaluate(self, &ctx, &n.expression).await?;
                    Ok(if truth { 0 } else { 1 })
                }
            }
        }
        .boxed_local()
    }

    // ------------------------------------------------------------------
    // Simple commands
    // ------------------------------------------------------------------

    async fn exec_command(&self, ctx: &ExecContext, cmd: &Command) -> Result<i32, ExecError> {
        let child = ctx.spawn_child();

        // Prefix assignments. With no command name they bind permanently in
        // the enclosing scope; otherwise they are scoped to this command.
        let permanent = cmd.name.is_none();
        for word in &cmd.prefix {
            let (expanded, status) = expansion::expand_scalar(self, &child, word).await?;
            if status != 0 {
                return Ok(status);
            }
            let (name, value) = match expanded.split_once('=') {
                Some((n, v)) => (n.to_string(), v.to_string()),
                None => (expanded, String::new()),
            };
            if permanent {
                if let Err(e) = ctx.set_param(&name, Some(value)) {
                    self.emit(&child, "", &format!("bash: {}\n", e)).await?;
                    return Ok(1);
                }
            } else {
                child.set_local_param(&name, value);
            }
        }
        let Some(name_word) = &cmd.name else {
            return Ok(0);
        };

        // Suffix words build the argument vector; one word can contribute
        // several argv entries after splitting and path expansion.
        let mut argv: Vec<String> = Vec::new();
        for suffix in &cmd.suffix {
            if let Suffix::Word(word) = suffix {
                let expanded = expansion::expand_word(self, &child, word).await?;
                if expanded.status != 0 {
                    return Ok(expanded.status);
                }
                argv.extend(expanded.fields);
            }
        }

        // Redirections apply to this command's child frame only.
        for suffix in &cmd.suffix {
            if let Suffix::Redirect(redirect) = suffix {
                self.apply_redirect(&child, redirect).await?;
            }
        }

        // Resolve the command name; the first field is the name, any
        // remaining fields lead the argument vector.
        let expanded = expansion::expand_word(self, &child, name_word).await?;
        if expanded.status != 0 {
            return Ok(expanded.status);
        }
        let mut fields = expanded.fields;
        if fields.is_empty() {
            return Ok(0);
        }
        let mut name = fields.remove(0);
        if !fields.is_empty() {
            fields.extend(argv);
            argv = fields;
        }

        // Alias resolution on the command-name position.
        let mut seen_aliases: HashSet<String> = HashSet::new();
        while let Some(alias_value) = child.get_alias(&name) {
            if !seen_aliases.insert(name.clone()) {
                break;
            }
            let mut parts: Vec<String> =
                alias_value.split_whitespace().map(str::to_string).collect();
            if parts.is_empty() {
                break;
            }
            name = parts.remove(0);
            parts.extend(argv);
            argv = parts;
        }

        // Bare control-flow words short-circuit dispatch entirely.
        let code = match name.as_str() {
            "break" => return Err(ExecError::Break),
            "continue" => return Err(ExecError::Continue),
            _ => self.dispatch(&child, &name, &argv, cmd.asynchronous, false).await?,
        };

        Ok(if cmd.bang {
            if code == 0 {
                1
            } else {
                0
            }
        } else {
            code
        })
    }

    /// Dispatch order: builtin, then function, then external command.
    /// `bypass_functions` supports `command` and `builtin`.
    pub(crate) async fn dispatch(
        &self,
        ctx: &ExecContext,
        name: &str,
        argv: &[String],
        asynchronous: bool,
        bypass_functions: bool,
    ) -> Result<i32, ExecError> {
        if let Some(fut) = self.builtins.run(name, self, ctx, argv) {
            let output = fut.await?;
            self.emit(ctx, &output.stdout, &output.stderr).await?;
            return Ok(output.code);
        }

        if !bypass_functions {
            if let Some(def) = ctx.get_function(name) {
                return self.call_function(ctx, &def, argv).await;
            }
        }

        self.exec_external(ctx, name, argv, asynchronous).await
    }

    pub(crate) async fn exec_external(
        &self,
        ctx: &ExecContext,
        name: &str,
        argv: &[String],
        asynchronous: bool,
    ) -> Result<i32, ExecError> {
        let host = self.host();
        let opts = ExecuteOptions { asynchronous };
        let run_ctx = ctx.clone();
        let name_owned = name.to_string();
        let argv_owned = argv.to_vec();
        let result = self
            .run_bridged(ctx, async move {
                match host.execute(&run_ctx, &name_owned, &argv_owned, &opts).await {
                    Ok(code) => Ok(code),
                    Err(e) => {
                        let code = e.exit_code();
                        let message = match &e {
                            HostError::NotFound(_) => format!("bash: {}\n", e),
                            other => format!("bash: {}: {}\n", name_owned, other),
                        };
                        // The stderr endpoint is a pipe here (bridged).
                        let (err_ep, _) = run_ctx.stderr();
                        if host.is_pipe(&err_ep) {
                            let _ = host.pipe_write(&err_ep, &message).await;
                        }
                        Ok(code)
                    }
                }
            })
            .await?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn exec_function_def(&self, ctx: &ExecContext, def: &Function) -> Result<i32, ExecError> {
        ctx.set_function(FunctionDef {
            name: def.name.clone(),
            body: Rc::new((*def.body).clone()),
            def_ctx: ctx.spawn_captured(),
            redirections: def.redirections.clone(),
            raw: def.raw.clone(),
        });
        Ok(0)
    }

    pub(crate) async fn call_function(
        &self,
        caller: &ExecContext,
        def: &FunctionDef,
        args: &[String],
    ) -> Result<i32, ExecError> {
        // Body runs under the definition context, but inherits the caller's
        // I/O endpoints and gets fresh positional parameters.
        let body_ctx = def.def_ctx.spawn_child();
        body_ctx.set_stdin(caller.stdin());
        let (out, out_append) = caller.stdout();
        body_ctx.set_stdout(out, out_append);
        let (err, err_append) = caller.stderr();
        body_ctx.set_stderr(err, err_append);
        body_ctx.set_positional_local(args);
        for redirect in &def.redirections {
            self.apply_redirect(&body_ctx, redirect).await?;
        }

        let body_node = Node::CompoundList((*def.body).clone());
        let result = self.exec_node(body_ctx, &body_node).await;
        match result {
            Err(ExecError::Return(code)) => Ok(code),
            other => other,
        }
    }

    // ------------------------------------------------------------------
    // Compound commands
    // ------------------------------------------------------------------

    async fn exec_if(&self, ctx: &ExecContext, node: &If) -> Result<i32, ExecError> {
        let cond = self.run_nodes(ctx, &node.clause).await?;
        if cond == 0 {
            self.run_nodes_stop(ctx, &node.then_part).await
        } else if let Some(else_part) = &node.else_part {
            self.run_nodes_stop(ctx, else_part).await
        } else {
            Ok(0)
        }
    }

    async fn exec_loop(
        &self,
        ctx: &ExecContext,
        node: &Loop,
        is_while: bool,
    ) -> Result<i32, ExecError> {
        loop {
            let cond = match self.run_nodes(ctx, &node.clause).await {
                Ok(code) => code,
                Err(ExecError::Break) => return Ok(0),
                Err(ExecError::Continue) => continue,
                Err(e) => return Err(e),
            };
            let proceed = if is_while { cond == 0 } else { cond != 0 };
            if !proceed {
                return Ok(0);
            }
            match self.run_nodes_stop(ctx, &node.body).await {
                Ok(0) => {}
                Ok(code) => return Ok(code),
                Err(ExecError::Break) => return Ok(0),
                Err(ExecError::Continue) => {}
                Err(e) => return Err(e),
            }
        }
    }

    async fn exec_for(&self, ctx: &ExecContext, node: &For) -> Result<i32, ExecError> {
        let mut values: Vec<String> = Vec::new();
        for word in &node.wordlist {
            let expanded = expansion::expand_word(self, ctx, word).await?;
            if expanded.status != 0 {
                return Ok(expanded.status);
            }
            values.extend(expanded.fields);
        }

        let mut status = 0;
        for value in values {
            // The loop variable binds in the surrounding context and stays
            // visible after the loop.
            if let Err(e) = ctx.set_param(&node.name, Some(value)) {
                self.emit(ctx, "", &format!("bash: {}\n", e)).await?;
                return Ok(1);
            }
            match self.run_nodes_stop(ctx, &node.body).await {
                Ok(0) => status = 0,
                Ok(code) => return Ok(code),
                Err(ExecError::Break) => return Ok(0),
                Err(ExecError::Continue) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(status)
    }

    async fn exec_case(&self, ctx: &ExecContext, node: &Case) -> Result<i32, ExecError> {
        let expanded = expansion::expand_word(self, ctx, &node.clause).await?;
        if expanded.status != 0 {
            return Ok(expanded.status);
        }
        let value = expanded.fields.into_iter().next().unwrap_or_default();

        for item in &node.items {
            for pattern_word in &item.patterns {
                let (pattern, status) = expansion::expand_scalar(self, ctx, pattern_word).await?;
                if status != 0 {
                    return Ok(status);
                }
                if glob_match(&value, &pattern) {
                    // First matching item wins; no fall-through.
                    return self.run_nodes_stop(ctx, &item.body).await;
                }
            }
        }
        Ok(0)
    }

    async fn exec_subshell(&self, ctx: &ExecContext, node: &Subshell) -> Result<i32, ExecError> {
        let sub = ctx.spawn_isolated();
        for redirect in &node.redirections {
            self.apply_redirect(&sub, redirect).await?;
        }
        let result = self
            .run_bridged(&sub, self.run_nodes_stop_owned(sub.clone(), &node.list))
            .await;
        match result {
            // `exit` terminates only the subshell.
            Err(ExecError::Exit(code)) => Ok(code),
            other => other,
        }
    }

    /// Owned-context variant so the future has no borrow of a local frame.
    fn run_nodes_stop_owned<'a>(
        &'a self,
        ctx: ExecContext,
        nodes: &'a [Node],
    ) -> LocalBoxFuture<'a, Result<i32, ExecError>> {
        async move { self.run_nodes_stop(&ctx, nodes).await }.boxed_local()
    }

    async fn exec_logical(&self, ctx: &ExecContext, node: &Logical) -> Result<i32, ExecError> {
        let left = self.exec_node(ctx.clone(), node.left.as_ref()).await?;
        let _ = ctx.set_param("?", Some(left.to_string()));
        let run_right = match node.op {
            LogicalOp::And => left == 0,
            LogicalOp::Or => left != 0,
        };
        if run_right {
            self.exec_node(ctx.clone(), node.right.as_ref()).await
        } else {
            Ok(left)
        }
    }

    async fn exec_compound_list(
        &self,
        ctx: &ExecContext,
        node: &CompoundList,
    ) -> Result<i32, ExecError> {
        let child = ctx.spawn_child();
        for redirect in &node.redirections {
            self.apply_redirect(&child, redirect).await?;
        }
        self.run_nodes_stop(&child, &node.commands).await
    }

    async fn exec_arithmetic_command(
        &self,
        ctx: &ExecContext,
        node: &ArithmeticCommand,
    ) -> Result<i32, ExecError> {
        let value =
            arithmetic::evaluate(self, ctx, &node.expression, AssignTarget::Params).await?;
        // Shell truthiness inversion: non-zero is success.
        Ok(if value != 0 { 0 } else { 1 })
    }

    // ------------------------------------------------------------------
    // Redirections
    // ------------------------------------------------------------------

    pub(crate) async fn apply_redirect(
        &self,
        ctx: &ExecContext,
        redirect: &Redirect,
    ) -> Result<(), ExecError> {
        let (target, _status) = expansion::expand_scalar(self, ctx, &redirect.target).await?;
        match redirect.op {
            RedirectOp::Read => ctx.set_stdin(target),
            RedirectOp::Write | RedirectOp::Append => {
                let append = redirect.op == RedirectOp::Append;
                match redirect.fd {
                    Some(2) => ctx.set_stderr(target, append),
                    _ => ctx.set_stdout(target, append),
                }
            }
            RedirectOp::DupOut => {
                let (endpoint, append) = match target.as_str() {
                    "0" => (ctx.stdin(), false),
                    "2" => ctx.stderr(),
                    _ => ctx.stdout(),
                };
                match redirect.fd.unwrap_or(1) {
                    2 => ctx.set_stderr(endpoint, append),
                    _ => ctx.set_stdout(endpoint, append),
                }
            }
            RedirectOp::WriteBoth | RedirectOp::AppendBoth => {
                let append = redirect.op == RedirectOp::AppendBoth;
                ctx.set_stdout(target.clone(), append);
                ctx.set_stderr(target, append);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
