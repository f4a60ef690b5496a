//! Builtin Commands
//!
//! Each builtin is a procedure over (executor, context, args) returning an
//! exit code plus optional stdout/stderr text; the executor writes that
//! output to the current I/O endpoints after dispatch. Builtins that need
//! to re-enter the interpreter (`eval`, `source`, `let`, `arg`) do so
//! through the executor they are handed.

pub mod alias_cmd;
pub mod arg_cmd;
pub mod cd_cmd;
pub mod declare_cmd;
pub mod dirs_cmd;
pub mod echo_cmd;
pub mod eval_cmd;
pub mod exit_cmd;
pub mod export_cmd;
pub mod let_cmd;
pub mod local_cmd;
pub mod printf_cmd;
pub mod read_cmd;
pub mod set_cmd;
pub mod shift_cmd;
pub mod source_cmd;
pub mod test_cmd;
pub mod trivial_cmd;
pub mod type_cmd;
pub mod unset_cmd;

use std::collections::HashMap;

use futures_util::future::LocalBoxFuture;

use crate::context::ExecContext;

use super::errors::ExecError;
use super::executor::Executor;

/// What a builtin hands back to the executor.
#[derive(Debug, Clone, Default)]
pub struct BuiltinOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl BuiltinOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn code(code: i32) -> Self {
        Self {
            code,
            ..Default::default()
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: text.into(),
            stderr: String::new(),
        }
    }

    /// General builtin failure: message on stderr, code 1.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            stdout: String::new(),
            stderr: message.into(),
        }
    }

    /// Usage error: message on stderr, code 2.
    pub fn usage(message: impl Into<String>) -> Self {
        Self {
            code: 2,
            stdout: String::new(),
            stderr: message.into(),
        }
    }
}

pub type BuiltinFuture<'a> = LocalBoxFuture<'a, Result<BuiltinOutput, ExecError>>;
pub type BuiltinFn =
    Box<dyn for<'a> Fn(&'a Executor, &'a ExecContext, &'a [String]) -> BuiltinFuture<'a>>;

/// Name-to-procedure table. The standard set covers the spec'd builtins;
/// embedders can add or remove entries before constructing the executor.
pub struct BuiltinRegistry {
    map: HashMap<String, BuiltinFn>,
}

macro_rules! builtin {
    ($map:expr, $name:expr, $path:path) => {{
        fn wrapper<'a>(
            exec: &'a Executor,
            ctx: &'a ExecContext,
            args: &'a [String],
        ) -> BuiltinFuture<'a> {
            Box::pin($path(exec, ctx, args))
        }
        $map.insert($name.to_string(), Box::new(wrapper) as BuiltinFn);
    }};
}

impl BuiltinRegistry {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut map: HashMap<String, BuiltinFn> = HashMap::new();

        builtin!(map, ":", trivial_cmd::run_colon);
        builtin!(map, "true", trivial_cmd::run_true);
        builtin!(map, "false", trivial_cmd::run_false);

        builtin!(map, "echo", echo_cmd::run);
        builtin!(map, "printf", printf_cmd::run);

        builtin!(map, "cd", cd_cmd::run);
        builtin!(map, "pwd", cd_cmd::run_pwd);
        builtin!(map, "dirs", dirs_cmd::run_dirs);
        builtin!(map, "pushd", dirs_cmd::run_pushd);
        builtin!(map, "popd", dirs_cmd::run_popd);

        builtin!(map, "export", export_cmd::run);
        builtin!(map, "unset", unset_cmd::run);
        builtin!(map, "local", local_cmd::run);
        builtin!(map, "readonly", declare_cmd::run_readonly);
        builtin!(map, "declare", declare_cmd::run);
        builtin!(map, "typeset", declare_cmd::run);

        builtin!(map, "eval", eval_cmd::run);
        builtin!(map, "source", source_cmd::run);
        builtin!(map, ".", source_cmd::run);
        builtin!(map, "let", let_cmd::run);

        builtin!(map, "read", read_cmd::run);

        builtin!(map, "exit", exit_cmd::run_exit);
        builtin!(map, "return", exit_cmd::run_return);
        builtin!(map, "shift", shift_cmd::run);

        builtin!(map, "test", test_cmd::run_test);
        builtin!(map, "[", test_cmd::run_bracket);

        builtin!(map, "set", set_cmd::run);

        builtin!(map, "type", type_cmd::run_type);
        builtin!(map, "command", type_cmd::run_command);
        builtin!(map, "builtin", type_cmd::run_builtin);

        builtin!(map, "arg", arg_cmd::run);

        builtin!(map, "alias", alias_cmd::run_alias);
        builtin!(map, "unalias", alias_cmd::run_unalias);

        Self { map }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn register(&mut self, name: impl Into<String>, f: BuiltinFn) {
        self.map.insert(name.into(), f);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.map.remove(name).is_some()
    }

    pub(crate) fn run<'a>(
        &'a self,
        name: &str,
        exec: &'a Executor,
        ctx: &'a ExecContext,
        args: &'a [String],
    ) -> Option<BuiltinFuture<'a>> {
        self.map.get(name).map(|f| f(exec, ctx, args))
    }
}
