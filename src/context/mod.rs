//! Execution Context
//!
//! Parent-chained scope tree for everything a running script can observe:
//! cwd, exported env, shell parameters, functions, aliases, variable
//! attributes, the directory stack and symbolic I/O endpoints.
//!
//! Scoping rules:
//! - Reads compose the parent's view with local entries; local wins.
//! - Plain writes walk up to the nearest owner (a frame that declared the
//!   name `local`, an isolated subshell frame, or the root).
//! - `set_local_*` never delegates.
//! - cwd is a single authoritative value at the root (or the nearest
//!   isolated frame, so subshell `cd` does not leak).
//! - Functions and aliases are ambient: defining one anywhere is defining
//!   it at the root, unless a subshell boundary intervenes.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::ast::types::CompoundList;

/// Default IFS value: space, tab, newline.
pub const DEFAULT_IFS: &str = " \t\n";

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Errors surfaced by context mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("{0}: readonly variable")]
    ReadonlyVariable(String),
}

/// A function definition: the unevaluated body plus the context captured at
/// definition time, which acts as the lexical ancestor for body execution.
#[derive(Clone)]
pub struct FunctionDef {
    pub name: String,
    pub body: Rc<CompoundList>,
    pub def_ctx: ExecContext,
    pub redirections: Vec<crate::ast::types::Redirect>,
    /// Source text of the definition, for `declare -f`.
    pub raw: String,
}

/// Symbolic I/O endpoints for one frame. `None` inherits from the parent.
#[derive(Debug, Clone, Default)]
struct StdioSlots {
    stdin: Option<String>,
    stdout: Option<(String, bool)>,
    stderr: Option<(String, bool)>,
}

/// Parent link. Captured (function-definition) contexts hold their parent
/// weakly so the function table at the root cannot form a reference cycle;
/// when the defining frame has already ended, reads fall back to the root,
/// which the embedder keeps alive for the interpreter's lifetime.
enum ParentLink {
    None,
    Strong(Rc<ContextNode>),
    Captured {
        parent: Weak<ContextNode>,
        root: Weak<ContextNode>,
    },
}

struct ContextNode {
    id: u64,
    parent: ParentLink,
    /// Subshell isolation: plain writes stop here instead of walking up.
    isolated: bool,

    cwd: RefCell<Option<String>>,
    env: RefCell<HashMap<String, String>>,
    env_deleted: RefCell<HashSet<String>>,
    params: RefCell<HashMap<String, String>>,
    params_deleted: RefCell<HashSet<String>>,
    /// Names bound `local` in this frame; plain writes to them stop here.
    local_names: RefCell<HashSet<String>>,
    functions: RefCell<HashMap<String, FunctionDef>>,
    functions_deleted: RefCell<HashSet<String>>,
    aliases: RefCell<HashMap<String, String>>,
    aliases_deleted: RefCell<HashSet<String>>,
    readonly_vars: RefCell<HashSet<String>>,
    integer_vars: RefCell<HashSet<String>>,
    /// None inherits; owners (root / isolated) hold Some.
    dir_stack: RefCell<Option<Vec<String>>>,
    /// Shell options recorded by `set` (errexit, pipefail, ...).
    options: RefCell<HashSet<String>>,
    stdio: RefCell<StdioSlots>,
}

impl ContextNode {
    fn parent(&self) -> Option<Rc<ContextNode>> {
        match &self.parent {
            ParentLink::None => None,
            ParentLink::Strong(rc) => Some(rc.clone()),
            ParentLink::Captured { parent, root } => {
                parent.upgrade().or_else(|| root.upgrade())
            }
        }
    }
}

/// Handle to one node of the context tree. Cheap to clone.
#[derive(Clone)]
pub struct ExecContext {
    node: Rc<ContextNode>,
}

impl ExecContext {
    /// Create a root context for an embedded interpreter instance.
    pub fn new_root(cwd: impl Into<String>) -> Self {
        let ctx = Self::make(ParentLink::None, false);
        *ctx.node.cwd.borrow_mut() = Some(cwd.into());
        *ctx.node.dir_stack.borrow_mut() = Some(Vec::new());
        {
            let mut stdio = ctx.node.stdio.borrow_mut();
            stdio.stdin = Some("/dev/stdin".to_string());
            stdio.stdout = Some(("/dev/stdout".to_string(), false));
            stdio.stderr = Some(("/dev/stderr".to_string(), false));
        }
        ctx.node
            .params
            .borrow_mut()
            .insert("IFS".to_string(), DEFAULT_IFS.to_string());
        ctx.node.params.borrow_mut().insert("#".to_string(), "0".to_string());
        ctx.node.params.borrow_mut().insert("?".to_string(), "0".to_string());
        ctx
    }

    fn make(parent: ParentLink, isolated: bool) -> Self {
        Self {
            node: Rc::new(ContextNode {
                id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
                parent,
                isolated,
                cwd: RefCell::new(None),
                env: RefCell::new(HashMap::new()),
                env_deleted: RefCell::new(HashSet::new()),
                params: RefCell::new(HashMap::new()),
                params_deleted: RefCell::new(HashSet::new()),
                local_names: RefCell::new(HashSet::new()),
                functions: RefCell::new(HashMap::new()),
                functions_deleted: RefCell::new(HashSet::new()),
                aliases: RefCell::new(HashMap::new()),
                aliases_deleted: RefCell::new(HashSet::new()),
                readonly_vars: RefCell::new(HashSet::new()),
                integer_vars: RefCell::new(HashSet::new()),
                dir_stack: RefCell::new(None),
                options: RefCell::new(HashSet::new()),
                stdio: RefCell::new(StdioSlots::default()),
            }),
        }
    }

    /// Spawn an ordinary child frame.
    pub fn spawn_child(&self) -> Self {
        Self::make(ParentLink::Strong(self.node.clone()), false)
    }

    /// Spawn an isolated (subshell) frame: writes stay local.
    pub fn spawn_isolated(&self) -> Self {
        Self::make(ParentLink::Strong(self.node.clone()), true)
    }

    /// Spawn a frame held by a function definition. The parent link is weak
    /// so the root's function table cannot keep the whole tree in a cycle.
    pub fn spawn_captured(&self) -> Self {
        let mut root = self.node.clone();
        while let Some(p) = root.parent() {
            root = p;
        }
        Self::make(
            ParentLink::Captured {
                parent: Rc::downgrade(&self.node),
                root: Rc::downgrade(&root),
            },
            false,
        )
    }

    /// Stable identity of this exact frame (used by the `arg` registry).
    pub fn id(&self) -> u64 {
        self.node.id
    }

    /// The parent frame, if any. Builtins that must bind state in their
    /// caller's frame (`local`, `arg`) use this.
    pub fn parent(&self) -> Option<ExecContext> {
        self.node.parent().map(|node| ExecContext { node })
    }

    pub fn is_root(&self) -> bool {
        matches!(self.node.parent, ParentLink::None)
    }

    /// Walk from this frame to the nearest write owner for `name`: the first
    /// frame that declared it local, the first isolated frame, or the root.
    fn owner_for(&self, name: &str) -> Rc<ContextNode> {
        let mut cur = self.node.clone();
        loop {
            if cur.isolated || cur.local_names.borrow().contains(name) {
                return cur;
            }
            match cur.parent() {
                Some(p) => cur = p,
                None => return cur,
            }
        }
    }

    /// Nearest frame allowed to own ambient slots (functions, aliases,
    /// attributes, dir stack, options): first isolated frame or the root.
    fn ambient_owner(&self) -> Rc<ContextNode> {
        let mut cur = self.node.clone();
        loop {
            if cur.isolated {
                return cur;
            }
            match cur.parent() {
                Some(p) => cur = p,
                None => return cur,
            }
        }
    }

    // ------------------------------------------------------------------
    // cwd
    // ------------------------------------------------------------------

    pub fn cwd(&self) -> String {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if let Some(dir) = node.cwd.borrow().as_ref() {
                return dir.clone();
            }
            cur = node.parent();
        }
        "/".to_string()
    }

    /// Writes bubble to the root: the current directory is a process-wide
    /// concept. An isolated frame keeps the write to itself.
    pub fn set_cwd(&self, dir: impl Into<String>) {
        let owner = self.ambient_owner();
        *owner.cwd.borrow_mut() = Some(dir.into());
    }

    // ------------------------------------------------------------------
    // env
    // ------------------------------------------------------------------

    pub fn get_env(&self, name: &str) -> Option<String> {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.env_deleted.borrow().contains(name) {
                return None;
            }
            if let Some(v) = node.env.borrow().get(name) {
                return Some(v.clone());
            }
            cur = node.parent();
        }
        None
    }

    /// Full exported view, parent merged under child.
    pub fn env_all(&self) -> HashMap<String, String> {
        let mut chain = Vec::new();
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            cur = node.parent();
            chain.push(node);
        }
        let mut out = HashMap::new();
        for node in chain.into_iter().rev() {
            for name in node.env_deleted.borrow().iter() {
                out.remove(name);
            }
            for (k, v) in node.env.borrow().iter() {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }

    /// Merge entries into env; a `None` value deletes. Writes walk to the
    /// nearest owner unless the name is readonly.
    pub fn set_env(&self, name: &str, value: Option<String>) -> Result<(), ContextError> {
        if value.is_some() && self.is_readonly(name) {
            return Err(ContextError::ReadonlyVariable(name.to_string()));
        }
        let owner = self.owner_for(name);
        match value {
            Some(v) => {
                owner.env.borrow_mut().insert(name.to_string(), v);
                owner.env_deleted.borrow_mut().remove(name);
            }
            None => {
                owner.env.borrow_mut().remove(name);
                if owner.parent().is_some() {
                    owner.env_deleted.borrow_mut().insert(name.to_string());
                }
            }
        }
        Ok(())
    }

    /// Bind in this exact frame, never delegating.
    pub fn set_local_env(&self, name: &str, value: impl Into<String>) {
        self.node.env.borrow_mut().insert(name.to_string(), value.into());
        self.node.env_deleted.borrow_mut().remove(name);
    }

    // ------------------------------------------------------------------
    // params
    // ------------------------------------------------------------------

    pub fn get_param(&self, name: &str) -> Option<String> {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.params_deleted.borrow().contains(name) {
                return None;
            }
            if let Some(v) = node.params.borrow().get(name) {
                return Some(v.clone());
            }
            cur = node.parent();
        }
        None
    }

    pub fn params_all(&self) -> HashMap<String, String> {
        let mut chain = Vec::new();
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            cur = node.parent();
            chain.push(node);
        }
        let mut out = HashMap::new();
        for node in chain.into_iter().rev() {
            for name in node.params_deleted.borrow().iter() {
                out.remove(name);
            }
            for (k, v) in node.params.borrow().iter() {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }

    pub fn set_param(&self, name: &str, value: Option<String>) -> Result<(), ContextError> {
        if value.is_some() && self.is_readonly(name) {
            return Err(ContextError::ReadonlyVariable(name.to_string()));
        }
        let owner = self.owner_for(name);
        match value {
            Some(v) => {
                owner.params.borrow_mut().insert(name.to_string(), v);
                owner.params_deleted.borrow_mut().remove(name);
            }
            None => {
                owner.params.borrow_mut().remove(name);
                if owner.parent().is_some() {
                    owner.params_deleted.borrow_mut().insert(name.to_string());
                }
            }
        }
        Ok(())
    }

    /// Bind in this exact frame (`local`, command-prefix assignments).
    pub fn set_local_param(&self, name: &str, value: impl Into<String>) {
        self.node.local_names.borrow_mut().insert(name.to_string());
        self.node.params.borrow_mut().insert(name.to_string(), value.into());
        self.node.params_deleted.borrow_mut().remove(name);
    }

    /// Declare a name local without giving it a value yet.
    pub fn declare_local(&self, name: &str) {
        self.node.local_names.borrow_mut().insert(name.to_string());
        self.node.params_deleted.borrow_mut().insert(name.to_string());
    }

    /// Variable lookup for expansion: params shadow env on collision.
    pub fn get_var(&self, name: &str) -> Option<String> {
        self.get_param(name).or_else(|| self.get_env(name))
    }

    /// Merged env-under-params view, for printing (`set`) and hosts.
    pub fn vars_all(&self) -> HashMap<String, String> {
        let mut out = self.env_all();
        out.extend(self.params_all());
        out
    }

    pub fn ifs(&self) -> String {
        self.get_var("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string())
    }

    // ------------------------------------------------------------------
    // positional parameters
    // ------------------------------------------------------------------

    /// Number of positional parameters currently visible.
    pub fn positional_count(&self) -> usize {
        self.get_param("#").and_then(|s| s.parse().ok()).unwrap_or(0)
    }

    pub fn positional_args(&self) -> Vec<String> {
        let n = self.positional_count();
        (1..=n)
            .map(|i| self.get_param(&i.to_string()).unwrap_or_default())
            .collect()
    }

    /// Bind positional parameters in this exact frame (function calls).
    pub fn set_positional_local(&self, args: &[String]) {
        for (i, arg) in args.iter().enumerate() {
            self.set_local_param(&(i + 1).to_string(), arg.clone());
        }
        // Shadow any inherited higher-numbered parameters.
        let inherited = self.positional_count();
        for i in args.len() + 1..=inherited.max(args.len()) {
            self.node.local_names.borrow_mut().insert(i.to_string());
            self.node.params_deleted.borrow_mut().insert(i.to_string());
        }
        self.set_local_param("#", args.len().to_string());
        self.set_local_param("@", args.join(" "));
        self.set_local_param("*", args.join(" "));
    }

    /// Replace positional parameters through the normal write path
    /// (`set --`, `shift`).
    pub fn replace_positional(&self, args: &[String]) -> Result<(), ContextError> {
        let old = self.positional_count();
        for i in 1..=old {
            self.set_param(&i.to_string(), None)?;
        }
        for (i, arg) in args.iter().enumerate() {
            self.set_param(&(i + 1).to_string(), Some(arg.clone()))?;
        }
        self.set_param("#", Some(args.len().to_string()))?;
        self.set_param("@", Some(args.join(" ")))?;
        self.set_param("*", Some(args.join(" ")))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // functions
    // ------------------------------------------------------------------

    pub fn get_function(&self, name: &str) -> Option<FunctionDef> {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.functions_deleted.borrow().contains(name) {
                return None;
            }
            if let Some(f) = node.functions.borrow().get(name) {
                return Some(f.clone());
            }
            cur = node.parent();
        }
        None
    }

    pub fn function_names(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            cur = node.parent();
            chain.push(node);
        }
        let mut set: HashSet<String> = HashSet::new();
        for node in chain.into_iter().rev() {
            for name in node.functions_deleted.borrow().iter() {
                set.remove(name);
            }
            for name in node.functions.borrow().keys() {
                set.insert(name.clone());
            }
        }
        let mut names: Vec<String> = set.into_iter().collect();
        names.sort();
        names
    }

    /// Functions are ambient: defining in a child defines at the root
    /// (stopping at a subshell boundary).
    pub fn set_function(&self, def: FunctionDef) {
        let owner = self.ambient_owner();
        owner.functions_deleted.borrow_mut().remove(&def.name);
        owner.functions.borrow_mut().insert(def.name.clone(), def);
    }

    /// Unset searches locally first, then the parent chain.
    pub fn unset_function(&self, name: &str) -> bool {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.functions.borrow().contains_key(name) {
                node.functions.borrow_mut().remove(name);
                return true;
            }
            if node.isolated {
                // Do not reach past a subshell boundary for removal;
                // tombstone so the name reads as unset inside.
                if self.get_function(name).is_some() {
                    node.functions_deleted.borrow_mut().insert(name.to_string());
                    return true;
                }
                return false;
            }
            cur = node.parent();
        }
        false
    }

    // ------------------------------------------------------------------
    // aliases
    // ------------------------------------------------------------------

    pub fn get_alias(&self, name: &str) -> Option<String> {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.aliases_deleted.borrow().contains(name) {
                return None;
            }
            if let Some(v) = node.aliases.borrow().get(name) {
                return Some(v.clone());
            }
            cur = node.parent();
        }
        None
    }

    pub fn aliases_all(&self) -> HashMap<String, String> {
        let mut chain = Vec::new();
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            cur = node.parent();
            chain.push(node);
        }
        let mut out = HashMap::new();
        for node in chain.into_iter().rev() {
            for name in node.aliases_deleted.borrow().iter() {
                out.remove(name);
            }
            for (k, v) in node.aliases.borrow().iter() {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }

    pub fn set_alias(&self, name: &str, value: impl Into<String>) {
        let owner = self.ambient_owner();
        owner.aliases_deleted.borrow_mut().remove(name);
        owner.aliases.borrow_mut().insert(name.to_string(), value.into());
    }

    pub fn unset_alias(&self, name: &str) -> bool {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.aliases.borrow().contains_key(name) {
                node.aliases.borrow_mut().remove(name);
                return true;
            }
            if node.isolated {
                if self.get_alias(name).is_some() {
                    node.aliases_deleted.borrow_mut().insert(name.to_string());
                    return true;
                }
                return false;
            }
            cur = node.parent();
        }
        false
    }

    pub fn clear_aliases(&self) {
        for name in self.aliases_all().keys() {
            self.unset_alias(name);
        }
    }

    // ------------------------------------------------------------------
    // variable attributes
    // ------------------------------------------------------------------

    pub fn is_readonly(&self, name: &str) -> bool {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.readonly_vars.borrow().contains(name) {
                return true;
            }
            cur = node.parent();
        }
        false
    }

    pub fn mark_readonly(&self, name: &str) {
        self.ambient_owner().readonly_vars.borrow_mut().insert(name.to_string());
    }

    pub fn clear_readonly(&self, name: &str) {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            node.readonly_vars.borrow_mut().remove(name);
            cur = node.parent();
        }
    }

    pub fn is_integer_var(&self, name: &str) -> bool {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.integer_vars.borrow().contains(name) {
                return true;
            }
            cur = node.parent();
        }
        false
    }

    pub fn mark_integer(&self, name: &str) {
        self.ambient_owner().integer_vars.borrow_mut().insert(name.to_string());
    }

    pub fn clear_integer(&self, name: &str) {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            node.integer_vars.borrow_mut().remove(name);
            cur = node.parent();
        }
    }

    // ------------------------------------------------------------------
    // directory stack
    // ------------------------------------------------------------------

    fn dir_stack_owner(&self) -> Rc<ContextNode> {
        let owner = self.ambient_owner();
        if owner.dir_stack.borrow().is_none() {
            // First write inside a subshell: copy the inherited stack so
            // mutations stay local.
            let inherited = self.dir_stack();
            *owner.dir_stack.borrow_mut() = Some(inherited);
        }
        owner
    }

    pub fn dir_stack(&self) -> Vec<String> {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if let Some(stack) = node.dir_stack.borrow().as_ref() {
                return stack.clone();
            }
            cur = node.parent();
        }
        Vec::new()
    }

    pub fn dir_stack_push(&self, dir: impl Into<String>) {
        let owner = self.dir_stack_owner();
        let mut stack = owner.dir_stack.borrow_mut();
        stack.as_mut().unwrap().insert(0, dir.into());
    }

    pub fn dir_stack_pop(&self) -> Option<String> {
        let owner = self.dir_stack_owner();
        let mut stack = owner.dir_stack.borrow_mut();
        let stack = stack.as_mut().unwrap();
        if stack.is_empty() {
            None
        } else {
            Some(stack.remove(0))
        }
    }

    pub fn dir_stack_remove_at(&self, index: usize) -> Option<String> {
        let owner = self.dir_stack_owner();
        let mut stack = owner.dir_stack.borrow_mut();
        let stack = stack.as_mut().unwrap();
        if index < stack.len() {
            Some(stack.remove(index))
        } else {
            None
        }
    }

    pub fn dir_stack_clear(&self) {
        let owner = self.dir_stack_owner();
        owner.dir_stack.borrow_mut().as_mut().unwrap().clear();
    }

    // ------------------------------------------------------------------
    // shell options (recorded, not enforced)
    // ------------------------------------------------------------------

    pub fn option_enabled(&self, name: &str) -> bool {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if node.options.borrow().contains(name) {
                return true;
            }
            if node.isolated {
                return false;
            }
            cur = node.parent();
        }
        false
    }

    pub fn enable_option(&self, name: &str) {
        self.ambient_owner().options.borrow_mut().insert(name.to_string());
    }

    pub fn disable_option(&self, name: &str) {
        self.ambient_owner().options.borrow_mut().remove(name);
    }

    pub fn options_enabled(&self) -> Vec<String> {
        let mut out: Vec<String> = self.ambient_owner().options.borrow().iter().cloned().collect();
        out.sort();
        out
    }

    // ------------------------------------------------------------------
    // I/O endpoints
    // ------------------------------------------------------------------

    pub fn stdin(&self) -> String {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if let Some(ep) = node.stdio.borrow().stdin.as_ref() {
                return ep.clone();
            }
            cur = node.parent();
        }
        "/dev/stdin".to_string()
    }

    pub fn stdout(&self) -> (String, bool) {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if let Some(ep) = node.stdio.borrow().stdout.as_ref() {
                return ep.clone();
            }
            cur = node.parent();
        }
        ("/dev/stdout".to_string(), false)
    }

    pub fn stderr(&self) -> (String, bool) {
        let mut cur = Some(self.node.clone());
        while let Some(node) = cur {
            if let Some(ep) = node.stdio.borrow().stderr.as_ref() {
                return ep.clone();
            }
            cur = node.parent();
        }
        ("/dev/stderr".to_string(), false)
    }

    /// Endpoint overrides are always local to the frame: a redirection
    /// applies to one command, not its ancestors.
    pub fn set_stdin(&self, endpoint: impl Into<String>) {
        self.node.stdio.borrow_mut().stdin = Some(endpoint.into());
    }

    pub fn set_stdout(&self, endpoint: impl Into<String>, append: bool) {
        self.node.stdio.borrow_mut().stdout = Some((endpoint.into(), append));
    }

    pub fn set_stderr(&self, endpoint: impl Into<String>, append: bool) {
        self.node.stdio.borrow_mut().stderr = Some((endpoint.into(), append));
    }
}

// ============================================================================
// Tests
// ============================================================================
