//! In-Memory Host Shell
//!
//! A deterministic, self-contained implementation of the shell facade for
//! embedding, demos and tests: cooperative bounded pipes, an in-memory
//! filesystem and a handful of external commands so pipelines can be
//! exercised end to end.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use regex_lite::Regex;
use tokio::sync::Notify;

use crate::context::ExecContext;
use crate::interpreter::pattern::compile_glob;

use super::{ExecuteOptions, HostError, PathTest, ShellHost};

/// Default pipe capacity in bytes; writes beyond it suspend until a reader
/// drains.
const PIPE_CAPACITY: usize = 65536;

struct PipeBuf {
    data: String,
    eof: bool,
}

struct Pipe {
    state: RefCell<PipeBuf>,
    readable: Notify,
    writable: Notify,
}

impl Pipe {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(PipeBuf { data: String::new(), eof: false }),
            readable: Notify::new(),
            writable: Notify::new(),
        })
    }
}

/// In-memory shell host.
pub struct MemoryShell {
    files: RefCell<HashMap<String, String>>,
    dirs: RefCell<HashSet<String>>,
    executables: RefCell<HashSet<String>>,
    pipes: RefCell<HashMap<String, Rc<Pipe>>>,
    next_pipe: Cell<u64>,
    capacity: usize,
}

impl MemoryShell {
    pub fn new() -> Self {
        let shell = Self {
            files: RefCell::new(HashMap::new()),
            dirs: RefCell::new(HashSet::new()),
            executables: RefCell::new(HashSet::new()),
            pipes: RefCell::new(HashMap::new()),
            next_pipe: Cell::new(1),
            capacity: PIPE_CAPACITY,
        };
        for dir in ["/", "/home", "/home/user", "/tmp", "/dev"] {
            shell.dirs.borrow_mut().insert(dir.to_string());
        }
        for dev in ["/dev/null", "/dev/stdin", "/dev/stdout", "/dev/stderr"] {
            shell.files.borrow_mut().insert(dev.to_string(), String::new());
        }
        shell
    }

    // ------------------------------------------------------------------
    // Filesystem surface for embedders and tests
    // ------------------------------------------------------------------

    pub fn add_file(&self, path: &str, content: impl Into<String>) {
        let path = normalize_path(path);
        self.ensure_parents(&path);
        self.files.borrow_mut().insert(path, content.into());
    }

    pub fn add_dir(&self, path: &str) {
        let path = normalize_path(path);
        self.ensure_parents(&path);
        self.dirs.borrow_mut().insert(path);
    }

    pub fn mark_executable(&self, path: &str) {
        self.executables.borrow_mut().insert(normalize_path(path));
    }

    pub fn file_content(&self, path: &str) -> Option<String> {
        self.files.borrow().get(&normalize_path(path)).cloned()
    }

    /// Number of pipes currently alive (for leak assertions in tests).
    pub fn live_pipes(&self) -> usize {
        self.pipes.borrow().len()
    }

    fn ensure_parents(&self, path: &str) {
        let mut dir = dirname(path);
        let mut dirs = self.dirs.borrow_mut();
        while dir != "/" && !dirs.contains(&dir) {
            dirs.insert(dir.clone());
            dir = dirname(&dir);
        }
    }

    fn resolve(&self, ctx: &ExecContext, path: &str) -> String {
        if path.starts_with('/') {
            normalize_path(path)
        } else {
            normalize_path(&format!("{}/{}", ctx.cwd(), path))
        }
    }

    fn entries_in(&self, dir: &str) -> Vec<String> {
        let dir = normalize_path(dir);
        let mut names = HashSet::new();
        for path in self.files.borrow().keys().chain(self.dirs.borrow().iter()) {
            if path == &dir {
                continue;
            }
            if dirname(path) == dir {
                if let Some(name) = path.rsplit('/').next() {
                    names.insert(name.to_string());
                }
            }
        }
        let mut out: Vec<String> = names.into_iter().collect();
        out.sort();
        out
    }

    fn pipe(&self, name: &str) -> Option<Rc<Pipe>> {
        self.pipes.borrow().get(name).cloned()
    }

    // ------------------------------------------------------------------
    // stdio helpers for the external commands
    // ------------------------------------------------------------------

    async fn read_stdin(&self, ctx: &ExecContext) -> String {
        let endpoint = ctx.stdin();
        if self.is_pipe(&endpoint) {
            let mut out = String::new();
            loop {
                match self.pipe_read(&endpoint).await {
                    Ok(chunk) if chunk.is_empty() => break,
                    Ok(chunk) => out.push_str(&chunk),
                    Err(_) => break,
                }
            }
            out
        } else {
            self.files
                .borrow()
                .get(&normalize_path(&endpoint))
                .cloned()
                .unwrap_or_default()
        }
    }

    async fn write_stdout(&self, ctx: &ExecContext, data: &str) -> Result<(), HostError> {
        if data.is_empty() {
            return Ok(());
        }
        let (endpoint, append) = ctx.stdout();
        self.write_endpoint(&endpoint, append, data).await
    }

    async fn write_stderr(&self, ctx: &ExecContext, data: &str) -> Result<(), HostError> {
        if data.is_empty() {
            return Ok(());
        }
        let (endpoint, append) = ctx.stderr();
        self.write_endpoint(&endpoint, append, data).await
    }

    async fn write_endpoint(
        &self,
        endpoint: &str,
        append: bool,
        data: &str,
    ) -> Result<(), HostError> {
        if self.is_pipe(endpoint) {
            self.pipe_write(endpoint, data).await
        } else {
            let path = normalize_path(endpoint);
            let mut files = self.files.borrow_mut();
            if append {
                files.entry(path).or_default().push_str(data);
            } else {
                files.insert(path, data.to_string());
            }
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // External commands
    // ------------------------------------------------------------------

    async fn read_input(&self, ctx: &ExecContext, files: &[String]) -> Result<String, HostError> {
        if files.is_empty() {
            return Ok(self.read_stdin(ctx).await);
        }
        let mut out = String::new();
        for f in files {
            let path = self.resolve(ctx, f);
            match self.files.borrow().get(&path) {
                Some(content) => out.push_str(content),
                None => return Err(HostError::NoSuchFile(f.clone())),
            }
        }
        Ok(out)
    }

    async fn run_cat(&self, ctx: &ExecContext, args: &[String]) -> Result<i32, HostError> {
        let files: Vec<String> = args.iter().filter(|a| !a.starts_with('-')).cloned().collect();
        match self.read_input(ctx, &files).await {
            Ok(content) => {
                self.write_stdout(ctx, &content).await?;
                Ok(0)
            }
            Err(e) => {
                self.write_stderr(ctx, &format!("cat: {}\n", e)).await?;
                Ok(1)
            }
        }
    }

    async fn run_grep(&self, ctx: &ExecContext, args: &[String]) -> Result<i32, HostError> {
        let mut invert = false;
        let mut ignore_case = false;
        let mut count_only = false;
        let mut rest: Vec<String> = Vec::new();
        for arg in args {
            match arg.as_str() {
                "-v" => invert = true,
                "-i" => ignore_case = true,
                "-c" => count_only = true,
                _ => rest.push(arg.clone()),
            }
        }
        let Some(pattern) = rest.first().cloned() else {
            self.write_stderr(ctx, "usage: grep [-ivc] pattern [file...]\n").await?;
            return Ok(2);
        };
        let pattern = if ignore_case { format!("(?i){}", pattern) } else { pattern };
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => {
                self.write_stderr(ctx, &format!("grep: invalid pattern: {}\n", pattern)).await?;
                return Ok(2);
            }
        };
        let input = self.read_input(ctx, &rest[1..]).await.unwrap_or_default();
        let mut matched = 0usize;
        let mut out = String::new();
        for line in input.lines() {
            let hit = re.is_match(line) != invert;
            if hit {
                matched += 1;
                if !count_only {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        if count_only {
            out = format!("{}\n", matched);
        }
        self.write_stdout(ctx, &out).await?;
        Ok(if matched > 0 { 0 } else { 1 })
    }

    async fn run_wc(&self, ctx: &ExecContext, args: &[String]) -> Result<i32, HostError> {
        let mut lines = false;
        let mut words = false;
        let mut chars = false;
        let mut files: Vec<String> = Vec::new();
        for arg in args {
            match arg.as_str() {
                "-l" => lines = true,
                "-w" => words = true,
                "-c" => chars = true,
                _ => files.push(arg.clone()),
            }
        }
        let input = self.read_input(ctx, &files).await.unwrap_or_default();
        let nl = input.lines().count();
        let nw = input.split_whitespace().count();
        let nc = input.len();
        let out = if lines && !words && !chars {
            format!("{}\n", nl)
        } else if words && !lines && !chars {
            format!("{}\n", nw)
        } else if chars && !lines && !words {
            format!("{}\n", nc)
        } else {
            format!("{} {} {}\n", nl, nw, nc)
        };
        self.write_stdout(ctx, &out).await?;
        Ok(0)
    }

    async fn run_head(&self, ctx: &ExecContext, args: &[String]) -> Result<i32, HostError> {
        let mut n = 10usize;
        let mut files: Vec<String> = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "-n" {
                if let Some(v) = iter.next() {
                    n = v.parse().unwrap_or(10);
                }
            } else if let Some(v) = arg.strip_prefix("-n") {
                n = v.parse().unwrap_or(10);
            } else if !arg.starts_with('-') {
                files.push(arg.clone());
            }
        }
        let input = self.read_input(ctx, &files).await.unwrap_or_default();
        let mut out = String::new();
        for line in input.lines().take(n) {
            out.push_str(line);
            out.push('\n');
        }
        self.write_stdout(ctx, &out).await?;
        Ok(0)
    }

    async fn run_tr(&self, ctx: &ExecContext, args: &[String]) -> Result<i32, HostError> {
        let input = self.read_stdin(ctx).await;
        let out = if args.first().map(|a| a.as_str()) == Some("-d") {
            let set: HashSet<char> = args.get(1).map(|s| expand_tr_set(s)).unwrap_or_default();
            input.chars().filter(|c| !set.contains(c)).collect()
        } else if args.len() >= 2 {
            let from = expand_tr_set_ordered(&args[0]);
            let to = expand_tr_set_ordered(&args[1]);
            input
                .chars()
                .map(|c| match from.iter().position(|&f| f == c) {
                    Some(i) => *to.get(i).or_else(|| to.last()).unwrap_or(&c),
                    None => c,
                })
                .collect()
        } else {
            input
        };
        self.write_stdout(ctx, &out).await?;
        Ok(0)
    }

    async fn run_sort(&self, ctx: &ExecContext, args: &[String]) -> Result<i32, HostError> {
        let mut reverse = false;
        let mut numeric = false;
        let mut unique = false;
        let mut files: Vec<String> = Vec::new();
        for arg in args {
            match arg.as_str() {
                "-r" => reverse = true,
                "-n" => numeric = true,
                "-u" => unique = true,
                _ => files.push(arg.clone()),
            }
        }
        let input = self.read_input(ctx, &files).await.unwrap_or_default();
        let mut lines: Vec<String> = input.lines().map(|s| s.to_string()).collect();
        if numeric {
            lines.sort_by_key(|l| l.trim().parse::<i64>().unwrap_or(0));
        } else {
            lines.sort();
        }
        if reverse {
            lines.reverse();
        }
        if unique {
            lines.dedup();
        }
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        self.write_stdout(ctx, &out).await?;
        Ok(0)
    }
}

impl Default for MemoryShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl ShellHost for MemoryShell {
    async fn execute(
        &self,
        ctx: &ExecContext,
        name: &str,
        args: &[String],
        _opts: &ExecuteOptions,
    ) -> Result<i32, HostError> {
        match name {
            "cat" => self.run_cat(ctx, args).await,
            "grep" => self.run_grep(ctx, args).await,
            "wc" => self.run_wc(ctx, args).await,
            "head" => self.run_head(ctx, args).await,
            "tr" => self.run_tr(ctx, args).await,
            "sort" => self.run_sort(ctx, args).await,
            _ => Err(HostError::NotFound(name.to_string())),
        }
    }

    async fn pipe_open(&self) -> Result<String, HostError> {
        let id = self.next_pipe.get();
        self.next_pipe.set(id + 1);
        let name = format!("pipe:{}", id);
        self.pipes.borrow_mut().insert(name.clone(), Pipe::new());
        Ok(name)
    }

    async fn pipe_close(&self, name: &str) -> Result<(), HostError> {
        if let Some(pipe) = self.pipe(name) {
            pipe.state.borrow_mut().eof = true;
            pipe.readable.notify_one();
        }
        Ok(())
    }

    async fn pipe_remove(&self, name: &str) -> Result<(), HostError> {
        if let Some(pipe) = self.pipes.borrow_mut().remove(name) {
            pipe.state.borrow_mut().eof = true;
            pipe.readable.notify_one();
            pipe.writable.notify_one();
        }
        Ok(())
    }

    async fn pipe_read(&self, name: &str) -> Result<String, HostError> {
        loop {
            let Some(pipe) = self.pipe(name) else {
                // Removed pipes read as EOF rather than blocking forever.
                return Ok(String::new());
            };
            {
                let mut state = pipe.state.borrow_mut();
                if !state.data.is_empty() {
                    let out = std::mem::take(&mut state.data);
                    drop(state);
                    pipe.writable.notify_one();
                    return Ok(out);
                }
                if state.eof {
                    return Ok(String::new());
                }
            }
            pipe.readable.notified().await;
        }
    }

    async fn pipe_write(&self, name: &str, data: &str) -> Result<(), HostError> {
        if data.is_empty() {
            // Empty write is the EOF signal.
            if let Some(pipe) = self.pipe(name) {
                pipe.state.borrow_mut().eof = true;
                pipe.readable.notify_one();
            }
            return Ok(());
        }
        loop {
            let Some(pipe) = self.pipe(name) else {
                return Err(HostError::Io(format!("pipe closed: {}", name)));
            };
            {
                let mut state = pipe.state.borrow_mut();
                if state.eof {
                    // Writing past EOF is dropped silently, like a closed fd
                    // with signals off.
                    return Ok(());
                }
                if state.data.len() < self.capacity {
                    state.data.push_str(data);
                    drop(state);
                    pipe.readable.notify_one();
                    return Ok(());
                }
            }
            pipe.writable.notified().await;
        }
    }

    fn is_pipe(&self, name: &str) -> bool {
        name.starts_with("pipe:")
    }

    async fn pipe_from_file(
        &self,
        ctx: &ExecContext,
        path: &str,
        pipe: &str,
    ) -> Result<(), HostError> {
        let resolved = self.resolve(ctx, path);
        let content = self.files.borrow().get(&resolved).cloned();
        match content {
            Some(content) => {
                if !content.is_empty() {
                    self.pipe_write(pipe, &content).await?;
                }
                self.pipe_write(pipe, "").await
            }
            None => {
                self.pipe_write(pipe, "").await?;
                Err(HostError::NoSuchFile(path.to_string()))
            }
        }
    }

    async fn pipe_to_file(
        &self,
        ctx: &ExecContext,
        pipe: &str,
        path: &str,
        append: bool,
    ) -> Result<(), HostError> {
        let resolved = self.resolve(ctx, path);
        if !append {
            self.files.borrow_mut().insert(resolved.clone(), String::new());
        } else {
            self.files.borrow_mut().entry(resolved.clone()).or_default();
        }
        loop {
            let chunk = self.pipe_read(pipe).await?;
            if chunk.is_empty() {
                return Ok(());
            }
            self.files.borrow_mut().entry(resolved.clone()).or_default().push_str(&chunk);
        }
    }

    async fn resolve_path(&self, ctx: &ExecContext, pattern: &str) -> Option<Vec<String>> {
        let (dir, leaf, relative) = if let Some(pos) = pattern.rfind('/') {
            let dir_part = &pattern[..pos.max(1)];
            let dir = self.resolve(ctx, if pos == 0 { "/" } else { dir_part });
            (dir, pattern[pos + 1..].to_string(), None)
        } else {
            (ctx.cwd(), pattern.to_string(), Some(()))
        };
        let Some(re) = compile_glob(&leaf) else {
            // Untranslatable pattern: nothing can match it.
            return Some(vec![pattern.to_string()]);
        };
        let mut matches: Vec<String> = Vec::new();
        for name in self.entries_in(&dir) {
            if name.starts_with('.') && !leaf.starts_with('.') {
                continue;
            }
            if re.is_match(&name) {
                if relative.is_some() {
                    matches.push(name);
                } else if dir == "/" {
                    matches.push(format!("/{}", name));
                } else {
                    matches.push(format!("{}/{}", dir, name));
                }
            }
        }
        if matches.is_empty() {
            // Convention: no matches returns the pattern itself.
            Some(vec![pattern.to_string()])
        } else {
            Some(matches)
        }
    }

    async fn resolve_home_user(&self, ctx: &ExecContext, user: Option<&str>) -> String {
        match user {
            None => ctx
                .get_env("HOME")
                .unwrap_or_else(|| "/home/user".to_string()),
            Some(user) => {
                let home = format!("/home/{}", user);
                if self.dirs.borrow().contains(&home) {
                    home
                } else {
                    String::new()
                }
            }
        }
    }

    async fn read_file(&self, ctx: &ExecContext, path: &str) -> Result<String, HostError> {
        let resolved = self.resolve(ctx, path);
        if self.dirs.borrow().contains(&resolved) {
            return Err(HostError::IsDirectory(path.to_string()));
        }
        self.files
            .borrow()
            .get(&resolved)
            .cloned()
            .ok_or_else(|| HostError::NoSuchFile(path.to_string()))
    }

    async fn test_path(
        &self,
        ctx: &ExecContext,
        op: PathTest,
        path: &str,
        other: Option<&str>,
    ) -> bool {
        let resolved = self.resolve(ctx, path);
        let is_file = self.files.borrow().contains_key(&resolved);
        let is_dir = self.dirs.borrow().contains(&resolved);
        match op {
            PathTest::Exists => is_file || is_dir,
            PathTest::RegularFile => is_file,
            PathTest::Directory => is_dir,
            PathTest::Readable | PathTest::Writable => is_file || is_dir,
            PathTest::Executable => {
                is_dir || self.executables.borrow().contains(&resolved)
            }
            PathTest::NonEmpty => self
                .files
                .borrow()
                .get(&resolved)
                .map(|c| !c.is_empty())
                .unwrap_or(false),
            PathTest::SameDeviceAndInode => {
                other.map(|o| self.resolve(ctx, o) == resolved).unwrap_or(false)
            }
            // No symlinks, devices, ownership or timestamps in this host.
            _ => false,
        }
    }
}

// ============================================================================
// Path utilities
// ============================================================================

fn normalize_path(path: &str) -> String {
    let mut normalized = path.to_string();
    if !normalized.starts_with('/') {
        normalized = format!("/{}", normalized);
    }
    let parts: Vec<&str> = normalized
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    let mut resolved: Vec<&str> = Vec::new();
    for part in parts {
        if part == ".." {
            resolved.pop();
        } else {
            resolved.push(part);
        }
    }
    if resolved.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", resolved.join("/"))
    }
}

fn dirname(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
        None => "/".to_string(),
    }
}

/// Expand a tr set like "a-z" into its characters, preserving order.
fn expand_tr_set_ordered(set: &str) -> Vec<char> {
    let chars: Vec<char> = set.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if i + 2 < chars.len() && chars[i + 1] == '-' {
            let (lo, hi) = (chars[i], chars[i + 2]);
            if lo <= hi {
                for c in lo..=hi {
                    out.push(c);
                }
                i += 3;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn expand_tr_set(set: &str) -> HashSet<char> {
    expand_tr_set_ordered(set).into_iter().collect()
}

// ============================================================================
// Tests
// ============================================================================
