use clap::Parser;
use std::io::Read;
use std::rc::Rc;

use bash_exec::{ExecContext, Executor, MemoryShell};

#[derive(Parser)]
#[command(name = "bash-exec")]
#[command(about = "Run bash scripts against an in-memory shell host")]
#[command(version)]
struct Cli {
    /// Execute the script from a command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Working directory inside the in-memory filesystem
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Output results as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Script source: -c, file, or stdin.
    let script = if let Some(s) = cli.script {
        s
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error: cannot read script file {}: {}", file, e);
                std::process::exit(1);
            }
        }
    } else {
        use std::io::IsTerminal;
        if std::io::stdin().is_terminal() {
            eprintln!("Error: no script provided. Use -c 'script', a script file, or pipe via stdin.");
            std::process::exit(1);
        }
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).unwrap_or_default();
        buf
    };

    if script.trim().is_empty() {
        if cli.json {
            println!("{}", serde_json::json!({"stdout": "", "stderr": "", "exitCode": 0}));
        }
        std::process::exit(0);
    }

    let cwd = cli.cwd.unwrap_or_else(|| "/home/user".to_string());
    let shell = Rc::new(MemoryShell::new());
    shell.add_dir(&cwd);

    let ctx = ExecContext::new_root(cwd.clone());
    let _ = ctx.set_env("HOME", Some("/home/user".to_string()));
    let _ = ctx.set_env("PWD", Some(cwd));
    let _ = ctx.set_env("PATH", Some("/usr/bin:/bin".to_string()));

    let executor = Executor::new(shell);
    let result = match executor.execute_and_capture(&script, &ctx).await {
        Ok(result) => result,
        Err(bash_exec::ExecError::Parse(e)) => {
            eprintln!("bash: {}", e);
            eprint!("{}", e.snippet());
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("bash: {}", e);
            std::process::exit(1);
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "stdout": result.stdout,
                "stderr": result.stderr,
                "exitCode": result.code,
            })
        );
    } else {
        if !result.stdout.is_empty() {
            print!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
    }

    std::process::exit(result.code);
}
