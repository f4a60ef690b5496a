//! End-to-end scenarios through the public API: scripts run against the
//! in-memory host shell with captured output.

use std::rc::Rc;

use bash_exec::{CaptureResult, ExecContext, Executor, MemoryShell};

struct Harness {
    shell: Rc<MemoryShell>,
    exec: Executor,
    ctx: ExecContext,
}

fn harness() -> Harness {
    let shell = Rc::new(MemoryShell::new());
    let exec = Executor::new(shell.clone());
    let ctx = ExecContext::new_root("/home/user");
    ctx.set_env("HOME", Some("/home/user".to_string())).unwrap();
    ctx.set_env("PWD", Some("/home/user".to_string())).unwrap();
    Harness { shell, exec, ctx }
}

impl Harness {
    async fn run(&self, script: &str) -> CaptureResult {
        self.exec
            .execute_and_capture(script, &self.ctx)
            .await
            .expect("script execution failed")
    }
}

// ----------------------------------------------------------------------
// End-to-end scenarios
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_pipeline_echo_grep_wc() {
    let h = harness();
    let result = h.run("echo \"hello world\" | grep hello | wc -l").await;
    assert_eq!(result.stdout, "1\n");
    assert_eq!(result.code, 0);
}

#[tokio::test]
async fn test_loop_with_break() {
    let h = harness();
    let result = h
        .run("i=0; while true; do echo $i; i=$((i+1)); if [ $i -eq 3 ]; then break; fi; done; echo done")
        .await;
    assert_eq!(result.stdout, "0\n1\n2\ndone\n");
    assert_eq!(result.code, 0);
}

#[tokio::test]
async fn test_function_return() {
    let h = harness();
    let result = h
        .run("f(){ echo in; return 42; echo nope; }; f; echo \"ec=$?\"")
        .await;
    assert_eq!(result.stdout, "in\nec=42\n");
    assert_eq!(result.code, 0);
}

#[tokio::test]
async fn test_case_glob() {
    let h = harness();
    let result = h
        .run("x=file.txt; case $x in *.sh) echo shell script;; *.txt) echo text file;; *) echo other;; esac")
        .await;
    assert_eq!(result.stdout, "text file\n");
    assert_eq!(result.code, 0);
}

#[tokio::test]
async fn test_conditional_regex_and_short_circuit() {
    let h = harness();
    let result = h.run("[[ \"123\" =~ ^[0-9]+$ && -n \"x\" ]]").await;
    assert_eq!(result.code, 0);

    let result = h.run("[[ \"abc\" =~ ^[0-9]+$ ]]").await;
    assert_eq!(result.code, 1);
}

#[tokio::test]
async fn test_glob_expansion_via_host() {
    let h = harness();
    h.shell.add_file("/home/user/a.txt", "");
    h.shell.add_file("/home/user/b.txt", "");
    h.shell.add_file("/home/user/c.log", "");
    let result = h.run("for f in *.txt; do echo $f; done").await;
    assert_eq!(result.stdout, "a.txt\nb.txt\n");
}

#[tokio::test]
async fn test_glob_without_match_keeps_pattern() {
    let h = harness();
    let result = h.run("echo *.zip").await;
    assert_eq!(result.stdout, "*.zip\n");
}

#[tokio::test]
async fn test_arithmetic_postfix_update() {
    let h = harness();
    let result = h.run("x=5; echo $((x++)); echo $x").await;
    assert_eq!(result.stdout, "5\n6\n");
}

#[tokio::test]
async fn test_exit_signal_through_loop() {
    let h = harness();
    let result = h
        .run("i=0; while [ $i -lt 5 ]; do echo $i; if [ $i -eq 2 ]; then exit 99; fi; i=$((i+1)); done; echo after")
        .await;
    assert_eq!(result.stdout, "0\n1\n2\n");
    assert!(!result.stdout.contains("after"));
    assert_eq!(result.code, 99);
}

// ----------------------------------------------------------------------
// Quantified invariants
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_status_parameter_tracks_every_command() {
    let h = harness();
    let result = h.run("false; echo $?; true; echo $?").await;
    assert_eq!(result.stdout, "1\n0\n");
}

#[tokio::test]
async fn test_builtin_failure_reflected_in_status() {
    let h = harness();
    let result = h.run("cd /missing; echo $?").await;
    assert_eq!(result.stdout, "1\n");
}

#[tokio::test]
async fn test_pipeline_pipes_are_released() {
    let h = harness();
    h.run("echo a | grep a | wc -l").await;
    assert_eq!(h.shell.live_pipes(), 0);
}

#[tokio::test]
async fn test_local_binding_stays_in_function() {
    let h = harness();
    let result = h
        .run("x=outer; f(){ local x=inner; echo $x; }; f; echo $x")
        .await;
    assert_eq!(result.stdout, "inner\nouter\n");
}

#[tokio::test]
async fn test_word_splitting_multiplies_argv() {
    let h = harness();
    let result = h.run("v=\"a b c\"; printf '[%s]' $v; echo").await;
    assert_eq!(result.stdout, "[a][b][c]\n");

    let result = h.run("v=\"a b c\"; printf '[%s]' \"$v\"; echo").await;
    assert_eq!(result.stdout, "[a b c]\n");
}

// ----------------------------------------------------------------------
// Round trips
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_export_unset_round_trip() {
    let h = harness();
    h.run("export X=v").await;
    assert_eq!(h.ctx.get_env("X"), Some("v".to_string()));
    h.run("unset X").await;
    assert_eq!(h.ctx.get_env("X"), None);
    assert_eq!(h.ctx.get_param("X"), None);
}

#[tokio::test]
async fn test_pushd_popd_round_trip() {
    let h = harness();
    h.shell.add_dir("/a");
    h.shell.add_dir("/b");
    h.run("pushd /a; pushd /b; popd; popd").await;
    assert_eq!(h.ctx.cwd(), "/home/user");
    assert!(h.ctx.dir_stack().is_empty());
}

#[tokio::test]
async fn test_set_shift_round_trip() {
    let h = harness();
    h.run("set --").await;
    assert_eq!(h.ctx.positional_count(), 0);
    h.run("set -- a b c").await;
    assert_eq!(h.ctx.positional_count(), 3);
    h.run("shift 3").await;
    assert_eq!(h.ctx.positional_count(), 0);
    assert_eq!(h.ctx.get_param("1"), None);
}

#[tokio::test]
async fn test_declare_readonly_round_trip() {
    let h = harness();
    let result = h.run("declare -r C=1; declare C=2; echo \"$? $C\"").await;
    assert_eq!(result.stdout, "1 1\n");
}

// ----------------------------------------------------------------------
// Boundary behaviors
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_exit_code_clamping() {
    let h = harness();
    assert_eq!(h.run("exit 256").await.code, 0);
    assert_eq!(h.run("exit -1").await.code, 255);
    assert_eq!(h.run("exit 42").await.code, 42);
}

#[tokio::test]
async fn test_division_by_zero_yields_zero() {
    let h = harness();
    let result = h.run("echo $((5 / 0)) $((5 % 0))").await;
    assert_eq!(result.stdout, "0 0\n");
}

#[tokio::test]
async fn test_unset_variable_in_arithmetic_is_zero() {
    let h = harness();
    let result = h.run("echo $((nosuchvar + 3))").await;
    assert_eq!(result.stdout, "3\n");
}

// ----------------------------------------------------------------------
// Command execution & expansion
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_command_not_found_is_127() {
    let h = harness();
    let result = h.run("definitely-not-a-command").await;
    assert_eq!(result.code, 127);
    assert!(result.stderr.contains("command not found"));
}

#[tokio::test]
async fn test_command_substitution() {
    let h = harness();
    let result = h.run("x=$(echo inner); echo \"got $x\"").await;
    assert_eq!(result.stdout, "got inner\n");
}

#[tokio::test]
async fn test_command_substitution_strips_trailing_newlines() {
    let h = harness();
    let result = h.run("echo \"[$(printf 'a\\n\\n')]\"").await;
    assert_eq!(result.stdout, "[a]\n");
}

#[tokio::test]
async fn test_backtick_substitution() {
    let h = harness();
    let result = h.run("echo `echo legacy`").await;
    assert_eq!(result.stdout, "legacy\n");
}

#[tokio::test]
async fn test_prefix_assignment_scoped_to_command() {
    let h = harness();
    // The binding lives only for the one command it prefixes.
    let result = h.run("SCOPED=yes :; echo \"[$SCOPED]\"").await;
    assert_eq!(result.stdout, "[]\n");
}

#[tokio::test]
async fn test_assignment_without_command_persists() {
    let h = harness();
    let result = h.run("X=1; echo $X").await;
    assert_eq!(result.stdout, "1\n");
}

#[tokio::test]
async fn test_logical_operators() {
    let h = harness();
    let result = h.run("true && echo yes || echo no").await;
    assert_eq!(result.stdout, "yes\n");
    let result = h.run("false && echo yes || echo no").await;
    assert_eq!(result.stdout, "no\n");
    let result = h.run("false || false").await;
    assert_eq!(result.code, 1);
}

#[tokio::test]
async fn test_bang_negation() {
    let h = harness();
    assert_eq!(h.run("! false").await.code, 0);
    assert_eq!(h.run("! true").await.code, 1);
    assert_eq!(h.run("! echo x | grep -v x | wc -l").await.code, 1);
}

#[tokio::test]
async fn test_until_loop() {
    let h = harness();
    let result = h
        .run("i=0; until [ $i -ge 3 ]; do echo $i; i=$((i+1)); done")
        .await;
    assert_eq!(result.stdout, "0\n1\n2\n");
}

#[tokio::test]
async fn test_for_variable_leaks_after_loop() {
    let h = harness();
    let result = h.run("for v in a b; do :; done; echo $v").await;
    assert_eq!(result.stdout, "b\n");
}

#[tokio::test]
async fn test_continue_in_loop() {
    let h = harness();
    let result = h
        .run("for i in 1 2 3 4; do if [ $i -eq 2 ]; then continue; fi; echo $i; done")
        .await;
    assert_eq!(result.stdout, "1\n3\n4\n");
}

#[tokio::test]
async fn test_subshell_does_not_leak_writes() {
    let h = harness();
    let result = h.run("X=outer; (X=inner; echo $X); echo $X").await;
    assert_eq!(result.stdout, "inner\nouter\n");
}

#[tokio::test]
async fn test_subshell_cd_does_not_leak() {
    let h = harness();
    let result = h.run("(cd /tmp && pwd); pwd").await;
    assert_eq!(result.stdout, "/tmp\n/home/user\n");
}

#[tokio::test]
async fn test_exit_in_subshell_only_exits_subshell() {
    let h = harness();
    let result = h.run("(exit 7); echo $?").await;
    assert_eq!(result.stdout, "7\n");
    assert_eq!(result.code, 0);
}

// ----------------------------------------------------------------------
// Redirections & file bridging
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_stdout_redirect_to_file() {
    let h = harness();
    h.run("echo hello > out.txt").await;
    assert_eq!(h.shell.file_content("/home/user/out.txt"), Some("hello\n".to_string()));
}

#[tokio::test]
async fn test_append_redirect() {
    let h = harness();
    h.run("echo one > log.txt; echo two >> log.txt").await;
    assert_eq!(
        h.shell.file_content("/home/user/log.txt"),
        Some("one\ntwo\n".to_string())
    );
}

#[tokio::test]
async fn test_stdin_redirect_from_file() {
    let h = harness();
    h.shell.add_file("/home/user/data.txt", "alpha\nbeta\n");
    let result = h.run("wc -l < data.txt").await;
    assert_eq!(result.stdout, "2\n");
}

#[tokio::test]
async fn test_stderr_redirect_and_dup() {
    let h = harness();
    h.run("cd /missing 2> err.txt").await;
    let err = h.shell.file_content("/home/user/err.txt").unwrap();
    assert!(err.contains("No such file or directory"));

    let result = h.run("cd /missing 2>&1 | grep -c missing").await;
    assert_eq!(result.stdout.trim(), "1");
}

#[tokio::test]
async fn test_pipeline_last_stage_to_file() {
    let h = harness();
    h.shell.add_file("/home/user/in.txt", "x\ny\nx\n");
    h.run("cat in.txt | grep x > found.txt").await;
    assert_eq!(
        h.shell.file_content("/home/user/found.txt"),
        Some("x\nx\n".to_string())
    );
}

#[tokio::test]
async fn test_while_read_from_pipe() {
    let h = harness();
    h.shell.add_file("/home/user/lines.txt", "one\ntwo\nthree\n");
    let result = h
        .run("cat lines.txt | while read line; do echo \"got $line\"; done")
        .await;
    assert_eq!(result.stdout, "got one\ngot two\ngot three\n");
}

// ----------------------------------------------------------------------
// Builtins through the script surface
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_alias_expansion_at_dispatch() {
    let h = harness();
    let result = h.run("alias greet='echo hello'; greet world").await;
    assert_eq!(result.stdout, "hello world\n");
}

#[tokio::test]
async fn test_eval_builtin() {
    let h = harness();
    let result = h.run("cmd='echo built'; eval $cmd up").await;
    assert_eq!(result.stdout, "built up\n");
}

#[tokio::test]
async fn test_source_builtin() {
    let h = harness();
    h.shell
        .add_file("/home/user/lib.sh", "helper(){ echo helped; }\nLOADED=1\n");
    let result = h.run(". lib.sh; helper; echo $LOADED").await;
    assert_eq!(result.stdout, "helped\n1\n");
}

#[tokio::test]
async fn test_printf_builtin() {
    let h = harness();
    let result = h.run("printf '%s=%03d\\n' width 7").await;
    assert_eq!(result.stdout, "width=007\n");
}

#[tokio::test]
async fn test_read_with_ifs_fields() {
    let h = harness();
    h.shell.add_file("/home/user/row.txt", "alpha beta gamma\n");
    let result = h.run("read a b < row.txt; echo \"$a|$b\"").await;
    assert_eq!(result.stdout, "alpha|beta gamma\n");
}

#[tokio::test]
async fn test_let_builtin() {
    let h = harness();
    let result = h.run("let x=2**10; echo $x; let 0; echo $?").await;
    assert_eq!(result.stdout, "1024\n1\n");
}

#[tokio::test]
async fn test_type_builtin() {
    let h = harness();
    let result = h.run("type -t cd; type -t echo").await;
    assert_eq!(result.stdout, "builtin\nbuiltin\n");
}

#[tokio::test]
async fn test_tilde_expansion() {
    let h = harness();
    let result = h.run("echo ~/docs").await;
    assert_eq!(result.stdout, "/home/user/docs\n");
}

#[tokio::test]
async fn test_tilde_unknown_user_kept() {
    let h = harness();
    let result = h.run("echo ~nobody/x").await;
    assert_eq!(result.stdout, "~nobody/x\n");
}

#[tokio::test]
async fn test_arithmetic_command_status() {
    let h = harness();
    assert_eq!(h.run("(( 3 > 1 ))").await.code, 0);
    assert_eq!(h.run("(( 0 ))").await.code, 1);
}

#[tokio::test]
async fn test_arg_builtin_end_to_end() {
    let h = harness();
    h.ctx
        .replace_positional(&["input.txt".to_string(), "--verbose".to_string()])
        .unwrap();
    let result = h
        .run("arg --desc 'demo'; arg '<file>' string 'the input'; arg -v --verbose 'noisy'; arg --export; echo \"$FILE $VERBOSE\"")
        .await;
    assert_eq!(result.stdout, "input.txt true\n");
}

#[tokio::test]
async fn test_arg_builtin_error_exits_script() {
    let h = harness();
    h.ctx.replace_positional(&[]).unwrap();
    let result = h
        .run("arg '<file>' string 'the input'; arg --export; echo not-reached")
        .await;
    assert_eq!(result.code, 1);
    assert!(result.stderr.contains("Missing required argument"));
    assert!(result.stderr.contains("--help"));
    assert!(!result.stdout.contains("not-reached"));
}

#[tokio::test]
async fn test_functions_see_positional_params() {
    let h = harness();
    let result = h.run("f(){ echo \"$# $1 $2\"; }; f a b").await;
    assert_eq!(result.stdout, "2 a b\n");
}

#[tokio::test]
async fn test_nested_function_calls_restore_params() {
    let h = harness();
    let result = h
        .run("inner(){ echo \"i:$1\"; }; outer(){ inner nested; echo \"o:$1\"; }; outer top")
        .await;
    assert_eq!(result.stdout, "i:nested\no:top\n");
}

#[tokio::test]
async fn test_syntax_error_surfaces() {
    let h = harness();
    let err = h
        .exec
        .execute_and_capture("if then", &h.ctx)
        .await
        .unwrap_err();
    match err {
        bash_exec::ExecError::Parse(e) => {
            assert!(e.line >= 1);
            assert!(!e.snippet().is_empty());
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_script() {
    let h = harness();
    let result = h.run("   \n\n").await;
    assert_eq!(result.code, 0);
    assert_eq!(result.stdout, "");
}
