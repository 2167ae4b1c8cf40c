use luma::{ErrorKind, LumaError, Runtime, Value};
use std::env;
use std::fs;
use std::process::ExitCode;

const VERSION: &str = "luma 0.3";

const EXIT_OK: u8 = 0;
const EXIT_RUNTIME: u8 = 1;
const EXIT_SYNTAX: u8 = 2;

fn print_usage() {
    eprintln!("usage: luma [options] [script [args]]");
    eprintln!("Available options are:");
    eprintln!("  -e stat        execute string 'stat'");
    eprintln!("  -i             enter interactive mode after executing 'script'");
    eprintln!("  -v             show version information");
    eprintln!("  --enable-logs  emit runtime logs (honours RUST_LOG)");
    eprintln!("  --             stop handling options");
}

#[derive(Default)]
struct Options {
    execute_strings: Vec<String>,
    interactive: bool,
    script_file: Option<String>,
    script_args: Vec<String>,
    show_version: bool,
    enable_logs: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut opts = Options::default();
    let mut i = 1;
    let mut stop_options = false;

    while i < args.len() {
        let arg = &args[i];
        if !stop_options && arg.starts_with('-') && arg.len() > 1 {
            match arg.as_str() {
                "-e" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("'-e' needs argument".to_string());
                    }
                    opts.execute_strings.push(args[i].clone());
                }
                "-i" => opts.interactive = true,
                "-v" => opts.show_version = true,
                "--enable-logs" => opts.enable_logs = true,
                "--" => stop_options = true,
                other => return Err(format!("unrecognized option '{}'", other)),
            }
        } else if opts.script_file.is_none() {
            opts.script_file = Some(arg.clone());
            stop_options = true;
        } else {
            opts.script_args.push(arg.clone());
        }
        i += 1;
    }
    Ok(opts)
}

fn report(err: &LumaError) -> u8 {
    eprintln!("luma: {}", err.message);
    for line in &err.trace {
        eprintln!("\t{}", line);
    }
    if err.kind == ErrorKind::SyntaxError {
        EXIT_SYNTAX
    } else {
        EXIT_RUNTIME
    }
}

fn main() -> ExitCode {
    let opts = match parse_args() {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("luma: {}", msg);
            print_usage();
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    if opts.enable_logs {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    if opts.show_version {
        println!("{}", VERSION);
        if opts.execute_strings.is_empty() && opts.script_file.is_none() && !opts.interactive {
            return ExitCode::from(EXIT_OK);
        }
    }

    let rt = Runtime::new();
    luma::stdlib::open_all(&rt);

    // SCRIPT_PATH from the environment becomes a global of the same name.
    if let Ok(path) = env::var("SCRIPT_PATH") {
        let v = rt.str_value(&path);
        rt.define_global("SCRIPT_PATH", v);
    }

    for code in &opts.execute_strings {
        if let Err(e) = rt.evaluate(code, Some("=(command line)")) {
            return ExitCode::from(report(&e));
        }
    }

    if let Some(script) = &opts.script_file {
        // arg[0] is the script itself, positives are its arguments.
        let arg_table = rt.new_table();
        let script_v = rt.str_value(script);
        let _ = rt.raw_set(arg_table, Value::Int(0), script_v);
        for (i, a) in opts.script_args.iter().enumerate() {
            let v = rt.str_value(a);
            let _ = rt.raw_set(arg_table, Value::Int(i as i64 + 1), v);
        }
        rt.define_global("arg", Value::Table(arg_table));

        let source = match fs::read_to_string(script) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("luma: cannot open {}: {}", script, e);
                return ExitCode::from(EXIT_RUNTIME);
            }
        };
        if let Err(e) = rt.evaluate(&source, Some(script)) {
            return ExitCode::from(report(&e));
        }
    }

    if opts.interactive || (opts.execute_strings.is_empty() && opts.script_file.is_none()) {
        return repl(&rt);
    }

    ExitCode::from(EXIT_OK)
}

fn repl(rt: &Runtime) -> ExitCode {
    println!("{}", VERSION);
    let mut editor = match rustyline::DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("luma: cannot start line editor: {}", e);
            return ExitCode::from(EXIT_RUNTIME);
        }
    };
    loop {
        let line = match editor.readline("> ") {
            Ok(l) => l,
            Err(rustyline::error::ReadlineError::Interrupted) => continue,
            Err(rustyline::error::ReadlineError::Eof) => return ExitCode::from(EXIT_OK),
            Err(e) => {
                eprintln!("luma: {}", e);
                return ExitCode::from(EXIT_RUNTIME);
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(&line);

        // Expression first (implicit return), statement fallback.
        let as_expr = format!("return {}", line);
        let result = match rt.evaluate(&as_expr, Some("=stdin")) {
            Ok(values) => Ok(values),
            Err(e) if e.kind == ErrorKind::SyntaxError => rt.evaluate(&line, Some("=stdin")),
            Err(e) => Err(e),
        };
        match result {
            Ok(values) => {
                if !values.is_empty() {
                    let rendered: Vec<String> =
                        values.iter().map(|&v| rt.display_value(v)).collect();
                    println!("{}", rendered.join("\t"));
                }
            }
            Err(e) => {
                eprintln!("luma: {}", e.message);
            }
        }
    }
}
