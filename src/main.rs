//! Tern CLI: run a file, evaluate a string, edit settings or start the REPL.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use colored::Colorize;
use tracing::debug;

use tern::config::{OutputFormat, APP_NAME, PROFILE_ENV};
use tern::{
    disassemble, logging, Compiler, Error, ProfileStore, Runtime, Settings, Strictness, SymbolTable,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const HISTORY_FILE: &str = ".tern_history";

/// CLI command to execute.
enum Command {
    /// Run a script file; the remaining arguments go to `os.args`
    Run { file: String, args: Vec<String> },
    /// Evaluate a string
    Eval { code: String },
    /// Start the REPL
    Repl,
    /// Inspect or edit the active profile
    Config { action: ConfigAction },
}

enum ConfigAction {
    List,
    Get { key: String },
    Set { key: String, value: String },
    Delete { key: String },
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    types: Option<Strictness>,
    disassemble: bool,
    trace: bool,
    log: Option<String>,
    log_file: Option<PathBuf>,
    format: Option<OutputFormat>,
    profile: Option<String>,
}

fn print_usage() {
    eprintln!("Tern {} - embeddable scripting runtime", VERSION);
    eprintln!();
    eprintln!("Usage: tern [options] [script.tern] [args...]");
    eprintln!("       tern [options] -e <code>");
    eprintln!("       tern config <list|get KEY|set KEY VALUE|delete KEY>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --types MODE      Operand typing: strict, relaxed or dynamic");
    eprintln!("  --disassemble     Print the compiled bytecode before running");
    eprintln!("  --trace           Log every executed instruction (class 'trace')");
    eprintln!("  --log LIST        Enable log classes, e.g. compiler,symbols");
    eprintln!("  --log-file PATH   Append log output to a file");
    eprintln!("  --format FORMAT   Diagnostics as text or json");
    eprintln!("  --profile NAME    Use a named settings profile");
    eprintln!("  --help, -h        Show this help message");
    eprintln!();
    eprintln!("Log classes: {}", logging::CLASSES.join(", "));
}

fn usage_error(message: &str) -> ! {
    eprintln!("{} {}", "error:".red().bold(), message);
    print_usage();
    process::exit(64);
}

/// Take the value following a flag.
fn flag_value(args: &[String], i: &mut usize, flag: &str) -> String {
    *i += 1;
    match args.get(*i) {
        Some(value) => value.clone(),
        None => usage_error(&format!("{} requires a value", flag)),
    }
}

fn parse_config(args: &[String]) -> ConfigAction {
    let arg = |n: usize, what: &str| match args.get(n) {
        Some(value) => value.clone(),
        None => usage_error(&format!("config {} requires {}", args[0], what)),
    };
    match args.first().map(String::as_str) {
        None | Some("list") => ConfigAction::List,
        Some("get") => ConfigAction::Get { key: arg(1, "a key") },
        Some("set") => ConfigAction::Set {
            key: arg(1, "a key"),
            value: arg(2, "a value"),
        },
        Some("delete") => ConfigAction::Delete { key: arg(1, "a key") },
        Some(other) => usage_error(&format!("unknown config action: {}", other)),
    }
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Repl,
        types: None,
        disassemble: false,
        trace: false,
        log: None,
        log_file: None,
        format: None,
        profile: None,
    };

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--version" | "-V" => {
                println!("tern {}", VERSION);
                process::exit(0);
            }
            "--types" => {
                let value = flag_value(&args, &mut i, arg);
                match value.parse() {
                    Ok(types) => options.types = Some(types),
                    Err(_) => usage_error(&format!("unknown typing mode: {}", value)),
                }
            }
            "--disassemble" => options.disassemble = true,
            "--trace" => options.trace = true,
            "--log" => options.log = Some(flag_value(&args, &mut i, arg)),
            "--log-file" => options.log_file = Some(flag_value(&args, &mut i, arg).into()),
            "--format" => {
                let value = flag_value(&args, &mut i, arg);
                match value.parse() {
                    Ok(format) => options.format = Some(format),
                    Err(_) => usage_error(&format!("unknown output format: {}", value)),
                }
            }
            "--profile" => options.profile = Some(flag_value(&args, &mut i, arg)),
            "-e" => {
                let code = flag_value(&args, &mut i, arg);
                options.command = Command::Eval { code };
            }
            "config" => {
                options.command = Command::Config {
                    action: parse_config(&args[i + 1..]),
                };
                return options;
            }
            _ if arg.starts_with('-') => usage_error(&format!("unknown option: {}", arg)),
            _ => {
                options.command = Command::Run {
                    file: arg.to_string(),
                    args: args[i + 1..].to_vec(),
                };
                return options;
            }
        }
        i += 1;
    }
    options
}

fn main() {
    let options = parse_args();

    let log = match (&options.log, options.trace) {
        (Some(list), true) => Some(format!("{},trace", list)),
        (Some(list), false) => Some(list.clone()),
        (None, true) => Some("trace".to_string()),
        (None, false) => None,
    };
    if let Err(err) = logging::init(log.as_deref(), options.log_file.as_deref()) {
        eprintln!("{} {}", "error:".red().bold(), err);
        process::exit(70);
    }

    let mut store = match ProfileStore::load(APP_NAME) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{} {}", "warning:".yellow().bold(), err);
            ProfileStore::in_memory()
        }
    };
    if let Some(profile) = options.profile.clone().or_else(|| env::var(PROFILE_ENV).ok()) {
        store.use_profile(&profile);
    }

    if let Command::Config { action } = &options.command {
        process::exit(run_config(&mut store, action));
    }

    let mut settings = Settings::from_profile(&store).with_env();
    if let Some(types) = options.types {
        settings.strictness = types;
    }
    if let Some(format) = options.format {
        settings.output_format = format;
    }
    settings.trace |= options.trace;

    let (program_args, code) = match &options.command {
        Command::Run { args, .. } => (args.clone(), None),
        Command::Eval { code } => (Vec::new(), Some(code.clone())),
        _ => (Vec::new(), None),
    };
    let format = settings.output_format;
    let runtime = Runtime::new(settings, store, program_args);

    let status = match (&options.command, code) {
        (Command::Run { file, .. }, _) => run_file(&runtime, Path::new(file), &options),
        (Command::Eval { .. }, Some(code)) => run_source(&runtime, "eval", &code, None, &options),
        _ => {
            run_repl(&runtime);
            Ok(())
        }
    };
    if let Err(err) = runtime.profile().save() {
        eprintln!("{} {}", "warning:".yellow().bold(), err);
    }
    match status {
        Ok(()) => process::exit(runtime.exit_code()),
        Err(err) => {
            report(&err, format);
            process::exit(exit_status(&err));
        }
    }
}

fn run_config(store: &mut ProfileStore, action: &ConfigAction) -> i32 {
    match action {
        ConfigAction::List => {
            println!("{} {}", "profile".bold(), store.active());
            for key in store.keys() {
                println!("  {} = {}", key, store.get(&key).unwrap_or_default());
            }
        }
        ConfigAction::Get { key } => match store.get(key) {
            Some(value) => println!("{}", value),
            None => {
                eprintln!("{} no such key: {}", "error:".red().bold(), key);
                return 1;
            }
        },
        ConfigAction::Set { key, value } => store.set(key, value),
        ConfigAction::Delete { key } => {
            if !store.delete(key) {
                eprintln!("{} no such key: {}", "error:".red().bold(), key);
                return 1;
            }
        }
    }
    match store.save() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            70
        }
    }
}

fn run_file(runtime: &Arc<Runtime>, path: &Path, options: &Options) -> tern::Result<()> {
    let source = std::fs::read_to_string(path)
        .map_err(|err| Error::from(err).context(path.display()))?;
    let module = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string());
    run_source(runtime, &module, &source, path.parent(), options)
}

fn run_source(
    runtime: &Arc<Runtime>,
    module: &str,
    source: &str,
    base_dir: Option<&Path>,
    options: &Options,
) -> tern::Result<()> {
    let program = runtime.compile(module, source, base_dir)?;
    debug!(target: "tern::app", module, instructions = program.code.len(), "compiled");
    if options.disassemble {
        print!("{}", disassemble(&program.code));
        println!("---");
    }
    runtime.run_program(program)
}

fn report(err: &Error, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("{}", err.to_string().red()),
        OutputFormat::Json => {
            let diagnostic = serde_json::json!({
                "class": err.kind.class(),
                "module": err.module,
                "line": err.line,
                "column": err.column,
                "message": err.message(),
            });
            eprintln!("{}", diagnostic);
        }
    }
}

fn exit_status(err: &Error) -> i32 {
    match err.kind.class() {
        "compile error" | "tokenizer error" => 65,
        _ => 70,
    }
}

/// Net count of unclosed braces, brackets and parentheses outside strings.
fn open_brackets(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' && q == '"' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '`' => quote = Some(c),
                '{' | '(' | '[' => depth += 1,
                '}' | ')' | ']' => depth -= 1,
                _ => {}
            },
        }
    }
    depth
}

fn history_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(HISTORY_FILE))
        .unwrap_or_else(|| PathBuf::from(HISTORY_FILE))
}

fn run_repl(runtime: &Arc<Runtime>) {
    println!("Tern {} - REPL", VERSION);
    println!("Type .help for available commands.\n");

    let mut compiler = Compiler::new("repl", &runtime.settings);
    compiler.set_repl(true);
    let symbols = SymbolTable::new_child(&runtime.root(), "main");
    let mut history = Vec::new();
    let mut buffer = String::new();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let prompt = if buffer.is_empty() { "tern> " } else { "  ... " };
        print!("{}", prompt.cyan());
        let _ = io::stdout().flush();

        let Some(Ok(line)) = lines.next() else {
            println!();
            break;
        };
        let trimmed = line.trim();
        if buffer.is_empty() {
            match trimmed {
                "" => continue,
                "exit" | ".exit" | "quit" | ".quit" => break,
                ".help" => {
                    println!("  .help     show this message");
                    println!("  .vars     list variables defined in this session");
                    println!("  .exit     leave the REPL");
                    continue;
                }
                ".vars" => {
                    println!("{}", symbols.names().join(" "));
                    continue;
                }
                _ => {}
            }
        }
        history.push(line.clone());
        buffer.push_str(&line);
        buffer.push('\n');
        if open_brackets(&buffer) > 0 {
            continue;
        }

        let source = std::mem::take(&mut buffer);
        let result = compiler
            .compile(&source)
            .and_then(|code| runtime.execute_in(code, &symbols));
        if let Err(err) = result {
            eprintln!("{}", err.to_string().red());
        }
    }
    runtime.wait();
    let _ = std::fs::write(history_path(), history.join("\n"));
    println!("Goodbye!");
}
