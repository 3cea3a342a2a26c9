//! luavar CLI
//!
//! Runs a Lua file or an inline chunk in a fresh interpreter, prints the
//! chunk's results, then prints the value behind each requested path.

use luavar::{Error, Root, Value, Var};

/// Nesting shown when printing tables.
const RENDER_DEPTH: usize = 3;

fn main() {
    luavar::init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    match command.as_str() {
        "run" | "eval" => {
            let invocation = match Invocation::parse(&args[2..]) {
                Ok(invocation) => invocation,
                Err(message) => {
                    eprintln!("error: {message}");
                    eprintln!("Usage: luavar {command} <{}> [--print <path>]...", target_name(command));
                    std::process::exit(1);
                }
            };
            let source = if command == "run" {
                Source::File(&invocation.target)
            } else {
                Source::Chunk(&invocation.target)
            };
            match execute(source, &invocation.prints) {
                Ok(lines) => {
                    for line in lines {
                        println!("{line}");
                    }
                }
                Err(err) => {
                    report(&err);
                    std::process::exit(1);
                }
            }
        }
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("luavar - run Lua code and inspect its globals");
    println!();
    println!("Usage: luavar <command> [options]");
    println!();
    println!("Commands:");
    println!("  run <file.lua>     Run a file and print its results");
    println!("  eval <chunk>       Run inline source and print its results");
    println!("  help               Show this message");
    println!();
    println!("Options:");
    println!("  --print <path>     Print a global after running (repeatable)");
    println!("                     Paths are dot-separated; integer segments are");
    println!("                     numeric keys, e.g. config.servers.1.host");
    println!();
    println!("Set RUST_LOG=luavar=debug for tracing output.");
}

fn target_name(command: &str) -> &'static str {
    if command == "run" {
        "file.lua"
    } else {
        "chunk"
    }
}

/// Parsed arguments of `run` / `eval`.
#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    target: String,
    prints: Vec<String>,
}

impl Invocation {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut target = None;
        let mut prints = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if arg == "--print" || arg == "-p" {
                let Some(path) = args.get(i + 1) else {
                    return Err(format!("`{arg}` needs a path"));
                };
                prints.push(path.clone());
                i += 2;
                continue;
            }
            if let Some(path) = arg.strip_prefix("--print=") {
                prints.push(path.to_owned());
            } else if arg.starts_with("--") {
                return Err(format!("unknown option `{arg}`"));
            } else if target.is_none() {
                target = Some(arg.clone());
            } else {
                return Err(format!("unexpected argument `{arg}`"));
            }
            i += 1;
        }
        let target = target.ok_or_else(|| String::from("missing source"))?;
        Ok(Invocation { target, prints })
    }
}

enum Source<'a> {
    File(&'a str),
    Chunk(&'a str),
}

/// Run `source` and return the lines to print.
fn execute(source: Source<'_>, prints: &[String]) -> luavar::Result<Vec<String>> {
    let root = Root::new()?;
    let results = match source {
        Source::File(path) => {
            tracing::debug!(path, "running file");
            root.do_file(path)?
        }
        Source::Chunk(chunk) => {
            tracing::debug!(len = chunk.len(), "running chunk");
            root.do_chunk(chunk)?
        }
    };
    let mut lines: Vec<String> = results.iter().map(|value| render(value, 0)).collect();
    for path in prints {
        let var = resolve(&root, path).ok_or_else(|| {
            Error::External(format!("invalid path `{path}`: empty segment"))
        })?;
        lines.push(format!("{path} = {}", render(&var.value()?, 0)));
    }
    Ok(lines)
}

/// Turn `a.b.1` into `root["a"]["b"][1]`. `None` for empty segments.
fn resolve(root: &Root, path: &str) -> Option<Var> {
    let mut keys = parse_path(path)?.into_iter();
    let first = keys.next()?;
    Some(keys.fold(root.at(first), |var, key| var.at(key)))
}

fn parse_path(path: &str) -> Option<Vec<Value>> {
    path.split('.')
        .map(|segment| {
            if segment.is_empty() {
                None
            } else if let Ok(index) = segment.parse::<i64>() {
                Some(Value::from(index))
            } else {
                Some(Value::from(segment))
            }
        })
        .collect()
}

/// Script-like rendering: strings quoted, tables expanded a few levels.
fn render(value: &Value, depth: usize) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        Value::Table(table) if depth < RENDER_DEPTH => {
            let mut entries: Vec<String> = table
                .entries()
                .iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::String(s) => s.clone(),
                        other => format!("[{}]", render(other, depth + 1)),
                    };
                    format!("{key} = {}", render(value, depth + 1))
                })
                .collect();
            entries.sort();
            if entries.is_empty() {
                String::from("{}")
            } else {
                format!("{{ {} }}", entries.join(", "))
            }
        }
        other => other.to_string(),
    }
}

fn report(err: &Error) {
    eprintln!("error: {err}");
    if let Error::Lua(lua) = err {
        if !lua.traceback.is_empty() {
            eprintln!("{}", lua.traceback);
        }
    }
}

#[cfg(test)]
mod tests;
