//! Compile .proto files and report diagnostics, or summarize the linked types.
//!
//! Usage:
//!   proto_check [OPTIONS] FILE.proto [FILE.proto ...]
//!
//! Files are import-style paths, resolved against the source roots.
//!
//! Options:
//!   -I DIR, --proto_path DIR   Add a source root (repeatable; default: current directory)
//!   --allow-unknown-options    Skip unresolvable option names with a warning
//!   --human, -H                Group diagnostics by file
//!
//! Set RUST_LOG (e.g. RUST_LOG=protolink=debug) for loader and linker logs.

use protolink::schema::Type;
use protolink::{compile, CompileConfig, Diagnostic, LinkError, Schema};
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn print_diagnostics(err: &LinkError, style: OutputStyle) {
    match style {
        OutputStyle::Compact => {
            for d in &err.diagnostics {
                println!("{}", d);
            }
        }
        OutputStyle::Human => {
            let mut by_file: BTreeMap<&str, Vec<&Diagnostic>> = BTreeMap::new();
            for d in &err.diagnostics {
                by_file.entry(d.location.path.as_str()).or_default().push(d);
            }
            for (path, diagnostics) in by_file {
                println!("{}", path);
                for d in diagnostics {
                    println!("  {}:{}: {}", d.location.line, d.location.column, d.message);
                    println!("    kind: {}", d.kind.as_str());
                }
            }
        }
    }
}

fn print_summary(schema: &Schema, roots: &[String]) {
    for path in roots {
        let Some(file) = schema.file(path) else { continue };
        println!("{} ({:?}, package {})", file.path, file.syntax, file.package.as_deref().unwrap_or("<none>"));
        for name in &file.types {
            match schema.get(name) {
                Some(Type::Message(m)) if !m.map_entry => {
                    println!("  message {} ({} fields, {} extensions)", m.name, m.fields.len(), m.extensions.len())
                }
                Some(Type::Enum(e)) => println!("  enum {} ({} constants)", e.name, e.constants.len()),
                Some(Type::Service(s)) => println!("  service {} ({} rpcs)", s.name, s.rpcs.len()),
                _ => {}
            }
        }
    }
}

fn take_flag(args: &mut Vec<String>, names: &[&str]) -> bool {
    if let Some(pos) = args.iter().position(|a| names.contains(&a.as_str())) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let style = if take_flag(&mut args, &["--human", "-H"]) {
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };
    let mut config = CompileConfig {
        allow_unknown_options: take_flag(&mut args, &["--allow-unknown-options"]),
        ..CompileConfig::default()
    };

    let mut files = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "-I" || arg == "--proto_path" {
            let dir = iter
                .next()
                .ok_or_else(|| anyhow::anyhow!("{} needs a directory argument", arg))?;
            config.source_roots.push(dir.into());
        } else if let Some(dir) = arg.strip_prefix("-I") {
            config.source_roots.push(dir.into());
        } else {
            files.push(arg);
        }
    }
    if files.is_empty() {
        anyhow::bail!("usage: proto_check [-I DIR]... [--human] FILE.proto...");
    }
    if config.source_roots.is_empty() {
        config.source_roots.push(".".into());
    }

    let roots: Vec<&str> = files.iter().map(String::as_str).collect();
    match compile(&config, &roots) {
        Ok(schema) => {
            print_summary(&schema, &files);
            Ok(())
        }
        Err(err) => {
            print_diagnostics(&err, style);
            eprintln!("proto_check: {} error(s)", err.diagnostics.len());
            std::process::exit(1);
        }
    }
}
