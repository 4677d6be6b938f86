//! rmarshal CLI — decode, encode, and inspect Ruby Marshal 4.8 data, and
//! evaluate Gemfile DSL documents from the terminal.
//!
//! Usage:
//! ```bash
//! # Decode a hex-encoded Marshal document
//! rmarshal decode --data 0x0408693a
//!
//! # Decode and render as JSON
//! rmarshal decode --file dump.bin --json
//!
//! # Re-encode a decode --json tree back to Marshal bytes
//! rmarshal encode --file tree.json --out dump.bin
//!
//! # Evaluate a Gemfile
//! rmarshal gemfile Gemfile --without test,development --json
//! ```

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use rmarshal_core::{decode, encode, from_json, to_json, DecodeOptions, EncodeOptions};
use rmarshal_gemfile::{gemfile_parse, Environment, GemfileOptions};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let result = run(&args);
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "decode" => cmd_decode(&args[2..]),
        "encode" => cmd_encode(&args[2..]),
        "gemfile" => cmd_gemfile(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("rmarshal {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

fn print_usage() {
    println!("rmarshal {}", env!("CARGO_PKG_VERSION"));
    println!("Decode/encode Ruby Marshal 4.8 data, evaluate Gemfiles\n");
    println!("USAGE:");
    println!("    rmarshal <COMMAND>\n");
    println!("COMMANDS:");
    println!("    decode    Decode a Marshal 4.8 document");
    println!("    encode    Encode a decode --json tree back to Marshal 4.8 bytes");
    println!("    gemfile   Evaluate a Gemfile and list active gems");
    println!("    version   Print version");
    println!("    help      Print this help\n");
    println!("DECODE FLAGS:");
    println!("    --data <HEX>   0x-prefixed hex document");
    println!("    --file <PATH>  Read the document from a file");
    println!("    (reads stdin if neither is given)");
    println!("    --quiet        Suppress decode tracing");
    println!("    --json         Render as a JSON tree instead of Ruby-inspect text\n");
    println!("ENCODE FLAGS:");
    println!("    --data <JSON>  A decode --json tree, inline");
    println!("    --file <PATH>  Read the JSON tree from a file");
    println!("    (reads stdin if neither is given)");
    println!("    --out <PATH>   Write raw bytes here instead of hex to stdout\n");
    println!("GEMFILE FLAGS:");
    println!("    --ruby-version <VER>   Pin RUBY_VERSION / auto-populate platforms");
    println!("    --group <NAME>         Enable a group (repeatable)");
    println!("    --without <NAME>       Disable a group (repeatable)");
    println!("    --json                 Render the evaluated document as JSON");
}

fn read_bytes_input(data: Option<&str>, file: Option<&str>) -> Result<Vec<u8>> {
    match (data, file) {
        (Some(_), Some(_)) => bail!("--data and --file are mutually exclusive"),
        (Some(hex_str), None) => {
            let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
            hex::decode(trimmed).context("--data is not valid hex")
        }
        (None, Some(path)) => fs::read(path).with_context(|| format!("reading {path}")),
        (None, None) => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn cmd_decode(args: &[String]) -> Result<()> {
    let mut data: Option<String> = None;
    let mut file: Option<String> = None;
    let mut as_json = false;
    let mut quiet = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--data" => {
                i += 1;
                data = args.get(i).cloned();
            }
            "--file" => {
                i += 1;
                file = args.get(i).cloned();
            }
            "--json" => as_json = true,
            "--quiet" => quiet = true,
            flag => bail!("unknown flag: {flag}"),
        }
        i += 1;
    }

    let bytes = read_bytes_input(data.as_deref(), file.as_deref())?;
    let options = DecodeOptions { quiet, ..DecodeOptions::default() };
    let doc = decode(&bytes[..], &options).context("decode failed")?;

    if as_json {
        let rendered = to_json(&doc.arena, doc.root);
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        println!("{doc}");
    }
    Ok(())
}

fn cmd_encode(args: &[String]) -> Result<()> {
    let mut data: Option<String> = None;
    let mut file: Option<String> = None;
    let mut out: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--data" => {
                i += 1;
                data = args.get(i).cloned();
            }
            "--file" => {
                i += 1;
                file = args.get(i).cloned();
            }
            "--out" => {
                i += 1;
                out = args.get(i).map(PathBuf::from);
            }
            flag => bail!("unknown flag: {flag}"),
        }
        i += 1;
    }

    let src = match (data, file) {
        (Some(_), Some(_)) => bail!("--data and --file are mutually exclusive"),
        (Some(inline), None) => inline,
        (None, Some(path)) => fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        (None, None) => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };

    let tree: serde_json::Value = serde_json::from_str(&src).context("input is not valid JSON")?;
    let mut arena = rmarshal_core::Arena::new();
    let root = from_json(&mut arena, &tree).context("input is not a decode --json tree")?;

    let mut bytes = Vec::new();
    encode(&mut bytes, &arena, root, &EncodeOptions::default()).context("encode failed")?;

    match out {
        Some(path) => {
            fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        }
        None => println!("0x{}", hex::encode(&bytes)),
    }
    Ok(())
}

fn cmd_gemfile(args: &[String]) -> Result<()> {
    let mut path: Option<PathBuf> = None;
    let mut ruby_version: Option<String> = None;
    let mut groups: Vec<String> = Vec::new();
    let mut without: Vec<String> = Vec::new();
    let mut as_json = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--ruby-version" => {
                i += 1;
                ruby_version = args.get(i).cloned();
            }
            "--group" => {
                i += 1;
                if let Some(names) = args.get(i) {
                    groups.extend(names.split(',').map(str::to_string));
                }
            }
            "--without" => {
                i += 1;
                if let Some(names) = args.get(i) {
                    without.extend(names.split(',').map(str::to_string));
                }
            }
            "--json" => as_json = true,
            flag if !flag.starts_with("--") && path.is_none() => path = Some(PathBuf::from(flag)),
            flag => bail!("unknown flag: {flag}"),
        }
        i += 1;
    }

    let path = path.context("a Gemfile path is required")?;

    let mut env = match &ruby_version {
        Some(v) => Environment::new(v.clone()),
        None => Environment::default(),
    };
    for g in &groups {
        env = env.with_group(g.clone());
    }
    for g in &without {
        env = env.without_group(g.clone());
    }

    let doc = gemfile_parse(&path, &env, &GemfileOptions::default()).context("gemfile evaluation failed")?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("ruby_version: {}", doc.ruby_version.as_deref().unwrap_or("(unset)"));
        for source in &doc.source {
            println!("source: {source}");
        }
        for gem in doc.active_gems() {
            let reqs = if gem.requirements.is_empty() { String::new() } else { format!(" ({})", gem.requirements.join(", ")) };
            println!("gem {}{}", gem.name, reqs);
        }
        let ignored: Vec<_> = doc.gems.iter().filter(|g| g.ignored).map(|g| g.name.as_str()).collect();
        if !ignored.is_empty() {
            println!("ignored: {}", ignored.join(", "));
        }
    }
    Ok(())
}
