//! # Virtual Keyboard Daemon
//!
//! Replays a scenario against a fresh page and prints the final snapshot.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use vkbd::{Runtime, RuntimeConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let config = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(&args[0]);
        process::exit(1);
    });

    let mut runtime = Runtime::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to create runtime: {}", e);
        process::exit(1);
    });

    if let Err(e) = runtime.run() {
        eprintln!("Runtime error: {}", e);
        process::exit(1);
    }

    match serde_json::to_string_pretty(&runtime.snapshot()) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to encode snapshot: {}", e);
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<RuntimeConfig, String> {
    let mut config = RuntimeConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--script" | "-s" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --script".to_string());
                }
                let script_text = fs::read_to_string(&args[i])
                    .map_err(|e| format!("Failed to read script file: {}", e))?;
                config.script = Some(script_text);
            }
            "--settings" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --settings".to_string());
                }
                config.settings_path = Some(PathBuf::from(&args[i]));
            }
            "--max-steps" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --max-steps".to_string());
                }
                config.max_steps = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid max-steps value: {}", args[i]))?;
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --script <FILE>      Scenario script to replay");
    eprintln!("  --settings <FILE>        Settings overrides file (read, then written back)");
    eprintln!("  --max-steps <N>          Maximum steps to run (0 = unlimited)");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --script demos/email_form.vks", program);
    eprintln!("  RUST_LOG=focus=debug {} -s demos/nested_frame.vks", program);
}
