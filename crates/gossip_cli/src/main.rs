use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use gossip_cli::{run, CommandKind, CommonOptions};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--store-dir" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --store-dir".to_string())?;
                options.store_dir = PathBuf::from(value);
                index += 2;
            }
            "--namespace" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --namespace".to_string())?;
                options.namespace = value.clone();
                index += 2;
            }
            "--stale-ms" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --stale-ms".to_string())?;
                options.stale_ms = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --stale-ms value '{value}' (expected u64)"))?;
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "peers" => {
            if !command_args.is_empty() {
                return Err("peers takes no arguments".to_string());
            }
            CommandKind::Peers
        }
        "messages" => match command_args {
            [peer_id] => CommandKind::Messages {
                peer_id: peer_id.clone(),
            },
            _ => return Err("messages requires exactly one peer id".to_string()),
        },
        "prune" => {
            if !command_args.is_empty() {
                return Err("prune takes no arguments".to_string());
            }
            CommandKind::Prune
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, options, &mut io::stdout())
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "gossip_cli - inspect a file-backed peer store",
        "",
        "Usage:",
        "  gossip_cli [--store-dir <path>] [--namespace <name>] [--stale-ms <u64>] peers",
        "  gossip_cli [--store-dir <path>] [--namespace <name>] [--stale-ms <u64>] messages <peer-id>",
        "  gossip_cli [--store-dir <path>] [--namespace <name>] [--stale-ms <u64>] prune",
        "",
        "Defaults:",
        "  --store-dir gossip",
        "  --namespace peers",
        "  --stale-ms 5000",
    ]
    .join("\n")
}
