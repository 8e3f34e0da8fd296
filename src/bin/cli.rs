//! Dax CLI Client
//!
//! Interactive prompt for talking to a Dax server.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::Parser;
use dax::client::shell::{self, ShellCommand, BANNER};
use dax::{Client, Config, DaxError};
use tracing_subscriber::{fmt, EnvFilter};

/// Dax CLI
#[derive(Parser, Debug)]
#[command(name = "dax-cli")]
#[command(about = "Interactive client for the Dax cache")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Keys are padded or truncated to this many bytes
    #[arg(short, long, default_value = "4")]
    key_width: usize,

    /// Values are truncated to this many bytes
    #[arg(short = 'v', long, default_value = "2096")]
    max_value_bytes: usize,

    /// Seconds to wait for each response
    #[arg(short, long, default_value = "10")]
    timeout: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let args = Args::parse();
    let config = Config::builder()
        .server_addr(&args.server)
        .key_width(args.key_width)
        .max_value_bytes(args.max_value_bytes)
        .build();

    let client = match Client::start(config.clone()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error starting client: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", BANNER);
    let timeout = Duration::from_secs(args.timeout);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while client.is_running() {
        print!("> ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
            None => break,
        };

        let command = shell::parse(&line, &config);
        if command == ShellCommand::Exit {
            break;
        }

        match shell::run_command(&client, &command, timeout) {
            Some(Ok(output)) => println!("{}", output),
            Some(Err(e)) => eprintln!("Error: {}", e),
            None => {}
        }
    }

    client.shutdown();
    if let Err(e) = client.join() {
        eprintln!("{}", e);
        if matches!(e, DaxError::GaveUp { .. }) {
            std::process::exit(1);
        }
    }
}
