//! teomon-ctl — command-line interface for the Teomon collector.

use anyhow::{Context, Result};

mod cmd;

use cmd::peers::{cmd_del, cmd_peer, cmd_peers, cmd_peers_json, cmd_save};
use cmd::status::{cmd_shutdown, cmd_status};

const DEFAULT_PORT: u16 = 9070;

fn print_usage() {
    println!("Usage: teomon-ctl [--port N] <command>");
    println!();
    println!("Commands:");
    println!("  status            Collector status");
    println!("  peers             Peer table");
    println!("  peers json        Peer list as JSON");
    println!("  peer <address>    Details of one peer");
    println!("  del <address>     Remove a peer from the registry");
    println!("  save              Write the registry to disk");
    println!("  shutdown          Stop the collector");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | []                => cmd_status(port).await,
        ["peers"]                      => cmd_peers(port).await,
        ["peers", "json"]              => cmd_peers_json(port).await,
        ["peer", address]              => cmd_peer(port, address).await,
        ["del", address]               => cmd_del(port, address).await,
        ["save"]                       => cmd_save(port).await,
        ["shutdown"]                   => cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
