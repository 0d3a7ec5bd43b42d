//! chainpipe CLI — run the demo indexing pipelines.
//!
//! Usage:
//! ```bash
//! chainpipe default   # reserved stage order, retries, hooks
//! chainpipe custom    # declared order with a concurrent group
//! ```

use std::env;
use std::process;
use std::sync::Arc;

use chainpipe_core::{set_logger, TracingLogger};
use tracing_subscriber::EnvFilter;

mod indexing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    set_logger(Arc::new(TracingLogger));

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "default" => indexing::start_default_pipeline().await?,
        "custom" => indexing::start_custom_pipeline().await?,
        "version" | "--version" | "-V" => {
            println!("chainpipe {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }

    Ok(())
}

fn print_usage() {
    println!("chainpipe {}", env!("CARGO_PKG_VERSION"));
    println!("Modular, multi-stage pipeline engine for blockchain indexers\n");
    println!("USAGE:");
    println!("    chainpipe <COMMAND>\n");
    println!("COMMANDS:");
    println!("    default  Run the default pipeline demo (reserved stage order)");
    println!("    custom   Run the custom pipeline demo (declared stage order)");
    println!("    version  Print version");
    println!("    help     Print this help");
}
