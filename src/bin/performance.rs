//! JLS performance utility.
//!
//! Generates large JLS capture files and profiles read performance against
//! them: length queries, point seeks across the whole capture, and range
//! statistics at increasing zoom levels.
//!
//! # Usage
//!
//! ```bash
//! # Generate a 10-gigasample test file
//! performance generate out.jls --sample_rate 1000000 --length 10000000000
//!
//! # Profile seek and statistics performance
//! performance profile out.jls
//! ```

use std::env;
use std::process;

mod cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = &args[1];
    let command_args = &args[2..];

    let result = match command.as_str() {
        "generate" => cli::generate::run(command_args),
        "profile" => cli::profile::run(command_args),
        "help" | "--help" | "-h" => {
            print_usage();
            return;
        }
        _ => {
            println!("Unsupported command: {command}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("Utility to test JLS file performance.");
    println!("usage: performance <command>");
    println!();
    println!("Generate a JLS file.");
    println!("  generate <filename> [--<opt1> <value> ...]");
    println!("    <filename>                     The output file path.");
    println!("    --sample_rate                  The sample rate in Hz.");
    println!("    --length                       The JLS file length in samples.");
    println!("    --samples_per_data             The samples per data chunk.");
    println!("    --sample_decimate_factor       The samples per summary entry.");
    println!("    --entries_per_summary          The entries per summary chunk.");
    println!("    --summary_decimate_factor      The summaries per summary entry.");
    println!();
    println!("Profile JLS read performance.");
    println!("  profile <filename>");
    println!("    <filename>                     The input file path.");
}
