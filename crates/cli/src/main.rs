mod options;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use claimconf_core::{ConfError, Document};

use crate::options::{build_load_options, OptionArgs};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Parse and query claimconf configuration files.
#[derive(Parser)]
#[command(
    name = "claimconf",
    version,
    about = "Parse and query claimconf configuration files"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file and print the resulting document
    Parse {
        /// Root configuration file
        file: PathBuf,
        #[command(flatten)]
        opts: OptionArgs,
    },

    /// List section names in first-seen order
    Sections {
        /// Root configuration file
        file: PathBuf,
        #[command(flatten)]
        opts: OptionArgs,
    },

    /// Print a single property value
    Get {
        /// Root configuration file
        file: PathBuf,
        /// Section name
        section: String,
        /// Property key
        key: String,
        /// Value printed when the property is absent
        #[arg(long)]
        default: Option<String>,
        #[command(flatten)]
        opts: OptionArgs,
    },

    /// List the files read, root first
    Files {
        /// Root configuration file
        file: PathBuf,
        #[command(flatten)]
        opts: OptionArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Parse { file, opts } => {
            let doc = load_or_exit(&file, &opts, cli.output, cli.quiet);
            cmd_parse(&doc, cli.output);
        }
        Commands::Sections { file, opts } => {
            let doc = load_or_exit(&file, &opts, cli.output, cli.quiet);
            cmd_sections(&doc, cli.output);
        }
        Commands::Get {
            file,
            section,
            key,
            default,
            opts,
        } => {
            let doc = load_or_exit(&file, &opts, cli.output, cli.quiet);
            cmd_get(&doc, &section, &key, default.as_deref(), cli.output, cli.quiet);
        }
        Commands::Files { file, opts } => {
            let doc = load_or_exit(&file, &opts, cli.output, cli.quiet);
            cmd_files(&doc, cli.output);
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_or_exit(file: &Path, opts: &OptionArgs, output: OutputFormat, quiet: bool) -> Document {
    let options = match build_load_options(opts) {
        Ok(options) => options,
        Err(msg) => fail(&msg, output, quiet),
    };
    match claimconf_core::load(file, &options) {
        Ok(doc) => doc,
        Err(e) => {
            report_conf_error(&e, output, quiet);
            process::exit(1);
        }
    }
}

fn report_conf_error(e: &ConfError, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&e.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("{}", e);
                if !e.row.is_empty() {
                    eprintln!("  | {}", e.row);
                }
            }
        }
    }
}

fn fail(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    match output {
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", msg);
            }
        }
    }
    process::exit(1);
}

fn print_json(value: &serde_json::Value) {
    let pretty =
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

fn cmd_parse(doc: &Document, output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(&doc.to_json_value()),
        OutputFormat::Text => print!("{}", doc),
    }
}

fn cmd_sections(doc: &Document, output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(&serde_json::json!(doc.section_names())),
        OutputFormat::Text => {
            for name in doc.section_names() {
                println!("{}", name);
            }
        }
    }
}

fn cmd_get(
    doc: &Document,
    section: &str,
    key: &str,
    default: Option<&str>,
    output: OutputFormat,
    quiet: bool,
) {
    let prop = doc.prop(section, key);
    let value = match (prop.value(), default) {
        (Ok(value), _) => value,
        (Err(_), Some(default)) => default,
        (Err(e), None) => fail(&e.to_string(), output, quiet),
    };
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "section": section,
            "key": key,
            "value": value,
            "exists": prop.exists(),
        })),
        OutputFormat::Text => println!("{}", value),
    }
}

fn cmd_files(doc: &Document, output: OutputFormat) {
    let files: Vec<String> = doc.files().iter().map(|f| f.display().to_string()).collect();
    match output {
        OutputFormat::Json => print_json(&serde_json::json!(files)),
        OutputFormat::Text => {
            for f in files {
                println!("{}", f);
            }
        }
    }
}
