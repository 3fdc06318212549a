use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lookout_config::{json_schema, ConfigError, LoggingConfig, LookoutConfig};
use lookout_dump::{Dumper, DumperLimits, MAX_LEVEL_LIMIT};
use lookout_gate::{generate_public_key, PasswordHash};
use lookout_proto::ClientHello;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lookout", version, about = "Lookout debug connector tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate a `lookout.toml`
    CheckConfig(CheckConfigArgs),
    /// Print the JSON schema of `lookout.toml`
    Schema,
    /// Read a password from stdin and print its credential hash
    HashPassword,
    /// Sign evaluation code with a credential hash
    SignEval(SignEvalArgs),
    /// Print a client presence marker (the `X-Lookout-Client` header value)
    ClientHello(ClientHelloArgs),
    /// Dump a JSON document through the bounded dumper
    Dump(DumpArgs),
}

#[derive(Args)]
struct CheckConfigArgs {
    /// Path to the configuration file
    path: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SignEvalArgs {
    /// Credential hash printed by `hash-password`
    #[arg(long)]
    password_hash: String,
    /// Code to sign
    code: String,
}

#[derive(Args)]
struct ClientHelloArgs {
    /// Session token, 1-128 characters of `[A-Za-z0-9_.-]`
    session: String,
    /// Include credentials derived from this hash
    #[arg(long)]
    password_hash: Option<String>,
}

#[derive(Args)]
struct DumpArgs {
    /// JSON file to dump
    file: PathBuf,
    #[arg(long)]
    level_limit: Option<usize>,
    #[arg(long)]
    items_count_limit: Option<usize>,
    #[arg(long)]
    item_size_limit: Option<usize>,
    #[arg(long)]
    dump_size_limit: Option<usize>,
}

#[derive(Serialize)]
struct CheckReport {
    path: PathBuf,
    valid: bool,
    errors: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    lookout_config::init_tracing(&LoggingConfig {
        level: "warn".to_owned(),
        ..LoggingConfig::default()
    });
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::CheckConfig(args) => check_config(args),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&json_schema())?);
            Ok(0)
        }
        Command::HashPassword => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("failed to read password from stdin")?;
            let password = input.trim_end_matches(['\r', '\n']);
            let hash = PasswordHash::derive(password)?;
            println!("{}", hash.as_hex());
            Ok(0)
        }
        Command::SignEval(args) => {
            let hash = PasswordHash::from_hex(&args.password_hash)?;
            println!("{}", hash.sign_eval(&args.code));
            Ok(0)
        }
        Command::ClientHello(args) => {
            let mut hello = ClientHello::new(args.session);
            if let Some(hash) = args.password_hash {
                let hash = PasswordHash::from_hex(&hash)?;
                let public_key = generate_public_key()?;
                let token = hash.client_token(&public_key);
                hello = hello.with_auth(public_key, token);
            }
            println!("{}", hello.encode()?);
            Ok(0)
        }
        Command::Dump(args) => dump(args),
    }
}

fn check_config(args: CheckConfigArgs) -> Result<i32> {
    tracing::debug!(target: "lookout.cli", path = %args.path.display(), "checking configuration");
    let errors = match LookoutConfig::load_from_path(&args.path) {
        Ok(config) => config
            .validation_errors()
            .iter()
            .map(ToString::to_string)
            .collect(),
        Err(err @ (ConfigError::Toml(_) | ConfigError::UnknownOption { .. })) => {
            vec![err.to_string()]
        }
        Err(err) => return Err(err.into()),
    };

    let report = CheckReport {
        path: args.path,
        valid: errors.is_empty(),
        errors,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.valid {
        println!("{}: ok", report.path.display());
    } else {
        for error in &report.errors {
            println!("{}: {error}", report.path.display());
        }
    }
    Ok(if report.valid { 0 } else { 1 })
}

fn dump(args: DumpArgs) -> Result<i32> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", args.file.display()))?;

    let defaults = DumperLimits::default();
    let limits = DumperLimits {
        level_limit: args.level_limit.unwrap_or(defaults.level_limit),
        items_count_limit: args.items_count_limit.unwrap_or(defaults.items_count_limit),
        item_size_limit: args.item_size_limit.unwrap_or(defaults.item_size_limit),
        dump_size_limit: args.dump_size_limit.unwrap_or(defaults.dump_size_limit),
    };
    if limits.items_count_limit == 0 || limits.item_size_limit == 0 || limits.dump_size_limit == 0
    {
        bail!("only --level-limit may be 0");
    }
    if limits.level_limit > MAX_LEVEL_LIMIT {
        bail!("--level-limit may be at most {MAX_LEVEL_LIMIT}");
    }

    let dumped = Dumper::new(limits).dump_value(&value);
    println!("{}", serde_json::to_string_pretty(&dumped)?);
    Ok(0)
}
