//! dynffi - Dynamic Foreign-Function Call Bridge
//!
//! Command line front end for calling exported C functions and touching
//! exported C variables by type code.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dynffi::config::BridgeConfig;
use dynffi::ffi::{ArgumentSpec, ForeignBridge, InvocationRegistry, TypeCode};
use dynffi::host::Value;
use dynffi::logging;
use tracing::info;

#[derive(Parser)]
#[command(name = "dynffi")]
#[command(version)]
#[command(about = "Call C functions and variables chosen at runtime", long_about = None)]
struct Cli {
    /// Config file (default: dynffi.toml in this or a parent directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a function and print its result
    Call {
        /// Library path or name ("" for this process)
        library: String,

        /// Exported function name
        symbol: String,

        /// Return type code (' ' for void)
        #[arg(long)]
        ret: char,

        /// Argument type codes, one per argument
        #[arg(long, default_value = "")]
        args: String,

        /// CDECL, STDCALL or FASTCALL (inferred when omitted)
        #[arg(long)]
        convention: Option<String>,

        /// Argument values, parsed by their type codes
        #[arg(allow_negative_numbers = true)]
        values: Vec<String>,
    },

    /// Print the value of an exported variable
    Get {
        library: String,
        variable: String,
        code: char,
    },

    /// Overwrite an exported variable
    Set {
        library: String,
        variable: String,
        code: char,
        #[arg(allow_negative_numbers = true)]
        value: String,
    },

    /// List the type code alphabet
    Codes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BridgeConfig::load_from_cwd().context("Failed to load dynffi.toml")?,
    };
    logging::init_with_config(config.logging.to_log_config().verbose(cli.verbose));

    match cli.command {
        Commands::Call {
            library,
            symbol,
            ret,
            args,
            convention,
            values,
        } => cmd_call(
            &config,
            &library,
            &symbol,
            ret,
            &args,
            convention.as_deref(),
            &values,
        ),
        Commands::Get {
            library,
            variable,
            code,
        } => cmd_get(&config, &library, &variable, code),
        Commands::Set {
            library,
            variable,
            code,
            value,
        } => cmd_set(&config, &library, &variable, code, &value),
        Commands::Codes => cmd_codes(),
    }
}

fn bridge(config: &BridgeConfig) -> ForeignBridge {
    let registry: &'static InvocationRegistry =
        Box::leak(Box::new(InvocationRegistry::from_config(config)));
    ForeignBridge::new(registry)
}

fn cmd_call(
    config: &BridgeConfig,
    library: &str,
    symbol: &str,
    ret: char,
    codes: &str,
    convention: Option<&str>,
    values: &[String],
) -> Result<()> {
    let spec = ArgumentSpec::parse(codes).context("Invalid argument type codes")?;
    if values.len() != spec.arity() {
        bail!(
            "{} takes {} argument(s) ('{}'), {} given",
            symbol,
            spec.arity(),
            spec,
            values.len()
        );
    }
    let args = spec
        .codes()
        .iter()
        .zip(values)
        .map(|(&code, text)| parse_value(code, text))
        .collect::<Result<Vec<_>>>()?;

    let bridge = bridge(config);
    let function = bridge
        .try_load_function(library, symbol, convention, ret, codes)
        .with_context(|| format!("Failed to load {} from '{}'", symbol, library))?;
    if let Some(invocation) = bridge.registry().get(library, symbol) {
        if let Some(signature) = invocation.signature() {
            info!(%signature, "calling");
        }
    }

    let result = function.apply(&args);
    if let Some(message) = result.error_message() {
        bail!("{} failed: {}", symbol, message);
    }
    println!("{}", result);
    Ok(())
}

fn cmd_get(config: &BridgeConfig, library: &str, variable: &str, code: char) -> Result<()> {
    let value = bridge(config)
        .try_read_variable(library, variable, code)
        .with_context(|| format!("Failed to read {} from '{}'", variable, library))?;
    println!("{}", value);
    Ok(())
}

fn cmd_set(
    config: &BridgeConfig,
    library: &str,
    variable: &str,
    code: char,
    text: &str,
) -> Result<()> {
    let type_code = TypeCode::from_char(code)?;
    let value = parse_value(type_code, text)?;
    bridge(config)
        .try_write_variable(library, variable, code, &value)
        .with_context(|| format!("Failed to write {} in '{}'", variable, library))?;
    println!("{} <- {}", variable, value);
    Ok(())
}

fn cmd_codes() -> Result<()> {
    println!("Type codes:");
    println!("===========\n");
    println!("  code  type    C          bytes");
    for code in TypeCode::ALL {
        println!(
            "  '{}'   {:<6}  {:<9}  {}",
            code.as_char(),
            code.value_type().name(),
            code.c_name(),
            code.size()
        );
    }
    Ok(())
}

/// Parse a command line value as `code`; `0N` is the type's null
fn parse_value(code: TypeCode, text: &str) -> Result<Value> {
    if text == "0N" && !matches!(code, TypeCode::Void | TypeCode::Bool) {
        return Ok(Value::atom(code.value_type(), code.sentinel()));
    }
    let bad = || format!("'{}' is not a valid {}", text, code.c_name());
    let value = match code {
        TypeCode::Void => bail!("void has no values"),
        TypeCode::Bool => match text {
            "1" | "1b" | "true" => Value::bool(true),
            "0" | "0b" | "false" => Value::bool(false),
            _ => bail!(bad()),
        },
        TypeCode::Byte => {
            let parsed = match text.strip_prefix("0x") {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => text.parse(),
            };
            Value::byte(parsed.with_context(bad)?)
        }
        TypeCode::Short => Value::short(text.parse().with_context(bad)?),
        TypeCode::Int => Value::int(text.parse().with_context(bad)?),
        TypeCode::Long => Value::long(text.parse().with_context(bad)?),
        TypeCode::Real => Value::real(text.parse().with_context(bad)?),
        TypeCode::Float => Value::float(text.parse().with_context(bad)?),
        TypeCode::Char => match text.as_bytes() {
            [byte] => Value::char(*byte),
            _ => bail!(bad()),
        },
    };
    Ok(value)
}
