//! Model Schema CLI
//!
//! Command-line interface for inspecting model schemas and mapping payloads.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use model_schema::{
    decode, fetch_model, load_manifest, load_payload, to_json_schema, validate_payload,
    DataSource, DecodeOptions, FetchError, FileDataSource, ModelManifest, RequestContext,
    SchemaEngine, ValidateError,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-schema")]
#[command(about = "Derive model schemas and map payloads onto them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load models from a manifest and print their schemas
    Inspect {
        /// Model manifest file
        manifest: PathBuf,

        /// Model identifiers to load (default: every model in the manifest)
        models: Vec<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Decode a payload into a model instance
    Decode {
        /// Model manifest file
        manifest: PathBuf,

        /// Payload file to decode
        payload: PathBuf,

        /// Schema name to decode as
        #[arg(long = "type", short)]
        type_name: String,

        /// Model identifiers to load (default: every model in the manifest)
        #[arg(long = "model")]
        models: Vec<String>,

        /// Reject payload keys the schema does not declare
        #[arg(long)]
        strict: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Fetch a payload from a data source and decode it
    Fetch {
        /// Model manifest file
        manifest: PathBuf,

        /// Base directory or URL (http:// or https://) to fetch from
        #[arg(long)]
        from: String,

        /// Route template, e.g. /articles/{id}.json
        #[arg(long)]
        route: String,

        /// Route parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Schema name to decode as
        #[arg(long = "type", short)]
        type_name: String,

        /// Reject payload keys the schema does not declare
        #[arg(long)]
        strict: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the JSON Schema for a model
    JsonSchema {
        /// Model manifest file
        manifest: PathBuf,

        /// Schema name to export
        #[arg(long = "type", short)]
        type_name: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a payload against a model's JSON Schema
    Validate {
        /// Model manifest file
        manifest: PathBuf,

        /// Payload file to validate
        payload: PathBuf,

        /// Schema name to validate against
        #[arg(long = "type", short)]
        type_name: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            manifest,
            models,
            pretty,
        } => run_inspect(&manifest, &models, pretty),

        Commands::Decode {
            manifest,
            payload,
            type_name,
            models,
            strict,
            pretty,
        } => run_decode(&manifest, &payload, &type_name, &models, strict, pretty),

        Commands::Fetch {
            manifest,
            from,
            route,
            params,
            type_name,
            strict,
            pretty,
        } => {
            let context = params
                .into_iter()
                .fold(RequestContext::new(route), |ctx, (k, v)| ctx.with(k, v));
            run_fetch(&manifest, &from, &context, &type_name, strict, pretty)
        }

        Commands::JsonSchema {
            manifest,
            type_name,
            output,
            pretty,
        } => run_json_schema(&manifest, &type_name, output, pretty),

        Commands::Validate {
            manifest,
            payload,
            type_name,
            json,
        } => run_validate(&manifest, &payload, &type_name, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Load the manifest and the requested models (all of them if none given).
fn load_engine(
    manifest_path: &Path,
    models: &[String],
) -> Result<SchemaEngine<ModelManifest>, u8> {
    let manifest = load_manifest(manifest_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let models: Vec<String> = if models.is_empty() {
        manifest.identifiers().into_iter().map(String::from).collect()
    } else {
        models.to_vec()
    };

    let mut engine = SchemaEngine::new(manifest);
    engine.load_schema_for_models(&models).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    Ok(engine)
}

fn run_inspect(manifest: &Path, models: &[String], pretty: bool) -> Result<(), u8> {
    let engine = load_engine(manifest, models)?;
    print_json(&engine.all_model_schemas(), pretty, None)
}

fn run_decode(
    manifest: &Path,
    payload_path: &Path,
    type_name: &str,
    models: &[String],
    strict: bool,
    pretty: bool,
) -> Result<(), u8> {
    let engine = load_engine(manifest, models)?;
    let payload = load_payload(payload_path).map_err(|e| {
        eprintln!("Error loading payload: {}", e);
        e.exit_code() as u8
    })?;

    let options = DecodeOptions::new().strict(strict);
    let instance = decode(engine.registry(), type_name, &payload, &options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    print_json(&instance, pretty, None)
}

fn run_fetch(
    manifest: &Path,
    from: &str,
    context: &RequestContext,
    type_name: &str,
    strict: bool,
    pretty: bool,
) -> Result<(), u8> {
    let engine = load_engine(manifest, &[])?;
    let source = open_source(from)?;
    let options = DecodeOptions::new().strict(strict);

    let instance = fetch_model(source.as_ref(), engine.registry(), type_name, context, &options)
        .map_err(|e| {
            eprintln!("Error: {}", e);
            match e {
                FetchError::Source(e) => e.exit_code() as u8,
                FetchError::Decode(e) => e.exit_code() as u8,
            }
        })?;
    print_json(&instance, pretty, None)
}

/// Pick a data source: HTTP for URLs, files otherwise.
fn open_source(from: &str) -> Result<Box<dyn DataSource>, u8> {
    if from.starts_with("http://") || from.starts_with("https://") {
        #[cfg(feature = "remote")]
        {
            let source = model_schema::HttpDataSource::new(from).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
            return Ok(Box::new(source));
        }
        #[cfg(not(feature = "remote"))]
        {
            eprintln!("Error: fetching from URLs requires the 'remote' feature");
            return Err(2);
        }
    }
    Ok(Box::new(FileDataSource::new(from)))
}

fn run_json_schema(
    manifest: &Path,
    type_name: &str,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let engine = load_engine(manifest, &[])?;
    let schema = to_json_schema(engine.registry(), type_name).map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;
    print_json(&schema, pretty, output.as_deref())
}

fn run_validate(
    manifest: &Path,
    payload_path: &Path,
    type_name: &str,
    json_output: bool,
) -> Result<(), u8> {
    let engine = load_engine(manifest, &[])?;
    let payload = load_payload(payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    match validate_payload(engine.registry(), type_name, &payload) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn print_json<T: Serialize + ?Sized>(
    value: &T,
    pretty: bool,
    output: Option<&Path>,
) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }
    Ok(())
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}
