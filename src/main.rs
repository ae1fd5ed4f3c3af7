use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod build;
mod cli;
mod compile;
mod config;
mod diagnostics;
mod error;
mod identifiers;
mod output;
mod placeholder;
mod services;
mod staging;
mod templates;
mod util;
mod variables;

use cli::{BuildArgs, Command, IdsArgs, InitArgs, RootArgs, ValidateArgs, LOG_ENV};
use diagnostics::{Diagnostics, Warning};
use identifiers::{EndpointIdentifier, KNOWN_TOOLS};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.command.verbose());

    match args.command {
        Command::Build(args) => cmd_build(args),
        Command::Validate(args) => cmd_validate(args),
        Command::Init(args) => cmd_init(args),
        Command::Ids(args) => cmd_ids(args),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        println!("  warning {warning}");
    }
}

fn cmd_build(args: BuildArgs) -> Result<()> {
    let options = build::BuildOptions {
        config: Some(args.config),
        source_root: args.src,
        output_root: args.out,
        build_date: build::resolve_build_date(args.build_date.as_deref())?,
    };
    let outcome = build::run_build(&options)?;
    if args.json {
        return print_json(&outcome.report);
    }
    println!(
        "wrote {} artifacts to {} ({} warnings)",
        outcome.report.artifacts.len(),
        util::display_path(&options.output_root, None),
        outcome.report.warning_count()
    );
    if args.verbose {
        for path in &outcome.published {
            println!("  published {}", util::display_path(path, None));
        }
    }
    print_warnings(&outcome.report.warnings);
    Ok(())
}

#[derive(Serialize)]
struct ValidationSummary {
    config: String,
    business_name: String,
    services: usize,
    dynamic_columns: usize,
    csv_columns: usize,
    warnings: Vec<Warning>,
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let mut diagnostics = Diagnostics::new();
    let build_date = build::resolve_build_date(None)?;
    let prepared = build::prepare(Some(args.config.as_path()), &build_date, &mut diagnostics)?;
    let summary = ValidationSummary {
        config: prepared.config.origin().to_string(),
        business_name: prepared.phases.business_name().to_string(),
        services: prepared.services.services.len(),
        dynamic_columns: prepared.services.dynamic_columns(),
        csv_columns: prepared.services.csv_columns.len(),
        warnings: diagnostics.into_warnings(),
    };
    if args.json {
        return print_json(&summary);
    }
    println!(
        "config ok: {} ({} services, {} dynamic columns, {} warnings)",
        summary.business_name,
        summary.services,
        summary.dynamic_columns,
        summary.warnings.len()
    );
    print_warnings(&summary.warnings);
    Ok(())
}

fn cmd_init(args: InitArgs) -> Result<()> {
    config::write_default_config(&args.config, args.force)?;
    println!("wrote {}", util::display_path(&args.config, None));
    Ok(())
}

fn cmd_ids(args: IdsArgs) -> Result<()> {
    let mut diagnostics = Diagnostics::new();
    let build_date = build::resolve_build_date(None)?;
    let prepared = build::prepare(Some(args.config.as_path()), &build_date, &mut diagnostics)?;
    let mut generator = prepared.identifier_generator();
    let tools: Vec<String> = if args.tools.is_empty() {
        KNOWN_TOOLS.iter().map(|tool| tool.to_string()).collect()
    } else {
        args.tools
    };
    let identifiers: Vec<EndpointIdentifier> = tools
        .iter()
        .map(|tool| generator.identify(tool))
        .collect();
    if args.json {
        return print_json(&identifiers);
    }
    for identifier in &identifiers {
        println!("{}\t{}", identifier.tool_name, identifier.url);
    }
    Ok(())
}
