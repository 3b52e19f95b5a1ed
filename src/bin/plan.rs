//! Binding Planner CLI
//!
//! Loads a JSON AST model and prints input plans, relationship graphs, auth
//! summaries, or fuzzy shape search results.
//!
//! Usage:
//!   shape-plan --model ./model plan --service example#Widgets
//!   shape-plan --model ./model graph example#Widgets
//!   shape-plan --help

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use shape_bindings::model::loader;
use shape_bindings::{
    AuthBindingCoordinator, GraphCache, InputPlan, Model, PlanAssembler, PlannerConfig, ShapeId,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shape-plan")]
#[command(about = "Synthesize input binding plans from an interface model")]
struct Cli {
    /// Model files or directories (defaults to [model].paths from config)
    #[arg(short, long)]
    model: Vec<PathBuf>,

    /// Explicit config file
    #[arg(short, long)]
    config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble input plans
    Plan {
        /// Only this service (default: every service)
        #[arg(short, long)]
        service: Option<String>,
        /// Only this operation
        #[arg(short, long)]
        operation: Option<String>,
    },

    /// Print the relationship graph of a service
    Graph {
        service: String,
    },

    /// Summarize authenticated operations per service
    Auth {
        service: Option<String>,
    },

    /// Fuzzy search shape names
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PlannerConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let paths = if cli.model.is_empty() {
        config.model.paths.clone()
    } else {
        cli.model.clone()
    };
    let model = loader::load_from_paths(&paths, &config.load_config())
        .with_context(|| format!("loading model from {:?}", paths))?;
    let cache = GraphCache::new(Arc::new(model));

    match cli.command {
        Commands::Plan { service, operation } => {
            let plans = collect_plans(&cache, &config, service.as_deref(), operation.as_deref())?;
            match cli.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
                Format::Text => plans.iter().for_each(print_plan),
            }
        }

        Commands::Graph { service } => {
            let graph = cache.get(&ShapeId::parse(&service)?)?;
            match cli.format {
                Format::Json => {
                    let edges: Vec<_> = graph
                        .edges()
                        .map(|(source, target, tag)| serde_json::json!({ "source": source, "target": target, "tag": tag }))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&edges)?);
                }
                Format::Text => println!("{}", graph),
            }
        }

        Commands::Auth { service } => {
            let services = selected_services(cache.model(), service.as_deref())?;
            let coordinator = AuthBindingCoordinator::new(cache.model(), &config.bindings.validation_failure);
            for service in services {
                let graph = cache.get(&service)?;
                let summary = coordinator.collect_for_service(&graph)?;
                match cli.format {
                    Format::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
                    Format::Text => {
                        println!("{}", service);
                        if summary.is_empty() {
                            println!("  (no authenticated operations)");
                            continue;
                        }
                        let mechanisms: Vec<&str> = summary.mechanisms.iter().map(String::as_str).collect();
                        println!("  mechanisms: {}", mechanisms.join(", "));
                        for (payload, operations) in &summary.payload_operations {
                            let marker = if summary.is_optional(payload) { " (optional)" } else { "" };
                            println!("  {}{}", payload, marker);
                            for op in operations {
                                println!("    └─ {}", op);
                            }
                        }
                    }
                }
            }
        }

        Commands::Search { query, limit } => {
            for (score, id) in cache.model().search(&query, limit) {
                println!("{:>5}  {}", score, id);
            }
        }
    }

    Ok(())
}

fn selected_services(model: &Model, service: Option<&str>) -> anyhow::Result<Vec<ShapeId>> {
    match service {
        Some(raw) => Ok(vec![ShapeId::parse(raw)?]),
        None => Ok(model.services().map(|s| s.id.clone()).collect()),
    }
}

fn collect_plans(
    cache: &GraphCache,
    config: &PlannerConfig,
    service: Option<&str>,
    operation: Option<&str>,
) -> anyhow::Result<Vec<InputPlan>> {
    if let Some(raw) = operation {
        let operation = ShapeId::parse(raw)?;
        let service = match service {
            Some(raw) => ShapeId::parse(raw)?,
            None => cache.service_for_operation(&operation)?,
        };
        let graph = cache.get(&service)?;
        let plan = PlanAssembler::new(&graph, &config.bindings)
            .assemble(&operation)
            .with_context(|| format!("assembling {}", operation))?;
        return Ok(vec![plan]);
    }

    let services = selected_services(cache.model(), service)?;
    if services.is_empty() {
        bail!("model declares no services");
    }
    let mut plans = Vec::new();
    for service in services {
        let graph = cache.get(&service)?;
        plans.extend(
            PlanAssembler::new(&graph, &config.bindings)
                .assemble_all()
                .with_context(|| format!("assembling plans for {}", service))?,
        );
    }
    Ok(plans)
}

fn print_plan(plan: &InputPlan) {
    let inferred = if plan.inferred_http { " (inferred)" } else { "" };
    println!("{} {} {}{}", plan.operation, plan.http.method, plan.http.uri, inferred);
    if let Some(auth) = &plan.auth {
        println!("  auth {} -> {} {}", auth.mechanism, auth.payload, auth.policy);
    }
    if plan.is_whole_payload {
        if let Some(input) = &plan.input {
            println!("  whole payload: {}", input);
        }
    }
    for decl in &plan.declarations {
        println!(
            "  {:<16} {:<24} {:<40} {}",
            decl.member, decl.origin, decl.policy, decl.conversion
        );
    }
    if let Some(numeric) = plan.numeric_query_parameters() {
        println!(
            "  numeric query: {} (decimal: {}, negative: {})",
            numeric.names.join(", "),
            numeric.allow_decimal,
            numeric.allow_negative
        );
    }
}
