use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use shape_bindings::model::loader::{self, LoadConfig};
use shape_bindings::{GraphCache, ShapeId};

#[derive(Parser)]
#[command(name = "shape-graph-export")]
#[command(about = "Export per-service relationship graphs to DOT/SVG format")]
struct Cli {
    /// Model files or directories (defaults to ./model)
    #[arg(short, long)]
    model: Vec<PathBuf>,

    /// Only this service (defaults to every service)
    #[arg(short, long)]
    service: Option<String>,

    /// Output directory (defaults to current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: dot or svg
    #[arg(short, long, default_value = "dot")]
    format: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if !matches!(cli.format.as_str(), "dot" | "svg") {
        eprintln!("❌ Invalid format. Use 'dot' or 'svg'");
        std::process::exit(1);
    }

    let paths = if cli.model.is_empty() {
        vec![PathBuf::from("model")]
    } else {
        cli.model
    };
    println!("Loading model from: {:?}", paths);
    let model = loader::load_from_paths(&paths, &LoadConfig::default())?;
    let cache = GraphCache::new(Arc::new(model));

    let services: Vec<ShapeId> = match &cli.service {
        Some(raw) => vec![ShapeId::parse(raw)?],
        None => cache.model().services().map(|s| s.id.clone()).collect(),
    };
    let output_dir = cli.output.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir)?;

    for service in services {
        let graph = cache.get(&service)?;
        println!(
            "{}: {} shapes, {} edges",
            service,
            graph.shape_count(),
            graph.edge_count()
        );

        let dot_content = graph.to_dot();
        let stem = service.name().to_lowercase();

        if cli.format == "dot" {
            let output_path = output_dir.join(format!("{}.dot", stem));
            std::fs::write(&output_path, &dot_content)?;
            println!("✅ Exported DOT to: {:?}", output_path);
            continue;
        }

        let output_path = output_dir.join(format!("{}.svg", stem));
        let temp_dot = output_path.with_extension("temp.dot");
        std::fs::write(&temp_dot, &dot_content)?;

        let output = std::process::Command::new("dot")
            .arg("-Tsvg")
            .arg(&temp_dot)
            .arg("-o")
            .arg(&output_path)
            .output()?;

        let _ = std::fs::remove_file(&temp_dot);

        if output.status.success() {
            println!("✅ Exported SVG to: {:?}", output_path);
        } else {
            eprintln!("❌ GraphViz conversion failed:");
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            std::process::exit(1);
        }
    }

    Ok(())
}
