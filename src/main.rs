use std::io::Read;

use clap::Parser;
use tracing::Level;

use flowlay::LayoutConfig;

#[derive(Parser)]
#[command(
    name = "flowlay",
    about = "Lay out Mermaid flowcharts and print the positioned graph as JSON"
)]
struct Cli {
    /// Input file (reads from stdin if not provided)
    file: Option<std::path::PathBuf>,

    /// Available viewport width
    #[arg(long, short = 'w', default_value_t = 800.0)]
    width: f32,

    /// Available viewport height
    #[arg(long, short = 'H', default_value_t = 600.0)]
    height: f32,

    /// Gap between nodes within a layer
    #[arg(long)]
    node_spacing: Option<f32>,

    /// Gap between layers
    #[arg(long)]
    rank_spacing: Option<f32>,

    /// Space between a subgraph's border and its members
    #[arg(long)]
    subgraph_padding: Option<f32>,

    /// Label font size used for node sizing
    #[arg(long)]
    font_size: Option<f32>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Log to stderr (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn layout_config(&self) -> LayoutConfig {
        let defaults = LayoutConfig::default();
        LayoutConfig {
            node_spacing: self.node_spacing.unwrap_or(defaults.node_spacing),
            rank_spacing: self.rank_spacing.unwrap_or(defaults.rank_spacing),
            subgraph_padding: self.subgraph_padding.unwrap_or(defaults.subgraph_padding),
            font_size: self.font_size.unwrap_or(defaults.font_size),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let input = match &cli.file {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to read {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
                eprintln!("ERROR: failed to read stdin: {e}");
                std::process::exit(1);
            });
            buf
        }
    };

    let result = flowlay::layout_with_config(&input, cli.width, cli.height, cli.layout_config())
        .and_then(|flowchart| {
            if cli.pretty {
                flowlay::graph_json::to_json_pretty(&flowchart)
            } else {
                flowlay::graph_json::to_json(&flowchart)
            }
        });

    match result {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}
