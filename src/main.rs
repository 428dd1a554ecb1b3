use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::{Vec2, Vec3};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use graphscape::config::SceneConfig;
use graphscape::graph::{GraphModel, GraphPayload};
use graphscape::layout::LayoutShape;
use graphscape::render::HeadlessBackend;
use graphscape::scene::Scene;

/// Lay out and inspect hub/leaf relationship graphs.
#[derive(Parser)]
#[command(name = "graphscape")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print node, edge and connectivity counts
    Inspect {
        /// Graph payload (.json)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Compute node positions for one layout shape
    Layout {
        /// Graph payload (.json)
        #[arg(short, long)]
        input: PathBuf,

        /// spiral, galaxy, sphere or anatomical (defaults to the config's initial shape)
        #[arg(short, long)]
        shape: Option<LayoutShape>,

        /// Write positions here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scene config (.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Report the leaf under a viewport point, rendered headless
    Pick {
        /// Graph payload (.json)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        shape: Option<LayoutShape>,

        /// Cursor x in normalized device coordinates
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        x: f32,

        /// Cursor y in normalized device coordinates
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        y: f32,

        /// Aim the cursor at this leaf's projected centre instead
        #[arg(long)]
        at: Option<String>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct PlacedNode<'a> {
    id: &'a str,
    position: Vec3,
}

#[derive(Serialize)]
struct LayoutOutput<'a> {
    shape: LayoutShape,
    hubs: Vec<PlacedNode<'a>>,
    leaves: Vec<PlacedNode<'a>>,
}

fn placed<'a>(ids: impl Iterator<Item = &'a str>, positions: &[Vec3]) -> Vec<PlacedNode<'a>> {
    ids.zip(positions)
        .map(|(id, &position)| PlacedNode { id, position })
        .collect()
}

fn load_graph(path: &Path) -> anyhow::Result<GraphModel> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph file {}", path.display()))?;
    let payload = GraphPayload::from_json(&text)
        .with_context(|| format!("failed to parse graph file {}", path.display()))?;
    Ok(GraphModel::from_payload(&payload)?)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SceneConfig> {
    match path {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(SceneConfig::default()),
    }
}

fn inspect(input: &Path) -> anyhow::Result<()> {
    let model = load_graph(input)?;
    let stats = model.stats();
    println!("hubs: {}", stats.hubs);
    println!("leaves: {}", stats.leaves);
    println!("edges: {}", stats.edges);
    println!("orphan leaves: {}", stats.orphan_leaves);
    println!("cross-linked leaves: {}", stats.cross_linked_leaves);
    for hub in model.hubs_by_popularity() {
        let h = model.hub(hub);
        println!("  {} ({}): {} leaves", h.id, h.label, model.hub_degree(hub));
    }
    Ok(())
}

fn layout(
    input: &Path,
    shape: Option<LayoutShape>,
    output: Option<&Path>,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let model = load_graph(input)?;
    let shape = shape.unwrap_or(load_config(config)?.initial_shape);
    let result = shape.compute(&model);

    let out = LayoutOutput {
        shape,
        hubs: placed(model.hubs().iter().map(|h| h.id.as_str()), &result.hub_positions),
        leaves: placed(
            model.leaves().iter().map(|l| l.id.as_str()),
            &result.leaf_positions,
        ),
    };
    let json = serde_json::to_string_pretty(&out)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "Wrote {} layout for {} nodes to {}",
                shape,
                model.hub_count() + model.leaf_count(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn pick(
    input: &Path,
    shape: Option<LayoutShape>,
    cursor: Vec2,
    at: Option<&str>,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let model = load_graph(input)?;
    let mut config = load_config(config)?;
    if let Some(shape) = shape {
        config.initial_shape = shape;
    }

    let aim = match at {
        Some(id) => Some(
            model
                .lookup(id)
                .and_then(|node| node.leaf())
                .with_context(|| format!("`{id}` is not a leaf"))?,
        ),
        None => None,
    };

    let mut scene = Scene::new(HeadlessBackend::new(), model, config)?;
    let cursor = match aim {
        Some(leaf) => scene
            .camera()
            .project(scene.nodes().position(leaf))
            .context("leaf is behind the camera")?,
        None => cursor,
    };

    let hit = scene.pick(cursor)?;
    match u32::try_from(hit) {
        Ok(leaf) => println!("{}", scene.model().leaf(leaf).id),
        Err(_) => println!("none"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { input } => inspect(&input)?,
        Commands::Layout {
            input,
            shape,
            output,
            config,
        } => layout(&input, shape, output.as_deref(), config.as_deref())?,
        Commands::Pick {
            input,
            shape,
            x,
            y,
            at,
            config,
        } => pick(
            &input,
            shape,
            Vec2::new(x, y),
            at.as_deref(),
            config.as_deref(),
        )?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_layout_subcommand() {
        let cli = Cli::try_parse_from([
            "graphscape", "layout", "--input", "g.json", "--shape", "galaxy", "-o", "out.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Layout {
                input,
                shape,
                output,
                config,
            } => {
                assert_eq!(input, PathBuf::from("g.json"));
                assert_eq!(shape, Some(LayoutShape::Galaxy));
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert!(config.is_none());
            }
            _ => panic!("Expected Layout command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_shape() {
        assert!(Cli::try_parse_from(["graphscape", "layout", "-i", "g.json", "-s", "torus"]).is_err());
    }

    #[test]
    fn cli_parses_negative_cursor() {
        let cli =
            Cli::try_parse_from(["graphscape", "pick", "-i", "g.json", "--x", "-0.5", "--y", "0.25"])
                .unwrap();
        match cli.command {
            Commands::Pick { x, y, at, .. } => {
                assert_eq!((x, y), (-0.5, 0.25));
                assert!(at.is_none());
            }
            _ => panic!("Expected Pick command"),
        }
    }
}
