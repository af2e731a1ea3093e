use std::{
    fs::File,
    io::{BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use osbforge::Scene;

#[derive(Parser, Debug)]
#[command(name = "osbforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a storyboard script from a scene document of sampled
    /// element states.
    Generate(GenerateArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output script path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
    }
}

fn read_scene(path: &Path) -> anyhow::Result<Scene> {
    let f = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
    let r = BufReader::new(f);
    let scene: Scene = serde_json::from_reader(r).with_context(|| "parse scene JSON")?;
    Ok(scene)
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let scene = read_scene(&args.in_path)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let file =
        File::create(&args.out).with_context(|| format!("create '{}'", args.out.display()))?;
    let mut out = BufWriter::new(file);
    let stats = scene.write_to(&mut out)?;
    out.flush()?;

    eprintln!(
        "wrote {} ({} elements, {} never visible)",
        args.out.display(),
        stats.written,
        stats.skipped
    );
    Ok(())
}
