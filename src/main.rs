use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, Context as _};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use motion_compositor::gallery::{self, CategoryFilter, GalleryQuery};
use motion_compositor::host::{AssignOutcome, FrameMarkupBackend, PreviewHost};
use motion_compositor::store::{ContentStore, MemoryStore};
use motion_compositor::{compose, compose_exportable, AnimationRecord, ComposeOptions, ParameterAssignment};

#[derive(Parser, Debug)]
#[command(name = "motion-compositor", version)]
struct Cli {
    /// JSON array of animation records.
    #[arg(long, global = true, default_value = "animations.json")]
    records: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List records, optionally filtered.
    List(ListArgs),
    /// Compose the live-preview document for a record.
    Compose(ComposeArgs),
    /// Compose the readable export document for a record.
    Export(ExportArgs),
    /// Print sandboxed iframe markup embedding a record's preview.
    Frame(FrameArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Case-insensitive match on name and description.
    #[arg(long, default_value = "")]
    search: String,

    /// Category label, or "All".
    #[arg(long, default_value = "All")]
    category: String,

    /// Only the featured strip.
    #[arg(long)]
    featured: bool,
}

#[derive(Args, Debug)]
struct ParamArgs {
    /// Record id.
    id: String,

    /// Parameter override, `name=value`. Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,
}

#[derive(Args, Debug)]
struct ComposeArgs {
    #[command(flatten)]
    params: ParamArgs,

    /// Click-through thumbnail variant.
    #[arg(long)]
    thumbnail: bool,

    /// Write to a file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    params: ParamArgs,

    /// Write to a file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    params: ParamArgs,

    /// Click-through thumbnail variant; the frame itself ignores pointer input.
    #[arg(long)]
    thumbnail: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("[motion-compositor] {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = MemoryStore::load(&cli.records)
        .await
        .with_context(|| format!("load records '{}'", cli.records.display()))?;

    match cli.cmd {
        Command::List(args) => cmd_list(&store, args),
        Command::Compose(args) => {
            let (record, assignment) = resolve(&store, &args.params)?;
            let options = ComposeOptions {
                thumbnail_mode: args.thumbnail,
                ..ComposeOptions::default()
            };
            let document = compose(&record, &assignment, &options);
            emit(document.as_str(), args.out.as_deref()).await
        }
        Command::Export(args) => {
            let (record, assignment) = resolve(&store, &args.params)?;
            emit(&compose_exportable(&record, &assignment), args.out.as_deref()).await
        }
        Command::Frame(args) => cmd_frame(&store, args),
    }
}

fn cmd_list(store: &MemoryStore, args: ListArgs) -> anyhow::Result<()> {
    let category = CategoryFilter::from_label(&args.category)
        .ok_or_else(|| anyhow!("unknown category '{}'", args.category))?;
    let records = store.list()?;
    let pool = if args.featured {
        gallery::featured(&records)
    } else {
        &records[..]
    };
    let query = GalleryQuery::new().with_search(args.search).with_category(category);
    for record in query.filter(pool) {
        println!(
            "{}\t{}\t{}\t{}",
            record.id, record.name, record.category, record.complexity
        );
    }
    Ok(())
}

fn cmd_frame(store: &MemoryStore, args: FrameArgs) -> anyhow::Result<()> {
    let (record, assignment) = resolve(store, &args.params)?;
    let options = ComposeOptions {
        thumbnail_mode: args.thumbnail,
        ..ComposeOptions::default()
    };
    let mut backend = FrameMarkupBackend::new(record.name.clone());
    if args.thumbnail {
        backend = backend.click_through();
    }
    let mut host = PreviewHost::new(backend);
    let AssignOutcome::Mounting(ticket) = host.assign(compose(&record, &assignment, &options))? else {
        return Err(anyhow!("preview host did not mount the document"));
    };
    let frame = host
        .backend()
        .frame(ticket)
        .ok_or_else(|| anyhow!("no frame for {ticket}"))?;
    println!("{frame}");
    Ok(())
}

/// Look up the record and apply `--set` overrides strictly.
fn resolve(store: &MemoryStore, args: &ParamArgs) -> anyhow::Result<(AnimationRecord, ParameterAssignment)> {
    let record = store.require(&args.id)?;
    let mut assignment = ParameterAssignment::new();
    for pair in &args.set {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("--set expects NAME=VALUE, got '{pair}'"))?;
        assignment.set_raw(&record, name.trim(), value.trim())?;
    }
    Ok((record, assignment))
}

async fn emit(text: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("write '{}'", path.display()))?;
        }
        None => print!("{text}"),
    }
    Ok(())
}
