use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use texgraph::{
    CachePolicy, CacheStrategy, GraphBuilder, PackOpts, PackStats, RecipeFile, RenderContext,
    RetryPolicy, SvgRasterizer, TaskKind,
};

#[derive(Parser, Debug)]
#[command(name = "texgraph", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every texture in a recipe to PNG files.
    Generate(GenerateArgs),
    /// Build the task graph and print its statistics without rendering.
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
struct RecipeArgs {
    /// Recipe JSON.
    #[arg(long)]
    recipe: PathBuf,

    /// Directory holding `<source>.svg` files. Defaults to the recipe's directory.
    #[arg(long)]
    svg_dir: Option<PathBuf>,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = 32)]
    size: u32,

    /// Cache strategy for intermediate results.
    #[arg(long, value_enum, default_value_t = CacheArg::Strong)]
    cache: CacheArg,

    /// Entries kept by the shared LRU (`--cache lru` only).
    #[arg(long, default_value_t = 1024)]
    lru_capacity: usize,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    recipe: RecipeArgs,

    /// Output directory.
    #[arg(long)]
    out: PathBuf,

    /// Render worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Scratch surfaces checked out at once.
    #[arg(long, default_value_t = 64)]
    pool_surfaces: usize,

    /// Failed rounds tolerated before giving up. 0 retries forever.
    #[arg(long, default_value_t = 4)]
    max_attempts: u32,

    /// Pause between retry rounds, in milliseconds.
    #[arg(long, default_value_t = 50)]
    backoff_ms: u64,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    #[command(flatten)]
    recipe: RecipeArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CacheArg {
    None,
    Strong,
    Weak,
    Lru,
}

impl RecipeArgs {
    fn cache_policy(&self) -> CachePolicy {
        let strategy = match self.cache {
            CacheArg::None => CacheStrategy::None,
            CacheArg::Strong => CacheStrategy::Strong,
            CacheArg::Weak => CacheStrategy::Weak,
            CacheArg::Lru => CacheStrategy::SharedLru {
                capacity: self.lru_capacity,
            },
        };
        CachePolicy::new(strategy)
    }

    fn load(&self) -> anyhow::Result<(RecipeFile, Arc<SvgRasterizer>)> {
        let recipe = RecipeFile::from_path(&self.recipe)
            .with_context(|| format!("load recipe '{}'", self.recipe.display()))?;
        let svg_dir = self.svg_dir.clone().unwrap_or_else(|| {
            self.recipe
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        let rasterizer = Arc::new(SvgRasterizer::new(svg_dir).with_system_fonts());
        Ok((recipe, rasterizer))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args).await,
        Command::Plan(args) => cmd_plan(args),
    }
}

async fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let (recipe, rasterizer) = args.recipe.load()?;
    let opts = PackOpts {
        out_dir: args.out.clone(),
        tile_size: args.recipe.size,
        threads: args.threads,
        pool_surfaces: args.pool_surfaces,
        cache: args.recipe.cache_policy(),
        retry: RetryPolicy {
            max_attempts: (args.max_attempts > 0).then_some(args.max_attempts),
            backoff: Duration::from_millis(args.backoff_ms),
        },
    };

    let report = texgraph::generate_pack(opts, recipe.materials(), rasterizer)
        .await
        .with_context(|| format!("generate pack into '{}'", args.out.display()))?;

    let totals = report.stats.total();
    eprintln!(
        "wrote {} file set(s) to {} in {} round(s): {} tasks, {} deduplicated, {} launched, {} failed",
        report.driver.written,
        args.out.display(),
        report.driver.rounds,
        totals.created,
        totals.deduplicated,
        totals.launched,
        totals.failed,
    );
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let (recipe, rasterizer) = args.recipe.load()?;
    let ctx = RenderContext::new(rasterizer, args.recipe.size, Some(1), Default::default())?;
    let stats = Arc::new(PackStats::new());
    let builder = GraphBuilder::new(
        Arc::new(ctx),
        Arc::clone(&stats),
        "out",
        args.recipe.cache_policy(),
    );
    for material in recipe.materials() {
        material
            .build(&builder)
            .with_context(|| format!("build material '{}'", material.name()))?;
    }
    let graph = builder.finish();

    let snapshot = stats.snapshot();
    println!("outputs: {}", graph.len());
    for kind in TaskKind::ALL {
        let s = snapshot.kind(kind);
        println!(
            "{:>8}: {} created, {} deduplicated, {} simplified",
            kind.as_str(),
            s.created,
            s.deduplicated,
            s.simplified
        );
    }
    Ok(())
}
