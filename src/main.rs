use clap::{Args, Parser, Subcommand};
use rainbow_readfile::{read, ReadOptions, ReadResult};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rainbow-read", about = "Inspect rainbow imager PGM files")]
#[command(version)]
struct Cli {
    /// Log decode decisions (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ReadArgs {
    /// Input files (.pgm or .pgm.gz), read in the given order
    #[arg(required = true, num_args = 1..)]
    input: Vec<PathBuf>,
    /// Number of parallel decode workers
    #[arg(short, long, default_value = "1")]
    workers: usize,
    /// Keep only the first frame of each file
    #[arg(long)]
    first_frame: bool,
    /// Skip metadata extraction
    #[arg(long)]
    no_metadata: bool,
    /// Do not log failed files as warnings
    #[arg(short, long)]
    quiet: bool,
}

impl ReadArgs {
    fn options(&self) -> ReadOptions {
        ReadOptions {
            workers:     self.workers,
            first_frame: self.first_frame,
            no_metadata: self.no_metadata,
            quiet:       self.quiet,
        }
    }

    fn run(&self) -> Result<ReadResult, Box<dyn std::error::Error>> {
        Ok(read(self.input.clone(), &self.options())?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show cube shape, digest and problematic files
    Info(ReadArgs),
    /// Print per-frame metadata as JSON
    Meta(ReadArgs),
    /// Print min / max / mean for every retained frame
    Frames(ReadArgs),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info(args) => {
            let result = args.run()?;
            let (h, w, d) = result.cube.shape();
            println!("── rainbow PGM read ────────────────────────────────────");
            println!("  Files          {}", args.input.len());
            println!("  Shape          ({h}, {w}, {d})");
            println!("  Frames         {}", result.frame_count());
            println!("  Digest         {}", result.digest());
            println!("  Problematic    {}", result.problematic.len());
            for p in &result.problematic {
                println!("    {} [{:?}] {}", p.path.display(), p.kind, p.reason);
            }
        }

        // ── Meta ─────────────────────────────────────────────────────────────
        Commands::Meta(args) => {
            let result = args.run()?;
            let doc = serde_json::json!({
                "metadata":          result.metadata,
                "problematic_files": result.problematic,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }

        // ── Frames ───────────────────────────────────────────────────────────
        Commands::Frames(args) => {
            let result = args.run()?;
            println!("{:>6} {:>8} {:>8} {:>10}", "Frame", "Min", "Max", "Mean");
            for (k, frame) in result.cube.frames().enumerate() {
                let min  = frame.iter().copied().min().unwrap_or(0);
                let max  = frame.iter().copied().max().unwrap_or(0);
                let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / frame.len().max(1) as f64;
                println!("{k:>6} {min:>8} {max:>8} {mean:>10.2}");
            }
            for p in &result.problematic {
                eprintln!("skipped {}: {}", p.path.display(), p.reason);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}
