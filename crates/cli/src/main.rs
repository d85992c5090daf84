use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geodesics::api::{GeodesicOptimizer, OptimizerState};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::SubscriberBuilder;

mod outputs;
mod provenance;
mod settings;
mod store;
mod tables;

use provenance::Payload;
use settings::{DynModel, ModelKind, RuleArg, RunSettings};

#[derive(Parser)]
#[command(name = "geodesic")]
#[command(about = "Representational geodesics between two images")]
struct Cmd {
    /// Optional run label; propagated to provenance sidecars and logs
    #[arg(long)]
    tag: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Optimize a geodesic between a random image and its translation
    Run {
        #[arg(long, value_enum, default_value_t = ModelKind::LinearTanh)]
        model: ModelKind,
        #[arg(long, default_value_t = 32)]
        width: usize,
        /// Representation size of the linear models
        #[arg(long, default_value_t = 16)]
        features: usize,
        /// Circular shift between the endpoints
        #[arg(long, default_value_t = 4)]
        shift: usize,
        #[arg(long, default_value_t = 10)]
        n_steps: usize,
        #[arg(long, default_value_t = 1000)]
        max_iter: usize,
        #[arg(long, default_value_t = 1e-3)]
        step_size: f64,
        #[arg(long, value_enum, default_value_t = RuleArg::Amsgrad)]
        rule: RuleArg,
        /// Pixel-change tolerance (default: automatic from the pixelfade norm)
        #[arg(long)]
        tol: Option<f64>,
        /// Also stop on relative loss decrease below this value
        #[arg(long)]
        relative_tol: Option<f64>,
        #[arg(long, default_value_t = 50)]
        patience: usize,
        /// Start from a Brownian bridge with this largest frame norm
        #[arg(long)]
        bridge_norm: Option<f64>,
        /// Multiply the summed step energy by n_steps
        #[arg(long)]
        scaled_energy: bool,
        #[arg(long, default_value_t = 0.0)]
        range_lambda: f64,
        /// Halve the learning rate every this many iterations
        #[arg(long)]
        halve_every: Option<usize>,
        #[arg(long, default_value_t = 10)]
        store_progress: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value = "data/geodesic")]
        out: PathBuf,
        /// Write history as Parquet instead of CSV
        #[arg(long)]
        parquet: bool,
    },
    /// Continue from a checkpoint.json
    Resume {
        #[arg(long)]
        checkpoint: PathBuf,
        /// New total iteration cap
        #[arg(long)]
        max_iter: usize,
        /// Output directory (default: the checkpoint's directory)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        parquet: bool,
    },
    /// Summarize a history table (CSV or Parquet)
    Summary {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print a provenance JSON block
    Report,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Run {
            model,
            width,
            features,
            shift,
            n_steps,
            max_iter,
            step_size,
            rule,
            tol,
            relative_tol,
            patience,
            bridge_norm,
            scaled_energy,
            range_lambda,
            halve_every,
            store_progress,
            seed,
            out,
            parquet,
        } => {
            let settings = RunSettings {
                model,
                width,
                features,
                shift,
                n_steps,
                max_iterations: max_iter,
                step_size,
                rule,
                tol,
                relative_tol,
                patience,
                bridge_norm,
                scaled_energy,
                range_lambda,
                lr_decay: halve_every.map(|every| (0.5, every)),
                store_progress,
                seed,
            };
            run(settings, &out, parquet, cmd.tag)
        }
        Action::Resume {
            checkpoint,
            max_iter,
            out,
            parquet,
        } => resume(&checkpoint, max_iter, out, parquet, cmd.tag),
        Action::Summary { input } => summary(&input),
        Action::Report => report(cmd.tag),
    }
}

fn run(settings: RunSettings, out: &Path, parquet: bool, tag: Option<String>) -> Result<()> {
    tracing::info!(
        model = ?settings.model,
        width = settings.width,
        n_steps = settings.n_steps,
        rule = ?settings.rule,
        seed = settings.seed,
        out = %out.display(),
        tag = ?tag,
        "run"
    );
    let (a, b) = settings.endpoints()?;
    let mut opt = GeodesicOptimizer::new(settings.model(), &a, &b, settings.n_steps, &settings.cfg())
        .context("building optimizer")?;
    drive(&mut opt, &settings)?;
    outputs::write_outputs(&opt, &settings, out, parquet, tag)?;
    Ok(())
}

fn resume(
    checkpoint: &Path,
    max_iter: usize,
    out: Option<PathBuf>,
    parquet: bool,
    tag: Option<String>,
) -> Result<()> {
    let (ckpt, mut settings) = store::load_checkpoint(checkpoint)?;
    if max_iter < ckpt.iteration {
        bail!(
            "max_iter {max_iter} is below the {} iterations already done",
            ckpt.iteration
        );
    }
    settings.max_iterations = max_iter;
    let out = match out {
        Some(dir) => dir,
        None => checkpoint
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    tracing::info!(
        checkpoint = %checkpoint.display(),
        from_iteration = ckpt.iteration,
        max_iter,
        out = %out.display(),
        tag = ?tag,
        "resume"
    );
    let mut opt = GeodesicOptimizer::resume(settings.model(), ckpt, &settings.cfg())
        .context("resuming from checkpoint")?;
    drive(&mut opt, &settings)?;
    outputs::write_outputs(&opt, &settings, &out, parquet, tag)?;
    Ok(())
}

fn drive(opt: &mut GeodesicOptimizer<DynModel>, settings: &RunSettings) -> Result<()> {
    let budget = settings.max_iterations.saturating_sub(opt.iteration());
    let outcome = opt.run(budget).context("optimizing")?;
    let final_loss = outcome.history.losses.last().copied();
    tracing::info!(
        state = outcome.state.as_str(),
        steps = outcome.steps,
        iterations = opt.iteration(),
        final_loss = ?final_loss,
        "done"
    );
    if outcome.state == OptimizerState::Running {
        tracing::warn!("stopped while still running; resume with a larger --max-iter");
    }
    Ok(())
}

fn summary(input: &Path) -> Result<()> {
    let df = tables::read_table(input)?;
    let (rows, cols) = df.shape();
    tracing::info!(
        input = %input.display(),
        rows,
        cols,
        final_loss = ?tables::last_f64(&df, "loss"),
        final_energy = ?tables::last_f64(&df, "energy"),
        final_pixel_change = ?tables::last_f64(&df, "pixel_change_norm"),
        "summary"
    );
    println!("{}", df.tail(Some(5)));
    Ok(())
}

fn report(tag: Option<String>) -> Result<()> {
    let doc = provenance::report(&Payload::new(json!({})).with_tag(tag));
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
