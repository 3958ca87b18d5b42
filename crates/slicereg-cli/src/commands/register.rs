use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use slicereg_core::align::registrar::{PyramidRegistrar, Registrar};
use slicereg_core::align::transform::apply;
use slicereg_core::config::{MotionModel, PyramidConfig, RegistrationConfig};
use slicereg_core::io::image_io::{load_image, save_image};

#[derive(Clone, ValueEnum)]
pub enum ModelArg {
    Rigid,
    Affine,
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Image to move
    pub source: PathBuf,

    /// Image to align onto
    pub target: PathBuf,

    /// Motion model
    #[arg(long, value_enum, default_value = "rigid")]
    pub model: ModelArg,

    /// Finest pyramid level to solve at
    #[arg(long, default_value = "0")]
    pub min_level: usize,

    /// Pyramid depth (derived from the image size if omitted)
    #[arg(long)]
    pub depth: Option<usize>,

    /// Write the aligned source image here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &RegisterArgs) -> Result<()> {
    let source = load_image(&args.source)
        .with_context(|| format!("Failed to read {}", args.source.display()))?;
    let target = load_image(&args.target)
        .with_context(|| format!("Failed to read {}", args.target.display()))?;

    let model = match args.model {
        ModelArg::Rigid => MotionModel::Rigid,
        ModelArg::Affine => MotionModel::Affine,
    };
    let registrar = PyramidRegistrar::with_model(model, &RegistrationConfig::default());
    let schedule = PyramidConfig {
        depth: args.depth,
        min_level: args.min_level,
        ..Default::default()
    }
    .schedule_for(target.dim())?;

    println!(
        "Registering {} to {} ({}, depth {}, min level {})",
        args.source.display(),
        args.target.display(),
        registrar.model(),
        schedule.depth,
        schedule.min_level
    );
    let result = registrar.register(&source, &target, &schedule)?;

    println!("  Transform:  {}", result.transform);
    println!("  MSE:        {:.6}", result.mse);
    println!("  Iterations: {}", result.iterations);
    println!("  Status:     {:?}", result.status);

    if let Some(ref path) = args.output {
        save_image(&apply(&result.transform, &source), path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}
