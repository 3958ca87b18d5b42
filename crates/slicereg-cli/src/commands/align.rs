use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use slicereg_core::config::AlignConfig;
use slicereg_core::io::image_io::{load_stack, save_image};
use slicereg_core::stack::MethodRegistry;

use crate::summary::{print_stack_summary, print_transforms};

#[derive(Args)]
pub struct AlignArgs {
    /// Slice images in stack order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Alignment config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Index of the reference slice
    #[arg(long)]
    pub reference: Option<usize>,

    /// Register every slice to the reference instead of its neighbour
    #[arg(long)]
    pub absolute: bool,

    /// Registration method (see `slicereg methods`)
    #[arg(long)]
    pub method: Option<String>,

    /// Finest pyramid level to solve at
    #[arg(long)]
    pub min_level: Option<usize>,

    /// Pyramid depth (derived from the image size if omitted)
    #[arg(long)]
    pub depth: Option<usize>,

    /// Output directory
    #[arg(short, long, default_value = "aligned")]
    pub output: PathBuf,
}

pub fn run(args: &AlignArgs) -> Result<()> {
    let config = build_config(args)?;
    let outputs = output_paths(&args.output, &args.files)?;

    println!("Reading {} slices...", args.files.len());
    let images = load_stack(&args.files).context("Failed to load stack")?;
    print_stack_summary(&config, images.len());

    let registry = MethodRegistry::with_defaults(&config.registration);
    let pb = ProgressBar::new(images.len().saturating_sub(1) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Aligning [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let aligned = registry.align_with_progress(&images, &config.stack, |done| {
        pb.set_position(done as u64);
    })?;
    pb.finish();

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    for (out, image) in outputs.iter().zip(&aligned.images) {
        save_image(image, out).with_context(|| format!("Failed to write {}", out.display()))?;
    }

    print_transforms(&args.files, &aligned);
    println!("Saved {} slices to {}", aligned.images.len(), args.output.display());
    Ok(())
}

fn build_config(args: &AlignArgs) -> Result<AlignConfig> {
    let mut config: AlignConfig = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid alignment config")?
    } else {
        AlignConfig::default()
    };

    if let Some(reference) = args.reference {
        config.stack.reference_index = reference;
    }
    if args.absolute {
        config.stack.relative = false;
    }
    if let Some(ref method) = args.method {
        config.stack.method = method.clone();
    }
    if let Some(min_level) = args.min_level {
        config.stack.pyramid.min_level = min_level;
    }
    if args.depth.is_some() {
        config.stack.pyramid.depth = args.depth;
    }
    Ok(config)
}

/// `<dir>/<stem>.tiff` for each input. Inputs sharing a stem would overwrite
/// each other, so they are rejected before any work is done.
fn output_paths(dir: &Path, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut outputs: Vec<PathBuf> = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("slice_{index:04}"));
        let out = dir.join(format!("{stem}.tiff"));
        if let Some(first) = outputs.iter().position(|existing| *existing == out) {
            bail!(
                "{} and {} would both be written to {}",
                inputs[first].display(),
                input.display(),
                out.display()
            );
        }
        outputs.push(out);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_keep_stems() {
        let inputs = vec![PathBuf::from("a/s01.png"), PathBuf::from("b/s02.tif")];
        let outputs = output_paths(Path::new("out"), &inputs).unwrap();
        assert_eq!(
            outputs,
            vec![PathBuf::from("out/s01.tiff"), PathBuf::from("out/s02.tiff")]
        );
    }

    #[test]
    fn test_duplicate_stems_rejected() {
        let inputs = vec![
            PathBuf::from("day1/slice.tif"),
            PathBuf::from("day2/slice.png"),
        ];
        let err = output_paths(Path::new("out"), &inputs).unwrap_err();
        assert!(err.to_string().contains("day2"), "{err}");
    }
}
