use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Result};
use clap::Parser;
use log::{info, warn};
use rand::SeedableRng;
use rand_pcg::Pcg64;

use ct_recon::{
    compute_metrics, phantom, reconstruct, uniform_angles, FilterKernel, Projector, RayProjector,
    RotationProjector,
};

////////////////////////////////////////////////////////////////////////
// Main entry point
//

/// Simulate a parallel-beam CT acquisition and reconstruct it with
/// filtered back-projection.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Phantom resolution (pixels per side).
    #[arg(long, default_value_t = 256)]
    res: usize,
    /// Number of projection angles, spread uniformly over [0, 180).
    #[arg(long, default_value_t = 180)]
    angles: usize,
    /// Reconstruction filter: ramp, shepp-logan, cosine or hamming.
    #[arg(long, default_value = "ramp")]
    filter: FilterKernel,
    /// Gaussian noise level as a fraction of the sinogram maximum
    /// (0 disables, 0.0 to 0.1 recommended).
    #[arg(long, default_value_t = 0.0)]
    noise: f64,
    /// Seed for the noise generator (for reproducibility).
    #[arg(long)]
    seed: Option<u64>,
    /// Use the educational rotate-then-sum projector instead of the
    /// ray-driven one.
    #[arg(long)]
    manual: bool,
    /// Write the reconstructed image to this PNG file.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Write the sinogram to this PNG file.
    #[arg(long)]
    out_sinogram: Option<PathBuf>,
    /// Write the phantom to this PNG file.
    #[arg(long)]
    out_phantom: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    const DEFAULT_SEED: u64 = 42;

    ensure!(
        opts.seed.is_none() || opts.noise > 0.0,
        "--seed can only be used with --noise"
    );
    if opts.res > 1024 {
        warn!("high resolution ({}) may be slow", opts.res);
    }
    if opts.angles < 10 {
        warn!(
            "very low angle count ({}) will cause streak artifacts",
            opts.angles
        );
    }

    let start = Instant::now();

    let image = phantom(opts.res)?;
    let theta = uniform_angles(opts.angles);

    info!("projecting with {} angles", opts.angles);
    let mut sinogram = if opts.manual {
        RotationProjector.project(&image, &theta)?
    } else {
        RayProjector.project(&image, &theta)?
    };

    if opts.noise > 0.0 {
        info!("adding {}% noise to sinogram", opts.noise * 100.0);
        let mut rng = Pcg64::seed_from_u64(opts.seed.unwrap_or(DEFAULT_SEED));
        sinogram = sinogram.add_noise(&mut rng, opts.noise);
    }

    info!("reconstructing using '{}' filter", opts.filter);
    let reconstruction = reconstruct(&sinogram, opts.filter)?;

    let metrics = compute_metrics(&image, &reconstruction)?;

    println!("==============================");
    println!("CT RECONSTRUCTION COMPLETE");
    println!("Time: {:.2}s", start.elapsed().as_secs_f64());
    println!("MSE:  {:.5}", metrics.mse);
    println!("SSIM: {:.5}", metrics.ssim);
    println!("==============================");

    if let Some(path) = &opts.out_phantom {
        image.save(path)?;
        info!("phantom saved to {}", path.display());
    }
    if let Some(path) = &opts.out_sinogram {
        sinogram.to_image().save(path)?;
        info!("sinogram saved to {}", path.display());
    }
    if let Some(path) = &opts.out {
        reconstruction.save(path)?;
        info!("reconstruction saved to {}", path.display());
    }

    Ok(())
}
