//! Fourier optics versus geometric optics PSFs
//!
//! Simulates a randomly evolving set of Zernike aberrations and/or a frozen-flow
//! atmosphere and renders each frame with both Fourier and geometric optics.
//! The PSF moments of both renderers are saved to `<out>moments.pkl`.
//! The moments of a point-like PSF, e.g. the geometric optics PSF without
//! aberrations (`--sigma 0 --nlayers 0`), are left undefined.
//!
//! Usage:
//! ```
//! # optics only
//! cargo run --release -- --diam 8.36 --obscuration 0.61 --sigma 0.05 --nlayers 0
//! # atmosphere only
//! cargo run --release -- --diam 8.36 --obscuration 0.61 --sigma 0.0 --nlayers 6 --size 3.0
//! ```

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use phase_psf::{Builder, PickleSink, SimulationBuilder};

#[derive(Parser)]
#[command(name = "fft_vs_geom")]
#[command(about = "Fourier optics versus geometric optics PSFs")]
struct Args {
    /// Simulation parameters toml file, overridden by the other arguments
    #[arg(long)]
    config: Option<PathBuf>,
    /// Save the simulation parameters to a toml file
    #[arg(long)]
    save_config: Option<PathBuf>,
    /// Save each frame PSFs
    #[arg(long)]
    frames: bool,
    /// Random number seed [default: 1]
    #[arg(long)]
    seed: Option<u64>,
    /// Number of frames [default: 100]
    #[arg(short)]
    n: Option<usize>,
    /// Largest Zernike mode (Noll index) [default: 15]
    #[arg(long)]
    jmax: Option<usize>,
    /// Correlation length of the aberrations in frames [default: 4.0]
    #[arg(long)]
    ell: Option<f64>,
    /// RMS of the aberrations in waves at 500nm [default: 0.05];
    /// without turbulence, 0 gives point-like geometric PSFs with undefined moments
    #[arg(long)]
    sigma: Option<f64>,
    /// Fried parameter at 500nm in meters [default: 0.2]
    #[arg(long)]
    r0_500: Option<f64>,
    /// Number of turbulence layers [default: 0]
    #[arg(long)]
    nlayers: Option<usize>,
    /// Time step in seconds [default: 0.025]
    #[arg(long)]
    time_step: Option<f64>,
    /// Exposure time in seconds [default: time_step]
    #[arg(long)]
    exptime: Option<f64>,
    /// Phase screen size in meters [default: 102.4]
    #[arg(long)]
    screen_size: Option<f64>,
    /// Phase screen sampling in meters [default: 0.1]
    #[arg(long)]
    screen_scale: Option<f64>,
    /// Maximum wind speed in m/s [default: 20.0]
    #[arg(long)]
    max_speed: Option<f64>,
    /// Outer scale in meters [default: 25.0]
    #[arg(long = "L0")]
    l0: Option<f64>,
    /// Boiling factor, 1 for pure frozen flow [default: 1.0]
    #[arg(long)]
    alpha: Option<f64>,
    /// Wavelength in nm [default: 700.0]
    #[arg(long)]
    lam: Option<f64>,
    /// Telescope diameter in meters [default: 4.0]
    #[arg(long)]
    diam: Option<f64>,
    /// Linear fractional obscuration [default: 0.0]
    #[arg(long)]
    obscuration: Option<f64>,
    /// Number of struts [default: 0]
    #[arg(long)]
    nstruts: Option<usize>,
    /// Strut thickness as a fraction of the diameter [default: 0.05]
    #[arg(long)]
    strut_thick: Option<f64>,
    /// Angle of the first strut in degrees [default: 0.0]
    #[arg(long)]
    strut_angle: Option<f64>,
    /// Number of pixels across the images [default: 256]
    #[arg(long)]
    nx: Option<usize>,
    /// Image size in arcsec [default: 0.6]
    #[arg(long)]
    size: Option<f64>,
    /// Field angle of the source along x in arcsec [default: 0.0]
    #[arg(long)]
    theta_x: Option<f64>,
    /// Field angle of the source along y in arcsec [default: 0.0]
    #[arg(long)]
    theta_y: Option<f64>,
    /// Fourier optics pupil plane padding factor [default: 1.0]
    #[arg(long)]
    pad_factor: Option<f64>,
    /// Fourier optics pupil plane oversampling factor [default: 1.0]
    #[arg(long)]
    oversampling: Option<f64>,
    /// Geometric optics pupil plane oversampling factor [default: 1.0]
    #[arg(long)]
    geom_oversampling: Option<f64>,
    /// Number of photons per frame [default: 100000]
    #[arg(long)]
    n_photons: Option<usize>,
    /// Number of frames rendered in parallel [default: number of threads]
    #[arg(long)]
    batch_size: Option<usize>,
    /// Output path prefix [default: output/fft_vs_geom_]
    #[arg(long)]
    out: Option<String>,
}

macro_rules! set {
    ($arg:expr => $field:expr) => {
        if let Some(value) = $arg {
            $field = value;
        }
    };
}

impl Args {
    fn into_builder(self) -> anyhow::Result<SimulationBuilder> {
        let mut builder = match &self.config {
            Some(path) => SimulationBuilder::load(path)?,
            None => SimulationBuilder::default(),
        };
        set!(self.seed => builder.seed);
        set!(self.n => builder.aberrations.n);
        set!(self.jmax => builder.aberrations.jmax);
        set!(self.ell => builder.aberrations.ell);
        set!(self.sigma => builder.aberrations.sigma);
        set!(self.r0_500 => builder.atmosphere.r0_500);
        set!(self.nlayers => builder.atmosphere.n_layer);
        set!(self.time_step => builder.atmosphere.time_step);
        set!(self.screen_size => builder.atmosphere.screen_size);
        set!(self.screen_scale => builder.atmosphere.screen_scale);
        set!(self.max_speed => builder.atmosphere.max_speed);
        set!(self.l0 => builder.atmosphere.oscale);
        set!(self.alpha => builder.atmosphere.alpha);
        set!(self.lam => builder.lam);
        set!(self.diam => builder.pupil.diameter);
        set!(self.obscuration => builder.pupil.obscuration);
        set!(self.nstruts => builder.pupil.n_strut);
        set!(self.strut_thick => builder.pupil.strut_thickness);
        set!(self.strut_angle.map(f64::to_radians) => builder.pupil.strut_angle);
        set!(self.nx => builder.nx);
        set!(self.size => builder.size);
        set!(self.theta_x => builder.field_angle[0]);
        set!(self.theta_y => builder.field_angle[1]);
        set!(self.pad_factor => builder.pad_factor);
        set!(self.oversampling => builder.oversampling);
        set!(self.geom_oversampling => builder.geom_oversampling);
        set!(self.n_photons => builder.n_photons);
        set!(self.out => builder.out);
        if self.exptime.is_some() {
            builder.exptime = self.exptime;
        }
        if self.batch_size.is_some() {
            builder.batch_size = self.batch_size;
        }
        Ok(builder)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let save_config = args.save_config.clone();
    let save_frames = args.frames;
    let builder = args.into_builder()?;
    if let Some(path) = save_config {
        builder.save(&path)?;
        log::info!("simulation parameters saved to {:?}", path);
    }

    let mut sink = PickleSink::new(builder.out.clone())?.save_frames(save_frames);
    let mut sim = builder.build()?;

    let pb = ProgressBar::new(sim.n_frame() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    let series = sim.run_with(&mut sink, Some(pb))?;

    let sizes: Vec<(f64, f64)> = series
        .iter()
        .filter_map(|(mf, mg)| mf.rsqr().zip(mg.rsqr()))
        .collect();
    if sizes.is_empty() {
        println!("point-like PSFs in all the frames");
    } else {
        let n = sizes.len() as f64;
        let (mean_fourier, mean_geometric) = sizes
            .iter()
            .fold((0., 0.), |(f, g), (rf, rg)| (f + rf / n, g + rg / n));
        println!(
            "mean r^2 over {} frames: Fourier optics {:.3}, geometric optics {:.3} (pixel^2)",
            sizes.len(),
            mean_fourier,
            mean_geometric
        );
    }

    Ok(())
}
