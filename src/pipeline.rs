// pipeline.rs — one end-to-end run.
//
//   Load → open device + build kernels → bin count → histogram → scan
//        → LUT → reproject → recombine → report → (save) → display
//
// Every step runs once, in order, and the first error ends the run.

use std::io::{self, Write};
use std::time::Instant;

use tracing::info;

use crate::color::recombine;
use crate::config::{prompt_bins, Engine, EqualizerConfig};
use crate::display;
use crate::error::EqualizeError;
use crate::gpu::{GpuDevice, GpuHistEq};
use crate::histeq::{self, BinCount, Equalization};
use crate::image::{Image, Raster};
use crate::loader::{self, LoadedImage};
use crate::profile::{Stage, StageProfile};
use crate::report;

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub bins: BinCount,
    pub input: Raster,
    pub output: Raster,
    pub equalization: Equalization,
    pub profiles: Vec<StageProfile>,
}

/// Run the whole pipeline for `config`.
pub fn run(config: &EqualizerConfig) -> Result<RunOutcome, EqualizeError> {
    let loaded = loader::load(&config.input)?;
    info!(
        path = %config.input.display(),
        width = loaded.width(),
        height = loaded.height(),
        colour = loaded.is_colour(),
        "image loaded"
    );

    let (bins, equalization, profiles) = match config.engine {
        Engine::Gpu => {
            let gpu = GpuDevice::new(config.platform, config.device)?;
            println!("Running on {}, {}", gpu.platform_name(), gpu.device_name());
            let kernels = GpuHistEq::new(&gpu)?;
            let bins = resolve_bins(config)?;
            let result = kernels.run(&gpu, &loaded.luma, bins)?;
            (bins, result.equalization, result.profiles)
        }
        Engine::Cpu => {
            println!("Running on CPU reference");
            let bins = resolve_bins(config)?;
            let (equalization, profiles) = equalize_timed(&loaded.luma, bins);
            (bins, equalization, profiles)
        }
    };

    let output = assemble_output(&loaded, equalization.output.clone());

    report::write_report(io::stdout().lock(), &equalization, &profiles)?;

    if let Some(path) = &config.output {
        loader::save(&output, path).map_err(|source| EqualizeError::Save {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "output written");
    }
    if let Some(path) = &config.histogram_csv {
        report::write_csv_file(path, &equalization).map_err(|source| EqualizeError::Report {
            path: path.clone(),
            source,
        })?;
    }

    if config.display {
        display::show_pair(&loaded.raster, &output)?;
    }

    Ok(RunOutcome {
        bins,
        input: loaded.raster,
        output,
        equalization,
        profiles,
    })
}

fn resolve_bins(config: &EqualizerConfig) -> Result<BinCount, EqualizeError> {
    match config.bins {
        Some(bins) => Ok(bins),
        None => {
            let bins = prompt_bins(io::stdin().lock(), io::stdout().lock())?;
            io::stdout().flush()?;
            Ok(bins)
        }
    }
}

/// Put the equalized luma back together with the source chroma.
pub fn assemble_output(loaded: &LoadedImage, luma: Image<u8>) -> Raster {
    match &loaded.chroma {
        Some(chroma) => Raster::Rgb(recombine(luma, chroma)),
        None => Raster::Gray(luma),
    }
}

/// The CPU reference stages, timed like the device stages.
pub fn equalize_timed(image: &Image<u8>, bins: BinCount) -> (Equalization, Vec<StageProfile>) {
    let mut profiles: Vec<StageProfile> = Stage::ALL.iter().map(|&s| StageProfile::new(s)).collect();

    let t = Instant::now();
    let histogram = histeq::histogram(image, bins);
    profiles[Stage::Histogram.index()].execute = t.elapsed();

    let t = Instant::now();
    let cumulative = histeq::cumulative(&histogram);
    profiles[Stage::Cumulative.index()].execute = t.elapsed();

    let t = Instant::now();
    let lut = histeq::lookup_table(&cumulative, bins);
    profiles[Stage::LookupTable.index()].execute = t.elapsed();

    let t = Instant::now();
    let output = histeq::reproject(image, &lut, bins);
    profiles[Stage::Reproject.index()].execute = t.elapsed();

    (
        Equalization {
            histogram,
            cumulative,
            lut,
            output,
        },
        profiles,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::RgbPlanes;

    #[test]
    fn test_timed_matches_reference() {
        let img = Image::from_vec(4, 4, (0..16).map(|i| (i * 9) as u8).collect());
        let bins = BinCount::new(32).unwrap();
        let (eq, profiles) = equalize_timed(&img, bins);
        assert_eq!(eq, histeq::equalize(&img, bins));
        assert_eq!(profiles.len(), 4);
        assert!(profiles.iter().all(|p| p.device_ns.is_none()));
    }

    #[test]
    fn test_gray_output_stays_gray() {
        let loaded = loader::from_raster(Raster::Gray(Image::filled(2, 2, 40)));
        let out = assemble_output(&loaded, Image::filled(2, 2, 90));
        assert_eq!(out, Raster::Gray(Image::filled(2, 2, 90)));
    }

    #[test]
    fn test_unchanged_luma_reproduces_colour() {
        let planes = RgbPlanes {
            r: Image::from_vec(2, 1, vec![200, 10]),
            g: Image::from_vec(2, 1, vec![100, 220]),
            b: Image::from_vec(2, 1, vec![50, 130]),
        };
        let loaded = loader::from_raster(Raster::Rgb(planes.clone()));
        let out = assemble_output(&loaded, loaded.luma.clone());
        let Raster::Rgb(back) = out else {
            panic!("colour input should give colour output");
        };
        for (a, b) in [(&planes.r, &back.r), (&planes.g, &back.g), (&planes.b, &back.b)] {
            for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
                assert!((*x as i32 - *y as i32).abs() <= 3);
            }
        }
    }
}
