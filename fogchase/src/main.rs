#![allow(clippy::cast_possible_truncation)]

mod options;

use advection::{Advection, Outcome, SessionConfig, SessionState, TransectSession};
use anyhow::{bail, Error as AnyError};
use clap::Parser;
use itertools::izip;
use log::{info, warn};
use options::{Cli, Command as CliCmd};
use raster::{GeoTransform, Raster};
use serde::Serialize;
use std::{io::Write, path::Path, sync::Arc};
use textplots::{Chart, Plot, Shape};
use transect::{sample, SampleSequence};

fn main() -> Result<(), AnyError> {
    let Cli {
        before,
        after,
        width,
        pixel_scale,
        elapsed,
        start,
        end,
        spacing,
        max_lag,
        min_correlation,
        memmap,
        cmd,
    } = Cli::parse();

    env_logger::init();

    let geo = GeoTransform::with_scale(pixel_scale);
    let load = |path: &Path| -> Result<Arc<Raster>, AnyError> {
        let raster = if memmap {
            Raster::memmap(path, width, geo)?
        } else {
            Raster::load(path, width, geo)?
        };
        match raster.min_max() {
            Some((lo, hi)) => info!("{}: {raster:?}, range: [{lo}, {hi}]", path.display()),
            None => warn!("{}: every sample is missing", path.display()),
        }
        Ok(Arc::new(raster))
    };
    let t1 = load(&before)?;
    let t2 = load(&after)?;

    let mut session = TransectSession::new(SessionConfig {
        spacing,
        max_lag,
        min_correlation,
        elapsed,
    });
    session.set_rasters(Arc::clone(&t1), Arc::clone(&t2));
    session.pointer_down(start.0);
    session.pointer_up(end.0);

    let advection = match session.state() {
        SessionState::Defined {
            outcome: Outcome::Ready(advection),
            ..
        } => advection.as_ref(),
        SessionState::Defined {
            outcome: Outcome::Failed(err),
            ..
        }
        | SessionState::Empty { notice: Some(err) } => return Err(err.clone().into()),
        state => bail!("no result: {state}"),
    };

    match cmd {
        CliCmd::Csv => print_csv(advection)?,
        CliCmd::Json => print_json(advection, &geo)?,
        CliCmd::Plot => plot_ascii(&advection.before, &advection.after),
        CliCmd::Speed => print_speed(advection),
        CliCmd::Diff => {
            let delta = t2.difference(&t1)?;
            let profile = sample(&delta, &advection.transect, spacing)?;
            print_diff(&profile)?;
        }
    };
    Ok(())
}

/// # Example with gnuplot
///
/// ```sh
/// cargo run -- --width=2500 --elapsed=0.1667 --start=900,200 --end=1200,260 t1.btd t2.btd csv | tr ',' ' ' > /tmp/plot && gnuplot -p -e "plot for [col=4:5] '/tmp/plot' using 1:col with lines"
/// ```
fn print_csv(advection: &Advection) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Distance,X,Y,Before,After")?;
    for (distance, point, before, after) in izip!(
        &advection.before.distances,
        &advection.before.points,
        &advection.before.values,
        &advection.after.values
    ) {
        let (x, y) = point.x_y();
        writeln!(stdout, "{distance},{x},{y},{before},{after}")?;
    }
    Ok(())
}

fn print_json(advection: &Advection, geo: &GeoTransform) -> Result<(), AnyError> {
    #[derive(Serialize)]
    struct JsonSample {
        distance: f64,
        pixel: [f64; 2],
        world: [f64; 2],
        before: Option<f64>,
        after: Option<f64>,
    }

    #[derive(Serialize)]
    struct JsonResult {
        start: [f64; 2],
        end: [f64; 2],
        lag: f64,
        correlation: f64,
        confident: bool,
        speed: f64,
        direction: String,
        distance: f64,
        elapsed: f64,
        heading: Option<f64>,
        samples: Vec<JsonSample>,
    }

    // JSON has no NaN.
    let finite = |v: f64| v.is_finite().then_some(v);
    let samples = izip!(
        &advection.before.distances,
        &advection.before.points,
        &advection.before.values,
        &advection.after.values
    )
    .map(|(&distance, &point, &before, &after)| JsonSample {
        distance,
        pixel: point.x_y().into(),
        world: geo.to_world(point).x_y().into(),
        before: finite(before),
        after: finite(after),
    })
    .collect();

    let result = JsonResult {
        start: advection.transect.start().x_y().into(),
        end: advection.transect.end().x_y().into(),
        lag: advection.displacement.lag,
        correlation: advection.displacement.correlation,
        confident: advection.displacement.confident,
        speed: advection.speed.speed,
        direction: format!("{:?}", advection.speed.direction),
        distance: advection.speed.distance,
        elapsed: advection.speed.elapsed,
        heading: advection.heading,
        samples,
    };
    let json = serde_json::to_string(&result)?;
    println!("{json}");
    Ok(())
}

fn plot_ascii(before: &SampleSequence, after: &SampleSequence) {
    let points = |seq: &SampleSequence| -> Vec<(f32, f32)> {
        seq.iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(d, v)| (d as f32, v as f32))
            .collect()
    };
    let (before, after) = (points(before), points(after));
    let max_distance = before.last().map_or(1.0, |&(d, _)| d);
    Chart::new(300, 150, 0.0, max_distance)
        .lineplot(&Shape::Lines(&before))
        .lineplot(&Shape::Lines(&after))
        .display();
}

fn print_speed(advection: &Advection) {
    let displacement = &advection.displacement;
    println!("{}", advection.speed);
    println!(
        "lag: {:.3} samples, ncc: {:.3}",
        displacement.lag, displacement.correlation
    );
    if let Some(heading) = advection.heading {
        println!("heading: {heading:.1}°");
    }
}

fn print_diff(profile: &SampleSequence) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Distance,DeltaBTD")?;
    for (distance, delta) in profile.iter() {
        writeln!(stdout, "{distance},{delta}")?;
    }
    let (lo, hi) = profile
        .values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    info!("delta BTD along transect: [{lo}, {hi}]");
    Ok(())
}
