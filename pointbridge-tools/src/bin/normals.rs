#![warn(clippy::all)]

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use clap::{value_t, App, Arg};
use log::info;
use pointbridge_algorithms::search::Neighborhood;
use pointbridge_core::nalgebra::Vector3;
use pointbridge_ffi::{BridgeConfig, DefaultBackend, PointBackend};
use pointbridge_io::base::read_all;

struct Args {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub neighborhood: Neighborhood,
    pub config: BridgeConfig,
}

fn get_args() -> Result<Args> {
    let matches = App::new("pointbridge normals")
        .version("0.1")
        .about("Estimates surface normals for a PCD file and writes them as text, one 'nx ny nz curvature' line per point")
        .arg(Arg::with_name("INPUT").short("i").takes_value(true).value_name("INPUT").help("Input PCD file").required(true))
        .arg(Arg::with_name("OUTPUT").short("o").takes_value(true).value_name("OUTPUT").help("Output text file").required(true))
        .arg(Arg::with_name("K").short("k").takes_value(true).value_name("K").help("Number of nearest neighbours").conflicts_with("RADIUS").required_unless("RADIUS"))
        .arg(Arg::with_name("RADIUS").short("r").long("radius").takes_value(true).value_name("RADIUS").help("Search radius"))
        .arg(Arg::with_name("THREADS").short("t").long("threads").takes_value(true).value_name("THREADS").help("Number of worker threads, 0 for one per core"))
        .arg(Arg::with_name("VIEWPOINT").long("viewpoint").takes_value(true).number_of_values(3).allow_hyphen_values(true).value_names(&["X", "Y", "Z"]).help("Normals are flipped to face this point"))
        .get_matches();

    let input_file = PathBuf::from(
        matches
            .value_of("INPUT")
            .ok_or_else(|| anyhow!("Missing input file"))?,
    );
    let output_file = PathBuf::from(
        matches
            .value_of("OUTPUT")
            .ok_or_else(|| anyhow!("Missing output file"))?,
    );
    let k = if matches.is_present("K") {
        value_t!(matches, "K", i32)?
    } else {
        0
    };
    let radius = if matches.is_present("RADIUS") {
        value_t!(matches, "RADIUS", f32)?
    } else {
        0.0
    };
    let neighborhood = Neighborhood::from_parameters(k, radius)?;

    let mut config = BridgeConfig::from_env();
    if matches.is_present("THREADS") {
        config.threads = value_t!(matches, "THREADS", usize)?;
    }
    if let Some(values) = matches.values_of("VIEWPOINT") {
        let coordinates = values
            .map(|value| value.parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .context("Viewpoint coordinates must be numbers")?;
        config.viewpoint = Vector3::from_column_slice(&coordinates);
    }

    Ok(Args {
        input_file,
        output_file,
        neighborhood,
        config,
    })
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = get_args()?;
    let backend = DefaultBackend::new(args.config);

    let cloud = read_all(&args.input_file)?;
    info!("Read {} points from {}", cloud.len(), args.input_file.display());

    let t_start = Instant::now();
    let index = backend.build_search_index(&cloud);
    let normals = backend.estimate_normals(&cloud, &index, args.neighborhood);
    info!(
        "Estimated {} normals in {:.2}s",
        normals.len(),
        t_start.elapsed().as_secs_f64()
    );

    let file = File::create(&args.output_file)
        .with_context(|| format!("Could not open file {} for writing", args.output_file.display()))?;
    let mut writer = BufWriter::new(file);
    for normal in normals.iter() {
        writeln!(
            writer,
            "{} {} {} {}",
            normal.normal_x, normal.normal_y, normal.normal_z, normal.curvature
        )?;
    }
    writer.flush()?;
    info!("Wrote file {}", args.output_file.display());

    Ok(())
}
