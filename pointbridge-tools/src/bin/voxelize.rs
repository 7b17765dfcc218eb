#![warn(clippy::all)]

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{value_t, App, Arg};
use log::info;
use pointbridge_ffi::{BridgeConfig, DefaultBackend, PointBackend};
use pointbridge_io::{
    base::{read_all, PointWriter},
    pcd::{PcdDataFormat, PcdWriter},
};

struct Args {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub leaf_size: f32,
    pub outlier_neighbors: Option<usize>,
    pub outlier_stddev_mul: f64,
    pub binary: bool,
}

fn get_args() -> Result<Args> {
    let matches = App::new("pointbridge voxelize")
        .version("0.1")
        .about("Downsamples a PCD file with a voxel grid, optionally removing statistical outliers first")
        .arg(Arg::with_name("INPUT").short("i").takes_value(true).value_name("INPUT").help("Input PCD file").required(true))
        .arg(Arg::with_name("OUTPUT").short("o").takes_value(true).value_name("OUTPUT").help("Output PCD file").required(true))
        .arg(Arg::with_name("LEAF_SIZE").short("l").long("leaf-size").takes_value(true).value_name("LEAF_SIZE").help("Edge length of a voxel").default_value("0.05"))
        .arg(Arg::with_name("MEAN_K").long("outliers").takes_value(true).value_name("MEAN_K").help("Remove statistical outliers using the mean distance to this many neighbours before voxelizing"))
        .arg(Arg::with_name("STDDEV_MUL").long("stddev-mul").takes_value(true).value_name("STDDEV_MUL").help("Standard deviation multiplier for outlier removal").default_value("1.0"))
        .arg(Arg::with_name("BINARY").long("binary").help("Write binary instead of ASCII PCD data"))
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
    let leaf_size = value_t!(matches, "LEAF_SIZE", f32)?;
    let outlier_neighbors = if matches.is_present("MEAN_K") {
        Some(value_t!(matches, "MEAN_K", usize)?)
    } else {
        None
    };
    let outlier_stddev_mul = value_t!(matches, "STDDEV_MUL", f64)?;

    Ok(Args {
        input_file,
        output_file,
        leaf_size,
        outlier_neighbors,
        outlier_stddev_mul,
        binary: matches.is_present("BINARY"),
    })
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = get_args()?;
    let backend = DefaultBackend::new(BridgeConfig::from_env());

    let mut cloud = read_all(&args.input_file)?;
    info!("Read {} points from {}", cloud.len(), args.input_file.display());

    if let Some(mean_k) = args.outlier_neighbors {
        cloud = backend.remove_statistical_outliers(&cloud, mean_k, args.outlier_stddev_mul)?;
        info!("{} points left after outlier removal", cloud.len());
    }

    let filtered = backend.voxel_filter(&cloud, args.leaf_size);
    info!(
        "Voxelized {} points into {} with leaf size {}",
        cloud.len(),
        filtered.len(),
        args.leaf_size
    );

    let data_format = if args.binary {
        PcdDataFormat::Binary
    } else {
        PcdDataFormat::Ascii
    };
    let mut writer = PcdWriter::from_path(&args.output_file, data_format)?;
    writer.write(&filtered)?;
    writer.flush()?;
    info!("Wrote file {}", args.output_file.display());

    Ok(())
}
