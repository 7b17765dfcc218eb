use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{App, Arg};
use pointbridge_algorithms::bounds::calculate_bounds;
use pointbridge_io::base::{GenericPointReader, PointReader};

struct Args {
    pub input_file: PathBuf,
    pub detailed: bool,
}

fn get_args() -> Result<Args> {
    let matches = App::new("pointbridge info")
        .version("0.1")
        .about("Prints information about the given point cloud file")
        .arg(
            Arg::with_name("INPUT")
                .short("i")
                .takes_value(true)
                .value_name("INPUT")
                .help("Input point cloud file")
                .required(true),
        )
        .arg(
            Arg::with_name("DETAILED")
                .short("d")
                .long("detailed")
                .help("Reads all points and reports their bounds and the number of invalid points"),
        )
        .get_matches();

    let input_file = PathBuf::from(
        matches
            .value_of("INPUT")
            .ok_or_else(|| anyhow!("Missing input file"))?,
    );
    let detailed = matches.is_present("DETAILED");

    Ok(Args {
        input_file,
        detailed,
    })
}

fn analyze_file(reader: &mut GenericPointReader) -> Result<()> {
    let cloud = reader.read_cloud()?;
    println!("Points");
    println!("\tTotal:                  {}", cloud.len());
    println!(
        "\tInvalid:                {}",
        cloud.iter().filter(|point| !point.is_finite()).count()
    );
    if cloud.is_organized() {
        println!("\tGrid:                   {} x {}", cloud.width(), cloud.height());
    }
    if let Some(bounds) = calculate_bounds(&cloud) {
        println!("\tX:                      {}  {}", bounds.min().x, bounds.max().x);
        println!("\tY:                      {}  {}", bounds.min().y, bounds.max().y);
        println!("\tZ:                      {}  {}", bounds.min().z, bounds.max().z);
    }
    Ok(())
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = get_args()?;
    let mut reader = GenericPointReader::open_file(&args.input_file)?;
    println!("pointbridge info report for {}", args.input_file.display());
    println!("{}", reader.get_metadata());

    if args.detailed {
        analyze_file(&mut reader)?;
    }

    Ok(())
}
