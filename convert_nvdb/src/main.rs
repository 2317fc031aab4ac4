#[macro_use]
extern crate log;

use anyhow::Result;
use structopt::StructOpt;

use geom::Distance;

/// Converts a decoded NVDB road-network feed into an OSM XML file.
#[derive(StructOpt)]
#[structopt(name = "convert_nvdb")]
struct Flags {
    /// Path to the decoded feed (JSON)
    input: String,
    /// Where to write the OSM XML
    #[structopt(long, default_value = "road_network.osm")]
    output: String,
    /// Douglas-Peucker tolerance in meters; 0 keeps every geometry point
    #[structopt(long, default_value = "0.2")]
    simplify: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let flags = Flags::from_args();

    let feed = convert_nvdb::reader::load_feed(&flags.input)?;
    let (network, ways, restrictions) =
        convert_nvdb::convert(&feed, Distance::meters(flags.simplify));
    convert_nvdb::osm::write_osm(&flags.output, &network, &ways, &restrictions)?;
    info!("Wrote {}", flags.output);
    Ok(())
}
