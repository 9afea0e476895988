//! zone_check - validate a zone file and look up points against it
//!
//! Prints the parsed zones, the declared count and the frame size. With
//! `--point X,Y` (repeatable) it also reports which zone claims each point,
//! using the same first-match rule as the monitor.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use psms::geometry::{self, PixelPoint};
use psms::{zones, UnmatchedLinePolicy, ZoneConfig};

#[derive(Parser, Debug)]
#[command(name = "zone_check", about = "Validate a PSMS zone file")]
struct Args {
    /// Zone file to check
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Pixel to locate, as X,Y (repeatable)
    #[arg(long = "point", value_name = "X,Y", value_parser = parse_point)]
    points: Vec<PixelPoint>,

    /// Handling of unrecognised lines; `reject` makes them fatal
    #[arg(long, value_enum, default_value = "warn")]
    unmatched_lines: UnmatchedLinePolicy,

    /// Print zone vertices
    #[arg(short, long)]
    verbose: bool,
}

fn parse_point(raw: &str) -> Result<PixelPoint> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected X,Y, got '{}'", raw))?;
    let x = x
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid x coordinate '{}'", x))?;
    let y = y
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid y coordinate '{}'", y))?;
    Ok(PixelPoint::new(x, y))
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = zones::load(&args.path, args.unmatched_lines)?;
    print_summary(&config, args.verbose);

    for point in &args.points {
        match locate(&config, *point) {
            Some((position, id)) => {
                println!("({}, {}) -> zone {} (index {})", point.x, point.y, id, position)
            }
            None => println!("({}, {}) -> no zone", point.x, point.y),
        }
    }
    Ok(())
}

fn print_summary(config: &ZoneConfig, verbose: bool) {
    println!("frame: {}", config.frame_size());
    println!("number_of_zone: {}", config.zone_count);
    println!("zones parsed: {}", config.zones.len());
    for (position, zone) in config.zones.iter().enumerate() {
        let counted = if position < config.zone_count {
            ""
        } else {
            " (not counted)"
        };
        println!(
            "  [{}] zone {}: {} vertices{}",
            position,
            zone.id(),
            zone.points().len(),
            counted
        );
        if verbose {
            let vertices: Vec<String> = zone
                .pixel_polygon()
                .iter()
                .map(|p| format!("({}, {})", p.x, p.y))
                .collect();
            println!("      {}", vertices.join(" "));
        }
    }
}

fn locate(config: &ZoneConfig, point: PixelPoint) -> Option<(usize, u32)> {
    config
        .zones
        .iter()
        .enumerate()
        .find(|(_, zone)| geometry::contains(zone.pixel_polygon(), point))
        .map(|(position, zone)| (position, zone.id()))
}
