use hexrebin::{EventSeries, HexRebinner, RebinConfig, SensorGeometry};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "Usage: {} <geometry.json> <series.json> [config.json] [out.json]",
            args[0]
        );
        std::process::exit(2);
    }

    let geometry = SensorGeometry::from_json_file(Path::new(&args[1]))?;
    let series: EventSeries = serde_json::from_str(&std::fs::read_to_string(&args[2])?)?;
    let config = match args.get(3) {
        Some(path) => RebinConfig::from_json_file(Path::new(path))?,
        None => RebinConfig::default(),
    };

    let rebinner = HexRebinner::new(&geometry, &config)?;
    let tensor = rebinner.rebin(&series)?;

    let summary = rebinner.map().summary();
    println!(
        "Rebinned {} pixels onto {}x{} cells, {} slices (total {:.3}).",
        summary.n_referenced_pixels,
        tensor.height(),
        tensor.width(),
        tensor.n_slices(),
        tensor.total()
    );

    if let Some(out_path) = args.get(4) {
        let json = serde_json::to_string(&tensor)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
