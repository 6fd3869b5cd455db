//! This example shows how to render every dataset of a directory to an image file.
//!
//! Run it with the path to a directory (or a single file) of GeoJSON files and shapefiles. It
//! will create `output_map.png` with all datasets drawn on top of each other, in the order
//! they are listed.
//!
//! ```shell
//! cargo run --example render_to_file -- ./data [output.png]
//! ```

use anyhow::{anyhow, Result};
use cartograph::{Color, ConnectionConfig, DataSource, Session};

const PALETTE: [Color; 4] = [
    Color::rgb(0x33, 0x66, 0x99),
    Color::rgb(0xcc, 0x55, 0x33),
    Color::rgb(0x55, 0x99, 0x44),
    Color::rgb(0x88, 0x44, 0xaa),
];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        return Err(anyhow!(
            "This example must be run with the path to a directory of vector files"
        ));
    };
    let output = args.next().unwrap_or_else(|| "output_map.png".to_string());

    let session = Session::begin()?;

    let config = ConnectionConfig::new().with("URI", path);
    let source = DataSource::open("file-vector", &config)?;

    let names = source.dataset_names()?;
    if names.is_empty() {
        return Err(anyhow!("No datasets found"));
    }

    let mut layers = vec![];
    for (index, name) in names.iter().enumerate() {
        let layer = source
            .layer(name)?
            .with_color(PALETTE[index % PALETTE.len()]);
        log::info!("Layer '{name}' covers {:?}", layer.extent()?);
        layers.push(layer);
    }

    let image = session
        .renderer()
        .render(&layers, 1024, 1024, Color::WHITE)?;
    image.write_to(&output)?;
    log::info!("Saved {} bytes to {output}", image.len());

    source.close();
    session.end();

    Ok(())
}
