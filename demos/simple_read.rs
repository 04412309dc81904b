use std::env;

use anyhow::Context;
use dsv_rs::dsv::dsv_reader::{DsvReaderBuilder, HeaderPolicy};
use log::info;

/// Reads `vendor`, `size` and `speed` from the file given as first argument
/// (`ram.csv` by default), ignoring any other column.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| "ram.csv".to_string());

    let mut reader = DsvReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)?;
    reader.read_header(HeaderPolicy::IGNORE_EXTRA_COLUMN, ["vendor", "size", "speed"])?;

    let mut modules = 0;
    let mut total_size = 0u64;
    while let Some((vendor, size, speed)) = reader.read_row::<(String, u32, f64)>()? {
        info!("{vendor}: {size} GB at {speed} MT/s");
        modules += 1;
        total_size = total_size
            .checked_add(u64::from(size))
            .context("total size overflows")?;
    }

    println!("{modules} modules, {total_size} GB in total");
    Ok(())
}
