use std::env::temp_dir;

use dsv_rs::{
    DsvResult,
    core::{dialect::Dialect, quote::QuoteStyle},
    dsv::dsv_writer::DsvWriterBuilder,
};

fn main() -> DsvResult<()> {
    env_logger::init();

    let path = temp_dir().join("ram-report.tsv");

    let mut writer = DsvWriterBuilder::new()
        .dialect(Dialect::TSV)
        .quote_style(QuoteStyle::NonNumeric)
        .has_headers(true)
        .from_path::<_, 3>(&path)?;

    writer.write_comment(&["memory report", "", ""])?;
    writer.write_header(["vendor", "size", "note"])?;
    writer.write_row(&("Corsair", 16u32, Some("fast\tcheap")))?;
    writer.write_row(&("Kingston", 32u32, None::<&str>))?;
    writer.write_row(&("G.Skill", 64u32, Some("5\" heat spreader")))?;
    writer.close()?;

    println!("report written to {}", path.display());
    Ok(())
}
