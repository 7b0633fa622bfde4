//! Container inspection command

use crate::InspectArgs;
use anyhow::{Context, Result};
use gainmap_core::AttrValue;
use gainmap_core::metadata::keys;
use gainmap_io::{GainMapContainer, container};
use std::path::Path;

pub fn run(args: InspectArgs, verbose: u8) -> Result<()> {
    for path in &args.input {
        let gmap = container::read(path)
            .with_context(|| format!("Failed to read container: {}", path.display()))?;
        print_container(path, &gmap, args.all || verbose > 0);

        if args.input.len() > 1 {
            println!();
        }
    }
    Ok(())
}

fn print_container(path: &Path, gmap: &GainMapContainer, all: bool) {
    let base = &gmap.base;
    println!("{}", path.display());
    println!("  Resolution:  {}x{}", base.width(), base.height());
    println!("  Color space: {}", base.color_space());
    println!("  Orientation: {}", base.orientation().exif_value());
    println!("  Strategy:    {}", gmap.strategy);
    println!("  Quality:     {:.2}", gmap.quality);

    match &gmap.gain_map {
        Some(gm) if gm.has_extent() => println!(
            "  Gain map:    {}x{}, log2 [{:.3}, {:.3}]",
            gm.image.width(),
            gm.image.height(),
            gm.min_log2,
            gm.max_log2
        ),
        _ => println!("  Gain map:    missing"),
    }

    let meta = base.metadata();
    for (label, key) in [
        ("Maker 33", keys::MAKER_33),
        ("Maker 48", keys::MAKER_48),
        ("Stops", keys::HEADROOM_STOPS),
    ] {
        if let Some(value) = meta.get(key) {
            println!("  {:<12} {}", format!("{label}:"), format_attr(value));
        }
    }

    if all && !meta.is_empty() {
        println!("  Attributes:");
        for (key, value) in meta.iter() {
            println!("    {key} = {}", format_attr(value));
        }
    }
}

fn format_attr(value: &AttrValue) -> String {
    match value {
        AttrValue::Str(s) => format!("\"{s}\""),
        AttrValue::UInt(v) => v.to_string(),
        AttrValue::Float(v) => format!("{v}"),
        AttrValue::Double(v) => format!("{v}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_attr() {
        assert_eq!(format_attr(&AttrValue::Str("gainmap".into())), "\"gainmap\"");
        assert_eq!(format_attr(&AttrValue::UInt(7)), "7");
        assert_eq!(format_attr(&AttrValue::Double(0.5)), "0.5");
    }
}
