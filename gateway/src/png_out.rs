//! RGBA raster to PNG encoding for overlay responses.

use anyhow::Result;
use overlay_raster::RgbaRaster;

pub fn encode_png(raster: &RgbaRaster) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, raster.width, raster.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&raster.pixels)?;
    }
    Ok(out)
}
