use std::sync::Arc;

use image::ImageEncoder;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PackError, PackResult};
use crate::render::image::{PngBytes, RasterImage};

/// Encode a premultiplied image as a straight-alpha RGBA PNG.
pub fn encode_png(image: &RasterImage) -> PackResult<PngBytes> {
    let straight = unpremultiply(image.pixels());
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(
            &straight,
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| PackError::render(format!("encode png: {e}")))?;
    Ok(PngBytes(Arc::new(out)))
}

/// Decode PNG bytes back into a premultiplied image.
pub fn decode_png(bytes: &[u8]) -> PackResult<RasterImage> {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
        .map_err(|e| PackError::render(format!("decode png: {e}")))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(4) {
        let p = Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3]);
        px.copy_from_slice(&p.to_array());
    }
    RasterImage::new(w, h, data)
}

fn unpremultiply(premul: &[u8]) -> Vec<u8> {
    let mut out = premul.to_vec();
    for px in out.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/encode.rs"]
mod tests;
