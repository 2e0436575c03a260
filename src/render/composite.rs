use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PackError, PackResult};
use crate::foundation::math::{mul_div255_u8, unit_to_u8};
use crate::render::image::{RasterImage, byte_len};

pub type PremulRgba8 = [u8; 4];

/// Premultiplied source-over: `out = src + dst * (1 - src_a)`, with `src` pre-scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = u16::from(unit_to_u8(opacity));
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> PackResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(PackError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

pub fn fill(dst: &mut [u8], color: Rgba8Premul) {
    let px = color.to_array();
    for d in dst.chunks_exact_mut(4) {
        d.copy_from_slice(&px);
    }
}

/// Source-atop recolor with `paint`, then scale the whole pixel by `opacity`.
///
/// `paint = None` leaves color untouched and only applies opacity.
pub fn tint_pixel(px: PremulRgba8, paint: Option<Rgba8Premul>, opacity: f32) -> PremulRgba8 {
    let mut out = px;
    if let Some(paint) = paint {
        let da = u16::from(px[3]);
        let inv = 255u16 - u16::from(paint.a);
        let c = paint.to_array();
        for i in 0..3 {
            let sc = mul_div255(u16::from(c[i]), da);
            let dc = mul_div255(u16::from(px[i]), inv);
            out[i] = add_sat_u8(sc, dc);
        }
    }

    let op = u16::from(unit_to_u8(opacity));
    if op != 255 {
        for ch in &mut out {
            *ch = mul_div255(u16::from(*ch), op);
        }
    }
    out
}

pub fn tint_in_place(buf: &mut [u8], paint: Option<Rgba8Premul>, opacity: f32) {
    for d in buf.chunks_exact_mut(4) {
        let out = tint_pixel([d[0], d[1], d[2], d[3]], paint, opacity);
        d.copy_from_slice(&out);
    }
}

/// Recolor a copy of `image`.
pub fn tint(image: &RasterImage, paint: Option<Rgba8Premul>, opacity: f32) -> PackResult<RasterImage> {
    let mut buf = image.pixels().to_vec();
    tint_in_place(&mut buf, paint, opacity);
    RasterImage::new(image.width(), image.height(), buf)
}

/// Paint `layers` back-to-front over `background` into `dst`.
///
/// Compositing starts at the last fully opaque layer: it hides everything beneath it, the
/// background included.
pub fn composite_layers_into(
    dst: &mut [u8],
    width: u32,
    height: u32,
    background: Rgba8Premul,
    layers: &[RasterImage],
) -> PackResult<()> {
    let expected = byte_len(width, height)?;
    if dst.len() != expected {
        return Err(PackError::render(format!(
            "composite target is {} bytes, expected {expected}",
            dst.len()
        )));
    }
    if let Some(bad) = layers
        .iter()
        .find(|l| l.width() != width || l.height() != height)
    {
        return Err(PackError::render(format!(
            "layer is {}x{}, stack is {width}x{height}",
            bad.width(),
            bad.height()
        )));
    }

    let start = match layers.iter().rposition(RasterImage::is_fully_opaque) {
        Some(i) => {
            dst.copy_from_slice(layers[i].pixels());
            i + 1
        }
        None => {
            fill(dst, background);
            0
        }
    };

    for layer in &layers[start..] {
        over_in_place(dst, layer.pixels(), 1.0)?;
    }
    Ok(())
}

/// Paint `layers` back-to-front over `background` into a new image.
pub fn composite_layers(background: Rgba8Premul, layers: &[RasterImage]) -> PackResult<RasterImage> {
    let first = layers
        .first()
        .ok_or_else(|| PackError::render("cannot composite an empty layer list"))?;
    let (w, h) = (first.width(), first.height());
    let mut buf = vec![0u8; byte_len(w, h)?];
    composite_layers_into(&mut buf, w, h, background, layers)?;
    RasterImage::new(w, h, buf)
}

/// Concatenate same-sized frames vertically, each composited over `background`.
///
/// Frame `i` occupies rows `[i*h, (i+1)*h)` of `dst`.
pub fn stack_frames_into(
    dst: &mut [u8],
    background: Rgba8Premul,
    frames: &[RasterImage],
) -> PackResult<(u32, u32)> {
    let first = frames
        .first()
        .ok_or_else(|| PackError::render("cannot animate an empty frame list"))?;
    let (w, h) = (first.width(), first.height());
    if let Some(bad) = frames.iter().find(|f| !f.same_size(first)) {
        return Err(PackError::render(format!(
            "animation frame is {}x{}, expected {w}x{h}",
            bad.width(),
            bad.height()
        )));
    }

    let frame_len = byte_len(w, h)?;
    let strip_h = u32::try_from(frames.len())
        .ok()
        .and_then(|n| h.checked_mul(n))
        .ok_or_else(|| PackError::render("animation strip height overflow"))?;
    if dst.len() != frame_len * frames.len() {
        return Err(PackError::render(format!(
            "animation target is {} bytes, expected {}",
            dst.len(),
            frame_len * frames.len()
        )));
    }

    for (frame, region) in frames.iter().zip(dst.chunks_exact_mut(frame_len)) {
        fill(region, background);
        over_in_place(region, frame.pixels(), 1.0)?;
    }
    Ok((w, strip_h))
}

/// Concatenate same-sized frames vertically into a new image.
pub fn stack_frames(background: Rgba8Premul, frames: &[RasterImage]) -> PackResult<RasterImage> {
    let first = frames
        .first()
        .ok_or_else(|| PackError::render("cannot animate an empty frame list"))?;
    let mut buf = vec![0u8; byte_len(first.width(), first.height())? * frames.len()];
    let (w, h) = stack_frames_into(&mut buf, background, frames)?;
    RasterImage::new(w, h, buf)
}

fn mul_div255(x: u16, y: u16) -> u8 {
    mul_div255_u8(x, y)
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
