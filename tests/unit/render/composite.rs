use super::*;

const RED: Rgba8Premul = Rgba8Premul {
    r: 255,
    g: 0,
    b: 0,
    a: 255,
};
const BLUE: Rgba8Premul = Rgba8Premul {
    r: 0,
    g: 0,
    b: 255,
    a: 255,
};
const HALF_BLUE: Rgba8Premul = Rgba8Premul {
    r: 0,
    g: 0,
    b: 128,
    a: 128,
};

fn solid(w: u32, h: u32, c: Rgba8Premul) -> RasterImage {
    RasterImage::solid(w, h, c).unwrap()
}

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    let src = [200, 200, 200, 200];
    assert_eq!(over(dst, src, 0.0), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn over_dst_transparent_returns_src() {
    let dst = [0, 0, 0, 0];
    let src = [100, 110, 120, 200];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn layer_order_changes_the_result() {
    let red = solid(2, 2, RED);
    let blue = solid(2, 2, HALF_BLUE);

    let red_then_blue =
        composite_layers(Rgba8Premul::TRANSPARENT, &[red.clone(), blue.clone()]).unwrap();
    let blue_then_red = composite_layers(Rgba8Premul::TRANSPARENT, &[blue, red]).unwrap();

    // fg + bg * (1 - fg_a) with fg = half blue, bg = red.
    assert_eq!(red_then_blue.pixel(0, 0).to_array(), [127, 0, 128, 255]);
    assert_eq!(blue_then_red.pixel(1, 1), RED);
    assert_ne!(red_then_blue, blue_then_red);
}

#[test]
fn background_is_painted_first() {
    let half = solid(1, 1, HALF_BLUE);
    let out = composite_layers(RED, &[half]).unwrap();
    assert_eq!(out.pixel(0, 0).to_array(), [127, 0, 128, 255]);
}

#[test]
fn opaque_layer_hides_background_and_earlier_layers() {
    let out = composite_layers(
        RED,
        &[solid(1, 1, HALF_BLUE), solid(1, 1, BLUE), solid(1, 1, Rgba8Premul::TRANSPARENT)],
    )
    .unwrap();
    assert_eq!(out.pixel(0, 0), BLUE);
}

#[test]
fn mismatched_layer_sizes_fail() {
    let err = composite_layers(RED, &[solid(2, 2, BLUE), solid(1, 1, BLUE)]).unwrap_err();
    assert!(err.to_string().contains("layer is 1x1"));
}

#[test]
fn tint_recolors_black_artwork_keeping_alpha() {
    assert_eq!(tint_pixel([0, 0, 0, 255], Some(BLUE), 1.0), [0, 0, 255, 255]);
    assert_eq!(tint_pixel([0, 0, 0, 128], Some(BLUE), 1.0), [0, 0, 128, 128]);
    assert_eq!(tint_pixel([0, 0, 0, 0], Some(BLUE), 1.0), [0, 0, 0, 0]);
}

#[test]
fn tint_with_black_on_black_is_identity() {
    let px = [0, 0, 0, 77];
    assert_eq!(tint_pixel(px, Some(Rgba8Premul::BLACK), 1.0), px);
}

#[test]
fn tint_without_paint_scales_opacity() {
    assert_eq!(tint_pixel([100, 100, 100, 200], None, 0.5), [50, 50, 50, 100]);
    assert_eq!(tint_pixel([100, 100, 100, 200], None, 1.0), [100, 100, 100, 200]);
}

#[test]
fn frames_stack_vertically_over_background() {
    let frames = [solid(2, 1, Rgba8Premul::TRANSPARENT), solid(2, 1, BLUE), solid(2, 1, HALF_BLUE)];
    let strip = stack_frames(RED, &frames).unwrap();

    assert_eq!(strip.width(), 2);
    assert_eq!(strip.height(), 3);
    assert_eq!(strip.pixel(0, 0), RED);
    assert_eq!(strip.pixel(1, 1), BLUE);
    assert_eq!(strip.pixel(0, 2).to_array(), [127, 0, 128, 255]);
}

#[test]
fn frames_must_share_a_size() {
    let err = stack_frames(RED, &[solid(2, 2, BLUE), solid(2, 1, BLUE)]).unwrap_err();
    assert!(err.to_string().contains("animation frame is 2x1"));
}

#[test]
fn strip_height_overflow_is_an_error() {
    let tall = solid(0, u32::MAX / 2 + 1, BLUE);
    let err = stack_frames(RED, &[tall.clone(), tall]).unwrap_err();
    assert!(err.to_string().contains("strip height overflow"));
}
