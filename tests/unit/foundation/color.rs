use super::*;
use serde_json::json;

fn parse(v: serde_json::Value) -> ColorDef {
    serde_json::from_value(v).unwrap()
}

#[test]
fn hex_forms() {
    assert_eq!(parse(json!("#ff0000")), ColorDef::rgba(1.0, 0.0, 0.0, 1.0));
    assert_eq!(parse(json!("#f00")), ColorDef::rgba(1.0, 0.0, 0.0, 1.0));
    assert_eq!(parse(json!("00ff00")), ColorDef::rgba(0.0, 1.0, 0.0, 1.0));

    let c = parse(json!("#0000ff80"));
    assert!((c.b - 1.0).abs() < 1e-9);
    assert!((c.a - (128.0 / 255.0)).abs() < 1e-9);
}

#[test]
fn keywords_are_case_insensitive() {
    assert_eq!(
        parse(json!("Transparent")).to_rgba8_premul(),
        Rgba8Premul::TRANSPARENT
    );
    assert_eq!(parse(json!("BLACK")).to_rgba8_premul(), Rgba8Premul::BLACK);
    assert_eq!(
        parse(json!("white")).to_rgba8_premul(),
        Rgba8Premul::opaque(255, 255, 255)
    );
}

#[test]
fn rejects_malformed_text() {
    for bad in ["#ff00", "#gg0000", "red", "#ffé"] {
        assert_eq!(
            bad.parse::<ColorDef>(),
            Err(ColorParseError::Syntax(bad.to_owned()))
        );
    }
    assert!(serde_json::from_value::<ColorDef>(json!("#12345")).is_err());
}

#[test]
fn object_and_array_forms() {
    assert_eq!(
        parse(json!({"r": 0.25, "g": 0.5, "b": 0.75})),
        ColorDef::rgba(0.25, 0.5, 0.75, 1.0)
    );
    assert_eq!(
        parse(json!([0.25, 0.5, 0.75, 0.9])),
        ColorDef::rgba(0.25, 0.5, 0.75, 0.9)
    );
    assert!(serde_json::from_value::<ColorDef>(json!([0.1, 0.2])).is_err());
}

#[test]
fn hsl_primaries() {
    let close = |a: ColorDef, b: ColorDef| {
        (a.r - b.r).abs() < 1e-9 && (a.g - b.g).abs() < 1e-9 && (a.b - b.b).abs() < 1e-9
    };
    assert!(close(ColorDef::hsla(0.0, 1.0, 0.5, 1.0), ColorDef::rgba(1.0, 0.0, 0.0, 1.0)));
    assert!(close(ColorDef::hsla(120.0, 1.0, 0.5, 1.0), ColorDef::rgba(0.0, 1.0, 0.0, 1.0)));
    assert!(close(ColorDef::hsla(-120.0, 1.0, 0.5, 1.0), ColorDef::rgba(0.0, 0.0, 1.0, 1.0)));
    assert!(close(ColorDef::hsla(42.0, 0.0, 0.25, 1.0), ColorDef::rgba(0.25, 0.25, 0.25, 1.0)));

    let c = parse(json!({"h": 0.0, "s": 1.0, "l": 0.5, "a": 0.5}));
    assert!((c.r - 1.0).abs() < 1e-9);
    assert_eq!(c.a, 0.5);
}

#[test]
fn premultiplies_on_quantize() {
    let c = ColorDef::rgba(1.0, 0.0, 0.0, 0.5).to_rgba8_premul();
    assert_eq!(c, Rgba8Premul { r: 128, g: 0, b: 0, a: 128 });
}

#[test]
fn serializes_as_channels() {
    let c = ColorDef::rgba(1.0, 0.5, 0.0, 1.0);
    let v = serde_json::to_value(c).unwrap();
    assert_eq!(v, json!({"r": 1.0, "g": 0.5, "b": 0.0, "a": 1.0}));
    assert_eq!(parse(v), c);
}
