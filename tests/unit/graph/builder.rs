use super::*;
use crate::render::image::RasterImage;
use crate::render::pool::SurfacePoolOpts;
use crate::render::svg::Rasterizer;

struct Flat;

impl Rasterizer for Flat {
    fn rasterize(&self, _source: &str, size: u32) -> PackResult<RasterImage> {
        RasterImage::solid(size, size, Rgba8Premul::BLACK)
    }
}

const BLUE: Rgba8Premul = Rgba8Premul {
    r: 0,
    g: 0,
    b: 255,
    a: 255,
};
const RED: Rgba8Premul = Rgba8Premul {
    r: 255,
    g: 0,
    b: 0,
    a: 255,
};

fn builder_with(policy: CachePolicy) -> GraphBuilder {
    let ctx = RenderContext::new(Arc::new(Flat), 4, Some(1), SurfacePoolOpts::default()).unwrap();
    GraphBuilder::new(
        Arc::new(ctx),
        Arc::new(PackStats::new()),
        "/tmp/texgraph-out",
        policy,
    )
}

fn builder() -> GraphBuilder {
    builder_with(CachePolicy::default())
}

#[test]
fn equal_sources_intern_to_one_task() {
    let b = builder();
    let x = b.source("stone").unwrap();
    let y = b.source("stone").unwrap();
    let z = b.source("dirt").unwrap();

    assert!(x.same(&y));
    assert!(!x.same(&z));
    let s = b.stats().snapshot().kind(TaskKind::Source);
    assert_eq!((s.created, s.deduplicated), (2, 1));
}

#[test]
fn building_the_same_expression_twice_is_idempotent() {
    let b = builder();
    let build = || {
        let a = b.layer("a", Some(BLUE), 0.5).unwrap();
        let c = b.layer("c", None, 0.25).unwrap();
        b.stack(RED, vec![a, c]).unwrap()
    };
    let first = build();
    let second = build();
    assert!(first.same(&second));

    let stats = b.stats().snapshot();
    assert_eq!(stats.kind(TaskKind::Stack).created, 1);
    assert_eq!(stats.kind(TaskKind::Stack).deduplicated, 1);
    assert_eq!(stats.kind(TaskKind::Repaint).deduplicated, 2);
}

#[test]
fn singleton_stack_over_transparent_is_its_layer() {
    let b = builder();
    let a = b.layer("a", Some(BLUE), 1.0).unwrap();
    let stacked = b.stack(Rgba8Premul::TRANSPARENT, vec![a.clone()]).unwrap();
    assert!(stacked.same(&a));
    assert_eq!(b.stats().snapshot().kind(TaskKind::Stack).simplified, 1);

    let over_red = b.stack(RED, vec![a.clone()]).unwrap();
    assert!(!over_red.same(&a));
}

#[test]
fn repeated_repaint_with_same_paint_collapses() {
    let b = builder();
    let x = b.source("x").unwrap();
    let once = b.repaint(&x, Some(BLUE), 1.0).unwrap();
    let twice = b.repaint(&once, Some(BLUE), 1.0).unwrap();
    assert!(twice.same(&once));

    let half = b.repaint(&x, Some(BLUE), 0.5).unwrap();
    let quarter = b.repaint(&half, Some(BLUE), 0.5).unwrap();
    let direct = b.repaint(&x, Some(BLUE), 0.25).unwrap();
    assert!(quarter.same(&direct));

    let other_paint = b.repaint(&once, Some(RED), 1.0).unwrap();
    assert!(!other_paint.same(&once));
}

#[test]
fn translucent_paint_repeated_is_not_collapsed() {
    let translucent = Rgba8Premul {
        r: 0,
        g: 0,
        b: 128,
        a: 128,
    };
    let b = builder();
    let x = b.source("x").unwrap();
    let once = b.repaint(&x, Some(translucent), 1.0).unwrap();
    let twice = b.repaint(&once, Some(translucent), 1.0).unwrap();
    assert!(!twice.same(&once));
    assert_eq!(b.stats().snapshot().kind(TaskKind::Repaint).simplified, 0);

    let black = RasterImage::solid(1, 1, Rgba8Premul::BLACK).unwrap();
    let tinted_once = crate::render::composite::tint(&black, Some(translucent), 1.0).unwrap();
    let tinted_twice =
        crate::render::composite::tint(&tinted_once, Some(translucent), 1.0).unwrap();
    assert_ne!(tinted_once.pixels(), tinted_twice.pixels());
}

#[test]
fn identity_repaints_return_the_base() {
    let b = builder();
    let x = b.source("x").unwrap();
    assert!(b.repaint(&x, None, 1.0).unwrap().same(&x));
    assert!(b.repaint(&x, Some(Rgba8Premul::BLACK), 1.0).unwrap().same(&x));

    let tinted = b.repaint(&x, Some(BLUE), 1.0).unwrap();
    let blackened = b.repaint(&tinted, Some(Rgba8Premul::BLACK), 1.0).unwrap();
    assert!(!blackened.same(&tinted), "black over a colored image is a real recolor");
    assert_eq!(b.stats().snapshot().kind(TaskKind::Repaint).simplified, 2);
}

#[test]
fn shared_inputs_enable_their_cache() {
    let b = builder();
    let x = b.source("x").unwrap();
    b.layer("x", Some(BLUE), 1.0).unwrap();
    assert_eq!(x.dependent_count(), 1);
    assert!(!x.is_cache_enabled());

    b.layer("x", Some(RED), 1.0).unwrap();
    assert_eq!(x.dependent_count(), 2);
    assert!(x.is_cache_enabled());

    // A deduplicated consumer does not register twice.
    b.layer("x", Some(RED), 1.0).unwrap();
    assert_eq!(x.dependent_count(), 2);
}

#[test]
fn cache_policy_overrides_apply_per_kind() {
    let policy = CachePolicy::new(CacheStrategy::Strong)
        .with_override(TaskKind::Source, CacheStrategy::None);
    assert_eq!(policy.strategy(TaskKind::Source), CacheStrategy::None);
    assert_eq!(policy.strategy(TaskKind::Stack), CacheStrategy::Strong);
    assert_eq!(policy.strategy(TaskKind::Output), CacheStrategy::None);

    let b = builder_with(policy);
    let x = b.source("x").unwrap();
    b.layer("x", Some(BLUE), 1.0).unwrap();
    b.layer("x", Some(RED), 1.0).unwrap();
    assert_eq!(x.dependent_count(), 2);
    assert!(!x.is_cache_enabled());
}

#[test]
fn shared_lru_policy_builds_one_lru_per_kind() {
    let b = builder_with(CachePolicy::new(CacheStrategy::SharedLru { capacity: 2 }));
    let x = b.source("x").unwrap();
    b.layer("x", Some(BLUE), 1.0).unwrap();
    b.layer("x", Some(RED), 1.0).unwrap();
    assert!(x.is_cache_enabled());
    assert_eq!(b.lrus.lock().len(), 2, "one for sources, one for repaints");
}

#[test]
fn invalid_requests_fail_at_build_time() {
    let b = builder();
    let x = b.source("x").unwrap();

    assert!(matches!(b.stack(RED, vec![]), Err(PackError::Validation(_))));
    assert!(matches!(b.animate(RED, vec![]), Err(PackError::Validation(_))));
    assert!(matches!(b.repaint(&x, None, 1.5), Err(PackError::Validation(_))));
    assert!(matches!(b.repaint(&x, None, f32::NAN), Err(PackError::Validation(_))));
    assert!(matches!(b.source(""), Err(PackError::Validation(_))));
    assert!(matches!(b.out_to(&x, vec![]), Err(PackError::Validation(_))));
    assert!(matches!(b.out("../escape", &x), Err(PackError::Validation(_))));
    assert!(matches!(b.out("/abs", &x), Err(PackError::Validation(_))));
}

#[test]
fn outputs_of_one_image_share_a_sink_with_all_destinations() {
    let b = builder();
    let x = b.layer("x", Some(BLUE), 1.0).unwrap();
    let first = b.out("block/a", &x).unwrap();
    let second = b.out("block/b", &x).unwrap();
    assert!(first.same(&second));

    let files = first.body_as::<OutputBody>().unwrap().files();
    assert_eq!(
        files,
        vec![
            PathBuf::from("/tmp/texgraph-out/block/a.png"),
            PathBuf::from("/tmp/texgraph-out/block/b.png"),
        ]
    );
    assert_eq!(b.stats().snapshot().kind(TaskKind::Encode).created, 1);
}

#[test]
fn finish_keeps_sorted_outputs() {
    let b = builder();
    let x = b.source("x").unwrap();
    let y = b.source("y").unwrap();
    let ox = b.out("x", &x).unwrap();
    let oy = b.out("y", &y).unwrap();
    b.out("x_again", &x).unwrap();

    let graph = b.finish();
    assert_eq!(graph.len(), 2);
    assert!(graph.outputs()[0].same(&ox));
    assert!(graph.outputs()[1].same(&oy));
    assert_eq!(graph.stats().snapshot().kind(TaskKind::Output).created, 2);
}
