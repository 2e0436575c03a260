use super::*;
use std::time::Duration;

fn opts(max_checked_out: usize, max_pool_bytes: usize, per_bucket: usize) -> SurfacePoolOpts {
    SurfacePoolOpts {
        max_checked_out,
        max_pool_bytes,
        max_surfaces_per_bucket: per_bucket,
    }
}

#[tokio::test]
async fn pool_honors_bucket_cap() {
    let p = SurfacePool::new(opts(8, 1 << 30, 1));

    let a = p.acquire(8, 8).await.unwrap();
    let b = p.acquire(8, 8).await.unwrap();
    drop(a);
    drop(b);

    let st = p.stats();
    assert_eq!(st.retained_surfaces, 1);
    assert_eq!(st.dropped_on_release, 1);
    assert_eq!(st.checked_out, 0);
}

#[tokio::test]
async fn pool_honors_global_byte_cap() {
    let bytes_8x8 = SurfaceKey { w: 8, h: 8 }.byte_len();
    let p = SurfacePool::new(opts(8, bytes_8x8, 8));

    let a = p.acquire(8, 8).await.unwrap();
    let b = p.acquire(8, 8).await.unwrap();
    drop(a);
    drop(b);

    let st = p.stats();
    assert_eq!(st.retained_bytes, bytes_8x8);
    assert_eq!(st.retained_surfaces, 1);
    assert!(st.dropped_on_release >= 1);
}

#[tokio::test]
async fn released_surfaces_are_reused() {
    let p = SurfacePool::new(SurfacePoolOpts::default());
    drop(p.acquire(4, 4).await.unwrap());
    let s = p.acquire(4, 4).await.unwrap();
    assert_eq!((s.width(), s.height()), (4, 4));

    let st = p.stats();
    assert_eq!(st.alloc_surfaces, 1);
    assert_eq!(st.reused_surfaces, 1);
}

#[tokio::test]
async fn acquire_waits_for_a_free_slot() {
    let p = SurfacePool::new(opts(1, 1 << 20, 4));
    let held = p.acquire(2, 2).await.unwrap();

    let waiting = tokio::time::timeout(Duration::from_millis(50), p.acquire(2, 2)).await;
    assert!(waiting.is_err(), "second acquire should block while the only slot is held");

    drop(held);
    let s = tokio::time::timeout(Duration::from_secs(5), p.acquire(2, 2))
        .await
        .expect("slot freed")
        .unwrap();
    assert_eq!(p.stats().peak_checked_out, 1);
    drop(s);
}

#[tokio::test]
async fn surface_is_released_on_error_paths() {
    let p = SurfacePool::new(opts(1, 1 << 20, 4));

    async fn fails(pool: &SurfacePool) -> PackResult<()> {
        let mut s = pool.acquire(2, 2).await?;
        s.data_mut().fill(7);
        Err(PackError::render("boom"))
    }

    assert!(fails(&p).await.is_err());
    assert_eq!(p.stats().checked_out, 0);
    assert!(
        tokio::time::timeout(Duration::from_secs(5), p.acquire(2, 2))
            .await
            .is_ok()
    );
}
