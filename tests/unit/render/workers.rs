use super::*;

#[tokio::test]
async fn run_returns_job_result() {
    let w = RenderWorkers::new(Some(2)).unwrap();
    assert_eq!(w.threads(), 2);
    let v = w.run(|| Ok(6 * 7)).await.unwrap();
    assert_eq!(v, 42);
}

#[tokio::test]
async fn job_errors_pass_through() {
    let w = RenderWorkers::new(Some(1)).unwrap();
    let err = w
        .run(|| -> PackResult<()> { Err(PackError::render("bad pixels")) })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bad pixels"));
}

#[tokio::test]
async fn panicking_job_becomes_an_error() {
    let w = RenderWorkers::new(Some(1)).unwrap();
    let err = w
        .run(|| -> PackResult<()> { panic!("kaboom") })
        .await
        .unwrap_err();
    assert!(matches!(err, PackError::Render(_)));
}

#[tokio::test]
async fn runs_on_named_pool_threads() {
    let w = RenderWorkers::new(Some(1)).unwrap();
    let name = w
        .run(|| Ok(std::thread::current().name().map(str::to_owned)))
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("texgraph-render-0"));
}
