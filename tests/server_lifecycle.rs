//! Serving over a real socket and shutting down cleanly.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;

use ssr_handle::render::{render_fn, RenderOutput};
use ssr_handle::{HttpServer, Mode, Shutdown};

mod common;
use common::{registry, Project};

#[tokio::test]
async fn test_serves_until_shutdown() {
    let project = Project::new(Mode::Production);
    let entry = render_fn(|url, _context| async move {
        Ok(RenderOutput::html(format!("<main>{url}</main>"), json!({ "ok": true })))
    });
    let runtime = project.runtime(registry(entry));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(
        HttpServer::new(runtime, &project.config.server).run(listener, shutdown.subscribe()),
    );

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let page = client
        .get(format!("http://{addr}/hello?x=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.headers().contains_key("x-request-id"));
    let body = page.text().await.unwrap();
    assert!(body.contains("<main>/hello?x=1</main>"));
    assert!(body.contains(r#"<script id="ssr-data" type="text/json">{"ok":true}</script>"#));

    let asset = client
        .get(format!("http://{addr}/assets/app.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(asset.status(), StatusCode::OK);
    assert_eq!(asset.text().await.unwrap(), "console.log('client')");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    assert!(client
        .get(format!("http://{addr}/"))
        .timeout(Duration::from_secs(1))
        .send()
        .await
        .is_err());
}
