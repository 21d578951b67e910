//! End-to-end tests of the series pipeline against a mock series site

use crate::support::*;
use cbz_stream::ErrorKind;
use futures::StreamExt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_single_chapter_single_image() {
    let site = SeriesSite::start(vec![ChapterFixture::new(1, vec![IMAGE_SIZE])]).await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (bytes, error) = drain(stream).await;
    assert!(error.is_none(), "unexpected error: {:?}", error);

    let summary = summarize(&bytes);
    assert_eq!(
        summary,
        vec![("1.cbz".to_string(), vec![("1-1.jpg".to_string(), IMAGE_SIZE)])]
    );

    // Image bytes survive both archive levels unchanged
    let chapters = entries(&bytes);
    let images = entries(&chapters[0].1);
    assert_eq!(images[0].1, image_bytes(1001, IMAGE_SIZE));

    assert_eq!(harness.sandboxes(), 0);
}

#[tokio::test]
async fn test_many_chapters_many_images() {
    let chapters = (1..=3)
        .map(|id| ChapterFixture::new(id, vec![1000, 2000, 3000, 4000]))
        .collect();
    let site = SeriesSite::start(chapters).await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (bytes, error) = drain(stream).await;
    assert!(error.is_none(), "unexpected error: {:?}", error);

    let summary = summarize(&bytes);
    assert_eq!(summary.len(), 3);
    for (index, (name, images)) in summary.iter().enumerate() {
        let id = index + 1;
        assert_eq!(name, &format!("{}.cbz", id));
        let expected: Vec<(String, usize)> = (1..=4)
            .map(|i| (format!("{}-{}.jpg", id, i), i * 1000))
            .collect();
        assert_eq!(images, &expected);
    }
}

#[tokio::test]
async fn test_no_chapters_is_validation_error() {
    let site = SeriesSite::with_chapter_list(&list_page("<li>Nothing yet</li>")).await;
    Mock::given(method("GET"))
        .and(path_regex("^/(chapters|img)/.*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&site.server)
        .await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (bytes, error) = drain(stream).await;

    let error = error.expect("request should fail");
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(error.to_string().contains("no chapters found"));
    assert!(bytes.is_empty());
    assert_eq!(harness.sandboxes(), 0);
}

#[tokio::test]
async fn test_chapter_link_with_wrong_shape_fails() {
    let anchors = r#"<li><a href="/chapters/1/extra">Chapter 1</a></li>"#;
    let site = SeriesSite::with_chapter_list(&list_page(anchors)).await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (_, error) = drain(stream).await;

    let error = error.expect("request should fail");
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(error.to_string().contains("/chapters/1/extra"));
}

#[tokio::test]
async fn test_chapter_without_images_is_validation_error() {
    let anchors = r#"<li><a href="/chapters/1">Chapter 1</a></li>"#;
    let site = SeriesSite::with_chapter_list(&list_page(anchors)).await;
    mount_page(&site.server, "/chapters/1/images", &list_page("<p>empty</p>")).await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (_, error) = drain(stream).await;

    let error = error.expect("request should fail");
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(error.to_string().contains("no images found"));
    assert_eq!(harness.sandboxes(), 0);
}

#[tokio::test]
async fn test_image_name_mismatch_is_validation_error() {
    let anchors = r#"<li><a href="/chapters/1">Chapter 1</a></li>"#;
    let site = SeriesSite::with_chapter_list(&list_page(anchors)).await;
    mount_page(
        &site.server,
        "/chapters/1/images",
        &list_page(r#"<img src="/img/banner.jpg">"#),
    )
    .await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (_, error) = drain(stream).await;

    assert_eq!(error.unwrap().kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_failed_image_download_removes_sandbox() {
    let anchors = r#"<li><a href="/chapters/1">Chapter 1</a></li>"#;
    let site = SeriesSite::with_chapter_list(&list_page(anchors)).await;
    mount_page(
        &site.server,
        "/chapters/1/images",
        &list_page(r#"<img src="/img/1-1.jpg"><img src="/img/1-2.jpg">"#),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/img/1-1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes(1, 5000)))
        .mount(&site.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/1-2.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&site.server)
        .await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (_, error) = drain(stream).await;

    let error = error.expect("request should fail");
    assert_eq!(error.kind(), ErrorKind::Transport);
    assert!(error.to_string().contains("500"));
    assert_eq!(harness.sandboxes(), 0);
}

/// Serves every connection a chunked 200 response without a `Content-Length`
async fn serve_chunked_images() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\
                                Connection: close\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_image_without_content_length_is_size_error() {
    let images = serve_chunked_images().await;
    let anchors = r#"<li><a href="/chapters/1">Chapter 1</a></li>"#;
    let site = SeriesSite::with_chapter_list(&list_page(anchors)).await;
    mount_page(
        &site.server,
        "/chapters/1/images",
        &list_page(&format!(r#"<img src="{}/img/1-1.jpg">"#, images)),
    )
    .await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (_, error) = drain(stream).await;

    let error = error.expect("request should fail");
    assert_eq!(error.kind(), ErrorKind::Size);
    assert!(error.to_string().contains("Content-Length"));
    assert_eq!(harness.sandboxes(), 0);
}

#[tokio::test]
async fn test_chapter_list_in_legacy_encoding() {
    let site = SeriesSite::start_with_list(
        vec![ChapterFixture::new(1, vec![1000])],
        // "Cap\xedtulo" as latin-1 is not valid UTF-8
        b"<html><body><a href=\"/chapters/1\">Cap\xedtulo 1</a></body></html>".to_vec(),
    )
    .await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (bytes, error) = drain(stream).await;
    assert!(error.is_none(), "unexpected error: {:?}", error);

    let names: Vec<String> = summarize(&bytes).into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["1.cbz"]);
}

#[tokio::test]
async fn test_repeated_chapter_link_is_built_once() {
    let anchors = r#"<li><a href="/chapters/1">Chapter 1</a></li>
                     <li><a href="/chapters/1">Latest: Chapter 1</a></li>"#;
    let site = SeriesSite::start_with_list(
        vec![ChapterFixture::new(1, vec![1000, 2000])],
        list_page(anchors).into_bytes(),
    )
    .await;
    let harness = Harness::new(|_| {});

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (bytes, error) = drain(stream).await;
    assert!(error.is_none(), "unexpected error: {:?}", error);

    let summary = summarize(&bytes);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].0, "1.cbz");
    assert_eq!(summary[0].1.len(), 2);
    assert_eq!(harness.sandboxes(), 0);
}

#[tokio::test]
async fn test_chapter_list_error_status() {
    let site = SeriesSite::start(vec![]).await;
    let harness = Harness::new(|_| {});
    let missing = site.series.join("/series/404").unwrap();

    let stream = harness.pipeline.stream(missing).await.unwrap();
    let (_, error) = drain(stream).await;

    assert_eq!(error.unwrap().kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let chapters = (1..=2)
        .map(|id| ChapterFixture::new(id, vec![1500, 2500]))
        .collect();
    let site = SeriesSite::start(chapters).await;
    let harness = Harness::new(|_| {});

    let first = drain(harness.pipeline.stream(site.series.clone()).await.unwrap()).await;
    let second = drain(harness.pipeline.stream(site.series.clone()).await.unwrap()).await;

    assert!(first.1.is_none() && second.1.is_none());
    assert_eq!(summarize(&first.0), summarize(&second.0));
}

#[tokio::test]
async fn test_chapters_arrive_in_completion_order() {
    let site = SeriesSite::start(vec![
        ChapterFixture::new(1, vec![1000]).delay(1, Duration::from_millis(400)),
        ChapterFixture::new(2, vec![1000]),
    ])
    .await;
    let harness = Harness::new(|config| {
        config.pipeline.download_concurrency = 2;
        config.pipeline.chapter_concurrency = 2;
    });

    for _ in 0..2 {
        let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
        let (bytes, error) = drain(stream).await;
        assert!(error.is_none(), "unexpected error: {:?}", error);

        let names: Vec<String> = summarize(&bytes).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["2.cbz", "1.cbz"]);
    }
}

#[tokio::test]
async fn test_images_arrive_in_completion_order() {
    let site = SeriesSite::start(vec![
        ChapterFixture::new(1, vec![1000, 2000]).delay(1, Duration::from_millis(400))
    ])
    .await;
    let harness = Harness::new(|config| config.pipeline.download_concurrency = 2);

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (bytes, error) = drain(stream).await;
    assert!(error.is_none(), "unexpected error: {:?}", error);

    let summary = summarize(&bytes);
    assert_eq!(
        summary[0].1,
        vec![("1-2.jpg".to_string(), 2000), ("1-1.jpg".to_string(), 1000)]
    );
}

#[tokio::test]
async fn test_dropping_stream_cancels_and_cleans_up() {
    let site = SeriesSite::start(vec![
        ChapterFixture::new(1, vec![IMAGE_SIZE]),
        ChapterFixture::new(2, vec![1000]).delay(1, Duration::from_secs(10)),
    ])
    .await;
    let harness = Harness::new(|_| {});

    let mut stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert!(!first.is_empty());
    assert_eq!(harness.sandboxes(), 1);

    drop(stream);

    assert!(
        harness.wait_until_clean(Duration::from_secs(3)).await,
        "sandbox was not removed after cancellation"
    );
}

#[tokio::test]
async fn test_cover_is_first_entry() {
    let site = SeriesSite::start(vec![ChapterFixture::new(1, vec![1000])]).await;
    let feed = format!(
        "<?xml version=\"1.0\"?><rss><channel><image><url>{}/covers/42.png</url></image></channel></rss>",
        site.server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/series/42/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(&site.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/covers/42.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes(7, 777)))
        .mount(&site.server)
        .await;
    let harness = Harness::new(|config| config.pipeline.include_cover = true);

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (bytes, error) = drain(stream).await;
    assert!(error.is_none(), "unexpected error: {:?}", error);

    let top = entries(&bytes);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0, "cover.png");
    assert_eq!(top[0].1.len(), 777);
    assert_eq!(top[1].0, "1.cbz");
}

#[tokio::test]
async fn test_cover_feed_without_image_url_fails() {
    let site = SeriesSite::start(vec![ChapterFixture::new(1, vec![1000])]).await;
    let feed = "<?xml version=\"1.0\"?><rss><channel><title>Series 42</title></channel></rss>";
    Mock::given(method("GET"))
        .and(path("/series/42/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed))
        .mount(&site.server)
        .await;
    let harness = Harness::new(|config| config.pipeline.include_cover = true);

    let stream = harness.pipeline.stream(site.series.clone()).await.unwrap();
    let (_, error) = drain(stream).await;

    let error = error.expect("request should fail");
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(error.to_string().contains("no cover found"));
    assert_eq!(harness.sandboxes(), 0);
}
