use std::io::Cursor;
use axum::Router;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use ir_core::export::{ExportError, PhotoExporter};
use url::Url;

fn sample_jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 3, image::Rgb([20, 120, 220]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

async fn spawn_images() -> String {
    let jpeg = sample_jpeg();
    let app = Router::new()
        .route(
            "/out.jpg",
            get(move || {
                let jpeg = jpeg.clone();
                async move { ([(header::CONTENT_TYPE, "image/jpeg")], jpeg) }
            }),
        )
        .route("/garbage.png", get(|| async { "definitely not pixels" }))
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND.into_response() }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_saves_downloaded_image_as_png() {
    let base = spawn_images().await;
    let album = tempfile::tempdir().unwrap();
    let exporter = PhotoExporter::new(album.path().join("Photos")).unwrap();

    let url = Url::parse(&format!("{base}/out.jpg")).unwrap();
    let path = exporter.save_to_album(&url).await.unwrap();

    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    assert!(path.starts_with(exporter.album_dir()));
    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (4, 3));
    assert_eq!(image::ImageFormat::from_path(&path).unwrap(), image::ImageFormat::Png);
}

#[tokio::test]
async fn test_non_image_bytes_are_rejected() {
    let base = spawn_images().await;
    let album = tempfile::tempdir().unwrap();
    let exporter = PhotoExporter::new(album.path()).unwrap();

    let url = Url::parse(&format!("{base}/garbage.png")).unwrap();
    let err = exporter.save_to_album(&url).await.unwrap_err();

    assert!(matches!(err, ExportError::InvalidImageData(_)));
    assert_eq!(std::fs::read_dir(album.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_http_error_is_download_failure() {
    let base = spawn_images().await;
    let album = tempfile::tempdir().unwrap();
    let exporter = PhotoExporter::new(album.path()).unwrap();

    let url = Url::parse(&format!("{base}/missing.png")).unwrap();
    let err = exporter.save_to_album(&url).await.unwrap_err();

    assert!(matches!(err, ExportError::DownloadFailed(_)));
}
