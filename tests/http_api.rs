use std::io::Cursor;

use hyper::{Body, Request, Response, StatusCode};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use media_ops_service::config::AppConfig;
use media_ops_service::handlers::RequestHandler;
use serde_json::Value;

const BOUNDARY: &str = "----media-ops-test-boundary";

enum Part<'a> {
    Field(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post(path: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)) as u8;
        Rgb([v, 255 - v, v / 2])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        let [r, g, b, _] = h.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

fn image_part<'a>(file_name: &'a str, bytes: &'a [u8]) -> Part<'a> {
    Part::File {
        name: "image",
        file_name,
        content_type: "image/png",
        bytes,
    }
}

async fn send(req: Request<Body>) -> Response<Body> {
    let handler = RequestHandler::new(&AppConfig::default());
    handler.handle_http_request(req).await.unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    hyper::body::to_bytes(response.into_body())
        .await
        .unwrap()
        .to_vec()
}

async fn json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn header<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn unknown_compression_type_is_rejected_before_encoding() {
    let source = png(16, 16);
    let response = send(post(
        "/image-operation/compress-image",
        &[
            Part::Field("compressionType", "extreme"),
            image_part("a.png", &source),
        ],
    ))
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["status"], "ERR");
    assert_eq!(
        body["msg"],
        "\"compressionType\" must be one of [low, medium, high]"
    );
    assert_eq!(body["data"], serde_json::json!([]));
}

#[tokio::test]
async fn compress_without_image_reports_missing_input() {
    let response = send(post(
        "/image-operation/compress-image",
        &[Part::Field("compressionType", "low")],
    ))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["msg"], "Image is required");
}

#[tokio::test]
async fn compression_is_repeatable() {
    let source = png(48, 32);
    let request = || {
        post(
            "/image-operation/compress-image",
            &[
                Part::Field("compressionType", "medium"),
                image_part("a.png", &source),
            ],
        )
    };

    let first = send(request()).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header(&first, "content-type"), "image/jpeg");
    let first = body_bytes(first).await;
    let second = body_bytes(send(request()).await).await;
    assert_eq!(first, second);
    assert_eq!(&first[0..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn tier_can_come_from_the_query_string() {
    let source = png(8, 8);
    let response = send(post(
        "/image-operation/compress-image?compressionType=high",
        &[image_part("a.png", &source)],
    ))
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn format_change_pads_to_the_original_size() {
    let source = png(64, 64);
    let response = send(post(
        "/image-operation/format-change",
        &[Part::Field("convertType", "jpeg"), image_part("a.png", &source)],
    ))
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/jpeg");
    assert_eq!(header(&response, "x-original-format"), "png");
    assert_eq!(header(&response, "x-converted-format"), "jpeg");
    assert_eq!(header(&response, "x-original-size"), source.len().to_string());
    assert_eq!(header(&response, "x-output-size"), source.len().to_string());
    assert!(header(&response, "x-padding-info").starts_with(&format!(
        "Original size: {}, Content size: ",
        source.len()
    )));

    let body = body_bytes(response).await;
    assert_eq!(body.len(), source.len());
    assert_eq!(&body[0..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn oversized_conversion_reports_its_real_size() {
    let source = noisy_jpeg(128, 128);
    let response = send(post(
        "/image-operation/format-change",
        &[
            Part::Field("convertType", "png"),
            Part::File {
                name: "image",
                file_name: "photo.jpg",
                content_type: "image/jpeg",
                bytes: &source,
            },
        ],
    ))
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/png");
    assert_eq!(header(&response, "x-original-format"), "jpeg");
    assert!(response.headers().get("x-padding-info").is_none());

    let original: usize = header(&response, "x-original-size").parse().unwrap();
    let output: usize = header(&response, "x-output-size").parse().unwrap();
    assert_eq!(original, source.len());
    assert!(output > original, "{output} <= {original}");

    let body = body_bytes(response).await;
    assert_eq!(body.len(), output);
    assert_eq!(&body[1..4], b"PNG");
}

#[tokio::test]
async fn format_change_requires_the_image_first() {
    let response = send(post(
        "/image-operation/format-change",
        &[Part::Field("convertType", "bmp")],
    ))
    .await;
    assert_eq!(json(response).await["msg"], "No image file uploaded");
}

#[tokio::test]
async fn enhance_reports_sizes_in_headers() {
    let source = png(20, 20);
    let response = send(post(
        "/image-operation/enhance-image",
        &[Part::Field("quality", "10"), image_part("a.png", &source)],
    ))
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/jpeg");
    assert_eq!(header(&response, "x-original-size-mb"), "0.00");
    let attempts: u32 = header(&response, "x-attempts-used").parse().unwrap();
    assert!((1..=10).contains(&attempts));
    assert!(!header(&response, "x-final-size-mb").is_empty());
}

#[tokio::test]
async fn enhance_rejects_out_of_range_targets() {
    let source = png(4, 4);
    let response = send(post(
        "/image-operation/enhance-image",
        &[Part::Field("quality", "30"), image_part("a.png", &source)],
    ))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json(response).await["msg"],
        "\"quality\" must be less than or equal to 25"
    );
}

#[tokio::test]
async fn three_images_make_three_a4_pages() {
    let a = png(120, 80);
    let b = png(80, 120);
    let c = png(100, 100);
    let response = send(post(
        "/image-operation/image-to-pdf",
        &[
            Part::Field("pageSize", "A4"),
            Part::Field("maintainAspectRatio", "true"),
            image_part("c.png", &c),
            image_part("a.png", &a),
            image_part("b.png", &b),
        ],
    ))
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "application/pdf");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=converted-images.pdf"
    );
    assert_eq!(header(&response, "x-skipped-files"), "");

    let pdf = body_bytes(response).await;
    let doc = lopdf::Document::load_mem(&pdf).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 3);
    for page_id in pages.values() {
        let page = doc.get_dictionary(*page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert!((media_box[2].as_float().unwrap() - 595.28).abs() < 0.01);
        assert!((media_box[3].as_float().unwrap() - 841.89).abs() < 0.01);
    }
}

#[tokio::test]
async fn non_image_uploads_are_listed() {
    let response = send(post(
        "/image-operation/image-to-pdf",
        &[Part::File {
            name: "image",
            file_name: "notes.txt",
            content_type: "text/plain",
            bytes: b"hello",
        }],
    ))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let msg = json(response).await["msg"].as_str().unwrap().to_string();
    assert!(msg.contains("notes.txt"));
}

#[tokio::test]
async fn pdf_to_word_without_document() {
    let response = send(post("/pdf-operation/pdf-to-word", &[])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["msg"], "No document provided");
}

#[tokio::test]
async fn split_rejects_non_pdf_uploads() {
    let response = send(post(
        "/pdf-operation/split-pdf",
        &[Part::File {
            name: "document",
            file_name: "x.pdf",
            content_type: "application/pdf",
            bytes: b"not a pdf",
        }],
    ))
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["msg"], "Invalid PDF file");
}

#[tokio::test]
async fn unknown_route_is_404_with_cors() {
    let response = send(
        Request::builder()
            .method("GET")
            .uri("/nope")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(header(&response, "access-control-allow-origin"), "*");
    assert!(!header(&response, "x-request-id").is_empty());
}

#[tokio::test]
async fn slow_conversion_times_out_with_504() {
    let mut config = AppConfig::default();
    config.server.timeout_seconds = 0;
    let handler = RequestHandler::new(&config);

    let source = png(256, 256);
    let response = handler
        .handle_http_request(post(
            "/image-operation/format-change",
            &[Part::Field("convertType", "jpeg"), image_part("a.png", &source)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(!header(&response, "x-request-id").is_empty());
    assert_eq!(json(response).await["msg"], "Request timed out");
}

#[tokio::test]
async fn preflight_is_answered() {
    let response = send(
        Request::builder()
            .method("OPTIONS")
            .uri("/image-operation/compress-image")
            .header("origin", "https://app.test")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "access-control-allow-methods").contains("POST"));
    assert!(header(&response, "access-control-expose-headers").contains("X-Padding-Info"));
}

#[tokio::test]
async fn health_reports_ok() {
    let response = send(
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "OK");
}

#[tokio::test]
async fn chunked_uploads_are_reassembled() {
    let source = png(24, 24);
    let body = multipart_body(&[
        Part::Field("compressionType", "low"),
        image_part("a.png", &source),
    ]);
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
        body.chunks(7).map(|c| Ok(c.to_vec())).collect();

    let response = send(
        Request::builder()
            .method("POST")
            .uri("/image-operation/compress-image")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::wrap_stream(futures_util::stream::iter(chunks)))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/jpeg");
}
