use std::convert::Infallible;
use std::time::{Duration, Instant};

use bytes::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::codec::Codec;
use crate::config::{AppConfig, CorsConfig, UploadLimits};
use crate::documents::DocumentService;
use crate::error::{error_body, AppError, Result};
use crate::models::*;
use crate::multipart::{read_form, FormData};
use crate::services::ImageOperationService;
use crate::utils::format_megabytes;
use crate::validation;

const EXPOSED_HEADERS: &str = "X-Original-Size, X-Output-Size, X-Original-Format, \
X-Converted-Format, X-Padding-Info, X-Original-Size-MB, X-Final-Size-MB, X-Attempts-Used, \
X-Skipped-Files, X-Request-Id, Content-Disposition";

/// Routes every request of the service. Cheap to share behind an `Arc`.
pub struct RequestHandler {
    images: ImageOperationService,
    documents: DocumentService,
    cors_config: CorsConfig,
    limits: UploadLimits,
    timeout: Duration,
}

impl RequestHandler {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            images: ImageOperationService::new(Codec::new(config.codec.avif_speed)),
            documents: DocumentService::new(config.pdfium.clone()),
            cors_config: config.cors.clone(),
            limits: config.limits.clone(),
            timeout: Duration::from_secs(config.server.timeout_seconds),
        }
    }

    pub async fn handle_http_request(
        &self,
        req: Request<Body>,
    ) -> std::result::Result<Response<Body>, Infallible> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "request",
            %request_id,
            method = %req.method(),
            path = %req.uri().path()
        );

        async move {
            let started = Instant::now();
            let origin = req
                .headers()
                .get("origin")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            let mut response = if req.method() == Method::OPTIONS {
                empty_response(StatusCode::OK)
            } else {
                match tokio::time::timeout(self.timeout, self.route(req)).await {
                    Ok(response) => response,
                    // Dropping the route future does not stop a spawn_blocking
                    // encode already running; it finishes and its result is discarded.
                    Err(_) => {
                        error!(
                            timeout_secs = self.timeout.as_secs(),
                            "request timed out; in-flight encoding continues on the blocking pool"
                        );
                        json_response(
                            StatusCode::GATEWAY_TIMEOUT,
                            error_body("Request timed out"),
                        )
                    }
                }
            };

            self.apply_cors(&mut response, origin.as_deref());
            set_header(&mut response, "X-Request-Id", &request_id.to_string());
            info!(
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
            Ok(response)
        }
        .instrument(span)
        .await
    }

    async fn route(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let (context, result) = match (&method, path.as_str()) {
            (&Method::GET, "/health") => ("Health check failed", self.health()),
            (&Method::POST, "/image-operation/compress-image") => {
                ("Error in image compression", self.compress_image(req).await)
            }
            (&Method::POST, "/image-operation/enhance-image") => {
                ("Failed to enhance image", self.enhance_image(req).await)
            }
            (&Method::POST, "/image-operation/format-change") => {
                ("Failed to convert image", self.format_change(req).await)
            }
            (&Method::POST, "/image-operation/image-to-pdf") => {
                ("Failed to convert images to PDF", self.image_to_pdf(req).await)
            }
            (&Method::POST, "/pdf-operation/pdf-to-word") => {
                ("Error converting file", self.pdf_to_word(req).await)
            }
            (&Method::POST, "/pdf-operation/word-to-pdf") => {
                ("Error converting file", self.word_to_pdf(req).await)
            }
            (&Method::POST, "/pdf-operation/split-pdf") => {
                ("Failed to process PDF file", self.split_pdf(req).await)
            }
            _ => {
                warn!("no route");
                return json_response(StatusCode::NOT_FOUND, error_body("Not Found"));
            }
        };

        result.unwrap_or_else(|err| error_response(context, &err))
    }

    async fn form(&self, req: Request<Body>) -> Result<FormData> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let query = req.uri().query().map(str::to_owned);

        let mut form = read_form(content_type.as_deref(), req.into_body(), &self.limits).await?;
        form.merge_query(query.as_deref());
        Ok(form)
    }

    fn health(&self) -> Result<Response<Body>> {
        let body = serde_json::to_string(&HealthResponse {
            status: "OK",
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        })
        .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(json_response(StatusCode::OK, body))
    }

    async fn compress_image(&self, req: Request<Body>) -> Result<Response<Body>> {
        let mut form = self.form(req).await?;
        let tier = validation::compression_tier(&form)?;
        let image = form
            .take_file("image")
            .ok_or_else(|| AppError::missing_input("Image is required"))?;

        let result = self
            .images
            .process(ConversionRequest::tier(image.bytes, tier))
            .await?;
        binary_response(ImageKind::Jpeg.mime_type(), result.output_bytes, &[])
    }

    async fn enhance_image(&self, req: Request<Body>) -> Result<Response<Body>> {
        let mut form = self.form(req).await?;
        let image = form
            .take_file("image")
            .ok_or_else(|| AppError::missing_input("No image file uploaded"))?;
        let megabytes = validation::target_megabytes(&form)?;

        let result = self
            .images
            .process(ConversionRequest::target_megabytes(image.bytes, megabytes))
            .await?;
        binary_response(
            ImageKind::Jpeg.mime_type(),
            result.output_bytes,
            &[
                ("Content-Disposition", "inline".to_string()),
                ("X-Original-Size-MB", format_megabytes(result.original_size)),
                ("X-Final-Size-MB", format_megabytes(result.final_size)),
                ("X-Attempts-Used", result.attempts_used.to_string()),
            ],
        )
    }

    async fn format_change(&self, req: Request<Body>) -> Result<Response<Body>> {
        let mut form = self.form(req).await?;
        let image = form
            .take_file("image")
            .ok_or_else(|| AppError::missing_input("No image file uploaded"))?;
        let kind = validation::convert_type(&form)?;

        let result = self
            .images
            .process(ConversionRequest::format(image.bytes, kind))
            .await?;

        let mut headers = vec![
            ("Content-Disposition", "inline".to_string()),
            ("X-Original-Format", result.original_format.clone()),
            ("X-Converted-Format", kind.as_str().to_string()),
            ("X-Original-Size", result.original_size.to_string()),
            ("X-Output-Size", result.final_size.to_string()),
        ];
        if let Some(padding) = result.padding {
            headers.push(("X-Padding-Info", padding.to_string()));
        }
        binary_response(kind.mime_type(), result.output_bytes, &headers)
    }

    async fn image_to_pdf(&self, req: Request<Body>) -> Result<Response<Body>> {
        let mut form = self.form(req).await?;
        let options = validation::image_to_pdf_options(&form)?;
        let files = form.take_files("image");
        if files.is_empty() {
            return Err(AppError::missing_input("No images uploaded"));
        }

        let invalid: Vec<&str> = files
            .iter()
            .filter(|f| !f.is_image())
            .map(|f| f.file_name.as_str())
            .collect();
        if !invalid.is_empty() {
            return Err(AppError::validation(format!(
                "Some files are not valid images: {}",
                invalid.join(", ")
            )));
        }

        let count = files.len();
        let assembly = self.images.images_to_pdf(files, options).await?;
        info!(
            received = count,
            pages = assembly.pages,
            skipped = assembly.skipped.len(),
            "assembled PDF"
        );
        binary_response(
            "application/pdf",
            assembly.pdf,
            &[
                (
                    "Content-Disposition",
                    "attachment; filename=converted-images.pdf".to_string(),
                ),
                ("X-Skipped-Files", assembly.skipped.join(", ")),
            ],
        )
    }

    async fn document_upload(&self, req: Request<Body>, missing: &str) -> Result<Vec<u8>> {
        let mut form = self.form(req).await?;
        form.take_file("document")
            .filter(|file| !file.bytes.is_empty())
            .map(|file| file.bytes)
            .ok_or_else(|| AppError::missing_input(missing))
    }

    async fn pdf_to_word(&self, req: Request<Body>) -> Result<Response<Body>> {
        let pdf = self.document_upload(req, "No document provided").await?;
        let docx = self.documents.pdf_to_word(pdf).await?;
        binary_response(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            docx,
            &[(
                "Content-Disposition",
                "attachment; filename=\"converted-document.docx\"".to_string(),
            )],
        )
    }

    async fn word_to_pdf(&self, req: Request<Body>) -> Result<Response<Body>> {
        let document = self.document_upload(req, "No document provided").await?;
        let pdf = self.documents.word_to_pdf(document).await?;
        binary_response(
            "application/pdf",
            pdf,
            &[(
                "Content-Disposition",
                "attachment; filename=\"converted-document.pdf\"".to_string(),
            )],
        )
    }

    async fn split_pdf(&self, req: Request<Body>) -> Result<Response<Body>> {
        let pdf = self.document_upload(req, "No PDF file uploaded").await?;
        let zip = self.documents.split_pdf(pdf).await?;
        binary_response(
            "application/zip",
            zip,
            &[(
                "Content-Disposition",
                "attachment; filename=\"pdf_pages.zip\"".to_string(),
            )],
        )
    }

    fn apply_cors(&self, response: &mut Response<Body>, origin: Option<&str>) {
        let allowed_origin = self.get_allowed_origin(origin);
        set_header(response, "Access-Control-Allow-Origin", &allowed_origin);
        set_header(response, "Access-Control-Allow-Methods", "GET, POST, OPTIONS");
        set_header(
            response,
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        );
        set_header(response, "Access-Control-Expose-Headers", EXPOSED_HEADERS);
    }

    fn get_allowed_origin(&self, origin: Option<&str>) -> String {
        let allowed = &self.cors_config.allowed_origins;
        if allowed.iter().any(|o| o == "*") {
            return "*".to_string();
        }
        match origin {
            Some(origin) if allowed.iter().any(|o| o == origin) => origin.to_string(),
            _ => "null".to_string(),
        }
    }
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn json_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn binary_response(
    content_type: &str,
    bytes: impl Into<Bytes>,
    headers: &[(&'static str, String)],
) -> Result<Response<Body>> {
    let bytes = bytes.into();
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header("Content-Length", bytes.len());
    for (name, value) in headers {
        builder = builder.header(*name, header_value(value));
    }
    builder
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("failed to build response: {e}")))
}

/// Client errors carry their own message; server errors are prefixed with
/// the route's context.
fn error_response(context: &str, err: &AppError) -> Response<Body> {
    let status = err.status_code();
    let body = if err.is_client_error() {
        warn!(status = status.as_u16(), error = %err, "rejected request");
        err.to_json()
    } else {
        error!(status = status.as_u16(), error = %err, "{context}");
        error_body(&format!("{context}: {err}"))
    };
    json_response(status, body)
}

/// Header-safe rendering: anything outside visible ASCII becomes `?`.
fn header_value(value: &str) -> HeaderValue {
    let safe: String = value
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect();
    HeaderValue::from_str(&safe).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn set_header(response: &mut Response<Body>, name: &'static str, value: &str) {
    response.headers_mut().insert(name, header_value(value));
}
