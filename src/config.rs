use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub limits: UploadLimits,
    pub cors: CorsConfig,
    pub codec: CodecConfig,
    pub pdfium: PdfiumConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_upload_size: usize,
    pub max_files: usize,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// rav1e speed preset, 1 (slowest) to 10 (fastest).
    pub avif_speed: u8,
}

#[derive(Debug, Clone, Default)]
pub struct PdfiumConfig {
    /// Directory or file of the pdfium shared library; system lookup when unset.
    pub library_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 9999,
                timeout_seconds: 120,
            },
            limits: UploadLimits {
                max_upload_size: 50 * 1024 * 1024,
                max_files: 2000,
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
            },
            codec: CodecConfig { avif_speed: 8 },
            pdfium: PdfiumConfig::default(),
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: env_or("PORT", defaults.server.port),
                timeout_seconds: env_or("SERVER_TIMEOUT", defaults.server.timeout_seconds),
            },
            limits: UploadLimits {
                max_upload_size: env_or("MAX_UPLOAD_SIZE", defaults.limits.max_upload_size),
                max_files: env_or("MAX_FILES", defaults.limits.max_files),
            },
            cors: CorsConfig {
                allowed_origins: env::var("ALLOWED_ORIGINS")
                    .map(|raw| parse_origins(&raw))
                    .unwrap_or(defaults.cors.allowed_origins),
            },
            codec: CodecConfig {
                avif_speed: env_or("AVIF_SPEED", defaults.codec.avif_speed),
            },
            pdfium: PdfiumConfig {
                library_path: env::var("PDFIUM_LIBRARY_PATH")
                    .ok()
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
            },
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}
