// Pulls submitted logos out of the submissions thread and normalizes them
// into `logo_<n>_<user>.<ext>` files on the output canvas.

use crate::context::RunContext;
use crate::core::Comment;
use crate::core::fingerprint::rasterize_svg;
use crate::error::{PollError, Result};
use image::ImageFormat;
use image::imageops::FilterType;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

pub const MANIFEST_FILE_NAME: &str = "logo_formats.txt";

static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[.*?\]\((https?://[^\s)]+)\)").unwrap());
static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap()
});
static IMGUR_ALBUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://imgur\.com/a/[^\s)\]]+").unwrap());
static META_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<meta\b[^>]*>").unwrap());
static META_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bproperty\s*=\s*["']og:image["']"#).unwrap());
static META_CONTENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bcontent\s*=\s*["']([^"']+)["']"#).unwrap());

/// Raw response of a download.
#[derive(Debug, Clone, Default)]
pub struct Download {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Fetches remote resources. Non-success statuses are errors.
pub trait Downloader {
    fn fetch(&self, url: &str) -> Result<Download>;
}

pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent("logopoll")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }
}

impl Downloader for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Download> {
        let response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Api {
                status: status.as_u16(),
                message: format!("failed to download {}", url),
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?.to_vec();
        Ok(Download { content_type, body })
    }
}

/// Image URLs embedded directly in a comment body: `<img src>` tags first,
/// then markdown images.
pub fn embedded_image_urls(body: &str) -> Vec<String> {
    HTML_IMAGE
        .captures_iter(body)
        .chain(MARKDOWN_IMAGE.captures_iter(body))
        .map(|caps| caps[1].to_string())
        .collect()
}

pub fn imgur_album_urls(body: &str) -> Vec<String> {
    IMGUR_ALBUM
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `og:image` targets of an album page that point at a supported image.
pub fn og_image_urls(html: &str) -> Vec<String> {
    META_TAG
        .find_iter(html)
        .filter(|tag| META_PROPERTY.is_match(tag.as_str()))
        .filter_map(|tag| META_CONTENT.captures(tag.as_str()).map(|c| c[1].to_string()))
        .filter(|url| {
            [".png", ".jpg", ".jpeg", ".svg"]
                .iter()
                .any(|ext| url.ends_with(ext))
        })
        .collect()
}

/// Output extension for a download: Content-Type wins, then the URL path.
pub fn detect_format(url: &str, content_type: Option<&str>) -> Option<&'static str> {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.contains("image/png") {
        return Some("png");
    }
    if content_type.contains("image/jpeg") || content_type.contains("image/jpg") {
        return Some("jpeg");
    }
    if content_type.contains("image/svg+xml") {
        return Some("svg");
    }

    let path = Url::parse(url).ok()?.path().to_ascii_lowercase();
    let ext = Path::new(&path).extension()?.to_str()?;
    ["png", "jpg", "jpeg", "svg"].into_iter().find(|known| *known == ext)
}

/// Decode, fit to the canvas and write one logo. Returns the written path
/// and the format it was saved in. SVG sources are saved as PNG.
pub fn save_logo(
    data: &[u8],
    format: &str,
    canvas: u32,
    out_dir: &Path,
    number: u32,
    user: &str,
) -> Result<(PathBuf, &'static str)> {
    if format == "svg" {
        let path = out_dir.join(format!("logo_{}_{}.png", number, user));
        rasterize_svg(data, canvas)?.save_with_format(&path, ImageFormat::Png)?;
        return Ok((path, "png"));
    }

    let (saved_as, image_format) = match format {
        "png" => ("png", ImageFormat::Png),
        "jpg" => ("jpg", ImageFormat::Jpeg),
        "jpeg" => ("jpeg", ImageFormat::Jpeg),
        other => return Err(PollError::Config(format!("unsupported image format {}", other))),
    };
    let path = out_dir.join(format!("logo_{}_{}.{}", number, user, saved_as));
    let resized = image::load_from_memory(data)?.resize_exact(canvas, canvas, FilterType::Lanczos3);
    if image_format == ImageFormat::Jpeg {
        // JPEG has no alpha channel
        image::DynamicImage::ImageRgb8(resized.to_rgb8()).save_with_format(&path, image_format)?;
    } else {
        resized.save_with_format(&path, image_format)?;
    }
    Ok((path, saved_as))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedLogo {
    pub number: u32,
    pub url: String,
    pub user: String,
    pub format: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedImage {
    pub number: u32,
    pub url: String,
    pub user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectSummary {
    pub collected: Vec<CollectedLogo>,
    pub skipped: Vec<SkippedImage>,
}

impl CollectSummary {
    /// Contents of the `logo_formats.txt` manifest.
    pub fn manifest(&self) -> String {
        let mut out = self
            .collected
            .iter()
            .map(|l| {
                format!(
                    "Logo {}: {} (User: {}, Original format: {})",
                    l.number, l.url, l.user, l.format
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        if !self.skipped.is_empty() {
            out.push_str("\n\nSkipped Images:\n");
            let skipped: Vec<String> = self
                .skipped
                .iter()
                .map(|s| {
                    format!(
                        "Image {}: {} (User: {}, Reason: Failed to download or process)",
                        s.number, s.url, s.user
                    )
                })
                .collect();
            out.push_str(&skipped.join("\n"));
        }
        out
    }
}

/// Download every image submitted in `comments` into `out_dir`, numbering
/// them in thread order. The counter advances on failures too, so a number
/// always identifies the same submission. Album pages that cannot be
/// fetched are skipped with a warning.
pub fn collect_logos<D: Downloader + ?Sized>(
    ctx: &mut RunContext,
    downloader: &D,
    comments: &[Comment],
    out_dir: &Path,
) -> Result<CollectSummary> {
    fs::create_dir_all(out_dir)?;
    let canvas = ctx.config().images.canvas_size;
    let mut summary = CollectSummary::default();
    let mut counter = 1u32;

    for comment in comments {
        let mut urls = embedded_image_urls(&comment.body);
        for album in imgur_album_urls(&comment.body) {
            match downloader.fetch(&album) {
                Ok(page) => urls.extend(og_image_urls(&String::from_utf8_lossy(&page.body))),
                Err(e) => ctx.warn(format!("Failed to access Imgur URL {}: {}", album, e)),
            }
        }

        for url in urls {
            log::info!("Processing image {}: {} (User: {})", counter, url, comment.author);
            match fetch_and_save(downloader, &url, canvas, out_dir, counter, &comment.author) {
                Ok((path, format)) => summary.collected.push(CollectedLogo {
                    number: counter,
                    url,
                    user: comment.author.clone(),
                    format: format.to_string(),
                    path,
                }),
                Err(e) => {
                    ctx.warn(format!("Error processing image {}: {}", url, e));
                    summary.skipped.push(SkippedImage {
                        number: counter,
                        url,
                        user: comment.author.clone(),
                    });
                }
            }
            counter += 1;
        }
    }

    log::info!(
        "Processed {} images ({} skipped)",
        counter - 1,
        summary.skipped.len()
    );
    Ok(summary)
}

fn fetch_and_save<D: Downloader + ?Sized>(
    downloader: &D,
    url: &str,
    canvas: u32,
    out_dir: &Path,
    number: u32,
    user: &str,
) -> Result<(PathBuf, &'static str)> {
    let download = downloader.fetch(url)?;
    let format = detect_format(url, download.content_type.as_deref())
        .ok_or_else(|| PollError::Config(format!("unknown image format for {}", url)))?;
    save_logo(&download.body, format, canvas, out_dir, number, user)
}
