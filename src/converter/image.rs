//! 图片内联
//!
//! 将远程图片 URL 下载并转换为 base64，按内容前缀推断 MIME 类型。

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// 图片下载错误
#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("图片请求失败: {0}")]
    Request(String),

    #[error("图片请求返回状态码 {0}")]
    Status(u16),
}

/// 图片下载能力
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageFetchError>;
}

/// 基于 reqwest 的图片下载器
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageFetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageFetchError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ImageFetchError::Status(resp.status().as_u16()));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ImageFetchError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// base64 前缀 -> MIME 类型
const MIME_PREFIXES: [(&str, &str); 6] = [
    ("/9j", "image/jpeg"),
    ("iVB", "image/png"),
    ("R0l", "image/gif"),
    ("Ukl", "image/webp"),
    ("Qk0", "image/bmp"),
    ("JVB", "application/pdf"),
];

/// 根据 base64 内容前缀推断 MIME 类型，未知时返回空字符串
pub fn sniff_media_type(base64_data: &str) -> &'static str {
    MIME_PREFIXES
        .iter()
        .find(|(prefix, _)| base64_data.starts_with(prefix))
        .map(|(_, mime)| *mime)
        .unwrap_or("")
}

/// 内联后的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub media_type: String,
    pub data: String,
}

/// 拆分 `data:<mime>;base64,<data>` 形式的 URI
///
/// 缺少 `;base64,` 分隔时返回 `None`。
pub fn split_data_uri(uri: &str) -> Option<InlineImage> {
    let (head, data) = uri.split_once(";base64,")?;
    let media_type = head.trim_start_matches("data:");
    let media_type = media_type.split(';').next().unwrap_or(media_type);
    Some(InlineImage {
        media_type: media_type.to_string(),
        data: data.to_string(),
    })
}

/// 将图片 URL 解析为内联图片
///
/// `data:` URI 直接拆分；其他 URL 经 `fetcher` 下载后编码。下载失败返回 `None`。
pub async fn resolve_image(fetcher: &dyn ImageFetcher, url: &str) -> Option<InlineImage> {
    if url.starts_with("data:") {
        return split_data_uri(url);
    }

    match fetcher.fetch(url).await {
        Ok(bytes) => {
            let data = STANDARD.encode(bytes);
            let media_type = sniff_media_type(&data).to_string();
            Some(InlineImage { media_type, data })
        }
        Err(e) => {
            tracing::warn!("[NORMALIZE] 图片下载失败，保留原始内容块: {}", e);
            None
        }
    }
}
