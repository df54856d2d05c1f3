// 缩略图转码
//
// 把一段已通过大小校验的图片字节重编码为不超过最长边限制的缩略图：
// - 静态路径：解码 -> 等比缩放（最长边封顶，最短 1px）-> 有损 WebP
// - 动态路径：多帧 GIF / 动态 WebP 逐帧缩放后编码为动态 WebP，
//   固定质量目标控制产物体积；动态路径任何失败都回退静态路径
//   （此时取首帧）。
//
// 全部是 CPU 密集的同步代码，调用方负责放到阻塞线程池上执行。

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageFormat, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

/// 有损编码的质量目标
const WEBP_QUALITY: f32 = 75.0;

/// 转码产物
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("无法识别图片格式: {0}")]
    UnknownFormat(String),

    #[error("图片解码失败: {0}")]
    DecodeFailed(String),

    #[error("图片编码失败: {0}")]
    EncodeFailed(String),
}

/// 声明的 Content-Type 是否属于支持的图片格式
pub fn is_supported_content_type(media_type: &str) -> bool {
    matches!(
        media_type,
        "image/png" | "image/jpeg" | "image/gif" | "image/webp"
    )
}

/// 图片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    /// 静态图片
    Static,
    /// 多帧 GIF
    AnimatedGif,
    /// 动态 WebP
    AnimatedWebp,
}

/// 转码入口。max_edge 为产物的最长边（像素）。
pub fn transcode(data: &[u8], max_edge: u32) -> Result<Thumbnail, TranscodeError> {
    match detect_kind(data)? {
        ImageKind::Static => transcode_static(data, max_edge),
        ImageKind::AnimatedGif => transcode_animated_gif(data, max_edge).or_else(|e| {
            tracing::warn!("GIF 动态转码失败，回退静态路径: {}", e);
            transcode_static(data, max_edge)
        }),
        ImageKind::AnimatedWebp => transcode_animated_webp(data, max_edge).or_else(|e| {
            tracing::warn!("动态 WebP 转码失败，回退静态路径: {}", e);
            transcode_static(data, max_edge)
        }),
    }
}

fn detect_kind(data: &[u8]) -> Result<ImageKind, TranscodeError> {
    let format = image::guess_format(data)
        .map_err(|e| TranscodeError::UnknownFormat(e.to_string()))?;

    match format {
        ImageFormat::Gif => {
            // 单帧 GIF 走静态路径
            let decoder = GifDecoder::new(Cursor::new(data))
                .map_err(|e| TranscodeError::DecodeFailed(e.to_string()))?;
            match decoder.into_frames().take(2).count() {
                0 | 1 => Ok(ImageKind::Static),
                _ => Ok(ImageKind::AnimatedGif),
            }
        }
        // 动态 WebP 的容器里带 ANIM 块
        ImageFormat::WebP => {
            let header = &data[..data.len().min(64)];
            if header.windows(4).any(|w| w == b"ANIM") {
                Ok(ImageKind::AnimatedWebp)
            } else {
                Ok(ImageKind::Static)
            }
        }
        _ => Ok(ImageKind::Static),
    }
}

/// 等比缩放后的目标尺寸：较长边压到 max_edge，另一边按比例缩放，
/// 下限 1px。已经不超限的尺寸原样返回。
pub fn bounded_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }
    if width >= height {
        let scaled = (height as u64 * max_edge as u64 / width as u64) as u32;
        (max_edge, scaled.max(1))
    } else {
        let scaled = (width as u64 * max_edge as u64 / height as u64) as u32;
        (scaled.max(1), max_edge)
    }
}

fn resize_rgba(rgba: &RgbaImage, max_edge: u32) -> RgbaImage {
    let (width, height) = rgba.dimensions();
    let (new_width, new_height) = bounded_dimensions(width, height, max_edge);
    if (new_width, new_height) == (width, height) {
        return rgba.clone();
    }
    image::imageops::resize(rgba, new_width, new_height, image::imageops::FilterType::Triangle)
}

/// 静态路径：首帧解码 -> 缩放 -> 有损 WebP
fn transcode_static(data: &[u8], max_edge: u32) -> Result<Thumbnail, TranscodeError> {
    let img = image::load_from_memory(data)
        .map_err(|e| TranscodeError::DecodeFailed(e.to_string()))?;

    let rgba = resize_rgba(&img.to_rgba8(), max_edge);
    let (width, height) = rgba.dimensions();

    let encoder = webp::Encoder::from_rgba(&rgba, width, height);
    let encoded = encoder.encode(WEBP_QUALITY);

    Ok(Thumbnail {
        bytes: encoded.to_vec(),
        content_type: "image/webp",
    })
}

/// 多帧 GIF -> 动态 WebP，保留所有帧与帧间隔
fn transcode_animated_gif(data: &[u8], max_edge: u32) -> Result<Thumbnail, TranscodeError> {
    let decoder = GifDecoder::new(Cursor::new(data))
        .map_err(|e| TranscodeError::DecodeFailed(e.to_string()))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| TranscodeError::DecodeFailed(e.to_string()))?;

    if frames.is_empty() {
        return Err(TranscodeError::DecodeFailed("GIF 没有可用帧".to_string()));
    }

    // 先缩放所有帧并累计时间戳，帧数据要在编码完成前保持存活
    let mut resized: Vec<(RgbaImage, i32)> = Vec::with_capacity(frames.len());
    let mut timestamp_ms: i32 = 0;
    for frame in &frames {
        let (numerator, denominator) = frame.delay().numer_denom_ms();
        timestamp_ms += (numerator / denominator.max(1)) as i32;
        resized.push((resize_rgba(frame.buffer(), max_edge), timestamp_ms));
    }

    let (width, height) = resized[0].0.dimensions();
    encode_animated_webp(&resized, width, height)
}

/// 动态 WebP -> 缩放后的动态 WebP
fn transcode_animated_webp(data: &[u8], max_edge: u32) -> Result<Thumbnail, TranscodeError> {
    let decoded = webp::AnimDecoder::new(data)
        .decode()
        .map_err(|e| TranscodeError::DecodeFailed(e.to_string()))?;

    let mut resized: Vec<(RgbaImage, i32)> = Vec::new();
    for frame in decoded.into_iter() {
        // get_image() 给的是裸 RGBA 字节
        let rgba = RgbaImage::from_raw(frame.width(), frame.height(), frame.get_image().to_vec())
            .ok_or_else(|| TranscodeError::DecodeFailed("动态 WebP 帧数据不完整".to_string()))?;
        resized.push((resize_rgba(&rgba, max_edge), frame.get_time_ms()));
    }

    if resized.is_empty() {
        return Err(TranscodeError::DecodeFailed(
            "动态 WebP 没有可用帧".to_string(),
        ));
    }

    let (width, height) = resized[0].0.dimensions();
    encode_animated_webp(&resized, width, height)
}

fn encode_animated_webp(
    frames: &[(RgbaImage, i32)],
    width: u32,
    height: u32,
) -> Result<Thumbnail, TranscodeError> {
    let mut config = webp::WebPConfig::new()
        .map_err(|_| TranscodeError::EncodeFailed("WebP 配置初始化失败".to_string()))?;
    config.quality = WEBP_QUALITY;
    config.lossless = 0;

    let mut encoder = webp::AnimEncoder::new(width, height, &config);
    for (frame, timestamp_ms) in frames {
        encoder.add_frame(webp::AnimFrame::from_rgba(
            frame.as_raw(),
            width,
            height,
            *timestamp_ms,
        ));
    }

    let encoded = encoder.encode();
    Ok(Thumbnail {
        bytes: encoded.to_vec(),
        content_type: "image/webp",
    })
}
