//! # Media 模块
//!
//! 异步指令所依赖的外部协作者接口与媒体数据类型。
//!
//! 解码、文件读取、混音、系统事件队列都不在本 crate 内实现，
//! 而是由宿主通过 [`MediaBackend`] 注入。

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::controller::WorkerContext;
use crate::error::MediaError;

/// 解码后的图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// 宽度（像素）
    pub width: u32,
    /// 高度（像素）
    pub height: u32,
    /// 是否带 alpha 通道（`allow_rgb` 为真时允许去掉 alpha）
    pub has_alpha: bool,
    /// 像素数据
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// 估算内存占用（字节）
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

/// 解码后的音频
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundData {
    /// 采样率
    pub sample_rate: u32,
    /// 声道数
    pub channels: u16,
    /// PCM 数据
    pub bytes: Vec<u8>,
}

/// 一帧解码结果（视频/音频/字幕）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    /// 展示时间戳，消费方据此安排帧的呈现
    pub timestamp: Duration,
    /// 帧数据
    pub data: Vec<u8>,
}

/// 音频格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundFormat {
    Wav,
    Ogg,
    Mp3,
    Flac,
    /// 未压缩 PCM
    Raw,
}

impl SoundFormat {
    /// 根据文件扩展名推断格式
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1;
        Self::from_str(ext).ok()
    }
}

impl FromStr for SoundFormat {
    type Err = ();

    /// 从字符串解析格式（不区分大小写）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "ogg" => Ok(Self::Ogg),
            "mp3" => Ok(Self::Mp3),
            "flac" => Ok(Self::Flac),
            "raw" | "pcm" => Ok(Self::Raw),
            _ => Err(()),
        }
    }
}

/// 一次声音播放请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundRequest {
    /// 音频路径
    pub path: String,
    /// 音频格式
    pub format: SoundFormat,
    /// 是否循环
    pub looping: bool,
    /// 混音通道
    pub channel: u32,
}

/// 播放结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// 正常播放完毕
    Completed,
    /// 因关闭请求被中断
    Interrupted,
}

/// 媒体后端
///
/// 所有方法都在工作线程上调用，且调用期间不持有任何队列锁。
/// 持续型队列（解复用、解码、事件）的方法会被反复调用，
/// 无新数据时应返回 `Ok(None)` / `0`，调度器会短暂退避。
pub trait MediaBackend: Send + Sync {
    /// 读取并解码一张图片
    fn load_image(&self, path: &str, allow_rgb: bool) -> Result<ImageData, MediaError>;

    /// 读取并解码一段音频
    fn load_sound(&self, path: &str) -> Result<SoundData, MediaError>;

    /// 播放一段声音，阻塞到播放结束
    ///
    /// 长时间播放时应周期性检查 [`WorkerContext::is_shutdown_requested`]，
    /// 检测到关闭请求后返回 [`PlaybackStatus::Interrupted`]。
    fn play_sound(
        &self,
        request: &SoundRequest,
        ctx: &WorkerContext<'_>,
    ) -> Result<PlaybackStatus, MediaError>;

    /// 解复用一轮容器数据包，返回读取的包数量
    fn demux_packets(&self) -> Result<usize, MediaError> {
        Ok(0)
    }

    /// 解码一帧视频
    fn decode_video_frame(&self) -> Result<Option<MediaFrame>, MediaError> {
        Ok(None)
    }

    /// 解码一帧音频
    fn decode_audio_frame(&self) -> Result<Option<MediaFrame>, MediaError> {
        Ok(None)
    }

    /// 解码一帧字幕并渲染到 `target`
    fn decode_subtitle_frame(&self, _target: u32) -> Result<Option<MediaFrame>, MediaError> {
        Ok(None)
    }

    /// 处理一次系统事件队列，返回处理的事件数
    fn pump_events(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_format_parse() {
        assert_eq!(SoundFormat::from_str("OGG"), Ok(SoundFormat::Ogg));
        assert_eq!(SoundFormat::from_str("pcm"), Ok(SoundFormat::Raw));
        assert!(SoundFormat::from_str("midi").is_err());
    }

    #[test]
    fn test_sound_format_from_path() {
        assert_eq!(SoundFormat::from_path("voice/a01.wav"), Some(SoundFormat::Wav));
        assert_eq!(SoundFormat::from_path("bgm/theme.Mp3"), Some(SoundFormat::Mp3));
        assert_eq!(SoundFormat::from_path("noext"), None);
    }
}
