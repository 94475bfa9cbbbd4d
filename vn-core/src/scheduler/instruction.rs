//! # Instruction 模块
//!
//! 异步指令的封闭集合，以及指令所属队列的定义。
//!
//! 每个指令变体只携带自身所需的参数，并且知道自己应当进入哪个队列。
//! 执行结果不直接返回给提交者，而是放入队列的结果列表。

use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::controller::WorkerContext;
use super::media::{ImageData, MediaFrame, PlaybackStatus, SoundRequest};
use crate::error::Terminate;

/// 固定的队列集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueId {
    /// 图片缓存加载
    ImageCache,
    /// 音频缓存加载
    SoundCache,
    /// 在工作线程内构建单张图片
    ImageLoad,
    /// 容器解复用
    PacketDemux,
    /// 视频帧解码
    VideoDecode,
    /// 音频帧解码
    AudioDecode,
    /// 字幕帧解码
    SubtitleDecode,
    /// 声音播放
    SoundPlayback,
    /// 系统事件轮询
    EventPump,
}

/// 队列运行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMode {
    /// 队列取空后工作线程退出；为 `false` 时线程从不在"有指令"信号量上等待
    pub quit_on_empty: bool,
    /// 逐个出队执行；为 `false` 时反复执行队首的同一条指令
    pub has_queue: bool,
}

impl QueueMode {
    /// 一次性指令队列
    pub const QUEUED: Self = Self {
        quit_on_empty: true,
        has_queue: true,
    };

    /// 持续执行队首指令的队列
    pub const CONTINUOUS: Self = Self {
        quit_on_empty: false,
        has_queue: false,
    };
}

impl QueueId {
    /// 全部队列，按索引顺序排列
    pub const ALL: [QueueId; 9] = [
        QueueId::ImageCache,
        QueueId::SoundCache,
        QueueId::ImageLoad,
        QueueId::PacketDemux,
        QueueId::VideoDecode,
        QueueId::AudioDecode,
        QueueId::SubtitleDecode,
        QueueId::SoundPlayback,
        QueueId::EventPump,
    ];

    /// 队列索引
    pub fn index(self) -> usize {
        self as usize
    }

    /// 队列运行方式
    pub fn mode(self) -> QueueMode {
        match self {
            QueueId::ImageCache
            | QueueId::SoundCache
            | QueueId::ImageLoad
            | QueueId::SoundPlayback => QueueMode::QUEUED,
            QueueId::PacketDemux
            | QueueId::VideoDecode
            | QueueId::AudioDecode
            | QueueId::SubtitleDecode
            | QueueId::EventPump => QueueMode::CONTINUOUS,
        }
    }

    /// 队列名（同时用作工作线程名）
    pub fn name(self) -> &'static str {
        match self {
            QueueId::ImageCache => "image-cache",
            QueueId::SoundCache => "sound-cache",
            QueueId::ImageLoad => "image-load",
            QueueId::PacketDemux => "packet-demux",
            QueueId::VideoDecode => "video-decode",
            QueueId::AudioDecode => "audio-decode",
            QueueId::SubtitleDecode => "subtitle-decode",
            QueueId::SoundPlayback => "sound-playback",
            QueueId::EventPump => "event-pump",
        }
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 异步指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// 按 id 缓存一张图片
    CacheImage {
        id: u32,
        path: String,
        allow_rgb: bool,
    },

    /// 按 id 缓存一段音频
    CacheSound { id: u32, path: String },

    /// 在工作线程内同步构建一张图片，结果交给 `target`
    LoadImage { target: u32, path: String },

    /// 解复用一轮容器数据包
    DemuxPackets,

    /// 解码一帧视频
    DecodeVideoFrame,

    /// 解码一帧音频
    DecodeAudioFrame,

    /// 解码一帧字幕
    DecodeSubtitleFrame { target: u32 },

    /// 播放一段声音
    PlaySound(SoundRequest),

    /// 轮询系统事件队列
    PumpEvents,
}

/// 指令产出
///
/// 载荷为空（`None` / `loaded: false`）表示指令内部失败，
/// 调度层本身仍视为执行成功。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionOutput {
    /// 图片已进入缓存
    ImageCached { id: u32, loaded: bool },
    /// 音频已进入缓存
    SoundCached { id: u32, loaded: bool },
    /// 图片构建完成
    ImageLoaded {
        target: u32,
        image: Option<Arc<ImageData>>,
    },
    /// 一轮解复用读取的数据包数
    Packets { count: usize },
    /// 视频帧
    VideoFrame(MediaFrame),
    /// 音频帧
    AudioFrame(MediaFrame),
    /// 字幕帧
    SubtitleFrame { target: u32, frame: MediaFrame },
    /// 声音播放结束
    SoundPlayed { channel: u32, completed: bool },
    /// 处理了若干系统事件
    Events { count: usize },
}

impl Instruction {
    /// 指令所属队列
    pub fn queue(&self) -> QueueId {
        match self {
            Instruction::CacheImage { .. } => QueueId::ImageCache,
            Instruction::CacheSound { .. } => QueueId::SoundCache,
            Instruction::LoadImage { .. } => QueueId::ImageLoad,
            Instruction::DemuxPackets => QueueId::PacketDemux,
            Instruction::DecodeVideoFrame => QueueId::VideoDecode,
            Instruction::DecodeAudioFrame => QueueId::AudioDecode,
            Instruction::DecodeSubtitleFrame { .. } => QueueId::SubtitleDecode,
            Instruction::PlaySound(_) => QueueId::SoundPlayback,
            Instruction::PumpEvents => QueueId::EventPump,
        }
    }

    /// 在工作线程上执行指令
    ///
    /// 执行期间不得触碰所属队列。资源错误只记录日志并产生空载荷；
    /// 持续型指令出错时不产生结果，由调度器退避后重试。
    pub(crate) fn execute(
        &self,
        ctx: &WorkerContext<'_>,
    ) -> Result<Option<InstructionOutput>, Terminate> {
        let backend = ctx.backend();

        match self {
            Instruction::CacheImage {
                id,
                path,
                allow_rgb,
            } => {
                if ctx.images().contains(*id) {
                    return Ok(Some(InstructionOutput::ImageCached {
                        id: *id,
                        loaded: true,
                    }));
                }
                let loaded = match backend.load_image(path, *allow_rgb) {
                    Ok(image) => {
                        ctx.images().insert(*id, image);
                        true
                    }
                    Err(e) => {
                        warn!(id = *id, path = %path, error = %e, "图片缓存失败");
                        false
                    }
                };
                Ok(Some(InstructionOutput::ImageCached { id: *id, loaded }))
            }

            Instruction::CacheSound { id, path } => {
                if ctx.sounds().contains(*id) {
                    return Ok(Some(InstructionOutput::SoundCached {
                        id: *id,
                        loaded: true,
                    }));
                }
                let loaded = match backend.load_sound(path) {
                    Ok(sound) => {
                        ctx.sounds().insert(*id, sound);
                        true
                    }
                    Err(e) => {
                        warn!(id = *id, path = %path, error = %e, "音频缓存失败");
                        false
                    }
                };
                Ok(Some(InstructionOutput::SoundCached { id: *id, loaded }))
            }

            Instruction::LoadImage { target, path } => {
                let image = match backend.load_image(path, false) {
                    Ok(image) => Some(Arc::new(image)),
                    Err(e) => {
                        warn!(target = *target, path = %path, error = %e, "图片构建失败");
                        None
                    }
                };
                Ok(Some(InstructionOutput::ImageLoaded {
                    target: *target,
                    image,
                }))
            }

            Instruction::DemuxPackets => {
                ctx.checkpoint()?;
                match backend.demux_packets() {
                    Ok(0) => Ok(None),
                    Ok(count) => Ok(Some(InstructionOutput::Packets { count })),
                    Err(e) => {
                        warn!(error = %e, "解复用失败");
                        Ok(None)
                    }
                }
            }

            Instruction::DecodeVideoFrame => {
                ctx.checkpoint()?;
                Ok(continuous_frame(backend.decode_video_frame(), "视频")
                    .map(InstructionOutput::VideoFrame))
            }

            Instruction::DecodeAudioFrame => {
                ctx.checkpoint()?;
                Ok(continuous_frame(backend.decode_audio_frame(), "音频")
                    .map(InstructionOutput::AudioFrame))
            }

            Instruction::DecodeSubtitleFrame { target } => {
                ctx.checkpoint()?;
                Ok(
                    continuous_frame(backend.decode_subtitle_frame(*target), "字幕").map(
                        |frame| InstructionOutput::SubtitleFrame {
                            target: *target,
                            frame,
                        },
                    ),
                )
            }

            Instruction::PlaySound(request) => match backend.play_sound(request, ctx) {
                Ok(PlaybackStatus::Completed) => Ok(Some(InstructionOutput::SoundPlayed {
                    channel: request.channel,
                    completed: true,
                })),
                Ok(PlaybackStatus::Interrupted) if ctx.is_shutdown_requested() => Err(Terminate),
                // 非关闭引起的中断（例如通道被混音器截断）只是一次未完成的播放
                Ok(PlaybackStatus::Interrupted) => Ok(Some(InstructionOutput::SoundPlayed {
                    channel: request.channel,
                    completed: false,
                })),
                Err(e) => {
                    warn!(path = %request.path, channel = request.channel, error = %e, "声音播放失败");
                    Ok(Some(InstructionOutput::SoundPlayed {
                        channel: request.channel,
                        completed: false,
                    }))
                }
            },

            Instruction::PumpEvents => {
                ctx.checkpoint()?;
                match backend.pump_events() {
                    0 => Ok(None),
                    count => Ok(Some(InstructionOutput::Events { count })),
                }
            }
        }
    }
}

fn continuous_frame(
    result: Result<Option<MediaFrame>, crate::error::MediaError>,
    kind: &str,
) -> Option<MediaFrame> {
    match result {
        Ok(frame) => frame,
        Err(e) => {
            warn!(kind = kind, error = %e, "帧解码失败");
            None
        }
    }
}
