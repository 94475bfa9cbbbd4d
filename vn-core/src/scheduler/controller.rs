//! # Controller 模块
//!
//! 异步控制器：持有固定的队列集合、媒体缓存与后端，对外提供提交指令、
//! 读取结果、全局关闭等操作。
//!
//! ## 设计原则
//!
//! - 控制器由宿主在启动时构造，并以引用传给需要它的组件，不使用全局单例
//! - 队列集合在构造时固定，之后不再增减
//! - `Drop` 时执行 [`AsyncController::shutdown_all`]，保证不遗留工作线程

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::cache::MediaCache;
use super::instruction::{Instruction, InstructionOutput, QueueId};
use super::media::{ImageData, MediaBackend, SoundData, SoundFormat, SoundRequest};
use super::queue::AsyncQueue;
use crate::config::SchedulerConfig;
use crate::error::Terminate;

/// 控制器与工作线程共享的状态
pub(crate) struct Shared {
    backend: Arc<dyn MediaBackend>,
    queues: Vec<AsyncQueue>,
    images: MediaCache<ImageData>,
    sounds: MediaCache<SoundData>,
    shutdown: AtomicBool,
    idle_sleep: Duration,
}

impl Shared {
    pub(crate) fn queue(&self, id: QueueId) -> &AsyncQueue {
        &self.queues[id.index()]
    }

    pub(crate) fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn idle_sleep(&self) -> Duration {
        self.idle_sleep
    }
}

/// 指令执行上下文
///
/// 只在工作线程上存在，借用共享状态。
pub struct WorkerContext<'a> {
    shared: &'a Shared,
    queue: &'a AsyncQueue,
}

impl<'a> WorkerContext<'a> {
    pub(crate) fn new(shared: &'a Shared, queue: &'a AsyncQueue) -> Self {
        Self { shared, queue }
    }

    /// 当前指令所在队列
    pub fn queue_id(&self) -> QueueId {
        self.queue.id()
    }

    /// 是否已请求全局关闭或停止本队列
    pub fn is_shutdown_requested(&self) -> bool {
        self.shared.is_shutdown_requested() || self.queue.quit_requested()
    }

    /// 关闭检查点，已请求关闭时返回 `Err(Terminate)`
    pub fn checkpoint(&self) -> Result<(), Terminate> {
        if self.is_shutdown_requested() {
            Err(Terminate)
        } else {
            Ok(())
        }
    }

    pub(crate) fn backend(&self) -> &dyn MediaBackend {
        self.shared.backend.as_ref()
    }

    pub(crate) fn images(&self) -> &MediaCache<ImageData> {
        &self.shared.images
    }

    pub(crate) fn sounds(&self) -> &MediaCache<SoundData> {
        &self.shared.sounds
    }
}

/// 异步控制器
pub struct AsyncController {
    shared: Arc<Shared>,
    result_poll_interval: Duration,
}

impl fmt::Debug for AsyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncController")
            .field("images", &self.shared.images.len())
            .field("sounds", &self.shared.sounds.len())
            .field("shutdown", &self.shared.is_shutdown_requested())
            .finish()
    }
}

impl AsyncController {
    /// 创建控制器并初始化全部队列（不启动任何线程）
    pub fn new(backend: Arc<dyn MediaBackend>, config: &SchedulerConfig) -> Self {
        let queues = QueueId::ALL.iter().map(|&id| AsyncQueue::new(id)).collect();
        Self {
            shared: Arc::new(Shared {
                backend,
                queues,
                images: MediaCache::new(),
                sounds: MediaCache::new(),
                shutdown: AtomicBool::new(false),
                idle_sleep: config.idle_sleep(),
            }),
            result_poll_interval: config.result_poll_interval(),
        }
    }

    /// 提交一条指令到它所属的队列
    pub fn enqueue(&self, instruction: Instruction) {
        let id = instruction.queue();
        self.shared.queue(id).push(instruction, &self.shared);
    }

    /// 缓存图片
    pub fn cache_image(&self, id: u32, path: impl Into<String>, allow_rgb: bool) {
        self.enqueue(Instruction::CacheImage {
            id,
            path: path.into(),
            allow_rgb,
        });
    }

    /// 缓存音频
    pub fn cache_sound(&self, id: u32, path: impl Into<String>) {
        self.enqueue(Instruction::CacheSound {
            id,
            path: path.into(),
        });
    }

    /// 在工作线程内构建图片，结果通过 [`QueueId::ImageLoad`] 返回
    pub fn load_image_async(&self, target: u32, path: impl Into<String>) {
        self.enqueue(Instruction::LoadImage {
            target,
            path: path.into(),
        });
    }

    /// 启动解复用循环
    pub fn load_packet_arrays(&self) {
        self.enqueue(Instruction::DemuxPackets);
    }

    /// 启动视频帧解码循环
    pub fn load_video_frames(&self) {
        self.enqueue(Instruction::DecodeVideoFrame);
    }

    /// 启动音频帧解码循环
    pub fn load_audio_frames(&self) {
        self.enqueue(Instruction::DecodeAudioFrame);
    }

    /// 启动字幕帧解码循环
    pub fn load_subtitle_frames(&self, target: u32) {
        self.enqueue(Instruction::DecodeSubtitleFrame { target });
    }

    /// 播放声音
    pub fn play_sound(
        &self,
        path: impl Into<String>,
        format: SoundFormat,
        looping: bool,
        channel: u32,
    ) {
        self.enqueue(Instruction::PlaySound(SoundRequest {
            path: path.into(),
            format,
            looping,
            channel,
        }));
    }

    /// 启动系统事件轮询
    pub fn start_event_pump(&self) {
        self.enqueue(Instruction::PumpEvents);
    }

    /// 停止所有队列
    ///
    /// 阻塞到每个工作线程都已退出。返回后所有队列的待执行列表为空、
    /// 线程句柄为空，队列可以继续使用。
    pub fn shutdown_all(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        for queue in &self.shared.queues {
            queue.stop();
        }
        self.shared.shutdown.store(false, Ordering::Release);
        info!("所有异步队列已停止");
    }

    /// 停止单个队列（例如结束一段视频的解码循环）
    pub fn stop_queue(&self, id: QueueId) {
        self.shared.queue(id).stop();
        debug!(queue = %id, "队列已停止");
    }

    /// 取走队列中已有的全部结果
    pub fn take_results(&self, id: QueueId) -> Vec<InstructionOutput> {
        self.shared.queue(id).take_results()
    }

    /// 取走队列中最早的一个结果
    pub fn try_take_result(&self, id: QueueId) -> Option<InstructionOutput> {
        self.shared.queue(id).try_take_result()
    }

    /// 等待队列产出一个结果
    ///
    /// 以短超时反复等待结果信号量，每次超时后调用 `pump` 处理宿主事件，
    /// 主线程因此不会被完全阻塞。`pump` 返回 `false` 时放弃等待并返回 `None`。
    pub fn wait_result(
        &self,
        id: QueueId,
        mut pump: impl FnMut() -> bool,
    ) -> Option<InstructionOutput> {
        let queue = self.shared.queue(id);
        loop {
            if let Some(output) = queue.try_take_result() {
                return Some(output);
            }
            if queue.result_ready().wait_timeout(self.result_poll_interval) {
                // 信号已被本次等待消耗，直接取结果
                if let Some(output) = queue.take_one_signalled() {
                    return Some(output);
                }
                continue;
            }
            if !pump() {
                return None;
            }
        }
    }

    /// 队列中待执行的指令数
    pub fn pending_len(&self, id: QueueId) -> usize {
        self.shared.queue(id).pending_len()
    }

    /// 队列是否有存活的工作线程
    pub fn has_worker(&self, id: QueueId) -> bool {
        self.shared.queue(id).has_worker()
    }

    /// 队列累计创建过的工作线程数
    pub fn spawn_count(&self, id: QueueId) -> usize {
        self.shared.queue(id).spawn_count()
    }

    /// 图片缓存
    pub fn image_cache(&self) -> &MediaCache<ImageData> {
        &self.shared.images
    }

    /// 音频缓存
    pub fn sound_cache(&self) -> &MediaCache<SoundData> {
        &self.shared.sounds
    }
}

impl Drop for AsyncController {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}
