//! # Scheduler 模块
//!
//! 异步任务调度：固定的一组命名队列，每个队列至多一个按需启动的工作线程，
//! 用于把图片/音频加载、音视频解码、声音播放等阻塞工作移出主线程。
//!
//! ## 模块结构
//!
//! - [`semaphore`]：计数信号量
//! - [`instruction`]：指令集合与队列标识
//! - [`media`]：媒体后端接口与媒体数据类型
//! - [`cache`]：按 id 索引的媒体缓存
//! - [`controller`]：异步控制器
//!
//! 队列本身（工作线程循环与停止例程）是内部实现。

pub mod cache;
pub mod controller;
pub mod instruction;
pub mod media;
mod queue;
pub mod semaphore;

pub use cache::{CacheStats, MediaCache};
pub use controller::{AsyncController, WorkerContext};
pub use instruction::{Instruction, InstructionOutput, QueueId, QueueMode};
pub use media::{
    ImageData, MediaBackend, MediaFrame, PlaybackStatus, SoundData, SoundFormat, SoundRequest,
};
pub use semaphore::Semaphore;
