//! 异步队列的端到端行为：FIFO 顺序、关闭与终止、单工作线程。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use vn_core::{
    AsyncController, ImageData, InstructionOutput, MediaBackend, MediaError, PlaybackStatus,
    QueueId, SchedulerConfig, SoundData, SoundFormat, SoundRequest, WorkerContext,
};

/// 记录调用顺序的后端；`gate` 关闭时加载会一直等待
struct RecordingBackend {
    calls: Mutex<Vec<String>>,
    gate: AtomicBool,
    delay: Duration,
}

impl RecordingBackend {
    fn new(delay: Duration) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            gate: AtomicBool::new(true),
            delay,
        }
    }

    fn closed() -> Self {
        let backend = Self::new(Duration::ZERO);
        backend.gate.store(false, Ordering::SeqCst);
        backend
    }

    fn pass_gate(&self) {
        while !self.gate.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

impl MediaBackend for RecordingBackend {
    fn load_image(&self, path: &str, _allow_rgb: bool) -> Result<ImageData, MediaError> {
        self.pass_gate();
        self.calls.lock().push(path.to_string());
        Ok(ImageData {
            width: 1,
            height: 1,
            has_alpha: true,
            pixels: vec![0; 4],
        })
    }

    fn load_sound(&self, path: &str) -> Result<SoundData, MediaError> {
        self.pass_gate();
        self.calls.lock().push(path.to_string());
        Ok(SoundData {
            sample_rate: 22_050,
            channels: 1,
            bytes: Vec::new(),
        })
    }

    fn play_sound(
        &self,
        _request: &SoundRequest,
        _ctx: &WorkerContext<'_>,
    ) -> Result<PlaybackStatus, MediaError> {
        Ok(PlaybackStatus::Completed)
    }
}

fn collect(ctrl: &AsyncController, id: QueueId, count: usize) -> Vec<InstructionOutput> {
    let mut out = Vec::new();
    while out.len() < count {
        let mut rounds = 0;
        match ctrl.wait_result(id, || {
            rounds += 1;
            rounds < 1000
        }) {
            Some(output) => out.push(output),
            None => break,
        }
    }
    out
}

#[test]
fn test_queue_executes_in_fifo_order() {
    let backend = Arc::new(RecordingBackend::new(Duration::ZERO));
    let ctrl = AsyncController::new(backend.clone(), &SchedulerConfig::default());

    for id in 1..=6 {
        ctrl.cache_image(id, format!("cg/{id}.png"), false);
    }

    let ids: Vec<u32> = collect(&ctrl, QueueId::ImageCache, 6)
        .into_iter()
        .map(|output| match output {
            InstructionOutput::ImageCached { id, loaded } => {
                assert!(loaded);
                id
            }
            other => panic!("unexpected output: {other:?}"),
        })
        .collect();

    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(
        *backend.calls.lock(),
        (1..=6).map(|id| format!("cg/{id}.png")).collect::<Vec<_>>()
    );
    assert_eq!(ctrl.image_cache().len(), 6);
}

#[test]
fn test_shutdown_all_clears_pending_and_workers() {
    let backend = Arc::new(RecordingBackend::new(Duration::from_millis(20)));
    let ctrl = AsyncController::new(backend, &SchedulerConfig::default());

    ctrl.cache_image(1, "a.png", false);
    ctrl.cache_image(2, "b.png", false);
    ctrl.cache_image(3, "c.png", false);
    ctrl.load_video_frames();
    ctrl.start_event_pump();

    ctrl.shutdown_all();

    for id in QueueId::ALL {
        assert_eq!(ctrl.pending_len(id), 0, "queue {id} still has pending work");
        assert!(!ctrl.has_worker(id), "queue {id} still has a worker");
    }
}

#[test]
fn test_queue_usable_after_shutdown() {
    let backend = Arc::new(RecordingBackend::new(Duration::ZERO));
    let ctrl = AsyncController::new(backend, &SchedulerConfig::default());

    ctrl.shutdown_all();
    ctrl.cache_sound(7, "voice/7.ogg");

    assert_eq!(
        collect(&ctrl, QueueId::SoundCache, 1),
        vec![InstructionOutput::SoundCached { id: 7, loaded: true }]
    );
}

#[test]
fn test_concurrent_producers_share_one_worker() {
    let backend = Arc::new(RecordingBackend::closed());
    let ctrl = AsyncController::new(backend.clone(), &SchedulerConfig::default());

    thread::scope(|scope| {
        for producer in 0..4u32 {
            let ctrl = &ctrl;
            scope.spawn(move || {
                for n in 0..5u32 {
                    ctrl.cache_sound(producer * 100 + n, format!("se/{producer}-{n}.wav"));
                }
            });
        }
    });

    assert_eq!(ctrl.spawn_count(QueueId::SoundCache), 1);
    assert!(ctrl.has_worker(QueueId::SoundCache));

    backend.gate.store(true, Ordering::SeqCst);
    assert_eq!(collect(&ctrl, QueueId::SoundCache, 20).len(), 20);
    assert_eq!(ctrl.sound_cache().len(), 20);
}

/// 播放后端：`held` 为真时一直播放到收到关闭请求；`cut_channel` 上的播放立即被混音器截断
struct PlaybackBackend {
    held: AtomicBool,
    playing: AtomicBool,
    cut_channel: Option<u32>,
}

impl PlaybackBackend {
    fn new(held: bool, cut_channel: Option<u32>) -> Self {
        Self {
            held: AtomicBool::new(held),
            playing: AtomicBool::new(false),
            cut_channel,
        }
    }
}

impl MediaBackend for PlaybackBackend {
    fn load_image(&self, path: &str, _allow_rgb: bool) -> Result<ImageData, MediaError> {
        Err(MediaError::NotFound {
            path: path.to_string(),
        })
    }

    fn load_sound(&self, path: &str) -> Result<SoundData, MediaError> {
        Err(MediaError::NotFound {
            path: path.to_string(),
        })
    }

    fn play_sound(
        &self,
        request: &SoundRequest,
        ctx: &WorkerContext<'_>,
    ) -> Result<PlaybackStatus, MediaError> {
        if self.cut_channel == Some(request.channel) {
            return Ok(PlaybackStatus::Interrupted);
        }

        self.playing.store(true, Ordering::SeqCst);
        while self.held.load(Ordering::SeqCst) && !ctx.is_shutdown_requested() {
            thread::sleep(Duration::from_millis(1));
        }
        self.playing.store(false, Ordering::SeqCst);

        if ctx.is_shutdown_requested() {
            Ok(PlaybackStatus::Interrupted)
        } else {
            Ok(PlaybackStatus::Completed)
        }
    }
}

#[test]
fn test_shutdown_interrupts_long_playback() {
    let backend = Arc::new(PlaybackBackend::new(true, None));
    let ctrl = AsyncController::new(backend.clone(), &SchedulerConfig::default());

    ctrl.play_sound("bgm/loop.ogg", SoundFormat::Ogg, true, 1);
    ctrl.play_sound("se/next.wav", SoundFormat::Wav, false, 2);

    let mut waited = 0;
    while !backend.playing.load(Ordering::SeqCst) && waited < 2000 {
        thread::sleep(Duration::from_millis(1));
        waited += 1;
    }
    assert!(backend.playing.load(Ordering::SeqCst));

    thread::scope(|scope| {
        scope.spawn(|| ctrl.shutdown_all()).join().unwrap();
    });

    assert!(!ctrl.has_worker(QueueId::SoundPlayback));
    assert_eq!(ctrl.pending_len(QueueId::SoundPlayback), 0);
    assert!(ctrl.take_results(QueueId::SoundPlayback).is_empty());

    backend.held.store(false, Ordering::SeqCst);
    ctrl.play_sound("se/after.wav", SoundFormat::Wav, false, 3);
    assert_eq!(
        collect(&ctrl, QueueId::SoundPlayback, 1),
        vec![InstructionOutput::SoundPlayed {
            channel: 3,
            completed: true
        }]
    );
}

#[test]
fn test_cut_playback_does_not_strand_next_sound() {
    let backend = Arc::new(PlaybackBackend::new(false, Some(1)));
    let ctrl = AsyncController::new(backend, &SchedulerConfig::default());

    ctrl.play_sound("voice/cut.ogg", SoundFormat::Ogg, false, 1);
    ctrl.play_sound("voice/next.ogg", SoundFormat::Ogg, false, 2);

    assert_eq!(
        collect(&ctrl, QueueId::SoundPlayback, 2),
        vec![
            InstructionOutput::SoundPlayed {
                channel: 1,
                completed: false
            },
            InstructionOutput::SoundPlayed {
                channel: 2,
                completed: true
            },
        ]
    );
    assert_eq!(ctrl.pending_len(QueueId::SoundPlayback), 0);
}
