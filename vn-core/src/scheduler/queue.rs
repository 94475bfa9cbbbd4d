//! # Queue 模块
//!
//! 单个异步指令队列及其工作线程循环。
//!
//! ## 锁约定
//!
//! - `state`（待执行列表 + 线程句柄）只在列表增删、线程句柄读写时短暂持有
//! - `results` 是独立的锁，消费结果与提交新指令互不阻塞
//! - 执行指令期间不持有任何队列锁
//! - `quit` 标志只在持有 `state` 锁时修改
//!
//! 工作线程的存活由 `JoinHandle` 表示：停止例程取走句柄并 join，
//! join 返回即说明线程已经完全退出。

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

use super::controller::{Shared, WorkerContext};
use super::instruction::{Instruction, InstructionOutput, QueueId, QueueMode};
use super::semaphore::Semaphore;

#[derive(Debug, Default)]
struct QueueState {
    /// 待执行指令（FIFO）
    pending: VecDeque<Instruction>,
    /// 工作线程句柄，首次提交前为空
    worker: Option<JoinHandle<()>>,
}

/// 异步指令队列
#[derive(Debug)]
pub(crate) struct AsyncQueue {
    id: QueueId,
    mode: QueueMode,
    state: Mutex<QueueState>,
    quit: AtomicBool,
    results: Mutex<VecDeque<InstructionOutput>>,
    instruction_ready: Semaphore,
    result_ready: Semaphore,
    /// 累计创建的工作线程数
    spawned: AtomicUsize,
}

impl AsyncQueue {
    pub(crate) fn new(id: QueueId) -> Self {
        Self {
            id,
            mode: id.mode(),
            state: Mutex::new(QueueState::default()),
            quit: AtomicBool::new(false),
            results: Mutex::new(VecDeque::new()),
            instruction_ready: Semaphore::new(0),
            result_ready: Semaphore::new(0),
            spawned: AtomicUsize::new(0),
        }
    }

    pub(crate) fn id(&self) -> QueueId {
        self.id
    }

    /// 是否已请求停止本队列
    pub(crate) fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// 提交一条指令，必要时启动工作线程
    pub(crate) fn push(&self, instruction: Instruction, shared: &Arc<Shared>) {
        let mut state = self.state.lock();
        state.pending.push_back(instruction);

        if self.mode.quit_on_empty {
            self.instruction_ready.post();
        }

        // 工作线程在持有本锁时决定退出并清空句柄；
        // 只有停止例程进行中被终止的线程会留下已结束的句柄
        let alive = state
            .worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if alive {
            return;
        }

        let shared = Arc::clone(shared);
        let id = self.id;
        match thread::Builder::new()
            .name(format!("vn-{}", id.name()))
            .spawn(move || run_worker(shared, id))
        {
            Ok(handle) => {
                state.worker = Some(handle);
                self.spawned.fetch_add(1, Ordering::Relaxed);
                debug!(queue = %id, "工作线程已启动");
            }
            Err(e) => {
                error!(queue = %id, error = %e, "工作线程启动失败");
            }
        }
    }

    /// 停止例程
    ///
    /// 请求退出、唤醒并 join 工作线程，然后清空待执行列表与结果，
    /// 把两个信号量都重置为零。返回时队列回到初始状态。
    pub(crate) fn stop(&self) {
        let handle = {
            let mut state = self.state.lock();
            self.quit.store(true, Ordering::Release);
            if self.mode.quit_on_empty {
                self.instruction_ready.post();
            }
            state.worker.take()
        };

        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!(queue = %self.id, "工作线程异常退出");
        }

        let dropped = {
            let mut state = self.state.lock();
            let dropped = state.pending.len();
            state.pending.clear();
            self.instruction_ready.reset();
            self.quit.store(false, Ordering::Release);
            dropped
        };

        self.results.lock().clear();
        self.result_ready.reset();

        if dropped > 0 {
            debug!(queue = %self.id, dropped, "丢弃未执行的指令");
        }
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// 是否有存活的工作线程
    pub(crate) fn has_worker(&self) -> bool {
        self.state
            .lock()
            .worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub(crate) fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// 取走全部结果
    pub(crate) fn take_results(&self) -> Vec<InstructionOutput> {
        let drained: Vec<_> = self.results.lock().drain(..).collect();
        for _ in 0..drained.len() {
            if !self.result_ready.try_wait() {
                break;
            }
        }
        drained
    }

    /// 取走最早的一个结果
    pub(crate) fn try_take_result(&self) -> Option<InstructionOutput> {
        let output = self.results.lock().pop_front();
        if output.is_some() {
            self.result_ready.try_wait();
        }
        output
    }

    /// 取走一个结果，对应的信号已由调用方等待消耗
    pub(crate) fn take_one_signalled(&self) -> Option<InstructionOutput> {
        self.results.lock().pop_front()
    }

    pub(crate) fn result_ready(&self) -> &Semaphore {
        &self.result_ready
    }

    fn push_result(&self, output: InstructionOutput) {
        self.results.lock().push_back(output);
    }
}

/// 工作线程主循环
fn run_worker(shared: Arc<Shared>, id: QueueId) {
    let queue = shared.queue(id);
    let mode = queue.mode;
    let ctx = WorkerContext::new(&shared, queue);

    debug!(queue = %id, "工作线程开始循环");

    loop {
        // 由停止例程 join，句柄留给它处理
        if shared.is_shutdown_requested() || queue.quit_requested() {
            break;
        }

        if mode.quit_on_empty {
            queue.instruction_ready.wait();
            if shared.is_shutdown_requested() || queue.quit_requested() {
                break;
            }
        }

        let instruction = {
            let mut state = queue.state.lock();
            if mode.has_queue {
                state.pending.pop_front()
            } else {
                state.pending.front().cloned()
            }
        };

        let Some(instruction) = instruction else {
            if mode.quit_on_empty {
                let mut state = queue.state.lock();
                if state.pending.is_empty() && !queue.quit_requested() {
                    state.worker = None;
                    debug!(queue = %id, "队列为空，工作线程退出");
                    return;
                }
                continue;
            }
            thread::sleep(shared.idle_sleep());
            continue;
        };

        let output = match instruction.execute(&ctx) {
            Ok(output) => output,
            Err(_terminate) => {
                let mut state = queue.state.lock();
                queue.result_ready.post();
                // 停止例程正在进行时句柄留给它 join；否则清空句柄，下次提交重新启动线程
                if !shared.is_shutdown_requested() && !queue.quit_requested() {
                    state.worker = None;
                }
                debug!(queue = %id, "指令被终止，工作线程退出");
                return;
            }
        };

        let produced = output.is_some();
        if let Some(output) = output {
            queue.push_result(output);
        }

        let mut state = queue.state.lock();
        if mode.has_queue {
            queue.result_ready.post();
        }

        if shared.is_shutdown_requested() || queue.quit_requested() {
            break;
        }

        if mode.quit_on_empty && state.pending.is_empty() {
            state.worker = None;
            debug!(queue = %id, "队列已取空，工作线程退出");
            return;
        }
        drop(state);

        if !mode.has_queue && !produced {
            thread::sleep(shared.idle_sleep());
        }
    }

    debug!(queue = %id, "工作线程收到停止请求");
}
