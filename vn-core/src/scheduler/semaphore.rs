//! # Semaphore 模块
//!
//! 基于 `Mutex + Condvar` 的计数信号量。

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// 计数信号量
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    /// 创建初始计数为 `initial` 的信号量
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    /// 计数加一并唤醒一个等待者
    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cond.notify_one();
    }

    /// 阻塞等待，直到计数大于 0，然后减一
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    /// 带超时的等待
    ///
    /// 成功获取返回 `true`，超时返回 `false`。
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count == 0 {
            if self.cond.wait_until(&mut count, deadline).timed_out() && *count == 0 {
                return false;
            }
        }
        *count -= 1;
        true
    }

    /// 非阻塞获取
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// 重建为零计数，返回被丢弃的计数
    pub fn reset(&self) -> usize {
        std::mem::take(&mut *self.count.lock())
    }

    /// 当前计数
    pub fn count(&self) -> usize {
        *self.count.lock()
    }
}
