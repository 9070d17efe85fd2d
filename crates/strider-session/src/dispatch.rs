//! SDK 调用分发
//!
//! SDK 的所有方法都是阻塞调用，不能占用调用方线程太久。
//! [`SdkWorkerPool`] 维护固定数量的工作线程和一个有界命令队列：
//! 调用方提交闭包，拿到 [`Pending`] 凭据，再以超时等待结果。
//!
//! 队列满时立即拒绝（不阻塞提交方），工作线程退出则所有
//! 未完成的 [`Pending`] 报 `WorkerGone`。

use std::thread::{JoinHandle, spawn};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::SessionError;

/// 提交给工作线程的任务
type Job = Box<dyn FnOnce() + Send>;

/// 分发层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// 命令队列已满
    #[error("sdk command queue is full")]
    QueueFull,

    /// 等待结果超时
    #[error("sdk call timed out")]
    Timeout,

    /// 工作线程已退出（池已关闭或线程 panic）
    #[error("sdk worker is gone")]
    WorkerGone,
}

impl DispatchError {
    /// 转换为会话层错误
    pub(crate) fn into_session_error(self, timeout: Duration) -> SessionError {
        match self {
            Self::QueueFull => SessionError::SdkUnavailable("sdk command queue full".to_string()),
            Self::Timeout => SessionError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            },
            Self::WorkerGone => SessionError::SdkUnavailable("sdk worker exited".to_string()),
        }
    }
}

/// 未完成 SDK 调用的结果凭据
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<T>,
}

impl<T> Pending<T> {
    /// 等待结果，超时返回 [`DispatchError::Timeout`]
    pub fn wait(self, timeout: Duration) -> Result<T, DispatchError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            crossbeam_channel::RecvTimeoutError::Timeout => DispatchError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => DispatchError::WorkerGone,
        })
    }
}

/// SDK 工作线程池
///
/// `job_tx` 为 `Option` 是为了在 [`SdkWorkerPool::shutdown`] 和
/// `Drop` 中显式丢弃发送端，让工作线程的 `recv` 返回错误而退出。
#[derive(Debug)]
pub struct SdkWorkerPool {
    job_tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl SdkWorkerPool {
    /// 创建线程池
    ///
    /// `worker_threads` 个线程共享一条深度为 `queue_depth` 的命令队列。
    pub fn new(worker_threads: usize, queue_depth: usize) -> Self {
        let (job_tx, job_rx) = bounded::<Job>(queue_depth);
        let workers = (0..worker_threads.max(1))
            .map(|i| {
                let rx = job_rx.clone();
                spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                    debug!(worker = i, "sdk worker exiting");
                })
            })
            .collect();
        Self {
            job_tx: Some(job_tx),
            workers,
        }
    }

    /// 提交一个阻塞调用，返回结果凭据
    ///
    /// 队列满立即返回 [`DispatchError::QueueFull`]，不阻塞调用方。
    pub fn submit<T, F>(&self, f: F) -> Result<Pending<T>, DispatchError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let tx = self.job_tx.as_ref().ok_or(DispatchError::WorkerGone)?;
        let (result_tx, result_rx) = bounded::<T>(1);
        let job: Job = Box::new(move || {
            let result = f();
            // 接收端可能已超时放弃，忽略发送失败
            let _ = result_tx.send(result);
        });
        match tx.try_send(job) {
            Ok(()) => Ok(Pending { rx: result_rx }),
            Err(TrySendError::Full(_)) => Err(DispatchError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::WorkerGone),
        }
    }

    /// 提交并等待，错误统一映射为会话层错误
    pub fn call<T, F>(&self, timeout: Duration, f: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.submit(f)
            .and_then(|pending| pending.wait(timeout))
            .map_err(|err| err.into_session_error(timeout))
    }

    /// 关闭线程池并等待所有工作线程退出
    pub fn shutdown(&mut self) {
        drop(self.job_tx.take());
        let timeout = Duration::from_secs(2);
        for (i, handle) in self.workers.drain(..).enumerate() {
            if handle.join_timeout(timeout).is_err() {
                warn!(worker = i, ?timeout, "sdk worker did not exit in time");
            }
        }
    }
}

impl Drop for SdkWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Extension trait for timeout-capable thread joins
pub(crate) trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程代为 join，自己带超时等结果
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}
