//! 有序并发扇出
//!
//! 所有子任务一次性启动，各自把结果写入自己的槽位。
//! 输出顺序与输入顺序一致，与完成顺序无关。

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;

/// 单个子任务的结果
#[derive(Debug)]
pub struct BatchItem<T, E> {
    pub index: usize,
    /// `None` 表示子任务未能写回结果（例如 panic）
    pub result: Option<Result<T, E>>,
}

impl<T, E> BatchItem<T, E> {
    pub fn ok(&self) -> Option<&T> {
        match &self.result {
            Some(Ok(value)) => Some(value),
            _ => None,
        }
    }

    pub fn err(&self) -> Option<&E> {
        match &self.result {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

/// 扇出结果
#[derive(Debug)]
pub struct FanOutResult<T, E> {
    /// 按输入顺序排列
    pub items: Vec<BatchItem<T, E>>,
    /// 最先成功完成的子任务下标
    pub first_completed: Option<usize>,
}

impl<T, E> FanOutResult<T, E> {
    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|item| item.ok().is_some()).count()
    }

    /// 最先成功完成的结果
    pub fn first_success(&self) -> Option<&T> {
        self.first_completed
            .and_then(|index| self.items.get(index))
            .and_then(BatchItem::ok)
    }

    /// 第一个失败（按输入顺序）
    pub fn first_error(&self) -> Option<&E> {
        self.items.iter().find_map(BatchItem::err)
    }
}

struct Slots<T, E> {
    results: Vec<Option<Result<T, E>>>,
    first_completed: Option<usize>,
}

/// 并发执行 `worker`，每个输入一个 tokio 任务
///
/// 返回的 future 被丢弃时，尚未完成的子任务随 `JoinSet` 一起中止。
pub async fn fan_out<I, T, E, F, Fut>(inputs: Vec<I>, worker: F) -> FanOutResult<T, E>
where
    I: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(usize, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let total = inputs.len();
    let slots = Arc::new(Mutex::new(Slots {
        results: (0..total).map(|_| None).collect(),
        first_completed: None,
    }));
    let worker = Arc::new(worker);

    let mut tasks = JoinSet::new();
    for (index, input) in inputs.into_iter().enumerate() {
        let slots = slots.clone();
        let worker = worker.clone();
        tasks.spawn(async move {
            let result = worker(index, input).await;

            let mut guard = slots.lock();
            if result.is_ok() && guard.first_completed.is_none() {
                guard.first_completed = Some(index);
            }
            guard.results[index] = Some(result);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::warn!("[BATCH] 子任务异常退出: {}", e);
        }
    }

    let mut guard = slots.lock();
    let first_completed = guard.first_completed;
    let items = std::mem::take(&mut guard.results)
        .into_iter()
        .enumerate()
        .map(|(index, result)| BatchItem { index, result })
        .collect();

    FanOutResult {
        items,
        first_completed,
    }
}
