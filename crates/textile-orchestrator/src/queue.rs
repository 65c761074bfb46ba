//! 背景佇列
//!
//! 明細數超過門檻的訂單改由背景執行。背景工作呼叫與同步路徑相同的
//! `execute_*` 函式，語意一致；中途失敗時已完成的步驟保留，可重新提交。

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use textile_core::{FulfillmentError, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::context::OperationContext;
use crate::gateway::Backend;
use crate::orchestrator::{FulfillmentOrchestrator, StartReport};
use crate::progress::ProgressEvent;

/// 多個工作共用的主控器
pub type SharedOrchestrator<B> = Arc<Mutex<FulfillmentOrchestrator<B>>>;

/// 背景工作內容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    Start {
        order_id: String,
        transfer_qty: Option<Decimal>,
    },
    CreateArtifacts {
        order_id: String,
    },
}

impl Task {
    pub fn order_id(&self) -> &str {
        match self {
            Task::Start { order_id, .. } | Task::CreateArtifacts { order_id } => order_id,
        }
    }
}

#[derive(Debug)]
struct Job {
    id: Uuid,
    task: Task,
}

/// 派送結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// 已同步完成
    Completed(StartReport),
    /// 已排入背景佇列
    Queued { task_id: Uuid },
}

/// 背景工作佇列
#[derive(Debug, Clone)]
pub struct WorkQueue {
    sender: mpsc::Sender<Job>,
}

impl WorkQueue {
    /// 啟動背景工作者
    pub fn spawn<B>(orchestrator: SharedOrchestrator<B>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        B: Backend + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(orchestrator, receiver));
        (Self { sender }, handle)
    }

    /// 提交工作，回傳工作編號
    pub async fn submit(&self, task: Task) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.sender
            .send(Job { id, task })
            .await
            .map_err(|_| FulfillmentError::QueueClosed)?;
        Ok(id)
    }
}

async fn run_worker<B: Backend>(orchestrator: SharedOrchestrator<B>, mut receiver: mpsc::Receiver<Job>) {
    tracing::info!("背景佇列啟動");

    while let Some(job) = receiver.recv().await {
        let order_id = job.task.order_id().to_string();
        tracing::info!("執行背景工作 {}：訂單 {}", job.id, order_id);

        let mut orchestrator = orchestrator.lock().await;
        let ctx = OperationContext::root();
        let result = match &job.task {
            Task::Start {
                order_id,
                transfer_qty,
            } => orchestrator.execute_start(order_id, *transfer_qty, &ctx),
            Task::CreateArtifacts { order_id } => {
                orchestrator.execute_create_artifacts(order_id, &ctx)
            }
        };

        match result {
            Ok(report) => {
                tracing::info!(
                    "背景工作 {} 完成：建立單據 {} 張，狀態 {}",
                    job.id,
                    report.created.len(),
                    report.status
                );
                orchestrator.publish(ProgressEvent::TaskFinished {
                    task_id: job.id,
                    order_id,
                });
            }
            Err(err) => {
                tracing::error!("背景工作 {} 失敗：{}", job.id, err);
                orchestrator.publish(ProgressEvent::TaskFailed {
                    task_id: job.id,
                    order_id,
                    message: err.to_string(),
                });
            }
        }
    }

    tracing::info!("背景佇列結束");
}

/// 依明細數決定同步或背景執行
pub struct Dispatcher<B> {
    orchestrator: SharedOrchestrator<B>,
    queue: WorkQueue,
}

impl<B: Backend + 'static> Dispatcher<B> {
    pub fn new(orchestrator: SharedOrchestrator<B>, queue: WorkQueue) -> Self {
        Self {
            orchestrator,
            queue,
        }
    }

    /// 建立主控器、背景工作者與派送器
    pub fn spawn(
        orchestrator: FulfillmentOrchestrator<B>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let shared = Arc::new(Mutex::new(orchestrator));
        let (queue, handle) = WorkQueue::spawn(Arc::clone(&shared), capacity);
        (Self::new(shared, queue), handle)
    }

    pub fn orchestrator(&self) -> &SharedOrchestrator<B> {
        &self.orchestrator
    }

    /// 啟動訂單；前置檢查一律同步執行
    pub async fn start(&self, order_id: &str, transfer_qty: Option<Decimal>) -> Result<Dispatch> {
        let mut orchestrator = self.orchestrator.lock().await;
        let (order, transfer_qty) = orchestrator.prepare_start(order_id, transfer_qty)?;

        if order.lines.len() > orchestrator.settings().background_line_threshold {
            drop(orchestrator);
            let task_id = self
                .queue
                .submit(Task::Start {
                    order_id: order_id.to_string(),
                    transfer_qty,
                })
                .await?;
            tracing::info!("訂單 {} 明細 {} 筆，改於背景啟動", order_id, order.lines.len());
            return Ok(Dispatch::Queued { task_id });
        }

        orchestrator
            .execute_start(order_id, transfer_qty, &OperationContext::root())
            .map(Dispatch::Completed)
    }

    /// 建立產品與 BOM
    pub async fn create_artifacts(&self, order_id: &str) -> Result<Dispatch> {
        let mut orchestrator = self.orchestrator.lock().await;
        let order = orchestrator.check_can_create_artifacts(order_id)?;

        if order.lines.len() > orchestrator.settings().background_line_threshold {
            drop(orchestrator);
            let task_id = self
                .queue
                .submit(Task::CreateArtifacts {
                    order_id: order_id.to_string(),
                })
                .await?;
            return Ok(Dispatch::Queued { task_id });
        }

        orchestrator
            .execute_create_artifacts(order_id, &OperationContext::root())
            .map(Dispatch::Completed)
    }
}
