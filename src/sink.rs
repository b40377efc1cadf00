//! 事务事件出口
//!
//! 采集结果交给外部 APM 客户端发送，这里只负责投递。

use tokio::sync::mpsc;

use crate::event::TransactionEvent;

/// 事务事件接收方
pub trait TransactionSink: Send + Sync {
    /// 非阻塞投递一个事件
    fn record(&self, event: TransactionEvent);
}

/// 通过有界 channel 投递给外部消费者
///
/// channel 已满或已关闭时丢弃事件并记录警告
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<TransactionEvent>,
}

impl ChannelSink {
    /// 创建 sink 及其消费端
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TransactionEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl TransactionSink for ChannelSink {
    fn record(&self, event: TransactionEvent) {
        if let Err(e) = self.sender.try_send(event) {
            tracing::warn!("事务事件通道已满或已关闭，丢弃事件: {}", e);
        }
    }
}

/// 以 JSON 形式写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TransactionSink for LogSink {
    fn record(&self, event: TransactionEvent) {
        #[cfg(not(feature = "sensitive-logs"))]
        let event = {
            let mut event = event;
            event.context.request.body = crate::capture::CapturedBody::Redacted;
            event.context.response.body = crate::capture::CapturedBody::Redacted;
            event
        };

        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(
                transaction = %event.name,
                result = %event.result,
                duration_ms = event.duration_ms,
                "{}",
                payload
            ),
            Err(e) => tracing::warn!("序列化事务事件失败: {}", e),
        }
    }
}
