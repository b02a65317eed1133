//! # Transport
//!
//! 网络传输模块。
//!
//! 负责：
//! - Clock exchange 报文编解码 (8 字节请求 / 24 字节应答，big-endian)
//! - 控制报文 (method code + payload) 编解码与 UDP 发送
//! - Client 侧 exchange 应答与控制监听
//! - 录制文件的流式传输

pub mod error;
pub mod file_transfer;
pub mod listener;
pub mod metrics;
pub mod responder;
pub mod rpc;
pub mod socket;
pub mod wire;

pub use error::TransportError;
pub use file_transfer::{receive_file, send_file};
pub use listener::{ControlListener, ControlListenerConfig};
pub use metrics::{ListenerMetrics, MetricsSnapshot};
pub use responder::ExchangeResponder;
pub use rpc::UdpRpcSender;
pub use socket::UdpExchangeSocket;
pub use wire::{ControlMessage, ExchangeReply, ExchangeRequest, REPLY_LEN, REQUEST_LEN};
