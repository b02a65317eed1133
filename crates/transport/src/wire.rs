//! 报文编解码
//!
//! 所有整数均为 big-endian。

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{RpcMethod, RPC_BUFFER_SIZE};

use crate::error::TransportError;

/// Exchange 请求长度：`t0`
pub const REQUEST_LEN: usize = 8;

/// Exchange 应答长度：`t0, t1, t2`
pub const REPLY_LEN: usize = 24;

const CODE_LEN: usize = 4;

fn check_len(buf: &[u8], what: &'static str, expected: usize) -> Result<(), TransportError> {
    if buf.len() != expected {
        return Err(TransportError::BadLength {
            what,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Leader -> client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub t0: i64,
}

impl ExchangeRequest {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REQUEST_LEN);
        buf.put_i64(self.t0);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, TransportError> {
        check_len(buf, "exchange request", REQUEST_LEN)?;
        Ok(Self { t0: buf.get_i64() })
    }
}

/// Client -> leader，`t0` 原样回显
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeReply {
    pub t0: i64,
    pub t1: i64,
    pub t2: i64,
}

impl ExchangeReply {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REPLY_LEN);
        buf.put_i64(self.t0);
        buf.put_i64(self.t1);
        buf.put_i64(self.t2);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, TransportError> {
        check_len(buf, "exchange reply", REPLY_LEN)?;
        Ok(Self {
            t0: buf.get_i64(),
            t1: buf.get_i64(),
            t2: buf.get_i64(),
        })
    }
}

/// 控制报文：`i32` method code + UTF-8 payload，零填充至 `RPC_BUFFER_SIZE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub code: i32,
    pub payload: String,
}

impl ControlMessage {
    pub fn new(method: RpcMethod, payload: impl Into<String>) -> Self {
        Self {
            code: method.code(),
            payload: payload.into(),
        }
    }

    /// 未知 code 返回 `None`
    pub fn method(&self) -> Option<RpcMethod> {
        RpcMethod::from_code(self.code)
    }

    pub fn encode(&self) -> Result<Bytes, TransportError> {
        let size = CODE_LEN + self.payload.len();
        if size > RPC_BUFFER_SIZE {
            return Err(TransportError::PayloadTooLarge {
                size,
                max: RPC_BUFFER_SIZE,
            });
        }
        let mut buf = BytesMut::with_capacity(RPC_BUFFER_SIZE);
        buf.put_i32(self.code);
        buf.put_slice(self.payload.as_bytes());
        buf.resize(RPC_BUFFER_SIZE, 0);
        Ok(buf.freeze())
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, TransportError> {
        if buf.len() < CODE_LEN {
            return Err(TransportError::BadLength {
                what: "control message",
                expected: CODE_LEN,
                actual: buf.len(),
            });
        }
        let code = buf.get_i32();
        let end = buf.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        let payload = std::str::from_utf8(&buf[..end])
            .map_err(|_| TransportError::BadPayload)?
            .to_string();
        Ok(Self { code, payload })
    }
}
