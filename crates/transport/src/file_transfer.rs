//! 录制文件流式传输
//!
//! 帧格式：`u32` header 长度 (big-endian) + JSON `FileDetails` + 恰好 `size` 字节的文件内容。

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use contracts::FileDetails;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

use crate::error::TransportError;

/// Header 长度上限
const MAX_HEADER_LEN: u32 = 64 * 1024;

/// 发送文件，返回已发送的 `FileDetails`
#[instrument(name = "send_file", skip(stream), fields(path = %path.display()))]
pub async fn send_file<W>(path: &Path, stream: &mut W) -> Result<FileDetails, TransportError>
where
    W: AsyncWrite + Unpin,
{
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransportError::BadFileName(path.display().to_string()))?
        .to_string();

    let mut file = File::open(path).await?;
    let size = file.metadata().await?.len();
    let details = FileDetails { name, size };

    let header = serde_json::to_vec(&details)?;
    stream.write_u32(header.len() as u32).await?;
    stream.write_all(&header).await?;

    let sent = tokio::io::copy(&mut (&mut file).take(size), stream).await?;
    if sent != size {
        return Err(TransportError::Truncated {
            name: details.name,
            expected: size,
            received: sent,
        });
    }
    stream.flush().await?;

    debug!(name = %details.name, size, "file sent");
    Ok(details)
}

/// 接收文件并保存为 `dir/name`
///
/// 发送方的文件名只用于日志；本地文件名由调用方决定。
#[instrument(name = "receive_file", skip(stream), fields(dir = %dir.display()))]
pub async fn receive_file<R>(stream: &mut R, dir: &Path, name: &str) -> Result<PathBuf, TransportError>
where
    R: AsyncRead + Unpin,
{
    if name.is_empty() || Path::new(name).file_name() != Some(OsStr::new(name)) {
        return Err(TransportError::BadFileName(name.to_string()));
    }

    let header_len = stream.read_u32().await?;
    if header_len > MAX_HEADER_LEN {
        return Err(TransportError::HeaderTooLarge {
            size: header_len,
            max: MAX_HEADER_LEN,
        });
    }
    let mut header = vec![0u8; header_len as usize];
    stream.read_exact(&mut header).await?;
    let details: FileDetails = serde_json::from_slice(&header)?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    let mut file = File::create(&path).await?;
    let received = tokio::io::copy(&mut (&mut *stream).take(details.size), &mut file).await?;
    file.flush().await?;

    if received != details.size {
        return Err(TransportError::Truncated {
            name: details.name,
            expected: details.size,
            received,
        });
    }

    debug!(remote_name = %details.name, size = details.size, path = %path.display(), "file received");
    Ok(path)
}
