use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::array::ItemArrayDelta;
use crate::item::instance::ContainerId;

pub const PAYLOAD_VERSION: u16 = 2;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("增量编解码失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("不支持的增量版本 {found}（期望 {expected}）", expected = PAYLOAD_VERSION)]
    Version { found: u16 },
}

/// 一个容器的一次增量，带上容器 Id 以便观察者找到对应的镜像。
/// `delta` 为 `None` 表示容器已被销毁，观察者丢掉整个镜像。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDelta {
    pub version:   u16,
    pub container: ContainerId,
    #[serde(default)]
    pub delta:     Option<ItemArrayDelta>,
}

#[derive(Serialize)]
struct Outgoing<'a> {
    version:   u16,
    container: &'a ContainerId,
    delta:     Option<&'a ItemArrayDelta>,
}

pub fn encode_delta(container: &ContainerId, delta: &ItemArrayDelta) -> Result<Vec<u8>, CodecError> {
    encode(container, Some(delta))
}

/// 容器销毁通知
pub fn encode_closed(container: &ContainerId) -> Result<Vec<u8>, CodecError> {
    encode(container, None)
}

fn encode(container: &ContainerId, delta: Option<&ItemArrayDelta>) -> Result<Vec<u8>, CodecError> {
    let bytes = serde_json::to_vec(&Outgoing {
        version: PAYLOAD_VERSION,
        container,
        delta,
    })?;
    Ok(bytes)
}

pub fn decode_delta(bytes: &[u8]) -> Result<ContainerDelta, CodecError> {
    let decoded: ContainerDelta = serde_json::from_slice(bytes)?;
    if decoded.version != PAYLOAD_VERSION {
        return Err(CodecError::Version { found: decoded.version });
    }
    Ok(decoded)
}
