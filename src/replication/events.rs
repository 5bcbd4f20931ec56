use bevy::prelude::*;

use super::peers::PeerId;
use crate::item::instance::{ContainerId, ItemInstanceId};

/// 发给某个观察者的一段编码后的增量
#[derive(Event, Debug, Clone)]
pub struct ItemArrayPayloadEvent {
    pub peer:  PeerId,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicatedChange {
    Added,
    Changed,
    Removed,
}

/// 观察者镜像里某个条目发生了变化
#[derive(Event, Debug, Clone, PartialEq)]
pub struct ItemReplicatedEvent {
    pub peer:      PeerId,
    pub container: ContainerId,
    pub item:      ItemInstanceId,
    pub change:    ReplicatedChange,
}

/// 让 CLI 打印观察者镜像；None = 全部观察者
#[derive(Event)]
pub struct ShowMirrorEvent(pub Option<PeerId>);
