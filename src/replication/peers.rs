use bevy::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::events::{ItemReplicatedEvent, ReplicatedChange};
use crate::item::array::{ItemArrayDelta, ItemArrayHooks, ItemInstanceArray, ReplicationBaseline};
use crate::item::instance::{ContainerId, ItemInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// 一个只读观察者：服务器侧记它的基线，客户端侧存它看到的镜像
#[derive(Debug)]
pub struct ReplicationPeer {
    pub id:    PeerId,
    baselines: HashMap<ContainerId, ReplicationBaseline>,
    mirrors:   HashMap<ContainerId, ItemInstanceArray>,
}

impl ReplicationPeer {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            baselines: HashMap::new(),
            mirrors: HashMap::new(),
        }
    }

    pub fn baseline_mut(&mut self, container: &ContainerId) -> &mut ReplicationBaseline {
        self.baselines.entry(container.clone()).or_default()
    }

    pub fn mirror(&self, container: &ContainerId) -> Option<&ItemInstanceArray> {
        self.mirrors.get(container)
    }

    pub fn mirrors(&self) -> impl Iterator<Item = (&ContainerId, &ItemInstanceArray)> {
        self.mirrors.iter()
    }

    /// 丢掉已不存在的容器的基线，返回这些容器的 Id
    pub fn forget_missing(&mut self, live: &HashSet<ContainerId>) -> Vec<ContainerId> {
        let mut gone: Vec<ContainerId> = self
            .baselines
            .keys()
            .filter(|id| !live.contains(*id))
            .cloned()
            .collect();
        gone.sort_by(|a, b| a.0.cmp(&b.0));
        for id in &gone {
            self.baselines.remove(id);
        }
        gone
    }

    /// 容器被销毁：清空并移除镜像，每个条目发一次 Removed
    pub fn close(&mut self, container: &ContainerId) -> Vec<ItemReplicatedEvent> {
        let Some(mut mirror) = self.mirrors.remove(container) else {
            return Vec::new();
        };
        let mut hooks = MirrorHooks {
            peer: self.id,
            container: container.clone(),
            events: Vec::new(),
        };
        mirror.clear_replicated(&mut hooks);
        hooks.events
    }

    /// 把增量应用到镜像上，返回期间产生的变更事件
    pub fn apply(&mut self, container: ContainerId, delta: ItemArrayDelta) -> Vec<ItemReplicatedEvent> {
        let mut hooks = MirrorHooks {
            peer: self.id,
            container: container.clone(),
            events: Vec::new(),
        };
        self.mirrors
            .entry(container.clone())
            .or_insert_with(|| ItemInstanceArray::new(container))
            .apply_delta(delta, &mut hooks);
        hooks.events
    }
}

/// 镜像侧的钩子：只负责把变化转成事件
struct MirrorHooks {
    peer:      PeerId,
    container: ContainerId,
    events:    Vec<ItemReplicatedEvent>,
}

impl MirrorHooks {
    fn push(&mut self, item: &ItemInstance, change: ReplicatedChange) {
        self.events.push(ItemReplicatedEvent {
            peer: self.peer,
            container: self.container.clone(),
            item: item.id,
            change,
        });
    }
}

impl ItemArrayHooks for MirrorHooks {
    fn pre_replicated_remove(&mut self, item: &ItemInstance, _array: &ItemInstanceArray) {
        self.push(item, ReplicatedChange::Removed);
    }

    fn post_replicated_add(&mut self, item: &ItemInstance, _array: &ItemInstanceArray) {
        self.push(item, ReplicatedChange::Added);
    }

    fn post_replicated_change(&mut self, item: &ItemInstance, _array: &ItemInstanceArray) {
        self.push(item, ReplicatedChange::Changed);
    }
}

/// 本地回环的观察者列表
#[derive(Resource, Debug, Default)]
pub struct ReplicationPeers {
    peers: Vec<ReplicationPeer>,
}

impl ReplicationPeers {
    pub fn with_count(count: usize) -> Self {
        Self {
            peers: (0..count as u32).map(|i| ReplicationPeer::new(PeerId(i))).collect(),
        }
    }

    pub fn get(&self, id: PeerId) -> Option<&ReplicationPeer> {
        self.peers.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut ReplicationPeer> {
        self.peers.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplicationPeer> {
        self.peers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ReplicationPeer> {
        self.peers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
