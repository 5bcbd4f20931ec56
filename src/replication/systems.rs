use bevy::prelude::*;
use std::collections::HashSet;

use super::codec::{decode_delta, encode_closed, encode_delta};
use super::events::*;
use super::peers::ReplicationPeers;
use crate::item::container::ItemContainer;
use crate::item::instance::ContainerId;

/// 权威侧：对每个观察者、每个容器算增量并编码发出。
/// 已经不在的容器发一次销毁通知，基线随之丢弃。
pub fn replicate_containers(
    containers: Query<&ItemContainer>,
    mut peers: ResMut<ReplicationPeers>,
    mut outgoing: EventWriter<ItemArrayPayloadEvent>,
) {
    let live: HashSet<ContainerId> = containers.iter().map(|c| c.id.clone()).collect();
    for peer in peers.iter_mut() {
        for gone in peer.forget_missing(&live) {
            debug!("{} ← {}: 容器已销毁", peer.id, gone);
            match encode_closed(&gone) {
                Ok(bytes) => {
                    outgoing.write(ItemArrayPayloadEvent { peer: peer.id, bytes });
                }
                Err(err) => error!("{err}"),
            }
        }
        for container in &containers {
            let Some(delta) = container.items.compute_delta(peer.baseline_mut(&container.id)) else {
                continue;
            };
            debug!(
                "{} ← {}: {} 变更, {} 移除",
                peer.id,
                container.id,
                delta.changed.len(),
                delta.removed.len()
            );
            match encode_delta(&container.id, &delta) {
                Ok(bytes) => {
                    outgoing.write(ItemArrayPayloadEvent { peer: peer.id, bytes });
                }
                Err(err) => error!("{err}"),
            }
        }
    }
}

/// 观察者侧：解码并应用到镜像
pub fn receive_payloads(
    mut incoming: EventReader<ItemArrayPayloadEvent>,
    mut peers: ResMut<ReplicationPeers>,
    mut replicated: EventWriter<ItemReplicatedEvent>,
) {
    for payload in incoming.read() {
        let decoded = match decode_delta(&payload.bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("{} 丢弃增量: {err}", payload.peer);
                continue;
            }
        };
        let Some(peer) = peers.get_mut(payload.peer) else {
            warn!("未知观察者 {}", payload.peer);
            continue;
        };
        let events = match decoded.delta {
            Some(delta) => peer.apply(decoded.container, delta),
            None => peer.close(&decoded.container),
        };
        for event in events {
            replicated.write(event);
        }
    }
}

pub fn log_replicated(mut replicated: EventReader<ItemReplicatedEvent>) {
    for ev in replicated.read() {
        debug!("{} {} {:?} {}", ev.peer, ev.container, ev.change, ev.item);
    }
}

/// 打印观察者看到的镜像
pub fn show_mirror(mut ev_show: EventReader<ShowMirrorEvent>, peers: Res<ReplicationPeers>) {
    for ShowMirrorEvent(filter) in ev_show.read() {
        for peer in peers.iter().filter(|p| filter.is_none_or(|id| p.id == id)) {
            println!("== {} ==", peer.id);
            let mut mirrors: Vec<_> = peer.mirrors().collect();
            mirrors.sort_by(|a, b| a.0.0.cmp(&b.0.0));
            for (container, array) in mirrors {
                println!("  {container}: {} 条 (key={})", array.len(), array.array_replication_key());
                for item in array.iter() {
                    println!("    {} {} ×{}", item.id, item.item_class(), item.stack_size());
                }
            }
        }
    }
}
