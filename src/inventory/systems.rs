use super::{components::*, events::*};
use crate::core::events::LogEvent;
use crate::core::resources::GameConfig;
use crate::data::registry::{ItemRegistry, ItemResolver};
use crate::item::container::{ContainerError, ContainerKind, ContainerRegistry, ItemContainer};
use crate::item::instance::{ContainerId, ItemInstance};
use bevy::prelude::*;

/// 进入游戏时生成背包、世界、箱子三个容器
pub fn spawn_containers(mut commands: Commands, config: Res<GameConfig>) {
    commands.spawn((
        Backpack,
        ItemContainer::new(backpack_id(), ContainerKind::Inventory, Some(config.backpack_capacity)),
    ));
    commands.spawn((
        WorldContainer,
        ItemContainer::new(world_id(), ContainerKind::World, None),
    ));
    commands.spawn(ItemContainer::new(
        ContainerId::new(CHEST),
        ContainerKind::Chest,
        Some(config.backpack_capacity / 2),
    ));
}

/// 处理"give"——按表里的上限往背包里堆
pub fn give_item(
    mut ev_give: EventReader<GiveItemEvent>,
    mut backpack: Query<&mut ItemContainer, With<Backpack>>,
    registry: Res<ItemRegistry>,
    mut log_event: EventWriter<LogEvent>,
) {
    let Ok(mut bag) = backpack.single_mut() else {
        return;
    };

    for ev in ev_give.read() {
        let Some(entry) = registry.find(&ev.id).cloned() else {
            warn!("不存在物品 ID {}", ev.id);
            log_event.write(LogEvent(format!("不存在物品 ID {}", ev.id)));
            continue;
        };

        let leftover = bag.insert_stack(&entry.class, ev.count, &*registry);
        let given = ev.count - leftover;
        if given > 0 {
            info!("获得 {} ×{}", entry.name, given);
            log_event.write(LogEvent(format!("获得 {} ×{}", entry.name, given)));
        }
        if leftover > 0 {
            warn!("背包已满，{} ×{} 没能放进去", entry.name, leftover);
            log_event.write(LogEvent(format!("背包已满，{} ×{} 没能放进去", entry.name, leftover)));
        }
    }
}

/// 丢弃：直接从堆叠里扣掉，扣空的格子自动销毁
pub fn remove_item(
    mut ev_remove: EventReader<RemoveItemEvent>,
    mut backpack: Query<&mut ItemContainer, With<Backpack>>,
    mut log_event: EventWriter<LogEvent>,
) {
    let Ok(mut bag) = backpack.single_mut() else {
        return;
    };

    for ev in ev_remove.read() {
        match bag.remove_from_slot(ev.slot, ev.count) {
            Ok(removed) => log_event.write(LogEvent(format!("从第 {} 格移除了 {} 个", ev.slot, removed))),
            Err(err) => log_event.write(LogEvent(err.to_string())),
        };
    }
}

pub fn split_stack(
    mut ev_split: EventReader<SplitStackEvent>,
    mut backpack: Query<&mut ItemContainer, With<Backpack>>,
    mut log_event: EventWriter<LogEvent>,
) {
    let Ok(mut bag) = backpack.single_mut() else {
        return;
    };

    for ev in ev_split.read() {
        match bag.split_slot(ev.slot, ev.count) {
            Ok(id) => log_event.write(LogEvent(format!("拆出 {} 个，新堆叠 {}", ev.count, id))),
            Err(err) => log_event.write(LogEvent(err.to_string())),
        };
    }
}

/// 在容器之间搬运（丢到地上、放进箱子……）
pub fn move_item(
    mut ev_move: EventReader<MoveItemEvent>,
    registry: Res<ContainerRegistry>,
    items: Res<ItemRegistry>,
    mut containers: Query<&mut ItemContainer>,
    mut log_event: EventWriter<LogEvent>,
) {
    for ev in ev_move.read() {
        match move_between(ev, &registry, &*items, &mut containers) {
            Ok(moved) => {
                info!("{} → {}: {} 个", ev.from, ev.to, moved);
                log_event.write(LogEvent(format!("已从 {} 移到 {}: {} 个", ev.from, ev.to, moved)));
            }
            Err(err) => {
                warn!("搬运失败: {err}");
                log_event.write(LogEvent(err.to_string()));
            }
        }
    }
}

/// 返回实际搬过去的数量；目标放不下的部分退回源容器
fn move_between(
    ev: &MoveItemEvent,
    registry: &ContainerRegistry,
    items: &impl ItemResolver,
    containers: &mut Query<&mut ItemContainer>,
) -> Result<u32, ContainerError> {
    let from = registry.get(&ev.from)?;
    let to = registry.get(&ev.to)?;
    if from == to {
        return Err(ContainerError::SameContainer(ev.from.clone()));
    }
    let [mut source, mut target] = containers
        .get_many_mut([from, to])
        .map_err(|_| ContainerError::UnknownContainer(ev.from.clone()))?;

    let item = source.take_from_slot(ev.slot, ev.count)?;
    let taken = item.stack_size();
    let Some(rejected) = target.accept(item, items) else {
        return Ok(taken);
    };

    let returned = rejected.stack_size();
    // 刚从源容器拿出来的，原路放回一定放得下
    if let Some(lost) = source.accept(rejected, items) {
        error!("{} ×{} 无法退回 {}", lost.item_class(), lost.stack_size(), ev.from);
    }
    if returned == taken {
        Err(ContainerError::Full(target.id.clone()))
    } else {
        Ok(taken - returned)
    }
}

/// 打印容器内容
pub fn print_inventory(
    mut ev_list: EventReader<ListInventoryEvent>,
    registry: Res<ContainerRegistry>,
    items: Res<ItemRegistry>,
    config: Res<GameConfig>,
    containers: Query<&ItemContainer>,
) {
    for ListInventoryEvent(id) in ev_list.read() {
        let Ok(container) = registry.get(id).and_then(|e| {
            containers
                .get(e)
                .map_err(|_| ContainerError::UnknownContainer(id.clone()))
        }) else {
            println!("  找不到容器 {id}");
            continue;
        };

        println!("== {} ({:?}) {}/{} ==", container.id, container.kind, container.items.len(), capacity_label(container));
        if container.items.is_empty() {
            println!("  (empty)");
        }
        for (idx, item) in container.items.iter().enumerate() {
            let (name, max) = item
                .cached_item()
                .cloned()
                .or_else(|| items.resolve(item.item_class()))
                .map_or(("<unknown>".to_string(), 0), |e| (e.name.clone(), e.max_stack_size));
            let grid = ItemInstance::index_2d(config.backpack_columns, idx as u32)
                .map(|g| g.to_string())
                .unwrap_or_default();
            println!("[{idx}] {grid} {name} ×{}/{max} (id={})", item.stack_size(), item.id);
        }
    }
}

fn capacity_label(container: &ItemContainer) -> String {
    container
        .capacity
        .map_or_else(|| "∞".to_string(), |cap| cap.to_string())
}
