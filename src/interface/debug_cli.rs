//! 文字 CLI：读取 stdin → 解析命令 → 执行并打印

use bevy::app::AppExit;
use bevy::prelude::*;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::core::{events::LogEvent, states::AppState};
use crate::data::registry::ItemRegistry;
use crate::inventory::components::{BACKPACK, WORLD};
use crate::inventory::events::{
    GiveItemEvent, ListInventoryEvent, MoveItemEvent, RemoveItemEvent, SplitStackEvent,
};
use crate::item::container::ContainerRegistry;
use crate::item::instance::ContainerId;
use crate::replication::{events::ShowMirrorEvent, peers::{PeerId, ReplicationPeers}};

static CLI_BUFFER: Lazy<Arc<Mutex<VecDeque<String>>>> =
    Lazy::new(|| Arc::new(Mutex::new(VecDeque::new())));

/// 插件入口
pub struct DebugCliPlugin;
impl Plugin for DebugCliPlugin {
    fn build(&self, app: &mut App) {
        {
            let buffer = CLI_BUFFER.clone();
            std::thread::spawn(move || {
                use std::io::{self, BufRead};
                let stdin = io::stdin();
                for line in stdin.lock().lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Ok(mut buf) = buffer.lock() {
                        buf.push_back(line.to_string());
                    }
                }
            });
        }
        app
            // 事件：原始输入行
            .add_event::<CliLine>()
            // 每帧从 buffer 取出所有命令行写入事件
            .add_systems(Update, read_stdin)
            // 仅在 InGame 处理命令
            .add_systems(
                Update,
                execute_cli_commands
                    .after(read_stdin)
                    .run_if(in_state(AppState::InGame)),
            );
    }
}

/* ---------------------------- 事件与枚举 ---------------------------- */

/// 终端敲的一整行
#[derive(Event)]
struct CliLine(String);

/// 我们支持的命令
#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Status,
    Exit,
    Items(Option<String>), // None=全部；Some(token)=按 id/uuid/name 查询
    Give { id: String, count: u32 },
    Inventory(String),
    Remove { slot: usize, count: u32 },
    Split { slot: usize, count: u32 },
    Move { from: String, slot: usize, count: u32, to: String },
    Mirror(Option<u32>),
    Unsupported(String),
}

/* ---------------------------- 读取 stdin ---------------------------- */

fn read_stdin(mut writer: EventWriter<CliLine>) {
    let Ok(mut buffer) = CLI_BUFFER.lock() else {
        return;
    };
    while let Some(line) = buffer.pop_front() {
        writer.write(CliLine(line));
    }
}

/* ---------------------------- 命令执行 ---------------------------- */

/// CLI 要写的事件太多，打包成一个 SystemParam
#[derive(bevy::ecs::system::SystemParam)]
struct CliWriters<'w> {
    log:    EventWriter<'w, LogEvent>,
    exit:   EventWriter<'w, AppExit>,
    give:   EventWriter<'w, GiveItemEvent>,
    list:   EventWriter<'w, ListInventoryEvent>,
    remove: EventWriter<'w, RemoveItemEvent>,
    split:  EventWriter<'w, SplitStackEvent>,
    moves:  EventWriter<'w, MoveItemEvent>,
    mirror: EventWriter<'w, ShowMirrorEvent>,
}

fn execute_cli_commands(
    mut line_reader: EventReader<CliLine>,
    mut out: CliWriters,
    mut next: ResMut<NextState<AppState>>,
    state: Res<State<AppState>>,
    registry: Res<ItemRegistry>,
    containers: Res<ContainerRegistry>,
    peers: Res<ReplicationPeers>,
) {
    for CliLine(input) in line_reader.read() {
        match parse_command(input) {
            Command::Help => {
                out.log.write(LogEvent(
                    "命令列表:
  help                              查看帮助
  status                            查看当前状态
  exit / quit                       退出程序
  items                             列出所有物品
  items <token>                     用 id / uuid / 名称 查询单个物品
  give <id> <count>                 给予物品
  inventory [container]             查看容器（默认背包）
  remove <slot> <count>             从背包某格丢弃
  split <slot> <count>              背包内拆堆叠
  drop <slot> <count>               从背包丢到地上
  move <from> <slot> <count> <to>   在容器之间搬运
  mirror [peer]                     查看观察者镜像
  ".into()));
            }

            Command::Status => {
                out.log.write(LogEvent(format!(
                    "State: {:?}, Items Loaded: {}, Containers: {}, Peers: {}",
                    state.get(),
                    registry.len(),
                    containers.len(),
                    peers.len()
                )));
            }

            Command::Exit => {
                out.log.write(LogEvent("Bye~".into()));
                next.set(AppState::Shutdown);
                out.exit.write(AppExit::Success);
            }

            Command::Items(token) => match token {
                None => {
                    // 全部列出
                    for entry in registry.iter() {
                        out.log.write(LogEvent(format!(
                            "{} | {} | {} | ×{}",
                            uuid_from_id(&entry.id),
                            entry.id,
                            entry.name,
                            entry.max_stack_size
                        )));
                    }
                }
                Some(t) => {
                    let by_uuid = registry
                        .iter()
                        .find(|e| uuid_from_id(&e.id).to_string() == t.to_lowercase());
                    if let Some(e) = registry.find(&t).or(by_uuid) {
                        out.log.write(LogEvent(format!(
                            "==================================================
UUID  : {}
ID    : {}
Name  : {}
Class : {}
Stack : {}
Desc  : {}
==================================================",
                            uuid_from_id(&e.id),
                            e.id,
                            e.name,
                            e.class,
                            e.max_stack_size,
                            e.description
                        )));
                    } else {
                        out.log.write(LogEvent("未找到匹配物品".into()));
                    }
                }
            },

            Command::Give { id, count } => {
                out.give.write(GiveItemEvent { id, count });
            }

            Command::Inventory(container) => {
                out.list.write(ListInventoryEvent(ContainerId::new(container)));
            }

            Command::Remove { slot, count } => {
                out.remove.write(RemoveItemEvent { slot, count });
            }

            Command::Split { slot, count } => {
                out.split.write(SplitStackEvent { slot, count });
            }

            Command::Move { from, slot, count, to } => {
                out.moves.write(MoveItemEvent {
                    from: ContainerId::new(from),
                    slot,
                    count,
                    to: ContainerId::new(to),
                });
            }

            Command::Mirror(peer) => {
                out.mirror.write(ShowMirrorEvent(peer.map(PeerId)));
            }

            Command::Unsupported(cmd) => {
                out.log.write(LogEvent(format!("不支持的命令: {cmd}")));
            }
        }
    }
}

/* ---------------------------- 工具函数 ---------------------------- */

fn parse_command(input: &str) -> Command {
    let mut parts = input.split_whitespace();
    let cmd = parts.next().unwrap_or("").to_lowercase();
    match cmd.as_str() {
        "help" | "h" | "?" => Command::Help,
        "status" | "s" => Command::Status,
        "exit" | "quit" | "q" => Command::Exit,
        "items" | "item" | "i" => {
            let token = parts.next().map(|s| s.to_string());
            Command::Items(token)
        }
        "give" => {
            let id = parts.next().unwrap_or("").to_string();
            let count = parse_count(parts.next());
            Command::Give { id, count }
        }
        "inventory" | "inv" => {
            Command::Inventory(parts.next().unwrap_or(BACKPACK).to_string())
        }
        "remove" | "rm" => {
            let slot = parse_slot(parts.next());
            Command::Remove { slot, count: parse_count(parts.next()) }
        }
        "split" => {
            let slot = parse_slot(parts.next());
            Command::Split { slot, count: parse_count(parts.next()) }
        }
        "drop" => {
            let slot = parse_slot(parts.next());
            Command::Move {
                from: BACKPACK.into(),
                slot,
                count: parse_count(parts.next()),
                to: WORLD.into(),
            }
        }
        "move" | "mv" => {
            let from = parts.next().unwrap_or("").to_string();
            let slot = parse_slot(parts.next());
            let count = parse_count(parts.next());
            let to = parts.next().unwrap_or("").to_string();
            Command::Move { from, slot, count, to }
        }
        "mirror" => Command::Mirror(parts.next().and_then(|s| s.parse().ok())),
        other => Command::Unsupported(other.into()),
    }
}

fn parse_slot(token: Option<&str>) -> usize {
    token.unwrap_or("0").parse().unwrap_or(0)
}

fn parse_count(token: Option<&str>) -> u32 {
    token.unwrap_or("1").parse().unwrap_or(1)
}

fn uuid_from_id(id: &str) -> Uuid {
    // 用固定 namespace + id 字节生成版本 5 UUID，保证可重复得到同一值
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes())
}
