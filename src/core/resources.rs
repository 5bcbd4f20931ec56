use anyhow::Context;
use bevy::prelude::*;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_PATH: &str = "config/game.toml";

/// 全局配置（config/game.toml），缺省字段取默认值
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// 物品表，相对 assets/
    pub items_path:        String,
    pub backpack_capacity: usize,
    /// 背包每行几格，用来把格子序号换成 (行, 列)
    pub backpack_columns:  u32,
    /// 本地回环的观察者数量
    pub replication_peers: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            items_path: "data/items.ron".into(),
            backpack_capacity: 30,
            backpack_columns: 5,
            replication_peers: 1,
        }
    }
}

impl GameConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置 {} 失败", path.display()))?;
        Self::parse(&text).with_context(|| format!("解析配置 {} 失败", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: GameConfig = toml::from_str(text)?;
        anyhow::ensure!(config.backpack_columns > 0, "backpack_columns 不能为 0");
        Ok(config)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => {
                info!("已加载配置: {:?}", config);
                config
            }
            Err(err) => {
                warn!("{err:#}，使用默认配置");
                Self::default()
            }
        }
    }
}
