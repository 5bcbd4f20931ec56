use bevy::asset::{io::Reader, ron, AssetLoader, LoadContext};
use std::future::Future;
use thiserror::Error;

use super::schema::ItemList;

/// 读取 assets/data/items.ron
#[derive(Default)]
pub struct RonItemLoader;

#[derive(Debug, Error)]
pub enum RonItemLoaderError {
    #[error("读取物品表失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("物品表 RON 格式错误: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("物品表不是合法的 UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl AssetLoader for RonItemLoader {
    type Asset = ItemList;
    type Settings = ();
    type Error = RonItemLoaderError;

    fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext,
    ) -> impl Future<Output = Result<Self::Asset, Self::Error>> + Send {
        async move {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).await?;

            let s = std::str::from_utf8(&bytes)?;
            let list: ItemList = ron::de::from_str(s)?;

            Ok(list)
        }
    }

    fn extensions(&self) -> &[&str] {
        &["ron"]
    }
}
