use std::collections::BTreeMap;

use crate::error::{LiteError, Result};

/// Per-item parameters parsed from `"0=Beijing,1=Shanghai,2=Guangzhou"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardingItemParameters {
    map: BTreeMap<u32, String>,
}

impl ShardingItemParameters {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut map = BTreeMap::new();
        if raw.trim().is_empty() {
            return Ok(Self { map });
        }
        for pair in raw.split(',') {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(LiteError::InvalidConfiguration(format!(
                    "sharding item parameters '{}' format error, should be int=xx,int=xx",
                    raw
                )));
            };
            let item: u32 = key.trim().parse().map_err(|_| {
                LiteError::InvalidConfiguration(format!(
                    "sharding item parameters key '{}' is not an integer",
                    key.trim()
                ))
            })?;
            map.insert(item, value.trim().to_string());
        }
        Ok(Self { map })
    }

    pub fn get(&self, item: u32) -> Option<&str> {
        self.map.get(&item).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Parameters for `items` only; an item with no configured parameter maps
    /// to the empty string.
    pub fn restrict_to(&self, items: &[u32]) -> BTreeMap<u32, String> {
        items
            .iter()
            .map(|&item| (item, self.get(item).unwrap_or_default().to_string()))
            .collect()
    }
}
