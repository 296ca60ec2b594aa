/******************************************************************************
 *                                                                            *
 * Container dimensions. Defaults match the shipped game layout (10x4         *
 * backpack, 8x9 stash tabs, one initial tab) and can be overridden from a    *
 * TOML document. The address-space constants live in models.rs instead:      *
 * they are part of the save format and must not vary per install.            *
 *                                                                            *
 ******************************************************************************/

use serde::Deserialize;

use crate::errors::ConfigError;
use crate::models::EQUIPMENT_SLOT_OFFSET;

// --- Defaults ---
pub const DEFAULT_BACKPACK_COLS: usize = 10;
pub const DEFAULT_BACKPACK_ROWS: usize = 4;
pub const DEFAULT_STASH_TAB_COLS: usize = 8;
pub const DEFAULT_STASH_TAB_ROWS: usize = 9;

/// Dimensions of one grid.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridDims {
    pub cols: usize,
    pub rows: usize,
}

impl GridDims {
    pub fn new(cols: usize, rows: usize) -> Self {
        GridDims { cols, rows }
    }

    pub fn cell_count(&self) -> usize {
        self.cols * self.rows
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct InventoryConfig {
    pub backpack: GridDims,
    pub stash_tab: GridDims,
    pub initial_stash_tabs: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig {
            backpack: GridDims::new(DEFAULT_BACKPACK_COLS, DEFAULT_BACKPACK_ROWS),
            stash_tab: GridDims::new(DEFAULT_STASH_TAB_COLS, DEFAULT_STASH_TAB_ROWS),
            initial_stash_tabs: 1,
        }
    }
}

impl InventoryConfig {
    /// Parses and validates a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: InventoryConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, dims) in [("backpack", self.backpack), ("stash_tab", self.stash_tab)] {
            if dims.cols == 0 || dims.rows == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be at least 1x1, got {}x{}",
                    name, dims.cols, dims.rows
                )));
            }
        }
        // Backpack indices must stay below the equipment range of the flat address space.
        if self.backpack.cell_count() > EQUIPMENT_SLOT_OFFSET as usize {
            return Err(ConfigError::Invalid(format!(
                "backpack has {} cells, at most {} fit below the equipment offset",
                self.backpack.cell_count(),
                EQUIPMENT_SLOT_OFFSET
            )));
        }
        if self.initial_stash_tabs == 0 {
            return Err(ConfigError::Invalid("initial_stash_tabs must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = InventoryConfig::from_toml_str("").unwrap();
        assert_eq!(config, InventoryConfig::default());
    }

    #[test]
    fn partial_document_overrides_only_given_keys() {
        let config = InventoryConfig::from_toml_str(
            r#"
            initial_stash_tabs = 3

            [backpack]
            cols = 12
            rows = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.backpack, GridDims::new(12, 5));
        assert_eq!(config.stash_tab, GridDims::new(8, 9));
        assert_eq!(config.initial_stash_tabs, 3);
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        let err = InventoryConfig::from_toml_str("[stash_tab]\ncols = 0\nrows = 9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn backpack_may_not_reach_equipment_addresses() {
        let err = InventoryConfig::from_toml_str("[backpack]\ncols = 100\nrows = 11\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = InventoryConfig::from_toml_str("backpack = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
