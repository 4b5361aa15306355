//! [`LabelTable`] – human-readable names of scene objects.
//!
//! Object names follow `<scene>_<code>[_...]`, e.g. `K01_G03`.  The label
//! for an object is looked up by the active scene and the code after the
//! first underscore.  The table for the stock scenes ships with the crate
//! (`data/object_labels.toml`) and is parsed once per session.

use std::collections::HashMap;

use roomrecall_types::ExperimentError;

/// Label recorded when an object has no entry.
pub const UNKNOWN_LABEL: &str = "-unknown label-";

const BUNDLED_LABELS: &str = include_str!("../data/object_labels.toml");

#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    scenes: HashMap<String, HashMap<String, String>>,
}

impl LabelTable {
    /// The label table for the stock scenes.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Config`] if the bundled data is corrupt.
    pub fn bundled() -> Result<Self, ExperimentError> {
        Self::from_toml_str(BUNDLED_LABELS)
    }

    /// Parse a table of `[scene]` sections mapping codes to labels.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::Config`] on malformed TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self, ExperimentError> {
        let scenes = toml::from_str(raw)
            .map_err(|e| ExperimentError::Config(format!("invalid label table: {e}")))?;
        Ok(Self { scenes })
    }

    /// Label of `object_name` in `scene`, if known.
    pub fn label(&self, scene: &str, object_name: &str) -> Option<&str> {
        let code = object_name.split('_').nth(1)?;
        self.scenes.get(scene)?.get(code).map(String::as_str)
    }

    /// Label of `object_name` in `scene`, or [`UNKNOWN_LABEL`].
    pub fn label_or_unknown(&self, scene: Option<&str>, object_name: &str) -> String {
        scene
            .and_then(|s| self.label(s, object_name))
            .unwrap_or(UNKNOWN_LABEL)
            .to_string()
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_table_covers_stock_scenes() {
        let table = LabelTable::bundled().unwrap();
        assert_eq!(table.scene_count(), 15);
        assert_eq!(table.label("B01", "B01_G01"), Some("bathtub"));
        assert_eq!(table.label("K01", "K01_L01"), Some("eggtimer"));
        assert_eq!(table.label("S03", "S03_G07"), Some("mirror"));
        assert_eq!(table.label("L01", "L01_D"), Some("door"));
    }

    #[test]
    fn code_is_second_name_part() {
        let table = LabelTable::bundled().unwrap();
        assert_eq!(table.label("K01", "K01_L01_copy"), Some("eggtimer"));
        assert_eq!(table.label("K01", "eggtimer"), None);
    }

    #[test]
    fn unknown_objects_get_placeholder() {
        let table = LabelTable::bundled().unwrap();
        assert_eq!(table.label_or_unknown(Some("K01"), "K01_X99"), UNKNOWN_LABEL);
        assert_eq!(table.label_or_unknown(Some("Z99"), "Z99_G01"), UNKNOWN_LABEL);
        assert_eq!(table.label_or_unknown(None, "K01_L01"), UNKNOWN_LABEL);
    }

    #[test]
    fn custom_table_parses() {
        let table = LabelTable::from_toml_str("[T01]\nG01 = \"workbench\"\n").unwrap();
        assert_eq!(table.label("T01", "T01_G01"), Some("workbench"));
        assert!(LabelTable::from_toml_str("[T01]\nG01 = 3\n").is_err());
    }
}
