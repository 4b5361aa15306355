//! [`ArrangementTable`] – named object layouts loaded from CSV.
//!
//! An arrangement repositions or hides scene objects before a trial.  The
//! table is read once at session setup; each trial names the arrangement it
//! wants and [`apply`][ArrangementTable::apply] moves the objects.
//!
//! # Table format
//!
//! | column | meaning |
//! |---|---|
//! | `arrangement` | arrangement name |
//! | `object` | object name as published in the registry |
//! | `visible` | `1` to place the object, `0` to park it out of sight |
//! | `pos_x`, `pos_y`, `pos_z` | world position (may be empty when hidden) |
//!
//! Further columns (orientation) are ignored.
//!
//! Hidden objects are parked at [`HIDDEN_POSITION`] rather than deactivated,
//! so they remain resolvable by name.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use roomrecall_rig::{ObjectRegistry, ObjectStore};
use roomrecall_spatial::Vec3;
use roomrecall_types::ExperimentError;
use serde::Deserialize;
use tracing::{debug, warn};

/// Where `visible = 0` rows park their object.
pub const HIDDEN_POSITION: Vec3 = Vec3::new(100.0, 100.0, 100.0);

#[derive(Debug, Deserialize)]
struct CsvRow {
    arrangement: String,
    object: String,
    visible: u8,
    pos_x: Option<f32>,
    pos_y: Option<f32>,
    pos_z: Option<f32>,
}

/// One parsed row of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrangementRow {
    /// 1-based data row number in the source file.
    pub row: usize,
    pub arrangement: String,
    pub object: String,
    pub visible: bool,
    /// Present only when all three coordinates are given.
    pub position: Option<Vec3>,
}

/// A row that could not be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrangementFailure {
    pub row: usize,
    pub object: String,
    pub reason: String,
}

/// Outcome of applying one arrangement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrangementReport {
    /// Objects moved to their row position.
    pub placed: usize,
    /// Objects parked at [`HIDDEN_POSITION`].
    pub hidden: usize,
    pub failures: Vec<ArrangementFailure>,
}

impl ArrangementReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArrangementTable {
    rows: Vec<ArrangementRow>,
}

impl ArrangementTable {
    /// Parse a table from any CSV source with a header row.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::ArrangementParse`] naming the first malformed row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ExperimentError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (i, record) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = i + 1;
            let raw = record.map_err(|e| ExperimentError::ArrangementParse {
                row,
                details: e.to_string(),
            })?;
            if raw.visible > 1 {
                return Err(ExperimentError::ArrangementParse {
                    row,
                    details: format!("visible must be 0 or 1, got {}", raw.visible),
                });
            }
            let position = match (raw.pos_x, raw.pos_y, raw.pos_z) {
                (Some(x), Some(y), Some(z)) => Some(Vec3::new(x, y, z)),
                _ => None,
            };
            rows.push(ArrangementRow {
                row,
                arrangement: raw.arrangement,
                object: raw.object,
                visible: raw.visible == 1,
                position,
            });
        }
        debug!(rows = rows.len(), "arrangement table parsed");
        Ok(Self { rows })
    }

    /// Read the table from `path`.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::ArrangementFileMissing`] if `path` does not exist,
    /// [`ExperimentError::Io`] if it cannot be opened, otherwise as
    /// [`from_reader`][Self::from_reader].
    pub fn from_path(path: &Path) -> Result<Self, ExperimentError> {
        if !path.exists() {
            return Err(ExperimentError::ArrangementFileMissing(
                path.display().to_string(),
            ));
        }
        let file = File::open(path).map_err(|e| ExperimentError::Io {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        Self::from_reader(file)
    }

    /// Distinct arrangement names in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !names.contains(&row.arrangement.as_str()) {
                names.push(&row.arrangement);
            }
        }
        names
    }

    pub fn rows_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ArrangementRow> + 'a {
        self.rows.iter().filter(move |r| r.arrangement == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Move every object of arrangement `name` into place.
    ///
    /// Rows that cannot be applied are logged and reported; the remaining
    /// rows are still applied.
    pub fn apply<S: ObjectStore + ?Sized>(
        &self,
        name: &str,
        registry: &ObjectRegistry,
        objects: &mut S,
    ) -> ArrangementReport {
        let mut report = ArrangementReport::default();

        for row in self.rows_for(name) {
            let Some(handle) = registry.resolve(&row.object) else {
                warn!(arrangement = %name, row = row.row, object = %row.object, "arrangement object not found");
                report.failures.push(ArrangementFailure {
                    row: row.row,
                    object: row.object.clone(),
                    reason: "object not found".to_string(),
                });
                continue;
            };

            let target = if row.visible {
                match row.position {
                    Some(p) => p,
                    None => {
                        warn!(arrangement = %name, row = row.row, object = %row.object, "visible row without position");
                        report.failures.push(ArrangementFailure {
                            row: row.row,
                            object: row.object.clone(),
                            reason: "missing coordinate".to_string(),
                        });
                        continue;
                    }
                }
            } else {
                HIDDEN_POSITION
            };

            match objects.set_position(handle, target) {
                Ok(()) if row.visible => report.placed += 1,
                Ok(()) => report.hidden += 1,
                Err(e) => {
                    warn!(arrangement = %name, row = row.row, object = %row.object, error = %e, "arrangement move failed");
                    report.failures.push(ArrangementFailure {
                        row: row.row,
                        object: row.object.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            arrangement = %name,
            placed = report.placed,
            hidden = report.hidden,
            failed = report.failures.len(),
            "arrangement applied"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomrecall_rig::sim::{SimObjectSpec, SimRig};
    use roomrecall_rig::{ObjectStore, SceneBackend};

    const TABLE: &str = "\
arrangement,object,visible,pos_x,pos_y,pos_z,rot_x,rot_y,rot_z
A1,K01_L05,1,0.5,0.9,-1.2,0,90,0
A1,K01_L06,0,,,,,,
A1,K01_L99,1,1,1,1,0,0,0
A2,K01_L05,1,-0.5,0.9,1.2,0,0,0
A1,K01_L07,1,0.2,,0.4,0,0,0
";

    fn loaded_rig() -> (SimRig, ObjectRegistry) {
        let mut rig = SimRig::builder()
            .with_scene(
                "K01",
                vec![
                    SimObjectSpec::new("K01_L05", Vec3::new(0.0, 1.0, 0.0)),
                    SimObjectSpec::new("K01_L06", Vec3::new(1.0, 1.0, 0.0)),
                    SimObjectSpec::new("K01_L07", Vec3::new(2.0, 1.0, 0.0)),
                ],
            )
            .build();
        rig.begin_load("K01").unwrap();
        let mut registry = ObjectRegistry::new();
        registry.publish_scene("K01", rig.scene_objects("K01"));
        (rig, registry)
    }

    #[test]
    fn names_in_first_seen_order() {
        let table = ArrangementTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(table.names(), vec!["A1", "A2"]);
        assert_eq!(table.len(), 5);
        assert_eq!(table.rows_for("A2").count(), 1);
    }

    #[test]
    fn apply_places_hides_and_reports() {
        let table = ArrangementTable::from_reader(TABLE.as_bytes()).unwrap();
        let (mut rig, registry) = loaded_rig();

        let report = table.apply("A1", &registry, &mut rig);
        assert_eq!(report.placed, 1);
        assert_eq!(report.hidden, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].row, 3);
        assert_eq!(report.failures[0].object, "K01_L99");
        assert_eq!(report.failures[1].object, "K01_L07");

        let placed = registry.resolve("K01_L05").unwrap();
        assert_eq!(rig.pose(placed).unwrap().position, Vec3::new(0.5, 0.9, -1.2));

        // Parked objects stay resolvable.
        let parked = registry.resolve("K01_L06").unwrap();
        assert_eq!(rig.pose(parked).unwrap().position, HIDDEN_POSITION);

        // Rows with a missing coordinate leave the object alone.
        let untouched = registry.resolve("K01_L07").unwrap();
        assert_eq!(rig.pose(untouched).unwrap().position, Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn unknown_arrangement_is_a_noop() {
        let table = ArrangementTable::from_reader(TABLE.as_bytes()).unwrap();
        let (mut rig, registry) = loaded_rig();
        let report = table.apply("A9", &registry, &mut rig);
        assert_eq!(report, ArrangementReport::default());
        assert!(report.is_clean());
    }

    #[test]
    fn malformed_row_fails_the_build() {
        let bad = "arrangement,object,visible,pos_x,pos_y,pos_z\nA1,K01_L05,1,0,0,0\nA1,K01_L06,yes,0,0,0\n";
        let err = ArrangementTable::from_reader(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, ExperimentError::ArrangementParse { row: 2, .. }));

        let out_of_range = "arrangement,object,visible,pos_x,pos_y,pos_z\nA1,K01_L05,2,0,0,0\n";
        let err = ArrangementTable::from_reader(out_of_range.as_bytes()).unwrap_err();
        assert!(matches!(err, ExperimentError::ArrangementParse { row: 1, .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arrangements.csv");
        let err = ArrangementTable::from_path(&path).unwrap_err();
        assert!(matches!(err, ExperimentError::ArrangementFileMissing(_)));

        std::fs::write(&path, TABLE).unwrap();
        let table = ArrangementTable::from_path(&path).unwrap();
        assert_eq!(table.names(), vec!["A1", "A2"]);
    }
}
