//! Thermal zones exposed by the kernel under `class/thermal`
//!
//! Each `thermal_zone<N>` directory holds a `type` file naming the sensor
//! and a `temp` file with the current reading in milli-degrees Celsius.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hostpin_core::devices::{Celsius, Environment, Sensor, SensorError};
use tracing::debug;

const ZONE_PREFIX: &str = "thermal_zone";

/// One kernel thermal zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalZone {
    name: String,
    kind: String,
    dir: PathBuf,
}

impl ThermalZone {
    fn open(dir: PathBuf, name: String) -> Result<Self, SensorError> {
        let kind = fs::read_to_string(dir.join("type"))?.trim().to_owned();
        Ok(Self { name, kind, dir })
    }
}

impl Sensor for ThermalZone {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn sense(&mut self, env: &mut Environment) -> Result<(), SensorError> {
        let raw = fs::read_to_string(self.dir.join("temp"))?;
        let milli = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| SensorError::Parse(raw.trim().to_owned()))?;
        env.temperature = Celsius::from_milli(milli);
        Ok(())
    }
}

/// Zone index from a directory name, `None` for anything else
fn zone_index(name: &str) -> Option<u32> {
    name.strip_prefix(ZONE_PREFIX)?.parse().ok()
}

/// Enumerate thermal zones under the sysfs mount `root`, in zone order
///
/// A host without a thermal class has no zones; that is not an error.
pub fn thermal_zones(root: &Path) -> Result<Vec<ThermalZone>, SensorError> {
    let class = root.join("class").join("thermal");
    let entries = match fs::read_dir(&class) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %class.display(), "no thermal class");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(index) = zone_index(&name) {
            found.push((index, name, entry.path()));
        }
    }
    found.sort_by_key(|(index, _, _)| *index);

    let zones = found
        .into_iter()
        .map(|(_, name, dir)| ThermalZone::open(dir, name))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(count = zones.len(), "found thermal zones");
    Ok(zones)
}

/// Create `class/thermal/thermal_zone<index>` under `root`
#[cfg(test)]
pub(crate) fn add_zone(root: &Path, index: u32, kind: &str, temp: &str) {
    let dir = root.join(format!("class/thermal/thermal_zone{}", index));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("type"), format!("{}\n", kind)).unwrap();
    fs::write(dir.join("temp"), temp).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_zones_in_index_order() {
        let root = TempDir::new().unwrap();
        add_zone(root.path(), 10, "gpu-thermal", "40000\n");
        add_zone(root.path(), 2, "cpu-thermal", "45500\n");
        // Cooling devices share the directory and are ignored
        fs::create_dir_all(root.path().join("class/thermal/cooling_device0")).unwrap();

        let zones = thermal_zones(root.path()).unwrap();
        let names: Vec<_> = zones.iter().map(|z| z.name()).collect();
        assert_eq!(names, ["thermal_zone2", "thermal_zone10"]);
        assert_eq!(zones[0].kind(), "cpu-thermal");
    }

    #[test]
    fn test_sense_reads_millidegrees() {
        let root = TempDir::new().unwrap();
        add_zone(root.path(), 0, "cpu-thermal", "45500\n");

        let mut zone = thermal_zones(root.path()).unwrap().remove(0);
        let mut env = Environment::default();
        zone.sense(&mut env).unwrap();
        assert_eq!(env.temperature, Celsius(45_500));
        assert_eq!(env.temperature.to_string(), "45.500°C");
    }

    #[test]
    fn test_sense_rejects_garbage() {
        let root = TempDir::new().unwrap();
        add_zone(root.path(), 0, "cpu-thermal", "hot\n");

        let mut zone = thermal_zones(root.path()).unwrap().remove(0);
        let err = zone.sense(&mut Environment::default()).unwrap_err();
        assert!(matches!(err, SensorError::Parse(ref v) if v == "hot"));
    }

    #[test]
    fn test_missing_class_is_empty() {
        let root = TempDir::new().unwrap();
        assert!(thermal_zones(root.path()).unwrap().is_empty());
    }

    #[test]
    fn test_zone_index() {
        assert_eq!(zone_index("thermal_zone7"), Some(7));
        assert_eq!(zone_index("thermal_zone"), None);
        assert_eq!(zone_index("cooling_device0"), None);
    }
}
