// The registry is the admission gate for the whole pipeline. Raw identifiers are keyed
// lowercase so that the device's inconsistent casing (magnetronFlow vs MagnetronFlow)
// resolves to one definition. Each alias line of a canonical parameter is folded into a
// single ParameterDefinition which is then frozen behind an Arc and shared by every stage.
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use fxhash::FxHashMap;

use super::category::Category;
use super::error::RegistryLoadError;
use super::parameter::{ExpectedRange, ParameterDefinition};

const COLUMN_SEPARATOR: char = '|';
const COMMENT_MARKER: char = '#';
const MIN_ENTRIES_PER_LINE: usize = 4; //raw id, name, unit, category
const RANGED_ENTRIES_PER_LINE: usize = 6; //plus expected min, expected max

/// Load the default map for windows
#[cfg(target_family = "windows")]
fn load_default_map() -> &'static str {
    include_str!("data\\default_parameter_map.txt")
}

/// Load the default map for macos and linux
#[cfg(target_family = "unix")]
fn load_default_map() -> &'static str {
    include_str!("data/default_parameter_map.txt")
}

/// One parsed row of the mapping file
struct MappingLine<'a> {
    raw: &'a str,
    name: &'a str,
    unit: &'a str,
    category: Category,
    expected_range: Option<ExpectedRange>,
}

fn parse_mapping_line(line: &str, line_number: usize) -> Result<MappingLine<'_>, RegistryLoadError> {
    let entries: Vec<&str> = line.split(COLUMN_SEPARATOR).map(|e| e.trim()).collect();
    if entries.len() != MIN_ENTRIES_PER_LINE && entries.len() != RANGED_ENTRIES_PER_LINE {
        return Err(RegistryLoadError::BadFileFormat(line_number));
    }
    if entries[0].is_empty() || entries[1].is_empty() {
        return Err(RegistryLoadError::BadFileFormat(line_number));
    }

    let category = Category::from_str(entries[3]).map_err(|tag| RegistryLoadError::BadCategory {
        line: line_number,
        tag,
    })?;

    let expected_range = if entries.len() == RANGED_ENTRIES_PER_LINE {
        let parse = |s: &str| {
            s.parse::<f64>().map_err(|e| RegistryLoadError::BadRange {
                line: line_number,
                source: e,
            })
        };
        let min = parse(entries[4])?;
        let max = parse(entries[5])?;
        if min > max {
            return Err(RegistryLoadError::BadFileFormat(line_number));
        }
        Some(ExpectedRange { min, max })
    } else {
        None
    };

    Ok(MappingLine {
        raw: entries[0],
        name: entries[1],
        unit: entries[2],
        category,
        expected_range,
    })
}

/// Registry maps raw device identifiers to their canonical ParameterDefinition.
///
/// The mapping comes from a line-oriented file where each row is
/// `raw identifier | canonical name | unit | category [| expected min | expected max]`.
/// Lines starting with `#` and blank lines are ignored. Several raw identifiers may name the
/// same canonical parameter; they are aliases and their records are merged downstream.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    definitions: Vec<Arc<ParameterDefinition>>,
    by_raw: FxHashMap<String, usize>,
    by_name: FxHashMap<String, usize>,
}

impl Registry {
    /// Create a new Registry
    /// If the path is None, we load the default that is bundled with the library
    pub fn new(path: Option<&Path>) -> Result<Self, RegistryLoadError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::from_mapping_str(load_default_map()),
        }
    }

    /// Load a Registry from a mapping file on disk
    pub fn load(path: &Path) -> Result<Self, RegistryLoadError> {
        if !path.exists() {
            return Err(RegistryLoadError::BadFilePath(path.to_path_buf()));
        }
        let mut contents = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
        Self::from_mapping_str(&contents)
    }

    /// Build a Registry from the text of a mapping file
    pub fn from_mapping_str(contents: &str) -> Result<Self, RegistryLoadError> {
        let mut building: Vec<ParameterDefinition> = Vec::new();
        let mut by_raw: FxHashMap<String, usize> = FxHashMap::default();
        let mut by_name: FxHashMap<String, usize> = FxHashMap::default();

        for (idx, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
                continue;
            }
            let entry = parse_mapping_line(trimmed, idx + 1)?;

            let def_idx = match by_name.get(entry.name) {
                Some(&existing) => {
                    let def = &mut building[existing];
                    if def.unit != entry.unit {
                        return Err(RegistryLoadError::ConflictingUnits {
                            name: def.canonical_name.clone(),
                            first: def.unit.clone(),
                            second: entry.unit.to_string(),
                        });
                    }
                    if def.category != entry.category {
                        return Err(RegistryLoadError::ConflictingCategories {
                            name: def.canonical_name.clone(),
                            first: def.category.to_string(),
                            second: entry.category.to_string(),
                        });
                    }
                    if def.expected_range.is_none() {
                        def.expected_range = entry.expected_range;
                    }
                    existing
                }
                None => {
                    building.push(ParameterDefinition::new(
                        entry.name,
                        entry.unit,
                        entry.category,
                        Vec::new(),
                        entry.expected_range,
                    ));
                    by_name.insert(entry.name.to_string(), building.len() - 1);
                    building.len() - 1
                }
            };

            let key = entry.raw.to_ascii_lowercase();
            match by_raw.get(&key) {
                Some(&owner) if owner == def_idx => continue, // Repeated line, nothing new
                Some(&owner) => {
                    return Err(RegistryLoadError::AliasConflict {
                        raw: entry.raw.to_string(),
                        first: building[owner].canonical_name.clone(),
                        second: building[def_idx].canonical_name.clone(),
                    });
                }
                None => {
                    by_raw.insert(key, def_idx);
                    building[def_idx].aliases.push(entry.raw.to_string());
                }
            }
        }

        if building.is_empty() {
            return Err(RegistryLoadError::Empty);
        }

        Ok(Self {
            definitions: building.into_iter().map(Arc::new).collect(),
            by_raw,
            by_name,
        })
    }

    /// Get the definition a raw identifier resolves to.
    ///
    /// If returns None the identifier is not admitted to the pipeline
    pub fn lookup(&self, raw_identifier: &str) -> Option<&Arc<ParameterDefinition>> {
        self.lookup_folded(raw_identifier, &mut String::new())
    }

    /// Same as `lookup`, but case-folds the identifier into `buf` so a caller checking many
    /// identifiers can reuse one allocation
    pub fn lookup_folded(
        &self,
        raw_identifier: &str,
        buf: &mut String,
    ) -> Option<&Arc<ParameterDefinition>> {
        buf.clear();
        buf.extend(raw_identifier.chars().map(|c| c.to_ascii_lowercase()));
        self.by_raw
            .get(buf.as_str())
            .map(|idx| &self.definitions[*idx])
    }

    pub fn contains(&self, raw_identifier: &str) -> bool {
        self.lookup(raw_identifier).is_some()
    }

    /// Get a definition by its canonical display name
    pub fn get(&self, canonical_name: &str) -> Option<&Arc<ParameterDefinition>> {
        self.by_name
            .get(canonical_name)
            .map(|idx| &self.definitions[*idx])
    }

    /// Every raw identifier that merges into the given canonical parameter
    pub fn alias_group(&self, canonical_name: &str) -> Option<&[String]> {
        self.get(canonical_name).map(|def| def.aliases.as_slice())
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<ParameterDefinition>> {
        self.definitions.iter()
    }

    /// Number of canonical parameters
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Number of raw identifiers admitted
    pub fn alias_count(&self) -> usize {
        self.by_raw.len()
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_MAP: &str = "\
# comment line
magnetronFlow | Magnetron Flow | L/min | cooling | 8 | 18

CoolingmagnetronFlowLowStatistics | Magnetron Flow | L/min | cooling
FanhumidityStatistics | Room Humidity | % | environmental
";

    #[test]
    fn test_default_map() {
        let registry = match Registry::new(None) {
            Ok(r) => r,
            Err(e) => panic!("{e}"),
        };
        assert!(registry.alias_count() >= 60);
        let def = registry.lookup("CoolingmagnetronFlowLowStatistics").unwrap();
        assert_eq!(def.canonical_name, "Magnetron Flow");
        assert_eq!(def.unit, "L/min");
        assert_eq!(def.category, Category::Cooling);
        for category in Category::ALL {
            assert!(registry.definitions().any(|d| d.category == category));
        }
    }

    #[test]
    fn test_aliases_share_definition() {
        let registry = Registry::from_mapping_str(SMALL_MAP).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.alias_count(), 3);
        let a = registry.lookup("magnetronFlow").unwrap();
        let b = registry.lookup("coolingmagnetronflowlowstatistics").unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(
            a.expected_range,
            Some(ExpectedRange {
                min: 8.0,
                max: 18.0
            })
        );
        let group = registry.alias_group("Magnetron Flow").unwrap();
        assert_eq!(
            group,
            &["magnetronFlow", "CoolingmagnetronFlowLowStatistics"]
        );
        assert!(registry.alias_group("Nope").is_none());
        assert!(registry.lookup("someUnknownSensor").is_none());
    }

    #[test]
    fn test_folded_lookup_reuses_buffer() {
        let registry = Registry::from_mapping_str(SMALL_MAP).unwrap();
        let mut buf = String::new();
        let a = registry.lookup_folded("MAGNETRONFLOW", &mut buf).unwrap();
        assert!(Arc::ptr_eq(a, registry.lookup("magnetronFlow").unwrap()));
        let capacity = buf.capacity();
        assert!(registry.lookup_folded("magnetronflow", &mut buf).is_some());
        assert_eq!(buf, "magnetronflow");
        assert_eq!(buf.capacity(), capacity);
        assert!(registry.lookup_folded("someUnknownSensor", &mut buf).is_none());
        assert_eq!(buf, "someunknownsensor");
    }

    #[test]
    fn test_conflicting_units() {
        let map = "a | Flow | L/min | cooling\nb | Flow | l/m | cooling\n";
        assert!(matches!(
            Registry::from_mapping_str(map),
            Err(RegistryLoadError::ConflictingUnits { .. })
        ));
    }

    #[test]
    fn test_alias_conflict() {
        let map = "a | Flow | L/min | cooling\nA | Temp | C | temperature\n";
        assert!(matches!(
            Registry::from_mapping_str(map),
            Err(RegistryLoadError::AliasConflict { .. })
        ));
    }

    #[test]
    fn test_repeated_line_is_accepted() {
        let map = "a | Flow | L/min | cooling\na | Flow | L/min | cooling\n";
        let registry = Registry::from_mapping_str(map).unwrap();
        assert_eq!(registry.alias_group("Flow").unwrap().len(), 1);
    }

    #[test]
    fn test_bad_lines() {
        assert!(matches!(
            Registry::from_mapping_str("a | Flow | L/min\n"),
            Err(RegistryLoadError::BadFileFormat(1))
        ));
        assert!(matches!(
            Registry::from_mapping_str("# header\na | Flow | L/min | plumbing\n"),
            Err(RegistryLoadError::BadCategory { line: 2, .. })
        ));
        assert!(matches!(
            Registry::from_mapping_str("a | Flow | L/min | cooling | x | 2\n"),
            Err(RegistryLoadError::BadRange { line: 1, .. })
        ));
        assert!(matches!(
            Registry::from_mapping_str("# nothing here\n\n"),
            Err(RegistryLoadError::Empty)
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Registry::load(Path::new("/definitely/not/a/mapping.txt"));
        assert!(matches!(result, Err(RegistryLoadError::BadFilePath(_))));
    }
}
