use std::collections::{HashMap, HashSet};

/// One row of the region registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub display_name: String,
    /// Stable identifier shared with the topology (e.g. an administrative code).
    pub region_key: String,
    pub tooltip_text: String,
}

/// Name-keyed lookup table of regions. Lookups ignore case.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    by_name: HashMap<String, RegionRecord>,
    keys: HashSet<String>,
}

impl Registry {
    pub const DEFAULT_DELIMITER: char = ';';

    pub fn new() -> Self {
        Self::default()
    }

    /// Parse delimited text. The first line is a header and is discarded.
    ///
    /// Columns are positional: display name, region key, tooltip text.
    /// Rows with a missing or blank field are skipped.
    pub fn parse(text: &str, delimiter: char) -> Self {
        let mut registry = Self::new();
        let mut skipped = 0usize;

        for (line_no, line) in text.lines().enumerate().skip(1) {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let mut fields = line.splitn(3, delimiter).map(str::trim);
            let (Some(name), Some(key), Some(tooltip)) = (fields.next(), fields.next(), fields.next())
            else {
                tracing::info!(line = line_no + 1, "registry row has too few fields; skipped");
                skipped += 1;
                continue;
            };
            if name.is_empty() || key.is_empty() || tooltip.is_empty() {
                tracing::info!(line = line_no + 1, "registry row has an empty field; skipped");
                skipped += 1;
                continue;
            }

            registry.insert(RegionRecord {
                display_name: name.to_string(),
                region_key: key.to_string(),
                tooltip_text: tooltip.to_string(),
            });
        }

        tracing::info!(regions = registry.len(), skipped, "registry parsed");
        registry
    }

    /// Insert a record unless its name or key is already taken. First entry wins.
    pub fn insert(&mut self, record: RegionRecord) -> bool {
        let name = normalize(&record.display_name);
        if self.by_name.contains_key(&name) {
            tracing::warn!(name = %record.display_name, "duplicate region name; keeping first");
            return false;
        }
        if self.keys.contains(&record.region_key) {
            tracing::warn!(key = %record.region_key, "duplicate region key; keeping first");
            return false;
        }
        self.keys.insert(record.region_key.clone());
        self.by_name.insert(name, record);
        true
    }

    /// Case-insensitive lookup by display name. Surrounding whitespace is ignored.
    pub fn lookup(&self, name: &str) -> Option<&RegionRecord> {
        self.by_name.get(&normalize(name))
    }

    /// Records whose name starts with `prefix` (case-insensitive), sorted by name.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<&RegionRecord> {
        let prefix = normalize(prefix);
        if prefix.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<(&String, &RegionRecord)> = self
            .by_name
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(b.0));
        hits.into_iter().take(limit).map(|(_, record)| record).collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
