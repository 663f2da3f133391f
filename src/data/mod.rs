//! Data model for published plugin values.
//!
//! Plugins publish their readings as *entries* grouped into *containers*.
//! An entry is one of exactly three shapes — text, sensor, or table — and
//! consumers branch on that kind, never on concrete types.
//!
//! Entries are shared live state: each concrete entry sits behind an `Arc`
//! with interior mutability, cloned into both the owning plugin and the
//! sensor registry. The registry is a pointer table into producer state,
//! not a snapshot store; readers see whatever the producer last wrote.

mod sensor;
mod table;

pub use sensor::{SensorEntry, DEFAULT_SENSOR_WINDOW};
pub use table::{TableCell, TableEntry};

use parking_lot::RwLock;
use std::sync::Arc;

/// A single string value, mutated in place by the owning plugin.
#[derive(Debug)]
pub struct TextEntry {
    id: String,
    name: String,
    value: RwLock<String>,
}

impl TextEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, initial: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: RwLock::new(initial.into()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> String {
        self.value.read().clone()
    }

    pub fn set(&self, value: impl Into<String>) {
        *self.value.write() = value.into();
    }
}

/// One published value, polymorphic over the three entry shapes.
///
/// Cloning is cheap (`Arc` clones) and yields another handle onto the same
/// live entry.
#[derive(Debug, Clone)]
pub enum DataEntry {
    Text(Arc<TextEntry>),
    Sensor(Arc<SensorEntry>),
    Table(Arc<TableEntry>),
}

impl DataEntry {
    pub fn text(id: impl Into<String>, name: impl Into<String>, initial: impl Into<String>) -> Self {
        Self::Text(Arc::new(TextEntry::new(id, name, initial)))
    }

    pub fn sensor(id: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self::Sensor(Arc::new(SensorEntry::new(id, name, unit)))
    }

    pub fn table(id: impl Into<String>, name: impl Into<String>, columns: Vec<String>) -> Self {
        Self::Table(Arc::new(TableEntry::new(id, name, columns)))
    }

    pub fn id(&self) -> &str {
        match self {
            DataEntry::Text(e) => e.id(),
            DataEntry::Sensor(e) => e.id(),
            DataEntry::Table(e) => e.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DataEntry::Text(e) => e.name(),
            DataEntry::Sensor(e) => e.name(),
            DataEntry::Table(e) => e.name(),
        }
    }

    /// Current value rendered for display.
    pub fn display_value(&self) -> String {
        match self {
            DataEntry::Text(e) => e.get(),
            DataEntry::Sensor(e) => {
                let unit = e.unit();
                if unit.is_empty() {
                    format!("{}", e.value())
                } else {
                    format!("{} {}", e.value(), unit)
                }
            }
            DataEntry::Table(e) => e.first_row_string(),
        }
    }
}

/// A named grouping of entries exposed by one plugin instance.
///
/// Containers are rebuilt every time the owning plugin (re)initializes.
/// Entry ids must be unique within a container, container ids within a
/// plugin; the registry address is then globally unique by construction.
#[derive(Debug, Clone)]
pub struct Container {
    id: String,
    name: String,
    ephemeral: bool,
    entries: Vec<DataEntry>,
}

impl Container {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ephemeral: false,
            entries: Vec::new(),
        }
    }

    /// An ephemeral container keeps its id for identity purposes but is
    /// omitted from registry addresses.
    pub fn ephemeral(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ephemeral: true,
            ..Self::new(id, name)
        }
    }

    pub fn with_entry(mut self, entry: DataEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn push_entry(&mut self, entry: DataEntry) {
        self.entries.push(entry);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn entries(&self) -> &[DataEntry] {
        &self.entries
    }

    /// Find an entry by id.
    pub fn entry(&self, id: &str) -> Option<&DataEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_entry_mutation_is_shared() {
        let entry = DataEntry::text("status", "Status", "starting");
        let clone = entry.clone();

        if let DataEntry::Text(text) = &entry {
            text.set("running");
        }
        assert_eq!(clone.display_value(), "running");
    }

    #[test]
    fn test_container_lookup() {
        let container = Container::new("core", "Core")
            .with_entry(DataEntry::text("a", "A", ""))
            .with_entry(DataEntry::sensor("b", "B", "V"));

        assert!(container.entry("b").is_some());
        assert!(container.entry("missing").is_none());
        assert!(!container.is_ephemeral());
        assert!(Container::ephemeral("x", "X").is_ephemeral());
    }
}
