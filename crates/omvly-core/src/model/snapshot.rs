// ── Snapshot domain types ──
//
// The snapshot is a fixed set of categories. `hwinfo` is a single record;
// every other category is a collection keyed by a device-supplied value.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::value::FieldValue;

/// Field name → typed value, in schema declaration order.
pub type Record = IndexMap<String, FieldValue>;

/// Stringified row key → record, in device response order.
pub type Collection = IndexMap<String, Record>;

/// Output of the normalization engine: a flat record or a keyed collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryData {
    Record(Record),
    Keyed(Collection),
}

impl CategoryData {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            Self::Keyed(_) => None,
        }
    }

    pub fn as_keyed(&self) -> Option<&Collection> {
        match self {
            Self::Keyed(c) => Some(c),
            Self::Record(_) => None,
        }
    }
}

/// Named slice of the snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Hwinfo,
    Plugin,
    Disk,
    Fs,
    Service,
}

/// Everything known about one device.
///
/// Owned by the poller; consumers only ever hold published `Arc` copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub hwinfo: Record,
    pub plugin: Collection,
    pub disk: Collection,
    pub fs: Collection,
    pub service: Collection,
}

impl Snapshot {
    /// Keyed collection backing a category. `None` for `hwinfo`.
    pub fn collection(&self, category: Category) -> Option<&Collection> {
        match category {
            Category::Hwinfo => None,
            Category::Plugin => Some(&self.plugin),
            Category::Disk => Some(&self.disk),
            Category::Fs => Some(&self.fs),
            Category::Service => Some(&self.service),
        }
    }

    /// Owned copy of one category, shaped like the engine output.
    pub fn category(&self, category: Category) -> CategoryData {
        match self.collection(category) {
            Some(c) => CategoryData::Keyed(c.clone()),
            None => CategoryData::Record(self.hwinfo.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hwinfo.is_empty()
            && self.plugin.is_empty()
            && self.disk.is_empty()
            && self.fs.is_empty()
            && self.service.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn category_names_round_trip() {
        let names: Vec<String> = Category::iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["hwinfo", "plugin", "disk", "fs", "service"]);
        assert_eq!(Category::from_str("fs").ok(), Some(Category::Fs));
    }

    #[test]
    fn category_view_matches_shape() {
        let mut snap = Snapshot::default();
        assert!(snap.is_empty());

        snap.hwinfo.insert("hostname".into(), FieldValue::from("nas"));
        snap.disk.insert("sda".into(), Record::new());

        assert!(snap.category(Category::Hwinfo).as_record().is_some());
        assert_eq!(
            snap.category(Category::Disk).as_keyed().map(IndexMap::len),
            Some(1)
        );
        assert!(snap.collection(Category::Hwinfo).is_none());
    }
}
