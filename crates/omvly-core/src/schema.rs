// ── Category schemas ──
//
// Compile-time field tables for every RPC call the poller issues.
// Each table lists the fields to extract, how to coerce them, and the
// fallback used when the device omits a value. Tables are checked once
// by `validate_all` when a poller is built.

use serde_json::Value;

use crate::error::CoreError;
use crate::model::FieldValue;

// ── Field kinds ──────────────────────────────────────────────────────

/// Closed set of coercions a field can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Raw scalar passed through; `null` and blank strings count as absent.
    Text,
    /// Truthy/falsy folding of bools, numbers and common strings.
    Bool,
}

type Coercion = fn(&Value) -> Option<FieldValue>;

impl FieldKind {
    /// The coercion function for this kind.
    pub const fn coercion(self) -> Coercion {
        match self {
            Self::Text => coerce_text,
            Self::Bool => coerce_bool,
        }
    }

    pub fn coerce(self, raw: &Value) -> Option<FieldValue> {
        (self.coercion())(raw)
    }
}

fn coerce_text(raw: &Value) -> Option<FieldValue> {
    match raw {
        Value::String(s) if s.trim().is_empty() => None,
        other => FieldValue::from_json(other),
    }
}

fn coerce_bool(raw: &Value) -> Option<FieldValue> {
    let b = match raw {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x.abs() > 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" | "" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(FieldValue::Bool(b))
}

// ── Field specs ──────────────────────────────────────────────────────

/// Typed default for a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    Text(&'static str),
    Int(i64),
    Bool(bool),
}

impl Fallback {
    pub fn to_value(self) -> FieldValue {
        match self {
            Self::Text(s) => FieldValue::from(s),
            Self::Int(i) => FieldValue::Int(i),
            Self::Bool(b) => FieldValue::Bool(b),
        }
    }
}

/// One field to extract from a raw row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: Option<Fallback>,
}

impl FieldSpec {
    /// Row key field; never defaulted.
    pub const fn key(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            default: None,
        }
    }

    pub const fn text(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            default: Some(Fallback::Text(default)),
        }
    }

    pub const fn int(name: &'static str, default: i64) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            default: Some(Fallback::Int(default)),
        }
    }

    /// Boolean field defaulting to `false`.
    pub const fn flag(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Bool,
            default: Some(Fallback::Bool(false)),
        }
    }

    /// Coerce a raw value, falling back to the default.
    pub fn resolve(&self, raw: Option<&Value>) -> Option<FieldValue> {
        raw.and_then(|v| self.kind.coerce(v))
            .or_else(|| self.default.map(Fallback::to_value))
    }
}

/// Discard a raw row whose `name` field equals `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipRule {
    pub name: &'static str,
    pub value: &'static str,
}

impl SkipRule {
    pub fn matches(&self, row: &serde_json::Map<String, Value>) -> bool {
        match row.get(self.name) {
            Some(Value::String(s)) => s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

// ── Schema ───────────────────────────────────────────────────────────

/// Declarative description of one normalization call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schema {
    pub name: &'static str,
    /// Rows are grouped by this field. `None` means a single flat record.
    pub key: Option<&'static str>,
    pub fields: &'static [FieldSpec],
    /// Written once per key, then carried forward.
    pub ensure: &'static [FieldSpec],
    pub skip: &'static [SkipRule],
}

impl Schema {
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// Check the table is internally consistent.
    ///
    /// Every field except the key must carry a default so normalized
    /// records always hold the full field set.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |message: String| CoreError::Schema {
            schema: self.name,
            message,
        };

        if let Some(key) = self.key {
            match self.fields.iter().find(|f| f.name == key) {
                None => return Err(fail(format!("key field '{key}' is not declared"))),
                Some(f) if f.default.is_some() => {
                    return Err(fail(format!("key field '{key}' must not have a default")));
                }
                Some(_) => {}
            }
        }

        let all = self.fields.iter().chain(self.ensure);
        for (i, spec) in all.clone().enumerate() {
            if Some(spec.name) != self.key && spec.default.is_none() {
                return Err(fail(format!("field '{}' has no default", spec.name)));
            }
            if all.clone().skip(i + 1).any(|other| other.name == spec.name) {
                return Err(fail(format!("field '{}' declared twice", spec.name)));
            }
            if spec.kind == FieldKind::Bool && !matches!(spec.default, Some(Fallback::Bool(_))) {
                return Err(fail(format!(
                    "bool field '{}' needs a bool default",
                    spec.name
                )));
            }
        }

        Ok(())
    }
}

// ── Tables ───────────────────────────────────────────────────────────

/// SMART attributes copied onto disk records.
pub const SMART_COUNTERS: [&str; 9] = [
    "Raw_Read_Error_Rate",
    "Spin_Up_Time",
    "Start_Stop_Count",
    "Reallocated_Sector_Ct",
    "Seek_Error_Rate",
    "Load_Cycle_Count",
    "Temperature_Celsius",
    "UDMA_CRC_Error_Count",
    "Multi_Zone_Error_Rate",
];

/// Device name prefixes with no SMART data (SD cards, optical, cache).
pub const SMART_SKIP_PREFIXES: [&str; 3] = ["mmcblk", "sr", "bcache"];

pub const HWINFO: Schema = Schema {
    name: "hwinfo",
    key: None,
    fields: &[
        FieldSpec::text("hostname", "unknown"),
        FieldSpec::text("version", "unknown"),
        FieldSpec::int("cpuUsage", 0),
        FieldSpec::int("memTotal", 0),
        FieldSpec::int("memUsed", 0),
        FieldSpec::text("uptime", "0 days 0 hours 0 minutes 0 seconds"),
        FieldSpec::flag("configDirty"),
        FieldSpec::flag("rebootRequired"),
        FieldSpec::flag("pkgUpdatesAvailable"),
    ],
    ensure: &[FieldSpec::int("memUsage", 0)],
    skip: &[],
};

pub const PLUGIN: Schema = Schema {
    name: "plugin",
    key: Some("name"),
    fields: &[FieldSpec::key("name"), FieldSpec::flag("installed")],
    ensure: &[],
    skip: &[],
};

pub const DISK: Schema = Schema {
    name: "disk",
    key: Some("devicename"),
    fields: &[
        FieldSpec::key("devicename"),
        FieldSpec::text("canonicaldevicefile", ""),
        FieldSpec::text("size", "unknown"),
        FieldSpec::flag("israid"),
        FieldSpec::flag("isroot"),
    ],
    ensure: &[
        FieldSpec::text("devicemodel", "unknown"),
        FieldSpec::text("serialnumber", "unknown"),
        FieldSpec::text("firmwareversion", "unknown"),
        FieldSpec::text("sectorsize", "unknown"),
        FieldSpec::text("rotationrate", "unknown"),
        FieldSpec::text("writecacheis", "unknown"),
        FieldSpec::text("smartsupportis", "unknown"),
        FieldSpec::text(SMART_COUNTERS[0], "unknown"),
        FieldSpec::text(SMART_COUNTERS[1], "unknown"),
        FieldSpec::text(SMART_COUNTERS[2], "unknown"),
        FieldSpec::text(SMART_COUNTERS[3], "unknown"),
        FieldSpec::text(SMART_COUNTERS[4], "unknown"),
        FieldSpec::text(SMART_COUNTERS[5], "unknown"),
        FieldSpec::text(SMART_COUNTERS[6], "unknown"),
        FieldSpec::text(SMART_COUNTERS[7], "unknown"),
        FieldSpec::text(SMART_COUNTERS[8], "unknown"),
    ],
    skip: &[],
};

pub const FS: Schema = Schema {
    name: "fs",
    key: Some("uuid"),
    fields: &[
        FieldSpec::key("uuid"),
        FieldSpec::text("parentdevicefile", "unknown"),
        FieldSpec::text("label", "unknown"),
        FieldSpec::text("type", "unknown"),
        FieldSpec::text("mountpoint", "unknown"),
        FieldSpec::text("available", "unknown"),
        FieldSpec::text("size", "unknown"),
        FieldSpec::text("percentage", "unknown"),
        FieldSpec::flag("_readonly"),
        FieldSpec::flag("_used"),
    ],
    ensure: &[],
    skip: &[
        SkipRule {
            name: "type",
            value: "swap",
        },
        SkipRule {
            name: "type",
            value: "iso9660",
        },
    ],
};

pub const SERVICE: Schema = Schema {
    name: "service",
    key: Some("name"),
    fields: &[
        FieldSpec::key("name"),
        FieldSpec::text("title", "unknown"),
        FieldSpec::flag("enabled"),
        FieldSpec::flag("running"),
    ],
    ensure: &[],
    skip: &[],
};

pub const SMART_INFO: Schema = Schema {
    name: "smart-info",
    key: None,
    fields: &[
        FieldSpec::text("devicemodel", "unknown"),
        FieldSpec::text("serialnumber", "unknown"),
        FieldSpec::text("firmwareversion", "unknown"),
        FieldSpec::text("sectorsize", "unknown"),
        FieldSpec::text("rotationrate", "unknown"),
        FieldSpec::flag("writecacheis"),
        FieldSpec::flag("smartsupportis"),
    ],
    ensure: &[],
    skip: &[],
};

pub const SMART_ATTRIBUTES: Schema = Schema {
    name: "smart-attributes",
    key: Some("attrname"),
    fields: &[
        FieldSpec::key("attrname"),
        FieldSpec::int("threshold", 0),
        FieldSpec::int("rawvalue", 0),
    ],
    ensure: &[],
    skip: &[],
};

pub const ALL: [&Schema; 7] = [
    &HWINFO,
    &PLUGIN,
    &DISK,
    &FS,
    &SERVICE,
    &SMART_INFO,
    &SMART_ATTRIBUTES,
];

/// Validate every built-in table.
pub fn validate_all() -> Result<(), CoreError> {
    ALL.iter().try_for_each(|schema| schema.validate())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builtin_tables_are_valid() {
        validate_all().expect("built-in schemas validate");
    }

    #[test]
    fn bool_coercion_table() {
        let cases = [
            (json!(true), Some(true)),
            (json!(0), Some(false)),
            (json!(2), Some(true)),
            (json!("1"), Some(true)),
            (json!("False"), Some(false)),
            (json!(" on "), Some(true)),
            (json!(""), Some(false)),
            (json!("maybe"), None),
            (json!(null), None),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                FieldKind::Bool.coerce(&raw).and_then(|v| v.as_bool()),
                expected,
                "raw = {raw}"
            );
        }
    }

    #[test]
    fn text_coercion_treats_blank_as_absent() {
        assert_eq!(FieldKind::Text.coerce(&json!("   ")), None);
        assert_eq!(FieldKind::Text.coerce(&json!(null)), None);
        assert_eq!(
            FieldKind::Text.coerce(&json!(" sda ")),
            Some(FieldValue::from(" sda "))
        );
    }

    #[test]
    fn resolve_prefers_raw_over_default() {
        let spec = FieldSpec::text("label", "unknown");
        assert_eq!(spec.resolve(None), Some(FieldValue::from("unknown")));
        assert_eq!(
            spec.resolve(Some(&json!("data"))),
            Some(FieldValue::from("data"))
        );

        let flag = FieldSpec::flag("running");
        assert_eq!(flag.resolve(Some(&json!("garbage"))), Some(FieldValue::Bool(false)));
    }

    #[test]
    fn validate_rejects_missing_default() {
        const BROKEN: Schema = Schema {
            name: "broken",
            key: Some("id"),
            fields: &[FieldSpec::key("id"), FieldSpec::key("label")],
            ensure: &[],
            skip: &[],
        };
        let err = BROKEN.validate().expect_err("label has no default");
        assert!(err.to_string().contains("label"), "got: {err}");
    }

    #[test]
    fn validate_rejects_undeclared_key() {
        const BROKEN: Schema = Schema {
            name: "broken",
            key: Some("uuid"),
            fields: &[FieldSpec::text("label", "unknown")],
            ensure: &[],
            skip: &[],
        };
        assert!(BROKEN.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicates_across_ensure() {
        const BROKEN: Schema = Schema {
            name: "broken",
            key: None,
            fields: &[FieldSpec::int("memUsage", 0)],
            ensure: &[FieldSpec::int("memUsage", 0)],
            skip: &[],
        };
        assert!(BROKEN.validate().is_err());
    }

    #[test]
    fn skip_rule_matches_string_field() {
        let rule = SkipRule {
            name: "type",
            value: "swap",
        };
        let row = json!({ "type": "swap" });
        assert!(rule.matches(row.as_object().expect("object")));
        let row = json!({ "type": "ext4" });
        assert!(!rule.matches(row.as_object().expect("object")));
    }
}
