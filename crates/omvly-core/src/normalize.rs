// ── Normalization engine ──
//
// Turns loosely-typed RPC payloads into records with a stable field set,
// merging against the previous cycle's data. Never fails: missing or
// malformed values fall back to schema defaults.

use serde_json::{Map, Value};

use crate::model::{CategoryData, Collection, Record};
use crate::schema::{Fallback, Schema};

type Row = Map<String, Value>;

/// Normalize `raw` against `schema`, merging with `existing`.
///
/// Keyed schemas produce a [`CategoryData::Keyed`] collection; record
/// schemas produce a [`CategoryData::Record`]. A shape mismatch between
/// `existing` and the schema is treated as "no prior data".
pub fn normalize(existing: &CategoryData, raw: &Value, schema: &Schema) -> CategoryData {
    if schema.is_keyed() {
        let output = match existing {
            CategoryData::Keyed(prior) => normalize_keyed(prior, raw, schema),
            CategoryData::Record(_) => normalize_keyed(&Collection::new(), raw, schema),
        };
        CategoryData::Keyed(output)
    } else {
        let output = match existing {
            CategoryData::Record(prior) => normalize_record(prior, raw, schema),
            CategoryData::Keyed(_) => normalize_record(&Record::new(), raw, schema),
        };
        CategoryData::Record(output)
    }
}

/// Single-record normalization.
///
/// Uses the first row of `raw`. Absent input (or a skipped row) returns
/// `existing` unchanged.
pub fn normalize_record(existing: &Record, raw: &Value, schema: &Schema) -> Record {
    match rows(raw).into_iter().next() {
        Some(row) if !skipped(row, schema) => build_record(Some(existing), row, schema),
        _ => existing.clone(),
    }
}

/// Keyed-collection normalization.
///
/// The result holds exactly the keys produced by `raw`, in response order.
/// Keys missing from `raw` are dropped; absent input yields an empty
/// collection.
pub fn normalize_keyed(existing: &Collection, raw: &Value, schema: &Schema) -> Collection {
    let Some(key_field) = schema.key else {
        return Collection::new();
    };

    let mut output = Collection::new();
    for row in rows(raw) {
        if skipped(row, schema) {
            continue;
        }
        let Some(key) = row.get(key_field).and_then(stringify_key) else {
            continue;
        };
        let record = build_record(existing.get(&key), row, schema);
        output.insert(key, record);
    }
    output
}

// ── Internals ────────────────────────────────────────────────────────

fn build_record(prior: Option<&Record>, row: &Row, schema: &Schema) -> Record {
    let mut record = Record::new();

    for spec in schema.fields {
        if let Some(value) = spec.resolve(row.get(spec.name)) {
            record.insert(spec.name.to_owned(), value);
        }
    }

    // Ensure fields never read the row: dedicated sub-fetches fill them.
    for spec in schema.ensure {
        let carried = prior.and_then(|p| p.get(spec.name)).cloned();
        if let Some(value) = carried.or_else(|| spec.default.map(Fallback::to_value)) {
            record.insert(spec.name.to_owned(), value);
        }
    }

    // Fields written outside the engine (derived values, enrichment)
    // survive until the key disappears.
    if let Some(prior) = prior {
        for (name, value) in prior {
            if !record.contains_key(name) {
                record.insert(name.clone(), value.clone());
            }
        }
    }

    record
}

/// Flatten the accepted payload shapes into a list of rows.
fn rows(raw: &Value) -> Vec<&Row> {
    match raw {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => match unwrap_list(map) {
            Some(items) => items.iter().filter_map(Value::as_object).collect(),
            None if map.is_empty() => Vec::new(),
            None => vec![map],
        },
        _ => Vec::new(),
    }
}

/// `{"data": [...]}` or a single-entry object holding a list.
fn unwrap_list(map: &Row) -> Option<&Vec<Value>> {
    if let Some(Value::Array(items)) = map.get("data") {
        return Some(items);
    }
    match map.values().next() {
        Some(Value::Array(items)) if map.len() == 1 => Some(items),
        _ => None,
    }
}

fn skipped(row: &Row, schema: &Schema) -> bool {
    schema.skip.iter().any(|rule| rule.matches(row))
}

fn stringify_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::FieldValue;
    use crate::schema::{DISK, FS, FieldSpec, HWINFO, SERVICE, SMART_ATTRIBUTES, SkipRule};

    fn keys(collection: &Collection) -> Vec<&str> {
        collection.keys().map(String::as_str).collect()
    }

    #[test]
    fn every_declared_field_present_once() {
        let raw = json!({ "hostname": "nas", "cpuUsage": 12.34 });
        let record = normalize_record(&Record::new(), &raw, &HWINFO);

        let names: Vec<&str> = record.keys().map(String::as_str).collect();
        let expected: Vec<&str> = HWINFO
            .fields
            .iter()
            .chain(HWINFO.ensure)
            .map(|f| f.name)
            .collect();
        assert_eq!(names, expected);
        assert_eq!(record["hostname"], FieldValue::from("nas"));
        assert_eq!(record["version"], FieldValue::from("unknown"));
        assert_eq!(record["configDirty"], FieldValue::Bool(false));
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = json!([
            { "devicename": "sda", "canonicaldevicefile": "/dev/sda", "size": "4000787030016", "israid": "0" },
            { "devicename": "sdb", "canonicaldevicefile": "/dev/sdb", "isroot": true },
        ]);
        let first = normalize_keyed(&Collection::new(), &raw, &DISK);
        let second = normalize_keyed(&first, &raw, &DISK);
        assert_eq!(first, second);
    }

    #[test]
    fn ensure_fields_persist_across_calls() {
        let first = json!([{ "devicename": "sda", "serialnumber": "WD-123" }]);
        let collection = normalize_keyed(&Collection::new(), &first, &DISK);
        assert_eq!(collection["sda"]["serialnumber"], FieldValue::from("unknown"));

        let mut enriched = collection.clone();
        if let Some(disk) = enriched.get_mut("sda") {
            disk.insert("serialnumber".into(), FieldValue::from("WD-123"));
            disk.insert("devicemodel".into(), FieldValue::from("WDC WD40EFRX"));
        }

        let later = json!([{ "devicename": "sda", "serialnumber": "changed" }]);
        let collection = normalize_keyed(&enriched, &later, &DISK);
        assert_eq!(collection["sda"]["serialnumber"], FieldValue::from("WD-123"));
        assert_eq!(collection["sda"]["devicemodel"], FieldValue::from("WDC WD40EFRX"));
    }

    #[test]
    fn ensure_fields_ignore_raw_values_on_first_appearance() {
        let raw = json!([{ "devicename": "sda", "serialnumber": "WD-123", "devicemodel": "WDC" }]);
        let collection = normalize_keyed(&Collection::new(), &raw, &DISK);
        assert_eq!(collection["sda"]["serialnumber"], FieldValue::from("unknown"));
        assert_eq!(collection["sda"]["devicemodel"], FieldValue::from("unknown"));
    }

    #[test]
    fn ensure_default_applies_on_first_appearance() {
        let raw = json!([{ "devicename": "sdc" }]);
        let collection = normalize_keyed(&Collection::new(), &raw, &DISK);
        assert_eq!(collection["sdc"]["Temperature_Celsius"], FieldValue::from("unknown"));
        assert_eq!(collection["sdc"]["canonicaldevicefile"], FieldValue::from(""));
    }

    #[test]
    fn keyed_merge_is_set_difference() {
        let old = json!([{ "name": "A" }, { "name": "B" }, { "name": "C" }]);
        let existing = normalize_keyed(&Collection::new(), &old, &SERVICE);
        assert_eq!(keys(&existing), ["A", "B", "C"]);

        let new = json!([
            { "name": "B", "running": true },
            { "name": "C" },
            { "name": "D", "title": "Samba" },
        ]);
        let merged = normalize_keyed(&existing, &new, &SERVICE);
        assert_eq!(keys(&merged), ["B", "C", "D"]);
        assert_eq!(merged["B"]["running"], FieldValue::Bool(true));
        assert_eq!(merged["D"]["title"], FieldValue::from("Samba"));
    }

    #[test]
    fn skip_rules_exclude_rows() {
        let raw = json!([
            { "uuid": "a1", "type": "ext4", "label": "data" },
            { "uuid": "b2", "type": "swap" },
            { "uuid": "c3", "type": "iso9660" },
        ]);
        let collection = normalize_keyed(&Collection::new(), &raw, &FS);
        assert_eq!(keys(&collection), ["a1"]);
    }

    #[test]
    fn skip_rule_applies_to_any_declared_field() {
        const ONLY_ACTIVE: Schema = Schema {
            name: "only-active",
            key: Some("name"),
            fields: &[FieldSpec::key("name"), FieldSpec::text("state", "unknown")],
            ensure: &[],
            skip: &[SkipRule {
                name: "state",
                value: "disabled",
            }],
        };
        let raw = json!([{ "name": "nfs", "state": "disabled" }, { "name": "ssh" }]);
        let collection = normalize_keyed(&Collection::new(), &raw, &ONLY_ACTIVE);
        assert_eq!(keys(&collection), ["ssh"]);
    }

    #[test]
    fn absent_input_keeps_record_and_empties_collection() {
        let prior = normalize_record(&Record::new(), &json!({ "hostname": "nas" }), &HWINFO);
        assert_eq!(normalize_record(&prior, &json!(null), &HWINFO), prior);
        assert_eq!(normalize_record(&prior, &json!({}), &HWINFO), prior);

        let existing = normalize_keyed(&Collection::new(), &json!([{ "name": "ssh" }]), &SERVICE);
        assert!(normalize_keyed(&existing, &json!(null), &SERVICE).is_empty());
        assert!(normalize_keyed(&existing, &json!([]), &SERVICE).is_empty());
    }

    #[test]
    fn unwraps_data_envelope() {
        let raw = json!({ "total": 2, "data": [{ "name": "nfs" }, { "name": "smb" }] });
        let collection = normalize_keyed(&Collection::new(), &raw, &SERVICE);
        assert_eq!(keys(&collection), ["nfs", "smb"]);

        let raw = json!({ "items": [{ "attrname": "Spin_Up_Time", "rawvalue": "0" }] });
        let collection = normalize_keyed(&Collection::new(), &raw, &SMART_ATTRIBUTES);
        assert_eq!(keys(&collection), ["Spin_Up_Time"]);
    }

    #[test]
    fn rows_without_key_are_dropped() {
        let raw = json!([{ "title": "orphan" }, { "name": 42 }, { "name": "" }]);
        let collection = normalize_keyed(&Collection::new(), &raw, &SERVICE);
        assert_eq!(keys(&collection), ["42"]);
    }

    #[test]
    fn derived_fields_survive_renormalization() {
        let mut prior = normalize_record(&Record::new(), &json!({ "hostname": "nas" }), &HWINFO);
        prior.insert("uptimeEpoch".into(), FieldValue::from("2024-01-01T00:00:00+00:00"));

        let next = normalize_record(&prior, &json!({ "hostname": "nas2" }), &HWINFO);
        assert_eq!(next["hostname"], FieldValue::from("nas2"));
        assert_eq!(next["uptimeEpoch"], prior["uptimeEpoch"]);
    }

    #[test]
    fn dispatch_matches_schema_shape() {
        let out = normalize(
            &CategoryData::Record(Record::new()),
            &json!([{ "name": "ssh" }]),
            &SERVICE,
        );
        assert_eq!(out.as_keyed().map(Collection::len), Some(1));

        let out = normalize(
            &CategoryData::Keyed(Collection::new()),
            &json!({ "hostname": "nas" }),
            &HWINFO,
        );
        assert!(out.as_record().is_some());
    }
}
