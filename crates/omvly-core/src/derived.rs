// ── Derived fields ──
//
// Values computed from normalized records after a fetch: uptime epoch,
// rounded usage percentages, GiB sizes and SMART enrichment.

use chrono::{DateTime, Local, SecondsFormat, TimeDelta, Timelike};

use crate::model::{Collection, FieldValue, Record};
use crate::schema::SMART_COUNTERS;

pub const BYTES_PER_GIB: f64 = 1_073_741_824.0;

const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_HOUR: u64 = 3_600;

/// Devices above this major version report uptime as raw seconds.
const LAST_TEXT_UPTIME_MAJOR: u32 = 5;

/// Round to one decimal place.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// `used / total * 100`, one decimal; `0` when `total` is not positive.
pub fn memory_usage(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        round1(used / total * 100.0)
    } else {
        0.0
    }
}

pub fn bytes_to_gib(bytes: f64) -> f64 {
    round1(bytes / BYTES_PER_GIB)
}

/// Leading numeric segment of a dotted version string.
pub fn major_version(version: &str) -> Option<u32> {
    version.split('.').next()?.trim().parse().ok()
}

/// Render a signed second count as `"D days HH hours MM minutes SS seconds"`.
///
/// The breakdown uses the absolute value; negative totals get a leading `-`.
pub fn format_uptime(total: i64) -> String {
    let pos = total.unsigned_abs();
    let days = pos / SECS_PER_DAY;
    let rem = pos % SECS_PER_DAY;
    let hours = rem / SECS_PER_HOUR;
    let rem = rem % SECS_PER_HOUR;
    let mins = rem / 60;
    let secs = rem % 60;

    let text = format!("{days} days {hours:02} hours {mins:02} minutes {secs:02} seconds");
    if total < 0 { format!("-{text}") } else { text }
}

/// Parse `"D days H hours M minutes S seconds"` into total seconds.
///
/// A leading `-` negates the whole total.
pub fn parse_uptime(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let parts: Vec<&str> = body.split_whitespace().collect();
    let [days, _, hours, _, mins, _, secs, ..] = parts.as_slice() else {
        return None;
    };

    let total = [(days, 86_400), (hours, 3_600), (mins, 60), (secs, 1)]
        .into_iter()
        .try_fold(0_i64, |acc, (part, scale)| {
            part.parse::<i64>().ok()?.checked_mul(scale)?.checked_add(acc)
        })?;

    Some(if negative { -total } else { total })
}

/// Total uptime seconds from the raw `version` and `uptime` fields.
///
/// Without a readable major version the branch follows the value type:
/// numbers are second counts, text is the pre-formatted form.
pub fn uptime_seconds(version: Option<&str>, uptime: &FieldValue) -> Option<i64> {
    let as_text = || uptime.as_str().and_then(parse_uptime);
    let integer_branch = match version.and_then(major_version) {
        Some(major) => major > LAST_TEXT_UPTIME_MAJOR,
        None => !matches!(uptime, FieldValue::Text(_)),
    };

    if integer_branch {
        uptime
            .as_i64()
            .and_then(|secs| parse_uptime(&format_uptime(secs)))
            .or_else(as_text)
    } else {
        as_text().or_else(|| uptime.as_i64())
    }
}

/// Boot instant as an ISO-8601 local timestamp, `secs` before `now`.
pub fn uptime_epoch(now: DateTime<Local>, secs: i64) -> Option<String> {
    let now = now.with_nanosecond(0)?;
    let boot = now.checked_sub_signed(TimeDelta::try_seconds(secs)?)?;
    Some(boot.to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Numeric prefix of a SMART raw value (`"35 (Min/Max 20/41)"` → `"35"`).
pub fn smart_raw_value(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Text(s) if s.contains(' ') => {
            FieldValue::from(s.split(' ').next().unwrap_or_default())
        }
        other => other.clone(),
    }
}

// ── Record-level application ─────────────────────────────────────────

/// Fill `uptimeEpoch`, round `cpuUsage`, and compute `memUsage`.
pub fn apply_hwinfo(record: &mut Record, now: DateTime<Local>) {
    let version = record.get("version").and_then(FieldValue::as_str);
    let epoch = record
        .get("uptime")
        .and_then(|uptime| uptime_seconds(version, uptime))
        .and_then(|secs| uptime_epoch(now, secs));
    if let Some(epoch) = epoch {
        record.insert("uptimeEpoch".into(), FieldValue::Text(epoch));
    }

    if let Some(cpu) = record.get("cpuUsage").and_then(FieldValue::as_f64) {
        record.insert("cpuUsage".into(), FieldValue::Float(round1(cpu)));
    }

    let number = |name: &str| {
        record
            .get(name)
            .and_then(FieldValue::as_f64)
            .unwrap_or_default()
    };
    let usage = memory_usage(number("memUsed"), number("memTotal"));
    record.insert("memUsage".into(), FieldValue::Float(usage));
}

/// Convert `size` and `available` from bytes to GiB where numeric.
pub fn apply_fs(collection: &mut Collection) {
    for record in collection.values_mut() {
        for field in ["size", "available"] {
            if let Some(bytes) = record.get(field).and_then(FieldValue::as_f64) {
                record.insert(field.into(), FieldValue::Float(bytes_to_gib(bytes)));
            }
        }
    }
}

/// Overwrite a disk's identity fields with a fresh SMART information record.
pub fn apply_smart_info(disk: &mut Record, info: &Record) {
    for (name, value) in info {
        disk.insert(name.clone(), value.clone());
    }
}

/// Copy whitelisted SMART counters onto a disk record.
pub fn apply_smart_attributes(disk: &mut Record, attributes: &Collection) {
    for counter in SMART_COUNTERS {
        if let Some(raw) = attributes.get(counter).and_then(|a| a.get("rawvalue")) {
            disk.insert(counter.into(), smart_raw_value(raw));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::normalize::{normalize_keyed, normalize_record};
    use crate::schema::{DISK, FS, HWINFO, SMART_ATTRIBUTES, SMART_INFO};

    fn fixed_now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 10, 12, 0, 0)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn uptime_from_integer_seconds() {
        assert_eq!(format_uptime(90_061), "1 days 01 hours 01 minutes 01 seconds");
        assert_eq!(
            uptime_seconds(Some("6.0.0"), &FieldValue::Int(90_061)),
            Some(90_061)
        );

        let epoch = uptime_epoch(fixed_now(), 90_061).expect("in range");
        let expected = (fixed_now() - TimeDelta::seconds(90_061))
            .to_rfc3339_opts(SecondsFormat::Secs, false);
        assert_eq!(epoch, expected);
    }

    #[test]
    fn uptime_from_preformatted_text() {
        let uptime = FieldValue::from("2 days 3 hours 4 minutes 5 seconds");
        assert_eq!(
            uptime_seconds(Some("5.6.26-1"), &uptime),
            Some(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5)
        );
    }

    #[test]
    fn negative_uptime_keeps_sign() {
        assert_eq!(format_uptime(-61), "-0 days 00 hours 01 minutes 01 seconds");
        assert_eq!(
            uptime_seconds(Some("7.0.4"), &FieldValue::Int(-61)),
            Some(-61)
        );
    }

    #[test]
    fn unreadable_version_follows_value_type() {
        assert_eq!(uptime_seconds(Some("unknown"), &FieldValue::Int(120)), Some(120));
        let text = FieldValue::from("0 days 0 hours 2 minutes 0 seconds");
        assert_eq!(uptime_seconds(Some("unknown"), &text), Some(120));
        assert_eq!(uptime_seconds(None, &FieldValue::from("garbage")), None);
    }

    #[test]
    fn epoch_truncates_subseconds() {
        let now = fixed_now() + TimeDelta::milliseconds(750);
        let epoch = uptime_epoch(now, 0).expect("in range");
        assert_eq!(epoch, fixed_now().to_rfc3339_opts(SecondsFormat::Secs, false));
    }

    #[test]
    fn memory_usage_guards_zero_total() {
        assert_eq!(memory_usage(512.0, 0.0), 0.0);
        assert_eq!(memory_usage(50.0, 200.0), 25.0);
        assert_eq!(memory_usage(1.0, 3.0), 33.3);
    }

    #[test]
    fn hwinfo_derivations() {
        let raw = json!({
            "hostname": "nas",
            "version": "6.0.0",
            "cpuUsage": 12.3456,
            "memTotal": 200,
            "memUsed": 50,
            "uptime": 90_061,
        });
        let mut record = normalize_record(&Record::new(), &raw, &HWINFO);
        apply_hwinfo(&mut record, fixed_now());

        assert_eq!(record["cpuUsage"], FieldValue::Float(12.3));
        assert_eq!(record["memUsage"], FieldValue::Float(25.0));
        assert_eq!(
            record["uptimeEpoch"],
            FieldValue::Text(
                (fixed_now() - TimeDelta::seconds(90_061))
                    .to_rfc3339_opts(SecondsFormat::Secs, false)
            )
        );
    }

    #[test]
    fn fs_sizes_convert_to_gib() {
        let raw = json!([
            { "uuid": "a1", "type": "ext4", "size": "4000787030016", "available": 1_073_741_824 },
            { "uuid": "b2", "type": "btrfs" },
        ]);
        let mut fs = normalize_keyed(&Collection::new(), &raw, &FS);
        apply_fs(&mut fs);

        assert_eq!(fs["a1"]["size"], FieldValue::Float(3726.0));
        assert_eq!(fs["a1"]["available"], FieldValue::Float(1.0));
        assert_eq!(fs["b2"]["size"], FieldValue::from("unknown"));
    }

    #[test]
    fn smart_enrichment_overwrites_disk() {
        let mut disks = normalize_keyed(
            &Collection::new(),
            &json!([{ "devicename": "sda", "canonicaldevicefile": "/dev/sda" }]),
            &DISK,
        );
        let info = normalize_record(
            &Record::new(),
            &json!({ "devicemodel": "WDC WD40EFRX", "serialnumber": "WD-1", "smartsupportis": true }),
            &SMART_INFO,
        );
        let attributes = normalize_keyed(
            &Collection::new(),
            &json!([
                { "attrname": "Temperature_Celsius", "rawvalue": "35 (Min/Max 20/41)" },
                { "attrname": "Reallocated_Sector_Ct", "rawvalue": "8 sectors" },
                { "attrname": "Power_On_Hours", "rawvalue": "1234" },
            ]),
            &SMART_ATTRIBUTES,
        );

        let disk = disks.get_mut("sda").expect("disk present");
        apply_smart_info(disk, &info);
        apply_smart_attributes(disk, &attributes);

        assert_eq!(disk["devicemodel"], FieldValue::from("WDC WD40EFRX"));
        assert_eq!(disk["smartsupportis"], FieldValue::Bool(true));
        assert_eq!(disk["firmwareversion"], FieldValue::from("unknown"));
        assert_eq!(disk["Temperature_Celsius"], FieldValue::from("35"));
        assert_eq!(disk["Reallocated_Sector_Ct"], FieldValue::from("8"));
        assert_eq!(disk["Spin_Up_Time"], FieldValue::from("unknown"));
        assert!(!disk.contains_key("Power_On_Hours"));
    }
}
