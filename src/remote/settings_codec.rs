//! Codec for the settings row.
//!
//! Older deployments had a single `logo_url` column. Branding images, the
//! active category list and the legacy label names now travel packed as a
//! JSON side-document inside that column:
//!
//! | field                  | packed key   |
//! |------------------------|--------------|
//! | `logoUrl`              | `default`    |
//! | `appLogoUrl`           | `app`        |
//! | `reportLogoUrl`        | `report`     |
//! | `assessmentCategories` | `categories` |
//! | `labelBerkembang`      | `lb`         |
//! | `labelCakap`           | `lc`         |
//! | `labelMahir`           | `lm`         |
//!
//! Key order and omission of absent fields match what existing rows hold.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{SchoolSettings, SETTINGS_ID};

/// Fields carried inside the packed column instead of their own columns.
const PACKED_FIELDS: [&str; 6] = [
    "appLogoUrl",
    "reportLogoUrl",
    "assessmentCategories",
    "labelBerkembang",
    "labelCakap",
    "labelMahir",
];

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LegacyPack {
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lm: Option<String>,
}

/// Builds the camelCase settings row: fixed id, packed `logoUrl`, and the
/// packed fields stripped.
pub fn pack(settings: &SchoolSettings) -> serde_json::Result<Value> {
    let pack = LegacyPack {
        default: settings.logo_url.clone(),
        app: settings.app_logo_url.clone(),
        report: settings.report_logo_url.clone(),
        categories: settings
            .assessment_categories
            .as_ref()
            .map(|c| Value::from(c.clone())),
        lb: settings.label_berkembang.clone(),
        lc: settings.label_cakap.clone(),
        lm: settings.label_mahir.clone(),
    };

    let mut row = match serde_json::to_value(settings)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    row.insert("id".to_string(), Value::String(SETTINGS_ID.to_string()));
    row.insert("logoUrl".to_string(), Value::String(serde_json::to_string(&pack)?));
    for field in PACKED_FIELDS {
        row.remove(field);
    }
    Ok(Value::Object(row))
}

/// Turns a camelCase settings row into settings, unpacking the side-document
/// when `logoUrl` holds one. A column that looks packed but does not parse is
/// kept as a plain logo reference.
pub fn unpack(row: Value) -> serde_json::Result<SchoolSettings> {
    let mut row = match row {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let packed = row
        .get("logoUrl")
        .and_then(Value::as_str)
        .filter(|s| s.trim().starts_with('{'))
        .and_then(|s| serde_json::from_str::<LegacyPack>(s).ok());

    if let Some(pack) = packed {
        row.insert(
            "logoUrl".to_string(),
            Value::String(non_empty(pack.default).unwrap_or_default()),
        );
        set_or_remove(&mut row, "appLogoUrl", pack.app.map(Value::String));
        set_or_remove(&mut row, "reportLogoUrl", pack.report.map(Value::String));
        if let Some(categories @ Value::Array(_)) = pack.categories {
            row.insert("assessmentCategories".to_string(), categories);
        }
        row.insert("labelBerkembang".to_string(), label(pack.lb, "MB"));
        row.insert("labelCakap".to_string(), label(pack.lc, "BSH"));
        row.insert("labelMahir".to_string(), label(pack.lm, "SB"));
    }

    row.remove("id");
    serde_json::from_value(Value::Object(row))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn label(value: Option<String>, fallback: &str) -> Value {
    Value::String(non_empty(value).unwrap_or_else(|| fallback.to_string()))
}

fn set_or_remove(row: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    match value {
        Some(v) => {
            row.insert(key.to_string(), v);
        }
        None => {
            row.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn branded() -> SchoolSettings {
        SchoolSettings {
            name: "TK Harapan".into(),
            logo_url: Some("https://x/logo.jpg".into()),
            app_logo_url: Some("https://x/app.jpg".into()),
            report_logo_url: Some("https://x/report.jpg".into()),
            assessment_categories: Some(vec!["Quran".into(), "Hafalan".into()]),
            label_berkembang: Some("BB".into()),
            label_cakap: Some("MB".into()),
            label_mahir: Some("BSB".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_pack_layout() {
        let row = pack(&branded()).unwrap();

        assert_eq!(row["id"], "global_settings");
        for field in PACKED_FIELDS {
            assert!(row.get(field).is_none(), "{} should be stripped", field);
        }
        assert_eq!(
            row["logoUrl"],
            r#"{"default":"https://x/logo.jpg","app":"https://x/app.jpg","report":"https://x/report.jpg","categories":["Quran","Hafalan"],"lb":"BB","lc":"MB","lm":"BSB"}"#
        );
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let original = branded();
        let back = unpack(pack(&original).unwrap()).unwrap();

        assert_eq!(back.app_logo_url, original.app_logo_url);
        assert_eq!(back.report_logo_url, original.report_logo_url);
        assert_eq!(back.assessment_categories, original.assessment_categories);
        assert_eq!(back.label_berkembang, original.label_berkembang);
        assert_eq!(back.label_cakap, original.label_cakap);
        assert_eq!(back.label_mahir, original.label_mahir);
        assert_eq!(back.logo_url, original.logo_url);
        assert_eq!(back.name, "TK Harapan");
    }

    #[test]
    fn test_unpack_defaults() {
        let settings = unpack(json!({ "id": "global_settings", "logoUrl": " {\"app\":\"a.png\"}" })).unwrap();

        assert_eq!(settings.logo_url.as_deref(), Some(""));
        assert_eq!(settings.app_logo_url.as_deref(), Some("a.png"));
        assert_eq!(settings.report_logo_url, None);
        assert_eq!(settings.label_berkembang.as_deref(), Some("MB"));
        assert_eq!(settings.label_cakap.as_deref(), Some("BSH"));
        assert_eq!(settings.label_mahir.as_deref(), Some("SB"));
    }

    #[test]
    fn test_plain_logo_column_untouched() {
        let settings = unpack(json!({ "logoUrl": "https://x/old.jpg", "semester": "2" })).unwrap();
        assert_eq!(settings.logo_url.as_deref(), Some("https://x/old.jpg"));
        assert_eq!(settings.label_berkembang, None);
        assert_eq!(settings.semester, "2");

        let broken = unpack(json!({ "logoUrl": "{not json" })).unwrap();
        assert_eq!(broken.logo_url.as_deref(), Some("{not json"));
    }
}
