//! School settings singleton.

use serde::{Deserialize, Serialize};

use super::ids::lenient_string;

/// Fixed row id of the settings singleton in the remote store.
pub const SETTINGS_ID: &str = "global_settings";

/// P5 label scale used when none is configured.
pub const DEFAULT_P5_LABELS: [&str; 3] = ["MB", "BSH", "SB"];

/// Intra-curricular categories used when none is configured.
pub const DEFAULT_CATEGORIES: [&str; 4] = [
    "Al-Qur'an / Jilid",
    "Hafalan Surah & Doa",
    "Dinul Islam (Aqidah & Akhlak)",
    "Praktik Ibadah & Bahasa Arab",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Gemini,
    Groq,
}

/// School identity, branding, active period and label configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchoolSettings {
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub npsn: String,
    pub address: String,
    #[serde(deserialize_with = "lenient_string")]
    pub postal_code: String,
    pub village: String,
    pub district: String,
    pub regency: String,
    pub province: String,
    pub website: String,
    pub email: String,
    pub headmaster: String,
    pub teacher: String,
    pub current_class: String,
    #[serde(deserialize_with = "lenient_string")]
    pub semester: String,
    #[serde(deserialize_with = "lenient_string")]
    pub academic_year: String,
    pub report_date: String,
    pub report_place: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<AiProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_categories: Option<Vec<String>>,
    /// Ordered P5 label scale; level `n` is `p5_labels[n - 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p5_labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_berkembang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_cakap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_mahir: Option<String>,
}

impl Default for SchoolSettings {
    fn default() -> Self {
        Self {
            name: "PAUD".to_string(),
            npsn: String::new(),
            address: String::new(),
            postal_code: String::new(),
            village: String::new(),
            district: String::new(),
            regency: String::new(),
            province: String::new(),
            website: String::new(),
            email: String::new(),
            headmaster: String::new(),
            teacher: String::new(),
            current_class: String::new(),
            semester: "1".to_string(),
            academic_year: String::new(),
            report_date: String::new(),
            report_place: String::new(),
            logo_url: None,
            app_logo_url: None,
            report_logo_url: None,
            ai_provider: Some(AiProvider::Gemini),
            ai_api_key: None,
            assessment_categories: None,
            p5_labels: None,
            label_berkembang: None,
            label_cakap: None,
            label_mahir: None,
        }
    }
}

impl SchoolSettings {
    /// Configured P5 labels, or the default three-level scale.
    pub fn p5_labels(&self) -> Vec<String> {
        match &self.p5_labels {
            Some(labels) if !labels.is_empty() => labels.clone(),
            _ => DEFAULT_P5_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Label for a 1-based P5 level, absent when out of range.
    pub fn p5_label(&self, level: i32) -> Option<String> {
        let index = usize::try_from(level).ok()?.checked_sub(1)?;
        self.p5_labels().get(index).cloned()
    }

    /// Active intra-curricular categories, or the four defaults.
    pub fn active_categories(&self) -> Vec<String> {
        match &self.assessment_categories {
            Some(categories) if !categories.is_empty() => categories.clone(),
            _ => DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_labels() {
        let settings = SchoolSettings::default();
        assert_eq!(settings.p5_labels(), vec!["MB", "BSH", "SB"]);
        assert_eq!(settings.p5_label(2).as_deref(), Some("BSH"));
        assert_eq!(settings.p5_label(4), None);
        assert_eq!(settings.p5_label(0), None);
        assert_eq!(settings.p5_label(-1), None);
    }

    #[test]
    fn test_custom_labels_and_categories() {
        let settings = SchoolSettings {
            p5_labels: Some(vec!["BB".into(), "MB".into(), "BSH".into(), "BSB".into()]),
            assessment_categories: Some(vec!["Motorik".into()]),
            ..Default::default()
        };
        assert_eq!(settings.p5_label(4).as_deref(), Some("BSB"));
        assert_eq!(settings.active_categories(), vec!["Motorik"]);
    }

    #[test]
    fn test_none_fields_are_omitted() {
        let json = serde_json::to_value(SchoolSettings::default()).unwrap();
        assert!(json.get("appLogoUrl").is_none());
        assert_eq!(json["aiProvider"], "gemini");
        assert_eq!(json["academicYear"], "");
    }
}
