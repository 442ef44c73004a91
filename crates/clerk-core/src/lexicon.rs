//! Keyword rule tables driving category, brand, and purpose extraction.
//!
//! The tables are data, not code: a deployment can override them from disk
//! (see the store crate's `lexicon.toml` loading) without touching the
//! matcher. Order is significant — category discovery follows table order,
//! and purpose resolution is first-match-wins.

use serde::Deserialize;

/// One named rule: the entry matches when any keyword is a substring of the
/// (lowercased) query text.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct KeywordRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Lexicon {
    pub categories: Vec<KeywordRule>,
    pub brands: Vec<KeywordRule>,
    pub purposes: Vec<KeywordRule>,
}

impl Lexicon {
    /// All categories whose keyword lists match, in table order.
    /// A query may match several categories.
    pub fn matching_categories(&self, text: &str) -> Vec<String> {
        matching_names(&self.categories, text)
    }

    /// All brands whose keyword lists match, in table order.
    pub fn matching_brands(&self, text: &str) -> Vec<String> {
        matching_names(&self.brands, text)
    }

    /// First purpose whose keywords match; `general` when none do.
    pub fn purpose_of(&self, text: &str) -> String {
        self.purposes
            .iter()
            .find(|rule| rule.matches(text))
            .map(|rule| rule.name.clone())
            .unwrap_or_else(|| "general".to_string())
    }
}

fn matching_names(rules: &[KeywordRule], text: &str) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.matches(text))
        .map(|rule| rule.name.clone())
        .collect()
}

fn rule(name: &str, keywords: &[&str]) -> KeywordRule {
    KeywordRule {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            categories: vec![
                rule(
                    "processor",
                    &[
                        "processor", "cpu", "intel", "amd", "ryzen", "core i3", "core i5",
                        "core i7", "core i9",
                    ],
                ),
                rule(
                    "graphics_card",
                    &["graphics card", "gpu", "geforce", "radeon", "rtx", "gtx", "rx", "video card"],
                ),
                rule("motherboard", &["motherboard", "mobo", "mainboard", "board"]),
                rule("ram", &["ram", "memory", "ddr4", "ddr5"]),
                rule("storage", &["ssd", "hdd", "hard drive", "nvme", "storage", "disk"]),
                rule("power_supply", &["power supply", "psu", "smps"]),
                rule("case", &["case", "cabinet", "tower", "chassis"]),
                rule("cooling", &["cooler", "fan", "liquid cooling", "aio", "cooling"]),
                rule("monitor", &["monitor", "display", "screen", "lcd", "led"]),
                rule("keyboard", &["keyboard", "mechanical keyboard"]),
                rule("mouse", &["mouse", "gaming mouse"]),
                rule("laptop", &["laptop", "notebook"]),
                rule(
                    "desktop",
                    &["desktop", "pc", "computer", "gaming pc", "workstation"],
                ),
            ],
            brands: vec![
                rule("intel", &["intel"]),
                rule("amd", &["amd", "ryzen"]),
                rule("nvidia", &["nvidia", "geforce", "rtx", "gtx"]),
                rule("asus", &["asus"]),
                rule("msi", &["msi"]),
                rule("gigabyte", &["gigabyte"]),
                rule("corsair", &["corsair"]),
                rule("gskill", &["g.skill", "gskill"]),
                rule("samsung", &["samsung"]),
                rule("western_digital", &["wd", "western digital"]),
                rule("seagate", &["seagate"]),
                rule("hp", &["hp", "hewlett packard"]),
                rule("dell", &["dell"]),
                rule("lenovo", &["lenovo"]),
                rule("acer", &["acer"]),
            ],
            // Checked in order — first match wins.
            purposes: vec![
                rule("gaming", &["gaming", "game", "gamer", "fps", "esports"]),
                rule(
                    "work",
                    &["work", "office", "business", "productivity", "professional"],
                ),
                rule(
                    "programming",
                    &["programming", "coding", "development", "developer", "software"],
                ),
                rule(
                    "content_creation",
                    &["video editing", "content creation", "streaming", "youtube", "creator"],
                ),
                rule("study", &["study", "student", "education", "learning"]),
                rule("home", &["home", "family", "basic", "everyday"]),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_substring_match() {
        let lex = Lexicon::default();
        let cats = lex.matching_categories("need a gaming laptop with ssd");
        assert!(cats.contains(&"laptop".to_string()));
        assert!(cats.contains(&"storage".to_string()));
    }

    #[test]
    fn test_multiple_categories_table_order() {
        let lex = Lexicon::default();
        let cats = lex.matching_categories("intel cpu and ddr5 ram");
        // processor precedes ram in the table
        let cpu_pos = cats.iter().position(|c| c == "processor").unwrap();
        let ram_pos = cats.iter().position(|c| c == "ram").unwrap();
        assert!(cpu_pos < ram_pos);
    }

    #[test]
    fn test_brand_multi_keyword() {
        let lex = Lexicon::default();
        assert_eq!(lex.matching_brands("ryzen build"), vec!["amd"]);
        assert_eq!(lex.matching_brands("rtx card from nvidia"), vec!["nvidia"]);
    }

    #[test]
    fn test_purpose_first_match_wins() {
        let lex = Lexicon::default();
        // "gaming" precedes "work" in the table
        assert_eq!(lex.purpose_of("gaming rig for work"), "gaming");
    }

    #[test]
    fn test_purpose_default_general() {
        let lex = Lexicon::default();
        assert_eq!(lex.purpose_of("something nondescript"), "general");
    }

    #[test]
    fn test_toml_override_roundtrip() {
        // The store crate deserializes overrides from TOML; the shape must
        // stay compatible with serde's derive on these types.
        let json = r#"{
            "categories": [{"name": "tablet", "keywords": ["tablet", "ipad"]}],
            "brands": [],
            "purposes": []
        }"#;
        let lex: Lexicon = serde_json::from_str(json).unwrap();
        assert_eq!(lex.matching_categories("cheap tablet"), vec!["tablet"]);
        assert_eq!(lex.purpose_of("anything"), "general");
    }
}
