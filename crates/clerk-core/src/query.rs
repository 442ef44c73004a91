//! Query interpreter: free-text shopping request → StructuredQuery.
//!
//! Every field is extracted independently over a lowercased copy of the
//! input; a field that finds nothing stays empty rather than erroring.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::lexicon::Lexicon;

/// Parsed, typed representation of a free-text shopping request.
/// Immutable after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub budget: Option<Budget>,
    pub categories: Vec<String>,
    pub specs: Specs,
    pub brands: Vec<String>,
    pub purpose: String,
    pub raw_text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub amount: f64,
    pub operator: BudgetOperator,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetOperator {
    Under,
    Around,
}

impl std::fmt::Display for BudgetOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetOperator::Under => write!(f, "under"),
            BudgetOperator::Around => write!(f, "around"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Specs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<Processor>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    pub size: u32,
    pub unit: String,
    pub kind: StorageKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Ssd,
    Hdd,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Processor {
    pub brand: String,
    pub series: String,
}

impl Specs {
    pub fn is_empty(&self) -> bool {
        self.ram_gb.is_none()
            && self.storage.is_none()
            && self.graphics.is_none()
            && self.processor.is_none()
    }

    /// Flatten populated fields into (type, decoded value) pairs for the
    /// preference learner. Serialization of these small structs cannot fail.
    pub fn entries(&self) -> Vec<(String, serde_json::Value)> {
        let mut out = Vec::new();
        if let Some(ram) = self.ram_gb {
            out.push(("ram".to_string(), serde_json::json!(ram)));
        }
        if let Some(storage) = &self.storage {
            let value = serde_json::to_value(storage).unwrap_or(serde_json::Value::Null);
            out.push(("storage".to_string(), value));
        }
        if let Some(graphics) = &self.graphics {
            out.push(("graphics".to_string(), serde_json::json!(graphics)));
        }
        if let Some(processor) = &self.processor {
            let value = serde_json::to_value(processor).unwrap_or(serde_json::Value::Null);
            out.push(("processor".to_string(), value));
        }
        out
    }
}

/// Parse a free-text request against the given rule tables.
pub fn parse(text: &str, lexicon: &Lexicon) -> StructuredQuery {
    let lower = text.to_lowercase();
    StructuredQuery {
        budget: extract_budget(&lower),
        categories: lexicon.matching_categories(&lower),
        specs: extract_specs(&lower),
        brands: lexicon.matching_brands(&lower),
        purpose: lexicon.purpose_of(&lower),
        raw_text: text.to_string(),
    }
}

// --- Budget ---

const AMOUNT: &str = r"(\d+(?:,\d+)*(?:\.\d+)?)\s*(?:(k|thousand|lakh|crore)\b)?";

static BUDGET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    // Ordered — first match wins.
    [
        format!(r"(?:under|below|less than|up to)\s*(?:rs\.?|₹)?\s*{AMOUNT}"),
        format!(r"(?:around|about|approximately)\s*(?:rs\.?|₹)?\s*{AMOUNT}"),
        format!(r"(?:budget|price)\s*(?:of|is|around)?\s*(?:rs\.?|₹)?\s*{AMOUNT}"),
        format!(r"(?:rs\.?|₹)\s*{AMOUNT}"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("budget pattern"))
    .collect()
});

static WORD_MAGNITUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(thousand|lakh|crore)\b").expect("magnitude pattern"));

static UNDER_WORDS: [&str; 4] = ["under", "below", "less than", "up to"];

fn extract_budget(text: &str) -> Option<Budget> {
    for pattern in BUDGET_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let digits = caps.get(1)?.as_str().replace(',', "");
        let base: f64 = digits.parse().ok()?;
        let suffix = caps.get(2).map(|m| m.as_str());
        let amount = base * magnitude(text, suffix);

        let operator = if UNDER_WORDS.iter().any(|w| text.contains(w)) {
            BudgetOperator::Under
        } else {
            BudgetOperator::Around
        };
        return Some(Budget { amount, operator });
    }
    None
}

/// Magnitude multiplier for a matched amount. A suffix attached to the
/// number wins; otherwise the word forms count anywhere in the text.
/// A detached "k" elsewhere never scales.
fn magnitude(text: &str, local_suffix: Option<&str>) -> f64 {
    match local_suffix {
        Some("k") | Some("thousand") => return 1_000.0,
        Some("lakh") => return 100_000.0,
        Some("crore") => return 10_000_000.0,
        _ => {}
    }
    match WORD_MAGNITUDE.captures(text).map(|c| c[1].to_string()).as_deref() {
        Some("thousand") => 1_000.0,
        Some("lakh") => 100_000.0,
        Some("crore") => 10_000_000.0,
        _ => 1.0,
    }
}

// --- Specs ---

static RAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*gb\s*(?:ram|memory|ddr)").expect("ram pattern"));
static STORAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(gb|tb)\s*(?:ssd|hdd|storage)").expect("storage pattern"));
static PROCESSOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(intel|amd|ryzen|core)\s*i?(\d+)").expect("processor pattern"));

fn extract_specs(text: &str) -> Specs {
    let ram_gb = RAM_RE
        .captures(text)
        .and_then(|c| c[1].parse::<u32>().ok());

    let storage = STORAGE_RE.captures(text).and_then(|c| {
        let size = c[1].parse::<u32>().ok()?;
        // SSD-vs-HDD is decided by "ssd" appearing anywhere in the full
        // text, not only within the local match. Loose, but preserved.
        let kind = if text.contains("ssd") {
            StorageKind::Ssd
        } else {
            StorageKind::Hdd
        };
        Some(Storage {
            size,
            unit: c[2].to_string(),
            kind,
        })
    });

    let graphics = (text.contains("gaming") || text.contains("gpu") || text.contains("graphics"))
        .then(|| "dedicated".to_string());

    let processor = PROCESSOR_RE.captures(text).map(|c| Processor {
        brand: c[1].to_string(),
        series: c[2].to_string(),
    });

    Specs {
        ram_gb,
        storage,
        graphics,
        processor,
    }
}

// --- Search terms ---

/// Derive search keywords from a parsed query: categories, the gaming
/// purpose, brands, and spec renderings.
pub fn search_terms(query: &StructuredQuery) -> Vec<String> {
    let mut terms: Vec<String> = query.categories.clone();

    if query.purpose == "gaming" {
        terms.push("gaming".to_string());
    }

    terms.extend(query.brands.iter().cloned());

    if let Some(ram) = query.specs.ram_gb {
        terms.push(format!("{ram}GB RAM"));
    }
    if let Some(storage) = &query.specs.storage {
        let kind = match storage.kind {
            StorageKind::Ssd => "ssd",
            StorageKind::Hdd => "hdd",
        };
        terms.push(format!("{}{} {kind}", storage.size, storage.unit));
    }

    terms
}
