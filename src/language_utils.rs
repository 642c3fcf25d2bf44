use anyhow::{Result, anyhow};
use isolang::Language;

// Language utilities for target language labels
//
// Users may configure the target language either as a free-form label
// ("Simplified Chinese") or as an ISO 639 code ("fr", "deu", "pt-BR").
// Codes are expanded to English names before being shown to a model.

/// ISO 639-2/B codes that differ from their 639-2/T form
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    let language = match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code),
        3 => {
            let part2t = PART2B_TO_PART2T.iter()
                .find(|(b, _)| *b == normalized_code)
                .map(|(_, t)| *t)
                .unwrap_or(normalized_code.as_str());
            Language::from_639_3(part2t)
        }
        _ => None,
    };

    language
        .map(|lang| lang.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Label shown to the model for a configured target language
///
/// ISO codes become English names, a region subtag is kept in parentheses
/// (`pt-BR` becomes `Portuguese (BR)`), anything else is used verbatim.
pub fn target_language_label(input: &str) -> String {
    let trimmed = input.trim();
    let (base, region) = match trimmed.split_once(['-', '_']) {
        Some((base, region)) if !region.is_empty() => (base, Some(region)),
        _ => (trimmed, None),
    };

    match (get_language_name(base), region) {
        (Ok(name), Some(region)) => format!("{} ({})", name, region.to_uppercase()),
        (Ok(name), None) => name,
        (Err(_), _) => trimmed.to_string(),
    }
}
