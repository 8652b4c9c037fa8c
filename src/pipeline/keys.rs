//! Mapping from an input document key to the key its summary is written under.
//!
//! Domain: keys shaped `input/<rest>.pdf` with a non-empty `<rest>`. Those map to
//! `summaries/<engine-tag>/<rest>.summary.txt`. Any other key is outside the domain and is
//! returned unchanged as [`KeyMapping::PassThrough`] so the caller can decide what to do with it.

const INPUT_PREFIX: &str = "input/";
const SUMMARY_PREFIX: &str = "summaries";
const PDF_SUFFIX: &str = ".pdf";
const SUMMARY_SUFFIX: &str = ".summary.txt";

/// Result of mapping an input key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMapping {
    /// Key matched `input/*.pdf` and was rewritten.
    Mapped(String),
    /// Key did not match and is returned unmodified.
    PassThrough(String),
}

impl KeyMapping {
    /// The resulting key, whichever way it was produced.
    pub fn key(&self) -> &str {
        match self {
            Self::Mapped(key) | Self::PassThrough(key) => key,
        }
    }

    /// Whether the key was rewritten.
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

/// Derive the summary key for `key` under `engine_tag`.
pub fn derive_output_key(key: &str, engine_tag: &str) -> KeyMapping {
    let stem = key
        .strip_prefix(INPUT_PREFIX)
        .and_then(|rest| rest.strip_suffix(PDF_SUFFIX))
        .filter(|stem| !stem.is_empty() && !stem.ends_with('/'));

    match stem {
        Some(stem) => KeyMapping::Mapped(format!(
            "{SUMMARY_PREFIX}/{engine_tag}/{stem}{SUMMARY_SUFFIX}"
        )),
        None => {
            tracing::warn!(
                key,
                "Key is not shaped input/<name>.pdf; output key passes through unchanged"
            );
            KeyMapping::PassThrough(key.to_string())
        }
    }
}

/// Key an uploaded file is stored under: `input/<basename>`.
///
/// Directory components are stripped so a client-supplied name cannot escape the `input/`
/// prefix. Returns `None` when nothing usable remains.
pub fn upload_key(filename: &str) -> Option<String> {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")?;
    Some(format!("{INPUT_PREFIX}{basename}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_input_pdf_to_summary_path() {
        assert_eq!(
            derive_output_key("input/report.pdf", "gpt-4o"),
            KeyMapping::Mapped("summaries/gpt-4o/report.summary.txt".into())
        );
    }

    #[test]
    fn keeps_nested_segments_below_input() {
        assert_eq!(
            derive_output_key("input/2024/q3/report.pdf", "gpt-4o").key(),
            "summaries/gpt-4o/2024/q3/report.summary.txt"
        );
    }

    #[test]
    fn key_without_input_prefix_passes_through_unmodified() {
        let mapping = derive_output_key("archive/report.pdf", "gpt-4o");
        assert_eq!(mapping, KeyMapping::PassThrough("archive/report.pdf".into()));
        assert!(!mapping.is_mapped());
    }

    #[test]
    fn key_without_pdf_suffix_passes_through_unmodified() {
        assert_eq!(
            derive_output_key("input/report.docx", "gpt-4o"),
            KeyMapping::PassThrough("input/report.docx".into())
        );
    }

    #[test]
    fn input_prefix_must_lead_the_key() {
        assert_eq!(
            derive_output_key("tenants/a/input/report.pdf", "gpt-4o"),
            KeyMapping::PassThrough("tenants/a/input/report.pdf".into())
        );
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        assert!(!derive_output_key("input/REPORT.PDF", "gpt-4o").is_mapped());
    }

    #[test]
    fn bare_suffix_is_not_a_document_name() {
        assert!(!derive_output_key("input/.pdf", "gpt-4o").is_mapped());
    }

    #[test]
    fn upload_key_strips_directories() {
        assert_eq!(upload_key("report.pdf").as_deref(), Some("input/report.pdf"));
        assert_eq!(
            upload_key("../../etc/report.pdf").as_deref(),
            Some("input/report.pdf")
        );
        assert_eq!(
            upload_key(r"C:\Users\me\report.pdf").as_deref(),
            Some("input/report.pdf")
        );
        assert_eq!(upload_key("uploads/"), None);
        assert_eq!(upload_key(".."), None);
        assert_eq!(upload_key("   "), None);
    }
}
