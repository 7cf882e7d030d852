//! Screenshot evidence for terminal classifications.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tripcheck_core::StoreSpec;

use crate::driver::NavigationHandle;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[^a-z0-9]").expect("valid regex"));

/// DOM id of the banner drawn over the page before the screenshot.
pub const OVERLAY_ELEMENT_ID: &str = "result-url-overlay";

/// Prefix of an evidence file name, one per terminal branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceTag {
    Pass,
    Fail,
    Pending,
    Manual,
    Error,
}

impl EvidenceTag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceTag::Pass => "PASS",
            EvidenceTag::Fail => "FAIL",
            EvidenceTag::Pending => "PENDING",
            EvidenceTag::Manual => "MANUAL",
            EvidenceTag::Error => "ERROR",
        }
    }
}

/// `<TAG>_<store_id>_<store_name>.png`, with every non-alphanumeric
/// character of the store name replaced by `_`.
#[must_use]
pub fn evidence_file_name(tag: EvidenceTag, store: &StoreSpec) -> String {
    let name = UNSAFE_FILE_CHARS.replace_all(&store.store_name, "_");
    format!("{}_{}_{}.png", tag.as_str(), store.store_id, name)
}

/// Script that pins a banner showing `url` to the top of the page.
fn overlay_script(url: &str) -> String {
    // serde_json string encoding doubles as JS string literal escaping.
    let text = serde_json::Value::String(format!("\u{1f517} {url}")).to_string();
    format!(
        r#"(() => {{
  const existing = document.getElementById('{OVERLAY_ELEMENT_ID}');
  if (existing) existing.remove();
  const overlay = document.createElement('div');
  overlay.id = '{OVERLAY_ELEMENT_ID}';
  overlay.style.cssText = 'position:fixed;top:0;left:0;right:0;background:rgba(0,0,0,0.8);color:#fff;font-family:monospace;font-size:14px;padding:8px 12px;z-index:999999;word-break:break-all;';
  overlay.textContent = {text};
  (document.body || document.documentElement).appendChild(overlay);
  return true;
}})()"#
    )
}

/// Overlays `url` on the page and writes a full-page screenshot into `dir`.
///
/// Both steps are best-effort: failures are logged and never propagate.
/// Returns the written path only when the screenshot succeeded.
pub async fn capture(
    nav: &dyn NavigationHandle,
    tag: EvidenceTag,
    store: &StoreSpec,
    url: &str,
    dir: &Path,
) -> Option<PathBuf> {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!(
            store_id = %store.store_id,
            dir = %dir.display(),
            error = %e,
            "cannot create screenshot directory"
        );
        return None;
    }

    if let Err(e) = nav.evaluate(&overlay_script(url)).await {
        tracing::warn!(store_id = %store.store_id, error = %e, "url overlay failed");
    }

    let path = dir.join(evidence_file_name(tag, store));
    match nav.screenshot(&path).await {
        Ok(()) => {
            tracing::debug!(
                store_id = %store.store_id,
                tag = tag.as_str(),
                path = %path.display(),
                "evidence captured"
            );
            Some(path)
        }
        Err(e) => {
            tracing::warn!(store_id = %store.store_id, error = %e, "screenshot failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(id: &str, name: &str) -> StoreSpec {
        StoreSpec {
            store_id: id.to_string(),
            store_name: name.to_string(),
            xfas_url: "https://www.rakuten.com/x".to_string(),
            merchant_site_url: "https://acme.com".to_string(),
            network_id: "1".to_string(),
        }
    }

    #[test]
    fn file_name_sanitizes_store_name() {
        let name = evidence_file_name(EvidenceTag::Pass, &store("42", "Bed Bath & Beyond"));
        assert_eq!(name, "PASS_42_Bed_Bath___Beyond.png");
    }

    #[test]
    fn file_name_uses_manual_tag_for_manual_review() {
        let name = evidence_file_name(EvidenceTag::Manual, &store("7", "Acme"));
        assert_eq!(name, "MANUAL_7_Acme.png");
    }

    #[test]
    fn overlay_script_escapes_url() {
        let script = overlay_script("https://acme.com/?q=\"'</script>");
        assert!(script.contains(OVERLAY_ELEMENT_ID));
        assert!(script.contains(r#"\"'</script>"#));
        assert!(script.contains("z-index:999999"));
    }
}
