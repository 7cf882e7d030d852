//! Per-origin `localStorage` carried in the session snapshot next to the
//! cookie jar, in the `origins` layout used by browser storage-state files.

use serde::{Deserialize, Serialize};

use crate::session::SessionSnapshot;

/// Reads the current page's origin and every `localStorage` entry.
pub const EXPORT_SCRIPT: &str = r"(() => ({
  origin: window.location.origin,
  localStorage: Object.keys(window.localStorage).map((name) => ({
    name,
    value: window.localStorage.getItem(name),
  })),
}))()";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginStorage {
    pub origin: String,
    #[serde(rename = "localStorage")]
    pub local_storage: Vec<StorageItem>,
}

impl OriginStorage {
    /// Parses the result of [`EXPORT_SCRIPT`]. Opaque origins (`"null"`) and
    /// empty storage yield `None`.
    #[must_use]
    pub fn from_export(value: serde_json::Value) -> Option<Self> {
        let storage: Self = serde_json::from_value(value).ok()?;
        let usable = storage.origin.starts_with("http") && !storage.local_storage.is_empty();
        usable.then_some(storage)
    }

    /// Script that writes every entry back into the current page's
    /// `localStorage` and returns how many were written.
    #[must_use]
    pub fn restore_script(&self) -> String {
        let items = serde_json::to_string(&self.local_storage).unwrap_or_else(|_| "[]".to_string());
        format!(
            "(() => {{ const items = {items}; \
             for (const item of items) {{ window.localStorage.setItem(item.name, item.value); }} \
             return items.length; }})()"
        )
    }
}

impl SessionSnapshot {
    /// Origins with saved `localStorage`. Snapshots without an `origins`
    /// list have none.
    #[must_use]
    pub fn origins(&self) -> Vec<OriginStorage> {
        self.as_value()
            .get("origins")
            .cloned()
            .and_then(|origins| serde_json::from_value(origins).ok())
            .unwrap_or_default()
    }

    /// Adds or replaces the saved storage for `storage.origin`.
    #[must_use]
    pub fn with_origin(self, storage: OriginStorage) -> Self {
        let mut origins = self.origins();
        origins.retain(|o| o.origin != storage.origin);
        origins.push(storage);

        let mut value = self.as_value().clone();
        if let (Some(map), Ok(origins)) = (value.as_object_mut(), serde_json::to_value(origins)) {
            map.insert("origins".to_string(), origins);
        }
        SessionSnapshot::new(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn storage(origin: &str, pairs: &[(&str, &str)]) -> OriginStorage {
        OriginStorage {
            origin: origin.to_string(),
            local_storage: pairs
                .iter()
                .map(|(name, value)| StorageItem {
                    name: (*name).to_string(),
                    value: (*value).to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn export_result_is_parsed() {
        let parsed = OriginStorage::from_export(json!({
            "origin": "https://www.rakuten.com",
            "localStorage": [{"name": "member", "value": "42"}]
        }));
        assert_eq!(
            parsed,
            Some(storage("https://www.rakuten.com", &[("member", "42")]))
        );
    }

    #[test]
    fn opaque_or_empty_exports_are_dropped() {
        assert_eq!(
            OriginStorage::from_export(json!({"origin": "null", "localStorage": [{"name": "a", "value": "b"}]})),
            None
        );
        assert_eq!(
            OriginStorage::from_export(json!({"origin": "https://a.example", "localStorage": []})),
            None
        );
        assert_eq!(OriginStorage::from_export(json!(true)), None);
    }

    #[test]
    fn snapshot_without_origins_has_none() {
        let snapshot = SessionSnapshot::new(json!({"cookies": []}));
        assert!(snapshot.origins().is_empty());
    }

    #[test]
    fn with_origin_keeps_cookies_and_replaces_same_origin() {
        let snapshot = SessionSnapshot::new(json!({"cookies": [{"name": "sid"}]}))
            .with_origin(storage("https://a.example", &[("k", "1")]))
            .with_origin(storage("https://b.example", &[("k", "2")]))
            .with_origin(storage("https://a.example", &[("k", "3")]));

        assert_eq!(snapshot.as_value()["cookies"], json!([{"name": "sid"}]));
        let origins = snapshot.origins();
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], storage("https://b.example", &[("k", "2")]));
        assert_eq!(origins[1], storage("https://a.example", &[("k", "3")]));
        assert_eq!(
            snapshot.as_value()["origins"][1]["localStorage"][0]["value"],
            "3"
        );
    }

    #[test]
    fn restore_script_embeds_escaped_items() {
        let script = storage("https://a.example", &[("quote", "say \"hi\"")]).restore_script();
        assert!(script.contains(r#"[{"name":"quote","value":"say \"hi\""}]"#), "got {script}");
        assert!(script.contains("localStorage.setItem"));
    }
}
