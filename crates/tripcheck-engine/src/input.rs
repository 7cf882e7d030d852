//! Store list parsing.
//!
//! The input is a CSV with a header row followed by positional columns:
//! `store_id, store_name, xfas_url, merchant_site_url, network_id`. Header
//! names are not inspected.

use tripcheck_core::{CoreError, StoreSpec};

use crate::error::EngineError;

/// Parses and validates a store list.
///
/// Fields are trimmed and blank lines skipped. A missing or blank
/// `network_id` becomes [`StoreSpec::DEFAULT_NETWORK_ID`].
///
/// # Errors
///
/// - [`EngineError::Csv`] if the text is not readable CSV.
/// - [`EngineError::InvalidStore`] naming the 1-based data row and the
///   first missing required field.
/// - [`EngineError::EmptyInput`] if there are no data rows.
pub fn parse_store_csv(text: &str) -> Result<Vec<StoreSpec>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut stores = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let row = stores.len() + 1;
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        let network_id = Some(field(4))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| StoreSpec::DEFAULT_NETWORK_ID.to_string());

        let store = StoreSpec {
            store_id: field(0),
            store_name: field(1),
            xfas_url: field(2),
            merchant_site_url: field(3),
            network_id,
        };
        if let Err(CoreError::MissingField(missing)) = store.validate() {
            return Err(EngineError::InvalidStore {
                row,
                field: missing,
            });
        }
        stores.push(store);
    }

    if stores.is_empty() {
        return Err(EngineError::EmptyInput);
    }
    tracing::debug!(count = stores.len(), "parsed store list");
    Ok(stores)
}
