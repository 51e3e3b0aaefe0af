//! Freshness gate: decide from catalog entry names and published metadata
//! whether a new composite is warranted.
//!
//! The gate only reads metadata. It runs before any channel download.

use catalog::DatasetHandle;
use chrono::{DateTime, Utc};
use sat_common::time::{parse_token, truncate_to_hour};
use sat_common::{TimeParseError, TokenFormat};
use tracing::debug;

use crate::metadata::MetadataStore;

/// Outcome of the freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// New data; composite for this valid time (minute resolution)
    Proceed(DateTime<Utc>),
    /// The three channels list different scans
    SkipDesync,
    /// A frame at or after this valid time is already published
    SkipNotNewer(DateTime<Utc>),
}

/// Evaluate the newest (blue, red, green) entries against the run metadata of
/// `product_id`.
///
/// Tokens are compared at minute resolution, so `s20230861801170` and
/// `s202308618011` agree. A token that does not parse is an error the caller
/// treats as a transient skip.
pub fn evaluate(
    entries: &[DatasetHandle; 3],
    store: &MetadataStore,
    product_id: u32,
    format: TokenFormat,
) -> Result<GateDecision, TimeParseError> {
    let [blue, red, green] = entries;
    let candidate = parse_token(&blue.token, format)?;
    let red_time = parse_token(&red.token, format)?;
    let green_time = parse_token(&green.token, format)?;

    if red_time != candidate || green_time != candidate {
        debug!(
            tokens = ?entries.iter().map(|e| e.token.as_str()).collect::<Vec<_>>(),
            "Channel scan minutes disagree"
        );
        return Ok(GateDecision::SkipDesync);
    }

    let run_hour = truncate_to_hour(candidate);
    if let Some(latest) = store
        .load_run(product_id, run_hour)
        .and_then(|doc| doc.latest_valid())
    {
        if latest >= candidate {
            debug!(%latest, %candidate, "Latest frame is not older than candidate");
            return Ok(GateDecision::SkipNotNewer(candidate));
        }
    }

    Ok(GateDecision::Proceed(candidate))
}
