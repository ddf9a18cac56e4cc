//! Tier-priority encoder selection.
//!
//! Pure policy over already-verified data; never touches hardware. The tier
//! ordering comes from the catalog and is fixed for the process lifetime.

use tracing::info;

use super::catalog::Tier;
use super::error::{Result, StreamError};
use super::platform::EncoderCandidate;

/// Choose one verified candidate for `requested_format`.
///
/// Tiers are walked highest first. Within a tier an exact input-format match
/// wins; otherwise the first verified candidate in that tier is chosen and
/// the pipeline builder inserts a conversion stage. Ties break by discovery
/// order. Only `verified` candidates are ever considered.
pub fn select<'a>(
    candidates: &'a [EncoderCandidate],
    requested_format: &str,
) -> Result<&'a EncoderCandidate> {
    for tier in Tier::ORDERED {
        let mut in_tier = candidates.iter().filter(|c| c.tier == tier && c.verified);

        let Some(first) = in_tier.next() else {
            continue;
        };

        let chosen = if first.accepts(requested_format) {
            first
        } else {
            in_tier
                .find(|c| c.accepts(requested_format))
                .unwrap_or(first)
        };

        info!(
            encoder = chosen.id,
            tier = chosen.tier.label(),
            exact_format = chosen.accepts(requested_format),
            "selected encoder"
        );
        return Ok(chosen);
    }

    Err(StreamError::NoEncoderAvailable)
}
