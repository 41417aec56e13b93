// Catalog synchronization: bulk idempotent import of the remote challenge
// catalog, plus corrective title cleanup.

use crate::db::{Challenge, Database};
use crate::error::TrackerError;
use crate::metrics;
use crate::source::{CatalogSource, RawChallenge};

/// Fetch the full remote catalog and insert every challenge not yet known.
/// Returns the newly added challenges (for "new challenge available"
/// notifications). Safe to run repeatedly.
pub async fn sync_catalog(
    db: &Database,
    source: &dyn CatalogSource,
) -> Result<Vec<Challenge>, TrackerError> {
    let raw = source.fetch_catalog().await?;
    let mut added = Vec::new();

    for entry in raw {
        let challenge = challenge_from_raw(entry);
        if db.insert_challenge_if_absent(&challenge).await? {
            tracing::debug!(id = challenge.id, title = %challenge.title, "challenge added to catalog");
            added.push(challenge);
        }
    }

    metrics::CATALOG_SIZE.set(db.count_challenges().await?);
    if !added.is_empty() {
        tracing::info!(added = added.len(), "catalog sync found new challenges");
    }
    Ok(added)
}

/// Corrective resync: re-fetch the catalog and rewrite any title/subtitle
/// whose cleaned-up text differs from what is stored. Challenge rows are
/// otherwise immutable. Returns the number of rows changed.
pub async fn resync_titles(
    db: &Database,
    source: &dyn CatalogSource,
) -> Result<u64, TrackerError> {
    let raw = source.fetch_catalog().await?;
    let mut changed = 0;

    for entry in raw {
        let title = clean_title(&entry.title);
        let subtitle = clean_title(&entry.subtitle);
        if db.update_challenge_text(entry.id, &title, &subtitle).await? {
            changed += 1;
        }
    }

    if changed > 0 {
        tracing::info!(changed, "corrective title resync rewrote rows");
    }
    Ok(changed)
}

fn challenge_from_raw(raw: RawChallenge) -> Challenge {
    Challenge {
        id: raw.id,
        title: clean_title(&raw.title),
        subtitle: clean_title(&raw.subtitle),
        score: raw.score,
        category: raw.category,
        difficulty: raw.difficulty,
    }
}

/// Decode the HTML entities the platform leaves in challenge titles and
/// trim surrounding whitespace. Unknown or malformed entities pass through
/// unchanged.
pub fn clean_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        // Entities are short; ignore a stray ';' far from the '&'
        let end = rest.find(';').filter(|&i| i <= 10);
        if let Some(end) = end {
            if let Some(decoded) = decode_entity(&rest[1..end]) {
                out.push(decoded);
                rest = &rest[end + 1..];
                continue;
            }
        }
        out.push('&');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = if let Some(hex) = code.strip_prefix('x').or_else(|| code.strip_prefix('X'))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                code.parse::<u32>().ok()?
            };
            char::from_u32(value)
        }
    }
}
