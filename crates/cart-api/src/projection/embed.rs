//! Embed parameter parsing.
//!
//! Embeds are best-effort enrichment: the parsed set is matched against a
//! per-entity whitelist by the resource itself, unauthorized or unknown
//! names are skipped, and one embed failing never blocks the others.

/// Parse a raw embed parameter into a clean name list.
///
/// - `None` (parameter absent): the entity's default embed set.
/// - `Some("")`: no embeds.
/// - Otherwise: comma-split, trimmed, empties dropped, de-duplicated with
///   first-seen order preserved.
#[must_use]
pub fn parse_embeds(raw: Option<&str>, defaults: &[&str]) -> Vec<String> {
    let Some(raw) = raw else {
        return defaults.iter().map(ToString::to_string).collect();
    };

    if raw.is_empty() {
        return Vec::new();
    }

    let mut embeds: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if !embeds.iter().any(|seen| seen == name) {
            embeds.push(name.to_string());
        }
    }
    embeds
}
