//! Tag matcher - which policy scopes apply to a server

use crate::policy::ScopeKey;
use crate::types::{Server, Tag};

/// Scopes applying to `server`, in application order.
///
/// The wildcard comes first, then one `key:value` scope per pair tag, then
/// one bare-key scope per flag tag. Tags are already sorted by key, so the
/// result is deterministic.
pub fn resolve_scopes(server: &Server) -> Vec<ScopeKey> {
    let pairs = server.tags.iter().filter_map(|tag| match tag {
        Tag::Pair { key, value } => Some(ScopeKey::Pair {
            key: key.clone(),
            value: value.clone(),
        }),
        Tag::Flag { .. } => None,
    });
    let flags = server.tags.iter().filter_map(|tag| match tag {
        Tag::Flag { key } => Some(ScopeKey::Key(key.clone())),
        Tag::Pair { .. } => None,
    });

    std::iter::once(ScopeKey::All)
        .chain(pairs)
        .chain(flags)
        .collect()
}
