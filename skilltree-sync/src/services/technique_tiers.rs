//! Keyword tiers over technique names
//!
//! Used by the technique report to pick out entry-level material.

use skilltree_common::db::TechniqueUsage;

/// Names containing one of these describe a weak or default configuration
pub const WEAKNESS_KEYWORDS: &[&str] = &["Weak", "Default", "Clear", "Anonymous"];

/// Names containing one of these are candidate entry-level techniques
pub const ENTRY_LEVEL_KEYWORDS: &[&str] = &[
    "Weak",
    "Default",
    "Clear",
    "Anonymous",
    "Public",
    "Misconfiguration",
    "Enumeration",
    "FTP",
    "SMB",
    "Telnet",
    "Login",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TechniqueTier {
    /// Weak or default configuration
    Weakness,
    /// Other entry-level technique
    EntryLevel,
    Other,
}

/// Case-sensitive substring match, weakness first
pub fn classify(name: &str) -> TechniqueTier {
    if WEAKNESS_KEYWORDS.iter().any(|k| name.contains(k)) {
        TechniqueTier::Weakness
    } else if ENTRY_LEVEL_KEYWORDS.iter().any(|k| name.contains(k)) {
        TechniqueTier::EntryLevel
    } else {
        TechniqueTier::Other
    }
}

/// Techniques linked to at least one machine, most used first
///
/// Ties keep name order so the report is stable.
pub fn rank_by_usage(mut usage: Vec<TechniqueUsage>) -> Vec<TechniqueUsage> {
    usage.retain(|t| t.machine_count > 0);
    usage.sort_by(|a, b| {
        b.machine_count
            .cmp(&a.machine_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    usage
}
