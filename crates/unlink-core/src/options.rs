//! Per-run configuration (§6, §7 CLI boundary). The engine never reads
//! flags from anywhere but here and the annotation map; there is no
//! config file format since the spec defines none.

use crate::islandmode::IslandMode;

/// Options collected by a caller (the CLI) and threaded into
/// [`crate::unlink`] verbatim.
#[derive(Debug, Clone, Default)]
pub struct UnlinkOptions {
    /// Overrides the `ISLANDGUESS` directive found in the annotation
    /// map, if any. `None` defers to the annotation (or its own default).
    pub island_mode_override: Option<IslandMode>,
    /// Forces every `FILE` range to be treated as dry-run regardless of
    /// its `WRITEOUT` flag.
    pub dry_run: bool,
}
