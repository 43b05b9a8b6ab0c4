// SPDX-FileCopyrightText: 2026 Traffic-Lens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations embedded at compile time with refinery.

use lens_core::LensError;
use tracing::info;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply every pending migration. Applied versions are tracked in
/// `refinery_schema_history`, so this is safe to call on each open.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), LensError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(LensError::storage)?;
    let applied = report.applied_migrations();
    if !applied.is_empty() {
        info!(count = applied.len(), "applied database migrations");
    }
    Ok(())
}
