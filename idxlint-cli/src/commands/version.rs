//! `idxlint version` command - Display version information.

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::header("idxlint");

    kv("Version", VERSION);
    kv("Binary", "idxlint");

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);

    output::newline();

    output::section("Components");
    kv("idxlint-core", VERSION);
    kv("idxlint-cli", VERSION);

    output::newline();
    output::dim("Scans JPA repositories and Liquibase changelogs for unindexed columns");

    Ok(())
}
