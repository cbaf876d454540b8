//! [`BuildConfig`] to commented INI text.

use super::file::BuildConfig;
use std::path::Path;

pub(super) fn to_config_string(config: &BuildConfig) -> String {
    let root = config
        .pyramid
        .root
        .as_deref()
        .map(path_to_string)
        .unwrap_or_default();

    format!(
        r#"[pyramid]
; Directory holding the pyramid: metadata.json plus one directory per zoom.
; The finest zoom must already be present before a build.
root = {}
; Target size of one output partition (default: 128MB)
; Supports: KB, MB, GB suffixes (e.g., 64MB, 1GB)
block_size = {}
; What to do with output pixels no finest tile covers:
;   complete - fail the build (default)
;   sparse   - leave them as no-data
coverage = {}
; zlib level for tile records, 0 (fastest) to 9 (smallest). Default: 6
compression = {}

[execution]
; Worker threads. 0 uses one per available core.
threads = {}

[logging]
; The log file is cleared at the start of every run.
; Set RUST_LOG (e.g. RUST_LOG=debug) for more detail.
directory = {}
file = {}
"#,
        root,
        config.pyramid.block_size,
        config.pyramid.coverage,
        config.pyramid.compression,
        config.execution.threads,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
