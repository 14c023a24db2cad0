//! Debug dump of the generated parser source.
//!
//! Activated via the `PEGTAIL_DUMP_JS` environment variable:
//! - `PEGTAIL_DUMP_JS=1` writes to `target/pegtail/<start_rule>.js`
//! - `PEGTAIL_DUMP_JS=<dir>` writes to `<dir>/<start_rule>.js`
//!
//! Failures degrade to stderr warnings; the dump never affects emission.

use std::path::PathBuf;

/// Write the generated source out if the dump variable is set.
pub(crate) fn maybe_dump(source: &str, start_rule: &str) {
    let dump_target = match std::env::var("PEGTAIL_DUMP_JS") {
        Ok(value) if !value.is_empty() => value,
        _ => return,
    };
    write_dump_output(source, start_rule, &dump_target);
}

/// Write parser source to the location selected by the dump target.
///
/// - `"1"` → write to `target/pegtail/<start_rule>.js`
/// - Any other value → treat as directory path, write to
///   `<dir>/<start_rule>.js`
fn write_dump_output(source: &str, start_rule: &str, dump_target: &str) {
    let dir = if dump_target == "1" {
        PathBuf::from("target/pegtail")
    } else {
        PathBuf::from(dump_target)
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!(
            "warning: PEGTAIL_DUMP_JS: failed to create directory {:?}: {}",
            dir, e
        );
        return;
    }

    let path = dir.join(format!("{}.js", start_rule));
    match std::fs::write(&path, source) {
        Ok(()) => eprintln!("info: PEGTAIL_DUMP_JS: wrote {}", path.display()),
        Err(e) => eprintln!("warning: PEGTAIL_DUMP_JS: failed to write {:?}: {}", path, e),
    }
}
