//! Launch helpers for the scripted test engine.
//!
//! The client starts engines by path alone, so each mode gets a small shell
//! wrapper that execs the test binary with the right flags.
//! Unix only; the wrappers are shell scripts.

#![allow(dead_code)]

use arbiter::EngineLimits;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

const VARIANTS: &[(&str, &str)] = &[
    ("normal", "--mode normal"),
    ("slow", "--mode normal --delay-ms 300"),
    ("unresponsive", "--mode unresponsive"),
    ("stop-responder", "--mode stop-responder"),
    ("illegal", "--mode illegal"),
    ("no-handshake", "--mode no-handshake"),
    ("crash-on-go", "--mode crash-on-go"),
];

/// Wrappers that do not `exec`, leaving a child that holds stdout after the
/// shell itself is killed.
const FORKING: &[(&str, &str)] = &[("forked-sleeper", "sleep 20\nexit 0")];

/// Writes every wrapper before the first engine is spawned, so no script is
/// still open for writing while another test executes one.
fn wrapper_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join(module_path!().replace("::", "-"));
        fs::create_dir_all(&dir).unwrap();
        for (name, args) in VARIANTS {
            let path = dir.join(name);
            let script = format!(
                "#!/bin/sh\nexec '{}' {}\n",
                env!("CARGO_BIN_EXE_scripted-engine"),
                args
            );
            write_script(&path, &script);
        }
        for (name, body) in FORKING {
            write_script(&dir.join(name), &format!("#!/bin/sh\n{}\n", body));
        }
        dir
    })
}

fn write_script(path: &Path, script: &str) {
    fs::write(path, script).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Path of the wrapper for `variant`, one of the names in `VARIANTS` or `FORKING`.
pub fn engine(variant: &str) -> PathBuf {
    assert!(
        VARIANTS.iter().chain(FORKING).any(|(name, _)| *name == variant),
        "unknown engine variant {}",
        variant
    );
    wrapper_dir().join(variant)
}

/// Short limits so failing engines are given up on quickly.
pub fn quick_limits() -> EngineLimits {
    EngineLimits {
        handshake_timeout: Duration::from_millis(2_000),
        grace: Duration::from_millis(200),
        search_timeout: Duration::from_millis(5_000),
    }
}

/// Whether the OS still knows a process with this id.
#[cfg(target_os = "linux")]
pub fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}
