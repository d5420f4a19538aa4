//! Helpers shared by the Linux and BSD probe modules: env-var based
//! desktop/shell detection and the Wayland-or-X11 window-manager heuristic.

use std::path::Path;

/// Map a shell executable's basename to a friendly display name, falling
/// back to the basename itself for anything unrecognised.
pub fn friendly_shell_name(path: &str) -> String {
    let basename = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    match basename {
        "bash" => "Bash",
        "zsh" => "Zsh",
        "fish" => "Fish",
        "ksh" => "KornShell",
        "tcsh" => "TCSH",
        "csh" => "C Shell",
        "sh" => "POSIX Shell",
        "nu" => "Nushell",
        "dash" => "Dash",
        other => return other.to_string(),
    }
    .to_string()
}

/// `XDG_CURRENT_DESKTOP` (truncated at the first `:`) or `DESKTOP_SESSION`.
pub fn desktop_environment_from_env() -> Option<String> {
    if let Ok(value) = std::env::var("XDG_CURRENT_DESKTOP") {
        if !value.is_empty() {
            let truncated = value.split(':').next().unwrap_or(&value);
            return Some(truncated.to_string());
        }
    }
    std::env::var("DESKTOP_SESSION").ok().filter(|v| !v.is_empty())
}

/// Best-effort window-manager name for a Wayland or X11 session. Real
/// compositor/WM introspection (Wayland peer-credential lookup, XCB
/// `_NET_SUPPORTING_WM_CHECK`) needs a running display server and isn't
/// exercised in tests; this degrades to "Wayland"/"X11" generic names when
/// the specific compositor/WM binary can't be identified from the process
/// table, and to `None` when no graphical session is detected at all.
pub fn window_manager_from_session() -> Option<String> {
    if std::env::var("WAYLAND_DISPLAY").is_ok() {
        return Some(detect_wayland_compositor().unwrap_or_else(|| "Wayland".to_string()));
    }
    if std::env::var("DISPLAY").is_ok() {
        return Some(detect_x11_wm().unwrap_or_else(|| "X11".to_string()));
    }
    None
}

const KNOWN_WAYLAND_COMPOSITORS: &[&str] = &["sway", "hyprland", "weston", "mutter", "kwin_wayland", "river", "labwc"];
const KNOWN_X11_WMS: &[&str] = &["i3", "bspwm", "awesome", "openbox", "xmonad", "dwm", "mutter", "kwin_x11"];

fn detect_wayland_compositor() -> Option<String> {
    scan_proc_names(KNOWN_WAYLAND_COMPOSITORS)
}

fn detect_x11_wm() -> Option<String> {
    scan_proc_names(KNOWN_X11_WMS)
}

/// Scan `/proc/*/comm` for one of `names`; cheap substitute for a true
/// compositor-socket or XCB root-window query, usable on any Linux/BSD
/// host without a graphical session library dependency.
#[cfg(target_os = "linux")]
fn scan_proc_names(names: &[&str]) -> Option<String> {
    let entries = std::fs::read_dir("/proc").ok()?;
    for entry in entries.flatten() {
        let comm_path = entry.path().join("comm");
        if let Ok(comm) = std::fs::read_to_string(&comm_path) {
            let comm = comm.trim();
            if let Some(found) = names.iter().find(|n| comm.eq_ignore_ascii_case(n)) {
                return Some(title_case(found));
            }
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn scan_proc_names(_names: &[&str]) -> Option<String> {
    None
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_shell_name_maps_known_shells() {
        assert_eq!(friendly_shell_name("/bin/bash"), "Bash");
        assert_eq!(friendly_shell_name("/usr/bin/zsh"), "Zsh");
        assert_eq!(friendly_shell_name("/opt/weird-shell"), "weird-shell");
    }
}
