use std::env;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;

use chrono::Utc;

use super::{
    Endpoints, COVER_PLACEHOLDER, DEFAULT_WORKSPACE_DIR, HTML_PLACEHOLDER, NEW_HTML_PLACEHOLDER,
};

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn resolve_workspace(cli: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli {
        return path;
    }
    if let Some(value) = env_optional("ZONEDECK_WORKSPACE") {
        return PathBuf::from(value);
    }
    PathBuf::from(DEFAULT_WORKSPACE_DIR)
}

/// Cover templates only know the cover and html bases. Each placeholder is
/// replaced once, at its first occurrence.
pub(crate) fn fill_cover_template(template: &str, endpoints: &Endpoints) -> String {
    template
        .replacen(COVER_PLACEHOLDER, &endpoints.cover_base, 1)
        .replacen(HTML_PLACEHOLDER, &endpoints.html_base, 1)
}

pub(crate) fn fill_content_template(template: &str, endpoints: &Endpoints) -> String {
    fill_cover_template(template, endpoints).replacen(
        NEW_HTML_PLACEHOLDER,
        &endpoints.new_html_base,
        1,
    )
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub(crate) fn build_external_command(program: &str, args: &[String]) -> ProcessCommand {
    let mut cmd = ProcessCommand::new(program);
    cmd.args(args);

    // Detach from our process group so closing the terminal leaves the browser alone.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd
}

/// Platform command that opens a URL in the default browser.
pub(crate) fn system_open_command() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec!["open".to_string()]
    } else if cfg!(windows) {
        vec![
            "cmd".to_string(),
            "/C".to_string(),
            "start".to_string(),
            String::new(),
        ]
    } else {
        vec!["xdg-open".to_string()]
    }
}
