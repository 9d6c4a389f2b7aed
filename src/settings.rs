use std::path::{Path, PathBuf};

use tracing::info;

use crate::{now_ms, ImportReport, Session, StateStore};

pub(crate) const IMPORT_DONE_MESSAGE: &str = "Data loaded";

pub(crate) const PRIVACY_POLICY: &str = "PRIVACY POLICY\n\
Last updated February 12, 2026\n\n\
This Privacy Notice for Games (\"we,\" \"us,\" or \"our\") describes how and why we might \
access, collect, store, use, and/or share (\"process\") your personal information when you \
use our services (\"Services\"), including when you visit our website or engage with us in \
other related ways.\n\n\
Questions or concerns? Reach out through the contact page.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PanelAction {
    ToggleDarkMode,
    Contact,
    Privacy,
    Export,
    Import,
}

impl PanelAction {
    pub(crate) const ALL: [PanelAction; 5] = [
        PanelAction::ToggleDarkMode,
        PanelAction::Contact,
        PanelAction::Privacy,
        PanelAction::Export,
        PanelAction::Import,
    ];

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::ToggleDarkMode => "Toggle Dark Mode",
            Self::Contact => "Contact",
            Self::Privacy => "Privacy Policy",
            Self::Export => "Export Data",
            Self::Import => "Import Data",
        }
    }

    pub(crate) fn route(&self) -> &'static str {
        match self {
            Self::ToggleDarkMode => "/settings/dark-mode",
            Self::Contact => "/?panel=contact",
            Self::Privacy => "/?panel=privacy",
            Self::Export => "/settings/export",
            Self::Import => "/settings/import",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PopupBody {
    Actions(Vec<PanelAction>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Popup {
    pub(crate) title: String,
    pub(crate) body: PopupBody,
}

impl Popup {
    pub(crate) fn settings() -> Self {
        Self {
            title: "Settings".to_string(),
            body: PopupBody::Actions(PanelAction::ALL.to_vec()),
        }
    }

    pub(crate) fn contact(contact_text: &str) -> Self {
        Self {
            title: "Contact".to_string(),
            body: PopupBody::Text(contact_text.to_string()),
        }
    }

    pub(crate) fn privacy() -> Self {
        Self {
            title: "Privacy Policy".to_string(),
            body: PopupBody::Text(PRIVACY_POLICY.to_string()),
        }
    }

    /// Popup named by the page's `panel` parameter.
    pub(crate) fn from_param(panel: &str, contact_text: &str) -> Option<Self> {
        match panel {
            "settings" => Some(Self::settings()),
            "contact" => Some(Self::contact(contact_text)),
            "privacy" => Some(Self::privacy()),
            _ => None,
        }
    }
}

pub(crate) fn toggle_dark_mode(session: &mut Session) -> bool {
    session.dark_mode = !session.dark_mode;
    session.dark_mode
}

pub(crate) fn export_filename(timestamp_ms: i64) -> String {
    format!("{timestamp_ms}.data")
}

pub(crate) fn export_to_dir(
    store: &StateStore,
    dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(now_ms()));
    std::fs::write(&path, store.export_blob()?)?;
    info!(path = %path.display(), "[settings] data exported");
    Ok(path)
}

pub(crate) fn import_from_file(
    store: &StateStore,
    path: &Path,
) -> Result<ImportReport, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let report = store.import_blob(&content)?;
    info!(
        keys = report.keys,
        cookies = report.cookies,
        "[settings] data imported from {}",
        path.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_popup_lists_every_action() {
        let popup = Popup::settings();
        assert_eq!(popup.title, "Settings");
        assert_eq!(popup.body, PopupBody::Actions(PanelAction::ALL.to_vec()));
    }

    #[test]
    fn popup_from_param() {
        assert_eq!(
            Popup::from_param("contact", "mail us").unwrap().body,
            PopupBody::Text("mail us".into())
        );
        assert_eq!(Popup::from_param("privacy", "").unwrap().title, "Privacy Policy");
        assert!(Popup::from_param("bogus", "").is_none());
    }

    #[test]
    fn dark_mode_toggles() {
        let mut session = Session::default();
        assert!(toggle_dark_mode(&mut session));
        assert!(!toggle_dark_mode(&mut session));
    }

    #[test]
    fn export_file_is_named_by_timestamp() {
        assert_eq!(export_filename(1700000000123), "1700000000123.data");
    }

    #[test]
    fn export_then_import_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = StateStore::open_in_memory().unwrap();
        source.set_item("save", "slot-1").unwrap();
        source.assign_cookie("uid=7").unwrap();
        let path = export_to_dir(&source, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".data"));
        assert!(name.trim_end_matches(".data").parse::<i64>().is_ok());

        let target = StateStore::open_in_memory().unwrap();
        let report = import_from_file(&target, &path).unwrap();
        assert_eq!(report.keys, 1);
        assert_eq!(target.get_item("save").unwrap().as_deref(), Some("slot-1"));
        assert_eq!(target.cookie_string().unwrap(), "uid=7");
    }
}
