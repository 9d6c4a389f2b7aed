use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Frame, PageLocation, SortMode, Viewer, ViewerState};

/// Page state that outlives a single CLI invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Session {
    #[serde(default)]
    pub(crate) location: Option<String>,
    #[serde(default)]
    pub(crate) dark_mode: bool,
    #[serde(default)]
    pub(crate) sort: SortMode,
    #[serde(default)]
    pub(crate) viewer: ViewerState,
}

pub(crate) fn session_file_path(workspace: &Path) -> PathBuf {
    workspace.join("session.json")
}

pub(crate) fn frame_file_path(workspace: &Path) -> PathBuf {
    workspace.join("frame.html")
}

pub(crate) fn load_session(workspace: &Path) -> Session {
    match std::fs::read_to_string(session_file_path(workspace)) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|err| {
            warn!("[session] unreadable session, starting fresh: {err}");
            Session::default()
        }),
        Err(_) => Session::default(),
    }
}

pub(crate) fn save_session(
    workspace: &Path,
    session: &Session,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(workspace)?;
    let path = session_file_path(workspace);
    let json = serde_json::to_string_pretty(session)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Location stored in the session, or the configured page URL.
pub(crate) fn session_location(
    session: &Session,
    page_url: &str,
) -> Result<PageLocation, url::ParseError> {
    match session.location.as_deref().map(PageLocation::parse) {
        Some(Ok(location)) => Ok(location),
        _ => PageLocation::parse(page_url),
    }
}

pub(crate) fn load_viewer(workspace: &Path, session: &Session) -> Viewer {
    let document = std::fs::read_to_string(frame_file_path(workspace)).unwrap_or_default();
    Viewer::restore(session.viewer.clone(), Frame::with_document(document))
}

/// Persist the viewer; the frame document is rewritten whole, never appended.
pub(crate) fn save_viewer(
    workspace: &Path,
    session: &mut Session,
    viewer: &Viewer,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(workspace)?;
    std::fs::write(frame_file_path(workspace), viewer.frame().document())?;
    session.viewer = viewer.state().clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ZoneMeta;

    #[test]
    fn fresh_workspace_has_default_session() {
        let dir = tempfile::tempdir().unwrap();
        let session = load_session(dir.path());
        assert!(session.location.is_none());
        assert!(!session.dark_mode);
        let loc = session_location(&session, "http://127.0.0.1:8787/").unwrap();
        assert!(loc.zone_param().is_none());
    }

    #[test]
    fn viewer_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::default();
        let viewer = Viewer::restore(
            ViewerState {
                visible: true,
                meta: Some(ZoneMeta {
                    id: 4,
                    name: "Four".into(),
                    author: "by x".into(),
                    author_link: None,
                }),
            },
            Frame::with_document("<p>4</p>".into()),
        );
        session.location = Some("http://127.0.0.1:8787/?id=4".into());
        save_viewer(dir.path(), &mut session, &viewer).unwrap();
        save_session(dir.path(), &session).unwrap();

        let loaded = load_session(dir.path());
        let restored = load_viewer(dir.path(), &loaded);
        assert!(restored.is_showing(4));
        assert_eq!(restored.frame().document(), "<p>4</p>");
        let loc = session_location(&loaded, "http://unused/").unwrap();
        assert_eq!(loc.zone_param().as_deref(), Some("4"));
    }

    #[test]
    fn bad_stored_location_falls_back() {
        let session = Session {
            location: Some("not a url".into()),
            ..Session::default()
        };
        let loc = session_location(&session, "http://127.0.0.1:9000/").unwrap();
        assert_eq!(loc.url().port(), Some(9000));
    }
}
