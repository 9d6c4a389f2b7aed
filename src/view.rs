//! Catalog rendering: terminal text for the CLI, HTML for the served page.

use std::fmt::Write as _;

use crate::{
    escape_html, fill_cover_template, fullscreen_script, Endpoints, GridItem, PanelAction, Popup,
    PopupBody, SortMode, Zone, ZoneMeta, CANVAS_GUARD_SCRIPT, NO_ZONES_MESSAGE,
};

pub(crate) const FRAME_ELEMENT_ID: &str = "zoneFrame";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CatalogRender {
    Empty,
    Grid(Vec<GridItem>),
    /// The manifest could not be loaded; shown in place of the grid.
    Failed(String),
}

impl CatalogRender {
    pub(crate) fn status_line(&self) -> String {
        match self {
            Self::Empty => NO_ZONES_MESSAGE.to_string(),
            Self::Grid(items) => format!("Zones Loaded: {}", items.len()),
            Self::Failed(err) => format!("Error loading zones: {err}"),
        }
    }

    pub(crate) fn items(&self) -> &[GridItem] {
        match self {
            Self::Grid(items) => items,
            _ => &[],
        }
    }
}

pub(crate) fn grid_item(zone: &Zone, endpoints: &Endpoints) -> GridItem {
    GridItem {
        id: zone.id,
        label: zone.name.clone(),
        cover_src: fill_cover_template(&zone.cover, endpoints),
        external: zone.is_external(),
    }
}

/// Build the grid for `zones`, replacing any previous rendering wholesale.
pub(crate) fn render(zones: &[Zone], endpoints: &Endpoints) -> CatalogRender {
    if zones.is_empty() {
        return CatalogRender::Empty;
    }
    CatalogRender::Grid(zones.iter().map(|z| grid_item(z, endpoints)).collect())
}

pub(crate) fn render_text(grid: &CatalogRender, show_covers: bool) -> String {
    let mut out = String::new();
    if let CatalogRender::Grid(items) = grid {
        let width = items
            .iter()
            .map(|item| item.id.to_string().len())
            .max()
            .unwrap_or(1);
        for item in items {
            let marker = if item.external { " (external)" } else { "" };
            let _ = writeln!(out, "{:>width$}  {}{marker}", item.id, item.label);
            if show_covers {
                let _ = writeln!(out, "{:>width$}  {}", "", item.cover_src);
            }
        }
    }
    out.push_str(&grid.status_line());
    out.push('\n');
    out
}

pub(crate) fn render_meta_text(meta: &ZoneMeta) -> String {
    let mut out = format!("{} (#{})\n{}", meta.name, meta.id, meta.author);
    if let Some(link) = &meta.author_link {
        let _ = write!(out, " <{link}>");
    }
    out.push('\n');
    out
}

/// Everything the served page shows for one request.
#[derive(Debug, Clone)]
pub(crate) struct PageModel<'a> {
    pub(crate) grid: &'a CatalogRender,
    pub(crate) query: &'a str,
    pub(crate) sort: SortMode,
    pub(crate) viewer: Option<&'a ZoneMeta>,
    pub(crate) dark_mode: bool,
    pub(crate) popup: Option<Popup>,
    pub(crate) alert: Option<String>,
}

const PAGE_STYLE: &str = "body{font-family:sans-serif;margin:0;padding:1rem;background:#fafafa;color:#111}\
body.dark-mode{background:#121212;color:#eee}\
#container{display:grid;grid-template-columns:repeat(auto-fill,minmax(160px,1fr));gap:1rem}\
.zone-item{cursor:pointer;text-align:center}.zone-item img{width:100%;aspect-ratio:1;object-fit:cover}\
.zone-item a{display:block;text-decoration:none;color:inherit}\
#zoneViewer{position:fixed;inset:0;background:inherit;display:flex;flex-direction:column}\
#zoneFrame{flex:1;border:0;width:100%}\
#popupOverlay{position:fixed;inset:0;background:rgba(0,0,0,.5);display:flex;align-items:center;justify-content:center}\
#popup{background:inherit;padding:1rem;min-width:300px;max-height:80vh;overflow-y:auto}\
.settings-button{display:block;width:100%;padding:.75rem;margin-bottom:1rem}";

fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

fn open_href(item: &GridItem) -> String {
    format!("/open?id={}", item.id)
}

pub(crate) fn render_grid_html(grid: &CatalogRender, out: &mut String) {
    out.push_str("<div id=\"container\">");
    match grid {
        CatalogRender::Grid(items) => {
            for item in items {
                let target = if item.external { " target=\"_blank\" rel=\"noopener\"" } else { "" };
                let _ = write!(
                    out,
                    "<div class=\"zone-item\"><a href=\"{href}\"{target}><img src=\"{src}\" alt=\"\" loading=\"lazy\"><button>{label}</button></a></div>",
                    href = escape_html(&open_href(item)),
                    src = escape_html(&item.cover_src),
                    label = escape_html(&item.label),
                );
            }
        }
        other => out.push_str(&escape_html(&other.status_line())),
    }
    out.push_str("</div>");
}

fn render_popup(popup: &Popup, out: &mut String) {
    let _ = write!(
        out,
        "<div id=\"popupOverlay\"><div id=\"popup\"><h2 id=\"popupTitle\">{}</h2><div id=\"popupBody\">",
        escape_html(&popup.title)
    );
    match &popup.body {
        PopupBody::Actions(actions) => {
            for action in actions {
                match action {
                    PanelAction::Import => {
                        let _ = write!(
                            out,
                            "<label class=\"settings-button\" for=\"importData\">{}</label>\
                             <input type=\"file\" id=\"importData\" style=\"display:none\" onchange=\"importData(event)\">",
                            escape_html(action.label())
                        );
                    }
                    _ => {
                        let _ = write!(
                            out,
                            "<a class=\"settings-button\" href=\"{}\">{}</a>",
                            action.route(),
                            escape_html(action.label())
                        );
                    }
                }
            }
        }
        PopupBody::Text(text) => {
            for para in text.split("\n\n") {
                let _ = write!(out, "<p>{}</p>", escape_html(para).replace('\n', "<br>"));
            }
        }
    }
    out.push_str("</div><a href=\"/\">Close</a></div></div>");
}

const IMPORT_SCRIPT: &str = "function importData(e){var f=e.target.files[0];if(!f)return;\
var r=new FileReader();r.onload=function(x){fetch('/settings/import',{method:'POST',body:x.target.result})\
.then(function(res){return res.text();}).then(function(t){alert(t);location.href='/';});};r.readAsText(f);}";

pub(crate) fn render_page(page: &PageModel<'_>) -> String {
    let mut out = String::with_capacity(8 * 1024);
    out.push_str("<!DOCTYPE html><html><head>");
    out.push_str(CANVAS_GUARD_SCRIPT);
    let _ = write!(
        out,
        "<meta charset=\"utf-8\"><title>Zones</title><style>{PAGE_STYLE}</style></head>"
    );
    out.push_str(if page.dark_mode {
        "<body class=\"dark-mode\">"
    } else {
        "<body>"
    });

    out.push_str("<form method=\"get\" action=\"/\"><input id=\"searchBar\" name=\"q\" placeholder=\"Search zones\" value=\"");
    out.push_str(&escape_html(page.query));
    out.push_str("\"><select id=\"sortOptions\" name=\"sort\" onchange=\"this.form.submit()\">");
    for mode in SortMode::ALL {
        let selected = if mode == page.sort { " selected" } else { "" };
        let _ = write!(
            out,
            "<option value=\"{}\"{selected}>{}</option>",
            mode.as_str(),
            mode.label()
        );
    }
    out.push_str("</select><button type=\"submit\">Search</button> <a id=\"settings\" href=\"/?panel=settings\">Settings</a></form>");

    if let CatalogRender::Grid(items) = page.grid {
        let _ = write!(out, "<p id=\"zoneCount\">Zones Loaded: {}</p>", items.len());
    }
    render_grid_html(page.grid, &mut out);

    if let Some(meta) = page.viewer {
        let _ = write!(
            out,
            "<div id=\"zoneViewer\"><div><strong id=\"zoneName\">{name}</strong> <span id=\"zoneId\">{id}</span> ",
            name = escape_html(&meta.name),
            id = meta.id,
        );
        match &meta.author_link {
            Some(link) => {
                let _ = write!(
                    out,
                    "<a id=\"zoneAuthor\" href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a>",
                    escape_html(link),
                    escape_html(&meta.author)
                );
            }
            None => {
                let _ = write!(out, "<span id=\"zoneAuthor\">{}</span>", escape_html(&meta.author));
            }
        }
        let _ = write!(
            out,
            " <button onclick=\"{fs}\">Fullscreen</button> <a href=\"/close\">Close</a></div>\
             <iframe id=\"{FRAME_ELEMENT_ID}\" src=\"/frame\"></iframe></div>",
            fs = escape_html(&fullscreen_script(FRAME_ELEMENT_ID)),
        );
    }

    if let Some(popup) = &page.popup {
        render_popup(popup, &mut out);
    }

    out.push_str("<script>");
    out.push_str(IMPORT_SCRIPT);
    if let Some(alert) = &page.alert {
        let _ = write!(out, "alert({});", js_string(alert));
    }
    out.push_str("</script></body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_zone;

    fn endpoints() -> Endpoints {
        Endpoints {
            cover_base: "https://covers.example".into(),
            ..Endpoints::default()
        }
    }

    #[test]
    fn empty_list_shows_no_zones_message() {
        let grid = render(&[], &endpoints());
        assert_eq!(grid, CatalogRender::Empty);
        assert_eq!(render_text(&grid, false), "No zones found.\n");
        let mut html = String::new();
        render_grid_html(&grid, &mut html);
        assert!(html.contains("No zones found."));
    }

    #[test]
    fn grid_counts_items_and_fills_covers() {
        let zones = vec![sample_zone(2, "A"), sample_zone(10, "B")];
        let grid = render(&zones, &endpoints());
        assert_eq!(grid.status_line(), "Zones Loaded: 2");
        assert_eq!(grid.items()[0].cover_src, "https://covers.example/2.png");
        let text = render_text(&grid, true);
        assert_eq!(
            text,
            " 2  A\n    https://covers.example/2.png\n10  B\n    https://covers.example/10.png\nZones Loaded: 2\n"
        );
    }

    #[test]
    fn rendered_order_follows_input() {
        let zones = vec![sample_zone(-1, "Z"), sample_zone(2, "A"), sample_zone(1, "B")];
        let grid = render(&zones, &endpoints());
        let labels: Vec<&str> = grid.items().iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Z", "A", "B"]);
    }

    #[test]
    fn failure_replaces_grid() {
        let grid = CatalogRender::Failed("manifest: EOF".into());
        assert_eq!(render_text(&grid, false), "Error loading zones: manifest: EOF\n");
    }

    #[test]
    fn page_escapes_zone_text_and_marks_external_links() {
        let mut evil = sample_zone(3, "<script>x</script>");
        evil.url = "https://elsewhere.example".into();
        let grid = render(&[evil], &endpoints());
        let page = render_page(&PageModel {
            grid: &grid,
            query: "\"q\"",
            sort: SortMode::Popular,
            viewer: None,
            dark_mode: true,
            popup: None,
            alert: Some("Failed to load zone: \"x\"".into()),
        });
        assert!(page.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!page.contains("<script>x</script>"));
        assert!(page.contains("target=\"_blank\""));
        assert!(page.contains("value=\"&quot;q&quot;\""));
        assert!(page.contains("<option value=\"popular\" selected>"));
        assert!(page.contains("<body class=\"dark-mode\">"));
        assert!(page.contains("alert(\"Failed to load zone: \\\"x\\\"\");"));
        assert!(page.contains(CANVAS_GUARD_SCRIPT));
    }

    #[test]
    fn page_shows_viewer_and_popup() {
        let grid = render(&[sample_zone(1, "One")], &endpoints());
        let meta = ZoneMeta {
            id: 1,
            name: "One".into(),
            author: "by ann".into(),
            author_link: Some("https://ann.example".into()),
        };
        let page = render_page(&PageModel {
            grid: &grid,
            query: "",
            sort: SortMode::Name,
            viewer: Some(&meta),
            dark_mode: false,
            popup: Some(Popup::settings()),
            alert: None,
        });
        assert!(page.contains("<iframe id=\"zoneFrame\" src=\"/frame\">"));
        assert!(page.contains("href=\"https://ann.example\""));
        assert!(page.contains("requestFullscreen"));
        assert!(page.contains("Toggle Dark Mode"));
        assert!(page.contains("id=\"importData\""));
        assert!(page.contains("<p id=\"zoneCount\">Zones Loaded: 1</p>"));
    }

    #[test]
    fn meta_text_includes_optional_link() {
        let meta = ZoneMeta {
            id: 5,
            name: "Five".into(),
            author: "by bo".into(),
            author_link: None,
        };
        assert_eq!(render_meta_text(&meta), "Five (#5)\nby bo\n");
    }
}
