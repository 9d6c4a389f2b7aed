// Module declarations
mod app;
mod blocklist;
mod catalog;
mod cli;
mod config_file;
mod net;
mod server;
mod session;
mod settings;
mod storage;
mod types;
mod util;
mod view;
mod viewer;

// Re-export module items at crate root so cross-module references stay short.
#[allow(unused_imports)]
pub(crate) use app::*;
#[allow(unused_imports)]
pub(crate) use blocklist::*;
#[allow(unused_imports)]
pub(crate) use catalog::*;
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use config_file::*;
#[allow(unused_imports)]
pub(crate) use net::*;
#[allow(unused_imports)]
pub(crate) use server::*;
#[allow(unused_imports)]
pub(crate) use session::*;
#[allow(unused_imports)]
pub(crate) use settings::*;
#[allow(unused_imports)]
pub(crate) use storage::*;
#[allow(unused_imports)]
pub(crate) use types::*;
#[allow(unused_imports)]
pub(crate) use util::*;
#[allow(unused_imports)]
pub(crate) use view::*;
#[allow(unused_imports)]
pub(crate) use viewer::*;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ZONEDECK_LOG")
        .unwrap_or_else(|_| EnvFilter::new("zonedeck=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Serialize)]
struct OpenSummary<'a> {
    outcome: &'a str,
    zone: Option<&'a ZoneMeta>,
    external_url: Option<&'a str>,
    location: &'a str,
    frame: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();
    let workspace = resolve_workspace(cli.workspace);

    match cli.command {
        Command::List {
            sort,
            search,
            covers,
            json,
        } => {
            let ctx = AppContext::build(workspace)?;
            let mut session = load_session(ctx.workspace());
            let mode = sort.unwrap_or(session.sort);
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let mut catalog = match runtime.block_on(load_catalog(&ctx.net, &ctx.config.endpoints)) {
                Ok(catalog) => catalog,
                Err(err) => {
                    print!("{}", render_text(&CatalogRender::Failed(err.to_string()), false));
                    std::process::exit(1);
                }
            };
            catalog.sort(mode);
            let visible = match search.as_deref() {
                Some(query) => catalog.filter(query),
                None => catalog.zones().to_vec(),
            };
            let grid = render(&visible, &ctx.config.endpoints);

            if sort.is_some() && mode != session.sort {
                session.sort = mode;
                save_session(ctx.workspace(), &session)?;
            }

            if json {
                let response = ListResponse {
                    sort: mode,
                    query: search,
                    count: grid.items().len(),
                    zones: grid.items().to_vec(),
                };
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", render_text(&grid, covers));
            }
            Ok(())
        }

        Command::Open { id, json } => {
            let ctx = AppContext::build(workspace)?;
            let mut session = load_session(ctx.workspace());
            let mut location = session_location(&session, &ctx.config.page_url)?;
            let Some(requested) = id.or_else(|| location.zone_param()) else {
                eprintln!("No zone id given and none recorded in the page location.");
                std::process::exit(2);
            };
            let mut viewer = load_viewer(ctx.workspace(), &session);
            let launcher = SystemLauncher::new(ctx.config.browser_command.as_deref());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;

            let mut catalog = match runtime.block_on(load_catalog(&ctx.net, &ctx.config.endpoints)) {
                Ok(catalog) => catalog,
                Err(err) => {
                    eprintln!("{}", CatalogRender::Failed(err.to_string()).status_line());
                    std::process::exit(1);
                }
            };
            catalog.sort(session.sort);
            let Some(zone) = catalog.find_by_param(&requested).cloned() else {
                eprintln!("No zone with id {requested}");
                std::process::exit(2);
            };

            let outcome = runtime.block_on(viewer.open(
                &zone,
                &ctx.net,
                &ctx.config.endpoints,
                &mut location,
                &launcher,
            ));
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(1);
                }
            };

            let frame = frame_file_path(ctx.workspace());
            if matches!(outcome, OpenOutcome::Shown(_)) {
                save_viewer(ctx.workspace(), &mut session, &viewer)?;
                session.location = Some(location.url().to_string());
                save_session(ctx.workspace(), &session)?;
            }

            if json {
                let summary = match &outcome {
                    OpenOutcome::Shown(meta) => OpenSummary {
                        outcome: "shown",
                        zone: Some(meta),
                        external_url: None,
                        location: location.url().as_str(),
                        frame: Some(frame.display().to_string()),
                    },
                    OpenOutcome::External(url) => OpenSummary {
                        outcome: "external",
                        zone: None,
                        external_url: Some(url),
                        location: location.url().as_str(),
                        frame: None,
                    },
                    OpenOutcome::Superseded => OpenSummary {
                        outcome: "superseded",
                        zone: None,
                        external_url: None,
                        location: location.url().as_str(),
                        frame: None,
                    },
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                match &outcome {
                    OpenOutcome::Shown(meta) => {
                        print!("{}", render_meta_text(meta));
                        println!("Frame: {}", frame.display());
                        println!("Location: {}", location.url());
                    }
                    OpenOutcome::External(url) => {
                        println!("Opened {url} in a new browsing context");
                    }
                    OpenOutcome::Superseded => {}
                }
            }
            Ok(())
        }

        Command::Close => {
            let config = load_file_config(&config_file_path(&workspace));
            let mut session = load_session(&workspace);
            let mut location = session_location(&session, &config.page_url)?;
            let mut viewer = load_viewer(&workspace, &session);
            viewer.close(&mut location);
            save_viewer(&workspace, &mut session, &viewer)?;
            session.location = Some(location.url().to_string());
            save_session(&workspace, &session)?;
            println!("Viewer closed. Location: {}", location.url());
            Ok(())
        }

        Command::Serve { bind, port } => {
            let mut ctx = AppContext::build(workspace)?;
            let rebound = ctx.rebind(bind, port)?;
            let bind = ctx.config.bind.clone();
            let port = ctx.config.port;
            let session = load_session(ctx.workspace());
            let mut location = session_location(&session, &ctx.config.page_url)?;
            if rebound {
                location = location.rebased(&ctx.config.page_url)?;
            }
            let mut viewer = load_viewer(ctx.workspace(), &session);
            let store = ctx.open_store()?;
            let launcher = SystemLauncher::new(ctx.config.browser_command.as_deref());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;

            runtime.block_on(async move {
                let started = startup(
                    &ctx.net,
                    &ctx.config,
                    session.sort,
                    &mut viewer,
                    &mut location,
                    &launcher,
                )
                .await;
                if let Some(Err(err)) = &started.deep_link {
                    eprintln!("{err}");
                }
                let state = UiState::new(ctx, started.catalog, session, viewer, location, store);
                serve(state, &bind, port).await
            })
        }

        Command::Settings { command } => {
            let ctx = AppContext::build(workspace)?;
            match command {
                SettingsCommand::DarkMode => {
                    let mut session = load_session(ctx.workspace());
                    let on = toggle_dark_mode(&mut session);
                    save_session(ctx.workspace(), &session)?;
                    println!("Dark mode {}", if on { "on" } else { "off" });
                }
                SettingsCommand::Contact => {
                    println!("{}", ctx.config.contact_text);
                }
                SettingsCommand::Privacy => {
                    println!("{PRIVACY_POLICY}");
                }
                SettingsCommand::Export { dir } => {
                    let store = ctx.open_store()?;
                    let path = export_to_dir(&store, &dir)?;
                    println!("Exported {}", path.display());
                }
                SettingsCommand::Import { file } => {
                    let store = ctx.open_store()?;
                    let report = import_from_file(&store, &file)?;
                    if let Some(err) = &report.storage_error {
                        eprintln!("Warning: storage section skipped: {err}");
                    }
                    println!("{IMPORT_DONE_MESSAGE}");
                }
            }
            Ok(())
        }

        Command::Config { command } => {
            let path = config_file_path(&workspace);
            match command {
                ConfigCommand::Show => {
                    let config = load_file_config(&path);
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigCommand::Init => {
                    if path.exists() {
                        eprintln!("Refusing to overwrite existing file: {}", path.display());
                        std::process::exit(2);
                    }
                    save_file_config(&path, &FileConfig::default())?;
                    println!("Created {}", path.display());
                }
            }
            Ok(())
        }
    }
}
