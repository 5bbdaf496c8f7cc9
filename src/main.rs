#![forbid(unsafe_code)]

use std::io;
use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::{error, info};
use poem::listener::{Listener, RustlsCertificate, RustlsConfig, TcpListener};

// Archive Utilities
use crate::site::{build_routes, SiteCtx};
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx,
                           ARCHIVE_ARGS, ARCHIVE_DIRS, TLS_CERT_FILE, TLS_KEY_FILE};
use crate::utils::errors::Errors;
use crate::utils::poem_import::{run_import, DATE_FORMAT};
use crate::utils::render::Renderer;

// Modules
mod site;
mod utils;

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// The poem store is selected and constructed along with it.  We exit if we
// can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), io::Error> {
    // --------------- Initialize Archive -------------
    println!("Starting poetry_archive!");

    // Directory creation happens as a side effect of the first access.
    if ARCHIVE_ARGS.create_dirs_only {
        println!("Data directories are rooted at {}.", ARCHIVE_DIRS.root_dir);
        return Ok(());
    }

    archive_init();

    if ARCHIVE_ARGS.import_poem {
        return import_poems();
    }

    // --------------- Main Loop Set Up ---------------
    let config = &RUNTIME_CTX.parms.config;
    let renderer = Renderer::new(&config.site_name, &config.asset_prefix)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let site = Arc::new(SiteCtx::new(RUNTIME_CTX.store.clone(), renderer));

    let assets_dir = config.assets_dir(RUNTIME_CTX.archive_dirs);
    info!("Serving assets from {} under {}.", assets_dir, config.asset_prefix);
    let app = build_routes(site, &assets_dir, &config.asset_prefix);

    // ------------------ Main Loop -------------------
    let addr = format!("{}{}", "0.0.0.0:", config.http_port);
    info!("Listening on {} as {}:{}.", addr, config.http_addr, config.http_port);
    if config.enable_tls {
        let certs_dir = &RUNTIME_CTX.archive_dirs.certs_dir;
        poem::Server::new(
            TcpListener::bind(addr).rustls(
                RustlsConfig::new().fallback(
                    RustlsCertificate::new()
                        .key(std::fs::read(certs_dir.clone() + TLS_KEY_FILE)?)
                        .cert(std::fs::read(certs_dir.clone() + TLS_CERT_FILE)?),
                ),
            ),
        )
        .name(config.title.clone())
        .run(app)
        .await
    } else {
        poem::Server::new(TcpListener::bind(addr))
            .name(config.title.clone())
            .run(app)
            .await
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// archive_init:
// ---------------------------------------------------------------------------
/** Initialize all subsystems and data structures other than those needed
 * to configure the main loop processor.
 */
fn archive_init() {
    // Configure our log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));
    info!("Configuration file: '{}', logs directory: {}.",
          RUNTIME_CTX.parms.config_file, RUNTIME_CTX.archive_dirs.logs_dir);
    info!("Poems are read from the {}.", RUNTIME_CTX.store.describe());

    print_version_info();
}

// ---------------------------------------------------------------------------
// import_poems:
// ---------------------------------------------------------------------------
/** Run the interactive importer against the configured poems directory. */
fn import_poems() -> Result<(), io::Error> {
    let poems_dir = RUNTIME_CTX.parms.config.poems_dir(RUNTIME_CTX.archive_dirs);
    let today = chrono::Local::now().format(DATE_FORMAT).to_string();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    match run_import(&mut input, &mut output, Path::new(&poems_dir), &today) {
        Ok(paths) => {
            info!("Imported {} poem(s) into {}.", paths.len(), poems_dir);
            Ok(())
        },
        Err(e) => {
            error!("ERROR: poem import failed: {}", e);
            Err(io::Error::new(io::ErrorKind::Other, e.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("{}.", format!("\n*** Running poetry_archive={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}",
                        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
                        env!("GIT_BRANCH"),
                        env!("GIT_COMMIT_SHORT"),
                        env!("GIT_DIRTY"),
                        env!("SOURCE_TIMESTAMP"),
                        env!("RUSTC_VERSION")),
    );
}
