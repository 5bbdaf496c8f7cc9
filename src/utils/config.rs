#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fmt, fs, path::Path, sync::Arc, time::Duration};
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

// Archive Utilities
use crate::utils::{archive_utils, errors::Errors};
use crate::utils::archive_utils::{get_absolute_path, join_url_path};
use crate::utils::poem_store::{
    FilePoemStore, HttpPoemStore, PoemStore, StoreMode,
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_SCAN_LIMIT,
};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_ARCHIVE_ROOT_DIR : &str = "ARCHIVE_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.poetry_archive";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const CERTS_DIR            : &str = "/certs";
const PUBLIC_DIR           : &str = "/public";
const POEMS_SUBDIR         : &str = "poems";           // relative to the assets dir
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml";     // relative to config dir
const ARCHIVE_CONFIG_FILE  : &str = "/archive.toml";   // relative to config dir
pub const TLS_KEY_FILE     : &str = "/key.pem";        // relative to certs dir
pub const TLS_CERT_FILE    : &str = "/cert.pem";       // relative to certs dir

// Deployment host of the static poem files, see Config::poem_base_url.
pub const ENV_PUBLIC_HOST  : &str = "ARCHIVE_PUBLIC_HOST";

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 8080;
const DEFAULT_ASSET_PREFIX : &str = "/static";

// Site.
const DEFAULT_TITLE        : &str = "Poetry Archive";
const DEFAULT_SITE_NAME    : &str = "Alaska Hoffman";

// Fallback console log format when no log4rs file is installed.
const CONSOLE_LOG_PATTERN  : &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {M} - {m}{n}";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref ARCHIVE_ARGS: ArchiveArgs = init_archive_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref ARCHIVE_DIRS: ArchiveDirs = init_archive_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// ArchiveDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct ArchiveDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
    pub certs_dir: String,
}

impl ArchiveDirs {
    /** Lay out the subdirectories under a root without touching the disk. */
    pub fn from_root(root_dir: &str) -> Self {
        ArchiveDirs {
            root_dir: root_dir.to_string(),
            config_dir: root_dir.to_string() + CONFIG_DIR,
            logs_dir: root_dir.to_string() + LOGS_DIR,
            certs_dir: root_dir.to_string() + CERTS_DIR,
        }
    }
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// ArchiveArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "poetry_archive", about = "Command line arguments for the poetry archive server.")]
pub struct ArchiveArgs {
    /// Specify the archive's root data directory.
    ///
    /// This directory contains the configuration, logs and certificates
    /// the server uses during execution.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the ARCHIVE_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root-dir command line argument,
    ///
    ///   3. Otherwise, ~/.poetry_archive
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,

    /// Interactively convert a plain text poem into a poem-<id>.json record
    /// in the configured poems directory and then exit.
    #[structopt(short, long)]
    pub import_poem: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
pub struct RuntimeCtx {
    pub parms: Parms,
    pub store: Arc<dyn PoemStore>,
    pub archive_args: &'static ArchiveArgs,
    pub archive_dirs: &'static ArchiveDirs,
}

// The store is a trait object, so describe it rather than derive.
impl fmt::Debug for RuntimeCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeCtx")
            .field("parms", &self.parms)
            .field("store", &self.store.describe())
            .field("archive_args", &self.archive_args)
            .field("archive_dirs", &self.archive_dirs)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
/** The contents of archive.toml.  Every key is optional. */
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub site_name: String,
    pub http_addr: String,
    pub http_port: u16,
    pub store_mode: StoreMode,
    pub assets_dir: Option<String>,
    pub poems_dir: Option<String>,
    pub asset_prefix: String,
    pub poem_base_url: Option<String>,
    pub scan_limit: u32,
    pub fetch_timeout_secs: u64,
    pub enable_tls: bool,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    /** The directory served under the asset prefix. */
    pub fn assets_dir(&self, dirs: &ArchiveDirs) -> String {
        match &self.assets_dir {
            Some(d) => get_absolute_path(d),
            None => dirs.root_dir.clone() + PUBLIC_DIR,
        }
    }

    /** The directory holding poem-<id>.json files for the file store. */
    pub fn poems_dir(&self, dirs: &ArchiveDirs) -> String {
        match &self.poems_dir {
            Some(d) => get_absolute_path(d),
            None => join_url_path(&self.assets_dir(dirs), POEMS_SUBDIR),
        }
    }

    /** The url the http store fetches poem-<id>.json files under.  A public
     * host from the environment wins, then the configured url, then this
     * server's own asset route.
     */
    pub fn poem_base_url(&self, public_host: Option<&str>) -> String {
        let poems_path = join_url_path(&self.asset_prefix, POEMS_SUBDIR);
        if let Some(host) = public_host.filter(|h| !h.trim().is_empty()) {
            return join_url_path(&format!("https://{}", host.trim()), &poems_path);
        }
        match &self.poem_base_url {
            Some(url) => url.clone(),
            None => join_url_path(&format!("{}:{}", self.http_addr, self.http_port), &poems_path),
        }
    }

    /** Check values that toml cannot and normalize the asset prefix to a
     * leading slash with no trailing slash.
     */
    pub fn validate(mut self) -> Result<Self> {
        if self.scan_limit == 0 {
            return Err(anyhow!("scan_limit must be at least 1"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(anyhow!("fetch_timeout_secs must be at least 1"));
        }
        let prefix = self.asset_prefix.trim().trim_matches('/');
        if prefix.is_empty() {
            return Err(anyhow!("asset_prefix cannot be the site root"));
        }
        self.asset_prefix = format!("/{}", prefix);
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            store_mode: StoreMode::default(),
            assets_dir: None,
            poems_dir: None,
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
            poem_base_url: None,
            scan_limit: DEFAULT_SCAN_LIMIT,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            enable_tls: false,
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_archive_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_archive_args() -> ArchiveArgs {
    let args = ArchiveArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_archive_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories, creating the ones we own. */
fn init_archive_dirs() -> ArchiveDirs {
    let mistrust = get_mistrust();

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.  The public assets directory is content and is not
    // created or checked here.
    let dirs = ArchiveDirs::from_root(&get_root_dir());
    check_archive_dir(&dirs.root_dir, "root directory", &mistrust);
    check_archive_dir(&dirs.config_dir, "config directory", &mistrust);
    check_archive_dir(&dirs.logs_dir, "logs directory", &mistrust);
    check_archive_dir(&dirs.certs_dir, "certs directory", &mistrust);
    dirs
}

// ---------------------------------------------------------------------------
// check_archive_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 *
 * Any failure results in a panic.
 */
fn check_archive_dir(dir: &String, msgname: &str, mistrust: &Mistrust) {
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The archive {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        if !path.is_dir() {
            panic!("The archive {} path must be a directory: {}", msgname, dir);
        }

        // Owner-only rwx.
        let meta = path.metadata().unwrap_or_else(|_| panic!("Unable to read metadata for {}: {}", msgname, dir));
        let perm = meta.permissions().mode();
        if perm & 0o777 != 0o700 {
            panic!("The archive {} path must be have 0o700 permissions: {}", msgname, dir);
        }
    } else if let Err(e) = mistrust.make_directory(path) {
        panic!("Make directory error for {:?}: {}", path, &e.to_string());
    }
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Mistrust {
    match Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build() {
            Ok(m) => m,
            Err(e) => {
                panic!("Mistrust configuration error: {}", &e.to_string());
            }
        }
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_ARCHIVE_ROOT_DIR).unwrap_or_else(
        |_| {
            match ARCHIVE_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the installed configuration file, or with a
 * console appender at info level when no file is installed.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if !Path::new(&logconfig).is_file() {
        init_console_log();
        info!("No log configuration at {}, logging to the console.", logconfig);
        return;
    }

    match log4rs::init_file(logconfig.clone(), Default::default()) {
        Ok(_) => (),
        Err(e) => {
            println!("{}", e);
            let s = format!("{}", Errors::Log4rsInitialization(logconfig));
            panic!("{}", s);
        },
    }
    info!("Log4rs initialized using: {}", logconfig);
}

// ---------------------------------------------------------------------------
// init_console_log:
// ---------------------------------------------------------------------------
fn init_console_log() {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_LOG_PATTERN)))
        .build();
    let config = log4rs::config::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    let result = match config {
        Ok(c) => log4rs::init_config(c).map(|_| ()).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = result {
        panic!("{}", Errors::Log4rsInitialization(format!("console fallback: {}", e)));
    }
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    ARCHIVE_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from archive.toml in the config
 * directory.  A missing file means default values; a file that cannot be
 * parsed or validated is an error.
 */
fn get_parms() -> Result<Parms> {
    let config_file = ARCHIVE_DIRS.config_dir.clone() + ARCHIVE_CONFIG_FILE;

    let config_file_abs = archive_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            println!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    let config = match parse_config(&contents) {
        Ok(c)  => c,
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs), e);
            error!("{}", msg);
            return Result::Err(anyhow!(msg));
        }
    };

    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    config.validate()
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // If either of these fail the application aborts.
    let parms = get_parms().expect("FAILED to read configuration file.");
    let public_host = env::var(ENV_PUBLIC_HOST).ok();
    let store = init_poem_store(&parms.config, &ARCHIVE_DIRS, public_host.as_deref())
        .expect("FAILED to initialize the poem store.");
    RuntimeCtx {parms, store, archive_args: &ARCHIVE_ARGS, archive_dirs: &ARCHIVE_DIRS}
}

// ---------------------------------------------------------------------------
// init_poem_store:
// ---------------------------------------------------------------------------
/** Build the store implementation the configuration selects. */
pub fn init_poem_store(config: &Config, dirs: &ArchiveDirs, public_host: Option<&str>)
-> Result<Arc<dyn PoemStore>, Errors> {
    let store: Arc<dyn PoemStore> = match config.store_mode {
        StoreMode::File => {
            Arc::new(FilePoemStore::new(config.poems_dir(dirs), config.scan_limit))
        },
        StoreMode::Http => {
            Arc::new(HttpPoemStore::new(&config.poem_base_url(public_host),
                                        config.scan_limit,
                                        Duration::from_secs(config.fetch_timeout_secs))?)
        },
    };
    Ok(store)
}
