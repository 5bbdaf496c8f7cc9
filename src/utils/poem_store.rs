#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use serde::Deserialize;

use crate::utils::errors::Errors;
use crate::utils::poem_types::{poem_file_name, PoemRecord};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Poems are enumerated by probing ids 1 through the scan limit.
pub const DEFAULT_SCAN_LIMIT         : u32 = 50;
pub const DEFAULT_FETCH_TIMEOUT_SECS : u64 = 5;

// ---------------------------------------------------------------------------
// StoreMode:
// ---------------------------------------------------------------------------
/** Where poem records are read from. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    #[default]
    File,
    Http,
}

// ***************************************************************************
//                                 Trait
// ***************************************************************************
/** Read-only access to the poem collection.  Individual record failures
 * never escape an implementation: they are logged and the record is
 * treated as absent.
 */
#[async_trait]
pub trait PoemStore: Send + Sync {
    /// Resolve exactly one poem; absent on any failure.
    async fn get(&self, id: u32) -> Option<PoemRecord>;

    /// Every resolvable poem in the scan range in ascending id order.
    async fn list_all(&self) -> Result<Vec<PoemRecord>, Errors>;

    /// Human readable description for the startup log.
    fn describe(&self) -> String;
}

// ***************************************************************************
//                               File Store
// ***************************************************************************
// ---------------------------------------------------------------------------
// FilePoemStore:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct FilePoemStore {
    poems_dir: PathBuf,
    scan_limit: u32,
}

impl FilePoemStore {
    pub fn new(poems_dir: impl Into<PathBuf>, scan_limit: u32) -> Self {
        Self {poems_dir: poems_dir.into(), scan_limit}
    }
}

#[async_trait]
impl PoemStore for FilePoemStore {
    async fn get(&self, id: u32) -> Option<PoemRecord> {
        let path = self.poems_dir.join(poem_file_name(id));
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) => {
                debug!("Skipping poem {}, unable to read {:?}: {}", id, path, e);
                return None;
            }
        };
        decode_logged(id, &bytes)
    }

    async fn list_all(&self) -> Result<Vec<PoemRecord>, Errors> {
        // Only the directory itself going missing is a listing failure.
        match tokio::fs::metadata(&self.poems_dir).await {
            Ok(meta) if meta.is_dir() => (),
            Ok(_) => {
                return Err(Errors::StoreEnumeration(
                    format!("{:?} is not a directory", self.poems_dir)));
            },
            Err(e) => {
                return Err(Errors::StoreEnumeration(
                    format!("{:?}: {}", self.poems_dir, e)));
            },
        }

        Ok(scan_range(self, self.scan_limit).await)
    }

    fn describe(&self) -> String {
        format!("file store at {:?} (ids 1..={})", self.poems_dir, self.scan_limit)
    }
}

// ***************************************************************************
//                               HTTP Store
// ***************************************************************************
// ---------------------------------------------------------------------------
// HttpPoemStore:
// ---------------------------------------------------------------------------
/** Fetches poem-<id>.json resources from a static file host.  Each request
 * is bounded by the client timeout and is never retried.
 */
#[derive(Debug)]
pub struct HttpPoemStore {
    client: reqwest::Client,
    base_url: String,
    scan_limit: u32,
}

impl HttpPoemStore {
    pub fn new(base_url: &str, scan_limit: u32, timeout: Duration) -> Result<Self, Errors> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Errors::StoreEnumeration(format!("unable to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            scan_limit,
        })
    }

    fn poem_url(&self, id: u32) -> String {
        format!("{}/{}", self.base_url, poem_file_name(id))
    }
}

#[async_trait]
impl PoemStore for HttpPoemStore {
    async fn get(&self, id: u32) -> Option<PoemRecord> {
        let url = self.poem_url(id);
        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping poem {}, fetch of {} failed: {}", id, url, e);
                return None;
            }
        };
        if resp.status() != reqwest::StatusCode::OK {
            debug!("Skipping poem {}, {} returned {}", id, url, resp.status());
            return None;
        }
        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                debug!("Skipping poem {}, reading body of {} failed: {}", id, url, e);
                return None;
            }
        };
        decode_logged(id, &bytes)
    }

    async fn list_all(&self) -> Result<Vec<PoemRecord>, Errors> {
        Ok(scan_range(self, self.scan_limit).await)
    }

    fn describe(&self) -> String {
        format!("http store at {} (ids 1..={})", self.base_url, self.scan_limit)
    }
}

// ***************************************************************************
//                             Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// decode_record:
// ---------------------------------------------------------------------------
/** Decode the JSON of the poem that was requested as `id`.  A record that
 * names a different id than the one it was resolved under is malformed.
 */
pub fn decode_record(id: u32, bytes: &[u8]) -> Result<PoemRecord, Errors> {
    let record: PoemRecord = serde_json::from_slice(bytes)
        .map_err(|e| Errors::MalformedRecord(id, e.to_string()))?;
    if record.id != id {
        return Err(Errors::MalformedRecord(id, format!("record carries id {}", record.id)));
    }
    Ok(record)
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// scan_range:
// ---------------------------------------------------------------------------
/** Resolve ids 1..=scan_limit.  The lookups run concurrently but join_all
 * yields them in request order, so the result stays ascending by id.
 */
async fn scan_range<S: PoemStore + ?Sized>(store: &S, scan_limit: u32) -> Vec<PoemRecord> {
    let lookups = (1..=scan_limit).map(|id| store.get(id));
    join_all(lookups).await.into_iter().flatten().collect()
}

// ---------------------------------------------------------------------------
// decode_logged:
// ---------------------------------------------------------------------------
fn decode_logged(id: u32, bytes: &[u8]) -> Option<PoemRecord> {
    match decode_record(id, bytes) {
        Ok(r) => Some(r),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    fn record(id: u32, title: &str, content: &str) -> PoemRecord {
        PoemRecord::new(id, title.into(), "2024-05-01".into(), "Poetry".into(),
                        "Brooklyn, NY".into(), content.into())
    }

    fn write_record(dir: &Path, file_id: u32, rec: &PoemRecord) {
        let json = serde_json::to_string_pretty(rec).unwrap();
        fs::write(dir.join(poem_file_name(file_id)), json).unwrap();
    }

    fn ids(records: &[PoemRecord]) -> Vec<u32> {
        records.iter().map(|r| r.id).collect()
    }

    // Directory with good, malformed and out-of-range poems.
    fn populated_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_record(dir.path(), 1, &record(1, "Static", "noise and hum"));
        fs::write(dir.path().join("poem-2.json"), "{ not json").unwrap();
        fs::write(dir.path().join("poem-3.json"), r#"{"id": 3, "title": "Half"}"#).unwrap();
        write_record(dir.path(), 5, &record(5, "Echo", "silence"));
        write_record(dir.path(), 7, &record(8, "Stray", "wrong file"));
        write_record(dir.path(), 50, &record(50, "Last", "edge of the range"));
        write_record(dir.path(), 60, &record(60, "Beyond", "outside the scan"));
        dir
    }

    #[test]
    fn decode_rejects_mismatched_id() {
        let json = serde_json::to_vec(&record(8, "Stray", "x")).unwrap();
        assert!(decode_record(8, &json).is_ok());
        match decode_record(7, &json) {
            Err(Errors::MalformedRecord(7, _)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn file_store_lists_valid_records_in_order() {
        let dir = populated_dir();
        let store = FilePoemStore::new(dir.path(), DEFAULT_SCAN_LIMIT);
        let all = store.list_all().await.unwrap();
        assert_eq!(ids(&all), vec![1, 5, 50]);
        assert_eq!(all[0].title, "Static");

        // Unchanged data lists identically.
        let again = store.list_all().await.unwrap();
        assert_eq!(all, again);
    }

    #[tokio::test]
    async fn file_store_respects_scan_limit() {
        let dir = populated_dir();
        let store = FilePoemStore::new(dir.path(), 4);
        assert_eq!(ids(&store.list_all().await.unwrap()), vec![1]);
    }

    #[tokio::test]
    async fn file_store_get_resolves_one_record() {
        let dir = populated_dir();
        let store = FilePoemStore::new(dir.path(), DEFAULT_SCAN_LIMIT);
        assert_eq!(store.get(5).await.map(|r| r.title), Some("Echo".to_string()));
        assert_eq!(store.get(60).await.map(|r| r.id), Some(60));
        assert!(store.get(2).await.is_none());
        assert!(store.get(3).await.is_none());
        assert!(store.get(4).await.is_none());
        assert!(store.get(7).await.is_none());
    }

    #[tokio::test]
    async fn file_store_empty_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePoemStore::new(dir.path(), DEFAULT_SCAN_LIMIT);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_missing_dir_fails_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePoemStore::new(dir.path().join("absent"), DEFAULT_SCAN_LIMIT);
        assert!(matches!(store.list_all().await, Err(Errors::StoreEnumeration(_))));
        assert!(store.get(1).await.is_none());

        let file = dir.path().join("plain");
        fs::write(&file, "x").unwrap();
        let store = FilePoemStore::new(file, DEFAULT_SCAN_LIMIT);
        assert!(matches!(store.list_all().await, Err(Errors::StoreEnumeration(_))));
    }

    // ----------------------------------------------------------------------
    // A static file host that serves /poems/poem-<id>.json from a fixed map.
    // ----------------------------------------------------------------------
    struct StubHost {
        base_url: String,
        shutdown_tx: mpsc::Sender<()>,
        handle: thread::JoinHandle<()>,
    }

    impl StubHost {
        fn start(files: Vec<(&'static str, u16, String)>) -> Self {
            Self::start_with_delay(files, Duration::ZERO)
        }

        // Each response is held back by `delay` on its own thread.
        fn start_with_delay(files: Vec<(&'static str, u16, String)>, delay: Duration) -> Self {
            let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
            let base_url = format!("http://{}/poems", server.server_addr());
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let handle = thread::spawn(move || loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                let url = request.url().to_string();
                let response = match files.iter().find(|(path, _, _)| *path == url) {
                    Some((_, status, body)) => {
                        tiny_http::Response::from_string(body.clone()).with_status_code(*status)
                    },
                    None => tiny_http::Response::from_string("not found").with_status_code(404),
                };
                if delay.is_zero() {
                    let _ = request.respond(response);
                } else {
                    thread::spawn(move || {
                        thread::sleep(delay);
                        let _ = request.respond(response);
                    });
                }
            });

            Self {base_url, shutdown_tx, handle}
        }

        fn stop(self) {
            let _ = self.shutdown_tx.send(());
            let _ = self.handle.join();
        }
    }

    #[tokio::test]
    async fn http_store_skips_failed_fetches() {
        let good_1 = serde_json::to_string(&record(1, "Static", "noise and hum")).unwrap();
        let good_3 = serde_json::to_string(&record(3, "Echo", "silence")).unwrap();
        let host = StubHost::start(vec![
            ("/poems/poem-1.json", 200, good_1),
            ("/poems/poem-2.json", 500, "boom".to_string()),
            ("/poems/poem-3.json", 200, good_3),
            ("/poems/poem-4.json", 200, "<html>not a poem</html>".to_string()),
        ]);

        let store = HttpPoemStore::new(&host.base_url, 10, Duration::from_secs(5)).unwrap();
        let all = store.list_all().await.unwrap();
        assert_eq!(ids(&all), vec![1, 3]);
        assert_eq!(store.get(3).await.map(|r| r.title), Some("Echo".to_string()));
        assert!(store.get(2).await.is_none());
        assert!(store.get(4).await.is_none());
        assert!(store.get(999).await.is_none());

        host.stop();
    }

    #[tokio::test]
    async fn http_store_stalled_host_times_out() {
        let good_1 = serde_json::to_string(&record(1, "Static", "noise and hum")).unwrap();
        let host = StubHost::start_with_delay(
            vec![("/poems/poem-1.json", 200, good_1)], Duration::from_secs(3));

        let store = HttpPoemStore::new(&host.base_url, 5, Duration::from_millis(300)).unwrap();
        let started = Instant::now();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(store.get(1).await.is_none());
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());

        host.stop();
    }

    #[tokio::test]
    async fn http_store_trailing_slash_is_ignored() {
        let store = HttpPoemStore::new("http://localhost:8080/static/poems/", 50,
                                       Duration::from_secs(1)).unwrap();
        assert_eq!(store.poem_url(4), "http://localhost:8080/static/poems/poem-4.json");
    }

    #[tokio::test]
    async fn http_store_unreachable_host_lists_nothing() {
        // Nothing listens on the discard port in the test environment.
        let store = HttpPoemStore::new("http://127.0.0.1:9/poems", 3,
                                       Duration::from_millis(500)).unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(store.get(1).await.is_none());
    }
}
