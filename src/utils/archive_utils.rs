#![forbid(unsafe_code)]

use path_absolutize::Absolutize;
use std::ops::Deref;
use std::path::Path;

use poem::Request;
use log::{debug, LevelFilter};

// ***************************************************************************
// GENERAL PUBLIC FUNCTIONS
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_absolute_path:
// ---------------------------------------------------------------------------
/** Replace tilde (~) and environment variable values in a path name and
 * then construct the absolute path name.  Unlike canonicalize, absolutize
 * does not care whether the file exists, which matters for directories we
 * are about to create.
 *
 * On any expansion failure the original path is returned unchanged.
 */
pub fn get_absolute_path(path: &str) -> String {
    let s = match shellexpand::full(path) {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };

    let p = Path::new(s.deref());
    let p1 = match p.absolutize() {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };
    match p1.to_str() {
        Some(x) => x.to_owned(),
        None => path.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// join_url_path:
// ---------------------------------------------------------------------------
/** Join a base url or path prefix and a relative path with exactly one
 * slash between them.
 */
pub fn join_url_path(base: &str, rel: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rel.trim_start_matches('/'))
}

// ---------------------------------------------------------------------------
// debug_request:
// ---------------------------------------------------------------------------
/** Dump http request information to the log.  The page name prefixes the
 * record so that one log line identifies the handler that received it.
 */
pub fn debug_request(http_req: &Request, page: &str) {
    // Check that debug or higher logging is in effect.
    if log::max_level() < LevelFilter::Debug {
        return;
    }

    let mut s = format!("\n  Page: {}\n", page);

    let uri = http_req.uri();
    s += format!("  URI: {:?}\n", uri).as_str();

    for v in http_req.headers().iter() {
        s += format!("  Header: {} = {:?} \n", v.0, v.1).as_str();
    }

    if let Some(q) = uri.query() {
        s += format!("  Query Parameters: {:?}\n", q).as_str();
    } else {
        s += "  * No Query Parameters\n";
    }

    debug!("{}", s);
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_stay_put() {
        assert_eq!(get_absolute_path("/srv/archive/public"), "/srv/archive/public");
        assert_eq!(get_absolute_path("/srv/archive/../public"), "/srv/public");
    }

    #[test]
    fn relative_paths_become_absolute() {
        let p = get_absolute_path("public/poems");
        assert!(Path::new(&p).is_absolute());
        assert!(p.ends_with("public/poems"));
    }

    #[test]
    fn url_paths_join_with_one_slash() {
        assert_eq!(join_url_path("http://localhost:8080/static/", "/poems"),
                   "http://localhost:8080/static/poems");
        assert_eq!(join_url_path("/static", "poems"), "/static/poems");
    }
}
