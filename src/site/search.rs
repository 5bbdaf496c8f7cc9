#![forbid(unsafe_code)]

use std::sync::Arc;

use log::error;
use poem::web::{Data, Query};
use poem::{handler, Request, Response};

use crate::site::{make_http_500, render_page, SiteCtx};
use crate::utils::archive_utils::debug_request;
use crate::utils::search::search;

const QUERY_PARM : &str = "q";

// ---------------------------------------------------------------------------
// search_page:
// ---------------------------------------------------------------------------
/** Search every poem for the q parameter.  An empty query short-circuits to
 * an empty result without reading the store.  When q is repeated the first
 * value wins.
 */
#[handler]
pub async fn search_page(http_req: &Request, Query(pairs): Query<Vec<(String, String)>>,
                         Data(site): Data<&Arc<SiteCtx>>) -> Response {
    debug_request(http_req, "search");
    let query = first_query(pairs);

    let results = if query.is_empty() {
        vec![]
    } else {
        match site.store.list_all().await {
            Ok(all) => search(&query, &all),
            Err(e) => {
                error!("ERROR: search for '{}' failed: {}", query, e);
                return make_http_500();
            }
        }
    };

    render_page(site, &site.renderer.page_title("Search Results"), &query,
                site.renderer.search_fragment(&query, &results))
}

// ---------------------------------------------------------------------------
// first_query:
// ---------------------------------------------------------------------------
fn first_query(pairs: Vec<(String, String)>) -> String {
    pairs.into_iter()
        .find(|(name, _)| name == QUERY_PARM)
        .map(|(_, value)| value)
        .unwrap_or_default()
}
