#![forbid(unsafe_code)]

use std::sync::Arc;

use log::debug;
use poem::web::{Data, Path};
use poem::{handler, Request, Response};

use crate::site::{make_http_404, render_page, SiteCtx};
use crate::utils::archive_utils::debug_request;
use crate::utils::errors::Errors;

// ---------------------------------------------------------------------------
// poem_page:
// ---------------------------------------------------------------------------
/** A single poem.  The path segment may carry an extension, so /poem/7 and
 * /poem/7.json address the same record.
 */
#[handler]
pub async fn poem_page(http_req: &Request, Path(segment): Path<String>,
                       Data(site): Data<&Arc<SiteCtx>>) -> Response {
    debug_request(http_req, "poem");

    let id = match parse_poem_segment(&segment) {
        Some(id) => id,
        None => {
            debug!("Not a poem id: '{}'", segment);
            return make_http_404(site);
        }
    };

    let poem = match site.store.get(id).await {
        Some(p) => p,
        None => {
            debug!("{}", Errors::PoemNotFound(id));
            return make_http_404(site);
        }
    };

    render_page(site, &site.renderer.page_title(&poem.title), "",
                site.renderer.poem_fragment(&poem))
}

// ---------------------------------------------------------------------------
// parse_poem_segment:
// ---------------------------------------------------------------------------
/** Strip one trailing extension and parse what is left as a positive id.
 * Only ascii digits are accepted.
 */
pub fn parse_poem_segment(segment: &str) -> Option<u32> {
    let stem = match segment.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => segment,
    };
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match stem.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id),
    }
}
