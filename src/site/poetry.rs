#![forbid(unsafe_code)]

use std::sync::Arc;

use log::error;
use poem::web::Data;
use poem::{handler, Request, Response};

use crate::site::{make_http_500, render_page, SiteCtx};
use crate::utils::archive_utils::debug_request;

// ---------------------------------------------------------------------------
// poetry_page:
// ---------------------------------------------------------------------------
/** Every poem in the archive in ascending id order.  Failing to enumerate
 * the store is the only error; an empty archive is an ordinary page.
 */
#[handler]
pub async fn poetry_page(http_req: &Request, Data(site): Data<&Arc<SiteCtx>>) -> Response {
    debug_request(http_req, "poetry");

    let poems = match site.store.list_all().await {
        Ok(p) => p,
        Err(e) => {
            error!("ERROR: {}", e);
            return make_http_500();
        }
    };

    render_page(site, &site.renderer.page_title("All Poems"), "",
                site.renderer.listing_fragment(&poems))
}
