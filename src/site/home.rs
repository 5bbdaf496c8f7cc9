#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::web::Data;
use poem::{handler, Request, Response};

use crate::site::{render_page, SiteCtx};
use crate::utils::archive_utils::debug_request;

// ---------------------------------------------------------------------------
// home_page:
// ---------------------------------------------------------------------------
/** The homepage bio. */
#[handler]
pub async fn home_page(http_req: &Request, Data(site): Data<&Arc<SiteCtx>>) -> Response {
    debug_request(http_req, "home");

    render_page(site, site.renderer.site_name(), "", site.renderer.home_fragment())
}
