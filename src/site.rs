#![forbid(unsafe_code)]

use std::sync::Arc;

use log::error;
use poem::endpoint::StaticFilesEndpoint;
use poem::http::StatusCode;
use poem::web::Html;
use poem::{get, Endpoint, EndpointExt, IntoResponse, Response, Route};

use crate::utils::errors::Errors;
use crate::utils::poem_store::PoemStore;
use crate::utils::render::Renderer;

pub mod home;
pub mod poem_get;
pub mod poetry;
pub mod search;

// Deliberately static: rendering may be what failed.
const SERVER_ERROR_HTML : &str =
    "<!DOCTYPE html>\n<html><head><title>Server Error</title></head>\
     <body><p>The server was unable to complete your request.</p></body></html>\n";
const NOT_FOUND_HTML    : &str =
    "<!DOCTYPE html>\n<html><head><title>Not Found</title></head>\
     <body><p>Not Found</p></body></html>\n";

// ***************************************************************************
//                               Site Context
// ***************************************************************************
// ---------------------------------------------------------------------------
// SiteCtx:
// ---------------------------------------------------------------------------
/** Everything a page handler needs.  Built once at startup and shared
 * read-only by every request.
 */
pub struct SiteCtx {
    pub store: Arc<dyn PoemStore>,
    pub renderer: Renderer,
}

impl SiteCtx {
    pub fn new(store: Arc<dyn PoemStore>, renderer: Renderer) -> Self {
        Self {store, renderer}
    }
}

// ***************************************************************************
//                               Route Table
// ***************************************************************************
// ---------------------------------------------------------------------------
// build_routes:
// ---------------------------------------------------------------------------
/** The site's route table.  Exact page routes are matched before the poem
 * and asset prefixes; anything else is 404.
 */
pub fn build_routes(site: Arc<SiteCtx>, assets_dir: &str, asset_prefix: &str) -> impl Endpoint {
    Route::new()
        .at("/", get(home::home_page))
        .at("/search", get(search::search_page))
        .at("/poetry", get(poetry::poetry_page))
        .at("/poem/:id", get(poem_get::poem_page))
        .nest(asset_prefix, StaticFilesEndpoint::new(assets_dir))
        .data(site)
}

// ***************************************************************************
//                            Response Helpers
// ***************************************************************************
// ---------------------------------------------------------------------------
// render_page:
// ---------------------------------------------------------------------------
/** Wrap a fragment in the page shell.  Any render failure along the way is
 * logged and becomes a generic 500.
 */
pub fn render_page(site: &SiteCtx, title: &str, query: &str,
                   fragment: Result<String, Errors>) -> Response {
    let page = fragment.and_then(|f| site.renderer.render_page(title, query, &f));
    match page {
        Ok(html) => make_http_200(html),
        Err(e) => {
            error!("ERROR: {}", e);
            make_http_500()
        }
    }
}

pub fn make_http_200(html: String) -> Response {
    Html(html).into_response()
}

/** A not-found page in the site layout, or a bare one if that fails. */
pub fn make_http_404(site: &SiteCtx) -> Response {
    let page = site.renderer.not_found_fragment()
        .and_then(|f| site.renderer.render_page(&site.renderer.page_title("Not Found"), "", &f));
    match page {
        Ok(html) => Html(html).with_status(StatusCode::NOT_FOUND).into_response(),
        Err(e) => {
            error!("ERROR: {}", e);
            Html(NOT_FOUND_HTML).with_status(StatusCode::NOT_FOUND).into_response()
        }
    }
}

pub fn make_http_500() -> Response {
    Html(SERVER_ERROR_HTML).with_status(StatusCode::INTERNAL_SERVER_ERROR).into_response()
}
