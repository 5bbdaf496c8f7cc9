#![forbid(unsafe_code)]

use serde::Serialize;
use tera::{Context, Tera};

use crate::utils::errors::Errors;
use crate::utils::poem_types::PoemRecord;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Template names end in .html so that tera autoescapes every substitution
// that isn't explicitly marked safe.
const BASE_TEMPLATE      : &str = "base.html";
const SIDEBAR_TEMPLATE   : &str = "sidebar.html";
const HOME_TEMPLATE      : &str = "home.html";
const SEARCH_TEMPLATE    : &str = "search.html";
const POEM_TEMPLATE      : &str = "poem.html";
const POETRY_TEMPLATE    : &str = "poetry.html";
const NOT_FOUND_TEMPLATE : &str = "not_found.html";

// Search result previews.
pub const PREVIEW_CHARS  : usize = 200;
pub const PREVIEW_MARKER : &str = "...";

// ---------------------------------------------------------------------------
// SearchHit:
// ---------------------------------------------------------------------------
#[derive(Debug, Serialize)]
struct SearchHit<'a> {
    id: u32,
    title: &'a str,
    date: &'a str,
    location: &'a str,
    preview: String,
}

// ---------------------------------------------------------------------------
// Renderer:
// ---------------------------------------------------------------------------
/** Composes full pages from the page shell, the sidebar and a content
 * fragment.  The templates are compiled into the binary and parsed once.
 */
#[derive(Debug)]
pub struct Renderer {
    tera: Tera,
    site_name: String,
    asset_prefix: String,
}

impl Renderer {
    pub fn new(site_name: &str, asset_prefix: &str) -> Result<Self, Errors> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (BASE_TEMPLATE,      include_str!("../../templates/base.html")),
            (SIDEBAR_TEMPLATE,   include_str!("../../templates/sidebar.html")),
            (HOME_TEMPLATE,      include_str!("../../templates/home.html")),
            (SEARCH_TEMPLATE,    include_str!("../../templates/search.html")),
            (POEM_TEMPLATE,      include_str!("../../templates/poem.html")),
            (POETRY_TEMPLATE,    include_str!("../../templates/poetry.html")),
            (NOT_FOUND_TEMPLATE, include_str!("../../templates/not_found.html")),
        ])?;

        Ok(Self {
            tera,
            site_name: site_name.to_string(),
            asset_prefix: asset_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    /** Page title with the site name appended, ex: "All Poems - <site>". */
    pub fn page_title(&self, page: &str) -> String {
        format!("{} - {}", page, self.site_name)
    }

    // -----------------------------------------------------------------------
    // render_page:
    // -----------------------------------------------------------------------
    /** Render the sidebar with the active query, then embed it and the
     * content fragment in the page shell.  The fragment is already markup
     * and is inserted verbatim; the title and query are escaped.
     */
    pub fn render_page(&self, title: &str, sidebar_query: &str, content: &str)
    -> Result<String, Errors> {
        let mut ctx = Context::new();
        ctx.insert("site_name", &self.site_name);
        ctx.insert("query", sidebar_query);
        let sidebar = self.tera.render(SIDEBAR_TEMPLATE, &ctx)?;

        let mut ctx = Context::new();
        ctx.insert("title", title);
        ctx.insert("asset_prefix", &self.asset_prefix);
        ctx.insert("sidebar", &sidebar);
        ctx.insert("content", content);
        Ok(self.tera.render(BASE_TEMPLATE, &ctx)?)
    }

    // -----------------------------------------------------------------------
    // Content fragments:
    // -----------------------------------------------------------------------
    pub fn home_fragment(&self) -> Result<String, Errors> {
        Ok(self.tera.render(HOME_TEMPLATE, &Context::new())?)
    }

    pub fn search_fragment(&self, query: &str, results: &[PoemRecord]) -> Result<String, Errors> {
        let hits: Vec<SearchHit> = results.iter()
            .map(|p| SearchHit {
                id: p.id,
                title: &p.title,
                date: &p.date,
                location: &p.location,
                preview: preview(&p.content),
            })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("query", query);
        ctx.insert("hits", &hits);
        Ok(self.tera.render(SEARCH_TEMPLATE, &ctx)?)
    }

    pub fn poem_fragment(&self, poem: &PoemRecord) -> Result<String, Errors> {
        let mut ctx = Context::new();
        ctx.insert("poem", poem);
        ctx.insert("stanzas", &stanzas(&poem.content));
        Ok(self.tera.render(POEM_TEMPLATE, &ctx)?)
    }

    pub fn listing_fragment(&self, poems: &[PoemRecord]) -> Result<String, Errors> {
        let mut ctx = Context::new();
        ctx.insert("poems", poems);
        Ok(self.tera.render(POETRY_TEMPLATE, &ctx)?)
    }

    pub fn not_found_fragment(&self) -> Result<String, Errors> {
        Ok(self.tera.render(NOT_FOUND_TEMPLATE, &Context::new())?)
    }
}

// ***************************************************************************
//                             Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// preview:
// ---------------------------------------------------------------------------
/** The first PREVIEW_CHARS characters of the content followed by the marker,
 * or the content unchanged when it is no longer than that.  Characters are
 * counted as unicode scalar values so multibyte text is never split.
 */
pub fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &content[..cut], PREVIEW_MARKER),
        None => content.to_string(),
    }
}

// ---------------------------------------------------------------------------
// stanzas:
// ---------------------------------------------------------------------------
/** Split a poem body into stanzas of lines.  Blank lines separate stanzas;
 * runs of blank lines count once.
 */
pub fn stanzas(content: &str) -> Vec<Vec<&str>> {
    let mut out: Vec<Vec<&str>> = vec![];
    let mut current: Vec<&str> = vec![];
    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
