//! `Link` header parsing for paginated endpoints
//!
//! GitHub paginates with RFC 8288 links:
//!
//! ```text
//! <https://api.github.com/repositories/1/stargazers?per_page=100&page=2>; rel="next",
//! <https://api.github.com/repositories/1/stargazers?per_page=100&page=5>; rel="last"
//! ```
//!
//! Only the `last` target matters here: the aggregator fans out every page
//! up to it at once instead of walking `next` links.

use reqwest::Url;

use crate::error::{Error, Result};

/// Page number of the `rel="last"` link.
pub fn last_page(link: &str) -> Result<u32> {
    for entry in link.split(',') {
        let mut parts = entry.split(';');
        let target = parts.next().unwrap_or_default().trim();
        if !parts.any(|param| is_rel_last(param.trim())) {
            continue;
        }

        let target = target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .ok_or_else(|| Error::Link(format!("link target not enclosed in <>: {target}")))?;
        let url = Url::parse(target).map_err(|e| Error::Link(format!("{target}: {e}")))?;
        let page = url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| Error::Link(format!("no page parameter in {target}")))?;
        return page
            .parse()
            .map_err(|e| Error::Link(format!("page {page:?} is not a number: {e}")));
    }
    Err(Error::Link(format!("no rel=\"last\" entry in {link:?}")))
}

fn is_rel_last(param: &str) -> bool {
    param
        .strip_prefix("rel=")
        .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "last"))
        .unwrap_or(false)
}
