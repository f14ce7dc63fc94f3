//! Cursor pagination for Okta list endpoints.
//!
//! Okta returns the next page as a `Link: <...?after=CURSOR>; rel="next"`
//! response header. The client turns that into an opaque cursor which the
//! caller passes back through [`ListParams::after`].

/// Query parameters accepted by list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// SCIM-style filter expression (`status eq "ACTIVE"`).
    pub filter: Option<String>,
    /// Search expression, evaluated against the search index.
    pub search: Option<String>,
    /// Simple prefix query on common fields.
    pub q: Option<String>,
    /// Page size.
    pub limit: Option<u32>,
    /// Cursor of the page to fetch.
    pub after: Option<String>,
}

impl ListParams {
    #[must_use]
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Same parameters pointed at another page.
    #[must_use]
    pub fn page(&self, after: Option<String>) -> Self {
        Self {
            after,
            ..self.clone()
        }
    }

    /// Encode as query pairs, skipping unset values.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(f) = &self.filter {
            pairs.push(("filter", f.clone()));
        }
        if let Some(s) = &self.search {
            pairs.push(("search", s.clone()));
        }
        if let Some(q) = &self.q {
            pairs.push(("q", q.clone()));
        }
        if let Some(l) = self.limit {
            pairs.push(("limit", l.to_string()));
        }
        if let Some(a) = &self.after {
            pairs.push(("after", a.clone()));
        }
        pairs
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor of the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Extract the `rel="next"` URL from a `Link` header.
#[must_use]
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|s| {
            let s = s.trim();
            s == "rel=\"next\"" || s == "rel=next"
        });
        if is_next && target.starts_with('<') && target.ends_with('>') {
            Some(target[1..target.len() - 1].to_string())
        } else {
            None
        }
    })
}

/// Extract the `after` cursor from a next-page URL.
#[must_use]
pub fn cursor_from_url(url: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "after" {
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}
