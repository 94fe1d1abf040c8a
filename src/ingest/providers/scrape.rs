// src/ingest/providers/scrape.rs
//! Headline extraction from a rendered homepage.
//!
//! Rules use a small CSS-like subset: whitespace-separated descendant steps, each a
//! tag name, `.class`, `[attr]` / `[attr='value']`, or a combination
//! (`article h2 a`, `.article-title a`, `[data-test='article-title']`). The final
//! step either is an `<a>` or contains one; its `href` and text form the link.
//!
//! This is a regex scanner, not an HTML parser. It tolerates unclosed tags by
//! treating the rest of the document as the element body.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use crate::ingest::clean_text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedLink {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Step {
    tag: Option<String>,
    class: Option<String>,
    attr: Option<(String, Option<String>)>,
}

/// Parsed extraction rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    steps: Vec<Step>,
}

static RE_STEP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^([a-zA-Z][a-zA-Z0-9-]*)?(?:\.([A-Za-z0-9_-]+))?(?:\[([A-Za-z0-9_:-]+)(?:=['"]?([^'"\]]*)['"]?)?\])?$"#,
    )
    .expect("static step regex")
});

static RE_OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<([a-zA-Z][a-zA-Z0-9-]*)(\s[^>]*)?>").expect("static tag regex"));

/// Opening or closing tag of any name; `close_of` filters by name.
static RE_ANY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9-]*)\b[^>]*>").expect("static any-tag regex"));

static RE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("static attr regex")
});

impl Selector {
    pub fn parse(rule: &str) -> Option<Self> {
        let mut steps = Vec::new();
        for tok in rule.split_whitespace() {
            let caps = RE_STEP.captures(tok)?;
            let step = Step {
                tag: caps.get(1).map(|m| m.as_str().to_ascii_lowercase()),
                class: caps.get(2).map(|m| m.as_str().to_string()),
                attr: caps.get(3).map(|m| {
                    (
                        m.as_str().to_ascii_lowercase(),
                        caps.get(4).map(|v| v.as_str().to_string()),
                    )
                }),
            };
            if step == Step::default() {
                return None;
            }
            steps.push(step);
        }
        if steps.is_empty() {
            None
        } else {
            Some(Self { steps })
        }
    }

    /// All links matched by this selector, in document order.
    pub fn select_links(&self, html: &str) -> Vec<ScrapedLink> {
        let mut scopes: Vec<&str> = vec![html];
        let mut last: Vec<Element<'_>> = Vec::new();

        for step in &self.steps {
            last = scopes
                .iter()
                .flat_map(|&scope| find_elements(scope, step))
                .collect();
            scopes = last.iter().map(|e| e.inner).collect();
        }

        last.iter().filter_map(Element::as_link).collect()
    }
}

#[derive(Debug)]
struct Element<'a> {
    tag: String,
    attrs: HashMap<String, String>,
    inner: &'a str,
}

impl Element<'_> {
    fn as_link(&self) -> Option<ScrapedLink> {
        if self.tag == "a" {
            return Some(ScrapedLink {
                url: self.attrs.get("href").cloned().unwrap_or_default(),
                title: clean_text(self.inner),
            });
        }
        // Container step: use the first anchor inside it.
        let a = find_elements(
            self.inner,
            &Step {
                tag: Some("a".into()),
                ..Step::default()
            },
        )
        .into_iter()
        .next()?;
        a.as_link()
    }
}

fn parse_attrs(raw: &str) -> HashMap<String, String> {
    RE_ATTR
        .captures_iter(raw)
        .map(|c| {
            let v = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| html_escape::decode_html_entities(m.as_str()).to_string())
                .unwrap_or_default();
            (c[1].to_ascii_lowercase(), v)
        })
        .collect()
}

fn step_matches(step: &Step, tag: &str, attrs: &HashMap<String, String>) -> bool {
    if let Some(t) = &step.tag {
        if t != tag {
            return false;
        }
    }
    if let Some(cls) = &step.class {
        let has = attrs
            .get("class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == cls));
        if !has {
            return false;
        }
    }
    if let Some((name, want)) = &step.attr {
        match (attrs.get(name), want) {
            (None, _) => return false,
            (Some(v), Some(w)) if v != w => return false,
            _ => {}
        }
    }
    true
}

fn find_elements<'a>(scope: &'a str, step: &Step) -> Vec<Element<'a>> {
    let mut out = Vec::new();
    for caps in RE_OPEN_TAG.captures_iter(scope) {
        let tag = caps[1].to_ascii_lowercase();
        let raw_attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let attrs = parse_attrs(raw_attrs);
        if !step_matches(step, &tag, &attrs) {
            continue;
        }
        let open_end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let inner = if raw_attrs.trim_end().ends_with('/') {
            ""
        } else {
            &scope[open_end..close_of(scope, open_end, &tag)]
        };
        out.push(Element { tag, attrs, inner });
    }
    out
}

/// Byte offset where the body of `<tag>` opened at `from` ends. Depth-aware for
/// same-name nesting; falls back to end of scope when the tag never closes.
fn close_of(scope: &str, from: usize, tag: &str) -> usize {
    let mut depth = 1usize;
    let same_name = RE_ANY_TAG
        .captures_iter(&scope[from..])
        .filter(|c| c[2].eq_ignore_ascii_case(tag));
    for m in same_name {
        let whole = m.get(0).map(|x| (x.start(), x.as_str())).unwrap_or((0, ""));
        if &m[1] == "/" {
            depth -= 1;
            if depth == 0 {
                return from + whole.0;
            }
        } else if !whole.1.ends_with("/>") {
            depth += 1;
        }
    }
    scope.len()
}

/// Resolve scraped hrefs against the source homepage with standard URL joining, so
/// `story`, `../story` and `?page=2` behave as a browser would. `None` for
/// non-navigational links and anything that does not end up http(s).
pub fn resolve_url(homepage: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }
    let base = Url::parse(homepage.trim()).ok()?;
    let joined = base.join(href).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// Apply `rules` in order; the first rule matching any element wins.
/// Returns at most `cap` links with both a URL and a title.
pub fn extract_links(html: &str, rules: &[String], homepage: &str, cap: usize) -> Vec<ScrapedLink> {
    for rule in rules {
        let Some(sel) = Selector::parse(rule) else {
            debug!(rule = %rule, "skipping unparsable scrape rule");
            continue;
        };
        let links = sel.select_links(html);
        if links.is_empty() {
            continue;
        }
        debug!(rule = %rule, matched = links.len(), "scrape rule matched");
        return links
            .into_iter()
            .take(cap)
            .filter_map(|l| {
                let url = resolve_url(homepage, &l.url)?;
                (!l.title.is_empty()).then_some(ScrapedLink { url, title: l.title })
            })
            .collect();
    }
    Vec::new()
}
