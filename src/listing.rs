//! Extraction of course and file links from portal pages.
//!
//! The portal marks each interesting page region with a CSS class. Those
//! markers, and the conventions for which anchors inside them matter, are
//! confined to this module so a portal redesign only has to be followed here.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::course::CourseCode;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static SUBCATEGORIES: LazyLock<Selector> = LazyLock::new(|| selector("div.subcategories"));
static COURSE_CATEGORY_TREE: LazyLock<Selector> =
    LazyLock::new(|| selector("div.course_category_tree"));
static TOPICS: LazyLock<Selector> = LazyLock::new(|| selector("ul.topics"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// A marked page region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Course index: one anchor per course, text `"<CODE> - <Name>"`.
    Subcategories,
    /// Course page: file-tree section links.
    CourseCategoryTree,
    /// Section page: list of file links.
    Topics,
}

impl Region {
    fn selector(self) -> &'static Selector {
        match self {
            Self::Subcategories => &SUBCATEGORIES,
            Self::CourseCategoryTree => &COURSE_CATEGORY_TREE,
            Self::Topics => &TOPICS,
        }
    }
}

/// An anchor found inside a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub text: String,
    pub href: Option<String>,
    pub has_class: bool,
}

impl Anchor {
    fn from_element(el: ElementRef<'_>) -> Self {
        Self {
            text: el.text().collect(),
            href: el.value().attr("href").map(str::to_string),
            has_class: el.value().attr("class").is_some(),
        }
    }

    /// Resolves the href against the page it was found on.
    pub fn resolve(&self, page: &Url) -> Option<Url> {
        let href = self.href.as_deref()?;
        match page.join(href) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!("ignoring unresolvable href {href:?}: {e}");
                None
            }
        }
    }
}

/// Returns every anchor inside the first element marking `region`.
///
/// A page without the region yields no anchors.
pub fn anchors_in(html: &str, region: Region) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    let Some(container) = document.select(region.selector()).next() else {
        debug!("no {region:?} region on page");
        return Vec::new();
    };
    container.select(&ANCHOR).map(Anchor::from_element).collect()
}

/// A course matched on the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseEntry {
    pub code: CourseCode,
    pub name: String,
    pub link: Url,
}

impl CourseEntry {
    /// Name of the directory the course is mirrored into.
    pub fn dir_name(&self) -> String {
        format!("{} - {}", self.code, self.name).replace(['/', '\\'], "_")
    }
}

/// Parses the course index, keeping only the courses in `wanted`.
///
/// Entries keep document order; when a code appears twice the later entry
/// replaces the earlier one in place.
pub fn parse_course_index(html: &str, page: &Url, wanted: &[CourseCode]) -> Vec<CourseEntry> {
    let mut entries: Vec<CourseEntry> = Vec::new();
    for anchor in anchors_in(html, Region::Subcategories) {
        let Some((code, name)) = anchor.text.split_once('-') else {
            continue;
        };
        let Some(code) = wanted.iter().find(|c| c.as_str() == code.trim()) else {
            continue;
        };
        let Some(link) = anchor.resolve(page) else {
            continue;
        };

        let entry = CourseEntry {
            code: code.clone(),
            name: name.trim().to_string(),
            link,
        };
        match entries.iter_mut().find(|e| e.code == entry.code) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }
    entries
}

/// File-tree section links on a course page: anchors that carry a class.
pub fn section_links(html: &str, page: &Url) -> Vec<Url> {
    anchors_in(html, Region::CourseCategoryTree)
        .iter()
        .filter(|a| a.has_class)
        .filter_map(|a| a.resolve(page))
        .collect()
}

/// File links on a section page.
pub fn file_links(html: &str, page: &Url) -> Vec<Url> {
    anchors_in(html, Region::Topics)
        .iter()
        .filter_map(|a| a.resolve(page))
        .collect()
}
