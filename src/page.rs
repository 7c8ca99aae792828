//! Tokenized page records: the template side produced once at training time,
//! and the extraction side rebuilt for every page to be scraped.

use serde_json::{Map, Value};

use crate::htmlpage::{Fragment, HtmlPage, HtmlPageRegion, HtmlTag};
use crate::token::Token;

/// A token index range. The end is absent for "ignore beneath" regions that
/// stay open until a structural rule bounds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRegion {
    pub start_index: usize,
    pub end_index: Option<usize>,
}

impl PageRegion {
    pub fn bounded(start_index: usize, end_index: usize) -> Self {
        Self {
            start_index,
            end_index: Some(end_index),
        }
    }

    pub fn open_ended(start_index: usize) -> Self {
        Self {
            start_index,
            end_index: None,
        }
    }
}

/// Literal text bounding a partial annotation whose true boundary falls
/// inside a text node. Empty strings impose no boundary on that side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationText {
    /// Text immediately before the annotated value.
    pub start_text: String,
    /// Text immediately after the annotated value.
    pub follow_text: String,
}

/// A template time label binding a token range to output fields.
#[derive(Debug, Clone)]
pub struct AnnotationTag {
    /// Token index of the opening tag.
    pub start_index: usize,
    /// Token index of the closing tag, equal to `start_index` for a tag
    /// without a closing counterpart.
    pub end_index: usize,
    /// Field bound to the tag's text content.
    pub surrounds_attribute: Option<String>,
    /// (html attribute, field) pairs bound to the tag's attributes.
    pub tag_attributes: Vec<(String, String)>,
    /// Set for partial annotations: the indices mark the enclosing tags and
    /// the real boundary is recovered from this text at extraction time.
    pub annotation_text: Option<AnnotationText>,
    /// Groups several annotations into one repeatable sub record.
    pub variant_id: Option<u32>,
    /// Free form metadata from the descriptor, passed through unexamined.
    pub metadata: Map<String, Value>,
}

impl AnnotationTag {
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Self {
            start_index,
            end_index,
            surrounds_attribute: None,
            tag_attributes: Vec::new(),
            annotation_text: None,
            variant_id: None,
            metadata: Map::new(),
        }
    }

    /// The annotated token range.
    pub fn region(&self) -> PageRegion {
        PageRegion::bounded(self.start_index, self.end_index)
    }
}

/// An annotated example page, parsed once at training time and immutable
/// afterwards for the lifetime of the trained extractor.
#[derive(Debug, Clone)]
pub struct TemplatePage {
    pub htmlpage: HtmlPage,
    pub page_tokens: Vec<Token>,
    /// Annotations in document order (sorted by opening tag position).
    pub annotations: Vec<AnnotationTag>,
    /// Token ranges excluded from both matching and output.
    pub ignored_regions: Vec<PageRegion>,
    /// Extra field names that must co-occur for a record to count as valid,
    /// consumed by the caller layer, never by the extraction tree itself.
    pub extra_required_fields: Vec<String>,
}

impl TemplatePage {
    pub fn new(
        htmlpage: HtmlPage,
        page_tokens: Vec<Token>,
        mut annotations: Vec<AnnotationTag>,
        mut ignored_regions: Vec<PageRegion>,
        extra_required_fields: Vec<String>,
    ) -> Self {
        annotations.sort_by_key(|a| a.start_index);
        ignored_regions.sort_by_key(|r| r.start_index);
        Self {
            htmlpage,
            page_tokens,
            annotations,
            ignored_regions,
            extra_required_fields,
        }
    }
}

/// A page to be scraped: tokens plus, for every token, the index of its
/// fragment in the owning page, the only way token ranges get turned back
/// into real output text. Built fresh per page, discarded after extraction.
#[derive(Debug, Clone)]
pub struct ExtractionPage {
    pub htmlpage: HtmlPage,
    pub page_tokens: Vec<Token>,
    token_fragment_indexes: Vec<usize>,
}

impl ExtractionPage {
    pub(crate) fn new(
        htmlpage: HtmlPage,
        page_tokens: Vec<Token>,
        token_fragment_indexes: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(page_tokens.len(), token_fragment_indexes.len());
        Self {
            htmlpage,
            page_tokens,
            token_fragment_indexes,
        }
    }

    /// The page region covered by the tokens `start..=end`, including the
    /// tags at both indexes.
    pub fn htmlpage_region(&self, start_token: usize, end_token: usize) -> HtmlPageRegion<'_> {
        let from = self.token_fragment_indexes[start_token];
        let to = self.token_fragment_indexes[end_token];
        self.htmlpage.region(from, to)
    }

    /// The page region strictly between the tokens `start` and `end`,
    /// excluding the tags at both indexes.
    pub fn htmlpage_region_inside(&self, start_token: usize, end_token: usize) -> HtmlPageRegion<'_> {
        if start_token >= end_token {
            return self.htmlpage.region(1, 0);
        }
        let from = self.token_fragment_indexes[start_token] + 1;
        let to = self.token_fragment_indexes[end_token];
        if to == 0 {
            return self.htmlpage.region(1, 0);
        }
        self.htmlpage.region(from, to - 1)
    }

    /// The tag fragment behind a token index.
    pub fn htmlpage_tag(&self, token_index: usize) -> Option<&HtmlTag> {
        match self.htmlpage.parsed_body.get(self.token_fragment_indexes[token_index])? {
            Fragment::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}
