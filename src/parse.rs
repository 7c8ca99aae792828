//! Template and extraction page builders.
//!
//! The template builder walks an annotated page's fragment stream once,
//! feeding every tag into the shared [`TokenDict`] and collecting the
//! annotations encoded in a reserved attribute. Open and close tags of the
//! same (possibly replaced) name are paired through per name stacks so
//! several annotations of the same tag name can be open at once. The
//! extraction builder is the trivial counterpart: it tokenizes against a
//! frozen dictionary and records which fragment each token came from.

use std::collections::BTreeMap;
use std::mem;

use fnv::FnvHashMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::SchabloneError;
use crate::htmlpage::{Fragment, HtmlPage, HtmlTag, HtmlTagType};
use crate::page::{AnnotationTag, AnnotationText, ExtractionPage, PageRegion, TemplatePage};
use crate::token::TokenDict;

/// The reserved attribute carrying an [`AnnotationDescriptor`] as JSON.
pub const ANNOTATION_ATTRIBUTE: &str = "data-annotate";

/// The wire schema of one annotation, as placed on a template tag by the
/// annotation front end.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnotationDescriptor {
    /// Binding source (an attribute name, or the text content key) to the
    /// output field it fills. Ordered so output is deterministic.
    pub annotations: BTreeMap<String, String>,
    /// The key in `annotations` that stands for the tag's text content.
    #[serde(rename = "text-content")]
    pub text_content: String,
    /// Non zero groups this annotation into a repeatable variant.
    pub variant: u32,
    /// Extra field names that must be present for a record to be valid.
    pub required: Vec<String>,
    /// True for annotations of raw highlighted text: the wrapping tag is
    /// not part of the page proper and is dropped from the token stream.
    pub generated: bool,
    /// Exclude this tag's full span from matching and output.
    pub ignore: bool,
    /// Exclude everything from this tag onward, end resolved structurally.
    #[serde(rename = "ignore-beneath")]
    pub ignore_beneath: bool,
    /// Tokenize this tag under a different name, so structurally
    /// equivalent widgets (`ul`/`li` vs `select`/`option`) align.
    pub replacement: Option<String>,
    /// Unexamined extra keys, carried through to the annotation.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Default for AnnotationDescriptor {
    fn default() -> Self {
        Self {
            annotations: BTreeMap::new(),
            text_content: "content".to_string(),
            variant: 0,
            required: Vec::new(),
            generated: false,
            ignore: false,
            ignore_beneath: false,
            replacement: None,
            metadata: Map::new(),
        }
    }
}

/// Read the annotation descriptor off a tag, if it carries one.
fn read_annotation(tag: &HtmlTag) -> Result<Option<AnnotationDescriptor>, SchabloneError> {
    let raw = match tag.attributes.get(ANNOTATION_ATTRIBUTE) {
        Some(Some(raw)) => raw,
        _ => return Ok(None),
    };
    // attribute values arrive entity escaped
    let raw = raw
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|error| SchabloneError::InvalidAnnotationDescriptor {
            tag: tag.tag.clone(),
            error,
        })
}

/// An annotation whose closing tag has not been seen yet.
#[derive(Debug)]
struct PendingAnnotation {
    start_index: usize,
    surrounds_attribute: Option<String>,
    tag_attributes: Vec<(String, String)>,
    annotation_text: Option<AnnotationText>,
    variant_id: Option<u32>,
    metadata: Map<String, Value>,
}

impl PendingAnnotation {
    fn from_descriptor(descriptor: &AnnotationDescriptor, start_index: usize) -> Self {
        let mut surrounds_attribute = None;
        let mut tag_attributes = Vec::new();
        for (source, field) in &descriptor.annotations {
            if *source == descriptor.text_content {
                surrounds_attribute = Some(field.clone());
            } else {
                tag_attributes.push((source.clone(), field.clone()));
            }
        }
        Self {
            start_index,
            surrounds_attribute,
            tag_attributes,
            annotation_text: None,
            variant_id: if descriptor.variant > 0 {
                Some(descriptor.variant)
            } else {
                None
            },
            metadata: descriptor.metadata.clone(),
        }
    }

    fn has_bindings(&self) -> bool {
        self.surrounds_attribute.is_some() || !self.tag_attributes.is_empty()
    }

    fn into_annotation(self, end_index: usize) -> AnnotationTag {
        AnnotationTag {
            start_index: self.start_index,
            end_index,
            surrounds_attribute: self.surrounds_attribute,
            tag_attributes: self.tag_attributes,
            annotation_text: self.annotation_text,
            variant_id: self.variant_id,
            metadata: self.metadata,
        }
    }
}

/// Everything tracked for one open tag until its close arrives.
#[derive(Debug, Default)]
struct OpenTag {
    annotation: Option<PendingAnnotation>,
    ignored_start: Option<usize>,
}

struct TemplatePageParser<'d> {
    token_dict: &'d mut TokenDict,
    tokens: Vec<crate::token::Token>,
    annotations: Vec<AnnotationTag>,
    ignored_regions: Vec<PageRegion>,
    extra_required: Vec<String>,
    /// Open tags keyed by their effective (post replacement) name.
    open_stacks: FnvHashMap<String, Vec<OpenTag>>,
    /// Effective names keyed by the original name, so a close tag finds the
    /// replacement its open tag was registered under.
    effective_names: FnvHashMap<String, Vec<String>>,
    /// Generated annotations keyed by the wrapping tag's name. `None`
    /// entries pair the closes of ordinary tags of the same name.
    generated_stacks: FnvHashMap<String, Vec<Option<PendingAnnotation>>>,
    /// Text accumulated since the last kept tag.
    prev_text: String,
    /// Indexes of generated annotations still collecting follow text.
    awaiting_follow_text: Vec<usize>,
}

impl<'d> TemplatePageParser<'d> {
    fn new(token_dict: &'d mut TokenDict) -> Self {
        Self {
            token_dict,
            tokens: Vec::new(),
            annotations: Vec::new(),
            ignored_regions: Vec::new(),
            extra_required: Vec::new(),
            open_stacks: FnvHashMap::default(),
            effective_names: FnvHashMap::default(),
            generated_stacks: FnvHashMap::default(),
            prev_text: String::new(),
            awaiting_follow_text: Vec::new(),
        }
    }

    /// Tokenize a kept tag and return its token index.
    fn push_token(&mut self, tag: &str, tag_type: HtmlTagType) -> usize {
        let token = self.token_dict.tokenize(tag, tag_type);
        self.tokens.push(token);
        self.prev_text.clear();
        self.awaiting_follow_text.clear();
        self.tokens.len() - 1
    }

    fn complete(&mut self, open: OpenTag, end_index: usize) {
        if let Some(pending) = open.annotation {
            self.annotations.push(pending.into_annotation(end_index));
        }
        if let Some(start) = open.ignored_start {
            self.ignored_regions
                .push(PageRegion::bounded(start, end_index));
        }
    }

    /// Pop every open tag of `name` and close it at `end_index`, the
    /// malformed html recovery for tags that imply their own close.
    fn auto_close(&mut self, name: &str, end_index: usize) {
        if let Some(stack) = self.open_stacks.get_mut(name) {
            let dangling = mem::replace(stack, Vec::new());
            for open in dangling {
                self.complete(open, end_index);
            }
        }
    }

    fn handle_open(&mut self, tag: &HtmlTag) -> Result<(), SchabloneError> {
        let descriptor = read_annotation(tag)?;

        if let Some(descriptor) = &descriptor {
            if descriptor.generated {
                // the wrapping tag is dropped, the annotation anchors on
                // the enclosing tags and the literal text around the value
                let start_index = self
                    .tokens
                    .len()
                    .checked_sub(1)
                    .ok_or(SchabloneError::MisplacedGeneratedAnnotation)?;
                let mut pending = PendingAnnotation::from_descriptor(descriptor, start_index);
                pending.annotation_text = Some(AnnotationText {
                    start_text: mem::replace(&mut self.prev_text, String::new()),
                    follow_text: String::new(),
                });
                self.extra_required.extend(descriptor.required.iter().cloned());
                self.generated_stacks
                    .entry(tag.tag.clone())
                    .or_default()
                    .push(Some(pending));
                return Ok(());
            }
        }
        if let Some(stack) = self.generated_stacks.get_mut(&tag.tag) {
            if !stack.is_empty() {
                // keep the close pairing honest for ordinary tags of the
                // same name as an open generated wrapper
                stack.push(None);
            }
        }

        let effective = descriptor
            .as_ref()
            .and_then(|d| d.replacement.clone())
            .unwrap_or_else(|| tag.tag.clone());
        self.effective_names
            .entry(tag.tag.clone())
            .or_default()
            .push(effective.clone());

        let index = self.push_token(&effective, HtmlTagType::Open);
        if effective == "p" || effective == "option" {
            self.auto_close(&effective, index);
        }

        let mut open = OpenTag::default();
        if let Some(descriptor) = descriptor {
            self.extra_required.extend(descriptor.required.iter().cloned());
            if descriptor.ignore {
                open.ignored_start = Some(index);
            } else if descriptor.ignore_beneath {
                self.ignored_regions.push(PageRegion::open_ended(index));
            } else {
                let pending = PendingAnnotation::from_descriptor(&descriptor, index);
                if pending.surrounds_attribute.is_some() {
                    open.annotation = Some(pending);
                } else if pending.has_bindings() {
                    // attribute only bindings need no close, the tag
                    // itself is the whole region
                    self.annotations.push(pending.into_annotation(index));
                }
            }
        }
        self.open_stacks
            .entry(effective)
            .or_default()
            .push(open);
        Ok(())
    }

    fn handle_close(&mut self, tag: &HtmlTag) {
        if let Some(stack) = self.generated_stacks.get_mut(&tag.tag) {
            if let Some(entry) = stack.pop() {
                if let Some(pending) = entry {
                    // end points at the next kept tag, the enclosing close
                    let end_index = self.tokens.len();
                    self.annotations.push(pending.into_annotation(end_index));
                    self.awaiting_follow_text.push(self.annotations.len() - 1);
                    self.prev_text.clear();
                    return;
                }
                // an ordinary tag's close, handled below
            }
        }

        let effective = self
            .effective_names
            .get_mut(&tag.tag)
            .and_then(Vec::pop)
            .unwrap_or_else(|| tag.tag.clone());
        let index = self.push_token(&effective, HtmlTagType::Close);
        if effective == "select" {
            self.auto_close("option", index);
        }
        if let Some(open) = self.open_stacks.get_mut(&effective).and_then(Vec::pop) {
            self.complete(open, index);
        }
    }

    fn handle_unpaired(&mut self, tag: &HtmlTag) -> Result<(), SchabloneError> {
        let descriptor = read_annotation(tag)?;
        let effective = descriptor
            .as_ref()
            .and_then(|d| d.replacement.clone())
            .unwrap_or_else(|| tag.tag.clone());
        let index = self.push_token(&effective, HtmlTagType::Unpaired);
        if let Some(descriptor) = descriptor {
            self.extra_required.extend(descriptor.required.iter().cloned());
            if descriptor.ignore {
                self.ignored_regions
                    .push(PageRegion::bounded(index, index));
            } else if descriptor.ignore_beneath {
                self.ignored_regions.push(PageRegion::open_ended(index));
            } else {
                let pending = PendingAnnotation::from_descriptor(&descriptor, index);
                if pending.has_bindings() {
                    self.annotations.push(pending.into_annotation(index));
                }
            }
        }
        Ok(())
    }

    fn handle_data(&mut self, text: &str) {
        for &index in &self.awaiting_follow_text {
            if let Some(annotation_text) = &mut self.annotations[index].annotation_text {
                annotation_text.follow_text.push_str(text);
            }
        }
        self.prev_text.push_str(text);
    }

    fn finish(mut self, htmlpage: HtmlPage) -> Result<TemplatePage, SchabloneError> {
        for (name, stack) in &mut self.generated_stacks {
            while let Some(entry) = stack.pop() {
                if let Some(pending) = entry {
                    return Err(SchabloneError::UnbalancedAnnotation {
                        tag: name.clone(),
                        token_index: pending.start_index,
                    });
                }
            }
        }
        let mut open_stacks = mem::replace(&mut self.open_stacks, FnvHashMap::default());
        for (name, stack) in &mut open_stacks {
            for open in stack.drain(..) {
                if let Some(pending) = open.annotation {
                    return Err(SchabloneError::UnbalancedAnnotation {
                        tag: name.clone(),
                        token_index: pending.start_index,
                    });
                }
                if let Some(start) = open.ignored_start {
                    // ignores that never close stay open ended, bounded
                    // later by whatever encloses them
                    self.ignored_regions.push(PageRegion::open_ended(start));
                }
            }
        }
        // a generated annotation closed as the very last fragment has no
        // enclosing close tag to anchor its end on and could never match
        if self
            .annotations
            .iter()
            .any(|annotation| annotation.end_index >= self.tokens.len())
        {
            return Err(SchabloneError::MisplacedGeneratedAnnotation);
        }
        let mut extra_required = self.extra_required;
        extra_required.sort();
        extra_required.dedup();
        Ok(TemplatePage::new(
            htmlpage,
            self.tokens,
            self.annotations,
            self.ignored_regions,
            extra_required,
        ))
    }
}

/// Parse an annotated page into a [`TemplatePage`], interning every tag
/// into the shared dictionary.
pub fn parse_template(
    token_dict: &mut TokenDict,
    htmlpage: HtmlPage,
) -> Result<TemplatePage, SchabloneError> {
    let mut parser = TemplatePageParser::new(token_dict);
    for fragment in &htmlpage.parsed_body {
        match fragment {
            Fragment::Tag(tag) => match tag.tag_type {
                HtmlTagType::Open => parser.handle_open(tag)?,
                HtmlTagType::Close => parser.handle_close(tag),
                HtmlTagType::Unpaired => parser.handle_unpaired(tag)?,
            },
            Fragment::Data(data) => {
                if data.is_text_content {
                    parser.handle_data(&htmlpage.body[data.start..data.end]);
                }
            }
        }
    }
    parser.finish(htmlpage)
}

/// Tokenize a target page against a frozen dictionary. Tags never seen at
/// training time become the unknown token, which matches nothing.
pub fn parse_extraction_page(token_dict: &TokenDict, htmlpage: HtmlPage) -> ExtractionPage {
    let mut tokens = Vec::new();
    let mut fragment_indexes = Vec::new();
    for (index, fragment) in htmlpage.parsed_body.iter().enumerate() {
        if let Fragment::Tag(tag) = fragment {
            tokens.push(token_dict.token_or_unknown(&tag.tag, tag.tag_type));
            fragment_indexes.push(index);
        }
    }
    ExtractionPage::new(htmlpage, tokens, fragment_indexes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(body: &str) -> (TokenDict, TemplatePage) {
        let mut dict = TokenDict::new();
        let page = parse_template(&mut dict, HtmlPage::parse(body)).unwrap();
        (dict, page)
    }

    #[test]
    fn content_annotation_spans_open_and_close() {
        let (_, page) = template(
            r#"<div><p data-annotate='{"annotations": {"content": "title"}}'>Hello</p></div>"#,
        );
        assert_eq!(page.page_tokens.len(), 4);
        assert_eq!(page.annotations.len(), 1);
        let annotation = &page.annotations[0];
        assert_eq!(annotation.start_index, 1);
        assert_eq!(annotation.end_index, 2);
        assert_eq!(annotation.surrounds_attribute.as_deref(), Some("title"));
    }

    #[test]
    fn attribute_annotation_is_single_token() {
        let (_, page) = template(
            r#"<img src="x.png" data-annotate='{"annotations": {"src": "image"}}'/>"#,
        );
        let annotation = &page.annotations[0];
        assert_eq!(annotation.start_index, annotation.end_index);
        assert_eq!(
            annotation.tag_attributes,
            vec![("src".to_string(), "image".to_string())]
        );
        assert!(annotation.surrounds_attribute.is_none());
    }

    #[test]
    fn ignored_tag_becomes_a_region() {
        let (_, page) = template(r#"<div>a<b data-annotate='{"ignore": true}'>x</b>b</div>"#);
        assert_eq!(page.ignored_regions, vec![PageRegion::bounded(1, 2)]);
        assert!(page.annotations.is_empty());
    }

    #[test]
    fn ignore_beneath_stays_open_ended() {
        let (_, page) =
            template(r#"<div>a<hr data-annotate='{"ignore-beneath": true}'/>b</div>"#);
        assert_eq!(page.ignored_regions, vec![PageRegion::open_ended(1)]);
    }

    #[test]
    fn generated_annotation_drops_the_wrapper() {
        let (dict, page) = template(
            r#"<p>Price: <ins data-annotate='{"annotations": {"content": "price"}, "generated": true}'>12.50</ins> each</p>"#,
        );
        // only <p> and </p> survive in the token stream
        assert_eq!(page.page_tokens.len(), 2);
        assert_eq!(dict.len(), 2);
        let annotation = &page.annotations[0];
        assert_eq!((annotation.start_index, annotation.end_index), (0, 1));
        let text = annotation.annotation_text.as_ref().unwrap();
        assert_eq!(text.start_text, "Price: ");
        assert_eq!(text.follow_text, " each");
    }

    #[test]
    fn generated_annotation_needs_an_enclosing_tag() {
        let mut dict = TokenDict::new();
        let err = parse_template(
            &mut dict,
            HtmlPage::parse(
                r#"<ins data-annotate='{"annotations": {"content": "x"}, "generated": true}'>v</ins>"#,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, SchabloneError::MisplacedGeneratedAnnotation));
    }

    #[test]
    fn generated_annotation_needs_a_following_close() {
        let mut dict = TokenDict::new();
        let err = parse_template(
            &mut dict,
            HtmlPage::parse(
                r#"<p>Price: <ins data-annotate='{"annotations": {"content": "price"}, "generated": true}'>12.50</ins>"#,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, SchabloneError::MisplacedGeneratedAnnotation));
    }

    #[test]
    fn replacement_renames_open_and_close() {
        let (mut dict, page) = template(
            r#"<ul data-annotate='{"annotations": {"content": "choice"}, "replacement": "select"}'><li>a</li></ul>"#,
        );
        let select_open = dict.tokenize("select", HtmlTagType::Open);
        let select_close = dict.tokenize("select", HtmlTagType::Close);
        assert_eq!(page.page_tokens[0], select_open);
        assert_eq!(*page.page_tokens.last().unwrap(), select_close);
        assert!(dict.find_token("ul", HtmlTagType::Open).is_none());
    }

    #[test]
    fn open_paragraph_auto_closes_the_previous_one() {
        let (_, page) = template(
            r#"<body><p data-annotate='{"annotations": {"content": "a"}}'>one<p>two</p></body>"#,
        );
        let annotation = &page.annotations[0];
        // closed by the second <p>, at token index 2
        assert_eq!((annotation.start_index, annotation.end_index), (1, 2));
    }

    #[test]
    fn select_close_recovers_dangling_options() {
        let (_, page) = template(
            r#"<select><option data-annotate='{"annotations": {"content": "pick"}}'>a</select>"#,
        );
        let annotation = &page.annotations[0];
        assert_eq!((annotation.start_index, annotation.end_index), (1, 2));
    }

    #[test]
    fn unclosed_annotation_is_an_error() {
        let mut dict = TokenDict::new();
        let err = parse_template(
            &mut dict,
            HtmlPage::parse(
                r#"<div><span data-annotate='{"annotations": {"content": "x"}}'>v</div>"#,
            ),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SchabloneError::UnbalancedAnnotation { ref tag, .. } if tag == "span"
        ));
    }

    #[test]
    fn bad_descriptor_is_an_error() {
        let mut dict = TokenDict::new();
        let err = parse_template(
            &mut dict,
            HtmlPage::parse(r#"<p data-annotate='{"annotations": '>x</p>"#),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SchabloneError::InvalidAnnotationDescriptor { ref tag, .. } if tag == "p"
        ));
    }

    #[test]
    fn required_fields_collect_and_dedup() {
        let (_, page) = template(
            r#"<div><p data-annotate='{"annotations": {"content": "a"}, "required": ["b", "a"]}'>x</p><p data-annotate='{"annotations": {"content": "b"}, "required": ["a"]}'>y</p></div>"#,
        );
        assert_eq!(page.extra_required_fields, vec!["a", "b"]);
    }

    #[test]
    fn extraction_page_maps_unseen_tags_to_unknown() {
        let (dict, _) = template(r#"<p data-annotate='{"annotations": {"content": "t"}}'>x</p>"#);
        let page = parse_extraction_page(&dict, HtmlPage::parse("<p>y</p><em>z</em>"));
        assert_eq!(page.page_tokens.len(), 4);
        assert_eq!(page.page_tokens[2], crate::token::UNKNOWN_TOKEN);
        assert_eq!(page.page_tokens[3], crate::token::UNKNOWN_TOKEN);
    }
}
