//! The training and extraction session front end.
//!
//! Training happens once: every annotated template page is parsed against a
//! shared [`TokenDict`] and compiled into an extraction tree. The dictionary
//! is frozen afterwards, so extraction is a pure `&self` operation that can
//! run from any number of threads at once.

use log::debug;

use crate::descriptor::ItemDescriptor;
use crate::error::SchabloneError;
use crate::extract::{build_extraction_tree, ExtractedRecord, TemplateExtractor};
use crate::htmlpage::HtmlPage;
use crate::page::ExtractionPage;
use crate::parse::{parse_extraction_page, parse_template};
use crate::token::TokenDict;

/// A trained extractor: learned from annotated example pages, applied to
/// structurally similar unseen pages.
#[derive(Debug)]
pub struct InstanceBasedLearningExtractor {
    token_dict: TokenDict,
    /// One tree per template, tried most specific first, each keeping the
    /// index its template was added under.
    trees: Vec<(usize, TemplateExtractor, ItemDescriptor)>,
}

impl InstanceBasedLearningExtractor {
    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::new()
    }

    /// Extract from a page body. Returns the first template whose record
    /// passes required field filtering, together with that template's index
    /// in training order.
    pub fn extract(&self, body: &str) -> Option<(ExtractedRecord, usize)> {
        let page = parse_extraction_page(&self.token_dict, HtmlPage::parse(body));
        self.extract_from_page(&page)
    }

    /// Extract from an already tokenized page.
    pub fn extract_from_page(&self, page: &ExtractionPage) -> Option<(ExtractedRecord, usize)> {
        for (index, tree, descriptor) in &self.trees {
            let record = match tree.extract(page) {
                Some(record) => record,
                None => continue,
            };
            if self.is_valid(&record, tree, descriptor) {
                debug!("template {} extracted {} fields", index, record.fields.len());
                return Some((record, *index));
            }
            debug!("template {} dropped a record missing required fields", index);
        }
        None
    }

    /// Tokenize a page body against the frozen dictionary, for repeated
    /// extraction without re-parsing.
    pub fn parse_page(&self, body: &str) -> ExtractionPage {
        parse_extraction_page(&self.token_dict, HtmlPage::parse(body))
    }

    /// A record is valid when every required field, from the descriptor and
    /// from the template's own required list, is present top level or in at
    /// least one variant.
    fn is_valid(
        &self,
        record: &ExtractedRecord,
        tree: &TemplateExtractor,
        descriptor: &ItemDescriptor,
    ) -> bool {
        descriptor
            .required_fields()
            .chain(tree.extra_required_fields.iter().map(String::as_str))
            .all(|field| record.has_field(field))
    }
}

/// Collects annotated template pages, then trains the extractor.
#[derive(Debug, Default)]
pub struct ExtractorBuilder {
    templates: Vec<(String, ItemDescriptor)>,
}

impl ExtractorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotated template page with default validation.
    pub fn template(self, body: impl Into<String>) -> Self {
        self.template_with_descriptor(body, ItemDescriptor::new())
    }

    /// Add an annotated template page with its own field descriptors.
    pub fn template_with_descriptor(
        mut self,
        body: impl Into<String>,
        descriptor: ItemDescriptor,
    ) -> Self {
        self.templates.push((body.into(), descriptor));
        self
    }

    /// Parse every template, build the extraction trees and freeze the
    /// dictionary. Fails fast on the first malformed template.
    pub fn build(self) -> Result<InstanceBasedLearningExtractor, SchabloneError> {
        if self.templates.is_empty() {
            return Err(SchabloneError::NoTemplates);
        }
        let mut token_dict = TokenDict::new();
        let mut trees = Vec::with_capacity(self.templates.len());
        for (index, (body, descriptor)) in self.templates.into_iter().enumerate() {
            let template = parse_template(&mut token_dict, HtmlPage::parse(&body))?;
            let tree = build_extraction_tree(&template, &descriptor);
            trees.push((index, tree, descriptor));
        }
        trees.sort_by(|a, b| b.1.annotation_count.cmp(&a.1.annotation_count));
        debug!(
            "trained on {} templates, dictionary holds {} tags",
            trees.len(),
            token_dict.len()
        );
        Ok(InstanceBasedLearningExtractor { token_dict, trees })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_templates_fails() {
        let err = InstanceBasedLearningExtractor::builder().build().unwrap_err();
        assert!(matches!(err, SchabloneError::NoTemplates));
    }

    #[test]
    fn most_annotated_template_is_tried_first() {
        let sparse = r#"<div><p data-annotate='{"annotations": {"content": "a"}}'>x</p></div>"#;
        let rich = r#"<div><h1 data-annotate='{"annotations": {"content": "a"}}'>x</h1><em data-annotate='{"annotations": {"content": "b"}}'>y</em></div>"#;
        let extractor = InstanceBasedLearningExtractor::builder()
            .template(sparse)
            .template(rich)
            .build()
            .unwrap();
        // the richer template sorts first but keeps its original index
        assert_eq!(extractor.trees[0].0, 1);
        assert_eq!(extractor.trees[0].1.annotation_count, 2);
    }
}
