//! The extractor pipeline.
//!
//! A trained template is compiled into a tree of region extractors, built
//! bottom up: one [`BasicTypeExtractor`] per labelled annotation, adjacent
//! annotations of the same variant folded into an
//! [`AdjacentVariantExtractor`], adjacent structurally identical extractors
//! folded into a [`RepeatedDataExtractor`], and the whole list wrapped in a
//! [`RecordExtractor`] that locates each region on the target page through
//! [`similar_region`](crate::similarity::similar_region) and recurses into
//! nested regions.

use std::collections::BTreeMap;
use std::fmt;
use std::iter;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::descriptor::{FieldValidator, ItemDescriptor};
use crate::htmlpage::FragmentedHtmlPageRegion;
use crate::page::{AnnotationTag, AnnotationText, ExtractionPage, PageRegion, TemplatePage};
use crate::similarity::{common_prefix, longest_unique_subsequence, similar_region};
use crate::token::Token;

/// One extracted value, before grouping into a record.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedItem {
    /// A plain field value.
    Field { field: String, value: String },
    /// Values from one annotation of a variant that was never folded into
    /// an adjacent group; fragments of the same id merge into one variant.
    VariantFragment {
        variant_id: u32,
        fields: Vec<(String, String)>,
    },
    /// One full repeat of an adjacent variant group.
    VariantRecord { fields: Vec<(String, String)> },
}

/// The grouped output of one template applied to one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedRecord {
    /// Field name to all values extracted for it, in document order.
    pub fields: BTreeMap<String, Vec<String>>,
    /// One map per variant, in document order.
    pub variants: Vec<BTreeMap<String, Vec<String>>>,
}

impl ExtractedRecord {
    pub(crate) fn from_items(items: Vec<ExtractedItem>) -> Self {
        let mut record = ExtractedRecord::default();
        let mut fragment_order = Vec::new();
        let mut fragments: BTreeMap<u32, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for item in items {
            match item {
                ExtractedItem::Field { field, value } => {
                    record.fields.entry(field).or_default().push(value);
                }
                ExtractedItem::VariantFragment { variant_id, fields } => {
                    if !fragments.contains_key(&variant_id) {
                        fragment_order.push(variant_id);
                    }
                    let variant = fragments.entry(variant_id).or_default();
                    for (field, value) in fields {
                        variant.entry(field).or_default().push(value);
                    }
                }
                ExtractedItem::VariantRecord { fields } => {
                    let mut variant: BTreeMap<String, Vec<String>> = BTreeMap::new();
                    for (field, value) in fields {
                        variant.entry(field).or_default().push(value);
                    }
                    record.variants.push(variant);
                }
            }
        }
        for id in fragment_order {
            if let Some(variant) = fragments.remove(&id) {
                record.variants.push(variant);
            }
        }
        record
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.variants.is_empty()
    }

    /// True if `field` was extracted, either top level or in a variant.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field) || self.variants.iter().any(|v| v.contains_key(field))
    }
}

/// The closed set of region extractor kinds the tree is built from.
#[derive(Debug)]
pub enum RegionExtractor {
    Basic(BasicTypeExtractor),
    Repeated(RepeatedDataExtractor),
    Variant(AdjacentVariantExtractor),
    Record(RecordExtractor),
}

impl RegionExtractor {
    /// The template annotation this extractor is anchored on.
    pub fn annotation(&self) -> &AnnotationTag {
        match self {
            RegionExtractor::Basic(e) => &e.annotation,
            RegionExtractor::Repeated(e) => &e.annotation,
            RegionExtractor::Variant(e) => &e.annotation,
            RegionExtractor::Record(e) => &e.annotation,
        }
    }

    fn annotation_mut(&mut self) -> &mut AnnotationTag {
        match self {
            RegionExtractor::Basic(e) => &mut e.annotation,
            RegionExtractor::Repeated(e) => &mut e.annotation,
            RegionExtractor::Variant(e) => &mut e.annotation,
            RegionExtractor::Record(e) => &mut e.annotation,
        }
    }

    /// Extract from the resolved page region `start..=end`.
    fn extract(
        &self,
        page: &ExtractionPage,
        start: usize,
        end: usize,
        ignored: &[PageRegion],
    ) -> Vec<ExtractedItem> {
        match self {
            RegionExtractor::Basic(e) => e.extract(page, start, end, ignored),
            RegionExtractor::Repeated(e) => e.extract(page, start, end, ignored),
            RegionExtractor::Variant(e) => e.extract(page, start, end),
            RegionExtractor::Record(e) => e.extract_items(page, start, Some(end + 1), ignored),
        }
    }

    /// A structural signature: two adjacent extractors with equal keys are
    /// repeats of the same thing and can be folded.
    fn repeated_key(&self) -> Option<String> {
        match self {
            RegionExtractor::Basic(e) => {
                let mut fields: Vec<&str> = e
                    .attribute_fields
                    .iter()
                    .map(|(_, field, _)| field.as_str())
                    .collect();
                if let Some((field, _)) = &e.content_field {
                    fields.push(field);
                }
                fields.sort_unstable();
                Some(format!("basic:{}", fields.join(",")))
            }
            RegionExtractor::Variant(e) => Some(e.key.clone()),
            _ => None,
        }
    }
}

lazy_static! {
    /// The first word or non word run, the minimum that must match of a
    /// partial annotation's literal context.
    static ref RE_FIRST_RUN: Regex = Regex::new(r"^\w+|^\W+").unwrap();
}

/// Recovers a value boundary that falls inside a text node, by aligning the
/// literal text recorded around the annotation against the extracted text.
#[derive(Debug, Clone)]
pub struct TextRegionDataExtractor {
    /// The text before the value, reversed so it aligns forward from the
    /// value boundary.
    prefix: Vec<char>,
    suffix: Vec<char>,
    min_prefix: usize,
    min_suffix: usize,
}

impl TextRegionDataExtractor {
    pub fn new(annotation_text: &AnnotationText) -> Self {
        let prefix: Vec<char> = annotation_text.start_text.chars().rev().collect();
        let suffix: Vec<char> = annotation_text.follow_text.chars().collect();
        let min_prefix = Self::minimum_match(&prefix);
        let min_suffix = Self::minimum_match(&suffix);
        Self {
            prefix,
            suffix,
            min_prefix,
            min_suffix,
        }
    }

    fn minimum_match(context: &[char]) -> usize {
        let text: String = context.iter().collect();
        RE_FIRST_RUN
            .find(&text)
            .map(|m| m.as_str().chars().count())
            .unwrap_or(0)
    }

    /// Cut the annotated value out of `text`, `None` when the recorded
    /// context cannot be located well enough.
    pub fn extract(&self, text: &str) -> Option<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut value_start = 0;
        if self.min_prefix > 0 {
            let reversed: Vec<char> = chars.iter().rev().copied().collect();
            let (index, length) = longest_unique_subsequence(&reversed, &self.prefix, 0, None)?;
            if length < self.min_prefix {
                return None;
            }
            value_start = chars.len() - index;
        }
        if self.min_suffix == 0 {
            return Some(chars[value_start..].iter().collect());
        }
        let (index, length) =
            longest_unique_subsequence(&chars[value_start..], &self.suffix, 0, None)?;
        if length < self.min_suffix {
            return None;
        }
        Some(chars[value_start..value_start + index].iter().collect())
    }
}

/// Extracts the values of a single annotation: its text content, bound
/// attributes, or both.
pub struct BasicTypeExtractor {
    annotation: AnnotationTag,
    content_field: Option<(String, FieldValidator)>,
    attribute_fields: Vec<(String, String, FieldValidator)>,
    text_region: Option<TextRegionDataExtractor>,
}

impl BasicTypeExtractor {
    /// One leaf extractor per annotation that binds at least one field.
    pub fn create(
        annotations: &[AnnotationTag],
        descriptor: &ItemDescriptor,
    ) -> Vec<RegionExtractor> {
        annotations
            .iter()
            .filter(|a| a.surrounds_attribute.is_some() || !a.tag_attributes.is_empty())
            .map(|annotation| {
                let content_field = annotation.surrounds_attribute.clone().map(|field| {
                    let validator = descriptor.validator_for(&field);
                    (field, validator)
                });
                let attribute_fields = annotation
                    .tag_attributes
                    .iter()
                    .map(|(attribute, field)| {
                        let validator = descriptor.validator_for(field);
                        (attribute.clone(), field.clone(), validator)
                    })
                    .collect();
                let text_region = annotation
                    .annotation_text
                    .as_ref()
                    .map(TextRegionDataExtractor::new);
                RegionExtractor::Basic(BasicTypeExtractor {
                    annotation: annotation.clone(),
                    content_field,
                    attribute_fields,
                    text_region,
                })
            })
            .collect()
    }

    fn extract(
        &self,
        page: &ExtractionPage,
        start: usize,
        end: usize,
        ignored: &[PageRegion],
    ) -> Vec<ExtractedItem> {
        let mut values = Vec::new();
        if !self.attribute_fields.is_empty() {
            if let Some(tag) = page.htmlpage_tag(start) {
                for (attribute, field, validator) in &self.attribute_fields {
                    if let Some(Some(raw)) = tag.attributes.get(attribute) {
                        if let Some(value) = validator(raw) {
                            values.push((field.clone(), value));
                        }
                    }
                }
            }
        }
        if let Some((field, validator)) = &self.content_field {
            let raw = self.content_region(page, start, end, ignored).text_content();
            let raw = match &self.text_region {
                Some(text_region) => text_region.extract(&raw),
                None => Some(raw),
            };
            if let Some(value) = raw.as_deref().and_then(|raw| validator(raw)) {
                values.push((field.clone(), value));
            }
        }
        match self.annotation.variant_id {
            Some(variant_id) if !values.is_empty() => vec![ExtractedItem::VariantFragment {
                variant_id,
                fields: values,
            }],
            _ => values
                .into_iter()
                .map(|(field, value)| ExtractedItem::Field { field, value })
                .collect(),
        }
    }

    /// The content between the region's tags, with every resolved ignored
    /// span cut out. Open ended ignored spans run to the region end.
    fn content_region<'p>(
        &self,
        page: &'p ExtractionPage,
        start: usize,
        end: usize,
        ignored: &[PageRegion],
    ) -> FragmentedHtmlPageRegion<'p> {
        if ignored.is_empty() {
            return FragmentedHtmlPageRegion::new(vec![page.htmlpage_region_inside(start, end)]);
        }
        let mut regions = Vec::new();
        let mut cursor = start;
        for region in ignored {
            let region_end = region.end_index.unwrap_or(end).min(end);
            if region.start_index <= cursor {
                cursor = cursor.max(region_end);
                continue;
            }
            if region.start_index > end {
                break;
            }
            regions.push(page.htmlpage_region_inside(cursor, region.start_index));
            cursor = region_end;
        }
        if cursor < end {
            regions.push(page.htmlpage_region_inside(cursor, end));
        }
        FragmentedHtmlPageRegion::new(regions)
    }
}

impl fmt::Debug for BasicTypeExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicTypeExtractor")
            .field("annotation", &self.annotation)
            .field(
                "content_field",
                &self.content_field.as_ref().map(|(field, _)| field),
            )
            .field(
                "attribute_fields",
                &self
                    .attribute_fields
                    .iter()
                    .map(|(attribute, field, _)| (attribute, field))
                    .collect::<Vec<_>>(),
            )
            .field("text_region", &self.text_region)
            .finish()
    }
}

/// Extracts a run of repeats of one sub extractor, located by the token
/// patterns that separated the repeats in the template.
#[derive(Debug)]
pub struct RepeatedDataExtractor {
    prefix: Vec<Token>,
    suffix: Vec<Token>,
    extractor: Box<RegionExtractor>,
    annotation: AnnotationTag,
}

impl RepeatedDataExtractor {
    /// Fold every run of adjacent, structurally identical extractors.
    pub fn apply(
        template_tokens: &[Token],
        extractors: Vec<RegionExtractor>,
    ) -> Vec<RegionExtractor> {
        let mut output = Vec::new();
        let mut iter = extractors.into_iter().peekable();
        while let Some(extractor) = iter.next() {
            let mut group = vec![extractor];
            if let Some(key) = group[0].repeated_key() {
                while iter
                    .peek()
                    .map(|next| next.repeated_key().as_deref() == Some(key.as_str()))
                    .unwrap_or(false)
                {
                    if let Some(next) = iter.next() {
                        group.push(next);
                    }
                }
            }
            if group.len() == 1 {
                output.extend(group);
                continue;
            }
            match Self::fold(template_tokens, group) {
                Ok(repeated) => output.push(RegionExtractor::Repeated(repeated)),
                Err(group) => output.extend(group),
            }
        }
        output
    }

    /// Derive the separator patterns for one group. The group stays
    /// unfolded when the patterns do not cover a full separator, repeats
    /// could not be told apart then.
    fn fold(
        tokens: &[Token],
        group: Vec<RegionExtractor>,
    ) -> Result<RepeatedDataExtractor, Vec<RegionExtractor>> {
        let regions: Vec<PageRegion> = group.iter().map(|e| e.annotation().region()).collect();
        let mut separators: Vec<&[Token]> = Vec::new();
        for pair in regions.windows(2) {
            let from = pair[0].end_index.unwrap_or(pair[0].start_index);
            if from > pair[1].start_index {
                // overlapping regions cannot be repeats of each other
                return Err(group);
            }
            separators.push(&tokens[from..=pair[1].start_index]);
        }
        let group_start = regions[0].start_index;
        let prefix_start = group_start.saturating_sub(separators[0].len() - 1);
        let first_prefix = &tokens[prefix_start..=group_start];
        let reversed: Vec<Vec<Token>> = iter::once(first_prefix)
            .chain(separators.iter().copied())
            .map(|s| s.iter().rev().copied().collect())
            .collect();
        let reversed_refs: Vec<&[Token]> = reversed.iter().map(Vec::as_slice).collect();
        let mut prefix = common_prefix(&reversed_refs);
        prefix.reverse();

        let group_end = regions[regions.len() - 1]
            .end_index
            .unwrap_or(regions[regions.len() - 1].start_index);
        let last_len = separators[separators.len() - 1].len();
        let last_suffix = &tokens[group_end..(group_end + last_len).min(tokens.len())];
        let forward: Vec<&[Token]> = separators
            .iter()
            .copied()
            .chain(iter::once(last_suffix))
            .collect();
        let suffix = common_prefix(&forward);

        if prefix.is_empty() || suffix.is_empty() || prefix.len() + suffix.len() < separators[0].len()
        {
            return Err(group);
        }
        let mut group = group;
        let end_index = group[group.len() - 1].annotation().end_index;
        let first = group.swap_remove(0);
        let mut annotation = first.annotation().clone();
        annotation.end_index = end_index;
        Ok(RepeatedDataExtractor {
            prefix,
            suffix,
            extractor: Box::new(first),
            annotation,
        })
    }

    /// Scan the resolved window for prefix/suffix pattern pairs and run the
    /// sub extractor on every repeat in between.
    fn extract(
        &self,
        page: &ExtractionPage,
        start: usize,
        end: usize,
        ignored: &[PageRegion],
    ) -> Vec<ExtractedItem> {
        let tokens = &page.page_tokens;
        let plen = self.prefix.len();
        let slen = self.suffix.len();
        let mut items = Vec::new();
        let mut index = (start + 1).saturating_sub(plen);
        while index + plen <= tokens.len() && index + plen - 1 <= end {
            if tokens[index..index + plen] != self.prefix[..] {
                index += 1;
                continue;
            }
            let prefix_end = index + plen;
            let mut found = None;
            let mut peek = prefix_end;
            while peek <= end && peek + slen <= tokens.len() {
                if tokens[peek..peek + slen] == self.suffix[..] {
                    found = Some(peek);
                    break;
                }
                peek += 1;
            }
            match found {
                Some(peek) => {
                    items.extend(self.extractor.extract(page, prefix_end - 1, peek, ignored));
                    index = peek.max(index + 1);
                }
                None => break,
            }
        }
        items
    }
}

/// Extracts one repeatable sub record from a run of annotations that were
/// grouped under one variant id in the template.
#[derive(Debug)]
pub struct AdjacentVariantExtractor {
    record: Box<RegionExtractor>,
    annotation: AnnotationTag,
    /// Signature over the member fields, equal for every row of the same
    /// shape so repeated folding can group rows annotated under different
    /// variant ids.
    key: String,
}

impl AdjacentVariantExtractor {
    /// Wrap every contiguous run of extractors sharing a variant id.
    pub fn apply(
        template_tokens: &Arc<[Token]>,
        extractors: Vec<RegionExtractor>,
    ) -> Vec<RegionExtractor> {
        let mut output = Vec::new();
        let mut iter = extractors.into_iter().peekable();
        while let Some(extractor) = iter.next() {
            let variant_id = match extractor.annotation().variant_id {
                Some(id) => id,
                None => {
                    output.push(extractor);
                    continue;
                }
            };
            let mut group = vec![extractor];
            while iter
                .peek()
                .map(|next| next.annotation().variant_id == Some(variant_id))
                .unwrap_or(false)
            {
                if let Some(next) = iter.next() {
                    group.push(next);
                }
            }
            let mut annotation = group[0].annotation().clone();
            annotation.end_index = group[group.len() - 1].annotation().end_index;
            annotation.variant_id = Some(variant_id);
            let mut fields: Vec<String> = group
                .iter()
                .filter_map(|e| e.repeated_key())
                .collect();
            fields.sort_unstable();
            let key = format!("variant:{}", fields.join(";"));
            // the members extract plain fields, the wrapper groups them
            for member in &mut group {
                member.annotation_mut().variant_id = None;
            }
            let record = RecordExtractor::new(group, template_tokens.clone(), annotation.clone());
            output.push(RegionExtractor::Variant(AdjacentVariantExtractor {
                record: Box::new(RegionExtractor::Record(record)),
                annotation,
                key,
            }));
        }
        output
    }

    fn extract(&self, page: &ExtractionPage, start: usize, end: usize) -> Vec<ExtractedItem> {
        let fields: Vec<(String, String)> = self
            .record
            .extract(page, start, end, &[])
            .into_iter()
            .filter_map(|item| match item {
                ExtractedItem::Field { field, value } => Some((field, value)),
                _ => None,
            })
            .collect();
        if fields.is_empty() {
            Vec::new()
        } else {
            vec![ExtractedItem::VariantRecord { fields }]
        }
    }
}

/// An extractor or an ignored template region, interleaved in document
/// order while walking a record.
#[derive(Clone, Copy)]
enum Element<'e> {
    Extractor(&'e RegionExtractor),
    Ignored(&'e PageRegion),
}

impl Element<'_> {
    fn region(&self) -> PageRegion {
        match self {
            Element::Extractor(extractor) => extractor.annotation().region(),
            Element::Ignored(region) => **region,
        }
    }
}

/// Walks a list of sub extractors over a page window, resolving each
/// region through context matching and recursing into nested regions.
#[derive(Debug)]
pub struct RecordExtractor {
    extractors: Vec<RegionExtractor>,
    template_tokens: Arc<[Token]>,
    annotation: AnnotationTag,
}

impl RecordExtractor {
    pub fn new(
        extractors: Vec<RegionExtractor>,
        template_tokens: Arc<[Token]>,
        annotation: AnnotationTag,
    ) -> Self {
        Self {
            extractors,
            template_tokens,
            annotation,
        }
    }

    /// Extract everything in the window `start..range_end`, excising the
    /// given ignored template regions where they resolve.
    pub fn extract_items(
        &self,
        page: &ExtractionPage,
        start: usize,
        range_end: Option<usize>,
        ignored_regions: &[PageRegion],
    ) -> Vec<ExtractedItem> {
        let mut elements: Vec<Element<'_>> = self
            .extractors
            .iter()
            .map(Element::Extractor)
            .chain(ignored_regions.iter().map(Element::Ignored))
            .collect();
        elements.sort_by_key(|element| element.region().start_index);
        self.do_extract(page, &elements, start, range_end, Vec::new(), Vec::new())
            .1
    }

    /// Recursive walk: resolve the first element, then its nested elements
    /// within the resolved span, then the rest of the list past it. When
    /// the first element cannot be resolved, resolve the rest first and
    /// retry the first bounded just before where the rest matched, so a
    /// later unambiguous match disambiguates an earlier one.
    fn do_extract<'e>(
        &self,
        page: &ExtractionPage,
        elements: &[Element<'e>],
        start_index: usize,
        range_end: Option<usize>,
        mut nested: Vec<Element<'e>>,
        mut ignored: Vec<Element<'e>>,
    ) -> (Option<usize>, Vec<ExtractedItem>) {
        let (first, rest) = match elements.split_first() {
            Some(split) => split,
            None => return (None, Vec::new()),
        };
        if matches!(first, Element::Ignored(_)) {
            // a top level ignored region produces nothing by itself, the
            // ones that matter sit inside an annotation and are collected
            // below
            return self.do_extract(page, rest, start_index, range_end, nested, ignored);
        }
        let first_region = first.region();
        let first_end = first_region.end_index.unwrap_or(first_region.start_index);

        // everything starting inside the first region belongs to it
        let mut rest: Vec<Element<'_>> = rest.to_vec();
        while let Some(next) = rest.first().copied() {
            let next_region = next.region();
            if next_region.start_index >= first_end {
                break;
            }
            rest.remove(0);
            let into_nested = match next {
                Element::Extractor(_) => true,
                Element::Ignored(_) => nested.last().map_or(false, |inner| {
                    let inner_region = inner.region();
                    inner_region.start_index < next_region.start_index
                        && next_region.start_index
                            < inner_region.end_index.unwrap_or(inner_region.start_index)
                }),
            };
            if into_nested {
                nested.push(next);
            } else {
                ignored.push(next);
            }
        }

        let matched = similar_region(
            &page.page_tokens,
            &self.template_tokens,
            &first_region,
            start_index,
            range_end,
        );
        if let Some(matched) = matched.filter(|m| m.score > 0) {
            let pindex = matched.start_index;
            let sindex = matched.end_index;
            let resolved_end = sindex.unwrap_or(pindex);

            // resolve the ignored anchors within the matched span
            let mut similar_ignored = Vec::new();
            let mut from = pindex;
            for element in &ignored {
                let region = element.region();
                let window_end = sindex.map(|end| end + 1);
                if let Some(m) = similar_region(
                    &page.page_tokens,
                    &self.template_tokens,
                    &region,
                    from,
                    window_end,
                ) {
                    similar_ignored.push(PageRegion {
                        start_index: m.start_index,
                        end_index: m.end_index,
                    });
                    if let Some(end) = m.end_index {
                        from = end;
                    }
                }
            }

            let mut items = match first {
                Element::Extractor(extractor) => {
                    extractor.extract(page, pindex, resolved_end, &similar_ignored)
                }
                Element::Ignored(_) => Vec::new(),
            };
            if !nested.is_empty() {
                let nested_end = sindex.map(|end| end + 1).or(range_end);
                let (_, nested_items) =
                    self.do_extract(page, &nested, pindex, nested_end, Vec::new(), Vec::new());
                items.extend(nested_items);
            }
            if !rest.is_empty() {
                let follow_start = sindex.unwrap_or(start_index);
                let (_, following) =
                    self.do_extract(page, &rest, follow_start, range_end, Vec::new(), Vec::new());
                items.extend(following);
            }
            return (Some(pindex), items);
        }

        if !rest.is_empty() {
            let (next_start, following) =
                self.do_extract(page, &rest, start_index, range_end, Vec::new(), Vec::new());
            if let Some(bound) = next_start {
                if bound > start_index {
                    let (retry_start, mut items) = self.do_extract(
                        page,
                        &[*first],
                        start_index,
                        Some(bound),
                        nested,
                        ignored,
                    );
                    items.extend(following);
                    return (retry_start.or(Some(bound)), items);
                }
            }
            return (next_start, following);
        }
        if !nested.is_empty() {
            let (_, nested_items) =
                self.do_extract(page, &nested, start_index, range_end, Vec::new(), Vec::new());
            return (None, nested_items);
        }
        (None, Vec::new())
    }
}

/// A fully built extraction tree for one template.
#[derive(Debug)]
pub struct TemplateExtractor {
    tree: RecordExtractor,
    ignored_regions: Vec<PageRegion>,
    /// How many annotations the template carried, the specificity measure
    /// used to order templates.
    pub annotation_count: usize,
    /// Field names the template itself marked required.
    pub extra_required_fields: Vec<String>,
}

impl TemplateExtractor {
    /// Apply the tree to a page, `None` when nothing was extracted.
    pub fn extract(&self, page: &ExtractionPage) -> Option<ExtractedRecord> {
        if page.page_tokens.is_empty() {
            return None;
        }
        let items = self
            .tree
            .extract_items(page, 0, None, &self.ignored_regions);
        let record = ExtractedRecord::from_items(items);
        if record.is_empty() {
            None
        } else {
            Some(record)
        }
    }
}

/// Compile a template into its extraction tree: leaf extractors per
/// annotation, variant folding, repeat folding, record wrapping.
pub fn build_extraction_tree(
    template: &TemplatePage,
    descriptor: &ItemDescriptor,
) -> TemplateExtractor {
    let template_tokens: Arc<[Token]> = Arc::from(template.page_tokens.as_slice());
    let extractors = BasicTypeExtractor::create(&template.annotations, descriptor);
    let extractors = AdjacentVariantExtractor::apply(&template_tokens, extractors);
    let extractors = RepeatedDataExtractor::apply(&template.page_tokens, extractors);
    debug!(
        "extraction tree built: {} top level extractors from {} annotations",
        extractors.len(),
        template.annotations.len()
    );
    let annotation = AnnotationTag::new(0, template.page_tokens.len().saturating_sub(1));
    TemplateExtractor {
        tree: RecordExtractor::new(extractors, template_tokens, annotation),
        ignored_regions: template.ignored_regions.clone(),
        annotation_count: template.annotations.len(),
        extra_required_fields: template.extra_required_fields.clone(),
    }
}
