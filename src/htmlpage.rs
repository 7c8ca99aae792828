//! Flat, selector free view of a page's markup.
//!
//! A page is tokenized into an ordered sequence of fragments, each either a
//! tag (name, role, attributes) or an opaque data span, all carrying byte
//! offsets into the source text. Concatenating the fragment spans in order
//! reproduces the body exactly, nothing is reordered or dropped. There is no
//! DOM: everything downstream works on this flat stream.

use fnv::FnvHashMap;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_MARKUP: Regex = Regex::new(
        r#"(?is)<!--.*?(?:-->|\z)|<!\[CDATA\[.*?(?:\]\]>|\z)|<![^>]*>|<\?[^>]*>|<(/?)([a-zA-Z][a-zA-Z0-9:._-]*)((?:[^<>"']|"[^"]*"|'[^']*')*?)(/?)>"#
    )
    .unwrap();
    static ref RE_ATTRIBUTE: Regex = Regex::new(
        r#"([a-zA-Z_][a-zA-Z0-9:._-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+)))?"#
    )
    .unwrap();
    static ref RE_SCRIPT_END: Regex = Regex::new(r"(?i)</script\s*>").unwrap();
    static ref RE_STYLE_END: Regex = Regex::new(r"(?i)</style\s*>").unwrap();
}

/// Role of a tag within the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HtmlTagType {
    Open = 1,
    Close = 2,
    /// Self closed (`<br/>`), never paired with a closing tag.
    Unpaired = 3,
}

impl HtmlTagType {
    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }
}

/// A parsed tag fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlTag {
    pub tag_type: HtmlTagType,
    /// Lowercased tag name.
    pub tag: String,
    /// Lowercased attribute names mapped to their (optional) values.
    pub attributes: FnvHashMap<String, Option<String>>,
    /// Byte offset of the fragment start in the page body.
    pub start: usize,
    /// Byte offset one past the fragment end.
    pub end: usize,
}

/// An opaque data span between tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlDataFragment {
    pub start: usize,
    pub end: usize,
    /// False for comments, doctypes, processing instructions and script or
    /// style payloads, none of which count as extractable text.
    pub is_text_content: bool,
}

/// One element of the flat fragment stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Tag(HtmlTag),
    Data(HtmlDataFragment),
}

impl Fragment {
    pub fn start(&self) -> usize {
        match self {
            Fragment::Tag(t) => t.start,
            Fragment::Data(d) => d.start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            Fragment::Tag(t) => t.end,
            Fragment::Data(d) => d.end,
        }
    }
}

/// A page body together with its parsed fragment stream.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    pub body: String,
    pub parsed_body: Vec<Fragment>,
}

impl HtmlPage {
    /// Tokenize a page body.
    pub fn parse(body: impl Into<String>) -> Self {
        let body = body.into();
        let parsed_body = parse_html(&body);
        Self { body, parsed_body }
    }

    /// The source text a fragment spans.
    pub fn fragment_text(&self, fragment: &Fragment) -> &str {
        &self.body[fragment.start()..fragment.end()]
    }

    /// The region spanning the fragments `start..=end`.
    pub fn region(&self, start: usize, end: usize) -> HtmlPageRegion<'_> {
        HtmlPageRegion {
            page: self,
            bounds: if start <= end && end < self.parsed_body.len() {
                Some((start, end))
            } else {
                None
            },
        }
    }
}

/// A contiguous run of fragments within one page.
#[derive(Debug, Clone, Copy)]
pub struct HtmlPageRegion<'a> {
    page: &'a HtmlPage,
    /// Inclusive fragment index range, `None` for the empty region.
    bounds: Option<(usize, usize)>,
}

impl<'a> HtmlPageRegion<'a> {
    /// The raw markup the region spans.
    pub fn html(&self) -> &'a str {
        match self.bounds {
            Some((start, end)) => {
                let from = self.page.parsed_body[start].start();
                let to = self.page.parsed_body[end].end();
                &self.page.body[from..to]
            }
            None => "",
        }
    }

    /// The text content of the region: every text span concatenated, with
    /// tags, comments and script payloads left out.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.push_text_content(&mut text);
        text
    }

    fn push_text_content(&self, text: &mut String) {
        if let Some((start, end)) = self.bounds {
            for fragment in &self.page.parsed_body[start..=end] {
                if let Fragment::Data(d) = fragment {
                    if d.is_text_content {
                        text.push_str(&self.page.body[d.start..d.end]);
                    }
                }
            }
        }
    }
}

/// An ordered list of disjoint sub regions presented as one logical region,
/// used wherever an ignored span is excised from the middle of a value.
#[derive(Debug, Clone)]
pub struct FragmentedHtmlPageRegion<'a> {
    pub regions: Vec<HtmlPageRegion<'a>>,
}

impl<'a> FragmentedHtmlPageRegion<'a> {
    pub fn new(regions: Vec<HtmlPageRegion<'a>>) -> Self {
        Self { regions }
    }

    pub fn html(&self) -> String {
        self.regions.iter().map(|r| r.html()).collect()
    }

    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for region in &self.regions {
            region.push_text_content(&mut text);
        }
        text
    }
}

/// Parse a body into the flat fragment stream.
pub fn parse_html(body: &str) -> Vec<Fragment> {
    let mut parsed = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        let caps = match RE_MARKUP.captures(&body[pos..]) {
            Some(caps) => caps,
            None => break,
        };
        let whole = caps.get(0).unwrap();
        let (start, end) = (pos + whole.start(), pos + whole.end());
        if start > pos {
            parsed.push(Fragment::Data(HtmlDataFragment {
                start: pos,
                end: start,
                is_text_content: true,
            }));
        }
        pos = end;
        let name = match caps.get(2) {
            Some(name) => name.as_str().to_lowercase(),
            None => {
                // comment, cdata, doctype or processing instruction
                parsed.push(Fragment::Data(HtmlDataFragment {
                    start,
                    end,
                    is_text_content: false,
                }));
                continue;
            }
        };
        let closing = !caps[1].is_empty();
        let tag_type = if closing {
            HtmlTagType::Close
        } else if !caps[4].is_empty() {
            HtmlTagType::Unpaired
        } else {
            HtmlTagType::Open
        };
        let mut attributes = FnvHashMap::default();
        if !closing {
            for attr in RE_ATTRIBUTE.captures_iter(&caps[3]) {
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .or_else(|| attr.get(4))
                    .map(|v| v.as_str().to_string());
                attributes.insert(attr[1].to_lowercase(), value);
            }
        }
        parsed.push(Fragment::Tag(HtmlTag {
            tag_type,
            tag: name.clone(),
            attributes,
            start,
            end,
        }));
        if tag_type == HtmlTagType::Open && (name == "script" || name == "style") {
            let re = if name == "script" {
                &*RE_SCRIPT_END
            } else {
                &*RE_STYLE_END
            };
            match re.find(&body[pos..]) {
                Some(m) => {
                    if m.start() > 0 {
                        parsed.push(Fragment::Data(HtmlDataFragment {
                            start: pos,
                            end: pos + m.start(),
                            is_text_content: false,
                        }));
                    }
                    parsed.push(Fragment::Tag(HtmlTag {
                        tag_type: HtmlTagType::Close,
                        tag: name,
                        attributes: FnvHashMap::default(),
                        start: pos + m.start(),
                        end: pos + m.end(),
                    }));
                    pos += m.end();
                }
                None => {
                    parsed.push(Fragment::Data(HtmlDataFragment {
                        start: pos,
                        end: body.len(),
                        is_text_content: false,
                    }));
                    pos = body.len();
                }
            }
        }
    }
    if pos < body.len() {
        parsed.push(Fragment::Data(HtmlDataFragment {
            start: pos,
            end: body.len(),
            is_text_content: true,
        }));
    }
    parsed
}
