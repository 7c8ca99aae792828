//! Instance based learning extraction: train on annotated example pages,
//! then pull the same fields out of structurally similar unseen pages. No
//! selectors, no DOM, the engine aligns flat token streams instead, so it
//! keeps working when markup shifts around the annotated regions.
//!
//! ```no_run
//! use schablone::InstanceBasedLearningExtractor;
//!
//! # fn main() -> Result<(), schablone::SchabloneError> {
//! let extractor = InstanceBasedLearningExtractor::builder()
//!     .template(r#"<h1 data-annotate='{"annotations": {"content": "title"}}'>Example</h1>"#)
//!     .build()?;
//! if let Some((record, _)) = extractor.extract("<h1>Another title</h1>") {
//!     println!("{:?}", record.fields["title"]);
//! }
//! # Ok(())
//! # }
//! ```

pub use descriptor::{FieldDescriptor, FieldValidator, ItemDescriptor};
pub use error::SchabloneError;
pub use extract::{build_extraction_tree, ExtractedRecord, TemplateExtractor};
pub use htmlpage::HtmlPage;
pub use page::{ExtractionPage, TemplatePage};
pub use parse::{parse_extraction_page, parse_template, ANNOTATION_ATTRIBUTE};
pub use scraper::{ExtractorBuilder, InstanceBasedLearningExtractor};
pub use token::TokenDict;

pub mod descriptor;
mod error;
pub mod extract;
pub mod htmlpage;
pub mod page;
pub mod parse;
pub mod scraper;
pub mod similarity;
pub mod token;
