use anyhow::Result;

use schablone::{FieldDescriptor, InstanceBasedLearningExtractor, ItemDescriptor};

/// A product page annotated once, by hand or by an annotation UI.
const TEMPLATE: &str = r#"<html><body>
<h1 data-annotate='{"annotations": {"content": "name"}}'>Field Watch</h1>
<img src="https://shop.example/img/field.png" data-annotate='{"annotations": {"src": "image"}}'/>
<p>Price: <ins data-annotate='{"annotations": {"content": "price"}, "generated": true}'>129.00</ins> incl. VAT</p>
<ul>
<li data-annotate='{"annotations": {"content": "feature"}}'>Luminous hands</li>
<li data-annotate='{"annotations": {"content": "feature"}}'>Sapphire glass</li>
</ul>
</body></html>"#;

/// An unseen page with the same structure: more features, different values.
const PAGE: &str = r#"<html><body>
<h1>Dive Watch</h1>
<img src="https://shop.example/img/dive.png"/>
<p>Price: 349.50 incl. VAT</p>
<ul>
<li>Helium valve</li>
<li>Ceramic bezel</li>
<li>300m water resistance</li>
</ul>
</body></html>"#;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let descriptor = ItemDescriptor::new()
        .with_field(FieldDescriptor::text("name").required())
        .with_field(FieldDescriptor::price("price"))
        .with_field(FieldDescriptor::url("image"));

    let extractor = InstanceBasedLearningExtractor::builder()
        .template_with_descriptor(TEMPLATE, descriptor)
        .build()?;

    match extractor.extract(PAGE) {
        Some((record, _)) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("nothing extracted"),
    }
    Ok(())
}
