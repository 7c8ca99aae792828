use schablone::{FieldDescriptor, InstanceBasedLearningExtractor, ItemDescriptor};

const PRODUCT_TEMPLATE: &str = r#"<html><body>
<h1 data-annotate='{"annotations": {"content": "title"}}'>Diver Watch</h1>
<p data-annotate='{"annotations": {"content": "description"}}'>Steel case, 200m.</p>
</body></html>"#;

#[test]
fn extracts_the_annotated_fields_from_the_template_itself() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(PRODUCT_TEMPLATE)
        .build()
        .unwrap();
    let (record, index) = extractor.extract(PRODUCT_TEMPLATE).unwrap();
    assert_eq!(index, 0);
    assert_eq!(record.fields["title"], vec!["Diver Watch"]);
    assert_eq!(record.fields["description"], vec!["Steel case, 200m."]);
}

#[test]
fn extracts_from_a_structurally_similar_page() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(PRODUCT_TEMPLATE)
        .build()
        .unwrap();
    let page = r#"<html><body>
    <h1>Chronograph</h1>
    <p>Titanium, sapphire glass.</p>
    </body></html>"#;
    let (record, _) = extractor.extract(page).unwrap();
    assert_eq!(record.fields["title"], vec!["Chronograph"]);
    assert_eq!(record.fields["description"], vec!["Titanium, sapphire glass."]);
}

#[test]
fn extraction_is_deterministic() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(PRODUCT_TEMPLATE)
        .build()
        .unwrap();
    let page = "<html><body><h1>Same</h1><p>Every time.</p></body></html>";
    let first = extractor.extract(page);
    let second = extractor.extract(page);
    assert_eq!(first, second);
    assert!(first.is_some());
}

#[test]
fn ambiguous_context_extracts_nothing() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(r#"<div><span><b data-annotate='{"annotations": {"content": "title"}}'>x</b></span></div>"#)
        .build()
        .unwrap();
    // the annotated region's context appears twice, neither occurrence is
    // uniquely best, so no value may be guessed
    let page = "<div><span><b>first</b></span></div><div><span><b>second</b></span></div>";
    assert!(extractor.extract(page).is_none());
}

#[test]
fn ignored_region_is_cut_out_of_the_value() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(
            r#"<div><p data-annotate='{"annotations": {"content": "description"}}'>keep1 <b data-annotate='{"ignore": true}'>drop</b> keep2</p></div>"#,
        )
        .build()
        .unwrap();
    let page = "<div><p>keep1 <b>drop me</b> keep2</p></div>";
    let (record, _) = extractor.extract(page).unwrap();
    assert_eq!(record.fields["description"], vec!["keep1 keep2"]);
}

#[test]
fn open_ended_ignore_stops_the_value_where_it_starts() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(
            r#"<div><p data-annotate='{"annotations": {"content": "description"}}'>keep <hr data-annotate='{"ignore-beneath": true}'/> dropped</p></div>"#,
        )
        .build()
        .unwrap();
    // the ignore never closes, so the cut runs to the end of the value
    let page = "<div><p>fresh <hr/> junk junk</p></div>";
    let (record, _) = extractor.extract(page).unwrap();
    assert_eq!(record.fields["description"], vec!["fresh"]);
}

#[test]
fn nested_annotation_extracts_inner_and_outer_fields() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(
            r#"<div data-annotate='{"annotations": {"content": "outer"}}'>pre <b data-annotate='{"annotations": {"content": "inner"}}'>kernel</b> post</div>"#,
        )
        .build()
        .unwrap();
    let page = "<div>intro <b>core</b> outro</div>";
    let (record, _) = extractor.extract(page).unwrap();
    // the inner region resolves within the outer's matched span
    assert_eq!(record.fields["outer"], vec!["intro core outro"]);
    assert_eq!(record.fields["inner"], vec!["core"]);
}

#[test]
fn two_annotated_repeats_extract_five() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(
            r#"<ul><li data-annotate='{"annotations": {"content": "item"}}'>a</li><li data-annotate='{"annotations": {"content": "item"}}'>b</li></ul>"#,
        )
        .build()
        .unwrap();
    let page = "<ul><li>a</li><li>b</li><li>c</li><li>d</li><li>e</li></ul>";
    let (record, _) = extractor.extract(page).unwrap();
    assert_eq!(record.fields["item"], vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn variant_rows_come_back_as_one_variant_per_row() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(
            r#"<table><tr><td data-annotate='{"annotations": {"content": "name"}, "variant": 1}'>a</td><td data-annotate='{"annotations": {"content": "price"}, "variant": 1}'>1</td></tr><tr><td data-annotate='{"annotations": {"content": "name"}, "variant": 2}'>b</td><td data-annotate='{"annotations": {"content": "price"}, "variant": 2}'>2</td></tr></table>"#,
        )
        .build()
        .unwrap();
    let page = "<table>\
        <tr><td>alpha</td><td>10</td></tr>\
        <tr><td>beta</td><td>20</td></tr>\
        <tr><td>gamma</td><td>30</td></tr>\
        <tr><td>delta</td><td>40</td></tr>\
        </table>";
    let (record, _) = extractor.extract(page).unwrap();
    assert_eq!(record.variants.len(), 4);
    assert_eq!(record.variants[0]["name"], vec!["alpha"]);
    assert_eq!(record.variants[0]["price"], vec!["10"]);
    assert_eq!(record.variants[3]["name"], vec!["delta"]);
    assert_eq!(record.variants[3]["price"], vec!["40"]);
}

#[test]
fn partial_annotation_recovers_the_boundary_inside_text() {
    let extractor = InstanceBasedLearningExtractor::builder()
        .template_with_descriptor(
            r#"<p>Price: <ins data-annotate='{"annotations": {"content": "price"}, "generated": true}'>12.50</ins> each</p>"#,
            ItemDescriptor::new().with_field(FieldDescriptor::price("price")),
        )
        .build()
        .unwrap();
    let (record, _) = extractor.extract("<p>Price: 89.99 each</p>").unwrap();
    assert_eq!(record.fields["price"], vec!["89.99"]);
}

#[test]
fn missing_required_field_drops_the_record() {
    let template = r#"<html><body>
    <h1 data-annotate='{"annotations": {"content": "title"}}'>T</h1>
    <span data-annotate='{"annotations": {"content": "price"}}'>9.99</span>
    </body></html>"#;
    let descriptor = ItemDescriptor::new().with_field(FieldDescriptor::price("price").required());
    let extractor = InstanceBasedLearningExtractor::builder()
        .template_with_descriptor(template, descriptor)
        .build()
        .unwrap();
    // the price region is gone, only the title would extract
    let page = "<html><body><h1>T</h1><em>x</em></body></html>";
    assert!(extractor.extract(page).is_none());
}

#[test]
fn attribute_binding_with_url_validation() {
    let template = r#"<div><img src="https://shop.example/a.png" data-annotate='{"annotations": {"src": "image"}}'/><p data-annotate='{"annotations": {"content": "caption"}}'>c</p></div>"#;
    let descriptor = ItemDescriptor::new().with_field(FieldDescriptor::url("image"));
    let extractor = InstanceBasedLearningExtractor::builder()
        .template_with_descriptor(template, descriptor)
        .build()
        .unwrap();
    let (record, _) = extractor
        .extract(r#"<div><img src="https://shop.example/b.png"/><p>nice</p></div>"#)
        .unwrap();
    assert_eq!(record.fields["image"], vec!["https://shop.example/b.png"]);
    assert_eq!(record.fields["caption"], vec!["nice"]);

    // a relative url fails validation, the caption still comes through
    let (record, _) = extractor
        .extract(r#"<div><img src="/b.png"/><p>still here</p></div>"#)
        .unwrap();
    assert!(!record.fields.contains_key("image"));
    assert_eq!(record.fields["caption"], vec!["still here"]);
}

#[test]
fn later_match_disambiguates_an_earlier_one() {
    // over the whole page the first region's context is ambiguous (two
    // identical <p> occurrences); the second region resolves uniquely and
    // bounds the retry for the first to the part before it
    let template = r#"<p data-annotate='{"annotations": {"content": "first"}}'>a</p><span data-annotate='{"annotations": {"content": "second"}}'>b</span>"#;
    let extractor = InstanceBasedLearningExtractor::builder()
        .template(template)
        .build()
        .unwrap();
    let page = "<p>one</p><span>two</span><p>noise</p>";
    let (record, _) = extractor.extract(page).unwrap();
    assert_eq!(record.fields["first"], vec!["one"]);
    assert_eq!(record.fields["second"], vec!["two"]);
}
