use indoc::indoc;
use oasdoc_core::{
    Format, MemoryLoader, OpenApiReader, OpenApiWriter, ReaderSettings, ResolutionPolicy, SpecVersion,
    Url, WriterSettings,
};
use serde_json::json;
use std::sync::Arc;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

const ROOT: &str = indoc! {r#"
    openapi: 3.0.3
    info: {title: A, version: '1'}
    paths:
      /items:
        get:
          responses:
            '200':
              description: ok
              content:
                application/json:
                  schema:
                    $ref: 'widgets/B.yaml#/Widget'
"#};

const WIDGETS: &str = indoc! {r#"
    Widget:
      type: object
      properties:
        id:
          type: string
        parts:
          type: array
          items:
            $ref: '#/Part'
    Part:
      type: object
      nullable: true
      properties:
        parent:
          $ref: '#/Widget'
"#};

async fn read_full() -> oasdoc_core::Document {
    let loader = MemoryLoader::new().with(url("file:///specs/widgets/B.yaml"), WIDGETS);
    let settings = ReaderSettings::new()
        .with_resolution(ResolutionPolicy::Full)
        .with_base_location(url("file:///specs/A.yaml"))
        .with_loader(Arc::new(loader));
    let result = OpenApiReader::new(settings).read_async(ROOT.as_bytes()).await.unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    result.document
}

fn schema_at(value: &serde_json::Value) -> &serde_json::Value {
    &value["paths"]["/items"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]
}

#[tokio::test]
async fn test_external_reference_is_written_as_authored() {
    let document = read_full().await;

    let value = OpenApiWriter::new(WriterSettings::new().with_target(SpecVersion::V3_0)).to_value(&document);
    assert_eq!(value["openapi"], "3.0.3");
    assert_eq!(schema_at(&value), &json!({"$ref": "widgets/B.yaml#/Widget"}));
}

#[tokio::test]
async fn test_inlined_external_cycle_terminates() {
    let document = read_full().await;
    let settings = WriterSettings::new()
        .with_target(SpecVersion::V3_0)
        .with_inline_external_references(true);

    let value = OpenApiWriter::new(settings).to_value(&document);
    let widget = schema_at(&value);
    assert_eq!(widget["type"], "object");
    assert_eq!(widget["properties"]["id"], json!({"type": "string"}));

    let part = &widget["properties"]["parts"]["items"];
    assert_eq!(part["nullable"], true);
    // Back at Widget, which is still being written
    assert_eq!(
        part["properties"]["parent"],
        json!({"$ref": "widgets/B.yaml#/Widget"})
    );
}

#[tokio::test]
async fn test_3_1_output_reads_back_the_same() {
    let document = read_full().await;
    let writer = OpenApiWriter::new(
        WriterSettings::new()
            .with_target(SpecVersion::V3_1)
            .with_format(Format::Yaml)
            .with_inline_external_references(true),
    );
    let text = writer.write_string(&document).unwrap();

    let reread = OpenApiReader::default().read_str(&text).unwrap();
    assert!(reread.diagnostics.is_empty(), "{:?}", reread.diagnostics);
    assert_eq!(reread.document.version, SpecVersion::V3_1);

    let again = writer.write_string(&reread.document).unwrap();
    assert_eq!(text, again);
}

#[test]
fn test_writing_a_local_cycle_terminates_both_ways() {
    let text = indoc! {r#"
        openapi: 3.1.0
        info: {title: t, version: '1'}
        components:
          schemas:
            A:
              allOf:
                - $ref: '#/components/schemas/B'
            B:
              allOf:
                - $ref: '#/components/schemas/A'
    "#};
    let document = OpenApiReader::default().read_str(text).unwrap().document;

    for inline in [false, true] {
        let settings = WriterSettings::new().with_inline_local_references(inline);
        let json = OpenApiWriter::new(settings).write_string(&document).unwrap();
        assert!(json.contains("#/components/schemas/A"));
    }
}
