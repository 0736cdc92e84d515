use indoc::indoc;
use oasdoc_core::{
    Diagnostics, MemoryLoader, OpenApiError, OpenApiReader, OperationType, ReaderSettings,
    ReferenceSummary, ResolutionPolicy, ResolveOptions, Resolver, Schema, SchemaType, Url,
};
use std::sync::Arc;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn settings(policy: ResolutionPolicy) -> ReaderSettings {
    ReaderSettings::new()
        .with_resolution(policy)
        .with_base_location(url("file:///specs/a.yaml"))
}

const PETS: &str = indoc! {r#"
    openapi: 3.1.0
    info:
      title: Pets
      version: '1'
    paths:
      /pets:
        get:
          responses:
            '200':
              description: ok
              content:
                application/json:
                  schema:
                    type: array
                    items:
                      $ref: '#/components/schemas/Pet'
      /pets/{id}:
        get:
          responses:
            '200':
              description: ok
              content:
                application/json:
                  schema:
                    $ref: '#/components/schemas/Pet'
    components:
      schemas:
        Pet:
          type: object
          properties:
            name:
              type: string
"#};

fn response_schema(doc: &oasdoc_core::Document, path: &str) -> oasdoc_core::Handle<Schema> {
    let operation = doc.operation(path, OperationType::Get).unwrap();
    let response = doc.get(operation.responses["200"]);
    response.content["application/json"].schema.unwrap()
}

#[test]
fn test_holders_of_one_reference_share_a_handle() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut result = OpenApiReader::default().read_str(PETS).unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let doc = &mut result.document;

    let list = response_schema(doc, "/pets");
    let items = doc.get(list).items.unwrap();
    let single = response_schema(doc, "/pets/{id}");
    let pet = doc.component::<Schema>("Pet").unwrap();

    assert_eq!(items, single);
    assert_eq!(doc.resolve(items), pet);

    doc.get_mut(single).title = Some("A pet".to_string());
    assert_eq!(doc.get(items).title.as_deref(), Some("A pet"));
    assert_eq!(doc.get(pet).title.as_deref(), Some("A pet"));
}

#[tokio::test]
async fn test_resolving_twice_changes_nothing() {
    let mut result = OpenApiReader::default().read_async(PETS.as_bytes()).await.unwrap();
    let slots = result.document.store().len();

    let mut diagnostics = Diagnostics::new();
    Resolver::new(ResolveOptions::default())
        .resolve(&mut result.document, &mut diagnostics)
        .await
        .unwrap();

    assert!(diagnostics.is_empty());
    assert_eq!(result.document.store().len(), slots);
    assert_eq!(ReferenceSummary::of(&result.document).unresolved, 0);
}

#[test]
fn test_all_of_cycle_resolves() {
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

    let result = OpenApiReader::default().read_str(text).unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    let doc = &result.document;
    let a = doc.component::<Schema>("A").unwrap();
    let b = doc.component::<Schema>("B").unwrap();
    let a_to_b = doc.get(a).all_of[0];
    let b_to_a = doc.get(b).all_of[0];
    assert!(!doc.is_unresolved(a_to_b));
    assert!(!doc.is_unresolved(b_to_a));
    assert_eq!(doc.resolve(a_to_b), b);
    assert_eq!(doc.resolve(b_to_a), a);
}

const WIDGET_ROOT: &str = indoc! {r#"
    openapi: 3.1.0
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
                    $ref: 'B.yaml#/Widget'
      /owners:
        get:
          responses:
            '200':
              description: ok
              content:
                application/json:
                  schema:
                    $ref: '#/components/schemas/Owner'
    components:
      schemas:
        Owner:
          type: object
"#};

const WIDGET: &str = indoc! {r#"
    Widget:
      type: object
      properties:
        id:
          type: string
"#};

#[tokio::test]
async fn test_local_policy_leaves_external_reference_alone() {
    let result = OpenApiReader::new(settings(ResolutionPolicy::LocalOnly))
        .read_async(WIDGET_ROOT.as_bytes())
        .await
        .unwrap();

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let doc = &result.document;
    let schema = response_schema(doc, "/items");
    assert!(doc.is_unresolved(schema));
    assert!(doc.workspace().is_none());

    let owner = response_schema(doc, "/owners");
    assert!(!doc.is_unresolved(owner));
    assert_eq!(doc.resolve(owner), doc.component::<Schema>("Owner").unwrap());

    let summary = ReferenceSummary::of(doc);
    assert_eq!((summary.total, summary.resolved, summary.unresolved), (2, 1, 1));
}

#[tokio::test]
async fn test_full_policy_imports_external_widget() {
    let loader = MemoryLoader::new().with(url("file:///specs/B.yaml"), WIDGET);
    let reader = OpenApiReader::new(settings(ResolutionPolicy::Full).with_loader(Arc::new(loader)));

    let result = reader.read_async(WIDGET_ROOT.as_bytes()).await.unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    let doc = &result.document;
    let widget = doc.get(response_schema(doc, "/items"));
    assert!(widget.has_type(SchemaType::Object));
    assert_eq!(doc.get(widget.properties["id"]).primary_type(), Some(SchemaType::String));

    let workspace = doc.workspace().unwrap();
    assert!(workspace.fragment(&url("file:///specs/B.yaml")).is_some());

    let owner = response_schema(doc, "/owners");
    assert_eq!(doc.resolve(owner), doc.component::<Schema>("Owner").unwrap());

    let summary = ReferenceSummary::of(doc);
    assert_eq!(
        (summary.total, summary.resolved, summary.unresolved, summary.external),
        (2, 2, 0, 1)
    );
}

#[tokio::test]
async fn test_missing_external_document_is_one_diagnostic() {
    let reader = OpenApiReader::new(
        settings(ResolutionPolicy::Full).with_loader(Arc::new(MemoryLoader::new())),
    );

    let result = reader.read_async(WIDGET_ROOT.as_bytes()).await.unwrap();
    assert_eq!(result.diagnostics.len(), 1);

    let diagnostic = result.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.kind.code(), "oas::unresolved_reference");
    assert!(diagnostic.message().contains("B.yaml#/Widget"), "{}", diagnostic);
    assert_eq!(
        diagnostic.pointer,
        "#/paths/~1items/get/responses/200/content/application~1json/schema"
    );
}

#[tokio::test]
async fn test_full_policy_without_loader_reports_cause() {
    let result = OpenApiReader::new(settings(ResolutionPolicy::Full))
        .read_async(WIDGET_ROOT.as_bytes())
        .await
        .unwrap();

    let unresolved: Vec<_> = result.diagnostics.with_code("oas::unresolved_reference").collect();
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].message().contains("no loader configured"));
}

fn chain_loader() -> MemoryLoader {
    MemoryLoader::new()
        .with(url("file:///specs/b.yaml"), "B: {$ref: 'c.yaml#/C'}\n")
        .with(url("file:///specs/c.yaml"), "C: {$ref: 'd.yaml#/D'}\n")
        .with(url("file:///specs/d.yaml"), "D: {type: string}\n")
}

const CHAIN_ROOT: &str = indoc! {r#"
    openapi: 3.1.0
    info: {title: chain, version: '1'}
    components:
      schemas:
        Start:
          $ref: 'b.yaml#/B'
"#};

#[tokio::test]
async fn test_multi_hop_chain_resolves_within_depth() {
    let reader = OpenApiReader::new(settings(ResolutionPolicy::Full).with_loader(Arc::new(chain_loader())));

    let result = reader.read_async(CHAIN_ROOT.as_bytes()).await.unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    let doc = &result.document;
    let start = doc.component::<Schema>("Start").unwrap();
    assert!(!doc.is_unresolved(start));
    assert!(doc.get(start).has_type(SchemaType::String));
}

#[tokio::test]
async fn test_multi_hop_chain_stops_at_max_depth() {
    let reader = OpenApiReader::new(
        settings(ResolutionPolicy::Full)
            .with_loader(Arc::new(chain_loader()))
            .with_max_external_depth(2),
    );

    let result = reader.read_async(CHAIN_ROOT.as_bytes()).await.unwrap();
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    assert_eq!(result.diagnostics.warning_count(), 1);
    assert_eq!(
        result.diagnostics.with_code("oas::external_depth_exceeded").count(),
        1
    );

    let doc = &result.document;
    assert!(doc.is_unresolved(doc.component::<Schema>("Start").unwrap()));
    assert!(doc.workspace().unwrap().fragment(&url("file:///specs/d.yaml")).is_none());
}

#[tokio::test]
async fn test_external_anchor_resolves() {
    let loader = MemoryLoader::new().with(
        url("file:///specs/tree.yaml"),
        "Tree:\n  items:\n    $anchor: node\n    type: string\n",
    );
    let text = indoc! {r#"
        openapi: 3.1.0
        info: {title: anchors, version: '1'}
        components:
          schemas:
            ByAnchor:
              $ref: 'tree.yaml#node'
            ByPointer:
              $ref: 'tree.yaml#/Tree/items'
    "#};
    let reader = OpenApiReader::new(settings(ResolutionPolicy::Full).with_loader(Arc::new(loader)));

    let result = reader.read_async(text.as_bytes()).await.unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    let doc = &result.document;
    let by_anchor = doc.component::<Schema>("ByAnchor").unwrap();
    let by_pointer = doc.component::<Schema>("ByPointer").unwrap();
    assert!(doc.get(by_anchor).has_type(SchemaType::String));
    assert_eq!(doc.resolve(by_anchor), doc.resolve(by_pointer));
}

#[test]
fn test_reference_to_wrong_kind_is_malformed() {
    let text = indoc! {r#"
        openapi: 3.0.3
        info: {title: t, version: '1'}
        paths:
          /pets:
            get:
              parameters:
                - $ref: '#/components/schemas/Pet'
              responses:
                '200': {description: ok}
        components:
          schemas:
            Pet: {type: object}
    "#};

    let result = OpenApiReader::default().read_str(text).unwrap();
    let malformed: Vec<_> = result.diagnostics.with_code("oas::malformed_reference").collect();
    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].pointer, "#/paths/~1pets/get/parameters/0");

    let operation = result.document.operation("/pets", OperationType::Get).unwrap();
    assert!(operation.parameters.is_empty());
}

#[test]
fn test_self_alias_is_reported() {
    let text = indoc! {r#"
        openapi: 3.1.0
        info: {title: t, version: '1'}
        components:
          schemas:
            Loop:
              $ref: '#/components/schemas/Loop'
    "#};

    let result = OpenApiReader::default().read_str(text).unwrap();
    assert_eq!(result.diagnostics.with_code("oas::circular_alias").count(), 1);
    assert_eq!(result.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_read() {
    let token = oasdoc_core::CancellationToken::new();
    token.cancel();

    let err = OpenApiReader::new(ReaderSettings::new().with_cancellation(token))
        .read_async(PETS.as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, OpenApiError::Cancelled));
}

#[test]
fn test_swagger_is_rejected() {
    let err = OpenApiReader::default()
        .read_str("swagger: '2.0'\ninfo: {title: t, version: '1'}\n")
        .unwrap_err();
    assert!(matches!(err, OpenApiError::UnsupportedVersion(_)));
}
