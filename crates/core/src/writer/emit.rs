use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use super::Emitter;
use crate::model::{
    AdditionalProperties, Callback, Component, Components, Contact, Encoding, Example, Extensions,
    ExternalDocs, Handle, Header, Info, License, Link, MediaType, OAuthFlow, OAuthFlows, Operation,
    Parameter, PathItem, RequestBody, Response, Schema, SchemaType, SecurityRequirement,
    SecurityScheme, Server, ServerVariable, Tag,
};

/// Components the writer can render as an object
pub(crate) trait Emit: Component {
    fn emit(&self, e: &mut Emitter<'_>) -> Map<String, Value>;
}

fn put_text(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.clone()));
    }
}

fn put_flag(map: &mut Map<String, Value>, key: &str, value: bool) {
    if value {
        map.insert(key.to_string(), Value::Bool(true));
    }
}

fn put_value(map: &mut Map<String, Value>, key: &str, value: &Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.clone());
    }
}

fn put_extensions(map: &mut Map<String, Value>, extensions: &Extensions) {
    for (key, value) in extensions {
        map.insert(key.clone(), value.clone());
    }
}

/// Integral values are written without a fraction
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Value::from(value as i64);
    }
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn strings(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

impl Emitter<'_> {
    pub(super) fn document(&mut self) -> Map<String, Value> {
        let document = self.document_ref();
        let mut map = Map::new();
        map.insert("openapi".to_string(), Value::String(self.settings.target.as_str().to_string()));
        map.insert("info".to_string(), Value::Object(self.info(&document.info)));
        if self.is_3_1() {
            put_text(&mut map, "jsonSchemaDialect", &document.json_schema_dialect);
        }
        if !document.servers.is_empty() {
            map.insert("servers".to_string(), self.servers(&document.servers));
        }
        map.insert("paths".to_string(), self.handle_map(&document.paths));
        if self.is_3_1() && !document.webhooks.is_empty() {
            map.insert("webhooks".to_string(), self.handle_map(&document.webhooks));
        }
        let components = self.components(&document.components);
        if !components.is_empty() {
            map.insert("components".to_string(), Value::Object(components));
        }
        if !document.security.is_empty() {
            map.insert("security".to_string(), self.security(&document.security));
        }
        if !document.tags.is_empty() {
            map.insert("tags".to_string(), self.handles(&document.tags));
        }
        if let Some(docs) = &document.external_docs {
            map.insert("externalDocs".to_string(), external_docs(docs));
        }
        put_extensions(&mut map, &document.extensions);
        map
    }

    fn handles<T: Emit>(&mut self, handles: &[Handle<T>]) -> Value {
        Value::Array(handles.iter().map(|h| self.handle(*h)).collect())
    }

    fn handle_map<T: Emit>(&mut self, handles: &IndexMap<String, Handle<T>>) -> Value {
        let mut map = Map::new();
        for (name, handle) in handles {
            map.insert(name.clone(), self.handle(*handle));
        }
        Value::Object(map)
    }

    fn put_handle_map<T: Emit>(&mut self, map: &mut Map<String, Value>, key: &str, handles: &IndexMap<String, Handle<T>>) {
        if !handles.is_empty() {
            map.insert(key.to_string(), self.handle_map(handles));
        }
    }

    fn info(&mut self, info: &Info) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("title".to_string(), Value::String(info.title.clone()));
        if self.is_3_1() {
            put_text(&mut map, "summary", &info.summary);
        }
        put_text(&mut map, "description", &info.description);
        put_text(&mut map, "termsOfService", &info.terms_of_service);
        if let Some(contact) = &info.contact {
            map.insert("contact".to_string(), Value::Object(contact_map(contact)));
        }
        if let Some(license) = &info.license {
            map.insert("license".to_string(), Value::Object(self.license(license)));
        }
        map.insert("version".to_string(), Value::String(info.version.clone()));
        put_extensions(&mut map, &info.extensions);
        map
    }

    fn license(&self, license: &License) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(license.name.clone()));
        if self.is_3_1() {
            put_text(&mut map, "identifier", &license.identifier);
        }
        put_text(&mut map, "url", &license.url);
        put_extensions(&mut map, &license.extensions);
        map
    }

    fn servers(&self, servers: &[Server]) -> Value {
        Value::Array(servers.iter().map(|server| Value::Object(server_map(server))).collect())
    }

    fn components(&mut self, components: &Components) -> Map<String, Value> {
        let mut map = Map::new();
        self.put_handle_map(&mut map, "schemas", &components.schemas);
        self.put_handle_map(&mut map, "responses", &components.responses);
        self.put_handle_map(&mut map, "parameters", &components.parameters);
        self.put_handle_map(&mut map, "examples", &components.examples);
        self.put_handle_map(&mut map, "requestBodies", &components.request_bodies);
        self.put_handle_map(&mut map, "headers", &components.headers);
        self.put_handle_map(&mut map, "securitySchemes", &components.security_schemes);
        self.put_handle_map(&mut map, "links", &components.links);
        self.put_handle_map(&mut map, "callbacks", &components.callbacks);
        if self.is_3_1() {
            self.put_handle_map(&mut map, "pathItems", &components.path_items);
        }
        put_extensions(&mut map, &components.extensions);
        map
    }

    fn security(&self, requirements: &[SecurityRequirement]) -> Value {
        let list = requirements
            .iter()
            .map(|requirement| {
                let mut map = Map::new();
                for (scheme, scopes) in &requirement.schemes {
                    map.insert(self.scheme_name(*scheme), strings(scopes));
                }
                Value::Object(map)
            })
            .collect();
        Value::Array(list)
    }

    fn operation(&mut self, operation: &Operation) -> Map<String, Value> {
        let mut map = Map::new();
        if !operation.tags.is_empty() {
            let names = operation.tags.iter().map(|h| Value::String(self.tag_name(*h))).collect();
            map.insert("tags".to_string(), Value::Array(names));
        }
        put_text(&mut map, "summary", &operation.summary);
        put_text(&mut map, "description", &operation.description);
        if let Some(docs) = &operation.external_docs {
            map.insert("externalDocs".to_string(), external_docs(docs));
        }
        put_text(&mut map, "operationId", &operation.operation_id);
        if !operation.parameters.is_empty() {
            map.insert("parameters".to_string(), self.handles(&operation.parameters));
        }
        if let Some(body) = operation.request_body {
            map.insert("requestBody".to_string(), self.handle(body));
        }
        if !operation.responses.is_empty() || !self.is_3_1() {
            map.insert("responses".to_string(), self.handle_map(&operation.responses));
        }
        self.put_handle_map(&mut map, "callbacks", &operation.callbacks);
        put_flag(&mut map, "deprecated", operation.deprecated);
        if let Some(security) = &operation.security {
            map.insert("security".to_string(), self.security(security));
        }
        if !operation.servers.is_empty() {
            map.insert("servers".to_string(), self.servers(&operation.servers));
        }
        put_extensions(&mut map, &operation.extensions);
        map
    }

    fn media_types(&mut self, content: &IndexMap<String, MediaType>) -> Value {
        let mut map = Map::new();
        for (media_type, value) in content {
            map.insert(media_type.clone(), Value::Object(self.media_type(value)));
        }
        Value::Object(map)
    }

    fn media_type(&mut self, media: &MediaType) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(schema) = media.schema {
            map.insert("schema".to_string(), self.handle(schema));
        }
        put_value(&mut map, "example", &media.example);
        self.put_handle_map(&mut map, "examples", &media.examples);
        if !media.encoding.is_empty() {
            let mut encodings = Map::new();
            for (name, encoding) in &media.encoding {
                encodings.insert(name.clone(), Value::Object(self.encoding(encoding)));
            }
            map.insert("encoding".to_string(), Value::Object(encodings));
        }
        put_extensions(&mut map, &media.extensions);
        map
    }

    fn encoding(&mut self, encoding: &Encoding) -> Map<String, Value> {
        let mut map = Map::new();
        put_text(&mut map, "contentType", &encoding.content_type);
        self.put_handle_map(&mut map, "headers", &encoding.headers);
        put_text(&mut map, "style", &encoding.style);
        if let Some(explode) = encoding.explode {
            map.insert("explode".to_string(), Value::Bool(explode));
        }
        put_extensions(&mut map, &encoding.extensions);
        map
    }

    fn schema_type(&self, schema: &Schema, map: &mut Map<String, Value>) {
        if self.is_3_1() {
            let mut types: Vec<SchemaType> = schema.schema_type.clone();
            if schema.nullable && !types.is_empty() && !types.contains(&SchemaType::Null) {
                types.push(SchemaType::Null);
            }
            match types.as_slice() {
                [] => {}
                [single] => {
                    map.insert("type".to_string(), Value::String(single.as_str().to_string()));
                }
                many => {
                    let list = many.iter().map(|t| Value::String(t.as_str().to_string())).collect();
                    map.insert("type".to_string(), Value::Array(list));
                }
            }
        } else if let Some(primary) = schema.primary_type() {
            map.insert("type".to_string(), Value::String(primary.as_str().to_string()));
        }
    }
}

fn contact_map(contact: &Contact) -> Map<String, Value> {
    let mut map = Map::new();
    put_text(&mut map, "name", &contact.name);
    put_text(&mut map, "url", &contact.url);
    put_text(&mut map, "email", &contact.email);
    put_extensions(&mut map, &contact.extensions);
    map
}

fn server_map(server: &Server) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("url".to_string(), Value::String(server.url.clone()));
    put_text(&mut map, "description", &server.description);
    if !server.variables.is_empty() {
        let mut variables = Map::new();
        for (name, variable) in &server.variables {
            variables.insert(name.clone(), Value::Object(variable_map(variable)));
        }
        map.insert("variables".to_string(), Value::Object(variables));
    }
    put_extensions(&mut map, &server.extensions);
    map
}

fn variable_map(variable: &ServerVariable) -> Map<String, Value> {
    let mut map = Map::new();
    if !variable.enum_values.is_empty() {
        map.insert("enum".to_string(), strings(&variable.enum_values));
    }
    map.insert("default".to_string(), Value::String(variable.default.clone()));
    put_text(&mut map, "description", &variable.description);
    put_extensions(&mut map, &variable.extensions);
    map
}

fn external_docs(docs: &ExternalDocs) -> Value {
    let mut map = Map::new();
    put_text(&mut map, "description", &docs.description);
    map.insert("url".to_string(), Value::String(docs.url.clone()));
    put_extensions(&mut map, &docs.extensions);
    Value::Object(map)
}

fn oauth_flows(flows: &OAuthFlows) -> Value {
    let mut map = Map::new();
    let named = [
        ("implicit", &flows.implicit),
        ("password", &flows.password),
        ("clientCredentials", &flows.client_credentials),
        ("authorizationCode", &flows.authorization_code),
    ];
    for (key, flow) in named {
        if let Some(flow) = flow {
            map.insert(key.to_string(), oauth_flow(flow));
        }
    }
    put_extensions(&mut map, &flows.extensions);
    Value::Object(map)
}

fn oauth_flow(flow: &OAuthFlow) -> Value {
    let mut map = Map::new();
    put_text(&mut map, "authorizationUrl", &flow.authorization_url);
    put_text(&mut map, "tokenUrl", &flow.token_url);
    put_text(&mut map, "refreshUrl", &flow.refresh_url);
    let scopes = flow
        .scopes
        .iter()
        .map(|(name, description)| (name.clone(), Value::String(description.clone())))
        .collect();
    map.insert("scopes".to_string(), Value::Object(scopes));
    put_extensions(&mut map, &flow.extensions);
    Value::Object(map)
}

impl Emit for Schema {
    fn emit(&self, e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        if e.is_3_1() {
            put_text(&mut map, "$id", &self.id);
            put_text(&mut map, "$anchor", &self.anchor);
            put_text(&mut map, "$schema", &self.dialect);
        }
        put_text(&mut map, "title", &self.title);
        put_text(&mut map, "description", &self.description);
        e.schema_type(self, &mut map);
        put_text(&mut map, "format", &self.format);
        if !e.is_3_1() {
            put_flag(&mut map, "nullable", self.is_nullable());
        }
        if !self.required.is_empty() {
            map.insert("required".to_string(), strings(&self.required));
        }
        e.put_handle_map(&mut map, "properties", &self.properties);
        match self.additional_properties {
            Some(AdditionalProperties::Allowed(allowed)) => {
                map.insert("additionalProperties".to_string(), Value::Bool(allowed));
            }
            Some(AdditionalProperties::Schema(schema)) => {
                map.insert("additionalProperties".to_string(), e.handle(schema));
            }
            None => {}
        }
        if let Some(items) = self.items {
            map.insert("items".to_string(), e.handle(items));
        }
        for (key, list) in [("allOf", &self.all_of), ("anyOf", &self.any_of), ("oneOf", &self.one_of)] {
            if !list.is_empty() {
                map.insert(key.to_string(), e.handles(list));
            }
        }
        if let Some(not) = self.not {
            map.insert("not".to_string(), e.handle(not));
        }
        if let Some(discriminator) = &self.discriminator {
            let mut node = Map::new();
            node.insert(
                "propertyName".to_string(),
                Value::String(discriminator.property_name.clone()),
            );
            if !discriminator.mapping.is_empty() {
                let mapping = discriminator
                    .mapping
                    .iter()
                    .map(|(name, target)| (name.clone(), Value::String(target.clone())))
                    .collect();
                node.insert("mapping".to_string(), Value::Object(mapping));
            }
            map.insert("discriminator".to_string(), Value::Object(node));
        }
        if !self.enum_values.is_empty() {
            map.insert("enum".to_string(), Value::Array(self.enum_values.clone()));
        }
        put_value(&mut map, "default", &self.default);
        put_value(&mut map, "example", &self.example);
        put_flag(&mut map, "readOnly", self.read_only);
        put_flag(&mut map, "writeOnly", self.write_only);
        put_flag(&mut map, "deprecated", self.deprecated);
        for (key, value) in [("minimum", self.minimum), ("maximum", self.maximum)] {
            if let Some(value) = value {
                map.insert(key.to_string(), number(value));
            }
        }
        let counts = [
            ("minLength", self.min_length),
            ("maxLength", self.max_length),
            ("minItems", self.min_items),
            ("maxItems", self.max_items),
        ];
        for (key, value) in counts {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::from(value));
            }
        }
        put_text(&mut map, "pattern", &self.pattern);
        for (key, value) in &self.keywords {
            map.insert(key.clone(), value.clone());
        }
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for PathItem {
    fn emit(&self, e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        put_text(&mut map, "summary", &self.summary);
        put_text(&mut map, "description", &self.description);
        for (method, operation) in &self.operations {
            map.insert(method.as_str().to_string(), Value::Object(e.operation(operation)));
        }
        if !self.servers.is_empty() {
            map.insert("servers".to_string(), e.servers(&self.servers));
        }
        if !self.parameters.is_empty() {
            map.insert("parameters".to_string(), e.handles(&self.parameters));
        }
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for Parameter {
    fn emit(&self, e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(location) = self.location {
            map.insert("in".to_string(), Value::String(location.as_str().to_string()));
        }
        put_text(&mut map, "description", &self.description);
        put_flag(&mut map, "required", self.required);
        put_flag(&mut map, "deprecated", self.deprecated);
        put_flag(&mut map, "allowEmptyValue", self.allow_empty_value);
        put_text(&mut map, "style", &self.style);
        if let Some(explode) = self.explode {
            map.insert("explode".to_string(), Value::Bool(explode));
        }
        if let Some(schema) = self.schema {
            map.insert("schema".to_string(), e.handle(schema));
        }
        put_value(&mut map, "example", &self.example);
        e.put_handle_map(&mut map, "examples", &self.examples);
        if !self.content.is_empty() {
            map.insert("content".to_string(), e.media_types(&self.content));
        }
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for RequestBody {
    fn emit(&self, e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        put_text(&mut map, "description", &self.description);
        map.insert("content".to_string(), e.media_types(&self.content));
        put_flag(&mut map, "required", self.required);
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for Response {
    fn emit(&self, e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "description".to_string(),
            Value::String(self.description.clone().unwrap_or_default()),
        );
        e.put_handle_map(&mut map, "headers", &self.headers);
        if !self.content.is_empty() {
            map.insert("content".to_string(), e.media_types(&self.content));
        }
        e.put_handle_map(&mut map, "links", &self.links);
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for Header {
    fn emit(&self, e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        put_text(&mut map, "description", &self.description);
        put_flag(&mut map, "required", self.required);
        put_flag(&mut map, "deprecated", self.deprecated);
        put_text(&mut map, "style", &self.style);
        if let Some(explode) = self.explode {
            map.insert("explode".to_string(), Value::Bool(explode));
        }
        if let Some(schema) = self.schema {
            map.insert("schema".to_string(), e.handle(schema));
        }
        put_value(&mut map, "example", &self.example);
        e.put_handle_map(&mut map, "examples", &self.examples);
        if !self.content.is_empty() {
            map.insert("content".to_string(), e.media_types(&self.content));
        }
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for Example {
    fn emit(&self, _e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        put_text(&mut map, "summary", &self.summary);
        put_text(&mut map, "description", &self.description);
        put_value(&mut map, "value", &self.value);
        put_text(&mut map, "externalValue", &self.external_value);
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for Link {
    fn emit(&self, _e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        put_text(&mut map, "operationRef", &self.operation_ref);
        put_text(&mut map, "operationId", &self.operation_id);
        if !self.parameters.is_empty() {
            let parameters = self
                .parameters
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            map.insert("parameters".to_string(), Value::Object(parameters));
        }
        put_value(&mut map, "requestBody", &self.request_body);
        put_text(&mut map, "description", &self.description);
        if let Some(server) = &self.server {
            map.insert("server".to_string(), Value::Object(server_map(server)));
        }
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for Callback {
    fn emit(&self, e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        for (expression, item) in &self.expressions {
            map.insert(expression.clone(), e.handle(*item));
        }
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for SecurityScheme {
    fn emit(&self, _e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(scheme_type) = self.scheme_type {
            map.insert("type".to_string(), Value::String(scheme_type.as_str().to_string()));
        }
        put_text(&mut map, "description", &self.description);
        put_text(&mut map, "name", &self.name);
        put_text(&mut map, "in", &self.location);
        put_text(&mut map, "scheme", &self.scheme);
        put_text(&mut map, "bearerFormat", &self.bearer_format);
        if let Some(flows) = &self.flows {
            map.insert("flows".to_string(), oauth_flows(flows));
        }
        put_text(&mut map, "openIdConnectUrl", &self.open_id_connect_url);
        put_extensions(&mut map, &self.extensions);
        map
    }
}

impl Emit for Tag {
    fn emit(&self, _e: &mut Emitter<'_>) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        put_text(&mut map, "description", &self.description);
        if let Some(docs) = &self.external_docs {
            map.insert("externalDocs".to_string(), external_docs(docs));
        }
        put_extensions(&mut map, &self.extensions);
        map
    }
}
