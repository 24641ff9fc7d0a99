#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use geo_pipeline::config::AppConfig;
use geo_pipeline::datastore::{Feature, InMemoryFeatureSource, LayerInfo, LayerRegistry, VectorLayer};
use geo_pipeline::geometry::{Bbox, Coord, Geometry};
use geo_pipeline::pipeline::PipelineFile;
use geo_pipeline::security::{SecurityFile, SecurityManager};
use geo_pipeline::services::AppState;
use geo_pipeline::style::{LabelFormula, NamedStyle};

pub const LAYER: &str = "parcels";
pub const JWT_SECRET: &str = "integration-secret";

/// Twenty numbered points on the diagonal of a 20x20 extent; parity is an attribute
pub fn parcels() -> Vec<Feature> {
    (1..=20)
        .map(|i| {
            let mut attributes = Map::new();
            attributes.insert("name".into(), json!(format!("Parcel {}", i)));
            attributes.insert("n".into(), json!(i));
            attributes.insert("parity".into(), json!(if i % 2 == 0 { "even" } else { "odd" }));
            let c = i as f64 - 0.5;
            Feature::new(i.to_string(), attributes, Some(Geometry::Point(Coord(c, c))))
        })
        .collect()
}

pub fn layers() -> Result<LayerRegistry> {
    let mut info = LayerInfo::new(LAYER, Bbox::new(0.0, 0.0, 20.0, 20.0));
    info.styles = vec![
        NamedStyle::new("default").with_label(LabelFormula::Attribute("name".into())),
        NamedStyle::new("numbered").with_label(LabelFormula::Format("#${n} ${parity}".into())),
    ];
    let mut registry = LayerRegistry::new();
    registry.register(VectorLayer::new(info, Arc::new(InMemoryFeatureSource::new(parcels())))?)?;
    Ok(registry)
}

pub const SECURITY: &str = r#"
roles:
  - name: viewer
    layers:
      "*": {}
  - name: even
    layers:
      parcels:
        visible_features: { parity: even }
  - name: west
    layers:
      parcels:
        areas:
          visible:
            type: Polygon
            coordinates: [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]]
  - name: names_only
    layers:
      parcels:
        readable_attributes: [name]
  - name: editor
    layers:
      parcels:
        update: true
        delete: true
        editable_features: { n: { $lte: 3 } }
  - name: admin
    commands: [cache.invalidate]
    layers:
      "*": { update: true, delete: true }

users:
  - { token: viewer-token, user_id: viewer, name: Viewer, locale: en, roles: [viewer] }
  - { token: even-token, user_id: even, name: Even, division: North, roles: [even] }
  - { token: west-token, user_id: west, roles: [west] }
  - { token: names-token, user_id: names, roles: [names_only] }
  - { token: editor-token, user_id: editor, roles: [editor] }
  - { token: admin-token, user_id: admin, name: Admin, organization: HQ, roles: [admin] }
"#;

pub fn config() -> AppConfig {
    let mut config = AppConfig::development();
    config.paging.max_limit = None;
    config.render.tile_size = 64;
    config.security.jwt_secret = Some(JWT_SECRET.to_string());
    config
}

pub fn state() -> Result<AppState> {
    let config = config();
    let security = SecurityManager::from_file(
        SecurityFile::from_yaml_str(SECURITY)?,
        config.security.jwt_secret.as_deref(),
    )?;
    Ok(AppState::build(config, layers()?, security, &PipelineFile::defaults()?)?)
}

pub fn app() -> Result<(Router, AppState)> {
    let state = state()?;
    Ok((geo_pipeline::app(state.clone()), state))
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json)?)
        }
        None => Body::empty(),
    };
    Ok(builder.body(body)?)
}

/// Send a request and decode the JSON body
pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request(method, uri, token, body)?).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

/// Send a request and return the raw body with its content type
pub async fn send_bytes(app: &Router, uri: &str, token: Option<&str>) -> Result<(StatusCode, Option<String>, Vec<u8>)> {
    let response = app.clone().oneshot(request(Method::GET, uri, token, None)?).await?;
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, content_type, bytes.to_vec()))
}

pub async fn search(app: &Router, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
    send_json(app, Method::POST, &format!("/api/features/{}", LAYER), token, Some(body)).await
}

/// Ids of the features in a successful search response
pub fn ids(payload: &Value) -> Vec<String> {
    payload["data"]["features"]
        .as_array()
        .map(|features| {
            features
                .iter()
                .filter_map(|f| f["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn id_range(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|i| i.to_string()).collect()
}
