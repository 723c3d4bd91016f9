//! Service identity attached to all exported telemetry.

use std::collections::HashMap;
use std::sync::LazyLock;

use opentelemetry::{Key, Value};
use opentelemetry_sdk::Resource;
use parking_lot::Mutex;

/// Attribute key for the service name
pub const SERVICE_NAME: &str = "service.name";

/// Attribute key for the service version
pub const SERVICE_VERSION: &str = "service.version";

static RESOURCES: LazyLock<Mutex<HashMap<(String, String), Resource>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Get the resource for a service identity
///
/// Memoized: the same name and version always return the same resource.
pub fn service_resource(name: &str, version: &str) -> Resource {
    RESOURCES
        .lock()
        .entry((name.to_string(), version.to_string()))
        .or_insert_with(|| {
            Resource::builder_empty()
                .with_service_name(name.to_string())
                .with_attribute(opentelemetry::KeyValue::new(SERVICE_VERSION, version.to_string()))
                .build()
        })
        .clone()
}

/// The `service.name` attribute of a resource
pub fn service_name(resource: &Resource) -> Option<String> {
    match resource.get(&Key::from_static_str(SERVICE_NAME)) {
        Some(Value::String(name)) => Some(name.as_str().to_string()),
        _ => None,
    }
}
