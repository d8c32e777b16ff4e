//! Request schemas and body validation.
//!
//! Each request type declares its constraints with `validator` derives and
//! its wire shape with [`RequestSchema::FIELDS`]. [`validate_request`] checks
//! presence and JSON types field by field, then the declared constraints, and
//! reports every violation in one message (`field: message, field: message`).
//!
//! [`ExtractEventDataRequest`] and [`FetchBlogPostsRequest`] are the bodies of
//! the event scraper and blog post fetcher. They are kept here so every
//! function shares one validation path.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{Error, Result};

/// MIME types accepted by the upload function.
pub const ALLOWED_FILE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/svg+xml",
];

/// Storage buckets the upload function may write to.
pub const ALLOWED_BUCKETS: &[&str] = &[
    "general-assets",
    "product-thumbnails",
    "product-images",
    "event-thumbnails",
];

/// Blog platforms the post fetcher understands.
pub const BLOG_PLATFORMS: &[&str] = &["all", "medium", "devto"];

fn violation(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn validate_uuid(value: &str) -> std::result::Result<(), ValidationError> {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| violation("uuid", "must be a valid UUID"))
}

fn validate_file_name(value: &str) -> std::result::Result<(), ValidationError> {
    let dangerous = |c: char| matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*') || c.is_control();
    if value.chars().any(dangerous) {
        return Err(violation("file_name", "contains characters that are not allowed"));
    }
    Ok(())
}

fn validate_file_type(value: &str) -> std::result::Result<(), ValidationError> {
    if ALLOWED_FILE_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(violation("file_type", "file type is not allowed"))
    }
}

fn validate_bucket(value: &str) -> std::result::Result<(), ValidationError> {
    if ALLOWED_BUCKETS.contains(&value) {
        Ok(())
    } else {
        Err(violation("bucket", "bucket is not allowed"))
    }
}

fn validate_http_scheme(value: &str) -> std::result::Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(violation("scheme", "must use the http or https scheme")),
    }
}

fn validate_platform(value: &str) -> std::result::Result<(), ValidationError> {
    if BLOG_PLATFORMS.contains(&value) {
        Ok(())
    } else {
        Err(violation("platform", "must be 'all', 'medium' or 'devto'"))
    }
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_quantity() -> i64 {
    1
}

fn default_optimize() -> bool {
    true
}

fn default_platform() -> String {
    "all".to_string()
}

/// Body of the calculate-pricing function.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PricingRequest {
    #[validate(custom(function = "validate_uuid"))]
    pub product_id: String,

    #[serde(default = "default_base_currency")]
    #[validate(length(equal = 3, message = "must be a 3-letter currency code"))]
    pub base_currency: String,

    #[validate(length(equal = 3, message = "must be a 3-letter currency code"))]
    pub target_currency: String,

    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub region: Option<String>,

    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 1000, message = "must be a whole number between 1 and 1000"))]
    pub quantity: i64,
}

impl PricingRequest {
    pub fn product_uuid(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.product_id)
            .map_err(|_| Error::Validation("product_id: must be a valid UUID".to_string()))
    }
}

/// Body of the optimize-and-upload function.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UploadRequest {
    /// Base64 payload, optionally as a `data:` URL
    #[validate(length(min = 1, message = "is required (base64)"))]
    pub file: String,

    #[serde(rename = "fileName")]
    #[validate(
        length(min = 1, max = 255, message = "must be between 1 and 255 characters"),
        custom(function = "validate_file_name")
    )]
    pub file_name: String,

    #[serde(rename = "fileType")]
    #[validate(custom(function = "validate_file_type"))]
    pub file_type: String,

    #[validate(custom(function = "validate_bucket"))]
    pub bucket: String,

    #[serde(default = "default_optimize")]
    pub optimize: bool,
}

/// Body of the event scraper.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExtractEventDataRequest {
    #[validate(
        url(message = "must be a valid URL"),
        length(max = 2048, message = "must be at most 2048 characters"),
        custom(function = "validate_http_scheme")
    )]
    pub url: String,
}

/// Body of the blog post fetcher.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FetchBlogPostsRequest {
    #[serde(default = "default_platform")]
    #[validate(custom(function = "validate_platform"))]
    pub platform: String,

    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub username: Option<String>,
}

/// JSON type a body field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Integer => value.is_i64(),
            FieldKind::Boolean => value.is_boolean(),
        }
    }

    fn expectation(self) -> &'static str {
        match self {
            FieldKind::Text => "must be a string",
            FieldKind::Integer => "must be a whole number",
            FieldKind::Boolean => "must be true or false",
        }
    }

    /// Well-typed stand-in so the remaining fields can still be checked.
    fn placeholder(self) -> Value {
        match self {
            FieldKind::Text => Value::String(String::new()),
            FieldKind::Integer => Value::from(0),
            FieldKind::Boolean => Value::Bool(false),
        }
    }
}

/// One top-level body field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Key on the wire
    pub name: &'static str,
    /// Rust field name, as `validator` may report it
    pub ident: &'static str,
    pub kind: FieldKind,
    /// Absent or null is a violation; otherwise the serde default applies
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, ident: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            ident,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ident: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            ident,
            kind,
            required: false,
        }
    }
}

/// A request body that [`validate_request`] can check.
pub trait RequestSchema: DeserializeOwned + Validate {
    const FIELDS: &'static [FieldSpec];
}

impl RequestSchema for PricingRequest {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("product_id", "product_id", FieldKind::Text),
        FieldSpec::optional("base_currency", "base_currency", FieldKind::Text),
        FieldSpec::required("target_currency", "target_currency", FieldKind::Text),
        FieldSpec::optional("region", "region", FieldKind::Text),
        FieldSpec::optional("quantity", "quantity", FieldKind::Integer),
    ];
}

impl RequestSchema for UploadRequest {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("file", "file", FieldKind::Text),
        FieldSpec::required("fileName", "file_name", FieldKind::Text),
        FieldSpec::required("fileType", "file_type", FieldKind::Text),
        FieldSpec::required("bucket", "bucket", FieldKind::Text),
        FieldSpec::optional("optimize", "optimize", FieldKind::Boolean),
    ];
}

impl RequestSchema for ExtractEventDataRequest {
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::required("url", "url", FieldKind::Text)];
}

impl RequestSchema for FetchBlogPostsRequest {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::optional("platform", "platform", FieldKind::Text),
        FieldSpec::optional("username", "username", FieldKind::Text),
    ];
}

/// Check presence and type of every declared field.
///
/// Offending fields are replaced (required) or dropped (optional) so the
/// object still deserializes and the other constraints can be evaluated.
fn check_shape(fields: &mut Map<String, Value>, specs: &[FieldSpec]) -> Vec<(String, String)> {
    let mut problems = Vec::new();

    for spec in specs {
        let problem = match fields.get(spec.name) {
            None | Some(Value::Null) if spec.required => Some("is required"),
            None | Some(Value::Null) => None,
            Some(value) if !spec.kind.accepts(value) => Some(spec.kind.expectation()),
            Some(_) => continue,
        };

        if spec.required {
            fields.insert(spec.name.to_string(), spec.kind.placeholder());
        } else {
            fields.remove(spec.name);
        }

        if let Some(message) = problem {
            problems.push((spec.name.to_string(), message.to_string()));
        }
    }

    problems
}

/// Validator output as `(field, message)` pairs.
fn field_messages(errors: &ValidationErrors) -> Vec<(String, String)> {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            let field = field.to_string();
            field_errors.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("failed {} check", e.code));
                (field.clone(), message)
            })
        })
        .collect()
}

fn join_messages(mut parts: Vec<(String, String)>) -> String {
    parts.sort();
    parts
        .into_iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Flatten validator output into `field: message` pairs, sorted by field.
pub fn describe_errors(errors: &ValidationErrors) -> String {
    join_messages(field_messages(errors))
}

/// Parse `body` as JSON into `T` and check every declared constraint.
///
/// Performs no I/O. Only unparseable JSON stops early, as a single `body:`
/// violation; missing and wrong-typed fields are reported alongside every
/// other violated constraint.
pub fn validate_request<T>(body: &[u8]) -> Result<T>
where
    T: RequestSchema,
{
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::Validation(format!("body: {}", e)))?;
    let Value::Object(mut fields) = value else {
        return Err(Error::Validation("body: must be a JSON object".to_string()));
    };

    let mut problems = check_shape(&mut fields, T::FIELDS);

    let parsed: T = serde_json::from_value(Value::Object(fields))
        .map_err(|e| Error::Validation(format!("body: {}", e)))?;

    if let Err(errors) = parsed.validate() {
        let shape_failed = |field: &str| {
            T::FIELDS.iter().any(|spec| {
                (spec.name == field || spec.ident == field)
                    && problems.iter().any(|(name, _)| name == spec.name)
            })
        };
        let constraint_problems: Vec<_> = field_messages(&errors)
            .into_iter()
            .filter(|(field, _)| !shape_failed(field))
            .collect();
        problems.extend(constraint_problems);
    }

    if problems.is_empty() {
        Ok(parsed)
    } else {
        Err(Error::Validation(join_messages(problems)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_message<T: RequestSchema + std::fmt::Debug>(body: &str) -> String {
        match validate_request::<T>(body.as_bytes()) {
            Err(Error::Validation(message)) => message,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_pricing_defaults_applied() {
        let request: PricingRequest = validate_request(
            br#"{"product_id":"6f1c1f1e-8d7a-4a53-9a51-3f0b0e8f9c11","target_currency":"COP"}"#,
        )
        .unwrap();

        assert_eq!(request.base_currency, "USD");
        assert_eq!(request.quantity, 1);
        assert_eq!(request.region, None);
        assert!(request.product_uuid().is_ok());
    }

    #[test]
    fn test_pricing_reports_every_violation() {
        let message = validation_message::<PricingRequest>(
            r#"{"product_id":"not-a-uuid","target_currency":"CO","quantity":0}"#,
        );

        assert!(message.contains("product_id: must be a valid UUID"), "{}", message);
        assert!(message.contains("target_currency: must be a 3-letter currency code"), "{}", message);
        assert!(message.contains("quantity:"), "{}", message);
    }

    #[test]
    fn test_missing_field_reported_with_other_violations() {
        let message = validation_message::<PricingRequest>(r#"{"product_id":"not-a-uuid"}"#);

        assert_eq!(
            message,
            "product_id: must be a valid UUID, target_currency: is required"
        );
    }

    #[test]
    fn test_wrong_type_reported_with_other_violations() {
        let message = validation_message::<PricingRequest>(
            r#"{"product_id":"not-a-uuid","target_currency":"COP","quantity":"two"}"#,
        );

        assert!(message.contains("product_id: must be a valid UUID"), "{}", message);
        assert!(message.contains("quantity: must be a whole number"), "{}", message);
        assert!(!message.contains("between 1 and 1000"), "{}", message);
    }

    #[test]
    fn test_null_required_and_optional_fields() {
        let message = validation_message::<PricingRequest>(
            r#"{"product_id":null,"target_currency":"COP","region":null}"#,
        );
        assert_eq!(message, "product_id: is required");

        let request: PricingRequest = validate_request(
            br#"{"product_id":"6f1c1f1e-8d7a-4a53-9a51-3f0b0e8f9c11","target_currency":"COP","quantity":null}"#,
        )
        .unwrap();
        assert_eq!(request.quantity, 1);
    }

    #[test]
    fn test_upload_shape_errors_use_wire_names() {
        let message = validation_message::<UploadRequest>(
            r#"{"file":"aGVsbG8=","fileType":42,"bucket":"secrets","optimize":"yes"}"#,
        );

        assert!(message.contains("fileName: is required"), "{}", message);
        assert!(message.contains("fileType: must be a string"), "{}", message);
        assert!(message.contains("optimize: must be true or false"), "{}", message);
        assert!(message.contains("bucket: bucket is not allowed"), "{}", message);
        assert!(!message.contains("between 1 and 255"), "{}", message);
        assert!(!message.contains("file type is not allowed"), "{}", message);
    }

    #[test]
    fn test_non_object_body_rejected() {
        let message = validation_message::<PricingRequest>("[1, 2]");
        assert_eq!(message, "body: must be a JSON object");
    }

    #[test]
    fn test_pricing_quantity_upper_bound() {
        let message = validation_message::<PricingRequest>(
            r#"{"product_id":"6f1c1f1e-8d7a-4a53-9a51-3f0b0e8f9c11","target_currency":"COP","quantity":1001}"#,
        );
        assert!(message.starts_with("quantity:"), "{}", message);
    }

    #[test]
    fn test_malformed_body_is_validation_error() {
        let message = validation_message::<PricingRequest>("{not json");
        assert!(message.starts_with("body:"), "{}", message);
    }

    #[test]
    fn test_upload_defaults_optimize_to_true() {
        let request: UploadRequest = validate_request(
            br#"{"file":"aGVsbG8=","fileName":"logo.png","fileType":"image/png","bucket":"general-assets"}"#,
        )
        .unwrap();
        assert!(request.optimize);
        assert_eq!(request.file_name, "logo.png");
    }

    #[test]
    fn test_upload_rejects_unknown_type_bucket_and_name() {
        let message = validation_message::<UploadRequest>(
            r#"{"file":"aGVsbG8=","fileName":"../a<b>.png","fileType":"application/pdf","bucket":"secrets"}"#,
        );

        assert!(message.contains("bucket: bucket is not allowed"), "{}", message);
        assert!(message.contains("file type is not allowed"), "{}", message);
        assert!(message.contains("contains characters that are not allowed"), "{}", message);
    }

    #[test]
    fn test_event_url_must_be_http() {
        let message = validation_message::<ExtractEventDataRequest>(r#"{"url":"ftp://example.com/event"}"#);
        assert!(message.contains("url: must use the http or https scheme"), "{}", message);

        let ok: ExtractEventDataRequest =
            validate_request(br#"{"url":"https://www.passline.com/eventos/fiesta"}"#).unwrap();
        assert_eq!(ok.url, "https://www.passline.com/eventos/fiesta");
    }

    #[test]
    fn test_blog_platform_default_and_allow_list() {
        let request: FetchBlogPostsRequest = validate_request(b"{}").unwrap();
        assert_eq!(request.platform, "all");

        let message = validation_message::<FetchBlogPostsRequest>(r#"{"platform":"myspace","username":""}"#);
        assert!(message.contains("platform:"), "{}", message);
        assert!(message.contains("username:"), "{}", message);
    }
}
