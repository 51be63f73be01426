//! Custom FHIR extension codecs.
//!
//! Each ancillary domain field travels as one extension whose URL is
//! `{base_url}/fhir/extensions/{field}`. Instead of branching over URLs inline,
//! every mapper owns an [`ExtensionRegistry`]: a list of [`ExtensionCodec`]s
//! walked once per encode and once per decode.
//!
//! Decoding is tolerant. A missing URL, or a present URL whose typed value slot
//! is empty, leaves the field untouched. When several extensions share a URL the
//! first one wins.

use crate::wire::Extension;

/// Typed value slot an extension populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Boolean,
}

/// A value read from, or written to, an extension.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ExtensionValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ExtensionValue::String(_) => ValueKind::String,
            ExtensionValue::Integer(_) => ValueKind::Integer,
            ExtensionValue::Boolean(_) => ValueKind::Boolean,
        }
    }
}

impl Extension {
    /// Build an extension carrying `value` in its typed slot.
    pub fn typed(url: String, title: Option<String>, value: ExtensionValue) -> Self {
        let mut ext = Extension {
            url,
            title,
            ..Extension::default()
        };
        match value {
            ExtensionValue::String(s) => ext.value_string = Some(s),
            ExtensionValue::Integer(i) => ext.value_integer = Some(i),
            ExtensionValue::Boolean(b) => ext.value_boolean = Some(b),
        }
        ext
    }

    /// Read the slot selected by `kind`.
    pub fn value(&self, kind: ValueKind) -> Option<ExtensionValue> {
        match kind {
            ValueKind::String => self.value_string.clone().map(ExtensionValue::String),
            ValueKind::Integer => self.value_integer.map(ExtensionValue::Integer),
            ValueKind::Boolean => self.value_boolean.map(ExtensionValue::Boolean),
        }
    }

    /// Last path segment of the URL (the field name for our own extensions).
    pub fn field_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

/// URL under which `field` is published.
pub fn extension_url(base_url: &str, field: &str) -> String {
    format!("{}/fhir/extensions/{}", base_url.trim_end_matches('/'), field)
}

/// How a codec recognises its extension URL on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlMatch {
    /// URL ends with `/fhir/extensions/{field}` (any base URL).
    Published,
    /// URL is exactly the field name (nested sub-extensions).
    Local,
    /// URL contains the field name anywhere.
    Contains,
}

impl UrlMatch {
    fn matches(self, url: &str, field: &str) -> bool {
        match self {
            UrlMatch::Published => url
                .strip_suffix(field)
                .is_some_and(|head| head.ends_with("/fhir/extensions/")),
            UrlMatch::Local => url == field,
            UrlMatch::Contains => url.contains(field),
        }
    }
}

/// First extension in `extensions` recognised as `field`.
pub fn find_extension<'a>(
    extensions: &'a [Extension],
    field: &str,
    matching: UrlMatch,
) -> Option<&'a Extension> {
    extensions.iter().find(|e| matching.matches(&e.url, field))
}

/// Encodes one internal field into an extension and back.
pub trait ExtensionCodec<T>: Send + Sync {
    /// Field name used in the URL and the `title`.
    fn field(&self) -> &'static str;

    /// Extension for `record`, or `None` when the field is absent.
    fn encode(&self, record: &T, base_url: &str) -> Option<Extension>;

    /// Apply the matching extension (if any) to `record`.
    fn decode(&self, extensions: &[Extension], record: &mut T);
}

type Getter<T> = Box<dyn Fn(&T) -> Option<ExtensionValue> + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, ExtensionValue) + Send + Sync>;

/// Codec for a single string, integer or boolean field.
pub struct ScalarExtension<T> {
    field: &'static str,
    kind: ValueKind,
    matching: UrlMatch,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T: 'static> ScalarExtension<T> {
    pub fn string(
        field: &'static str,
        get: fn(&T) -> Option<&str>,
        set: fn(&mut T, String),
    ) -> Self {
        Self {
            field,
            kind: ValueKind::String,
            matching: UrlMatch::Published,
            get: Box::new(move |r| get(r).map(|s| ExtensionValue::String(s.to_string()))),
            set: Box::new(move |r, v| {
                if let ExtensionValue::String(s) = v {
                    set(r, s)
                }
            }),
        }
    }

    pub fn integer(field: &'static str, get: fn(&T) -> Option<i64>, set: fn(&mut T, i64)) -> Self {
        Self {
            field,
            kind: ValueKind::Integer,
            matching: UrlMatch::Published,
            get: Box::new(move |r| get(r).map(ExtensionValue::Integer)),
            set: Box::new(move |r, v| {
                if let ExtensionValue::Integer(i) = v {
                    set(r, i)
                }
            }),
        }
    }

    pub fn boolean(field: &'static str, get: fn(&T) -> Option<bool>, set: fn(&mut T, bool)) -> Self {
        Self {
            field,
            kind: ValueKind::Boolean,
            matching: UrlMatch::Published,
            get: Box::new(move |r| get(r).map(ExtensionValue::Boolean)),
            set: Box::new(move |r, v| {
                if let ExtensionValue::Boolean(b) = v {
                    set(r, b)
                }
            }),
        }
    }

    /// Override how the URL is recognised on decode.
    pub fn matching(mut self, matching: UrlMatch) -> Self {
        self.matching = matching;
        self
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    fn encode_value(&self, record: &T) -> Option<ExtensionValue> {
        (self.get)(record)
    }

    fn apply(&self, ext: &Extension, record: &mut T) {
        if let Some(value) = ext.value(self.kind) {
            (self.set)(record, value);
        }
    }
}

impl<T: 'static> ExtensionCodec<T> for ScalarExtension<T> {
    fn field(&self) -> &'static str {
        self.field
    }

    fn encode(&self, record: &T, base_url: &str) -> Option<Extension> {
        let value = self.encode_value(record)?;
        Some(Extension::typed(
            extension_url(base_url, self.field),
            Some(self.field.to_string()),
            value,
        ))
    }

    fn decode(&self, extensions: &[Extension], record: &mut T) {
        if let Some(ext) = find_extension(extensions, self.field, self.matching) {
            self.apply(ext, record);
        }
    }
}

/// Codec for a field made of several sub-values (e.g. insurance), published as
/// one extension whose nested `extension` entries are keyed by local name.
pub struct CompositeExtension<T> {
    field: &'static str,
    parts: Vec<ScalarExtension<T>>,
}

impl<T: 'static> CompositeExtension<T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            parts: Vec::new(),
        }
    }

    /// Add a sub-value. The part's field name becomes its local URL.
    pub fn part(mut self, part: ScalarExtension<T>) -> Self {
        self.parts.push(part.matching(UrlMatch::Local));
        self
    }
}

impl<T: 'static> ExtensionCodec<T> for CompositeExtension<T> {
    fn field(&self) -> &'static str {
        self.field
    }

    fn encode(&self, record: &T, base_url: &str) -> Option<Extension> {
        let nested: Vec<Extension> = self
            .parts
            .iter()
            .filter_map(|part| {
                let value = part.encode_value(record)?;
                Some(Extension::typed(part.field.to_string(), None, value))
            })
            .collect();

        if nested.is_empty() {
            return None;
        }

        Some(Extension {
            url: extension_url(base_url, self.field),
            extension: nested,
            title: Some(self.field.to_string()),
            ..Extension::default()
        })
    }

    fn decode(&self, extensions: &[Extension], record: &mut T) {
        let Some(ext) = find_extension(extensions, self.field, UrlMatch::Published) else {
            return;
        };
        for part in &self.parts {
            part.decode(&ext.extension, record);
        }
    }
}

/// Ordered set of extension codecs for one record type.
pub struct ExtensionRegistry<T> {
    codecs: Vec<Box<dyn ExtensionCodec<T>>>,
}

impl<T> Default for ExtensionRegistry<T> {
    fn default() -> Self {
        Self { codecs: Vec::new() }
    }
}

impl<T> ExtensionRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec (builder style).
    pub fn with(mut self, codec: impl ExtensionCodec<T> + 'static) -> Self {
        self.codecs.push(Box::new(codec));
        self
    }

    /// Field names in registration order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|c| c.field()).collect()
    }

    pub fn encode(&self, record: &T, base_url: &str) -> Vec<Extension> {
        self.codecs
            .iter()
            .filter_map(|c| c.encode(record, base_url))
            .collect()
    }

    pub fn decode(&self, extensions: &[Extension], record: &mut T) {
        for codec in &self.codecs {
            codec.decode(extensions, record);
        }
    }
}
