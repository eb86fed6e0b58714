//! Body decoders for JSON and URL-encoded form requests.
//!
//! Decoded bodies are attached to the request as a [`ParsedBody`] extension and the raw
//! bytes are put back, so downstream handlers can use either. A body that fails to decode
//! is answered here with a client error and never reaches a route handler.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Body content types the gateway decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
}

/// Decoded request body, available to handlers via `Extension<ParsedBody>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody {
    pub kind: BodyKind,
    pub value: Value,
}

/// Maximum number of body bytes the decoders will buffer.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

pub async fn body_decoder_middleware(
    State(BodyLimit(limit)): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(kind) = body_kind(request.headers()) else {
        return Ok(next.run(request).await);
    };

    if let Some(length) = declared_length(request.headers()) {
        if length > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "request body of {} bytes exceeds the {} byte limit",
                length, limit
            )));
        }
    }

    let (mut parts, body) = request.into_parts();

    tracing::debug!(
        "Body decoder processing request: {} {} ({:?})",
        parts.method,
        parts.uri,
        kind
    );

    let bytes = read_body(body, limit).await?;

    let value = decode(kind, &bytes)?;
    parts.extensions.insert(ParsedBody { kind, value });

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}

/// Buffer at most `limit` bytes of `body`.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if e.into_inner().downcast_ref::<LengthLimitError>().is_some() {
            ApiError::PayloadTooLarge(format!("request body exceeds the {} byte limit", limit))
        } else {
            ApiError::BadRequest("failed to read request body".to_string())
        }
    })
}

/// Decode `bytes` as `kind`. An empty body decodes to an empty object.
pub fn decode(kind: BodyKind, bytes: &Bytes) -> Result<Value, ApiError> {
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match kind {
        BodyKind::Json => decode_json(bytes),
        BodyKind::Form => decode_form(bytes),
    }
}

/// Strict JSON: only an object or an array is accepted at the top level.
fn decode_json(bytes: &[u8]) -> Result<Value, ApiError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    if !matches!(first, Some(b'{') | Some(b'[')) {
        return Err(ApiError::BadRequest(
            "JSON body must be an object or an array".to_string(),
        ));
    }

    serde_json::from_slice(bytes).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Bracket segments nest deeper than this are kept as one literal key.
const MAX_FORM_DEPTH: usize = 5;
/// `a[n]` with a larger index is an object key, not an array slot.
const MAX_FORM_INDEX: usize = 20;

/// One bracketed part of a form key: `[name]`, `[3]` or `[]`.
#[derive(Debug, Clone, PartialEq)]
enum KeySegment {
    Key(String),
    Index(usize),
    Push,
}

/// Form value under construction; a leaf holds every value sent for its key.
#[derive(Debug)]
enum FormNode {
    Leaf(Vec<String>),
    Map(Vec<(String, FormNode)>),
    List(Vec<FormNode>),
}

/// Extended urlencoded decoding.
///
/// `a[b]=c` nests into objects, `a[]=x` and `a[0]=x` build arrays, and repeated keys
/// collect into an array in order of appearance. A bracketed key that clashes with an
/// earlier shape (`a=1&a[b]=2`) is kept as a literal top-level key; a plain key sent
/// after the same name was nested is rejected.
fn decode_form(bytes: &[u8]) -> Result<Value, ApiError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(bytes).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut root = FormNode::Map(Vec::new());
    for (key, value) in pairs {
        let path = parse_form_key(&key).unwrap_or_else(|| vec![KeySegment::Key(key.clone())]);
        if let Err(value) = insert_form_value(&mut root, &path, value) {
            insert_form_value(&mut root, &[KeySegment::Key(key.clone())], value).map_err(|_| {
                ApiError::BadRequest(format!("form key `{}` conflicts with an earlier key", key))
            })?;
        }
    }

    Ok(root.into_value())
}

/// Split `member[address][city]` into its segments. `None` means the key has no
/// well-formed bracket part and is used as written.
fn parse_form_key(key: &str) -> Option<Vec<KeySegment>> {
    let open = key.find('[')?;
    if open == 0 {
        return None;
    }

    let mut segments = vec![KeySegment::Key(key[..open].to_string())];
    let mut rest = &key[open..];

    while !rest.is_empty() {
        if segments.len() > MAX_FORM_DEPTH {
            segments.push(KeySegment::Key(rest.to_string()));
            break;
        }

        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let name = &inner[..close];
        segments.push(match name.parse::<usize>() {
            _ if name.is_empty() => KeySegment::Push,
            Ok(index) if index <= MAX_FORM_INDEX && index.to_string() == name => {
                KeySegment::Index(index)
            }
            _ => KeySegment::Key(name.to_string()),
        });
        rest = &inner[close + 1..];
    }

    Some(segments)
}

/// Place `value` at `path` below `node`. On a shape conflict the value is handed back.
fn insert_form_value(
    node: &mut FormNode,
    path: &[KeySegment],
    value: String,
) -> Result<(), String> {
    let Some((segment, rest)) = path.split_first() else {
        return match node {
            FormNode::Leaf(values) => {
                values.push(value);
                Ok(())
            }
            FormNode::List(items) => {
                items.push(FormNode::Leaf(vec![value]));
                Ok(())
            }
            FormNode::Map(_) => Err(value),
        };
    };

    if let FormNode::Leaf(values) = node {
        if !values.is_empty() {
            // `tag=a&tag[]=b` appends to the values already sent
            if *segment == KeySegment::Push && rest.is_empty() {
                values.push(value);
                return Ok(());
            }
            return Err(value);
        }
        *node = match segment {
            KeySegment::Key(_) => FormNode::Map(Vec::new()),
            KeySegment::Index(_) | KeySegment::Push => FormNode::List(Vec::new()),
        };
    }

    // `a[0]=x&a[k]=y` turns the list into an object keyed by index
    if matches!(segment, KeySegment::Key(_)) {
        if let FormNode::List(items) = node {
            let entries = std::mem::take(items)
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect();
            *node = FormNode::Map(entries);
        }
    }

    match (node, segment) {
        (FormNode::List(items), KeySegment::Index(index)) if *index < items.len() => {
            insert_form_value(&mut items[*index], rest, value)
        }
        (FormNode::List(items), KeySegment::Index(_) | KeySegment::Push) => {
            let mut child = FormNode::Leaf(Vec::new());
            insert_form_value(&mut child, rest, value)?;
            items.push(child);
            Ok(())
        }
        (FormNode::Map(entries), KeySegment::Key(name)) => {
            insert_form_entry(entries, name.clone(), rest, value)
        }
        (FormNode::Map(entries), KeySegment::Index(index)) => {
            insert_form_entry(entries, index.to_string(), rest, value)
        }
        _ => Err(value),
    }
}

fn insert_form_entry(
    entries: &mut Vec<(String, FormNode)>,
    name: String,
    rest: &[KeySegment],
    value: String,
) -> Result<(), String> {
    match entries.iter_mut().find(|(key, _)| *key == name) {
        Some((_, child)) => insert_form_value(child, rest, value),
        None => {
            let mut child = FormNode::Leaf(Vec::new());
            insert_form_value(&mut child, rest, value)?;
            entries.push((name, child));
            Ok(())
        }
    }
}

impl FormNode {
    fn into_value(self) -> Value {
        match self {
            FormNode::Leaf(mut values) if values.len() == 1 => Value::String(values.remove(0)),
            FormNode::Leaf(values) => Value::Array(values.into_iter().map(Value::String).collect()),
            FormNode::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, node)| (key, node.into_value()))
                    .collect(),
            ),
            FormNode::List(items) => {
                Value::Array(items.into_iter().map(FormNode::into_value).collect())
            }
        }
    }
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") {
        Some(BodyKind::Json)
    } else if essence == "application/x-www-form-urlencoded" {
        Some(BodyKind::Form)
    } else {
        None
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
