//! BSON 与 JSON 互转模块
//!
//! JSON 的类型系统较简单，非 JSON 原生的规范类型使用扩展 JSON 标记表示。

use crate::document::Document;
use crate::path::FieldPath;
use crate::value::{BsonValue, DbPointer, JavaScriptScope, RegexValue};
use crate::{BsonError, BsonResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kestrel_common::ObjectId;
use serde_json::{json, Map, Number, Value as JsonValue};

fn json_error(message: impl Into<String>) -> BsonError {
    BsonError::Serialization {
        path: FieldPath::root(),
        message: message.into(),
    }
}

fn document_to_json<'a>(
    fields: impl Iterator<Item = (&'a str, &'a BsonValue)>,
) -> BsonResult<JsonValue> {
    let mut obj = Map::new();
    for (k, v) in fields {
        obj.insert(k.to_string(), to_json(v).map_err(|e| e.within(k))?);
    }
    Ok(JsonValue::Object(obj))
}

/// 将 BsonValue 转换为 JSON
///
/// # Brief
/// 将 BSON 值转换为 JSON 值，非原生类型使用扩展 JSON 格式
///
/// # 扩展 JSON 格式
/// - ObjectId: `{"$oid": "507f1f77bcf86cd799439011"}`
/// - DateTime: `{"$date": 1234567890000}`
/// - Int64: `{"$numberLong": "123"}`
/// - Regex: `{"$regex": "pattern", "$options": "i"}`
/// - Binary: `{"$binary": "base64_string"}`
/// - JavaScript with Scope: `{"$code": "...", "$scope": {...}}`
///
/// # Arguments
/// * `value` - 要转换的 BSON 值
///
/// # Returns
/// 成功返回 JSON 值；Raw 文档无法解码时返回错误
pub fn to_json(value: &BsonValue) -> BsonResult<JsonValue> {
    let json = match value {
        BsonValue::Null => JsonValue::Null,
        BsonValue::Boolean(b) => JsonValue::Bool(*b),
        BsonValue::Int32(n) => json!(*n),
        BsonValue::Int64(n) => json!({"$numberLong": n.to_string()}),
        BsonValue::Double(f) => match Number::from_f64(*f) {
            Some(n) => JsonValue::Number(n),
            // NaN 与无穷大没有 JSON 数字表示
            None => json!({"$numberDouble": f.to_string()}),
        },
        BsonValue::String(s) => JsonValue::String(s.clone()),
        BsonValue::Binary(b) => json!({"$binary": STANDARD.encode(b)}),
        BsonValue::ObjectId(oid) => json!({"$oid": oid.to_hex()}),
        BsonValue::DateTime(ms) => json!({"$date": ms}),
        BsonValue::Timestamp(ts) => json!({"$timestamp": ts}),
        BsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(to_json(item).map_err(|e| e.within(&i.to_string()))?);
            }
            JsonValue::Array(out)
        }
        BsonValue::Document(doc) => document_to_json(doc.iter())?,
        BsonValue::Map(map) => document_to_json(map.iter())?,
        BsonValue::Raw(raw) => {
            let doc = raw.to_document()?;
            document_to_json(doc.iter())?
        }
        BsonValue::Regex(r) => json!({"$regex": r.pattern, "$options": r.options}),
        BsonValue::DbPointer(p) => json!({
            "$dbPointer": {"$ref": p.namespace, "$id": {"$oid": p.id.to_hex()}}
        }),
        BsonValue::JavaScript(code) => json!({"$code": code}),
        BsonValue::Symbol(s) => json!({"$symbol": s}),
        BsonValue::JavaScriptWithScope(js) => json!({
            "$code": js.code,
            "$scope": document_to_json(js.scope.iter())?
        }),
        BsonValue::Undefined => json!({"$undefined": true}),
        BsonValue::MinKey => json!({"$minKey": 1}),
        BsonValue::MaxKey => json!({"$maxKey": 1}),
    };
    Ok(json)
}

fn object_id_from_hex(hex: &str) -> BsonResult<ObjectId> {
    ObjectId::from_hex(hex).map_err(|_| BsonError::InvalidObjectIdLength {
        path: FieldPath::root(),
        len: hex.len() / 2,
    })
}

fn parse_object_id(value: &JsonValue) -> BsonResult<ObjectId> {
    let hex = value
        .get("$oid")
        .and_then(|v| v.as_str())
        .ok_or_else(|| json_error("expected {\"$oid\": ...}"))?;
    object_id_from_hex(hex)
}

fn parse_document(obj: &Map<String, JsonValue>) -> BsonResult<Document> {
    let mut doc = Document::with_capacity(obj.len());
    for (k, v) in obj {
        doc.insert(k.as_str(), from_json(v).map_err(|e| e.within(k))?);
    }
    Ok(doc)
}

/// 识别单键或双键的扩展 JSON 标记
fn from_extended(obj: &Map<String, JsonValue>) -> BsonResult<Option<BsonValue>> {
    let str_field = |key: &str| obj.get(key).and_then(|v| v.as_str());

    if let Some(hex) = str_field("$oid") {
        return Ok(Some(BsonValue::ObjectId(object_id_from_hex(hex)?)));
    }
    if let Some(ms) = obj.get("$date").and_then(|v| v.as_i64()) {
        return Ok(Some(BsonValue::DateTime(ms)));
    }
    if let Some(ts) = obj.get("$timestamp").and_then(|v| v.as_i64()) {
        return Ok(Some(BsonValue::Timestamp(ts)));
    }
    if let Some(n) = str_field("$numberLong") {
        let n = n
            .parse::<i64>()
            .map_err(|_| json_error(format!("invalid $numberLong: {}", n)))?;
        return Ok(Some(BsonValue::Int64(n)));
    }
    if let Some(n) = str_field("$numberDouble") {
        let n = n
            .parse::<f64>()
            .map_err(|_| json_error(format!("invalid $numberDouble: {}", n)))?;
        return Ok(Some(BsonValue::Double(n)));
    }
    if let Some(b64) = str_field("$binary") {
        let bytes = STANDARD
            .decode(b64)
            .map_err(|e| json_error(format!("invalid base64: {}", e)))?;
        return Ok(Some(BsonValue::Binary(bytes)));
    }
    if let Some(pattern) = str_field("$regex") {
        let options = str_field("$options").unwrap_or("");
        return Ok(Some(BsonValue::Regex(RegexValue::new(pattern, options))));
    }
    if let Some(pointer) = obj.get("$dbPointer") {
        let namespace = pointer
            .get("$ref")
            .and_then(|v| v.as_str())
            .ok_or_else(|| json_error("$dbPointer without $ref"))?;
        let id = parse_object_id(pointer.get("$id").unwrap_or(&JsonValue::Null))?;
        return Ok(Some(BsonValue::DbPointer(DbPointer {
            namespace: namespace.to_string(),
            id,
        })));
    }
    if let Some(code) = str_field("$code") {
        return Ok(Some(match obj.get("$scope") {
            Some(JsonValue::Object(scope)) => BsonValue::JavaScriptWithScope(JavaScriptScope {
                code: code.to_string(),
                scope: parse_document(scope).map_err(|e| e.within("$scope"))?,
            }),
            Some(_) => return Err(json_error("$scope must be an object")),
            None => BsonValue::JavaScript(code.to_string()),
        }));
    }
    if let Some(symbol) = str_field("$symbol") {
        return Ok(Some(BsonValue::Symbol(symbol.to_string())));
    }
    if obj.contains_key("$undefined") {
        return Ok(Some(BsonValue::Undefined));
    }
    if obj.contains_key("$minKey") {
        return Ok(Some(BsonValue::MinKey));
    }
    if obj.contains_key("$maxKey") {
        return Ok(Some(BsonValue::MaxKey));
    }
    Ok(None)
}

/// 从 JSON 转换为 BsonValue
///
/// # Brief
/// 将 JSON 值转换为 BSON 值，识别扩展 JSON 格式；适合 i32 的整数为 Int32，其余为 Int64
///
/// # Arguments
/// * `value` - JSON 值
///
/// # Returns
/// 成功返回 BSON 值，失败返回错误
pub fn from_json(value: &JsonValue) -> BsonResult<BsonValue> {
    match value {
        JsonValue::Null => Ok(BsonValue::Null),
        JsonValue::Bool(b) => Ok(BsonValue::Boolean(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Ok(BsonValue::Int32(small)),
                    Err(_) => Ok(BsonValue::Int64(i)),
                }
            } else if let Some(f) = n.as_f64() {
                Ok(BsonValue::Double(f))
            } else {
                Err(json_error(format!("number out of range: {}", n)))
            }
        }
        JsonValue::String(s) => Ok(BsonValue::String(s.clone())),
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(from_json(item).map_err(|e| e.within(&i.to_string()))?);
            }
            Ok(BsonValue::Array(out))
        }
        JsonValue::Object(obj) => match from_extended(obj)? {
            Some(value) => Ok(value),
            None => Ok(BsonValue::Document(parse_document(obj)?)),
        },
    }
}

/// 将 BSON 值序列化为格式化的 JSON 字符串
pub fn to_json_string(value: &BsonValue) -> BsonResult<String> {
    let json_value = to_json(value)?;
    serde_json::to_string_pretty(&json_value)
        .map_err(|e| json_error(format!("JSON serialization failed: {}", e)))
}

/// 从 JSON 字符串解析 BSON 值
pub fn from_json_string(json_str: &str) -> BsonResult<BsonValue> {
    let json_value: JsonValue = serde_json::from_str(json_str)
        .map_err(|e| json_error(format!("JSON parsing failed: {}", e)))?;
    from_json(&json_value)
}

impl Document {
    /// 转换为紧凑的扩展 JSON 字符串
    pub fn to_json(&self) -> BsonResult<String> {
        let json_value = document_to_json(self.iter())?;
        serde_json::to_string(&json_value)
            .map_err(|e| json_error(format!("JSON serialization failed: {}", e)))
    }

    /// 从 JSON 对象创建文档
    pub fn from_json(json: &str) -> BsonResult<Self> {
        match from_json_string(json)? {
            BsonValue::Document(doc) => Ok(doc),
            other => Err(BsonError::UnsupportedType {
                path: FieldPath::root(),
                type_name: other.type_name().to_string(),
            }),
        }
    }
}
