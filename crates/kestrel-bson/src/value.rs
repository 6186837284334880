//! BSON 值类型定义模块
//!
//! 定义线格式支持的全部规范类型，以及宿主类型到规范类型的编码转换表(`From` 实现)。

use crate::document::{Document, DocumentMap};
use crate::raw::RawDocument;
use crate::path::FieldPath;
use crate::spec::{reserved, ElementType};
use crate::{BsonError, BsonResult};
use chrono::{DateTime, TimeZone, Utc};
use kestrel_common::ObjectId;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// BSON 值的枚举类型
///
/// 每个变体对应一个线格式类型标记；`Document` 与 `Map` 是同一类型标记(0x03)的两种内存形态，
/// `Raw` 是已经编码好的文档字节，编码时原样写入。
///
/// # 示例
///
/// ```rust,ignore
/// use kestrel_bson::BsonValue;
///
/// let value = BsonValue::from(42i32);
/// assert_eq!(value.type_name(), "Int32");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum BsonValue {
    /// 64 位浮点数 (0x01)
    Double(f64),
    /// UTF-8 字符串 (0x02)
    String(String),
    /// 保序嵌入文档 (0x03)
    Document(Document),
    /// 不保序嵌入文档 (0x03)
    Map(DocumentMap),
    /// 数组 (0x04)，线格式上是以 "0","1",... 为键的文档
    Array(Vec<BsonValue>),
    /// 二进制数据 (0x05)
    Binary(Vec<u8>),
    /// 已废弃的 undefined (0x06)
    Undefined,
    /// 12 字节对象标识符 (0x07)
    ObjectId(ObjectId),
    /// 布尔值 (0x08)
    Boolean(bool),
    /// UTC 时间，自 Unix 纪元起的毫秒数 (0x09)
    DateTime(i64),
    /// 空值 (0x0A)
    Null,
    /// 正则表达式 (0x0B)
    Regex(RegexValue),
    /// 已废弃的 DBPointer (0x0C)
    DbPointer(DbPointer),
    /// JavaScript 代码 (0x0D)
    JavaScript(String),
    /// 符号 (0x0E)
    Symbol(String),
    /// 带作用域的 JavaScript 代码 (0x0F)
    JavaScriptWithScope(JavaScriptScope),
    /// 32 位有符号整数 (0x10)
    Int32(i32),
    /// 时间戳 (0x11)
    Timestamp(i64),
    /// 64 位有符号整数 (0x12)
    Int64(i64),
    /// 最小键 (0xFF)
    MinKey,
    /// 最大键 (0x7F)
    MaxKey,
    /// 未解码的原始文档
    Raw(RawDocument),
}

/// 正则表达式值
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegexValue {
    pub pattern: String,
    pub options: String,
}

impl RegexValue {
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

/// DBPointer 值：集合名 + 12 字节 id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPointer {
    pub namespace: String,
    pub id: ObjectId,
}

impl DbPointer {
    pub fn new(namespace: impl Into<String>, id: ObjectId) -> Self {
        Self {
            namespace: namespace.into(),
            id,
        }
    }

    /// 从未校验的 id 字节构造，长度必须恰好为 12
    pub fn from_slice(namespace: impl Into<String>, id: &[u8]) -> BsonResult<Self> {
        Ok(Self::new(namespace, object_id_from_slice(id)?))
    }
}

/// 把任意长度的字节转换为 ObjectId，长度不符是 Constraint 错误
pub fn object_id_from_slice(bytes: &[u8]) -> BsonResult<ObjectId> {
    ObjectId::from_slice(bytes).map_err(|_| BsonError::InvalidObjectIdLength {
        path: FieldPath::root(),
        len: bytes.len(),
    })
}

/// 带作用域的 JavaScript 代码
///
/// 作用域本身必须是合法文档。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JavaScriptScope {
    pub code: String,
    pub scope: Document,
}

impl BsonValue {
    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            BsonValue::Double(_) => "Double",
            BsonValue::String(_) => "String",
            BsonValue::Document(_) => "Document",
            BsonValue::Map(_) => "Map",
            BsonValue::Array(_) => "Array",
            BsonValue::Binary(_) => "Binary",
            BsonValue::Undefined => "Undefined",
            BsonValue::ObjectId(_) => "ObjectId",
            BsonValue::Boolean(_) => "Boolean",
            BsonValue::DateTime(_) => "DateTime",
            BsonValue::Null => "Null",
            BsonValue::Regex(_) => "Regex",
            BsonValue::DbPointer(_) => "DbPointer",
            BsonValue::JavaScript(_) => "JavaScript",
            BsonValue::Symbol(_) => "Symbol",
            BsonValue::JavaScriptWithScope(_) => "JavaScriptWithScope",
            BsonValue::Int32(_) => "Int32",
            BsonValue::Timestamp(_) => "Timestamp",
            BsonValue::Int64(_) => "Int64",
            BsonValue::MinKey => "MinKey",
            BsonValue::MaxKey => "MaxKey",
            BsonValue::Raw(_) => "Raw",
        }
    }

    /// 值在线格式上的类型标记
    pub fn element_type(&self) -> ElementType {
        match self {
            BsonValue::Double(_) => ElementType::Double,
            BsonValue::String(_) => ElementType::String,
            BsonValue::Document(_) | BsonValue::Map(_) | BsonValue::Raw(_) => {
                ElementType::EmbeddedDocument
            }
            BsonValue::Array(_) => ElementType::Array,
            BsonValue::Binary(_) => ElementType::Binary,
            BsonValue::Undefined => ElementType::Undefined,
            BsonValue::ObjectId(_) => ElementType::ObjectId,
            BsonValue::Boolean(_) => ElementType::Boolean,
            BsonValue::DateTime(_) => ElementType::DateTime,
            BsonValue::Null => ElementType::Null,
            BsonValue::Regex(_) => ElementType::Regex,
            BsonValue::DbPointer(_) => ElementType::DbPointer,
            BsonValue::JavaScript(_) => ElementType::JavaScript,
            BsonValue::Symbol(_) => ElementType::Symbol,
            BsonValue::JavaScriptWithScope(_) => ElementType::JavaScriptWithScope,
            BsonValue::Int32(_) => ElementType::Int32,
            BsonValue::Timestamp(_) => ElementType::Timestamp,
            BsonValue::Int64(_) => ElementType::Int64,
            BsonValue::MinKey => ElementType::MinKey,
            BsonValue::MaxKey => ElementType::MaxKey,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BsonValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BsonValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            BsonValue::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// 如果值是整数类型（Int32 或 Int64），返回 i64 值
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BsonValue::Int32(n) => Some(*n as i64),
            BsonValue::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BsonValue::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BsonValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            BsonValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            BsonValue::ObjectId(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<BsonValue>> {
        match self {
            BsonValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            BsonValue::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&DocumentMap> {
        match self {
            BsonValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// 将 DateTime / Timestamp 的毫秒值转换为 chrono 时间
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            BsonValue::DateTime(ms) | BsonValue::Timestamp(ms) => {
                Utc.timestamp_millis_opt(*ms).single()
            }
            _ => None,
        }
    }

    /// 获取指定键的值
    ///
    /// # Brief
    /// 从文档中获取指定键的值，或从数组中获取指定下标的值
    ///
    /// # Arguments
    /// * `key` - 键名（文档）或下标字符串（数组）
    ///
    /// # Returns
    /// `Some(&BsonValue)` 如果找到，否则 `None`
    pub fn get(&self, key: &str) -> Option<&BsonValue> {
        match self {
            BsonValue::Document(doc) => doc.get(key),
            BsonValue::Map(map) => map.get(key),
            BsonValue::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }
}

impl Default for BsonValue {
    fn default() -> Self {
        BsonValue::Null
    }
}

fn write_list<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a BsonValue>,
) -> fmt::Result {
    for (i, v) in items.enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", v)?;
    }
    Ok(())
}

impl fmt::Display for BsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BsonValue::Double(n) => write!(f, "Double({})", n),
            BsonValue::String(s) => write!(f, "String({})", s),
            BsonValue::Document(doc) => write!(f, "{}", doc),
            BsonValue::Map(map) => write!(f, "{}", map),
            BsonValue::Array(arr) => {
                write!(f, "Array([")?;
                write_list(f, arr.iter())?;
                write!(f, "])")
            }
            BsonValue::Binary(b) => write!(f, "Binary({:?})", b),
            BsonValue::Undefined => write!(f, "Undefined()"),
            BsonValue::ObjectId(id) => write!(f, "ObjectId({})", id),
            BsonValue::Boolean(b) => write!(f, "Bool({})", b),
            BsonValue::DateTime(ms) => match Utc.timestamp_millis_opt(*ms).single() {
                Some(dt) => write!(f, "DateTime({})", dt.to_rfc3339()),
                None => write!(f, "DateTime({}ms)", ms),
            },
            BsonValue::Null => write!(f, "Null()"),
            BsonValue::Regex(r) => {
                write!(f, "Regex(Pattern({}) Options({}))", r.pattern, r.options)
            }
            BsonValue::DbPointer(p) => {
                write!(f, "DbPointer(Name({}) ObjectId({}))", p.namespace, p.id)
            }
            BsonValue::JavaScript(code) => write!(f, "JavaScript({})", code),
            BsonValue::Symbol(s) => write!(f, "Symbol({})", s),
            BsonValue::JavaScriptWithScope(js) => {
                write!(f, "JavaScriptWithScope(Code({}) Scope({}))", js.code, js.scope)
            }
            BsonValue::Int32(n) => write!(f, "Int32({})", n),
            BsonValue::Timestamp(ts) => write!(f, "Timestamp({})", ts),
            BsonValue::Int64(n) => write!(f, "Int64({})", n),
            BsonValue::MinKey => write!(f, "MinKey()"),
            BsonValue::MaxKey => write!(f, "MaxKey()"),
            BsonValue::Raw(raw) => write!(f, "Raw({} bytes)", raw.len()),
        }
    }
}

// ============================================================================
// 编码转换表 - 宿主类型到规范类型
// ============================================================================

impl From<()> for BsonValue {
    fn from(_: ()) -> Self {
        BsonValue::Null
    }
}

impl From<bool> for BsonValue {
    fn from(v: bool) -> Self {
        BsonValue::Boolean(v)
    }
}

impl From<i8> for BsonValue {
    fn from(v: i8) -> Self {
        BsonValue::Int32(v as i32)
    }
}

impl From<i16> for BsonValue {
    fn from(v: i16) -> Self {
        BsonValue::Int32(v as i32)
    }
}

impl From<i32> for BsonValue {
    fn from(v: i32) -> Self {
        BsonValue::Int32(v)
    }
}

impl From<u8> for BsonValue {
    fn from(v: u8) -> Self {
        BsonValue::Int32(v as i32)
    }
}

impl From<u16> for BsonValue {
    fn from(v: u16) -> Self {
        BsonValue::Int32(v as i32)
    }
}

impl From<u32> for BsonValue {
    fn from(v: u32) -> Self {
        BsonValue::Int64(v as i64)
    }
}

impl From<i64> for BsonValue {
    fn from(v: i64) -> Self {
        BsonValue::Int64(v)
    }
}

impl From<isize> for BsonValue {
    fn from(v: isize) -> Self {
        BsonValue::Int64(v as i64)
    }
}

// f32 没有对应实现：先收窄再扩宽会破坏编解码对称性
impl From<f64> for BsonValue {
    fn from(v: f64) -> Self {
        BsonValue::Double(v)
    }
}

impl From<&str> for BsonValue {
    fn from(v: &str) -> Self {
        BsonValue::String(v.to_string())
    }
}

impl From<String> for BsonValue {
    fn from(v: String) -> Self {
        BsonValue::String(v)
    }
}

impl From<&String> for BsonValue {
    fn from(v: &String) -> Self {
        BsonValue::String(v.clone())
    }
}

impl From<&[u8]> for BsonValue {
    fn from(v: &[u8]) -> Self {
        BsonValue::Binary(v.to_vec())
    }
}

impl From<DateTime<Utc>> for BsonValue {
    fn from(v: DateTime<Utc>) -> Self {
        BsonValue::DateTime(v.timestamp_millis())
    }
}

impl From<SystemTime> for BsonValue {
    fn from(v: SystemTime) -> Self {
        let millis = match v.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(e) => -(e.duration().as_millis() as i64),
        };
        BsonValue::DateTime(millis)
    }
}

impl From<ObjectId> for BsonValue {
    fn from(v: ObjectId) -> Self {
        BsonValue::ObjectId(v)
    }
}

impl From<Document> for BsonValue {
    fn from(v: Document) -> Self {
        BsonValue::Document(v)
    }
}

impl From<DocumentMap> for BsonValue {
    fn from(v: DocumentMap) -> Self {
        BsonValue::Map(v)
    }
}

impl From<RawDocument> for BsonValue {
    fn from(v: RawDocument) -> Self {
        BsonValue::Raw(v)
    }
}

impl From<RegexValue> for BsonValue {
    fn from(v: RegexValue) -> Self {
        BsonValue::Regex(v)
    }
}

impl From<DbPointer> for BsonValue {
    fn from(v: DbPointer) -> Self {
        BsonValue::DbPointer(v)
    }
}

impl From<JavaScriptScope> for BsonValue {
    fn from(v: JavaScriptScope) -> Self {
        BsonValue::JavaScriptWithScope(v)
    }
}

impl<T: Into<BsonValue>> From<Option<T>> for BsonValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => BsonValue::Null,
        }
    }
}

// 字节缓冲区是二进制数据而不是 Int32 数组
impl From<Vec<u8>> for BsonValue {
    fn from(v: Vec<u8>) -> Self {
        BsonValue::Binary(v)
    }
}

macro_rules! array_from_vec {
    ($($elem:ty),+ $(,)?) => {
        $(
            impl From<Vec<$elem>> for BsonValue {
                fn from(v: Vec<$elem>) -> Self {
                    BsonValue::Array(v.into_iter().map(Into::into).collect())
                }
            }
        )+
    };
}

array_from_vec!(
    bool,
    i8,
    i16,
    i32,
    u16,
    u32,
    i64,
    isize,
    f64,
    &str,
    String,
    Vec<u8>,
    DateTime<Utc>,
    ObjectId,
    Document,
    DocumentMap,
);

impl From<Vec<BsonValue>> for BsonValue {
    fn from(v: Vec<BsonValue>) -> Self {
        BsonValue::Array(v)
    }
}

// ============================================================================
// Serde 支持 - 规范类型嵌在结构体中时原样透传
// ============================================================================

impl Serialize for BsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BsonValue::Double(n) => serializer.serialize_f64(*n),
            BsonValue::String(s) => serializer.serialize_str(s),
            BsonValue::Document(doc) => doc.serialize(serializer),
            BsonValue::Map(map) => map.serialize(serializer),
            BsonValue::Array(arr) => arr.serialize(serializer),
            BsonValue::Binary(b) => serializer.serialize_bytes(b),
            BsonValue::Undefined => serializer.serialize_unit_struct(reserved::UNDEFINED),
            BsonValue::ObjectId(id) => id.serialize(serializer),
            BsonValue::Boolean(b) => serializer.serialize_bool(*b),
            BsonValue::DateTime(ms) => serializer.serialize_newtype_struct(reserved::DATETIME, ms),
            BsonValue::Null => serializer.serialize_unit(),
            BsonValue::Regex(r) => r.serialize(serializer),
            BsonValue::DbPointer(p) => p.serialize(serializer),
            BsonValue::JavaScript(code) => {
                serializer.serialize_newtype_struct(reserved::JAVASCRIPT, code)
            }
            BsonValue::Symbol(s) => serializer.serialize_newtype_struct(reserved::SYMBOL, s),
            BsonValue::JavaScriptWithScope(js) => js.serialize(serializer),
            BsonValue::Int32(n) => serializer.serialize_i32(*n),
            BsonValue::Timestamp(ts) => {
                serializer.serialize_newtype_struct(reserved::TIMESTAMP, ts)
            }
            BsonValue::Int64(n) => serializer.serialize_i64(*n),
            BsonValue::MinKey => serializer.serialize_unit_struct(reserved::MIN_KEY),
            BsonValue::MaxKey => serializer.serialize_unit_struct(reserved::MAX_KEY),
            BsonValue::Raw(raw) => raw.serialize(serializer),
        }
    }
}

impl Serialize for RegexValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(reserved::REGEX, &(&self.pattern, &self.options))
    }
}

impl Serialize for DbPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(reserved::DB_POINTER, &(&self.namespace, &self.id))
    }
}

impl Serialize for JavaScriptScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(reserved::CODE_WITH_SCOPE, &(&self.code, &self.scope))
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// 不保序文档的条目视图，供 newtype 包装使用
struct MapEntries<'a>(&'a DocumentMap);

impl Serialize for MapEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.0.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for DocumentMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(reserved::MAP, &MapEntries(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coercion_table() {
        assert_eq!(BsonValue::from(()), BsonValue::Null);
        assert_eq!(BsonValue::from(true), BsonValue::Boolean(true));
        assert_eq!(BsonValue::from(-5i8), BsonValue::Int32(-5));
        assert_eq!(BsonValue::from(300i16), BsonValue::Int32(300));
        assert_eq!(BsonValue::from(7i32), BsonValue::Int32(7));
        assert_eq!(BsonValue::from(7i64), BsonValue::Int64(7));
        assert_eq!(BsonValue::from(7isize), BsonValue::Int64(7));
        assert_eq!(BsonValue::from(u32::MAX), BsonValue::Int64(u32::MAX as i64));
        assert_eq!(BsonValue::from(1.5f64), BsonValue::Double(1.5));
        assert_eq!(BsonValue::from("x"), BsonValue::String("x".to_string()));
        assert_eq!(BsonValue::from(&b"\x00\x01"[..]), BsonValue::Binary(vec![0, 1]));
        assert_eq!(BsonValue::from(None::<i32>), BsonValue::Null);
        assert_eq!(
            BsonValue::from(vec![1i32, 2]),
            BsonValue::Array(vec![BsonValue::Int32(1), BsonValue::Int32(2)])
        );
        assert_eq!(BsonValue::from(vec![1u8, 2]), BsonValue::Binary(vec![1, 2]));
        assert_eq!(
            BsonValue::from(vec![vec![7u8]]),
            BsonValue::Array(vec![BsonValue::Binary(vec![7])])
        );
    }

    #[test]
    fn test_datetime_coercion() {
        let dt = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(BsonValue::from(dt), BsonValue::DateTime(1_700_000_000_123));

        let before_epoch = UNIX_EPOCH - std::time::Duration::from_millis(1500);
        assert_eq!(BsonValue::from(before_epoch), BsonValue::DateTime(-1500));
        assert_eq!(BsonValue::DateTime(1_700_000_000_123).as_datetime(), Some(dt));
    }

    #[test]
    fn test_object_id_length_is_constraint() {
        let err = object_id_from_slice(&[0u8; 11]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Constraint);
        assert!(DbPointer::from_slice("db.c", &[1u8; 13]).is_err());
        assert!(DbPointer::from_slice("db.c", &[1u8; 12]).is_ok());
    }

    #[test]
    fn test_display() {
        let value = BsonValue::Array(vec![
            BsonValue::Int32(1),
            BsonValue::String("a".to_string()),
            BsonValue::Regex(RegexValue::new("^a", "i")),
        ]);
        assert_eq!(
            value.to_string(),
            "Array([Int32(1) String(a) Regex(Pattern(^a) Options(i))])"
        );
        assert_eq!(BsonValue::MinKey.to_string(), "MinKey()");
    }

    #[test]
    fn test_get() {
        let mut doc = Document::new();
        doc.insert("list", vec![10i32, 20]);
        let value = BsonValue::Document(doc);
        assert_eq!(value.get("list").and_then(|l| l.get("1")), Some(&BsonValue::Int32(20)));
        assert_eq!(value.get("missing"), None);
    }
}
