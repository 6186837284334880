//! 结构体投影
//!
//! 通过 serde 把宿主记录转换为文档。字段指令对应 serde 属性：
//! - 忽略: `#[serde(skip)]`
//! - 重命名: `#[serde(rename = "...")]`
//! - 为空时省略: `#[serde(skip_serializing_if = "kestrel_bson::is_empty")]`
//!
//! 标量按编码转换表转换；`f32`、超出 i64 的 `u64`、`i128`/`u128` 以及非字符串的映射键是 Type 错误。
//! 嵌在记录里的规范类型(ObjectId、BsonValue、Document、RawDocument 等)通过保留名称原样还原。

use crate::document::{Document, DocumentMap};
use crate::path::FieldPath;
use crate::raw::RawDocument;
use crate::spec::reserved;
use crate::value::{BsonValue, DbPointer, JavaScriptScope, RegexValue};
use crate::{BsonError, BsonResult};
use compact_str::CompactString;
use kestrel_common::ObjectId;
use serde::ser::{self, Serialize};
use std::collections::{BTreeMap, HashMap};

pub struct Serializer {
    output: BsonValue,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            output: BsonValue::Null,
        }
    }

    pub fn into_value(self) -> BsonValue {
        self.output
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// 把任意可序列化值转换为 BsonValue
pub fn to_bson_value<T: ?Sized + Serialize>(value: &T) -> BsonResult<BsonValue> {
    let mut serializer = Serializer::new();
    value.serialize(&mut serializer)?;
    Ok(serializer.into_value())
}

/// 把记录投影为保序文档
///
/// # Brief
/// 结构体字段按声明顺序成为文档字段；顶层值不是文档时返回 Type 错误
///
/// # Arguments
/// * `value` - 宿主记录
///
/// # Returns
/// 成功返回 Document
pub fn to_document<T: ?Sized + Serialize>(value: &T) -> BsonResult<Document> {
    match to_bson_value(value)? {
        BsonValue::Document(doc) => Ok(doc),
        BsonValue::Map(map) => Ok(map.into_document()),
        BsonValue::Raw(raw) => raw.to_document(),
        other => Err(BsonError::UnsupportedType {
            path: FieldPath::root(),
            type_name: other.type_name().to_string(),
        }),
    }
}

/// 把记录直接编码为文档字节
pub fn encode_struct<T: ?Sized + Serialize>(value: &T) -> BsonResult<RawDocument> {
    to_bson_value(value)?.encode_document()
}

fn unsupported(type_name: &str) -> BsonError {
    BsonError::UnsupportedType {
        path: FieldPath::root(),
        type_name: type_name.to_string(),
    }
}

fn malformed(name: &str, value: &BsonValue) -> BsonError {
    BsonError::Serialization {
        path: FieldPath::root(),
        message: format!("malformed {} payload: {}", name, value.type_name()),
    }
}

/// 还原带保留名称的 newtype 载荷
fn rebuild(name: &'static str, inner: BsonValue) -> BsonResult<BsonValue> {
    let value = match (name, inner) {
        (reserved::OBJECT_ID, BsonValue::String(hex)) => {
            let id = ObjectId::from_hex(&hex).map_err(|_| BsonError::InvalidObjectIdLength {
                path: FieldPath::root(),
                len: hex.len() / 2,
            })?;
            BsonValue::ObjectId(id)
        }
        (reserved::DATETIME, BsonValue::Int64(ms)) => BsonValue::DateTime(ms),
        (reserved::TIMESTAMP, BsonValue::Int64(ts)) => BsonValue::Timestamp(ts),
        (reserved::JAVASCRIPT, BsonValue::String(code)) => BsonValue::JavaScript(code),
        (reserved::SYMBOL, BsonValue::String(symbol)) => BsonValue::Symbol(symbol),
        (reserved::REGEX, BsonValue::Array(parts)) => match <[BsonValue; 2]>::try_from(parts) {
            Ok([BsonValue::String(pattern), BsonValue::String(options)]) => {
                BsonValue::Regex(RegexValue { pattern, options })
            }
            _ => return Err(malformed(name, &BsonValue::Null)),
        },
        (reserved::DB_POINTER, BsonValue::Array(parts)) => {
            match <[BsonValue; 2]>::try_from(parts) {
                Ok([BsonValue::String(namespace), BsonValue::ObjectId(id)]) => {
                    BsonValue::DbPointer(DbPointer { namespace, id })
                }
                _ => return Err(malformed(name, &BsonValue::Null)),
            }
        }
        (reserved::CODE_WITH_SCOPE, BsonValue::Array(parts)) => {
            match <[BsonValue; 2]>::try_from(parts) {
                Ok([BsonValue::String(code), BsonValue::Document(scope)]) => {
                    BsonValue::JavaScriptWithScope(JavaScriptScope { code, scope })
                }
                _ => return Err(malformed(name, &BsonValue::Null)),
            }
        }
        (reserved::MAP, BsonValue::Document(doc)) => BsonValue::Map(doc.into_map()),
        (reserved::RAW, BsonValue::Binary(bytes)) => BsonValue::Raw(RawDocument::from_bytes(bytes)?),
        (_, other) => return Err(malformed(name, &other)),
    };
    Ok(value)
}

fn is_reserved(name: &str) -> bool {
    name.starts_with(reserved::PREFIX)
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = BsonError;
    type SerializeSeq = SeqSerializer<'a>;
    type SerializeTuple = SeqSerializer<'a>;
    type SerializeTupleStruct = SeqSerializer<'a>;
    type SerializeTupleVariant = SeqSerializer<'a>;
    type SerializeMap = MapSerializer<'a>;
    type SerializeStruct = MapSerializer<'a>;
    type SerializeStructVariant = MapSerializer<'a>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.output = BsonValue::Boolean(v);
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.output = BsonValue::Int32(v);
        Ok(())
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        self.output = BsonValue::Int64(v);
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> Result<Self::Ok, Self::Error> {
        Err(unsupported("i128"))
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i32(v as i32)
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(v as i64)
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        match i64::try_from(v) {
            Ok(n) => self.serialize_i64(n),
            Err(_) => Err(unsupported("u64 above i64::MAX")),
        }
    }

    fn serialize_u128(self, _v: u128) -> Result<Self::Ok, Self::Error> {
        Err(unsupported("u128"))
    }

    // 单精度先收窄再扩宽会破坏往返对称
    fn serialize_f32(self, _v: f32) -> Result<Self::Ok, Self::Error> {
        Err(unsupported("f32"))
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.output = BsonValue::Double(v);
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.output = BsonValue::String(v.to_string());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.output = BsonValue::Binary(v.to_vec());
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.serialize_unit()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.output = BsonValue::Null;
        Ok(())
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.output = match name {
            reserved::UNDEFINED => BsonValue::Undefined,
            reserved::MIN_KEY => BsonValue::MinKey,
            reserved::MAX_KEY => BsonValue::MaxKey,
            _ => BsonValue::Null,
        };
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        if is_reserved(name) {
            self.output = rebuild(name, to_bson_value(value)?)?;
            Ok(())
        } else {
            value.serialize(self)
        }
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        let inner = to_bson_value(value).map_err(|e| e.within(variant))?;
        let mut doc = Document::with_capacity(1);
        doc.insert(variant, inner);
        self.output = BsonValue::Document(doc);
        Ok(())
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(SeqSerializer {
            serializer: self,
            variant: None,
            elements: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(SeqSerializer {
            serializer: self,
            variant: Some(variant),
            elements: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapSerializer {
            serializer: self,
            variant: None,
            doc: Document::with_capacity(len.unwrap_or(0)),
            current_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(MapSerializer {
            serializer: self,
            variant: Some(variant),
            doc: Document::with_capacity(len),
            current_key: None,
        })
    }
}

/// 枚举变体包装为 `{variant: value}`
fn wrap_variant(variant: Option<&'static str>, value: BsonValue) -> BsonValue {
    match variant {
        Some(variant) => {
            let mut doc = Document::with_capacity(1);
            doc.insert(variant, value);
            BsonValue::Document(doc)
        }
        None => value,
    }
}

pub struct SeqSerializer<'a> {
    serializer: &'a mut Serializer,
    variant: Option<&'static str>,
    elements: Vec<BsonValue>,
}

impl<'a> ser::SerializeSeq for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let index = self.elements.len();
        let element = to_bson_value(value).map_err(|e| {
            let e = e.within(&index.to_string());
            match self.variant {
                Some(variant) => e.within(variant),
                None => e,
            }
        })?;
        self.elements.push(element);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.serializer.output = wrap_variant(self.variant, BsonValue::Array(self.elements));
        Ok(())
    }
}

impl<'a> ser::SerializeTuple for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleStruct for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl<'a> ser::SerializeTupleVariant for SeqSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

pub struct MapSerializer<'a> {
    serializer: &'a mut Serializer,
    variant: Option<&'static str>,
    doc: Document,
    current_key: Option<CompactString>,
}

impl MapSerializer<'_> {
    fn insert<T: ?Sized + Serialize>(&mut self, key: CompactString, value: &T) -> BsonResult<()> {
        let value = to_bson_value(value).map_err(|e| {
            let e = e.within(&key);
            match self.variant {
                Some(variant) => e.within(variant),
                None => e,
            }
        })?;
        self.doc.insert(key, value);
        Ok(())
    }

    fn finish(self) {
        self.serializer.output = wrap_variant(self.variant, BsonValue::Document(self.doc));
    }
}

impl<'a> ser::SerializeMap for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        self.current_key = match to_bson_value(key)? {
            BsonValue::String(s) => Some(CompactString::from(s)),
            other => return Err(unsupported(&format!("{} map key", other.type_name()))),
        };
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self.current_key.take().ok_or_else(|| BsonError::Serialization {
            path: FieldPath::root(),
            message: "value serialized before its key".to_string(),
        })?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish();
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.insert(CompactString::from(key), value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish();
        Ok(())
    }
}

impl<'a> ser::SerializeStructVariant for MapSerializer<'a> {
    type Ok = ();
    type Error = BsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        ser::SerializeStruct::end(self)
    }
}

impl ser::Error for BsonError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        BsonError::Serialization {
            path: FieldPath::root(),
            message: msg.to_string(),
        }
    }
}

// ============================================================================
// 为空时省略
// ============================================================================

/// 类型的零值/空值判定
///
/// 配合 `#[serde(skip_serializing_if = "kestrel_bson::is_empty")]` 使用。
pub trait IsEmpty {
    fn is_empty_value(&self) -> bool;
}

/// `skip_serializing_if` 使用的判定函数
pub fn is_empty<T: ?Sized + IsEmpty>(value: &T) -> bool {
    value.is_empty_value()
}

impl IsEmpty for bool {
    fn is_empty_value(&self) -> bool {
        !*self
    }
}

macro_rules! zero_is_empty {
    ($($ty:ty),*) => {
        $(
            impl IsEmpty for $ty {
                fn is_empty_value(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

zero_is_empty!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl IsEmpty for f64 {
    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl IsEmpty for str {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl IsEmpty for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for [T] {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

impl<K, V, S> IsEmpty for HashMap<K, V, S> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsEmpty for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl IsEmpty for Document {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl IsEmpty for DocumentMap {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl IsEmpty for BsonValue {
    fn is_empty_value(&self) -> bool {
        match self {
            BsonValue::Null | BsonValue::Undefined => true,
            BsonValue::Boolean(b) => !*b,
            BsonValue::Int32(n) => *n == 0,
            BsonValue::Int64(n) => *n == 0,
            BsonValue::Double(n) => *n == 0.0,
            BsonValue::String(s) => s.is_empty(),
            BsonValue::Binary(b) => b.is_empty(),
            BsonValue::Array(items) => items.is_empty(),
            BsonValue::Document(doc) => doc.is_empty(),
            BsonValue::Map(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl<T: ?Sized + IsEmpty> IsEmpty for &T {
    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Profile {
        name: String,
        #[serde(rename = "yrs")]
        age: u8,
        #[serde(skip)]
        #[allow(dead_code)]
        secret: String,
        #[serde(skip_serializing_if = "crate::is_empty")]
        nickname: String,
        #[serde(skip_serializing_if = "crate::is_empty")]
        tags: Vec<String>,
    }

    #[test]
    fn test_struct_projection() {
        let profile = Profile {
            name: "Miku".to_string(),
            age: 16,
            secret: "hidden".to_string(),
            nickname: String::new(),
            tags: vec!["vocal".to_string()],
        };
        let doc = to_document(&profile).unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["name", "yrs", "tags"]);
        assert_eq!(doc.get("yrs"), Some(&BsonValue::Int32(16)));
    }

    #[test]
    fn test_coercion_through_serde() {
        #[derive(Serialize)]
        struct Numbers {
            a: i8,
            b: u32,
            c: i64,
            d: f64,
            e: Option<i32>,
            f: char,
        }

        let doc = to_document(&Numbers {
            a: 1,
            b: 2,
            c: 3,
            d: 4.5,
            e: None,
            f: 'x',
        })
        .unwrap();
        assert_eq!(doc.get("a"), Some(&BsonValue::Int32(1)));
        assert_eq!(doc.get("b"), Some(&BsonValue::Int64(2)));
        assert_eq!(doc.get("c"), Some(&BsonValue::Int64(3)));
        assert_eq!(doc.get("d"), Some(&BsonValue::Double(4.5)));
        assert_eq!(doc.get("e"), Some(&BsonValue::Null));
        assert_eq!(doc.get("f"), Some(&BsonValue::String("x".to_string())));
    }

    #[test]
    fn test_unsupported_types_name_path() {
        #[derive(Serialize)]
        struct Inner {
            ratio: f32,
        }
        #[derive(Serialize)]
        struct Outer {
            items: Vec<Inner>,
        }

        let err = to_document(&Outer {
            items: vec![Inner { ratio: 0.5 }],
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.path().unwrap().as_str(), "items.0.ratio");
        assert!(err.to_string().contains("f32"));

        let err = to_bson_value(&u64::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_non_string_map_key() {
        let mut map = BTreeMap::new();
        map.insert(1i32, "one");
        let err = to_bson_value(&map).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_canonical_values_pass_through() {
        #[derive(Serialize)]
        struct Record {
            id: ObjectId,
            extra: BsonValue,
            nested: Document,
        }

        let id = ObjectId::from_bytes([1; 12]);
        let record = Record {
            id,
            extra: BsonValue::Regex(RegexValue::new("^a", "i")),
            nested: crate::doc! { "t" => BsonValue::Timestamp(9), "m" => BsonValue::MaxKey },
        };
        let doc = to_document(&record).unwrap();
        assert_eq!(doc.get("id"), Some(&BsonValue::ObjectId(id)));
        assert_eq!(
            doc.get("extra"),
            Some(&BsonValue::Regex(RegexValue::new("^a", "i")))
        );
        assert_eq!(doc.get_path("nested.t"), Some(&BsonValue::Timestamp(9)));
        assert_eq!(doc.get_path("nested.m"), Some(&BsonValue::MaxKey));
    }

    #[test]
    fn test_every_variant_survives_serialize() {
        let mut map = DocumentMap::new();
        map.insert("k", 1i32);
        let values = vec![
            BsonValue::Undefined,
            BsonValue::MinKey,
            BsonValue::DateTime(5),
            BsonValue::JavaScript("f()".to_string()),
            BsonValue::Symbol("sym".to_string()),
            BsonValue::DbPointer(DbPointer {
                namespace: "db.c".to_string(),
                id: ObjectId::from_bytes([2; 12]),
            }),
            BsonValue::JavaScriptWithScope(JavaScriptScope {
                code: "g()".to_string(),
                scope: crate::doc! { "x" => 1i32 },
            }),
            BsonValue::Map(map),
            BsonValue::Raw(crate::doc! { "r" => true }.encode().unwrap()),
        ];
        for value in values {
            assert_eq!(to_bson_value(&value).unwrap(), value);
        }
    }

    #[test]
    fn test_enum_variants_are_tagged() {
        #[derive(Serialize)]
        enum Shape {
            Unit,
            Circle(f64),
            Rect { w: i32, h: i32 },
        }

        assert_eq!(
            to_bson_value(&Shape::Unit).unwrap(),
            BsonValue::String("Unit".to_string())
        );
        let circle = to_bson_value(&Shape::Circle(1.0)).unwrap();
        assert_eq!(circle.get("Circle"), Some(&BsonValue::Double(1.0)));
        let rect = to_bson_value(&Shape::Rect { w: 2, h: 3 }).unwrap();
        assert_eq!(
            rect.get("Rect").and_then(|r| r.get("h")),
            Some(&BsonValue::Int32(3))
        );
    }

    #[test]
    fn test_is_empty() {
        assert!(is_empty(&false));
        assert!(is_empty(&0i64));
        assert!(is_empty(&0.0f64));
        assert!(is_empty(""));
        assert!(is_empty(&Vec::<i32>::new()));
        assert!(is_empty(&None::<String>));
        assert!(is_empty(&BsonValue::Null));
        assert!(!is_empty(&1u8));
        assert!(!is_empty(&Some(0)));
    }
}
