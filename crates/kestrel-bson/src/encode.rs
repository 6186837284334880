//! 编码器
//!
//! 把两种文档形态(或顶层的 Raw 值)写成线格式字节。每个文档先写长度占位符，
//! 写完全部字段和终止符后回填长度。嵌套值出错时逐层把字段名补进错误路径。

use crate::document::{Document, DocumentMap};
use crate::path::FieldPath;
use crate::raw::RawDocument;
use crate::spec::BINARY_SUBTYPE_GENERIC;
use crate::value::BsonValue;
use crate::wire;
use crate::{BsonError, BsonResult};
use bytes::{BufMut, BytesMut};

/// 编码保序文档
///
/// # Brief
/// 按字段插入顺序写出文档
///
/// # Arguments
/// * `doc` - 要编码的文档
///
/// # Returns
/// 成功返回完整文档字节，失败返回带字段路径的错误
pub fn encode_document(doc: &Document) -> BsonResult<RawDocument> {
    let mut buf = BytesMut::with_capacity(64);
    write_document(&mut buf, doc.iter())?;
    Ok(RawDocument::from_bytes_unchecked(buf.freeze()))
}

/// 编码不保序文档，字段顺序由哈希表迭代顺序决定
pub fn encode_map(map: &DocumentMap) -> BsonResult<RawDocument> {
    let mut buf = BytesMut::with_capacity(64);
    write_document(&mut buf, map.iter())?;
    Ok(RawDocument::from_bytes_unchecked(buf.freeze()))
}

impl BsonValue {
    /// 把顶层值编码为文档
    ///
    /// 只有 Document、Map、Raw 可以作为顶层值；其他类型返回 Type 错误。
    pub fn encode_document(&self) -> BsonResult<RawDocument> {
        match self {
            BsonValue::Document(doc) => encode_document(doc),
            BsonValue::Map(map) => encode_map(map),
            BsonValue::Raw(raw) => Ok(raw.clone()),
            other => Err(BsonError::UnsupportedType {
                path: FieldPath::root(),
                type_name: other.type_name().to_string(),
            }),
        }
    }
}

pub(crate) fn write_document<'a>(
    buf: &mut BytesMut,
    fields: impl Iterator<Item = (&'a str, &'a BsonValue)>,
) -> BsonResult<()> {
    let start = wire::begin_document(buf);
    for (name, value) in fields {
        write_element(buf, name, value).map_err(|e| e.within(name))?;
    }
    wire::finish_document(buf, start)
}

fn write_array(buf: &mut BytesMut, items: &[BsonValue]) -> BsonResult<()> {
    let start = wire::begin_document(buf);
    for (i, item) in items.iter().enumerate() {
        let key = i.to_string();
        write_element(buf, &key, item).map_err(|e| e.within(&key))?;
    }
    wire::finish_document(buf, start)
}

/// 写入单个元素: 类型标记 | 字段名 | 负载
fn write_element(buf: &mut BytesMut, name: &str, value: &BsonValue) -> BsonResult<()> {
    buf.put_u8(value.element_type().as_u8());
    wire::put_cstring(buf, name)?;
    write_payload(buf, value)
}

fn write_payload(buf: &mut BytesMut, value: &BsonValue) -> BsonResult<()> {
    match value {
        BsonValue::Double(n) => wire::put_f64(buf, *n),
        BsonValue::String(s) | BsonValue::JavaScript(s) | BsonValue::Symbol(s) => {
            wire::put_string(buf, s)?
        }
        BsonValue::Document(doc) => write_document(buf, doc.iter())?,
        BsonValue::Map(map) => write_document(buf, map.iter())?,
        BsonValue::Raw(raw) => buf.put_slice(raw.as_bytes()),
        BsonValue::Array(items) => write_array(buf, items)?,
        BsonValue::Binary(bytes) => {
            buf.put_i32_le(wire::checked_len(bytes.len())?);
            buf.put_u8(BINARY_SUBTYPE_GENERIC);
            buf.put_slice(bytes);
        }
        BsonValue::ObjectId(id) => buf.put_slice(id.as_bytes()),
        BsonValue::Boolean(b) => buf.put_u8(u8::from(*b)),
        BsonValue::DateTime(ms) | BsonValue::Timestamp(ms) => wire::put_i64(buf, *ms),
        BsonValue::Regex(regex) => {
            wire::put_cstring(buf, &regex.pattern)?;
            wire::put_cstring(buf, &regex.options)?;
        }
        BsonValue::DbPointer(pointer) => {
            wire::put_string(buf, &pointer.namespace)?;
            buf.put_slice(pointer.id.as_bytes());
        }
        BsonValue::JavaScriptWithScope(js) => {
            // 总长度覆盖整个 code_w_s(含自身与作用域文档的终止符)，先占位后回填
            let start = buf.len();
            buf.put_i32_le(0);
            wire::put_string(buf, &js.code)?;
            write_document(buf, js.scope.iter()).map_err(|e| e.within("Scope"))?;
            let total = wire::checked_len(buf.len() - start)?;
            buf[start..start + 4].copy_from_slice(&total.to_le_bytes());
        }
        BsonValue::Int32(n) => wire::put_i32(buf, *n),
        BsonValue::Int64(n) => wire::put_i64(buf, *n),
        BsonValue::Undefined | BsonValue::Null | BsonValue::MinKey | BsonValue::MaxKey => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{JavaScriptScope, RegexValue};
    use crate::ErrorKind;

    #[test]
    fn test_empty_document() {
        let raw = encode_document(&Document::new()).unwrap();
        assert_eq!(raw.as_bytes(), &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_int32_layout() {
        let raw = crate::doc! { "a" => 1i32 }.encode().unwrap();
        assert_eq!(
            raw.as_bytes(),
            &[12, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_array_keys() {
        let raw = crate::doc! { "a" => vec![true] }.encode().unwrap();
        assert_eq!(
            raw.as_bytes(),
            &[17, 0, 0, 0, 0x04, b'a', 0, 9, 0, 0, 0, 0x08, b'0', 0, 1, 0, 0]
        );
    }

    #[test]
    fn test_empty_array_is_written() {
        let raw = crate::doc! { "a" => Vec::<i32>::new() }.encode().unwrap();
        assert_eq!(raw.as_bytes(), &[13, 0, 0, 0, 0x04, b'a', 0, 5, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_binary_subtype_is_generic() {
        let raw = crate::doc! { "b" => &[7u8, 8][..] }.encode().unwrap();
        assert_eq!(
            raw.as_bytes(),
            &[15, 0, 0, 0, 0x05, b'b', 0, 2, 0, 0, 0, 0x00, 7, 8, 0]
        );
    }

    #[test]
    fn test_raw_copied_verbatim() {
        let inner = crate::doc! { "x" => 1i32 }.encode().unwrap();
        let outer = crate::doc! { "r" => inner.clone() }.encode().unwrap();
        let bytes = outer.as_bytes();
        assert_eq!(&bytes[7..7 + inner.len()], inner.as_bytes());
    }

    #[test]
    fn test_code_with_scope_length() {
        let js = JavaScriptScope {
            code: "f".to_string(),
            scope: Document::new(),
        };
        let raw = crate::doc! { "c" => js }.encode().unwrap();
        let bytes = raw.as_bytes();
        // 4(total) + 4 + "f\0" + 5(空作用域)
        assert_eq!(&bytes[7..11], &15i32.to_le_bytes());
        // 总长度一直数到作用域文档的终止符，之后只剩外层文档的终止符
        assert_eq!(&bytes[17..22], &[5, 0, 0, 0, 0]);
        assert_eq!(bytes.len(), 7 + 15 + 1);
    }

    #[test]
    fn test_nested_error_carries_path() {
        let inner = crate::doc! { "bad\0key" => 1i32 };
        let doc = crate::doc! { "outer" => crate::doc! { "list" => vec![BsonValue::Document(inner)] } };
        let err = doc.encode().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(err.path().unwrap().as_str(), "outer.list.0.bad\0key");
    }

    #[test]
    fn test_regex_options_reject_nul() {
        let doc = crate::doc! { "r" => RegexValue::new("a\0", "") };
        let err = doc.encode().unwrap_err();
        assert_eq!(err.path().unwrap().as_str(), "r");
    }

    #[test]
    fn test_scalar_top_level_rejected() {
        let err = BsonValue::Int32(1).encode_document().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }
}
