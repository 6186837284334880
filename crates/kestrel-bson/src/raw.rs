//! 原始文档读取
//!
//! [`RawDocument`] 持有一个完整的已编码文档，编码时原样写入，no-nest 解码时原样返回。
//! 从流中读取时先检查声明长度，再分配缓冲区。

use crate::decode::{Decoder, Nesting};
use crate::document::{Document, DocumentMap};
use crate::path::FieldPath;
use crate::spec::{reserved, DOCUMENT_TERMINATOR, MIN_DOCUMENT_SIZE};
use crate::{BsonError, BsonResult};
use bytes::Bytes;
use kestrel_common::DEFAULT_MAX_DOCUMENT_SIZE;
use serde::{Serialize, Serializer};
use std::io::{self, Read};
use tracing::debug;

/// 已编码的完整文档字节(包含长度前缀和终止符)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawDocument {
    bytes: Bytes,
}

impl RawDocument {
    /// 从字节构造并校验外层结构
    ///
    /// # Brief
    /// 只检查长度前缀与实际长度一致、末尾是终止符，不解释内部字段
    ///
    /// # Arguments
    /// * `bytes` - 完整的文档字节
    ///
    /// # Returns
    /// 成功返回 RawDocument，结构不符返回 Shape 类错误
    pub fn from_bytes(bytes: impl Into<Bytes>) -> BsonResult<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_DOCUMENT_SIZE {
            return Err(BsonError::UnexpectedEof {
                path: FieldPath::root(),
            });
        }
        let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if declared as i64 != bytes.len() as i64 {
            return Err(BsonError::InvalidLength {
                path: FieldPath::root(),
                length: declared as i64,
            });
        }
        if bytes[bytes.len() - 1] != DOCUMENT_TERMINATOR {
            return Err(BsonError::InvalidDocument {
                path: FieldPath::root(),
                message: "missing document terminator".to_string(),
            });
        }
        Ok(Self { bytes })
    }

    /// 调用方保证字节是一个完整文档
    pub(crate) fn from_bytes_unchecked(bytes: Bytes) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= MIN_DOCUMENT_SIZE
    }

    /// 完整解码为保序文档
    pub fn to_document(&self) -> BsonResult<Document> {
        Decoder::default().decode_raw(self, Nesting::Nested)
    }

    /// 完整解码为不保序文档
    pub fn to_map(&self) -> BsonResult<DocumentMap> {
        Decoder::default().decode_raw(self, Nesting::Nested)
    }

    /// 只解码顶层，嵌入文档保留为 RawDocument(与本缓冲区共享内存)
    pub fn to_document_no_nest(&self) -> BsonResult<Document> {
        Decoder::default().decode_raw(self, Nesting::NoNest)
    }

    pub fn to_map_no_nest(&self) -> BsonResult<DocumentMap> {
        Decoder::default().decode_raw(self, Nesting::NoNest)
    }

    /// 渲染为扩展 JSON 字符串
    pub fn to_json_string(&self) -> BsonResult<String> {
        let doc = self.to_document()?;
        crate::json::to_json_string(&crate::BsonValue::Document(doc))
    }
}

impl AsRef<[u8]> for RawDocument {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Serialize for RawDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(reserved::RAW, &BytesView(&self.bytes))
    }
}

/// 以 `serialize_bytes` 输出的字节视图
struct BytesView<'a>(&'a [u8]);

impl Serialize for BytesView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

/// 校验声明长度
pub(crate) fn check_declared_length(declared: i32, max: usize) -> BsonResult<usize> {
    if declared < MIN_DOCUMENT_SIZE as i32 {
        return Err(BsonError::InvalidLength {
            path: FieldPath::root(),
            length: declared as i64,
        });
    }
    let declared = declared as usize;
    if declared > max {
        debug!(declared, max, "Rejecting document above size ceiling");
        return Err(BsonError::DocumentTooLarge { declared, max });
    }
    Ok(declared)
}

fn map_read_error(e: io::Error) -> BsonError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        BsonError::UnexpectedEof {
            path: FieldPath::root(),
        }
    } else {
        BsonError::Io(e)
    }
}

/// 读取长度前缀之后的文档主体
fn read_body<R: Read>(reader: &mut R, prefix: [u8; 4], max: usize) -> BsonResult<RawDocument> {
    let declared = check_declared_length(i32::from_le_bytes(prefix), max)?;
    let mut buf = vec![0u8; declared];
    buf[..4].copy_from_slice(&prefix);
    reader.read_exact(&mut buf[4..]).map_err(map_read_error)?;
    Ok(RawDocument::from_bytes_unchecked(Bytes::from(buf)))
}

/// 从流中读取一个完整文档
///
/// # Brief
/// 恰好消费一个文档的字节，流停在下一个文档的起点；声明长度超过 `max_size` 时不读取任何主体字节
///
/// # Arguments
/// * `reader` - 字节源
/// * `max_size` - 文档大小上限
///
/// # Returns
/// 成功返回 RawDocument
pub fn read_raw_document<R: Read>(reader: &mut R, max_size: usize) -> BsonResult<RawDocument> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).map_err(map_read_error)?;
    read_body(reader, prefix, max_size)
}

/// 连续文档流的迭代器
///
/// 在文档边界处遇到干净的 EOF 时结束；文档中途截断是错误。
pub struct RawDocumentStream<R> {
    reader: R,
    max_size: usize,
    done: bool,
}

impl<R: Read> RawDocumentStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_size(reader, DEFAULT_MAX_DOCUMENT_SIZE)
    }

    pub fn with_max_size(reader: R, max_size: usize) -> Self {
        Self {
            reader,
            max_size,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// 读取长度前缀；一个字节都没有时返回 None
    fn read_prefix(&mut self) -> BsonResult<Option<[u8; 4]>> {
        let mut prefix = [0u8; 4];
        let mut filled = 0;
        while filled < prefix.len() {
            match self.reader.read(&mut prefix[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(BsonError::UnexpectedEof {
                        path: FieldPath::root(),
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BsonError::Io(e)),
            }
        }
        Ok(Some(prefix))
    }
}

impl<R: Read> Iterator for RawDocumentStream<R> {
    type Item = BsonResult<RawDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.read_prefix() {
            Ok(None) => {
                self.done = true;
                return None;
            }
            Ok(Some(prefix)) => read_body(&mut self.reader, prefix, self.max_size),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const EMPTY: [u8; 5] = [5, 0, 0, 0, 0];

    #[test]
    fn test_from_bytes_validation() {
        assert!(RawDocument::from_bytes(EMPTY.to_vec()).is_ok());
        assert!(RawDocument::from_bytes(vec![6u8, 0, 0, 0, 0]).is_err());
        assert!(RawDocument::from_bytes(vec![5u8, 0, 0, 0, 1]).is_err());
        assert!(RawDocument::from_bytes(vec![5u8, 0]).is_err());
    }

    #[test]
    fn test_read_leaves_stream_positioned() {
        let mut data = EMPTY.to_vec();
        data.extend_from_slice(&[9, 9]);
        let mut cursor = Cursor::new(data);
        let raw = read_raw_document(&mut cursor, 1024).unwrap();
        assert_eq!(raw.as_bytes(), &EMPTY);
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_short_read_is_shape_error() {
        let mut cursor = Cursor::new(vec![10u8, 0, 0, 0, 0]);
        let err = read_raw_document(&mut cursor, 1024).unwrap_err();
        assert!(matches!(err, BsonError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_too_small_declared_length() {
        let mut cursor = Cursor::new(vec![2u8, 0, 0, 0, 0]);
        let err = read_raw_document(&mut cursor, 1024).unwrap_err();
        assert!(matches!(err, BsonError::InvalidLength { length: 2, .. }));
    }

    #[test]
    fn test_stream_iteration() {
        let mut data = EMPTY.to_vec();
        data.extend_from_slice(&EMPTY);
        let docs: Vec<_> = RawDocumentStream::new(Cursor::new(data))
            .collect::<BsonResult<_>>()
            .unwrap();
        assert_eq!(docs.len(), 2);

        let mut truncated = EMPTY.to_vec();
        truncated.extend_from_slice(&[5, 0]);
        let results: Vec<_> = RawDocumentStream::new(Cursor::new(truncated)).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
