//! 解码器
//!
//! 两个独立的维度控制解码行为：
//! - **目标形态**：由调用的入口决定([`Document`] 或 [`DocumentMap`])，共享同一套按标记分派的逻辑
//! - **嵌套模式**：[`Nesting::Nested`] 完整解码；[`Nesting::NoNest`] 只解码顶层，
//!   嵌入文档字段保留为 [`RawDocument`]。数组不受嵌套模式影响，总是完整解码。
//!
//! 声明长度在读取任何主体字节之前与大小上限比较；嵌套层数超过
//! [`CodecConfig::max_nesting_depth`] 的输入在继续递归之前被拒绝。

use crate::document::{Document, DocumentMap, DocumentShape};
use crate::path::FieldPath;
use crate::raw::{check_declared_length, read_raw_document, RawDocument};
use crate::spec::ElementType;
use crate::value::{object_id_from_slice, BsonValue, DbPointer, JavaScriptScope, RegexValue};
use crate::wire::Reader;
use crate::{BsonError, BsonResult};
use bytes::Bytes;
use compact_str::CompactString;
use kestrel_common::{ArrayIndexOrder, CodecConfig, ObjectId};
use std::io::Read;
use tracing::{debug, trace};

/// 嵌套模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    /// 递归解码全部嵌入文档
    Nested,
    /// 顶层嵌入文档保留为原始字节
    NoNest,
}

/// 可配置的解码器
///
/// 本身无状态，可以在线程间共享。
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: CodecConfig,
}

/// 单次解码的上下文
struct Session<'a> {
    /// 输入来自 `Bytes` 时，原始子文档直接切片共享内存
    source: Option<&'a Bytes>,
    order: ArrayIndexOrder,
    max_depth: usize,
}

impl Decoder {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// 从字节切片解码一个文档
    ///
    /// # Brief
    /// 先校验长度前缀(下限、上限、是否超出输入)，再解码主体；声明长度之后的多余字节被忽略
    ///
    /// # Arguments
    /// * `bytes` - 以文档起点开头的字节
    /// * `nesting` - 嵌套模式
    ///
    /// # Returns
    /// 成功返回目标形态的文档
    pub fn decode<S: DocumentShape>(&self, bytes: &[u8], nesting: Nesting) -> BsonResult<S> {
        self.decode_with_source(bytes, None, nesting)
    }

    /// 解码一个 RawDocument；no-nest 模式下捕获的子文档与其共享内存
    pub fn decode_raw<S: DocumentShape>(
        &self,
        raw: &RawDocument,
        nesting: Nesting,
    ) -> BsonResult<S> {
        let source = raw.clone().into_bytes();
        self.decode_with_source(&source, Some(&source), nesting)
    }

    /// 从流中读取并解码恰好一个文档
    pub fn read<S: DocumentShape, R: Read>(&self, reader: &mut R, nesting: Nesting) -> BsonResult<S> {
        let raw = read_raw_document(reader, self.config.max_document_size)?;
        self.decode_raw(&raw, nesting)
    }

    fn decode_with_source<S: DocumentShape>(
        &self,
        bytes: &[u8],
        source: Option<&Bytes>,
        nesting: Nesting,
    ) -> BsonResult<S> {
        let mut reader = Reader::new(bytes);
        let declared = check_declared_length(reader.read_i32()?, self.config.max_document_size)?;
        if declared > bytes.len() {
            return Err(BsonError::UnexpectedEof {
                path: FieldPath::root(),
            });
        }
        trace!(shape = S::SHAPE_NAME, declared, ?nesting, "Decoding document");
        let session = Session {
            source,
            order: self.config.array_index_order,
            max_depth: self.config.max_nesting_depth,
        };
        let mut doc = S::default();
        session.parse_elements::<S>(&bytes[4..declared], 1, nesting, |k, v| doc.push(k, v))?;
        Ok(doc)
    }
}

impl Session<'_> {
    /// 解析 e_list + 终止符，`depth` 是当前文档所在层数
    ///
    /// 错误逐层补上字段名。
    fn parse_elements<S: DocumentShape>(
        &self,
        body: &[u8],
        depth: usize,
        nesting: Nesting,
        mut push: impl FnMut(CompactString, BsonValue),
    ) -> BsonResult<()> {
        let mut reader = Reader::new(body);
        loop {
            let tag = reader.read_u8()?;
            if tag == 0 {
                if reader.remaining() != 0 {
                    return Err(BsonError::InvalidDocument {
                        path: FieldPath::root(),
                        message: format!("{} bytes after terminator", reader.remaining()),
                    });
                }
                return Ok(());
            }
            let name = reader.read_cstring()?;
            let value = self
                .parse_value::<S>(tag, &mut reader, depth, nesting)
                .map_err(|e| e.within(name))?;
            push(CompactString::from(name), value);
        }
    }

    fn parse_value<S: DocumentShape>(
        &self,
        tag: u8,
        reader: &mut Reader<'_>,
        depth: usize,
        nesting: Nesting,
    ) -> BsonResult<BsonValue> {
        let element_type = ElementType::from_u8(tag).ok_or(BsonError::InvalidElementType {
            path: FieldPath::root(),
            tag,
        })?;

        let value = match element_type {
            ElementType::Double => BsonValue::Double(reader.read_f64()?),
            ElementType::String => BsonValue::String(reader.read_string()?.to_string()),
            ElementType::EmbeddedDocument => {
                let bytes = reader.read_document_bytes()?;
                match nesting {
                    Nesting::Nested => self.parse_document::<S>(bytes, depth)?.into_value(),
                    Nesting::NoNest => {
                        trace!(len = bytes.len(), "Capturing embedded document as raw");
                        BsonValue::Raw(self.capture(bytes)?)
                    }
                }
            }
            ElementType::Array => {
                let bytes = reader.read_document_bytes()?;
                BsonValue::Array(self.parse_array::<S>(bytes, depth)?)
            }
            ElementType::Binary => {
                let len = reader.read_i32()?;
                if len < 0 {
                    return Err(BsonError::InvalidLength {
                        path: FieldPath::root(),
                        length: len as i64,
                    });
                }
                let _subtype = reader.read_u8()?;
                BsonValue::Binary(reader.read_bytes(len as usize)?.to_vec())
            }
            ElementType::Undefined => BsonValue::Undefined,
            ElementType::ObjectId => BsonValue::ObjectId(read_object_id(reader)?),
            ElementType::Boolean => BsonValue::Boolean(reader.read_u8()? == 1),
            ElementType::DateTime => BsonValue::DateTime(reader.read_i64()?),
            ElementType::Null => BsonValue::Null,
            ElementType::Regex => {
                let pattern = reader.read_cstring()?.to_string();
                let options = reader.read_cstring()?.to_string();
                BsonValue::Regex(RegexValue { pattern, options })
            }
            ElementType::DbPointer => {
                let namespace = reader.read_string()?.to_string();
                let id = read_object_id(reader)?;
                BsonValue::DbPointer(DbPointer { namespace, id })
            }
            ElementType::JavaScript => BsonValue::JavaScript(reader.read_string()?.to_string()),
            ElementType::Symbol => BsonValue::Symbol(reader.read_string()?.to_string()),
            ElementType::JavaScriptWithScope => {
                BsonValue::JavaScriptWithScope(self.parse_code_with_scope(reader, depth)?)
            }
            ElementType::Int32 => BsonValue::Int32(reader.read_i32()?),
            ElementType::Timestamp => BsonValue::Timestamp(reader.read_i64()?),
            ElementType::Int64 => BsonValue::Int64(reader.read_i64()?),
            ElementType::MinKey => BsonValue::MinKey,
            ElementType::MaxKey => BsonValue::MaxKey,
        };
        Ok(value)
    }

    /// 进入下一层，超过上限时返回 Shape 错误
    fn descend(&self, depth: usize) -> BsonResult<usize> {
        let next = depth + 1;
        if next > self.max_depth {
            debug!(max = self.max_depth, "Rejecting document nested too deeply");
            return Err(BsonError::InvalidDocument {
                path: FieldPath::root(),
                message: format!("nesting exceeds {} levels", self.max_depth),
            });
        }
        Ok(next)
    }

    /// 完整解码一个嵌入文档(`bytes` 包含长度前缀)
    fn parse_document<S: DocumentShape>(&self, bytes: &[u8], depth: usize) -> BsonResult<S> {
        let depth = self.descend(depth)?;
        let mut doc = S::default();
        self.parse_elements::<S>(&bytes[4..], depth, Nesting::Nested, |k, v| doc.push(k, v))?;
        Ok(doc)
    }

    /// 数组按键收集后排序，再输出值序列
    fn parse_array<S: DocumentShape>(&self, bytes: &[u8], depth: usize) -> BsonResult<Vec<BsonValue>> {
        let depth = self.descend(depth)?;
        let mut entries: Vec<(CompactString, BsonValue)> = Vec::new();
        self.parse_elements::<S>(&bytes[4..], depth, Nesting::Nested, |k, v| {
            entries.push((k, v))
        })?;

        match self.order {
            ArrayIndexOrder::Numeric => entries.sort_by(|a, b| {
                let ka = a.0.parse::<u64>().ok();
                let kb = b.0.parse::<u64>().ok();
                match (ka, kb) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.0.cmp(&b.0),
                }
            }),
            ArrayIndexOrder::Lexicographic => entries.sort_by(|a, b| a.0.cmp(&b.0)),
        }
        Ok(entries.into_iter().map(|(_, v)| v).collect())
    }

    /// code_w_s ::= int32 string document，总长度必须与实际消费的字节数一致
    fn parse_code_with_scope(
        &self,
        reader: &mut Reader<'_>,
        depth: usize,
    ) -> BsonResult<JavaScriptScope> {
        let start = reader.position();
        let total = reader.read_i32()?;
        if total < 4 + 4 + crate::spec::MIN_DOCUMENT_SIZE as i32 {
            return Err(BsonError::InvalidLength {
                path: FieldPath::root(),
                length: total as i64,
            });
        }
        let code = reader.read_string()?.to_string();
        let scope_bytes = reader.read_document_bytes()?;
        let scope = self
            .parse_document::<Document>(scope_bytes, depth)
            .map_err(|e| e.within("Scope"))?;
        let consumed = reader.position() - start;
        if consumed != total as usize {
            return Err(BsonError::InvalidLength {
                path: FieldPath::root(),
                length: total as i64,
            });
        }
        Ok(JavaScriptScope { code, scope })
    }

    fn capture(&self, bytes: &[u8]) -> BsonResult<RawDocument> {
        let captured = match self.source {
            Some(source) => source.slice_ref(bytes),
            None => Bytes::copy_from_slice(bytes),
        };
        RawDocument::from_bytes(captured)
    }
}

fn read_object_id(reader: &mut Reader<'_>) -> BsonResult<ObjectId> {
    object_id_from_slice(reader.read_bytes(12)?)
}

// ============================================================================
// 默认配置的便捷入口
// ============================================================================

/// 解码为保序文档(完整嵌套)
pub fn decode_document(bytes: &[u8]) -> BsonResult<Document> {
    Decoder::default().decode(bytes, Nesting::Nested)
}

/// 解码为保序文档，顶层嵌入文档保留为原始字节
pub fn decode_document_no_nest(bytes: &[u8]) -> BsonResult<Document> {
    Decoder::default().decode(bytes, Nesting::NoNest)
}

/// 解码为不保序文档(完整嵌套)
pub fn decode_map(bytes: &[u8]) -> BsonResult<DocumentMap> {
    Decoder::default().decode(bytes, Nesting::Nested)
}

pub fn decode_map_no_nest(bytes: &[u8]) -> BsonResult<DocumentMap> {
    Decoder::default().decode(bytes, Nesting::NoNest)
}

/// 从流中读取一个文档并解码为保序文档
pub fn read_document<R: Read>(reader: &mut R) -> BsonResult<Document> {
    Decoder::default().read(reader, Nesting::Nested)
}

pub fn read_document_no_nest<R: Read>(reader: &mut R) -> BsonResult<Document> {
    Decoder::default().read(reader, Nesting::NoNest)
}

/// 从流中读取一个文档并解码为不保序文档
pub fn read_map<R: Read>(reader: &mut R) -> BsonResult<DocumentMap> {
    Decoder::default().read(reader, Nesting::Nested)
}

pub fn read_map_no_nest<R: Read>(reader: &mut R) -> BsonResult<DocumentMap> {
    Decoder::default().read(reader, Nesting::NoNest)
}
