//! # kestrel-bson
//!
//! 长度前缀、带类型标记的二进制文档格式(BSON)编解码器。
//!
//! - **规范类型**：[`BsonValue`] 覆盖全部线格式类型，规范类型文档编码后再解码逐字节、逐值一致
//! - **两种文档形态**：保序的 [`Document`] 与不保序的 [`DocumentMap`]，外加未解码的 [`RawDocument`]
//! - **宽松编码**：宿主类型(整数、浮点、字符串、字节、时间)经固定转换表直接编码
//! - **Reach**：按字段路径深入嵌套文档，并把叶子值转换为调用方指定的目标类型
//! - **Serde 集成**：结构体按字段属性(skip / rename / skip_serializing_if)投影为文档
//!
//! 记录中的 `chrono::DateTime<Utc>` 字段按 serde 默认实现会变成字符串，`Vec<u8>` 会变成
//! 整数数组；需要 UTC 时间或二进制元素时，分别标注
//! `#[serde(with = "kestrel_bson::serde_helpers::chrono_datetime")]` 与
//! `#[serde(with = "kestrel_bson::serde_helpers::binary")]`。直接构造值时
//! (`BsonValue::from`、`doc!`)两者按转换表自动得到 UTC 时间与二进制。
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use kestrel_bson::{doc, decode_map, Document};
//!
//! let doc = doc! { "name" => "Miku", "age" => 16i32 };
//! let raw = doc.encode().unwrap();
//! let map = decode_map(raw.as_bytes()).unwrap();
//!
//! let mut age = 0i64;
//! assert!(map.reach(&mut age, &["age"]).unwrap());
//! ```

pub mod spec;
pub mod path;
pub mod value;
pub mod document;
pub mod raw;
pub mod wire;
pub mod encode;
pub mod decode;
pub mod reach;
pub mod ser;
pub mod serde_helpers;
pub mod json;

pub use decode::{
    decode_document, decode_document_no_nest, decode_map, decode_map_no_nest, read_document,
    read_document_no_nest, read_map, read_map_no_nest, Decoder, Nesting,
};
pub use document::{Document, DocumentMap, DocumentShape};
pub use encode::{encode_document, encode_map};
pub use kestrel_common::{ArrayIndexOrder, CodecConfig, ObjectId, ObjectIdGenerator};
pub use json::{from_json, from_json_string, to_json, to_json_string};
pub use path::FieldPath;
pub use raw::{read_raw_document, RawDocument, RawDocumentStream};
pub use reach::ReachTarget;
pub use ser::{encode_struct, is_empty, to_bson_value, to_document, IsEmpty};
pub use spec::ElementType;
pub use value::{object_id_from_slice, BsonValue, DbPointer, JavaScriptScope, RegexValue};

use thiserror::Error;

/// 编解码操作的错误类型
///
/// 深层递归中产生的错误都带有出错字段的点分路径。
#[derive(Error, Debug)]
pub enum BsonError {
    /// 底层字节源读取失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 输入在声明长度之前结束
    #[error("{path}: unexpected end of input")]
    UnexpectedEof { path: FieldPath },

    /// 声明的文档长度超过上限
    #[error("Document too large: declared {declared} bytes, max {max}")]
    DocumentTooLarge { declared: usize, max: usize },

    /// 长度字段非法(负数、过小或超出剩余数据)
    #[error("{path}: invalid length {length}")]
    InvalidLength { path: FieldPath, length: i64 },

    /// 无法识别的类型标记字节
    #[error("{path}: unsupported element type 0x{tag:02X}")]
    InvalidElementType { path: FieldPath, tag: u8 },

    /// 缺少 NUL 终止符
    #[error("{path}: missing NUL terminator")]
    MissingNul { path: FieldPath },

    /// 字段名或 cstring 内含 NUL 字节
    #[error("{path}: name contains NUL byte")]
    InteriorNul { path: FieldPath },

    /// 字符串不是有效的 UTF-8 编码
    #[error("{path}: invalid UTF-8")]
    InvalidUtf8 { path: FieldPath },

    /// 文档结构无效
    #[error("{path}: invalid document: {message}")]
    InvalidDocument { path: FieldPath, message: String },

    /// 宿主类型没有对应的编码转换规则
    #[error("{path}: cannot encode {type_name}")]
    UnsupportedType { path: FieldPath, type_name: String },

    /// Reach 时叶子值无法转换为目标类型
    #[error("{path}: cannot coerce {from} to {to}")]
    CannotCoerce {
        path: FieldPath,
        from: &'static str,
        to: &'static str,
    },

    /// ObjectId / DbPointer 的 id 长度不是 12 字节
    #[error("{path}: ObjectId must be 12 bytes, got {len}")]
    InvalidObjectIdLength { path: FieldPath, len: usize },

    /// serde 序列化过程中的自定义错误
    #[error("{path}: serialization error: {message}")]
    Serialization { path: FieldPath, message: String },
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 长度缺失/截断/超限、类型标记非法、缺少 NUL
    Shape,
    /// 编码或 Reach 时类型无转换规则
    Type,
    /// 定长字段长度不符
    Constraint,
    /// 底层读取失败
    Io,
}

impl BsonError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BsonError::Io(_) => ErrorKind::Io,
            BsonError::UnexpectedEof { .. }
            | BsonError::DocumentTooLarge { .. }
            | BsonError::InvalidLength { .. }
            | BsonError::InvalidElementType { .. }
            | BsonError::MissingNul { .. }
            | BsonError::InteriorNul { .. }
            | BsonError::InvalidUtf8 { .. }
            | BsonError::InvalidDocument { .. } => ErrorKind::Shape,
            BsonError::UnsupportedType { .. }
            | BsonError::CannotCoerce { .. }
            | BsonError::Serialization { .. } => ErrorKind::Type,
            BsonError::InvalidObjectIdLength { .. } => ErrorKind::Constraint,
        }
    }

    /// 出错位置的字段路径
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            BsonError::Io(_) | BsonError::DocumentTooLarge { .. } => None,
            BsonError::UnexpectedEof { path }
            | BsonError::InvalidLength { path, .. }
            | BsonError::InvalidElementType { path, .. }
            | BsonError::MissingNul { path }
            | BsonError::InteriorNul { path }
            | BsonError::InvalidUtf8 { path }
            | BsonError::InvalidDocument { path, .. }
            | BsonError::UnsupportedType { path, .. }
            | BsonError::CannotCoerce { path, .. }
            | BsonError::InvalidObjectIdLength { path, .. }
            | BsonError::Serialization { path, .. } => Some(path),
        }
    }

    /// 在路径前追加一个字段名
    ///
    /// serde 序列化自内向外返回错误，每退出一层就把该层字段名补到路径前面。
    pub(crate) fn within(mut self, name: &str) -> Self {
        match &mut self {
            BsonError::Io(_) | BsonError::DocumentTooLarge { .. } => {}
            BsonError::UnexpectedEof { path }
            | BsonError::InvalidLength { path, .. }
            | BsonError::InvalidElementType { path, .. }
            | BsonError::MissingNul { path }
            | BsonError::InteriorNul { path }
            | BsonError::InvalidUtf8 { path }
            | BsonError::InvalidDocument { path, .. }
            | BsonError::UnsupportedType { path, .. }
            | BsonError::CannotCoerce { path, .. }
            | BsonError::InvalidObjectIdLength { path, .. }
            | BsonError::Serialization { path, .. } => *path = path.prepend(name),
        }
        self
    }
}

/// 编解码操作的 Result 类型别名
pub type BsonResult<T> = Result<T, BsonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_and_path() {
        let err = BsonError::UnsupportedType {
            path: FieldPath::root().child("b"),
            type_name: "f32".to_string(),
        }
        .within("a");
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.path().unwrap().as_str(), "a.b");
        assert_eq!(err.to_string(), "a.b: cannot encode f32");

        let err = BsonError::DocumentTooLarge {
            declared: 100,
            max: 10,
        };
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert!(err.path().is_none());
    }
}
