//! 线格式常量与元素类型标记
//!
//! ```text
//! document ::= int32 e_list "\x00"
//! element  ::= type_byte e_name payload
//! e_name   ::= cstring
//! string   ::= int32 (byte*) "\x00"        长度包含末尾 NUL
//! binary   ::= int32 subtype (byte*)
//! code_w_s ::= int32 string document
//! ```

/// 文档终止字节，同时也是 e_list 的结束标记
pub const DOCUMENT_TERMINATOR: u8 = 0x00;

/// 最小文档: 4 字节长度 + 1 字节终止符
pub const MIN_DOCUMENT_SIZE: usize = 5;

/// 编码二进制数据时固定使用的子类型(Binary / Generic)
pub const BINARY_SUBTYPE_GENERIC: u8 = 0x00;

/// 元素类型标记
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    EmbeddedDocument = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    DbPointer = 0x0C,
    JavaScript = 0x0D,
    Symbol = 0x0E,
    JavaScriptWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl ElementType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Double),
            0x02 => Some(Self::String),
            0x03 => Some(Self::EmbeddedDocument),
            0x04 => Some(Self::Array),
            0x05 => Some(Self::Binary),
            0x06 => Some(Self::Undefined),
            0x07 => Some(Self::ObjectId),
            0x08 => Some(Self::Boolean),
            0x09 => Some(Self::DateTime),
            0x0A => Some(Self::Null),
            0x0B => Some(Self::Regex),
            0x0C => Some(Self::DbPointer),
            0x0D => Some(Self::JavaScript),
            0x0E => Some(Self::Symbol),
            0x0F => Some(Self::JavaScriptWithScope),
            0x10 => Some(Self::Int32),
            0x11 => Some(Self::Timestamp),
            0x12 => Some(Self::Int64),
            0x7F => Some(Self::MaxKey),
            0xFF => Some(Self::MinKey),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}


/// serde 保留名称
///
/// 非 JSON 原生的规范类型在 `Serialize` 中包装为带保留名称的 newtype / unit struct，
/// 文档序列化器据此还原为原始变体，其他序列化器只看到内部载荷。
pub(crate) mod reserved {
    pub use kestrel_common::types::OBJECT_ID_NEWTYPE as OBJECT_ID;

    pub const PREFIX: &str = "$__kestrel_";
    pub const DATETIME: &str = "$__kestrel_datetime";
    pub const TIMESTAMP: &str = "$__kestrel_timestamp";
    pub const JAVASCRIPT: &str = "$__kestrel_javascript";
    pub const SYMBOL: &str = "$__kestrel_symbol";
    pub const REGEX: &str = "$__kestrel_regex";
    pub const DB_POINTER: &str = "$__kestrel_db_pointer";
    pub const CODE_WITH_SCOPE: &str = "$__kestrel_code_with_scope";
    pub const MAP: &str = "$__kestrel_map";
    pub const RAW: &str = "$__kestrel_raw";
    pub const UNDEFINED: &str = "$__kestrel_undefined";
    pub const MIN_KEY: &str = "$__kestrel_min_key";
    pub const MAX_KEY: &str = "$__kestrel_max_key";
}
