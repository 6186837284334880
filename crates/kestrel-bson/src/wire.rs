//! 字节原语
//!
//! 写入端基于 `BytesMut`，读取端是对 `&[u8]` 做边界检查的游标。所有整数和浮点数都是小端序。
//! 读取端返回的错误路径为空，由解码器在逐层返回时补上字段名。

use crate::path::FieldPath;
use crate::spec::DOCUMENT_TERMINATOR;
use crate::{BsonError, BsonResult};
use bytes::{BufMut, BytesMut};

// ============================================================================
// 写入
// ============================================================================

/// 写入 NUL 结尾的字段名
///
/// # Brief
/// 字段名本身不能包含 NUL，否则解码时会在错误位置截断
///
/// # Arguments
/// * `buf` - 目标缓冲区
/// * `name` - 字段名
pub fn put_cstring(buf: &mut BytesMut, name: &str) -> BsonResult<()> {
    if name.as_bytes().contains(&0) {
        return Err(BsonError::InteriorNul {
            path: FieldPath::root(),
        });
    }
    buf.put_slice(name.as_bytes());
    buf.put_u8(0);
    Ok(())
}

/// 写入长度前缀字符串: int32(len + 1) | bytes | NUL
pub fn put_string(buf: &mut BytesMut, value: &str) -> BsonResult<()> {
    let len = checked_len(value.len() + 1)?;
    buf.put_i32_le(len);
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
    Ok(())
}

pub fn put_i32(buf: &mut BytesMut, value: i32) {
    buf.put_i32_le(value);
}

pub fn put_i64(buf: &mut BytesMut, value: i64) {
    buf.put_i64_le(value);
}

/// 写入 IEEE-754 双精度浮点数的小端位模式
pub fn put_f64(buf: &mut BytesMut, value: f64) {
    buf.put_slice(&value.to_bits().to_le_bytes());
}

/// 写入 4 字节长度占位符，返回占位符的偏移量
pub fn begin_document(buf: &mut BytesMut) -> usize {
    let start = buf.len();
    buf.put_i32_le(0);
    start
}

/// 写入终止符并回填文档长度(包含长度字段本身)
pub fn finish_document(buf: &mut BytesMut, start: usize) -> BsonResult<()> {
    buf.put_u8(DOCUMENT_TERMINATOR);
    let len = checked_len(buf.len() - start)?;
    buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
    Ok(())
}

/// 长度字段只有 int32 宽度
pub(crate) fn checked_len(len: usize) -> BsonResult<i32> {
    i32::try_from(len).map_err(|_| BsonError::InvalidLength {
        path: FieldPath::root(),
        length: len as i64,
    })
}

// ============================================================================
// 读取
// ============================================================================

/// 对字节切片做边界检查的读取游标
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn eof() -> BsonError {
        BsonError::UnexpectedEof {
            path: FieldPath::root(),
        }
    }

    /// 读取 `len` 个字节，长度先与剩余字节数比较再切片
    pub fn read_bytes(&mut self, len: usize) -> BsonResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(Self::eof());
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> BsonResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> BsonResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> BsonResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> BsonResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> BsonResult<f64> {
        Ok(f64::from_bits(u64::from_le_bytes(self.read_array()?)))
    }

    /// 读取 NUL 结尾的字符串
    pub fn read_cstring(&mut self) -> BsonResult<&'a str> {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == 0).ok_or(BsonError::MissingNul {
            path: FieldPath::root(),
        })?;
        let text = std::str::from_utf8(&rest[..end]).map_err(|_| BsonError::InvalidUtf8 {
            path: FieldPath::root(),
        })?;
        self.pos += end + 1;
        Ok(text)
    }

    /// 读取长度前缀字符串
    ///
    /// 长度字段为 0 时视为空字符串，不消费任何负载字节。
    pub fn read_string(&mut self) -> BsonResult<&'a str> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(BsonError::InvalidLength {
                path: FieldPath::root(),
                length: len as i64,
            });
        }
        if len == 0 {
            return Ok("");
        }
        let bytes = self.read_bytes(len as usize)?;
        let (payload, terminator) = bytes.split_at(bytes.len() - 1);
        if terminator[0] != 0 {
            return Err(BsonError::MissingNul {
                path: FieldPath::root(),
            });
        }
        std::str::from_utf8(payload).map_err(|_| BsonError::InvalidUtf8 {
            path: FieldPath::root(),
        })
    }

    /// 读取一个完整的嵌入文档(包含长度字段)，不解释其内容
    pub fn read_document_bytes(&mut self) -> BsonResult<&'a [u8]> {
        let start = self.pos;
        let len = self.read_i32()?;
        if len < crate::spec::MIN_DOCUMENT_SIZE as i32 {
            return Err(BsonError::InvalidLength {
                path: FieldPath::root(),
                length: len as i64,
            });
        }
        self.pos = start;
        self.read_bytes(len as usize)
    }
}
