//! 公共类型定义模块
//!
//! - ObjectId: 12 字节唯一标识符(MongoDB ObjectId 布局)
//! - ObjectIdGenerator: 持有进程级原子计数器的 ObjectId 生成器

use crate::platform::HostIdentity;
use crate::{CommonError, CommonResult};
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// ObjectId 在 serde 中使用的保留 newtype 名称
///
/// 文档序列化器据此识别 ObjectId 并原样写为 ObjectId 元素；
/// 其他序列化器(如 serde_json)只会看到十六进制字符串。
pub const OBJECT_ID_NEWTYPE: &str = "$__kestrel_object_id";

/// 计数器只占用 3 字节
const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// ObjectId - 12 字节唯一标识符
///
/// 格式:
/// - 0..4: Unix 时间(秒,大端)
/// - 4..7: 主机名哈希的前 3 字节
/// - 7..9: 进程号(大端,截断为 16 位)
/// - 9..12: 自增计数器(大端,取低 3 字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// 从任意长度的字节切片构造
    ///
    /// # Brief
    /// 长度必须恰好为 12 字节
    ///
    /// # Arguments
    /// * `bytes` - 原始字节
    ///
    /// # Returns
    /// 成功返回 ObjectId，长度不符返回 InvalidObjectId 错误
    pub fn from_slice(bytes: &[u8]) -> CommonResult<Self> {
        let arr: [u8; 12] = bytes.try_into().map_err(|_| {
            CommonError::InvalidObjectId(format!(
                "ObjectId must be 12 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> CommonResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CommonError::InvalidObjectId(format!("Invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(OBJECT_ID_NEWTYPE, &self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ObjectId::from_hex(&s).map_err(de::Error::custom)
    }
}

/// ObjectId 生成器
///
/// 每个进程构造一次并注入到需要生成 ID 的地方。
/// 同一秒内、计数器未回绕时，连续生成的 ID 按字节序严格递增。
#[derive(Debug)]
pub struct ObjectIdGenerator {
    counter: AtomicU32,
    machine: [u8; 3],
    pid: u16,
}

impl ObjectIdGenerator {
    /// 使用当前主机身份创建生成器
    ///
    /// # Returns
    /// 成功返回生成器，主机名无法获取时返回错误
    pub fn new() -> CommonResult<Self> {
        let identity = HostIdentity::current()?;
        Ok(Self::with_identity(&identity.hostname, identity.pid))
    }

    /// 使用指定的主机名与进程号创建生成器
    pub fn with_identity(hostname: &str, pid: u32) -> Self {
        let digest = Sha256::digest(hostname.as_bytes());
        let machine = [digest[0], digest[1], digest[2]];
        // 只保留低 16 位
        let pid = pid as u16;
        debug!(hostname, pid, machine = %hex::encode(machine), "object id generator ready");
        Self {
            counter: AtomicU32::new(0),
            machine,
            pid,
        }
    }

    /// 生成新的 ObjectId
    pub fn generate(&self) -> ObjectId {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        self.generate_at(secs)
    }

    fn generate_at(&self, secs: u32) -> ObjectId {
        // u32 回绕周期是 2^24 的整数倍，掩码后即为模 2^24
        let count = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1) & COUNTER_MASK;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..7].copy_from_slice(&self.machine);
        bytes[7..9].copy_from_slice(&self.pid.to_be_bytes());
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    pub fn machine_id(&self) -> [u8; 3] {
        self.machine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_layout() {
        let gen = ObjectIdGenerator::with_identity("miku-host", 0x0001_3939);
        let id = gen.generate_at(0x0102_0304);
        let bytes = id.as_bytes();

        assert_eq!(&bytes[0..4], &[0x01, 0x02, 0x03, 0x04]);
        let digest = Sha256::digest(b"miku-host");
        assert_eq!(&bytes[4..7], &digest[..3]);
        assert_eq!(&bytes[7..9], &[0x39, 0x39]);
        assert_eq!(&bytes[9..12], &[0x00, 0x00, 0x01]);
        assert_eq!(id.timestamp(), 0x0102_0304);
    }

    #[test]
    fn test_strictly_increasing() {
        let gen = ObjectIdGenerator::with_identity("host", 42);
        let ids: Vec<ObjectId> = (0..1000).map(|_| gen.generate()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0].as_bytes() < pair[1].as_bytes());
        }
    }

    #[test]
    fn test_counter_wraps_at_24_bits() {
        let gen = ObjectIdGenerator::with_identity("host", 1);
        gen.counter.store(COUNTER_MASK - 1, Ordering::Relaxed);
        let last = gen.generate_at(7);
        let wrapped = gen.generate_at(7);
        assert_eq!(&last.as_bytes()[9..12], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&wrapped.as_bytes()[9..12], &[0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_concurrent_ids_unique() {
        let gen = Arc::new(ObjectIdGenerator::with_identity("host", 7));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = Arc::clone(&gen);
                std::thread::spawn(move || (0..250).map(|_| gen.generate()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<ObjectId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_hex_round_trip() {
        let id = ObjectId::from_bytes([0xAB; 12]);
        assert_eq!(id.to_hex(), "abababababababababababab");
        assert_eq!(ObjectId::from_hex(&id.to_hex()).unwrap(), id);
        assert!(ObjectId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(ObjectId::from_slice(&[0u8; 11]).is_err());
        assert!(ObjectId::from_slice(&[0u8; 13]).is_err());
        assert!(ObjectId::from_slice(&[0u8; 12]).is_ok());
    }
}
