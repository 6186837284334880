//! serde 字段辅助模块
//!
//! serde 的数据模型里 `Vec<u8>` 是整数序列，`DateTime<Utc>` 是 RFC 3339 字符串，
//! 记录字段需要用这里的 `with` 模块才能得到二进制与 UTC 时间元素。
//! `serde_bytes` 走的也是 `serialize_bytes`，同样得到二进制元素。

/// `chrono::DateTime<Utc>` 字段编码为 UTC 时间元素(毫秒)
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Event {
///     #[serde(with = "kestrel_bson::serde_helpers::chrono_datetime")]
///     at: chrono::DateTime<chrono::Utc>,
/// }
/// ```
///
/// 其他格式(如 JSON)中表现为毫秒整数。
pub mod chrono_datetime {
    use crate::spec::reserved;
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::{self, Deserialize, Deserializer};
    use serde::ser::Serializer;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(reserved::DATETIME, &value.timestamp_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", millis)))
    }
}

/// `Vec<u8>` 等字节缓冲区字段编码为二进制元素(子类型 0x00)
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Blob {
///     #[serde(with = "kestrel_bson::serde_helpers::binary")]
///     payload: Vec<u8>,
/// }
/// ```
pub mod binary {
    use serde::de::{Deserialize, Deserializer};
    use serde::ser::Serializer;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]> + ?Sized,
        S: Serializer,
    {
        serializer.serialize_bytes(value.as_ref())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use crate::value::BsonValue;
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Event {
        #[serde(with = "super::chrono_datetime")]
        at: DateTime<Utc>,
    }

    #[test]
    fn test_datetime_field() {
        let at = Utc.timestamp_millis_opt(1_234_567).unwrap();
        let doc = crate::to_document(&Event { at }).unwrap();
        assert_eq!(doc.get("at"), Some(&BsonValue::DateTime(1_234_567)));

        let json = serde_json::to_string(&Event { at }).unwrap();
        assert_eq!(json, r#"{"at":1234567}"#);
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.at, at);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        #[serde(with = "super::binary")]
        payload: Vec<u8>,
        plain: Vec<u8>,
    }

    #[test]
    fn test_binary_field() {
        let blob = Blob {
            payload: vec![1, 2],
            plain: vec![1, 2],
        };
        let doc = crate::to_document(&blob).unwrap();
        assert_eq!(doc.get("payload"), Some(&BsonValue::Binary(vec![1, 2])));
        // 未标注的字节序列按 serde 数据模型是整数数组
        assert_eq!(
            doc.get("plain"),
            Some(&BsonValue::Array(vec![BsonValue::Int32(1), BsonValue::Int32(2)]))
        );

        let json = serde_json::to_string(&blob).unwrap();
        let back: Blob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, blob);
    }
}
