//! BSON 文档容器模块
//!
//! 同一个线格式文档在内存中有两种形态：
//! - [`Document`]: 按顺序保存的 (字段名, 值) 序列，编码结果与插入顺序一致；
//!   解码得到的重名字段原样保留，因此重新编码逐字节一致
//! - [`DocumentMap`]: 不保证顺序，查找更快；重名字段后者覆盖前者
//!
//! 两者通过 [`DocumentShape`] 共享同一套解码逻辑。

use crate::decode::{Decoder, Nesting};
use crate::raw::RawDocument;
use crate::reach::{self, ReachTarget};
use crate::value::BsonValue;
use crate::BsonResult;
use compact_str::CompactString;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// 解码器的目标文档形态
///
/// 解码器按字段顺序调用 `push`，结束后用 `into_value` 把容器包装成嵌入文档值。
pub trait DocumentShape: Default + Sized {
    /// 形态名称，用于日志
    const SHAPE_NAME: &'static str;

    /// 追加一个解码出的字段，重名字段的处理由形态决定
    fn push(&mut self, key: CompactString, value: BsonValue);

    fn into_value(self) -> BsonValue;
}

/// 保序 BSON 文档
///
/// 字段存放为 `(名称, 值)` 序列，查找按顺序取第一个同名字段。
/// 比较两个文档时字段顺序也参与比较。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: Vec<(CompactString, BsonValue)>,
}

impl Document {
    /// 创建空文档
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k.as_str() == key)
    }

    /// 插入字段
    ///
    /// # Brief
    /// 向文档中插入或更新一个字段；更新已有字段时保留其原有位置
    ///
    /// # Arguments
    /// * `key` - 字段名
    /// * `value` - 字段值，宿主类型按编码转换表转换
    ///
    /// # Returns
    /// 被替换的旧值
    pub fn insert(
        &mut self,
        key: impl Into<CompactString>,
        value: impl Into<BsonValue>,
    ) -> Option<BsonValue> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.fields[index].1, value)),
            None => {
                self.fields.push((key, value));
                None
            }
        }
    }

    /// 在末尾追加字段，不检查重名
    pub fn push(&mut self, key: impl Into<CompactString>, value: impl Into<BsonValue>) {
        self.fields.push((key.into(), value.into()));
    }

    /// 第一个同名字段的值
    pub fn get(&self, key: &str) -> Option<&BsonValue> {
        self.fields.iter().find(|(k, _)| k.as_str() == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut BsonValue> {
        self.fields
            .iter_mut()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    /// 删除第一个同名字段，后续字段保持相对顺序
    pub fn remove(&mut self, key: &str) -> Option<BsonValue> {
        let index = self.position(key)?;
        Some(self.fields.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &BsonValue> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BsonValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.as_i32())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(|v| v.as_document())
    }

    /// 按点分路径获取嵌套值
    ///
    /// # Brief
    /// 只在已解码的文档、数组之间行走，不解码 Raw，也不展开伪文档
    ///
    /// # Arguments
    /// * `path` - 点分隔的路径，如 "user.address.city"
    ///
    /// # Returns
    /// `Some(&BsonValue)` 如果路径存在，否则 `None`
    pub fn get_path(&self, path: &str) -> Option<&BsonValue> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// 编码为字节
    pub fn encode(&self) -> BsonResult<RawDocument> {
        crate::encode::encode_document(self)
    }

    /// 从字节解码(完整嵌套)
    pub fn decode(bytes: &[u8]) -> BsonResult<Self> {
        Decoder::default().decode(bytes, Nesting::Nested)
    }

    /// Reach: 沿路径取值并转换到目标类型
    ///
    /// # Brief
    /// 逐段深入嵌套文档；路径不存在返回 `Ok(false)`，找到的值无法转换为目标类型时返回错误
    ///
    /// # Arguments
    /// * `target` - 目标变量
    /// * `path` - 字段名序列
    ///
    /// # Returns
    /// 找到并赋值返回 `Ok(true)`
    pub fn reach<T: ReachTarget>(&self, target: &mut T, path: &[&str]) -> BsonResult<bool> {
        reach::assign_found(self.lookup(path)?, target, path)
    }

    /// 沿路径取叶子值，不做类型转换
    ///
    /// 空路径返回文档自身。
    pub fn lookup(&self, path: &[&str]) -> BsonResult<Option<Cow<'_, BsonValue>>> {
        match path.split_first() {
            None => Ok(Some(Cow::Owned(BsonValue::Document(self.clone())))),
            Some((first, rest)) => match self.get(first) {
                Some(value) => {
                    reach::descend(Cow::Borrowed(value), rest).map_err(|e| e.within(first))
                }
                None => Ok(None),
            },
        }
    }

    /// 转换为不保序形态，重名字段保留最后一个
    pub fn into_map(self) -> DocumentMap {
        self.fields.into_iter().collect()
    }
}

impl DocumentShape for Document {
    const SHAPE_NAME: &'static str = "Document";

    fn push(&mut self, key: CompactString, value: BsonValue) {
        self.fields.push((key, value));
    }

    fn into_value(self) -> BsonValue {
        BsonValue::Document(self)
    }
}

impl From<Vec<(CompactString, BsonValue)>> for Document {
    fn from(fields: Vec<(CompactString, BsonValue)>) -> Self {
        Self { fields }
    }
}

/// 按迭代顺序逐个追加，重名字段不合并
impl<K: Into<CompactString>, V: Into<BsonValue>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (CompactString, BsonValue);
    type IntoIter = std::vec::IntoIter<(CompactString, BsonValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document[")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "]")
    }
}

/// 不保序 BSON 文档
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentMap {
    fields: HashMap<CompactString, BsonValue>,
}

impl DocumentMap {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(
        &mut self,
        key: impl Into<CompactString>,
        value: impl Into<BsonValue>,
    ) -> Option<BsonValue> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&BsonValue> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut BsonValue> {
        self.fields.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<BsonValue> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &BsonValue> {
        self.fields.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BsonValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn encode(&self) -> BsonResult<RawDocument> {
        crate::encode::encode_map(self)
    }

    pub fn decode(bytes: &[u8]) -> BsonResult<Self> {
        Decoder::default().decode(bytes, Nesting::Nested)
    }

    /// Reach: 沿路径取值并转换到目标类型，语义同 [`Document::reach`]
    pub fn reach<T: ReachTarget>(&self, target: &mut T, path: &[&str]) -> BsonResult<bool> {
        reach::assign_found(self.lookup(path)?, target, path)
    }

    pub fn lookup(&self, path: &[&str]) -> BsonResult<Option<Cow<'_, BsonValue>>> {
        match path.split_first() {
            None => Ok(Some(Cow::Owned(BsonValue::Map(self.clone())))),
            Some((first, rest)) => match self.fields.get(*first) {
                Some(value) => {
                    reach::descend(Cow::Borrowed(value), rest).map_err(|e| e.within(first))
                }
                None => Ok(None),
            },
        }
    }

    /// 转换为保序形态，字段按名称排序以得到确定的顺序
    pub fn into_document(self) -> Document {
        let mut entries: Vec<_> = self.fields.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().collect()
    }
}

impl DocumentShape for DocumentMap {
    const SHAPE_NAME: &'static str = "Map";

    fn push(&mut self, key: CompactString, value: BsonValue) {
        self.fields.insert(key, value);
    }

    fn into_value(self) -> BsonValue {
        BsonValue::Map(self)
    }
}

impl From<HashMap<CompactString, BsonValue>> for DocumentMap {
    fn from(fields: HashMap<CompactString, BsonValue>) -> Self {
        Self { fields }
    }
}

impl<K: Into<CompactString>, V: Into<BsonValue>> FromIterator<(K, V)> for DocumentMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for DocumentMap {
    type Item = (CompactString, BsonValue);
    type IntoIter = std::collections::hash_map::IntoIter<CompactString, BsonValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Display for DocumentMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Map[")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "]")
    }
}

/// 构造 Document 的便捷宏
///
/// # 示例
///
/// ```rust,ignore
/// use kestrel_bson::doc;
///
/// let empty = doc! {};
/// let doc = doc! {
///     "name" => "test",
///     "value" => 123i32,
///     "inner" => doc! { "x" => 1.5 },
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        {
            let mut doc = $crate::Document::new();
            $(
                doc.insert($key, $value);
            )+
            doc
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let mut doc = Document::new();
        doc.insert("z", 1i32);
        doc.insert("a", 2i32);
        doc.insert("m", 3i32);
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);

        let old = doc.insert("a", 20i32);
        assert_eq!(old, Some(BsonValue::Int32(2)));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);

        doc.remove("z");
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "m"]);
    }

    #[test]
    fn test_doc_macro_and_get_path() {
        let doc = crate::doc! {
            "user" => crate::doc! {
                "name" => "Miku",
                "tags" => vec!["a", "b"],
            },
            "age" => 16i32,
        };
        assert_eq!(doc.get_i32("age"), Some(16));
        assert_eq!(
            doc.get_path("user.name"),
            Some(&BsonValue::String("Miku".to_string()))
        );
        assert_eq!(
            doc.get_path("user.tags.1"),
            Some(&BsonValue::String("b".to_string()))
        );
        assert_eq!(doc.get_path("user.missing"), None);
    }

    #[test]
    fn test_shape_conversion() {
        let doc = crate::doc! { "b" => 2i32, "a" => 1i32 };
        let map = doc.clone().into_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&BsonValue::Int32(1)));

        let back = map.into_document();
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        assert_eq!(<Document as DocumentShape>::SHAPE_NAME, "Document");
        assert_eq!(<DocumentMap as DocumentShape>::SHAPE_NAME, "Map");
    }

    #[test]
    fn test_repeated_keys_survive_round_trip() {
        // {a: 1, b: 2, a: 3}
        let bytes: Vec<u8> = vec![
            26, 0, 0, 0,
            0x10, b'a', 0, 1, 0, 0, 0,
            0x10, b'b', 0, 2, 0, 0, 0,
            0x10, b'a', 0, 3, 0, 0, 0,
            0,
        ];

        let doc = Document::decode(&bytes).unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b", "a"]);
        assert_eq!(doc.get("a"), Some(&BsonValue::Int32(1)));
        assert_eq!(doc.encode().unwrap().as_bytes(), &bytes[..]);

        let map = DocumentMap::decode(&bytes).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&BsonValue::Int32(3)));
        assert_eq!(doc.into_map(), map);
    }

    #[test]
    fn test_push_keeps_duplicates() {
        let mut doc = Document::new();
        doc.push("k", 1i32);
        doc.push("k", 2i32);
        assert_eq!(doc.len(), 2);

        assert_eq!(doc.insert("k", 10i32), Some(BsonValue::Int32(1)));
        assert_eq!(doc.values().cloned().collect::<Vec<_>>(), vec![
            BsonValue::Int32(10),
            BsonValue::Int32(2),
        ]);

        doc.remove("k");
        assert_eq!(doc.get("k"), Some(&BsonValue::Int32(2)));

        let swapped = crate::doc! { "y" => 1i32, "x" => 2i32 };
        assert_ne!(swapped, crate::doc! { "x" => 2i32, "y" => 1i32 });
    }

    #[test]
    fn test_display() {
        let doc = crate::doc! { "n" => 5i32, "s" => "x" };
        assert_eq!(doc.to_string(), "Document[n: Int32(5) s: String(x)]");

        let mut map = DocumentMap::new();
        map.insert("k", true);
        assert_eq!(map.to_string(), "Map[k: Bool(true)]");
    }
}
