//! Reach: 按字段路径深入嵌套文档，并把叶子值转换为调用方指定的目标类型
//!
//! 行走规则：
//! - 文档(两种形态)按字段名查找；Raw 文档按需解码后查找
//! - Regex 暴露 `Pattern`/`Options`，DbPointer 暴露 `Name`/`ObjectId`，
//!   带作用域代码暴露 `Code`/`Scope`
//! - 其余值(包括数组)不能继续深入，视为未找到
//!
//! 未找到不是错误；找到的值无法转换为目标类型才是错误。

use crate::document::{Document, DocumentMap};
use crate::path::FieldPath;
use crate::value::{BsonValue, DbPointer, JavaScriptScope, RegexValue};
use crate::{BsonError, BsonResult};
use chrono::{DateTime, TimeZone, Utc};
use kestrel_common::ObjectId;
use std::borrow::Cow;

/// Reach 的目标类型
///
/// 每个实现只接受转换表中列出的源类型；Null、Undefined、MinKey、MaxKey 不修改目标但算作成功。
pub trait ReachTarget {
    /// 目标类型名称，用于错误信息
    const TYPE_NAME: &'static str;

    /// 用找到的值覆盖目标
    fn assign(&mut self, value: &BsonValue, path: &FieldPath) -> BsonResult<()>;

    /// 目标为空(`Option::None`)时先分配的初始值
    fn allocate() -> Self
    where
        Self: Sized;
}

fn mismatch<T: ReachTarget + ?Sized>(value: &BsonValue, path: &FieldPath) -> BsonError {
    BsonError::CannotCoerce {
        path: path.clone(),
        from: value.type_name(),
        to: T::TYPE_NAME,
    }
}

/// 不携带数据的值：不修改目标
fn is_unit(value: &BsonValue) -> bool {
    matches!(
        value,
        BsonValue::Null | BsonValue::Undefined | BsonValue::MinKey | BsonValue::MaxKey
    )
}

macro_rules! reach_target {
    ($ty:ty, $name:expr, $default:expr, |$target:ident, $value:ident| { $($pat:pat => $body:expr),+ $(,)? }) => {
        impl ReachTarget for $ty {
            const TYPE_NAME: &'static str = $name;

            fn assign(&mut self, $value: &BsonValue, path: &FieldPath) -> BsonResult<()> {
                let $target = self;
                match $value {
                    $($pat => { *$target = $body; Ok(()) })+
                    other if is_unit(other) => Ok(()),
                    other => Err(mismatch::<Self>(other, path)),
                }
            }

            fn allocate() -> Self {
                $default
            }
        }
    };
}

reach_target!(f64, "f64", 0.0, |target, value| {
    BsonValue::Double(n) => *n,
});

reach_target!(String, "String", String::new(), |target, value| {
    BsonValue::String(s) | BsonValue::JavaScript(s) | BsonValue::Symbol(s) => s.clone(),
});

reach_target!(Vec<u8>, "Vec<u8>", Vec::new(), |target, value| {
    BsonValue::Binary(b) => b.clone(),
    BsonValue::ObjectId(id) => id.as_bytes().to_vec(),
});

reach_target!(bool, "bool", false, |target, value| {
    BsonValue::Boolean(b) => *b,
});

// Int64 不能收窄为 i32
reach_target!(i32, "i32", 0, |target, value| {
    BsonValue::Int32(n) => *n,
});

reach_target!(i64, "i64", 0, |target, value| {
    BsonValue::Int32(n) => *n as i64,
    BsonValue::Int64(n) => *n,
    BsonValue::DateTime(ms) | BsonValue::Timestamp(ms) => *ms,
});

reach_target!(Document, "Document", Document::new(), |target, value| {
    BsonValue::Document(doc) => doc.clone(),
});

reach_target!(DocumentMap, "Map", DocumentMap::new(), |target, value| {
    BsonValue::Map(map) => map.clone(),
});

reach_target!(Vec<BsonValue>, "Array", Vec::new(), |target, value| {
    BsonValue::Array(items) => items.clone(),
});

reach_target!(RegexValue, "Regex", RegexValue::default(), |target, value| {
    BsonValue::Regex(regex) => regex.clone(),
});

reach_target!(
    JavaScriptScope,
    "JavaScriptWithScope",
    JavaScriptScope::default(),
    |target, value| {
        BsonValue::JavaScriptWithScope(js) => js.clone(),
    }
);

reach_target!(ObjectId, "ObjectId", ObjectId::from_bytes([0; 12]), |target, value| {
    BsonValue::ObjectId(id) => *id,
});

impl ReachTarget for DbPointer {
    const TYPE_NAME: &'static str = "DbPointer";

    fn assign(&mut self, value: &BsonValue, path: &FieldPath) -> BsonResult<()> {
        match value {
            BsonValue::DbPointer(pointer) => {
                *self = pointer.clone();
                Ok(())
            }
            other if is_unit(other) => Ok(()),
            other => Err(mismatch::<Self>(other, path)),
        }
    }

    fn allocate() -> Self {
        DbPointer {
            namespace: String::new(),
            id: ObjectId::from_bytes([0; 12]),
        }
    }
}

/// 毫秒精确转换为 UTC 时间
impl ReachTarget for DateTime<Utc> {
    const TYPE_NAME: &'static str = "DateTime<Utc>";

    fn assign(&mut self, value: &BsonValue, path: &FieldPath) -> BsonResult<()> {
        match value {
            BsonValue::DateTime(ms) | BsonValue::Timestamp(ms) => {
                *self = Utc
                    .timestamp_millis_opt(*ms)
                    .single()
                    .ok_or_else(|| mismatch::<Self>(value, path))?;
                Ok(())
            }
            other if is_unit(other) => Ok(()),
            other => Err(mismatch::<Self>(other, path)),
        }
    }

    fn allocate() -> Self {
        DateTime::<Utc>::default()
    }
}

/// 接受任意值，不做转换
impl ReachTarget for BsonValue {
    const TYPE_NAME: &'static str = "BsonValue";

    fn assign(&mut self, value: &BsonValue, _path: &FieldPath) -> BsonResult<()> {
        if !is_unit(value) {
            *self = value.clone();
        }
        Ok(())
    }

    /// 未指定形态时默认分配不保序文档
    fn allocate() -> Self {
        BsonValue::Map(DocumentMap::new())
    }
}

/// 目标为 None 时先分配再赋值
impl<T: ReachTarget> ReachTarget for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn assign(&mut self, value: &BsonValue, path: &FieldPath) -> BsonResult<()> {
        self.get_or_insert_with(T::allocate).assign(value, path)
    }

    fn allocate() -> Self {
        None
    }
}

// ============================================================================
// 路径行走
// ============================================================================

/// 从 `current` 出发沿剩余路径行走
pub(crate) fn descend<'a>(
    current: Cow<'a, BsonValue>,
    path: &[&str],
) -> BsonResult<Option<Cow<'a, BsonValue>>> {
    let mut current = current;
    for (depth, name) in path.iter().enumerate() {
        let next = match current {
            Cow::Borrowed(value) => child_of_ref(value, name),
            Cow::Owned(value) => child_of_owned(value, name).map(|v| v.map(Cow::Owned)),
        };
        // 错误路径只包含已经走过的部分
        current = match next.map_err(|e| e.within_path(&path[..depth]))? {
            Some(child) => child,
            None => return Ok(None),
        };
    }
    Ok(Some(current))
}

fn child_of_ref<'a>(value: &'a BsonValue, name: &str) -> BsonResult<Option<Cow<'a, BsonValue>>> {
    let child = match value {
        BsonValue::Document(doc) => doc.get(name).map(Cow::Borrowed),
        BsonValue::Map(map) => map.get(name).map(Cow::Borrowed),
        BsonValue::Raw(raw) => raw.to_document()?.remove(name).map(Cow::Owned),
        other => pseudo_field(other, name).map(Cow::Owned),
    };
    Ok(child)
}

fn child_of_owned(value: BsonValue, name: &str) -> BsonResult<Option<BsonValue>> {
    match value {
        BsonValue::Document(mut doc) => Ok(doc.remove(name)),
        BsonValue::Map(mut map) => Ok(map.remove(name)),
        BsonValue::Raw(raw) => Ok(raw.to_document()?.remove(name)),
        other => Ok(pseudo_field(&other, name)),
    }
}

/// 固定结构值的伪字段
fn pseudo_field(value: &BsonValue, name: &str) -> Option<BsonValue> {
    match (value, name) {
        (BsonValue::Regex(regex), "Pattern") => Some(BsonValue::String(regex.pattern.clone())),
        (BsonValue::Regex(regex), "Options") => Some(BsonValue::String(regex.options.clone())),
        (BsonValue::DbPointer(pointer), "Name") => {
            Some(BsonValue::String(pointer.namespace.clone()))
        }
        (BsonValue::DbPointer(pointer), "ObjectId") => Some(BsonValue::ObjectId(pointer.id)),
        (BsonValue::JavaScriptWithScope(js), "Code") => Some(BsonValue::JavaScript(js.code.clone())),
        (BsonValue::JavaScriptWithScope(js), "Scope") => {
            Some(BsonValue::Document(js.scope.clone()))
        }
        _ => None,
    }
}

/// 找到则赋值并返回 true
pub(crate) fn assign_found<T: ReachTarget>(
    found: Option<Cow<'_, BsonValue>>,
    target: &mut T,
    path: &[&str],
) -> BsonResult<bool> {
    match found {
        Some(value) => {
            target.assign(&value, &FieldPath::from(path))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

impl BsonValue {
    /// Reach: 以当前值为根沿路径取值并转换到目标类型
    ///
    /// # Brief
    /// 空路径直接转换当前值；路径不存在返回 `Ok(false)`
    ///
    /// # Arguments
    /// * `target` - 目标变量
    /// * `path` - 字段名序列
    ///
    /// # Returns
    /// 找到并赋值返回 `Ok(true)`，类型不匹配返回 Type 错误
    pub fn reach<T: ReachTarget>(&self, target: &mut T, path: &[&str]) -> BsonResult<bool> {
        assign_found(self.lookup(path)?, target, path)
    }

    /// 沿路径取叶子值，不做类型转换
    pub fn lookup(&self, path: &[&str]) -> BsonResult<Option<Cow<'_, BsonValue>>> {
        descend(Cow::Borrowed(self), path)
    }
}

impl BsonError {
    fn within_path(self, segments: &[&str]) -> Self {
        segments.iter().rev().fold(self, |err, name| err.within(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn sample() -> Document {
        crate::doc! {
            "a" => crate::doc! { "b" => 7i32, "big" => 9i64 },
            "when" => BsonValue::DateTime(1_500),
            "re" => RegexValue::new("^x", "i"),
            "list" => vec![1i32],
            "nothing" => (),
        }
    }

    #[test]
    fn test_reach_int_widening() {
        let doc = sample();
        let mut small = 0i32;
        assert!(doc.reach(&mut small, &["a", "b"]).unwrap());
        assert_eq!(small, 7);

        let mut wide = 0i64;
        assert!(doc.reach(&mut wide, &["a", "b"]).unwrap());
        assert_eq!(wide, 7);

        let err = doc.reach(&mut small, &["a", "big"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_reach_not_found_is_not_error() {
        let doc = sample();
        let mut value = 0i32;
        assert!(!doc.reach(&mut value, &["a", "c"]).unwrap());
        assert!(!doc.reach(&mut value, &["a", "b", "deeper"]).unwrap());
        // 数组不能深入
        assert!(!doc.reach(&mut value, &["list", "0"]).unwrap());
    }

    #[test]
    fn test_reach_type_error_names_types() {
        let doc = sample();
        let mut flag = false;
        let err = doc.reach(&mut flag, &["a", "b"]).unwrap_err();
        match err {
            BsonError::CannotCoerce { path, from, to } => {
                assert_eq!(path.as_str(), "a.b");
                assert_eq!(from, "Int32");
                assert_eq!(to, "bool");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reach_datetime() {
        let doc = sample();
        let mut millis = 0i64;
        assert!(doc.reach(&mut millis, &["when"]).unwrap());
        assert_eq!(millis, 1_500);

        let mut when = DateTime::<Utc>::default();
        assert!(doc.reach(&mut when, &["when"]).unwrap());
        assert_eq!(when.timestamp_millis(), 1_500);
    }

    #[test]
    fn test_reach_pseudo_fields() {
        let doc = sample();
        let mut pattern = String::new();
        assert!(doc.reach(&mut pattern, &["re", "Pattern"]).unwrap());
        assert_eq!(pattern, "^x");
        assert!(!doc.reach(&mut pattern, &["re", "Flags"]).unwrap());

        let js = BsonValue::JavaScriptWithScope(JavaScriptScope {
            code: "f()".to_string(),
            scope: crate::doc! { "n" => 1i32 },
        });
        let mut code = String::new();
        assert!(js.reach(&mut code, &["Code"]).unwrap());
        assert_eq!(code, "f()");
        let mut n = 0i64;
        assert!(js.reach(&mut n, &["Scope", "n"]).unwrap());
        assert_eq!(n, 1);
    }

    #[test]
    fn test_unit_values_leave_target_untouched() {
        let doc = sample();
        let mut value = 42i32;
        assert!(doc.reach(&mut value, &["nothing"]).unwrap());
        assert_eq!(value, 42);
    }

    #[test]
    fn test_option_target_allocates() {
        let doc = sample();
        let mut target: Option<i64> = None;
        assert!(doc.reach(&mut target, &["a", "b"]).unwrap());
        assert_eq!(target, Some(7));

        let mut any: Option<BsonValue> = None;
        assert!(doc.reach(&mut any, &["nothing"]).unwrap());
        assert_eq!(any, Some(BsonValue::Map(DocumentMap::new())));
    }

    #[test]
    fn test_reach_through_raw() {
        let inner = crate::doc! { "x" => "deep" };
        let doc = crate::doc! { "r" => inner.encode().unwrap() };
        let mut text = String::new();
        assert!(doc.reach(&mut text, &["r", "x"]).unwrap());
        assert_eq!(text, "deep");
    }

    #[test]
    fn test_container_shapes_do_not_cross() {
        let doc = sample();
        let mut map = DocumentMap::new();
        assert!(doc.reach(&mut map, &["a"]).is_err());
        let mut nested = Document::new();
        assert!(doc.reach(&mut nested, &["a"]).unwrap());
        assert_eq!(nested.get_i32("b"), Some(7));
    }
}
