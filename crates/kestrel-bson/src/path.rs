//! 点分字段路径
//!
//! 编码器、解码器和 Reach 共用同一套路径表示，用于定位嵌套文档中的出错位置。

use std::fmt;

/// 点分字段路径，如 `user.address.0.city`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 返回追加了一个字段名的新路径
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    /// 返回在最前面插入了一个字段名的新路径
    pub fn prepend(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", name, self.0))
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&[&str]> for FieldPath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_and_prepend() {
        let path = FieldPath::root().child("a").child("b");
        assert_eq!(path.as_str(), "a.b");
        assert_eq!(path.prepend("top").as_str(), "top.a.b");
        assert_eq!(FieldPath::root().to_string(), "<root>");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
