//! 编解码配置模块
//!
//! 文档大小上限等参数以配置形式给出，而不是散落在编解码器内部的常量。

use serde::{Deserialize, Serialize};

/// 默认的文档大小上限(16 MiB)
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// 默认的最大嵌套层数(顶层文档算第 1 层)
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 100;

/// 数组下标键的排序方式
///
/// 解码数组时，先把数组体当作普通文档读出，再按下标键排序还原顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayIndexOrder {
    /// 按数值排序: "2" < "10"
    Numeric,
    /// 按字符串排序: "10" < "2"
    Lexicographic,
}

impl Default for ArrayIndexOrder {
    fn default() -> Self {
        Self::Numeric
    }
}

/// 编解码器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// 声明长度超过该值的文档在分配缓冲区之前即被拒绝
    pub max_document_size: usize,
    /// 嵌入文档、数组、代码作用域都各算一层；超过该层数的输入直接拒绝
    pub max_nesting_depth: usize,
    pub array_index_order: ArrayIndexOrder,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            array_index_order: ArrayIndexOrder::default(),
        }
    }
}

impl CodecConfig {
    pub fn with_max_document_size(mut self, max: usize) -> Self {
        self.max_document_size = max;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_array_index_order(mut self, order: ArrayIndexOrder) -> Self {
        self.array_index_order = order;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::default();
        assert_eq!(config.max_document_size, 16 * 1024 * 1024);
        assert_eq!(config.max_nesting_depth, 100);
        assert_eq!(config.array_index_order, ArrayIndexOrder::Numeric);
    }

    #[test]
    fn test_partial_config_from_json() {
        let config: CodecConfig =
            serde_json::from_str(r#"{"array_index_order": "lexicographic"}"#).unwrap();
        assert_eq!(config.max_document_size, DEFAULT_MAX_DOCUMENT_SIZE);
        assert_eq!(config.array_index_order, ArrayIndexOrder::Lexicographic);
    }
}
