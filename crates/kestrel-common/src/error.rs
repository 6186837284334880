//! 错误类型定义模块
//!
//! 定义 kestrel-common 的统一错误类型 CommonError 和 Result 别名。

use thiserror::Error;

/// 公共组件错误类型
#[derive(Error, Debug)]
pub enum CommonError {
    /// ObjectId 无效(长度或十六进制格式错误)
    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    /// 主机信息获取失败
    #[error("Platform error: {0}")]
    Platform(String),
}

/// 公共组件 Result 类型别名
pub type CommonResult<T> = Result<T, CommonError>;
