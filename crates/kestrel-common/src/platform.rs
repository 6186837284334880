//! 主机信息模块
//!
//! 提供 ObjectId 生成所需的主机名与进程号查询。
//! - unix: 通过 nix 调用 gethostname
//! - 其他平台: 读取 COMPUTERNAME / HOSTNAME 环境变量

use crate::{CommonError, CommonResult};
use tracing::warn;

/// 主机身份信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub pid: u32,
}

impl HostIdentity {
    /// 获取当前进程的主机身份
    ///
    /// # Brief
    /// 查询主机名与当前进程号
    ///
    /// # Returns
    /// 成功返回 HostIdentity，主机名无法获取时返回 Platform 错误
    pub fn current() -> CommonResult<Self> {
        Ok(Self {
            hostname: hostname()?,
            pid: std::process::id(),
        })
    }
}

#[cfg(unix)]
fn hostname() -> CommonResult<String> {
    let name = nix::unistd::gethostname()
        .map_err(|e| CommonError::Platform(format!("gethostname failed: {}", e)))?;
    match name.into_string() {
        Ok(s) => Ok(s),
        Err(raw) => {
            warn!("hostname is not valid UTF-8, using lossy conversion");
            Ok(raw.to_string_lossy().into_owned())
        }
    }
}

#[cfg(not(unix))]
fn hostname() -> CommonResult<String> {
    for key in ["COMPUTERNAME", "HOSTNAME"] {
        if let Ok(name) = std::env::var(key) {
            return Ok(name);
        }
    }
    warn!("hostname not found in environment");
    Err(CommonError::Platform("hostname not available".to_string()))
}
