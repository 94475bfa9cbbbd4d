//! # Error 模块
//!
//! 定义 vn-core 中使用的错误类型。
//!
//! ## 错误分类
//!
//! - [`LayoutError`]：对话排版的致命错误，直接中止脚本执行，不做局部恢复
//! - [`DialogueError`]：对话控制器的误用（编程错误）
//! - [`ConfigError`]：配置读取/校验错误
//! - [`MediaError`]：异步指令内部的资源错误，只记录日志，不向调度层传播
//! - [`Terminate`]：关闭时用于让工作线程提前退出的控制流信号，不是错误

use thiserror::Error;

/// 对话排版错误
///
/// 这些错误都是致命的：出错的对话块不会再被继续执行。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// 内联命令缺少结尾的 `]`
    #[error("位置 {offset}：内联命令必须以 ] 结尾")]
    UnterminatedCommand { offset: usize },

    /// 命令名过长
    #[error("内联命令名过长（上限 {max} 字节）: {name}")]
    CommandNameTooLong { name: String, max: usize },

    /// 对话中不允许的控制流命令
    #[error("对话中不允许使用内联命令 '{name}'")]
    DisallowedInlineCommand { name: String },
}

/// 对话控制器误用
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogueError {
    /// 当前状态不允许此操作
    #[error("无效的对话状态操作: {message}")]
    InvalidState { message: String },
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读写配置文件失败
    #[error("配置 IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 解析失败
    #[error("配置解析失败: {0}")]
    Parse(#[source] serde_json::Error),

    /// JSON 序列化失败
    #[error("配置序列化失败: {0}")]
    Serialize(#[source] serde_json::Error),

    /// 校验失败
    #[error("配置验证失败: {0}")]
    Validation(String),
}

/// 媒体指令执行错误
///
/// 只在指令内部使用：调度器把失败记入日志，并产生一个空结果。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// 资源不存在
    #[error("资源未找到: {path}")]
    NotFound { path: String },

    /// 解码失败
    #[error("解码失败: {path} - {message}")]
    Decode { path: String, message: String },

    /// 播放失败
    #[error("播放失败: {message}")]
    Playback { message: String },
}

/// 终止信号
///
/// 指令执行过程中检测到全局关闭请求时返回，工作线程据此立即退出。
/// 它只在工作线程循环内被消费，不会暴露给指令的提交者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Terminate;

/// vn-core 统一错误类型
#[derive(Error, Debug)]
pub enum VnError {
    /// 排版错误
    #[error("排版错误: {0}")]
    Layout(#[from] LayoutError),

    /// 对话状态错误
    #[error("对话错误: {0}")]
    Dialogue(#[from] DialogueError),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// Result 类型别名
pub type VnResult<T> = Result<T, VnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_error_message() {
        let err = LayoutError::UnterminatedCommand { offset: 5 };
        assert!(err.to_string().contains("]"));

        let err = LayoutError::DisallowedInlineCommand {
            name: "goto".to_string(),
        };
        assert!(err.to_string().contains("goto"));
    }

    #[test]
    fn test_vn_error_from() {
        let err: VnError = LayoutError::CommandNameTooLong {
            name: "x".repeat(70),
            max: 64,
        }
        .into();
        assert!(matches!(err, VnError::Layout(_)));

        let err: VnError = DialogueError::InvalidState {
            message: "test".to_string(),
        }
        .into();
        assert!(err.to_string().contains("test"));
    }
}
