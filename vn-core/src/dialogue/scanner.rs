//! # Scanner 模块
//!
//! 对话文本的逐步扫描：把原始文本切成文本块与内联命令。
//!
//! ## 规则
//!
//! - 当前字节不是 `[`：一直读到下一个 `[` 或文本结尾，得到一个文本块（新段）
//! - 当前字节是 `[`：逐个码点读取记号，`]` 结束命令，空格分隔参数，
//!   读完命令名和至少一个参数后 `*` 也作为分隔符
//! - 命令名首字符为 `@ \ | * #` 的是文本命令，`!` 开头的是系统命令（内联延时/等待），
//!   已注册的引擎命令也是系统命令，其余为用户命令
//! - 被忽略的命令照常扫描参数以保持游标正确，然后继续扫描下一部分
//!
//! 扫描结束返回 [`DialoguePart::End`]，之后反复调用仍返回 `End`。

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::LayoutError;

/// 命令名长度上限（字节）
pub const MAX_COMMAND_NAME: usize = 64;

/// 对话中禁止使用的控制流命令
const DISALLOWED: &[&str] = &["goto", "gosub"];

/// 文本命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextCommand {
    /// `@` 等待点击
    WaitClick,
    /// `\` 翻页
    NewPage,
    /// `|` 等待语音
    VoiceWait,
    /// `*` 暂停
    Suspend,
    /// `#` 暂停脚本
    SuspendScript,
}

impl TextCommand {
    /// 由命令名首字符识别
    pub fn from_marker(c: char) -> Option<Self> {
        match c {
            '@' => Some(Self::WaitClick),
            '\\' => Some(Self::NewPage),
            '|' => Some(Self::VoiceWait),
            '*' => Some(Self::Suspend),
            '#' => Some(Self::SuspendScript),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Self::WaitClick => '@',
            Self::NewPage => '\\',
            Self::VoiceWait => '|',
            Self::Suspend => '*',
            Self::SuspendScript => '#',
        }
    }
}

/// 扫描得到的一部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DialoguePart {
    /// 文本块，`segment` 为段下标，`range` 为源文本中的字节区间
    Text {
        segment: usize,
        range: std::ops::Range<usize>,
    },
    /// 用户定义的内联子程序
    UserCmd { name: String, args: Vec<String> },
    /// 文本命令
    TextCmd(TextCommand),
    /// 引擎命令或 `!` 前缀的内联延时/等待
    SysCmd { name: String, args: Vec<String> },
    /// 没有更多内容
    End,
}

/// 引擎命令表
pub trait CommandRegistry {
    /// 是否为引擎内置命令
    fn is_built_in(&self, name: &str) -> bool;

    /// 解析命令别名
    fn resolve_alias(&self, _name: &str) -> Option<String> {
        None
    }
}

/// 基于集合的命令表
#[derive(Debug, Clone, Default)]
pub struct BuiltinCommands {
    names: HashSet<String>,
    aliases: HashMap<String, String>,
}

impl BuiltinCommands {
    /// 对话中常用的内置命令
    pub fn standard() -> Self {
        let mut commands = Self::default();
        for name in ["wait", "delay", "speed", "shake", "flash", "voice", "sfx", "bgm"] {
            commands.register(name);
        }
        commands.alias("w", "wait");
        commands.alias("d", "delay");
        commands
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }
}

impl CommandRegistry for BuiltinCommands {
    fn is_built_in(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn resolve_alias(&self, name: &str) -> Option<String> {
        self.aliases.get(name).cloned()
    }
}

/// 对话扫描器
#[derive(Debug, Clone, Default)]
pub struct InlineScanner {
    /// 当前字节位置
    pos: usize,
    /// 已产生的文本块数量
    segments: usize,
    ignored: HashSet<String>,
}

impl InlineScanner {
    pub fn new<I, S>(ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pos: 0,
            segments: 0,
            ignored: ignored.into_iter().map(Into::into).collect(),
        }
    }

    /// 回到文本开头
    pub fn rewind(&mut self) {
        self.pos = 0;
        self.segments = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// 扫描下一部分
    pub fn next_part(
        &mut self,
        text: &str,
        registry: &dyn CommandRegistry,
    ) -> Result<DialoguePart, LayoutError> {
        loop {
            let Some(rest) = text.get(self.pos..).filter(|rest| !rest.is_empty()) else {
                return Ok(DialoguePart::End);
            };

            if !rest.starts_with('[') {
                let start = self.pos;
                let len = rest.find('[').unwrap_or(rest.len());
                self.pos += len;
                let segment = self.segments;
                self.segments += 1;
                return Ok(DialoguePart::Text {
                    segment,
                    range: start..self.pos,
                });
            }

            let tokens = self.scan_command(text)?;
            if let Some(part) = self.classify(tokens, registry)? {
                return Ok(part);
            }
        }
    }

    /// 读取一个 `[...]`，返回其中的记号
    fn scan_command(&mut self, text: &str) -> Result<Vec<String>, LayoutError> {
        let start = self.pos;
        let body = &text[start + 1..];
        let mut tokens: Vec<String> = Vec::new();
        let mut current = String::new();

        for (i, c) in body.char_indices() {
            match c {
                ']' => {
                    if !current.is_empty() {
                        tokens.push(current);
                    }
                    self.pos = start + 1 + i + 1;
                    return Ok(tokens);
                }
                ' ' => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                // tokens[0] 是命令名
                '*' if tokens.len() >= 2 => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => {
                    current.push(c);
                    if tokens.is_empty() && current.len() > MAX_COMMAND_NAME {
                        return Err(LayoutError::CommandNameTooLong {
                            name: current,
                            max: MAX_COMMAND_NAME,
                        });
                    }
                }
            }
        }

        Err(LayoutError::UnterminatedCommand { offset: start })
    }

    /// 对命令分类；被忽略的命令返回 `None`
    fn classify(
        &self,
        mut tokens: Vec<String>,
        registry: &dyn CommandRegistry,
    ) -> Result<Option<DialoguePart>, LayoutError> {
        if tokens.is_empty() {
            return Ok(None);
        }
        let name = tokens.remove(0);
        let args = tokens;

        let Some(first) = name.chars().next() else {
            return Ok(None);
        };
        if let Some(command) = TextCommand::from_marker(first) {
            return Ok(Some(DialoguePart::TextCmd(command)));
        }

        let bare = name.strip_prefix('!').unwrap_or(&name);
        if DISALLOWED.contains(&bare.to_lowercase().as_str()) {
            return Err(LayoutError::DisallowedInlineCommand { name });
        }

        // 原名与解析后的别名分别检查一次
        if self.ignored.contains(&name) || self.ignored.contains(bare) {
            return Ok(None);
        }
        let resolved = registry
            .resolve_alias(bare)
            .unwrap_or_else(|| bare.to_string());
        if self.ignored.contains(&resolved) {
            return Ok(None);
        }

        if first == '!' || registry.is_built_in(&resolved) {
            Ok(Some(DialoguePart::SysCmd {
                name: resolved,
                args,
            }))
        } else {
            Ok(Some(DialoguePart::UserCmd { name, args }))
        }
    }
}
