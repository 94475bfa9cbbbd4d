//! # Config 模块
//!
//! 引擎配置，集中管理排版、显示节奏与异步队列的可调参数。
//!
//! ## 配置优先级
//!
//! 1. 调用方显式修改（最高）
//! 2. 配置文件 (engine.json)
//! 3. 默认值（最低）

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::text::ScriptLanguage;

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// 排版配置
    #[serde(default)]
    pub text: TextConfig,

    /// 文字显示节奏配置
    #[serde(default)]
    pub timing: TimingConfig,

    /// 异步队列配置
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// 排版配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    /// 断行规则（西文按空格断行，CJK 按字符类别断行）
    ///
    /// 这是全局开关，不做逐字符的文字检测。
    #[serde(default)]
    pub script_language: ScriptLanguage,

    /// 对话框可用宽度（像素），超出即换行
    #[serde(default = "default_wrap_width")]
    pub wrap_width: f32,

    /// 对话框可用高度（像素），用于渲染裁剪
    #[serde(default = "default_box_height")]
    pub box_height: f32,

    /// 默认字体预设编号
    #[serde(default)]
    pub font_preset: u32,

    /// 默认字号（像素）
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// 注音字号相对正文字号的比例
    #[serde(default = "default_ruby_scale")]
    pub ruby_scale: f32,

    /// 注音抬升量，单位为被注字中最高上升高度的倍数
    #[serde(default = "default_ruby_raise")]
    pub ruby_raise: f32,

    /// 额外行距（像素）
    #[serde(default)]
    pub line_spacing: f32,

    /// 在连字符/星号处换行时，是否在下一行行首重复该符号
    #[serde(default)]
    pub duplicate_hyphen_on_wrap: bool,

    /// 对话中被忽略的内联函数名
    #[serde(default)]
    pub ignored_inline_functions: Vec<String>,
}

/// 文字显示节奏配置
///
/// 所有时长单位均为毫秒。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// 单个字符淡入时长
    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u64,

    /// 字符显示前的延迟
    #[serde(default)]
    pub char_pre_delay_ms: u64,

    /// 普通字符显示后的延迟
    #[serde(default = "default_char_delay_ms")]
    pub char_delay_ms: u64,

    /// 逗号类标点后的延迟
    #[serde(default = "default_clause_delay_ms")]
    pub clause_delay_ms: u64,

    /// 句末标点后的延迟
    #[serde(default = "default_sentence_delay_ms")]
    pub sentence_delay_ms: u64,

    /// `.` 紧跟非空白字符时使用的延迟（避免连续句点停顿过长）
    #[serde(default = "default_period_run_delay_ms")]
    pub period_run_delay_ms: u64,

    /// 文字速度倍率，0 表示立即显示
    #[serde(default = "default_text_speed")]
    pub text_speed: f32,
}

/// 异步队列配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 主线程等待结果时单次信号量等待的超时
    #[serde(default = "default_result_poll_interval_ms")]
    pub result_poll_interval_ms: u64,

    /// 持续型队列空闲时的退避时长
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            script_language: ScriptLanguage::default(),
            wrap_width: default_wrap_width(),
            box_height: default_box_height(),
            font_preset: 0,
            font_size: default_font_size(),
            ruby_scale: default_ruby_scale(),
            ruby_raise: default_ruby_raise(),
            line_spacing: 0.0,
            duplicate_hyphen_on_wrap: false,
            ignored_inline_functions: Vec::new(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: default_fade_duration_ms(),
            char_pre_delay_ms: 0,
            char_delay_ms: default_char_delay_ms(),
            clause_delay_ms: default_clause_delay_ms(),
            sentence_delay_ms: default_sentence_delay_ms(),
            period_run_delay_ms: default_period_run_delay_ms(),
            text_speed: default_text_speed(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            result_poll_interval_ms: default_result_poll_interval_ms(),
            idle_sleep_ms: default_idle_sleep_ms(),
        }
    }
}

// 默认值函数
fn default_wrap_width() -> f32 {
    1200.0
}

fn default_box_height() -> f32 {
    240.0
}

fn default_font_size() -> f32 {
    32.0
}

fn default_ruby_scale() -> f32 {
    0.5
}

fn default_ruby_raise() -> f32 {
    1.0
}

fn default_fade_duration_ms() -> u64 {
    200
}

fn default_char_delay_ms() -> u64 {
    40
}

fn default_clause_delay_ms() -> u64 {
    150
}

fn default_sentence_delay_ms() -> u64 {
    400
}

fn default_period_run_delay_ms() -> u64 {
    80
}

fn default_text_speed() -> f32 {
    1.0
}

fn default_result_poll_interval_ms() -> u64 {
    10
}

fn default_idle_sleep_ms() -> u64 {
    1
}

impl TimingConfig {
    /// 按文字速度缩放一个毫秒时长
    pub fn scaled(&self, ms: u64) -> Duration {
        if self.text_speed <= 0.0 {
            return Duration::ZERO;
        }
        let nanos = ms as f64 * 1_000_000.0 / self.text_speed as f64;
        Duration::from_nanos(nanos.round() as u64)
    }

    /// 单字淡入时长（已按速度缩放）
    pub fn fade_duration(&self) -> Duration {
        self.scaled(self.fade_duration_ms)
    }

    /// 是否立即显示全部文字
    pub fn is_instant(&self) -> bool {
        self.text_speed <= 0.0
    }
}

impl SchedulerConfig {
    /// 结果轮询间隔
    pub fn result_poll_interval(&self) -> Duration {
        Duration::from_millis(self.result_poll_interval_ms.max(1))
    }

    /// 空闲退避时长
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

impl EngineConfig {
    /// 加载配置文件
    ///
    /// 如果文件不存在或解析失败，返回默认配置并记录警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = %path.display(), "配置文件不存在，使用默认配置");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match Self::from_json(&content) {
                Ok(config) => {
                    info!(path = %path.display(), "配置文件加载成功");
                    config
                }
                Err(e) => {
                    warn!(error = %e, "配置文件解析失败，使用默认配置");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "配置文件读取失败，使用默认配置");
                Self::default()
            }
        }
    }

    /// 从 JSON 文本解析配置
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(ConfigError::Parse)
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.text.wrap_width <= 0.0 {
            return Err(ConfigError::Validation(
                "wrap_width 必须大于 0".to_string(),
            ));
        }

        if self.text.font_size <= 0.0 {
            return Err(ConfigError::Validation(
                "font_size 必须大于 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.text.ruby_scale) || self.text.ruby_scale == 0.0 {
            return Err(ConfigError::Validation(
                "ruby_scale 必须在 (0.0, 1.0] 之间".to_string(),
            ));
        }

        if self.timing.text_speed < 0.0 {
            return Err(ConfigError::Validation(
                "text_speed 不能为负数".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.text.script_language, ScriptLanguage::Western);
        assert_eq!(config.timing.fade_duration_ms, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "text": { "script_language": "cjk", "wrap_width": 640 } }"#)
                .unwrap();
        assert_eq!(config.text.script_language, ScriptLanguage::Cjk);
        assert_eq!(config.text.wrap_width, 640.0);
        assert_eq!(config.text.ruby_scale, 0.5);
        assert_eq!(config.scheduler.result_poll_interval_ms, 10);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.text.wrap_width = 0.0;
        assert!(config.validate().is_err());

        config.text.wrap_width = 800.0;
        config.text.ruby_scale = 1.5;
        assert!(config.validate().is_err());

        config.text.ruby_scale = 0.5;
        config.timing.text_speed = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.text.ignored_inline_functions = vec!["lsp".to_string()];
        config.timing.text_speed = 2.0;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = EngineConfig::load(dir.path().join("missing.json"));
        assert_eq!(loaded, EngineConfig::default());
    }

    #[test]
    fn test_timing_scaling() {
        let mut timing = TimingConfig::default();
        assert_eq!(timing.scaled(100), Duration::from_millis(100));

        timing.text_speed = 2.0;
        assert_eq!(timing.scaled(100), Duration::from_millis(50));

        timing.text_speed = 0.0;
        assert!(timing.is_instant());
        assert_eq!(timing.fade_duration(), Duration::ZERO);
    }
}
