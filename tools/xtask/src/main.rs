//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov-core`: 运行 vn-core 覆盖率
//! - `dialogue-check`: 检查对话文本文件（内联命令语法、排版）
//! - `layout-dump`: 排版一段文本并以 JSON 输出排版结果

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::Level;
use vn_core::{
    BuiltinCommands, DialogueController, DialoguePart, DialogueStep, EngineConfig, LayoutEngine,
    MonospaceFonts, ScriptHost, ScriptLanguage,
};
use walkdir::WalkDir;
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,

    /// 运行 vn-core 覆盖率报告
    CovCore,

    /// 检查对话文本文件
    ///
    /// 不带参数时检查 assets/dialogue/ 下所有 .txt 文件。
    DialogueCheck {
        /// 文件或目录
        path: Option<PathBuf>,

        /// 引擎配置文件
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 排版一段文本并输出 JSON
    LayoutDump {
        /// 要排版的文本
        text: String,

        /// 对话框宽度（像素）
        #[arg(short, long)]
        width: Option<f32>,

        /// 断行规则（western / cjk）
        #[arg(short, long)]
        lang: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main(cli.command) {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::CheckAll => check_all(),
        Commands::CovCore => cov_core(),
        Commands::DialogueCheck { path, config } => {
            dialogue_check(path.as_deref(), config.as_deref())
        }
        Commands::LayoutDump { text, width, lang } => layout_dump(&text, width, lang.as_deref()),
    }
}

fn check_all() -> anyhow::Result<()> {
    let sh = Shell::new()?;

    eprintln!("\n==> cargo fmt --all -- --check");
    cmd!(sh, "cargo fmt --all -- --check").run()?;

    eprintln!("\n==> cargo clippy --workspace --all-targets");
    cmd!(sh, "cargo clippy --workspace --all-targets").run()?;

    eprintln!("\n==> cargo test --workspace");
    cmd!(sh, "cargo test --workspace").run()?;

    Ok(())
}

fn cov_core() -> anyhow::Result<()> {
    let sh = Shell::new()?;

    if cmd!(sh, "cargo llvm-cov --version").quiet().run().is_err() {
        anyhow::bail!(
            "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
        );
    }

    eprintln!("\n==> cargo llvm-cov -p vn-core --html");
    cmd!(sh, "cargo llvm-cov -p vn-core --html").run()?;

    eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
    Ok(())
}

//=============================================================================
// dialogue-check 命令实现
//=============================================================================

/// 默认对话目录（相对于 workspace root）
const DEFAULT_DIALOGUE_DIR: &str = "assets/dialogue";

/// 检查时代替解释器：只记录被调用的命令
#[derive(Default)]
struct CommandCounter {
    commands: usize,
}

impl ScriptHost for CommandCounter {
    fn evaluate_command(&mut self, _name: &str, _args: &[String]) {
        self.commands += 1;
    }
}

/// 单个文件的检查结果
struct FileReport {
    blocks: usize,
    segments: usize,
    commands: usize,
    errors: Vec<String>,
}

fn dialogue_check(path: Option<&Path>, config: Option<&Path>) -> anyhow::Result<()> {
    let config = match config {
        Some(p) => EngineConfig::load(p),
        None => EngineConfig::default(),
    };
    config.validate().context("引擎配置无效")?;

    let files = match path {
        Some(p) if p.is_file() => vec![p.to_path_buf()],
        Some(p) if p.is_dir() => collect_dialogue_files(p),
        Some(p) => anyhow::bail!("路径不存在: {}", p.display()),
        None => {
            let dir = Path::new(DEFAULT_DIALOGUE_DIR);
            if !dir.exists() {
                anyhow::bail!(
                    "默认对话目录不存在: {}\n请在 workspace 根目录运行，或指定路径",
                    dir.display()
                );
            }
            collect_dialogue_files(dir)
        }
    };

    if files.is_empty() {
        eprintln!("未找到对话文件（.txt）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个对话文件...\n", files.len());

    let mut error_count = 0;
    for file in &files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("无法读取文件: {}", file.display()))?;
        let report = check_dialogue(&content, &config);

        for e in &report.errors {
            eprintln!("[ERROR] {}: {}", file.display(), e);
        }
        eprintln!(
            "{}: {} 个对话块, {} 个文本段, {} 个命令",
            file.display(),
            report.blocks,
            report.segments,
            report.commands
        );
        error_count += report.errors.len();
    }

    eprintln!("─────────────────────────────────────────────────────");
    if error_count > 0 {
        eprintln!("❌ {} 个错误", error_count);
        anyhow::bail!("对话检查发现错误");
    }
    eprintln!("✅ 检查通过，无错误");
    Ok(())
}

/// 收集目录下的所有对话文件
fn collect_dialogue_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    files
}

/// 每个非空行是一个对话块，逐步推进到结束
fn check_dialogue(content: &str, config: &EngineConfig) -> FileReport {
    let mut config = config.clone();
    config.timing.text_speed = 0.0;
    let mut dialogue = DialogueController::new(
        &config,
        Arc::new(MonospaceFonts),
        Arc::new(BuiltinCommands::standard()),
    );
    let mut host = CommandCounter::default();
    let mut report = FileReport {
        blocks: 0,
        segments: 0,
        commands: 0,
        errors: Vec::new(),
    };

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        report.blocks += 1;

        if let Err(e) = dialogue.feed_text(line) {
            report.errors.push(format!("第 {} 行: {}", line_no + 1, e));
            dialogue.dispose();
            continue;
        }

        loop {
            match dialogue.advance_one_step(&mut host) {
                Ok(DialogueStep::Part(DialoguePart::Text { .. })) => report.segments += 1,
                Ok(DialogueStep::Part(DialoguePart::End)) | Ok(DialogueStep::Inactive) => break,
                Ok(_) => {}
                Err(e) => {
                    report.errors.push(format!("第 {} 行: {}", line_no + 1, e));
                    break;
                }
            }
        }
    }

    report.commands = host.commands;
    report
}

//=============================================================================
// layout-dump 命令实现
//=============================================================================

fn layout_dump(text: &str, width: Option<f32>, lang: Option<&str>) -> anyhow::Result<()> {
    let mut config = EngineConfig::default();
    if let Some(width) = width {
        config.text.wrap_width = width;
    }
    if let Some(lang) = lang {
        config.text.script_language = lang
            .parse::<ScriptLanguage>()
            .map_err(|_| anyhow::anyhow!("未知的断行规则: {lang}"))?;
    }
    config.validate().context("排版参数无效")?;

    let engine = LayoutEngine::new(&MonospaceFonts, &config.text);
    let state = engine.layout_text(text);
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
