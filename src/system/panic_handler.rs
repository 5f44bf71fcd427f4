//! Panic handling
//!
//! 两类 panic 分开处理：
//! - 可恢复：发生在 [`recover`] / [`recoverable`] 边界内（跳转降级、点击记录任务），
//!   调用方会接住并继续服务，这里只写一条 `tracing` 日志。
//! - 致命：其余 panic，写入 crash.log；Server 模式输出带堆栈的彩色报告，
//!   CLI 模式只输出一行提示。

use std::cell::Cell;
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::Utc;
use futures_util::FutureExt;

pub const CRASH_LOG_FILE: &str = "crash.log";

thread_local! {
    /// 当前线程所处的可恢复边界层数
    static RECOVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Server,
    Cli,
}

/// 进入可恢复边界，drop 时退出（展开过程中同样会 drop）
struct RecoveryScope;

impl RecoveryScope {
    fn enter() -> Self {
        RECOVERY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        RecoveryScope
    }
}

impl Drop for RecoveryScope {
    fn drop(&mut self) {
        RECOVERY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// 当前线程是否处于可恢复边界内
pub fn in_recovery_scope() -> bool {
    RECOVERY_DEPTH.with(|depth| depth.get() > 0)
}

/// 同步版本的可恢复边界
pub fn recover<F, R>(f: F) -> std::thread::Result<R>
where
    F: FnOnce() -> R,
{
    let _scope = RecoveryScope::enter();
    panic::catch_unwind(AssertUnwindSafe(f))
}

/// 每次 poll 都处于可恢复边界内的 future
struct Recoverable<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Recoverable<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _scope = RecoveryScope::enter();
        self.inner.as_mut().poll(cx)
    }
}

/// 异步版本的可恢复边界
pub async fn recoverable<F: Future>(fut: F) -> std::thread::Result<F::Output> {
    AssertUnwindSafe(Recoverable {
        inner: Box::pin(fut),
    })
    .catch_unwind()
    .await
}

/// 从 panic payload 中取出消息
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown panic".to_string())
}

/// 一次 panic 的摘要
#[derive(Debug, Clone)]
struct PanicReport {
    message: String,
    location: String,
}

impl PanicReport {
    fn from_hook(info: &PanicHookInfo<'_>) -> Self {
        Self {
            message: panic_message(info.payload()),
            location: info
                .location()
                .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
                .unwrap_or_else(|| "Unknown location".to_string()),
        }
    }
}

/// 安装 panic hook
pub fn install_panic_hook(mode: RunMode) {
    panic::set_hook(Box::new(move |info| {
        let report = PanicReport::from_hook(info);
        handle_panic(&report, mode, in_recovery_scope(), Path::new(CRASH_LOG_FILE));
    }));
}

fn handle_panic(report: &PanicReport, mode: RunMode, recovered: bool, crash_log: &Path) {
    if recovered {
        tracing::error!(
            target: "outlinker::panic",
            location = %report.location,
            "recovered panic: {}",
            report.message
        );
        return;
    }

    let backtrace = std::backtrace::Backtrace::force_capture();
    if let Err(e) = append_crash_log(crash_log, report, &backtrace) {
        eprintln!("Failed to write {}: {}", crash_log.display(), e);
    }
    tracing::error!(
        target: "outlinker::panic",
        location = %report.location,
        "fatal panic: {}",
        report.message
    );

    match mode {
        RunMode::Server => print_server_report(report, &backtrace, crash_log),
        RunMode::Cli => eprintln!(
            "\noutlinker panicked: {} (details in {})\n",
            report.message,
            crash_log.display()
        ),
    }
}

fn print_server_report(report: &PanicReport, backtrace: &std::backtrace::Backtrace, crash_log: &Path) {
    use colored::Colorize;

    let rule = "═".repeat(51);
    eprintln!("\n{}", rule.red().bold());
    eprintln!("{} {}", "FATAL PANIC".red().bold(), report.location.white());
    eprintln!("{}", report.message.yellow());
    eprintln!("{}", format!("{}", backtrace).dimmed());
    eprintln!("{} {}", "Crash report appended to".cyan(), crash_log.display());
    eprintln!("{}\n", rule.red().bold());
}

fn append_crash_log(
    path: &Path,
    report: &PanicReport,
    backtrace: &std::backtrace::Backtrace,
) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    write!(
        file,
        "== {} ==\nmessage: {}\nlocation: {}\nbacktrace:\n{}\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        report.message,
        report.location,
        backtrace
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PanicReport {
        PanicReport {
            message: "sink exploded".to_string(),
            location: "src/analytics/sink.rs:1:1".to_string(),
        }
    }

    #[test]
    fn test_recover_sets_scope_only_inside() {
        assert!(!in_recovery_scope());
        let inside = recover(in_recovery_scope).unwrap();
        assert!(inside);
        assert!(!in_recovery_scope());
    }

    #[test]
    fn test_recover_catches_and_resets_scope() {
        let result = recover(|| -> u32 { panic!("boom") });
        assert_eq!(panic_message(&*result.unwrap_err()), "boom");
        assert!(!in_recovery_scope());
    }

    #[tokio::test]
    async fn test_recoverable_future() {
        let ok = recoverable(async {
            tokio::task::yield_now().await;
            in_recovery_scope()
        })
        .await;
        assert!(ok.unwrap());

        let err = recoverable(async {
            tokio::task::yield_now().await;
            panic!("late boom");
        })
        .await;
        assert_eq!(panic_message(&*err.unwrap_err()), "late boom");
        assert!(!in_recovery_scope());
    }

    #[test]
    fn test_recovered_panic_skips_crash_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let crash_log = dir.path().join("crash.log");

        handle_panic(&report(), RunMode::Server, true, &crash_log);
        assert!(!crash_log.exists());
    }

    #[test]
    fn test_fatal_panic_writes_crash_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let crash_log = dir.path().join("crash.log");

        handle_panic(&report(), RunMode::Cli, false, &crash_log);
        let content = std::fs::read_to_string(&crash_log).unwrap();
        assert!(content.contains("message: sink exploded"));
        assert!(content.contains("location: src/analytics/sink.rs:1:1"));
    }
}
